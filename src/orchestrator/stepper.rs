//! 步进控制器 - 编排层
//!
//! ## 职责
//!
//! 本模块是引擎的对外入口，负责一次步进调用的完整编排：
//!
//! 1. **阶段派生**：调用分类器确定当前阶段，并与记录的显式阶段字段做一致性检查
//! 2. **处理器分发**：把记录交给当前阶段对应的处理器
//! 3. **排空控制**：单步只处理一条，整段步进排空当前阶段
//! 4. **诊断汇总**：合并一次调用中所有处理器产生的警告与错误
//!
//! ## 设计特点
//!
//! - **跨调用无状态**：全部进度都在调用方持有的记录里
//! - **失败不外泄**：任何失败都化为诊断条目，绝不越过控制器边界
//! - **单一步进函数**：两种粒度共用同一分发逻辑，只差排空策略

use std::sync::Arc;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::config::Config;
use crate::models::{Diagnostics, RequestRecord, Stage, DEFAULT_RELEVANCE_THRESHOLD};
use crate::orchestrator::classifier::classify;
use crate::services::Collaborators;
use crate::workflow::{
    DrainPolicy, LiteratureFinder, QuestionFormatter, QuestionGenerator, RelevanceFilter,
};

/// 引擎选项，在构造时注入，避免任何全局常量
#[derive(Debug, Clone, Copy)]
pub struct EngineOptions {
    /// 相关性阈值，分数严格高于该值的条目视为相关
    pub relevance_threshold: f64,
    /// 单次步进内同时发起的协作方调用上限
    pub max_concurrent_calls: usize,
    /// 单次协作方调用的超时时间
    pub call_timeout: Duration,
}

impl Default for EngineOptions {
    fn default() -> Self {
        Self {
            relevance_threshold: DEFAULT_RELEVANCE_THRESHOLD,
            max_concurrent_calls: 4,
            call_timeout: Duration::from_secs(60),
        }
    }
}

impl EngineOptions {
    pub fn from_config(config: &Config) -> Self {
        Self {
            relevance_threshold: config.relevance_threshold,
            max_concurrent_calls: config.max_concurrent_calls,
            call_timeout: Duration::from_secs(config.call_timeout_secs),
        }
    }
}

/// 一次整段步进的阶段变迁
///
/// 历史接口在这里返回三个语义不明的字符串；按设计修订
/// 改为显式的三元组：进入时的阶段、调用后的阶段、以及
/// 调用后阶段在流水线中的静态后继。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageTransition {
    pub previous_stage: Stage,
    pub current_stage: Stage,
    pub next_stage: Stage,
}

/// 步进引擎
pub struct StepEngine {
    finder: LiteratureFinder,
    filter: RelevanceFilter,
    generator: QuestionGenerator,
    formatter: QuestionFormatter,
    threshold: f64,
}

impl StepEngine {
    /// 用一组协作方和选项构造引擎
    pub fn new(collaborators: Collaborators, options: EngineOptions) -> Self {
        Self {
            finder: LiteratureFinder::new(
                Arc::clone(&collaborators.search),
                options.call_timeout,
            ),
            filter: RelevanceFilter::new(
                Arc::clone(&collaborators.scorer),
                options.max_concurrent_calls,
                options.call_timeout,
                options.relevance_threshold,
            ),
            generator: QuestionGenerator::new(
                Arc::clone(&collaborators.drafter),
                options.max_concurrent_calls,
                options.call_timeout,
                options.relevance_threshold,
            ),
            formatter: QuestionFormatter::new(),
            threshold: options.relevance_threshold,
        }
    }

    /// 单步：处理当前阶段的至多一条待处理条目
    pub async fn single_step(&self, mut record: RequestRecord) -> (RequestRecord, Diagnostics) {
        let mut diag = Diagnostics::new();

        let Some(stage) = self.entry_stage(&mut record, &mut diag) else {
            return (record, diag);
        };
        if stage == Stage::Finished {
            return (record, diag);
        }

        debug!("单步: {}", stage.label());
        self.dispatch(stage, &mut record, DrainPolicy::OneItem, &mut diag)
            .await;
        self.resync_stage(&mut record, &mut diag);

        (record, diag)
    }

    /// 整段步进：排空当前阶段的全部待处理条目，直到分类器报告
    /// 新的阶段或已完成为止
    ///
    /// 一轮排空后阶段未变且记录毫无进展时终止（该阶段此刻无法推进，
    /// 重试由调用方决定）。
    pub async fn full_run_step(
        &self,
        mut record: RequestRecord,
    ) -> (StageTransition, RequestRecord, Diagnostics) {
        let mut diag = Diagnostics::new();

        let Some(entry) = self.entry_stage(&mut record, &mut diag) else {
            let stage = record.stage;
            let transition = StageTransition {
                previous_stage: stage,
                current_stage: stage,
                next_stage: stage,
            };
            return (transition, record, diag);
        };

        let mut current = entry;
        while current != Stage::Finished {
            let before = record.progress_fingerprint();

            debug!("整段步进: {}", current.label());
            self.dispatch(current, &mut record, DrainPolicy::DrainStage, &mut diag)
                .await;

            let Some(derived) = self.resync_stage(&mut record, &mut diag) else {
                break;
            };
            if derived != current {
                current = derived;
                break;
            }
            if record.progress_fingerprint() == before {
                // 没有任何进展，阶段无法推进
                break;
            }
        }

        let transition = StageTransition {
            previous_stage: entry,
            current_stage: current,
            next_stage: current.successor(),
        };
        (transition, record, diag)
    }

    /// 反复整段步进，直到到达目标阶段（或已完成 / 无法推进）为止
    ///
    /// 返回时记录恰好停在目标阶段的起点之前。
    pub async fn run_until_before(
        &self,
        mut record: RequestRecord,
        target: Stage,
    ) -> (RequestRecord, Diagnostics) {
        let mut diag = Diagnostics::new();

        loop {
            // 先派生当前阶段，避免对目标阶段做任何处理
            let stage = match classify(&record, self.threshold) {
                Err(defect) => {
                    diag.add_error(format!("记录不满足不变量: {}", defect));
                    break;
                }
                Ok(stage) => stage,
            };
            if stage == Stage::Finished || stage >= target {
                break;
            }

            let (transition, updated, step_diag) = self.full_run_step(record).await;
            record = updated;
            diag.merge(step_diag);

            if transition.current_stage == transition.previous_stage {
                // 无法推进，停止
                break;
            }
        }

        (record, diag)
    }

    /// 进入时的阶段派生与一致性检查
    ///
    /// 记录的显式阶段字段与派生结果不一致时记警告并以派生结果为准；
    /// 记录不满足不变量时记缺陷错误并放弃分发。
    fn entry_stage(&self, record: &mut RequestRecord, diag: &mut Diagnostics) -> Option<Stage> {
        match classify(record, self.threshold) {
            Err(defect) => {
                diag.add_error(format!("记录不满足不变量: {}，本次调用不做任何处理", defect));
                None
            }
            Ok(derived) => {
                if record.stage != derived {
                    diag.add_warning(format!(
                        "记录的显式阶段 {} 与派生阶段 {} 不一致，以派生结果为准",
                        record.stage, derived
                    ));
                    record.stage = derived;
                }
                Some(derived)
            }
        }
    }

    /// 处理器运行后重新派生阶段并写回显式字段
    fn resync_stage(&self, record: &mut RequestRecord, diag: &mut Diagnostics) -> Option<Stage> {
        match classify(record, self.threshold) {
            Err(defect) => {
                diag.add_error(format!("处理后记录不满足不变量: {}", defect));
                None
            }
            Ok(derived) => {
                record.stage = derived;
                Some(derived)
            }
        }
    }

    /// 按阶段分发到对应的处理器
    async fn dispatch(
        &self,
        stage: Stage,
        record: &mut RequestRecord,
        policy: DrainPolicy,
        diag: &mut Diagnostics,
    ) {
        match stage {
            Stage::FindingLiterature => self.finder.run(record, diag).await,
            Stage::CheckingLiteratureRelevance => {
                self.filter.score_papers(record, policy, diag).await
            }
            Stage::CreatingSurveyQuestions => self.generator.run(record, policy, diag).await,
            Stage::CheckingQuestionRelevance => {
                self.filter.score_questions(record, policy, diag).await
            }
            Stage::FormattingSurveyQuestions => self.formatter.run(record, policy, diag),
            Stage::Finished => {}
        }
    }
}
