//! 相关性评分处理器 - 流程层
//!
//! 文献评分与题目评分共用同一套逐项逻辑，只是取材不同：
//! 文献取标题+摘要，题目取题干文本。
//!
//! 逐项调用相互独立，通过有界的并发窗口同时发起，
//! 结果按插入顺序写回，序列顺序绝不因并发而改变。
//! 低于阈值的条目保留并记警告，供下游跳过。

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::{debug, info};

use crate::models::{Diagnostics, RequestRecord};
use crate::services::{RelevanceScorer, ScoreMode};
use crate::utils::logging::truncate_text;
use crate::workflow::DrainPolicy;

/// 评分目标：处理文献序列还是题目序列
#[derive(Debug, Clone, Copy)]
enum ScoreTarget {
    Papers,
    Questions,
}

/// 相关性评分处理器
pub struct RelevanceFilter {
    scorer: Arc<dyn RelevanceScorer>,
    max_concurrent: usize,
    call_timeout: Duration,
    threshold: f64,
}

impl RelevanceFilter {
    pub fn new(
        scorer: Arc<dyn RelevanceScorer>,
        max_concurrent: usize,
        call_timeout: Duration,
        threshold: f64,
    ) -> Self {
        Self {
            scorer,
            max_concurrent: max_concurrent.max(1),
            call_timeout,
            threshold,
        }
    }

    /// 为尚未评分的文献打分
    pub async fn score_papers(
        &self,
        record: &mut RequestRecord,
        policy: DrainPolicy,
        diag: &mut Diagnostics,
    ) {
        self.score_target(record, policy, diag, ScoreTarget::Papers)
            .await;
    }

    /// 为尚未评分的题目打分
    pub async fn score_questions(
        &self,
        record: &mut RequestRecord,
        policy: DrainPolicy,
        diag: &mut Diagnostics,
    ) {
        self.score_target(record, policy, diag, ScoreTarget::Questions)
            .await;
    }

    /// 两种目标共用的逐项评分逻辑
    async fn score_target(
        &self,
        record: &mut RequestRecord,
        policy: DrainPolicy,
        diag: &mut Diagnostics,
        target: ScoreTarget,
    ) {
        // 收集待评分条目：(下标, 候选文本, 日志标签)
        let mut jobs: Vec<(usize, String, String)> = match target {
            ScoreTarget::Papers => record
                .unscored_paper_indices()
                .into_iter()
                .map(|i| {
                    let paper = &record.papers[i].item;
                    (
                        i,
                        paper.relevance_text(),
                        paper.display_title().to_string(),
                    )
                })
                .collect(),
            ScoreTarget::Questions => record
                .unscored_question_indices()
                .into_iter()
                .map(|i| {
                    let question = &record.questions[i].item;
                    (
                        i,
                        question.question.clone(),
                        truncate_text(&question.question, 40),
                    )
                })
                .collect(),
        };

        if let DrainPolicy::OneItem = policy {
            jobs.truncate(1);
        }

        if jobs.is_empty() {
            return;
        }

        let mode = if record.settings.semantic_search {
            ScoreMode::Semantic
        } else {
            ScoreMode::KeywordOverlap
        };
        let subject = record.settings.research_question.clone();

        match target {
            ScoreTarget::Papers => info!("📊 正在评估 {} 篇文献的相关性...", jobs.len()),
            ScoreTarget::Questions => info!("📊 正在评估 {} 道题目的相关性...", jobs.len()),
        }

        // 有界并发评分。分数始终按原始下标写回，序列顺序与完成顺序无关；
        // 每完成一条立即写回，中途取消也只丢弃未完成的条目
        let call_timeout = self.call_timeout;
        let mut results = stream::iter(jobs)
            .map(|(index, candidate, label)| {
                let scorer = Arc::clone(&self.scorer);
                let subject = subject.clone();
                async move {
                    let outcome =
                        timeout(call_timeout, scorer.score(&subject, &candidate, mode)).await;
                    (index, label, outcome)
                }
            })
            .buffered(self.max_concurrent);

        while let Some((index, label, outcome)) = results.next().await {
            let score = match outcome {
                Err(_) => {
                    diag.add_error(format!(
                        "评分超时（{}秒）: {}，该条目保持未评分，可重试",
                        call_timeout.as_secs(),
                        label
                    ));
                    continue;
                }
                Ok(Err(e)) => {
                    diag.add_error(format!("评分失败: {}: {}，该条目保持未评分，可重试", label, e));
                    continue;
                }
                Ok(Ok(score)) => score,
            };

            if !(0.0..=1.0).contains(&score) {
                diag.add_error(format!(
                    "评分协作方返回了 [0,1] 之外的分数 {}: {}，该条目保持未评分",
                    score, label
                ));
                continue;
            }

            match target {
                ScoreTarget::Papers => record.papers[index].score = Some(score),
                ScoreTarget::Questions => record.questions[index].score = Some(score),
            }

            debug!("条目 {} 评分: {:.3}", index, score);

            // 低分条目保留，只做标记
            if score < self.threshold {
                diag.add_warning(format!(
                    "低相关性（{:.2} < {:.2}）: {}，条目保留但将被下游跳过",
                    score, self.threshold, label
                ));
            }
        }
    }
}
