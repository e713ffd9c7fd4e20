//! 批量请求处理器 - 编排层
//!
//! ## 职责
//!
//! 本模块是整个应用的入口，负责批量请求的处理和资源管理。
//!
//! ## 核心功能
//!
//! 1. **应用初始化**：组装协作方、构造步进引擎
//! 2. **批量加载**：扫描并加载所有待处理的请求（`Vec<LoadedRequest>`）
//! 3. **并发控制**：使用 Semaphore 限制并发数量
//! 4. **分批处理**：将请求分批次处理，每批完成后再开始下一批
//! 5. **逐段驱动**：对每个请求反复整段步进直到完成
//! 6. **全局统计**：汇总所有请求的处理结果
//!
//! 引擎本身跨调用无状态，记录的所有权始终在这一层。

use crate::config::Config;
use crate::models::{LoadedRequest, RequestRecord, Stage};
use crate::orchestrator::stepper::{EngineOptions, StepEngine};
use crate::services::{
    Collaborators, LiteratureSearch, LlmLiteratureSearch, LlmService, OpenAlexSearch,
    QuestionDraftService, RelevanceService, TraceWriter,
};
use crate::utils::logging;
use anyhow::{Context, Result};
use std::fs;
use std::sync::Arc;
use tokio::sync::Semaphore;
use tracing::{error, info, warn};

/// 应用主结构
pub struct App {
    config: Config,
    engine: Arc<StepEngine>,
}

impl App {
    /// 初始化应用
    pub async fn initialize(config: Config) -> Result<Self> {
        logging::log_startup(&config);

        let engine = Arc::new(StepEngine::new(
            build_collaborators(&config),
            EngineOptions::from_config(&config),
        ));

        Ok(Self { config, engine })
    }

    /// 运行应用主逻辑
    pub async fn run(&self) -> Result<()> {
        // 加载所有待处理的请求
        let all_requests = self.load_requests().await?;

        if all_requests.is_empty() {
            warn!("⚠️ 没有找到待处理的TOML请求文件，程序结束");
            return Ok(());
        }

        fs::create_dir_all(&self.config.output_folder)
            .with_context(|| format!("无法创建输出目录: {}", self.config.output_folder))?;

        let total_requests = all_requests.len();
        logging::log_requests_loaded(total_requests, self.config.max_concurrent_requests);

        // 处理所有请求
        let stats = self.process_all_requests(all_requests).await?;

        // 输出最终统计
        logging::print_final_stats(stats.success, stats.failed, stats.total);

        Ok(())
    }

    /// 加载请求
    async fn load_requests(&self) -> Result<Vec<LoadedRequest>> {
        info!("\n📁 正在扫描待处理的请求...");
        crate::models::load_all_request_files(&self.config.request_folder).await
    }

    /// 处理所有请求
    async fn process_all_requests(
        &self,
        all_requests: Vec<LoadedRequest>,
    ) -> Result<ProcessingStats> {
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrent_requests));
        let total_requests = all_requests.len();
        let mut stats = ProcessingStats {
            total: total_requests,
            ..Default::default()
        };

        // 分批处理
        let batch_size = self.config.max_concurrent_requests;
        for batch_start in (0..total_requests).step_by(batch_size) {
            let batch_end = (batch_start + batch_size).min(total_requests);
            let batch_requests = &all_requests[batch_start..batch_end];
            let batch_num = (batch_start / batch_size) + 1;
            let total_batches = (total_requests + batch_size - 1) / batch_size;

            logging::log_batch_start(
                batch_num,
                total_batches,
                batch_start + 1,
                batch_end,
                total_requests,
            );

            // 处理本批
            let batch_result = self
                .process_batch(batch_requests, batch_start, semaphore.clone())
                .await?;

            stats.success += batch_result.success;
            stats.failed += batch_result.failed;

            logging::log_batch_complete(batch_num, batch_result.success, batch_result.total());
        }

        Ok(stats)
    }

    /// 处理单个批次
    async fn process_batch(
        &self,
        batch_requests: &[LoadedRequest],
        batch_start: usize,
        semaphore: Arc<Semaphore>,
    ) -> Result<BatchResult> {
        let mut batch_handles = Vec::new();

        // 为本批创建并发任务
        for (idx, request) in batch_requests.iter().enumerate() {
            let request_index = batch_start + idx + 1;
            let permit = semaphore.clone().acquire_owned().await?;

            let engine = Arc::clone(&self.engine);
            let config = self.config.clone();
            let request = request.clone();

            let handle = tokio::spawn(async move {
                let _permit = permit;
                match process_request(engine, &config, request, request_index).await {
                    Ok(success) => Ok(success),
                    Err(e) => {
                        error!("[请求 {}] ❌ 处理过程中发生错误: {}", request_index, e);
                        Err(e)
                    }
                }
            });
            batch_handles.push((request_index, handle));
        }

        // 等待本批所有任务完成
        let mut result = BatchResult::default();

        for (request_index, handle) in batch_handles {
            match handle.await {
                Ok(Ok(true)) => {
                    result.success += 1;
                }
                Ok(Ok(false)) | Ok(Err(_)) => {
                    result.failed += 1;
                }
                Err(e) => {
                    error!("[请求 {}] 任务执行失败: {}", request_index, e);
                    result.failed += 1;
                }
            }
        }

        Ok(result)
    }
}

/// 按配置组装协作方
fn build_collaborators(config: &Config) -> Collaborators {
    let llm = Arc::new(LlmService::new(config));

    let search: Arc<dyn LiteratureSearch> = match config.search_backend.as_str() {
        "llm" => Arc::new(LlmLiteratureSearch::new(Arc::clone(&llm))),
        _ => Arc::new(OpenAlexSearch::new(config)),
    };
    let scorer = Arc::new(RelevanceService::new(Arc::clone(&llm)));
    let drafter = Arc::new(QuestionDraftService::new(llm));

    Collaborators {
        search,
        scorer,
        drafter,
    }
}

/// 驱动单个请求直到完成
///
/// 每次整段步进后输出诊断并追加 trace 快照；
/// 阶段无法推进时停止该请求并判定失败。
async fn process_request(
    engine: Arc<StepEngine>,
    config: &Config,
    request: LoadedRequest,
    request_index: usize,
) -> Result<bool> {
    let LoadedRequest { name, mut record } = request;

    log_request_start(request_index, &name, &record);

    let trace = record.trace_file.clone().map(TraceWriter::with_path);
    let prefix = format!("[请求 {}]", request_index);

    loop {
        let (transition, updated, diag) = engine.full_run_step(record).await;
        record = updated;

        diag.emit(&prefix);

        if let Some(writer) = &trace {
            if let Err(e) = writer.append(&record).await {
                warn!("{} ⚠️ trace 写入失败: {}", prefix, e);
            }
        }

        info!(
            "{} 阶段: {} → {}",
            prefix,
            transition.previous_stage.label(),
            transition.current_stage.label()
        );

        if transition.current_stage == Stage::Finished {
            break;
        }
        if transition.current_stage == transition.previous_stage {
            error!(
                "{} ❌ 阶段 {} 无法推进，停止处理",
                prefix,
                transition.current_stage.label()
            );
            return Ok(false);
        }
    }

    // 写出最终记录
    let output_path = format!("{}/{}.json", config.output_folder, name);
    let json = serde_json::to_string_pretty(&record)?;
    fs::write(&output_path, json).with_context(|| format!("无法写入结果文件: {}", output_path))?;

    log_request_complete(request_index, &record, &output_path);

    Ok(true)
}

/// 处理统计
#[derive(Debug, Default)]
struct ProcessingStats {
    success: usize,
    failed: usize,
    total: usize,
}

/// 批次处理结果
#[derive(Debug, Default)]
struct BatchResult {
    success: usize,
    failed: usize,
}

impl BatchResult {
    fn total(&self) -> usize {
        self.success + self.failed
    }
}

// ========== 日志辅助函数 ==========

fn log_request_start(request_index: usize, name: &str, record: &RequestRecord) {
    info!("[请求 {}] 开始处理", request_index);
    info!("[请求 {}] 名称: {}", request_index, name);
    info!(
        "[请求 {}] 研究问题: {}",
        request_index, record.settings.research_question
    );
    info!(
        "[请求 {}] 文献上限: {} / 每篇题目数: {}",
        request_index, record.settings.paper_limit, record.settings.questions_per_article
    );
}

fn log_request_complete(request_index: usize, record: &RequestRecord, output_path: &str) {
    let formatted = record
        .questions
        .iter()
        .filter(|q| q.item.formatted)
        .count();
    info!(
        "[请求 {}] 统计: 文献 {} 篇, 题目 {} 道 (已格式化 {})",
        request_index,
        record.papers.len(),
        record.questions.len(),
        formatted
    );
    info!("[请求 {}] 结果已保存至: {}", request_index, output_path);
    info!("\n[请求 {}] ✅ 请求处理完成\n", request_index);
}
