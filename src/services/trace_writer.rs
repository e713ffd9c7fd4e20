//! Trace 写入服务 - 业务能力层
//!
//! 只负责"把记录快照追加到 trace 文件"能力，不关心流程
//!
//! 引擎本身把 trace 文件引用当作不透明数据；
//! 是否以及何时写入由调用方决定。

use anyhow::Result;
use std::fs::OpenOptions;
use std::io::Write;
use tracing::debug;

use crate::error::AppError;
use crate::models::RequestRecord;

/// Trace 写入服务
///
/// 每次记录更新后追加一行 JSON 快照，形成完整的进度历史
pub struct TraceWriter {
    trace_file_path: String,
}

impl TraceWriter {
    /// 使用指定文件路径创建
    pub fn with_path(path: impl Into<String>) -> Self {
        Self {
            trace_file_path: path.into(),
        }
    }

    /// 追加一行记录快照
    pub async fn append(&self, record: &RequestRecord) -> Result<()> {
        debug!(
            "写入 trace: {} | 阶段 {} | 文献 {} | 题目 {}",
            self.trace_file_path,
            record.stage,
            record.papers.len(),
            record.questions.len()
        );

        let line = serde_json::to_string(record)?;

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.trace_file_path)
            .map_err(|e| AppError::file_write_failed(&self.trace_file_path, e))?;

        file.write_all(line.as_bytes())
            .map_err(|e| AppError::file_write_failed(&self.trace_file_path, e))?;
        file.write_all(b"\n")
            .map_err(|e| AppError::file_write_failed(&self.trace_file_path, e))?;

        Ok(())
    }
}
