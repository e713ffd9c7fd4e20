//! 步进诊断信息
//!
//! 每次步进调用产生一份全新的诊断信息，不跨调用累积。

use serde::{Deserialize, Serialize};
use tracing::{error, warn};

/// 一次步进调用中产生的警告与错误
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Diagnostics {
    /// 警告列表，按产生顺序排列
    pub warnings: Vec<String>,
    /// 错误列表，按产生顺序排列
    pub errors: Vec<String>,
}

impl Diagnostics {
    /// 创建空的诊断信息
    pub fn new() -> Self {
        Self::default()
    }

    /// 追加一条警告
    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// 追加一条错误
    pub fn add_error(&mut self, error: impl Into<String>) {
        self.errors.push(error.into());
    }

    /// 合并另一份诊断信息
    pub fn merge(&mut self, other: Diagnostics) {
        self.warnings.extend(other.warnings);
        self.errors.extend(other.errors);
    }

    /// 是否既无警告也无错误
    pub fn is_empty(&self) -> bool {
        self.warnings.is_empty() && self.errors.is_empty()
    }

    /// 是否包含错误
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    /// 通过 tracing 输出全部警告与错误，带统一前缀
    pub fn emit(&self, prefix: &str) {
        for warning in &self.warnings {
            warn!("{} ⚠️ {}", prefix, warning);
        }
        for err in &self.errors {
            error!("{} ❌ {}", prefix, err);
        }
    }
}
