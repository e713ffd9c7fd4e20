//! 带相关性分数的条目

use serde::{Deserialize, Serialize};

/// 条目与其可选的相关性分数（[0,1]）的组合
///
/// 分数在相关性处理器处理之前为 None。条目一旦加入序列就不会被移除，
/// 低分只做标记，保留审计线索。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScoredItem<T> {
    /// 条目本体
    pub item: T,
    /// 相关性分数，未评分时为 None
    pub score: Option<f64>,
}

impl<T> ScoredItem<T> {
    /// 创建一个未评分的条目
    pub fn unscored(item: T) -> Self {
        Self { item, score: None }
    }

    /// 是否已评分
    pub fn is_scored(&self) -> bool {
        self.score.is_some()
    }

    /// 分数是否严格高于阈值（未评分视为否）
    pub fn exceeds(&self, threshold: f64) -> bool {
        self.score.map(|s| s > threshold).unwrap_or(false)
    }
}
