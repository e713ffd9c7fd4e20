//! 文献数据模型
//!
//! 搜索后端返回的元数据可能不完整，因此所有字段均可为空。

use serde::{Deserialize, Serialize};

/// 一篇文献的元数据
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Article {
    /// 标题
    pub title: Option<String>,
    /// 作者
    pub author: Option<String>,
    /// 摘要
    #[serde(rename = "abstract")]
    pub abstract_text: Option<String>,
    /// 来源 URL
    pub url: Option<String>,
}

impl Article {
    /// 去重键：以（标题, 作者）二元组判断两篇文献是否相同
    pub fn dedup_key(&self) -> (Option<&str>, Option<&str>) {
        (self.title.as_deref(), self.author.as_deref())
    }

    /// 用于相关性评分的文本：标题与摘要拼接
    pub fn relevance_text(&self) -> String {
        let mut parts = Vec::new();
        if let Some(title) = &self.title {
            parts.push(title.as_str());
        }
        if let Some(abstract_text) = &self.abstract_text {
            parts.push(abstract_text.as_str());
        }
        parts.join("\n")
    }

    /// 日志显示用的标题（缺失时给出占位符）
    pub fn display_title(&self) -> &str {
        self.title.as_deref().unwrap_or("<无标题>")
    }
}
