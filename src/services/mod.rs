//! 业务能力层（Services）
//!
//! 描述"我能做什么"，不关心流程顺序。
//!
//! 引擎依赖的三个外部协作方在这里以 trait 的形式声明：
//! 文献搜索、相关性评分、题目生成。引擎只依赖这些契约，
//! 具体实现（OpenAlex / LLM / 关键词重叠）可以在构造时注入，
//! 测试中可以用假实现替换。

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;

use crate::models::{Article, SurveyQuestion};

pub mod literature_search;
pub mod llm_service;
pub mod question_drafter;
pub mod relevance;
pub mod trace_writer;

pub use literature_search::{LlmLiteratureSearch, OpenAlexSearch};
pub use llm_service::LlmService;
pub use question_drafter::QuestionDraftService;
pub use relevance::{keyword_overlap, RelevanceService};
pub use trace_writer::TraceWriter;

/// 相关性评分模式
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScoreMode {
    /// 语义相似度（由评分协作方完成）
    Semantic,
    /// 关键词重叠
    KeywordOverlap,
}

/// 文献搜索协作方：自由文本查询 → 文献元数据列表
#[async_trait]
pub trait LiteratureSearch: Send + Sync {
    /// 为研究问题查找至多 limit 篇候选文献
    async fn search(&self, research_question: &str, limit: usize) -> Result<Vec<Article>>;
}

/// 相关性评分协作方：文本对 → [0,1] 区间内的分数
#[async_trait]
pub trait RelevanceScorer: Send + Sync {
    /// 评估 candidate 相对于 subject 的相关性
    async fn score(&self, subject: &str, candidate: &str, mode: ScoreMode) -> Result<f64>;
}

/// 题目生成协作方：文献 + 研究问题 → 草稿题目列表
#[async_trait]
pub trait QuestionDrafter: Send + Sync {
    /// 为一篇文献生成至多 count 道草稿题目，答案类型由协作方选定
    async fn draft(
        &self,
        article: &Article,
        research_question: &str,
        count: usize,
    ) -> Result<Vec<SurveyQuestion>>;
}

/// 引擎依赖的全部协作方
#[derive(Clone)]
pub struct Collaborators {
    pub search: Arc<dyn LiteratureSearch>,
    pub scorer: Arc<dyn RelevanceScorer>,
    pub drafter: Arc<dyn QuestionDrafter>,
}
