//! 相关性评分服务 - 业务能力层
//!
//! 只负责"给一对文本打分"能力，不关心流程
//!
//! 语义模式交给 LLM 判断，关键词模式在本地计算词汇重叠。

use std::collections::HashSet;
use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use regex::Regex;
use tracing::debug;

use crate::services::llm_service::{parse_score_response, LlmService};
use crate::services::{RelevanceScorer, ScoreMode};

/// 相关性评分服务
///
/// 职责：
/// - 评估单对文本的相关性，返回 [0,1] 区间的分数
/// - 不出现 Vec<Article> / Vec<SurveyQuestion>
/// - 不关心流程顺序
pub struct RelevanceService {
    llm: Arc<LlmService>,
}

impl RelevanceService {
    pub fn new(llm: Arc<LlmService>) -> Self {
        Self { llm }
    }

    /// 语义相似度评分，由 LLM 完成
    async fn score_semantic(&self, subject: &str, candidate: &str) -> Result<f64> {
        let system = "You are a professional research assistant. Given a research question and a \
                      candidate text, you need to estimate the relevance of the candidate to the \
                      research question. Return a single number between 0 and 1. The higher the \
                      score, the more relevant the candidate is.";
        let user = format!(
            "research question: {subject}\n\ncandidate:\n{candidate}\n\nScore (0 to 1):"
        );

        let response = self.llm.send_to_llm(&user, Some(system)).await?;
        let score = parse_score_response(&response)?;

        debug!("语义评分: {:.3}", score);
        Ok(score.clamp(0.0, 1.0))
    }
}

#[async_trait]
impl RelevanceScorer for RelevanceService {
    async fn score(&self, subject: &str, candidate: &str, mode: ScoreMode) -> Result<f64> {
        match mode {
            ScoreMode::Semantic => self.score_semantic(subject, candidate).await,
            ScoreMode::KeywordOverlap => Ok(keyword_overlap(subject, candidate)),
        }
    }
}

/// 两段文本的关键词重叠度（Jaccard 系数）
///
/// 分词取小写单词集合，任一集合为空时返回 0
pub fn keyword_overlap(a: &str, b: &str) -> f64 {
    let words = Regex::new(r"\w+").expect("分词正则应当合法");

    let tokens = |text: &str| -> HashSet<String> {
        words
            .find_iter(&text.to_lowercase())
            .map(|m| m.as_str().to_string())
            .collect()
    };

    let set_a = tokens(a);
    let set_b = tokens(b);

    if set_a.is_empty() || set_b.is_empty() {
        return 0.0;
    }

    let intersection = set_a.intersection(&set_b).count();
    let union = set_a.union(&set_b).count();

    intersection as f64 / union as f64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_keyword_overlap_identical_texts() {
        assert_eq!(keyword_overlap("coral bleaching", "coral bleaching"), 1.0);
    }

    #[test]
    fn test_keyword_overlap_disjoint_texts() {
        assert_eq!(keyword_overlap("coral bleaching", "quantum computing"), 0.0);
    }

    #[test]
    fn test_keyword_overlap_partial() {
        // {coral, bleaching} ∩ {coral, reefs} = {coral}，并集 3 个词
        let score = keyword_overlap("coral bleaching", "coral reefs");
        assert!((score - 1.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_keyword_overlap_empty_text() {
        assert_eq!(keyword_overlap("", "coral"), 0.0);
        assert_eq!(keyword_overlap("coral", ""), 0.0);
    }

    #[test]
    fn test_keyword_overlap_case_insensitive() {
        assert_eq!(keyword_overlap("Coral Bleaching", "coral bleaching"), 1.0);
    }
}
