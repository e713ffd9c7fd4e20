//! 题目生成服务 - 业务能力层
//!
//! 只负责"为一篇文献生成草稿题目"能力，不关心流程

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use tracing::debug;

use crate::error::{AppError, LlmError};
use crate::models::{AnswerKind, AnswerOptions, Article, SurveyQuestion};
use crate::services::llm_service::{extract_json_payload, LlmService};
use crate::services::QuestionDrafter;

/// 题目生成服务
///
/// 职责：
/// - 调用 LLM 为单篇文献生成草稿题目
/// - 答案类型由模型选定
/// - 不出现 RequestRecord
/// - 不关心流程顺序
pub struct QuestionDraftService {
    llm: Arc<LlmService>,
}

impl QuestionDraftService {
    pub fn new(llm: Arc<LlmService>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl QuestionDrafter for QuestionDraftService {
    async fn draft(
        &self,
        article: &Article,
        research_question: &str,
        count: usize,
    ) -> Result<Vec<SurveyQuestion>> {
        let prompt = format!(
            "Create survey questions about this research topic.\n\n\
             RESEARCH TOPIC: {research_question}\n\n\
             ARTICLE INFO:\n\
             Title: {title}\n\
             Author: {author}\n\
             Abstract: {abstract_text}\n\n\
             Create exactly {count} survey questions. For each question choose an answer type:\n\
             \"Text\", \"Multiple choice\", \"Yes/No\" or \"Range\".\n\
             For multiple choice give the possible answers as a list of strings,\n\
             for range give the two numeric bounds as [low, high].\n\n\
             Output a JSON array of objects with the keys \"question\", \"answer_type\" and \"options\"\n\
             (options may be null). Output only the JSON array.\n\n\
             Questions:",
            title = article.title.as_deref().unwrap_or("unknown"),
            author = article.author.as_deref().unwrap_or("unknown"),
            abstract_text = article.abstract_text.as_deref().unwrap_or("not available"),
        );

        let response = self.llm.send_to_llm(&prompt, None).await?;
        let drafts = parse_draft_response(&response)?;

        debug!("LLM 生成了 {} 道草稿题目", drafts.len());
        Ok(drafts)
    }
}

/// LLM 返回的单条草稿，兼容裸字符串与结构化对象两种形式
#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum DraftEntry {
    Text(String),
    Structured {
        question: String,
        #[serde(default)]
        answer_type: Option<String>,
        #[serde(default)]
        options: Option<Value>,
    },
}

/// 解析 LLM 返回的题目草稿 JSON
fn parse_draft_response(response: &str) -> Result<Vec<SurveyQuestion>> {
    let payload = extract_json_payload(response);

    let entries: Vec<DraftEntry> = serde_json::from_str(payload).map_err(|e| {
        AppError::Llm(LlmError::DraftParseFailed {
            response: payload.chars().take(200).collect(),
            source: Box::new(e),
        })
    })?;

    let questions = entries
        .into_iter()
        .map(|entry| match entry {
            // 裸字符串视为自由文本题
            DraftEntry::Text(question) => SurveyQuestion::draft(question, AnswerKind::Text),
            DraftEntry::Structured {
                question,
                answer_type,
                options,
            } => {
                let kind = answer_type
                    .as_deref()
                    .and_then(AnswerKind::parse_label)
                    .unwrap_or(AnswerKind::Text);
                let mut draft = SurveyQuestion::draft(question, kind);
                draft.options = convert_options(kind, options);
                draft
            }
        })
        .collect();

    Ok(questions)
}

/// 将 LLM 给出的选项值转换为与答案类型匹配的载荷
///
/// 形状不匹配的选项丢弃为 None，留给格式化阶段报告
fn convert_options(kind: AnswerKind, value: Option<Value>) -> Option<AnswerOptions> {
    let value = value?;
    match kind {
        AnswerKind::Text | AnswerKind::YesNo => None,
        AnswerKind::MultipleChoice => {
            let choices: Vec<String> = value
                .as_array()?
                .iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect();
            if choices.is_empty() {
                None
            } else {
                Some(AnswerOptions::Choices(choices))
            }
        }
        AnswerKind::Range => {
            let bounds = value.as_array()?;
            if bounds.len() != 2 {
                return None;
            }
            let low = bounds[0].as_f64()?;
            let high = bounds[1].as_f64()?;
            Some(AnswerOptions::Bounds([low, high]))
        }
    }
}
