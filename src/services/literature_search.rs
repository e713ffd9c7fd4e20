//! 文献搜索服务 - 业务能力层
//!
//! 只负责"查找文献"能力，不关心流程
//!
//! 提供两种后端：
//! - `OpenAlexSearch`：调用 OpenAlex works API
//! - `LlmLiteratureSearch`：让 LLM 根据研究问题给出文献列表

use std::sync::Arc;

use anyhow::Result;
use async_trait::async_trait;
use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::error::{AppError, SearchError};
use crate::models::Article;
use crate::services::llm_service::{extract_json_payload, LlmService};
use crate::services::LiteratureSearch;

/// OpenAlex 搜索客户端
///
/// 封装所有与 OpenAlex works API 相关的调用逻辑
pub struct OpenAlexSearch {
    client: reqwest::Client,
    base_url: String,
    mailto: Option<String>,
}

impl OpenAlexSearch {
    /// 创建新的 OpenAlex 客户端
    pub fn new(config: &Config) -> Self {
        let mailto = if config.openalex_mailto.is_empty() {
            None
        } else {
            Some(config.openalex_mailto.clone())
        };

        Self {
            client: reqwest::Client::new(),
            base_url: config.openalex_base_url.trim_end_matches('/').to_string(),
            mailto,
        }
    }
}

#[async_trait]
impl LiteratureSearch for OpenAlexSearch {
    async fn search(&self, research_question: &str, limit: usize) -> Result<Vec<Article>> {
        let endpoint = format!("{}/works", self.base_url);
        debug!("OpenAlex 搜索: {}", research_question);

        let mut query: Vec<(&str, String)> = vec![
            ("search", research_question.to_string()),
            ("per-page", limit.to_string()),
        ];
        if let Some(mailto) = &self.mailto {
            query.push(("mailto", mailto.clone()));
        }

        let response = self
            .client
            .get(&endpoint)
            .query(&query)
            .send()
            .await
            .map_err(|e| AppError::search_request_failed(&endpoint, e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(AppError::Search(SearchError::BadResponse {
                endpoint,
                status: Some(status.as_u16()),
            })
            .into());
        }

        let body: Value = response
            .json()
            .await
            .map_err(|e| AppError::search_request_failed(&endpoint, e))?;

        let results = body
            .get("results")
            .and_then(|v| v.as_array())
            .ok_or(AppError::Search(SearchError::EmptyResponse { endpoint }))?;

        debug!("OpenAlex 返回 {} 条结果", results.len());

        Ok(results.iter().map(parse_work).collect())
    }
}

/// 将一条 OpenAlex work 记录转换为 Article
fn parse_work(work: &Value) -> Article {
    let title = work
        .get("title")
        .or_else(|| work.get("display_name"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string());

    // 作者列表拼成一个字符串
    let author = work
        .get("authorships")
        .and_then(|v| v.as_array())
        .map(|authorships| {
            authorships
                .iter()
                .filter_map(|a| {
                    a.get("author")
                        .and_then(|author| author.get("display_name"))
                        .and_then(|name| name.as_str())
                })
                .collect::<Vec<_>>()
                .join(", ")
        })
        .filter(|s| !s.is_empty());

    let abstract_text = work
        .get("abstract_inverted_index")
        .and_then(|v| v.as_object())
        .map(rebuild_abstract)
        .filter(|s| !s.is_empty());

    let url = work
        .get("primary_location")
        .and_then(|loc| loc.get("landing_page_url"))
        .or_else(|| work.get("doi"))
        .or_else(|| work.get("id"))
        .and_then(|v| v.as_str())
        .map(|s| s.to_string());

    Article {
        title,
        author,
        abstract_text,
        url,
    }
}

/// 从 OpenAlex 的倒排索引还原摘要文本
///
/// OpenAlex 出于版权原因以 {词: [位置...]} 的倒排形式返回摘要
fn rebuild_abstract(index: &serde_json::Map<String, Value>) -> String {
    let mut positioned: Vec<(u64, &str)> = Vec::new();

    for (word, positions) in index {
        if let Some(array) = positions.as_array() {
            for position in array {
                if let Some(p) = position.as_u64() {
                    positioned.push((p, word.as_str()));
                }
            }
        }
    }

    positioned.sort_by_key(|(p, _)| *p);
    positioned
        .into_iter()
        .map(|(_, word)| word)
        .collect::<Vec<_>>()
        .join(" ")
}

/// 基于 LLM 的文献搜索
///
/// 让模型根据研究问题给出文献列表，适合没有可用搜索后端的场景
pub struct LlmLiteratureSearch {
    llm: Arc<LlmService>,
}

impl LlmLiteratureSearch {
    pub fn new(llm: Arc<LlmService>) -> Self {
        Self { llm }
    }
}

#[async_trait]
impl LiteratureSearch for LlmLiteratureSearch {
    async fn search(&self, research_question: &str, limit: usize) -> Result<Vec<Article>> {
        let prompt = format!(
            "You are a research assistant. Given a research question, you need to find relevant literature.\n\
             For the research question, list the most relevant papers with their title, abstract, author and URL.\n\
             Limit the number of articles to {limit}.\n\
             Output a JSON array of objects with the keys \"title\", \"author\", \"abstract\" and \"url\";\n\
             use null for unknown fields. Output only the JSON array.\n\
             research question: {research_question}"
        );

        let response = self.llm.send_to_llm(&prompt, None).await?;
        parse_article_response(&response)
    }
}

/// 解析 LLM 返回的文献列表 JSON
fn parse_article_response(response: &str) -> Result<Vec<Article>> {
    let payload = extract_json_payload(response);
    let articles: Vec<Article> = serde_json::from_str(payload)
        .map_err(|e| AppError::Search(SearchError::JsonParseFailed { source: Box::new(e) }))?;
    Ok(articles)
}
