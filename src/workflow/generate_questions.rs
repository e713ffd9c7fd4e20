//! 题目生成处理器 - 流程层
//!
//! 只在"生成问卷题目"阶段运行。为每篇分数高于阈值且尚未产生题目的
//! 文献向生成协作方请求草稿题目，以未评分状态追加到记录中。
//!
//! 全局上限为 paper_limit × questions_per_article，超出部分从
//! 最后处理的文献截断并记警告。

use std::sync::Arc;
use std::time::Duration;

use futures::stream::{self, StreamExt};
use tokio::time::timeout;
use tracing::info;

use crate::models::{Diagnostics, RequestRecord, ScoredItem};
use crate::services::QuestionDrafter;
use crate::workflow::DrainPolicy;

/// 题目生成处理器
pub struct QuestionGenerator {
    drafter: Arc<dyn QuestionDrafter>,
    max_concurrent: usize,
    call_timeout: Duration,
    threshold: f64,
}

impl QuestionGenerator {
    pub fn new(
        drafter: Arc<dyn QuestionDrafter>,
        max_concurrent: usize,
        call_timeout: Duration,
        threshold: f64,
    ) -> Self {
        Self {
            drafter,
            max_concurrent: max_concurrent.max(1),
            call_timeout,
            threshold,
        }
    }

    /// 为待处理的相关文献生成题目
    ///
    /// 单篇文献的生成失败只影响该文献（保持无题目、可重试），
    /// 其余文献继续处理。
    pub async fn run(
        &self,
        record: &mut RequestRecord,
        policy: DrainPolicy,
        diag: &mut Diagnostics,
    ) {
        let cap = record.question_cap();
        let per_article = record.settings.questions_per_article;

        let mut pending = record.papers_awaiting_questions(self.threshold);
        if let DrainPolicy::OneItem = policy {
            pending.truncate(1);
        }

        if pending.is_empty() {
            return;
        }

        if record.questions.len() >= cap {
            diag.add_warning(format!(
                "题目数量已达全局上限 {}，{} 篇相关文献未生成题目",
                cap,
                pending.len()
            ));
            return;
        }

        info!("✏️ 正在为 {} 篇相关文献生成题目...", pending.len());

        // 逐篇并发请求草稿，buffered 保证结果按文献顺序产出
        let research_question = record.settings.research_question.clone();
        let call_timeout = self.call_timeout;
        let jobs: Vec<(usize, crate::models::Article)> = pending
            .iter()
            .map(|&i| (i, record.papers[i].item.clone()))
            .collect();

        let results = stream::iter(jobs)
            .map(|(index, article)| {
                let drafter = Arc::clone(&self.drafter);
                let research_question = research_question.clone();
                async move {
                    let outcome = timeout(
                        call_timeout,
                        drafter.draft(&article, &research_question, per_article),
                    )
                    .await;
                    (index, article.display_title().to_string(), outcome)
                }
            })
            .buffered(self.max_concurrent)
            .collect::<Vec<_>>()
            .await;

        // 按文献顺序追加，全局上限在追加时统一执行
        for (index, title, outcome) in results {
            let mut drafts = match outcome {
                Err(_) => {
                    diag.add_error(format!(
                        "题目生成超时（{}秒）: {}，该文献保持无题目，可重试",
                        call_timeout.as_secs(),
                        title
                    ));
                    continue;
                }
                Ok(Err(e)) => {
                    diag.add_error(format!(
                        "题目生成失败: {}: {}，该文献保持无题目，可重试",
                        title, e
                    ));
                    continue;
                }
                Ok(Ok(drafts)) => drafts,
            };

            if drafts.is_empty() {
                diag.add_warning(format!("协作方没有为文献生成任何题目: {}", title));
                continue;
            }

            // 协作方多给的先裁掉
            if drafts.len() > per_article {
                drafts.truncate(per_article);
            }

            let remaining = cap.saturating_sub(record.questions.len());
            if remaining == 0 {
                diag.add_warning(format!(
                    "题目数量已达全局上限 {}，文献 {} 的草稿被丢弃",
                    cap, title
                ));
                continue;
            }
            if drafts.len() > remaining {
                diag.add_warning(format!(
                    "题目数量超出全局上限 {}，文献 {} 的草稿从 {} 道截断为 {} 道",
                    cap,
                    title,
                    drafts.len(),
                    remaining
                ));
                drafts.truncate(remaining);
            }

            for mut draft in drafts {
                draft.source_paper = Some(index);
                draft.formatted = false;
                record.questions.push(ScoredItem::unscored(draft));
            }
        }

        info!("✓ 题目总数: {}/{}", record.questions.len(), cap);
    }
}
