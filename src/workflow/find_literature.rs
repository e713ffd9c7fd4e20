//! 文献查找处理器 - 流程层
//!
//! 只在"查找相关文献"阶段运行。调用搜索协作方获取候选文献，
//! 按（标题, 作者）去重后以未评分状态追加到记录中。
//!
//! 一次搜索调用就能填满整个阶段，因此排空策略在这里没有区别。

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use tokio::time::timeout;
use tracing::{debug, info};

use crate::models::{Diagnostics, RequestRecord, ScoredItem};
use crate::services::LiteratureSearch;

/// 文献查找处理器
pub struct LiteratureFinder {
    search: Arc<dyn LiteratureSearch>,
    call_timeout: Duration,
}

impl LiteratureFinder {
    pub fn new(search: Arc<dyn LiteratureSearch>, call_timeout: Duration) -> Self {
        Self {
            search,
            call_timeout,
        }
    }

    /// 执行一次文献查找
    ///
    /// 搜索失败或零结果时记录保持不变，阶段不会推进，重试是安全的。
    pub async fn run(&self, record: &mut RequestRecord, diag: &mut Diagnostics) {
        let research_question = record.settings.research_question.clone();
        let limit = record.settings.paper_limit;

        info!("🔍 正在查找相关文献: {}", research_question);

        let outcome = timeout(
            self.call_timeout,
            self.search.search(&research_question, limit),
        )
        .await;

        let articles = match outcome {
            Err(_) => {
                diag.add_error(format!(
                    "文献搜索超时（{}秒），记录保持不变",
                    self.call_timeout.as_secs()
                ));
                return;
            }
            Ok(Err(e)) => {
                diag.add_error(format!("文献搜索失败: {}，记录保持不变", e));
                return;
            }
            Ok(Ok(articles)) => articles,
        };

        if articles.is_empty() {
            diag.add_error("文献搜索没有返回任何结果，记录保持不变".to_string());
            return;
        }

        // 按（标题, 作者）去重，保持返回顺序
        let mut seen: HashSet<(Option<String>, Option<String>)> = HashSet::new();
        let mut appended = 0usize;

        for article in articles {
            let key = (article.title.clone(), article.author.clone());
            if !seen.insert(key) {
                debug!("跳过重复文献: {}", article.display_title());
                continue;
            }
            if appended >= limit {
                break;
            }
            record.papers.push(ScoredItem::unscored(article));
            appended += 1;
        }

        info!("✓ 找到 {} 篇文献", appended);

        if appended < limit {
            diag.add_warning(format!(
                "搜索结果少于文献上限: 找到 {} 篇，上限 {} 篇",
                appended, limit
            ));
        }
    }
}
