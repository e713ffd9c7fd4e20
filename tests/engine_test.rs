//! 步进引擎的集成测试
//!
//! 用假协作方驱动引擎，不依赖任何外部服务。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use async_trait::async_trait;

use create_survey_questions::orchestrator::{classify, EngineOptions, StepEngine};
use create_survey_questions::services::{
    Collaborators, LiteratureSearch, QuestionDrafter, RelevanceScorer, ScoreMode,
};
use create_survey_questions::{
    AnswerKind, Article, RequestRecord, ScoredItem, Settings, Stage, SurveyQuestion,
};

// ========== 假协作方 ==========

fn article(title: &str, abstract_text: &str) -> Article {
    Article {
        title: Some(title.to_string()),
        author: Some("Test Author".to_string()),
        abstract_text: Some(abstract_text.to_string()),
        url: None,
    }
}

/// 返回固定文献列表的搜索协作方
struct FixedSearch {
    articles: Vec<Article>,
}

#[async_trait]
impl LiteratureSearch for FixedSearch {
    async fn search(&self, _research_question: &str, _limit: usize) -> Result<Vec<Article>> {
        Ok(self.articles.clone())
    }
}

/// 永远返回空结果的搜索协作方
struct EmptySearch;

#[async_trait]
impl LiteratureSearch for EmptySearch {
    async fn search(&self, _research_question: &str, _limit: usize) -> Result<Vec<Article>> {
        Ok(Vec::new())
    }
}

/// 按标题查表评分的协作方，可为每个条目设置延迟，并统计调用次数
struct TableScorer {
    scores: HashMap<String, f64>,
    delays_ms: HashMap<String, u64>,
    calls: AtomicUsize,
}

impl TableScorer {
    fn new(entries: &[(&str, f64)]) -> Self {
        Self {
            scores: entries
                .iter()
                .map(|(k, v)| (k.to_string(), *v))
                .collect(),
            delays_ms: HashMap::new(),
            calls: AtomicUsize::new(0),
        }
    }

    fn with_delays(mut self, delays: &[(&str, u64)]) -> Self {
        self.delays_ms = delays.iter().map(|(k, v)| (k.to_string(), *v)).collect();
        self
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl RelevanceScorer for TableScorer {
    async fn score(&self, _subject: &str, candidate: &str, _mode: ScoreMode) -> Result<f64> {
        self.calls.fetch_add(1, Ordering::SeqCst);

        let entry = self
            .scores
            .iter()
            .find(|(key, _)| candidate.contains(key.as_str()));

        let (key, score) = match entry {
            Some((key, score)) => (key.clone(), *score),
            None => return Err(anyhow!("没有为该文本准备分数: {}", candidate)),
        };

        if let Some(delay) = self.delays_ms.get(&key) {
            tokio::time::sleep(Duration::from_millis(*delay)).await;
        }

        Ok(score)
    }
}

/// 睡过超时时间的评分协作方
struct SlowScorer;

#[async_trait]
impl RelevanceScorer for SlowScorer {
    async fn score(&self, _subject: &str, _candidate: &str, _mode: ScoreMode) -> Result<f64> {
        tokio::time::sleep(Duration::from_secs(10)).await;
        Ok(0.5)
    }
}

/// 每次恰好生成要求数量题目的协作方，可额外多给以测试截断
struct FixedDrafter {
    extra: usize,
    calls: AtomicUsize,
}

impl FixedDrafter {
    fn new() -> Self {
        Self {
            extra: 0,
            calls: AtomicUsize::new(0),
        }
    }

    fn with_extra(extra: usize) -> Self {
        Self {
            extra,
            calls: AtomicUsize::new(0),
        }
    }

    fn call_count(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl QuestionDrafter for FixedDrafter {
    async fn draft(
        &self,
        article: &Article,
        _research_question: &str,
        count: usize,
    ) -> Result<Vec<SurveyQuestion>> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let title = article.title.as_deref().unwrap_or("unknown");
        Ok((0..count + self.extra)
            .map(|i| SurveyQuestion::draft(format!("Question {} about {}?", i + 1, title), AnswerKind::Text))
            .collect())
    }
}

// ========== 测试辅助 ==========

fn make_engine(
    search: Arc<dyn LiteratureSearch>,
    scorer: Arc<dyn RelevanceScorer>,
    drafter: Arc<dyn QuestionDrafter>,
) -> StepEngine {
    StepEngine::new(
        Collaborators {
            search,
            scorer,
            drafter,
        },
        EngineOptions {
            relevance_threshold: 0.5,
            max_concurrent_calls: 8,
            call_timeout: Duration::from_millis(500),
        },
    )
}

fn coral_settings(paper_limit: usize, questions_per_article: usize) -> Settings {
    Settings {
        research_question: "coral bleaching".to_string(),
        paper_limit,
        questions_per_article,
        semantic_search: true,
    }
}

/// 带分数的文献条目
fn scored_paper(title: &str, score: f64) -> ScoredItem<Article> {
    ScoredItem {
        item: article(title, "abstract"),
        score: Some(score),
    }
}

// ========== 分类与空记录 ==========

#[tokio::test]
async fn test_empty_record_is_discovery_and_scorer_untouched() {
    // 空文献序列永远分类为查找文献，且不会调用评分协作方
    let record = RequestRecord::new(coral_settings(2, 1));
    assert_eq!(classify(&record, 0.5).unwrap(), Stage::FindingLiterature);

    let scorer = Arc::new(TableScorer::new(&[("Reef", 0.9)]));
    let engine = make_engine(
        Arc::new(FixedSearch {
            articles: vec![article("Reef heat stress", "thermal stress on reefs")],
        }),
        Arc::clone(&scorer) as Arc<dyn RelevanceScorer>,
        Arc::new(FixedDrafter::new()),
    );

    let (record, diag) = engine.single_step(record).await;

    assert_eq!(record.papers.len(), 1);
    assert!(record.papers.iter().all(|p| !p.is_scored()));
    assert_eq!(scorer.call_count(), 0);
    // 只找到 1 篇但上限是 2，应有警告
    assert_eq!(diag.warnings.len(), 1);
}

#[tokio::test]
async fn test_discovery_zero_results_leaves_record_unchanged() {
    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(TableScorer::new(&[])),
        Arc::new(FixedDrafter::new()),
    );

    let record = RequestRecord::new(coral_settings(2, 1));
    let before = record.clone();
    let (transition, record, diag) = engine.full_run_step(record).await;

    // 记录不变，一条错误，阶段停在查找文献
    assert_eq!(record, before);
    assert_eq!(diag.errors.len(), 1);
    assert_eq!(transition.previous_stage, Stage::FindingLiterature);
    assert_eq!(transition.current_stage, Stage::FindingLiterature);
}

#[tokio::test]
async fn test_discovery_deduplicates_by_title_author() {
    let duplicate = article("Reef heat stress", "thermal stress");
    let engine = make_engine(
        Arc::new(FixedSearch {
            articles: vec![duplicate.clone(), duplicate.clone()],
        }),
        Arc::new(TableScorer::new(&[])),
        Arc::new(FixedDrafter::new()),
    );

    let record = RequestRecord::new(coral_settings(3, 1));
    let (record, _diag) = engine.single_step(record).await;

    assert_eq!(record.papers.len(), 1);
}

// ========== 完整场景 ==========

#[tokio::test]
async fn test_coral_bleaching_scenario() {
    // 场景：paper_limit=2, questions_per_article=1。
    // 第 1 步找到 2 篇未评分文献，第 2 步打分 0.9/0.4，
    // 第 3 步（阈值 0.5）只为 0.9 的文献生成恰好 1 道题目。
    let engine = make_engine(
        Arc::new(FixedSearch {
            articles: vec![
                article("Reef heat stress", "thermal stress kills coral"),
                article("Deep sea mining", "unrelated topic"),
            ],
        }),
        Arc::new(TableScorer::new(&[
            ("Reef heat stress", 0.9),
            ("Deep sea mining", 0.4),
        ])),
        Arc::new(FixedDrafter::new()),
    );

    let record = RequestRecord::new(coral_settings(2, 1));

    // 第 1 步：查找文献
    let (transition, record, _) = engine.full_run_step(record).await;
    assert_eq!(transition.previous_stage, Stage::FindingLiterature);
    assert_eq!(transition.current_stage, Stage::CheckingLiteratureRelevance);
    assert_eq!(record.papers.len(), 2);
    assert!(record.papers.iter().all(|p| p.score.is_none()));

    // 第 2 步：文献评分
    let (transition, record, diag) = engine.full_run_step(record).await;
    assert_eq!(transition.current_stage, Stage::CreatingSurveyQuestions);
    assert_eq!(record.papers[0].score, Some(0.9));
    assert_eq!(record.papers[1].score, Some(0.4));
    // 低分文献保留并有警告
    assert_eq!(record.papers.len(), 2);
    assert!(diag.warnings.iter().any(|w| w.contains("低相关性")));

    // 第 3 步：生成题目，只有 0.9 的文献入选
    let (transition, record, _) = engine.full_run_step(record).await;
    assert_eq!(transition.current_stage, Stage::CheckingQuestionRelevance);
    assert_eq!(record.questions.len(), 1);
    assert_eq!(record.questions[0].item.source_paper, Some(0));
    assert!(record.questions[0].item.question.contains("Reef heat stress"));
}

#[tokio::test]
async fn test_record_reaches_finished_and_lengths_never_decrease() {
    let engine = make_engine(
        Arc::new(FixedSearch {
            articles: vec![
                article("Reef heat stress", "thermal stress"),
                article("Coral recovery", "recovery dynamics"),
            ],
        }),
        Arc::new(TableScorer::new(&[
            ("Reef heat stress", 0.9),
            ("Coral recovery", 0.8),
            ("Question", 0.7),
        ])),
        Arc::new(FixedDrafter::new()),
    );

    let mut record = RequestRecord::new(coral_settings(2, 2));
    let mut paper_len = 0usize;
    let mut question_len = 0usize;

    // 逐段推进直到完成，序列长度单调不减
    for _ in 0..10 {
        let (transition, updated, diag) = engine.full_run_step(record).await;
        record = updated;

        assert!(record.papers.len() >= paper_len);
        assert!(record.questions.len() >= question_len);
        paper_len = record.papers.len();
        question_len = record.questions.len();
        assert!(!diag.has_errors());

        if transition.current_stage == Stage::Finished {
            break;
        }
    }

    assert_eq!(record.stage, Stage::Finished);
    assert_eq!(record.questions.len(), 4);
    assert!(record.questions.iter().all(|q| q.item.formatted));
    assert!(record.questions.iter().all(|q| q.is_scored()));
}

#[tokio::test]
async fn test_finished_record_is_fixed_point() {
    // 已完成的记录再步进是无操作，且不产生任何诊断
    let mut record = RequestRecord::new(coral_settings(1, 1));
    record.papers.push(scored_paper("Reef heat stress", 0.9));
    let mut question = SurveyQuestion::draft("Is coral dying?", AnswerKind::Text);
    question.source_paper = Some(0);
    question.formatted = true;
    record.questions.push(ScoredItem {
        item: question,
        score: Some(0.8),
    });
    record.stage = Stage::Finished;

    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(TableScorer::new(&[])),
        Arc::new(FixedDrafter::new()),
    );

    let before = record.clone();
    let (record, diag) = engine.single_step(record).await;
    assert_eq!(record, before);
    assert!(diag.is_empty());

    let (transition, record, diag) = engine.full_run_step(record).await;
    assert_eq!(record, before);
    assert!(diag.is_empty());
    assert_eq!(transition.previous_stage, Stage::Finished);
    assert_eq!(transition.current_stage, Stage::Finished);
    assert_eq!(transition.next_stage, Stage::Finished);
}

// ========== 并发与顺序 ==========

#[tokio::test]
async fn test_concurrent_scoring_preserves_insertion_order() {
    // 最先插入的文献评分最慢，完成顺序与插入顺序相反，
    // 但写回后的序列顺序必须与插入顺序一致
    let titles = ["P0", "P1", "P2", "P3", "P4"];
    let expected = [0.9, 0.8, 0.7, 0.6, 0.55];

    let scorer = TableScorer::new(&[
        ("P0", 0.9),
        ("P1", 0.8),
        ("P2", 0.7),
        ("P3", 0.6),
        ("P4", 0.55),
    ])
    .with_delays(&[("P0", 200), ("P1", 150), ("P2", 100), ("P3", 50), ("P4", 0)]);

    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(scorer),
        Arc::new(FixedDrafter::new()),
    );

    let mut record = RequestRecord::new(coral_settings(5, 1));
    for title in titles {
        record
            .papers
            .push(ScoredItem::unscored(article(title, "abstract")));
    }

    let (_, record, diag) = engine.full_run_step(record).await;

    assert!(!diag.has_errors());
    for (i, title) in titles.iter().enumerate() {
        assert_eq!(record.papers[i].item.title.as_deref(), Some(*title));
        assert_eq!(record.papers[i].score, Some(expected[i]));
    }
}

#[tokio::test]
async fn test_single_step_scores_exactly_one_item() {
    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(TableScorer::new(&[("P0", 0.9), ("P1", 0.8), ("P2", 0.7)])),
        Arc::new(FixedDrafter::new()),
    );

    let mut record = RequestRecord::new(coral_settings(3, 1));
    for title in ["P0", "P1", "P2"] {
        record
            .papers
            .push(ScoredItem::unscored(article(title, "abstract")));
    }

    let (record, _) = engine.single_step(record).await;

    let scored = record.papers.iter().filter(|p| p.is_scored()).count();
    assert_eq!(scored, 1);
    assert_eq!(record.papers[0].score, Some(0.9));
    assert_eq!(record.stage, Stage::CheckingLiteratureRelevance);
}

#[tokio::test]
async fn test_scoring_timeout_is_recoverable() {
    // 超时的评分调用只产生该条目的错误，分数保持为空，之后可重试
    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(SlowScorer),
        Arc::new(FixedDrafter::new()),
    );

    let mut record = RequestRecord::new(coral_settings(1, 1));
    record
        .papers
        .push(ScoredItem::unscored(article("P0", "abstract")));

    let (transition, record, diag) = engine.full_run_step(record).await;

    assert!(diag.errors.iter().any(|e| e.contains("超时")));
    assert_eq!(record.papers[0].score, None);
    assert_eq!(transition.current_stage, Stage::CheckingLiteratureRelevance);

    // 换一个正常的评分协作方重试同一记录
    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(TableScorer::new(&[("P0", 0.9)])),
        Arc::new(FixedDrafter::new()),
    );
    let (record, diag) = engine.single_step(record).await;
    assert!(!diag.has_errors());
    assert_eq!(record.papers[0].score, Some(0.9));
}

// ========== 题目生成与上限 ==========

#[tokio::test]
async fn test_no_relevant_papers_finishes_without_generation() {
    let drafter = Arc::new(FixedDrafter::new());
    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(TableScorer::new(&[("P0", 0.2), ("P1", 0.3)])),
        Arc::clone(&drafter) as Arc<dyn QuestionDrafter>,
    );

    let mut record = RequestRecord::new(coral_settings(2, 1));
    for title in ["P0", "P1"] {
        record
            .papers
            .push(ScoredItem::unscored(article(title, "abstract")));
    }

    // 评分后没有任何文献高于阈值，请求直接结束
    let (transition, record, _) = engine.full_run_step(record).await;
    assert_eq!(transition.current_stage, Stage::Finished);
    assert!(record.questions.is_empty());
    assert_eq!(drafter.call_count(), 0);
}

#[tokio::test]
async fn test_drafter_excess_is_truncated_to_per_article_count() {
    // 协作方多给的草稿被裁到 questions_per_article
    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(TableScorer::new(&[])),
        Arc::new(FixedDrafter::with_extra(3)),
    );

    let mut record = RequestRecord::new(coral_settings(2, 2));
    record.papers.push(scored_paper("P0", 0.9));
    record.papers.push(scored_paper("P1", 0.8));

    let (_, record, _) = engine.full_run_step(record).await;

    assert_eq!(record.questions.len(), 4);
    assert!(record.questions.len() <= record.question_cap());
}

#[tokio::test]
async fn test_global_cap_truncates_last_processed_paper() {
    // 记录里已有 3 道题目（上限 4），剩下的相关文献只能再贡献 1 道
    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(TableScorer::new(&[])),
        Arc::new(FixedDrafter::new()),
    );

    let mut record = RequestRecord::new(coral_settings(2, 2));
    record.papers.push(scored_paper("P0", 0.9));
    record.papers.push(scored_paper("P1", 0.8));
    for i in 0..3 {
        let mut q = SurveyQuestion::draft(format!("Q{}?", i), AnswerKind::Text);
        q.source_paper = Some(0);
        record.questions.push(ScoredItem::unscored(q));
    }

    let (_, record, diag) = engine.full_run_step(record).await;

    assert_eq!(record.questions.len(), record.question_cap());
    assert!(diag.warnings.iter().any(|w| w.contains("截断")));
    // 第二篇文献的题目虽被截断，但仍然归属于它
    assert_eq!(record.questions[3].item.source_paper, Some(1));
}

// ========== 缺陷与一致性 ==========

#[tokio::test]
async fn test_malformed_record_reports_defect_and_stays_unchanged() {
    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(TableScorer::new(&[])),
        Arc::new(FixedDrafter::new()),
    );

    // 文献数量超过上限的记录
    let mut record = RequestRecord::new(coral_settings(1, 1));
    record.papers.push(scored_paper("P0", 0.9));
    record.papers.push(scored_paper("P1", 0.8));

    let before = record.clone();
    let (record, diag) = engine.single_step(record).await;

    assert_eq!(record, before);
    assert_eq!(diag.errors.len(), 1);
    assert!(diag.errors[0].contains("不变量"));
}

#[tokio::test]
async fn test_stale_stage_field_triggers_consistency_warning() {
    let engine = make_engine(
        Arc::new(EmptySearch),
        Arc::new(TableScorer::new(&[("P0", 0.9)])),
        Arc::new(FixedDrafter::new()),
    );

    // 记录内容已处于评分阶段，但显式阶段字段被调用方留在了初始值
    let mut record = RequestRecord::new(coral_settings(1, 1));
    record
        .papers
        .push(ScoredItem::unscored(article("P0", "abstract")));
    assert_eq!(record.stage, Stage::FindingLiterature);

    let (record, diag) = engine.single_step(record).await;

    assert!(diag.warnings.iter().any(|w| w.contains("不一致")));
    assert_eq!(record.papers[0].score, Some(0.9));
}

// ========== run_until_before ==========

#[tokio::test]
async fn test_run_until_before_stops_at_target_stage() {
    let engine = make_engine(
        Arc::new(FixedSearch {
            articles: vec![article("Reef heat stress", "thermal stress")],
        }),
        Arc::new(TableScorer::new(&[("Reef heat stress", 0.9)])),
        Arc::new(FixedDrafter::new()),
    );

    let record = RequestRecord::new(coral_settings(1, 1));
    let (record, diag) = engine
        .run_until_before(record, Stage::CreatingSurveyQuestions)
        .await;

    // 文献已找到并评分，但没有生成任何题目
    assert!(!diag.has_errors());
    assert_eq!(record.papers.len(), 1);
    assert!(record.papers.iter().all(|p| p.is_scored()));
    assert!(record.questions.is_empty());
    assert_eq!(record.stage, Stage::CreatingSurveyQuestions);
}
