//! 阶段分类器 - 编排层
//!
//! 从记录内容派生当前阶段。规则按序求值，首个命中者生效，
//! 因此规则之间互斥，且对正确引擎能产生的所有状态完备。
//!
//! 记录自身不满足不变量（如超出上限）不是一种分类结果，
//! 而是引擎内部缺陷，以错误形式向上报告。

use crate::models::{RecordDefect, RequestRecord, Stage};

/// 从记录内容派生阶段
///
/// threshold 为相关性阈值：所有文献评分完成后，只有存在分数
/// 严格高于阈值的文献才会进入题目生成；否则请求直接结束，
/// 因为永远不可能产生任何题目。
pub fn classify(record: &RequestRecord, threshold: f64) -> Result<Stage, RecordDefect> {
    record.validate()?;

    // 规则 1：没有任何文献 → 查找文献
    if record.papers.is_empty() {
        return Ok(Stage::FindingLiterature);
    }

    // 规则 2：存在未评分的文献 → 文献评分
    if !record.all_papers_scored() {
        return Ok(Stage::CheckingLiteratureRelevance);
    }

    // 规则 3：没有相关文献且尚无题目 → 直接结束
    if record.relevant_paper_indices(threshold).is_empty() && record.questions.is_empty() {
        return Ok(Stage::Finished);
    }

    // 规则 4：存在相关但尚未产生题目的文献，且未达全局上限 → 生成题目
    // （先于题目评分判断，保证逐篇生成的中间状态仍归入生成阶段）
    if !record.papers_awaiting_questions(threshold).is_empty()
        && record.questions.len() < record.question_cap()
    {
        return Ok(Stage::CreatingSurveyQuestions);
    }

    // 规则 5：存在未评分的题目 → 题目评分
    if !record.all_questions_scored() {
        return Ok(Stage::CheckingQuestionRelevance);
    }

    // 规则 6：存在未格式化的题目 → 格式化
    if !record.all_questions_formatted() {
        return Ok(Stage::FormattingSurveyQuestions);
    }

    // 规则 7：全部完成
    Ok(Stage::Finished)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{
        AnswerKind, Article, ScoredItem, Settings, SurveyQuestion, DEFAULT_RELEVANCE_THRESHOLD,
    };

    fn article(title: &str) -> Article {
        Article {
            title: Some(title.to_string()),
            author: None,
            abstract_text: None,
            url: None,
        }
    }

    fn scored_paper(title: &str, score: f64) -> ScoredItem<Article> {
        ScoredItem {
            item: article(title),
            score: Some(score),
        }
    }

    fn question(source: usize, score: Option<f64>, formatted: bool) -> ScoredItem<SurveyQuestion> {
        let mut q = SurveyQuestion::draft("Q?", AnswerKind::Text);
        q.source_paper = Some(source);
        q.formatted = formatted;
        ScoredItem { item: q, score }
    }

    fn base_record() -> RequestRecord {
        RequestRecord::new(Settings::new("coral bleaching"))
    }

    #[test]
    fn test_empty_papers_always_finding_literature() {
        let record = base_record();
        assert_eq!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD).unwrap(),
            Stage::FindingLiterature
        );
    }

    #[test]
    fn test_unscored_paper_means_literature_relevance() {
        let mut record = base_record();
        record.papers.push(scored_paper("a", 0.9));
        record.papers.push(ScoredItem::unscored(article("b")));
        assert_eq!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD).unwrap(),
            Stage::CheckingLiteratureRelevance
        );
    }

    #[test]
    fn test_no_relevant_papers_finishes_immediately() {
        let mut record = base_record();
        record.papers.push(scored_paper("a", 0.2));
        record.papers.push(scored_paper("b", 0.4));
        assert_eq!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD).unwrap(),
            Stage::Finished
        );
    }

    #[test]
    fn test_score_equal_to_threshold_is_not_relevant() {
        // 阈值要求严格高于
        let mut record = base_record();
        record.papers.push(scored_paper("a", 0.5));
        assert_eq!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD).unwrap(),
            Stage::Finished
        );
    }

    #[test]
    fn test_relevant_paper_without_questions_means_generation() {
        let mut record = base_record();
        record.papers.push(scored_paper("a", 0.9));
        assert_eq!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD).unwrap(),
            Stage::CreatingSurveyQuestions
        );
    }

    #[test]
    fn test_partial_generation_stays_in_generation_stage() {
        // 第一篇已有题目（未评分），第二篇相关但还没有题目：
        // 仍处于生成阶段，而不是题目评分阶段
        let mut record = base_record();
        record.papers.push(scored_paper("a", 0.9));
        record.papers.push(scored_paper("b", 0.8));
        record.questions.push(question(0, None, false));
        assert_eq!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD).unwrap(),
            Stage::CreatingSurveyQuestions
        );
    }

    #[test]
    fn test_unscored_questions_mean_question_relevance() {
        let mut record = base_record();
        record.papers.push(scored_paper("a", 0.9));
        record.questions.push(question(0, None, false));
        assert_eq!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD).unwrap(),
            Stage::CheckingQuestionRelevance
        );
    }

    #[test]
    fn test_scored_unformatted_questions_mean_formatting() {
        let mut record = base_record();
        record.papers.push(scored_paper("a", 0.9));
        record.questions.push(question(0, Some(0.7), false));
        assert_eq!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD).unwrap(),
            Stage::FormattingSurveyQuestions
        );
    }

    #[test]
    fn test_all_formatted_means_finished() {
        let mut record = base_record();
        record.papers.push(scored_paper("a", 0.9));
        record.questions.push(question(0, Some(0.7), true));
        assert_eq!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD).unwrap(),
            Stage::Finished
        );
    }

    #[test]
    fn test_paper_limit_exceeded_is_a_defect() {
        let mut record = base_record();
        record.settings.paper_limit = 1;
        record.papers.push(scored_paper("a", 0.9));
        record.papers.push(scored_paper("b", 0.9));
        assert!(matches!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD),
            Err(RecordDefect::PaperLimitExceeded { .. })
        ));
    }

    #[test]
    fn test_out_of_range_score_is_a_defect() {
        let mut record = base_record();
        record.papers.push(scored_paper("a", 1.5));
        assert!(matches!(
            classify(&record, DEFAULT_RELEVANCE_THRESHOLD),
            Err(RecordDefect::PaperScoreOutOfRange { .. })
        ));
    }
}
