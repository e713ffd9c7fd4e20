//! 请求记录
//!
//! 记录一次问卷生成请求的全部进度。引擎在两次调用之间不保存任何状态，
//! 记录由调用方持有并在每次调用时重新提交。

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::models::article::Article;
use crate::models::scored::ScoredItem;
use crate::models::stage::Stage;
use crate::models::survey_question::SurveyQuestion;

/// 默认相关性阈值，分数严格高于该值的条目视为相关
pub const DEFAULT_RELEVANCE_THRESHOLD: f64 = 0.5;

/// 请求设置，在请求的生命周期内不变
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Settings {
    /// 问卷所围绕的研究问题
    pub research_question: String,
    /// 用于生成问卷的文献数量上限
    #[serde(default = "default_paper_limit")]
    pub paper_limit: usize,
    /// 每篇文献生成的题目数量
    #[serde(default = "default_questions_per_article")]
    pub questions_per_article: usize,
    /// 评分时是否使用语义相似度（否则使用关键词重叠）
    #[serde(default = "default_semantic_search")]
    pub semantic_search: bool,
}

fn default_paper_limit() -> usize {
    5
}

fn default_questions_per_article() -> usize {
    3
}

fn default_semantic_search() -> bool {
    true
}

impl Settings {
    /// 以默认上限创建设置
    pub fn new(research_question: impl Into<String>) -> Self {
        Self {
            research_question: research_question.into(),
            paper_limit: default_paper_limit(),
            questions_per_article: default_questions_per_article(),
            semantic_search: default_semantic_search(),
        }
    }
}

/// 记录自身不满足不变量时的缺陷
///
/// 缺陷不是一种阶段分类结果，而是引擎内部错误的信号。
#[derive(Debug, Error, PartialEq)]
pub enum RecordDefect {
    #[error("文献数量 {count} 超过上限 {limit}")]
    PaperLimitExceeded { count: usize, limit: usize },
    #[error("题目数量 {count} 超过上限 {cap}")]
    QuestionCapExceeded { count: usize, cap: usize },
    #[error("文献 {index} 的分数 {score} 不在 [0,1] 区间内")]
    PaperScoreOutOfRange { index: usize, score: f64 },
    #[error("题目 {index} 的分数 {score} 不在 [0,1] 区间内")]
    QuestionScoreOutOfRange { index: usize, score: f64 },
    #[error("设置非法: {reason}")]
    InvalidSettings { reason: String },
}

/// 一次请求的完整进度记录
///
/// papers 与 questions 的插入顺序有意义，处理过程中绝不重排。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestRecord {
    /// 文献序列及其相关性分数
    #[serde(default)]
    pub papers: Vec<ScoredItem<Article>>,
    /// 题目序列及其相关性分数
    #[serde(default)]
    pub questions: Vec<ScoredItem<SurveyQuestion>>,
    /// 请求设置
    pub settings: Settings,
    /// 可选的 trace 文件引用，引擎不解释其内容
    #[serde(default)]
    pub trace_file: Option<String>,
    /// 显式阶段字段，仅由步进控制器更新；派生分类用作一致性检查
    #[serde(default)]
    pub stage: Stage,
}

impl RequestRecord {
    /// 以空的文献与题目序列创建记录
    pub fn new(settings: Settings) -> Self {
        Self {
            papers: Vec::new(),
            questions: Vec::new(),
            settings,
            trace_file: None,
            stage: Stage::default(),
        }
    }

    /// 题目总数的全局上限
    pub fn question_cap(&self) -> usize {
        self.settings.paper_limit * self.settings.questions_per_article
    }

    /// 尚未评分的文献下标，按插入顺序
    pub fn unscored_paper_indices(&self) -> Vec<usize> {
        self.papers
            .iter()
            .enumerate()
            .filter(|(_, p)| !p.is_scored())
            .map(|(i, _)| i)
            .collect()
    }

    /// 尚未评分的题目下标，按插入顺序
    pub fn unscored_question_indices(&self) -> Vec<usize> {
        self.questions
            .iter()
            .enumerate()
            .filter(|(_, q)| !q.is_scored())
            .map(|(i, _)| i)
            .collect()
    }

    /// 分数严格高于阈值的文献下标
    pub fn relevant_paper_indices(&self, threshold: f64) -> Vec<usize> {
        self.papers
            .iter()
            .enumerate()
            .filter(|(_, p)| p.exceeds(threshold))
            .map(|(i, _)| i)
            .collect()
    }

    /// 相关且尚未产生任何题目的文献下标
    pub fn papers_awaiting_questions(&self, threshold: f64) -> Vec<usize> {
        self.relevant_paper_indices(threshold)
            .into_iter()
            .filter(|&i| {
                !self
                    .questions
                    .iter()
                    .any(|q| q.item.source_paper == Some(i))
            })
            .collect()
    }

    /// 所有文献是否都已评分（空序列视为否，由分类器单独处理）
    pub fn all_papers_scored(&self) -> bool {
        self.papers.iter().all(|p| p.is_scored())
    }

    /// 所有题目是否都已评分
    pub fn all_questions_scored(&self) -> bool {
        self.questions.iter().all(|q| q.is_scored())
    }

    /// 所有题目是否都已格式化
    pub fn all_questions_formatted(&self) -> bool {
        self.questions.iter().all(|q| q.item.formatted)
    }

    /// 校验记录不变量，违反时返回缺陷
    pub fn validate(&self) -> Result<(), RecordDefect> {
        if self.settings.paper_limit == 0 {
            return Err(RecordDefect::InvalidSettings {
                reason: "paper_limit 必须为正整数".to_string(),
            });
        }
        if self.settings.questions_per_article == 0 {
            return Err(RecordDefect::InvalidSettings {
                reason: "questions_per_article 必须为正整数".to_string(),
            });
        }
        if self.papers.len() > self.settings.paper_limit {
            return Err(RecordDefect::PaperLimitExceeded {
                count: self.papers.len(),
                limit: self.settings.paper_limit,
            });
        }
        if self.questions.len() > self.question_cap() {
            return Err(RecordDefect::QuestionCapExceeded {
                count: self.questions.len(),
                cap: self.question_cap(),
            });
        }
        for (i, paper) in self.papers.iter().enumerate() {
            if let Some(score) = paper.score {
                if !(0.0..=1.0).contains(&score) {
                    return Err(RecordDefect::PaperScoreOutOfRange { index: i, score });
                }
            }
        }
        for (i, question) in self.questions.iter().enumerate() {
            if let Some(score) = question.score {
                if !(0.0..=1.0).contains(&score) {
                    return Err(RecordDefect::QuestionScoreOutOfRange { index: i, score });
                }
            }
        }
        Ok(())
    }

    /// 进度指纹：用于判断一次处理是否取得了任何进展
    ///
    /// 各分量只增不减，指纹不变即说明记录没有向前推进。
    pub fn progress_fingerprint(&self) -> (usize, usize, usize, usize, usize) {
        (
            self.papers.len(),
            self.papers.iter().filter(|p| p.is_scored()).count(),
            self.questions.len(),
            self.questions.iter().filter(|q| q.is_scored()).count(),
            self.questions.iter().filter(|q| q.item.formatted).count(),
        )
    }
}
