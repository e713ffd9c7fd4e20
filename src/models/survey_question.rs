//! 问卷题目数据模型

use serde::{Deserialize, Serialize};

/// 答案类型
///
/// 线上沿用历史接口的字符串标签（"Text" / "Multiple choice" / "Yes/No" / "Range"）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum AnswerKind {
    /// 自由文本
    Text,
    /// 多选
    #[serde(rename = "Multiple choice")]
    MultipleChoice,
    /// 是/否
    #[serde(rename = "Yes/No")]
    YesNo,
    /// 数值区间
    Range,
}

impl AnswerKind {
    /// 从协作方返回的标签解析答案类型，无法识别时返回 None
    pub fn parse_label(label: &str) -> Option<Self> {
        match label.trim().to_lowercase().as_str() {
            "text" | "text field" => Some(AnswerKind::Text),
            "multiple choice" | "multiple_choice" => Some(AnswerKind::MultipleChoice),
            "yes/no" | "yes_no" | "yesno" => Some(AnswerKind::YesNo),
            "range" => Some(AnswerKind::Range),
            _ => None,
        }
    }
}

/// 答案选项载荷，形状取决于答案类型
///
/// Text / Yes/No 不携带选项；多选为有序字符串列表；区间为两个数值边界。
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AnswerOptions {
    /// 多选题的候选项
    Choices(Vec<String>),
    /// 区间题的上下界 [low, high]
    Bounds([f64; 2]),
}

/// 一道问卷题目
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SurveyQuestion {
    /// 题干文本
    pub question: String,
    /// 答案类型（由生成协作方选定）
    pub answer_kind: AnswerKind,
    /// 选项载荷，是否存在取决于答案类型
    #[serde(default)]
    pub options: Option<AnswerOptions>,
    /// 是否已通过格式化处理（仅由格式化处理器置位）
    #[serde(default)]
    pub formatted: bool,
    /// 产生该题目的文献在 papers 序列中的下标
    #[serde(default)]
    pub source_paper: Option<usize>,
}

impl SurveyQuestion {
    /// 创建一道未格式化的草稿题目
    pub fn draft(question: impl Into<String>, answer_kind: AnswerKind) -> Self {
        Self {
            question: question.into(),
            answer_kind,
            options: None,
            formatted: false,
            source_paper: None,
        }
    }

    /// 带选项的草稿题目
    pub fn draft_with_options(
        question: impl Into<String>,
        answer_kind: AnswerKind,
        options: AnswerOptions,
    ) -> Self {
        Self {
            question: question.into(),
            answer_kind,
            options: Some(options),
            formatted: false,
            source_paper: None,
        }
    }
}
