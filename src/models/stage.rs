//! 请求阶段枚举
//!
//! 表示一个请求在流水线中所处的阶段。
//! 数值之间留有空隙，以便将来在不重新编号的情况下插入子阶段。

use serde::{Deserialize, Serialize};
use std::fmt;

/// 请求阶段
///
/// 各阶段按数值全序排列，线上始终以整数传输（100/200/300/400/500/999）。
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(into = "u16", try_from = "u16")]
pub enum Stage {
    /// 查找相关文献
    FindingLiterature = 100,
    /// 检查文献相关性
    CheckingLiteratureRelevance = 200,
    /// 生成问卷题目
    CreatingSurveyQuestions = 300,
    /// 检查题目相关性
    CheckingQuestionRelevance = 400,
    /// 格式化问卷题目
    FormattingSurveyQuestions = 500,
    /// 全部完成
    Finished = 999,
}

impl Stage {
    /// 返回线上传输用的整数编码
    pub fn code(self) -> u16 {
        self as u16
    }

    /// 从整数编码还原阶段
    pub fn from_code(code: u16) -> Option<Self> {
        match code {
            100 => Some(Stage::FindingLiterature),
            200 => Some(Stage::CheckingLiteratureRelevance),
            300 => Some(Stage::CreatingSurveyQuestions),
            400 => Some(Stage::CheckingQuestionRelevance),
            500 => Some(Stage::FormattingSurveyQuestions),
            999 => Some(Stage::Finished),
            _ => None,
        }
    }

    /// 流水线中的静态后继阶段（Finished 的后继仍是 Finished）
    pub fn successor(self) -> Self {
        match self {
            Stage::FindingLiterature => Stage::CheckingLiteratureRelevance,
            Stage::CheckingLiteratureRelevance => Stage::CreatingSurveyQuestions,
            Stage::CreatingSurveyQuestions => Stage::CheckingQuestionRelevance,
            Stage::CheckingQuestionRelevance => Stage::FormattingSurveyQuestions,
            Stage::FormattingSurveyQuestions => Stage::Finished,
            Stage::Finished => Stage::Finished,
        }
    }

    /// 日志显示用的阶段名称
    pub fn label(self) -> &'static str {
        match self {
            Stage::FindingLiterature => "查找相关文献",
            Stage::CheckingLiteratureRelevance => "检查文献相关性",
            Stage::CreatingSurveyQuestions => "生成问卷题目",
            Stage::CheckingQuestionRelevance => "检查题目相关性",
            Stage::FormattingSurveyQuestions => "格式化问卷题目",
            Stage::Finished => "已完成",
        }
    }
}

impl Default for Stage {
    fn default() -> Self {
        Stage::FindingLiterature
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}({})", self.label(), self.code())
    }
}

impl From<Stage> for u16 {
    fn from(stage: Stage) -> u16 {
        stage.code()
    }
}

impl TryFrom<u16> for Stage {
    type Error = String;

    fn try_from(code: u16) -> Result<Self, Self::Error> {
        Stage::from_code(code).ok_or_else(|| format!("未知的阶段编码: {}", code))
    }
}
