//! 题目格式化处理器 - 流程层
//!
//! 只在"格式化问卷题目"阶段运行。纯本地处理，不调用任何协作方：
//! 规范化题干文本（去首尾空白、折叠连续空白），并按答案类型校验
//! 选项载荷。
//!
//! 单道题目格式非法只产生该题的错误并保持未格式化状态，
//! 不会中止整批处理。

use std::collections::HashSet;

use regex::Regex;
use tracing::{debug, info};

use crate::models::{AnswerKind, AnswerOptions, Diagnostics, RequestRecord, SurveyQuestion};
use crate::utils::logging::truncate_text;
use crate::workflow::DrainPolicy;

/// 题目格式化处理器
pub struct QuestionFormatter {
    whitespace: Regex,
}

impl QuestionFormatter {
    pub fn new() -> Self {
        Self {
            whitespace: Regex::new(r"\s+").expect("空白正则应当合法"),
        }
    }

    /// 格式化尚未处理的题目
    pub fn run(&self, record: &mut RequestRecord, policy: DrainPolicy, diag: &mut Diagnostics) {
        let mut indices: Vec<usize> = record
            .questions
            .iter()
            .enumerate()
            .filter(|(_, q)| !q.item.formatted)
            .map(|(i, _)| i)
            .collect();

        if let DrainPolicy::OneItem = policy {
            indices.truncate(1);
        }

        if indices.is_empty() {
            return;
        }

        info!("📝 正在格式化 {} 道题目...", indices.len());

        let mut formatted = 0usize;
        for index in indices {
            let question = &mut record.questions[index].item;
            let normalized = self.normalize_text(&question.question);

            match validate_options(&normalized, question) {
                Ok(()) => {
                    question.question = normalized;
                    question.formatted = true;
                    formatted += 1;
                    debug!("题目 {} 格式化完成", index + 1);
                }
                Err(reason) => {
                    // 题目保持未格式化，等待重试或人工修正
                    diag.add_error(format!(
                        "题目 {} 格式非法: {}: {}",
                        index + 1,
                        reason,
                        truncate_text(&question.question, 40)
                    ));
                }
            }
        }

        info!("✓ 本次格式化 {} 道题目", formatted);
    }

    /// 规范化题干文本：去首尾空白，连续空白折叠为单个空格
    fn normalize_text(&self, text: &str) -> String {
        self.whitespace.replace_all(text.trim(), " ").into_owned()
    }
}

impl Default for QuestionFormatter {
    fn default() -> Self {
        Self::new()
    }
}

/// 按答案类型校验选项载荷
fn validate_options(normalized_text: &str, question: &SurveyQuestion) -> Result<(), String> {
    if normalized_text.is_empty() {
        return Err("题干为空".to_string());
    }

    match (question.answer_kind, &question.options) {
        // Text / Yes/No 不携带选项
        (AnswerKind::Text, None) | (AnswerKind::YesNo, None) => Ok(()),
        (AnswerKind::Text, Some(_)) | (AnswerKind::YesNo, Some(_)) => {
            Err("该答案类型不应携带选项".to_string())
        }

        (AnswerKind::MultipleChoice, Some(AnswerOptions::Choices(choices))) => {
            if choices.is_empty() {
                return Err("多选题选项列表为空".to_string());
            }
            if choices.iter().any(|c| c.trim().is_empty()) {
                return Err("多选题包含空白选项".to_string());
            }
            let distinct: HashSet<&str> = choices.iter().map(|c| c.as_str()).collect();
            if distinct.len() != choices.len() {
                return Err("多选题选项重复".to_string());
            }
            Ok(())
        }
        (AnswerKind::MultipleChoice, _) => Err("多选题缺少选项列表".to_string()),

        (AnswerKind::Range, Some(AnswerOptions::Bounds([low, high]))) => {
            if !low.is_finite() || !high.is_finite() {
                return Err("区间边界不是有限数值".to_string());
            }
            if low > high {
                return Err(format!("区间下界 {} 大于上界 {}", low, high));
            }
            Ok(())
        }
        (AnswerKind::Range, _) => Err("区间题缺少上下界".to_string()),
    }
}
