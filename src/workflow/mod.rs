//! 流程层（Workflow）
//!
//! 每个阶段处理器定义"该阶段的一步工作"怎么做：
//!
//! - `LiteratureFinder` - 查找相关文献
//! - `RelevanceFilter` - 文献/题目相关性评分（两者共用同一套逐项逻辑）
//! - `QuestionGenerator` - 从相关文献生成问卷题目
//! - `QuestionFormatter` - 格式化并校验问卷题目
//!
//! 处理器只修改记录并向诊断信息报告警告/错误，绝不让失败向上传播。
//! 消耗多少待处理条目由 `DrainPolicy` 决定，逐项逻辑两种粒度完全一致。

pub mod find_literature;
pub mod format_questions;
pub mod generate_questions;
pub mod score_relevance;

pub use find_literature::LiteratureFinder;
pub use format_questions::QuestionFormatter;
pub use generate_questions::QuestionGenerator;
pub use score_relevance::RelevanceFilter;

/// 排空策略：一次处理调用消耗多少待处理条目
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DrainPolicy {
    /// 只处理一条
    OneItem,
    /// 排空当前阶段的全部待处理条目
    DrainStage,
}
