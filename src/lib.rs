//! # Create Survey Questions
//!
//! 一个把文献调研请求逐步推进为问卷题目的步进引擎
//!
//! ## 架构设计
//!
//! 本系统采用严格的分层架构：
//!
//! ### ① 数据层（Models）
//! - `models/` - 请求记录、文献、题目、阶段、诊断信息
//! - 记录由调用方持有并在每次调用时重新提交，引擎跨调用无状态
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，以 trait 声明三个外部协作方
//! - `LiteratureSearch` - 文献搜索能力（OpenAlex / LLM）
//! - `RelevanceScorer` - 相关性评分能力（语义 / 关键词重叠）
//! - `QuestionDrafter` - 题目生成能力
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义每个阶段"一步工作"的处理器
//! - `LiteratureFinder` / `RelevanceFilter` / `QuestionGenerator` / `QuestionFormatter`
//! - 排空粒度由 `DrainPolicy` 统一控制
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/classifier` - 从记录内容派生当前阶段
//! - `orchestrator/stepper` - 单步 / 整段步进，聚合诊断
//! - `orchestrator/app` - 批量请求处理器，管理资源和并发
//!
//! ## 模块结构

pub mod config;
pub mod error;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{
    AnswerKind, AnswerOptions, Article, Diagnostics, RequestRecord, ScoredItem, Settings, Stage,
    SurveyQuestion, DEFAULT_RELEVANCE_THRESHOLD,
};
pub use orchestrator::{classify, App, EngineOptions, StageTransition, StepEngine};
pub use services::{
    Collaborators, LiteratureSearch, QuestionDrafter, RelevanceScorer, ScoreMode,
};
pub use workflow::DrainPolicy;
