//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 本层负责阶段派生、步进调度和批量处理，是整个系统的"指挥中心"。
//!
//! ## 模块划分
//!
//! ### `classifier` - 阶段分类器
//! - 从记录内容派生当前阶段（全函数，规则互斥且完备）
//! - 把不变量违反报告为缺陷错误
//!
//! ### `stepper` - 步进控制器
//! - 单步 / 整段步进两种粒度，共用同一分发逻辑
//! - 聚合一次调用内的全部诊断
//! - 维护记录的显式阶段字段
//!
//! ### `app` - 批量请求处理器
//! - 批量加载请求（Vec<LoadedRequest>）
//! - 控制并发数量（Semaphore）
//! - 逐段驱动每个请求直到完成
//! - 输出全局统计信息
//!
//! ## 层次关系
//!
//! ```text
//! app (处理 Vec<LoadedRequest>)
//!     ↓
//! stepper (推进单个 RequestRecord)
//!     ↓
//! workflow (各阶段处理器)
//!     ↓
//! services (能力层：search / score / draft)
//! ```
//!
//! ## 设计原则
//!
//! 1. **单一职责**：app 管批量，stepper 管单个记录
//! 2. **向下依赖**：编排层 → workflow → services
//! 3. **失败不外泄**：处理器失败全部化为诊断条目

pub mod app;
pub mod classifier;
pub mod stepper;

// 重新导出主要类型
pub use app::App;
pub use classifier::classify;
pub use stepper::{EngineOptions, StageTransition, StepEngine};
