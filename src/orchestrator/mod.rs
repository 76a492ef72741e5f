//! 编排层（Orchestration Layer）
//!
//! ## 职责
//!
//! 负责批量处理和调度，不做具体业务判断。
//!
//! ## 层次关系
//!
//! ```text
//! batch_processor (处理整个讲稿目录)
//!     ↓
//! workflow::LectureFlow (处理单个讲稿)
//!     ↓
//! services (能力层：retry / prompts / repair / failure log)
//!     ↓
//! clients (模型客户端：Gemini / OpenAI 兼容)
//! ```

pub mod batch_processor;

pub use batch_processor::{BatchExtractor, BatchSummary};
