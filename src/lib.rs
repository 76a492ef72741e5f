//! # Study Companion
//!
//! 把课堂讲稿变成结构化学习笔记，并提供基于大模型的辅导接口
//!
//! ## 架构设计
//!
//! 本系统采用分层架构：
//!
//! ### ① 客户端层（Clients）
//! - `clients/` - 远程模型，只暴露"给提示词、返回文本"这一能力
//! - `GeminiClient` - Gemini 原生 REST 接口（默认）
//! - `OpenAiClient` - 兼容 OpenAI API 的服务
//!
//! ### ② 业务能力层（Services）
//! - `services/` - 描述"我能做什么"，只处理单个讲稿或单个请求
//! - `retry` - 限流重试
//! - `response_repair` - 修复模型输出中的 JSON
//! - `TutorService` - 提示 / 对话 / 评分 / 期末评分
//! - `FailureLog` - 写失败记录
//!
//! ### ③ 流程层（Workflow）
//! - `workflow/` - 定义"一个讲稿"的完整处理流程
//! - `LectureCtx` - 上下文封装（文件名 + 序号 + 输出路径）
//! - `LectureFlow` - 流程编排（跳过 → 读取 → 调用模型 → 校验 → 写入）
//!
//! ### ④ 编排层（Orchestration）
//! - `orchestrator/batch_processor` - 批量讲稿处理器，顺序处理并汇总统计
//! - `api/` - HTTP 服务，把请求交给 `TutorService` 或讲义目录
//!
//! ## 模块结构

pub mod api;
pub mod clients;
pub mod config;
pub mod error;
pub mod logger;
pub mod models;
pub mod orchestrator;
pub mod services;
pub mod utils;
pub mod workflow;

// 重新导出常用类型
pub use clients::{build_model, GenerateRequest, GenerativeModel};
pub use config::Config;
pub use error::{AppError, AppResult};
pub use models::{GradeVerdict, LectureRecord};
pub use orchestrator::{BatchExtractor, BatchSummary};
pub use services::{TutorAction, TutorReply, TutorService};
pub use workflow::{LectureCtx, LectureFlow, ProcessResult};
