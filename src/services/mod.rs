//! 业务能力层
//!
//! 每个服务只描述"我能做什么"，只处理单个讲稿或单个请求，不关心流程顺序。

pub mod failure_log;
pub mod prompts;
pub mod response_repair;
pub mod retry;
pub mod tutor_service;

pub use failure_log::FailureLog;
pub use response_repair::{extract_json_object, repair_grade_response};
pub use retry::{generate_with_retry, RetryPolicy};
pub use tutor_service::{TutorAction, TutorReply, TutorService};
