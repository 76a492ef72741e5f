//! 辅导服务 - 业务能力层
//!
//! 接收一个类型化的请求（提示 / 对话 / 评分 / 期末评分），构建提示词，调用模型，
//! 需要结构化输出时交给 [`repair_grade_response`] 修复。
//! 不保存任何会话状态。

use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use crate::clients::{GenerateRequest, GenerativeModel, InlineImage};
use crate::error::{AppError, AppResult};
use crate::models::{ChatTurn, GradeVerdict};
use crate::services::prompts::{self, GradeInput};
use crate::services::response_repair::repair_grade_response;
use crate::services::retry::{generate_with_retry, RetryPolicy};

/// 请求类型，按 `action` 字段区分
#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "action", rename_all = "kebab-case")]
pub enum TutorAction {
    #[serde(rename_all = "camelCase")]
    Hint { question: String },
    #[serde(rename_all = "camelCase")]
    Chat {
        question: String,
        correct_option: String,
        explanation: String,
        #[serde(default)]
        history: Vec<ChatTurn>,
        user_message: String,
    },
    #[serde(rename_all = "camelCase")]
    Grade {
        question: String,
        selected_option: String,
        correct_option: String,
        reasoning: String,
        explanation: String,
    },
    #[serde(rename_all = "camelCase")]
    ExamGrade {
        question: String,
        #[serde(default)]
        image: Option<String>,
        #[serde(default)]
        text_answer: Option<String>,
    },
}

impl TutorAction {
    pub fn name(&self) -> &'static str {
        match self {
            TutorAction::Hint { .. } => "hint",
            TutorAction::Chat { .. } => "chat",
            TutorAction::Grade { .. } => "grade",
            TutorAction::ExamGrade { .. } => "exam-grade",
        }
    }

    fn question(&self) -> &str {
        match self {
            TutorAction::Hint { question }
            | TutorAction::Chat { question, .. }
            | TutorAction::Grade { question, .. }
            | TutorAction::ExamGrade { question, .. } => question,
        }
    }
}

/// 处理结果
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(untagged)]
pub enum TutorReply {
    /// 评分结果
    Verdict(GradeVerdict),
    /// 提示或对话回复
    Message { message: String },
    /// 期末题评语
    Feedback { feedback: String },
}

/// 辅导服务
///
/// 职责：
/// - 根据请求类型构建提示词
/// - 限流时按策略重试，其他错误直接返回
/// - 评分结果经过修复和校验
pub struct TutorService {
    model: Arc<dyn GenerativeModel>,
    retry_policy: RetryPolicy,
}

impl TutorService {
    /// 创建新的辅导服务
    pub fn new(model: Arc<dyn GenerativeModel>, retry_policy: RetryPolicy) -> Self {
        Self {
            model,
            retry_policy,
        }
    }

    /// 处理一个请求
    ///
    /// # 返回
    /// - 提示 / 对话 → `Message`
    /// - 评分 → `Verdict`
    /// - 期末评分 → `Feedback`
    pub async fn handle(&self, action: TutorAction) -> AppResult<TutorReply> {
        if action.question().trim().is_empty() {
            return Err(AppError::bad_request("question 不能为空"));
        }

        let name = action.name();
        info!("📨 处理请求: {}", name);

        let reply = match action {
            TutorAction::Hint { question } => {
                let text = self.call(name, GenerateRequest::text(prompts::hint_prompt(&question))).await?;
                TutorReply::Message { message: text }
            }
            TutorAction::Chat {
                question,
                correct_option,
                explanation,
                history,
                user_message,
            } => {
                if user_message.trim().is_empty() {
                    return Err(AppError::bad_request("userMessage 不能为空"));
                }
                let prompt = prompts::chat_prompt(
                    &question,
                    &correct_option,
                    &explanation,
                    &history,
                    &user_message,
                );
                let text = self.call(name, GenerateRequest::text(prompt)).await?;
                TutorReply::Message { message: text }
            }
            TutorAction::Grade {
                question,
                selected_option,
                correct_option,
                reasoning,
                explanation,
            } => {
                let prompt = prompts::grade_prompt(&GradeInput {
                    question: &question,
                    selected_option: &selected_option,
                    correct_option: &correct_option,
                    reasoning: &reasoning,
                    explanation: &explanation,
                });
                let raw = self.call(name, GenerateRequest::text(prompt)).await?;
                debug!("评分原始输出: {}", raw);
                TutorReply::Verdict(repair_grade_response(&raw)?)
            }
            TutorAction::ExamGrade {
                question,
                image,
                text_answer,
            } => {
                let image = image
                    .as_deref()
                    .filter(|s| !s.trim().is_empty())
                    .map(InlineImage::from_data_url)
                    .transpose()?;
                let prompt = prompts::exam_prompt(&question, text_answer.as_deref(), image.is_some());
                let text = self
                    .call(name, GenerateRequest::text(prompt).with_image(image))
                    .await?;
                TutorReply::Feedback { feedback: text }
            }
        };

        info!("✓ 请求完成: {}", name);
        Ok(reply)
    }

    async fn call(&self, label: &str, request: GenerateRequest) -> AppResult<String> {
        let text = generate_with_retry(self.model.as_ref(), &request, &self.retry_policy, label).await?;
        Ok(text.trim().to_string())
    }
}
