//! HTTP 处理函数
//!
//! 所有失败都以 `{error, details}` 返回，状态码由错误类型决定。

use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use serde_json::Value;
use tracing::{error, warn};

use crate::api::server::AppContext;
use crate::config::API_KEY_ENV_VARS;
use crate::error::{AppError, ConfigError, FileError, LlmError, RequestError, ValidationError};
use crate::models::{list_lectures, load_lecture, LectureRecord, LectureSummary};
use crate::services::{TutorAction, TutorReply, TutorService};

#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub module: String,
    pub version: String,
}

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<String>,
}

/// 处理函数的错误类型
pub struct ApiError(AppError);

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        ApiError(err)
    }
}

impl ApiError {
    fn status_and_message(&self) -> (StatusCode, &'static str) {
        match &self.0 {
            AppError::Config(ConfigError::AuthMissing { .. }) => (
                StatusCode::SERVICE_UNAVAILABLE,
                "Model credential is not configured",
            ),
            AppError::Llm(LlmError::RateLimited { .. }) => (
                StatusCode::TOO_MANY_REQUESTS,
                "Model rate limit exceeded. Please try again later.",
            ),
            AppError::Llm(_) => (StatusCode::BAD_GATEWAY, "Model invocation failed"),
            AppError::Validation(ValidationError::ResponseFormat { .. }) => (
                StatusCode::BAD_GATEWAY,
                "AI response format error. Please try again.",
            ),
            AppError::Validation(ValidationError::InvalidStructure { .. }) => (
                StatusCode::BAD_GATEWAY,
                "AI response is missing required fields",
            ),
            AppError::Request(RequestError::BadRequest(_)) => {
                (StatusCode::BAD_REQUEST, "Bad request")
            }
            AppError::Request(RequestError::NotFound(_)) => (StatusCode::NOT_FOUND, "Not found"),
            _ => (StatusCode::INTERNAL_SERVER_ERROR, "Internal error"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = self.status_and_message();
        if status.is_server_error() {
            error!("请求失败 ({}): {}", status, self.0);
        } else {
            warn!("请求失败 ({}): {}", status, self.0);
        }

        let body = ErrorResponse {
            error: message.to_string(),
            details: Some(self.0.to_string()),
        };
        (status, Json(body)).into_response()
    }
}

type ApiResult<T> = Result<Json<T>, ApiError>;

/// GET /health
pub async fn health() -> Json<HealthResponse> {
    Json(HealthResponse {
        status: "healthy".to_string(),
        module: "study_companion".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

/// POST /api/grade
///
/// `action` 缺省为 `grade`。提示和对话返回 `{message}`，评分返回评分结果。
pub async fn grade(
    State(ctx): State<AppContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<TutorReply> {
    let mut value = json_body(body)?;
    if let Value::Object(map) = &mut value {
        map.entry("action")
            .or_insert_with(|| Value::String("grade".to_string()));
    }
    dispatch(&ctx, value).await
}

/// POST /api/grade-exam
///
/// 请求体 `{question, image?, textAnswer?}`，返回 `{feedback}`。
pub async fn grade_exam(
    State(ctx): State<AppContext>,
    body: Result<Json<Value>, JsonRejection>,
) -> ApiResult<TutorReply> {
    let mut value = json_body(body)?;
    if let Value::Object(map) = &mut value {
        map.insert("action".to_string(), Value::String("exam-grade".to_string()));
    }
    dispatch(&ctx, value).await
}

/// GET /api/classes
///
/// 输出目录还不存在时返回空列表。
pub async fn list_classes(State(ctx): State<AppContext>) -> ApiResult<Vec<LectureSummary>> {
    match list_lectures(&ctx.processed_dir).await {
        Ok(summaries) => Ok(Json(summaries)),
        Err(AppError::File(FileError::DirectoryNotFound { .. })) => Ok(Json(Vec::new())),
        Err(e) => Err(e.into()),
    }
}

/// GET /api/classes/:id
pub async fn get_class(
    State(ctx): State<AppContext>,
    Path(id): Path<String>,
) -> ApiResult<LectureRecord> {
    let record = load_lecture(&ctx.processed_dir, &id).await?;
    Ok(Json(record))
}

fn json_body(body: Result<Json<Value>, JsonRejection>) -> Result<Value, ApiError> {
    let Json(value) = body.map_err(|rejection| AppError::bad_request(rejection.body_text()))?;
    if !value.is_object() {
        return Err(AppError::bad_request("请求体必须是 JSON 对象").into());
    }
    Ok(value)
}

async fn dispatch(ctx: &AppContext, value: Value) -> ApiResult<TutorReply> {
    let action: TutorAction = serde_json::from_value(value)
        .map_err(|e| AppError::bad_request(format!("请求参数错误: {}", e)))?;
    let tutor = require_tutor(ctx)?;
    let reply = tutor.handle(action).await?;
    Ok(Json(reply))
}

fn require_tutor(ctx: &AppContext) -> Result<&Arc<TutorService>, ApiError> {
    ctx.tutor.as_ref().ok_or_else(|| {
        ApiError(AppError::Config(ConfigError::AuthMissing {
            var_names: API_KEY_ENV_VARS.iter().map(|s| s.to_string()).collect(),
        }))
    })
}
