//! 远程模型客户端
//!
//! 所有模型都只暴露一个能力：给定提示词（可附带一张图片和输出结构约束），返回文本。
//! 上层只依赖 [`GenerativeModel`]，具体实现在启动时构造一次后注入。

pub mod gemini_client;
pub mod mock;
pub mod openai_client;

use std::sync::Arc;

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use serde_json::Value;

use crate::config::{Config, LlmProvider};
use crate::error::{AppResult, LlmError, RequestError};

pub use gemini_client::GeminiClient;
pub use mock::ScriptedModel;
pub use openai_client::OpenAiClient;

/// 一次生成请求
#[derive(Debug, Clone, Default)]
pub struct GenerateRequest {
    pub prompt: String,
    pub image: Option<InlineImage>,
    /// 要求模型输出符合该结构的 JSON
    pub response_schema: Option<Value>,
}

impl GenerateRequest {
    pub fn text(prompt: impl Into<String>) -> Self {
        Self {
            prompt: prompt.into(),
            ..Default::default()
        }
    }

    pub fn with_image(mut self, image: Option<InlineImage>) -> Self {
        self.image = image;
        self
    }

    pub fn with_schema(mut self, schema: Value) -> Self {
        self.response_schema = Some(schema);
        self
    }
}

/// 随提示词一起发送的图片
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InlineImage {
    pub mime_type: String,
    pub data: Vec<u8>,
}

impl InlineImage {
    pub const DEFAULT_MIME_TYPE: &'static str = "image/jpeg";

    /// 解析 `data:image/png;base64,...` 或裸 base64 字符串
    pub fn from_data_url(input: &str) -> AppResult<Self> {
        let input = input.trim();
        let (mime_type, payload) = match input.strip_prefix("data:") {
            Some(rest) => {
                let (meta, payload) = rest.split_once(',').ok_or_else(|| {
                    RequestError::BadRequest("图片 data URL 缺少 ',' 分隔符".to_string())
                })?;
                let mime = meta
                    .strip_suffix(";base64")
                    .filter(|m| !m.is_empty())
                    .unwrap_or(Self::DEFAULT_MIME_TYPE);
                (mime.to_string(), payload)
            }
            None => (Self::DEFAULT_MIME_TYPE.to_string(), input),
        };

        let data = STANDARD
            .decode(payload.trim())
            .map_err(|e| RequestError::BadRequest(format!("图片 base64 解码失败: {}", e)))?;
        if data.is_empty() {
            return Err(RequestError::BadRequest("图片内容为空".to_string()).into());
        }

        Ok(Self { mime_type, data })
    }

    pub fn to_base64(&self) -> String {
        STANDARD.encode(&self.data)
    }

    pub fn to_data_url(&self) -> String {
        format!("data:{};base64,{}", self.mime_type, self.to_base64())
    }
}

/// 远程生成能力
#[async_trait]
pub trait GenerativeModel: Send + Sync {
    /// 模型名称（用于日志和错误信息）
    fn model_name(&self) -> &str;

    /// 生成文本；限流必须返回 [`LlmError::RateLimited`]
    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError>;
}

/// 根据配置构造模型客户端
///
/// 凭证缺失时返回 `AuthMissing`。
pub fn build_model(config: &Config) -> AppResult<Arc<dyn GenerativeModel>> {
    let api_key = config.require_api_key()?;
    let model: Arc<dyn GenerativeModel> = match config.llm_provider {
        LlmProvider::Gemini => Arc::new(GeminiClient::new(
            api_key,
            config.llm_api_base_url.as_deref(),
            &config.llm_model_name,
            config.request_timeout(),
        )?),
        LlmProvider::OpenAi => Arc::new(OpenAiClient::new(
            api_key,
            config.llm_api_base_url.as_deref(),
            &config.llm_model_name,
        )),
    };
    Ok(model)
}

/// 从错误文本判断是否为限流
///
/// 用于无法拿到 HTTP 状态码的客户端。
pub(crate) fn looks_rate_limited(message: &str) -> bool {
    let lower = message.to_ascii_lowercase();
    contains_status_429(&lower)
        || lower.contains("rate limit")
        || lower.contains("rate_limit")
        || lower.contains("resource_exhausted")
        || lower.contains("too many requests")
}

/// `429` 作为独立的数字出现（不是 `4290` 或 id 的一部分）
fn contains_status_429(text: &str) -> bool {
    text.match_indices("429").any(|(start, _)| {
        let before = text[..start].chars().next_back();
        let after = text[start + 3..].chars().next();
        !before.is_some_and(|c| c.is_ascii_alphanumeric())
            && !after.is_some_and(|c| c.is_ascii_alphanumeric())
    })
}
