//! Gemini 原生 REST 客户端
//!
//! - `POST {base}/v1beta/models/{model}:generateContent`：生成内容，支持 `responseSchema` 和 `inlineData`
//! - `GET {base}/v1beta/models`：列出凭证可用的模型

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::clients::{GenerateRequest, GenerativeModel};
use crate::error::{AppError, AppResult, LlmError};

pub const DEFAULT_BASE_URL: &str = "https://generativelanguage.googleapis.com";

/// Gemini 客户端
pub struct GeminiClient {
    http: reqwest::Client,
    api_key: String,
    base_url: String,
    model_name: String,
    timeout: Duration,
}

impl GeminiClient {
    /// 创建新的 Gemini 客户端
    pub fn new(
        api_key: &str,
        base_url: Option<&str>,
        model_name: &str,
        timeout: Duration,
    ) -> AppResult<Self> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| AppError::Other(format!("无法创建 HTTP 客户端: {}", e)))?;

        Ok(Self {
            http,
            api_key: api_key.to_string(),
            base_url: base_url
                .unwrap_or(DEFAULT_BASE_URL)
                .trim_end_matches('/')
                .to_string(),
            model_name: model_name.trim_start_matches("models/").to_string(),
            timeout,
        })
    }

    fn generate_url(&self) -> String {
        format!(
            "{}/v1beta/models/{}:generateContent",
            self.base_url, self.model_name
        )
    }

    /// 构建 generateContent 请求体
    fn build_body(request: &GenerateRequest) -> Value {
        let mut parts = vec![json!({ "text": request.prompt })];
        if let Some(image) = &request.image {
            parts.push(json!({
                "inlineData": {
                    "mimeType": image.mime_type,
                    "data": image.to_base64(),
                }
            }));
        }

        let mut body = json!({
            "contents": [{ "role": "user", "parts": parts }],
        });
        if let Some(schema) = &request.response_schema {
            body["generationConfig"] = json!({
                "responseMimeType": "application/json",
                "responseSchema": schema,
            });
        }
        body
    }

    /// 从响应中拼接第一个候选的全部文本片段
    fn extract_text(response: &GenerateContentResponse) -> Option<String> {
        let candidate = response.candidates.first()?;
        let text: String = candidate
            .content
            .as_ref()?
            .parts
            .iter()
            .filter_map(|p| p.text.as_deref())
            .collect();
        if text.trim().is_empty() {
            None
        } else {
            Some(text)
        }
    }

    /// 列出可用模型
    pub async fn list_models(&self) -> Result<Vec<ModelInfo>, LlmError> {
        let url = format!("{}/v1beta/models", self.base_url);
        let response = self
            .http
            .get(&url)
            .header("x-goog-api-key", &self.api_key)
            .query(&[("pageSize", "1000")])
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let response = self.check_status(response).await?;
        let list: ListModelsResponse = response.json().await.map_err(|e| LlmError::ApiCallFailed {
            model: self.model_name.clone(),
            message: format!("无法解析模型列表: {}", e),
        })?;
        Ok(list.models)
    }

    fn transport_error(&self, e: reqwest::Error) -> LlmError {
        if e.is_timeout() {
            LlmError::Timeout {
                model: self.model_name.clone(),
                secs: self.timeout.as_secs(),
            }
        } else {
            LlmError::ApiCallFailed {
                model: self.model_name.clone(),
                message: e.without_url().to_string(),
            }
        }
    }

    async fn check_status(&self, response: reqwest::Response) -> Result<reqwest::Response, LlmError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let retry_after = response
            .headers()
            .get(reqwest::header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.parse::<u64>().ok());
        let body = response.text().await.unwrap_or_default();

        if status.as_u16() == 429 {
            warn!("Gemini 限流 (模型: {})", self.model_name);
            return Err(LlmError::RateLimited {
                model: self.model_name.clone(),
                message: format!("HTTP {}: {}", status, body),
                retry_after,
            });
        }

        Err(LlmError::ApiCallFailed {
            model: self.model_name.clone(),
            message: format!("HTTP {}: {}", status, body),
        })
    }
}

#[async_trait]
impl GenerativeModel for GeminiClient {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        debug!("调用 Gemini API，模型: {}", self.model_name);
        debug!("提示词长度: {} 字符", request.prompt.len());

        let body = Self::build_body(&request);
        let response = self
            .http
            .post(self.generate_url())
            .header("x-goog-api-key", &self.api_key)
            .json(&body)
            .send()
            .await
            .map_err(|e| self.transport_error(e))?;

        let response = self.check_status(response).await?;
        let parsed: GenerateContentResponse =
            response.json().await.map_err(|e| LlmError::ApiCallFailed {
                model: self.model_name.clone(),
                message: format!("无法解析响应: {}", e),
            })?;

        debug!("Gemini API 调用成功");

        Self::extract_text(&parsed)
            .map(|t| t.trim().to_string())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })
    }
}

// ========== 响应结构 ==========

#[derive(Debug, Deserialize)]
struct GenerateContentResponse {
    #[serde(default)]
    candidates: Vec<Candidate>,
}

#[derive(Debug, Deserialize)]
struct Candidate {
    content: Option<Content>,
}

#[derive(Debug, Deserialize)]
struct Content {
    #[serde(default)]
    parts: Vec<Part>,
}

#[derive(Debug, Deserialize)]
struct Part {
    text: Option<String>,
}

#[derive(Debug, Deserialize)]
struct ListModelsResponse {
    #[serde(default)]
    models: Vec<ModelInfo>,
}

/// 模型目录条目
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ModelInfo {
    pub name: String,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub supported_generation_methods: Vec<String>,
    #[serde(default)]
    pub input_token_limit: Option<u64>,
    #[serde(default)]
    pub output_token_limit: Option<u64>,
}

impl ModelInfo {
    /// 去掉 `models/` 前缀后的模型 id
    pub fn model_id(&self) -> &str {
        self.name.trim_start_matches("models/")
    }

    pub fn supports_generate_content(&self) -> bool {
        self.supported_generation_methods
            .iter()
            .any(|m| m == "generateContent")
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::clients::InlineImage;

    #[test]
    fn test_body_with_schema_and_image() {
        let request = GenerateRequest::text("grade this")
            .with_image(Some(InlineImage {
                mime_type: "image/png".to_string(),
                data: b"hello".to_vec(),
            }))
            .with_schema(json!({"type": "OBJECT"}));

        let body = GeminiClient::build_body(&request);
        let parts = &body["contents"][0]["parts"];
        assert_eq!(parts[0]["text"], "grade this");
        assert_eq!(parts[1]["inlineData"]["mimeType"], "image/png");
        assert_eq!(parts[1]["inlineData"]["data"], "aGVsbG8=");
        assert_eq!(body["generationConfig"]["responseMimeType"], "application/json");
    }

    #[test]
    fn test_plain_body_has_no_generation_config() {
        let body = GeminiClient::build_body(&GenerateRequest::text("hi"));
        assert!(body.get("generationConfig").is_none());
        assert_eq!(body["contents"][0]["parts"].as_array().unwrap().len(), 1);
    }

    #[test]
    fn test_extract_text_joins_parts() {
        let response: GenerateContentResponse = serde_json::from_value(json!({
            "candidates": [{ "content": { "parts": [{"text": "{\"a\":"}, {"text": "1}"}] } }]
        }))
        .unwrap();
        assert_eq!(GeminiClient::extract_text(&response).unwrap(), "{\"a\":1}");

        let empty: GenerateContentResponse = serde_json::from_value(json!({})).unwrap();
        assert!(GeminiClient::extract_text(&empty).is_none());
    }

    #[test]
    fn test_model_name_and_url() {
        let client = GeminiClient::new(
            "k",
            Some("http://localhost:9000/"),
            "models/gemini-2.5-flash",
            Duration::from_secs(5),
        )
        .unwrap();
        assert_eq!(client.model_name(), "gemini-2.5-flash");
        assert_eq!(
            client.generate_url(),
            "http://localhost:9000/v1beta/models/gemini-2.5-flash:generateContent"
        );
    }

    #[tokio::test]
    async fn test_transport_error_does_not_expose_key() {
        let client = GeminiClient::new(
            "SECRET-TEST-KEY",
            Some("http://127.0.0.1:1"),
            "gemini-2.5-flash",
            Duration::from_secs(5),
        )
        .unwrap();

        let err = client.list_models().await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-TEST-KEY"));

        let err = client.generate(GenerateRequest::text("hi")).await.unwrap_err();
        assert!(!err.to_string().contains("SECRET-TEST-KEY"));
    }

    #[test]
    fn test_model_info() {
        let info: ModelInfo = serde_json::from_value(json!({
            "name": "models/gemini-2.5-flash",
            "displayName": "Gemini 2.5 Flash",
            "supportedGenerationMethods": ["generateContent", "countTokens"],
            "inputTokenLimit": 1048576
        }))
        .unwrap();
        assert_eq!(info.model_id(), "gemini-2.5-flash");
        assert!(info.supports_generate_content());
        assert_eq!(info.output_token_limit, None);
    }
}
