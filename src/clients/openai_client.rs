//! 兼容 OpenAI API 的模型客户端
//!
//! ## 技术栈
//! - 使用 `async-openai` crate 进行 API 调用
//! - 支持自定义 API 端点和模型（Gemini 的 OpenAI 兼容端点、Azure、Doubao 等）
//! - 输出结构约束通过系统消息传达，图片以 data URL 形式发送

use async_openai::{
    config::OpenAIConfig,
    types::chat::{
        ChatCompletionRequestMessage, ChatCompletionRequestMessageContentPartImage,
        ChatCompletionRequestMessageContentPartText, ChatCompletionRequestSystemMessageArgs,
        ChatCompletionRequestUserMessageArgs, ChatCompletionRequestUserMessageContent,
        ChatCompletionRequestUserMessageContentPart, CreateChatCompletionRequestArgs, ImageDetail,
        ImageUrl,
    },
    Client,
};
use async_trait::async_trait;
use tracing::{debug, warn};

use crate::clients::{looks_rate_limited, GenerateRequest, GenerativeModel, InlineImage};
use crate::error::LlmError;

/// OpenAI 兼容客户端
pub struct OpenAiClient {
    client: Client<OpenAIConfig>,
    model_name: String,
}

impl OpenAiClient {
    /// 创建新的客户端
    pub fn new(api_key: &str, api_base_url: Option<&str>, model_name: &str) -> Self {
        let mut openai_config = OpenAIConfig::new().with_api_key(api_key);
        if let Some(base) = api_base_url {
            openai_config = openai_config.with_api_base(base);
        }

        Self {
            client: Client::with_config(openai_config),
            model_name: model_name.to_string(),
        }
    }

    /// 把输出结构约束写成系统消息
    fn schema_instruction(request: &GenerateRequest) -> Option<String> {
        request.response_schema.as_ref().map(|schema| {
            format!(
                "Respond with a single JSON object only, no markdown fences and no prose. \
                 The object must conform to this schema:\n{}",
                serde_json::to_string_pretty(schema).unwrap_or_default()
            )
        })
    }

    fn build_messages(
        request: &GenerateRequest,
    ) -> Result<Vec<ChatCompletionRequestMessage>, async_openai::error::OpenAIError> {
        let mut messages = Vec::new();

        if let Some(sys_msg) = Self::schema_instruction(request) {
            let system_msg = ChatCompletionRequestSystemMessageArgs::default()
                .content(sys_msg)
                .build()?;
            messages.push(ChatCompletionRequestMessage::System(system_msg));
        }

        let user_msg = match &request.image {
            Some(image) => {
                let content_parts = vec![
                    ChatCompletionRequestUserMessageContentPart::Text(
                        ChatCompletionRequestMessageContentPartText {
                            text: request.prompt.clone(),
                        },
                    ),
                    Self::image_part(image),
                ];
                ChatCompletionRequestUserMessageArgs::default()
                    .content(ChatCompletionRequestUserMessageContent::Array(content_parts))
                    .build()?
            }
            None => ChatCompletionRequestUserMessageArgs::default()
                .content(request.prompt.as_str())
                .build()?,
        };
        messages.push(ChatCompletionRequestMessage::User(user_msg));

        Ok(messages)
    }

    fn image_part(image: &InlineImage) -> ChatCompletionRequestUserMessageContentPart {
        ChatCompletionRequestUserMessageContentPart::ImageUrl(
            ChatCompletionRequestMessageContentPartImage {
                image_url: ImageUrl {
                    url: image.to_data_url(),
                    detail: Some(ImageDetail::Auto),
                },
            },
        )
    }

    fn classify_error(&self, message: String) -> LlmError {
        if looks_rate_limited(&message) {
            LlmError::RateLimited {
                model: self.model_name.clone(),
                message,
                retry_after: None,
            }
        } else {
            LlmError::ApiCallFailed {
                model: self.model_name.clone(),
                message,
            }
        }
    }
}

#[async_trait]
impl GenerativeModel for OpenAiClient {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        debug!("调用 LLM API，模型: {}", self.model_name);
        debug!("用户消息长度: {} 字符", request.prompt.len());

        let messages =
            Self::build_messages(&request).map_err(|e| self.classify_error(e.to_string()))?;

        let chat_request = CreateChatCompletionRequestArgs::default()
            .model(&self.model_name)
            .messages(messages)
            .temperature(0.3)
            .build()
            .map_err(|e| self.classify_error(e.to_string()))?;

        let response = self.client.chat().create(chat_request).await.map_err(|e| {
            warn!("LLM API 调用失败: {}", e);
            self.classify_error(e.to_string())
        })?;

        debug!("LLM API 调用成功");

        response
            .choices
            .first()
            .and_then(|choice| choice.message.content.clone())
            .map(|content| content.trim().to_string())
            .filter(|content| !content.is_empty())
            .ok_or_else(|| LlmError::EmptyContent {
                model: self.model_name.clone(),
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn create_test_client() -> OpenAiClient {
        OpenAiClient::new("test-key", Some("http://localhost:1/v1"), "gpt-4o-mini")
    }

    #[test]
    fn test_schema_goes_to_system_message() {
        let request = GenerateRequest::text("summarize").with_schema(json!({"type": "OBJECT"}));
        let messages = OpenAiClient::build_messages(&request).unwrap();
        assert_eq!(messages.len(), 2);
        assert!(matches!(messages[0], ChatCompletionRequestMessage::System(_)));
        assert!(matches!(messages[1], ChatCompletionRequestMessage::User(_)));
    }

    #[test]
    fn test_plain_prompt_is_single_user_message() {
        let messages = OpenAiClient::build_messages(&GenerateRequest::text("hint")).unwrap();
        assert_eq!(messages.len(), 1);
    }

    #[test]
    fn test_error_classification() {
        let client = create_test_client();
        assert!(client
            .classify_error("429 Too Many Requests".to_string())
            .is_rate_limited());
        assert!(!client
            .classify_error("invalid_api_key".to_string())
            .is_rate_limited());
    }

    /// 真实调用，需要可用的 OPENAI 兼容端点
    #[tokio::test]
    #[ignore]
    async fn test_generate_live() {
        let _ = tracing_subscriber::fmt::try_init();
        let api_key = std::env::var("LLM_API_KEY").unwrap_or_default();
        let base = std::env::var("LLM_API_BASE_URL").ok();
        let client = OpenAiClient::new(&api_key, base.as_deref(), "gpt-4o-mini");

        let response = client
            .generate(GenerateRequest::text("Reply with the single word: pong"))
            .await;
        match response {
            Ok(text) => {
                println!("LLM 响应: {}", text);
                assert!(!text.is_empty());
            }
            Err(e) => panic!("LLM 调用失败: {}", e),
        }
    }
}
