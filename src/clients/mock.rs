//! 可编排的模型替身，用于测试

use std::collections::VecDeque;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Mutex;

use async_trait::async_trait;

use crate::clients::{GenerateRequest, GenerativeModel};
use crate::error::LlmError;

/// 按顺序返回预设结果的模型
///
/// 预设结果用完后返回 `fallback`（默认是 `ApiCallFailed`）。
pub struct ScriptedModel {
    model_name: String,
    script: Mutex<VecDeque<Result<String, LlmError>>>,
    fallback: Option<String>,
    requests: Mutex<Vec<GenerateRequest>>,
    call_count: AtomicU32,
}

impl ScriptedModel {
    pub fn new() -> Self {
        Self {
            model_name: "scripted-model".to_string(),
            script: Mutex::new(VecDeque::new()),
            fallback: None,
            requests: Mutex::new(Vec::new()),
            call_count: AtomicU32::new(0),
        }
    }

    /// 追加一次成功响应
    pub fn then_ok(self, text: impl Into<String>) -> Self {
        self.push(Ok(text.into()));
        self
    }

    /// 追加一次限流
    pub fn then_rate_limited(self) -> Self {
        self.push_rate_limited(None)
    }

    /// 追加一次带 `Retry-After` 秒数的限流
    pub fn then_rate_limited_after(self, secs: u64) -> Self {
        self.push_rate_limited(Some(secs))
    }

    fn push_rate_limited(self, retry_after: Option<u64>) -> Self {
        let err = LlmError::RateLimited {
            model: self.model_name.clone(),
            message: "HTTP 429 Too Many Requests".to_string(),
            retry_after,
        };
        self.push(Err(err));
        self
    }

    /// 追加一次不可重试的失败
    pub fn then_fail(self, message: impl Into<String>) -> Self {
        let err = LlmError::ApiCallFailed {
            model: self.model_name.clone(),
            message: message.into(),
        };
        self.push(Err(err));
        self
    }

    /// 预设结果用完后始终返回该文本
    pub fn always(mut self, text: impl Into<String>) -> Self {
        self.fallback = Some(text.into());
        self
    }

    pub fn call_count(&self) -> u32 {
        self.call_count.load(Ordering::SeqCst)
    }

    /// 已收到的请求（按顺序）
    pub fn requests(&self) -> Vec<GenerateRequest> {
        self.requests
            .lock()
            .map(|r| r.clone())
            .unwrap_or_default()
    }

    fn push(&self, entry: Result<String, LlmError>) {
        if let Ok(mut script) = self.script.lock() {
            script.push_back(entry);
        }
    }
}

impl Default for ScriptedModel {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl GenerativeModel for ScriptedModel {
    fn model_name(&self) -> &str {
        &self.model_name
    }

    async fn generate(&self, request: GenerateRequest) -> Result<String, LlmError> {
        self.call_count.fetch_add(1, Ordering::SeqCst);
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request);
        }

        let next = self.script.lock().ok().and_then(|mut s| s.pop_front());
        match (next, &self.fallback) {
            (Some(entry), _) => entry,
            (None, Some(text)) => Ok(text.clone()),
            (None, None) => Err(LlmError::ApiCallFailed {
                model: self.model_name.clone(),
                message: "script exhausted".to_string(),
            }),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_script_order_and_fallback() {
        let model = ScriptedModel::new()
            .then_rate_limited()
            .then_ok("first")
            .always("later");

        assert!(model.generate(GenerateRequest::text("a")).await.unwrap_err().is_rate_limited());
        assert_eq!(model.generate(GenerateRequest::text("b")).await.unwrap(), "first");
        assert_eq!(model.generate(GenerateRequest::text("c")).await.unwrap(), "later");
        assert_eq!(model.call_count(), 3);
        assert_eq!(model.requests()[1].prompt, "b");
    }

    #[tokio::test]
    async fn test_exhausted_script_fails() {
        let model = ScriptedModel::new();
        assert!(model.generate(GenerateRequest::text("a")).await.is_err());
    }
}
