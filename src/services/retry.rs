//! 限流重试
//!
//! 只有限流（[`LlmError::RateLimited`]）会被重试；其他错误立即返回。
//! 每次调用可选地带超时，超时视为不可重试的调用失败。

use std::time::Duration;

use tracing::{debug, warn};

use crate::clients::{GenerateRequest, GenerativeModel};
use crate::error::LlmError;

/// 重试策略
#[derive(Debug, Clone, PartialEq)]
pub struct RetryPolicy {
    /// 总尝试次数（含第一次）
    pub max_attempts: u32,
    /// 第一次重试前的等待时间
    pub base_delay: Duration,
    /// 每次重试后等待时间的倍数，1.0 即固定间隔
    pub multiplier: f64,
    /// 等待时间上限
    pub max_delay: Duration,
    /// 单次调用超时
    pub attempt_timeout: Option<Duration>,
}

impl RetryPolicy {
    /// 固定间隔
    pub fn fixed(max_attempts: u32, delay: Duration) -> Self {
        Self {
            max_attempts,
            base_delay: delay,
            multiplier: 1.0,
            max_delay: delay,
            attempt_timeout: None,
        }
    }

    /// 指数退避，等待时间不超过 `max_delay`
    pub fn exponential(
        max_attempts: u32,
        base_delay: Duration,
        multiplier: f64,
        max_delay: Duration,
    ) -> Self {
        Self {
            max_attempts,
            base_delay,
            multiplier: multiplier.max(1.0),
            max_delay: max_delay.max(base_delay),
            attempt_timeout: None,
        }
    }

    pub fn with_attempt_timeout(mut self, timeout: Duration) -> Self {
        self.attempt_timeout = Some(timeout);
        self
    }

    /// 第 `retry` 次重试（从 0 开始）前的等待时间
    pub fn delay_for(&self, retry: u32) -> Duration {
        let factor = self.multiplier.powi(retry.min(i32::MAX as u32) as i32);
        let secs = self.base_delay.as_secs_f64() * factor;
        if !secs.is_finite() || secs >= self.max_delay.as_secs_f64() {
            self.max_delay
        } else {
            Duration::from_secs_f64(secs)
        }
    }

    /// 结合服务端 `Retry-After` 的等待时间
    ///
    /// 取策略间隔和 `Retry-After` 中较长的一个，仍不超过 `max_delay`。
    pub fn delay_after(&self, retry: u32, err: &LlmError) -> Duration {
        let planned = self.delay_for(retry);
        match err {
            LlmError::RateLimited {
                retry_after: Some(secs),
                ..
            } => planned.max(Duration::from_secs(*secs)).min(self.max_delay),
            _ => planned,
        }
    }
}

/// 调用模型，遇到限流按策略等待后重试
///
/// # 参数
/// - `model`: 模型客户端
/// - `request`: 生成请求（每次尝试都会复制一份）
/// - `policy`: 重试策略
/// - `label`: 日志中标识这次调用的文本
pub async fn generate_with_retry(
    model: &dyn GenerativeModel,
    request: &GenerateRequest,
    policy: &RetryPolicy,
    label: &str,
) -> Result<String, LlmError> {
    let max_attempts = policy.max_attempts.max(1);
    let mut attempt = 1;

    loop {
        debug!("[{}] 第 {}/{} 次调用模型", label, attempt, max_attempts);

        let result = match policy.attempt_timeout {
            Some(limit) => tokio::time::timeout(limit, model.generate(request.clone()))
                .await
                .unwrap_or_else(|_| {
                    Err(LlmError::Timeout {
                        model: model.model_name().to_string(),
                        secs: limit.as_secs(),
                    })
                }),
            None => model.generate(request.clone()).await,
        };

        match result {
            Ok(text) => return Ok(text),
            Err(e) if e.is_rate_limited() && attempt < max_attempts => {
                let delay = policy.delay_after(attempt - 1, &e);
                warn!(
                    "[{}] ⏳ 触发限流，{:.1} 秒后重试 ({}/{})",
                    label,
                    delay.as_secs_f64(),
                    attempt,
                    max_attempts
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
            Err(e) => {
                if e.is_rate_limited() {
                    warn!("[{}] ❌ 限流重试次数已用完 ({} 次)", label, max_attempts);
                }
                return Err(e);
            }
        }
    }
}
