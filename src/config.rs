use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::error::{AppResult, ConfigError};
use crate::services::retry::RetryPolicy;

/// 凭证可以来自的环境变量（按优先级）
pub const API_KEY_ENV_VARS: [&str; 3] = ["GEMINI_API_KEY", "NEXT_PUBLIC_GEMINI_API_KEY", "LLM_API_KEY"];

/// 未指定模型时使用的稳定版本
pub const DEFAULT_MODEL_NAME: &str = "gemini-2.5-flash";

/// LLM 提供方
#[derive(Clone, Copy, Debug, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LlmProvider {
    /// Gemini 原生 REST 接口
    Gemini,
    /// 兼容 OpenAI API 的服务
    OpenAi,
}

impl std::str::FromStr for LlmProvider {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "gemini" => Ok(LlmProvider::Gemini),
            "openai" => Ok(LlmProvider::OpenAi),
            other => Err(ConfigError::UnknownProvider(other.to_string())),
        }
    }
}

/// 程序配置
#[derive(Clone, Debug, Deserialize)]
#[serde(default)]
pub struct Config {
    // --- LLM 配置 ---
    pub llm_provider: LlmProvider,
    pub llm_api_key: Option<String>,
    /// 为空时使用提供方默认地址
    pub llm_api_base_url: Option<String>,
    pub llm_model_name: String,
    /// 单次模型调用超时（秒）
    pub request_timeout_secs: u64,
    // --- 批量生成 ---
    /// 原始讲稿目录（*.txt）
    pub raw_dir: PathBuf,
    /// 结构化输出目录（*.json）
    pub processed_dir: PathBuf,
    /// 讲稿截断长度（字符数）
    pub max_prompt_chars: usize,
    /// 每个文件处理后的间隔（毫秒）
    pub inter_file_delay_ms: u64,
    pub extractor_backoff_ms: u64,
    pub extractor_max_attempts: u32,
    // --- HTTP 服务 ---
    pub bind_addr: String,
    pub router_backoff_ms: u64,
    pub router_max_attempts: u32,
    // --- 日志 ---
    /// 是否显示详细日志
    pub verbose_logging: bool,
    /// 运行日志文件
    pub output_log_file: String,
    /// 失败记录文件
    pub failure_log_file: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            llm_provider: LlmProvider::Gemini,
            llm_api_key: None,
            llm_api_base_url: None,
            llm_model_name: DEFAULT_MODEL_NAME.to_string(),
            request_timeout_secs: 120,
            raw_dir: PathBuf::from("data/raw"),
            processed_dir: PathBuf::from("data/processed"),
            max_prompt_chars: 30_000,
            inter_file_delay_ms: 5_000,
            extractor_backoff_ms: 20_000,
            extractor_max_attempts: 3,
            bind_addr: "127.0.0.1:3000".to_string(),
            router_backoff_ms: 3_000,
            router_max_attempts: 3,
            verbose_logging: false,
            output_log_file: "output.txt".to_string(),
            failure_log_file: "warn.txt".to_string(),
        }
    }
}

impl Config {
    /// 先读取 TOML 配置文件（可选），再用环境变量覆盖
    pub fn load(path: Option<&Path>) -> AppResult<Self> {
        let mut config = match path {
            Some(path) => Self::from_toml_file(path)?,
            None => Self::default(),
        };
        config.apply_env()?;
        Ok(config)
    }

    /// 解析 TOML 配置文件
    pub fn from_toml_file(path: &Path) -> AppResult<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| crate::error::AppError::file_read_failed(path.display().to_string(), e))?;
        Self::from_toml_str(&content, &path.display().to_string())
    }

    fn from_toml_str(content: &str, path: &str) -> AppResult<Self> {
        let config: Config = toml::from_str(content).map_err(|source| ConfigError::FileParseFailed {
            path: path.to_string(),
            source,
        })?;
        Ok(config)
    }

    fn apply_env(&mut self) -> AppResult<()> {
        if let Some(key) = API_KEY_ENV_VARS
            .iter()
            .filter_map(|name| std::env::var(name).ok())
            .find(|v| !v.trim().is_empty())
        {
            self.llm_api_key = Some(key);
        }
        if let Some(model) = env_first(&["GEMINI_MODEL", "LLM_MODEL_NAME"]) {
            self.llm_model_name = model;
        }
        if let Some(provider) = env_first(&["LLM_PROVIDER"]) {
            self.llm_provider = provider.parse()?;
        }
        if let Some(base) = env_first(&["LLM_API_BASE_URL"]) {
            self.llm_api_base_url = Some(base);
        }
        if let Some(dir) = env_first(&["RAW_DIR"]) {
            self.raw_dir = PathBuf::from(dir);
        }
        if let Some(dir) = env_first(&["PROCESSED_DIR"]) {
            self.processed_dir = PathBuf::from(dir);
        }
        if let Some(addr) = env_first(&["BIND_ADDR"]) {
            self.bind_addr = addr;
        }
        if let Some(file) = env_first(&["OUTPUT_LOG_FILE"]) {
            self.output_log_file = file;
        }
        if let Some(file) = env_first(&["FAILURE_LOG_FILE"]) {
            self.failure_log_file = file;
        }
        self.request_timeout_secs = env_parse("REQUEST_TIMEOUT_SECS", self.request_timeout_secs)?;
        self.max_prompt_chars = env_parse("MAX_PROMPT_CHARS", self.max_prompt_chars)?;
        self.inter_file_delay_ms = env_parse("INTER_FILE_DELAY_MS", self.inter_file_delay_ms)?;
        self.extractor_backoff_ms = env_parse("EXTRACTOR_BACKOFF_MS", self.extractor_backoff_ms)?;
        self.extractor_max_attempts = env_parse("EXTRACTOR_MAX_ATTEMPTS", self.extractor_max_attempts)?;
        self.router_backoff_ms = env_parse("ROUTER_BACKOFF_MS", self.router_backoff_ms)?;
        self.router_max_attempts = env_parse("ROUTER_MAX_ATTEMPTS", self.router_max_attempts)?;
        self.verbose_logging = env_parse("VERBOSE_LOGGING", self.verbose_logging)?;
        Ok(())
    }

    /// 获取 API 凭证，缺失时返回 `AuthMissing`
    pub fn require_api_key(&self) -> Result<&str, ConfigError> {
        self.llm_api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| ConfigError::AuthMissing {
                var_names: API_KEY_ENV_VARS.iter().map(|s| s.to_string()).collect(),
            })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn inter_file_delay(&self) -> Duration {
        Duration::from_millis(self.inter_file_delay_ms)
    }

    /// 批量生成的重试策略（默认：20 秒固定间隔，最多 3 次）
    pub fn extractor_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.extractor_max_attempts,
            Duration::from_millis(self.extractor_backoff_ms),
        )
        .with_attempt_timeout(self.request_timeout())
    }

    /// HTTP 请求的重试策略（默认：3 秒固定间隔，最多 3 次）
    pub fn router_retry_policy(&self) -> RetryPolicy {
        RetryPolicy::fixed(
            self.router_max_attempts,
            Duration::from_millis(self.router_backoff_ms),
        )
        .with_attempt_timeout(self.request_timeout())
    }
}

fn env_first(names: &[&str]) -> Option<String> {
    names
        .iter()
        .filter_map(|name| std::env::var(name).ok())
        .find(|v| !v.trim().is_empty())
}

fn env_parse<T: std::str::FromStr>(name: &str, default: T) -> Result<T, ConfigError> {
    match std::env::var(name) {
        Ok(value) if !value.trim().is_empty() => {
            value
                .trim()
                .parse()
                .map_err(|_| ConfigError::EnvVarParseFailed {
                    var_name: name.to_string(),
                    value,
                    expected_type: std::any::type_name::<T>().to_string(),
                })
        }
        _ => Ok(default),
    }
}
