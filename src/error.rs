//! 错误类型
//!
//! 按关注点分组：配置 / LLM 调用 / 文件 / 响应校验 / 请求参数，
//! 统一收敛到 [`AppError`]。

use thiserror::Error;

/// 应用程序错误类型
#[derive(Debug, Error)]
pub enum AppError {
    /// 配置错误（含凭证缺失）
    #[error("配置错误: {0}")]
    Config(#[from] ConfigError),
    /// LLM 服务错误
    #[error("LLM错误: {0}")]
    Llm(#[from] LlmError),
    /// 文件操作错误
    #[error("文件错误: {0}")]
    File(#[from] FileError),
    /// 模型输出校验错误
    #[error("响应校验错误: {0}")]
    Validation(#[from] ValidationError),
    /// 请求参数错误
    #[error("请求错误: {0}")]
    Request(#[from] RequestError),
    /// 其他错误（用于包装第三方库错误）
    #[error("错误: {0}")]
    Other(String),
}

/// 配置错误
#[derive(Debug, Error)]
pub enum ConfigError {
    /// 未提供 API 凭证
    #[error("缺少 API 凭证，请设置环境变量 {}", .var_names.join(" / "))]
    AuthMissing { var_names: Vec<String> },
    /// 环境变量解析失败
    #[error("环境变量 {var_name} 解析失败: 值 '{value}' 无法转换为 {expected_type}")]
    EnvVarParseFailed {
        var_name: String,
        value: String,
        expected_type: String,
    },
    /// 未知的 LLM 提供方
    #[error("未知的 LLM 提供方: {0}")]
    UnknownProvider(String),
    /// 配置文件解析失败
    #[error("配置文件解析失败 ({path}): {source}")]
    FileParseFailed {
        path: String,
        #[source]
        source: toml::de::Error,
    },
}

/// LLM 服务错误
///
/// 只有 [`LlmError::RateLimited`] 是可重试的。
#[derive(Debug, Error)]
pub enum LlmError {
    /// 请求频率限制
    #[error("LLM 请求频率限制 (模型: {model}): {message}")]
    RateLimited {
        model: String,
        message: String,
        retry_after: Option<u64>,
    },
    /// API 调用失败
    #[error("LLM API调用失败 (模型: {model}): {message}")]
    ApiCallFailed { model: String, message: String },
    /// 返回内容为空
    #[error("LLM返回内容为空 (模型: {model})")]
    EmptyContent { model: String },
    /// 单次调用超时
    #[error("LLM 调用超时 (模型: {model}, {secs}秒)")]
    Timeout { model: String, secs: u64 },
}

impl LlmError {
    /// 是否属于可重试的限流错误
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, LlmError::RateLimited { .. })
    }
}

/// 文件操作错误
#[derive(Debug, Error)]
pub enum FileError {
    /// 读取文件失败
    #[error("读取文件失败 ({path}): {source}")]
    ReadFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 写入文件失败
    #[error("写入文件失败 ({path}): {source}")]
    WriteFailed {
        path: String,
        #[source]
        source: std::io::Error,
    },
    /// 目录不存在
    #[error("目录不存在: {path}")]
    DirectoryNotFound { path: String },
}

/// 模型输出校验错误
#[derive(Debug, Error)]
pub enum ValidationError {
    /// 无法从模型输出中解析出期望的 JSON
    #[error("模型输出格式错误: {reason}")]
    ResponseFormat { reason: String, raw: String },
    /// JSON 可解析，但缺少必需字段或违反约束
    #[error("模型输出结构无效 ({field}): {reason}")]
    InvalidStructure { field: String, reason: String },
}

/// 请求参数错误
#[derive(Debug, Error)]
pub enum RequestError {
    /// 请求体不合法
    #[error("{0}")]
    BadRequest(String),
    /// 资源不存在
    #[error("未找到: {0}")]
    NotFound(String),
}

// ========== 从常见错误类型转换 ==========

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: String::new(),
            source: err,
        })
    }
}

impl From<serde_json::Error> for AppError {
    fn from(err: serde_json::Error) -> Self {
        AppError::Other(format!("JSON 处理失败: {}", err))
    }
}

// ========== 便捷构造函数 ==========

impl AppError {
    /// 创建文件读取错误
    pub fn file_read_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::ReadFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建文件写入错误
    pub fn file_write_failed(path: impl Into<String>, source: std::io::Error) -> Self {
        AppError::File(FileError::WriteFailed {
            path: path.into(),
            source,
        })
    }

    /// 创建结构无效错误
    pub fn invalid_structure(field: impl Into<String>, reason: impl Into<String>) -> Self {
        AppError::Validation(ValidationError::InvalidStructure {
            field: field.into(),
            reason: reason.into(),
        })
    }

    /// 创建请求参数错误
    pub fn bad_request(message: impl Into<String>) -> Self {
        AppError::Request(RequestError::BadRequest(message.into()))
    }

    /// 是否属于可重试的限流错误
    pub fn is_rate_limited(&self) -> bool {
        matches!(self, AppError::Llm(e) if e.is_rate_limited())
    }
}

// ========== Result 类型别名 ==========

/// 应用程序结果类型
pub type AppResult<T> = Result<T, AppError>;
