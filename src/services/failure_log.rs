//! 失败记录服务 - 业务能力层
//!
//! 只负责"写失败记录"能力，不关心流程

use std::path::{Path, PathBuf};

use tokio::fs::OpenOptions;
use tokio::io::AsyncWriteExt;
use tracing::debug;

use crate::error::{AppError, AppResult};

/// 失败记录服务
///
/// 每个处理失败的讲稿追加一行：时间 | 讲稿 | 原因
pub struct FailureLog {
    path: PathBuf,
}

impl FailureLog {
    /// 使用自定义文件路径创建
    pub fn with_path(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// 追加一条失败记录
    ///
    /// # 参数
    /// - `source`: 讲稿文件名
    /// - `reason`: 失败原因
    pub async fn record(&self, source: &str, reason: &str) -> AppResult<()> {
        debug!("写入失败记录: {} | {}", source, reason);

        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .await
            .map_err(|e| AppError::file_write_failed(self.path.display().to_string(), e))?;

        // 原因可能跨多行，压成一行方便 grep
        let reason = reason.split_whitespace().collect::<Vec<_>>().join(" ");
        let line = format!(
            "{} | {} | {}\n",
            chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
            source,
            reason
        );

        file.write_all(line.as_bytes())
            .await
            .map_err(|e| AppError::file_write_failed(self.path.display().to_string(), e))?;

        Ok(())
    }
}
