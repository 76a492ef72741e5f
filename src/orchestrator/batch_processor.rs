//! 批量讲稿处理器 - 编排层
//!
//! ## 职责
//!
//! 扫描讲稿目录，按顺序把每个讲稿交给 [`LectureFlow`]，汇总统计。
//!
//! ## 核心功能
//!
//! 1. **批量加载**：扫描 `raw_dir` 下所有 `*.txt`
//! 2. **顺序处理**：一次只处理一个讲稿，两个讲稿之间固定间隔
//! 3. **失败隔离**：单个讲稿失败只记录，不影响后续讲稿
//! 4. **全局统计**：总数 / 生成 / 跳过 / 失败

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{error, info, warn};

use crate::clients::GenerativeModel;
use crate::config::Config;
use crate::error::{AppError, AppResult, FileError};
use crate::services::FailureLog;
use crate::utils::logging::{
    append_log_line, init_log_file, log_lectures_found, log_startup, print_final_stats,
    truncate_text,
};
use crate::workflow::{LectureCtx, LectureFlow, ProcessResult};

/// 批处理统计
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct BatchSummary {
    pub total: usize,
    pub generated: usize,
    pub skipped: usize,
    pub failed: usize,
}

/// 批量讲稿处理器
pub struct BatchExtractor {
    flow: LectureFlow,
    model_name: String,
    raw_dir: PathBuf,
    processed_dir: PathBuf,
    inter_file_delay: Duration,
    output_log_file: PathBuf,
    failure_log: FailureLog,
}

impl BatchExtractor {
    /// 创建批处理器
    ///
    /// 模型客户端在启动时构造一次后注入
    pub fn new(model: Arc<dyn GenerativeModel>, config: &Config) -> Self {
        Self {
            model_name: model.model_name().to_string(),
            flow: LectureFlow::new(model, config),
            raw_dir: config.raw_dir.clone(),
            processed_dir: config.processed_dir.clone(),
            inter_file_delay: config.inter_file_delay(),
            output_log_file: PathBuf::from(&config.output_log_file),
            failure_log: FailureLog::with_path(&config.failure_log_file),
        }
    }

    /// 运行批处理
    ///
    /// 只有讲稿目录不存在或输出目录无法创建时返回错误；
    /// 单个讲稿的失败计入 `failed`。
    pub async fn run(&self) -> AppResult<BatchSummary> {
        init_log_file(&self.output_log_file, "讲稿处理日志").await?;
        log_startup(&self.model_name, &self.raw_dir, &self.processed_dir);

        tokio::fs::create_dir_all(&self.processed_dir)
            .await
            .map_err(|e| AppError::file_write_failed(self.processed_dir.display().to_string(), e))?;

        info!("📁 正在扫描讲稿目录...");
        let sources = discover_transcripts(&self.raw_dir).await?;
        let total = sources.len();

        let mut summary = BatchSummary {
            total,
            ..Default::default()
        };

        if total == 0 {
            warn!("⚠️ 没有找到待处理的讲稿 (*.txt)，程序结束");
            print_final_stats(&summary, &self.output_log_file);
            return Ok(summary);
        }
        log_lectures_found(total);

        for (idx, source) in sources.iter().enumerate() {
            let Some(ctx) = LectureCtx::new(source, &self.processed_dir, idx + 1, total) else {
                warn!("⚠️ 文件名不是有效的 UTF-8，跳过: {}", source.display());
                summary.failed += 1;
                continue;
            };

            let outcome = match self.flow.run(&ctx).await {
                Ok(ProcessResult::Generated) => {
                    summary.generated += 1;
                    "生成".to_string()
                }
                Ok(ProcessResult::Skipped) => {
                    summary.skipped += 1;
                    "跳过".to_string()
                }
                Err(e) => {
                    summary.failed += 1;
                    self.record_failure(&ctx, &e).await;
                    format!("失败: {}", truncate_text(&e.to_string(), 200))
                }
            };

            if let Err(e) = append_log_line(&self.output_log_file, &format!("{} | {}", ctx.file_name, outcome)).await {
                warn!("无法写入运行日志: {}", e);
            }

            if idx + 1 < total && !self.inter_file_delay.is_zero() {
                tokio::time::sleep(self.inter_file_delay).await;
            }
        }

        print_final_stats(&summary, &self.output_log_file);
        Ok(summary)
    }

    async fn record_failure(&self, ctx: &LectureCtx, err: &AppError) {
        if err.is_rate_limited() {
            error!("{} ❌ 限流重试次数已用完，放弃该讲稿: {}", ctx, err);
        } else {
            error!("{} ❌ 处理失败，跳过该讲稿: {}", ctx, err);
        }

        if let Err(e) = self.failure_log.record(&ctx.file_name, &err.to_string()).await {
            warn!(
                "无法写入失败记录 {}: {}",
                self.failure_log.path().display(),
                e
            );
        }
    }
}

/// 列出目录下所有 `*.txt`，按文件名排序
async fn discover_transcripts(raw_dir: &Path) -> AppResult<Vec<PathBuf>> {
    let mut entries = tokio::fs::read_dir(raw_dir).await.map_err(|_| {
        AppError::File(FileError::DirectoryNotFound {
            path: raw_dir.display().to_string(),
        })
    })?;

    let mut sources = Vec::new();
    while let Some(entry) = entries
        .next_entry()
        .await
        .map_err(|e| AppError::file_read_failed(raw_dir.display().to_string(), e))?
    {
        let path = entry.path();
        let is_txt = path.extension().and_then(|e| e.to_str()) == Some("txt");
        if is_txt && entry.file_type().await.map(|t| t.is_file()).unwrap_or(false) {
            sources.push(path);
        }
    }

    sources.sort();
    Ok(sources)
}
