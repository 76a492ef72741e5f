//! 日志工具模块
//!
//! 提供批处理运行日志文件和控制台统计输出的辅助函数

use std::path::Path;

use tokio::io::AsyncWriteExt;
use tracing::info;

use crate::error::{AppError, AppResult};
use crate::orchestrator::BatchSummary;

/// 初始化运行日志文件（覆盖旧内容）
///
/// # 参数
/// - `log_file_path`: 日志文件路径
/// - `title`: 标题行
pub async fn init_log_file(log_file_path: &Path, title: &str) -> AppResult<()> {
    let log_header = format!(
        "{}\n{} - {}\n{}\n\n",
        "=".repeat(60),
        title,
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S"),
        "=".repeat(60)
    );
    tokio::fs::write(log_file_path, log_header)
        .await
        .map_err(|e| AppError::file_write_failed(log_file_path.display().to_string(), e))
}

/// 向运行日志追加一行
pub async fn append_log_line(log_file_path: &Path, line: &str) -> AppResult<()> {
    let mut file = tokio::fs::OpenOptions::new()
        .create(true)
        .append(true)
        .open(log_file_path)
        .await
        .map_err(|e| AppError::file_write_failed(log_file_path.display().to_string(), e))?;
    file.write_all(format!("{}\n", line).as_bytes())
        .await
        .map_err(|e| AppError::file_write_failed(log_file_path.display().to_string(), e))
}

/// 记录程序启动信息
///
/// # 参数
/// - `model_name`: 使用的模型
/// - `raw_dir`: 讲稿目录
/// - `processed_dir`: 输出目录
pub fn log_startup(model_name: &str, raw_dir: &Path, processed_dir: &Path) {
    info!("{}", "=".repeat(60));
    info!("🚀 程序启动 - 讲稿批量生成模式");
    info!("🤖 模型: {}", model_name);
    info!("📂 讲稿目录: {}", raw_dir.display());
    info!("📁 输出目录: {}", processed_dir.display());
    info!("{}", "=".repeat(60));
}

/// 记录讲稿扫描结果
pub fn log_lectures_found(total: usize) {
    info!("✓ 找到 {} 个讲稿", total);
    info!("💡 已有输出的讲稿会被跳过，按顺序逐个处理\n");
}

/// 打印最终统计信息
///
/// # 参数
/// - `summary`: 批处理统计
/// - `log_file_path`: 日志文件路径
pub fn print_final_stats(summary: &BatchSummary, log_file_path: &Path) {
    info!("{}", "=".repeat(60));
    info!("📊 全部处理完成统计");
    info!(
        "完成时间: {}",
        chrono::Local::now().format("%Y-%m-%d %H:%M:%S")
    );
    info!("{}", "=".repeat(60));
    info!("✅ 生成: {}/{}", summary.generated, summary.total);
    info!("⏭️ 跳过: {}", summary.skipped);
    info!("❌ 失败: {}", summary.failed);
    info!("{}", "=".repeat(60));
    info!("日志已保存至: {}", log_file_path.display());
}

/// 截断长文本用于日志显示
///
/// # 参数
/// - `text`: 原始文本
/// - `max_len`: 最大长度（字符数）
///
/// # 返回
/// 返回截断后的文本
pub fn truncate_text(text: &str, max_len: usize) -> String {
    if text.chars().count() > max_len {
        text.chars().take(max_len).collect::<String>() + "..."
    } else {
        text.to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncate_text() {
        assert_eq!(truncate_text("short", 10), "short");
        assert_eq!(truncate_text("进程调度算法", 2), "进程...");
    }

    #[tokio::test]
    async fn test_log_file_header_and_append() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("output.txt");

        init_log_file(&path, "讲稿处理日志").await.unwrap();
        append_log_line(&path, "class1.txt | 生成").await.unwrap();

        let content = std::fs::read_to_string(&path).unwrap();
        assert!(content.starts_with(&"=".repeat(60)));
        assert!(content.contains("讲稿处理日志 - "));
        assert!(content.ends_with("class1.txt | 生成\n"));
    }
}
