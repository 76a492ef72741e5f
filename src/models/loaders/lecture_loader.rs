use std::path::{Path, PathBuf};

use tokio::fs;

use crate::error::{AppError, AppResult, FileError, RequestError};
use crate::models::lecture::{LectureRecord, LectureSummary};

/// 讲义 id 只能是单个文件名片段
pub fn is_valid_lecture_id(id: &str) -> bool {
    !id.is_empty()
        && id != "."
        && id != ".."
        && !id.contains(['/', '\\', '\0'])
}

/// 讲义 id 对应的输出文件路径
pub fn lecture_path(processed_dir: &Path, id: &str) -> PathBuf {
    processed_dir.join(format!("{}.json", id))
}

/// 按 id 加载一份已生成的讲义
pub async fn load_lecture(processed_dir: &Path, id: &str) -> AppResult<LectureRecord> {
    if !is_valid_lecture_id(id) {
        return Err(RequestError::BadRequest(format!("非法的讲义 id: {}", id)).into());
    }

    let path = lecture_path(processed_dir, id);
    let content = match fs::read_to_string(&path).await {
        Ok(content) => content,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(RequestError::NotFound(format!("讲义 {}", id)).into());
        }
        Err(e) => return Err(AppError::file_read_failed(path.display().to_string(), e)),
    };

    LectureRecord::parse(&content)
}

/// 列出目录中所有可读取的讲义（按 id 排序）
///
/// 无法解析的文件只记录警告，不影响其他讲义。
pub async fn list_lectures(processed_dir: &Path) -> AppResult<Vec<LectureSummary>> {
    if !processed_dir.exists() {
        return Err(FileError::DirectoryNotFound {
            path: processed_dir.display().to_string(),
        }
        .into());
    }

    let mut summaries = Vec::new();
    let mut entries = fs::read_dir(processed_dir)
        .await
        .map_err(|e| AppError::file_read_failed(processed_dir.display().to_string(), e))?;

    while let Some(entry) = entries.next_entry().await? {
        let path = entry.path();
        if path.extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }

        let loaded = match fs::read_to_string(&path).await {
            Ok(content) => LectureRecord::parse(&content),
            Err(e) => Err(AppError::file_read_failed(path.display().to_string(), e)),
        };

        match loaded {
            Ok(record) => {
                // 详情接口按文件名查找，列表里的 id 也以文件名为准
                let mut summary = LectureSummary::from(&record);
                if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                    summary.id = stem.to_string();
                }
                summaries.push(summary);
            }
            Err(e) => {
                tracing::warn!("跳过无法加载的讲义 {}: {}", path.display(), e);
            }
        }
    }

    summaries.sort_by(|a, b| a.id.cmp(&b.id));
    Ok(summaries)
}
