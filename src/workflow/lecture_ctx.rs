//! 讲稿处理上下文
//!
//! 封装"我正在处理第几个讲稿、输入输出在哪里"这一信息

use std::fmt::Display;
use std::path::{Path, PathBuf};

/// 讲稿处理上下文
#[derive(Debug, Clone)]
pub struct LectureCtx {
    /// 讲稿文件名（含扩展名）
    pub file_name: String,

    /// 文件名去掉扩展名，也是输出记录的 id
    pub lecture_key: String,

    /// 讲稿在本次批处理中的序号（从1开始，仅用于日志显示）
    pub index: usize,

    /// 本次批处理的讲稿总数
    pub total: usize,

    pub source_path: PathBuf,
    pub output_path: PathBuf,
}

impl LectureCtx {
    /// 根据讲稿路径和输出目录创建上下文
    ///
    /// 文件名无法转成 UTF-8 时返回 `None`
    pub fn new(source_path: &Path, processed_dir: &Path, index: usize, total: usize) -> Option<Self> {
        let file_name = source_path.file_name()?.to_str()?.to_string();
        let lecture_key = source_path.file_stem()?.to_str()?.to_string();
        let output_path = processed_dir.join(format!("{}.json", lecture_key));

        Some(Self {
            file_name,
            lecture_key,
            index,
            total,
            source_path: source_path.to_path_buf(),
            output_path,
        })
    }
}

impl Display for LectureCtx {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[讲稿 {}/{} {}]", self.index, self.total, self.file_name)
    }
}
