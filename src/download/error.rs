//! 下载流水线的致命错误。
//!
//! 单章失败与封面失败不在这里：它们在各自边界被记录日志后吞掉。

use std::path::PathBuf;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum DownloadError {
    /// 目录接口不可达、返回错误码或结构无法解析。
    #[error("获取章节列表失败：{0}")]
    Listing(String),

    /// 目录请求成功，但一个章节都没有。
    #[error("没有找到任何章节 (book_id={book_id})")]
    NoChapters { book_id: String },

    /// 过滤掉缺失章节后无内容可写。
    #[error("所有章节下载失败，未生成 EPUB")]
    Assembly,

    /// EPUB 打包或落盘失败。
    #[error("写入 EPUB 失败 ({path}): {message}")]
    Write { path: PathBuf, message: String },

    /// HTTP 客户端初始化失败。
    #[error("HTTP 客户端初始化失败：{0}")]
    Client(String),
}

impl DownloadError {
    pub(crate) fn write(path: impl Into<PathBuf>, err: impl std::fmt::Display) -> Self {
        Self::Write {
            path: path.into(),
            message: err.to_string(),
        }
    }
}
