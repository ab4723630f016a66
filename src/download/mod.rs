//! 下载流程模块入口。
//!
//! 子模块：
//! - `models`      — 数据模型（ChapterRef / BookMetadata / ProgressEvent 等）
//! - `error`       — 流水线的致命错误
//! - `plan`        — 拉目录与元数据探测
//! - `fetch_pool`  — 章节正文并发下载工作池
//! - `progress`    — 进度上报与 CLI 进度条
//! - `downloader`  — 下载主流程编排

pub mod downloader;
pub mod error;
pub(crate) mod fetch_pool;
pub mod models;
pub mod plan;
pub mod progress;

pub use downloader::download_and_assemble;
pub use error::DownloadError;
pub use progress::ProgressReporter;
