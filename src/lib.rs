//! Tomato EPUB Downloader：把番茄小说整本下载为 EPUB。
//!
//! 代码结构（读代码入口）：
//! - `base_system`：配置/日志/文件名等基础设施
//! - `third_party`：上游目录与正文接口、封面下载
//! - `download`：下载流程编排（拉目录、探测元数据、并发拉正文）
//! - `book_parser`：章节排版与 EPUB 打包
//! - `ui`：命令行与 Web 两套驱动

pub mod base_system;
pub mod book_parser;
pub mod download;
pub mod third_party;
pub mod ui;
