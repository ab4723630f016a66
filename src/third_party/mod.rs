//! 上游接口：章节目录、章节正文、封面图片。

pub mod content_client;
pub(crate) mod media_fetch;

use crate::download::error::DownloadError;
use crate::download::models::{ChapterPayload, ChapterRef};

pub use content_client::ApiClient;

/// 流水线依赖的上游能力。实现需可跨线程共享（工作池以引用方式并发调用）。
pub trait ChapterSource: Sync {
    /// 拉取目录并展平为有序章节列表；失败即 `DownloadError::Listing`。
    fn list_chapters(&self, book_id: &str) -> Result<Vec<ChapterRef>, DownloadError>;

    /// 单次请求单章正文；任何失败都返回 `None`，不向上抛出。
    fn fetch_chapter(&self, item_id: &str) -> Option<ChapterPayload>;

    /// 封面字节；失败返回 `None`。
    fn fetch_cover(&self, url: &str) -> Option<Vec<u8>>;
}
