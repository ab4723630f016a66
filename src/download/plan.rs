//! 下载计划准备：拉取目录、探测书籍元数据。

use tracing::{debug, info, warn};

use super::error::DownloadError;
use super::models::{BookMetadata, ChapterRef};
use crate::third_party::ChapterSource;

pub const DEFAULT_PROBE_LIMIT: usize = 3;

/// 拉取并展平目录。目录为空视为终止错误，不重试。
pub fn list_chapters<S: ChapterSource + ?Sized>(
    source: &S,
    book_id: &str,
) -> Result<Vec<ChapterRef>, DownloadError> {
    info!(target: "download", book_id, "正在获取章节信息");
    let chapters = source.list_chapters(book_id)?;
    if chapters.is_empty() {
        return Err(DownloadError::NoChapters {
            book_id: book_id.to_string(),
        });
    }
    info!(target: "download", book_id, total = chapters.len(), "共发现 {} 个章节", chapters.len());
    Ok(chapters)
}

/// 上游没有书籍级元数据接口，只能从章节正文接口顺带取作者/书名/封面。
///
/// 从第 0 章开始依次探测，最多 `probe_limit` 章，遇到第一个带有任一非空元数据字段的
/// 响应即停止；未取到的字段保留默认值。这是尽力而为的启发式：上游返回不稳定时，
/// 多次运行可能得到不同的元数据。
pub fn resolve_metadata<S: ChapterSource + ?Sized>(
    source: &S,
    chapters: &[ChapterRef],
    probe_limit: usize,
) -> BookMetadata {
    let mut meta = BookMetadata::default();
    for chapter in chapters.iter().take(probe_limit) {
        let Some(payload) = source.fetch_chapter(&chapter.id) else {
            debug!(target: "download", ordinal = chapter.ordinal, "元数据探测失败");
            continue;
        };
        if !payload.has_metadata() {
            debug!(target: "download", ordinal = chapter.ordinal, "元数据为空，继续探测");
            continue;
        }
        meta.apply(&payload);
        info!(
            target: "download",
            ordinal = chapter.ordinal,
            title = %meta.title,
            author = %meta.author,
            "元数据已获取"
        );
        return meta;
    }
    warn!(target: "download", probe_limit, "未能获取书籍元数据，使用默认值");
    meta
}
