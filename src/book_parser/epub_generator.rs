//! EPUB 生成器。

use std::fs;
use std::io::{Cursor, Read as _, Write as _};
use std::path::{Path, PathBuf};

use chrono::{DateTime, Utc};
use epub_builder::{EpubBuilder, EpubContent, EpubVersion, ReferenceType, ZipLibrary};
use image::ImageFormat;
use tracing::{info, warn};

use super::html_utils::{escape_html, render_chapter_body};
use crate::base_system::context::output_stem;
use crate::download::error::DownloadError;
use crate::download::models::{BookMetadata, FetchedChapter};
use crate::third_party::ChapterSource;

/// 用于从 book_id 确定性生成 UUID v5 的命名空间。
/// 这保证同一本书（同 book_id）的 dc:identifier 永远不变。
const EPUB_UUID_NAMESPACE: uuid::Uuid = uuid::Uuid::from_bytes([
    0x6b, 0xa7, 0xb8, 0x10, 0x9d, 0xad, 0x11, 0xd1, 0x80, 0xb4, 0x00, 0xc0, 0x4f, 0xd4, 0x30, 0xc8,
]);

const GENERATOR: &str = "Tomato-EPUB-Downloader";

const STYLESHEET: &str = "body { font-family: serif; line-height: 1.5; }
h1 { font-size: 1.4em; text-align: center; margin: 1em 0; }
p { text-indent: 2em; margin: 0 0 .8em 0; }";

/// 用过滤后的章节构建 EPUB 并写入 `output_dir/<书名>.epub`。
///
/// 缺失或空白的章节被跳过，其余章节保持原有相对顺序；文件名沿用目录中的原始序号。
/// 没有任何可用章节时返回 `Assembly`，且不会创建输出文件。
pub fn assemble<S: ChapterSource + ?Sized>(
    source: &S,
    book_id: &str,
    metadata: &BookMetadata,
    chapters: &[FetchedChapter],
    output_dir: &Path,
    language: &str,
) -> Result<PathBuf, DownloadError> {
    let usable: Vec<_> = chapters
        .iter()
        .filter_map(|f| {
            f.content
                .as_ref()
                .filter(|c| !c.text.trim().is_empty())
                .map(|c| (f.chapter.ordinal, c))
        })
        .collect();
    if usable.is_empty() {
        return Err(DownloadError::Assembly);
    }

    info!(target: "epub", book_id, chapters = usable.len(), "正在生成EPUB文件");

    let mut generator = EpubGenerator::new(book_id, metadata, language)?;

    if let Some(url) = metadata.cover_url.as_deref()
        && let Some(bytes) = source.fetch_cover(url)
    {
        generator.set_cover(bytes);
    }

    for (ordinal, content) in usable {
        generator.add_chapter(ordinal, &content.title, &content.text);
    }

    let output_path = output_dir.join(format!("{}.epub", output_stem(&metadata.title, book_id)));
    generator.generate(&output_path)?;
    info!(target: "epub", path = %output_path.display(), "EPUB文件已保存");
    Ok(output_path)
}

struct PendingChapter {
    file_name: String,
    title: String,
    html: String,
}

pub struct EpubGenerator {
    book: EpubBuilder<ZipLibrary>,
    chapters: Vec<PendingChapter>,
    language: String,
    /// 原始 book_id，用于生成确定性 UUID 并在后处理中替换为 dc:identifier 的值。
    book_id: String,
}

impl EpubGenerator {
    pub fn new(book_id: &str, metadata: &BookMetadata, language: &str) -> Result<Self, DownloadError> {
        let zip = ZipLibrary::new().map_err(|e| DownloadError::write(book_id, e))?;
        let mut book = EpubBuilder::new(zip).map_err(|e| DownloadError::write(book_id, e))?;

        book.epub_version(EpubVersion::V30);

        let stable_uuid = uuid::Uuid::new_v5(&EPUB_UUID_NAMESPACE, book_id.as_bytes());
        book.set_uuid(stable_uuid);
        book.set_modified_date(reproducible_date());
        book.metadata("title", metadata.title.as_str()).ok();
        book.metadata("lang", language).ok();
        // toc.ncx docTitle 和 nav.xhtml title 显示书名
        book.metadata("toc_name", metadata.title.as_str()).ok();
        book.metadata("generator", GENERATOR).ok();

        let author = metadata.author.trim();
        if !author.is_empty() {
            book.metadata("author", author).ok();
        }

        Ok(Self {
            book,
            chapters: Vec::new(),
            language: language.to_string(),
            book_id: book_id.to_string(),
        })
    }

    /// 封面嵌入失败只记录日志；无法识别的图片格式直接跳过。
    pub fn set_cover(&mut self, bytes: Vec<u8>) {
        let Some((path, mime)) = cover_target(&bytes) else {
            warn!(target: "epub", bytes = bytes.len(), "封面不是可识别的图片，已跳过");
            return;
        };
        if let Err(e) = self.book.add_cover_image(path, Cursor::new(bytes), mime) {
            warn!(target: "epub", error = %e, "封面添加失败");
        }
    }

    pub fn add_chapter(&mut self, ordinal: usize, title: &str, text: &str) {
        let html = wrap_chapter_html(title, &render_chapter_body(text), &self.language);
        self.chapters.push(PendingChapter {
            file_name: format!("chapter_{ordinal:05}.xhtml"),
            title: title.to_string(),
            html,
        });
    }

    pub fn generate(mut self, output_path: &Path) -> Result<(), DownloadError> {
        let write_err = |e: &dyn std::fmt::Display| DownloadError::write(output_path, e);

        self.book
            .stylesheet(Cursor::new(STYLESHEET))
            .map_err(|e| write_err(&e))?;

        for chapter in &self.chapters {
            self.book
                .add_content(
                    EpubContent::new(chapter.file_name.as_str(), Cursor::new(chapter.html.as_bytes()))
                        .title(chapter.title.as_str())
                        .reftype(ReferenceType::Text),
                )
                .map_err(|e| write_err(&e))?;
        }

        let parent = output_path.parent().unwrap_or_else(|| Path::new("."));
        fs::create_dir_all(parent).map_err(|e| write_err(&e))?;

        // 先生成到内存，再后处理 identifier 并统一 zip 条目时间戳
        let mut buffer = Vec::new();
        self.book.generate(&mut buffer).map_err(|e| write_err(&e))?;
        let buffer = self.fixup_epub(buffer).map_err(|e| write_err(&e))?;

        // 写临时文件后原子替换，失败时不留下半成品
        let mut tmp = tempfile::NamedTempFile::new_in(parent).map_err(|e| write_err(&e))?;
        tmp.write_all(&buffer).map_err(|e| write_err(&e))?;
        tmp.persist(output_path).map_err(|e| write_err(&e.error))?;
        Ok(())
    }

    /// 后处理 EPUB zip：
    /// 1. 将 content.opf 和 toc.ncx 中的 `urn:uuid:xxx` 替换为原始 book_id
    /// 2. 在 toc.ncx 的 `<head>` 中补充 `dtb:uid`
    /// 3. 所有条目使用固定时间戳，相同输入得到字节一致的文件
    fn fixup_epub(&self, epub_bytes: Vec<u8>) -> anyhow::Result<Vec<u8>> {
        let stable_uuid = uuid::Uuid::new_v5(&EPUB_UUID_NAMESPACE, self.book_id.as_bytes());
        let urn_str = format!("urn:uuid:{}", stable_uuid.hyphenated());
        let book_id = escape_html(&self.book_id);

        let mut archive = zip::ZipArchive::new(Cursor::new(epub_bytes))?;
        let mut entries = Vec::with_capacity(archive.len());
        for i in 0..archive.len() {
            let mut entry = archive.by_index(i)?;
            let name = entry.name().to_string();
            let compression = entry.compression();
            let mut data = Vec::new();
            entry.read_to_end(&mut data)?;
            entries.push((name, compression, data));
        }
        drop(archive);

        let dtb_uid_meta = format!("<meta name=\"dtb:uid\" content=\"{book_id}\" />");
        let mut out = Cursor::new(Vec::new());
        {
            let mut writer = zip::ZipWriter::new(&mut out);
            for (name, compression, data) in entries {
                let options = zip::write::FileOptions::default()
                    .compression_method(compression)
                    .last_modified_time(zip::DateTime::default());
                writer.start_file(name.as_str(), options)?;

                let needs_fixup = name.ends_with("content.opf") || name.ends_with("toc.ncx");
                if !needs_fixup {
                    writer.write_all(&data)?;
                    continue;
                }
                match String::from_utf8(data) {
                    Ok(text) => {
                        let mut fixed = text.replace(&urn_str, &book_id);
                        if name.ends_with("toc.ncx") && !fixed.contains("dtb:uid") {
                            fixed = fixed.replace(
                                "<meta name=\"dtb:depth\"",
                                &format!("{dtb_uid_meta}\n    <meta name=\"dtb:depth\""),
                            );
                        }
                        writer.write_all(fixed.as_bytes())?;
                    }
                    Err(e) => writer.write_all(&e.into_bytes())?,
                }
            }
            writer.finish()?;
        }

        Ok(out.into_inner())
    }
}

/// dcterms:modified 的取值：遵循 SOURCE_DATE_EPOCH，未设置时固定为 Unix 纪元。
fn reproducible_date() -> DateTime<Utc> {
    std::env::var("SOURCE_DATE_EPOCH")
        .ok()
        .and_then(|raw| raw.trim().parse::<i64>().ok())
        .and_then(|secs| DateTime::<Utc>::from_timestamp(secs, 0))
        .unwrap_or_default()
}

fn cover_target(bytes: &[u8]) -> Option<(&'static str, &'static str)> {
    match image::guess_format(bytes).ok()? {
        ImageFormat::Jpeg => Some(("images/cover.jpg", "image/jpeg")),
        ImageFormat::Png => Some(("images/cover.png", "image/png")),
        ImageFormat::WebP => Some(("images/cover.webp", "image/webp")),
        ImageFormat::Gif => Some(("images/cover.gif", "image/gif")),
        _ => None,
    }
}

fn wrap_chapter_html(title: &str, body: &str, lang: &str) -> String {
    let escaped_title = escape_html(title);
    let lang = escape_html(lang);
    format!(
        "<?xml version='1.0' encoding='utf-8'?>\n<!DOCTYPE html>\n<html xmlns=\"http://www.w3.org/1999/xhtml\" xmlns:epub=\"http://www.idpf.org/2007/ops\" lang=\"{lang}\" xml:lang=\"{lang}\">\n  <head>\n    <title>{escaped_title}</title>\n    <link href=\"stylesheet.css\" rel=\"stylesheet\" type=\"text/css\"/>\n  </head>\n  <body><h1>{escaped_title}</h1>\n{body}\n  </body>\n</html>"
    )
}
