//! 下载主流程编排：目录 → 元数据 → 并发拉正文 → 组装 EPUB。

use std::path::Path;

use tracing::{error, info, warn};

use super::error::DownloadError;
use super::fetch_pool::FetchPool;
use super::models::{DownloadOutcome, ProgressEvent};
use super::plan::{list_chapters, resolve_metadata};
use super::progress::ProgressReporter;
use crate::base_system::context::{Config, MAX_WORKERS, RECOMMENDED_MAX_WORKERS};
use crate::book_parser::epub_generator;
use crate::third_party::ChapterSource;

/// 把调用方给的线程数限制到 `1..=MAX_WORKERS`。
pub fn clamp_workers(requested: usize) -> usize {
    let workers = requested.clamp(1, MAX_WORKERS);
    if workers > RECOMMENDED_MAX_WORKERS {
        warn!(
            target: "download",
            workers,
            "线程数超过 {}，可能触发上游限流",
            RECOMMENDED_MAX_WORKERS
        );
    }
    workers
}

/// 下载一本书并写出 EPUB，输出目录取自配置。
pub fn download_and_assemble<S: ChapterSource + ?Sized>(
    source: &S,
    config: &Config,
    book_id: &str,
    worker_count: usize,
    reporter: &mut ProgressReporter,
) -> Result<DownloadOutcome, DownloadError> {
    let output_dir = config.default_save_dir();
    let result = run_pipeline(source, config, book_id, worker_count, &output_dir, reporter);
    match &result {
        Ok(outcome) => reporter.emit(ProgressEvent::Finished {
            path: outcome.path.clone(),
        }),
        Err(e) => {
            error!(target: "download", book_id, error = %e, "下载失败");
            reporter.emit(ProgressEvent::Failed {
                message: e.to_string(),
            });
        }
    }
    result
}

fn run_pipeline<S: ChapterSource + ?Sized>(
    source: &S,
    config: &Config,
    book_id: &str,
    worker_count: usize,
    output_dir: &Path,
    reporter: &mut ProgressReporter,
) -> Result<DownloadOutcome, DownloadError> {
    let workers = clamp_workers(worker_count);

    let chapters = list_chapters(source, book_id)?;
    reporter.emit(ProgressEvent::Started {
        chapters_total: chapters.len(),
    });

    let metadata = resolve_metadata(source, &chapters, config.metadata_probe_limit);
    reporter.emit(ProgressEvent::Metadata {
        title: metadata.title.clone(),
        author: metadata.author.clone(),
    });

    info!(target: "download", book_id, workers, "开始下载章节内容");
    let fetched = FetchPool::new(source, workers).run(&chapters, |done| {
        reporter.emit(ProgressEvent::ChapterDone {
            chapters_done: done,
        })
    });

    let written = fetched.iter().filter(|f| f.content.is_some()).count();
    let failed = fetched.len() - written;
    if failed > 0 {
        warn!(target: "download", book_id, failed, "部分章节下载失败，已跳过");
    }

    let path = epub_generator::assemble(
        source,
        book_id,
        &metadata,
        &fetched,
        output_dir,
        &config.language,
    )?;

    Ok(DownloadOutcome {
        path,
        title: metadata.title,
        chapters_total: chapters.len(),
        chapters_written: written,
    })
}
