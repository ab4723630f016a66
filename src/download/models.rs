//! 下载相关的数据模型定义。
//!
//! 包含章节引用、单章接口结果、书籍元数据、进度事件等核心数据结构。

use std::path::PathBuf;

use serde::Serialize;

pub const DEFAULT_AUTHOR: &str = "Unknown Author";
pub const DEFAULT_TITLE: &str = "Unknown Title";

/// 目录中的一章。`ordinal` 是在原始目录中的位置，也是唯一的排序依据。
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ChapterRef {
    pub id: String,
    pub title: String,
    pub ordinal: usize,
}

/// 正文接口对单个 item_id 的返回。空字符串的元数据字段已归一为 `None`。
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChapterPayload {
    pub content: String,
    pub author: Option<String>,
    pub book_name: Option<String>,
    pub cover_url: Option<String>,
}

impl ChapterPayload {
    pub fn has_metadata(&self) -> bool {
        self.author.is_some() || self.book_name.is_some() || self.cover_url.is_some()
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChapterContent {
    pub title: String,
    pub text: String,
}

impl ChapterContent {
    /// 空正文视为缺失。
    pub fn from_payload(chapter: &ChapterRef, payload: ChapterPayload) -> Option<Self> {
        if payload.content.trim().is_empty() {
            return None;
        }
        Some(Self {
            title: chapter.title.clone(),
            text: payload.content,
        })
    }
}

/// 工作池的输出：与输入按位置一一对应。
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FetchedChapter {
    pub chapter: ChapterRef,
    pub content: Option<ChapterContent>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookMetadata {
    pub author: String,
    pub title: String,
    pub cover_url: Option<String>,
}

impl Default for BookMetadata {
    fn default() -> Self {
        Self {
            author: DEFAULT_AUTHOR.to_string(),
            title: DEFAULT_TITLE.to_string(),
            cover_url: None,
        }
    }
}

impl BookMetadata {
    /// 用探测结果中非空的字段覆盖默认值。
    pub(crate) fn apply(&mut self, payload: &ChapterPayload) {
        if let Some(author) = &payload.author {
            self.author = author.clone();
        }
        if let Some(name) = &payload.book_name {
            self.title = name.clone();
        }
        if let Some(url) = &payload.cover_url {
            self.cover_url = Some(url.clone());
        }
    }
}

/// 流水线对外发出的进度信号；展示状态由调用方自己维护。
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ProgressEvent {
    Started { chapters_total: usize },
    Metadata { title: String, author: String },
    ChapterDone { chapters_done: usize },
    Finished { path: PathBuf },
    Failed { message: String },
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ProgressSnapshot {
    pub chapters_total: usize,
    pub chapters_done: usize,
    pub book_title: Option<String>,
}

impl ProgressSnapshot {
    pub fn apply(&mut self, event: &ProgressEvent) {
        match event {
            ProgressEvent::Started { chapters_total } => {
                self.chapters_total = *chapters_total;
                self.chapters_done = 0;
            }
            ProgressEvent::Metadata { title, .. } => self.book_title = Some(title.clone()),
            ProgressEvent::ChapterDone { chapters_done } => {
                self.chapters_done = (*chapters_done).min(self.chapters_total)
            }
            ProgressEvent::Finished { .. } | ProgressEvent::Failed { .. } => {}
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DownloadOutcome {
    pub path: PathBuf,
    pub title: String,
    pub chapters_total: usize,
    pub chapters_written: usize,
}

pub(crate) fn non_empty(value: Option<&str>) -> Option<String> {
    value
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
}
