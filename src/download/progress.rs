//! 进度上报与 CLI 进度条管理。

use indicatif::{ProgressBar, ProgressDrawTarget, ProgressStyle};

use super::models::{ProgressEvent, ProgressSnapshot};

pub type ProgressCallback = Box<dyn FnMut(ProgressEvent) + Send>;

/// 把流水线事件转发给调用方回调，并可选地驱动一个终端进度条。
pub struct ProgressReporter {
    snapshot: ProgressSnapshot,
    cb: Option<ProgressCallback>,
    bar: Option<ProgressBar>,
}

impl ProgressReporter {
    pub fn silent() -> Self {
        Self {
            snapshot: ProgressSnapshot::default(),
            cb: None,
            bar: None,
        }
    }

    pub fn with_callback(cb: ProgressCallback) -> Self {
        Self {
            cb: Some(cb),
            ..Self::silent()
        }
    }

    /// 终端模式：进度条画到 stderr。
    pub fn with_cli_bar() -> Self {
        let bar = ProgressBar::with_draw_target(Some(0), ProgressDrawTarget::stderr());
        let style = ProgressStyle::with_template(
            "{prefix} [{elapsed_precise}] {wide_bar} {pos}/{len} ({eta})",
        )
        .unwrap_or_else(|_| ProgressStyle::default_bar())
        .progress_chars("##-");
        bar.set_style(style);
        bar.set_prefix("下载进度");
        Self {
            bar: Some(bar),
            ..Self::silent()
        }
    }

    pub fn snapshot(&self) -> &ProgressSnapshot {
        &self.snapshot
    }

    pub(crate) fn emit(&mut self, event: ProgressEvent) {
        self.snapshot.apply(&event);
        if let Some(bar) = self.bar.as_ref() {
            match &event {
                ProgressEvent::Started { chapters_total } => {
                    bar.set_length(*chapters_total as u64);
                    bar.set_position(0);
                }
                ProgressEvent::Metadata { title, .. } => bar.set_prefix(title.clone()),
                ProgressEvent::ChapterDone { chapters_done } => {
                    bar.set_position(*chapters_done as u64)
                }
                ProgressEvent::Finished { .. } | ProgressEvent::Failed { .. } => {
                    bar.finish_and_clear()
                }
            }
        }
        if let Some(cb) = self.cb.as_mut() {
            cb(event);
        }
    }
}
