use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;

use super::queue::DownloadQueue;
use crate::download::models::ProgressEvent;

#[derive(Clone)]
pub(crate) struct AppState {
    pub(crate) bind: SocketAddr,
    pub(crate) library_root: Arc<PathBuf>,
    pub(crate) default_workers: usize,
    pub(crate) jobs: Arc<JobStore>,
    pub(crate) queue: DownloadQueue,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub(crate) enum JobStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl JobStatus {
    pub(crate) fn is_terminal(self) -> bool {
        matches!(self, Self::Completed | Self::Failed)
    }
}

/// 队列中的一本书。入队时创建；只在 Running 期间被队列线程修改。
#[derive(Debug, Clone, Serialize)]
pub(crate) struct DownloadJob {
    pub(crate) id: u64,
    pub(crate) book_id: String,
    pub(crate) workers: usize,
    pub(crate) status: JobStatus,
    pub(crate) chapters_total: usize,
    pub(crate) chapters_done: usize,
    pub(crate) title: Option<String>,
    pub(crate) output_file: Option<String>,
    pub(crate) error: Option<String>,
    pub(crate) created_ms: u64,
    pub(crate) updated_ms: u64,
}

#[derive(Debug, Default)]
pub(crate) struct JobStore {
    next_id: AtomicU64,
    inner: Mutex<HashMap<u64, DownloadJob>>,
}

impl JobStore {
    pub(crate) fn create(&self, book_id: String, workers: usize) -> DownloadJob {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed) + 1;
        let now = now_ms();
        let job = DownloadJob {
            id,
            book_id,
            workers,
            status: JobStatus::Pending,
            chapters_total: 0,
            chapters_done: 0,
            title: None,
            output_file: None,
            error: None,
            created_ms: now,
            updated_ms: now,
        };
        self.lock().insert(id, job.clone());
        job
    }

    pub(crate) fn get(&self, id: u64) -> Option<DownloadJob> {
        self.lock().get(&id).cloned()
    }

    /// 按入队顺序返回。
    pub(crate) fn list(&self) -> Vec<DownloadJob> {
        let mut v: Vec<DownloadJob> = self.lock().values().cloned().collect();
        v.sort_by_key(|j| j.id);
        v
    }

    /// 正在运行的任务与排队数，供状态接口使用。
    pub(crate) fn summary(&self) -> (Option<DownloadJob>, usize) {
        let g = self.lock();
        let running = g
            .values()
            .find(|j| j.status == JobStatus::Running)
            .cloned();
        let pending = g
            .values()
            .filter(|j| j.status == JobStatus::Pending)
            .count();
        (running, pending)
    }

    pub(crate) fn set_running(&self, id: u64) {
        self.update(id, |j| {
            j.status = JobStatus::Running;
            j.error = None;
        });
    }

    /// 把流水线事件映射到任务字段。终态事件由 `set_completed` / `set_failed` 处理。
    pub(crate) fn apply_event(&self, id: u64, event: &ProgressEvent) {
        self.update(id, |j| match event {
            ProgressEvent::Started { chapters_total } => {
                j.chapters_total = *chapters_total;
                j.chapters_done = 0;
            }
            ProgressEvent::Metadata { title, .. } => j.title = Some(title.clone()),
            ProgressEvent::ChapterDone { chapters_done } => {
                j.chapters_done = (*chapters_done).min(j.chapters_total)
            }
            ProgressEvent::Finished { .. } | ProgressEvent::Failed { .. } => {}
        });
    }

    pub(crate) fn set_completed(&self, id: u64, output: &Path) {
        let name = output
            .file_name()
            .map(|s| s.to_string_lossy().to_string());
        self.update(id, |j| {
            j.status = JobStatus::Completed;
            j.output_file = name;
            j.error = None;
        });
    }

    pub(crate) fn set_failed(&self, id: u64, msg: String) {
        self.update(id, |j| {
            j.status = JobStatus::Failed;
            j.error = Some(msg);
        });
    }

    fn update<F: FnOnce(&mut DownloadJob)>(&self, id: u64, f: F) {
        let mut g = self.lock();
        let Some(job) = g.get_mut(&id) else {
            return;
        };
        if job.status.is_terminal() {
            return;
        }
        f(job);
        job.updated_ms = now_ms();
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<u64, DownloadJob>> {
        self.inner.lock().unwrap_or_else(|e| e.into_inner())
    }
}

pub(crate) fn now_ms() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ids_increase_and_list_keeps_enqueue_order() {
        let store = JobStore::default();
        let a = store.create("1".into(), 8);
        let b = store.create("2".into(), 4);
        assert!(b.id > a.id);
        let ids: Vec<_> = store.list().iter().map(|j| j.book_id.clone()).collect();
        assert_eq!(ids, ["1", "2"]);
        assert_eq!(store.summary().1, 2);
    }

    #[test]
    fn events_update_progress_and_terminal_state_is_final() {
        let store = JobStore::default();
        let job = store.create("9".into(), 2);
        store.set_running(job.id);
        store.apply_event(job.id, &ProgressEvent::Started { chapters_total: 3 });
        store.apply_event(
            job.id,
            &ProgressEvent::Metadata {
                title: "书".into(),
                author: "某人".into(),
            },
        );
        store.apply_event(job.id, &ProgressEvent::ChapterDone { chapters_done: 5 });

        let j = store.get(job.id).unwrap();
        assert_eq!(j.status, JobStatus::Running);
        assert_eq!((j.chapters_done, j.chapters_total), (3, 3));
        assert_eq!(j.title.as_deref(), Some("书"));

        store.set_completed(job.id, Path::new("/tmp/out/书.epub"));
        store.set_failed(job.id, "late".into());
        let j = store.get(job.id).unwrap();
        assert_eq!(j.status, JobStatus::Completed);
        assert_eq!(j.output_file.as_deref(), Some("书.epub"));
        assert_eq!(j.error, None);
    }
}
