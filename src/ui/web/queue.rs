//! 下载队列：单个后台线程按入队顺序逐本处理。

use std::any::Any;
use std::panic::{self, AssertUnwindSafe};
use std::sync::Arc;
use std::thread::{self, JoinHandle};

use crossbeam_channel::{self as channel, Sender};
use tracing::{error, info, warn};

use super::state::JobStore;
use crate::base_system::context::Config;
use crate::download::{ProgressReporter, download_and_assemble};
use crate::third_party::ChapterSource;

#[derive(Clone)]
pub(crate) struct DownloadQueue {
    tx: Sender<u64>,
}

impl DownloadQueue {
    /// 启动队列线程。所有 `DownloadQueue` 句柄被丢弃后，线程处理完手头任务即退出。
    pub(crate) fn spawn<S>(
        source: S,
        config: Config,
        jobs: Arc<JobStore>,
    ) -> std::io::Result<(Self, JoinHandle<()>)>
    where
        S: ChapterSource + Send + 'static,
    {
        let (tx, rx) = channel::unbounded::<u64>();
        let handle = thread::Builder::new()
            .name("download-queue".to_string())
            .spawn(move || {
                for id in rx.iter() {
                    let run = panic::catch_unwind(AssertUnwindSafe(|| {
                        process_job(&source, &config, &jobs, id)
                    }));
                    // panic 只让当前任务失败，后续任务照常处理
                    if let Err(payload) = run {
                        let message = panic_message(payload.as_ref());
                        error!(target: "queue", id, panic = %message, "任务线程异常");
                        jobs.set_failed(id, format!("下载过程异常: {message}"));
                    }
                }
                info!(target: "queue", "下载队列已停止");
            })?;
        Ok((Self { tx }, handle))
    }

    pub(crate) fn enqueue(&self, id: u64) -> bool {
        self.tx.send(id).is_ok()
    }
}

fn panic_message(payload: &(dyn Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        (*s).to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}

fn process_job<S: ChapterSource + ?Sized>(
    source: &S,
    config: &Config,
    jobs: &Arc<JobStore>,
    id: u64,
) {
    let Some(job) = jobs.get(id) else {
        warn!(target: "queue", id, "任务不存在，跳过");
        return;
    };
    jobs.set_running(id);
    info!(target: "queue", id, book_id = %job.book_id, workers = job.workers, "开始处理任务");

    let sink = jobs.clone();
    let mut reporter =
        ProgressReporter::with_callback(Box::new(move |event| sink.apply_event(id, &event)));

    match download_and_assemble(source, config, &job.book_id, job.workers, &mut reporter) {
        Ok(outcome) => {
            info!(target: "queue", id, path = %outcome.path.display(), "任务完成");
            jobs.set_completed(id, &outcome.path);
        }
        Err(e) => {
            warn!(target: "queue", id, error = %e, "任务失败");
            jobs.set_failed(id, e.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicUsize, Ordering};

    use super::*;
    use crate::download::error::DownloadError;
    use crate::download::models::{ChapterPayload, ChapterRef};
    use crate::ui::web::state::JobStatus;

    #[derive(Default)]
    struct ScriptedSource {
        order: Mutex<Vec<String>>,
        active: AtomicUsize,
        overlap: AtomicUsize,
    }

    impl ChapterSource for ScriptedSource {
        fn list_chapters(&self, book_id: &str) -> Result<Vec<ChapterRef>, DownloadError> {
            if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
                self.overlap.fetch_add(1, Ordering::SeqCst);
            }
            self.order.lock().unwrap().push(book_id.to_string());
            std::thread::sleep(std::time::Duration::from_millis(20));
            self.active.fetch_sub(1, Ordering::SeqCst);
            if book_id == "boom" {
                panic!("listing exploded");
            }
            if book_id == "bad" {
                return Err(DownloadError::Listing("code=1".into()));
            }
            Ok(vec![ChapterRef {
                id: format!("{book_id}-0"),
                title: "第一章".into(),
                ordinal: 0,
            }])
        }

        fn fetch_chapter(&self, _item_id: &str) -> Option<ChapterPayload> {
            Some(ChapterPayload {
                content: "正文".into(),
                book_name: Some("测试书".into()),
                ..Default::default()
            })
        }

        fn fetch_cover(&self, _url: &str) -> Option<Vec<u8>> {
            None
        }
    }

    struct SharedSource(Arc<ScriptedSource>);

    impl ChapterSource for SharedSource {
        fn list_chapters(&self, book_id: &str) -> Result<Vec<ChapterRef>, DownloadError> {
            self.0.list_chapters(book_id)
        }
        fn fetch_chapter(&self, item_id: &str) -> Option<ChapterPayload> {
            self.0.fetch_chapter(item_id)
        }
        fn fetch_cover(&self, url: &str) -> Option<Vec<u8>> {
            self.0.fetch_cover(url)
        }
    }

    #[test]
    fn jobs_run_one_at_a_time_in_enqueue_order() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.save_path = dir.path().to_string_lossy().to_string();
        let jobs = Arc::new(JobStore::default());
        let source = Arc::new(ScriptedSource::default());
        let (queue, handle) =
            DownloadQueue::spawn(SharedSource(source.clone()), config, jobs.clone()).unwrap();

        let ids: Vec<u64> = ["a", "bad", "b"]
            .iter()
            .map(|b| {
                let job = jobs.create(b.to_string(), 2);
                assert!(queue.enqueue(job.id));
                job.id
            })
            .collect();
        drop(queue);
        handle.join().unwrap();

        assert_eq!(*source.order.lock().unwrap(), ["a", "bad", "b"]);
        assert_eq!(source.overlap.load(Ordering::SeqCst), 0);

        let first = jobs.get(ids[0]).unwrap();
        assert_eq!(first.status, JobStatus::Completed);
        assert_eq!(first.output_file.as_deref(), Some("测试书.epub"));
        assert_eq!((first.chapters_done, first.chapters_total), (1, 1));

        let failed = jobs.get(ids[1]).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error.unwrap().contains("code=1"));

        // 同名输出覆盖，不影响后续任务
        assert_eq!(jobs.get(ids[2]).unwrap().status, JobStatus::Completed);
    }

    #[test]
    fn panicking_job_fails_and_queue_keeps_going() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = Config::default();
        config.save_path = dir.path().to_string_lossy().to_string();
        let jobs = Arc::new(JobStore::default());
        let source = Arc::new(ScriptedSource::default());
        let (queue, handle) =
            DownloadQueue::spawn(SharedSource(source.clone()), config, jobs.clone()).unwrap();

        let boom = jobs.create("boom".to_string(), 1);
        let next = jobs.create("c".to_string(), 1);
        assert!(queue.enqueue(boom.id));
        assert!(queue.enqueue(next.id));
        drop(queue);
        handle.join().unwrap();

        let failed = jobs.get(boom.id).unwrap();
        assert_eq!(failed.status, JobStatus::Failed);
        assert!(failed.error.unwrap().contains("listing exploded"));
        assert_eq!(jobs.get(next.id).unwrap().status, JobStatus::Completed);
        assert_eq!(*source.order.lock().unwrap(), ["boom", "c"]);
    }
}
