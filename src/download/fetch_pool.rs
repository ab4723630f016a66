//! 章节正文并发下载工作池。
//!
//! 固定数量的工作线程从任务队列取章节，结果按下标写回槽位，
//! 因此输出顺序只取决于输入顺序，与完成先后无关。

use std::thread;

use crossbeam_channel as channel;
use tracing::debug;

use super::models::{ChapterContent, ChapterRef, FetchedChapter};
use crate::third_party::ChapterSource;

pub(crate) struct FetchPool<'a, S: ChapterSource + ?Sized> {
    source: &'a S,
    workers: usize,
}

impl<'a, S: ChapterSource + ?Sized> FetchPool<'a, S> {
    pub(crate) fn new(source: &'a S, workers: usize) -> Self {
        Self {
            source,
            workers: workers.max(1),
        }
    }

    /// 下载全部章节。每章只请求一次；`on_done` 在协调线程上于每章结束后调用，
    /// 参数为已完成数量（单调递增，最终等于章节总数）。
    pub(crate) fn run<F>(&self, chapters: &[ChapterRef], mut on_done: F) -> Vec<FetchedChapter>
    where
        F: FnMut(usize),
    {
        if chapters.is_empty() {
            return Vec::new();
        }

        let workers = self.workers.min(chapters.len());
        let (job_tx, job_rx) = channel::unbounded::<usize>();
        let (done_tx, done_rx) = channel::unbounded::<(usize, Option<ChapterContent>)>();

        for idx in 0..chapters.len() {
            // 接收端在本函数内存活，发送不会失败
            let _ = job_tx.send(idx);
        }
        drop(job_tx);

        let mut slots: Vec<Option<Option<ChapterContent>>> = vec![None; chapters.len()];

        thread::scope(|scope| {
            for _ in 0..workers {
                let job_rx = job_rx.clone();
                let done_tx = done_tx.clone();
                let source = self.source;
                scope.spawn(move || {
                    for idx in job_rx.iter() {
                        let chapter = &chapters[idx];
                        let content = source
                            .fetch_chapter(&chapter.id)
                            .and_then(|payload| ChapterContent::from_payload(chapter, payload));
                        if done_tx.send((idx, content)).is_err() {
                            return;
                        }
                    }
                });
            }
            drop(done_tx);

            let mut done = 0usize;
            for (idx, content) in done_rx.iter() {
                if slots[idx].is_none() {
                    slots[idx] = Some(content);
                    done += 1;
                    on_done(done);
                }
            }
        });

        debug!(target: "download", total = chapters.len(), workers, "工作池结束");

        chapters
            .iter()
            .cloned()
            .zip(slots)
            .map(|(chapter, slot)| FetchedChapter {
                chapter,
                content: slot.flatten(),
            })
            .collect()
    }
}
