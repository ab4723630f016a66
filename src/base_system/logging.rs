//! 日志：控制台（stderr）+ `<数据目录>/logs/latest.log`。
//!
//! `latest.log` 超过上限时在启动时归档；进程正常结束、Ctrl+C 或主线程 panic 时
//! 也会把本次日志打包成 `log_<时间>.zip`。

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use std::{io, panic, thread};

use time::OffsetDateTime;
use time::macros::format_description;
use tracing::{error, info};
use tracing_appender::non_blocking::{NonBlockingBuilder, WorkerGuard};
use tracing_appender::rolling;
use tracing_subscriber::Layer;
use tracing_subscriber::filter::LevelFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use zip::CompressionMethod;
use zip::write::FileOptions;

const LATEST_LOG: &str = "latest.log";
const ROTATE_AT_BYTES: u64 = 10 * 1024 * 1024;
/// 等后台写线程把缓冲刷进文件再打包。
const FLUSH_GRACE: Duration = Duration::from_millis(200);

#[derive(Debug, thiserror::Error)]
pub enum LogError {
    #[error("日志系统初始化失败: {0}")]
    Subscriber(#[from] tracing_subscriber::util::TryInitError),
    #[error("日志文件读写失败: {0}")]
    Io(#[from] io::Error),
    #[error("日志归档失败: {0}")]
    Zip(#[from] zip::result::ZipError),
    #[error("归档文件名生成失败: {0}")]
    Time(#[from] time::error::Format),
}

#[derive(Debug, Clone, Default)]
pub struct LogOptions {
    /// 控制台输出 DEBUG 级别；文件始终记录 DEBUG。
    pub debug: bool,
    /// Web 模式交给 tokio 处理 Ctrl+C，这里不再抢占信号。
    pub handle_ctrlc: bool,
    /// 日志目录为 `<data_dir>/logs`，未指定时使用当前目录。
    pub data_dir: Option<PathBuf>,
}

/// 持有写线程的 guard；drop 时刷盘并归档。
pub struct LogSystem {
    session: Arc<LogSession>,
}

impl LogSystem {
    pub fn init(options: &LogOptions) -> Result<Self, LogError> {
        let logs_dir = match &options.data_dir {
            Some(base) => base.join("logs"),
            None => PathBuf::from("logs"),
        };
        fs::create_dir_all(&logs_dir)?;
        let latest_log = logs_dir.join(LATEST_LOG);

        if fs::metadata(&latest_log).is_ok_and(|m| m.len() >= ROTATE_AT_BYTES) {
            archive_log_file(&latest_log, &logs_dir)?;
        }

        let (file_writer, guard) = NonBlockingBuilder::default()
            .lossy(false)
            .finish(rolling::never(&logs_dir, LATEST_LOG));

        let console_level = if options.debug {
            LevelFilter::DEBUG
        } else {
            LevelFilter::INFO
        };

        tracing_subscriber::registry()
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_writer(io::stderr)
                    .with_filter(console_level),
            )
            .with(
                fmt::layer()
                    .with_thread_names(true)
                    .with_ansi(false)
                    .with_writer(file_writer)
                    .with_filter(LevelFilter::DEBUG),
            )
            .try_init()?;

        let session = Arc::new(LogSession {
            logs_dir,
            latest_log,
            guard: Mutex::new(Some(guard)),
            closed: AtomicBool::new(false),
        });

        if options.handle_ctrlc {
            let on_signal = Arc::clone(&session);
            let _ = ctrlc::set_handler(move || {
                on_signal.close();
                std::process::exit(130);
            });
        }
        session.install_panic_hook();

        Ok(Self { session })
    }
}

impl Drop for LogSystem {
    fn drop(&mut self) {
        self.session.close();
    }
}

struct LogSession {
    logs_dir: PathBuf,
    latest_log: PathBuf,
    guard: Mutex<Option<WorkerGuard>>,
    closed: AtomicBool,
}

impl LogSession {
    /// 工作线程的 panic 由调用方自行兜底（如下载队列），只有主线程 panic 才收尾归档。
    fn install_panic_hook(self: &Arc<Self>) {
        let session = Arc::clone(self);
        let previous = panic::take_hook();
        panic::set_hook(Box::new(move |info| {
            let thread = thread::current();
            let name = thread.name().unwrap_or("<unnamed>");
            error!(thread = name, "panic: {info}");
            if name == "main" {
                session.close();
            }
            previous(info);
        }));
    }

    fn close(&self) {
        if self.closed.swap(true, Ordering::SeqCst) {
            return;
        }
        if let Ok(mut guard) = self.guard.lock() {
            guard.take();
        }
        thread::sleep(FLUSH_GRACE);

        if let Err(err) = archive_log_file(&self.latest_log, &self.logs_dir) {
            eprintln!("日志归档失败: {err}");
        }
    }
}

/// 把 `latest_log` 压进 `logs_dir/log_<时间>.zip` 并删除原文件。空日志直接删除。
pub(crate) fn archive_log_file(
    latest_log: &Path,
    logs_dir: &Path,
) -> Result<Option<PathBuf>, LogError> {
    let size = match fs::metadata(latest_log) {
        Ok(meta) => meta.len(),
        Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(None),
        Err(e) => return Err(e.into()),
    };
    if size == 0 {
        let _ = fs::remove_file(latest_log);
        return Ok(None);
    }

    let stamp = OffsetDateTime::now_utc().format(format_description!(
        "[year][month][day]_[hour][minute][second]"
    ))?;
    let archive_path = logs_dir.join(format!("log_{stamp}.zip"));

    {
        let mut zip = zip::ZipWriter::new(File::create(&archive_path)?);
        zip.start_file(
            format!("{stamp}.log"),
            FileOptions::default().compression_method(CompressionMethod::Deflated),
        )?;
        io::copy(&mut File::open(latest_log)?, &mut zip)?;
        zip.finish()?;
    }
    let _ = fs::remove_file(latest_log);

    info!("日志已归档: {}", archive_path.display());
    Ok(Some(archive_path))
}
