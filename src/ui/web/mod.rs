//! Web UI：下载队列 + 已完成书籍列表（纯 HTML 前端）。

mod queue;
mod router;
mod routes;
mod state;
mod templates;

use std::net::{IpAddr, Ipv4Addr, SocketAddr};
use std::process::Command;
use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use tracing::{info, warn};

use crate::base_system::context::Config;
use crate::third_party::ApiClient;
use queue::DownloadQueue;
use state::{AppState, JobStore};

pub fn run(config: &Config, open_browser: bool) -> Result<()> {
    let bind_raw = std::env::var("TOMATO_WEB_ADDR").unwrap_or_else(|_| config.web_addr.clone());
    let bind = parse_bind_addr(&bind_raw)?;

    let library_root = config.default_save_dir();
    std::fs::create_dir_all(&library_root)
        .with_context(|| format!("创建保存目录失败: {}", library_root.display()))?;

    // 阻塞客户端只在队列线程里使用，不进入 tokio 运行时
    let client = ApiClient::new(config).context("初始化 HTTP 客户端失败")?;
    let jobs = Arc::new(JobStore::default());
    let (queue, _worker) = DownloadQueue::spawn(client, config.clone(), jobs.clone())
        .context("启动下载队列失败")?;

    let state = AppState {
        bind,
        library_root: Arc::new(library_root),
        default_workers: config.max_workers,
        jobs,
        queue,
    };

    let rt = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;
    rt.block_on(run_async(state, open_browser))
}

fn parse_bind_addr(raw: &str) -> Result<SocketAddr> {
    let s = raw.trim();
    if s.is_empty() {
        return Err(anyhow!("empty bind addr"));
    }
    if let Ok(a) = s.parse::<SocketAddr>() {
        return Ok(a);
    }

    // 容忍 IPv6 未加方括号的写法，如 "::1:5000"
    if !s.starts_with('[')
        && let Some((host, port)) = s.rsplit_once(':')
        && host.contains(':')
        && !port.is_empty()
        && port.chars().all(|c| c.is_ascii_digit())
        && let Ok(a) = format!("[{host}]:{port}").parse::<SocketAddr>()
    {
        return Ok(a);
    }

    Err(anyhow!(
        "invalid bind addr: '{s}'. Use '127.0.0.1:5000' or '[::1]:5000' (IPv6 needs brackets)."
    ))
}

fn browser_url(bind: SocketAddr) -> String {
    let mut target = bind;
    if target.ip().is_unspecified() {
        target.set_ip(IpAddr::V4(Ipv4Addr::LOCALHOST));
    }
    format!("http://{target}/")
}

fn open_in_browser(url: &str) -> std::io::Result<()> {
    if cfg!(target_os = "windows") {
        Command::new("explorer").arg(url).spawn()?;
        return Ok(());
    }
    if cfg!(target_os = "macos") {
        Command::new("open").arg(url).spawn()?;
        return Ok(());
    }
    Command::new("xdg-open").arg(url).spawn()?;
    Ok(())
}

async fn run_async(state: AppState, open_browser: bool) -> Result<()> {
    let bind = state.bind;
    let listener = tokio::net::TcpListener::bind(bind)
        .await
        .with_context(|| format!("bind failed: {bind}"))?;

    let url = browser_url(bind);
    info!(target: "web", "Web UI listening on {url} (set TOMATO_WEB_ADDR to override)");
    println!("Web UI listening on {url}");
    println!("Press Ctrl+C to stop.");

    if open_browser && let Err(e) = open_in_browser(&url) {
        warn!(target: "web", error = %e, "无法自动打开浏览器");
    }

    let app = router::build_router(state);
    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .with_graceful_shutdown(shutdown_signal())
    .await
    .map_err(|e| anyhow!(e))?;

    info!(target: "web", "Web UI stopped");
    Ok(())
}

async fn shutdown_signal() {
    let _ = tokio::signal::ctrl_c().await;
    println!("Stopping server...");
}
