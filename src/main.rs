//! 番茄小说 EPUB 下载器命令行入口。
//!
//! - 给出 book_id：下载一本后退出
//! - 不给参数：交互式循环
//! - `--server`：启动 Web UI 与下载队列

use std::path::Path;

use anyhow::{Context, Result};
use clap::Parser;
use tracing::info;

use tomato_epub_downloader::base_system::config::load_or_create_with_base;
use tomato_epub_downloader::base_system::context::Config;
use tomato_epub_downloader::base_system::logging::{LogOptions, LogSystem};
use tomato_epub_downloader::ui;

const VERSION: &str = env!("CARGO_PKG_VERSION");

#[derive(Debug, Parser)]
#[command(name = "tomato-epub-downloader")]
#[command(about = "Tomato Novel EPUB Downloader")]
struct Cli {
    /// 小说 ID 或分享链接；省略时进入交互模式
    book_id: Option<String>,

    /// 章节下载线程数（默认取配置中的 max_workers）
    #[arg(short = 't', long)]
    threads: Option<usize>,

    /// 启用服务器模式（Web UI）
    #[arg(long, default_value_t = false)]
    server: bool,

    /// 启用调试日志输出
    #[arg(long, default_value_t = false)]
    debug: bool,

    /// 数据目录路径（用于存放 config.yml、logs 和默认下载目录）
    #[arg(long)]
    data_dir: Option<String>,

    /// 服务器模式下不自动打开浏览器
    #[arg(long, default_value_t = false)]
    no_browser: bool,

    /// 显示版本信息后退出
    #[arg(long, default_value_t = false)]
    version: bool,
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    if cli.version {
        println!("tomato-epub-downloader v{VERSION}");
        return Ok(());
    }

    let data_dir = cli.data_dir.as_deref().map(Path::new);
    let _log = init_logging(cli.debug, cli.server, data_dir)?;

    let config = load_or_create_with_base::<Config>(None, data_dir)
        .context("加载配置失败")?
        .with_base_dir(data_dir);
    info!(target: "startup", "当前版本: v{}", VERSION);

    if cli.server {
        if cli.book_id.is_some() {
            info!(target: "startup", "服务器模式忽略命令行中的 book_id");
        }
        return ui::web::run(&config, config.open_browser && !cli.no_browser);
    }

    ui::noui::run(&config, cli.book_id.as_deref(), cli.threads)
}

fn init_logging(debug: bool, server: bool, data_dir: Option<&Path>) -> Result<LogSystem> {
    let options = LogOptions {
        debug,
        handle_ctrlc: !server,
        data_dir: data_dir.map(Path::to_path_buf),
    };
    LogSystem::init(&options).context("初始化日志失败")
}
