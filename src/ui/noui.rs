//! 无 UI（命令行）模式：单本下载或交互式循环。

use std::io::{self, BufRead, Write};

use anyhow::{Context, Result, anyhow};
use tracing::info;

use crate::base_system::book_id::normalize_book_id;
use crate::base_system::context::Config;
use crate::download::models::DownloadOutcome;
use crate::download::{ProgressReporter, download_and_assemble};
use crate::third_party::ApiClient;

/// 给了 book_id 就下载一次后返回；否则进入交互循环，直到输入 q。
pub fn run(config: &Config, book_id: Option<&str>, threads: Option<usize>) -> Result<()> {
    let threads = threads.unwrap_or(config.max_workers);

    if let Some(input) = book_id {
        let id = normalize_book_id(input).ok_or_else(|| anyhow!("无效的书籍 ID: {input}"))?;
        let outcome = download_book(config, &id, threads)?;
        print_outcome(&outcome);
        return Ok(());
    }

    println!("欢迎使用番茄小说 EPUB 下载器。\n输入：小说ID/分享链接 | q 退出\n");
    loop {
        let prompt = format!(
            "请输入 小说ID/分享链接（q退出，保存到 {}）：",
            config.default_save_dir().display()
        );
        let Some(line) = read_line(&prompt)? else {
            break;
        };
        let text = line.trim();
        if text.is_empty() {
            continue;
        }
        if text.eq_ignore_ascii_case("q") {
            println!("已退出。");
            break;
        }
        let Some(id) = normalize_book_id(text) else {
            println!("无法识别的书籍 ID：{text}\n");
            continue;
        };
        match download_book(config, &id, threads) {
            Ok(outcome) => print_outcome(&outcome),
            Err(err) => println!("下载失败: {err:#}\n"),
        }
    }
    Ok(())
}

pub fn download_book(config: &Config, book_id: &str, threads: usize) -> Result<DownloadOutcome> {
    let client = ApiClient::new(config).context("初始化 HTTP 客户端失败")?;
    let mut reporter = ProgressReporter::with_cli_bar();
    info!(target: "download", book_id, threads, "开始下载");
    download_and_assemble(&client, config, book_id, threads, &mut reporter)
        .with_context(|| format!("下载失败 (book_id={book_id})"))
}

fn print_outcome(outcome: &DownloadOutcome) {
    println!(
        "下载完成：《{}》 {}/{} 章",
        outcome.title, outcome.chapters_written, outcome.chapters_total
    );
    println!("文件已保存到: {}\n", outcome.path.display());
}

/// stdin 关闭时返回 `None`。
fn read_line(prompt: &str) -> Result<Option<String>> {
    print!("{prompt}");
    io::stdout().flush().ok();
    let mut line = String::new();
    let n = io::stdin().lock().read_line(&mut line)?;
    Ok((n > 0).then_some(line))
}
