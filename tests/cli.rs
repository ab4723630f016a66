use std::fs;
use std::path::Path;

use predicates::prelude::*;

mod upstream_stub;

use upstream_stub::{Listing, Reply, StubBook, UpstreamStub};

fn write_config(data_dir: &Path, stub: &UpstreamStub, save_dir: &Path) {
    let config = stub.config(save_dir);
    let yaml = serde_yaml::to_string(&config).unwrap();
    fs::write(data_dir.join("config.yml"), yaml).unwrap();
}

#[test]
fn version_flag_prints_version() {
    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tomato-epub-downloader");
    cmd.arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains(env!("CARGO_PKG_VERSION")));
}

#[test]
fn downloads_book_and_prints_output_path() {
    let stub = UpstreamStub::spawn(StubBook::single_volume(vec![
        ("11", "开篇", Reply::with_meta("第一段", "某作者", "命令行之书")),
        ("12", "坏章", Reply::Error),
        ("13", "结尾", Reply::text("最后一段")),
    ]));
    let data = tempfile::tempdir().unwrap();
    let save = data.path().join("books");
    write_config(data.path(), &stub, &save);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tomato-epub-downloader");
    cmd.args(["123", "-t", "2", "--data-dir"])
        .arg(data.path())
        .assert()
        .success()
        .stdout(predicate::str::contains("文件已保存到"))
        .stdout(predicate::str::contains("命令行之书.epub"));

    assert!(save.join("命令行之书.epub").is_file());
    assert!(data.path().join("logs").is_dir());
}

#[test]
fn listing_error_exits_non_zero() {
    let stub = UpstreamStub::spawn(StubBook {
        listing: Listing::Code(1, "gone".into()),
        replies: Default::default(),
    });
    let data = tempfile::tempdir().unwrap();
    let save = data.path().join("books");
    write_config(data.path(), &stub, &save);

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tomato-epub-downloader");
    cmd.args(["5", "--data-dir"])
        .arg(data.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("获取章节列表失败"));

    assert!(!save.exists() || fs::read_dir(&save).unwrap().next().is_none());
}

#[test]
fn invalid_book_id_is_rejected() {
    let data = tempfile::tempdir().unwrap();

    let mut cmd = assert_cmd::cargo::cargo_bin_cmd!("tomato-epub-downloader");
    cmd.args(["not-a-book", "--data-dir"])
        .arg(data.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("无效的书籍 ID"));

    // 首次运行会生成带注释的默认配置
    let config = fs::read_to_string(data.path().join("config.yml")).unwrap();
    assert!(config.contains("max_workers"));
}
