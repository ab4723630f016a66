//! 本地模拟的目录/正文/封面接口，供集成测试使用。

use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, mpsc};
use std::thread;
use std::time::Duration;

use serde_json::{Value, json};
use tomato_epub_downloader::base_system::context::Config;

pub static COVER_PNG: &[u8] = &[
    137, 80, 78, 71, 13, 10, 26, 10, 0, 0, 0, 13, 73, 72, 68, 82, 0, 0, 0, 1, 0, 0, 0, 1, 8, 4, 0,
    0, 0, 181, 28, 12, 2, 0, 0, 0, 11, 73, 68, 65, 84, 120, 218, 99, 252, 255, 23, 0, 2, 3, 1, 128,
    110, 220, 25, 0, 0, 0, 0, 73, 69, 78, 68, 174, 66, 96, 130,
];

pub const COVER_PATH: &str = "/cover.png";
#[allow(dead_code)]
pub const MISSING_COVER_PATH: &str = "/missing-cover.png";
#[allow(dead_code)]
pub const BOGUS_COVER_PATH: &str = "/not-an-image.png";

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Listing {
    /// `code = 0`，单卷或多卷。
    Volumes(Vec<Vec<(String, String)>>),
    /// 目录接口返回非 0 code。
    Code(i64, String),
    /// 目录接口直接返回 HTTP 错误。
    Status(u16),
}

#[allow(dead_code)]
#[derive(Debug, Clone)]
pub enum Reply {
    Ok {
        content: String,
        author: Option<String>,
        book_name: Option<String>,
        /// 封面路径，相对于桩服务根目录。
        cover: Option<&'static str>,
    },
    /// `code != 200`
    BadCode,
    /// HTTP 500
    Error,
}

#[allow(dead_code)]
impl Reply {
    pub fn text(content: &str) -> Self {
        Reply::Ok {
            content: content.to_string(),
            author: None,
            book_name: None,
            cover: None,
        }
    }

    pub fn with_meta(content: &str, author: &str, book_name: &str) -> Self {
        Reply::Ok {
            content: content.to_string(),
            author: Some(author.to_string()),
            book_name: Some(book_name.to_string()),
            cover: None,
        }
    }

    pub fn with_cover(self) -> Self {
        self.with_cover_at(COVER_PATH)
    }

    /// 封面指向 `path`：`MISSING_COVER_PATH` 返回 404，`BOGUS_COVER_PATH` 返回非图片内容。
    pub fn with_cover_at(self, path: &'static str) -> Self {
        match self {
            Reply::Ok {
                content,
                author,
                book_name,
                ..
            } => Reply::Ok {
                content,
                author,
                book_name,
                cover: Some(path),
            },
            other => other,
        }
    }
}

#[derive(Debug, Clone)]
pub struct StubBook {
    pub listing: Listing,
    pub replies: HashMap<String, Reply>,
}

#[allow(dead_code)]
impl StubBook {
    /// 单卷目录；`chapters` 为 (item_id, 标题, 回复)。
    pub fn single_volume(chapters: Vec<(&str, &str, Reply)>) -> Self {
        let volume = chapters
            .iter()
            .map(|(id, title, _)| (id.to_string(), title.to_string()))
            .collect();
        let replies = chapters
            .into_iter()
            .map(|(id, _, reply)| (id.to_string(), reply))
            .collect();
        Self {
            listing: Listing::Volumes(vec![volume]),
            replies,
        }
    }
}

pub struct UpstreamStub {
    pub base_url: String,
    hits: Arc<Mutex<HashMap<String, usize>>>,
    requests: Arc<AtomicUsize>,
    shutdown_tx: Option<mpsc::Sender<()>>,
    handle: Option<thread::JoinHandle<()>>,
}

#[allow(dead_code)]
impl UpstreamStub {
    pub fn spawn(book: StubBook) -> Self {
        let server = tiny_http::Server::http("127.0.0.1:0").expect("start upstream stub server");
        let addr = server.server_addr();
        let base_url = format!("http://{addr}");

        let hits = Arc::new(Mutex::new(HashMap::<String, usize>::new()));
        let requests = Arc::new(AtomicUsize::new(0));
        let (shutdown_tx, shutdown_rx) = mpsc::channel::<()>();

        let base_url_for_thread = base_url.clone();
        let hits_for_thread = hits.clone();
        let requests_for_thread = requests.clone();
        let handle = thread::spawn(move || {
            loop {
                if shutdown_rx.try_recv().is_ok() {
                    break;
                }

                let request = match server.recv_timeout(Duration::from_millis(20)) {
                    Ok(Some(req)) => req,
                    Ok(None) => continue,
                    Err(_) => break,
                };
                requests_for_thread.fetch_add(1, Ordering::SeqCst);

                let url = request.url().to_string();
                let (path, query) = url.split_once('?').unwrap_or((url.as_str(), ""));
                let params = parse_query(query);

                let (status, body): (u16, Vec<u8>) = match path {
                    "/all_items.php" => listing_response(&book.listing),
                    "/content.php" => {
                        let item_id = params.get("item_id").cloned().unwrap_or_default();
                        *hits_for_thread
                            .lock()
                            .unwrap()
                            .entry(item_id.clone())
                            .or_default() += 1;
                        content_response(book.replies.get(&item_id), &base_url_for_thread)
                    }
                    COVER_PATH => (200, COVER_PNG.to_vec()),
                    BOGUS_COVER_PATH => (200, b"<html>not an image</html>".to_vec()),
                    _ => (404, b"not found".to_vec()),
                };

                // 不复用连接：tiny_http 的连接线程有限，保持长连接的并发客户端会互相阻塞
                let response = tiny_http::Response::from_data(body)
                    .with_status_code(status)
                    .with_header(
                        tiny_http::Header::from_bytes(&b"Connection"[..], &b"close"[..])
                            .expect("valid header"),
                    );
                let _ = request.respond(response);
            }
        });

        Self {
            base_url,
            hits,
            requests,
            shutdown_tx: Some(shutdown_tx),
            handle: Some(handle),
        }
    }

    /// 指向本桩服务的配置，输出到 `save_dir`。
    pub fn config(&self, save_dir: &std::path::Path) -> Config {
        let mut config = Config::default();
        config.listing_url = format!("{}/all_items.php", self.base_url);
        config.content_url = format!("{}/content.php", self.base_url);
        config.save_path = save_dir.to_string_lossy().to_string();
        config.request_timeout = 5;
        config.cover_timeout = 5;
        config
    }

    /// 某个 item_id 被请求正文的次数。
    pub fn hits(&self, item_id: &str) -> usize {
        self.hits.lock().unwrap().get(item_id).copied().unwrap_or(0)
    }

    pub fn total_requests(&self) -> usize {
        self.requests.load(Ordering::SeqCst)
    }
}

impl Drop for UpstreamStub {
    fn drop(&mut self) {
        if let Some(tx) = self.shutdown_tx.take() {
            let _ = tx.send(());
        }
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

fn parse_query(query: &str) -> HashMap<String, String> {
    query
        .split('&')
        .filter_map(|pair| pair.split_once('='))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect()
}

fn json_body(value: Value) -> (u16, Vec<u8>) {
    (200, value.to_string().into_bytes())
}

fn listing_response(listing: &Listing) -> (u16, Vec<u8>) {
    match listing {
        Listing::Volumes(volumes) => {
            let volumes: Vec<Value> = volumes
                .iter()
                .map(|vol| {
                    Value::Array(
                        vol.iter()
                            .map(|(id, title)| json!({ "itemId": id, "title": title }))
                            .collect(),
                    )
                })
                .collect();
            json_body(json!({
                "code": 0,
                "message": "success",
                "data": { "chapterListWithVolume": volumes }
            }))
        }
        Listing::Code(code, message) => json_body(json!({ "code": code, "message": message })),
        Listing::Status(status) => (*status, b"upstream error".to_vec()),
    }
}

fn content_response(reply: Option<&Reply>, base_url: &str) -> (u16, Vec<u8>) {
    match reply {
        Some(Reply::Ok {
            content,
            author,
            book_name,
            cover,
        }) => json_body(json!({
            "code": 200,
            "data": {
                "content": content,
                "author": author.clone().unwrap_or_default(),
                "book_name": book_name.clone().unwrap_or_default(),
                "pic": cover.as_ref().map(|path| format!("{base_url}{path}")).unwrap_or_default(),
            }
        })),
        Some(Reply::BadCode) => json_body(json!({ "code": 500, "msg": "limited" })),
        Some(Reply::Error) | None => (500, b"internal error".to_vec()),
    }
}
