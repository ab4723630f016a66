use std::time::Duration;

use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, ACCEPT_ENCODING, CONNECTION, HeaderMap, HeaderValue, USER_AGENT};
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use super::ChapterSource;
use super::media_fetch;
use crate::base_system::context::Config;
use crate::download::error::DownloadError;
use crate::download::models::{ChapterPayload, ChapterRef, non_empty};

const BROWSER_UA: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120 Safari/537.36";

/// 正文接口成功时返回的 code。
const CONTENT_OK_CODE: i64 = 200;

#[derive(Debug, Deserialize)]
struct ListingResponse {
    code: i64,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    data: Option<ListingData>,
}

#[derive(Debug, Deserialize)]
struct ListingData {
    #[serde(rename = "chapterListWithVolume", default)]
    chapter_list_with_volume: Vec<Vec<ListedChapter>>,
}

#[derive(Debug, Deserialize)]
struct ListedChapter {
    #[serde(rename = "itemId")]
    item_id: ItemId,
    title: String,
}

#[derive(Debug, Deserialize)]
#[serde(untagged)]
enum ItemId {
    Text(String),
    Number(u64),
}

impl ItemId {
    fn into_string(self) -> String {
        match self {
            ItemId::Text(s) => s.trim().to_string(),
            ItemId::Number(n) => n.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct ContentResponse {
    code: i64,
    #[serde(default)]
    data: Option<ContentData>,
}

#[derive(Debug, Default, Deserialize)]
struct ContentData {
    #[serde(default)]
    content: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    book_name: Option<String>,
    #[serde(default)]
    pic: Option<String>,
}

/// 将目录接口的 JSON 展平为有序章节列表：卷按返回顺序拼接，卷内保持原顺序。
pub(crate) fn parse_listing(raw: Value) -> Result<Vec<ChapterRef>, String> {
    let resp: ListingResponse =
        serde_json::from_value(raw).map_err(|e| format!("目录结构无法解析: {e}"))?;
    if resp.code != 0 {
        return Err(format!(
            "API错误：{}",
            resp.message.unwrap_or_else(|| format!("code={}", resp.code))
        ));
    }
    let data = resp.data.ok_or_else(|| "目录响应缺少 data 字段".to_string())?;

    let chapters = data
        .chapter_list_with_volume
        .into_iter()
        .flatten()
        .enumerate()
        .map(|(ordinal, ch)| ChapterRef {
            id: ch.item_id.into_string(),
            title: ch.title.trim().to_string(),
            ordinal,
        })
        .collect();
    Ok(chapters)
}

/// 解析正文接口 JSON；code 不为 200 或结构不符时返回错误描述。
pub(crate) fn parse_content(raw: Value) -> Result<ChapterPayload, String> {
    let resp: ContentResponse =
        serde_json::from_value(raw).map_err(|e| format!("正文结构无法解析: {e}"))?;
    if resp.code != CONTENT_OK_CODE {
        return Err(format!("正文接口返回 code={}", resp.code));
    }
    let data = resp.data.unwrap_or_default();
    Ok(ChapterPayload {
        content: data.content.unwrap_or_default(),
        author: non_empty(data.author.as_deref()),
        book_name: non_empty(data.book_name.as_deref()),
        cover_url: non_empty(data.pic.as_deref()),
    })
}

/// 基于 reqwest 阻塞客户端的上游实现。每次请求只尝试一次，超时由客户端统一限制。
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    listing_url: String,
    content_url: String,
    cover_timeout: Duration,
}

impl ApiClient {
    pub fn new(cfg: &Config) -> Result<Self, DownloadError> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT_ENCODING, HeaderValue::from_static("identity"));
        headers.insert(CONNECTION, HeaderValue::from_static("keep-alive"));
        headers.insert(
            ACCEPT,
            HeaderValue::from_static("application/json, text/plain, */*"),
        );
        headers.insert(USER_AGENT, HeaderValue::from_static(BROWSER_UA));

        let client = Client::builder()
            .default_headers(headers)
            .timeout(cfg.request_timeout())
            .build()
            .map_err(|e| DownloadError::Client(e.to_string()))?;

        Ok(Self {
            client,
            listing_url: cfg.listing_url.trim().to_string(),
            content_url: cfg.content_url.trim().to_string(),
            cover_timeout: cfg.cover_timeout(),
        })
    }

    fn get_json(&self, url: &str, query: &[(&str, &str)]) -> reqwest::Result<Value> {
        self.client
            .get(url)
            .query(query)
            .send()?
            .error_for_status()?
            .json::<Value>()
    }
}

impl ChapterSource for ApiClient {
    fn list_chapters(&self, book_id: &str) -> Result<Vec<ChapterRef>, DownloadError> {
        let raw = self
            .get_json(&self.listing_url, &[("book_id", book_id)])
            .map_err(|e| DownloadError::Listing(e.to_string()))?;
        parse_listing(raw).map_err(DownloadError::Listing)
    }

    fn fetch_chapter(&self, item_id: &str) -> Option<ChapterPayload> {
        let raw = match self.get_json(&self.content_url, &[("item_id", item_id)]) {
            Ok(v) => v,
            Err(e) => {
                warn!(target: "download", item_id, error = %e, "下载章节失败");
                return None;
            }
        };
        match parse_content(raw) {
            Ok(payload) => {
                debug!(target: "download", item_id, bytes = payload.content.len(), "章节已下载");
                Some(payload)
            }
            Err(e) => {
                warn!(target: "download", item_id, error = %e, "章节响应无效");
                None
            }
        }
    }

    fn fetch_cover(&self, url: &str) -> Option<Vec<u8>> {
        match media_fetch::fetch_bytes(&self.client, url, self.cover_timeout) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                warn!(target: "epub", url, error = %e, "封面下载失败");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn listing_flattens_volumes_in_order() {
        let raw = json!({
            "code": 0,
            "data": {
                "chapterListWithVolume": [
                    [{"itemId": "11", "title": " 第一章 "}, {"itemId": 12, "title": "第二章"}],
                    [],
                    [{"itemId": "31", "title": "第三章"}]
                ]
            }
        });
        let chapters = parse_listing(raw).unwrap();
        let ids: Vec<_> = chapters.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids, ["11", "12", "31"]);
        assert_eq!(chapters[0].title, "第一章");
        assert_eq!(
            chapters.iter().map(|c| c.ordinal).collect::<Vec<_>>(),
            [0, 1, 2]
        );
    }

    #[test]
    fn listing_error_code_carries_message() {
        let err = parse_listing(json!({"code": 1, "message": "book not found"})).unwrap_err();
        assert!(err.contains("book not found"));
    }

    #[test]
    fn listing_with_wrong_shape_is_rejected() {
        assert!(parse_listing(json!({"code": 0, "data": {"chapterListWithVolume": "x"}})).is_err());
        assert!(parse_listing(json!(["not", "an", "object"])).is_err());
    }

    #[test]
    fn listing_without_volumes_is_empty() {
        let chapters = parse_listing(json!({"code": 0, "data": {}})).unwrap();
        assert!(chapters.is_empty());
    }

    #[test]
    fn content_payload_normalizes_blank_metadata() {
        let payload = parse_content(json!({
            "code": 200,
            "data": {"content": "line1\nline2", "author": "", "book_name": "Book", "pic": null}
        }))
        .unwrap();
        assert_eq!(payload.content, "line1\nline2");
        assert_eq!(payload.author, None);
        assert_eq!(payload.book_name.as_deref(), Some("Book"));
        assert_eq!(payload.cover_url, None);
    }

    #[test]
    fn content_non_success_code_is_error() {
        assert!(parse_content(json!({"code": 404, "data": {}})).is_err());
    }
}
