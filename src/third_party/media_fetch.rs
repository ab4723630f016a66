use std::time::Duration;

use anyhow::{Result, anyhow};
use reqwest::blocking::Client;
use reqwest::header::{ACCEPT, HeaderValue};

/// 下载一张图片（封面），单次请求、独立超时。
pub(crate) fn fetch_bytes(client: &Client, url: &str, timeout: Duration) -> Result<Vec<u8>> {
    let url = url.trim();
    if url.is_empty() {
        return Err(anyhow!("empty url"));
    }

    let resp = client
        .get(url)
        .header(ACCEPT, HeaderValue::from_static("image/*, */*"))
        .timeout(timeout)
        .send()?
        .error_for_status()?;
    let bytes = resp.bytes()?;
    if bytes.is_empty() {
        return Err(anyhow!("empty body"));
    }
    Ok(bytes.to_vec())
}
