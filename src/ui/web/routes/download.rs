use std::path::{Path, PathBuf};

use axum::body::Body;
use axum::extract::{Path as AxumPath, State};
use axum::http::{StatusCode, header};
use axum::response::Response;
use tokio_util::io::ReaderStream;

use crate::ui::web::state::AppState;

const EPUB_MIME: &str = "application/epub+zip";

/// RFC 5987 `filename*` 保留 UTF-8 书名，另附 ASCII 回退名给旧客户端。
fn make_content_disposition(filename: &str) -> Option<header::HeaderValue> {
    fn is_unreserved(b: u8) -> bool {
        b.is_ascii_alphanumeric() || matches!(b, b'-' | b'.' | b'_')
    }

    let encoded: String = filename
        .bytes()
        .map(|b| {
            if is_unreserved(b) {
                char::from(b).to_string()
            } else {
                format!("%{b:02X}")
            }
        })
        .collect();

    let ascii_fallback: String = filename
        .chars()
        .map(|c| {
            if c.is_ascii() && is_unreserved(c as u8) {
                c
            } else {
                '_'
            }
        })
        .collect();

    header::HeaderValue::from_str(&format!(
        "attachment; filename=\"{ascii_fallback}\"; filename*=UTF-8''{encoded}"
    ))
    .ok()
}

pub(crate) async fn download_file(
    State(state): State<AppState>,
    AxumPath(path): AxumPath<String>,
) -> Result<Response, StatusCode> {
    let target = resolve_epub(state.library_root.as_path(), &path)?;

    let file = tokio::fs::File::open(&target)
        .await
        .map_err(|_| StatusCode::NOT_FOUND)?;
    let body = Body::from_stream(ReaderStream::new(file));

    let mut resp = Response::new(body);
    resp.headers_mut().insert(
        header::CONTENT_TYPE,
        header::HeaderValue::from_static(EPUB_MIME),
    );
    if let Some(name) = target.file_name().and_then(|s| s.to_str())
        && let Some(hv) = make_content_disposition(name)
    {
        resp.headers_mut().insert(header::CONTENT_DISPOSITION, hv);
    }
    Ok(resp)
}

/// 把请求路径解析为库目录内的 `.epub` 文件。
///
/// 不存在 → 404；越出库目录或不是 EPUB → 403。
pub(crate) fn resolve_epub(base: &Path, path: &str) -> Result<PathBuf, StatusCode> {
    if path.trim().is_empty() {
        return Err(StatusCode::NOT_FOUND);
    }

    let base_canon = std::fs::canonicalize(base).map_err(|_| StatusCode::NOT_FOUND)?;
    let target = std::fs::canonicalize(base.join(path)).map_err(|_| StatusCode::NOT_FOUND)?;
    if !target.starts_with(&base_canon) {
        return Err(StatusCode::FORBIDDEN);
    }
    if !target.is_file() {
        return Err(StatusCode::NOT_FOUND);
    }
    let is_epub = target
        .extension()
        .and_then(|s| s.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"));
    if !is_epub {
        return Err(StatusCode::FORBIDDEN);
    }
    Ok(target)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn disposition_keeps_utf8_name_and_ascii_fallback() {
        let hv = make_content_disposition("测试 书.epub").unwrap();
        let s = hv.to_str().unwrap();
        assert!(s.starts_with("attachment; filename=\"____.epub\""));
        assert!(s.contains("filename*=UTF-8''%E6%B5%8B%E8%AF%95%20%E4%B9%A6.epub"));
    }

    #[test]
    fn resolve_rejects_escape_and_non_epub() {
        let root = tempfile::tempdir().unwrap();
        let lib = root.path().join("lib");
        std::fs::create_dir_all(&lib).unwrap();
        std::fs::write(lib.join("a.epub"), b"x").unwrap();
        std::fs::write(lib.join("notes.txt"), b"x").unwrap();
        std::fs::write(root.path().join("secret.epub"), b"x").unwrap();

        assert!(resolve_epub(&lib, "a.epub").is_ok());
        assert_eq!(resolve_epub(&lib, "missing.epub"), Err(StatusCode::NOT_FOUND));
        assert_eq!(resolve_epub(&lib, "notes.txt"), Err(StatusCode::FORBIDDEN));
        assert_eq!(resolve_epub(&lib, "../secret.epub"), Err(StatusCode::FORBIDDEN));
        assert_eq!(resolve_epub(&lib, ""), Err(StatusCode::NOT_FOUND));
    }
}
