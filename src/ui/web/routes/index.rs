use axum::http::{HeaderValue, header};
use axum::response::{Html, IntoResponse};

use crate::ui::web::templates;

pub(crate) async fn index() -> impl IntoResponse {
    let mut resp = Html(templates::INDEX_HTML).into_response();
    let headers = resp.headers_mut();
    headers.insert(
        header::CACHE_CONTROL,
        HeaderValue::from_static("no-store, no-cache, must-revalidate"),
    );
    headers.insert(header::PRAGMA, HeaderValue::from_static("no-cache"));
    headers.insert(header::EXPIRES, HeaderValue::from_static("0"));
    resp
}
