use std::path::Path;
use std::time::{SystemTime, UNIX_EPOCH};

use axum::Json;
use axum::extract::{Path as AxumPath, State};
use axum::http::StatusCode;
use serde::Serialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use super::download::resolve_epub;
use crate::ui::web::state::AppState;

#[derive(Debug, Clone, Serialize)]
pub(crate) struct LibraryItem {
    name: String,
    rel_path: String,
    size: u64,
    modified_ms: Option<u64>,
}

pub(crate) async fn api_library(State(state): State<AppState>) -> Json<Value> {
    let base = state.library_root.clone();
    let base_for_task = base.clone();
    let items = tokio::task::spawn_blocking(move || scan_library(&base_for_task))
        .await
        .unwrap_or_default();

    Json(json!({
        "root": base.to_string_lossy(),
        "items": items,
    }))
}

pub(crate) async fn delete_book(
    State(state): State<AppState>,
    AxumPath(path): AxumPath<String>,
) -> Result<Json<Value>, StatusCode> {
    let target = resolve_epub(state.library_root.as_path(), &path)?;
    match tokio::fs::remove_file(&target).await {
        Ok(()) => {
            info!(target: "web", path = %target.display(), "已删除");
            Ok(Json(json!({ "ok": true })))
        }
        Err(e) => {
            warn!(target: "web", path = %target.display(), error = %e, "删除失败");
            Err(StatusCode::INTERNAL_SERVER_ERROR)
        }
    }
}

/// 库目录下已生成的 EPUB，最新的在前。目录不存在时返回空列表。
pub(crate) fn scan_library(root: &Path) -> Vec<LibraryItem> {
    let Ok(entries) = std::fs::read_dir(root) else {
        return Vec::new();
    };

    let mut out: Vec<LibraryItem> = entries
        .flatten()
        .filter_map(|entry| {
            let path = entry.path();
            let meta = entry.metadata().ok()?;
            let is_epub = path
                .extension()
                .and_then(|s| s.to_str())
                .is_some_and(|ext| ext.eq_ignore_ascii_case("epub"));
            if !meta.is_file() || !is_epub {
                return None;
            }
            let name = path.file_name()?.to_string_lossy().to_string();
            Some(LibraryItem {
                rel_path: name.clone(),
                name,
                size: meta.len(),
                modified_ms: meta.modified().ok().and_then(system_time_ms),
            })
        })
        .collect();

    out.sort_by(|a, b| {
        b.modified_ms
            .cmp(&a.modified_ms)
            .then_with(|| a.name.cmp(&b.name))
    });
    out
}

fn system_time_ms(t: SystemTime) -> Option<u64> {
    t.duration_since(UNIX_EPOCH)
        .ok()
        .map(|d| d.as_millis() as u64)
}
