use axum::Json;
use axum::extract::State;
use serde_json::{Value, json};

use crate::ui::web::state::AppState;

const VERSION: &str = env!("CARGO_PKG_VERSION");

/// 当前任务、排队数量与保存目录，前端轮询使用。
pub(crate) async fn api_status(State(state): State<AppState>) -> Json<Value> {
    let (current, pending) = state.jobs.summary();
    Json(json!({
        "version": VERSION,
        "bind_addr": state.bind.to_string(),
        "save_dir": state.library_root.to_string_lossy(),
        "default_workers": state.default_workers,
        "is_downloading": current.is_some(),
        "current": current,
        "pending": pending,
    }))
}
