use axum::Json;
use axum::extract::State;
use axum::http::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use tracing::{info, warn};

use crate::base_system::book_id::normalize_book_id;
use crate::download::downloader::clamp_workers;
use crate::ui::web::state::AppState;

#[derive(Debug, Deserialize)]
pub(crate) struct CreateJobReq {
    pub(crate) book_id: String,
    #[serde(default)]
    pub(crate) threads: Option<usize>,
}

type ApiError = (StatusCode, Json<Value>);

fn api_error(status: StatusCode, msg: &str) -> ApiError {
    (status, Json(json!({ "error": msg })))
}

pub(crate) async fn list_jobs(State(state): State<AppState>) -> Json<Value> {
    Json(json!({ "items": state.jobs.list() }))
}

/// 入队一本书；实际下载由队列线程串行执行。
pub(crate) async fn create_job(
    State(state): State<AppState>,
    Json(req): Json<CreateJobReq>,
) -> Result<Json<Value>, ApiError> {
    let Some(book_id) = normalize_book_id(&req.book_id) else {
        return Err(api_error(StatusCode::BAD_REQUEST, "请输入有效的 book_id"));
    };
    let workers = clamp_workers(req.threads.unwrap_or(state.default_workers));

    let job = state.jobs.create(book_id, workers);
    if !state.queue.enqueue(job.id) {
        warn!(target: "web", id = job.id, "下载队列已关闭");
        state.jobs.set_failed(job.id, "下载队列已关闭".to_string());
        return Err(api_error(StatusCode::SERVICE_UNAVAILABLE, "下载队列已关闭"));
    }

    info!(target: "web", id = job.id, book_id = %job.book_id, workers, "任务已加入队列");
    Ok(Json(json!({
        "id": job.id,
        "book_id": job.book_id,
        "workers": job.workers,
        "status": job.status,
    })))
}
