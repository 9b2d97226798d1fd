// 健康检查

use crate::server::AppState;
use axum::extract::State;
use axum::Json;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    /// 未到终态的任务数
    pub active_jobs: usize,
    /// 仍在存储中的任务总数
    pub tracked_jobs: usize,
    /// 正在占用执行槽位的任务数
    pub running_jobs: usize,
}

/// GET /health
pub async fn health_check(State(state): State<AppState>) -> Json<HealthResponse> {
    let store = state.download_manager.store();
    Json(HealthResponse {
        status: "healthy".to_string(),
        active_jobs: store.active_count(),
        tracked_jobs: store.len(),
        running_jobs: state.download_manager.running_jobs(),
    })
}
