// API 错误类型

use crate::downloader::DownloadError;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;

/// HTTP 层错误
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// 请求参数错误
    #[error("{0}")]
    BadRequest(String),

    /// 任务不存在
    #[error("Job not found")]
    JobNotFound,

    #[error(transparent)]
    Internal(#[from] anyhow::Error),
}

pub type ApiResult<T> = Result<T, ApiError>;

impl From<DownloadError> for ApiError {
    fn from(err: DownloadError) -> Self {
        match err {
            DownloadError::InvalidRequest(message) => ApiError::BadRequest(message),
            DownloadError::NotFound(_) => ApiError::JobNotFound,
            other => ApiError::Internal(other.into()),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            ApiError::BadRequest(message) => (
                StatusCode::BAD_REQUEST,
                Json(json!({ "success": false, "message": message })),
            )
                .into_response(),
            // 与任务快照同形，轮询方可以统一按 status 字段处理
            ApiError::JobNotFound => (
                StatusCode::NOT_FOUND,
                Json(json!({ "status": "error", "message": "Job not found" })),
            )
                .into_response(),
            ApiError::Internal(e) => {
                tracing::error!("内部错误: {:#}", e);
                (
                    StatusCode::INTERNAL_SERVER_ERROR,
                    Json(json!({ "success": false, "message": e.to_string() })),
                )
                    .into_response()
            }
        }
    }
}
