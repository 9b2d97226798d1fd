// 下载任务 API 处理器

use crate::downloader::{JobSnapshot, SubmitRequest};
use crate::server::error::{ApiError, ApiResult};
use crate::server::AppState;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

/// 提交下载请求体
#[derive(Debug, Default, Deserialize)]
pub struct DownloadBody {
    #[serde(default)]
    pub url: Option<String>,
    /// "video" 或 "audio"
    #[serde(default, rename = "type")]
    pub media_type: Option<String>,
    #[serde(default)]
    pub quality: Option<String>,
}

impl From<DownloadBody> for SubmitRequest {
    fn from(body: DownloadBody) -> Self {
        Self {
            url: body.url,
            media_type: body.media_type,
            quality: body.quality,
        }
    }
}

/// 提交成功响应
#[derive(Debug, Serialize, Deserialize)]
pub struct SubmitResponse {
    pub success: bool,
    pub job_id: String,
}

/// 提交下载任务
///
/// POST /download
pub async fn submit_download(
    State(state): State<AppState>,
    body: Result<Json<DownloadBody>, JsonRejection>,
) -> ApiResult<Json<SubmitResponse>> {
    let Json(body) = body.map_err(|rejection| {
        warn!("下载请求体解析失败: {}", rejection);
        ApiError::BadRequest(rejection.body_text())
    })?;

    info!(
        "API: 提交下载任务: url={:?}, type={:?}, quality={:?}",
        body.url, body.media_type, body.quality
    );

    let job_id = state.download_manager.submit(body.into())?;

    Ok(Json(SubmitResponse {
        success: true,
        job_id,
    }))
}

/// 查询任务进度
///
/// GET /progress/:job_id
pub async fn get_progress(
    State(state): State<AppState>,
    Path(job_id): Path<String>,
) -> ApiResult<Json<JobSnapshot>> {
    let snapshot = state.download_manager.poll(&job_id)?;
    Ok(Json(snapshot))
}
