// 下载任务错误类型

use crate::extractor::ExtractError;
use thiserror::Error;

/// 下载任务相关错误
#[derive(Debug, Error)]
pub enum DownloadError {
    /// 请求参数无效（如缺少 URL）
    #[error("{0}")]
    InvalidRequest(String),

    /// 任务不存在（未知或已被清理）
    #[error("Job not found")]
    NotFound(String),

    /// 提取器执行失败
    #[error(transparent)]
    Extraction(#[from] ExtractError),

    /// 进度归一化失败
    #[error("invalid progress value: {0}")]
    Normalization(String),
}

pub type DownloadResult<T> = std::result::Result<T, DownloadError>;
