//! 媒体提取协作者
//!
//! 把"按 URL 抓取媒体并上报进度"抽象为 `MediaExtractor` trait，
//! 生产实现为驱动 yt-dlp 子进程的 `YtDlpExtractor`，测试中可替换为假实现。

pub mod ytdlp;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::mpsc;

pub use ytdlp::YtDlpExtractor;

/// 进度事件发送端（由 Job Runner 持有接收端）
pub type ProgressSender = mpsc::UnboundedSender<ProgressEvent>;

/// 原始进度阶段
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressPhase {
    /// 下载中
    Downloading,
    /// 原始下载完成（后处理可能仍在进行）
    Finished,
}

/// 提取器上报的原始进度事件
///
/// 所有数值均为原始值，可能缺失，由归一化器负责处理
#[derive(Debug, Clone, PartialEq, Default)]
pub struct ProgressEvent {
    pub phase: Option<ProgressPhase>,
    /// 已下载字节数
    pub downloaded_bytes: Option<f64>,
    /// 总字节数（精确值）
    pub total_bytes: Option<f64>,
    /// 总字节数（估算值）
    pub total_bytes_estimate: Option<f64>,
    /// 下载速度 (bytes/s)
    pub speed: Option<f64>,
    /// 剩余时间（秒），0 表示未知
    pub eta: Option<f64>,
    /// 原始文件名（可能包含完整路径）
    pub filename: Option<String>,
}

impl ProgressEvent {
    /// 构造下载中事件
    pub fn downloading(downloaded: f64, total: Option<f64>) -> Self {
        Self {
            phase: Some(ProgressPhase::Downloading),
            downloaded_bytes: Some(downloaded),
            total_bytes: total,
            ..Default::default()
        }
    }

    /// 构造下载完成事件
    pub fn finished(filename: impl Into<String>) -> Self {
        Self {
            phase: Some(ProgressPhase::Finished),
            filename: Some(filename.into()),
            ..Default::default()
        }
    }

    pub fn with_speed(mut self, speed: f64) -> Self {
        self.speed = Some(speed);
        self
    }

    pub fn with_eta(mut self, eta: f64) -> Self {
        self.eta = Some(eta);
        self
    }

    pub fn with_filename(mut self, filename: impl Into<String>) -> Self {
        self.filename = Some(filename.into());
        self
    }
}

/// 后处理指令
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PostProcess {
    /// 提取音频并转码
    ExtractAudio {
        /// 目标编码，如 "mp3"
        codec: String,
        /// 目标码率 (kbps)
        bitrate_kbps: u32,
    },
}

/// 提取请求（传给提取器的选项集合）
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExtractRequest {
    /// 媒体 URL
    pub url: String,
    /// 格式选择器（对提取器不透明）
    pub format: String,
    /// 输出路径模板，如 "downloads/%(title)s.%(ext)s"
    pub output_template: String,
    /// 合并输出容器（视频下载时为 mp4）
    pub merge_output_format: Option<String>,
    /// 可选后处理
    pub post_process: Option<PostProcess>,
}

/// 提取成功后返回的媒体元数据
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MediaInfo {
    pub title: String,
}

/// 提取失败
#[derive(Debug, Error)]
pub enum ExtractError {
    /// 无法启动提取进程
    #[error("failed to launch extractor: {0}")]
    Spawn(#[source] std::io::Error),
    /// 提取器返回错误
    #[error("{0}")]
    Failed(String),
    /// IO 错误
    #[error("extractor io error: {0}")]
    Io(#[from] std::io::Error),
}

/// 媒体提取协作者
///
/// 实现方在抓取过程中通过 `progress` 发送零个或多个进度事件，
/// 完成后返回媒体元数据或错误
#[async_trait]
pub trait MediaExtractor: Send + Sync {
    /// 提取器名称（用于日志）
    fn name(&self) -> &str;

    async fn extract(
        &self,
        request: ExtractRequest,
        progress: ProgressSender,
    ) -> Result<MediaInfo, ExtractError>;
}
