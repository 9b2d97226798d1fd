// 格式选择：把 (媒体类型, 清晰度) 映射为提取请求

use super::task::MediaType;
use crate::extractor::{ExtractRequest, PostProcess};
use std::path::Path;

/// 音频转码目标编码
pub const AUDIO_CODEC: &str = "mp3";
/// 音频转码目标码率 (kbps)
pub const AUDIO_BITRATE_KBPS: u32 = 320;
/// 仅音频的格式选择器
pub const AUDIO_SELECTOR: &str = "bestaudio/best";
/// 视频合并输出容器
pub const VIDEO_CONTAINER: &str = "mp4";
/// 默认清晰度标签
pub const DEFAULT_QUALITY: &str = "1080p";

/// 视频清晰度（按最大高度限制）
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum VideoQuality {
    P2160,
    #[default]
    P1080,
    P720,
    P480,
    P360,
}

impl VideoQuality {
    /// 解析清晰度标签，无法识别时回退到 1080p
    pub fn from_label(label: &str) -> Self {
        match label.trim().to_ascii_lowercase().as_str() {
            "2160p" => VideoQuality::P2160,
            "1080p" => VideoQuality::P1080,
            "720p" => VideoQuality::P720,
            "480p" => VideoQuality::P480,
            "360p" => VideoQuality::P360,
            _ => VideoQuality::default(),
        }
    }

    pub fn max_height(self) -> u32 {
        match self {
            VideoQuality::P2160 => 2160,
            VideoQuality::P1080 => 1080,
            VideoQuality::P720 => 720,
            VideoQuality::P480 => 480,
            VideoQuality::P360 => 360,
        }
    }

    /// 限高的"最佳视频 + 最佳音频"选择器
    pub fn selector(self) -> String {
        format!(
            "bestvideo[height<={}][ext=mp4]+bestaudio[ext=m4a]/best[ext=mp4]/best",
            self.max_height()
        )
    }
}

/// 输出路径模板：`<dir>/%(title)s.%(ext)s`
pub fn output_template(download_dir: &Path) -> String {
    download_dir
        .join("%(title)s.%(ext)s")
        .to_string_lossy()
        .to_string()
}

/// 构建提取请求
pub fn build_extract_request(
    url: &str,
    media_type: MediaType,
    quality: &str,
    download_dir: &Path,
) -> ExtractRequest {
    let output_template = output_template(download_dir);

    match media_type {
        MediaType::Video => ExtractRequest {
            url: url.to_string(),
            format: VideoQuality::from_label(quality).selector(),
            output_template,
            merge_output_format: Some(VIDEO_CONTAINER.to_string()),
            post_process: None,
        },
        MediaType::Audio => ExtractRequest {
            url: url.to_string(),
            format: AUDIO_SELECTOR.to_string(),
            output_template,
            merge_output_format: None,
            post_process: Some(PostProcess::ExtractAudio {
                codec: AUDIO_CODEC.to_string(),
                bitrate_kbps: AUDIO_BITRATE_KBPS,
            }),
        },
    }
}
