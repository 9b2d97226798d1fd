//! 进度归一化
//!
//! 把提取器上报的原始进度（字节数、速度、剩余秒数、原始路径）
//! 转换为可直接展示的快照增量

use super::error::{DownloadError, DownloadResult};
use super::task::{JobStatus, SnapshotPatch, CALCULATING};
use crate::extractor::{ProgressEvent, ProgressPhase};

const UNITS: [&str; 5] = ["B", "KB", "MB", "GB", "TB"];

/// 按 1024 进制选择单位，返回 (数值, 单位)
fn scale_bytes(bytes: f64) -> (f64, &'static str) {
    let mut value = bytes;
    let mut unit = 0;
    while value >= 1024.0 && unit < UNITS.len() - 1 {
        value /= 1024.0;
        unit += 1;
    }
    (value, UNITS[unit])
}

/// 格式化大小，保留一位小数，如 "12.5 MB"
pub fn format_size(bytes: f64) -> String {
    let (value, unit) = scale_bytes(bytes);
    format!("{:.1} {}", value, unit)
}

/// 格式化速度，保留两位小数，如 "1.50 MB/s"；速度为 0 或未知时显示 "Calculating..."
pub fn format_speed(speed: Option<f64>) -> String {
    match speed {
        Some(s) if s > 0.0 => {
            let (value, unit) = scale_bytes(s);
            format!("{:.2} {}/s", value, unit)
        }
        _ => CALCULATING.to_string(),
    }
}

/// 格式化剩余时间
///
/// - 未知或 0：Calculating...
/// - 小于 60 秒：`42s`（不足 1 秒为 `0s`）
/// - 小于 1 小时：`3m 5s`
/// - 其他：`2h 15m`
pub fn format_eta(eta: Option<f64>) -> String {
    let secs = match eta {
        Some(e) if e > 0.0 => e as u64,
        _ => return CALCULATING.to_string(),
    };

    if secs < 60 {
        format!("{}s", secs)
    } else if secs < 3600 {
        format!("{}m {}s", secs / 60, secs % 60)
    } else {
        format!("{}h {}m", secs / 3600, (secs % 3600) / 60)
    }
}

/// 计算百分比，保留一位小数并限制在 [0, 100]
pub fn compute_percent(downloaded: f64, total: f64) -> f64 {
    if total <= 0.0 {
        return 0.0;
    }
    let percent = (downloaded / total * 100.0).clamp(0.0, 100.0);
    (percent * 10.0).round() / 10.0
}

/// 去掉目录部分，兼容 `/` 和 `\` 分隔符
pub fn display_filename(raw: &str) -> String {
    raw.rsplit(['/', '\\'])
        .next()
        .unwrap_or(raw)
        .to_string()
}

/// 校验数值：必须有限且非负
fn checked(name: &str, value: Option<f64>) -> DownloadResult<Option<f64>> {
    match value {
        Some(v) if !v.is_finite() || v < 0.0 => Err(DownloadError::Normalization(format!(
            "{}={}",
            name, v
        ))),
        other => Ok(other),
    }
}

/// 把原始进度事件转换为快照增量
///
/// 未知阶段的事件返回 `Ok(None)`，调用方直接忽略
pub fn normalize(event: &ProgressEvent) -> DownloadResult<Option<SnapshotPatch>> {
    match event.phase {
        Some(ProgressPhase::Downloading) => normalize_downloading(event).map(Some),
        Some(ProgressPhase::Finished) => Ok(Some(SnapshotPatch::processing())),
        None => Ok(None),
    }
}

fn normalize_downloading(event: &ProgressEvent) -> DownloadResult<SnapshotPatch> {
    let downloaded = checked("downloaded_bytes", event.downloaded_bytes)?.unwrap_or(0.0);
    let total = checked("total_bytes", event.total_bytes)?
        .filter(|t| *t > 0.0)
        .or(checked("total_bytes_estimate", event.total_bytes_estimate)?)
        .unwrap_or(0.0);
    let speed = checked("speed", event.speed)?;
    let eta = checked("eta", event.eta)?;

    let filename = event
        .filename
        .as_deref()
        .map(display_filename)
        .unwrap_or_else(|| "Unknown".to_string());

    Ok(SnapshotPatch {
        status: Some(JobStatus::Downloading),
        percent: Some(compute_percent(downloaded, total)),
        speed: Some(format_speed(speed)),
        eta: Some(format_eta(eta)),
        filename: Some(filename),
        total_size: Some(format_size(total)),
        downloaded: Some(format_size(downloaded)),
        message: None,
    })
}
