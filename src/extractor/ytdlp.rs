//! yt-dlp 子进程提取器
//!
//! 通过 `--progress-template` 让 yt-dlp 每行输出一条 JSON 进度，
//! 再通过 `--print after_move:` 输出最终标题

use super::{
    ExtractError, ExtractRequest, MediaExtractor, MediaInfo, PostProcess, ProgressEvent,
    ProgressPhase, ProgressSender,
};
use async_trait::async_trait;
use serde::Deserialize;
use std::path::PathBuf;
use std::process::Stdio;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::process::Command;
use tracing::{debug, info, warn};

/// 进度行前缀
const PROGRESS_MARKER: &str = "[media-fetch:progress]";
/// 标题行前缀
const TITLE_MARKER: &str = "[media-fetch:title]";

/// yt-dlp 进度字典（只取需要的字段）
#[derive(Debug, Deserialize)]
struct RawProgress {
    status: Option<String>,
    downloaded_bytes: Option<f64>,
    total_bytes: Option<f64>,
    total_bytes_estimate: Option<f64>,
    speed: Option<f64>,
    eta: Option<f64>,
    filename: Option<String>,
}

impl From<RawProgress> for ProgressEvent {
    fn from(raw: RawProgress) -> Self {
        let phase = match raw.status.as_deref() {
            Some("downloading") => Some(ProgressPhase::Downloading),
            Some("finished") => Some(ProgressPhase::Finished),
            _ => None,
        };
        Self {
            phase,
            downloaded_bytes: raw.downloaded_bytes,
            total_bytes: raw.total_bytes,
            total_bytes_estimate: raw.total_bytes_estimate,
            speed: raw.speed,
            eta: raw.eta,
            filename: raw.filename,
        }
    }
}

/// stdout 中可识别的一行
#[derive(Debug, PartialEq)]
enum OutputLine {
    Progress(ProgressEvent),
    Title(String),
}

/// 解析 yt-dlp 的一行 stdout，无法识别的行返回 None
fn parse_output_line(line: &str) -> Option<OutputLine> {
    let line = line.trim();

    if let Some(rest) = line.strip_prefix(PROGRESS_MARKER) {
        return match serde_json::from_str::<RawProgress>(rest.trim()) {
            Ok(raw) => Some(OutputLine::Progress(raw.into())),
            Err(e) => {
                debug!("无法解析进度行: {}, 错误: {}", rest, e);
                None
            }
        };
    }

    line.strip_prefix(TITLE_MARKER)
        .map(|title| OutputLine::Title(title.trim().to_string()))
}

/// 从 stderr 中提取最有意义的错误信息
fn extract_error_message(stderr_lines: &[String]) -> Option<String> {
    stderr_lines
        .iter()
        .rev()
        .find_map(|l| l.trim().strip_prefix("ERROR:").map(|m| m.trim().to_string()))
        .or_else(|| {
            stderr_lines
                .iter()
                .rev()
                .map(|l| l.trim())
                .find(|l| !l.is_empty())
                .map(|l| l.to_string())
        })
}

/// yt-dlp 提取器
#[derive(Debug, Clone)]
pub struct YtDlpExtractor {
    /// yt-dlp 可执行文件路径
    binary: PathBuf,
}

impl YtDlpExtractor {
    pub fn new(binary: impl Into<PathBuf>) -> Self {
        Self {
            binary: binary.into(),
        }
    }

    /// 构建 yt-dlp 命令行参数
    fn build_args(request: &ExtractRequest) -> Vec<String> {
        let mut args = vec![
            "--newline".to_string(),
            "--no-playlist".to_string(),
            "--no-warnings".to_string(),
            // --print 会隐含 --quiet，需要显式打开进度输出
            "--progress".to_string(),
            "--progress-template".to_string(),
            format!("download:{}%(progress)j", PROGRESS_MARKER),
            "--no-simulate".to_string(),
            "--print".to_string(),
            format!("after_move:{}%(title)s", TITLE_MARKER),
            "-f".to_string(),
            request.format.clone(),
        ];

        if let Some(container) = &request.merge_output_format {
            args.push("--merge-output-format".to_string());
            args.push(container.clone());
        }

        if let Some(PostProcess::ExtractAudio {
            codec,
            bitrate_kbps,
        }) = &request.post_process
        {
            args.extend([
                "-x".to_string(),
                "--audio-format".to_string(),
                codec.clone(),
                "--audio-quality".to_string(),
                format!("{}K", bitrate_kbps),
            ]);
        }

        args.extend([
            "-o".to_string(),
            request.output_template.clone(),
            "--".to_string(),
            request.url.clone(),
        ]);

        args
    }
}

#[async_trait]
impl MediaExtractor for YtDlpExtractor {
    fn name(&self) -> &str {
        "yt-dlp"
    }

    async fn extract(
        &self,
        request: ExtractRequest,
        progress: ProgressSender,
    ) -> Result<MediaInfo, ExtractError> {
        let args = Self::build_args(&request);
        debug!("启动 yt-dlp: {:?} {:?}", self.binary, args);

        let mut child = Command::new(&self.binary)
            .args(&args)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(ExtractError::Spawn)?;

        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| ExtractError::Failed("yt-dlp stdout unavailable".to_string()))?;
        let stderr = child
            .stderr
            .take()
            .ok_or_else(|| ExtractError::Failed("yt-dlp stderr unavailable".to_string()))?;

        // stderr 单独收集，避免管道写满阻塞子进程
        let stderr_reader = tokio::spawn(async move {
            let mut lines = BufReader::new(stderr).lines();
            let mut collected = Vec::new();
            while let Ok(Some(line)) = lines.next_line().await {
                collected.push(line);
            }
            collected
        });

        let mut title = None;
        let mut lines = BufReader::new(stdout).lines();
        while let Some(line) = lines.next_line().await? {
            match parse_output_line(&line) {
                Some(OutputLine::Progress(event)) => {
                    // 接收端已关闭时继续读完输出
                    let _ = progress.send(event);
                }
                Some(OutputLine::Title(t)) => title = Some(t),
                None => {}
            }
        }

        let status = child.wait().await?;
        let stderr_lines = stderr_reader.await.unwrap_or_default();

        if !status.success() {
            let message = extract_error_message(&stderr_lines)
                .unwrap_or_else(|| format!("yt-dlp exited with {}", status));
            warn!("yt-dlp 执行失败: {}", message);
            return Err(ExtractError::Failed(message));
        }

        let title = title.unwrap_or_else(|| "Unknown".to_string());
        info!("yt-dlp 提取完成: {}", title);
        Ok(MediaInfo { title })
    }
}
