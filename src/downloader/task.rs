use serde::{Deserialize, Serialize};

/// 占位文本：数值未知时展示
pub const CALCULATING: &str = "Calculating...";

/// 任务状态
///
/// 状态只能向前推进：starting → downloading → processing → finished，
/// error 可由任意非终态进入
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// 已提交，等待执行
    Starting,
    /// 下载中
    Downloading,
    /// 原始下载完成，后处理中
    Processing,
    /// 已完成
    Finished,
    /// 失败
    Error,
}

impl JobStatus {
    /// 状态在状态机中的顺序
    fn rank(self) -> u8 {
        match self {
            JobStatus::Starting => 0,
            JobStatus::Downloading => 1,
            JobStatus::Processing => 2,
            JobStatus::Finished | JobStatus::Error => 3,
        }
    }

    /// 是否为终态
    pub fn is_terminal(self) -> bool {
        matches!(self, JobStatus::Finished | JobStatus::Error)
    }

    /// 能否从当前状态迁移到 `next`
    pub fn can_transition_to(self, next: JobStatus) -> bool {
        if self.is_terminal() {
            return self == next;
        }
        next.rank() >= self.rank()
    }
}

/// 任务快照（轮询接口直接返回此结构）
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    /// 进度百分比 (0.0 - 100.0)
    pub percent: f64,
    pub speed: String,
    pub eta: String,
    /// 展示用文件名（不含目录）
    pub filename: String,
    pub total_size: String,
    /// 已下载大小
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub downloaded: Option<String>,
    /// 终态消息（成功摘要或错误详情）
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl JobSnapshot {
    /// 提交时写入的初始快照
    pub fn starting() -> Self {
        Self {
            status: JobStatus::Starting,
            percent: 0.0,
            speed: "Initializing...".to_string(),
            eta: CALCULATING.to_string(),
            filename: "Preparing...".to_string(),
            total_size: CALCULATING.to_string(),
            downloaded: None,
            message: None,
        }
    }

    /// 合并增量更新
    ///
    /// - 状态不会回退，终态不可改变
    /// - 下载中百分比单调不减
    /// - 后处理与完成状态的百分比固定为 100
    pub fn merge(&mut self, patch: SnapshotPatch) {
        if self.status.is_terminal() {
            return;
        }

        if let Some(status) = patch.status {
            if self.status.can_transition_to(status) {
                self.status = status;
            }
        }

        match self.status {
            JobStatus::Processing | JobStatus::Finished => self.percent = 100.0,
            JobStatus::Downloading => {
                if let Some(percent) = patch.percent {
                    self.percent = self.percent.max(percent);
                }
            }
            JobStatus::Starting | JobStatus::Error => {
                if let Some(percent) = patch.percent {
                    self.percent = percent;
                }
            }
        }

        if let Some(speed) = patch.speed {
            self.speed = speed;
        }
        if let Some(eta) = patch.eta {
            self.eta = eta;
        }
        if let Some(filename) = patch.filename {
            self.filename = filename;
        }
        if let Some(total_size) = patch.total_size {
            self.total_size = total_size;
        }
        if let Some(downloaded) = patch.downloaded {
            self.downloaded = Some(downloaded);
        }
        if let Some(message) = patch.message {
            self.message = Some(message);
        }
    }
}

impl Default for JobSnapshot {
    fn default() -> Self {
        Self::starting()
    }
}

/// 快照增量（None 表示不修改该字段）
#[derive(Debug, Clone, Default, PartialEq)]
pub struct SnapshotPatch {
    pub status: Option<JobStatus>,
    pub percent: Option<f64>,
    pub speed: Option<String>,
    pub eta: Option<String>,
    pub filename: Option<String>,
    pub total_size: Option<String>,
    pub downloaded: Option<String>,
    pub message: Option<String>,
}

impl SnapshotPatch {
    /// 原始下载完成，进入后处理
    pub fn processing() -> Self {
        Self {
            status: Some(JobStatus::Processing),
            percent: Some(100.0),
            ..Default::default()
        }
    }

    /// 提取成功
    pub fn finished(title: &str) -> Self {
        Self {
            status: Some(JobStatus::Finished),
            percent: Some(100.0),
            message: Some(format!("Successfully downloaded: {}", title)),
            ..Default::default()
        }
    }

    /// 提取失败
    pub fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            status: Some(JobStatus::Error),
            message: Some(format!("Error: {}", error)),
            ..Default::default()
        }
    }
}

/// 媒体类型
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "lowercase")]
pub enum MediaType {
    #[default]
    Video,
    Audio,
}

impl MediaType {
    /// 解析请求中的类型字段，除 "audio" 外一律按视频处理
    pub fn from_label(label: Option<&str>) -> Self {
        match label.map(|l| l.trim().to_ascii_lowercase()) {
            Some(l) if l == "audio" => MediaType::Audio,
            _ => MediaType::Video,
        }
    }
}
