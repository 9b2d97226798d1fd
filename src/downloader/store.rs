//! 任务状态存储
//!
//! 基于 DashMap 的并发安全映射 job_id -> 快照。
//! 写入在分片锁内完成合并，读取在分片锁内克隆，读者只会看到完整的更新前或更新后快照。

use super::error::{DownloadError, DownloadResult};
use super::task::{JobSnapshot, SnapshotPatch};
use dashmap::DashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::debug;

/// 存储条目
#[derive(Debug, Clone)]
struct JobEntry {
    snapshot: JobSnapshot,
    created_at: Instant,
    updated_at: Instant,
}

/// 任务存储（克隆后共享同一份数据）
#[derive(Debug, Clone, Default)]
pub struct JobStore {
    jobs: Arc<DashMap<String, JobEntry>>,
}

impl JobStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// 写入初始快照（同 ID 已存在时覆盖）
    pub fn create(&self, job_id: &str, snapshot: JobSnapshot) {
        let now = Instant::now();
        self.jobs.insert(
            job_id.to_string(),
            JobEntry {
                snapshot,
                created_at: now,
                updated_at: now,
            },
        );
    }

    /// 合并增量，返回合并后的快照
    pub fn update(&self, job_id: &str, patch: SnapshotPatch) -> DownloadResult<JobSnapshot> {
        let mut entry = self
            .jobs
            .get_mut(job_id)
            .ok_or_else(|| DownloadError::NotFound(job_id.to_string()))?;
        entry.snapshot.merge(patch);
        entry.updated_at = Instant::now();
        Ok(entry.snapshot.clone())
    }

    /// 读取当前快照
    pub fn get(&self, job_id: &str) -> DownloadResult<JobSnapshot> {
        self.jobs
            .get(job_id)
            .map(|entry| entry.snapshot.clone())
            .ok_or_else(|| DownloadError::NotFound(job_id.to_string()))
    }

    pub fn contains(&self, job_id: &str) -> bool {
        self.jobs.contains_key(job_id)
    }

    /// 当前跟踪的任务数
    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    /// 未进入终态的任务数
    pub fn active_count(&self) -> usize {
        self.jobs
            .iter()
            .filter(|entry| !entry.snapshot.status.is_terminal())
            .count()
    }

    /// 清理超过保留时长的终态任务，返回清理数量
    ///
    /// 未进入终态的任务不会被清理
    pub fn evict_expired(&self, ttl: Duration) -> usize {
        let before = self.jobs.len();
        self.jobs.retain(|job_id, entry| {
            let expired =
                entry.snapshot.status.is_terminal() && entry.updated_at.elapsed() >= ttl;
            if expired {
                debug!(
                    "清理过期任务: {}, 存活 {:?}",
                    job_id,
                    entry.created_at.elapsed()
                );
            }
            !expired
        });
        before.saturating_sub(self.jobs.len())
    }
}
