//! 任务槽位池
//!
//! 限制同时执行的提取任务数，超出上限的任务在 starting 状态排队等待。

use std::sync::Arc;
use tokio::sync::{AcquireError, OwnedSemaphorePermit, Semaphore};
use tracing::{debug, info};

/// 已占用的槽位，drop 时自动归还
#[derive(Debug)]
pub struct JobSlot {
    job_id: String,
    _permit: OwnedSemaphorePermit,
}

impl JobSlot {
    pub fn job_id(&self) -> &str {
        &self.job_id
    }
}

impl Drop for JobSlot {
    fn drop(&mut self) {
        debug!("释放任务槽位: job_id={}", self.job_id);
    }
}

/// 任务槽位池
#[derive(Debug, Clone)]
pub struct JobSlotPool {
    /// 最大槽位数
    max_slots: usize,
    semaphore: Arc<Semaphore>,
}

impl JobSlotPool {
    /// 创建槽位池，`max_slots` 为 0 时按 1 处理
    pub fn new(max_slots: usize) -> Self {
        let max_slots = max_slots.max(1);
        info!("创建任务槽位池，最大槽位数: {}", max_slots);
        Self {
            max_slots,
            semaphore: Arc::new(Semaphore::new(max_slots)),
        }
    }

    pub fn max_slots(&self) -> usize {
        self.max_slots
    }

    /// 当前空闲槽位数
    pub fn available_slots(&self) -> usize {
        self.semaphore.available_permits()
    }

    /// 当前已使用槽位数
    pub fn used_slots(&self) -> usize {
        self.max_slots.saturating_sub(self.available_slots())
    }

    /// 等待并占用一个槽位
    pub async fn acquire(&self, job_id: &str) -> Result<JobSlot, AcquireError> {
        let permit = self.semaphore.clone().acquire_owned().await?;
        debug!(
            "分配任务槽位: job_id={}, 已用={}/{}",
            job_id,
            self.used_slots(),
            self.max_slots
        );
        Ok(JobSlot {
            job_id: job_id.to_string(),
            _permit: permit,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn test_acquire_and_release() {
        let pool = JobSlotPool::new(2);
        assert_eq!(pool.available_slots(), 2);

        let a = pool.acquire("a").await.unwrap();
        let b = pool.acquire("b").await.unwrap();
        assert_eq!(a.job_id(), "a");
        assert_eq!(pool.used_slots(), 2);
        assert_eq!(pool.available_slots(), 0);

        drop(a);
        assert_eq!(pool.used_slots(), 1);
        drop(b);
        assert_eq!(pool.used_slots(), 0);
    }

    #[tokio::test]
    async fn test_acquire_waits_when_full() {
        let pool = JobSlotPool::new(1);
        let held = pool.acquire("first").await.unwrap();

        let waiting = tokio::time::timeout(Duration::from_millis(50), pool.acquire("second")).await;
        assert!(waiting.is_err(), "second job must wait for a free slot");

        drop(held);
        let second = tokio::time::timeout(Duration::from_millis(500), pool.acquire("second"))
            .await
            .expect("slot should be released")
            .unwrap();
        assert_eq!(second.job_id(), "second");
    }

    #[test]
    fn test_zero_slots_is_clamped() {
        let pool = JobSlotPool::new(0);
        assert_eq!(pool.max_slots(), 1);
    }
}
