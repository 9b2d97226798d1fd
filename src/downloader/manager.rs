use crate::config::DownloadConfig;
use crate::downloader::error::{DownloadError, DownloadResult};
use crate::downloader::format::{build_extract_request, DEFAULT_QUALITY};
use crate::downloader::runner::JobRunner;
use crate::downloader::slot_pool::JobSlotPool;
use crate::downloader::store::JobStore;
use crate::downloader::task::{JobSnapshot, MediaType};
use crate::extractor::MediaExtractor;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};
use uuid::Uuid;

/// 下载提交参数
#[derive(Debug, Clone, Default)]
pub struct SubmitRequest {
    pub url: Option<String>,
    /// "video" 或 "audio"，缺省为 video
    pub media_type: Option<String>,
    /// 清晰度标签，缺省为 1080p
    pub quality: Option<String>,
}

/// 任务保留策略
#[derive(Debug, Clone, Copy)]
pub struct RetentionPolicy {
    /// 终态任务的保留时长
    pub ttl: Duration,
    /// 清理检查间隔
    pub sweep_interval: Duration,
}

impl Default for RetentionPolicy {
    fn default() -> Self {
        Self {
            ttl: Duration::from_secs(3600),
            sweep_interval: Duration::from_secs(60),
        }
    }
}

/// 下载管理器
///
/// 提交入口与轮询入口：分配任务 ID、写入初始快照、
/// 把执行单元交给后台，并从存储中读取快照。
#[derive(Clone)]
pub struct DownloadManager {
    store: JobStore,
    runner: JobRunner,
    /// 输出目录
    download_dir: PathBuf,
    retention: RetentionPolicy,
}

impl DownloadManager {
    /// 使用配置创建下载管理器
    pub fn with_config(
        config: &DownloadConfig,
        store: JobStore,
        extractor: Arc<dyn MediaExtractor>,
    ) -> Self {
        let retention = RetentionPolicy {
            ttl: Duration::from_secs(config.job_retention_secs),
            sweep_interval: Duration::from_secs(config.job_sweep_interval_secs.max(1)),
        };
        Self::new(
            store,
            extractor,
            config.download_dir.clone(),
            config.max_concurrent_jobs,
            retention,
        )
    }

    pub fn new(
        store: JobStore,
        extractor: Arc<dyn MediaExtractor>,
        download_dir: PathBuf,
        max_concurrent_jobs: usize,
        retention: RetentionPolicy,
    ) -> Self {
        info!(
            "创建下载管理器: 下载目录={:?}, 最大同时任务数={}, 任务保留={:?}",
            download_dir, max_concurrent_jobs, retention.ttl
        );

        let slot_pool = JobSlotPool::new(max_concurrent_jobs);
        let runner = JobRunner::new(
            store.clone(),
            extractor,
            slot_pool,
            download_dir.clone(),
        );

        Self {
            store,
            runner,
            download_dir,
            retention,
        }
    }

    pub fn store(&self) -> &JobStore {
        &self.store
    }

    /// 正在占用槽位的任务数
    pub fn running_jobs(&self) -> usize {
        self.runner.slot_pool().used_slots()
    }

    /// 提交下载任务，立即返回任务 ID
    ///
    /// 初始快照在返回前写入，提交后立即轮询不会得到 NotFound
    pub fn submit(&self, request: SubmitRequest) -> DownloadResult<String> {
        let url = request
            .url
            .as_deref()
            .map(str::trim)
            .filter(|u| !u.is_empty())
            .ok_or_else(|| DownloadError::InvalidRequest("URL required!".to_string()))?
            .to_string();

        let media_type = MediaType::from_label(request.media_type.as_deref());
        let quality = request
            .quality
            .as_deref()
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .unwrap_or(DEFAULT_QUALITY);

        let extract_request = build_extract_request(&url, media_type, quality, &self.download_dir);

        let job_id = Uuid::new_v4().to_string();
        self.store.create(&job_id, JobSnapshot::starting());

        info!(
            "创建下载任务: job_id={}, type={:?}, quality={}, url={}",
            job_id, media_type, quality, url
        );

        let runner = self.runner.clone();
        let id = job_id.clone();
        tokio::spawn(async move {
            runner.run(id, extract_request).await;
        });

        Ok(job_id)
    }

    /// 读取任务当前快照
    pub fn poll(&self, job_id: &str) -> DownloadResult<JobSnapshot> {
        self.store.get(job_id)
    }

    /// 启动后台清理任务，定期移除过期的终态任务
    pub fn start_retention_sweeper(&self, shutdown: CancellationToken) -> JoinHandle<()> {
        let store = self.store.clone();
        let policy = self.retention;

        tokio::spawn(async move {
            let mut interval = tokio::time::interval(policy.sweep_interval);
            loop {
                tokio::select! {
                    _ = shutdown.cancelled() => {
                        debug!("任务清理器已停止");
                        break;
                    }
                    _ = interval.tick() => {
                        let evicted = store.evict_expired(policy.ttl);
                        if evicted > 0 {
                            info!("已清理 {} 个过期任务，剩余 {} 个", evicted, store.len());
                        }
                    }
                }
            }
        })
    }
}
