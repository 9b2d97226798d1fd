//! 任务执行器
//!
//! 每个任务一个执行单元：占用槽位 → 调用提取器 → 按顺序应用进度 → 写入终态。

use super::cleanup::remove_temp_artifacts;
use super::error::DownloadError;
use super::progress::{display_filename, normalize};
use super::slot_pool::JobSlotPool;
use super::store::JobStore;
use super::task::SnapshotPatch;
use crate::extractor::{ExtractRequest, MediaExtractor, MediaInfo, ProgressEvent};
use futures::FutureExt;
use std::panic::AssertUnwindSafe;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::mpsc;
use tracing::{debug, error, info, warn};

/// 任务执行器（所有任务共享同一实例）
#[derive(Clone)]
pub struct JobRunner {
    store: JobStore,
    extractor: Arc<dyn MediaExtractor>,
    slot_pool: JobSlotPool,
    /// 输出目录（用于成功后清理临时文件）
    download_dir: PathBuf,
}

impl JobRunner {
    pub fn new(
        store: JobStore,
        extractor: Arc<dyn MediaExtractor>,
        slot_pool: JobSlotPool,
        download_dir: PathBuf,
    ) -> Self {
        Self {
            store,
            extractor,
            slot_pool,
            download_dir,
        }
    }

    pub fn slot_pool(&self) -> &JobSlotPool {
        &self.slot_pool
    }

    /// 执行一个任务直到终态
    ///
    /// 所有失败都只写入该任务的快照，不会向调用方传播
    pub async fn run(&self, job_id: String, request: ExtractRequest) {
        let _slot = match self.slot_pool.acquire(&job_id).await {
            Ok(slot) => slot,
            Err(e) => {
                error!("任务 {} 获取槽位失败: {}", job_id, e);
                self.apply(&job_id, SnapshotPatch::failed(e));
                return;
            }
        };

        info!(
            "开始执行任务: job_id={}, extractor={}, url={}",
            job_id,
            self.extractor.name(),
            request.url
        );

        let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<ProgressEvent>();
        let extract = AssertUnwindSafe(self.extractor.extract(request, progress_tx)).catch_unwind();
        tokio::pin!(extract);

        // 本任务写出过的文件名，用于成功后只清理自己的临时文件
        let mut outputs = Vec::new();

        // 提取过程中按发送顺序应用进度
        let outcome = loop {
            tokio::select! {
                biased;
                Some(event) = progress_rx.recv() => {
                    remember_output(&mut outputs, &event);
                    self.apply_event(&job_id, &event);
                }
                outcome = &mut extract => break outcome,
            }
        };

        // 提取结束后补齐通道中剩余的事件
        while let Ok(event) = progress_rx.try_recv() {
            remember_output(&mut outputs, &event);
            self.apply_event(&job_id, &event);
        }

        match outcome {
            Ok(Ok(media)) => self.finish(&job_id, media, outputs).await,
            Ok(Err(e)) => {
                let e = DownloadError::from(e);
                error!("任务 {} 提取失败: {}", job_id, e);
                self.apply(&job_id, SnapshotPatch::failed(e));
            }
            Err(_) => {
                error!("任务 {} 提取器发生 panic", job_id);
                self.apply(&job_id, SnapshotPatch::failed("extractor panicked"));
            }
        }
    }

    async fn finish(&self, job_id: &str, media: MediaInfo, mut prefixes: Vec<String>) {
        // 输出模板为 `%(title)s.%(ext)s`
        prefixes.push(format!("{}.", media.title));
        remove_temp_artifacts(&self.download_dir, &prefixes).await;
        info!("任务完成: job_id={}, title={}", job_id, media.title);
        self.apply(job_id, SnapshotPatch::finished(&media.title));
    }

    /// 归一化并应用单个进度事件，归一化失败只记录日志
    fn apply_event(&self, job_id: &str, event: &ProgressEvent) {
        match normalize(event) {
            Ok(Some(patch)) => self.apply(job_id, patch),
            Ok(None) => debug!("任务 {} 忽略未知阶段的进度事件", job_id),
            Err(e) => warn!("任务 {} 进度归一化失败，已丢弃: {}", job_id, e),
        }
    }

    fn apply(&self, job_id: &str, patch: SnapshotPatch) {
        if let Err(e) = self.store.update(job_id, patch) {
            debug!("任务 {} 更新快照失败: {}", job_id, e);
        }
    }
}

/// 记录进度事件中出现的输出文件名（去掉目录）
fn remember_output(outputs: &mut Vec<String>, event: &ProgressEvent) {
    if let Some(name) = event.filename.as_deref().map(display_filename) {
        if !name.is_empty() && !outputs.contains(&name) {
            outputs.push(name);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::downloader::task::{JobSnapshot, JobStatus};
    use crate::extractor::{ExtractError, ProgressSender};
    use async_trait::async_trait;
    use std::sync::Mutex;

    /// 按脚本发送进度事件的假提取器
    struct ScriptedExtractor {
        events: Vec<ProgressEvent>,
        outcome: Result<String, String>,
        seen: Mutex<Vec<ExtractRequest>>,
    }

    impl ScriptedExtractor {
        fn new(events: Vec<ProgressEvent>, outcome: Result<String, String>) -> Self {
            Self {
                events,
                outcome,
                seen: Mutex::new(Vec::new()),
            }
        }
    }

    #[async_trait]
    impl MediaExtractor for ScriptedExtractor {
        fn name(&self) -> &str {
            "scripted"
        }

        async fn extract(
            &self,
            request: ExtractRequest,
            progress: ProgressSender,
        ) -> Result<MediaInfo, ExtractError> {
            self.seen.lock().unwrap().push(request);
            for event in &self.events {
                progress.send(event.clone()).unwrap();
                tokio::task::yield_now().await;
            }
            match &self.outcome {
                Ok(title) => Ok(MediaInfo {
                    title: title.clone(),
                }),
                Err(message) => Err(ExtractError::Failed(message.clone())),
            }
        }
    }

    struct PanickingExtractor;

    #[async_trait]
    impl MediaExtractor for PanickingExtractor {
        fn name(&self) -> &str {
            "panicking"
        }

        async fn extract(
            &self,
            _request: ExtractRequest,
            _progress: ProgressSender,
        ) -> Result<MediaInfo, ExtractError> {
            panic!("extractor bug");
        }
    }

    fn request() -> ExtractRequest {
        ExtractRequest {
            url: "https://example.com/video".to_string(),
            format: "best".to_string(),
            output_template: "%(title)s.%(ext)s".to_string(),
            merge_output_format: None,
            post_process: None,
        }
    }

    fn runner(extractor: Arc<dyn MediaExtractor>, dir: PathBuf) -> (JobRunner, JobStore) {
        let store = JobStore::new();
        let runner = JobRunner::new(store.clone(), extractor, JobSlotPool::new(2), dir);
        (runner, store)
    }

    #[tokio::test]
    async fn test_successful_run_reaches_finished() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(dir.path().join("My Clip.f137.mp4.part"), b"x").unwrap();
        std::fs::write(dir.path().join("clip.mp4.ytdl"), b"x").unwrap();

        let extractor = Arc::new(ScriptedExtractor::new(
            vec![
                ProgressEvent::downloading(0.0, Some(1000.0)).with_filename("/d/clip.mp4"),
                ProgressEvent::downloading(500.0, Some(1000.0))
                    .with_speed(2048.0)
                    .with_eta(3.0)
                    .with_filename("/d/clip.mp4"),
                ProgressEvent::finished("/d/clip.mp4"),
            ],
            Ok("My Clip".to_string()),
        ));
        let (runner, store) = runner(extractor, dir.path().to_path_buf());
        store.create("job", JobSnapshot::starting());

        runner.run("job".to_string(), request()).await;

        let snapshot = store.get("job").unwrap();
        assert_eq!(snapshot.status, JobStatus::Finished);
        assert_eq!(snapshot.percent, 100.0);
        assert_eq!(snapshot.filename, "clip.mp4");
        assert_eq!(snapshot.speed, "2.00 KB/s");
        assert_eq!(
            snapshot.message.as_deref(),
            Some("Successfully downloaded: My Clip")
        );
        assert!(!dir.path().join("My Clip.f137.mp4.part").exists());
        assert!(!dir.path().join("clip.mp4.ytdl").exists());
        assert_eq!(runner.slot_pool().used_slots(), 0);
    }

    #[tokio::test]
    async fn test_cleanup_keeps_other_jobs_files() {
        let dir = tempfile::tempdir().unwrap();
        let others = [
            "Other Job Video.f137.mp4.part",
            "Other Job Video.f137.mp4.part-Frag2",
            "Other Job Video.mp4.ytdl",
        ];
        for name in others {
            std::fs::write(dir.path().join(name), b"in flight").unwrap();
        }
        std::fs::write(dir.path().join("My Clip.f140.webm"), b"x").unwrap();

        let extractor = Arc::new(ScriptedExtractor::new(
            vec![ProgressEvent::finished("/d/My Clip.f140.webm")],
            Ok("My Clip".to_string()),
        ));
        let (runner, store) = runner(extractor, dir.path().to_path_buf());
        store.create("job", JobSnapshot::starting());

        runner.run("job".to_string(), request()).await;

        assert_eq!(store.get("job").unwrap().status, JobStatus::Finished);
        assert!(!dir.path().join("My Clip.f140.webm").exists());
        for name in others {
            assert!(dir.path().join(name).exists(), "{} was removed", name);
        }
    }

    #[tokio::test]
    async fn test_failed_run_records_error() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(ScriptedExtractor::new(
            vec![ProgressEvent::downloading(10.0, Some(100.0))],
            Err("Unsupported URL: https://example.com/video".to_string()),
        ));
        let (runner, store) = runner(extractor, dir.path().to_path_buf());
        store.create("job", JobSnapshot::starting());

        runner.run("job".to_string(), request()).await;

        let snapshot = store.get("job").unwrap();
        assert_eq!(snapshot.status, JobStatus::Error);
        assert_eq!(
            snapshot.message.as_deref(),
            Some("Error: Unsupported URL: https://example.com/video")
        );
        assert_eq!(snapshot.percent, 10.0);
    }

    #[tokio::test]
    async fn test_invalid_progress_is_dropped() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(ScriptedExtractor::new(
            vec![
                ProgressEvent::downloading(f64::INFINITY, Some(100.0)),
                ProgressEvent::downloading(20.0, Some(100.0)),
            ],
            Ok("t".to_string()),
        ));
        let (runner, store) = runner(extractor, dir.path().to_path_buf());
        store.create("job", JobSnapshot::starting());

        runner.run("job".to_string(), request()).await;
        assert_eq!(store.get("job").unwrap().status, JobStatus::Finished);
    }

    #[tokio::test]
    async fn test_panicking_extractor_is_contained() {
        let dir = tempfile::tempdir().unwrap();
        let (runner, store) = runner(Arc::new(PanickingExtractor), dir.path().to_path_buf());
        store.create("job", JobSnapshot::starting());

        runner.run("job".to_string(), request()).await;

        let snapshot = store.get("job").unwrap();
        assert_eq!(snapshot.status, JobStatus::Error);
        assert_eq!(snapshot.message.as_deref(), Some("Error: extractor panicked"));
    }

    #[tokio::test]
    async fn test_request_is_forwarded_to_extractor() {
        let dir = tempfile::tempdir().unwrap();
        let extractor = Arc::new(ScriptedExtractor::new(vec![], Ok("t".to_string())));
        let (runner, store) = runner(extractor.clone(), dir.path().to_path_buf());
        store.create("job", JobSnapshot::starting());

        runner.run("job".to_string(), request()).await;

        let seen = extractor.seen.lock().unwrap();
        assert_eq!(seen.as_slice(), &[request()]);
    }
}
