// 应用状态

use crate::config::AppConfig;
use crate::downloader::{DownloadManager, JobStore};
use crate::extractor::{MediaExtractor, YtDlpExtractor};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// 应用全局状态
#[derive(Clone)]
pub struct AppState {
    /// 下载管理器
    pub download_manager: DownloadManager,
    /// 应用配置
    pub config: Arc<AppConfig>,
    /// 关闭信号，后台任务监听它退出
    pub shutdown: CancellationToken,
}

impl AppState {
    /// 使用 yt-dlp 提取器创建应用状态
    pub fn new(config: AppConfig) -> Self {
        let extractor = Arc::new(YtDlpExtractor::new(config.download.ytdlp_path.clone()));
        Self::with_extractor(config, extractor)
    }

    /// 使用指定的提取器创建应用状态
    pub fn with_extractor(config: AppConfig, extractor: Arc<dyn MediaExtractor>) -> Self {
        let download_manager =
            DownloadManager::with_config(&config.download, JobStore::new(), extractor);

        Self {
            download_manager,
            config: Arc::new(config),
            shutdown: CancellationToken::new(),
        }
    }
}
