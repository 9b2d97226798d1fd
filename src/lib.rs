// Media Fetch Server
// 媒体链接提交、后台提取与进度轮询

// 配置管理模块
pub mod config;

// 下载任务模块
pub mod downloader;

// 媒体提取器模块
pub mod extractor;

// 日志模块
pub mod logging;

// Web服务器模块
pub mod server;

// 导出常用类型
pub use config::AppConfig;
pub use downloader::{DownloadManager, JobSnapshot, JobStatus, JobStore, SubmitRequest};
pub use extractor::{MediaExtractor, YtDlpExtractor};
pub use server::{build_router, AppState};
