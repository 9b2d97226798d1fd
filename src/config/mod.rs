// 配置管理模块

pub mod env_detector;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;
use tokio::fs;

pub use env_detector::{DeployPlatform, EnvDetector, EnvInfo};

/// 默认配置文件路径
pub const DEFAULT_CONFIG_PATH: &str = "config/app.toml";

/// 应用配置
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct AppConfig {
    /// 服务器配置
    #[serde(default)]
    pub server: ServerConfig,
    /// 下载配置
    #[serde(default)]
    pub download: DownloadConfig,
    /// 日志配置
    #[serde(default)]
    pub log: LogConfig,
}

/// 日志配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LogConfig {
    /// 是否启用日志文件持久化
    #[serde(default = "default_log_enabled")]
    pub enabled: bool,
    /// 日志文件保存目录
    #[serde(default = "default_log_dir")]
    pub log_dir: PathBuf,
    /// 日志保留天数（默认 7 天）
    #[serde(default = "default_log_retention_days")]
    pub retention_days: u32,
    /// 日志级别（默认 info）
    #[serde(default = "default_log_level")]
    pub level: String,
}

fn default_log_enabled() -> bool {
    true
}

fn default_log_dir() -> PathBuf {
    PathBuf::from("logs")
}

fn default_log_retention_days() -> u32 {
    7
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LogConfig {
    fn default() -> Self {
        Self {
            enabled: default_log_enabled(),
            log_dir: default_log_dir(),
            retention_days: default_log_retention_days(),
            level: default_log_level(),
        }
    }
}

/// 服务器配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    /// 监听地址
    #[serde(default = "default_host")]
    pub host: String,
    /// 监听端口
    #[serde(default = "default_port")]
    pub port: u16,
    /// 静态页面目录
    #[serde(default = "default_static_dir")]
    pub static_dir: PathBuf,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    5000
}

fn default_static_dir() -> PathBuf {
    PathBuf::from("static")
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            static_dir: default_static_dir(),
        }
    }
}

/// 下载配置
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DownloadConfig {
    /// 下载输出目录
    #[serde(default = "default_download_dir")]
    pub download_dir: PathBuf,
    /// yt-dlp 可执行文件
    #[serde(default = "default_ytdlp_path")]
    pub ytdlp_path: PathBuf,
    /// 最大同时执行任务数
    #[serde(default = "default_max_concurrent_jobs")]
    pub max_concurrent_jobs: usize,
    /// 终态任务保留时长（秒）
    #[serde(default = "default_job_retention_secs")]
    pub job_retention_secs: u64,
    /// 过期任务清理间隔（秒）
    #[serde(default = "default_job_sweep_interval_secs")]
    pub job_sweep_interval_secs: u64,
}

fn default_download_dir() -> PathBuf {
    PathBuf::from("downloads")
}

fn default_ytdlp_path() -> PathBuf {
    PathBuf::from(if cfg!(target_os = "windows") {
        "yt-dlp.exe"
    } else {
        "yt-dlp"
    })
}

fn default_max_concurrent_jobs() -> usize {
    3
}

fn default_job_retention_secs() -> u64 {
    3600
}

fn default_job_sweep_interval_secs() -> u64 {
    60
}

impl Default for DownloadConfig {
    fn default() -> Self {
        Self {
            download_dir: default_download_dir(),
            ytdlp_path: default_ytdlp_path(),
            max_concurrent_jobs: default_max_concurrent_jobs(),
            job_retention_secs: default_job_retention_secs(),
            job_sweep_interval_secs: default_job_sweep_interval_secs(),
        }
    }
}

impl AppConfig {
    /// 从文件加载配置
    pub async fn load_from_file(path: &str) -> Result<Self> {
        let content = fs::read_to_string(path)
            .await
            .context("Failed to read config file")?;

        let config: AppConfig = toml::from_str(&content).context("Failed to parse config file")?;
        Ok(config)
    }

    /// 加载配置，文件不存在或解析失败时使用默认配置
    pub async fn load_or_default(path: &str) -> Self {
        match Self::load_from_file(path).await {
            Ok(config) => {
                tracing::info!("配置文件加载成功: {}", path);
                config
            }
            Err(e) => {
                tracing::warn!("配置文件加载失败，使用默认配置: {:#}", e);
                Self::default()
            }
        }
    }

    /// 只加载日志配置，用于在初始化日志系统前读取
    ///
    /// 其他段落无效时不影响日志配置，文件缺失或 `[log]` 无效时返回默认配置
    pub async fn load_log_config(path: &str) -> LogConfig {
        let Ok(content) = fs::read_to_string(path).await else {
            return LogConfig::default();
        };

        toml::from_str::<toml::Value>(&content)
            .ok()
            .and_then(|config| config.get("log").cloned())
            .and_then(|log| log.try_into::<LogConfig>().ok())
            .unwrap_or_default()
    }

    /// 应用环境变量覆盖
    ///
    /// - `PORT` / `HOST`：监听端口与地址
    /// - `RENDER` 或容器环境：下载目录改为 /tmp/downloads
    /// - `DOWNLOAD_DIR`：显式指定下载目录（优先级最高）
    /// - `YTDLP_PATH`：yt-dlp 可执行文件
    /// - `MAX_CONCURRENT_JOBS`：最大同时任务数
    pub fn apply_env_overrides<F>(&mut self, env: F, platform: DeployPlatform)
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(port) = env("PORT") {
            match port.trim().parse::<u16>() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!("忽略无效的 PORT: {}", port),
            }
        }

        if let Some(host) = env("HOST").filter(|h| !h.trim().is_empty()) {
            self.server.host = host;
        }

        if platform.is_restricted() && self.download.download_dir.is_relative() {
            self.download.download_dir = std::env::temp_dir().join("downloads");
            tracing::info!(
                "检测到受限部署环境 ({}), 下载目录改为: {:?}",
                platform.as_str(),
                self.download.download_dir
            );
        }

        if let Some(dir) = env("DOWNLOAD_DIR").filter(|d| !d.trim().is_empty()) {
            self.download.download_dir = PathBuf::from(dir);
        }

        if let Some(path) = env("YTDLP_PATH").filter(|p| !p.trim().is_empty()) {
            self.download.ytdlp_path = PathBuf::from(path);
        }

        if let Some(max) = env("MAX_CONCURRENT_JOBS") {
            match max.trim().parse::<usize>() {
                Ok(max) if max > 0 => self.download.max_concurrent_jobs = max,
                _ => tracing::warn!("忽略无效的 MAX_CONCURRENT_JOBS: {}", max),
            }
        }
    }

    /// 加载配置并应用当前进程的环境变量
    pub async fn load(path: &str) -> Self {
        let mut config = Self::load_or_default(path).await;
        let platform = EnvDetector::get_env_info().platform;
        config.apply_env_overrides(|k| std::env::var(k).ok(), platform);
        config
    }

    /// 确保下载目录存在
    pub async fn ensure_download_dir(&self) -> Result<()> {
        fs::create_dir_all(&self.download.download_dir)
            .await
            .with_context(|| {
                format!(
                    "创建下载目录失败: {:?}",
                    self.download.download_dir
                )
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;
    use tempfile::NamedTempFile;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_default_config() {
        let config = AppConfig::default();
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.download.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.download.max_concurrent_jobs, 3);
        assert_eq!(config.download.job_retention_secs, 3600);
        assert!(config.log.enabled);
        assert_eq!(config.log.level, "info");
    }

    #[tokio::test]
    async fn test_load_partial_file() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            "[server]\nport = 8080\n\n[download]\nmax_concurrent_jobs = 6\n",
        )
        .unwrap();

        let config = AppConfig::load_from_file(temp_file.path().to_str().unwrap())
            .await
            .unwrap();
        assert_eq!(config.server.port, 8080);
        assert_eq!(config.server.host, "0.0.0.0");
        assert_eq!(config.download.max_concurrent_jobs, 6);
        assert_eq!(config.download.download_dir, PathBuf::from("downloads"));
        assert_eq!(config.log.retention_days, 7);
    }

    #[tokio::test]
    async fn test_load_missing_file_uses_default() {
        let config = AppConfig::load_or_default("/nonexistent/config/app.toml").await;
        assert_eq!(config.server.port, 5000);
    }

    #[tokio::test]
    async fn test_load_log_config_ignores_other_sections() {
        let temp_file = NamedTempFile::new().unwrap();
        std::fs::write(
            temp_file.path(),
            "[server]\nport = \"not-a-port\"\n\n[log]\nlevel = \"debug\"\nenabled = false\n",
        )
        .unwrap();
        let path = temp_file.path().to_str().unwrap();

        let log = AppConfig::load_log_config(path).await;
        assert_eq!(log.level, "debug");
        assert!(!log.enabled);
        assert_eq!(log.retention_days, 7);

        // 完整配置解析失败，回退默认
        assert!(AppConfig::load_from_file(path).await.is_err());

        let missing = AppConfig::load_log_config("/nonexistent/config/app.toml").await;
        assert_eq!(missing.level, "info");
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(
            env_of(&[
                ("PORT", "8000"),
                ("DOWNLOAD_DIR", "/data/media"),
                ("YTDLP_PATH", "/opt/bin/yt-dlp"),
                ("MAX_CONCURRENT_JOBS", "8"),
            ]),
            DeployPlatform::Local,
        );

        assert_eq!(config.server.port, 8000);
        assert_eq!(config.download.download_dir, PathBuf::from("/data/media"));
        assert_eq!(config.download.ytdlp_path, PathBuf::from("/opt/bin/yt-dlp"));
        assert_eq!(config.download.max_concurrent_jobs, 8);
    }

    #[test]
    fn test_invalid_env_values_are_ignored() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(
            env_of(&[("PORT", "not-a-port"), ("MAX_CONCURRENT_JOBS", "0")]),
            DeployPlatform::Local,
        );
        assert_eq!(config.server.port, 5000);
        assert_eq!(config.download.max_concurrent_jobs, 3);
    }

    #[test]
    fn test_restricted_platform_uses_temp_dir() {
        let mut config = AppConfig::default();
        config.apply_env_overrides(env_of(&[]), DeployPlatform::Render);
        assert_eq!(
            config.download.download_dir,
            std::env::temp_dir().join("downloads")
        );

        // 显式指定的目录优先
        let mut config = AppConfig::default();
        config.apply_env_overrides(
            env_of(&[("DOWNLOAD_DIR", "/srv/out")]),
            DeployPlatform::Render,
        );
        assert_eq!(config.download.download_dir, PathBuf::from("/srv/out"));
    }

    #[tokio::test]
    async fn test_ensure_download_dir() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = AppConfig::default();
        config.download.download_dir = dir.path().join("nested").join("downloads");

        config.ensure_download_dir().await.unwrap();
        assert!(config.download.download_dir.is_dir());
    }
}
