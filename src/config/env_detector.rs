// 运行环境检测模块

use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;

/// 部署平台
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum DeployPlatform {
    /// 本地运行
    Local,
    /// Docker 容器
    Docker,
    /// Render 托管平台（应用目录只读）
    Render,
}

impl DeployPlatform {
    pub fn as_str(&self) -> &str {
        match self {
            DeployPlatform::Local => "Local",
            DeployPlatform::Docker => "Docker",
            DeployPlatform::Render => "Render",
        }
    }

    /// 应用目录是否可能不可写，需要把下载目录放到临时目录
    pub fn is_restricted(&self) -> bool {
        !matches!(self, DeployPlatform::Local)
    }
}

/// 环境信息
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnvInfo {
    pub platform: DeployPlatform,
}

/// 环境检测器
pub struct EnvDetector;

impl EnvDetector {
    /// 检测是否在 Docker 环境中
    ///
    /// 1. 检查 /.dockerenv 文件是否存在
    /// 2. 检查 /proc/1/cgroup 文件内容
    pub fn is_docker() -> bool {
        if Path::new("/.dockerenv").exists() {
            return true;
        }

        if let Ok(content) = fs::read_to_string("/proc/1/cgroup") {
            if content.contains("docker") || content.contains("containerd") {
                return true;
            }
        }

        false
    }

    /// 根据环境变量与容器检测结果判断部署平台
    ///
    /// `env` 用于读取环境变量，便于测试注入
    pub fn detect_platform<F>(env: F, is_docker: bool) -> DeployPlatform
    where
        F: Fn(&str) -> Option<String>,
    {
        if env("RENDER").is_some() {
            DeployPlatform::Render
        } else if is_docker || env("container").is_some() {
            DeployPlatform::Docker
        } else {
            DeployPlatform::Local
        }
    }

    /// 获取当前进程的环境信息
    pub fn get_env_info() -> EnvInfo {
        EnvInfo {
            platform: Self::detect_platform(|k| std::env::var(k).ok(), Self::is_docker()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env_of(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |k| map.get(k).cloned()
    }

    #[test]
    fn test_detect_render() {
        let platform = EnvDetector::detect_platform(env_of(&[("RENDER", "true")]), false);
        assert_eq!(platform, DeployPlatform::Render);
        assert!(platform.is_restricted());
    }

    #[test]
    fn test_detect_docker() {
        assert_eq!(
            EnvDetector::detect_platform(env_of(&[]), true),
            DeployPlatform::Docker
        );
        assert_eq!(
            EnvDetector::detect_platform(env_of(&[("container", "podman")]), false),
            DeployPlatform::Docker
        );
    }

    #[test]
    fn test_detect_local() {
        let platform = EnvDetector::detect_platform(env_of(&[]), false);
        assert_eq!(platform, DeployPlatform::Local);
        assert!(!platform.is_restricted());
        assert_eq!(platform.as_str(), "Local");
    }
}
