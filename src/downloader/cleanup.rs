//! 临时文件清理
//!
//! 提取成功后尽力删除输出目录中残留的分片与未完成文件，删除失败直接忽略。
//! 输出目录由所有任务共享，只删除文件名以本任务前缀开头的文件。

use regex::Regex;
use std::path::Path;
use std::sync::OnceLock;
use tracing::{debug, info};

/// 残留文件模式：
/// - `<name>.f<format_id>.mp4` / `.webm`：合并前的单独音视频流
/// - `<name>.part` / `<name>.part-Frag<n>`：未完成的下载
/// - `<name>.ytdl`：续传状态文件
fn temp_artifact_pattern() -> &'static Regex {
    static PATTERN: OnceLock<Regex> = OnceLock::new();
    PATTERN.get_or_init(|| {
        Regex::new(r"(\.f[^./\\]+\.(mp4|webm)|\.part|\.part-Frag\d+|\.ytdl)$")
            .expect("temp artifact pattern is valid")
    })
}

/// 判断文件名是否为残留临时文件
pub fn is_temp_artifact(file_name: &str) -> bool {
    temp_artifact_pattern().is_match(file_name)
}

/// 文件名是否属于给定前缀之一（空前缀不匹配任何文件）
fn has_owned_prefix(file_name: &str, prefixes: &[String]) -> bool {
    prefixes
        .iter()
        .any(|p| !p.is_empty() && file_name.starts_with(p.as_str()))
}

/// 删除目录中属于当前任务的残留临时文件，返回成功删除的数量
///
/// `prefixes` 为当前任务输出文件名的前缀（标题、进度中出现过的文件名）
pub async fn remove_temp_artifacts(dir: &Path, prefixes: &[String]) -> usize {
    if prefixes.iter().all(|p| p.is_empty()) {
        return 0;
    }

    let mut entries = match tokio::fs::read_dir(dir).await {
        Ok(entries) => entries,
        Err(e) => {
            debug!("读取下载目录失败，跳过清理: {:?}, 错误: {}", dir, e);
            return 0;
        }
    };

    let mut removed = 0;
    loop {
        let entry = match entries.next_entry().await {
            Ok(Some(entry)) => entry,
            Ok(None) => break,
            Err(e) => {
                debug!("遍历下载目录失败: {}", e);
                break;
            }
        };

        let is_file = entry
            .file_type()
            .await
            .map(|t| t.is_file())
            .unwrap_or(false);
        if !is_file {
            continue;
        }

        let name = entry.file_name();
        let Some(name) = name.to_str() else {
            continue;
        };
        if !is_temp_artifact(name) || !has_owned_prefix(name, prefixes) {
            continue;
        }

        match tokio::fs::remove_file(entry.path()).await {
            Ok(()) => {
                removed += 1;
                debug!("已删除临时文件: {}", name);
            }
            Err(e) => debug!("删除临时文件失败（忽略）: {}, 错误: {}", name, e),
        }
    }

    if removed > 0 {
        info!("已清理 {} 个临时文件: {:?}", removed, dir);
    }
    removed
}
