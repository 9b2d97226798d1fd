use media_fetch_server::{
    config::{AppConfig, DEFAULT_CONFIG_PATH},
    logging,
    server::build_router,
    AppState,
};
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 先只读取日志配置，完整配置加载过程中的日志才有输出目标
    let log_config = AppConfig::load_log_config(DEFAULT_CONFIG_PATH).await;

    // 必须保持 _log_guard 存活
    let _log_guard = logging::init_logging(&log_config);

    info!("Media Fetch Server v{} 启动中...", env!("CARGO_PKG_VERSION"));

    let config = AppConfig::load(DEFAULT_CONFIG_PATH).await;

    config.ensure_download_dir().await?;
    info!(
        "下载目录: {:?}, yt-dlp: {:?}, 最大同时任务数: {}",
        config.download.download_dir,
        config.download.ytdlp_path,
        config.download.max_concurrent_jobs
    );

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let app_state = AppState::new(config);
    let sweeper = app_state
        .download_manager
        .start_retention_sweeper(app_state.shutdown.clone());

    let app = build_router(app_state.clone());

    info!("服务器启动在: http://{}", addr);
    info!("健康检查: http://{}/health", addr);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    let server = axum::serve(listener, app);

    tokio::select! {
        result = server => {
            if let Err(e) = result {
                tracing::error!("服务器错误: {}", e);
            }
        }
        _ = tokio::signal::ctrl_c() => {
            info!("收到 Ctrl+C，开始关闭...");
        }
    }

    app_state.shutdown.cancel();
    if let Err(e) = sweeper.await {
        tracing::warn!("任务清理器退出异常: {}", e);
    }
    info!("应用已安全退出");

    Ok(())
}
