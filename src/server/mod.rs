// Web服务器模块

pub mod error;
pub mod handlers;
pub mod state;

pub use error::{ApiError, ApiResult};
pub use state::AppState;

use axum::routing::{get, post};
use axum::Router;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    services::ServeDir,
    trace::TraceLayer,
};

/// 构建完整路由
///
/// 未匹配的路径交给静态目录
pub fn build_router(app_state: AppState) -> Router {
    let middleware = ServiceBuilder::new()
        .layer(TraceLayer::new_for_http())
        .layer(
            CorsLayer::new()
                .allow_origin(Any)
                .allow_methods(Any)
                .allow_headers(Any),
        );

    let static_service = ServeDir::new(&app_state.config.server.static_dir);

    Router::new()
        .route("/download", post(handlers::submit_download))
        .route("/progress/:job_id", get(handlers::get_progress))
        .route("/health", get(handlers::health_check))
        .fallback_service(static_service)
        .with_state(app_state)
        .layer(middleware)
}
