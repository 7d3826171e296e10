pub mod handlers;

pub use handlers::*;

use crate::config::AppConfig;
use crate::error::AppError;
use crate::service::{ReconcileService, SplitterService};
use axum::{
    extract::DefaultBodyLimit,
    routing::{get, post},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;

/// 构建路由: 对账与拆分各自持有服务状态
pub fn build_router(config: &AppConfig) -> Result<Router, AppError> {
    let reconcile_service = Arc::new(ReconcileService::new(config.reconcile.clone()));
    let splitter_service = Arc::new(SplitterService::new(config.splitter.clone())?);

    let reconcile_routes = Router::new()
        .route("/api/reconcile", post(reconcile))
        .with_state(reconcile_service);

    let split_routes = Router::new()
        .route("/api/split", post(split))
        .route("/api/split/report", post(split_report))
        .with_state(splitter_service);

    Ok(Router::new()
        .route("/health", get(health_check))
        .merge(reconcile_routes)
        .merge(split_routes)
        .layer(
            ServiceBuilder::new()
                .layer(DefaultBodyLimit::max(config.server.max_upload_mb * 1024 * 1024)),
        ))
}
