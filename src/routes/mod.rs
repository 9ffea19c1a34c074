use axum::{routing::get, Router};
use std::sync::Arc;
use tower_http::trace::TraceLayer;

use crate::state::AppState;

pub mod articles;
pub mod comments;
pub mod events;

/// 构建应用路由 - 使用/api/board/前缀避免网关路由冲突
pub fn app(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/", get(health_check))
        .route("/health", get(health_check))
        .nest("/api/board/events", events::router())
        .nest("/api/board/comments", comments::router())
        .nest("/api/board/articles", articles::router())
        .nest("/api/board/hot-articles", articles::hot_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

async fn health_check() -> &'static str {
    "Rainbow board sync is running!"
}
