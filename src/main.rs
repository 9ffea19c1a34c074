use std::sync::Arc;
use tokio::time::Duration;
use tracing::info;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

use rainbow_board_sync::{
    config::Config, routes, state::AppState, utils::time::system_clock,
};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // 加载配置
    dotenv::dotenv().ok();
    let config = Config::from_env()?;

    // 初始化日志
    // 生产环境输出 JSON 日志
    let registry = tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(config.log_level.clone()));
    if config.is_production() {
        registry.with(tracing_subscriber::fmt::layer().json()).init();
    } else {
        registry.with(tracing_subscriber::fmt::layer()).init();
    }

    info!("Starting Rainbow board sync service...");

    let app_state = Arc::new(AppState::build(config.clone(), system_clock()));

    // 启动后台任务
    start_background_tasks(&app_state);

    let app = routes::app(app_state.clone());

    let addr = format!("{}:{}", config.server_host, config.server_port);
    info!("Starting server on http://{}", addr);

    axum::Server::bind(&addr.parse()?)
        .serve(app.into_make_service())
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    app_state.shutdown().await;
    info!("Server stopped");

    Ok(())
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::error!("Failed to listen for shutdown signal: {}", e);
    }
}

fn start_background_tasks(app_state: &AppState) {
    info!("Starting background tasks...");

    // 清理过期的窗口计数器
    let every = Duration::from_secs(app_state.config.counter_cleanup_interval_secs.max(1));
    for store in app_state.hot_article_service.windowed_stores() {
        store.spawn_cleanup(every);
    }

    info!("Background tasks started successfully");
}
