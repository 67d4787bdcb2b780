use axum::{
    Router,
    response::Json,
    routing::{get, post},
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

use crate::AppConfig;
use crate::database::PriceStore;
use crate::notification_hub::NotificationHub;
use crate::scheduler::PipelineScheduler;

pub mod feed;
pub mod handlers;
pub mod responses;

pub use feed::feed_handler;
pub use handlers::{
    create_price, delete_price, get_price, list_prices, pipeline_status, start_pipeline, update_price,
};
pub use responses::*;

#[derive(Clone)]
pub struct AppState {
    pub store: Arc<dyn PriceStore>,
    pub hub: Arc<NotificationHub>,
    pub scheduler: Arc<PipelineScheduler>,
    pub config: AppConfig,
}

pub fn create_router(state: AppState) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .nest("/api/v1", api_routes())
        .route("/ws", get(feed_handler))
        .layer(
            ServiceBuilder::new()
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                        .on_response(DefaultOnResponse::new().level(Level::INFO)),
                )
                .layer(CompressionLayer::new())
                .layer(CorsLayer::permissive()),
        )
        .with_state(state)
}

fn api_routes() -> Router<AppState> {
    Router::new()
        .route("/prices", get(list_prices).post(create_price))
        .route("/prices/:id", get(get_price).put(update_price).delete(delete_price))
        .route("/pipeline/start", post(start_pipeline))
        .route("/pipeline/status", get(pipeline_status))
}

async fn health_check() -> Json<serde_json::Value> {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": chrono::Utc::now(),
        "version": env!("CARGO_PKG_VERSION"),
        "service": "catalog-watcher"
    }))
}

pub async fn serve(config: AppConfig, state: AppState) -> anyhow::Result<()> {
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(format!("{}:{}", config.server.host, config.server.port)).await?;

    tracing::info!("Server starting on {}:{}", config.server.host, config.server.port);

    axum::serve(listener, app).await?;

    Ok(())
}
