// Shared fixtures for the integration tests: a mock catalog site and a fully wired app state.

pub mod feed_tests;
pub mod pipeline_tests;

use axum::{
    body::Body,
    http::{Method, Request},
};
use catalog_watcher::{
    AppConfig, CatalogPipeline, NotificationHub, PipelineScheduler,
    config::FeedFormat,
    database::{PriceStore, SqlitePriceStore, connect_in_memory},
    fetcher::{HttpPageFetcher, PageFetcher},
    web::{AppState, create_router},
};
use std::sync::Arc;
use std::time::Duration;
use tower::{Service, ServiceExt};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

pub const FIRST_PAGE: &str = "/catalog/vanny/";
pub const SECOND_PAGE: &str = "/catalog/vanny/page-2/";

/// A product tile in the catalog's markup; `price: None` renders a tile without a price block.
pub fn product_tile(name: &str, price: Option<&str>) -> String {
    let price = price
        .map(|p| format!(r#"<div class="l-product__price-base">{}</div>"#, p))
        .unwrap_or_default();
    format!(
        r#"<article class="l-product"><div class="l-product__name"><span>{}</span></div>{}</article>"#,
        name, price
    )
}

pub fn catalog_page(tiles: &[String], next: Option<&str>) -> String {
    let next = next
        .map(|href| format!(r#"<a id="navigation_2_next_page" href="{}">next</a>"#, href))
        .unwrap_or_default();
    format!("<html><body>{}{}</body></html>", tiles.concat(), next)
}

/// Two pages: "Bath A" (1 000 р), "Bath B" (no price), then "Bath C" (2 500 р).
pub async fn start_catalog_site() -> MockServer {
    let server = MockServer::start().await;

    Mock::given(method("GET"))
        .and(path(FIRST_PAGE))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page(
            &[product_tile("Bath A", Some("1 000 р")), product_tile("Bath B", None)],
            Some(SECOND_PAGE),
        )))
        .mount(&server)
        .await;

    Mock::given(method("GET"))
        .and(path(SECOND_PAGE))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page(
            &[product_tile("Bath C", Some("2 500 р"))],
            None,
        )))
        .mount(&server)
        .await;

    server
}

/// Test configuration pointing the scraper at `site_url`
pub fn get_test_config(site_url: &str) -> AppConfig {
    let mut config = AppConfig::default();
    config.server.host = "127.0.0.1".to_string();
    config.database.url = "sqlite::memory:".to_string();
    config.scraper.base_url = site_url.to_string();
    config.scraper.start_url = format!("{}{}", site_url, FIRST_PAGE);
    config.scraper.request_timeout = 5;
    config.scheduler.interval_secs = 3600;
    config.feed.format = FeedFormat::Json;
    config
}

/// Create test app state with all components initialized
pub async fn create_test_app_state(site_url: &str) -> anyhow::Result<AppState> {
    create_test_app_state_with(get_test_config(site_url)).await
}

pub async fn create_test_app_state_with(config: AppConfig) -> anyhow::Result<AppState> {
    let store: Arc<dyn PriceStore> = Arc::new(SqlitePriceStore::new(connect_in_memory().await?));
    let fetcher: Arc<dyn PageFetcher> = Arc::new(HttpPageFetcher::new(&config.scraper)?);
    let hub = Arc::new(NotificationHub::new(config.feed.format));
    let pipeline = CatalogPipeline::from_config(&config.scraper, fetcher, store.clone(), hub.clone())?;
    let scheduler = Arc::new(PipelineScheduler::new(Arc::new(pipeline), config.scheduler.interval()));

    Ok(AppState {
        store,
        hub,
        scheduler,
        config,
    })
}

/// Serves the app on a random local port and returns its base URL
pub async fn start_test_server(state: AppState) -> anyhow::Result<(String, tokio::task::JoinHandle<()>)> {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;

    let handle = tokio::spawn(async move {
        let _ = axum::serve(listener, create_router(state)).await;
    });

    Ok((format!("http://{}", addr), handle))
}

/// Helper to make HTTP requests to the test app
pub async fn make_request(
    app: &mut axum::Router,
    method: Method,
    uri: &str,
    body: Option<serde_json::Value>,
) -> anyhow::Result<(axum::http::StatusCode, serde_json::Value)> {
    let mut request = Request::builder().method(method).uri(uri);
    if body.is_some() {
        request = request.header("content-type", "application/json");
    }
    let request = request.body(body.map(|b| Body::from(b.to_string())).unwrap_or_else(Body::empty))?;

    let response = ServiceExt::<Request<Body>>::ready(app).await?.call(request).await?;
    let status = response.status();
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await?;
    let json = if bytes.is_empty() {
        serde_json::Value::Null
    } else {
        serde_json::from_slice(&bytes)?
    };

    Ok((status, json))
}

/// Helper to wait for async operations
pub async fn wait_for_condition<F, Fut>(mut condition: F, timeout_seconds: u64) -> bool
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = bool>,
{
    let start = std::time::Instant::now();
    let timeout = Duration::from_secs(timeout_seconds);

    while start.elapsed() < timeout {
        if condition().await {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    false
}
