use super::*;
use catalog_watcher::models::{ChangeEvent, ChangeKind};
use wiremock::matchers::{method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

fn drain(feed: &mut tokio::sync::mpsc::UnboundedReceiver<String>) -> Vec<ChangeEvent> {
    let mut events = Vec::new();
    while let Ok(message) = feed.try_recv() {
        events.push(serde_json::from_str(&message).expect("feed messages are JSON change events"));
    }
    events
}

#[tokio::test]
async fn test_two_page_catalog_pass() -> anyhow::Result<()> {
    let site = start_catalog_site().await;
    let state = create_test_app_state(&site.uri()).await?;
    let (_id, mut feed) = state.hub.subscribe_channel().await;

    let report = state.scheduler.run_pass().await;

    assert_eq!(report.pages_visited, 2);
    assert_eq!(report.products_found, 3);
    assert!(report.aborted.is_none());
    assert_eq!(report.summary.inserted, 2);
    assert_eq!(report.summary.excluded, 1);

    let records = state.store.list(0, 100).await?;
    let stored: Vec<(&str, i64)> = records.iter().map(|r| (r.name.as_str(), r.cost)).collect();
    assert_eq!(stored, vec![("Bath A", 1000), ("Bath C", 2500)]);

    let events = drain(&mut feed);
    assert_eq!(
        events,
        vec![
            ChangeEvent::new(ChangeKind::Created, "Bath A", 1000),
            ChangeEvent::new(ChangeKind::Created, "Bath C", 2500),
        ]
    );

    Ok(())
}

#[tokio::test]
async fn test_repeated_pass_is_silent() -> anyhow::Result<()> {
    let site = start_catalog_site().await;
    let state = create_test_app_state(&site.uri()).await?;

    state.scheduler.run_pass().await;
    let (_id, mut feed) = state.hub.subscribe_channel().await;
    let report = state.scheduler.run_pass().await;

    assert_eq!(report.summary.inserted, 0);
    assert_eq!(report.summary.unchanged, 2);
    assert_eq!(state.store.count().await?, 2);
    assert!(drain(&mut feed).is_empty());

    Ok(())
}

#[tokio::test]
async fn test_price_change_appends_history() -> anyhow::Result<()> {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FIRST_PAGE))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page(
            &[product_tile("Bath A", Some("1 000 р"))],
            None,
        )))
        .up_to_n_times(1)
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path(FIRST_PAGE))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page(
            &[product_tile("Bath A", Some("900 р"))],
            None,
        )))
        .mount(&site)
        .await;

    let state = create_test_app_state(&site.uri()).await?;
    state.scheduler.run_pass().await;
    state.scheduler.run_pass().await;

    let records = state.store.list(0, 100).await?;
    let costs: Vec<i64> = records.iter().map(|r| r.cost).collect();
    assert_eq!(costs, vec![1000, 900]);

    Ok(())
}

#[tokio::test]
async fn test_failed_page_keeps_earlier_results() -> anyhow::Result<()> {
    let site = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path(FIRST_PAGE))
        .respond_with(ResponseTemplate::new(200).set_body_string(catalog_page(
            &[product_tile("Bath A", Some("1 000 р"))],
            Some(SECOND_PAGE),
        )))
        .mount(&site)
        .await;
    Mock::given(method("GET"))
        .and(path(SECOND_PAGE))
        .respond_with(ResponseTemplate::new(503))
        .mount(&site)
        .await;

    let state = create_test_app_state(&site.uri()).await?;
    let report = state.scheduler.run_pass().await;

    assert_eq!(report.pages_visited, 1);
    assert!(report.aborted.is_some());
    assert_eq!(report.summary.inserted, 1);
    assert_eq!(state.store.count().await?, 1);

    let stats = state.scheduler.stats().await;
    assert_eq!(stats.aborted_walks, 1);

    Ok(())
}

#[tokio::test]
async fn test_disconnected_subscriber_does_not_block_others() -> anyhow::Result<()> {
    let site = start_catalog_site().await;
    let state = create_test_app_state(&site.uri()).await?;

    let (_first, mut first_feed) = state.hub.subscribe_channel().await;
    let (second, second_feed) = state.hub.subscribe_channel().await;
    let (_third, mut third_feed) = state.hub.subscribe_channel().await;
    drop(second_feed);

    state.scheduler.run_pass().await;

    assert_eq!(drain(&mut first_feed).len(), 2);
    assert_eq!(drain(&mut third_feed).len(), 2);
    assert_eq!(state.hub.subscriber_count().await, 2);
    assert!(!state.hub.unsubscribe(second).await);

    Ok(())
}

#[tokio::test]
async fn test_page_cap_marks_pass_truncated() -> anyhow::Result<()> {
    let site = start_catalog_site().await;
    let mut config = get_test_config(&site.uri());
    config.scraper.max_pages = 1;
    let state = create_test_app_state_with(config).await?;

    let report = state.scheduler.run_pass().await;

    assert_eq!(report.pages_visited, 1);
    assert!(report.truncated);
    assert!(report.aborted.is_none());
    assert_eq!(report.summary.inserted, 1);

    let full = create_test_app_state(&site.uri()).await?.scheduler.run_pass().await;
    assert!(!full.truncated);

    Ok(())
}
