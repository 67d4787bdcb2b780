use super::*;
use catalog_watcher::models::{ChangeEvent, ChangeKind};
use futures::{SinkExt, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

/// Next text frame from the feed, failing after a few seconds of silence.
async fn next_event<S>(read: &mut S) -> anyhow::Result<ChangeEvent>
where
    S: futures::Stream<Item = Result<Message, tokio_tungstenite::tungstenite::Error>> + Unpin,
{
    loop {
        let frame = tokio::time::timeout(Duration::from_secs(5), read.next())
            .await?
            .ok_or_else(|| anyhow::anyhow!("feed closed"))??;
        if let Message::Text(text) = frame {
            return Ok(serde_json::from_str(&text)?);
        }
    }
}

#[tokio::test]
async fn test_websocket_client_receives_pass_events() -> anyhow::Result<()> {
    let site = start_catalog_site().await;
    let state = create_test_app_state(&site.uri()).await?;
    let hub = state.hub.clone();
    let scheduler = state.scheduler.clone();
    let (base_url, _server) = start_test_server(state).await?;

    let ws_url = base_url.replace("http://", "ws://") + "/ws";
    let (ws_stream, _) = connect_async(&ws_url).await?;
    let (mut write, mut read) = ws_stream.split();

    let connected = wait_for_condition(
        || {
            let hub = hub.clone();
            async move { hub.subscriber_count().await == 1 }
        },
        5,
    )
    .await;
    assert!(connected, "connection should register one subscriber");

    scheduler.run_pass().await;

    assert_eq!(next_event(&mut read).await?, ChangeEvent::new(ChangeKind::Created, "Bath A", 1000));
    assert_eq!(next_event(&mut read).await?, ChangeEvent::new(ChangeKind::Created, "Bath C", 2500));

    write.send(Message::Close(None)).await?;

    let released = wait_for_condition(
        || {
            let hub = hub.clone();
            async move { hub.subscriber_count().await == 0 }
        },
        5,
    )
    .await;
    assert!(released, "closing the socket should unsubscribe it");

    Ok(())
}

#[tokio::test]
async fn test_dropped_connection_is_unsubscribed() -> anyhow::Result<()> {
    let site = start_catalog_site().await;
    let state = create_test_app_state(&site.uri()).await?;
    let hub = state.hub.clone();
    let (base_url, _server) = start_test_server(state).await?;

    let ws_url = base_url.replace("http://", "ws://") + "/ws";
    let (first, _) = connect_async(&ws_url).await?;
    let (_second, _) = connect_async(&ws_url).await?;

    let both = wait_for_condition(
        || {
            let hub = hub.clone();
            async move { hub.subscriber_count().await == 2 }
        },
        5,
    )
    .await;
    assert!(both);

    drop(first);

    let one_left = wait_for_condition(
        || {
            let hub = hub.clone();
            async move { hub.subscriber_count().await == 1 }
        },
        5,
    )
    .await;
    assert!(one_left, "a vanished client should be removed from the hub");

    Ok(())
}
