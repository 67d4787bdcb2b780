use axum::{
    extract::{
        State,
        ws::{Message, WebSocket, WebSocketUpgrade},
    },
    response::Response,
};
use futures::{sink::SinkExt, stream::StreamExt};

use super::AppState;

pub async fn feed_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> Response {
    ws.on_upgrade(move |socket| handle_socket(socket, state))
}

/// Forwards hub messages to the socket until either side goes away, then unsubscribes.
async fn handle_socket(socket: WebSocket, state: AppState) {
    let (mut sender, mut receiver) = socket.split();
    let (id, mut events) = state.hub.subscribe_channel().await;
    tracing::info!(subscriber = id.0, "Live feed connection established");

    let mut forward = tokio::spawn(async move {
        while let Some(message) = events.recv().await {
            if let Err(e) = sender.send(Message::Text(message)).await {
                tracing::debug!(subscriber = id.0, error = %e, "Live feed send failed");
                break;
            }
        }
    });

    let mut read = tokio::spawn(async move {
        while let Some(msg) = receiver.next().await {
            match msg {
                Ok(Message::Close(_)) => break,
                // Pings are answered by axum; client text is ignored.
                Ok(_) => {}
                Err(e) => {
                    tracing::debug!(subscriber = id.0, error = %e, "Live feed receive failed");
                    break;
                }
            }
        }
    });

    tokio::select! {
        _ = &mut forward => read.abort(),
        _ = &mut read => forward.abort(),
    }

    state.hub.unsubscribe(id).await;
    tracing::info!(subscriber = id.0, "Live feed connection closed");
}
