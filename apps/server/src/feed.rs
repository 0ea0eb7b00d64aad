//! # Change Feed
//!
//! Pushes a [`ChangeEvent`] to every connected client after each successful
//! mutation, so open storefront and admin screens can refetch.
//!
//! ## Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  POST /api/admin/sales ──► checkout commits ──► feed.publish(event)    │
//! │                                                      │                  │
//! │                                      broadcast::channel(256)            │
//! │                                   ┌──────────┼──────────┐               │
//! │                                   ▼          ▼          ▼               │
//! │                               socket 1   socket 2   socket 3            │
//! │                                                                         │
//! │  Frame: {"collection":"sales","id":"…","kind":"created","at":"…"}      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! A client that falls more than 256 events behind skips the missed ones
//! and keeps receiving; it should refetch what it shows.

use std::time::Duration;

use axum::extract::ws::{Message, WebSocket, WebSocketUpgrade};
use axum::extract::State;
use axum::response::IntoResponse;
use futures_util::{SinkExt, StreamExt};
use mercado_core::ChangeEvent;
use tokio::sync::broadcast;
use tokio::time::interval;
use tracing::{debug, info, warn};

use crate::state::AppState;

const FEED_CAPACITY: usize = 256;
const PING_INTERVAL: Duration = Duration::from_secs(30);

/// In-process broadcast of change events.
#[derive(Clone)]
pub struct Feed {
    tx: broadcast::Sender<ChangeEvent>,
}

impl Feed {
    pub fn new() -> Self {
        let (tx, _) = broadcast::channel(FEED_CAPACITY);
        Feed { tx }
    }

    /// Sends to current subscribers. No subscribers is not an error.
    pub fn publish(&self, event: ChangeEvent) {
        debug!(
            collection = ?event.collection,
            id = %event.id,
            kind = ?event.kind,
            "Publishing change"
        );
        let _ = self.tx.send(event);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<ChangeEvent> {
        self.tx.subscribe()
    }
}

impl Default for Feed {
    fn default() -> Self {
        Feed::new()
    }
}

/// `GET /api/feed` WebSocket upgrade.
pub async fn ws_handler(ws: WebSocketUpgrade, State(state): State<AppState>) -> impl IntoResponse {
    ws.on_upgrade(move |socket| handle_socket(socket, state.feed.subscribe()))
}

async fn handle_socket(socket: WebSocket, mut events: broadcast::Receiver<ChangeEvent>) {
    let (mut sender, mut receiver) = socket.split();
    info!("Feed client connected");

    let mut ping = interval(PING_INTERVAL);
    ping.tick().await;

    loop {
        tokio::select! {
            event = events.recv() => match event {
                Ok(event) => {
                    let json = match serde_json::to_string(&event) {
                        Ok(json) => json,
                        Err(e) => {
                            warn!(?e, "Failed to encode change event");
                            continue;
                        }
                    };
                    if sender.send(Message::Text(json.into())).await.is_err() {
                        break;
                    }
                }
                Err(broadcast::error::RecvError::Lagged(skipped)) => {
                    warn!(skipped, "Feed client lagged");
                    continue;
                }
                Err(broadcast::error::RecvError::Closed) => break,
            },
            _ = ping.tick() => {
                if sender.send(Message::Ping(axum::body::Bytes::new())).await.is_err() {
                    break;
                }
            }
            incoming = receiver.next() => match incoming {
                Some(Ok(Message::Close(_))) | None => break,
                Some(Ok(_)) => {}
                Some(Err(e)) => {
                    debug!(?e, "Feed socket error");
                    break;
                }
            },
        }
    }

    info!("Feed client disconnected");
}

#[cfg(test)]
mod tests {
    use super::*;
    use mercado_core::{ChangeKind, Collection};

    #[tokio::test]
    async fn test_publish_reaches_subscribers() {
        let feed = Feed::new();
        let mut rx = feed.subscribe();

        feed.publish(ChangeEvent::new(Collection::Products, "p-1", ChangeKind::Updated));

        let event = rx.recv().await.unwrap();
        assert_eq!(event.id, "p-1");
        assert_eq!(event.kind, ChangeKind::Updated);
    }

    #[test]
    fn test_publish_without_subscribers() {
        Feed::new().publish(ChangeEvent::new(Collection::Sales, "s-1", ChangeKind::Created));
    }

    #[tokio::test]
    async fn test_lagging_subscriber_skips() {
        let feed = Feed::new();
        let mut rx = feed.subscribe();
        for n in 0..(FEED_CAPACITY + 10) {
            feed.publish(ChangeEvent::new(Collection::Products, n.to_string(), ChangeKind::Updated));
        }

        assert!(matches!(rx.recv().await, Err(broadcast::error::RecvError::Lagged(10))));
        let next = rx.recv().await.unwrap();
        assert_eq!(next.id, "10");
    }
}
