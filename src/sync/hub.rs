use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{broadcast, mpsc, Mutex};
use tokio::task::JoinHandle;

use crate::{
    error::{AppError, Result},
    sync::{OutboundHint, PushChannel, PushMessage},
};

const INBOX_CAPACITY: usize = 256;

/// In-process fan-out of push frames. The record server publishes every
/// write here; SSE subscribers and [`HubChannel`]s read from it.
pub struct PushHub {
    tx: broadcast::Sender<PushMessage>,
}

impl PushHub {
    pub fn new(capacity: usize) -> Self {
        let (tx, _) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    pub fn publish(&self, message: PushMessage) {
        tracing::debug!("Publishing push event {}", message.event);
        // No subscribers is not an error.
        let _ = self.tx.send(message);
    }

    pub fn subscribe(&self) -> broadcast::Receiver<PushMessage> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for PushHub {
    fn default() -> Self {
        Self::new(1024)
    }
}

/// [`PushChannel`] over a [`PushHub`] in the same process.
pub struct HubChannel {
    hub: std::sync::Arc<PushHub>,
    forwarder: Mutex<Option<JoinHandle<()>>>,
    disposed: AtomicBool,
}

impl HubChannel {
    pub fn new(hub: std::sync::Arc<PushHub>) -> Self {
        Self {
            hub,
            forwarder: Mutex::new(None),
            disposed: AtomicBool::new(false),
        }
    }
}

#[async_trait]
impl PushChannel for HubChannel {
    async fn connect(&self) -> Result<mpsc::Receiver<PushMessage>> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AppError::Transport("channel disposed".to_string()));
        }
        self.disconnect().await;

        let mut rx = self.hub.subscribe();
        let (tx, inbox) = mpsc::channel(INBOX_CAPACITY);
        let handle = tokio::spawn(async move {
            loop {
                match rx.recv().await {
                    Ok(message) => {
                        if tx.send(message).await.is_err() {
                            break;
                        }
                    }
                    Err(broadcast::error::RecvError::Lagged(skipped)) => {
                        tracing::warn!("Push subscriber lagged, {} events skipped", skipped);
                    }
                    Err(broadcast::error::RecvError::Closed) => break,
                }
            }
        });
        *self.forwarder.lock().await = Some(handle);
        Ok(inbox)
    }

    async fn disconnect(&self) {
        if let Some(handle) = self.forwarder.lock().await.take() {
            handle.abort();
        }
    }

    async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.disconnect().await;
    }

    async fn emit(&self, hint: OutboundHint) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(AppError::Transport("channel disposed".to_string()));
        }
        self.hub.publish(hint.to_message());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use std::sync::Arc;

    #[tokio::test]
    async fn test_forwards_hub_messages() {
        let hub = Arc::new(PushHub::default());
        let channel = HubChannel::new(hub.clone());
        let mut inbox = channel.connect().await.unwrap();

        hub.publish(PushMessage::new("announcementUpdated", json!({ "id": "a1" })));
        let received = inbox.recv().await.unwrap();
        assert_eq!(received.event, "announcementUpdated");
    }

    #[tokio::test]
    async fn test_disposed_channel_refuses_connect() {
        let hub = Arc::new(PushHub::default());
        let channel = HubChannel::new(hub);
        channel.dispose().await;
        assert!(channel.connect().await.is_err());
    }
}
