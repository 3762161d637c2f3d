//! Push channel: the live half of the sync model. REST (`client`) is the
//! bootstrap and fallback half.
//!
//! Delivery is at-least-once at best. Consumers must tolerate duplicates,
//! reordering and gaps; the reconciliation store does so by re-deriving its
//! whole view on every event.

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::Result;

pub mod events;
pub mod hub;
pub mod sse;

pub use events::{EngagementCounts, HintKind, InboundEvent, OutboundHint, PushMessage};
pub use hub::{HubChannel, PushHub};
pub use sse::SseChannel;

/// An explicitly owned push transport with its own lifecycle.
#[async_trait]
pub trait PushChannel: Send + Sync {
    /// Opens the transport and returns the stream of inbound frames. The
    /// receiver ends when the transport drops or `disconnect` is called.
    async fn connect(&self) -> Result<mpsc::Receiver<PushMessage>>;

    async fn disconnect(&self);

    /// Disconnects for good; later `connect` calls fail.
    async fn dispose(&self);

    /// Fire-and-forget. Callers log failures and move on.
    async fn emit(&self, hint: OutboundHint) -> Result<()>;
}
