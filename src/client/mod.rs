//! REST side of the engine: the calls it makes against the record server.

use async_trait::async_trait;

use crate::domain::{Announcement, RecordAcknowledgeRequest, RecordViewRequest, UpdateAnnouncementRequest};
use crate::error::Result;

pub mod http;

pub use http::HttpAnnouncementApi;

/// Writes return the record server's copy of the announcement when it sends
/// one back; `None` means the write succeeded without a body.
#[async_trait]
pub trait AnnouncementApi: Send + Sync {
    /// `GET /announcements`. Malformed entries are already dropped.
    async fn fetch_all(&self) -> Result<Vec<Announcement>>;
    /// `POST /announcements/{id}/view`
    async fn record_view(&self, id: &str, request: &RecordViewRequest) -> Result<Option<Announcement>>;
    /// `POST /announcements/{id}/acknowledge`
    async fn record_acknowledge(
        &self,
        id: &str,
        request: &RecordAcknowledgeRequest,
    ) -> Result<Option<Announcement>>;
    /// `PATCH /announcements/{id}` with `{isPinned}`. Fails with
    /// `AppError::Unsupported` when the server does not accept PATCH.
    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<Option<Announcement>>;
    /// `PUT /announcements/{id}` with the full object.
    async fn replace(&self, id: &str, request: &UpdateAnnouncementRequest) -> Result<Option<Announcement>>;
}
