use async_trait::async_trait;
use crate::domain::*;
use crate::error::Result;

pub mod announcement_repository;

pub use announcement_repository::SqliteAnnouncementRepository;

#[async_trait]
pub trait AnnouncementRepository: Send + Sync {
    async fn create(&self, request: CreateAnnouncementRequest) -> Result<Announcement>;
    async fn find_by_id(&self, id: &str) -> Result<Option<Announcement>>;
    /// Every stored announcement, newest first. Visibility is the client's call.
    async fn list(&self) -> Result<Vec<Announcement>>;
    /// Returns whether a new row was written; `false` means the user was
    /// already recorded.
    async fn record_view(&self, id: &str, request: &RecordViewRequest) -> Result<bool>;
    async fn record_acknowledge(&self, id: &str, request: &RecordAcknowledgeRequest) -> Result<bool>;
    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<Announcement>;
    async fn replace(&self, id: &str, update: UpdateAnnouncementRequest) -> Result<Announcement>;
    /// Moves the publish time to now.
    async fn repost(&self, id: &str) -> Result<Announcement>;
    async fn delete(&self, id: &str) -> Result<bool>;
}
