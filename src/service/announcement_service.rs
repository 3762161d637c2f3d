use std::sync::Arc;

use serde_json::json;
use validator::Validate;

use crate::{
    domain::{
        Announcement, CreateAnnouncementRequest, RecordAcknowledgeRequest, RecordViewRequest,
        UpdateAnnouncementRequest,
    },
    error::{AppError, Result},
    repository::AnnouncementRepository,
    sync::{events, HintKind, InboundEvent, PushHub, PushMessage},
};

/// System-of-record writes. Every successful write is fanned out on the hub.
pub struct AnnouncementService {
    repo: Arc<dyn AnnouncementRepository>,
    hub: Arc<PushHub>,
}

impl AnnouncementService {
    pub fn new(repo: Arc<dyn AnnouncementRepository>, hub: Arc<PushHub>) -> Self {
        Self { repo, hub }
    }

    pub async fn list(&self) -> Result<Vec<Announcement>> {
        self.repo.list().await
    }

    pub async fn get(&self, id: &str) -> Result<Announcement> {
        self.repo
            .find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Announcement {} not found", id)))
    }

    /// The `initialAgentData` frame sent to a new push subscriber.
    pub async fn snapshot(&self) -> Result<PushMessage> {
        let announcements = self.repo.list().await?;
        Ok(InboundEvent::Snapshot(announcements).to_message())
    }

    pub async fn create(&self, request: CreateAnnouncementRequest) -> Result<Announcement> {
        request.validate()?;
        let announcement = self.repo.create(request).await?;
        tracing::info!("Created announcement {} by {}", announcement.id, announcement.author);
        self.hub
            .publish(InboundEvent::Created(announcement.clone()).to_message());
        Ok(announcement)
    }

    /// Idempotent by user. Broadcasts only when a record was actually added.
    pub async fn record_view(&self, id: &str, request: RecordViewRequest) -> Result<Announcement> {
        request.validate()?;
        let inserted = self.repo.record_view(id, &request).await?;
        let announcement = self.get(id).await?;
        if inserted {
            tracing::debug!("View recorded on {} for {}", id, request.user_id);
            self.broadcast_engagement(&announcement);
        }
        Ok(announcement)
    }

    pub async fn record_acknowledge(
        &self,
        id: &str,
        request: RecordAcknowledgeRequest,
    ) -> Result<Announcement> {
        request.validate()?;
        let inserted = self.repo.record_acknowledge(id, &request).await?;
        let announcement = self.get(id).await?;
        if inserted {
            tracing::debug!("Acknowledgement recorded on {} for {}", id, request.user_id);
            self.broadcast_engagement(&announcement);
        }
        Ok(announcement)
    }

    pub async fn set_pinned(&self, id: &str, pinned: bool) -> Result<Announcement> {
        let announcement = self.repo.set_pinned(id, pinned).await?;
        tracing::info!("Announcement {} pinned = {}", id, pinned);
        self.hub
            .publish(InboundEvent::Updated(announcement.clone()).to_message());
        Ok(announcement)
    }

    pub async fn replace(&self, id: &str, update: UpdateAnnouncementRequest) -> Result<Announcement> {
        let announcement = self.repo.replace(id, update).await?;
        self.hub
            .publish(InboundEvent::Updated(announcement.clone()).to_message());
        Ok(announcement)
    }

    pub async fn repost(&self, id: &str) -> Result<Announcement> {
        let announcement = self.repo.repost(id).await?;
        tracing::info!("Reposted announcement {}", id);
        self.hub
            .publish(InboundEvent::Reposted(announcement.clone()).to_message());
        Ok(announcement)
    }

    pub async fn delete(&self, id: &str) -> Result<()> {
        if !self.repo.delete(id).await? {
            return Err(AppError::NotFound(format!("Announcement {} not found", id)));
        }
        tracing::info!("Cancelled announcement {}", id);
        self.hub.publish(
            InboundEvent::Cancelled { id: id.to_string() }.to_message(),
        );
        Ok(())
    }

    /// Relays a client hint to the other subscribers. Anything that is not a
    /// known hint name is dropped.
    pub fn relay_hint(&self, message: PushMessage) -> bool {
        if HintKind::from_str(&message.event).is_none() {
            tracing::debug!("Ignoring unknown hint {}", message.event);
            return false;
        }
        self.hub.publish(message);
        true
    }

    fn broadcast_engagement(&self, announcement: &Announcement) {
        self.hub
            .publish(InboundEvent::Updated(announcement.clone()).to_message());
        self.hub.publish(PushMessage::new(
            events::AGENT_ANNOUNCEMENT_UPDATE,
            json!({
                "announcementId": announcement.id,
                "views": announcement.view_count(),
                "likes": announcement.like_count(),
            }),
        ));
    }
}
