//! Exactly-once view and like tracking per (announcement, user).
//!
//! The local duplicate check only saves a round trip. Two clients racing on
//! the same user can both send; the record server's unique key on
//! (announcement, user) is what guarantees a single record.

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::{
    client::AnnouncementApi,
    domain::{AcknowledgementRecord, Announcement, EngagementMeta, RecordAcknowledgeRequest, RecordViewRequest, ViewRecord},
    engine::{
        command::{Applied, Command},
        working_set::WorkingSet,
    },
    error::Result,
    sync::{HintKind, OutboundHint},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EngagementKind {
    View,
    Acknowledge,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RecordOutcome {
    pub already_recorded: bool,
}

pub fn has_viewed(announcement: &Announcement, user_id: &str) -> bool {
    announcement.views.iter().any(|v| v.user_id == user_id)
}

pub fn has_acknowledged(announcement: &Announcement, user_id: &str) -> bool {
    announcement.acknowledgements.iter().any(|a| a.user_id == user_id)
}

pub struct RecordEngagement {
    kind: EngagementKind,
    announcement_id: String,
    user_id: String,
    meta: EngagementMeta,
    at: DateTime<Utc>,
}

impl RecordEngagement {
    pub fn new(
        kind: EngagementKind,
        announcement_id: impl Into<String>,
        user_id: impl Into<String>,
        meta: EngagementMeta,
        at: DateTime<Utc>,
    ) -> Self {
        Self {
            kind,
            announcement_id: announcement_id.into(),
            user_id: user_id.into(),
            meta,
            at,
        }
    }

    fn view_record(&self) -> ViewRecord {
        ViewRecord {
            user_id: self.user_id.clone(),
            display_name: self.meta.display_name.clone(),
            email: self.meta.email.clone(),
            employee_id: self.meta.employee_id.clone(),
            viewed_at: self.at,
        }
    }

    fn acknowledgement_record(&self) -> AcknowledgementRecord {
        AcknowledgementRecord {
            user_id: self.user_id.clone(),
            display_name: self.meta.display_name.clone(),
            email: self.meta.email.clone(),
            employee_id: self.meta.employee_id.clone(),
            acknowledged_at: self.at,
        }
    }

    fn hint(&self, kind: HintKind) -> OutboundHint {
        OutboundHint {
            kind,
            announcement_id: self.announcement_id.clone(),
            user_id: self.user_id.clone(),
            display_name: self.meta.display_name.clone(),
        }
    }
}

#[async_trait]
impl Command for RecordEngagement {
    type Output = RecordOutcome;

    fn apply(&mut self, working: &mut WorkingSet) -> Result<Applied<RecordOutcome>> {
        let not_recorded = Applied::Done(RecordOutcome {
            already_recorded: false,
        });
        if self.user_id.trim().is_empty() {
            return Ok(not_recorded);
        }
        let Some(announcement) = working.get_mut(&self.announcement_id) else {
            tracing::debug!(
                "Ignoring {:?} for unknown announcement {}",
                self.kind,
                self.announcement_id
            );
            return Ok(not_recorded);
        };

        let already = match self.kind {
            EngagementKind::View => has_viewed(announcement, &self.user_id),
            EngagementKind::Acknowledge => has_acknowledged(announcement, &self.user_id),
        };
        if already {
            return Ok(Applied::Done(RecordOutcome {
                already_recorded: true,
            }));
        }

        match self.kind {
            EngagementKind::View => announcement.views.push(self.view_record()),
            EngagementKind::Acknowledge => announcement.acknowledgements.push(self.acknowledgement_record()),
        }
        Ok(Applied::Proceed)
    }

    async fn commit(&self, api: &dyn AnnouncementApi) -> Result<Option<Announcement>> {
        match self.kind {
            EngagementKind::View => {
                let request = RecordViewRequest::from(&self.view_record());
                api.record_view(&self.announcement_id, &request).await
            }
            EngagementKind::Acknowledge => {
                let request = RecordAcknowledgeRequest::from(&self.acknowledgement_record());
                api.record_acknowledge(&self.announcement_id, &request).await
            }
        }
    }

    fn rollback(&self, working: &mut WorkingSet) {
        let Some(announcement) = working.get_mut(&self.announcement_id) else {
            return;
        };
        // Only the record this command appended; a server copy merged in the
        // meantime stays.
        match self.kind {
            EngagementKind::View => announcement
                .views
                .retain(|v| !(v.user_id == self.user_id && v.viewed_at == self.at)),
            EngagementKind::Acknowledge => announcement
                .acknowledgements
                .retain(|a| !(a.user_id == self.user_id && a.acknowledged_at == self.at)),
        }
    }

    fn settled(&self) -> RecordOutcome {
        RecordOutcome {
            already_recorded: false,
        }
    }

    fn hints(&self) -> Vec<OutboundHint> {
        match self.kind {
            EngagementKind::View => vec![
                self.hint(HintKind::ViewAnnouncement),
                self.hint(HintKind::AddView),
            ],
            EngagementKind::Acknowledge => vec![
                self.hint(HintKind::LikeAnnouncement),
                self.hint(HintKind::ToggleLike),
            ],
        }
    }
}
