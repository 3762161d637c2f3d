use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::domain::{Announcement, AnnouncementStatus, ApprovalStatus};

/// Active, approved and not yet expired. An announcement expiring exactly at
/// `now` is already hidden.
pub fn is_visible(announcement: &Announcement, now: DateTime<Utc>) -> bool {
    announcement.status == AnnouncementStatus::Active
        && announcement.approval_status == ApprovalStatus::Approved
        && announcement.expires_at.map_or(true, |expires_at| expires_at > now)
}

/// Parses one raw payload. Entries without an id or status never reach the
/// classifier or the ranking.
pub fn parse_announcement(raw: Value) -> Option<Announcement> {
    match serde_json::from_value::<Announcement>(raw) {
        Ok(announcement) if !announcement.id.trim().is_empty() => Some(announcement),
        Ok(_) => {
            tracing::warn!("Dropping announcement with empty id");
            None
        }
        Err(e) => {
            tracing::warn!("Dropping malformed announcement: {}", e);
            None
        }
    }
}

pub fn parse_announcements(raw: Vec<Value>) -> Vec<Announcement> {
    raw.into_iter().filter_map(parse_announcement).collect()
}
