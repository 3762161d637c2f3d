//! Push-channel event model and its wire names.
//!
//! Inbound names and aliases match the existing emitters; outbound hints are
//! fire-and-forget and carry no authority (the REST write is the record).

use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::domain::Announcement;
use crate::engine::visibility::{parse_announcement, parse_announcements};

pub const NEW_ANNOUNCEMENT: &str = "newAnnouncement";
pub const ANNOUNCEMENT_UPDATED: &str = "announcementUpdated";
pub const ANNOUNCEMENT_REPOSTED: &str = "announcementReposted";
pub const ANNOUNCEMENT_CANCELLED: &str = "announcementCancelled";
pub const CANCELLED_ALIASES: [&str; 4] = [
    ANNOUNCEMENT_CANCELLED,
    "announcementCanceled",
    "cancelledAnnouncement",
    "announcementDeleted",
];
pub const AGENT_ANNOUNCEMENT_UPDATE: &str = "agentAnnouncementUpdate";
pub const INITIAL_AGENT_DATA: &str = "initialAgentData";

/// One frame on the push channel, in either direction.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PushMessage {
    pub event: String,
    #[serde(default)]
    pub payload: Value,
}

impl PushMessage {
    pub fn new(event: impl Into<String>, payload: Value) -> Self {
        Self {
            event: event.into(),
            payload,
        }
    }
}

/// Totals pushed by `agentAnnouncementUpdate`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementCounts {
    pub views: usize,
    pub likes: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub enum InboundEvent {
    Created(Announcement),
    Updated(Announcement),
    /// Applied exactly like `Updated`.
    Reposted(Announcement),
    Cancelled { id: String },
    Counts {
        announcement_id: String,
        counts: EngagementCounts,
    },
    Snapshot(Vec<Announcement>),
}

impl InboundEvent {
    /// `None` for unknown event names and for payloads that fail to parse.
    pub fn decode(message: &PushMessage) -> Option<Self> {
        let payload = message.payload.clone();
        match message.event.as_str() {
            NEW_ANNOUNCEMENT => parse_announcement(unwrap_announcement(payload)).map(Self::Created),
            ANNOUNCEMENT_UPDATED => parse_announcement(unwrap_announcement(payload)).map(Self::Updated),
            ANNOUNCEMENT_REPOSTED => {
                parse_announcement(unwrap_announcement(payload)).map(Self::Reposted)
            }
            name if CANCELLED_ALIASES.contains(&name) => {
                cancelled_id(&payload).map(|id| Self::Cancelled { id })
            }
            AGENT_ANNOUNCEMENT_UPDATE => {
                let announcement_id = payload.get("announcementId")?.as_str()?.to_string();
                let views = count_field(&payload, "views");
                let likes = count_field(&payload, "likes");
                Some(Self::Counts {
                    announcement_id,
                    counts: EngagementCounts { views, likes },
                })
            }
            INITIAL_AGENT_DATA => {
                let list = match payload {
                    Value::Array(items) => items,
                    Value::Object(mut map) => match map.remove("announcements") {
                        Some(Value::Array(items)) => items,
                        _ => return None,
                    },
                    _ => return None,
                };
                Some(Self::Snapshot(parse_announcements(list)))
            }
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Created(_) => NEW_ANNOUNCEMENT,
            Self::Updated(_) => ANNOUNCEMENT_UPDATED,
            Self::Reposted(_) => ANNOUNCEMENT_REPOSTED,
            Self::Cancelled { .. } => ANNOUNCEMENT_CANCELLED,
            Self::Counts { .. } => AGENT_ANNOUNCEMENT_UPDATE,
            Self::Snapshot(_) => INITIAL_AGENT_DATA,
        }
    }

    pub fn to_message(&self) -> PushMessage {
        let payload = match self {
            Self::Created(a) | Self::Updated(a) | Self::Reposted(a) => {
                serde_json::to_value(a).unwrap_or(Value::Null)
            }
            Self::Cancelled { id } => json!({ "id": id }),
            Self::Counts {
                announcement_id,
                counts,
            } => json!({
                "announcementId": announcement_id,
                "views": counts.views,
                "likes": counts.likes,
            }),
            Self::Snapshot(list) => serde_json::to_value(list).unwrap_or(Value::Null),
        };
        PushMessage::new(self.name(), payload)
    }
}

// Some emitters wrap the object as `{ "announcement": {...} }`.
fn unwrap_announcement(payload: Value) -> Value {
    match payload {
        Value::Object(mut map) if map.contains_key("announcement") && !map.contains_key("status") => {
            map.remove("announcement").unwrap_or(Value::Null)
        }
        other => other,
    }
}

fn cancelled_id(payload: &Value) -> Option<String> {
    let id = match payload {
        Value::String(s) => Some(s.as_str()),
        Value::Object(map) => ["id", "_id", "announcementId"]
            .iter()
            .find_map(|key| map.get(*key).and_then(Value::as_str)),
        _ => None,
    }?;
    let id = id.trim();
    (!id.is_empty()).then(|| id.to_string())
}

// Counts arrive either as numbers or as the full record arrays.
fn count_field(payload: &Value, key: &str) -> usize {
    match payload.get(key) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0) as usize,
        Some(Value::Array(items)) => items.len(),
        _ => 0,
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HintKind {
    ViewAnnouncement,
    AddView,
    LikeAnnouncement,
    ToggleLike,
}

impl HintKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            HintKind::ViewAnnouncement => "view-announcement",
            HintKind::AddView => "add-view",
            HintKind::LikeAnnouncement => "like-announcement",
            HintKind::ToggleLike => "toggle-like",
        }
    }

    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "view-announcement" => Some(HintKind::ViewAnnouncement),
            "add-view" => Some(HintKind::AddView),
            "like-announcement" => Some(HintKind::LikeAnnouncement),
            "toggle-like" => Some(HintKind::ToggleLike),
            _ => None,
        }
    }
}

/// Best-effort live-update hint sent after a successful REST write.
#[derive(Debug, Clone, PartialEq)]
pub struct OutboundHint {
    pub kind: HintKind,
    pub announcement_id: String,
    pub user_id: String,
    pub display_name: Option<String>,
}

impl OutboundHint {
    pub fn to_message(&self) -> PushMessage {
        PushMessage::new(
            self.kind.as_str(),
            json!({
                "announcementId": self.announcement_id,
                "userId": self.user_id,
                "userName": self.display_name,
            }),
        )
    }
}
