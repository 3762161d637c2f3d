use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use validator::Validate;

/// An announcement as exchanged with the record server and over the push channel.
///
/// `id` and `status` have no serde default: payloads missing either fail to
/// parse and are dropped at ingestion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Announcement {
    #[serde(alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(default)]
    pub agenda: String,
    #[serde(default, alias = "postedBy")]
    pub author: String,
    #[serde(default)]
    pub priority: Priority,
    pub status: AnnouncementStatus,
    #[serde(default)]
    pub approval_status: ApprovalStatus,
    #[serde(default, alias = "createdAt")]
    pub published_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attachment: Option<Attachment>,
    #[serde(default)]
    pub is_pinned: bool,
    #[serde(default)]
    pub views: Vec<ViewRecord>,
    #[serde(default)]
    pub acknowledgements: Vec<AcknowledgementRecord>,
}

impl Announcement {
    pub fn view_count(&self) -> usize {
        self.views.len()
    }

    pub fn like_count(&self) -> usize {
        self.acknowledgements.len()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Priority {
    High,
    Medium,
    Low,
    #[serde(other)]
    Unknown,
}

impl Priority {
    /// Weight used by the ranking comparator; higher sorts first.
    pub fn rank(&self) -> u8 {
        match self {
            Priority::High => 3,
            Priority::Medium => 2,
            Priority::Low => 1,
            Priority::Unknown => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Priority::High => "High",
            Priority::Medium => "Medium",
            Priority::Low => "Low",
            Priority::Unknown => "Unknown",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "High" => Priority::High,
            "Medium" => Priority::Medium,
            "Low" => Priority::Low,
            _ => Priority::Unknown,
        }
    }
}

impl Default for Priority {
    fn default() -> Self {
        Priority::Unknown
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum AnnouncementStatus {
    Active,
    Inactive,
    #[serde(other)]
    Other,
}

impl AnnouncementStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            AnnouncementStatus::Active => "Active",
            AnnouncementStatus::Inactive => "Inactive",
            AnnouncementStatus::Other => "Other",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Active" => AnnouncementStatus::Active,
            "Inactive" => AnnouncementStatus::Inactive,
            _ => AnnouncementStatus::Other,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ApprovalStatus {
    Approved,
    Pending,
    Rejected,
    #[serde(other)]
    Other,
}

impl ApprovalStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ApprovalStatus::Approved => "Approved",
            ApprovalStatus::Pending => "Pending",
            ApprovalStatus::Rejected => "Rejected",
            ApprovalStatus::Other => "Other",
        }
    }

    pub fn from_str(s: &str) -> Self {
        match s {
            "Approved" => ApprovalStatus::Approved,
            "Pending" => ApprovalStatus::Pending,
            "Rejected" => ApprovalStatus::Rejected,
            _ => ApprovalStatus::Other,
        }
    }
}

impl Default for ApprovalStatus {
    fn default() -> Self {
        ApprovalStatus::Pending
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Attachment {
    #[serde(rename = "type")]
    pub kind: String,
    pub name: String,
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewRecord {
    pub user_id: String,
    #[serde(default, alias = "userName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, alias = "userEmail", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    pub viewed_at: DateTime<Utc>,
}

/// A "like".
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AcknowledgementRecord {
    pub user_id: String,
    #[serde(default, alias = "userName", skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, alias = "userEmail", skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    pub acknowledged_at: DateTime<Utc>,
}

/// Who is engaging. Passed through to the record server untouched.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngagementMeta {
    pub display_name: Option<String>,
    pub email: Option<String>,
    pub employee_id: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordViewRequest {
    #[validate(length(min = 1, message = "userId is required"))]
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub viewed_at: Option<DateTime<Utc>>,
}

impl From<&ViewRecord> for RecordViewRequest {
    fn from(record: &ViewRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            employee_id: record.employee_id.clone(),
            user_name: record.display_name.clone(),
            user_email: record.email.clone(),
            viewed_at: Some(record.viewed_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct RecordAcknowledgeRequest {
    #[validate(length(min = 1, message = "userId is required"))]
    pub user_id: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub employee_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_email: Option<String>,
    pub acknowledged_at: Option<DateTime<Utc>>,
}

impl From<&AcknowledgementRecord> for RecordAcknowledgeRequest {
    fn from(record: &AcknowledgementRecord) -> Self {
        Self {
            user_id: record.user_id.clone(),
            employee_id: record.employee_id.clone(),
            user_name: record.display_name.clone(),
            user_email: record.email.clone(),
            acknowledged_at: Some(record.acknowledged_at),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PinRequest {
    pub is_pinned: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize, Validate)]
#[serde(rename_all = "camelCase")]
pub struct CreateAnnouncementRequest {
    #[validate(length(min = 1, message = "title is required"))]
    pub title: String,
    #[serde(default)]
    pub agenda: String,
    #[validate(length(min = 1, message = "author is required"))]
    pub author: String,
    #[serde(default)]
    pub priority: Priority,
    pub status: Option<AnnouncementStatus>,
    pub approval_status: Option<ApprovalStatus>,
    pub expires_at: Option<DateTime<Utc>>,
    pub attachment: Option<Attachment>,
}

/// Full-object replacement, the PUT fallback for pin toggles.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAnnouncementRequest {
    pub title: String,
    pub agenda: String,
    pub author: String,
    pub priority: Priority,
    pub status: AnnouncementStatus,
    pub approval_status: ApprovalStatus,
    pub expires_at: Option<DateTime<Utc>>,
    pub attachment: Option<Attachment>,
    pub is_pinned: bool,
}

impl From<&Announcement> for UpdateAnnouncementRequest {
    fn from(announcement: &Announcement) -> Self {
        Self {
            title: announcement.title.clone(),
            agenda: announcement.agenda.clone(),
            author: announcement.author.clone(),
            priority: announcement.priority,
            status: announcement.status,
            approval_status: announcement.approval_status,
            expires_at: announcement.expires_at,
            attachment: announcement.attachment.clone(),
            is_pinned: announcement.is_pinned,
        }
    }
}
