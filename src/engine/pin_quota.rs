//! Per-department pin quota.
//!
//! The quota is soft. Each client checks against its own snapshot, so two
//! clients racing for the last slot in a department can both succeed and the
//! record server will briefly hold more than the limit. Nothing corrects that
//! after the fact; the next pin attempt in that department is simply
//! rejected until someone unpins.

use std::sync::Arc;

use async_trait::async_trait;

use crate::{
    client::AnnouncementApi,
    domain::{Announcement, Department, UpdateAnnouncementRequest},
    engine::{
        classifier::DepartmentClassifier,
        command::{Applied, Command},
        working_set::WorkingSet,
    },
    error::{AppError, Result},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinRejection {
    QuotaExceeded { department: Department, limit: usize },
}

impl PinRejection {
    pub fn code(&self) -> &'static str {
        match self {
            PinRejection::QuotaExceeded { .. } => "QUOTA_EXCEEDED",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PinOutcome {
    Accepted { pinned: bool },
    Rejected(PinRejection),
}

/// Decides a pin toggle against the announcements currently known.
/// Unpinning is always accepted.
pub fn decide_toggle<'a>(
    target: &Announcement,
    current: impl IntoIterator<Item = &'a Announcement>,
    classifier: &DepartmentClassifier,
    max_per_department: usize,
) -> PinOutcome {
    let new_pinned = !target.is_pinned;
    if !new_pinned {
        return PinOutcome::Accepted { pinned: false };
    }

    let department = classifier.classify(&target.author);
    let pinned_in_department = current
        .into_iter()
        .filter(|a| a.id != target.id && a.is_pinned)
        .filter(|a| classifier.classify(&a.author) == department)
        .count();

    if pinned_in_department >= max_per_department {
        PinOutcome::Rejected(PinRejection::QuotaExceeded {
            department,
            limit: max_per_department,
        })
    } else {
        PinOutcome::Accepted { pinned: true }
    }
}

pub struct TogglePin {
    announcement_id: String,
    classifier: Arc<DepartmentClassifier>,
    max_per_department: usize,
    new_pinned: bool,
    previous_pinned: bool,
    previous_override: Option<bool>,
    full_object: Option<UpdateAnnouncementRequest>,
}

impl TogglePin {
    pub fn new(
        announcement_id: impl Into<String>,
        classifier: Arc<DepartmentClassifier>,
        max_per_department: usize,
    ) -> Self {
        Self {
            announcement_id: announcement_id.into(),
            classifier,
            max_per_department,
            new_pinned: false,
            previous_pinned: false,
            previous_override: None,
            full_object: None,
        }
    }
}

#[async_trait]
impl Command for TogglePin {
    type Output = PinOutcome;

    fn apply(&mut self, working: &mut WorkingSet) -> Result<Applied<PinOutcome>> {
        let target = working
            .get(&self.announcement_id)
            .ok_or_else(|| AppError::NotFound(format!("Announcement {} not found", self.announcement_id)))?;

        let outcome = decide_toggle(
            target,
            working.iter(),
            &self.classifier,
            self.max_per_department,
        );
        let PinOutcome::Accepted { pinned } = outcome else {
            tracing::info!("Pin rejected for {}: {:?}", self.announcement_id, outcome);
            return Ok(Applied::Done(outcome));
        };

        self.previous_pinned = target.is_pinned;
        self.new_pinned = pinned;
        self.previous_override = working.pins().get(&self.announcement_id);
        working.pins_mut().set(&self.announcement_id, pinned);
        working.begin_pin(&self.announcement_id);

        if let Some(announcement) = working.get_mut(&self.announcement_id) {
            announcement.is_pinned = pinned;
            self.full_object = Some(UpdateAnnouncementRequest::from(&*announcement));
        }
        Ok(Applied::Proceed)
    }

    async fn commit(&self, api: &dyn AnnouncementApi) -> Result<Option<Announcement>> {
        match api.set_pinned(&self.announcement_id, self.new_pinned).await {
            Err(AppError::Unsupported(reason)) => {
                tracing::debug!("PATCH unsupported ({}), retrying pin as PUT", reason);
                let body = self
                    .full_object
                    .as_ref()
                    .ok_or_else(|| AppError::Internal("pin commit without applied state".to_string()))?;
                api.replace(&self.announcement_id, body).await
            }
            other => other,
        }
    }

    fn rollback(&self, working: &mut WorkingSet) {
        working
            .pins_mut()
            .restore(&self.announcement_id, self.previous_override);
        working.end_pin(&self.announcement_id);
        if let Some(announcement) = working.get_mut(&self.announcement_id) {
            announcement.is_pinned = self.previous_pinned;
        }
    }

    fn committed(&self, working: &mut WorkingSet) {
        working.pins_mut().remove(&self.announcement_id);
        working.end_pin(&self.announcement_id);
    }

    fn settled(&self) -> PinOutcome {
        PinOutcome::Accepted {
            pinned: self.new_pinned,
        }
    }
}
