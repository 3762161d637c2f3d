use std::cmp::Ordering;

use crate::domain::Announcement;

/// Feed order: pinned first, then priority (High > Medium > Low > unknown),
/// then most recently published.
pub fn compare(a: &Announcement, b: &Announcement) -> Ordering {
    b.is_pinned
        .cmp(&a.is_pinned)
        .then_with(|| b.priority.rank().cmp(&a.priority.rank()))
        .then_with(|| b.published_at.cmp(&a.published_at))
}

/// Stable sort, so full ties keep their input order.
pub fn rank(mut announcements: Vec<Announcement>) -> Vec<Announcement> {
    announcements.sort_by(compare);
    announcements
}
