use std::collections::{BTreeMap, BTreeSet, HashMap};

use chrono::{DateTime, Utc};

use crate::{
    domain::Announcement,
    engine::{pin_cache::PinOverrideCache, visibility::is_visible},
    sync::EngagementCounts,
};

/// The normalized set of announcements a client holds, keyed by id.
///
/// Only the reconciliation store writes to it. Keyed by a `BTreeMap` so that
/// iteration, and therefore the ranked output, never depends on insertion
/// history.
///
/// Pin overrides are honoured in two cases only: entries restored from disk
/// apply to the first bootstrap, and entries written by a pin toggle apply
/// until that toggle settles. Any other authoritative copy that disagrees
/// with an override wins and the override is discarded.
#[derive(Debug)]
pub struct WorkingSet {
    announcements: BTreeMap<String, Announcement>,
    remote_counts: HashMap<String, EngagementCounts>,
    pins: PinOverrideCache,
    pins_in_flight: BTreeSet<String>,
    restoring: bool,
}

impl Default for WorkingSet {
    fn default() -> Self {
        Self::new(PinOverrideCache::in_memory())
    }
}

impl WorkingSet {
    pub fn new(pins: PinOverrideCache) -> Self {
        Self {
            announcements: BTreeMap::new(),
            remote_counts: HashMap::new(),
            pins,
            pins_in_flight: BTreeSet::new(),
            restoring: true,
        }
    }

    pub fn get(&self, id: &str) -> Option<&Announcement> {
        self.announcements.get(id)
    }

    pub fn get_mut(&mut self, id: &str) -> Option<&mut Announcement> {
        self.announcements.get_mut(id)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Announcement> {
        self.announcements.values()
    }

    pub fn len(&self) -> usize {
        self.announcements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.announcements.is_empty()
    }

    pub fn pins(&self) -> &PinOverrideCache {
        &self.pins
    }

    pub fn pins_mut(&mut self) -> &mut PinOverrideCache {
        &mut self.pins
    }

    /// Marks a pin write as outstanding; its override outranks pushes.
    pub fn begin_pin(&mut self, id: &str) {
        self.pins_in_flight.insert(id.to_string());
    }

    pub fn end_pin(&mut self, id: &str) {
        self.pins_in_flight.remove(id);
    }

    /// Attaches any local pin override, then inserts or replaces by id.
    /// Invisible announcements are removed instead. Returns whether the
    /// announcement is in the set afterwards.
    pub fn upsert(&mut self, mut announcement: Announcement, now: DateTime<Utc>) -> bool {
        self.attach_pin_override(&mut announcement);
        if !is_visible(&announcement, now) {
            self.remove(&announcement.id);
            return false;
        }
        self.announcements.insert(announcement.id.clone(), announcement);
        true
    }

    pub fn remove(&mut self, id: &str) -> Option<Announcement> {
        self.remote_counts.remove(id);
        self.announcements.remove(id)
    }

    pub fn replace_all(&mut self, announcements: Vec<Announcement>, now: DateTime<Utc>) {
        self.announcements.clear();
        self.remote_counts.clear();
        for announcement in announcements {
            self.upsert(announcement, now);
        }
        if self.restoring {
            self.restoring = false;
            let orphaned: Vec<String> = self
                .pins
                .ids()
                .filter(|id| !self.announcements.contains_key(*id) && !self.pins_in_flight.contains(*id))
                .map(String::from)
                .collect();
            for id in orphaned {
                tracing::debug!("Dropping pin override for unknown announcement {}", id);
                self.pins.remove(&id);
            }
        }
    }

    /// Drops everything no longer visible at `now`; returns how many went.
    pub fn retain_visible(&mut self, now: DateTime<Utc>) -> usize {
        let expired: Vec<String> = self
            .announcements
            .values()
            .filter(|a| !is_visible(a, now))
            .map(|a| a.id.clone())
            .collect();
        for id in &expired {
            self.remove(id);
        }
        expired.len()
    }

    pub fn set_remote_counts(&mut self, id: &str, counts: EngagementCounts) {
        if self.announcements.contains_key(id) {
            self.remote_counts.insert(id.to_string(), counts);
        }
    }

    /// Record counts, raised to the last pushed totals. Never goes down on a
    /// stale push.
    pub fn counts(&self, id: &str) -> EngagementCounts {
        let Some(announcement) = self.announcements.get(id) else {
            return EngagementCounts { views: 0, likes: 0 };
        };
        let remote = self.remote_counts.get(id);
        EngagementCounts {
            views: announcement.view_count().max(remote.map_or(0, |c| c.views)),
            likes: announcement.like_count().max(remote.map_or(0, |c| c.likes)),
        }
    }

    // A matching override has round-tripped and is dropped.
    fn attach_pin_override(&mut self, announcement: &mut Announcement) {
        let Some(pinned) = self.pins.get(&announcement.id) else {
            return;
        };
        if pinned == announcement.is_pinned {
            self.pins.remove(&announcement.id);
        } else if self.restoring || self.pins_in_flight.contains(&announcement.id) {
            announcement.is_pinned = pinned;
        } else {
            tracing::debug!(
                "Discarding stale pin override for {}, server has isPinned={}",
                announcement.id,
                announcement.is_pinned
            );
            self.pins.remove(&announcement.id);
        }
    }
}
