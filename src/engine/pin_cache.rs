//! Client-side pin override cache.
//!
//! Holds optimistic pin values so a restart between a toggle and the server
//! round-trip still shows what the user chose. Advisory only: the record
//! server's `isPinned` is authoritative, and every entry can be discarded
//! without losing data there.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

const KEY_PREFIX: &str = "pinned_announcements";

#[derive(Debug, Default)]
pub struct PinOverrideCache {
    path: Option<PathBuf>,
    entries: BTreeMap<String, bool>,
}

impl PinOverrideCache {
    pub fn in_memory() -> Self {
        Self::default()
    }

    /// `pinned_announcements` or `pinned_announcements_<role>`.
    pub fn storage_key(role: Option<&str>) -> String {
        let role: Option<String> = role.map(|r| {
            r.chars()
                .filter(|c| c.is_ascii_alphanumeric() || *c == '-' || *c == '_')
                .collect::<String>()
                .to_lowercase()
        });
        match role {
            Some(r) if !r.is_empty() => format!("{}_{}", KEY_PREFIX, r),
            _ => KEY_PREFIX.to_string(),
        }
    }

    /// Opens the per-role cache file under `dir`. A missing or unreadable
    /// file starts an empty cache.
    pub fn open(dir: impl AsRef<Path>, role: Option<&str>) -> Self {
        let path = dir
            .as_ref()
            .join(format!("{}.json", Self::storage_key(role)));

        let entries = match std::fs::read(&path) {
            Ok(bytes) => serde_json::from_slice(&bytes).unwrap_or_else(|e| {
                tracing::warn!("Discarding unreadable pin cache {}: {}", path.display(), e);
                BTreeMap::new()
            }),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => BTreeMap::new(),
            Err(e) => {
                tracing::warn!("Failed to read pin cache {}: {}", path.display(), e);
                BTreeMap::new()
            }
        };

        Self {
            path: Some(path),
            entries,
        }
    }

    pub fn get(&self, announcement_id: &str) -> Option<bool> {
        self.entries.get(announcement_id).copied()
    }

    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.entries.keys().map(String::as_str)
    }

    pub fn set(&mut self, announcement_id: &str, pinned: bool) {
        self.entries.insert(announcement_id.to_string(), pinned);
        self.persist();
    }

    pub fn remove(&mut self, announcement_id: &str) -> Option<bool> {
        let previous = self.entries.remove(announcement_id);
        if previous.is_some() {
            self.persist();
        }
        previous
    }

    /// Puts back whatever was cached before an optimistic `set`.
    pub fn restore(&mut self, announcement_id: &str, previous: Option<bool>) {
        match previous {
            Some(pinned) => self.set(announcement_id, pinned),
            None => {
                self.remove(announcement_id);
            }
        }
    }

    pub fn clear(&mut self) {
        self.entries.clear();
        self.persist();
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn persist(&self) {
        let Some(path) = &self.path else {
            return;
        };
        if let Some(dir) = path.parent() {
            let _ = std::fs::create_dir_all(dir);
        }
        let result = serde_json::to_vec(&self.entries)
            .map_err(|e| e.to_string())
            .and_then(|bytes| std::fs::write(path, bytes).map_err(|e| e.to_string()));
        if let Err(e) = result {
            tracing::warn!("Failed to persist pin cache {}: {}", path.display(), e);
        }
    }
}
