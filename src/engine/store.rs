//! Client reconciliation store.
//!
//! Owns the working set, the push channel and the pin override cache. Every
//! source of change (bootstrap, push events, local commands, clock ticks)
//! goes through the same merge and then re-derives the whole feed: filter,
//! classify, rank. The feed is therefore a pure function of the working set
//! and never of the order events arrived in.

use std::sync::{Arc, Weak};

use chrono::{DateTime, Utc};
use futures_util::future::{BoxFuture, FutureExt};
use tokio::sync::{mpsc, watch, Mutex, RwLock};
use tokio::task::JoinHandle;

use crate::{
    client::AnnouncementApi,
    config::EngineConfig,
    domain::{Announcement, Department, EngagementMeta},
    engine::{
        classifier::DepartmentClassifier,
        clock::{Clock, SystemClock},
        command::{Applied, Command},
        engagement::{EngagementKind, RecordEngagement, RecordOutcome},
        pin_cache::PinOverrideCache,
        pin_quota::{PinOutcome, TogglePin},
        ranking::rank,
        visibility::is_visible,
        working_set::WorkingSet,
    },
    error::{AppError, Result},
    sync::{EngagementCounts, InboundEvent, PushChannel, PushMessage},
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncState {
    Disconnected,
    Bootstrapping,
    Synced,
}

/// Which bootstrap path won.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BootstrapSource {
    Push,
    Rest,
}

#[derive(Debug, Clone, PartialEq)]
pub struct FeedEntry {
    pub announcement: Announcement,
    pub department: Department,
    pub counts: EngagementCounts,
}

#[derive(Debug, Clone, PartialEq)]
pub struct DepartmentGroup {
    pub department: Department,
    pub entries: Vec<FeedEntry>,
}

/// Derived, read-only view published after every change.
#[derive(Debug, Clone, PartialEq)]
pub struct FeedSnapshot {
    pub sync_state: SyncState,
    /// Visible announcements in global rank order.
    pub ranked: Vec<FeedEntry>,
    /// `ranked` split by department, in [`Department::ALL`] order. Empty
    /// departments are kept.
    pub groups: Vec<DepartmentGroup>,
    pub derived_at: DateTime<Utc>,
}

impl FeedSnapshot {
    fn empty(now: DateTime<Utc>) -> Self {
        Self {
            sync_state: SyncState::Disconnected,
            ranked: Vec::new(),
            groups: Department::ALL
                .iter()
                .map(|&department| DepartmentGroup {
                    department,
                    entries: Vec::new(),
                })
                .collect(),
            derived_at: now,
        }
    }

    pub fn ids(&self) -> Vec<&str> {
        self.ranked.iter().map(|e| e.announcement.id.as_str()).collect()
    }

    pub fn group(&self, department: Department) -> Option<&DepartmentGroup> {
        self.groups.iter().find(|g| g.department == department)
    }
}

struct StoreState {
    sync: SyncState,
    source: Option<BootstrapSource>,
    /// Events that arrived before the bootstrap finished; replayed on top of it.
    pending: Vec<InboundEvent>,
    /// Whether the push stream from the last `connect` is still delivering.
    push_open: bool,
    working: WorkingSet,
}

pub struct AnnouncementStore {
    api: Arc<dyn AnnouncementApi>,
    channel: Arc<dyn PushChannel>,
    classifier: Arc<DepartmentClassifier>,
    clock: Arc<dyn Clock>,
    config: EngineConfig,
    state: RwLock<StoreState>,
    feed: watch::Sender<FeedSnapshot>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
    reconnect: Mutex<Option<JoinHandle<()>>>,
}

pub struct StoreBuilder {
    api: Arc<dyn AnnouncementApi>,
    channel: Arc<dyn PushChannel>,
    config: EngineConfig,
    classifier: Option<DepartmentClassifier>,
    clock: Option<Arc<dyn Clock>>,
    pins: Option<PinOverrideCache>,
}

impl StoreBuilder {
    pub fn config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    pub fn classifier(mut self, classifier: DepartmentClassifier) -> Self {
        self.classifier = Some(classifier);
        self
    }

    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    pub fn pin_cache(mut self, pins: PinOverrideCache) -> Self {
        self.pins = Some(pins);
        self
    }

    pub fn build(self) -> Arc<AnnouncementStore> {
        let clock = self.clock.unwrap_or_else(|| Arc::new(SystemClock));
        let pins = self.pins.unwrap_or_else(|| match &self.config.pin_cache_dir {
            Some(dir) => PinOverrideCache::open(dir, self.config.role.as_deref()),
            None => PinOverrideCache::in_memory(),
        });
        let (feed, _) = watch::channel(FeedSnapshot::empty(clock.now()));

        Arc::new(AnnouncementStore {
            api: self.api,
            channel: self.channel,
            classifier: Arc::new(self.classifier.unwrap_or_default()),
            clock,
            config: self.config,
            state: RwLock::new(StoreState {
                sync: SyncState::Disconnected,
                source: None,
                pending: Vec::new(),
                push_open: false,
                working: WorkingSet::new(pins),
            }),
            feed,
            tasks: Mutex::new(Vec::new()),
            reconnect: Mutex::new(None),
        })
    }
}

impl AnnouncementStore {
    pub fn builder(api: Arc<dyn AnnouncementApi>, channel: Arc<dyn PushChannel>) -> StoreBuilder {
        StoreBuilder {
            api,
            channel,
            config: EngineConfig::default(),
            classifier: None,
            clock: None,
            pins: None,
        }
    }

    /// Disconnected -> Bootstrapping -> Synced.
    ///
    /// Waits up to the bootstrap timeout for an `initialAgentData` snapshot,
    /// then falls back to a single REST fetch. Whichever completes first is
    /// applied; the other is ignored. A failed REST fallback leaves the store
    /// bootstrapping, so a late snapshot can still complete it.
    ///
    /// If the push stream later ends on its own, the store drops to
    /// `Disconnected` and, when `reconnect_delay_ms` is set, bootstraps again.
    pub async fn connect(self: &Arc<Self>) -> Result<BootstrapSource> {
        self.stop_tasks().await;
        {
            let mut state = self.state.write().await;
            state.sync = SyncState::Bootstrapping;
            state.source = None;
            state.pending.clear();
            state.push_open = false;
            self.publish(&state);
        }
        tracing::info!("Bootstrapping announcement store");

        let mut feed = self.feed.subscribe();
        let push_connected = match self.channel.connect().await {
            Ok(inbox) => {
                self.state.write().await.push_open = true;
                self.spawn_pump(inbox).await;
                true
            }
            Err(e) => {
                tracing::warn!("Push channel unavailable, bootstrapping over REST: {}", e);
                false
            }
        };
        self.spawn_ticker().await;

        let pushed = push_connected
            && tokio::time::timeout(
                self.config.bootstrap_timeout(),
                feed.wait_for(|f| f.sync_state == SyncState::Synced),
            )
            .await
            .map(|waited| waited.is_ok())
            .unwrap_or(false);

        if !pushed {
            if push_connected {
                tracing::info!(
                    "No snapshot within {:?}, falling back to REST",
                    self.config.bootstrap_timeout()
                );
            }
            let announcements = self.api.fetch_all().await?;
            self.finish_bootstrap(BootstrapSource::Rest, announcements).await;
        }

        let source = self
            .state
            .read()
            .await
            .source
            .ok_or_else(|| AppError::Internal("bootstrap did not complete".to_string()))?;
        if push_connected {
            // The stream may have ended while the REST fallback was running.
            self.degrade_if_push_lost().await;
        }
        Ok(source)
    }

    /// Stops the pump and ticker and closes the channel. The working set is
    /// kept, stale until the next `connect`.
    pub async fn disconnect(&self) {
        if let Some(handle) = self.reconnect.lock().await.take() {
            handle.abort();
        }
        self.stop_tasks().await;
        self.channel.disconnect().await;
        let mut state = self.state.write().await;
        state.sync = SyncState::Disconnected;
        state.pending.clear();
        self.publish(&state);
        tracing::info!("Announcement store disconnected");
    }

    pub async fn dispose(&self) {
        self.disconnect().await;
        self.channel.dispose().await;
    }

    /// Applies one inbound event, exactly as if it came off the push channel.
    pub async fn apply_event(&self, event: InboundEvent) {
        let mut state = self.state.write().await;
        match (state.sync, event) {
            (SyncState::Disconnected, event) => {
                tracing::debug!("Ignoring {} while disconnected", event.name());
            }
            (SyncState::Bootstrapping, InboundEvent::Snapshot(announcements)) => {
                self.bootstrap_locked(&mut state, BootstrapSource::Push, announcements);
            }
            (SyncState::Synced, InboundEvent::Snapshot(_)) => {
                tracing::debug!("Ignoring snapshot, store already synced");
            }
            (SyncState::Bootstrapping, event) => {
                tracing::debug!("Deferring {} until bootstrap completes", event.name());
                state.pending.push(event);
            }
            (SyncState::Synced, event) => {
                let now = self.clock.now();
                Self::merge(&mut state.working, event, now);
                self.publish(&state);
            }
        }
    }

    /// Re-runs the visibility filter against the clock. Returns how many
    /// announcements expired out of the working set.
    pub async fn tick(&self) -> usize {
        let mut state = self.state.write().await;
        let now = self.clock.now();
        let removed = state.working.retain_visible(now);
        if removed > 0 {
            tracing::debug!("{} announcement(s) expired", removed);
            self.publish(&state);
        }
        removed
    }

    pub async fn record_view(
        &self,
        announcement_id: &str,
        user_id: &str,
        meta: EngagementMeta,
    ) -> Result<RecordOutcome> {
        let command = RecordEngagement::new(
            EngagementKind::View,
            announcement_id,
            user_id,
            meta,
            self.clock.now(),
        );
        self.execute(command).await
    }

    pub async fn record_acknowledge(
        &self,
        announcement_id: &str,
        user_id: &str,
        meta: EngagementMeta,
    ) -> Result<RecordOutcome> {
        let command = RecordEngagement::new(
            EngagementKind::Acknowledge,
            announcement_id,
            user_id,
            meta,
            self.clock.now(),
        );
        self.execute(command).await
    }

    /// Quota rejections come back as `Ok(PinOutcome::Rejected(..))` with no
    /// state change; only transport failures are errors.
    pub async fn toggle_pin(&self, announcement_id: &str) -> Result<PinOutcome> {
        let command = TogglePin::new(
            announcement_id,
            self.classifier.clone(),
            self.config.max_pinned_per_department,
        );
        self.execute(command).await
    }

    pub fn feed(&self) -> FeedSnapshot {
        self.feed.borrow().clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<FeedSnapshot> {
        self.feed.subscribe()
    }

    pub async fn sync_state(&self) -> SyncState {
        self.state.read().await.sync
    }

    pub async fn get(&self, announcement_id: &str) -> Option<Announcement> {
        self.state.read().await.working.get(announcement_id).cloned()
    }

    pub async fn view_count(&self, announcement_id: &str) -> usize {
        self.state.read().await.working.counts(announcement_id).views
    }

    pub async fn like_count(&self, announcement_id: &str) -> usize {
        self.state.read().await.working.counts(announcement_id).likes
    }

    pub async fn pin_override(&self, announcement_id: &str) -> Option<bool> {
        self.state.read().await.working.pins().get(announcement_id)
    }

    pub fn department_of(&self, announcement: &Announcement) -> Department {
        self.classifier.classify(&announcement.author)
    }

    async fn execute<C: Command>(&self, mut command: C) -> Result<C::Output> {
        {
            let mut state = self.state.write().await;
            if let Applied::Done(output) = command.apply(&mut state.working)? {
                return Ok(output);
            }
            self.publish(&state);
        }

        match command.commit(self.api.as_ref()).await {
            Ok(authoritative) => {
                {
                    let mut state = self.state.write().await;
                    command.committed(&mut state.working);
                    if let Some(announcement) = authoritative {
                        let now = self.clock.now();
                        Self::merge(&mut state.working, InboundEvent::Updated(announcement), now);
                    }
                    self.publish(&state);
                }
                for hint in command.hints() {
                    if let Err(e) = self.channel.emit(hint).await {
                        tracing::warn!("Failed to emit live-update hint: {}", e);
                    }
                }
                Ok(command.settled())
            }
            Err(e) => {
                tracing::error!("Write failed, rolling back: {}", e);
                let mut state = self.state.write().await;
                command.rollback(&mut state.working);
                self.publish(&state);
                Err(e)
            }
        }
    }

    async fn finish_bootstrap(&self, source: BootstrapSource, announcements: Vec<Announcement>) {
        let mut state = self.state.write().await;
        self.bootstrap_locked(&mut state, source, announcements);
    }

    fn bootstrap_locked(
        &self,
        state: &mut StoreState,
        source: BootstrapSource,
        announcements: Vec<Announcement>,
    ) {
        if state.sync != SyncState::Bootstrapping {
            tracing::debug!("Ignoring {:?} bootstrap, state is {:?}", source, state.sync);
            return;
        }
        let now = self.clock.now();
        state.working.replace_all(announcements, now);
        for event in std::mem::take(&mut state.pending) {
            Self::merge(&mut state.working, event, now);
        }
        state.sync = SyncState::Synced;
        state.source = Some(source);
        tracing::info!(
            "Bootstrapped from {:?} with {} visible announcement(s)",
            source,
            state.working.len()
        );
        self.publish(state);
    }

    fn merge(working: &mut WorkingSet, event: InboundEvent, now: DateTime<Utc>) {
        match event {
            InboundEvent::Created(announcement)
            | InboundEvent::Updated(announcement)
            | InboundEvent::Reposted(announcement) => {
                let id = announcement.id.clone();
                if !working.upsert(announcement, now) {
                    tracing::debug!("Announcement {} not visible, dropped", id);
                }
            }
            InboundEvent::Cancelled { id } => {
                working.remove(&id);
            }
            InboundEvent::Counts {
                announcement_id,
                counts,
            } => working.set_remote_counts(&announcement_id, counts),
            InboundEvent::Snapshot(announcements) => working.replace_all(announcements, now),
        }
    }

    fn publish(&self, state: &StoreState) {
        let now = self.clock.now();
        let visible: Vec<Announcement> = state
            .working
            .iter()
            .filter(|a| is_visible(a, now))
            .cloned()
            .collect();

        let ranked: Vec<FeedEntry> = rank(visible)
            .into_iter()
            .map(|announcement| FeedEntry {
                department: self.classifier.classify(&announcement.author),
                counts: state.working.counts(&announcement.id),
                announcement,
            })
            .collect();

        let groups = Department::ALL
            .iter()
            .map(|&department| DepartmentGroup {
                department,
                entries: ranked
                    .iter()
                    .filter(|e| e.department == department)
                    .cloned()
                    .collect(),
            })
            .collect();

        self.feed.send_replace(FeedSnapshot {
            sync_state: state.sync,
            ranked,
            groups,
            derived_at: now,
        });
    }

    async fn spawn_pump(self: &Arc<Self>, mut inbox: mpsc::Receiver<PushMessage>) {
        let store: Weak<Self> = Arc::downgrade(self);
        let handle = tokio::spawn(async move {
            while let Some(message) = inbox.recv().await {
                let Some(store) = store.upgrade() else {
                    break;
                };
                match InboundEvent::decode(&message) {
                    Some(event) => store.apply_event(event).await,
                    None => tracing::debug!("Ignoring push event {}", message.event),
                }
            }
            // Only reached when the stream ends by itself; `stop_tasks` aborts
            // the pump before this point.
            if let Some(store) = store.upgrade() {
                store.state.write().await.push_open = false;
                store.degrade_if_push_lost().await;
            }
            tracing::debug!("Push pump stopped");
        });
        self.tasks.lock().await.push(handle);
    }

    /// A synced store whose push stream is gone is stale: drop it to
    /// `Disconnected` and schedule a fresh bootstrap.
    async fn degrade_if_push_lost(self: &Arc<Self>) {
        {
            let mut state = self.state.write().await;
            if state.push_open || state.sync != SyncState::Synced {
                return;
            }
            state.sync = SyncState::Disconnected;
            state.pending.clear();
            self.publish(&state);
        }
        tracing::warn!("Push stream ended, feed is stale until the next sync");

        let Some(delay) = self.config.reconnect_delay() else {
            return;
        };
        let handle = tokio::spawn(Self::reconnect_loop(Arc::downgrade(self), delay));
        // A superseded loop notices the store is synced again and exits.
        self.reconnect.lock().await.replace(handle);
    }

    // Boxed so the future type does not contain `connect`, which can lead
    // back here.
    fn reconnect_loop(store: Weak<Self>, delay: std::time::Duration) -> BoxFuture<'static, ()> {
        async move {
            loop {
                tokio::time::sleep(delay).await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                if store.sync_state().await == SyncState::Synced {
                    break;
                }
                tracing::info!("Reconnecting announcement store");
                match store.connect().await {
                    Ok(_) => break,
                    Err(e) => tracing::warn!("Reconnect failed: {}", e),
                }
            }
        }
        .boxed()
    }

    async fn spawn_ticker(self: &Arc<Self>) {
        let store: Weak<Self> = Arc::downgrade(self);
        let period = self.config.tick_interval();
        let handle = tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut interval = tokio::time::interval_at(start, period);
            loop {
                interval.tick().await;
                let Some(store) = store.upgrade() else {
                    break;
                };
                store.tick().await;
            }
        });
        self.tasks.lock().await.push(handle);
    }

    async fn stop_tasks(&self) {
        for handle in self.tasks.lock().await.drain(..) {
            handle.abort();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::Priority;
    use crate::engine::clock::ManualClock;
    use crate::engine::pin_quota::PinRejection;
    use crate::engine::testing::{announcement, FakeApi, FakeChannel};
    use crate::sync::HintKind;
    use chrono::Duration;
    use serde_json::json;
    use std::sync::atomic::Ordering;

    fn config(bootstrap_timeout_ms: u64) -> EngineConfig {
        EngineConfig {
            bootstrap_timeout_ms,
            tick_interval_ms: 60_000,
            reconnect_delay_ms: 0,
            ..EngineConfig::default()
        }
    }

    /// Store bootstrapped over REST with the push channel down.
    async fn synced_store(
        records: Vec<Announcement>,
    ) -> (Arc<AnnouncementStore>, Arc<FakeApi>, Arc<FakeChannel>) {
        let api = Arc::new(FakeApi::with(records));
        let channel = Arc::new(FakeChannel::default());
        channel.fail_connect.store(true, Ordering::SeqCst);
        let store = AnnouncementStore::builder(api.clone(), channel.clone())
            .config(config(50))
            .build();
        assert_eq!(store.connect().await.unwrap(), BootstrapSource::Rest);
        (store, api, channel)
    }

    async fn wait_connected(channel: &FakeChannel) {
        for _ in 0..200 {
            if channel.is_connected().await {
                return;
            }
            tokio::time::sleep(std::time::Duration::from_millis(5)).await;
        }
        panic!("channel never connected");
    }

    fn by(id: &str, author: &str, pinned: bool) -> Announcement {
        let mut a = announcement(id);
        a.author = author.to_string();
        a.is_pinned = pinned;
        a
    }

    #[tokio::test]
    async fn test_bootstrap_from_push_snapshot() {
        let api = Arc::new(FakeApi::with(vec![announcement("rest-only")]));
        let channel = Arc::new(FakeChannel::default());
        let store = AnnouncementStore::builder(api.clone(), channel.clone())
            .config(config(5_000))
            .build();

        let connecting = {
            let store = store.clone();
            tokio::spawn(async move { store.connect().await })
        };
        wait_connected(&channel).await;
        let snapshot = InboundEvent::Snapshot(vec![announcement("pushed")]);
        channel.push(snapshot.to_message()).await;

        assert_eq!(connecting.await.unwrap().unwrap(), BootstrapSource::Push);
        assert_eq!(api.fetches.load(Ordering::SeqCst), 0);
        assert_eq!(store.feed().ids(), vec!["pushed"]);
        assert_eq!(store.sync_state().await, SyncState::Synced);
    }

    #[tokio::test]
    async fn test_rest_fallback_wins_and_late_snapshot_is_ignored() {
        let api = Arc::new(FakeApi::with(vec![announcement("from-rest")]));
        let channel = Arc::new(FakeChannel::default());
        let store = AnnouncementStore::builder(api.clone(), channel.clone())
            .config(config(30))
            .build();

        assert_eq!(store.connect().await.unwrap(), BootstrapSource::Rest);
        assert_eq!(api.fetches.load(Ordering::SeqCst), 1);

        store
            .apply_event(InboundEvent::Snapshot(vec![announcement("late")]))
            .await;
        assert_eq!(store.feed().ids(), vec!["from-rest"]);
    }

    #[tokio::test]
    async fn test_events_during_bootstrap_are_replayed() {
        let api = Arc::new(FakeApi::default());
        let channel = Arc::new(FakeChannel::default());
        let store = AnnouncementStore::builder(api, channel.clone())
            .config(config(5_000))
            .build();

        let connecting = {
            let store = store.clone();
            tokio::spawn(async move { store.connect().await })
        };
        wait_connected(&channel).await;
        channel
            .push(InboundEvent::Created(announcement("early")).to_message())
            .await;
        channel
            .push(InboundEvent::Snapshot(vec![announcement("base")]).to_message())
            .await;

        assert_eq!(connecting.await.unwrap().unwrap(), BootstrapSource::Push);
        let mut ids = store.feed().ids().into_iter().map(String::from).collect::<Vec<_>>();
        ids.sort();
        assert_eq!(ids, vec!["base", "early"]);
    }

    #[tokio::test]
    async fn test_push_events_flow_through_pump() {
        let api = Arc::new(FakeApi::with(vec![announcement("a1")]));
        let channel = Arc::new(FakeChannel::default());
        let store = AnnouncementStore::builder(api, channel.clone())
            .config(config(20))
            .build();
        store.connect().await.unwrap();

        let mut feed = store.subscribe();
        channel
            .push(PushMessage::new("announcementCanceled", json!({ "id": "a1" })))
            .await;
        let snapshot = feed.wait_for(|f| f.ranked.is_empty()).await.unwrap().clone();
        assert_eq!(snapshot.sync_state, SyncState::Synced);
    }

    #[tokio::test]
    async fn test_record_view_is_idempotent() {
        let (store, api, _) = synced_store(vec![announcement("a1")]).await;
        let meta = EngagementMeta {
            display_name: Some("Ana".to_string()),
            ..Default::default()
        };

        let first = store.record_view("a1", "u1", meta.clone()).await.unwrap();
        assert!(!first.already_recorded);
        for user in ["u2", "u1", "u3", "u1"] {
            store.record_view("a1", user, meta.clone()).await.unwrap();
        }
        let again = store.record_view("a1", "u1", meta).await.unwrap();
        assert!(again.already_recorded);

        let local = store.get("a1").await.unwrap();
        assert_eq!(local.views.iter().filter(|v| v.user_id == "u1").count(), 1);
        assert_eq!(store.view_count("a1").await, 3);
        assert_eq!(api.writes.load(Ordering::SeqCst), 3);
        assert_eq!(api.record("a1").unwrap().views.len(), 3);
    }

    #[tokio::test]
    async fn test_concurrent_duplicate_views_send_once() {
        let (store, api, _) = synced_store(vec![announcement("a1")]).await;
        let (a, b) = tokio::join!(
            store.record_view("a1", "u1", EngagementMeta::default()),
            store.record_view("a1", "u1", EngagementMeta::default()),
        );
        let outcomes = [a.unwrap().already_recorded, b.unwrap().already_recorded];
        assert_eq!(outcomes.iter().filter(|&&recorded| recorded).count(), 1);
        assert_eq!(api.writes.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_failed_write_rolls_back_and_tracker_stays_usable() {
        let (store, api, channel) = synced_store(vec![announcement("a1")]).await;
        api.fail_writes.store(true, Ordering::SeqCst);

        let err = store
            .record_acknowledge("a1", "u1", EngagementMeta::default())
            .await
            .unwrap_err();
        assert!(err.is_transport());
        assert_eq!(store.like_count("a1").await, 0);
        assert!(channel.emitted.lock().await.is_empty());

        api.fail_writes.store(false, Ordering::SeqCst);
        let retried = store
            .record_acknowledge("a1", "u1", EngagementMeta::default())
            .await
            .unwrap();
        assert!(!retried.already_recorded);
        assert_eq!(store.like_count("a1").await, 1);

        let hints: Vec<HintKind> = channel.emitted.lock().await.iter().map(|h| h.kind).collect();
        assert_eq!(hints, vec![HintKind::LikeAnnouncement, HintKind::ToggleLike]);
    }

    #[tokio::test]
    async fn test_unknown_announcement_is_silent_noop() {
        let (store, api, _) = synced_store(vec![announcement("a1")]).await;
        let outcome = store
            .record_view("missing", "u1", EngagementMeta::default())
            .await
            .unwrap();
        assert!(!outcome.already_recorded);
        assert_eq!(api.writes.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_pin_quota_rejects_fourth_in_department() {
        let (store, api, _) = synced_store(vec![
            by("p1", "Anjanneth Bilas", true),
            by("p2", "Payroll Team", true),
            by("p3", "Finance Desk", true),
            by("p4", "Accounting Office", false),
        ])
        .await;

        let outcome = store.toggle_pin("p4").await.unwrap();
        assert_eq!(
            outcome,
            PinOutcome::Rejected(PinRejection::QuotaExceeded {
                department: Department::Accounting,
                limit: 3,
            })
        );
        assert!(!store.get("p4").await.unwrap().is_pinned);
        assert_eq!(store.pin_override("p4").await, None);
        assert_eq!(api.writes.load(Ordering::SeqCst), 0);

        assert_eq!(
            store.toggle_pin("p1").await.unwrap(),
            PinOutcome::Accepted { pinned: false }
        );
        assert_eq!(
            store.toggle_pin("p4").await.unwrap(),
            PinOutcome::Accepted { pinned: true }
        );
    }

    #[tokio::test]
    async fn test_pin_reranks_and_falls_back_to_put() {
        let mut older = announcement("older");
        older.priority = Priority::Low;
        older.published_at = Some(Utc::now() - Duration::days(3));
        let (store, api, _) = synced_store(vec![older, announcement("newer")]).await;
        api.patch_unsupported.store(true, Ordering::SeqCst);
        assert_eq!(store.feed().ids(), vec!["newer", "older"]);

        let outcome = store.toggle_pin("older").await.unwrap();
        assert_eq!(outcome, PinOutcome::Accepted { pinned: true });
        assert_eq!(store.feed().ids(), vec!["older", "newer"]);
        assert!(api.record("older").unwrap().is_pinned);
        assert_eq!(store.pin_override("older").await, None);
    }

    #[tokio::test]
    async fn test_failed_pin_restores_cache_and_flag() {
        let (store, api, _) = synced_store(vec![announcement("a1")]).await;
        api.fail_writes.store(true, Ordering::SeqCst);

        assert!(store.toggle_pin("a1").await.is_err());
        assert!(!store.get("a1").await.unwrap().is_pinned);
        assert_eq!(store.pin_override("a1").await, None);
        assert!(!store.feed().ranked[0].announcement.is_pinned);
    }

    #[tokio::test]
    async fn test_expiry_is_driven_by_clock_tick() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let mut expiring = announcement("expiring");
        expiring.expires_at = Some(start + Duration::seconds(1));

        let api = Arc::new(FakeApi::with(vec![expiring, announcement("stays")]));
        let channel = Arc::new(FakeChannel::default());
        channel.fail_connect.store(true, Ordering::SeqCst);
        let store = AnnouncementStore::builder(api.clone(), channel)
            .config(config(10))
            .clock(clock.clone())
            .build();
        store.connect().await.unwrap();
        assert_eq!(store.feed().ranked.len(), 2);

        clock.advance(Duration::seconds(1));
        assert_eq!(store.tick().await, 1);
        assert_eq!(store.feed().ids(), vec!["stays"]);
        assert_eq!(api.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_ticker_expires_without_manual_tick() {
        let start = Utc::now();
        let clock = Arc::new(ManualClock::new(start));
        let mut expiring = announcement("expiring");
        expiring.expires_at = Some(start + Duration::seconds(1));

        let api = Arc::new(FakeApi::with(vec![expiring, announcement("stays")]));
        let channel = Arc::new(FakeChannel::default());
        channel.fail_connect.store(true, Ordering::SeqCst);
        let mut engine_config = config(10);
        engine_config.tick_interval_ms = 100;
        let store = AnnouncementStore::builder(api.clone(), channel)
            .config(engine_config)
            .clock(clock.clone())
            .build();
        store.connect().await.unwrap();
        let mut feed = store.subscribe();

        tokio::time::advance(std::time::Duration::from_millis(250)).await;
        tokio::task::yield_now().await;
        assert_eq!(store.feed().ranked.len(), 2);

        clock.advance(Duration::seconds(1));
        tokio::time::advance(std::time::Duration::from_millis(100)).await;
        let snapshot = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            feed.wait_for(|f| f.ranked.len() == 1),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(snapshot.ids(), vec!["stays"]);
        assert_eq!(api.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_push_stream_end_degrades_to_disconnected() {
        let api = Arc::new(FakeApi::with(vec![announcement("a1")]));
        let channel = Arc::new(FakeChannel::default());
        let store = AnnouncementStore::builder(api, channel.clone())
            .config(config(20))
            .build();
        store.connect().await.unwrap();
        assert_eq!(store.sync_state().await, SyncState::Synced);

        let mut feed = store.subscribe();
        channel.close().await;
        let snapshot = tokio::time::timeout(
            std::time::Duration::from_secs(5),
            feed.wait_for(|f| f.sync_state == SyncState::Disconnected),
        )
        .await
        .unwrap()
        .unwrap()
        .clone();
        assert_eq!(snapshot.ids(), vec!["a1"]);
        assert_eq!(store.sync_state().await, SyncState::Disconnected);

        store
            .apply_event(InboundEvent::Cancelled { id: "a1".to_string() })
            .await;
        assert_eq!(store.feed().ids(), vec!["a1"]);
    }

    #[tokio::test]
    async fn test_push_lost_during_rest_fallback_is_not_synced() {
        let api = Arc::new(FakeApi::with(vec![announcement("a1")]));
        let channel = Arc::new(FakeChannel::default());
        let store = AnnouncementStore::builder(api, channel.clone())
            .config(config(200))
            .build();

        let connecting = {
            let store = store.clone();
            tokio::spawn(async move { store.connect().await })
        };
        wait_connected(&channel).await;
        channel.close().await;

        assert_eq!(connecting.await.unwrap().unwrap(), BootstrapSource::Rest);
        assert_eq!(store.sync_state().await, SyncState::Disconnected);
        assert_eq!(store.feed().ids(), vec!["a1"]);
    }

    #[tokio::test]
    async fn test_reconnects_after_push_stream_ends() {
        let api = Arc::new(FakeApi::with(vec![announcement("a1")]));
        let channel = Arc::new(FakeChannel::default());
        let mut engine_config = config(20);
        engine_config.reconnect_delay_ms = 10;
        let store = AnnouncementStore::builder(api.clone(), channel.clone())
            .config(engine_config)
            .build();
        store.connect().await.unwrap();

        let mut feed = store.subscribe();
        api.records.lock().unwrap().push(announcement("a2"));
        channel.close().await;
        tokio::time::timeout(
            std::time::Duration::from_secs(5),
            feed.wait_for(|f| f.sync_state == SyncState::Synced && f.ranked.len() == 2),
        )
        .await
        .unwrap()
        .unwrap();

        assert_eq!(channel.connects.load(Ordering::SeqCst), 2);
        assert_eq!(api.fetches.load(Ordering::SeqCst), 2);
        assert!(channel.is_connected().await);
        store.dispose().await;
    }

    #[tokio::test]
    async fn test_stale_update_keeps_single_entry() {
        let (store, _, _) = synced_store(vec![]).await;
        let mut fresh = announcement("x");
        fresh.title = "fresh".to_string();
        let mut stale = announcement("x");
        stale.title = "stale".to_string();

        store.apply_event(InboundEvent::Updated(fresh)).await;
        store.apply_event(InboundEvent::Updated(stale)).await;
        assert_eq!(store.feed().ids(), vec!["x"]);
    }

    #[tokio::test]
    async fn test_order_independent_of_event_arrival() {
        let mut high = announcement("high");
        high.priority = Priority::High;
        let low = {
            let mut a = announcement("low");
            a.priority = Priority::Low;
            a
        };

        let (first, _, _) = synced_store(vec![]).await;
        first.apply_event(InboundEvent::Created(high.clone())).await;
        first.apply_event(InboundEvent::Reposted(low.clone())).await;

        let (second, _, _) = synced_store(vec![]).await;
        second.apply_event(InboundEvent::Reposted(low)).await;
        second.apply_event(InboundEvent::Created(high)).await;

        assert_eq!(first.feed().ids(), second.feed().ids());
        assert_eq!(first.feed().ids(), vec!["high", "low"]);
    }

    #[tokio::test]
    async fn test_counts_event_and_groups() {
        let (store, _, _) = synced_store(vec![
            by("acc", "Anjanneth Bilas", false),
            by("hr", "Random Name", false),
        ])
        .await;
        store
            .apply_event(InboundEvent::Counts {
                announcement_id: "acc".to_string(),
                counts: EngagementCounts { views: 7, likes: 2 },
            })
            .await;

        let feed = store.feed();
        let accounting = feed.group(Department::Accounting).unwrap();
        assert_eq!(accounting.entries.len(), 1);
        assert_eq!(accounting.entries[0].counts, EngagementCounts { views: 7, likes: 2 });
        assert_eq!(feed.group(Department::HrAdmin).unwrap().entries[0].announcement.id, "hr");
        assert!(feed.group(Department::Technical).unwrap().entries.is_empty());
        assert_eq!(store.view_count("acc").await, 7);
    }

    #[tokio::test]
    async fn test_invisible_update_removes_and_disconnected_ignores() {
        let (store, _, _) = synced_store(vec![announcement("a1"), announcement("a2")]).await;
        let mut pending = announcement("a1");
        pending.approval_status = crate::domain::ApprovalStatus::Pending;
        store.apply_event(InboundEvent::Updated(pending)).await;
        assert_eq!(store.feed().ids(), vec!["a2"]);

        store.disconnect().await;
        store
            .apply_event(InboundEvent::Cancelled { id: "a2".to_string() })
            .await;
        assert_eq!(store.feed().ids(), vec!["a2"]);
        assert_eq!(store.feed().sync_state, SyncState::Disconnected);
    }

    #[tokio::test]
    async fn test_pin_override_survives_restart() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine_config = config(10);
        engine_config.pin_cache_dir = Some(dir.path().display().to_string());
        engine_config.role = Some("agent".to_string());
        {
            let mut cache = PinOverrideCache::open(dir.path(), Some("agent"));
            cache.set("a1", true);
        }

        let api = Arc::new(FakeApi::with(vec![announcement("a1")]));
        let channel = Arc::new(FakeChannel::default());
        channel.fail_connect.store(true, Ordering::SeqCst);
        let store = AnnouncementStore::builder(api, channel)
            .config(engine_config)
            .build();
        store.connect().await.unwrap();

        assert!(store.get("a1").await.unwrap().is_pinned);
        assert_eq!(store.pin_override("a1").await, Some(true));
    }

    #[tokio::test]
    async fn test_restored_pins_yield_to_server_copy() {
        let dir = tempfile::tempdir().unwrap();
        let mut engine_config = config(10);
        engine_config.pin_cache_dir = Some(dir.path().display().to_string());
        {
            let mut cache = PinOverrideCache::open(dir.path(), None);
            for id in ["s1", "s2", "s3", "gone"] {
                cache.set(id, true);
            }
        }

        let api = Arc::new(FakeApi::with(vec![
            by("s1", "Payroll Team", false),
            by("s2", "Payroll Team", false),
            by("s3", "Payroll Team", false),
            by("n", "Payroll Team", false),
        ]));
        let channel = Arc::new(FakeChannel::default());
        channel.fail_connect.store(true, Ordering::SeqCst);
        let store = AnnouncementStore::builder(api, channel)
            .config(engine_config)
            .build();
        store.connect().await.unwrap();

        assert!(store.get("s1").await.unwrap().is_pinned);
        assert!(store.get("s3").await.unwrap().is_pinned);
        assert_eq!(store.pin_override("gone").await, None);

        store
            .apply_event(InboundEvent::Updated(by("s1", "Payroll Team", false)))
            .await;
        assert!(!store.get("s1").await.unwrap().is_pinned);
        assert_eq!(store.pin_override("s1").await, None);

        assert_eq!(
            store.toggle_pin("n").await.unwrap(),
            PinOutcome::Accepted { pinned: true }
        );
        let reopened = PinOverrideCache::open(dir.path(), None);
        assert_eq!(reopened.get("s1"), None);
        assert_eq!(reopened.get("gone"), None);
        assert_eq!(reopened.get("s2"), Some(true));
    }

    #[tokio::test]
    async fn test_dispose_closes_channel() {
        let (store, _, channel) = synced_store(vec![]).await;
        store.dispose().await;
        assert!(channel.disposed.load(Ordering::SeqCst));
        assert_eq!(store.sync_state().await, SyncState::Disconnected);
    }
}
