//! Fakes shared by the engine's unit tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Mutex as StdMutex;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::{mpsc, Mutex};

use crate::{
    client::AnnouncementApi,
    domain::{
        AcknowledgementRecord, Announcement, AnnouncementStatus, ApprovalStatus, Priority,
        RecordAcknowledgeRequest, RecordViewRequest, UpdateAnnouncementRequest, ViewRecord,
    },
    error::{AppError, Result},
    sync::{OutboundHint, PushChannel, PushMessage},
};

/// A visible, unpinned, Medium announcement by an unclassified author.
pub fn announcement(id: &str) -> Announcement {
    Announcement {
        id: id.to_string(),
        title: format!("Announcement {}", id),
        agenda: String::new(),
        author: "Random Name".to_string(),
        priority: Priority::Medium,
        status: AnnouncementStatus::Active,
        approval_status: ApprovalStatus::Approved,
        published_at: Some(Utc::now()),
        expires_at: None,
        attachment: None,
        is_pinned: false,
        views: Vec::new(),
        acknowledgements: Vec::new(),
    }
}

/// In-memory record server. Dedups engagement by user id like the real one.
#[derive(Default)]
pub struct FakeApi {
    pub records: StdMutex<Vec<Announcement>>,
    pub fail_writes: AtomicBool,
    pub fail_fetch: AtomicBool,
    pub patch_unsupported: AtomicBool,
    pub writes: AtomicUsize,
    pub fetches: AtomicUsize,
}

impl FakeApi {
    pub fn with(records: Vec<Announcement>) -> Self {
        Self {
            records: StdMutex::new(records),
            ..Default::default()
        }
    }

    pub fn record(&self, id: &str) -> Option<Announcement> {
        self.records.lock().unwrap().iter().find(|a| a.id == id).cloned()
    }

    fn write<F>(&self, id: &str, mutate: F) -> Result<Option<Announcement>>
    where
        F: FnOnce(&mut Announcement),
    {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(AppError::Transport("connection reset".to_string()));
        }
        let mut records = self.records.lock().unwrap();
        let record = records
            .iter_mut()
            .find(|a| a.id == id)
            .ok_or_else(|| AppError::NotFound(id.to_string()))?;
        mutate(record);
        Ok(Some(record.clone()))
    }
}

#[async_trait]
impl AnnouncementApi for FakeApi {
    async fn fetch_all(&self) -> Result<Vec<Announcement>> {
        self.fetches.fetch_add(1, Ordering::SeqCst);
        if self.fail_fetch.load(Ordering::SeqCst) {
            return Err(AppError::Transport("fetch failed".to_string()));
        }
        Ok(self.records.lock().unwrap().clone())
    }

    async fn record_view(&self, id: &str, request: &RecordViewRequest) -> Result<Option<Announcement>> {
        self.write(id, |a| {
            if !a.views.iter().any(|v| v.user_id == request.user_id) {
                a.views.push(ViewRecord {
                    user_id: request.user_id.clone(),
                    display_name: request.user_name.clone(),
                    email: request.user_email.clone(),
                    employee_id: request.employee_id.clone(),
                    viewed_at: request.viewed_at.unwrap_or_else(Utc::now),
                });
            }
        })
    }

    async fn record_acknowledge(
        &self,
        id: &str,
        request: &RecordAcknowledgeRequest,
    ) -> Result<Option<Announcement>> {
        self.write(id, |a| {
            if !a.acknowledgements.iter().any(|v| v.user_id == request.user_id) {
                a.acknowledgements.push(AcknowledgementRecord {
                    user_id: request.user_id.clone(),
                    display_name: request.user_name.clone(),
                    email: request.user_email.clone(),
                    employee_id: request.employee_id.clone(),
                    acknowledged_at: request.acknowledged_at.unwrap_or_else(Utc::now),
                });
            }
        })
    }

    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<Option<Announcement>> {
        if self.patch_unsupported.load(Ordering::SeqCst) {
            return Err(AppError::Unsupported("PATCH".to_string()));
        }
        self.write(id, |a| a.is_pinned = pinned)
    }

    async fn replace(&self, id: &str, request: &UpdateAnnouncementRequest) -> Result<Option<Announcement>> {
        self.write(id, |a| {
            a.title = request.title.clone();
            a.is_pinned = request.is_pinned;
        })
    }
}

/// Push channel driven by the test through [`FakeChannel::push`].
#[derive(Default)]
pub struct FakeChannel {
    sender: Mutex<Option<mpsc::Sender<PushMessage>>>,
    pub emitted: Mutex<Vec<OutboundHint>>,
    pub connects: AtomicUsize,
    pub fail_connect: AtomicBool,
    pub disposed: AtomicBool,
}

impl FakeChannel {
    pub async fn push(&self, message: PushMessage) {
        let sender = self.sender.lock().await.clone();
        if let Some(sender) = sender {
            let _ = sender.send(message).await;
        }
    }

    /// Ends the current stream as if the server went away.
    pub async fn close(&self) {
        self.sender.lock().await.take();
    }

    pub async fn is_connected(&self) -> bool {
        self.sender.lock().await.is_some()
    }
}

#[async_trait]
impl PushChannel for FakeChannel {
    async fn connect(&self) -> Result<mpsc::Receiver<PushMessage>> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.fail_connect.load(Ordering::SeqCst) || self.disposed.load(Ordering::SeqCst) {
            return Err(AppError::Transport("push unavailable".to_string()));
        }
        let (tx, rx) = mpsc::channel(64);
        *self.sender.lock().await = Some(tx);
        Ok(rx)
    }

    async fn disconnect(&self) {
        self.sender.lock().await.take();
    }

    async fn dispose(&self) {
        self.disposed.store(true, Ordering::SeqCst);
        self.disconnect().await;
    }

    async fn emit(&self, hint: OutboundHint) -> Result<()> {
        self.emitted.lock().await.push(hint);
        Ok(())
    }
}
