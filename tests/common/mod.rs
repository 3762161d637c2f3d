#![allow(dead_code)]

use std::sync::Arc;
use std::time::Duration;

use noticeboard::{
    api,
    config::Settings,
    domain::{AnnouncementStatus, ApprovalStatus, CreateAnnouncementRequest, Priority},
    engine::{AnnouncementStore, FeedSnapshot},
    service::ServiceContext,
    sync::PushHub,
};
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};

/// One connection so every query sees the same in-memory database.
pub async fn memory_pool() -> anyhow::Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    sqlx::migrate!("./migrations").run(&pool).await?;
    Ok(pool)
}

pub struct TestServer {
    pub base_url: String,
    pub context: Arc<ServiceContext>,
}

pub async fn spawn_server() -> anyhow::Result<TestServer> {
    let pool = memory_pool().await?;
    let context = Arc::new(ServiceContext::from_pool(pool, Arc::new(PushHub::default())));
    let app = api::create_app(context.clone(), Arc::new(Settings::default()));

    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await?;
    let addr = listener.local_addr()?;
    tokio::spawn(async move {
        let _ = axum::serve(listener, app).await;
    });

    Ok(TestServer {
        base_url: format!("http://{}", addr),
        context,
    })
}

pub fn visible(title: &str, author: &str) -> CreateAnnouncementRequest {
    CreateAnnouncementRequest {
        title: title.to_string(),
        agenda: String::new(),
        author: author.to_string(),
        priority: Priority::Medium,
        status: Some(AnnouncementStatus::Active),
        approval_status: Some(ApprovalStatus::Approved),
        expires_at: None,
        attachment: None,
    }
}

pub async fn wait_for_feed<F>(store: &AnnouncementStore, predicate: F) -> anyhow::Result<FeedSnapshot>
where
    F: Fn(&FeedSnapshot) -> bool,
{
    let mut feed = store.subscribe();
    let snapshot = tokio::time::timeout(Duration::from_secs(5), feed.wait_for(|s| predicate(s)))
        .await??
        .clone();
    Ok(snapshot)
}
