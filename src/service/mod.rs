pub mod announcement_service;

use std::sync::Arc;
use sqlx::SqlitePool;
use crate::repository::*;
use crate::sync::PushHub;
use announcement_service::AnnouncementService;

pub struct ServiceContext {
    pub announcement_repo: Arc<dyn AnnouncementRepository>,
    pub announcement_service: Arc<AnnouncementService>,
    pub hub: Arc<PushHub>,
    pub db_pool: SqlitePool,
}

impl ServiceContext {
    pub fn new(
        announcement_repo: Arc<dyn AnnouncementRepository>,
        hub: Arc<PushHub>,
        db_pool: SqlitePool,
    ) -> Self {
        let announcement_service = Arc::new(AnnouncementService::new(
            announcement_repo.clone(),
            hub.clone(),
        ));

        Self {
            announcement_repo,
            announcement_service,
            hub,
            db_pool,
        }
    }

    pub fn from_pool(db_pool: SqlitePool, hub: Arc<PushHub>) -> Self {
        let announcement_repo = Arc::new(SqliteAnnouncementRepository::new(db_pool.clone()));
        Self::new(announcement_repo, hub, db_pool)
    }
}
