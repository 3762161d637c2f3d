use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, NaiveDateTime, Utc};
use sqlx::{FromRow, SqlitePool};
use uuid::Uuid;

use crate::{
    domain::{
        AcknowledgementRecord, Announcement, AnnouncementStatus, ApprovalStatus, Attachment,
        CreateAnnouncementRequest, Priority, RecordAcknowledgeRequest, RecordViewRequest,
        UpdateAnnouncementRequest, ViewRecord,
    },
    error::{AppError, Result},
    repository::AnnouncementRepository,
};

#[derive(FromRow)]
struct AnnouncementRow {
    id: String,
    title: String,
    agenda: String,
    author: String,
    priority: String,
    status: String,
    approval_status: String,
    published_at: Option<NaiveDateTime>,
    expires_at: Option<NaiveDateTime>,
    attachment_type: Option<String>,
    attachment_name: Option<String>,
    attachment_url: Option<String>,
    is_pinned: i32,
}

#[derive(FromRow)]
struct ViewRow {
    announcement_id: String,
    user_id: String,
    user_name: Option<String>,
    user_email: Option<String>,
    employee_id: Option<String>,
    viewed_at: NaiveDateTime,
}

#[derive(FromRow)]
struct AcknowledgementRow {
    announcement_id: String,
    user_id: String,
    user_name: Option<String>,
    user_email: Option<String>,
    employee_id: Option<String>,
    acknowledged_at: NaiveDateTime,
}

const ANNOUNCEMENT_COLUMNS: &str = r#"
    id, title, agenda, author, priority, status, approval_status,
    published_at, expires_at, attachment_type, attachment_name, attachment_url, is_pinned
"#;

pub struct SqliteAnnouncementRepository {
    pool: SqlitePool,
}

impl SqliteAnnouncementRepository {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    fn utc(dt: NaiveDateTime) -> DateTime<Utc> {
        DateTime::from_naive_utc_and_offset(dt, Utc)
    }

    fn row_to_announcement(
        row: AnnouncementRow,
        views: Vec<ViewRecord>,
        acknowledgements: Vec<AcknowledgementRecord>,
    ) -> Announcement {
        let attachment = match (row.attachment_type, row.attachment_name, row.attachment_url) {
            (Some(kind), Some(name), Some(url)) => Some(Attachment { kind, name, url }),
            _ => None,
        };

        Announcement {
            id: row.id,
            title: row.title,
            agenda: row.agenda,
            author: row.author,
            priority: Priority::from_str(&row.priority),
            status: AnnouncementStatus::from_str(&row.status),
            approval_status: ApprovalStatus::from_str(&row.approval_status),
            published_at: row.published_at.map(Self::utc),
            expires_at: row.expires_at.map(Self::utc),
            attachment,
            is_pinned: row.is_pinned != 0,
            views,
            acknowledgements,
        }
    }

    fn view_from_row(row: ViewRow) -> ViewRecord {
        ViewRecord {
            user_id: row.user_id,
            display_name: row.user_name,
            email: row.user_email,
            employee_id: row.employee_id,
            viewed_at: Self::utc(row.viewed_at),
        }
    }

    fn acknowledgement_from_row(row: AcknowledgementRow) -> AcknowledgementRecord {
        AcknowledgementRecord {
            user_id: row.user_id,
            display_name: row.user_name,
            email: row.user_email,
            employee_id: row.employee_id,
            acknowledged_at: Self::utc(row.acknowledged_at),
        }
    }

    async fn views_for(&self, id: Option<&str>) -> Result<HashMap<String, Vec<ViewRecord>>> {
        let rows = match id {
            Some(id) => {
                sqlx::query_as::<_, ViewRow>(
                    r#"
                    SELECT announcement_id, user_id, user_name, user_email, employee_id, viewed_at
                    FROM announcement_views
                    WHERE announcement_id = ?
                    ORDER BY id
                    "#,
                )
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, ViewRow>(
                    r#"
                    SELECT announcement_id, user_id, user_name, user_email, employee_id, viewed_at
                    FROM announcement_views
                    ORDER BY id
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut grouped: HashMap<String, Vec<ViewRecord>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.announcement_id.clone())
                .or_default()
                .push(Self::view_from_row(row));
        }
        Ok(grouped)
    }

    async fn acknowledgements_for(
        &self,
        id: Option<&str>,
    ) -> Result<HashMap<String, Vec<AcknowledgementRecord>>> {
        let rows = match id {
            Some(id) => {
                sqlx::query_as::<_, AcknowledgementRow>(
                    r#"
                    SELECT announcement_id, user_id, user_name, user_email, employee_id, acknowledged_at
                    FROM announcement_acknowledgements
                    WHERE announcement_id = ?
                    ORDER BY id
                    "#,
                )
                .bind(id)
                .fetch_all(&self.pool)
                .await?
            }
            None => {
                sqlx::query_as::<_, AcknowledgementRow>(
                    r#"
                    SELECT announcement_id, user_id, user_name, user_email, employee_id, acknowledged_at
                    FROM announcement_acknowledgements
                    ORDER BY id
                    "#,
                )
                .fetch_all(&self.pool)
                .await?
            }
        };

        let mut grouped: HashMap<String, Vec<AcknowledgementRecord>> = HashMap::new();
        for row in rows {
            grouped
                .entry(row.announcement_id.clone())
                .or_default()
                .push(Self::acknowledgement_from_row(row));
        }
        Ok(grouped)
    }

    async fn ensure_exists(&self, id: &str) -> Result<()> {
        let exists: Option<(String,)> = sqlx::query_as("SELECT id FROM announcements WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;
        exists
            .map(|_| ())
            .ok_or_else(|| AppError::NotFound(format!("Announcement {} not found", id)))
    }

    async fn reload(&self, id: &str) -> Result<Announcement> {
        self.find_by_id(id)
            .await?
            .ok_or_else(|| AppError::NotFound(format!("Announcement {} not found", id)))
    }
}

#[async_trait]
impl AnnouncementRepository for SqliteAnnouncementRepository {
    async fn create(&self, request: CreateAnnouncementRequest) -> Result<Announcement> {
        let id = Uuid::new_v4().to_string();
        let now = Utc::now().naive_utc();
        let (attachment_type, attachment_name, attachment_url) = match request.attachment {
            Some(a) => (Some(a.kind), Some(a.name), Some(a.url)),
            None => (None, None, None),
        };

        sqlx::query(
            r#"
            INSERT INTO announcements (
                id, title, agenda, author, priority, status, approval_status,
                published_at, expires_at, attachment_type, attachment_name, attachment_url,
                is_pinned, created_at, updated_at
            ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?)
            "#,
        )
        .bind(&id)
        .bind(&request.title)
        .bind(&request.agenda)
        .bind(&request.author)
        .bind(request.priority.as_str())
        .bind(request.status.unwrap_or(AnnouncementStatus::Active).as_str())
        .bind(request.approval_status.unwrap_or_default().as_str())
        .bind(now)
        .bind(request.expires_at.map(|dt| dt.naive_utc()))
        .bind(attachment_type)
        .bind(attachment_name)
        .bind(attachment_url)
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;

        self.find_by_id(&id).await?.ok_or_else(|| {
            AppError::Database("Failed to retrieve created announcement".to_string())
        })
    }

    async fn find_by_id(&self, id: &str) -> Result<Option<Announcement>> {
        let query = format!("SELECT {} FROM announcements WHERE id = ?", ANNOUNCEMENT_COLUMNS);
        let row = sqlx::query_as::<_, AnnouncementRow>(&query)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        let Some(row) = row else {
            return Ok(None);
        };
        let views = self.views_for(Some(id)).await?.remove(id).unwrap_or_default();
        let acknowledgements = self
            .acknowledgements_for(Some(id))
            .await?
            .remove(id)
            .unwrap_or_default();
        Ok(Some(Self::row_to_announcement(row, views, acknowledgements)))
    }

    async fn list(&self) -> Result<Vec<Announcement>> {
        let query = format!(
            "SELECT {} FROM announcements ORDER BY published_at DESC, id",
            ANNOUNCEMENT_COLUMNS
        );
        let rows = sqlx::query_as::<_, AnnouncementRow>(&query)
            .fetch_all(&self.pool)
            .await?;

        let mut views = self.views_for(None).await?;
        let mut acknowledgements = self.acknowledgements_for(None).await?;
        Ok(rows
            .into_iter()
            .map(|row| {
                let v = views.remove(&row.id).unwrap_or_default();
                let a = acknowledgements.remove(&row.id).unwrap_or_default();
                Self::row_to_announcement(row, v, a)
            })
            .collect())
    }

    async fn record_view(&self, id: &str, request: &RecordViewRequest) -> Result<bool> {
        self.ensure_exists(id).await?;
        let viewed_at = request.viewed_at.unwrap_or_else(Utc::now).naive_utc();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO announcement_views (
                announcement_id, user_id, user_name, user_email, employee_id, viewed_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&request.user_id)
        .bind(&request.user_name)
        .bind(&request.user_email)
        .bind(&request.employee_id)
        .bind(viewed_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn record_acknowledge(&self, id: &str, request: &RecordAcknowledgeRequest) -> Result<bool> {
        self.ensure_exists(id).await?;
        let acknowledged_at = request.acknowledged_at.unwrap_or_else(Utc::now).naive_utc();

        let result = sqlx::query(
            r#"
            INSERT OR IGNORE INTO announcement_acknowledgements (
                announcement_id, user_id, user_name, user_email, employee_id, acknowledged_at
            ) VALUES (?, ?, ?, ?, ?, ?)
            "#,
        )
        .bind(id)
        .bind(&request.user_id)
        .bind(&request.user_name)
        .bind(&request.user_email)
        .bind(&request.employee_id)
        .bind(acknowledged_at)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<Announcement> {
        let is_pinned_int = if pinned { 1i32 } else { 0i32 };
        let now = Utc::now().naive_utc();

        let result = sqlx::query("UPDATE announcements SET is_pinned = ?, updated_at = ? WHERE id = ?")
            .bind(is_pinned_int)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Announcement {} not found", id)));
        }

        self.reload(id).await
    }

    async fn replace(&self, id: &str, update: UpdateAnnouncementRequest) -> Result<Announcement> {
        let is_pinned_int = if update.is_pinned { 1i32 } else { 0i32 };
        let (attachment_type, attachment_name, attachment_url) = match update.attachment {
            Some(a) => (Some(a.kind), Some(a.name), Some(a.url)),
            None => (None, None, None),
        };
        let now = Utc::now().naive_utc();

        let result = sqlx::query(
            r#"
            UPDATE announcements
            SET title = ?, agenda = ?, author = ?, priority = ?, status = ?,
                approval_status = ?, expires_at = ?, attachment_type = ?,
                attachment_name = ?, attachment_url = ?, is_pinned = ?, updated_at = ?
            WHERE id = ?
            "#,
        )
        .bind(&update.title)
        .bind(&update.agenda)
        .bind(&update.author)
        .bind(update.priority.as_str())
        .bind(update.status.as_str())
        .bind(update.approval_status.as_str())
        .bind(update.expires_at.map(|dt| dt.naive_utc()))
        .bind(attachment_type)
        .bind(attachment_name)
        .bind(attachment_url)
        .bind(is_pinned_int)
        .bind(now)
        .bind(id)
        .execute(&self.pool)
        .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Announcement {} not found", id)));
        }

        self.reload(id).await
    }

    async fn repost(&self, id: &str) -> Result<Announcement> {
        let now = Utc::now().naive_utc();
        let result = sqlx::query("UPDATE announcements SET published_at = ?, updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(now)
            .bind(id)
            .execute(&self.pool)
            .await?;
        if result.rows_affected() == 0 {
            return Err(AppError::NotFound(format!("Announcement {} not found", id)));
        }

        self.reload(id).await
    }

    async fn delete(&self, id: &str) -> Result<bool> {
        let mut tx = self.pool.begin().await?;
        sqlx::query("DELETE FROM announcement_views WHERE announcement_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        sqlx::query("DELETE FROM announcement_acknowledgements WHERE announcement_id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        let result = sqlx::query("DELETE FROM announcements WHERE id = ?")
            .bind(id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;

        Ok(result.rows_affected() > 0)
    }
}
