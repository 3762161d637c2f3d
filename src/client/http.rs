use async_trait::async_trait;
use reqwest::{Client, Method, Response, StatusCode, Url};
use serde::Serialize;
use serde_json::Value;

use crate::{
    client::AnnouncementApi,
    domain::{Announcement, PinRequest, RecordAcknowledgeRequest, RecordViewRequest, UpdateAnnouncementRequest},
    engine::visibility::{parse_announcement, parse_announcements},
    error::{AppError, Result},
};

pub struct HttpAnnouncementApi {
    client: Client,
    base_url: String,
}

impl HttpAnnouncementApi {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(Client::new(), base_url)
    }

    pub fn with_client(client: Client, base_url: impl Into<String>) -> Self {
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `/announcements/<id>[/<action>]` with the id percent-encoded as a
    /// single path segment.
    fn announcement_url(&self, id: &str, action: Option<&str>) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .map_err(|e| AppError::BadRequest(format!("Invalid base URL {}: {}", self.base_url, e)))?;
        {
            let mut segments = url
                .path_segments_mut()
                .map_err(|_| AppError::BadRequest(format!("{} cannot be a base URL", self.base_url)))?;
            segments.pop_if_empty().push("announcements").push(id);
            if let Some(action) = action {
                segments.push(action);
            }
        }
        Ok(url)
    }

    async fn send<B: Serialize + ?Sized>(
        &self,
        method: Method,
        url: Url,
        body: &B,
    ) -> Result<Option<Announcement>> {
        let path = url.path().to_string();
        let response = self
            .client
            .request(method.clone(), url)
            .json(body)
            .send()
            .await?;
        let response = Self::check(response, &method, &path).await?;

        let bytes = response.bytes().await?;
        if bytes.is_empty() {
            return Ok(None);
        }
        let value: Value = serde_json::from_slice(&bytes)?;
        Ok(parse_announcement(value))
    }

    async fn check(response: Response, method: &Method, path: &str) -> Result<Response> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let body = response.text().await.unwrap_or_default();
        match status {
            StatusCode::METHOD_NOT_ALLOWED | StatusCode::NOT_IMPLEMENTED => Err(AppError::Unsupported(
                format!("{} {} returned {}", method, path, status),
            )),
            StatusCode::NOT_FOUND => Err(AppError::NotFound(format!("{} {}", method, path))),
            _ => Err(AppError::Transport(format!(
                "{} {} returned {}: {}",
                method, path, status, body
            ))),
        }
    }
}

#[async_trait]
impl AnnouncementApi for HttpAnnouncementApi {
    async fn fetch_all(&self) -> Result<Vec<Announcement>> {
        let response = self.client.get(self.url("/announcements")).send().await?;
        let response = Self::check(response, &Method::GET, "/announcements").await?;
        let raw: Vec<Value> = response.json().await?;
        Ok(parse_announcements(raw))
    }

    async fn record_view(&self, id: &str, request: &RecordViewRequest) -> Result<Option<Announcement>> {
        self.send(Method::POST, self.announcement_url(id, Some("view"))?, request)
            .await
    }

    async fn record_acknowledge(
        &self,
        id: &str,
        request: &RecordAcknowledgeRequest,
    ) -> Result<Option<Announcement>> {
        self.send(Method::POST, self.announcement_url(id, Some("acknowledge"))?, request)
            .await
    }

    async fn set_pinned(&self, id: &str, pinned: bool) -> Result<Option<Announcement>> {
        self.send(
            Method::PATCH,
            self.announcement_url(id, None)?,
            &PinRequest { is_pinned: pinned },
        )
        .await
    }

    async fn replace(&self, id: &str, request: &UpdateAnnouncementRequest) -> Result<Option<Announcement>> {
        self.send(Method::PUT, self.announcement_url(id, None)?, request)
            .await
    }
}
