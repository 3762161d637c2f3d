use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};

use crate::{
    api::state::AppState,
    domain::{
        Announcement, CreateAnnouncementRequest, PinRequest, RecordAcknowledgeRequest,
        RecordViewRequest, UpdateAnnouncementRequest,
    },
    error::Result,
};

/// Every stored announcement. Visibility filtering happens client-side.
pub async fn list(State(state): State<AppState>) -> Result<Json<Vec<Announcement>>> {
    let announcements = state.service_context.announcement_service.list().await?;
    Ok(Json(announcements))
}

pub async fn get(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Announcement>> {
    let announcement = state.service_context.announcement_service.get(&id).await?;
    Ok(Json(announcement))
}

pub async fn create(
    State(state): State<AppState>,
    Json(request): Json<CreateAnnouncementRequest>,
) -> Result<(StatusCode, Json<Announcement>)> {
    let announcement = state
        .service_context
        .announcement_service
        .create(request)
        .await?;
    Ok((StatusCode::CREATED, Json(announcement)))
}

pub async fn record_view(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RecordViewRequest>,
) -> Result<Json<Announcement>> {
    let announcement = state
        .service_context
        .announcement_service
        .record_view(&id, request)
        .await?;
    Ok(Json(announcement))
}

pub async fn record_acknowledge(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<RecordAcknowledgeRequest>,
) -> Result<Json<Announcement>> {
    let announcement = state
        .service_context
        .announcement_service
        .record_acknowledge(&id, request)
        .await?;
    Ok(Json(announcement))
}

pub async fn set_pinned(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<PinRequest>,
) -> Result<Json<Announcement>> {
    let announcement = state
        .service_context
        .announcement_service
        .set_pinned(&id, request.is_pinned)
        .await?;
    Ok(Json(announcement))
}

pub async fn replace(
    State(state): State<AppState>,
    Path(id): Path<String>,
    Json(request): Json<UpdateAnnouncementRequest>,
) -> Result<Json<Announcement>> {
    let announcement = state
        .service_context
        .announcement_service
        .replace(&id, request)
        .await?;
    Ok(Json(announcement))
}

pub async fn repost(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<Json<Announcement>> {
    let announcement = state.service_context.announcement_service.repost(&id).await?;
    Ok(Json(announcement))
}

pub async fn delete(
    State(state): State<AppState>,
    Path(id): Path<String>,
) -> Result<StatusCode> {
    state.service_context.announcement_service.delete(&id).await?;
    Ok(StatusCode::NO_CONTENT)
}
