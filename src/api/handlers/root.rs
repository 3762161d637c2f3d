use axum::{extract::State, http::StatusCode, Json, response::IntoResponse};
use serde_json::json;

use crate::api::state::AppState;

pub async fn root() -> impl IntoResponse {
    Json(json!({
        "name": "Noticeboard",
        "version": env!("CARGO_PKG_VERSION"),
        "description": "Announcement record server with live push updates",
        "status": "operational",
        "endpoints": {
            "health": "/health",
            "announcements": "/announcements",
            "events": "/events"
        }
    }))
}

pub async fn health_check(State(state): State<AppState>) -> impl IntoResponse {
    let database = sqlx::query("SELECT 1")
        .execute(&state.service_context.db_pool)
        .await
        .is_ok();
    let status = if database { StatusCode::OK } else { StatusCode::SERVICE_UNAVAILABLE };

    (status, Json(json!({
        "status": if database { "healthy" } else { "degraded" },
        "subscribers": state.service_context.hub.subscriber_count(),
        "timestamp": chrono::Utc::now().to_rfc3339()
    })))
}
