pub mod handlers;
pub mod state;

use axum::{
    Router,
    routing::{get, post},
};
use tower_http::{
    compression::CompressionLayer,
    cors::CorsLayer,
    trace::TraceLayer,
};
use std::sync::Arc;

use crate::{
    config::Settings,
    service::ServiceContext,
};
use state::AppState;

pub fn create_app(
    service_context: Arc<ServiceContext>,
    settings: Arc<Settings>,
) -> Router {
    let app_state = AppState::new(service_context, settings);

    Router::new()
        // Root and health endpoints
        .route("/", get(handlers::root::root))
        .route("/health", get(handlers::root::health_check))

        // Record server
        .nest("/announcements", announcement_routes())

        // Push channel
        .route(
            "/events",
            get(handlers::events::subscribe).post(handlers::events::publish_hint),
        )

        .with_state(app_state)

        // Middleware
        .layer(CompressionLayer::new())
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http())
}

fn announcement_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/",
            get(handlers::announcements::list).post(handlers::announcements::create),
        )
        .route(
            "/:id",
            get(handlers::announcements::get)
                .patch(handlers::announcements::set_pinned)
                .put(handlers::announcements::replace)
                .delete(handlers::announcements::delete),
        )
        .route("/:id/view", post(handlers::announcements::record_view))
        .route("/:id/acknowledge", post(handlers::announcements::record_acknowledge))
        .route("/:id/repost", post(handlers::announcements::repost))
}
