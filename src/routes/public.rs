use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Public Router Module
///
/// Read-only event discovery and the sign-in callback. Nothing here needs or resolves a
/// session.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Liveness check for the load balancer.
        .route("/health", get(|| async { "OK" }))
        // GET /events?category=&search=
        .route("/events", get(handlers::list_events))
        // GET /events/{id}
        // Event with its details block and activities; 404 when the id is unknown.
        .route("/events/{id}", get(handlers::get_event_details))
        .route("/categories", get(handlers::list_categories))
        // GET /auth/callback?code=&next=
        // Email-link and OAuth sign-ins land here to trade the code for a session cookie.
        .route("/auth/callback", get(handlers::auth_callback))
}
