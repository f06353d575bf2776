use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Anonymous Router Module
///
/// Pages for signed-out callers. Wrapped in `guard::require_anonymous`, so a caller with a valid
/// session never reaches these handlers and is redirected to `/dashboard` instead.
pub fn anonymous_routes() -> Router<AppState> {
    Router::new()
        .route("/login", get(handlers::login_page).post(handlers::login))
        .route("/signup", get(handlers::signup_page).post(handlers::signup))
}
