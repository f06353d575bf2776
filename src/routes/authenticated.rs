use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post, put},
};

/// Authenticated Router Module
///
/// Every page here takes an `Identity`, resolved by `guard::require_authenticated` before the
/// handler runs. Callers without a session are redirected to `/login`.
///
/// Ownership checks (editing an institution's events) happen in the handlers.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // POST /logout
        // Revokes the session and clears the cookie.
        .route("/logout", post(handlers::logout))
        // GET /dashboard
        // Post-login landing page.
        .route("/dashboard", get(handlers::dashboard))
        // GET/PUT /settings
        .route(
            "/settings",
            get(handlers::settings_page).put(handlers::update_settings),
        )
        // PUT /settings/avatar
        // Raw image body; Content-Type picks the file extension.
        .route("/settings/avatar", put(handlers::upload_avatar))
        .route("/tickets", get(handlers::list_tickets))
        // --- Events ---
        // POST /events
        // Institution editors create events. GET on the same path is public.
        .route("/events", post(handlers::create_event))
        .route("/events/{id}", put(handlers::update_event))
        // POST /events/{id}/register
        // One ticket per user and event; repeats answer 409.
        .route("/events/{id}/register", post(handlers::register_for_event))
        // --- Organizations ---
        .route("/organizations", get(handlers::organizations))
        .route("/organizations/follow", post(handlers::toggle_follow))
        .route(
            "/organizations/requests",
            post(handlers::submit_institution_request),
        )
        // POST /upload/presigned
        // Short-lived PUT URL for banners and logos, uploaded straight to storage.
        .route("/upload/presigned", post(handlers::get_presigned_url))
}
