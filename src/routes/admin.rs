use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{delete, get, put},
};

/// Admin Router Module
///
/// Moderation pages, nested under `/admin`. The authenticated guard wraps this router and
/// `guard::require_admin` answers 403 to non-admins before any handler runs.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        .route(
            "/categories",
            get(handlers::admin_categories).post(handlers::create_category),
        )
        .route("/categories/{id}", delete(handlers::delete_category))
        .route("/institutions", get(handlers::admin_institutions))
        // GET /admin/requests-approval?status=pending
        .route("/requests-approval", get(handlers::admin_requests))
        // PUT /admin/requests-approval/{id}
        // Records approved/rejected.
        .route("/requests-approval/{id}", put(handlers::decide_request))
        .route("/users", get(handlers::admin_users))
        .route("/users/{id}/role", put(handlers::set_user_role))
}
