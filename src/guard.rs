//! Session guard.
//!
//! Page routes declare which authentication state they need. On entry the guard asks the auth
//! backend who the caller is (every time, nothing is cached) and either lets the request through
//! with the resolved `Identity` attached, or redirects.

use axum::{
    extract::{Request, State},
    http::HeaderMap,
    middleware::Next,
    response::{IntoResponse, Redirect, Response},
};

use crate::{
    AppState,
    auth::{AuthService, Identity, session_token},
    error::AppError,
    models::Role,
    repository::Repository,
};

pub const LOGIN_PATH: &str = "/login";
/// Where signed-in users land when they hit an anonymous-only page.
pub const LANDING_PATH: &str = "/dashboard";

/// Authentication state a page requires.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Access {
    Authenticated,
    Anonymous,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Decision {
    Proceed,
    Redirect(&'static str),
}

/// decide
///
/// Pure part of the guard: the page's requirement against the caller's identity.
pub fn decide(access: Access, identity: Option<&Identity>) -> Decision {
    match (access, identity) {
        (Access::Authenticated, None) => Decision::Redirect(LOGIN_PATH),
        (Access::Anonymous, Some(_)) => Decision::Redirect(LANDING_PATH),
        _ => Decision::Proceed,
    }
}

/// resolve_identity
///
/// Looks the caller up with the auth backend and attaches their profile role.
///
/// A request without a token is anonymous without a backend call. If the auth backend cannot be
/// reached the request is treated as anonymous; if only the profile lookup fails the identity
/// is kept with the default role.
pub async fn resolve_identity(
    auth: &dyn AuthService,
    repo: &dyn Repository,
    headers: &HeaderMap,
) -> Option<Identity> {
    let token = session_token(headers)?;

    let mut identity = match auth.get_user(token).await {
        Ok(Some(identity)) => identity,
        Ok(None) => {
            tracing::debug!("session token not recognised by auth service");
            return None;
        }
        Err(e) => {
            tracing::warn!(error = ?e, "auth lookup failed, treating request as anonymous");
            return None;
        }
    };

    identity.role = match repo.get_profile(identity.id).await {
        Ok(Some(profile)) => profile.role,
        Ok(None) => Role::User,
        Err(e) => {
            tracing::warn!(error = ?e, user_id = %identity.id, "profile lookup failed, using default role");
            Role::User
        }
    };

    Some(identity)
}

async fn guard(access: Access, state: AppState, mut request: Request, next: Next) -> Response {
    let identity =
        resolve_identity(state.auth.as_ref(), state.repo.as_ref(), request.headers()).await;

    match decide(access, identity.as_ref()) {
        Decision::Redirect(to) => {
            tracing::debug!(?access, to, uri = %request.uri(), "session guard redirect");
            Redirect::to(to).into_response()
        }
        Decision::Proceed => {
            if let Some(identity) = identity {
                request.extensions_mut().insert(identity);
            }
            next.run(request).await
        }
    }
}

/// Middleware for pages that need a signed-in caller. Anonymous callers go to `/login`.
pub async fn require_authenticated(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    guard(Access::Authenticated, state, request, next).await
}

/// Middleware for pages only meant for signed-out callers (login, sign-up). Signed-in callers
/// go to `/dashboard`.
pub async fn require_anonymous(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Response {
    guard(Access::Anonymous, state, request, next).await
}

/// Middleware for admin pages, layered inside `require_authenticated`. Runs before any body
/// extractor, so non-admins get 403 without their submission being parsed.
pub async fn require_admin(request: Request, next: Next) -> Response {
    match request.extensions().get::<Identity>() {
        Some(identity) if identity.is_admin() => next.run(request).await,
        Some(_) => AppError::Forbidden("admin role required").into_response(),
        None => AppError::Unauthorized.into_response(),
    }
}
