use std::collections::HashSet;

use crate::{
    AppState,
    auth::{CODE_VERIFIER_COOKIE, Identity, Session, cookie_value, session_cookie, session_token},
    error::{AppError, AppResult},
    forms::{
        CategoryInput, EventInput, FollowInput, InstitutionRequestInput, LoginInput, ProfileInput,
        RequestDecisionInput, RoleUpdateInput, SignUpInput,
    },
    guard::{LANDING_PATH, LOGIN_PATH},
    models::{
        Category, DashboardPage, Event, EventDetails, FollowState, Institution, LoginPage,
        Organization, PresignedUrlRequest, PresignedUrlResponse, Profile, RegistrationRequest,
        RequestStatus, SettingsPage, SignUpPage, SignUpResult, Ticket,
    },
    validation::{MSG_REQUIRED, Valid, ValidationErrors},
};
use axum::{
    Json,
    body::Bytes,
    extract::{Path, Query, State},
    http::{HeaderMap, StatusCode, header},
    response::{IntoResponse, Redirect, Response},
};
use serde::Deserialize;
use uuid::Uuid;

/// Fallback cookie lifetime when the auth service does not say.
const DEFAULT_SESSION_SECONDS: i64 = 3600;

const AVATAR_TYPES: [(&str, &str); 4] = [
    ("image/png", "png"),
    ("image/jpeg", "jpg"),
    ("image/webp", "webp"),
    ("image/gif", "gif"),
];

// --- Filter Structs ---

/// EventFilter
///
/// Query parameters for the public event listing (GET /events).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct EventFilter {
    /// Only events in this category.
    pub category: Option<Uuid>,
    /// Case-insensitive match on title and summary.
    pub search: Option<String>,
}

/// RequestFilter
///
/// Query parameters for the approval queue (GET /admin/requests-approval).
#[derive(Deserialize, utoipa::IntoParams)]
pub struct RequestFilter {
    /// `pending`, `approved` or `rejected`. Omit for all requests.
    pub status: Option<String>,
}

#[derive(Deserialize)]
pub struct CallbackParams {
    pub code: Option<String>,
    pub next: Option<String>,
}

// --- Helpers ---

fn require_admin(identity: &Identity) -> AppResult<()> {
    if identity.is_admin() {
        Ok(())
    } else {
        Err(AppError::Forbidden("admin role required"))
    }
}

/// Admins may edit any event; institution admins only their own institution's.
fn require_institution_editor(identity: &Identity, institution: &Institution) -> AppResult<()> {
    if identity.is_admin() || institution.owner_id == identity.id {
        Ok(())
    } else {
        Err(AppError::Forbidden("not an editor of this institution"))
    }
}

/// Redirect that also stores (or clears) the session cookie.
fn redirect_with_session(state: &AppState, session: Option<&Session>, to: &str) -> Response {
    let cookie = session_cookie(
        session.map(|s| s.access_token.as_str()),
        session
            .and_then(|s| s.expires_in)
            .unwrap_or(DEFAULT_SESSION_SECONDS),
        state.config.secure_cookies(),
    );
    ([(header::SET_COOKIE, cookie)], Redirect::to(to)).into_response()
}

/// safe_next
///
/// Only same-site relative paths are honoured as post-login destinations. Paths with control
/// characters are refused: browsers drop tab/CR/LF, so `/\t/host` would act as `//host`.
pub fn safe_next(next: Option<&str>) -> &str {
    let Some(path) = next else {
        return LANDING_PATH;
    };
    if path.contains('\\') || path.chars().any(|c| c.is_ascii_control()) {
        return LANDING_PATH;
    }
    let mut chars = path.chars();
    match (chars.next(), chars.next()) {
        (Some('/'), Some('/')) => LANDING_PATH,
        (Some('/'), _) => path,
        _ => LANDING_PATH,
    }
}

// --- Public pages ---

/// list_events
///
/// [Public Route] Event discovery with optional category and search filters.
#[utoipa::path(
    get,
    path = "/events",
    params(EventFilter),
    responses((status = 200, description = "Events", body = [Event]))
)]
pub async fn list_events(
    State(state): State<AppState>,
    Query(filter): Query<EventFilter>,
) -> AppResult<Json<Vec<Event>>> {
    let events = state.repo.list_events(filter.category, filter.search).await?;
    Ok(Json(events))
}

/// get_event_details
///
/// [Public Route] Event page. The repository answers `None` for an unknown id, which renders
/// as 404.
#[utoipa::path(
    get,
    path = "/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 200, description = "Event details", body = EventDetails),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_event_details(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> AppResult<Json<EventDetails>> {
    let mut details = state
        .repo
        .get_event_details(id)
        .await?
        .ok_or(AppError::NotFound("event"))?;

    details.banner_url = details
        .event
        .banner
        .as_deref()
        .map(|key| state.storage.public_url(key));

    Ok(Json(details))
}

#[utoipa::path(
    get,
    path = "/categories",
    responses((status = 200, description = "Categories", body = [Category]))
)]
pub async fn list_categories(State(state): State<AppState>) -> AppResult<Json<Vec<Category>>> {
    Ok(Json(state.repo.list_categories().await?))
}

/// auth_callback
///
/// [Public Route] Landing point for email-link and OAuth sign-ins. Swaps the one-time code for
/// a session, stores it in the cookie and continues to `next`. Any failure goes back to the
/// login page.
pub async fn auth_callback(
    State(state): State<AppState>,
    Query(params): Query<CallbackParams>,
    headers: HeaderMap,
) -> Response {
    let Some(code) = params.code.as_deref().filter(|c| !c.is_empty()) else {
        return Redirect::to(LOGIN_PATH).into_response();
    };
    let verifier = cookie_value(&headers, CODE_VERIFIER_COOKIE).unwrap_or_default();

    match state.auth.exchange_code_for_session(code, verifier).await {
        Ok(session) => {
            let next = safe_next(params.next.as_deref());
            redirect_with_session(&state, Some(&session), next)
        }
        Err(e) => {
            tracing::warn!(error = ?e, "code exchange failed");
            Redirect::to(LOGIN_PATH).into_response()
        }
    }
}

// --- Anonymous-only pages ---

pub async fn login_page() -> Json<LoginPage> {
    Json(LoginPage {
        title: "Sign in".to_string(),
        signup_path: "/signup".to_string(),
    })
}

/// login
///
/// [Anonymous Route] Password sign-in against the auth backend. On success the access token
/// goes into an HttpOnly cookie and the browser is sent to the dashboard.
#[utoipa::path(
    post,
    path = "/login",
    request_body = LoginInput,
    responses(
        (status = 303, description = "Signed in, redirect to /dashboard"),
        (status = 400, description = "Credentials rejected"),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Valid(input): Valid<LoginInput>,
) -> AppResult<Response> {
    let session = state
        .auth
        .sign_in_with_password(&input.email, &input.password)
        .await?;

    tracing::info!("password sign-in succeeded");
    Ok(redirect_with_session(&state, Some(&session), LANDING_PATH))
}

pub async fn signup_page() -> Json<SignUpPage> {
    Json(SignUpPage {
        title: "Create an account".to_string(),
        login_path: LOGIN_PATH.to_string(),
    })
}

/// signup
///
/// [Anonymous Route] Creates the auth user, then mirrors it into `profiles` so the ids line up.
/// When the backend hands back a session straight away the caller is signed in; otherwise they
/// have to confirm their email first.
#[utoipa::path(
    post,
    path = "/signup",
    request_body = SignUpInput,
    responses(
        (status = 201, description = "Created, confirmation pending", body = SignUpResult),
        (status = 303, description = "Created and signed in"),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn signup(
    State(state): State<AppState>,
    Valid(input): Valid<SignUpInput>,
) -> AppResult<Response> {
    let (id, session) = state
        .auth
        .sign_up(&input.email, &input.password, input.full_name.as_deref())
        .await?;

    let profile = ProfileInput {
        full_name: input.full_name,
        address: None,
    };
    if let Err(e) = state.repo.save_profile(id, &input.email, profile).await {
        // The auth account exists without a profile row; settings will create it on first save.
        tracing::warn!(error = ?e, user_id = %id, "profile creation failed after sign-up");
        return Err(e.into());
    }

    tracing::info!(user_id = %id, "account created");

    Ok(match session {
        Some(session) => redirect_with_session(&state, Some(&session), LANDING_PATH),
        None => (
            StatusCode::CREATED,
            Json(SignUpResult {
                id,
                signed_in: false,
            }),
        )
            .into_response(),
    })
}

// --- Authenticated pages ---

/// logout
///
/// [Authenticated Route] Revokes the session with the auth backend and clears the cookie. The
/// cookie is cleared even if revocation fails so the browser is signed out locally.
pub async fn logout(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
) -> Response {
    if let Some(token) = session_token(&headers) {
        if let Err(e) = state.auth.sign_out(token).await {
            tracing::warn!(error = ?e, user_id = %identity.id, "sign-out call failed");
        }
    }
    redirect_with_session(&state, None, LOGIN_PATH)
}

/// dashboard
///
/// [Authenticated Route] Landing page: the caller's profile, tickets and followed institutions.
/// Admins also see how many institution requests are waiting.
#[utoipa::path(
    get,
    path = "/dashboard",
    responses(
        (status = 200, description = "Dashboard", body = DashboardPage),
        (status = 303, description = "Not signed in, redirect to /login")
    )
)]
pub async fn dashboard(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<DashboardPage>> {
    let profile = state.repo.get_profile(identity.id).await?;
    let tickets = state.repo.list_tickets(identity.id).await?;
    let following = state.repo.followed_institutions(identity.id).await?;

    let pending_requests = if identity.is_admin() {
        Some(
            state
                .repo
                .list_requests(Some(RequestStatus::Pending))
                .await?
                .len(),
        )
    } else {
        None
    };

    Ok(Json(DashboardPage {
        identity,
        profile,
        tickets,
        following,
        pending_requests,
    }))
}

fn settings_view(state: &AppState, profile: Option<Profile>) -> SettingsPage {
    let avatar_url = profile
        .as_ref()
        .and_then(|p| p.avatar.as_deref())
        .map(|key| state.storage.public_url(key));
    SettingsPage {
        profile,
        avatar_url,
    }
}

pub async fn settings_page(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<SettingsPage>> {
    let profile = state.repo.get_profile(identity.id).await?;
    Ok(Json(settings_view(&state, profile)))
}

/// update_settings
///
/// [Authenticated Route] Saves name and address. Creates the profile row if the account was
/// made outside this service.
#[utoipa::path(
    put,
    path = "/settings",
    request_body = ProfileInput,
    responses(
        (status = 200, description = "Saved", body = SettingsPage),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn update_settings(
    State(state): State<AppState>,
    identity: Identity,
    Valid(input): Valid<ProfileInput>,
) -> AppResult<Json<SettingsPage>> {
    let email = identity.email.clone().unwrap_or_default();
    let profile = state.repo.save_profile(identity.id, &email, input).await?;
    Ok(Json(settings_view(&state, Some(profile))))
}

/// upload_avatar
///
/// [Authenticated Route] Raw image body, stored under `avatars/{user}/`.
pub async fn upload_avatar(
    State(state): State<AppState>,
    identity: Identity,
    headers: HeaderMap,
    body: Bytes,
) -> AppResult<Json<SettingsPage>> {
    let content_type = headers
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .unwrap_or_default();

    let Some((content_type, extension)) = AVATAR_TYPES
        .iter()
        .find(|(mime, _)| *mime == content_type)
        .copied()
    else {
        let allowed: Vec<&str> = AVATAR_TYPES.iter().map(|(mime, _)| *mime).collect();
        return Err(AppError::Validation(ValidationErrors::single(
            "content_type",
            format!("must be one of: {}", allowed.join(", ")),
        )));
    };

    if body.is_empty() {
        return Err(AppError::Validation(ValidationErrors::single(
            "body",
            MSG_REQUIRED,
        )));
    }

    let key = format!("avatars/{}/{}.{}", identity.id, Uuid::new_v4(), extension);
    state
        .storage
        .upload_object(&key, content_type, body.to_vec())
        .await?;

    let email = identity.email.clone().unwrap_or_default();
    let profile = match state.repo.set_avatar(identity.id, &key).await? {
        Some(profile) => profile,
        // No profile row yet: create it, then attach the avatar.
        None => {
            state
                .repo
                .save_profile(identity.id, &email, ProfileInput::default())
                .await?;
            state
                .repo
                .set_avatar(identity.id, &key)
                .await?
                .ok_or(AppError::NotFound("profile"))?
        }
    };

    Ok(Json(settings_view(&state, Some(profile))))
}

#[utoipa::path(
    get,
    path = "/tickets",
    responses((status = 200, description = "My tickets", body = [Ticket]))
)]
pub async fn list_tickets(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<Vec<Ticket>>> {
    Ok(Json(state.repo.list_tickets(identity.id).await?))
}

/// register_for_event
///
/// [Authenticated Route] Issues the caller a ticket. A second registration for the same event
/// is refused with 409.
#[utoipa::path(
    post,
    path = "/events/{id}/register",
    params(("id" = Uuid, Path, description = "Event ID")),
    responses(
        (status = 201, description = "Registered", body = Ticket),
        (status = 404, description = "No such event"),
        (status = 409, description = "Already registered")
    )
)]
pub async fn register_for_event(
    State(state): State<AppState>,
    identity: Identity,
    Path(event_id): Path<Uuid>,
) -> AppResult<(StatusCode, Json<Ticket>)> {
    if state.repo.get_event(event_id).await?.is_none() {
        return Err(AppError::NotFound("event"));
    }

    let ticket = state
        .repo
        .create_ticket(event_id, identity.id)
        .await?
        .ok_or(AppError::Conflict("already registered for this event"))?;

    Ok((StatusCode::CREATED, Json(ticket)))
}

/// create_event
///
/// [Authenticated Route] New event for an institution the caller administers.
#[utoipa::path(
    post,
    path = "/events",
    request_body = EventInput,
    responses(
        (status = 201, description = "Created", body = Event),
        (status = 403, description = "Not an editor of the institution"),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn create_event(
    State(state): State<AppState>,
    identity: Identity,
    Valid(input): Valid<EventInput>,
) -> AppResult<(StatusCode, Json<Event>)> {
    let institution_id = input.institution_id.ok_or_else(|| {
        AppError::Validation(ValidationErrors::single("institution_id", MSG_REQUIRED))
    })?;

    let institution = state
        .repo
        .get_institution(institution_id)
        .await?
        .ok_or(AppError::NotFound("institution"))?;
    require_institution_editor(&identity, &institution)?;

    let event = state.repo.create_event(institution.id, input).await?;
    tracing::info!(event_id = %event.id, institution_id = %institution.id, "event created");
    Ok((StatusCode::CREATED, Json(event)))
}

/// update_event
///
/// [Authenticated Route] Edits an event and, when given, replaces its details block.
#[utoipa::path(
    put,
    path = "/events/{id}",
    params(("id" = Uuid, Path, description = "Event ID")),
    request_body = EventInput,
    responses(
        (status = 200, description = "Updated", body = Event),
        (status = 403, description = "Not an editor of the institution"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn update_event(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Valid(input): Valid<EventInput>,
) -> AppResult<Json<Event>> {
    let event = state
        .repo
        .get_event(id)
        .await?
        .ok_or(AppError::NotFound("event"))?;
    let institution = state
        .repo
        .get_institution(event.institution_id)
        .await?
        .ok_or(AppError::NotFound("institution"))?;
    require_institution_editor(&identity, &institution)?;

    let updated = state
        .repo
        .update_event(id, input)
        .await?
        .ok_or(AppError::NotFound("event"))?;
    Ok(Json(updated))
}

/// organizations
///
/// [Authenticated Route] All institutions, flagged with whether the caller follows them.
#[utoipa::path(
    get,
    path = "/organizations",
    responses((status = 200, description = "Organizations", body = [Organization]))
)]
pub async fn organizations(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<Vec<Organization>>> {
    let followed: HashSet<Uuid> = state
        .repo
        .followed_institutions(identity.id)
        .await?
        .into_iter()
        .map(|institution| institution.id)
        .collect();

    let organizations = state
        .repo
        .list_institutions()
        .await?
        .into_iter()
        .map(|institution| Organization {
            following: followed.contains(&institution.id),
            logo_url: institution
                .logo
                .as_deref()
                .map(|key| state.storage.public_url(key)),
            institution,
        })
        .collect();

    Ok(Json(organizations))
}

/// toggle_follow
///
/// [Authenticated Route] Follows the institution if the caller does not yet, unfollows
/// otherwise. Answers with the new state.
#[utoipa::path(
    post,
    path = "/organizations/follow",
    request_body = FollowInput,
    responses(
        (status = 200, description = "New follow state", body = FollowState),
        (status = 404, description = "No such institution"),
        (status = 422, description = "Invalid identifier")
    )
)]
pub async fn toggle_follow(
    State(state): State<AppState>,
    identity: Identity,
    Valid(input): Valid<FollowInput>,
) -> AppResult<Json<FollowState>> {
    let institution_id = input.institution_id;
    if state.repo.get_institution(institution_id).await?.is_none() {
        return Err(AppError::NotFound("institution"));
    }

    let following = if state
        .repo
        .is_following(identity.id, institution_id)
        .await?
    {
        state.repo.unfollow(identity.id, institution_id).await?;
        false
    } else {
        state.repo.follow(identity.id, institution_id).await?;
        true
    };

    Ok(Json(FollowState {
        institution_id,
        following,
    }))
}

/// submit_institution_request
///
/// [Authenticated Route] Files a request for an institution to be listed. Starts as `pending`.
#[utoipa::path(
    post,
    path = "/organizations/requests",
    request_body = InstitutionRequestInput,
    responses(
        (status = 201, description = "Filed", body = RegistrationRequest),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn submit_institution_request(
    State(state): State<AppState>,
    identity: Identity,
    Valid(input): Valid<InstitutionRequestInput>,
) -> AppResult<(StatusCode, Json<RegistrationRequest>)> {
    let request = state.repo.create_request(identity.id, input).await?;
    tracing::info!(request_id = %request.id, "institution request filed");
    Ok((StatusCode::CREATED, Json(request)))
}

/// get_presigned_url
///
/// [Authenticated Route] Short-lived URL for uploading a banner or logo straight to storage.
/// The returned `resource_key` is what the event or institution form submits afterwards.
#[utoipa::path(
    post,
    path = "/upload/presigned",
    request_body = PresignedUrlRequest,
    responses(
        (status = 200, description = "URL", body = PresignedUrlResponse),
        (status = 422, description = "Invalid file name or type")
    )
)]
pub async fn get_presigned_url(
    State(state): State<AppState>,
    identity: Identity,
    Valid(payload): Valid<PresignedUrlRequest>,
) -> AppResult<Json<PresignedUrlResponse>> {
    let extension = std::path::Path::new(&payload.filename)
        .extension()
        .and_then(std::ffi::OsStr::to_str)
        .unwrap_or("bin");
    let object_key = format!("uploads/{}/{}.{}", identity.id, Uuid::new_v4(), extension);

    let upload_url = state
        .storage
        .get_presigned_upload_url(&object_key, &payload.file_type)
        .await?;

    Ok(Json(PresignedUrlResponse {
        upload_url,
        resource_key: object_key,
    }))
}

// --- Admin pages ---

#[utoipa::path(
    get,
    path = "/admin/categories",
    responses(
        (status = 200, description = "Categories", body = [Category]),
        (status = 403, description = "Not an admin")
    )
)]
pub async fn admin_categories(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<Vec<Category>>> {
    require_admin(&identity)?;
    Ok(Json(state.repo.list_categories().await?))
}

/// create_category
///
/// [Admin Route] Adds a category. The form is validated before anything is written.
#[utoipa::path(
    post,
    path = "/admin/categories",
    request_body = CategoryInput,
    responses(
        (status = 201, description = "Created", body = Category),
        (status = 403, description = "Not an admin"),
        (status = 422, description = "Invalid form")
    )
)]
pub async fn create_category(
    State(state): State<AppState>,
    identity: Identity,
    Valid(input): Valid<CategoryInput>,
) -> AppResult<(StatusCode, Json<Category>)> {
    require_admin(&identity)?;
    let category = state.repo.create_category(input).await?;
    Ok((StatusCode::CREATED, Json(category)))
}

#[utoipa::path(
    delete,
    path = "/admin/categories/{id}",
    params(("id" = Uuid, Path, description = "Category ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found")
    )
)]
pub async fn delete_category(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
) -> AppResult<StatusCode> {
    require_admin(&identity)?;
    if state.repo.delete_category(id).await? {
        Ok(StatusCode::NO_CONTENT)
    } else {
        Err(AppError::NotFound("category"))
    }
}

#[utoipa::path(
    get,
    path = "/admin/institutions",
    responses((status = 200, description = "Institutions", body = [Institution]))
)]
pub async fn admin_institutions(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<Vec<Institution>>> {
    require_admin(&identity)?;
    Ok(Json(state.repo.list_institutions().await?))
}

/// admin_requests
///
/// [Admin Route] The approval queue, optionally narrowed to one status.
#[utoipa::path(
    get,
    path = "/admin/requests-approval",
    params(RequestFilter),
    responses((status = 200, description = "Requests", body = [RegistrationRequest]))
)]
pub async fn admin_requests(
    State(state): State<AppState>,
    identity: Identity,
    Query(filter): Query<RequestFilter>,
) -> AppResult<Json<Vec<RegistrationRequest>>> {
    require_admin(&identity)?;

    let status = match filter.status.as_deref().filter(|s| !s.is_empty()) {
        None => None,
        Some(raw) => Some(RequestStatus::parse(raw).ok_or_else(|| {
            AppError::Validation(ValidationErrors::single(
                "status",
                "must be one of: pending, approved, rejected",
            ))
        })?),
    };

    Ok(Json(state.repo.list_requests(status).await?))
}

/// decide_request
///
/// [Admin Route] Records an approval or rejection.
#[utoipa::path(
    put,
    path = "/admin/requests-approval/{id}",
    params(("id" = Uuid, Path, description = "Request ID")),
    request_body = RequestDecisionInput,
    responses(
        (status = 200, description = "Recorded", body = RegistrationRequest),
        (status = 404, description = "Not Found")
    )
)]
pub async fn decide_request(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Valid(input): Valid<RequestDecisionInput>,
) -> AppResult<Json<RegistrationRequest>> {
    require_admin(&identity)?;
    let request = state
        .repo
        .set_request_status(id, input.status)
        .await?
        .ok_or(AppError::NotFound("request"))?;

    tracing::info!(request_id = %id, status = input.status.as_str(), admin = %identity.id, "request decided");
    Ok(Json(request))
}

#[utoipa::path(
    get,
    path = "/admin/users",
    responses((status = 200, description = "Profiles", body = [Profile]))
)]
pub async fn admin_users(
    State(state): State<AppState>,
    identity: Identity,
) -> AppResult<Json<Vec<Profile>>> {
    require_admin(&identity)?;
    Ok(Json(state.repo.list_profiles().await?))
}

/// set_user_role
///
/// [Admin Route] Changes a user's platform role.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = RoleUpdateInput,
    responses(
        (status = 200, description = "Updated", body = Profile),
        (status = 404, description = "Not Found")
    )
)]
pub async fn set_user_role(
    State(state): State<AppState>,
    identity: Identity,
    Path(id): Path<Uuid>,
    Valid(input): Valid<RoleUpdateInput>,
) -> AppResult<Json<Profile>> {
    require_admin(&identity)?;
    let profile = state
        .repo
        .set_role(id, input.role)
        .await?
        .ok_or(AppError::NotFound("user"))?;

    tracing::info!(user_id = %id, role = input.role.as_str(), admin = %identity.id, "role changed");
    Ok(Json(profile))
}
