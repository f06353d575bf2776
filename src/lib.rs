use axum::{Router, extract::FromRef, http::HeaderName, middleware};
use utoipa::OpenApi;
use utoipa_swagger_ui::SwaggerUi;

use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    request_id::{MakeRequestUuid, PropagateRequestIdLayer, SetRequestIdLayer},
    trace::{DefaultOnResponse, TraceLayer},
};
use tracing::{Level, Span};

// --- Module Structure ---

// Backend clients and the data they exchange.
pub mod auth;
pub mod config;
pub mod models;
pub mod repository;
pub mod storage;

// Request handling: session guard, form validation, page handlers.
pub mod error;
pub mod forms;
pub mod guard;
pub mod handlers;
pub mod validation;

// Routers grouped by the authentication state they require.
pub mod routes;
use routes::{admin, anonymous, authenticated, public};

// --- Public Re-exports ---

pub use auth::{AuthState, MockAuthService, SupabaseAuthClient};
pub use config::AppConfig;
pub use error::{AppError, AppResult};
pub use repository::{PostgresRepository, RepositoryState};
pub use storage::{MockStorageService, S3StorageClient, StorageState};

/// ApiDoc
///
/// OpenAPI document for the page endpoints, served at `/api-docs/openapi.json`.
#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::list_events, handlers::get_event_details, handlers::list_categories,
        handlers::login, handlers::signup, handlers::dashboard, handlers::update_settings,
        handlers::list_tickets, handlers::register_for_event, handlers::create_event,
        handlers::update_event, handlers::organizations, handlers::toggle_follow,
        handlers::submit_institution_request, handlers::get_presigned_url,
        handlers::admin_categories, handlers::create_category, handlers::delete_category,
        handlers::admin_institutions, handlers::admin_requests, handlers::decide_request,
        handlers::admin_users, handlers::set_user_role
    ),
    components(
        schemas(
            models::Role, models::RequestStatus, models::Address, models::Profile,
            models::Category, models::Institution, models::RegistrationRequest, models::Event,
            models::KeyValue, models::EventActivity, models::EventDetails, models::Ticket,
            models::PresignedUrlRequest, models::PresignedUrlResponse, models::FollowState,
            models::LoginPage, models::SignUpPage, models::SignUpResult, models::DashboardPage,
            models::SettingsPage, models::Organization, auth::Identity,
            forms::CategoryInput, forms::FollowInput, forms::InstitutionRequestInput,
            forms::EventInput, forms::EventDetailsInput, forms::RoleUpdateInput,
            forms::RequestDecisionInput, forms::ProfileInput, forms::SignUpInput,
            forms::LoginInput, error::ErrorBody,
        )
    ),
    tags(
        (name = "event-portal", description = "Events portal pages")
    )
)]
struct ApiDoc;

/// AppState
///
/// Everything a request may need, shared read-only across requests. The backend clients sit
/// behind traits so tests can swap in the mocks.
#[derive(Clone)]
pub struct AppState {
    /// Auth backend: identity lookup, sign-in, sign-up, sign-out.
    pub auth: AuthState,
    /// Backend database tables.
    pub repo: RepositoryState,
    /// Object storage for avatars, banners and logos.
    pub storage: StorageState,
    pub config: AppConfig,
}

// --- Axum FromRef Extractor Implementations ---

impl FromRef<AppState> for AuthState {
    fn from_ref(app_state: &AppState) -> AuthState {
        app_state.auth.clone()
    }
}

impl FromRef<AppState> for RepositoryState {
    fn from_ref(app_state: &AppState) -> RepositoryState {
        app_state.repo.clone()
    }
}

impl FromRef<AppState> for StorageState {
    fn from_ref(app_state: &AppState) -> StorageState {
        app_state.storage.clone()
    }
}

impl FromRef<AppState> for AppConfig {
    fn from_ref(app_state: &AppState) -> AppConfig {
        app_state.config.clone()
    }
}

/// create_router
///
/// Assembles every page route. Each group gets the session guard matching the authentication
/// state it requires; public routes and the auth callback get none.
pub fn create_router(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_methods(Any)
        .allow_origin(Any)
        .allow_headers(Any);

    let x_request_id = HeaderName::from_static("x-request-id");

    let base_router = Router::new()
        .merge(SwaggerUi::new("/swagger-ui").url("/api-docs/openapi.json", ApiDoc::openapi()))
        .merge(public::public_routes())
        // Login and sign-up: signed-in callers are sent to the dashboard.
        .merge(
            anonymous::anonymous_routes().route_layer(middleware::from_fn_with_state(
                state.clone(),
                guard::require_anonymous,
            )),
        )
        // Everything else needs a session; admin pages also need the admin role.
        .merge(
            authenticated::authenticated_routes()
                .nest(
                    "/admin",
                    admin::admin_routes().route_layer(middleware::from_fn(guard::require_admin)),
                )
                .route_layer(middleware::from_fn_with_state(
                    state.clone(),
                    guard::require_authenticated,
                )),
        )
        .with_state(state);

    base_router
        .layer(
            ServiceBuilder::new()
                .layer(SetRequestIdLayer::new(x_request_id.clone(), MakeRequestUuid))
                .layer(
                    TraceLayer::new_for_http()
                        .make_span_with(trace_span_logger)
                        .on_response(
                            DefaultOnResponse::new()
                                .level(Level::INFO)
                                .latency_unit(tower_http::LatencyUnit::Millis),
                        ),
                )
                .layer(PropagateRequestIdLayer::new(x_request_id)),
        )
        .layer(cors)
}

/// trace_span_logger
///
/// Span for one request, tagged with the `x-request-id` set by the layer above so every log
/// line of the request can be correlated.
fn trace_span_logger(request: &axum::http::Request<axum::body::Body>) -> Span {
    let request_id = request
        .headers()
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .unwrap_or("unknown");

    tracing::info_span!(
        "http_request",
        method = ?request.method(),
        uri = ?request.uri(),
        req_id = %request_id,
    )
}
