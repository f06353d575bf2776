use std::{
    collections::HashMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use async_trait::async_trait;
use axum::{
    extract::FromRequestParts,
    http::{HeaderMap, header, request::Parts},
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{error::AppError, models::Role};

/// Cookie holding the backend access token for browser sessions.
pub const ACCESS_TOKEN_COOKIE: &str = "sb-access-token";
/// Cookie holding the PKCE verifier for the code-exchange callback.
pub const CODE_VERIFIER_COOKIE: &str = "sb-code-verifier";

/// Identity
///
/// The authenticated user as reported by the backend auth service, plus the role read from
/// their profile. Read-only from this service's point of view.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, ToSchema)]
pub struct Identity {
    pub id: Uuid,
    pub email: Option<String>,
    // Free-form `user_metadata` from the auth record (full name, avatar hints, ...).
    #[schema(value_type = Object)]
    pub metadata: Value,
    #[serde(default)]
    pub role: Role,
}

impl Identity {
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

/// Session
///
/// Tokens handed back by a successful sign-in or code exchange.
#[derive(Debug, Clone, Deserialize)]
pub struct Session {
    pub access_token: String,
    #[serde(default)]
    pub refresh_token: Option<String>,
    #[serde(default)]
    pub expires_in: Option<i64>,
}

/// AuthError
///
/// Failures talking to the backend auth service. `Rejected` means the service answered and
/// said no (bad credentials, duplicate email); everything else means it could not be asked.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("auth service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("auth service returned status {0}")]
    Status(u16),

    #[error("auth transport error: {0}")]
    Transport(#[from] reqwest::Error),

    #[error("auth service error: {0}")]
    Other(String),
}

/// AuthService
///
/// Contract for the external auth backend. The Supabase client talks to GoTrue over HTTP; the
/// mock keeps a token table in memory for tests.
#[async_trait]
pub trait AuthService: Send + Sync {
    /// Resolves a token to the user behind it. `Ok(None)` when the token is unknown or expired.
    async fn get_user(&self, access_token: &str) -> Result<Option<Identity>, AuthError>;

    async fn sign_in_with_password(&self, email: &str, password: &str)
    -> Result<Session, AuthError>;

    /// Creates the auth user. Returns the new id and, when the project does not require email
    /// confirmation, a ready session.
    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<(Uuid, Option<Session>), AuthError>;

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError>;

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, AuthError>;
}

pub type AuthState = Arc<dyn AuthService>;

// --- Supabase GoTrue client ---

/// Raw user object from `/auth/v1/user` and `/auth/v1/signup`.
#[derive(Deserialize)]
struct GoTrueUser {
    id: Uuid,
    email: Option<String>,
    #[serde(default)]
    user_metadata: Value,
}

/// `/auth/v1/signup` answers with either a bare user or a session wrapping one.
#[derive(Deserialize)]
struct GoTrueSignUp {
    id: Option<Uuid>,
    user: Option<GoTrueUser>,
    access_token: Option<String>,
    refresh_token: Option<String>,
    expires_in: Option<i64>,
}

#[derive(Deserialize, Default)]
struct GoTrueError {
    #[serde(alias = "error_description", alias = "msg")]
    message: Option<String>,
}

/// SupabaseAuthClient
///
/// Talks to the GoTrue endpoints under `{SUPABASE_URL}/auth/v1`. Every call carries the anon
/// key in the `apikey` header; user-scoped calls add the access token as a bearer.
#[derive(Clone)]
pub struct SupabaseAuthClient {
    client: reqwest::Client,
    base_url: String,
    anon_key: String,
}

impl SupabaseAuthClient {
    pub fn new(supabase_url: &str, anon_key: &str) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: format!("{}/auth/v1", supabase_url.trim_end_matches('/')),
            anon_key: anon_key.to_string(),
        }
    }

    fn post(&self, path: &str) -> reqwest::RequestBuilder {
        self.client
            .post(format!("{}{}", self.base_url, path))
            .header("apikey", &self.anon_key)
    }

    async fn expect_success(response: reqwest::Response) -> Result<reqwest::Response, AuthError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        if status.is_client_error() {
            let body = response.json::<GoTrueError>().await.unwrap_or_default();
            return Err(AuthError::Rejected {
                status: status.as_u16(),
                message: body
                    .message
                    .unwrap_or_else(|| "request rejected by auth service".to_string()),
            });
        }
        Err(AuthError::Status(status.as_u16()))
    }
}

#[async_trait]
impl AuthService for SupabaseAuthClient {
    async fn get_user(&self, access_token: &str) -> Result<Option<Identity>, AuthError> {
        let response = self
            .client
            .get(format!("{}/user", self.base_url))
            .header("apikey", &self.anon_key)
            .bearer_auth(access_token)
            .send()
            .await?;

        // Expired, revoked or forged tokens all come back as 401/403: that's "no identity",
        // not a backend failure.
        if matches!(
            response.status(),
            reqwest::StatusCode::UNAUTHORIZED | reqwest::StatusCode::FORBIDDEN
        ) {
            return Ok(None);
        }

        let user = Self::expect_success(response)
            .await?
            .json::<GoTrueUser>()
            .await?;

        Ok(Some(Identity {
            id: user.id,
            email: user.email,
            metadata: user.user_metadata,
            role: Role::User,
        }))
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, AuthError> {
        let response = self
            .post("/token?grant_type=password")
            .json(&serde_json::json!({ "email": email, "password": password }))
            .send()
            .await?;

        Ok(Self::expect_success(response).await?.json::<Session>().await?)
    }

    async fn sign_up(
        &self,
        email: &str,
        password: &str,
        full_name: Option<&str>,
    ) -> Result<(Uuid, Option<Session>), AuthError> {
        let response = self
            .post("/signup")
            .json(&serde_json::json!({
                "email": email,
                "password": password,
                "data": { "full_name": full_name },
            }))
            .send()
            .await?;

        let body = Self::expect_success(response)
            .await?
            .json::<GoTrueSignUp>()
            .await?;

        let id = body
            .user
            .as_ref()
            .map(|user| user.id)
            .or(body.id)
            .ok_or_else(|| AuthError::Other("signup response carried no user id".to_string()))?;

        let session = body.access_token.map(|access_token| Session {
            access_token,
            refresh_token: body.refresh_token,
            expires_in: body.expires_in,
        });

        Ok((id, session))
    }

    async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        let response = self
            .post("/logout")
            .bearer_auth(access_token)
            .send()
            .await?;

        Self::expect_success(response).await?;
        Ok(())
    }

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        code_verifier: &str,
    ) -> Result<Session, AuthError> {
        let response = self
            .post("/token?grant_type=pkce")
            .json(&serde_json::json!({
                "auth_code": auth_code,
                "code_verifier": code_verifier,
            }))
            .send()
            .await?;

        Ok(Self::expect_success(response).await?.json::<Session>().await?)
    }
}

// --- Mock implementation (for tests) ---

/// MockAuthService
///
/// In-memory stand-in for the auth backend. Known tokens map to identities; `get_user_calls`
/// counts every lookup so tests can check that nothing is cached between requests.
#[derive(Default)]
pub struct MockAuthService {
    tokens: HashMap<String, Identity>,
    should_fail: bool,
    get_user_calls: AtomicUsize,
}

impl MockAuthService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn new_failing() -> Self {
        Self {
            should_fail: true,
            ..Self::default()
        }
    }

    pub fn with_session(mut self, token: &str, identity: Identity) -> Self {
        self.tokens.insert(token.to_string(), identity);
        self
    }

    pub fn get_user_calls(&self) -> usize {
        self.get_user_calls.load(Ordering::SeqCst)
    }

    fn fail_if_requested(&self) -> Result<(), AuthError> {
        if self.should_fail {
            return Err(AuthError::Other(
                "Mock Auth Error: Simulation requested".to_string(),
            ));
        }
        Ok(())
    }

    fn token_for(&self, email: &str) -> Option<&str> {
        self.tokens
            .iter()
            .find(|(_, identity)| identity.email.as_deref() == Some(email))
            .map(|(token, _)| token.as_str())
    }
}

#[async_trait]
impl AuthService for MockAuthService {
    async fn get_user(&self, access_token: &str) -> Result<Option<Identity>, AuthError> {
        self.get_user_calls.fetch_add(1, Ordering::SeqCst);
        self.fail_if_requested()?;
        Ok(self.tokens.get(access_token).cloned())
    }

    async fn sign_in_with_password(
        &self,
        email: &str,
        _password: &str,
    ) -> Result<Session, AuthError> {
        self.fail_if_requested()?;
        match self.token_for(email) {
            Some(token) => Ok(Session {
                access_token: token.to_string(),
                refresh_token: None,
                expires_in: Some(3600),
            }),
            None => Err(AuthError::Rejected {
                status: 400,
                message: "Invalid login credentials".to_string(),
            }),
        }
    }

    async fn sign_up(
        &self,
        email: &str,
        _password: &str,
        _full_name: Option<&str>,
    ) -> Result<(Uuid, Option<Session>), AuthError> {
        self.fail_if_requested()?;
        if self.token_for(email).is_some() {
            return Err(AuthError::Rejected {
                status: 422,
                message: "User already registered".to_string(),
            });
        }
        Ok((Uuid::new_v4(), None))
    }

    async fn sign_out(&self, _access_token: &str) -> Result<(), AuthError> {
        self.fail_if_requested()
    }

    async fn exchange_code_for_session(
        &self,
        auth_code: &str,
        _code_verifier: &str,
    ) -> Result<Session, AuthError> {
        self.fail_if_requested()?;
        // The mock accepts any known token as an auth code.
        if self.tokens.contains_key(auth_code) {
            Ok(Session {
                access_token: auth_code.to_string(),
                refresh_token: None,
                expires_in: Some(3600),
            })
        } else {
            Err(AuthError::Rejected {
                status: 400,
                message: "invalid flow state".to_string(),
            })
        }
    }
}

// --- Token extraction ---

/// Reads a cookie value out of the request headers.
pub fn cookie_value<'h>(headers: &'h HeaderMap, name: &str) -> Option<&'h str> {
    headers
        .get_all(header::COOKIE)
        .iter()
        .filter_map(|value| value.to_str().ok())
        .flat_map(|value| value.split(';'))
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
        .filter(|value| !value.is_empty())
}

/// session_token
///
/// The caller's access token: a bearer `Authorization` header wins, otherwise the session
/// cookie set at sign-in.
pub fn session_token(headers: &HeaderMap) -> Option<&str> {
    let bearer = headers
        .get(header::AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix("Bearer "))
        .map(str::trim)
        .filter(|token| !token.is_empty());

    bearer.or_else(|| cookie_value(headers, ACCESS_TOKEN_COOKIE))
}

/// Builds the `Set-Cookie` value carrying a session token. `None` clears the cookie.
pub fn session_cookie(token: Option<&str>, max_age: i64, secure: bool) -> String {
    let (value, max_age) = match token {
        Some(token) => (token, max_age),
        None => ("", 0),
    };
    let mut cookie = format!(
        "{}={}; Path=/; HttpOnly; SameSite=Lax; Max-Age={}",
        ACCESS_TOKEN_COOKIE, value, max_age
    );
    if secure {
        cookie.push_str("; Secure");
    }
    cookie
}

/// Identity Extractor
///
/// Handlers behind the authenticated guard take `Identity` as an argument. The guard has
/// already resolved it and stored it in the request extensions; a handler reached without
/// the guard is rejected with 401 rather than asking the backend again.
impl<S> FromRequestParts<S> for Identity
where
    S: Send + Sync,
{
    type Rejection = AppError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Identity>()
            .cloned()
            .ok_or(AppError::Unauthorized)
    }
}
