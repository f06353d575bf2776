#![allow(dead_code)]

use async_trait::async_trait;
use axum::{
    Router,
    body::Body,
    http::{Method, Request, Response, header},
};
use chrono::Utc;
use event_portal::{
    AppConfig, AppState, create_router,
    auth::{ACCESS_TOKEN_COOKIE, Identity, MockAuthService},
    forms::{CategoryInput, EventInput, InstitutionRequestInput, ProfileInput},
    models::{
        Category, Event, EventDetails, Institution, Profile, RegistrationRequest, RequestStatus,
        Role, Ticket,
    },
    repository::{RepoResult, Repository},
    storage::MockStorageService,
};
use serde_json::Value;
use sqlx::types::Json;
use std::sync::{Arc, Mutex};
use tower::util::ServiceExt;
use uuid::Uuid;

// --- Fixed identities ---

pub const USER_ID: Uuid = Uuid::from_u128(123);
pub const ADMIN_ID: Uuid = Uuid::from_u128(456);
pub const USER_TOKEN: &str = "user-token";
pub const ADMIN_TOKEN: &str = "admin-token";
pub const USER_EMAIL: &str = "student@example.com";
pub const ADMIN_EMAIL: &str = "admin@example.com";

pub fn identity(id: Uuid, email: &str) -> Identity {
    Identity {
        id,
        email: Some(email.to_string()),
        metadata: serde_json::json!({ "full_name": "Test Person" }),
        // The guard overwrites this from the profile row.
        role: Role::User,
    }
}

pub fn profile(id: Uuid, email: &str, role: Role) -> Profile {
    Profile {
        id,
        email: email.to_string(),
        full_name: Some("Test Person".to_string()),
        role,
        ..Profile::default()
    }
}

pub fn institution(owner_id: Uuid, name: &str) -> Institution {
    Institution {
        id: Uuid::new_v4(),
        name: name.to_string(),
        owner_id,
        created_at: Utc::now(),
        ..Institution::default()
    }
}

pub fn event(institution_id: Uuid, title: &str) -> Event {
    Event {
        id: Uuid::new_v4(),
        institution_id,
        title: title.to_string(),
        starts_at: Utc::now(),
        created_at: Utc::now(),
        ..Event::default()
    }
}

/// Auth backend knowing one regular user and one admin.
pub fn default_auth() -> MockAuthService {
    MockAuthService::new()
        .with_session(USER_TOKEN, identity(USER_ID, USER_EMAIL))
        .with_session(ADMIN_TOKEN, identity(ADMIN_ID, ADMIN_EMAIL))
}

/// Repository with profiles for both known identities.
pub fn default_repo() -> InMemoryRepository {
    InMemoryRepository::default()
        .with_profile(profile(USER_ID, USER_EMAIL, Role::User))
        .with_profile(profile(ADMIN_ID, ADMIN_EMAIL, Role::Admin))
}

// --- In-memory repository ---

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Failure {
    #[default]
    None,
    // Only profile reads fail.
    Profiles,
    // Every call fails.
    All,
}

#[derive(Default)]
pub struct InMemoryRepository {
    pub failure: Failure,
    pub profiles: Mutex<Vec<Profile>>,
    pub categories: Mutex<Vec<Category>>,
    pub institutions: Mutex<Vec<Institution>>,
    pub follows: Mutex<Vec<(Uuid, Uuid)>>,
    pub requests: Mutex<Vec<RegistrationRequest>>,
    pub events: Mutex<Vec<Event>>,
    pub details: Mutex<Vec<EventDetails>>,
    pub tickets: Mutex<Vec<Ticket>>,
}

impl InMemoryRepository {
    pub fn failing(failure: Failure) -> Self {
        Self {
            failure,
            ..Self::default()
        }
    }

    pub fn with_profile(self, profile: Profile) -> Self {
        self.profiles.lock().unwrap().push(profile);
        self
    }

    pub fn with_institution(self, institution: Institution) -> Self {
        self.institutions.lock().unwrap().push(institution);
        self
    }

    pub fn with_event(self, event: Event) -> Self {
        self.events.lock().unwrap().push(event);
        self
    }

    pub fn with_request(self, request: RegistrationRequest) -> Self {
        self.requests.lock().unwrap().push(request);
        self
    }

    pub fn with_category(self, category: Category) -> Self {
        self.categories.lock().unwrap().push(category);
        self
    }

    fn check(&self) -> RepoResult<()> {
        match self.failure {
            Failure::All => Err(sqlx::Error::PoolTimedOut),
            _ => Ok(()),
        }
    }

    fn check_profiles(&self) -> RepoResult<()> {
        match self.failure {
            Failure::None => Ok(()),
            _ => Err(sqlx::Error::PoolTimedOut),
        }
    }
}

#[async_trait]
impl Repository for InMemoryRepository {
    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<Profile>> {
        self.check_profiles()?;
        Ok(self.profiles.lock().unwrap().iter().find(|p| p.id == id).cloned())
    }

    async fn save_profile(
        &self,
        id: Uuid,
        email: &str,
        input: ProfileInput,
    ) -> RepoResult<Profile> {
        self.check_profiles()?;
        let mut profiles = self.profiles.lock().unwrap();
        if let Some(existing) = profiles.iter_mut().find(|p| p.id == id) {
            existing.email = email.to_string();
            if input.full_name.is_some() {
                existing.full_name = input.full_name;
            }
            if let Some(address) = input.address {
                existing.address = Some(Json(address));
            }
            return Ok(existing.clone());
        }
        let created = Profile {
            id,
            email: email.to_string(),
            full_name: input.full_name,
            role: Role::User,
            avatar: None,
            address: input.address.map(Json),
        };
        profiles.push(created.clone());
        Ok(created)
    }

    async fn set_avatar(&self, id: Uuid, key: &str) -> RepoResult<Option<Profile>> {
        self.check_profiles()?;
        let mut profiles = self.profiles.lock().unwrap();
        Ok(profiles.iter_mut().find(|p| p.id == id).map(|p| {
            p.avatar = Some(key.to_string());
            p.clone()
        }))
    }

    async fn list_profiles(&self) -> RepoResult<Vec<Profile>> {
        self.check_profiles()?;
        Ok(self.profiles.lock().unwrap().clone())
    }

    async fn set_role(&self, id: Uuid, role: Role) -> RepoResult<Option<Profile>> {
        self.check_profiles()?;
        let mut profiles = self.profiles.lock().unwrap();
        Ok(profiles.iter_mut().find(|p| p.id == id).map(|p| {
            p.role = role;
            p.clone()
        }))
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        self.check()?;
        Ok(self.categories.lock().unwrap().clone())
    }

    async fn create_category(&self, input: CategoryInput) -> RepoResult<Category> {
        self.check()?;
        let category = Category {
            id: Uuid::new_v4(),
            name: input.name,
            description: input.description,
            icon: input.icon,
            created_at: Utc::now(),
        };
        self.categories.lock().unwrap().push(category.clone());
        Ok(category)
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut categories = self.categories.lock().unwrap();
        let before = categories.len();
        categories.retain(|c| c.id != id);
        Ok(categories.len() < before)
    }

    async fn list_institutions(&self) -> RepoResult<Vec<Institution>> {
        self.check()?;
        Ok(self.institutions.lock().unwrap().clone())
    }

    async fn get_institution(&self, id: Uuid) -> RepoResult<Option<Institution>> {
        self.check()?;
        Ok(self
            .institutions
            .lock()
            .unwrap()
            .iter()
            .find(|i| i.id == id)
            .cloned())
    }

    async fn followed_institutions(&self, user_id: Uuid) -> RepoResult<Vec<Institution>> {
        self.check()?;
        let follows = self.follows.lock().unwrap();
        Ok(self
            .institutions
            .lock()
            .unwrap()
            .iter()
            .filter(|i| follows.contains(&(user_id, i.id)))
            .cloned()
            .collect())
    }

    async fn is_following(&self, user_id: Uuid, institution_id: Uuid) -> RepoResult<bool> {
        self.check()?;
        Ok(self
            .follows
            .lock()
            .unwrap()
            .contains(&(user_id, institution_id)))
    }

    async fn follow(&self, user_id: Uuid, institution_id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut follows = self.follows.lock().unwrap();
        if follows.contains(&(user_id, institution_id)) {
            return Ok(false);
        }
        follows.push((user_id, institution_id));
        Ok(true)
    }

    async fn unfollow(&self, user_id: Uuid, institution_id: Uuid) -> RepoResult<bool> {
        self.check()?;
        let mut follows = self.follows.lock().unwrap();
        let before = follows.len();
        follows.retain(|f| *f != (user_id, institution_id));
        Ok(follows.len() < before)
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> RepoResult<Vec<RegistrationRequest>> {
        self.check()?;
        Ok(self
            .requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| status.is_none_or(|s| r.status == s))
            .cloned()
            .collect())
    }

    async fn create_request(
        &self,
        user_id: Uuid,
        input: InstitutionRequestInput,
    ) -> RepoResult<RegistrationRequest> {
        self.check()?;
        let request = RegistrationRequest {
            id: Uuid::new_v4(),
            user_id,
            institution_name: input.institution_name,
            contact_email: input.contact_email,
            contact_phone: input.contact_phone,
            address: input.address,
            status: RequestStatus::Pending,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        self.requests.lock().unwrap().push(request.clone());
        Ok(request)
    }

    async fn set_request_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> RepoResult<Option<RegistrationRequest>> {
        self.check()?;
        let mut requests = self.requests.lock().unwrap();
        Ok(requests.iter_mut().find(|r| r.id == id).map(|r| {
            r.status = status;
            r.updated_at = Utc::now();
            r.clone()
        }))
    }

    async fn list_events(
        &self,
        category: Option<Uuid>,
        search: Option<String>,
    ) -> RepoResult<Vec<Event>> {
        self.check()?;
        let search = search.map(|s| s.to_lowercase());
        Ok(self
            .events
            .lock()
            .unwrap()
            .iter()
            .filter(|e| category.is_none() || e.category_id == category)
            .filter(|e| {
                search
                    .as_deref()
                    .is_none_or(|s| e.title.to_lowercase().contains(s))
            })
            .cloned()
            .collect())
    }

    async fn get_event(&self, id: Uuid) -> RepoResult<Option<Event>> {
        self.check()?;
        Ok(self.events.lock().unwrap().iter().find(|e| e.id == id).cloned())
    }

    async fn get_event_details(&self, id: Uuid) -> RepoResult<Option<EventDetails>> {
        let Some(event) = self.get_event(id).await? else {
            return Ok(None);
        };
        let stored = self
            .details
            .lock()
            .unwrap()
            .iter()
            .find(|d| d.event.id == id)
            .cloned();
        Ok(Some(match stored {
            Some(details) => EventDetails { event, ..details },
            None => EventDetails {
                event,
                ..EventDetails::default()
            },
        }))
    }

    async fn create_event(&self, institution_id: Uuid, input: EventInput) -> RepoResult<Event> {
        self.check()?;
        let event = Event {
            id: Uuid::new_v4(),
            institution_id,
            category_id: input.category_id,
            title: input.title,
            summary: input.summary,
            venue: input.venue,
            banner: input.banner,
            starts_at: input.starts_at,
            ends_at: input.ends_at,
            created_at: Utc::now(),
        };
        self.events.lock().unwrap().push(event.clone());
        if let Some(details) = input.details {
            self.details.lock().unwrap().push(EventDetails {
                event: event.clone(),
                description: details.description,
                social_links: details.social_links,
                sponsors: details.sponsors,
                faqs: details.faqs,
                ..EventDetails::default()
            });
        }
        Ok(event)
    }

    async fn update_event(&self, id: Uuid, input: EventInput) -> RepoResult<Option<Event>> {
        self.check()?;
        let mut events = self.events.lock().unwrap();
        Ok(events.iter_mut().find(|e| e.id == id).map(|e| {
            e.category_id = input.category_id;
            e.title = input.title;
            e.summary = input.summary;
            e.venue = input.venue;
            e.banner = input.banner;
            e.starts_at = input.starts_at;
            e.ends_at = input.ends_at;
            e.clone()
        }))
    }

    async fn create_ticket(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Ticket>> {
        self.check()?;
        let mut tickets = self.tickets.lock().unwrap();
        if tickets
            .iter()
            .any(|t| t.event_id == event_id && t.user_id == user_id)
        {
            return Ok(None);
        }
        let ticket = Ticket {
            id: Uuid::new_v4(),
            event_id,
            user_id,
            event_title: None,
            starts_at: None,
            created_at: Utc::now(),
        };
        tickets.push(ticket.clone());
        Ok(Some(ticket))
    }

    async fn list_tickets(&self, user_id: Uuid) -> RepoResult<Vec<Ticket>> {
        self.check()?;
        Ok(self
            .tickets
            .lock()
            .unwrap()
            .iter()
            .filter(|t| t.user_id == user_id)
            .cloned()
            .collect())
    }
}

// --- Router harness ---

pub struct TestApp {
    pub router: Router,
    pub auth: Arc<MockAuthService>,
    pub repo: Arc<InMemoryRepository>,
    pub storage: Arc<MockStorageService>,
}

impl TestApp {
    pub fn new(auth: MockAuthService, repo: InMemoryRepository) -> Self {
        Self::with_storage(auth, repo, MockStorageService::new())
    }

    pub fn with_storage(
        auth: MockAuthService,
        repo: InMemoryRepository,
        storage: MockStorageService,
    ) -> Self {
        let auth = Arc::new(auth);
        let repo = Arc::new(repo);
        let storage = Arc::new(storage);
        let router = create_router(AppState {
            auth: auth.clone(),
            repo: repo.clone(),
            storage: storage.clone(),
            config: AppConfig::default(),
        });
        Self {
            router,
            auth,
            repo,
            storage,
        }
    }

    pub fn default_app() -> Self {
        Self::new(default_auth(), default_repo())
    }

    pub async fn send(&self, request: Request<Body>) -> Response<Body> {
        self.router.clone().oneshot(request).await.unwrap()
    }
}

/// Request carrying the session token in the cookie, the way a browser sends it.
pub fn request(method: Method, uri: &str, token: Option<&str>, body: Option<Value>) -> Request<Body> {
    let mut builder = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        builder = builder.header(header::COOKIE, format!("{}={}", ACCESS_TOKEN_COOKIE, token));
    }
    match body {
        Some(json) => builder
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(json.to_string()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

pub fn get(uri: &str, token: Option<&str>) -> Request<Body> {
    request(Method::GET, uri, token, None)
}

pub async fn read_json(response: Response<Body>) -> Value {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&bytes).unwrap()
}

pub fn location(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::LOCATION)
        .and_then(|v| v.to_str().ok())
}

pub fn set_cookie(response: &Response<Body>) -> Option<&str> {
    response
        .headers()
        .get(header::SET_COOKIE)
        .and_then(|v| v.to_str().ok())
}
