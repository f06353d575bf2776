use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, types::Json};
use thiserror::Error;
use ts_rs::TS;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::auth::Identity;

// --- Enumerations (stored as text columns) ---

#[derive(Debug, Error)]
#[error("unknown {kind} value '{value}'")]
pub struct UnknownVariant {
    kind: &'static str,
    value: String,
}

/// Role
///
/// Platform role stored on `public.profiles.role`. Identities without a profile row are
/// treated as `User`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "snake_case")]
#[ts(export)]
pub enum Role {
    #[default]
    User,
    InstitutionAdmin,
    Admin,
}

impl Role {
    pub const ALL: [&'static str; 3] = ["user", "institution_admin", "admin"];

    pub fn as_str(self) -> &'static str {
        match self {
            Role::User => "user",
            Role::InstitutionAdmin => "institution_admin",
            Role::Admin => "admin",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "user" => Some(Role::User),
            "institution_admin" => Some(Role::InstitutionAdmin),
            "admin" => Some(Role::Admin),
            _ => None,
        }
    }
}

impl TryFrom<String> for Role {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Role::parse(&value).ok_or(UnknownVariant { kind: "role", value })
    }
}

/// RequestStatus
///
/// Status of an institution registration request. The backend owns the transition rules; this
/// service only displays the value and records an admin's decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS, ToSchema)]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum RequestStatus {
    #[default]
    Pending,
    Approved,
    Rejected,
}

impl RequestStatus {
    /// Values an admin may record.
    pub const DECISIONS: [&'static str; 2] = ["approved", "rejected"];

    pub fn as_str(self) -> &'static str {
        match self {
            RequestStatus::Pending => "pending",
            RequestStatus::Approved => "approved",
            RequestStatus::Rejected => "rejected",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "pending" => Some(RequestStatus::Pending),
            "approved" => Some(RequestStatus::Approved),
            "rejected" => Some(RequestStatus::Rejected),
            _ => None,
        }
    }
}

impl TryFrom<String> for RequestStatus {
    type Error = UnknownVariant;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        RequestStatus::parse(&value).ok_or(UnknownVariant {
            kind: "request status",
            value,
        })
    }
}

// --- Backend rows ---

/// Address
///
/// Postal address kept as a JSON column on profiles and institution requests.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct Address {
    pub street: String,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    pub country: String,
}

/// Profile
///
/// Row of `public.profiles`, keyed by the auth user id.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Profile {
    pub id: Uuid,
    pub email: String,
    pub full_name: Option<String>,
    #[sqlx(try_from = "String")]
    pub role: Role,
    // Path of the uploaded avatar in the assets bucket.
    pub avatar: Option<String>,
    #[ts(type = "Address | null")]
    #[schema(value_type = Option<Address>)]
    pub address: Option<Json<Address>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Category {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    // Icon name from the frontend icon set, not a file.
    pub icon: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Institution {
    pub id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub logo: Option<String>,
    // Profile allowed to edit this institution's events.
    pub owner_id: Uuid,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// RegistrationRequest
///
/// Row of `public.institution_requests`: a user asking for their institution to be listed.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct RegistrationRequest {
    pub id: Uuid,
    // Requesting profile.
    pub user_id: Uuid,
    pub institution_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    #[sqlx(json)]
    pub address: Address,
    #[sqlx(try_from = "String")]
    pub status: RequestStatus,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Event {
    pub id: Uuid,
    pub institution_id: Uuid,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub summary: Option<String>,
    pub venue: Option<String>,
    // Storage key of the banner image; resolved to a URL on the details page.
    pub banner: Option<String>,
    #[ts(type = "string")]
    pub starts_at: DateTime<Utc>,
    #[ts(type = "string | null")]
    pub ends_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

/// Label/value pair used for social links, sponsors and FAQs.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize, TS, ToSchema)]
#[ts(export)]
pub struct KeyValue {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct EventActivity {
    pub id: Uuid,
    pub event_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    #[ts(type = "string | null")]
    pub starts_at: Option<DateTime<Utc>>,
    #[ts(type = "string | null")]
    pub ends_at: Option<DateTime<Utc>>,
}

/// Row of `public.event_details`. The three collections are JSONB arrays defaulting to `[]`.
#[derive(Debug, Clone, FromRow, Default)]
pub struct EventDetailsRow {
    pub event_id: Uuid,
    pub description: Option<String>,
    #[sqlx(json)]
    pub social_links: Vec<KeyValue>,
    #[sqlx(json)]
    pub sponsors: Vec<KeyValue>,
    #[sqlx(json)]
    pub faqs: Vec<KeyValue>,
}

/// EventDetails
///
/// An event with its optional detail collections and activities, as shown on `/events/{id}`.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct EventDetails {
    pub event: Event,
    pub description: Option<String>,
    pub social_links: Vec<KeyValue>,
    pub sponsors: Vec<KeyValue>,
    pub faqs: Vec<KeyValue>,
    pub activities: Vec<EventActivity>,
    // Public URL of the banner, when one was uploaded.
    pub banner_url: Option<String>,
}

/// Ticket
///
/// One user's registration for one event, joined with the event title and start time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Ticket {
    pub id: Uuid,
    pub event_id: Uuid,
    pub user_id: Uuid,
    #[sqlx(default)]
    pub event_title: Option<String>,
    #[sqlx(default)]
    #[ts(type = "string | null")]
    pub starts_at: Option<DateTime<Utc>>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
}

// --- Request/response payloads ---

/// PresignedUrlRequest
///
/// Input for POST /upload/presigned. The extension of `filename` becomes the object key's.
#[derive(Debug, Clone, Deserialize, Serialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlRequest {
    #[schema(example = "banner.png")]
    pub filename: String,
    #[schema(example = "image/png")]
    pub file_type: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct PresignedUrlResponse {
    pub upload_url: String,
    // Key to submit back with the form that references the file.
    pub resource_key: String,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct FollowState {
    pub institution_id: Uuid,
    pub following: bool,
}

// --- Page models ---

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct LoginPage {
    pub title: String,
    pub signup_path: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignUpPage {
    pub title: String,
    pub login_path: String,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SignUpResult {
    pub id: Uuid,
    // False when the backend wants the address confirmed before first sign-in.
    pub signed_in: bool,
}

/// DashboardPage
///
/// Landing page after sign-in. `pending_requests` is only filled for admins.
#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct DashboardPage {
    pub identity: Identity,
    pub profile: Option<Profile>,
    pub tickets: Vec<Ticket>,
    pub following: Vec<Institution>,
    pub pending_requests: Option<usize>,
}

#[derive(Debug, Clone, Serialize, ToSchema)]
pub struct SettingsPage {
    pub profile: Option<Profile>,
    pub avatar_url: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, ToSchema, TS, Default)]
#[ts(export)]
pub struct Organization {
    pub institution: Institution,
    pub following: bool,
    pub logo_url: Option<String>,
}
