//! Submitted form shapes.
//!
//! Each input implements `Schema`; handlers receive them through the `Valid<T>` extractor so a
//! write is never attempted with malformed data.

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use utoipa::ToSchema;
use uuid::Uuid;

use crate::{
    models::{Address, KeyValue, PresignedUrlRequest, RequestStatus, Role},
    validation::{Fields, Schema, ValidationErrors},
};

/// CategoryInput
///
/// Admin category form. Only the name is required.
#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
pub struct CategoryInput {
    pub name: String,
    pub description: Option<String>,
    pub icon: Option<String>,
}

impl Schema for CategoryInput {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let name = f.required_text("name", 2, 80);
        let description = f.optional_text("description", 0, 500);
        let icon = f.optional_text("icon", 0, 64);
        f.finish()?;
        Ok(Self {
            name,
            description,
            icon,
        })
    }
}

impl Schema for Address {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let street = f.required_text("street", 2, 120);
        let city = f.required_text("city", 2, 80);
        let region = f.optional_text("region", 0, 80);
        let postal_code = f.required_text("postal_code", 2, 16);
        let country = f.required_text("country", 2, 56);
        f.finish()?;
        Ok(Self {
            street,
            city,
            region,
            postal_code,
            country,
        })
    }
}

impl Schema for KeyValue {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let key = f.required_text("key", 1, 120);
        let value = f.required_text("value", 1, 2000);
        f.finish()?;
        Ok(Self { key, value })
    }
}

/// FollowInput
///
/// Follow toggle on the organizations page.
#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
pub struct FollowInput {
    pub institution_id: Uuid,
}

impl Schema for FollowInput {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let institution_id = f.uuid("institution_id");
        f.finish()?;
        Ok(Self { institution_id })
    }
}

/// InstitutionRequestInput
///
/// A user asking for their institution to be listed on the platform.
#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
pub struct InstitutionRequestInput {
    pub institution_name: String,
    pub contact_email: String,
    pub contact_phone: Option<String>,
    pub address: Address,
}

impl Schema for InstitutionRequestInput {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let institution_name = f.required_text("institution_name", 2, 120);
        let contact_email = f.required_text("contact_email", 3, 254);
        let contact_phone = f.optional_text("contact_phone", 0, 32);
        let address = f.nested::<Address>("address");
        f.finish()?;
        Ok(Self {
            institution_name,
            contact_email,
            contact_phone,
            address,
        })
    }
}

/// EventInput
///
/// Create/edit form for an event. `institution_id` is only read on creation; the details block
/// is optional and replaces the stored one when present.
#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
pub struct EventInput {
    pub institution_id: Option<Uuid>,
    pub category_id: Option<Uuid>,
    pub title: String,
    pub summary: Option<String>,
    pub venue: Option<String>,
    pub banner: Option<String>,
    pub starts_at: DateTime<Utc>,
    pub ends_at: Option<DateTime<Utc>>,
    pub details: Option<EventDetailsInput>,
}

impl Schema for EventInput {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let institution_id = f.optional_uuid("institution_id");
        let category_id = f.optional_uuid("category_id");
        let title = f.required_text("title", 2, 120);
        let summary = f.optional_text("summary", 0, 280);
        let venue = f.optional_text("venue", 0, 120);
        let banner = f.optional_text("banner", 0, 255);
        let starts_at = f.timestamp("starts_at");
        let ends_at = f.optional_timestamp("ends_at");
        let details = f.optional_nested::<EventDetailsInput>("details");
        f.finish()?;
        Ok(Self {
            institution_id,
            category_id,
            title,
            summary,
            venue,
            banner,
            starts_at,
            ends_at,
            details,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
pub struct EventDetailsInput {
    pub description: Option<String>,
    pub social_links: Vec<KeyValue>,
    pub sponsors: Vec<KeyValue>,
    pub faqs: Vec<KeyValue>,
}

impl Schema for EventDetailsInput {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let description = f.optional_text("description", 0, 5000);
        let social_links = f.list::<KeyValue>("social_links");
        let sponsors = f.list::<KeyValue>("sponsors");
        let faqs = f.list::<KeyValue>("faqs");
        f.finish()?;
        Ok(Self {
            description,
            social_links,
            sponsors,
            faqs,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
pub struct RoleUpdateInput {
    pub role: Role,
}

impl Schema for RoleUpdateInput {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let role = f.one_of("role", &Role::ALL);
        f.finish()?;
        Ok(Self {
            role: Role::parse(role).unwrap_or_default(),
        })
    }
}

/// RequestDecisionInput
///
/// Admin decision on an institution request. Only final states can be recorded.
#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
pub struct RequestDecisionInput {
    pub status: RequestStatus,
}

impl Schema for RequestDecisionInput {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let status = f.one_of("status", &RequestStatus::DECISIONS);
        f.finish()?;
        Ok(Self {
            status: RequestStatus::parse(status).unwrap_or_default(),
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, Serialize, ToSchema)]
pub struct ProfileInput {
    pub full_name: Option<String>,
    pub address: Option<Address>,
}

impl Schema for ProfileInput {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let full_name = f.optional_text("full_name", 2, 80);
        let address = f.optional_nested::<Address>("address");
        f.finish()?;
        Ok(Self { full_name, address })
    }
}

#[derive(Debug, Clone, PartialEq, Default, ToSchema)]
pub struct SignUpInput {
    pub email: String,
    pub password: String,
    pub full_name: Option<String>,
}

impl Schema for SignUpInput {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let email = f.required_text("email", 3, 254);
        let password = f.required_secret("password", 6, 72);
        let full_name = f.optional_text("full_name", 2, 80);
        f.finish()?;
        Ok(Self {
            email,
            password,
            full_name,
        })
    }
}

#[derive(Debug, Clone, PartialEq, Default, ToSchema)]
pub struct LoginInput {
    pub email: String,
    pub password: String,
}

impl Schema for LoginInput {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let email = f.required_text("email", 3, 254);
        let password = f.required_secret("password", 1, 72);
        f.finish()?;
        Ok(Self { email, password })
    }
}

/// MIME types accepted for direct uploads (banners, logos, event documents).
pub const UPLOAD_TYPES: [&str; 5] = [
    "image/png",
    "image/jpeg",
    "image/webp",
    "image/gif",
    "application/pdf",
];

impl Schema for PresignedUrlRequest {
    fn parse(input: &Value) -> Result<Self, ValidationErrors> {
        let mut f = Fields::new(input)?;
        let filename = f.required_text("filename", 1, 255);
        let file_type = f.one_of("file_type", &UPLOAD_TYPES);
        f.finish()?;
        Ok(Self {
            filename,
            file_type: file_type.to_string(),
        })
    }
}
