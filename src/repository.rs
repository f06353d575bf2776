use crate::{
    forms::{CategoryInput, EventDetailsInput, EventInput, InstitutionRequestInput, ProfileInput},
    models::{
        Category, Event, EventActivity, EventDetails, EventDetailsRow, Institution, Profile,
        RegistrationRequest, RequestStatus, Role, Ticket,
    },
};
use async_trait::async_trait;
use sqlx::{PgPool, Postgres, QueryBuilder, types::Json};
use std::sync::Arc;
use uuid::Uuid;

pub type RepoResult<T> = Result<T, sqlx::Error>;

/// Repository Trait
///
/// Every table read and write the pages make against the hosted backend database. Handlers only
/// see this trait, so tests swap in an in-memory implementation.
///
/// Reads of a single row return `Ok(None)` when the row does not exist; only a failed backend
/// call is an `Err`.
#[async_trait]
pub trait Repository: Send + Sync {
    // --- Profiles & roles ---
    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<Profile>>;
    // Creates the profile on first save.
    async fn save_profile(&self, id: Uuid, email: &str, input: ProfileInput)
    -> RepoResult<Profile>;
    async fn set_avatar(&self, id: Uuid, key: &str) -> RepoResult<Option<Profile>>;
    async fn list_profiles(&self) -> RepoResult<Vec<Profile>>;
    async fn set_role(&self, id: Uuid, role: Role) -> RepoResult<Option<Profile>>;

    // --- Categories ---
    async fn list_categories(&self) -> RepoResult<Vec<Category>>;
    async fn create_category(&self, input: CategoryInput) -> RepoResult<Category>;
    async fn delete_category(&self, id: Uuid) -> RepoResult<bool>;

    // --- Institutions & follows ---
    async fn list_institutions(&self) -> RepoResult<Vec<Institution>>;
    async fn get_institution(&self, id: Uuid) -> RepoResult<Option<Institution>>;
    async fn followed_institutions(&self, user_id: Uuid) -> RepoResult<Vec<Institution>>;
    async fn is_following(&self, user_id: Uuid, institution_id: Uuid) -> RepoResult<bool>;
    // Both return true when a row was actually inserted/removed.
    async fn follow(&self, user_id: Uuid, institution_id: Uuid) -> RepoResult<bool>;
    async fn unfollow(&self, user_id: Uuid, institution_id: Uuid) -> RepoResult<bool>;

    // --- Institution registration requests ---
    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> RepoResult<Vec<RegistrationRequest>>;
    async fn create_request(
        &self,
        user_id: Uuid,
        input: InstitutionRequestInput,
    ) -> RepoResult<RegistrationRequest>;
    async fn set_request_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> RepoResult<Option<RegistrationRequest>>;

    // --- Events ---
    async fn list_events(
        &self,
        category: Option<Uuid>,
        search: Option<String>,
    ) -> RepoResult<Vec<Event>>;
    async fn get_event(&self, id: Uuid) -> RepoResult<Option<Event>>;
    async fn get_event_details(&self, id: Uuid) -> RepoResult<Option<EventDetails>>;
    async fn create_event(&self, institution_id: Uuid, input: EventInput) -> RepoResult<Event>;
    async fn update_event(&self, id: Uuid, input: EventInput) -> RepoResult<Option<Event>>;

    // --- Tickets ---
    // `None` when the user already holds a ticket for the event.
    async fn create_ticket(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Ticket>>;
    async fn list_tickets(&self, user_id: Uuid) -> RepoResult<Vec<Ticket>>;
}

/// RepositoryState
///
/// Shared handle to the persistence layer held in `AppState`.
pub type RepositoryState = Arc<dyn Repository>;

const PROFILE_COLUMNS: &str = "id, email, full_name, role, avatar, address";
const EVENT_COLUMNS: &str =
    "id, institution_id, category_id, title, summary, venue, banner, starts_at, ends_at, created_at";
const REQUEST_COLUMNS: &str = "id, user_id, institution_name, contact_email, contact_phone, \
     address, status, created_at, updated_at";

/// contains_pattern
///
/// `ILIKE` pattern matching `text` anywhere, with `\\`, `%` and `_` escaped so user input only
/// ever matches literally. Pair with `ESCAPE '\\'`.
pub fn contains_pattern(text: &str) -> String {
    let mut pattern = String::with_capacity(text.len() + 2);
    pattern.push('%');
    for c in text.chars() {
        if matches!(c, '\\' | '%' | '_') {
            pattern.push('\\');
        }
        pattern.push(c);
    }
    pattern.push('%');
    pattern
}

/// PostgresRepository
///
/// `Repository` backed by the hosted Postgres database.
pub struct PostgresRepository {
    pool: PgPool,
}

impl PostgresRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Replaces the detail row of an event inside an open transaction.
    async fn write_details(
        tx: &mut sqlx::Transaction<'_, Postgres>,
        event_id: Uuid,
        details: &EventDetailsInput,
    ) -> RepoResult<()> {
        sqlx::query(
            r#"
            INSERT INTO event_details (event_id, description, social_links, sponsors, faqs)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (event_id) DO UPDATE SET
                description = EXCLUDED.description,
                social_links = EXCLUDED.social_links,
                sponsors = EXCLUDED.sponsors,
                faqs = EXCLUDED.faqs
            "#,
        )
        .bind(event_id)
        .bind(details.description.as_deref())
        .bind(Json(&details.social_links))
        .bind(Json(&details.sponsors))
        .bind(Json(&details.faqs))
        .execute(&mut **tx)
        .await?;
        Ok(())
    }
}

#[async_trait]
impl Repository for PostgresRepository {
    async fn get_profile(&self, id: Uuid) -> RepoResult<Option<Profile>> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {} FROM profiles WHERE id = $1",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    /// save_profile
    ///
    /// Upsert keyed on the auth user id. Fields left out of the form keep their stored value.
    async fn save_profile(
        &self,
        id: Uuid,
        email: &str,
        input: ProfileInput,
    ) -> RepoResult<Profile> {
        sqlx::query_as::<_, Profile>(&format!(
            r#"
            INSERT INTO profiles (id, email, full_name, address, role)
            VALUES ($1, $2, $3, $4, 'user')
            ON CONFLICT (id) DO UPDATE SET
                email = EXCLUDED.email,
                full_name = COALESCE(EXCLUDED.full_name, profiles.full_name),
                address = COALESCE(EXCLUDED.address, profiles.address)
            RETURNING {}
            "#,
            PROFILE_COLUMNS
        ))
        .bind(id)
        .bind(email)
        .bind(input.full_name)
        .bind(input.address.map(Json))
        .fetch_one(&self.pool)
        .await
    }

    async fn set_avatar(&self, id: Uuid, key: &str) -> RepoResult<Option<Profile>> {
        sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles SET avatar = $2 WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .bind(key)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_profiles(&self) -> RepoResult<Vec<Profile>> {
        sqlx::query_as::<_, Profile>(&format!(
            "SELECT {} FROM profiles ORDER BY email ASC",
            PROFILE_COLUMNS
        ))
        .fetch_all(&self.pool)
        .await
    }

    async fn set_role(&self, id: Uuid, role: Role) -> RepoResult<Option<Profile>> {
        sqlx::query_as::<_, Profile>(&format!(
            "UPDATE profiles SET role = $2 WHERE id = $1 RETURNING {}",
            PROFILE_COLUMNS
        ))
        .bind(id)
        .bind(role.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_categories(&self) -> RepoResult<Vec<Category>> {
        sqlx::query_as::<_, Category>(
            "SELECT id, name, description, icon, created_at FROM categories ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn create_category(&self, input: CategoryInput) -> RepoResult<Category> {
        sqlx::query_as::<_, Category>(
            r#"
            INSERT INTO categories (name, description, icon)
            VALUES ($1, $2, $3)
            RETURNING id, name, description, icon, created_at
            "#,
        )
        .bind(input.name)
        .bind(input.description)
        .bind(input.icon)
        .fetch_one(&self.pool)
        .await
    }

    async fn delete_category(&self, id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM categories WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_institutions(&self) -> RepoResult<Vec<Institution>> {
        sqlx::query_as::<_, Institution>(
            "SELECT id, name, description, logo, owner_id, created_at FROM institutions ORDER BY name ASC",
        )
        .fetch_all(&self.pool)
        .await
    }

    async fn get_institution(&self, id: Uuid) -> RepoResult<Option<Institution>> {
        sqlx::query_as::<_, Institution>(
            "SELECT id, name, description, logo, owner_id, created_at FROM institutions WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn followed_institutions(&self, user_id: Uuid) -> RepoResult<Vec<Institution>> {
        sqlx::query_as::<_, Institution>(
            r#"
            SELECT i.id, i.name, i.description, i.logo, i.owner_id, i.created_at
            FROM institutions i
            JOIN follows f ON f.institution_id = i.id
            WHERE f.user_id = $1
            ORDER BY i.name ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }

    async fn is_following(&self, user_id: Uuid, institution_id: Uuid) -> RepoResult<bool> {
        sqlx::query_scalar::<_, bool>(
            "SELECT EXISTS (SELECT 1 FROM follows WHERE user_id = $1 AND institution_id = $2)",
        )
        .bind(user_id)
        .bind(institution_id)
        .fetch_one(&self.pool)
        .await
    }

    /// follow
    ///
    /// The composite primary key on `follows` makes a repeated follow a no-op.
    async fn follow(&self, user_id: Uuid, institution_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query(
            "INSERT INTO follows (user_id, institution_id) VALUES ($1, $2) ON CONFLICT DO NOTHING",
        )
        .bind(user_id)
        .bind(institution_id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn unfollow(&self, user_id: Uuid, institution_id: Uuid) -> RepoResult<bool> {
        let result = sqlx::query("DELETE FROM follows WHERE user_id = $1 AND institution_id = $2")
            .bind(user_id)
            .bind(institution_id)
            .execute(&self.pool)
            .await?;
        Ok(result.rows_affected() > 0)
    }

    async fn list_requests(
        &self,
        status: Option<RequestStatus>,
    ) -> RepoResult<Vec<RegistrationRequest>> {
        sqlx::query_as::<_, RegistrationRequest>(&format!(
            r#"
            SELECT {} FROM institution_requests
            WHERE ($1::text IS NULL OR status = $1)
            ORDER BY created_at DESC
            "#,
            REQUEST_COLUMNS
        ))
        .bind(status.map(RequestStatus::as_str))
        .fetch_all(&self.pool)
        .await
    }

    async fn create_request(
        &self,
        user_id: Uuid,
        input: InstitutionRequestInput,
    ) -> RepoResult<RegistrationRequest> {
        sqlx::query_as::<_, RegistrationRequest>(&format!(
            r#"
            INSERT INTO institution_requests
                (user_id, institution_name, contact_email, contact_phone, address, status)
            VALUES ($1, $2, $3, $4, $5, 'pending')
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(user_id)
        .bind(input.institution_name)
        .bind(input.contact_email)
        .bind(input.contact_phone)
        .bind(Json(input.address))
        .fetch_one(&self.pool)
        .await
    }

    /// set_request_status
    ///
    /// Writes the decision as given. Whether the transition is allowed is enforced by the
    /// backend's own policies, not here.
    async fn set_request_status(
        &self,
        id: Uuid,
        status: RequestStatus,
    ) -> RepoResult<Option<RegistrationRequest>> {
        sqlx::query_as::<_, RegistrationRequest>(&format!(
            r#"
            UPDATE institution_requests SET status = $2, updated_at = now()
            WHERE id = $1
            RETURNING {}
            "#,
            REQUEST_COLUMNS
        ))
        .bind(id)
        .bind(status.as_str())
        .fetch_optional(&self.pool)
        .await
    }

    /// list_events
    ///
    /// Public listing with optional category and free-text filters, built with QueryBuilder so
    /// every user value is a bound parameter.
    async fn list_events(
        &self,
        category: Option<Uuid>,
        search: Option<String>,
    ) -> RepoResult<Vec<Event>> {
        let mut builder: QueryBuilder<Postgres> =
            QueryBuilder::new(format!("SELECT {} FROM events WHERE true", EVENT_COLUMNS));

        if let Some(category) = category {
            builder.push(" AND category_id = ");
            builder.push_bind(category);
        }

        if let Some(search) = search.filter(|s| !s.trim().is_empty()) {
            let pattern = contains_pattern(search.trim());
            builder.push(" AND (title ILIKE ");
            builder.push_bind(pattern.clone());
            builder.push(" ESCAPE '\\' OR summary ILIKE ");
            builder.push_bind(pattern);
            builder.push(" ESCAPE '\\')");
        }

        builder.push(" ORDER BY starts_at ASC");

        builder
            .build_query_as::<Event>()
            .fetch_all(&self.pool)
            .await
    }

    async fn get_event(&self, id: Uuid) -> RepoResult<Option<Event>> {
        sqlx::query_as::<_, Event>(&format!("SELECT {} FROM events WHERE id = $1", EVENT_COLUMNS))
            .bind(id)
            .fetch_optional(&self.pool)
            .await
    }

    /// get_event_details
    ///
    /// The event row plus its detail row and activities. An unknown id is `Ok(None)`; an event
    /// without a detail row gets empty collections.
    async fn get_event_details(&self, id: Uuid) -> RepoResult<Option<EventDetails>> {
        let Some(event) = self.get_event(id).await? else {
            return Ok(None);
        };

        let details = sqlx::query_as::<_, EventDetailsRow>(
            r#"
            SELECT event_id, description,
                   COALESCE(social_links, '[]'::jsonb) AS social_links,
                   COALESCE(sponsors, '[]'::jsonb) AS sponsors,
                   COALESCE(faqs, '[]'::jsonb) AS faqs
            FROM event_details WHERE event_id = $1
            "#,
        )
        .bind(id)
        .fetch_optional(&self.pool)
        .await?
        .unwrap_or_default();

        let activities = sqlx::query_as::<_, EventActivity>(
            r#"
            SELECT id, event_id, title, description, starts_at, ends_at
            FROM event_activities WHERE event_id = $1
            ORDER BY starts_at ASC NULLS LAST
            "#,
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await?;

        Ok(Some(EventDetails {
            event,
            description: details.description,
            social_links: details.social_links,
            sponsors: details.sponsors,
            faqs: details.faqs,
            activities,
            banner_url: None,
        }))
    }

    async fn create_event(&self, institution_id: Uuid, input: EventInput) -> RepoResult<Event> {
        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            INSERT INTO events
                (institution_id, category_id, title, summary, venue, banner, starts_at, ends_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(institution_id)
        .bind(input.category_id)
        .bind(&input.title)
        .bind(&input.summary)
        .bind(&input.venue)
        .bind(&input.banner)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .fetch_one(&mut *tx)
        .await?;

        if let Some(details) = &input.details {
            Self::write_details(&mut tx, event.id, details).await?;
        }

        tx.commit().await?;
        Ok(event)
    }

    /// update_event
    ///
    /// Replaces the editable columns; the owning institution never changes.
    async fn update_event(&self, id: Uuid, input: EventInput) -> RepoResult<Option<Event>> {
        let mut tx = self.pool.begin().await?;

        let event = sqlx::query_as::<_, Event>(&format!(
            r#"
            UPDATE events SET
                category_id = $2, title = $3, summary = $4, venue = $5,
                banner = $6, starts_at = $7, ends_at = $8
            WHERE id = $1
            RETURNING {}
            "#,
            EVENT_COLUMNS
        ))
        .bind(id)
        .bind(input.category_id)
        .bind(&input.title)
        .bind(&input.summary)
        .bind(&input.venue)
        .bind(&input.banner)
        .bind(input.starts_at)
        .bind(input.ends_at)
        .fetch_optional(&mut *tx)
        .await?;

        let Some(event) = event else {
            return Ok(None);
        };

        if let Some(details) = &input.details {
            Self::write_details(&mut tx, event.id, details).await?;
        }

        tx.commit().await?;
        Ok(Some(event))
    }

    /// create_ticket
    ///
    /// The unique (event_id, user_id) constraint keeps registrations to one per user.
    async fn create_ticket(&self, event_id: Uuid, user_id: Uuid) -> RepoResult<Option<Ticket>> {
        sqlx::query_as::<_, Ticket>(
            r#"
            INSERT INTO tickets (event_id, user_id)
            VALUES ($1, $2)
            ON CONFLICT (event_id, user_id) DO NOTHING
            RETURNING id, event_id, user_id, created_at
            "#,
        )
        .bind(event_id)
        .bind(user_id)
        .fetch_optional(&self.pool)
        .await
    }

    async fn list_tickets(&self, user_id: Uuid) -> RepoResult<Vec<Ticket>> {
        sqlx::query_as::<_, Ticket>(
            r#"
            SELECT t.id, t.event_id, t.user_id, t.created_at,
                   e.title AS event_title, e.starts_at
            FROM tickets t
            JOIN events e ON e.id = t.event_id
            WHERE t.user_id = $1
            ORDER BY e.starts_at ASC
            "#,
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await
    }
}
