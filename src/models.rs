use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::FromRow;
use ts_rs::TS;
use url::Url;
use utoipa::ToSchema;
use uuid::Uuid;

// --- Core Application Schemas (Mapped to Database) ---

/// UserRole
///
/// Enumerated access tier stored in the `user_role` Postgres enum.
/// Only `Admin` carries permission semantics; `FirstC`/`SecondC` are
/// undefined business tiers that are stored and round-tripped unchanged.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS, ToSchema, sqlx::Type, Default,
)]
#[ts(export)]
#[serde(rename_all = "UPPERCASE")]
#[sqlx(type_name = "user_role", rename_all = "UPPERCASE")]
pub enum UserRole {
    #[default]
    User,
    Admin,
    FirstC,
    SecondC,
}

impl UserRole {
    pub fn is_admin(&self) -> bool {
        matches!(self, UserRole::Admin)
    }
}

/// User
///
/// The public shape of a user record from the `users` table. The password
/// hash and verification flag never leave the repository layer.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct User {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    // The RBAC field consumed by every admin gate.
    pub role: UserRole,
}

/// UserCredentials
///
/// Internal row used exclusively by the login flow. Carries the Argon2 hash
/// and is therefore deliberately not serializable.
#[derive(Debug, Clone, FromRow)]
pub struct UserCredentials {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub role: UserRole,
    pub password_hash: String,
}

/// Link
///
/// Represents one bookmark record from the `links` table. `user_id` is the
/// owner foreign key and is immutable after creation; `updated_at` is bumped
/// by the database on every successful mutation.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct Link {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
}

/// AdminLink
///
/// A link enriched with the owner's name and email (a join with `users`),
/// returned only by the admin-wide listing.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, FromRow, Default)]
#[ts(export)]
pub struct AdminLink {
    pub id: Uuid,
    pub user_id: Uuid,
    pub title: String,
    pub url: String,
    pub description: Option<String>,
    #[ts(type = "string")]
    pub created_at: DateTime<Utc>,
    #[ts(type = "string")]
    pub updated_at: DateTime<Utc>,
    // Loaded via JOIN in the repository query.
    pub user_name: String,
    pub user_email: String,
}

/// --- Request Payloads (Input Schemas) ---

/// CreateLinkRequest
///
/// Input payload for POST /links. Validation happens server-side before any
/// persistence write: the title must be non-empty and the URL must parse as
/// a well-formed absolute URL.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct CreateLinkRequest {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
}

impl CreateLinkRequest {
    /// Returns a human-readable validation error, or `Ok` when the payload
    /// may be persisted.
    pub fn validate(&self) -> Result<(), String> {
        validate_link_fields(&self.title, &self.url)
    }
}

/// UpdateLinkRequest
///
/// Full-replace payload for PUT /links/{id}. An absent description clears
/// the stored one; title and url are always required and re-validated.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateLinkRequest {
    pub title: String,
    pub url: String,
    pub description: Option<String>,
}

impl UpdateLinkRequest {
    pub fn validate(&self) -> Result<(), String> {
        validate_link_fields(&self.title, &self.url)
    }
}

/// Shared field validation for link create/update.
fn validate_link_fields(title: &str, url: &str) -> Result<(), String> {
    if title.trim().is_empty() {
        return Err("Title is required".to_string());
    }
    if Url::parse(url).is_err() {
        return Err("Invalid URL format".to_string());
    }
    Ok(())
}

/// RegisterRequest
///
/// Input payload for POST /auth/register. The password is hashed with Argon2
/// before it reaches the repository and is never persisted or logged in
/// clear text.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct RegisterRequest {
    pub name: String,
    pub email: String,
    pub password: String,
}

impl RegisterRequest {
    pub fn validate(&self) -> Result<(), String> {
        if self.name.trim().is_empty() {
            return Err("Name is required".to_string());
        }
        if !self.email.contains('@') {
            return Err("Invalid email address".to_string());
        }
        if self.password.len() < 8 {
            return Err("Password must be at least 8 characters".to_string());
        }
        Ok(())
    }
}

/// LoginRequest
///
/// Input payload for POST /auth/login.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

/// LoginResponse
///
/// Output of a successful login: a signed bearer token plus the public user.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct LoginResponse {
    pub token: String,
    pub user: User,
}

/// UpdateUserRoleRequest
///
/// Admin payload for PUT /admin/users/{id}/role. The role is drawn from the
/// enumerated set; anything else is rejected at deserialization time.
#[derive(Debug, Clone, Serialize, Deserialize, TS, ToSchema, Default)]
#[ts(export)]
pub struct UpdateUserRoleRequest {
    pub role: UserRole,
}
