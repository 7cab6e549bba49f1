use crate::{
    AppState,
    auth::{self, AuthUser},
    error::ApiError,
    mailer::EmailMeta,
    models::{
        AdminLink, CreateLinkRequest, Link, LoginRequest, LoginResponse, RegisterRequest,
        UpdateLinkRequest, UpdateUserRoleRequest, User,
    },
    revalidate::CacheLookup,
};
use argon2::{
    Argon2,
    password_hash::{PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
};
use axum::{
    Json,
    extract::{Path, Query, State},
    http::StatusCode,
};
use password_hash::rand_core::OsRng;
use serde::Deserialize;
use uuid::Uuid;

// --- Query Structs ---

/// VerifyQuery
///
/// Query parameters of the email verification endpoint; carries the token
/// from the emailed link.
#[derive(Deserialize, utoipa::IntoParams)]
pub struct VerifyQuery {
    pub token: String,
}

// --- Auth Handlers ---

/// register_user
///
/// [Public Route] Creates a new account with the USER role. The password is
/// hashed with Argon2 before it reaches the repository. A verification email
/// is fired best-effort: a delivery failure is logged and never fails the
/// registration, and it is not retried.
#[utoipa::path(
    post,
    path = "/auth/register",
    request_body = RegisterRequest,
    responses(
        (status = 200, description = "Registered", body = User),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn register_user(
    State(state): State<AppState>,
    Json(payload): Json<RegisterRequest>,
) -> Result<Json<User>, ApiError> {
    payload.validate().map_err(ApiError::Validation)?;

    // Pre-check so the common duplicate case yields a clear message; the
    // unique index on email still backstops the race window.
    let existing = state
        .repo
        .find_credentials(&payload.email)
        .await
        .map_err(|e| ApiError::persistence("register user", e))?;
    if existing.is_some() {
        return Err(ApiError::Validation("Email already registered".to_string()));
    }

    let salt = SaltString::generate(&mut OsRng);
    let password_hash = Argon2::default()
        .hash_password(payload.password.as_bytes(), &salt)
        .map_err(|e| {
            tracing::error!("password hash error: {:?}", e);
            ApiError::Persistence("Failed to register user".to_string())
        })?
        .to_string();

    let user = state
        .repo
        .create_user(&payload.name, &payload.email, &password_hash)
        .await
        .map_err(|e| ApiError::persistence("register user", e))?;

    // Verification email with a tokenized link back to this service.
    match auth::issue_verification_token(user.id, &state.config.jwt_secret) {
        Ok(token) => {
            let meta = EmailMeta {
                description: "Please verify your email address to activate your account."
                    .to_string(),
                link: format!("{}/auth/verify?token={}", state.config.base_url, token),
            };
            if let Err(e) = state.mailer.send(&user.email, "Verify your email", meta).await {
                tracing::warn!("verification email failed: {:?}", e);
            }
        }
        Err(e) => tracing::warn!("verification token error: {:?}", e),
    }

    Ok(Json(user))
}

/// login
///
/// [Public Route] Verifies the Argon2 password hash and issues a signed
/// 24-hour bearer token. A wrong email and a wrong password produce the
/// same error message.
#[utoipa::path(
    post,
    path = "/auth/login",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Logged in", body = LoginResponse),
        (status = 400, description = "Invalid credentials")
    )
)]
pub async fn login(
    State(state): State<AppState>,
    Json(payload): Json<LoginRequest>,
) -> Result<Json<LoginResponse>, ApiError> {
    let invalid = || ApiError::Validation("Invalid email or password".to_string());

    let creds = state
        .repo
        .find_credentials(&payload.email)
        .await
        .map_err(|e| ApiError::persistence("log in", e))?
        .ok_or_else(invalid)?;

    let parsed = PasswordHash::new(&creds.password_hash).map_err(|e| {
        tracing::error!("stored password hash unparseable: {:?}", e);
        ApiError::Persistence("Failed to log in".to_string())
    })?;
    if Argon2::default()
        .verify_password(payload.password.as_bytes(), &parsed)
        .is_err()
    {
        return Err(invalid());
    }

    let token = auth::issue_session_token(creds.id, &state.config.jwt_secret).map_err(|e| {
        tracing::error!("token issue error: {:?}", e);
        ApiError::Persistence("Failed to log in".to_string())
    })?;

    Ok(Json(LoginResponse {
        token,
        user: User {
            id: creds.id,
            name: creds.name,
            email: creds.email,
            role: creds.role,
        },
    }))
}

/// verify_email
///
/// [Public Route] Consumes the tokenized link from the verification email
/// and flips the account's `email_verified` flag.
#[utoipa::path(
    get,
    path = "/auth/verify",
    params(VerifyQuery),
    responses(
        (status = 200, description = "Verified"),
        (status = 400, description = "Invalid or expired link")
    )
)]
pub async fn verify_email(
    State(state): State<AppState>,
    Query(query): Query<VerifyQuery>,
) -> Result<Json<serde_json::Value>, ApiError> {
    let user_id = auth::decode_verification_token(&query.token, &state.config.jwt_secret)
        .ok_or_else(|| {
            ApiError::Validation("Invalid or expired verification link".to_string())
        })?;

    let updated = state
        .repo
        .mark_email_verified(user_id)
        .await
        .map_err(|e| ApiError::persistence("verify email", e))?;
    if !updated {
        return Err(ApiError::NotFound("User not found".to_string()));
    }

    Ok(Json(serde_json::json!({ "success": true })))
}

/// get_me
///
/// [Authenticated Route] Echoes the authenticated user's profile as
/// resolved by the `AuthUser` extractor.
#[utoipa::path(
    get,
    path = "/me",
    responses((status = 200, description = "Profile", body = User))
)]
pub async fn get_me(AuthUser { id, name, email, role }: AuthUser) -> Json<User> {
    Json(User {
        id,
        name,
        email,
        role,
    })
}

// --- Link Handlers ---

/// get_my_links
///
/// [Authenticated Route] Lists all links owned by the requesting user,
/// newest first. Served from the revalidation cache when the `/links` page
/// has not been invalidated since the payload was built.
#[utoipa::path(
    get,
    path = "/links",
    responses((status = 200, description = "My Links", body = [Link]))
)]
pub async fn get_my_links(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<Link>>, ApiError> {
    // The miss generation is captured before the repository read; a
    // mutation committing during the read stamps the snapshot stale.
    let generation = match state.revalidation.cached_my_links(id) {
        CacheLookup::Hit(links) => return Ok(Json(links)),
        CacheLookup::Miss(generation) => generation,
    };

    let links = state
        .repo
        .get_my_links(id)
        .await
        .map_err(|e| ApiError::persistence("fetch links", e))?;
    state.revalidation.store_my_links(id, generation, links.clone());
    Ok(Json(links))
}

/// create_link
///
/// [Authenticated Route] Creates a link owned by the caller. The URL must
/// parse as a well-formed absolute URL and the title must be non-empty, or
/// nothing is written. Successful creation invalidates the link pages.
#[utoipa::path(
    post,
    path = "/links",
    request_body = CreateLinkRequest,
    responses(
        (status = 200, description = "Created", body = Link),
        (status = 400, description = "Invalid input")
    )
)]
pub async fn create_link(
    AuthUser { id, .. }: AuthUser,
    State(state): State<AppState>,
    Json(payload): Json<CreateLinkRequest>,
) -> Result<Json<Link>, ApiError> {
    payload.validate().map_err(ApiError::Validation)?;

    let link = state
        .repo
        .create_link(payload, id)
        .await
        .map_err(|e| ApiError::persistence("create link", e))?;

    state.revalidation.invalidate_link_pages();
    Ok(Json(link))
}

/// get_link_details
///
/// [Authenticated Route] Retrieves one of the caller's own links by id.
#[utoipa::path(
    get,
    path = "/links/{id}",
    params(("id" = Uuid, Path, description = "Link ID")),
    responses(
        (status = 200, description = "Found", body = Link),
        (status = 404, description = "Not Found")
    )
)]
pub async fn get_link_details(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<Json<Link>, ApiError> {
    let link = state
        .repo
        .get_link(id, user_id)
        .await
        .map_err(|e| ApiError::persistence("fetch link", e))?;
    match link {
        Some(link) => Ok(Json(link)),
        None => Err(ApiError::NotFound("Link not found".to_string())),
    }
}

/// update_link
///
/// [Authenticated Route] Full-replace of a link's fields, bumping
/// `updated_at`. Admins may update any link; everyone else only their own,
/// enforced by the repository's conditional update. A missing id and a
/// foreign id are indistinguishable in the response.
#[utoipa::path(
    put,
    path = "/links/{id}",
    params(("id" = Uuid, Path, description = "Link ID")),
    request_body = UpdateLinkRequest,
    responses(
        (status = 200, description = "Updated", body = Link),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn update_link(
    AuthUser { id: user_id, role, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateLinkRequest>,
) -> Result<Json<Link>, ApiError> {
    payload.validate().map_err(ApiError::Validation)?;

    let updated = if role.is_admin() {
        // Admin override: no ownership constraint.
        state.repo.update_link_admin(id, payload).await
    } else {
        state.repo.update_link(id, user_id, payload).await
    }
    .map_err(|e| ApiError::persistence("update link", e))?;

    match updated {
        Some(link) => {
            state.revalidation.invalidate_link_pages();
            Ok(Json(link))
        }
        None => Err(ApiError::NotFoundOrForbidden),
    }
}

/// delete_link
///
/// [Authenticated Route] Deletes one of the caller's own links. Deletion is
/// physical and immediate; there is no admin override on this path.
#[utoipa::path(
    delete,
    path = "/links/{id}",
    params(("id" = Uuid, Path, description = "Link ID")),
    responses(
        (status = 204, description = "Deleted"),
        (status = 404, description = "Not Found or Not Yours")
    )
)]
pub async fn delete_link(
    AuthUser { id: user_id, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let deleted = state
        .repo
        .delete_link(id, user_id)
        .await
        .map_err(|e| ApiError::persistence("delete link", e))?;
    if !deleted {
        return Err(ApiError::NotFoundOrForbidden);
    }

    state.revalidation.invalidate_link_pages();
    Ok(StatusCode::NO_CONTENT)
}

// --- Admin Handlers ---

/// get_admin_links
///
/// [Admin Route] Lists every link in the system joined with its owner's
/// name and email. Cached under the `/links-update` page generation.
#[utoipa::path(
    get,
    path = "/admin/links",
    responses(
        (status = 200, description = "All links", body = [AdminLink]),
        (status = 403, description = "Admin only")
    )
)]
pub async fn get_admin_links(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<AdminLink>>, ApiError> {
    if !role.is_admin() {
        return Err(ApiError::InsufficientPermission);
    }

    let generation = match state.revalidation.cached_all_links() {
        CacheLookup::Hit(links) => return Ok(Json(links)),
        CacheLookup::Miss(generation) => generation,
    };

    let links = state
        .repo
        .get_all_links()
        .await
        .map_err(|e| ApiError::persistence("fetch links", e))?;
    state.revalidation.store_all_links(generation, links.clone());
    Ok(Json(links))
}

/// get_users
///
/// [Admin Route] Lists all users for the role-management page.
#[utoipa::path(
    get,
    path = "/admin/users",
    responses(
        (status = 200, description = "All users", body = [User]),
        (status = 403, description = "Admin only")
    )
)]
pub async fn get_users(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
) -> Result<Json<Vec<User>>, ApiError> {
    if !role.is_admin() {
        return Err(ApiError::InsufficientPermission);
    }
    let users = state
        .repo
        .get_users()
        .await
        .map_err(|e| ApiError::persistence("fetch users", e))?;
    Ok(Json(users))
}

/// update_user_role
///
/// [Admin Route] Changes another user's role to any value from the
/// enumerated set. There is deliberately no self-demotion guard: an admin
/// may change their own role, including away from ADMIN.
#[utoipa::path(
    put,
    path = "/admin/users/{id}/role",
    params(("id" = Uuid, Path, description = "User ID")),
    request_body = UpdateUserRoleRequest,
    responses(
        (status = 200, description = "Updated", body = User),
        (status = 403, description = "Admin only")
    )
)]
pub async fn update_user_role(
    AuthUser { role, .. }: AuthUser,
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateUserRoleRequest>,
) -> Result<Json<User>, ApiError> {
    if !role.is_admin() {
        return Err(ApiError::InsufficientPermission);
    }

    let updated = state
        .repo
        .update_user_role(id, payload.role)
        .await
        .map_err(|e| ApiError::persistence("update user role", e))?;
    match updated {
        Some(user) => Ok(Json(user)),
        None => Err(ApiError::Persistence(
            "Failed to update user role. Please try again.".to_string(),
        )),
    }
}
