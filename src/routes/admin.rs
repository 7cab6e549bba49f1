use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, put},
};

/// Admin Router Module
///
/// Routes exclusively for users with the ADMIN role. The surrounding
/// authentication layer guarantees a session; the role check itself runs
/// inside each handler so a non-admin receives 403, not 401.
pub fn admin_routes() -> Router<AppState> {
    Router::new()
        // GET /admin/links
        // Every link in the system, joined with its owner's name and email.
        // Backs the admin management page.
        .route("/links", get(handlers::get_admin_links))
        // GET /admin/users
        // All users, for the role-management page.
        .route("/users", get(handlers::get_users))
        // PUT /admin/users/{id}/role
        // Changes a user's role to any value from the enumerated set.
        .route("/users/{id}/role", put(handlers::update_user_role))
}
