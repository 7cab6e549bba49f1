use crate::{AppState, handlers};
use axum::{Router, routing::get};

/// Authenticated Router Module
///
/// Routes for any user with a validated session. Every handler receives the
/// resolved `AuthUser` as an explicit argument; owner-only authorization is
/// enforced by the repository's conditional mutations, so a foreign link id
/// is indistinguishable from a missing one.
pub fn authenticated_routes() -> Router<AppState> {
    Router::<AppState>::new()
        // GET /me
        // The authenticated user's profile and role.
        .route("/me", get(handlers::get_me))
        // GET /links — the caller's own links, newest first.
        // POST /links — create a link owned by the caller.
        .route(
            "/links",
            get(handlers::get_my_links).post(handlers::create_link),
        )
        // GET /links/{id} — owner-scoped single fetch.
        // PUT /links/{id} — full-replace update (owner, or admin override).
        // DELETE /links/{id} — owner-only physical delete.
        .route(
            "/links/{id}",
            get(handlers::get_link_details)
                .put(handlers::update_link)
                .delete(handlers::delete_link),
        )
}
