use crate::{AppState, handlers};
use axum::{
    Router,
    routing::{get, post},
};

/// Public Router Module
///
/// Endpoints reachable by anonymous clients. Everything data-bearing in the
/// application sits behind the authenticated router; this module only
/// carries the identity flow and the liveness probe.
pub fn public_routes() -> Router<AppState> {
    Router::new()
        // GET /health
        // Unauthenticated endpoint for monitoring and load balancer checks.
        .route("/health", get(|| async { "ok" }))
        // POST /auth/register
        // Creates an account (role USER) and fires the verification email.
        .route("/auth/register", post(handlers::register_user))
        // POST /auth/login
        // Exchanges credentials for a signed bearer token.
        .route("/auth/login", post(handlers::login))
        // GET /auth/verify?token=...
        // Target of the tokenized link embedded in verification emails.
        .route("/auth/verify", get(handlers::verify_email))
}
