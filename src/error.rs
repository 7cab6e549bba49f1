use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};

/// ApiError
///
/// The failure taxonomy shared by every handler. No operation lets an
/// underlying fault (database, token, hashing) escape past its boundary:
/// everything is converted into one of these variants, and persistence
/// failures are logged server-side while the caller only sees a generic
/// message.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    #[error("Not authenticated")]
    NotAuthenticated,

    #[error("Insufficient permissions. Admin access required.")]
    InsufficientPermission,

    /// Malformed input (invalid URL, missing title, bad registration data).
    #[error("{0}")]
    Validation(String),

    /// Existence and ownership are deliberately collapsed into one message
    /// so non-owners cannot probe which ids exist.
    #[error("Link not found or access denied")]
    NotFoundOrForbidden,

    #[error("{0}")]
    NotFound(String),

    /// Catch-all for underlying store errors; the original error never
    /// reaches the caller.
    #[error("{0}")]
    Persistence(String),
}

impl ApiError {
    /// Logs the underlying database error and returns the generic
    /// caller-facing variant. `action` reads as "Failed to {action}".
    pub fn persistence(action: &str, err: sqlx::Error) -> Self {
        tracing::error!("{} error: {:?}", action, err);
        ApiError::Persistence(format!("Failed to {}", action))
    }

    fn status(&self) -> StatusCode {
        match self {
            ApiError::NotAuthenticated => StatusCode::UNAUTHORIZED,
            ApiError::InsufficientPermission => StatusCode::FORBIDDEN,
            ApiError::Validation(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFoundOrForbidden | ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Persistence(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let body = serde_json::json!({
            "success": false,
            "error": self.to_string(),
        });
        (self.status(), Json(body)).into_response()
    }
}
