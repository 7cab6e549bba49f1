/// Router Module Index
///
/// Organizes the routing surface into security-segregated modules so access
/// control is applied explicitly at the module level (via Axum layers)
/// rather than ad hoc per endpoint.

/// Routes accessible without a session: health, registration, login, and
/// email verification.
pub mod public;

/// Routes protected by the `AuthUser` extractor middleware: the profile
/// echo and all owner-scoped link CRUD.
pub mod authenticated;

/// Routes restricted to the ADMIN role. Authentication happens in the
/// shared layer; the role gate is enforced inside each handler.
pub mod admin;
