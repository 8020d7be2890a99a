/// Middleware for the API server
///
/// - `auth`: resolves the access token (cookie or bearer header) to an `AuthContext`
/// - `security`: hardening response headers

pub mod auth;
pub mod security;
