/// Authentication and authorization
///
/// # Modules
///
/// - [`password`]: Argon2id password hashing and the password policy
/// - [`jwt`]: Access and refresh JWTs
/// - [`session`]: Refresh-session start, rotation and invalidation
/// - [`middleware`]: Per-request [`middleware::AuthContext`]
/// - [`authorization`]: The project authorization gate

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
pub mod session;
