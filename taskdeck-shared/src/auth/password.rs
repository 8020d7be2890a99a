/// Password hashing and password policy
///
/// Passwords are stored as Argon2id PHC strings. Verification reads the
/// parameters back out of the stored hash, so raising [`ARGON2_MEMORY_KIB`]
/// later does not invalidate existing accounts.
///
/// # Example
///
/// ```
/// use taskdeck_shared::auth::password::{hash_password, verify_password};
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let hash = hash_password("Corr3ct-horse")?;
/// assert!(verify_password("Corr3ct-horse", &hash)?);
/// assert!(!verify_password("battery-staple", &hash)?);
/// # Ok(())
/// # }
/// ```

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

/// Argon2id memory cost in KiB
pub const ARGON2_MEMORY_KIB: u32 = 19_456;

/// Argon2id passes
pub const ARGON2_ITERATIONS: u32 = 2;

/// Argon2id lanes
pub const ARGON2_PARALLELISM: u32 = 1;

pub const MIN_PASSWORD_LENGTH: usize = 8;

pub const MAX_PASSWORD_LENGTH: usize = 128;

#[derive(Debug, thiserror::Error)]
pub enum PasswordError {
    #[error("Failed to hash password: {0}")]
    HashError(String),

    #[error("Failed to verify password: {0}")]
    VerifyError(String),

    #[error("Invalid password hash format: {0}")]
    InvalidHash(String),
}

fn hasher() -> Result<Argon2<'static>, PasswordError> {
    let params = Params::new(ARGON2_MEMORY_KIB, ARGON2_ITERATIONS, ARGON2_PARALLELISM, None)
        .map_err(|e| PasswordError::HashError(format!("Invalid parameters: {}", e)))?;

    Ok(Argon2::new(Algorithm::Argon2id, Version::V0x13, params))
}

/// Hashes a password with a fresh random salt
pub fn hash_password(password: &str) -> Result<String, PasswordError> {
    let salt = SaltString::generate(&mut OsRng);

    let hash = hasher()?
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| PasswordError::HashError(e.to_string()))?;

    Ok(hash.to_string())
}

/// Checks a password against a stored PHC hash
///
/// A wrong password is `Ok(false)`; only a corrupt hash is an error.
pub fn verify_password(password: &str, hash: &str) -> Result<bool, PasswordError> {
    let parsed = PasswordHash::new(hash).map_err(|e| PasswordError::InvalidHash(e.to_string()))?;

    match Argon2::default().verify_password(password.as_bytes(), &parsed) {
        Ok(()) => Ok(true),
        Err(argon2::password_hash::Error::Password) => Ok(false),
        Err(e) => Err(PasswordError::VerifyError(e.to_string())),
    }
}

/// Checks the password policy, returning every violated rule
///
/// Rules: 8 to 128 characters with at least one uppercase letter, one
/// lowercase letter and one digit.
pub fn validate_password_strength(password: &str) -> Result<(), Vec<String>> {
    let mut problems = Vec::new();
    let length = password.chars().count();

    if length < MIN_PASSWORD_LENGTH {
        problems.push(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LENGTH
        ));
    }
    if length > MAX_PASSWORD_LENGTH {
        problems.push(format!(
            "Password must be at most {} characters long",
            MAX_PASSWORD_LENGTH
        ));
    }
    if !password.chars().any(char::is_uppercase) {
        problems.push("Password must contain an uppercase letter".to_string());
    }
    if !password.chars().any(char::is_lowercase) {
        problems.push("Password must contain a lowercase letter".to_string());
    }
    if !password.chars().any(|c| c.is_ascii_digit()) {
        problems.push("Password must contain a digit".to_string());
    }

    if problems.is_empty() {
        Ok(())
    } else {
        Err(problems)
    }
}
