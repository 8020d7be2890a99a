/// JWT creation and validation
///
/// Access and refresh tokens are HS256 JWTs signed with the same secret and
/// told apart by the `token_type` claim. The subject is the account's public
/// id; internal ids never appear in a token.
///
/// Every token carries a random `jti`, so two tokens issued for the same
/// account in the same second still differ. Refresh rotation relies on that:
/// the stored session is the hash of one exact token string.
///
/// # Lifetimes
///
/// | Token                   | Default   |
/// |-------------------------|-----------|
/// | Access                  | 15 minutes |
/// | Refresh                 | 7 days    |
/// | Refresh (remember me)   | 15 days   |
///
/// # Example
///
/// ```
/// use taskdeck_shared::auth::jwt::{issue_token_pair, validate_access_token, TokenLifetimes};
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let secret = "a-development-secret-of-at-least-32-bytes";
/// let account = Uuid::new_v4();
///
/// let pair = issue_token_pair(account, false, &TokenLifetimes::default(), secret)?;
/// let claims = validate_access_token(&pair.access_token, secret)?;
/// assert_eq!(claims.sub, account);
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, TimeZone, Utc};
use jsonwebtoken::{decode, encode, errors::ErrorKind, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Value of the `iss` claim
pub const ISSUER: &str = "taskdeck";

#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    #[error("Failed to create token: {0}")]
    CreateError(String),

    #[error("Invalid token: {0}")]
    ValidationError(String),

    #[error("Token has expired")]
    Expired,

    #[error("Expected {expected} token")]
    WrongType { expected: &'static str },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TokenType {
    Access,
    Refresh,
}

impl TokenType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenType::Access => "access",
            TokenType::Refresh => "refresh",
        }
    }
}

/// Configurable token lifetimes
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TokenLifetimes {
    pub access: Duration,
    pub refresh: Duration,
    pub refresh_remember_me: Duration,
}

impl Default for TokenLifetimes {
    fn default() -> Self {
        Self {
            access: Duration::minutes(15),
            refresh: Duration::days(7),
            refresh_remember_me: Duration::days(15),
        }
    }
}

impl TokenLifetimes {
    /// Refresh lifetime for the chosen remember-me setting
    pub fn refresh_for(&self, remember_me: bool) -> Duration {
        if remember_me {
            self.refresh_remember_me
        } else {
            self.refresh
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// Account public id
    pub sub: Uuid,

    pub iss: String,

    pub iat: i64,

    pub exp: i64,

    pub nbf: i64,

    /// Unique token id
    pub jti: Uuid,

    pub token_type: TokenType,

    /// Carried on refresh tokens so a rotation keeps the original lifetime
    #[serde(default)]
    pub remember_me: bool,
}

impl Claims {
    pub fn new(account_id: Uuid, token_type: TokenType, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: account_id,
            iss: ISSUER.to_string(),
            iat: now.timestamp(),
            exp: (now + expires_in).timestamp(),
            nbf: now.timestamp(),
            jti: Uuid::new_v4(),
            token_type,
            remember_me: false,
        }
    }

    pub fn remember_me(mut self, remember_me: bool) -> Self {
        self.remember_me = remember_me;
        self
    }

    pub fn expires_at(&self) -> DateTime<Utc> {
        Utc.timestamp_opt(self.exp, 0).single().unwrap_or_else(Utc::now)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now().timestamp() >= self.exp
    }
}

/// A freshly issued access/refresh pair
#[derive(Debug, Clone)]
pub struct TokenPair {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub remember_me: bool,
}

pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    encode(
        &Header::new(Algorithm::HS256),
        claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| JwtError::CreateError(e.to_string()))
}

/// Verifies signature, expiry, not-before and issuer
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = true;
    validation.validate_nbf = true;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| match e.kind() {
            ErrorKind::ExpiredSignature => JwtError::Expired,
            _ => JwtError::ValidationError(e.to_string()),
        })
}

/// Like [`validate_token`] but accepts an expired token
///
/// Used only to identify the session an expired refresh token belonged to.
pub fn validate_token_ignoring_expiry(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_issuer(&[ISSUER]);
    validation.validate_exp = false;

    decode::<Claims>(token, &DecodingKey::from_secret(secret.as_bytes()), &validation)
        .map(|data| data.claims)
        .map_err(|e| JwtError::ValidationError(e.to_string()))
}

pub fn validate_access_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;
    if claims.token_type != TokenType::Access {
        return Err(JwtError::WrongType {
            expected: TokenType::Access.as_str(),
        });
    }
    Ok(claims)
}

pub fn validate_refresh_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let claims = validate_token(token, secret)?;
    if claims.token_type != TokenType::Refresh {
        return Err(JwtError::WrongType {
            expected: TokenType::Refresh.as_str(),
        });
    }
    Ok(claims)
}

/// Issues an access token and a refresh token for one account
pub fn issue_token_pair(
    account_id: Uuid,
    remember_me: bool,
    lifetimes: &TokenLifetimes,
    secret: &str,
) -> Result<TokenPair, JwtError> {
    let access = Claims::new(account_id, TokenType::Access, lifetimes.access);
    let refresh = Claims::new(account_id, TokenType::Refresh, lifetimes.refresh_for(remember_me))
        .remember_me(remember_me);

    Ok(TokenPair {
        access_token: create_token(&access, secret)?,
        access_expires_at: access.expires_at(),
        refresh_token: create_token(&refresh, secret)?,
        refresh_expires_at: refresh.expires_at(),
        remember_me,
    })
}
