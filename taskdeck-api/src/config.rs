/// Configuration management for the API server
///
/// Everything comes from environment variables; a `.env` file is loaded first
/// when present (development).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `API_HOST`: host to bind to (default: 0.0.0.0)
/// - `API_PORT`: port to bind to (default: 8080)
/// - `JWT_SECRET`: HS256 signing secret, at least 32 characters (required)
/// - `JWT_ACCESS_MINUTES`: access token lifetime (default: 15)
/// - `JWT_REFRESH_DAYS`: refresh token lifetime (default: 7)
/// - `JWT_REFRESH_REMEMBER_DAYS`: refresh lifetime with remember-me (default: 15)
/// - `COOKIE_SECURE`: set the `Secure` flag on auth cookies (default: false)
/// - `CORS_ORIGINS`: comma separated origins, `*` for permissive (default: *)
/// - `PRODUCTION`: enables HSTS (default: false)
/// - `LOG_FORMAT`: `json` for JSON logs, anything else for human output
///
/// # Example
///
/// ```no_run
/// use taskdeck_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::str::FromStr;

use chrono::Duration;
use taskdeck_shared::auth::jwt::TokenLifetimes;
use taskdeck_shared::db::pool::DatabaseConfig;

/// Complete application configuration
#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` means permissive
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS on)
    pub production: bool,

    /// `Secure` flag for auth cookies
    pub cookie_secure: bool,
}

#[derive(Debug, Clone)]
pub struct JwtConfig {
    /// HS256 secret. Generate with `openssl rand -hex 32`.
    pub secret: String,

    pub lifetimes: TokenLifetimes,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing, a value does not parse, or
    /// `JWT_SECRET` is shorter than 32 characters.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let database_url = env::var("DATABASE_URL")
            .map_err(|_| anyhow::anyhow!("DATABASE_URL environment variable is required"))?;

        let jwt_secret = env::var("JWT_SECRET")
            .map_err(|_| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let database = DatabaseConfig {
            max_connections: parse_var("DATABASE_MAX_CONNECTIONS", 10)?,
            ..DatabaseConfig::from_url(database_url)
        };

        let lifetimes = TokenLifetimes {
            access: Duration::minutes(parse_var("JWT_ACCESS_MINUTES", 15)?),
            refresh: Duration::days(parse_var("JWT_REFRESH_DAYS", 7)?),
            refresh_remember_me: Duration::days(parse_var("JWT_REFRESH_REMEMBER_DAYS", 15)?),
        };

        Ok(Self {
            api: ApiConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: parse_var("API_PORT", 8080)?,
                cors_origins: parse_origins(&env::var("CORS_ORIGINS").unwrap_or_else(|_| "*".to_string())),
                production: parse_var("PRODUCTION", false)?,
                cookie_secure: parse_var("COOKIE_SECURE", false)?,
            },
            database,
            jwt: JwtConfig {
                secret: jwt_secret,
                lifetimes,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

/// Parses an optional variable, falling back to `default` when unset
fn parse_var<T>(name: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match env::var(name) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", name, raw, e)),
        Err(_) => Ok(default),
    }
}

fn parse_origins(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|origin| !origin.is_empty())
        .map(String::from)
        .collect()
}

/// Configuration for unit tests; never read from the environment
#[cfg(test)]
pub(crate) fn test_config() -> Config {
    Config {
        api: ApiConfig {
            host: "127.0.0.1".to_string(),
            port: 8080,
            cors_origins: vec!["*".to_string()],
            production: false,
            cookie_secure: false,
        },
        database: DatabaseConfig::from_url("postgresql://localhost/taskdeck_test"),
        jwt: JwtConfig {
            secret: "test-secret-key-at-least-32-bytes-long".to_string(),
            lifetimes: TokenLifetimes::default(),
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bind_address() {
        assert_eq!(test_config().bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_parse_origins() {
        assert_eq!(
            parse_origins("http://a.test, http://b.test,,"),
            vec!["http://a.test".to_string(), "http://b.test".to_string()]
        );
        assert_eq!(parse_origins("*"), vec!["*".to_string()]);
    }

    #[test]
    fn test_parse_var_default_when_unset() {
        let value: u32 = parse_var("TASKDECK_TEST_SURELY_UNSET_VARIABLE", 42).unwrap();
        assert_eq!(value, 42);
    }
}
