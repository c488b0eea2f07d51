/// Configuration management for the API server
///
/// Loaded once at startup from the environment (and `.env` when present).
///
/// # Environment Variables
///
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS` / `DATABASE_MIN_CONNECTIONS` (default 10 / 2)
/// - `DATABASE_ACQUIRE_TIMEOUT_SECS` (default 30)
/// - `API_HOST` / `API_PORT` (default 0.0.0.0 / 8080)
/// - `APP_BASE_URL`: public URL used in mailed links (default http://localhost:8080)
/// - `CORS_ORIGINS`: comma separated, `*` for any (default `*`)
/// - `PRODUCTION`: enables HSTS and secure cookies (default false)
/// - `COOKIE_SECURE`: overrides the cookie `Secure` flag
/// - `REQUEST_TIMEOUT_SECS` (default 30)
/// - `JWT_ACCESS_SECRET`, `JWT_REFRESH_SECRET`, `JWT_LINK_SECRET`: required,
///   at least 32 characters each and all different
/// - `JWT_ACCESS_TTL_SECS`, `JWT_REFRESH_TTL_SECS`, `JWT_EMAIL_VERIFY_TTL_SECS`,
///   `JWT_TEAM_INVITE_TTL_SECS`: token lifetimes
///
/// # Example
///
/// ```no_run
/// use stockroom_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;
use stockroom_shared::auth::jwt::JwtSettings;
use stockroom_shared::db::pool;

/// Minimum length of every signing secret
pub const MIN_SECRET_LENGTH: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,
    pub cookie: CookieConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS on)
    pub production: bool,

    pub request_timeout_secs: u64,

    /// Public base URL for links in outgoing mail
    pub base_url: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
    pub acquire_timeout_secs: u64,
}

/// Token secrets and lifetimes in seconds
#[derive(Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    pub access_secret: String,
    pub refresh_secret: String,
    pub link_secret: String,
    pub access_ttl_secs: i64,
    pub refresh_ttl_secs: i64,
    pub email_verify_ttl_secs: i64,
    pub team_invite_ttl_secs: i64,
}

// Secrets stay out of logs.
impl std::fmt::Debug for JwtConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("JwtConfig")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .field("refresh_ttl_secs", &self.refresh_ttl_secs)
            .field("email_verify_ttl_secs", &self.email_verify_ttl_secs)
            .field("team_invite_ttl_secs", &self.team_invite_ttl_secs)
            .finish_non_exhaustive()
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CookieConfig {
    /// Name of the session cookie
    pub name: String,

    /// Sets the `Secure` attribute
    pub secure: bool,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Fails when a required variable is missing, a value does not parse, or
    /// the JWT secrets are too short or reused.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        let production: bool = env_or("PRODUCTION", false)?;

        let config = Self {
            api: ApiConfig {
                host: env::var("API_HOST").unwrap_or_else(|_| "0.0.0.0".to_string()),
                port: env_or("API_PORT", 8080)?,
                cors_origins: env::var("CORS_ORIGINS")
                    .unwrap_or_else(|_| "*".to_string())
                    .split(',')
                    .map(|origin| origin.trim().to_string())
                    .filter(|origin| !origin.is_empty())
                    .collect(),
                production,
                request_timeout_secs: env_or("REQUEST_TIMEOUT_SECS", 30)?,
                base_url: env::var("APP_BASE_URL").unwrap_or_else(|_| "http://localhost:8080".to_string()),
            },
            database: DatabaseConfig {
                url: required("DATABASE_URL")?,
                max_connections: env_or("DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: env_or("DATABASE_MIN_CONNECTIONS", 2)?,
                acquire_timeout_secs: env_or("DATABASE_ACQUIRE_TIMEOUT_SECS", 30)?,
            },
            jwt: JwtConfig {
                access_secret: required("JWT_ACCESS_SECRET")?,
                refresh_secret: required("JWT_REFRESH_SECRET")?,
                link_secret: required("JWT_LINK_SECRET")?,
                access_ttl_secs: env_or("JWT_ACCESS_TTL_SECS", 24 * 3600)?,
                refresh_ttl_secs: env_or("JWT_REFRESH_TTL_SECS", 30 * 24 * 3600)?,
                email_verify_ttl_secs: env_or("JWT_EMAIL_VERIFY_TTL_SECS", 24 * 3600)?,
                team_invite_ttl_secs: env_or("JWT_TEAM_INVITE_TTL_SECS", 7 * 24 * 3600)?,
            },
            cookie: CookieConfig {
                name: stockroom_shared::auth::guard::SESSION_COOKIE.to_string(),
                secure: env_or("COOKIE_SECURE", production)?,
            },
        };

        config.jwt.validate()?;
        Ok(config)
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

impl DatabaseConfig {
    pub fn pool_config(&self) -> pool::DatabaseConfig {
        pool::DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.min_connections,
            acquire_timeout_seconds: self.acquire_timeout_secs,
            ..Default::default()
        }
    }
}

impl JwtConfig {
    /// Every secret long enough, no secret shared between token families
    pub fn validate(&self) -> anyhow::Result<()> {
        for (name, secret) in [
            ("JWT_ACCESS_SECRET", &self.access_secret),
            ("JWT_REFRESH_SECRET", &self.refresh_secret),
            ("JWT_LINK_SECRET", &self.link_secret),
        ] {
            if secret.len() < MIN_SECRET_LENGTH {
                anyhow::bail!("{} must be at least {} characters long", name, MIN_SECRET_LENGTH);
            }
        }

        if self.access_secret == self.refresh_secret
            || self.access_secret == self.link_secret
            || self.refresh_secret == self.link_secret
        {
            anyhow::bail!("JWT secrets must all be different");
        }

        for ttl in [
            self.access_ttl_secs,
            self.refresh_ttl_secs,
            self.email_verify_ttl_secs,
            self.team_invite_ttl_secs,
        ] {
            if ttl <= 0 {
                anyhow::bail!("JWT lifetimes must be positive");
            }
        }

        Ok(())
    }

    pub fn settings(&self) -> JwtSettings {
        JwtSettings {
            access_ttl: chrono::Duration::seconds(self.access_ttl_secs),
            refresh_ttl: chrono::Duration::seconds(self.refresh_ttl_secs),
            email_verify_ttl: chrono::Duration::seconds(self.email_verify_ttl_secs),
            team_invite_ttl: chrono::Duration::seconds(self.team_invite_ttl_secs),
            ..JwtSettings::new(
                self.access_secret.clone(),
                self.refresh_secret.clone(),
                self.link_secret.clone(),
            )
        }
    }
}

fn required(key: &str) -> anyhow::Result<String> {
    env::var(key).with_context(|| format!("{} environment variable is required", key))
}

fn env_or<T>(key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{} has an invalid value: {:?}", key, raw)),
        Err(_) => Ok(default),
    }
}
