/// Server configuration
///
/// Loaded from environment variables, with a `.env` file honoured in
/// development. Every knob has a default except `DATABASE_URL` and
/// `JWT_SECRET`.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default `0.0.0.0:8000`)
/// - `CORS_ORIGINS`: comma-separated allowed origins (default: any)
/// - `PUBLIC_BASE_URL`: base of emailed links (default `http://localhost:8000`)
/// - `DATABASE_URL`: PostgreSQL connection URL (required)
/// - `DATABASE_MAX_CONNECTIONS` / `DATABASE_MIN_CONNECTIONS`: pool bounds (10 / 2)
/// - `JWT_SECRET`: HS256 key, at least 32 characters (required)
/// - `JWT_ISSUER`: issuer claim (default `crm`)
/// - `ACCESS_TOKEN_EXPIRE_MINUTES`: session token lifetime (30)
/// - `PASSWORD_RESET_EXPIRE_MINUTES`: reset link lifetime (60)
/// - `ARGON2_MEMORY_KIB` / `ARGON2_ITERATIONS` / `ARGON2_PARALLELISM`: hash cost
/// - `SMTP_HOST` / `SMTP_PORT` / `SMTP_USER` / `SMTP_PASS`: relay; no host means log-only mail
/// - `MAIL_FROM`: sender address (default `SMTP_USER`, else `noreply@localhost`)
/// - `MAIL_SEND_TIMEOUT_SECS` / `MAIL_MAX_ATTEMPTS` / `MAIL_QUEUE_CAPACITY`: delivery policy

use anyhow::Context;
use crm_shared::auth::jwt::TokenSettings;
use crm_shared::auth::password::HashCost;
use crm_shared::db::pool::PoolSettings;
use crm_worker::{DispatcherConfig, SmtpSettings};
use std::env;
use std::str::FromStr;
use std::time::Duration;

const MIN_SECRET_LEN: usize = 32;

#[derive(Debug, Clone)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub auth: AuthConfig,
    pub mail: MailConfig,
}

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,
    /// Empty means any origin
    pub cors_origins: Vec<String>,
    pub public_base_url: String,
}

#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
    pub min_connections: u32,
}

#[derive(Debug, Clone)]
pub struct AuthConfig {
    pub jwt_secret: String,
    pub jwt_issuer: String,
    pub access_token_minutes: i64,
    pub password_reset_minutes: i64,
    pub hash_cost: HashCost,
}

#[derive(Debug, Clone)]
pub struct MailConfig {
    /// `None` sends nothing and logs instead
    pub smtp: Option<SmtpSettings>,
    pub send_timeout_secs: u64,
    pub max_attempts: u32,
    pub queue_capacity: usize,
}

impl Config {
    /// Reads `.env` (if any) and the process environment.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary key lookup.
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let text = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let database_url = lookup("DATABASE_URL").context("DATABASE_URL environment variable is required")?;

        let jwt_secret = lookup("JWT_SECRET").context("JWT_SECRET environment variable is required")?;
        if jwt_secret.len() < MIN_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least {MIN_SECRET_LEN} characters long");
        }

        let access_token_minutes: i64 = parsed(&lookup, "ACCESS_TOKEN_EXPIRE_MINUTES", 30)?;
        if access_token_minutes <= 0 {
            anyhow::bail!("ACCESS_TOKEN_EXPIRE_MINUTES must be positive");
        }
        let password_reset_minutes: i64 = parsed(&lookup, "PASSWORD_RESET_EXPIRE_MINUTES", 60)?;
        if password_reset_minutes <= 0 {
            anyhow::bail!("PASSWORD_RESET_EXPIRE_MINUTES must be positive");
        }

        let defaults = HashCost::default();
        let hash_cost = HashCost {
            memory_kib: parsed(&lookup, "ARGON2_MEMORY_KIB", defaults.memory_kib)?,
            iterations: parsed(&lookup, "ARGON2_ITERATIONS", defaults.iterations)?,
            parallelism: parsed(&lookup, "ARGON2_PARALLELISM", defaults.parallelism)?,
        };

        let smtp_user = lookup("SMTP_USER").filter(|v| !v.is_empty());
        let from = lookup("MAIL_FROM")
            .filter(|v| !v.is_empty())
            .or_else(|| smtp_user.clone())
            .unwrap_or_else(|| "noreply@localhost".to_string());
        let smtp = match lookup("SMTP_HOST").filter(|v| !v.is_empty()) {
            Some(host) => Some(SmtpSettings {
                host,
                port: parsed(&lookup, "SMTP_PORT", 587)?,
                username: smtp_user,
                password: lookup("SMTP_PASS").filter(|v| !v.is_empty()),
                from,
            }),
            None => None,
        };

        let cors_origins = lookup("CORS_ORIGINS")
            .map(|raw| {
                raw.split(',')
                    .map(str::trim)
                    .filter(|o| !o.is_empty())
                    .map(str::to_string)
                    .collect()
            })
            .unwrap_or_default();

        Ok(Self {
            api: ApiConfig {
                host: text("API_HOST", "0.0.0.0"),
                port: parsed(&lookup, "API_PORT", 8000)?,
                cors_origins,
                public_base_url: text("PUBLIC_BASE_URL", "http://localhost:8000"),
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections: parsed(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
                min_connections: parsed(&lookup, "DATABASE_MIN_CONNECTIONS", 2)?,
            },
            auth: AuthConfig {
                jwt_secret,
                jwt_issuer: text("JWT_ISSUER", "crm"),
                access_token_minutes,
                password_reset_minutes,
                hash_cost,
            },
            mail: MailConfig {
                smtp,
                send_timeout_secs: parsed(&lookup, "MAIL_SEND_TIMEOUT_SECS", 10)?,
                max_attempts: parsed(&lookup, "MAIL_MAX_ATTEMPTS", 3)?,
                queue_capacity: parsed(&lookup, "MAIL_QUEUE_CAPACITY", 256)?,
            },
        })
    }

    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    pub fn token_settings(&self) -> TokenSettings {
        TokenSettings::new(
            self.auth.jwt_secret.clone(),
            self.auth.jwt_issuer.clone(),
            chrono::Duration::minutes(self.auth.access_token_minutes),
        )
    }

    pub fn password_reset_ttl(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.auth.password_reset_minutes)
    }

    pub fn pool_settings(&self) -> PoolSettings {
        PoolSettings {
            max_connections: self.database.max_connections,
            min_connections: self.database.min_connections,
            ..PoolSettings::new(self.database.url.clone())
        }
    }

    pub fn dispatcher_config(&self) -> DispatcherConfig {
        DispatcherConfig {
            queue_capacity: self.mail.queue_capacity,
            send_timeout: Duration::from_secs(self.mail.send_timeout_secs),
            max_attempts: self.mail.max_attempts,
            ..DispatcherConfig::default()
        }
    }
}

fn parsed<T, F>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    F: Fn(&str) -> Option<String>,
{
    match lookup(key) {
        Some(raw) if !raw.trim().is_empty() => raw
            .trim()
            .parse::<T>()
            .with_context(|| format!("{key} has an invalid value: {raw:?}")),
        _ => Ok(default),
    }
}
