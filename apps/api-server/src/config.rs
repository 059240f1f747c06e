//! Application configuration loaded from environment variables.

use std::env;
use std::str::FromStr;

use quill_core::policy::DeletePolicy;
use quill_infra::auth::JwtConfig;
use quill_infra::database::DatabaseConfig;

/// Application configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    pub host: String,
    pub port: u16,
    pub database: Option<DatabaseConfig>,
    pub jwt: JwtConfig,
    pub posts: PostSettings,
}

/// Tunables for the post endpoints.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PostSettings {
    /// Page size used when a client asks for a page without a size.
    pub default_page_size: u64,
    /// Upper bound for client-supplied page sizes.
    pub max_page_size: u64,
    pub delete_policy: DeletePolicy,
}

impl Default for PostSettings {
    fn default() -> Self {
        Self {
            default_page_size: 20,
            max_page_size: 100,
            delete_policy: DeletePolicy::OwnerOnly,
        }
    }
}

impl AppConfig {
    /// Load configuration from environment variables.
    pub fn from_env() -> Self {
        let database = env::var("DATABASE_URL").ok().map(|url| DatabaseConfig {
            url,
            max_connections: parse_var("DB_MAX_CONNECTIONS").unwrap_or(100),
            min_connections: parse_var("DB_MIN_CONNECTIONS").unwrap_or(10),
        });

        let defaults = JwtConfig::default();
        let jwt = JwtConfig {
            secret: env::var("JWT_SECRET").unwrap_or(defaults.secret),
            expiration_hours: parse_var("JWT_EXPIRATION_HOURS").unwrap_or(defaults.expiration_hours),
            issuer: env::var("JWT_ISSUER").unwrap_or(defaults.issuer),
        };

        Self {
            host: env::var("HOST").unwrap_or_else(|_| "127.0.0.1".to_string()),
            port: parse_var("PORT").unwrap_or(8080),
            database,
            jwt,
            posts: PostSettings::from_env(),
        }
    }

    /// True when running with `RUST_ENV=production` (or `prod`).
    pub fn is_production() -> bool {
        env::var("RUST_ENV")
            .map(|v| v == "production" || v == "prod")
            .unwrap_or(false)
    }
}

impl PostSettings {
    fn from_env() -> Self {
        let defaults = Self::default();

        let default_page_size = parse_var("POST_PAGE_SIZE")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.default_page_size);
        let max_page_size = parse_var("POST_MAX_PAGE_SIZE")
            .filter(|n| *n > 0)
            .unwrap_or(defaults.max_page_size)
            .max(default_page_size);

        let delete_policy = match env::var("POST_DELETE_POLICY") {
            Ok(raw) => raw.parse().unwrap_or_else(|e| {
                tracing::warn!("Ignoring POST_DELETE_POLICY: {}", e);
                defaults.delete_policy
            }),
            Err(_) => defaults.delete_policy,
        };

        Self {
            default_page_size,
            max_page_size,
            delete_policy,
        }
    }
}

fn parse_var<T: FromStr>(key: &str) -> Option<T> {
    env::var(key).ok().and_then(|s| s.parse().ok())
}
