//! Application configuration.
//!
//! Everything is read from environment-style key/value pairs. `main` loads a
//! `.env` file first; tests go through [`AppConfig::from_lookup`] with a map.

use std::time::Duration;

use crate::errors::{AppError, AppResult};
use crate::models::ConnectionParams;

/// Default discovery pattern.
pub const DEFAULT_PATTERN: &str = "sm_db_%";

/// One statically declared connection and where its overrides come from.
struct DeclaredSpec {
    key: &'static str,
    default_database: &'static str,
    /// Suffix of `DB_DATABASE_*`, `DB_HOST_*` and `DB_PORT_*`.
    database_suffix: &'static str,
    /// Suffix of `DB_USERNAME_*` and `DB_PASSWORD_*`.
    credential_suffix: &'static str,
}

const DECLARED: [DeclaredSpec; 2] = [
    DeclaredSpec {
        key: "users_main",
        default_database: "sm_db_users_main",
        database_suffix: "USERS_MAIN",
        credential_suffix: "MAIN",
    },
    DeclaredSpec {
        key: "wlka",
        default_database: "sm_db_wlka",
        database_suffix: "WLKA",
        credential_suffix: "WLKA",
    },
];

/// Top-level configuration.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Listen host.
    pub host: String,
    /// Listen port.
    pub port: u16,
    /// Optional static bearer token for `/api/*`.
    pub api_token: Option<String>,
    /// Database discovery and connection settings.
    pub database: DatabaseConfig,
}

/// Defaults applied to every dynamically discovered connection.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionDefaults {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub charset: String,
    pub collation: String,
}

impl ConnectionDefaults {
    /// Parameters for a dynamic schema under these defaults.
    pub fn params_for(&self, key: &str, database: &str) -> ConnectionParams {
        ConnectionParams {
            key: key.to_string(),
            host: self.host.clone(),
            port: self.port,
            username: self.username.clone(),
            password: self.password.clone(),
            database: database.to_string(),
            charset: self.charset.clone(),
            collation: self.collation.clone(),
        }
    }
}

/// Discovery, pooling and declared-connection settings.
#[derive(Debug, Clone)]
pub struct DatabaseConfig {
    /// LIKE pattern for tenant schemas.
    pub pattern: String,
    /// How long a discovery snapshot stays fresh.
    pub discovery_ttl: Duration,
    /// Pool acquire timeout.
    pub connect_timeout: Duration,
    /// Max sessions per connection handle.
    pub max_connections: u32,
    pub defaults: ConnectionDefaults,
    /// Declared connections, in declaration order.
    pub declared: Vec<ConnectionParams>,
    /// Declared key used for the schema catalog query.
    pub admin_connection: String,
    /// Declared key the attendance and message modules are bound to.
    pub module_connection: String,
}

impl DatabaseConfig {
    /// Looks up a declared connection by key.
    pub fn declared_connection(&self, key: &str) -> Option<&ConnectionParams> {
        self.declared.iter().find(|p| p.key == key)
    }
}

impl AppConfig {
    /// Loads configuration from the process environment.
    pub fn from_env() -> AppResult<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from an arbitrary key/value source.
    pub fn from_lookup<F>(lookup: F) -> AppResult<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let get_or = |key: &str, default: &str| get(key).unwrap_or_else(|| default.to_string());

        let defaults = ConnectionDefaults {
            host: get_or("DB_HOST", "127.0.0.1"),
            port: parse_or(&get, "DB_PORT", 3306)?,
            username: get_or("DB_USERNAME", "root"),
            password: lookup("DB_PASSWORD").unwrap_or_default(),
            charset: get_or("DB_CHARSET", "utf8mb4"),
            collation: get_or("DB_COLLATION", "utf8mb4_unicode_ci"),
        };

        let mut declared = Vec::with_capacity(DECLARED.len());
        for spec in &DECLARED {
            let d = spec.database_suffix;
            let c = spec.credential_suffix;
            declared.push(ConnectionParams {
                key: spec.key.to_string(),
                host: get(&format!("DB_HOST_{d}")).unwrap_or_else(|| defaults.host.clone()),
                port: parse_or(&get, &format!("DB_PORT_{d}"), defaults.port)?,
                username: get(&format!("DB_USERNAME_{c}"))
                    .unwrap_or_else(|| defaults.username.clone()),
                password: get(&format!("DB_PASSWORD_{c}"))
                    .unwrap_or_else(|| defaults.password.clone()),
                database: get_or(&format!("DB_DATABASE_{d}"), spec.default_database),
                charset: defaults.charset.clone(),
                collation: defaults.collation.clone(),
            });
        }

        let database = DatabaseConfig {
            pattern: get_or("DB_PATTERN", DEFAULT_PATTERN),
            discovery_ttl: Duration::from_secs(parse_or(&get, "DB_DISCOVERY_TTL", 300)?),
            connect_timeout: Duration::from_secs(parse_or(&get, "DB_CONNECT_TIMEOUT", 5)?),
            max_connections: parse_or(&get, "DB_MAX_CONNECTIONS", 5)?,
            defaults,
            declared,
            admin_connection: get_or("DB_ADMIN_CONNECTION", "users_main"),
            module_connection: get_or("DB_MODULE_CONNECTION", "wlka"),
        };

        for (name, key) in [
            ("DB_ADMIN_CONNECTION", &database.admin_connection),
            ("DB_MODULE_CONNECTION", &database.module_connection),
        ] {
            if database.declared_connection(key).is_none() {
                return Err(AppError::Config(format!(
                    "{name} must name a declared connection, got '{key}'"
                )));
            }
        }

        Ok(Self {
            host: get_or("SERVER_HOST", "0.0.0.0"),
            port: parse_or(&get, "SERVER_PORT", 8080)?,
            api_token: get("API_TOKEN"),
            database,
        })
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> AppResult<T>
where
    T: std::str::FromStr,
    T::Err: std::fmt::Display,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("invalid {key} '{raw}': {e}"))),
        None => Ok(default),
    }
}
