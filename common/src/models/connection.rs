//! Connection parameter models.
//!
//! [`ConnectionParams`] is the typed entry the handle cache keys by
//! connection key; [`ConnectionItem`] is its password-free public view.

use serde::{Deserialize, Serialize};
use sqlx::mysql::MySqlConnectOptions;
use utoipa::ToSchema;

/// Everything needed to open a MySQL session against one tenant schema.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConnectionParams {
    /// Short connection key (e.g. `users_main`, `acme`).
    pub key: String,
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Database password (not serialized in responses).
    #[serde(skip_serializing, default)]
    pub password: String,
    /// Schema name on the server.
    pub database: String,
    /// Session character set.
    pub charset: String,
    /// Session collation.
    pub collation: String,
}

impl ConnectionParams {
    /// Builds sqlx connect options for this connection.
    pub fn connect_options(&self) -> MySqlConnectOptions {
        let mut options = MySqlConnectOptions::new()
            .host(&self.host)
            .port(self.port)
            .username(&self.username)
            .database(&self.database)
            .charset(&self.charset)
            .collation(&self.collation);
        if !self.password.is_empty() {
            options = options.password(&self.password);
        }
        options
    }
}

impl std::fmt::Debug for ConnectionParams {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionParams")
            .field("key", &self.key)
            .field("host", &self.host)
            .field("port", &self.port)
            .field("username", &self.username)
            .field("password", &"***")
            .field("database", &self.database)
            .field("charset", &self.charset)
            .field("collation", &self.collation)
            .finish()
    }
}

/// Connection item for API responses (excludes sensitive data).
#[derive(Debug, Clone, Serialize, Deserialize, ToSchema)]
pub struct ConnectionItem {
    /// Connection key.
    pub key: String,
    /// Schema name on the server.
    pub database: String,
    /// Database host.
    pub host: String,
    /// Database port.
    pub port: u16,
    /// Database username.
    pub username: String,
    /// Whether the connection comes from static configuration.
    pub declared: bool,
    /// Whether a live handle has been constructed for this key.
    pub connected: bool,
}

impl ConnectionItem {
    /// Creates the public view of a registered connection.
    pub fn from_params(params: &ConnectionParams, declared: bool, connected: bool) -> Self {
        Self {
            key: params.key.clone(),
            database: params.database.clone(),
            host: params.host.clone(),
            port: params.port,
            username: params.username.clone(),
            declared,
            connected,
        }
    }
}
