//! Database descriptor models.
//!
//! A [`DatabaseDescriptor`] is one logical tenant database the registry can
//! address, either declared in configuration or found by discovery.

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Where a descriptor came from.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash, ToSchema)]
#[serde(rename_all = "lowercase")]
pub enum DatabaseKind {
    /// Defined in static configuration at startup.
    Declared,
    /// Found in the server catalog by discovery.
    Dynamic,
}

impl std::fmt::Display for DatabaseKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            DatabaseKind::Declared => write!(f, "declared"),
            DatabaseKind::Dynamic => write!(f, "dynamic"),
        }
    }
}

/// A logical database and the connection key it resolves to.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct DatabaseDescriptor {
    /// Full schema name on the server (e.g. `sm_db_acme`).
    pub name: String,
    /// Short connection key (e.g. `acme`).
    #[serde(rename = "connection")]
    pub connection_key: String,
    /// Declared or dynamic.
    #[serde(rename = "type")]
    pub kind: DatabaseKind,
}

impl DatabaseDescriptor {
    /// Creates a declared descriptor.
    pub fn declared(name: impl Into<String>, connection_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection_key: connection_key.into(),
            kind: DatabaseKind::Declared,
        }
    }

    /// Creates a dynamic descriptor.
    pub fn dynamic(name: impl Into<String>, connection_key: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            connection_key: connection_key.into(),
            kind: DatabaseKind::Dynamic,
        }
    }

    pub fn is_declared(&self) -> bool {
        self.kind == DatabaseKind::Declared
    }
}

/// Response body for `GET /api/databases`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DatabaseList {
    pub databases: Vec<DatabaseDescriptor>,
    pub total: usize,
}

impl From<Vec<DatabaseDescriptor>> for DatabaseList {
    fn from(databases: Vec<DatabaseDescriptor>) -> Self {
        Self {
            total: databases.len(),
            databases,
        }
    }
}

/// Response body for `POST /api/databases/refresh`.
#[derive(Debug, Serialize, ToSchema)]
pub struct RefreshResult {
    /// Number of dynamic databases found by the refresh.
    pub count: usize,
    pub message: String,
}

/// Descriptor plus live connectivity, for `GET /api/databases/{name}`.
#[derive(Debug, Serialize, ToSchema)]
pub struct DatabaseInfo {
    pub name: String,
    pub connection: String,
    #[serde(rename = "type")]
    pub kind: DatabaseKind,
    pub connected: bool,
}

impl DatabaseInfo {
    pub fn new(descriptor: DatabaseDescriptor, connected: bool) -> Self {
        Self {
            name: descriptor.name,
            connection: descriptor.connection_key,
            kind: descriptor.kind,
            connected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_descriptor_wire_names() {
        let json = serde_json::to_value(DatabaseDescriptor::dynamic("sm_db_acme", "acme")).unwrap();
        assert_eq!(
            json,
            serde_json::json!({"name": "sm_db_acme", "connection": "acme", "type": "dynamic"})
        );
    }

    #[test]
    fn test_list_counts_entries() {
        let list = DatabaseList::from(vec![
            DatabaseDescriptor::declared("sm_db_wlka", "wlka"),
            DatabaseDescriptor::dynamic("sm_db_acme", "acme"),
        ]);
        assert_eq!(list.total, 2);
    }
}
