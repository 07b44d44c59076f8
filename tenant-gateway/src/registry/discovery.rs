//! Tenant discovery.
//!
//! Finds tenant schemas in the server catalog and turns them into dynamic
//! [`DatabaseDescriptor`]s. Failures never propagate: the caller gets an empty
//! result plus the failure, and degrades to declared databases only.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::{Duration, Instant};

use async_trait::async_trait;
use sqlx::{MySql, MySqlPool, QueryBuilder};

use common::errors::AppError;
use common::models::DatabaseDescriptor;

/// Schemas that are never tenants.
pub const SYSTEM_SCHEMAS: [&str; 4] = ["information_schema", "mysql", "performance_schema", "sys"];

/// Literal prefix stripped from schema names to form connection keys.
pub const CONNECTION_PREFIX: &str = "sm_db_";

/// How long a snapshot produced by a failed discovery stays fresh, at most.
pub const FAILED_SNAPSHOT_TTL: Duration = Duration::from_secs(10);

/// Derives the connection key for a dynamic schema name.
pub fn connection_key(name: &str) -> &str {
    name.strip_prefix(CONNECTION_PREFIX).unwrap_or(name)
}

/// Source of schema names.
#[async_trait]
pub trait SchemaCatalog: Send + Sync {
    /// Returns schema names matching the LIKE `pattern`, minus system schemas
    /// and `excluded`, ordered by name.
    async fn schema_names(&self, pattern: &str, excluded: &[String])
        -> Result<Vec<String>, sqlx::Error>;
}

/// Catalog backed by `INFORMATION_SCHEMA.SCHEMATA` on the admin connection.
pub struct InformationSchemaCatalog {
    pool: MySqlPool,
}

impl InformationSchemaCatalog {
    pub fn new(pool: MySqlPool) -> Self {
        Self { pool }
    }
}

/// Builds the catalog query with every value bound as a parameter.
pub fn catalog_query(pattern: &str, excluded: &[String]) -> QueryBuilder<'static, MySql> {
    let mut builder = QueryBuilder::new(
        "SELECT CAST(SCHEMA_NAME AS CHAR) AS database_name \
         FROM INFORMATION_SCHEMA.SCHEMATA WHERE SCHEMA_NAME LIKE ",
    );
    builder.push_bind(pattern.to_string());

    builder.push(" AND SCHEMA_NAME NOT IN (");
    let mut separated = builder.separated(", ");
    for schema in SYSTEM_SCHEMAS {
        separated.push_bind(schema);
    }
    separated.push_unseparated(")");

    if !excluded.is_empty() {
        builder.push(" AND SCHEMA_NAME NOT IN (");
        let mut separated = builder.separated(", ");
        for name in excluded {
            separated.push_bind(name.clone());
        }
        separated.push_unseparated(")");
    }

    builder.push(" ORDER BY SCHEMA_NAME");
    builder
}

#[async_trait]
impl SchemaCatalog for InformationSchemaCatalog {
    async fn schema_names(
        &self,
        pattern: &str,
        excluded: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        catalog_query(pattern, excluded)
            .build_query_scalar::<String>()
            .fetch_all(&self.pool)
            .await
    }
}

/// Outcome of one discovery pass.
#[derive(Debug)]
pub struct Discovered {
    /// Dynamic descriptors, ordered by name.
    pub entries: Vec<DatabaseDescriptor>,
    /// Set when the catalog query failed; `entries` is then empty.
    pub failure: Option<AppError>,
}

/// Queries the catalog and filters the result against the declared set.
pub struct Discovery {
    catalog: Arc<dyn SchemaCatalog>,
    pattern: String,
}

impl Discovery {
    pub fn new(catalog: Arc<dyn SchemaCatalog>, pattern: impl Into<String>) -> Self {
        Self {
            catalog,
            pattern: pattern.into(),
        }
    }

    /// Discovers dynamic databases, excluding everything in `declared`.
    ///
    /// A schema is dropped when its name is declared, when its key equals a
    /// declared key, or when an earlier (lexicographically smaller) schema
    /// already produced the same key.
    pub async fn discover(&self, declared: &[DatabaseDescriptor]) -> Discovered {
        let excluded: Vec<String> = declared.iter().map(|d| d.name.clone()).collect();

        let mut names = match self.catalog.schema_names(&self.pattern, &excluded).await {
            Ok(names) => names,
            Err(e) => {
                tracing::warn!(pattern = %self.pattern, error = %e, "tenant discovery failed");
                return Discovered {
                    entries: Vec::new(),
                    failure: Some(AppError::DiscoveryFailure(e.to_string())),
                };
            }
        };

        // The server orders by its collation; listings must be byte-ordered.
        names.sort();
        names.dedup();

        let mut taken: HashSet<String> =
            declared.iter().map(|d| d.connection_key.clone()).collect();
        let mut entries = Vec::with_capacity(names.len());

        for name in names {
            if SYSTEM_SCHEMAS.contains(&name.as_str()) || excluded.contains(&name) {
                continue;
            }
            let key = connection_key(&name);
            if key.is_empty() {
                continue;
            }
            if !taken.insert(key.to_string()) {
                tracing::warn!(schema = %name, key = %key, "skipping schema whose connection key is already taken");
                continue;
            }
            entries.push(DatabaseDescriptor::dynamic(name.as_str(), key));
        }

        tracing::debug!(pattern = %self.pattern, count = entries.len(), "tenant discovery finished");
        Discovered {
            entries,
            failure: None,
        }
    }
}

/// Timestamped discovery result owned by the registry.
#[derive(Debug, Clone)]
pub struct DiscoveryCache {
    pub fetched_at: Instant,
    pub entries: Vec<DatabaseDescriptor>,
    /// The snapshot stands in for a failed discovery.
    pub failed: bool,
}

impl DiscoveryCache {
    pub fn new(entries: Vec<DatabaseDescriptor>) -> Self {
        Self {
            fetched_at: Instant::now(),
            entries,
            failed: false,
        }
    }

    pub fn failed() -> Self {
        Self {
            fetched_at: Instant::now(),
            entries: Vec::new(),
            failed: true,
        }
    }

    /// Whether the snapshot may still be served under `ttl`.
    pub fn is_fresh(&self, ttl: Duration) -> bool {
        let ttl = if self.failed {
            ttl.min(FAILED_SNAPSHOT_TTL)
        } else {
            ttl
        };
        self.fetched_at.elapsed() < ttl
    }

    pub fn find(&self, name: &str) -> Option<&DatabaseDescriptor> {
        self.entries.iter().find(|d| d.name == name)
    }

    pub fn find_key(&self, key: &str) -> Option<&DatabaseDescriptor> {
        self.entries.iter().find(|d| d.connection_key == key)
    }
}
