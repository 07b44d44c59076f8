//! Database registry.
//!
//! Owns the declared connections, the current discovery snapshot and the
//! handle cache, and is the only way request handlers reach a tenant schema.
//! Declared names resolve without touching discovery; anything else must
//! appear in a fresh snapshot.

pub mod discovery;
pub mod handle_cache;
#[cfg(test)]
pub(crate) mod testing;

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Mutex, RwLock};

use common::config::DatabaseConfig;
use common::errors::{AppError, AppResult};
use common::models::{ConnectionItem, DatabaseDescriptor, DatabaseInfo};

pub use discovery::{Discovery, DiscoveryCache, InformationSchemaCatalog, SchemaCatalog};
pub use handle_cache::{ConnectionRef, Connector, HandleCache, MySqlConnector};

pub struct Registry {
    declared: Vec<DatabaseDescriptor>,
    discovery: Discovery,
    cache: HandleCache,
    ttl: Duration,
    snapshot: RwLock<Option<Arc<DiscoveryCache>>>,
    /// Serializes catalog queries so a stale snapshot is re-queried once.
    refresh_lock: Mutex<()>,
}

impl Registry {
    pub fn new(
        config: &DatabaseConfig,
        catalog: Arc<dyn SchemaCatalog>,
        connector: Arc<dyn Connector>,
    ) -> Self {
        let declared = config
            .declared
            .iter()
            .map(|p| DatabaseDescriptor::declared(p.database.as_str(), p.key.as_str()))
            .collect();
        Self {
            declared,
            discovery: Discovery::new(catalog, config.pattern.as_str()),
            cache: HandleCache::new(connector, config.defaults.clone(), &config.declared),
            ttl: config.discovery_ttl,
            snapshot: RwLock::new(None),
            refresh_lock: Mutex::new(()),
        }
    }

    pub fn declared(&self) -> &[DatabaseDescriptor] {
        &self.declared
    }

    /// Declared databases in declaration order, then discovered ones by name.
    pub async fn list_available(&self) -> Vec<DatabaseDescriptor> {
        let snapshot = self.snapshot().await;
        self.declared
            .iter()
            .chain(snapshot.entries.iter())
            .cloned()
            .collect()
    }

    pub async fn exists(&self, name: &str) -> bool {
        self.lookup(name).await.is_some()
    }

    /// Finds the descriptor for a schema name.
    pub async fn lookup(&self, name: &str) -> Option<DatabaseDescriptor> {
        if let Some(declared) = self.declared.iter().find(|d| d.name == name) {
            return Some(declared.clone());
        }
        self.snapshot().await.find(name).cloned()
    }

    async fn lookup_key(&self, key: &str) -> Option<DatabaseDescriptor> {
        if let Some(declared) = self.declared.iter().find(|d| d.connection_key == key) {
            return Some(declared.clone());
        }
        self.snapshot().await.find_key(key).cloned()
    }

    /// Returns a live handle bound to schema `name`.
    pub async fn resolve(&self, name: &str) -> AppResult<ConnectionRef> {
        let descriptor = self
            .lookup(name)
            .await
            .ok_or_else(|| AppError::UnknownDatabase(name.to_string()))?;
        self.cache.get_or_create(&descriptor).await
    }

    /// Returns a live handle for a declared connection key.
    pub async fn resolve_declared(&self, key: &str) -> AppResult<ConnectionRef> {
        let descriptor = self
            .declared
            .iter()
            .find(|d| d.connection_key == key)
            .ok_or_else(|| AppError::UnknownDatabase(key.to_string()))?;
        self.cache.get_or_create(descriptor).await
    }

    /// Re-runs discovery regardless of freshness and resets dynamic handles.
    /// Returns the number of dynamic databases found.
    pub async fn refresh(&self) -> usize {
        let _guard = self.refresh_lock.lock().await;
        let snapshot = self.rediscover().await;

        self.cache.invalidate_all().await;
        for descriptor in &snapshot.entries {
            self.cache.register(descriptor).await;
        }

        tracing::info!(count = snapshot.entries.len(), "database list refreshed");
        snapshot.entries.len()
    }

    /// Whether a round trip on connection `key` succeeds. Never errors.
    pub async fn test_connection(&self, key: &str) -> bool {
        let Some(descriptor) = self.lookup_key(key).await else {
            tracing::warn!(key = %key, "connection test for unknown key");
            return false;
        };
        let handle = match self.cache.get_or_create(&descriptor).await {
            Ok(handle) => handle,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "connection test failed to open handle");
                return false;
            }
        };
        match self.cache.ping(&handle).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "connection test failed");
                false
            }
        }
    }

    /// Descriptor for `name` plus current connectivity.
    pub async fn describe(&self, name: &str) -> AppResult<DatabaseInfo> {
        let descriptor = self
            .lookup(name)
            .await
            .ok_or_else(|| AppError::UnknownDatabase(name.to_string()))?;
        let connected = self.test_connection(&descriptor.connection_key).await;
        Ok(DatabaseInfo::new(descriptor, connected))
    }

    pub async fn registered_connections(&self) -> Vec<ConnectionItem> {
        self.cache.registered().await
    }

    pub async fn cached_handles(&self) -> usize {
        self.cache.handle_count().await
    }

    async fn fresh_snapshot(&self) -> Option<Arc<DiscoveryCache>> {
        self.snapshot
            .read()
            .await
            .clone()
            .filter(|s| s.is_fresh(self.ttl))
    }

    /// Current snapshot, re-queried when stale.
    async fn snapshot(&self) -> Arc<DiscoveryCache> {
        if let Some(snapshot) = self.fresh_snapshot().await {
            return snapshot;
        }
        let _guard = self.refresh_lock.lock().await;
        // Another caller may have refreshed while we waited.
        if let Some(snapshot) = self.fresh_snapshot().await {
            return snapshot;
        }
        self.rediscover().await
    }

    /// Queries the catalog and installs the result. Callers hold `refresh_lock`.
    async fn rediscover(&self) -> Arc<DiscoveryCache> {
        let found = self.discovery.discover(&self.declared).await;
        let snapshot = Arc::new(match found.failure {
            Some(e) => {
                tracing::warn!(error = %e, "serving declared databases only");
                DiscoveryCache::failed()
            }
            None => DiscoveryCache::new(found.entries),
        });
        *self.snapshot.write().await = Some(snapshot.clone());
        snapshot
    }
}

#[cfg(test)]
mod tests {
    use super::testing::{test_registry, FakeConnector, StaticCatalog};
    use super::*;
    use tokio::task::JoinSet;

    const TTL: Duration = Duration::from_secs(300);

    fn names(list: &[DatabaseDescriptor]) -> Vec<&str> {
        list.iter().map(|d| d.name.as_str()).collect()
    }

    #[tokio::test]
    async fn test_list_available_orders_declared_first() {
        let catalog = StaticCatalog::new(&[
            "sm_db_users_main",
            "sm_db_wlka",
            "sm_db_acme",
            "information_schema",
        ]);
        let registry = test_registry(catalog, FakeConnector::new(Duration::ZERO), TTL);

        let list = registry.list_available().await;
        assert_eq!(names(&list), ["sm_db_users_main", "sm_db_wlka", "sm_db_acme"]);
        assert!(list[0].is_declared());
        assert!(list[1].is_declared());
        assert_eq!(list[2], DatabaseDescriptor::dynamic("sm_db_acme", "acme"));
    }

    #[tokio::test]
    async fn test_snapshot_is_reused_within_ttl() {
        let catalog = StaticCatalog::new(&["sm_db_acme"]);
        let registry = test_registry(catalog.clone(), FakeConnector::new(Duration::ZERO), TTL);

        registry.list_available().await;
        registry.list_available().await;
        assert!(registry.exists("sm_db_acme").await);
        assert_eq!(catalog.calls(), 1);
    }

    #[tokio::test]
    async fn test_stale_snapshot_is_requeried() {
        let catalog = StaticCatalog::new(&["sm_db_acme"]);
        let registry =
            test_registry(catalog.clone(), FakeConnector::new(Duration::ZERO), Duration::ZERO);

        registry.list_available().await;
        catalog.set_names(&["sm_db_acme", "sm_db_beta"]);
        let list = registry.list_available().await;

        assert_eq!(catalog.calls(), 2);
        assert!(names(&list).contains(&"sm_db_beta"));
    }

    #[tokio::test]
    async fn test_resolve_unknown_database() {
        let catalog = StaticCatalog::new(&["sm_db_acme"]);
        let registry = test_registry(catalog, FakeConnector::new(Duration::ZERO), TTL);

        let err = registry.resolve("sm_db_missing").await.unwrap_err();
        assert!(matches!(err, AppError::UnknownDatabase(ref n) if n == "sm_db_missing"));
    }

    #[tokio::test]
    async fn test_declared_resolve_skips_discovery() {
        let catalog = StaticCatalog::new(&[]);
        let registry = test_registry(catalog.clone(), FakeConnector::new(Duration::ZERO), TTL);

        let handle = registry.resolve("sm_db_wlka").await.unwrap();
        assert_eq!(handle.key(), "wlka");
        assert_eq!(handle.schema(), "sm_db_wlka");
        let handle = registry.resolve_declared("users_main").await.unwrap();
        assert_eq!(handle.schema(), "sm_db_users_main");
        assert_eq!(catalog.calls(), 0);
    }

    #[tokio::test]
    async fn test_concurrent_resolve_builds_one_handle() {
        let catalog = StaticCatalog::new(&["sm_db_acme"]);
        let connector = FakeConnector::new(Duration::from_millis(50));
        let registry = Arc::new(test_registry(catalog, connector.clone(), TTL));

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let registry = registry.clone();
            tasks.spawn(async move { registry.resolve("sm_db_acme").await.map(|h| h.key().to_string()) });
        }
        while let Some(joined) = tasks.join_next().await {
            assert_eq!(joined.unwrap().unwrap(), "acme");
        }

        assert_eq!(connector.opens(), 1);
        assert_eq!(registry.cached_handles().await, 1);
    }

    #[tokio::test]
    async fn test_refresh_adds_and_removes() {
        let catalog = StaticCatalog::new(&["sm_db_acme"]);
        let registry = test_registry(catalog.clone(), FakeConnector::new(Duration::ZERO), TTL);
        assert!(registry.exists("sm_db_acme").await);

        catalog.set_names(&["sm_db_acme", "sm_db_beta"]);
        // Within the TTL the old snapshot is still served.
        assert!(!registry.exists("sm_db_beta").await);
        assert_eq!(registry.refresh().await, 2);
        assert!(registry.exists("sm_db_beta").await);

        catalog.set_names(&["sm_db_beta"]);
        assert_eq!(registry.refresh().await, 1);
        assert!(!registry.exists("sm_db_acme").await);
        assert!(matches!(
            registry.resolve("sm_db_acme").await,
            Err(AppError::UnknownDatabase(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_drops_dynamic_handles_only() {
        let catalog = StaticCatalog::new(&["sm_db_acme"]);
        let connector = FakeConnector::new(Duration::ZERO);
        let registry = test_registry(catalog, connector.clone(), TTL);

        registry.resolve("sm_db_acme").await.unwrap();
        registry.resolve("sm_db_wlka").await.unwrap();
        assert_eq!(registry.cached_handles().await, 2);

        registry.refresh().await;
        assert_eq!(registry.cached_handles().await, 1);

        registry.resolve("sm_db_acme").await.unwrap();
        assert_eq!(connector.opens(), 3);
    }

    #[tokio::test]
    async fn test_refresh_keeps_declared_params() {
        let catalog = StaticCatalog::new(&["wlka", "sm_db_wlka", "sm_db_acme"]);
        let mut config = super::testing::test_config().database;
        config.pattern = "%".into();
        config.declared[1].username = "wlka_user".into();
        let registry = Registry::new(&config, catalog, FakeConnector::new(Duration::ZERO));

        assert_eq!(registry.refresh().await, 1);
        let items = registry.registered_connections().await;
        let wlka = items.iter().find(|i| i.key == "wlka").unwrap();
        assert_eq!(wlka.database, "sm_db_wlka");
        assert_eq!(wlka.username, "wlka_user");
        assert!(items.iter().any(|i| i.key == "acme" && !i.declared));
    }

    #[tokio::test]
    async fn test_discovery_failure_serves_declared() {
        let catalog = StaticCatalog::new(&["sm_db_acme"]);
        catalog.set_failing(true);
        let registry = test_registry(catalog.clone(), FakeConnector::new(Duration::ZERO), TTL);

        let list = registry.list_available().await;
        assert_eq!(names(&list), ["sm_db_users_main", "sm_db_wlka"]);
        assert_eq!(registry.refresh().await, 0);
        assert!(registry.resolve("sm_db_wlka").await.is_ok());

        catalog.set_failing(false);
        assert_eq!(registry.refresh().await, 1);
    }

    #[tokio::test]
    async fn test_test_connection_never_errors() {
        let catalog = StaticCatalog::new(&["sm_db_acme"]);
        let connector = FakeConnector::new(Duration::ZERO);
        let registry = test_registry(catalog, connector.clone(), TTL);

        assert!(registry.test_connection("acme").await);
        assert!(!registry.test_connection("missing").await);

        connector.set_reachable(false);
        assert!(!registry.test_connection("wlka").await);

        connector.set_fail_open(true);
        assert!(!registry.test_connection("users_main").await);
    }

    #[tokio::test]
    async fn test_describe_reports_connectivity() {
        let catalog = StaticCatalog::new(&["sm_db_acme"]);
        let registry = test_registry(catalog, FakeConnector::new(Duration::ZERO), TTL);

        let info = registry.describe("sm_db_acme").await.unwrap();
        assert_eq!(info.connection, "acme");
        assert!(info.connected);
        assert!(matches!(
            registry.describe("sm_db_missing").await,
            Err(AppError::UnknownDatabase(_))
        ));
    }

    #[tokio::test]
    async fn test_refresh_during_first_resolve_opens_once() {
        let catalog = StaticCatalog::new(&["sm_db_acme"]);
        let connector = FakeConnector::new(Duration::from_millis(200));
        let registry = Arc::new(test_registry(catalog, connector.clone(), TTL));

        let first = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.resolve("sm_db_acme").await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        assert_eq!(registry.refresh().await, 1);

        let second = {
            let registry = registry.clone();
            tokio::spawn(async move { registry.resolve("sm_db_acme").await })
        };
        assert!(first.await.unwrap().is_ok());
        assert!(second.await.unwrap().is_ok());
        assert_eq!(connector.opens(), 1);
        assert_eq!(registry.cached_handles().await, 1);
    }
}
