//! Connection handle cache.
//!
//! Maps connection keys to parameters and to lazily constructed pools. Each
//! key owns a single-flight slot, so concurrent first use of one key opens
//! exactly one pool while other keys proceed independently.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;
use tokio::sync::{Mutex, OnceCell, RwLock};

use common::config::ConnectionDefaults;
use common::errors::{AppError, AppResult};
use common::models::{ConnectionItem, ConnectionParams, DatabaseDescriptor};

/// Opens and probes MySQL pools.
#[async_trait]
pub trait Connector: Send + Sync {
    /// Opens a pool and establishes its first session.
    async fn open(&self, params: &ConnectionParams) -> Result<MySqlPool, sqlx::Error>;

    /// Runs a trivial round trip on `pool`.
    async fn ping(&self, pool: &MySqlPool) -> Result<(), sqlx::Error>;
}

/// Production connector backed by sqlx pools.
#[derive(Debug, Clone)]
pub struct MySqlConnector {
    max_connections: u32,
    acquire_timeout: Duration,
}

impl MySqlConnector {
    pub fn new(max_connections: u32, acquire_timeout: Duration) -> Self {
        Self {
            max_connections,
            acquire_timeout,
        }
    }

    fn options(&self) -> MySqlPoolOptions {
        MySqlPoolOptions::new()
            .max_connections(self.max_connections)
            .acquire_timeout(self.acquire_timeout)
    }

    /// Pool that connects on first use. Used for the catalog connection.
    pub fn lazy_pool(&self, params: &ConnectionParams) -> MySqlPool {
        self.options().connect_lazy_with(params.connect_options())
    }
}

#[async_trait]
impl Connector for MySqlConnector {
    async fn open(&self, params: &ConnectionParams) -> Result<MySqlPool, sqlx::Error> {
        self.options().connect_with(params.connect_options()).await
    }

    async fn ping(&self, pool: &MySqlPool) -> Result<(), sqlx::Error> {
        sqlx::query("SELECT 1").execute(pool).await.map(|_| ())
    }
}

/// A live handle bound to one tenant schema.
#[derive(Debug, Clone)]
pub struct ConnectionRef {
    params: Arc<ConnectionParams>,
    pool: MySqlPool,
}

impl ConnectionRef {
    pub fn key(&self) -> &str {
        &self.params.key
    }

    /// Schema every statement on this handle runs against.
    pub fn schema(&self) -> &str {
        &self.params.database
    }

    pub fn pool(&self) -> &MySqlPool {
        &self.pool
    }
}

type Slot = Arc<OnceCell<Result<ConnectionRef, String>>>;

pub struct HandleCache {
    connector: Arc<dyn Connector>,
    defaults: ConnectionDefaults,
    declared_keys: HashSet<String>,
    params: RwLock<HashMap<String, Arc<ConnectionParams>>>,
    slots: Mutex<HashMap<String, Slot>>,
}

impl HandleCache {
    /// Creates a cache with the declared connections pre-registered.
    pub fn new(
        connector: Arc<dyn Connector>,
        defaults: ConnectionDefaults,
        declared: &[ConnectionParams],
    ) -> Self {
        let params = declared
            .iter()
            .map(|p| (p.key.clone(), Arc::new(p.clone())))
            .collect();
        Self {
            connector,
            defaults,
            declared_keys: declared.iter().map(|p| p.key.clone()).collect(),
            params: RwLock::new(params),
            slots: Mutex::new(HashMap::new()),
        }
    }

    pub fn is_declared(&self, key: &str) -> bool {
        self.declared_keys.contains(key)
    }

    /// Registers parameters for a dynamic descriptor. Existing keys are left
    /// untouched; returns whether an entry was added.
    pub async fn register(&self, descriptor: &DatabaseDescriptor) -> bool {
        let mut params = self.params.write().await;
        if params.contains_key(&descriptor.connection_key) {
            return false;
        }
        let entry = self
            .defaults
            .params_for(&descriptor.connection_key, &descriptor.name);
        params.insert(descriptor.connection_key.clone(), Arc::new(entry));
        tracing::debug!(key = %descriptor.connection_key, database = %descriptor.name, "connection registered");
        true
    }

    async fn params_for(&self, descriptor: &DatabaseDescriptor) -> Arc<ConnectionParams> {
        if let Some(found) = self.params.read().await.get(&descriptor.connection_key) {
            return found.clone();
        }
        self.register(descriptor).await;
        let params = self.params.read().await;
        match params.get(&descriptor.connection_key) {
            Some(found) => found.clone(),
            None => Arc::new(
                self.defaults
                    .params_for(&descriptor.connection_key, &descriptor.name),
            ),
        }
    }

    /// Returns the handle for `descriptor`, constructing it on first use.
    ///
    /// Concurrent callers for one key share a single construction. A failed
    /// construction is handed to every waiter and then discarded, so the next
    /// call tries again.
    pub async fn get_or_create(&self, descriptor: &DatabaseDescriptor) -> AppResult<ConnectionRef> {
        let key = descriptor.connection_key.as_str();
        let slot = {
            let mut slots = self.slots.lock().await;
            slots.entry(key.to_string()).or_default().clone()
        };

        let params = self.params_for(descriptor).await;
        let outcome = slot.get_or_init(|| self.construct(params)).await;

        match outcome {
            Ok(handle) => Ok(handle.clone()),
            Err(message) => {
                let mut slots = self.slots.lock().await;
                if slots.get(key).is_some_and(|current| Arc::ptr_eq(current, &slot)) {
                    slots.remove(key);
                }
                Err(AppError::ConnectionFailure(message.clone()))
            }
        }
    }

    async fn construct(&self, params: Arc<ConnectionParams>) -> Result<ConnectionRef, String> {
        match self.connector.open(&params).await {
            Ok(pool) => {
                tracing::info!(key = %params.key, database = %params.database, "connection handle opened");
                Ok(ConnectionRef { params, pool })
            }
            Err(e) => {
                tracing::warn!(key = %params.key, database = %params.database, error = %e, "failed to open connection handle");
                Err(e.to_string())
            }
        }
    }

    /// Round-trips on an existing handle.
    pub async fn ping(&self, handle: &ConnectionRef) -> Result<(), sqlx::Error> {
        self.connector.ping(handle.pool()).await
    }

    /// Drops every dynamic entry and handle; declared ones survive.
    ///
    /// Slots still under construction are kept so a caller arriving after the
    /// invalidation joins the in-flight open instead of starting a second one.
    pub async fn invalidate_all(&self) {
        // Handles already lent out keep working until their holders drop them.
        self.slots
            .lock()
            .await
            .retain(|key, slot| self.declared_keys.contains(key) || !slot.initialized());
        self.params
            .write()
            .await
            .retain(|key, _| self.declared_keys.contains(key));
    }

    /// Snapshot of the registered entries, declared first then by key.
    pub async fn registered(&self) -> Vec<ConnectionItem> {
        let open: HashSet<String> = {
            let slots = self.slots.lock().await;
            slots
                .iter()
                .filter(|(_, slot)| matches!(slot.get(), Some(Ok(_))))
                .map(|(key, _)| key.clone())
                .collect()
        };
        let params = self.params.read().await;
        let mut items: Vec<ConnectionItem> = params
            .values()
            .map(|p| ConnectionItem::from_params(p, self.is_declared(&p.key), open.contains(&p.key)))
            .collect();
        items.sort_by(|a, b| b.declared.cmp(&a.declared).then_with(|| a.key.cmp(&b.key)));
        items
    }

    /// Number of constructed handles.
    pub async fn handle_count(&self) -> usize {
        let slots = self.slots.lock().await;
        slots
            .values()
            .filter(|slot| matches!(slot.get(), Some(Ok(_))))
            .count()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::testing::{test_config, FakeConnector};
    use tokio::task::JoinSet;

    fn cache(connector: Arc<FakeConnector>) -> Arc<HandleCache> {
        let config = test_config();
        Arc::new(HandleCache::new(
            connector,
            config.database.defaults.clone(),
            &config.database.declared,
        ))
    }

    #[tokio::test]
    async fn test_concurrent_first_use_opens_once() {
        let connector = FakeConnector::new(Duration::from_millis(50));
        let cache = cache(connector.clone());
        let descriptor = DatabaseDescriptor::dynamic("sm_db_acme", "acme");

        let mut tasks = JoinSet::new();
        for _ in 0..16 {
            let cache = cache.clone();
            let descriptor = descriptor.clone();
            tasks.spawn(async move { cache.get_or_create(&descriptor).await });
        }
        while let Some(joined) = tasks.join_next().await {
            let handle = joined.unwrap().unwrap();
            assert_eq!(handle.schema(), "sm_db_acme");
        }

        assert_eq!(connector.opens(), 1);
        assert_eq!(cache.handle_count().await, 1);
    }

    #[tokio::test]
    async fn test_failure_is_shared_then_retried() {
        let connector = FakeConnector::new(Duration::from_millis(50));
        connector.set_fail_open(true);
        let cache = cache(connector.clone());
        let descriptor = DatabaseDescriptor::dynamic("sm_db_acme", "acme");

        let mut tasks = JoinSet::new();
        for _ in 0..8 {
            let cache = cache.clone();
            let descriptor = descriptor.clone();
            tasks.spawn(async move { cache.get_or_create(&descriptor).await });
        }
        while let Some(joined) = tasks.join_next().await {
            let err = joined.unwrap().unwrap_err();
            assert!(matches!(err, AppError::ConnectionFailure(_)));
        }
        assert_eq!(connector.opens(), 1);
        assert_eq!(cache.handle_count().await, 0);

        connector.set_fail_open(false);
        assert!(cache.get_or_create(&descriptor).await.is_ok());
        assert_eq!(connector.opens(), 2);
    }

    #[tokio::test]
    async fn test_register_never_overwrites() {
        let cache = cache(FakeConnector::new(Duration::ZERO));

        assert!(cache.register(&DatabaseDescriptor::dynamic("sm_db_acme", "acme")).await);
        assert!(!cache.register(&DatabaseDescriptor::dynamic("other_acme", "acme")).await);
        assert!(!cache.register(&DatabaseDescriptor::dynamic("wlka", "wlka")).await);

        let items = cache.registered().await;
        let acme = items.iter().find(|i| i.key == "acme").unwrap();
        assert_eq!(acme.database, "sm_db_acme");
        let wlka = items.iter().find(|i| i.key == "wlka").unwrap();
        assert_eq!(wlka.database, "sm_db_wlka");
        assert!(wlka.declared);
    }

    #[tokio::test]
    async fn test_invalidate_keeps_declared() {
        let cache = cache(FakeConnector::new(Duration::ZERO));
        cache
            .get_or_create(&DatabaseDescriptor::declared("sm_db_wlka", "wlka"))
            .await
            .unwrap();
        cache
            .get_or_create(&DatabaseDescriptor::dynamic("sm_db_acme", "acme"))
            .await
            .unwrap();
        assert_eq!(cache.handle_count().await, 2);

        cache.invalidate_all().await;

        assert_eq!(cache.handle_count().await, 1);
        let keys: Vec<_> = cache.registered().await.into_iter().map(|i| i.key).collect();
        assert_eq!(keys, ["users_main", "wlka"]);
    }

    #[tokio::test]
    async fn test_invalidate_keeps_in_flight_construction() {
        let connector = FakeConnector::new(Duration::from_millis(200));
        let cache = cache(connector.clone());
        let descriptor = DatabaseDescriptor::dynamic("sm_db_acme", "acme");

        let first = {
            let cache = cache.clone();
            let descriptor = descriptor.clone();
            tokio::spawn(async move { cache.get_or_create(&descriptor).await })
        };
        tokio::time::sleep(Duration::from_millis(50)).await;
        cache.invalidate_all().await;

        let second = cache.get_or_create(&descriptor).await.unwrap();
        let first = first.await.unwrap().unwrap();
        assert_eq!(connector.opens(), 1);
        assert_eq!(first.schema(), second.schema());
        assert_eq!(cache.handle_count().await, 1);
    }

    #[tokio::test]
    async fn test_registered_reports_open_handles() {
        let cache = cache(FakeConnector::new(Duration::ZERO));
        cache
            .get_or_create(&DatabaseDescriptor::dynamic("sm_db_acme", "acme"))
            .await
            .unwrap();

        let items = cache.registered().await;
        let keys: Vec<_> = items.iter().map(|i| i.key.as_str()).collect();
        assert_eq!(keys, ["users_main", "wlka", "acme"]);
        assert!(items[2].connected);
        assert!(!items[0].connected);
    }
}
