//! In-memory catalog and connector used by the crate's tests.

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use sqlx::mysql::MySqlPoolOptions;
use sqlx::MySqlPool;

use common::config::AppConfig;
use common::models::ConnectionParams;

use super::discovery::{SchemaCatalog, SYSTEM_SCHEMAS};
use super::handle_cache::Connector;
use super::Registry;

/// Configuration with every key at its default.
pub(crate) fn test_config() -> AppConfig {
    AppConfig::from_lookup(|_| None).unwrap()
}

/// Registry over fakes with the given discovery TTL.
pub(crate) fn test_registry(
    catalog: Arc<StaticCatalog>,
    connector: Arc<FakeConnector>,
    ttl: Duration,
) -> Registry {
    let mut config = test_config().database;
    config.discovery_ttl = ttl;
    Registry::new(&config, catalog, connector)
}

/// SQL `LIKE` with `%` and `_` wildcards, no escapes.
pub(crate) fn like_match(pattern: &str, text: &str) -> bool {
    let p: Vec<char> = pattern.chars().collect();
    let t: Vec<char> = text.chars().collect();
    let (mut pi, mut ti) = (0, 0);
    let mut backtrack: Option<(usize, usize)> = None;

    while ti < t.len() {
        if pi < p.len() && (p[pi] == '_' || p[pi] == t[ti]) {
            pi += 1;
            ti += 1;
        } else if pi < p.len() && p[pi] == '%' {
            backtrack = Some((pi, ti));
            pi += 1;
        } else if let Some((bp, bt)) = backtrack {
            pi = bp + 1;
            ti = bt + 1;
            backtrack = Some((bp, bt + 1));
        } else {
            return false;
        }
    }
    p[pi..].iter().all(|c| *c == '%')
}

/// Catalog over a mutable list of schema names.
pub(crate) struct StaticCatalog {
    names: Mutex<Vec<String>>,
    calls: AtomicUsize,
    failing: AtomicBool,
}

impl StaticCatalog {
    pub(crate) fn new(names: &[&str]) -> Arc<Self> {
        Arc::new(Self {
            names: Mutex::new(names.iter().map(|n| n.to_string()).collect()),
            calls: AtomicUsize::new(0),
            failing: AtomicBool::new(false),
        })
    }

    pub(crate) fn set_names(&self, names: &[&str]) {
        *self.names.lock().unwrap() = names.iter().map(|n| n.to_string()).collect();
    }

    pub(crate) fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(crate) fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SchemaCatalog for StaticCatalog {
    async fn schema_names(
        &self,
        pattern: &str,
        excluded: &[String],
    ) -> Result<Vec<String>, sqlx::Error> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        if self.failing.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        let mut names: Vec<String> = self
            .names
            .lock()
            .unwrap()
            .iter()
            .filter(|n| like_match(pattern, n))
            .filter(|n| !SYSTEM_SCHEMAS.contains(&n.as_str()))
            .filter(|n| !excluded.contains(n))
            .cloned()
            .collect();
        names.sort();
        Ok(names)
    }
}

/// Connector that hands out unconnected pools and counts opens.
pub(crate) struct FakeConnector {
    delay: Duration,
    opens: AtomicUsize,
    fail_open: AtomicBool,
    reachable: AtomicBool,
}

impl FakeConnector {
    pub(crate) fn new(delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            delay,
            opens: AtomicUsize::new(0),
            fail_open: AtomicBool::new(false),
            reachable: AtomicBool::new(true),
        })
    }

    pub(crate) fn opens(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }

    pub(crate) fn set_fail_open(&self, fail: bool) {
        self.fail_open.store(fail, Ordering::SeqCst);
    }

    pub(crate) fn set_reachable(&self, reachable: bool) {
        self.reachable.store(reachable, Ordering::SeqCst);
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn open(&self, params: &ConnectionParams) -> Result<MySqlPool, sqlx::Error> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        tokio::time::sleep(self.delay).await;
        if self.fail_open.load(Ordering::SeqCst) {
            return Err(sqlx::Error::PoolTimedOut);
        }
        Ok(MySqlPoolOptions::new().connect_lazy_with(params.connect_options()))
    }

    async fn ping(&self, _pool: &MySqlPool) -> Result<(), sqlx::Error> {
        if self.reachable.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(sqlx::Error::PoolTimedOut)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_match() {
        assert!(like_match("sm_db_%", "sm_db_acme"));
        assert!(like_match("sm_db_%", "smXdbYacme"));
        assert!(!like_match("sm_db_%", "information_schema"));
        assert!(like_match("%", ""));
        assert!(like_match("a%c", "abbbc"));
        assert!(!like_match("a%c", "abbbd"));
    }
}
