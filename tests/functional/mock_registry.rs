//! Mock pool registry for functional tests.
//!
//! Simulates the registry's optimistic concurrency: every stored pool
//! carries a numeric revision, status writes must present the revision the
//! caller observed, and a stale revision fails with `Conflict` exactly as
//! the real API server would. A scripted conflict injector lets tests
//! force the retry paths deterministically.

use std::collections::BTreeMap;
use std::sync::Mutex;
use std::sync::atomic::{AtomicU32, Ordering};

use async_trait::async_trait;
use ippool_webhook::registry::client::PoolRegistry;
use ippool_webhook::registry::error::RegistryError;
use ippool_webhook::registry::pool::{Pool, PoolStatus, STATUS_LABEL, normalize_labels};

pub struct MockRegistry {
    pools: Mutex<Vec<Pool>>,
    /// Number of upcoming status writes to fail with `Conflict`.
    forced_conflicts: AtomicU32,
    /// When set, every call fails as if the registry were unreachable.
    pub unavailable: bool,
    writes: AtomicU32,
}

impl MockRegistry {
    pub fn new(pools: Vec<Pool>) -> Self {
        Self {
            pools: Mutex::new(pools),
            forced_conflicts: AtomicU32::new(0),
            unavailable: false,
            writes: AtomicU32::new(0),
        }
    }

    pub fn force_conflicts(&self, count: u32) {
        self.forced_conflicts.store(count, Ordering::SeqCst);
    }

    pub fn status_of(&self, name: &str) -> Option<PoolStatus> {
        self.pools
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name == name)
            .and_then(Pool::status)
    }

    /// Successful status writes so far.
    pub fn write_count(&self) -> u32 {
        self.writes.load(Ordering::SeqCst)
    }
}

/// Build a pool fixture with the given placement and status labels.
pub fn pool(name: &str, location: &str, status: &str) -> Pool {
    let mut labels = BTreeMap::new();
    labels.insert("location".to_string(), location.to_string());
    labels.insert(STATUS_LABEL.to_string(), status.to_string());
    Pool {
        name: name.to_string(),
        cidr: format!("10.42.{}.0/26", name.as_bytes().first().copied().unwrap_or(0)),
        labels,
        resource_version: Some("1".to_string()),
    }
}

#[async_trait]
impl PoolRegistry for MockRegistry {
    async fn list_pools(&self, selector: &str) -> Result<Vec<Pool>, RegistryError> {
        if self.unavailable {
            return Err(RegistryError::Unavailable("connection refused".into()));
        }
        let (key, value) = selector
            .split_once('=')
            .ok_or_else(|| RegistryError::Unavailable(format!("bad selector {selector}")))?;
        Ok(self
            .pools
            .lock()
            .unwrap()
            .iter()
            .filter(|p| p.normalized_labels().get(key).map(String::as_str) == Some(value))
            .cloned()
            .collect())
    }

    async fn get_pool(&self, name: &str) -> Result<Pool, RegistryError> {
        if self.unavailable {
            return Err(RegistryError::Unavailable("connection refused".into()));
        }
        self.pools
            .lock()
            .unwrap()
            .iter()
            .find(|p| p.name == name)
            .cloned()
            .ok_or_else(|| RegistryError::NotFound(name.to_string()))
    }

    async fn set_pool_status(&self, pool: &Pool, status: PoolStatus) -> Result<(), RegistryError> {
        if self.unavailable {
            return Err(RegistryError::Unavailable("connection refused".into()));
        }
        if pool.status() == Some(status) {
            return Ok(());
        }
        if self
            .forced_conflicts
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
        {
            return Err(RegistryError::Conflict(pool.name.clone()));
        }
        let mut pools = self.pools.lock().unwrap();
        let stored = pools
            .iter_mut()
            .find(|p| p.name == pool.name)
            .ok_or_else(|| RegistryError::NotFound(pool.name.clone()))?;
        if stored.resource_version != pool.resource_version {
            return Err(RegistryError::Conflict(pool.name.clone()));
        }
        stored.labels = normalize_labels(&stored.labels);
        stored
            .labels
            .insert(STATUS_LABEL.to_string(), status.as_label().to_string());
        let next = stored
            .resource_version
            .as_deref()
            .and_then(|rv| rv.parse::<u64>().ok())
            .unwrap_or(0)
            + 1;
        stored.resource_version = Some(next.to_string());
        self.writes.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }
}
