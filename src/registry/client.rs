//! Pool registry accessor.
//!
//! [`PoolRegistry`] is the narrow seam between the allocation engine and
//! the external registry; [`KubePoolRegistry`] is the production
//! implementation over the Calico IPPool API. The trait exists so the
//! engine and the admission decision builder can be exercised against an
//! in-memory registry in tests.
//!
//! Listing filters server-side with a literal `key=value` label selector,
//! so a pool whose placement key is stored with different casing (say
//! `Location` instead of `location`) is invisible to claims until a
//! status write normalizes its label keys. Pools are expected to carry
//! lower-case keys to begin with; the normalization on write converges
//! strays rather than legitimizing them.

use std::time::Duration;

use async_trait::async_trait;
use kube::api::{ListParams, Patch, PatchParams};
use kube::{Api, Client};
use serde_json::{Value, json};
use tracing::debug;

use super::error::{RegistryError, Result};
use super::pool::{IPPool, Pool, PoolStatus, STATUS_LABEL, normalize_labels};

/// Default per-call timeout for registry operations. Kept well under the
/// API server's webhook timeout so we fail fast instead of letting the
/// caller time out first.
pub const DEFAULT_REGISTRY_TIMEOUT: Duration = Duration::from_secs(5);

/// Read and label-write access to the pool registry.
///
/// The registry is the sole owner of pool records: implementations must
/// never create or delete pools, only read them and mutate the `status`
/// label.
#[async_trait]
pub trait PoolRegistry: Send + Sync {
    /// List pools matching a `key=value` label selector. An empty match is
    /// not an error.
    async fn list_pools(&self, selector: &str) -> Result<Vec<Pool>>;

    /// Fetch one pool by name.
    async fn get_pool(&self, name: &str) -> Result<Pool>;

    /// Set the `status` label of a pool, writing through the revision
    /// token captured in `pool`. Fails with [`RegistryError::Conflict`]
    /// when that revision is stale, which is the sole serialization point
    /// for concurrent claims.
    ///
    /// Writing the status the pool was already observed to have is a
    /// no-op success, making double-claim and double-release idempotent.
    /// All other labels are preserved; mixed-case duplicates of known
    /// keys are collapsed to their lower-case form.
    async fn set_pool_status(&self, pool: &Pool, status: PoolStatus) -> Result<()>;
}

/// Production registry backed by the cluster's IPPool API.
pub struct KubePoolRegistry {
    api: Api<IPPool>,
    timeout: Duration,
}

impl KubePoolRegistry {
    pub fn new(client: Client, timeout: Duration) -> Self {
        Self {
            api: Api::all(client),
            timeout,
        }
    }

    async fn bounded<T, F>(&self, operation: &str, fut: F) -> Result<T>
    where
        F: std::future::Future<Output = std::result::Result<T, kube::Error>>,
    {
        match tokio::time::timeout(self.timeout, fut).await {
            Ok(result) => result.map_err(|e| RegistryError::Unavailable(e.to_string())),
            Err(_) => Err(RegistryError::Unavailable(format!(
                "{} timed out after {:?}",
                operation, self.timeout
            ))),
        }
    }
}

/// Build the label portion of the status merge patch: the normalized label
/// set with `status` overridden, plus explicit nulls for any mixed-case
/// keys being collapsed (a merge patch only removes keys set to null).
fn status_label_patch(pool: &Pool, status: PoolStatus) -> serde_json::Map<String, Value> {
    let mut labels = serde_json::Map::new();
    for key in pool.labels.keys() {
        if *key != key.to_ascii_lowercase() {
            labels.insert(key.clone(), Value::Null);
        }
    }
    let mut normalized = normalize_labels(&pool.labels);
    normalized.insert(STATUS_LABEL.to_string(), status.as_label().to_string());
    for (key, value) in normalized {
        labels.insert(key, Value::String(value));
    }
    labels
}

#[async_trait]
impl PoolRegistry for KubePoolRegistry {
    async fn list_pools(&self, selector: &str) -> Result<Vec<Pool>> {
        let params = ListParams::default().labels(selector);
        let list = self.bounded("list pools", self.api.list(&params)).await?;
        Ok(list.items.iter().map(Pool::from_resource).collect())
    }

    async fn get_pool(&self, name: &str) -> Result<Pool> {
        match tokio::time::timeout(self.timeout, self.api.get(name)).await {
            Ok(Ok(resource)) => Ok(Pool::from_resource(&resource)),
            Ok(Err(e)) => Err(RegistryError::from_kube(name, e)),
            Err(_) => Err(RegistryError::Unavailable(format!(
                "get pool {} timed out after {:?}",
                name, self.timeout
            ))),
        }
    }

    async fn set_pool_status(&self, pool: &Pool, status: PoolStatus) -> Result<()> {
        if pool.status() == Some(status) {
            debug!(pool = %pool.name, status = %status, "Pool already in target status");
            return Ok(());
        }

        let Some(revision) = pool.resource_version.as_deref() else {
            return Err(RegistryError::Unavailable(format!(
                "pool {} has no resourceVersion to write through",
                pool.name
            )));
        };

        // Including resourceVersion in the merge patch makes the API
        // server reject the write with 409 when the observed revision is
        // stale.
        let patch = json!({
            "metadata": {
                "resourceVersion": revision,
                "labels": Value::Object(status_label_patch(pool, status)),
            }
        });

        debug!(pool = %pool.name, status = %status, revision, "Writing pool status");
        match tokio::time::timeout(
            self.timeout,
            self.api
                .patch(&pool.name, &PatchParams::default(), &Patch::Merge(&patch)),
        )
        .await
        {
            Ok(Ok(_)) => Ok(()),
            Ok(Err(e)) => Err(RegistryError::from_kube(&pool.name, e)),
            Err(_) => Err(RegistryError::Unavailable(format!(
                "patch pool {} timed out after {:?}",
                pool.name, self.timeout
            ))),
        }
    }
}

/// Build the `key=value` selector string used for server-side filtering.
pub fn placement_selector(key: &str, value: &str) -> String {
    format!("{}={}", key, value)
}

#[allow(dead_code)]
fn _assert_object_safe(_: &dyn PoolRegistry) {}
