//! Client layer for the external IP pool registry.
//!
//! The registry owns all pool records; this module only lists pools by
//! label selector, fetches them by name, and flips their `status` label
//! under optimistic concurrency.

pub mod client;
pub mod error;
pub mod pool;

pub use client::{DEFAULT_REGISTRY_TIMEOUT, KubePoolRegistry, PoolRegistry, placement_selector};
pub use error::RegistryError;
pub use pool::{IPPool, IPPoolSpec, Pool, PoolStatus, STATUS_LABEL, normalize_labels};
