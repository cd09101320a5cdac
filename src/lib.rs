//! ippool-webhook library crate
//!
//! A mutating admission webhook that assigns a Calico IP pool to each new
//! namespace and releases the pool when the namespace is deleted. Pools
//! live in an external registry (the cluster's IPPool resources) labeled
//! with a placement `location` and an availability `status`; the webhook
//! claims the first available pool matching its placement selector,
//! records the claim in the namespace's
//! `cni.projectcalico.org/ipv4pools` annotation, and flips the pool's
//! status label under optimistic concurrency so concurrent creations can
//! never share a pool.

pub mod allocator;
pub mod config;
pub mod health;
pub mod registry;
pub mod webhooks;

pub use allocator::{Allocator, ClaimOutcome, ReleaseOutcome};
pub use config::Settings;
pub use health::HealthState;
pub use registry::{KubePoolRegistry, Pool, PoolRegistry, PoolStatus, RegistryError};
pub use webhooks::{WebhookError, WebhookState, run_webhook_server};
