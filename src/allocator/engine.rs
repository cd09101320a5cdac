//! Claim/release state machine over the pool registry.
//!
//! A pool moves `available -> used` on claim and back on release, with the
//! registry's revision check as the only serialization point. Both
//! transitions are idempotent: re-claiming a pool already observed as used
//! and re-releasing one already available are no-op successes, which is
//! what makes the webhook safe under at-least-once delivery.

use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::registry::client::{PoolRegistry, placement_selector};
use crate::registry::error::{RegistryError, Result};
use crate::registry::pool::PoolStatus;

use super::selector::select_available;

/// Bounded attempts for claim and release. Contention is rare (one write
/// per namespace lifecycle event), so there is no backoff between
/// attempts.
pub const MAX_ATTEMPTS: u32 = 3;

/// Outcome of a claim attempt. `NoPoolAvailable` is a business outcome,
/// not an error: the admission layer turns it into a denial.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ClaimOutcome {
    Claimed(String),
    NoPoolAvailable,
}

/// Outcome of a release. `AlreadyReleased` covers pools that are already
/// available and pools that no longer exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ReleaseOutcome {
    Released,
    AlreadyReleased,
}

/// Orchestrates pool selection and status transitions.
#[derive(Clone)]
pub struct Allocator {
    registry: Arc<dyn PoolRegistry>,
}

impl Allocator {
    pub fn new(registry: Arc<dyn PoolRegistry>) -> Self {
        Self { registry }
    }

    /// Claim one available pool matching the placement label.
    ///
    /// Lists candidates server-side, first-fits, and writes `status=used`
    /// through the revision observed in the listing. A conflict means a
    /// concurrent claimant won that pool; the whole sequence is retried so
    /// the loser re-lists and picks a different pool instead of reporting
    /// false success. After [`MAX_ATTEMPTS`] conflicts the claim surfaces
    /// as a registry failure.
    pub async fn claim(&self, placement_key: &str, placement_value: &str) -> Result<ClaimOutcome> {
        let selector = placement_selector(placement_key, placement_value);
        for attempt in 1..=MAX_ATTEMPTS {
            let pools = self.registry.list_pools(&selector).await?;
            let Some(pool) = select_available(&pools, placement_key, placement_value) else {
                debug!(selector = %selector, attempt, "No available pool in listing");
                return Ok(ClaimOutcome::NoPoolAvailable);
            };
            let name = pool.name.clone();
            match self.registry.set_pool_status(pool, PoolStatus::Used).await {
                Ok(()) => {
                    info!(pool = %name, selector = %selector, "Claimed pool");
                    return Ok(ClaimOutcome::Claimed(name));
                }
                Err(e) if e.is_conflict() => {
                    debug!(pool = %name, attempt, "Lost claim race, re-listing");
                }
                Err(e) if e.is_not_found() => {
                    // Pool deleted between list and write; re-list.
                    debug!(pool = %name, attempt, "Pool vanished during claim, re-listing");
                }
                Err(e) => return Err(e),
            }
        }
        Err(RegistryError::Unavailable(format!(
            "claim for {} still conflicted after {} attempts",
            selector, MAX_ATTEMPTS
        )))
    }

    /// Return a pool to the available state.
    ///
    /// A missing pool or one already marked available counts as released:
    /// the registry entry may have been cleaned up or released
    /// independently, and a repeated webhook delivery must not error.
    pub async fn release(&self, pool_name: &str) -> Result<ReleaseOutcome> {
        for attempt in 1..=MAX_ATTEMPTS {
            let pool = match self.registry.get_pool(pool_name).await {
                Ok(pool) => pool,
                Err(e) if e.is_not_found() => {
                    debug!(pool = %pool_name, "Pool no longer exists, nothing to release");
                    return Ok(ReleaseOutcome::AlreadyReleased);
                }
                Err(e) => return Err(e),
            };
            if pool.status() == Some(PoolStatus::Available) {
                debug!(pool = %pool_name, "Pool already available");
                return Ok(ReleaseOutcome::AlreadyReleased);
            }
            match self
                .registry
                .set_pool_status(&pool, PoolStatus::Available)
                .await
            {
                Ok(()) => {
                    info!(pool = %pool_name, "Released pool");
                    return Ok(ReleaseOutcome::Released);
                }
                Err(e) if e.is_conflict() => {
                    // Benign: the target state is idempotent, re-read and retry.
                    debug!(pool = %pool_name, attempt, "Conflicting release, retrying");
                }
                Err(e) if e.is_not_found() => {
                    return Ok(ReleaseOutcome::AlreadyReleased);
                }
                Err(e) => return Err(e),
            }
        }
        warn!(pool = %pool_name, "Release still conflicted after {} attempts", MAX_ATTEMPTS);
        Err(RegistryError::Unavailable(format!(
            "release of {} still conflicted after {} attempts",
            pool_name, MAX_ATTEMPTS
        )))
    }
}
