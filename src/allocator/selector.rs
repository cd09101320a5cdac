//! First-fit pool selection.
//!
//! Deliberately simple: iterate pools in registry order and take the first
//! one matching the placement label with status `available`. First-fit
//! keeps selection deterministic for a given listing, which the claim
//! retry loop and the tests rely on.

use crate::registry::pool::{Pool, PoolStatus, STATUS_LABEL};

/// Pick the first pool whose normalized labels carry
/// `placement_key=placement_value` and `status=available`.
///
/// Returns `None` when no pool qualifies. The placement filter is applied
/// again here even though listings are already server-side filtered, so
/// the function is total over arbitrary pool slices. The selected pool is
/// returned by reference so callers write through the revision observed
/// in the listing.
pub fn select_available<'a>(
    pools: &'a [Pool],
    placement_key: &str,
    placement_value: &str,
) -> Option<&'a Pool> {
    let placement_key = placement_key.to_ascii_lowercase();
    pools.iter().find(|pool| {
        let labels = pool.normalized_labels();
        if labels.get(&placement_key).map(String::as_str) != Some(placement_value) {
            return false;
        }
        labels
            .get(STATUS_LABEL)
            .and_then(|value| PoolStatus::parse(value))
            == Some(PoolStatus::Available)
    })
}
