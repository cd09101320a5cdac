//! Claim annotation codec.
//!
//! The claim is recorded on the namespace under
//! `cni.projectcalico.org/ipv4pools`. Two encodings exist in the wild:
//! the current form is a single-element JSON array (`["pool-a"]`), while
//! older controllers wrote the bare pool name (`pool-a`). Reads accept
//! both; writes always emit the array form.

use thiserror::Error;

/// Annotation key holding the claimed pool name on a namespace.
pub const CLAIM_ANNOTATION: &str = "cni.projectcalico.org/ipv4pools";

/// Failures parsing the claim annotation on the DELETE path. These never
/// block namespace deletion; the caller logs and treats them as
/// nothing-to-release.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum AnnotationError {
    #[error("claim annotation is empty")]
    Empty,

    #[error("claim annotation lists {0} pools, expected exactly one")]
    MultiplePools(usize),

    #[error("claim annotation is not a pool name or JSON list: {0}")]
    Unparseable(String),
}

/// Canonical annotation value for a claimed pool: `["<name>"]`.
pub fn encode_claim(pool_name: &str) -> String {
    serde_json::json!([pool_name]).to_string()
}

/// Extract the claimed pool name, accepting both the array and the legacy
/// bare-string encodings.
pub fn parse_claim(raw: &str) -> Result<String, AnnotationError> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Err(AnnotationError::Empty);
    }
    if !trimmed.starts_with('[') {
        // Legacy encoding: the bare pool name.
        return Ok(trimmed.to_string());
    }
    let pools: Vec<String> = serde_json::from_str(trimmed)
        .map_err(|e| AnnotationError::Unparseable(e.to_string()))?;
    match pools.as_slice() {
        [pool] if !pool.is_empty() => Ok(pool.clone()),
        [] => Err(AnnotationError::Empty),
        [_] => Err(AnnotationError::Empty),
        many => Err(AnnotationError::MultiplePools(many.len())),
    }
}
