//! Error taxonomy for pool registry operations.
//!
//! `Conflict` is expected under contention and is retried by the
//! allocation engine, never surfaced to admission callers directly.

use thiserror::Error;

/// Errors returned by [`super::client::PoolRegistry`] implementations.
#[derive(Error, Debug)]
pub enum RegistryError {
    /// Transport, auth, or timeout failure talking to the registry.
    #[error("pool registry unavailable: {0}")]
    Unavailable(String),

    /// The named pool does not exist (or was deleted concurrently).
    #[error("pool {0} not found")]
    NotFound(String),

    /// The revision token was stale; another writer won the race.
    #[error("conflicting write to pool {0}")]
    Conflict(String),
}

impl RegistryError {
    /// Classify a kube API error for an operation on the named pool.
    pub fn from_kube(pool_name: &str, err: kube::Error) -> Self {
        match &err {
            kube::Error::Api(api_err) if api_err.code == 404 => {
                RegistryError::NotFound(pool_name.to_string())
            }
            kube::Error::Api(api_err) if api_err.code == 409 => {
                RegistryError::Conflict(pool_name.to_string())
            }
            _ => RegistryError::Unavailable(err.to_string()),
        }
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, RegistryError::Conflict(_))
    }

    pub fn is_not_found(&self) -> bool {
        matches!(self, RegistryError::NotFound(_))
    }
}

/// Result type alias for registry operations.
pub type Result<T> = std::result::Result<T, RegistryError>;
