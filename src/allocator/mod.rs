//! Pool allocation engine: selection, claim/release orchestration, and the
//! namespace claim annotation codec.

pub mod annotation;
pub mod engine;
pub mod selector;

pub use annotation::{AnnotationError, CLAIM_ANNOTATION, encode_claim, parse_claim};
pub use engine::{Allocator, ClaimOutcome, MAX_ATTEMPTS, ReleaseOutcome};
pub use selector::select_available;
