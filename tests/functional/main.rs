// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Functional tests for the pool allocation engine and admission decisions.
//!
//! These tests verify claim/release behavior under contention and the
//! end-to-end admission scenarios WITHOUT requiring a live Kubernetes
//! cluster. The pool registry is mocked with revision-checked writes so
//! conflict handling exercises the same code paths as production.
//!
//! ```bash
//! # Run all functional tests
//! cargo test --test functional
//!
//! # Run specific test
//! cargo test --test functional test_concurrent_claims_one_pool
//! ```

mod allocation_tests;
mod mock_registry;
