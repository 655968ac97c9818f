// Test code is allowed to panic on failure
#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::indexing_slicing,
    clippy::panic
)]

//! Unit tests for the admission controller
//!
//! This module contains tests for:
//! - The validation pipeline end to end with fake cluster and catalog
//! - Policy document loading from disk

#[path = "../common/mod.rs"]
mod common;

mod policy_store;
