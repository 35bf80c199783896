//! Consolidated integration tests for tsltrust-core.
//!
//! One test binary keeps proptest and the async tests from competing for
//! threads across several executables.
//! See: https://matklad.github.io/2021/02/27/delete-cargo-integration-tests.html

mod c14n;
mod common;
mod document;
mod freshness;
mod properties;
mod resolver;
