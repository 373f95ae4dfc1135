// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # TRAP OPC DA Integration Tests
//!
//! Integration tests for the `trap-opcda` session layer, plus the test
//! utilities they share.
//!
//! ## Module Structure
//!
//! - [`common`]: Shared test utilities, fixtures, and helpers
//!   - `fixtures`: Pre-built items and configurations
//!   - `builders`: Builder patterns for constructing test objects
//!   - `assertions`: Custom assertion helpers
//!   - `mocks`: Mock OPC DA server
//!   - `harness`: Session harness and event recorder
//!
//! ## Running Tests
//!
//! ```bash
//! # Run all integration tests
//! cargo test -p trap-tests
//!
//! # Run specific test suite
//! cargo test -p trap-tests --test integration_connection
//! cargo test -p trap-tests --test integration_subscription
//! cargo test -p trap-tests --test integration_io
//! cargo test -p trap-tests --test integration_recovery
//!
//! # Run with verbose output
//! RUST_LOG=trap_opcda=debug cargo test -p trap-tests -- --nocapture
//! ```
//!
//! ## Test Categories
//!
//! ### Connection Tests (`integration_connection.rs`)
//! - Discovery, connect validation and target switching
//! - Disconnect and shutdown
//!
//! ### Subscription Tests (`integration_subscription.rs`)
//! - Rate partitioning and diff-based reconciliation
//! - Rejected, duplicate and invalid items
//!
//! ### Read / Write Tests (`integration_io.rs`)
//! - Read and write by name, unknown items, transport faults
//! - Server pushed value changes
//!
//! ### Recovery Tests (`integration_recovery.rs`)
//! - Server shutdown, dropped links, health daemon reconnects
//!
//! ## Writing New Tests
//!
//! ```rust,ignore
//! use trap_tests::prelude::*;
//!
//! #[tokio::test]
//! async fn test_something() {
//!     let harness = SessionHarness::connected().await;
//!     harness.register(vec![ItemFixtures::temperature()]).await;
//!     assert_groups(&harness.session, &[(1000, &["Plant.Boiler.Temperature"])]).await;
//! }
//! ```

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod common;

/// Re-export commonly used items for convenience.
pub mod prelude {
    pub use crate::common::fixtures::*;
    pub use crate::common::builders::*;
    pub use crate::common::assertions::*;
    pub use crate::common::mocks::*;
    pub use crate::common::harness::*;
    pub use crate::common::init_test_logging;
}
