// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Custom Test Assertions
//!
//! Domain-specific assertion helpers for OPC DA session tests.
//!
//! ## Design Principles
//!
//! - Provide clear, informative failure messages
//! - Support both synchronous and asynchronous assertions

use trap_opcda::{DataItem, ProtocolClient, ResultCode, Session, Variant};

use super::harness::EventRecorder;

// =============================================================================
// DataItem Assertions
// =============================================================================

/// Assertion extensions for DataItem.
pub trait DataItemAssertions {
    /// Assert that the item is synchronized.
    fn assert_good_quality(&self);

    /// Assert that the item has a specific quality.
    fn assert_quality(&self, expected: ResultCode);

    /// Assert that the latest value matches.
    fn assert_value(&self, expected: &Variant);
}

impl DataItemAssertions for DataItem {
    fn assert_good_quality(&self) {
        assert_eq!(
            self.quality,
            ResultCode::Ok,
            "Expected Ok quality, but got {} for {}",
            self.quality,
            self.name
        );
    }

    fn assert_quality(&self, expected: ResultCode) {
        assert_eq!(
            self.quality, expected,
            "Expected {} quality, but got {} for {}",
            expected, self.quality, self.name
        );
    }

    fn assert_value(&self, expected: &Variant) {
        assert_eq!(
            &self.new_value, expected,
            "Expected value {}, but got {} for {}",
            expected, self.new_value, self.name
        );
    }
}

// =============================================================================
// Event Assertions
// =============================================================================

/// Assert that no error event was raised.
pub fn assert_no_errors(events: &EventRecorder) {
    let codes = events.error_codes();
    assert!(codes.is_empty(), "Expected no error events, got {:?}", codes);
}

/// Assert that exactly one error event with `code` was raised.
pub fn assert_single_error(events: &EventRecorder, code: ResultCode) {
    let codes = events.error_codes();
    assert_eq!(
        codes.iter().filter(|c| **c == code).count(),
        1,
        "Expected exactly one {} error event, got {:?}",
        code,
        codes
    );
}

/// Assert that a log message containing `fragment` was raised.
pub fn assert_log_contains(events: &EventRecorder, fragment: &str) {
    assert!(
        events.has_log(fragment),
        "Expected a log message containing '{}', got {:?}",
        fragment,
        events.log_messages()
    );
}

// =============================================================================
// Session Assertions
// =============================================================================

/// Assert the session's groups, as `(rate, members)` in creation order.
pub async fn assert_groups<C: ProtocolClient + 'static>(
    session: &Session<C>,
    expected: &[(u32, &[&str])],
) {
    let actual: Vec<(u32, Vec<String>)> = session
        .groups()
        .await
        .into_iter()
        .map(|group| (group.update_rate_ms, group.items))
        .collect();
    let expected: Vec<(u32, Vec<String>)> = expected
        .iter()
        .map(|(rate, items)| (*rate, items.iter().map(|s| s.to_string()).collect()))
        .collect();

    assert_eq!(actual, expected, "Subscription groups differ");
}

/// Assert that every desired item has `quality`.
pub async fn assert_all_quality<C: ProtocolClient + 'static>(session: &Session<C>, quality: ResultCode) {
    for item in session.data_items().await {
        item.assert_quality(quality);
    }
}
