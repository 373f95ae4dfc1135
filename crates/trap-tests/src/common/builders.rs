// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Builders
//!
//! Builder patterns for constructing test objects with sensible defaults.
//!
//! ## Design Principles
//!
//! - Sensible defaults for common test scenarios
//! - Chainable methods for fluent API
//! - Clear separation between required and optional fields

use trap_opcda::{DataItem, ResultCode, Variant};

use super::mocks::MockProtocolClient;

// =============================================================================
// DataItem Builder
// =============================================================================

/// Builder for constructing DataItem instances with sensible defaults.
#[derive(Debug, Clone)]
pub struct DataItemBuilder {
    name: String,
    update_rate_ms: u32,
    old_value: Variant,
    new_value: Variant,
    quality: ResultCode,
}

impl Default for DataItemBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl DataItemBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self {
            name: "Test.Item".to_string(),
            update_rate_ms: 1000,
            old_value: Variant::Empty,
            new_value: Variant::Empty,
            quality: ResultCode::Unknown,
        }
    }

    /// Set the item name.
    pub fn name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    /// Set the update rate.
    pub fn rate(mut self, update_rate_ms: u32) -> Self {
        self.update_rate_ms = update_rate_ms;
        self
    }

    /// Set the latest value.
    pub fn value(mut self, value: impl Into<Variant>) -> Self {
        self.new_value = value.into();
        self
    }

    /// Set the previous value.
    pub fn old_value(mut self, value: impl Into<Variant>) -> Self {
        self.old_value = value.into();
        self
    }

    /// Set the quality.
    pub fn quality(mut self, quality: ResultCode) -> Self {
        self.quality = quality;
        self
    }

    /// Mark as synchronized.
    pub fn good(self) -> Self {
        self.quality(ResultCode::Ok)
    }

    /// Build the DataItem.
    pub fn build(self) -> DataItem {
        DataItem {
            name: self.name,
            update_rate_ms: self.update_rate_ms,
            old_value: self.old_value,
            new_value: self.new_value,
            quality: self.quality,
        }
    }
}

// =============================================================================
// Mock Server Builder
// =============================================================================

/// Builder for a pre-configured [`MockProtocolClient`].
#[derive(Debug, Clone, Default)]
pub struct MockServerBuilder {
    servers: Option<Vec<String>>,
    values: Vec<(String, Variant)>,
    rejected: Vec<(String, u32)>,
    fail_connection: bool,
    fail_discovery: bool,
}

impl MockServerBuilder {
    /// Create a new builder with defaults.
    pub fn new() -> Self {
        Self::default()
    }

    /// Advertise these server names instead of the default.
    pub fn servers(mut self, servers: &[&str]) -> Self {
        self.servers = Some(servers.iter().map(|s| s.to_string()).collect());
        self
    }

    /// Serve `value` for reads of `item`.
    pub fn value(mut self, item: &str, value: impl Into<Variant>) -> Self {
        self.values.push((item.to_string(), value.into()));
        self
    }

    /// Reject `item` on add with `result_id`.
    pub fn reject(mut self, item: &str, result_id: u32) -> Self {
        self.rejected.push((item.to_string(), result_id));
        self
    }

    /// Refuse every connect.
    pub fn refuse_connections(mut self) -> Self {
        self.fail_connection = true;
        self
    }

    /// Fail every discovery call.
    pub fn fail_discovery(mut self) -> Self {
        self.fail_discovery = true;
        self
    }

    /// Build the mock.
    pub fn build(self) -> MockProtocolClient {
        let client = match self.servers {
            Some(servers) => MockProtocolClient::with_servers(servers),
            None => MockProtocolClient::new(),
        };
        for (item, value) in self.values {
            client.set_value(&item, value);
        }
        for (item, result_id) in self.rejected {
            client.reject_item(&item, result_id);
        }
        client.fail_connection(self.fail_connection);
        client.fail_discovery(self.fail_discovery);
        client
    }
}
