// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Test Fixtures
//!
//! Pre-built test data for consistent and reproducible testing.
//!
//! ## Design Principles
//!
//! - Fixtures are immutable and thread-safe
//! - Each fixture represents a realistic scenario
//! - Fixtures can be composed for complex test scenarios

use std::time::Duration;

use trap_opcda::{DataItem, SessionConfig};

// =============================================================================
// Item Fixtures
// =============================================================================

/// Fixture providing standard data items.
pub struct ItemFixtures;

impl ItemFixtures {
    /// Boiler temperature, sampled every second.
    pub fn temperature() -> DataItem {
        DataItem::new("Plant.Boiler.Temperature", 1000)
    }

    /// Boiler pressure, sampled every second.
    pub fn pressure() -> DataItem {
        DataItem::new("Plant.Boiler.Pressure", 1000)
    }

    /// Conveyor counter, sampled every 250 ms.
    pub fn counter() -> DataItem {
        DataItem::new("Plant.Conveyor.Count", 250)
    }

    /// Valve setpoint, sampled every 5 s.
    pub fn setpoint() -> DataItem {
        DataItem::new("Plant.Valve.Setpoint", 5000)
    }

    /// Items spread over three rates.
    pub fn mixed_rates() -> Vec<DataItem> {
        vec![
            Self::temperature(),
            Self::pressure(),
            Self::counter(),
            Self::setpoint(),
        ]
    }

    /// `count` items sharing one rate.
    pub fn item_batch(count: usize, update_rate_ms: u32) -> Vec<DataItem> {
        (0..count)
            .map(|i| DataItem::new(format!("Batch.Tag{:03}", i), update_rate_ms))
            .collect()
    }

    /// Items named by `names`, all at `update_rate_ms`.
    pub fn named(names: &[&str], update_rate_ms: u32) -> Vec<DataItem> {
        names
            .iter()
            .map(|name| DataItem::new(*name, update_rate_ms))
            .collect()
    }
}

// =============================================================================
// Config Fixtures
// =============================================================================

/// Fixture providing session configurations.
pub struct ConfigFixtures;

impl ConfigFixtures {
    /// Health interval long enough that the daemon never fires in a test.
    pub fn quiet() -> SessionConfig {
        SessionConfig {
            health_interval: Duration::from_secs(3600),
            ..SessionConfig::default()
        }
    }

    /// Health interval of one second, for paused-clock daemon tests.
    pub fn fast_health() -> SessionConfig {
        SessionConfig {
            health_interval: Duration::from_secs(1),
            ..SessionConfig::default()
        }
    }

    /// Default five second health interval.
    pub fn standard() -> SessionConfig {
        SessionConfig::default()
    }
}
