// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Core data types: values, data items, handles and group descriptors.

use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{OpcDaError, OpcDaResult};
use crate::result::ResultCode;

// =============================================================================
// Variant
// =============================================================================

/// Scalar value carried by a data item.
#[derive(Debug, Clone, PartialEq, Default)]
pub enum Variant {
    /// No value observed yet.
    #[default]
    Empty,

    /// Boolean value.
    Boolean(bool),

    /// 16-bit signed integer.
    Int16(i16),

    /// 16-bit unsigned integer.
    UInt16(u16),

    /// 32-bit signed integer.
    Int32(i32),

    /// 32-bit unsigned integer.
    UInt32(u32),

    /// 64-bit signed integer.
    Int64(i64),

    /// 32-bit float.
    Float(f32),

    /// 64-bit double.
    Double(f64),

    /// String value.
    String(String),

    /// Date/time value.
    DateTime(DateTime<Utc>),
}

impl Variant {
    /// Returns `true` if no value is present.
    #[inline]
    pub fn is_empty(&self) -> bool {
        matches!(self, Self::Empty)
    }

    /// Returns the name of the carried type.
    pub fn type_name(&self) -> &'static str {
        match self {
            Self::Empty => "Empty",
            Self::Boolean(_) => "Boolean",
            Self::Int16(_) => "Int16",
            Self::UInt16(_) => "UInt16",
            Self::Int32(_) => "Int32",
            Self::UInt32(_) => "UInt32",
            Self::Int64(_) => "Int64",
            Self::Float(_) => "Float",
            Self::Double(_) => "Double",
            Self::String(_) => "String",
            Self::DateTime(_) => "DateTime",
        }
    }

    /// Attempts to get the value as a boolean.
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Self::Boolean(v) => Some(*v),
            Self::Int16(v) => Some(*v != 0),
            Self::UInt16(v) => Some(*v != 0),
            Self::Int32(v) => Some(*v != 0),
            Self::UInt32(v) => Some(*v != 0),
            Self::Int64(v) => Some(*v != 0),
            _ => None,
        }
    }

    /// Attempts to get the value as an i64.
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Self::Boolean(v) => Some(i64::from(*v)),
            Self::Int16(v) => Some(i64::from(*v)),
            Self::UInt16(v) => Some(i64::from(*v)),
            Self::Int32(v) => Some(i64::from(*v)),
            Self::UInt32(v) => Some(i64::from(*v)),
            Self::Int64(v) => Some(*v),
            Self::Float(v) => Some(*v as i64),
            Self::Double(v) => Some(*v as i64),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Attempts to get the value as an f64.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Self::Boolean(v) => Some(if *v { 1.0 } else { 0.0 }),
            Self::Int16(v) => Some(f64::from(*v)),
            Self::UInt16(v) => Some(f64::from(*v)),
            Self::Int32(v) => Some(f64::from(*v)),
            Self::UInt32(v) => Some(f64::from(*v)),
            Self::Int64(v) => Some(*v as f64),
            Self::Float(v) => Some(f64::from(*v)),
            Self::Double(v) => Some(*v),
            Self::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    /// Returns the string slice for string values.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(s) => Some(s),
            _ => None,
        }
    }
}

impl fmt::Display for Variant {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => Ok(()),
            Self::Boolean(v) => write!(f, "{}", v),
            Self::Int16(v) => write!(f, "{}", v),
            Self::UInt16(v) => write!(f, "{}", v),
            Self::Int32(v) => write!(f, "{}", v),
            Self::UInt32(v) => write!(f, "{}", v),
            Self::Int64(v) => write!(f, "{}", v),
            Self::Float(v) => write!(f, "{}", v),
            Self::Double(v) => write!(f, "{}", v),
            Self::String(v) => f.write_str(v),
            Self::DateTime(v) => write!(f, "{}", v.to_rfc3339()),
        }
    }
}

impl From<bool> for Variant {
    fn from(v: bool) -> Self {
        Self::Boolean(v)
    }
}

impl From<i16> for Variant {
    fn from(v: i16) -> Self {
        Self::Int16(v)
    }
}

impl From<i32> for Variant {
    fn from(v: i32) -> Self {
        Self::Int32(v)
    }
}

impl From<u32> for Variant {
    fn from(v: u32) -> Self {
        Self::UInt32(v)
    }
}

impl From<i64> for Variant {
    fn from(v: i64) -> Self {
        Self::Int64(v)
    }
}

impl From<f32> for Variant {
    fn from(v: f32) -> Self {
        Self::Float(v)
    }
}

impl From<f64> for Variant {
    fn from(v: f64) -> Self {
        Self::Double(v)
    }
}

impl From<&str> for Variant {
    fn from(v: &str) -> Self {
        Self::String(v.to_string())
    }
}

impl From<String> for Variant {
    fn from(v: String) -> Self {
        Self::String(v)
    }
}

impl From<DateTime<Utc>> for Variant {
    fn from(v: DateTime<Utc>) -> Self {
        Self::DateTime(v)
    }
}

// =============================================================================
// DataItem
// =============================================================================

/// A named tag with its desired update rate, its last two observed values
/// and its quality.
///
/// The quality tells whether the item is currently synchronized with the
/// server: anything other than [`ResultCode::Ok`] makes the health daemon
/// re-register the desired set.
#[derive(Debug, Clone, PartialEq)]
pub struct DataItem {
    /// Item identifier in the server address space.
    pub name: String,
    /// Desired update rate in milliseconds.
    pub update_rate_ms: u32,
    /// Previous observed value.
    pub old_value: Variant,
    /// Latest observed value.
    pub new_value: Variant,
    /// Synchronization quality.
    pub quality: ResultCode,
}

impl DataItem {
    /// Creates an item with empty values and `Unknown` quality.
    pub fn new(name: impl Into<String>, update_rate_ms: u32) -> Self {
        Self {
            name: name.into(),
            update_rate_ms,
            old_value: Variant::Empty,
            new_value: Variant::Empty,
            quality: ResultCode::Unknown,
        }
    }

    /// Sets the latest value.
    pub fn with_value(mut self, value: impl Into<Variant>) -> Self {
        self.new_value = value.into();
        self
    }

    /// Sets the quality.
    pub fn with_quality(mut self, quality: ResultCode) -> Self {
        self.quality = quality;
        self
    }

    /// Placeholder reported when an item leaves its group.
    pub fn unregistered(name: impl Into<String>, update_rate_ms: u32) -> Self {
        Self::new(name, update_rate_ms).with_quality(ResultCode::ItemUnregistered)
    }

    /// Shifts the value history and records the new quality.
    pub fn record_value(&mut self, value: Variant, quality: ResultCode) {
        self.old_value = std::mem::replace(&mut self.new_value, value);
        self.quality = quality;
    }

    /// Returns `true` if the item is synchronized with the server.
    #[inline]
    pub fn is_good(&self) -> bool {
        self.quality.is_ok()
    }

    /// Returns the update rate as a duration.
    pub fn update_rate(&self) -> Duration {
        Duration::from_millis(u64::from(self.update_rate_ms))
    }

    /// Returns `true` if name and rate match.
    pub fn same_subscription(&self, other: &DataItem) -> bool {
        self.name == other.name && self.update_rate_ms == other.update_rate_ms
    }

    /// Checks the item preconditions: non-blank name and positive rate.
    pub fn validate(&self) -> OpcDaResult<()> {
        if self.name.trim().is_empty() {
            return Err(OpcDaError::invalid_argument("data item name is blank"));
        }
        if self.update_rate_ms == 0 {
            return Err(OpcDaError::invalid_argument(format!(
                "data item '{}' has a zero update rate",
                self.name
            )));
        }
        Ok(())
    }
}

impl fmt::Display for DataItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}@{}ms = {} [{}]",
            self.name, self.update_rate_ms, self.new_value, self.quality
        )
    }
}

// =============================================================================
// Handles
// =============================================================================

/// Server-side handle of a subscription group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct GroupHandle(pub u32);

impl GroupHandle {
    /// Creates a new group handle.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw handle value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for GroupHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "grp-{}", self.0)
    }
}

/// Server-side handle of an item inside a group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ItemHandle(pub u32);

impl ItemHandle {
    /// Creates a new item handle.
    #[inline]
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw handle value.
    #[inline]
    pub const fn value(&self) -> u32 {
        self.0
    }
}

impl fmt::Display for ItemHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "item-{}", self.0)
    }
}

// =============================================================================
// Group / item descriptors
// =============================================================================

/// Parameters of a subscription group as sent to the server.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GroupState {
    /// Group name (the textual update rate).
    pub name: String,
    /// Client handle assigned to the group.
    pub client_handle: Uuid,
    /// Whether the group is active.
    pub active: bool,
    /// Requested update rate in milliseconds.
    pub update_rate_ms: u32,
    /// Percent deadband applied to analog items.
    pub deadband: f32,
}

impl GroupState {
    /// Creates the state of the active group for one update rate.
    pub fn for_rate(update_rate_ms: u32, deadband: f32) -> Self {
        Self {
            name: update_rate_ms.to_string(),
            client_handle: Uuid::new_v4(),
            active: true,
            update_rate_ms,
            deadband,
        }
    }
}

/// Description of an item to add to a group.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemDescriptor {
    /// Item identifier.
    pub item_name: String,
    /// Client handle assigned to the item.
    pub client_handle: Uuid,
}

impl ItemDescriptor {
    /// Creates a descriptor with a fresh client handle.
    pub fn new(item_name: impl Into<String>) -> Self {
        Self {
            item_name: item_name.into(),
            client_handle: Uuid::new_v4(),
        }
    }
}
