// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC DA transport abstraction layer.
//!
//! [`ProtocolClient`] is the capability the session drives: discovery,
//! connection, group and item management, synchronous read/write and the two
//! server-initiated callbacks (data change, shutdown). A COM/DCOM binding or a
//! test double implements it; the session never sees the wire.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{DateTime, Utc};

use crate::error::OpcDaResult;
use crate::result::{hresult, ResultCode};
use crate::types::{GroupHandle, GroupState, ItemDescriptor, ItemHandle, Variant};

// =============================================================================
// Callbacks
// =============================================================================

/// Invoked by the transport when a group reports changed values.
///
/// Implementations must not block: the session only queues the notification.
pub type DataChangeCallback = Arc<dyn Fn(GroupHandle, Vec<ItemValueResult>) + Send + Sync>;

/// Invoked by the transport when the server announces its shutdown.
pub type ShutdownCallback = Arc<dyn Fn(String) + Send + Sync>;

// =============================================================================
// ItemResult
// =============================================================================

/// Per-item outcome of add, remove and write calls.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemResult {
    /// Item identifier.
    pub item_name: String,

    /// Raw result identifier.
    pub result_id: u32,

    /// Server handle assigned by an add call.
    pub server_handle: Option<ItemHandle>,
}

impl ItemResult {
    /// Creates a successful result.
    pub fn success(item_name: impl Into<String>, server_handle: Option<ItemHandle>) -> Self {
        Self {
            item_name: item_name.into(),
            result_id: hresult::S_OK,
            server_handle,
        }
    }

    /// Creates a failed result.
    pub fn failure(item_name: impl Into<String>, result_id: u32) -> Self {
        Self {
            item_name: item_name.into(),
            result_id,
            server_handle: None,
        }
    }

    /// Returns the decoded result code.
    #[inline]
    pub fn code(&self) -> ResultCode {
        ResultCode::decode(self.result_id)
    }

    /// Returns `true` if the result identifier is success.
    #[inline]
    pub fn is_success(&self) -> bool {
        self.result_id == hresult::S_OK
    }
}

// =============================================================================
// ItemValueResult
// =============================================================================

/// A value reported by a read call or a data-change callback.
#[derive(Debug, Clone, PartialEq)]
pub struct ItemValueResult {
    /// Item identifier.
    pub item_name: String,

    /// Reported value.
    pub value: Variant,

    /// Raw result identifier / quality.
    pub result_id: u32,

    /// Server timestamp.
    pub timestamp: Option<DateTime<Utc>>,
}

impl ItemValueResult {
    /// Creates a good value.
    pub fn success(item_name: impl Into<String>, value: impl Into<Variant>) -> Self {
        Self {
            item_name: item_name.into(),
            value: value.into(),
            result_id: hresult::S_OK,
            timestamp: Some(Utc::now()),
        }
    }

    /// Creates a failed value.
    pub fn failure(item_name: impl Into<String>, result_id: u32) -> Self {
        Self {
            item_name: item_name.into(),
            value: Variant::Empty,
            result_id,
            timestamp: Some(Utc::now()),
        }
    }

    /// Returns the decoded result code.
    #[inline]
    pub fn code(&self) -> ResultCode {
        ResultCode::decode(self.result_id)
    }
}

impl fmt::Display for ItemValueResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} = {} [{}]", self.item_name, self.value, self.code())
    }
}

// =============================================================================
// ProtocolClient Trait
// =============================================================================

/// OPC DA transport capability.
///
/// Connection-class failures (the link is gone) must be reported as
/// [`ConnectionError`](crate::error::ConnectionError) variants for which
/// [`is_connection_loss`](crate::error::OpcDaError::is_connection_loss) holds;
/// the session aborts the running operation on those and schedules a
/// reconnect. Any other error is treated as a rejected call.
#[async_trait]
pub trait ProtocolClient: Send + Sync {
    // =========================================================================
    // Discovery / Connection
    // =========================================================================

    /// Lists the server names registered on `host`.
    async fn discover(&self, host: &str) -> OpcDaResult<Vec<String>>;

    /// Connects to `server_name` on `host`.
    ///
    /// `on_shutdown` must be invoked if the server later announces its
    /// shutdown.
    async fn connect(
        &mut self,
        server_name: &str,
        host: &str,
        on_shutdown: ShutdownCallback,
    ) -> OpcDaResult<()>;

    /// Closes the connection.
    async fn disconnect(&mut self) -> OpcDaResult<()>;

    /// Returns `true` while the link is up.
    fn is_connected(&self) -> bool;

    // =========================================================================
    // Groups
    // =========================================================================

    /// Creates a subscription group.
    async fn create_group(&mut self, state: &GroupState) -> OpcDaResult<GroupHandle>;

    /// Cancels a subscription group.
    async fn cancel_group(&mut self, group: GroupHandle) -> OpcDaResult<()>;

    /// Registers (`Some`) or removes (`None`) the data-change callback of a
    /// group.
    fn set_data_callback(&mut self, group: GroupHandle, callback: Option<DataChangeCallback>);

    // =========================================================================
    // Items
    // =========================================================================

    /// Adds items to a group, one result per descriptor.
    async fn add_items(
        &mut self,
        group: GroupHandle,
        items: &[ItemDescriptor],
    ) -> OpcDaResult<Vec<ItemResult>>;

    /// Removes items from a group, one result per handle.
    async fn remove_items(
        &mut self,
        group: GroupHandle,
        items: &[ItemHandle],
    ) -> OpcDaResult<Vec<ItemResult>>;

    /// Reads the current values of group members.
    async fn read(
        &self,
        group: GroupHandle,
        items: &[ItemHandle],
    ) -> OpcDaResult<Vec<ItemValueResult>>;

    /// Writes values to group members.
    async fn write(
        &self,
        group: GroupHandle,
        values: &[(ItemHandle, Variant)],
    ) -> OpcDaResult<Vec<ItemResult>>;

    // =========================================================================
    // Metadata
    // =========================================================================

    /// Returns a name for diagnostics.
    fn display_name(&self) -> String {
        "opc-da".to_string()
    }
}
