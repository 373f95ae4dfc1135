// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! # Mock Implementations
//!
//! An in-memory OPC DA server behind [`ProtocolClient`].
//!
//! ## Design Principles
//!
//! - Configurable behavior for different test scenarios
//! - Recording of interactions for verification
//! - Cloned handles share one server, so a test keeps a handle to inspect and
//!   drive the server after moving the client into a session
//! - Easy to set up error injection

use async_trait::async_trait;
use parking_lot::Mutex;
use std::collections::{BTreeMap, HashMap};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;

use trap_opcda::error::{ConnectionError, OpcDaError, OpcDaResult};
use trap_opcda::result::hresult;
use trap_opcda::{
    DataChangeCallback, GroupHandle, GroupState, ItemDescriptor, ItemHandle, ItemResult,
    ItemValueResult, ProtocolClient, ShutdownCallback, Variant,
};

/// Server name the mock advertises by default.
pub const MOCK_SERVER: &str = "Matrikon.OPC.Simulation.1";

/// Host used by the mock fixtures.
pub const MOCK_HOST: &str = "127.0.0.1";

// =============================================================================
// Mock server state
// =============================================================================

/// A group as the mock server sees it.
#[derive(Clone)]
pub struct MockGroup {
    /// Group name.
    pub name: String,
    /// Update rate requested by the client.
    pub update_rate_ms: u32,
    /// Members in insertion order.
    pub items: Vec<(String, ItemHandle)>,
    /// Registered data-change callback.
    pub callback: Option<DataChangeCallback>,
}

impl MockGroup {
    fn name_of(&self, handle: ItemHandle) -> Option<String> {
        self.items
            .iter()
            .find(|(_, existing)| *existing == handle)
            .map(|(name, _)| name.clone())
    }
}

#[derive(Default)]
struct MockServer {
    servers: Mutex<Vec<String>>,
    groups: Mutex<BTreeMap<GroupHandle, MockGroup>>,
    shutdown_callback: Mutex<Option<ShutdownCallback>>,
    values: Mutex<HashMap<String, Variant>>,
    rejected_items: Mutex<HashMap<String, u32>>,
    remove_failures: Mutex<HashMap<String, u32>>,
    read_results: Mutex<HashMap<String, u32>>,
    write_results: Mutex<HashMap<String, u32>>,
    write_history: Mutex<Vec<(String, Variant)>>,
    drop_on_add_call: Mutex<Option<u64>>,
    connect_latency: Mutex<Duration>,

    connected: AtomicBool,
    fail_discovery: AtomicBool,
    fail_connection: AtomicBool,
    fail_create_group: AtomicBool,
    fail_all_reads: AtomicBool,
    fail_all_writes: AtomicBool,
    drop_on_io: AtomicBool,

    next_handle: AtomicU32,
    discover_count: AtomicU64,
    connect_count: AtomicU64,
    disconnect_count: AtomicU64,
    create_group_count: AtomicU64,
    cancel_group_count: AtomicU64,
    add_items_count: AtomicU64,
    remove_items_count: AtomicU64,
    read_count: AtomicU64,
    write_count: AtomicU64,
}

// =============================================================================
// Mock Protocol Client
// =============================================================================

/// A highly configurable mock OPC DA transport for testing.
#[derive(Clone)]
pub struct MockProtocolClient {
    server: Arc<MockServer>,
}

impl MockProtocolClient {
    /// Creates a mock that advertises [`MOCK_SERVER`].
    pub fn new() -> Self {
        Self::with_servers([MOCK_SERVER])
    }

    /// Creates a mock that advertises the given server names.
    pub fn with_servers<I, S>(servers: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        let server = MockServer::default();
        server.next_handle.store(1, Ordering::SeqCst);
        *server.servers.lock() = servers.into_iter().map(Into::into).collect();
        Self {
            server: Arc::new(server),
        }
    }

    fn next_handle(&self) -> u32 {
        self.server.next_handle.fetch_add(1, Ordering::SeqCst)
    }

    fn ensure_connected(&self) -> OpcDaResult<()> {
        if self.server.connected.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(OpcDaError::not_connected())
        }
    }

    fn lose_link(&self, operation: &str) -> OpcDaError {
        self.server.connected.store(false, Ordering::SeqCst);
        OpcDaError::connection_lost(format!("mock link dropped during {operation}"))
    }

    // =========================================================================
    // Configuration
    // =========================================================================

    /// Replaces the advertised server names.
    pub fn set_servers(&self, servers: &[&str]) {
        *self.server.servers.lock() = servers.iter().map(|s| s.to_string()).collect();
    }

    /// Sets the value returned by reads of `item`.
    pub fn set_value(&self, item: &str, value: impl Into<Variant>) {
        self.server.values.lock().insert(item.to_string(), value.into());
    }

    /// Makes add calls reject `item` with `result_id`.
    pub fn reject_item(&self, item: &str, result_id: u32) {
        self.server
            .rejected_items
            .lock()
            .insert(item.to_string(), result_id);
    }

    /// Stops rejecting `item`.
    pub fn accept_item(&self, item: &str) {
        self.server.rejected_items.lock().remove(item);
    }

    /// Makes remove calls fail for `item` with `result_id`.
    pub fn fail_remove(&self, item: &str, result_id: u32) {
        self.server
            .remove_failures
            .lock()
            .insert(item.to_string(), result_id);
    }

    /// Makes reads of `item` report `result_id`.
    pub fn set_read_result(&self, item: &str, result_id: u32) {
        self.server
            .read_results
            .lock()
            .insert(item.to_string(), result_id);
    }

    /// Makes writes to `item` report `result_id`.
    pub fn set_write_result(&self, item: &str, result_id: u32) {
        self.server
            .write_results
            .lock()
            .insert(item.to_string(), result_id);
    }

    /// Force discovery to fail.
    pub fn fail_discovery(&self, fail: bool) {
        self.server.fail_discovery.store(fail, Ordering::SeqCst);
    }

    /// Force connection to fail.
    pub fn fail_connection(&self, fail: bool) {
        self.server.fail_connection.store(fail, Ordering::SeqCst);
    }

    /// Force group creation to fail.
    pub fn fail_create_group(&self, fail: bool) {
        self.server.fail_create_group.store(fail, Ordering::SeqCst);
    }

    /// Force all reads to fail.
    pub fn fail_all_reads(&self, fail: bool) {
        self.server.fail_all_reads.store(fail, Ordering::SeqCst);
    }

    /// Force all writes to fail.
    pub fn fail_all_writes(&self, fail: bool) {
        self.server.fail_all_writes.store(fail, Ordering::SeqCst);
    }

    /// Sets how long `connect` takes before it completes.
    pub fn set_connect_latency(&self, latency: Duration) {
        *self.server.connect_latency.lock() = latency;
    }

    /// Drops the link on the next read or write call.
    pub fn drop_on_next_io(&self) {
        self.server.drop_on_io.store(true, Ordering::SeqCst);
    }

    /// Drops the link during the `n`-th add call counted from now.
    pub fn drop_on_add_call(&self, n: u64) {
        let target = self.server.add_items_count.load(Ordering::SeqCst) + n;
        *self.server.drop_on_add_call.lock() = Some(target);
    }

    // =========================================================================
    // Server-side actions
    // =========================================================================

    /// Drops the link without any notification.
    pub fn drop_connection(&self) {
        self.server.connected.store(false, Ordering::SeqCst);
    }

    /// Announces a server shutdown through the registered callback.
    ///
    /// Returns `false` if no callback is registered.
    pub fn trigger_shutdown(&self, reason: &str) -> bool {
        let callback = self.server.shutdown_callback.lock().clone();
        match callback {
            Some(callback) => {
                callback(reason.to_string());
                true
            }
            None => false,
        }
    }

    /// Pushes a good value for `item` through its group's callback.
    ///
    /// Returns `false` if no subscribed group holds the item.
    pub fn push_value(&self, item: &str, value: impl Into<Variant>) -> bool {
        let value = ItemValueResult::success(item, value);
        let target = self
            .server
            .groups
            .lock()
            .iter()
            .find(|(_, group)| group.items.iter().any(|(name, _)| name == item))
            .and_then(|(handle, group)| group.callback.clone().map(|cb| (*handle, cb)));

        match target {
            Some((handle, callback)) => {
                callback(handle, vec![value]);
                true
            }
            None => false,
        }
    }

    /// Pushes raw values to a group through its callback.
    pub fn push_to_group(&self, group: GroupHandle, values: Vec<ItemValueResult>) -> bool {
        let callback = self
            .server
            .groups
            .lock()
            .get(&group)
            .and_then(|group| group.callback.clone());
        match callback {
            Some(callback) => {
                callback(group, values);
                true
            }
            None => false,
        }
    }

    // =========================================================================
    // Inspection
    // =========================================================================

    /// Returns the groups alive on the server, keyed by handle.
    pub fn groups(&self) -> BTreeMap<GroupHandle, MockGroup> {
        self.server.groups.lock().clone()
    }

    /// Returns the number of groups alive on the server.
    pub fn group_count(&self) -> usize {
        self.server.groups.lock().len()
    }

    /// Returns the member names of the group with `rate`, if it exists.
    pub fn group_items(&self, rate: u32) -> Option<Vec<String>> {
        self.server
            .groups
            .lock()
            .values()
            .find(|group| group.update_rate_ms == rate)
            .map(|group| group.items.iter().map(|(name, _)| name.clone()).collect())
    }

    /// Returns the handle of the group with `rate`, if it exists.
    pub fn group_handle(&self, rate: u32) -> Option<GroupHandle> {
        self.server
            .groups
            .lock()
            .iter()
            .find(|(_, group)| group.update_rate_ms == rate)
            .map(|(handle, _)| *handle)
    }

    /// Returns `true` if the group with `rate` has a data-change callback.
    pub fn has_callback(&self, rate: u32) -> bool {
        self.server
            .groups
            .lock()
            .values()
            .any(|group| group.update_rate_ms == rate && group.callback.is_some())
    }

    /// Returns the shutdown callback registered by the current connection.
    pub fn shutdown_callback(&self) -> Option<ShutdownCallback> {
        self.server.shutdown_callback.lock().clone()
    }

    /// Get the write history.
    pub fn get_write_history(&self) -> Vec<(String, Variant)> {
        self.server.write_history.lock().clone()
    }

    /// Get the discover count.
    pub fn get_discover_count(&self) -> u64 {
        self.server.discover_count.load(Ordering::SeqCst)
    }

    /// Get the connect count.
    pub fn get_connect_count(&self) -> u64 {
        self.server.connect_count.load(Ordering::SeqCst)
    }

    /// Get the disconnect count.
    pub fn get_disconnect_count(&self) -> u64 {
        self.server.disconnect_count.load(Ordering::SeqCst)
    }

    /// Get the create group count.
    pub fn get_create_group_count(&self) -> u64 {
        self.server.create_group_count.load(Ordering::SeqCst)
    }

    /// Get the cancel group count.
    pub fn get_cancel_group_count(&self) -> u64 {
        self.server.cancel_group_count.load(Ordering::SeqCst)
    }

    /// Get the add items count.
    pub fn get_add_items_count(&self) -> u64 {
        self.server.add_items_count.load(Ordering::SeqCst)
    }

    /// Get the remove items count.
    pub fn get_remove_items_count(&self) -> u64 {
        self.server.remove_items_count.load(Ordering::SeqCst)
    }

    /// Get the read count.
    pub fn get_read_count(&self) -> u64 {
        self.server.read_count.load(Ordering::SeqCst)
    }

    /// Get the write count.
    pub fn get_write_count(&self) -> u64 {
        self.server.write_count.load(Ordering::SeqCst)
    }

    /// Clear all counters and history.
    pub fn reset_counters(&self) {
        for counter in [
            &self.server.discover_count,
            &self.server.connect_count,
            &self.server.disconnect_count,
            &self.server.create_group_count,
            &self.server.cancel_group_count,
            &self.server.add_items_count,
            &self.server.remove_items_count,
            &self.server.read_count,
            &self.server.write_count,
        ] {
            counter.store(0, Ordering::SeqCst);
        }
        *self.server.drop_on_add_call.lock() = None;
        self.server.write_history.lock().clear();
    }
}

impl Default for MockProtocolClient {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Debug for MockProtocolClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockProtocolClient")
            .field("connected", &self.server.connected.load(Ordering::SeqCst))
            .field("groups", &self.group_count())
            .finish()
    }
}

#[async_trait]
impl ProtocolClient for MockProtocolClient {
    async fn discover(&self, host: &str) -> OpcDaResult<Vec<String>> {
        self.server.discover_count.fetch_add(1, Ordering::SeqCst);

        if self.server.fail_discovery.load(Ordering::SeqCst) {
            return Err(ConnectionError::discovery_failed(host, "Mock discovery failure").into());
        }
        Ok(self.server.servers.lock().clone())
    }

    async fn connect(
        &mut self,
        server_name: &str,
        host: &str,
        on_shutdown: ShutdownCallback,
    ) -> OpcDaResult<()> {
        self.server.connect_count.fetch_add(1, Ordering::SeqCst);

        let latency = *self.server.connect_latency.lock();
        if !latency.is_zero() {
            tokio::time::sleep(latency).await;
        }

        if self.server.fail_connection.load(Ordering::SeqCst) {
            return Err(
                ConnectionError::refused(server_name, host, "Mock connection failure").into(),
            );
        }

        // A fresh server session starts without groups.
        self.server.groups.lock().clear();
        *self.server.shutdown_callback.lock() = Some(on_shutdown);
        self.server.connected.store(true, Ordering::SeqCst);
        Ok(())
    }

    async fn disconnect(&mut self) -> OpcDaResult<()> {
        self.server.disconnect_count.fetch_add(1, Ordering::SeqCst);
        self.server.connected.store(false, Ordering::SeqCst);
        self.server.groups.lock().clear();
        *self.server.shutdown_callback.lock() = None;
        Ok(())
    }

    fn is_connected(&self) -> bool {
        self.server.connected.load(Ordering::SeqCst)
    }

    async fn create_group(&mut self, state: &GroupState) -> OpcDaResult<GroupHandle> {
        self.server.create_group_count.fetch_add(1, Ordering::SeqCst);
        self.ensure_connected()?;

        if self.server.fail_create_group.load(Ordering::SeqCst) {
            return Err(OpcDaError::transport("create_group", "Mock group creation failure"));
        }

        let handle = GroupHandle::new(self.next_handle());
        self.server.groups.lock().insert(
            handle,
            MockGroup {
                name: state.name.clone(),
                update_rate_ms: state.update_rate_ms,
                items: Vec::new(),
                callback: None,
            },
        );
        Ok(handle)
    }

    async fn cancel_group(&mut self, group: GroupHandle) -> OpcDaResult<()> {
        self.server.cancel_group_count.fetch_add(1, Ordering::SeqCst);
        self.ensure_connected()?;

        match self.server.groups.lock().remove(&group) {
            Some(_) => Ok(()),
            None => Err(OpcDaError::transport("cancel_group", format!("Unknown group {group}"))),
        }
    }

    fn set_data_callback(&mut self, group: GroupHandle, callback: Option<DataChangeCallback>) {
        if let Some(group) = self.server.groups.lock().get_mut(&group) {
            group.callback = callback;
        }
    }

    async fn add_items(
        &mut self,
        group: GroupHandle,
        items: &[ItemDescriptor],
    ) -> OpcDaResult<Vec<ItemResult>> {
        let call = self.server.add_items_count.fetch_add(1, Ordering::SeqCst) + 1;
        self.ensure_connected()?;

        let drop_now = {
            let mut trigger = self.server.drop_on_add_call.lock();
            if *trigger == Some(call) {
                *trigger = None;
                true
            } else {
                false
            }
        };
        if drop_now {
            return Err(self.lose_link("add_items"));
        }

        let rejected = self.server.rejected_items.lock().clone();
        let mut groups = self.server.groups.lock();
        let Some(target) = groups.get_mut(&group) else {
            return Err(OpcDaError::transport("add_items", format!("Unknown group {group}")));
        };

        let mut results = Vec::with_capacity(items.len());
        for item in items {
            if let Some(result_id) = rejected.get(&item.item_name) {
                results.push(ItemResult::failure(&item.item_name, *result_id));
                continue;
            }
            if target.items.iter().any(|(name, _)| *name == item.item_name) {
                results.push(ItemResult::failure(&item.item_name, hresult::OPC_E_DUPLICATENAME));
                continue;
            }
            let handle = ItemHandle::new(self.next_handle());
            target.items.push((item.item_name.clone(), handle));
            results.push(ItemResult::success(&item.item_name, Some(handle)));
        }
        Ok(results)
    }

    async fn remove_items(
        &mut self,
        group: GroupHandle,
        items: &[ItemHandle],
    ) -> OpcDaResult<Vec<ItemResult>> {
        self.server.remove_items_count.fetch_add(1, Ordering::SeqCst);
        self.ensure_connected()?;

        let failures = self.server.remove_failures.lock().clone();
        let mut groups = self.server.groups.lock();
        let Some(target) = groups.get_mut(&group) else {
            return Err(OpcDaError::transport("remove_items", format!("Unknown group {group}")));
        };

        let mut results = Vec::with_capacity(items.len());
        for handle in items {
            let Some(name) = target.name_of(*handle) else {
                results.push(ItemResult::failure("", hresult::OPC_E_INVALIDHANDLE));
                continue;
            };
            if let Some(result_id) = failures.get(&name) {
                results.push(ItemResult::failure(name, *result_id));
                continue;
            }
            target.items.retain(|(_, existing)| existing != handle);
            results.push(ItemResult::success(name, Some(*handle)));
        }
        Ok(results)
    }

    async fn read(
        &self,
        group: GroupHandle,
        items: &[ItemHandle],
    ) -> OpcDaResult<Vec<ItemValueResult>> {
        self.server.read_count.fetch_add(1, Ordering::SeqCst);
        self.ensure_connected()?;

        if self.server.drop_on_io.swap(false, Ordering::SeqCst) {
            return Err(self.lose_link("read"));
        }
        if self.server.fail_all_reads.load(Ordering::SeqCst) {
            return Err(OpcDaError::transport("read", "Mock read failure"));
        }

        let groups = self.server.groups.lock();
        let Some(target) = groups.get(&group) else {
            return Err(OpcDaError::transport("read", format!("Unknown group {group}")));
        };
        let values = self.server.values.lock();
        let overrides = self.server.read_results.lock();

        Ok(items
            .iter()
            .filter_map(|handle| target.name_of(*handle))
            .map(|name| match overrides.get(&name) {
                Some(result_id) => ItemValueResult::failure(name, *result_id),
                None => {
                    let value = values.get(&name).cloned().unwrap_or_default();
                    ItemValueResult::success(name, value)
                }
            })
            .collect())
    }

    async fn write(
        &self,
        group: GroupHandle,
        values: &[(ItemHandle, Variant)],
    ) -> OpcDaResult<Vec<ItemResult>> {
        self.server.write_count.fetch_add(1, Ordering::SeqCst);
        self.ensure_connected()?;

        if self.server.drop_on_io.swap(false, Ordering::SeqCst) {
            return Err(self.lose_link("write"));
        }
        if self.server.fail_all_writes.load(Ordering::SeqCst) {
            return Err(OpcDaError::transport("write", "Mock write failure"));
        }

        let groups = self.server.groups.lock();
        let Some(target) = groups.get(&group) else {
            return Err(OpcDaError::transport("write", format!("Unknown group {group}")));
        };
        let overrides = self.server.write_results.lock();

        let mut results = Vec::with_capacity(values.len());
        for (handle, value) in values {
            let Some(name) = target.name_of(*handle) else {
                results.push(ItemResult::failure("", hresult::OPC_E_INVALIDHANDLE));
                continue;
            };
            if let Some(result_id) = overrides.get(&name) {
                results.push(ItemResult::failure(name, *result_id));
                continue;
            }
            self.server
                .write_history
                .lock()
                .push((name.clone(), value.clone()));
            self.server.values.lock().insert(name.clone(), value.clone());
            results.push(ItemResult::success(name, Some(*handle)));
        }
        Ok(results)
    }

    fn display_name(&self) -> String {
        "mock-opc-da".to_string()
    }
}
