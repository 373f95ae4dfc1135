// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC DA session management.
//!
//! A [`Session`] owns one [`ProtocolClient`], the desired item set and the
//! server-side subscription groups derived from it. All of that state sits
//! behind a single async mutex: connect, disconnect, reconciliation, read,
//! write, health ticks and server notifications each hold it for their whole
//! duration and never interleave.
//!
//! ```text
//!  caller ──▶ Session ──▶ SessionCore ─┬─▶ Mutex<SessionInner> ──▶ ProtocolClient
//!                              ▲       ├─▶ NotificationHub
//!   transport callbacks        │       ├─▶ HealthDaemon task ─┐
//!   (data change, shutdown) ───┴─ mpsc ─▶ event pump task ────┴─ Weak<SessionCore>
//! ```

use std::fmt;
use std::ops::{Deref, DerefMut};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Weak};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::sync::{mpsc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use super::daemon::{HealthDaemon, HealthTarget};
use super::subscription::{GroupSnapshot, GroupTable, Reconciler};
use super::transport::{DataChangeCallback, ItemValueResult, ProtocolClient, ShutdownCallback};
use crate::config::SessionConfig;
use crate::error::{ConnectionError, OpcDaError, OpcDaResult, OperationError};
use crate::notify::NotificationHub;
use crate::result::ResultCode;
use crate::types::{DataItem, GroupHandle, Variant};

// =============================================================================
// SessionState
// =============================================================================

/// Connection state of a session.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    /// No connection.
    #[default]
    Disconnected,

    /// Discovery and connect are in progress.
    Connecting,

    /// Connected; groups reflect the server.
    Connected,
}

impl SessionState {
    /// Returns `true` if the session is connected.
    #[inline]
    pub fn is_connected(&self) -> bool {
        matches!(self, Self::Connected)
    }
}

impl fmt::Display for SessionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Disconnected => write!(f, "Disconnected"),
            Self::Connecting => write!(f, "Connecting"),
            Self::Connected => write!(f, "Connected"),
        }
    }
}

/// Server a session connects to.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ConnectTarget {
    /// Server name (ProgID).
    pub server_name: String,
    /// Host name or address.
    pub host: String,
}

impl ConnectTarget {
    /// Creates a connection target.
    pub fn new(server_name: impl Into<String>, host: impl Into<String>) -> Self {
        Self {
            server_name: server_name.into(),
            host: host.into(),
        }
    }
}

impl fmt::Display for ConnectTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} on {}", self.server_name, self.host)
    }
}

// =============================================================================
// SessionStats
// =============================================================================

/// Session statistics.
#[derive(Debug)]
pub struct SessionStats {
    connects: AtomicU64,
    connect_failures: AtomicU64,
    disconnects: AtomicU64,
    reconnect_attempts: AtomicU64,
    reconciliations: AtomicU64,
    groups_created: AtomicU64,
    groups_canceled: AtomicU64,
    items_added: AtomicU64,
    items_removed: AtomicU64,
    reads: AtomicU64,
    writes: AtomicU64,
    notifications: AtomicU64,
    errors: AtomicU64,
}

impl SessionStats {
    /// Creates new session statistics.
    pub fn new() -> Self {
        Self {
            connects: AtomicU64::new(0),
            connect_failures: AtomicU64::new(0),
            disconnects: AtomicU64::new(0),
            reconnect_attempts: AtomicU64::new(0),
            reconciliations: AtomicU64::new(0),
            groups_created: AtomicU64::new(0),
            groups_canceled: AtomicU64::new(0),
            items_added: AtomicU64::new(0),
            items_removed: AtomicU64::new(0),
            reads: AtomicU64::new(0),
            writes: AtomicU64::new(0),
            notifications: AtomicU64::new(0),
            errors: AtomicU64::new(0),
        }
    }

    pub(crate) fn record_connect(&self) {
        self.connects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_connect_failure(&self) {
        self.connect_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_disconnect(&self) {
        self.disconnects.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconnect_attempt(&self) {
        self.reconnect_attempts.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reconciliation(&self) {
        self.reconciliations.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_group_created(&self) {
        self.groups_created.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_group_canceled(&self) {
        self.groups_canceled.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_items_added(&self, count: u64) {
        self.items_added.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_items_removed(&self, count: u64) {
        self.items_removed.fetch_add(count, Ordering::Relaxed);
    }

    pub(crate) fn record_read(&self) {
        self.reads.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_write(&self) {
        self.writes.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_notification(&self) {
        self.notifications.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_error(&self) {
        self.errors.fetch_add(1, Ordering::Relaxed);
    }

    /// Returns the number of successful connects.
    pub fn connects(&self) -> u64 {
        self.connects.load(Ordering::Relaxed)
    }

    /// Returns the number of failed connects.
    pub fn connect_failures(&self) -> u64 {
        self.connect_failures.load(Ordering::Relaxed)
    }

    /// Returns the number of disconnects, including lost links.
    pub fn disconnects(&self) -> u64 {
        self.disconnects.load(Ordering::Relaxed)
    }

    /// Returns the number of reconnects attempted by the health daemon.
    pub fn reconnect_attempts(&self) -> u64 {
        self.reconnect_attempts.load(Ordering::Relaxed)
    }

    /// Returns the number of reconciliation passes.
    pub fn reconciliations(&self) -> u64 {
        self.reconciliations.load(Ordering::Relaxed)
    }

    /// Returns the number of groups created.
    pub fn groups_created(&self) -> u64 {
        self.groups_created.load(Ordering::Relaxed)
    }

    /// Returns the number of groups canceled.
    pub fn groups_canceled(&self) -> u64 {
        self.groups_canceled.load(Ordering::Relaxed)
    }

    /// Returns the number of items registered.
    pub fn items_added(&self) -> u64 {
        self.items_added.load(Ordering::Relaxed)
    }

    /// Returns the number of items unregistered.
    pub fn items_removed(&self) -> u64 {
        self.items_removed.load(Ordering::Relaxed)
    }

    /// Returns the number of reads issued.
    pub fn reads(&self) -> u64 {
        self.reads.load(Ordering::Relaxed)
    }

    /// Returns the number of writes issued.
    pub fn writes(&self) -> u64 {
        self.writes.load(Ordering::Relaxed)
    }

    /// Returns the number of pushed value changes applied.
    pub fn notifications(&self) -> u64 {
        self.notifications.load(Ordering::Relaxed)
    }

    /// Returns the number of error events raised.
    pub fn errors(&self) -> u64 {
        self.errors.load(Ordering::Relaxed)
    }

    /// Resets all statistics.
    pub fn reset(&self) {
        for counter in [
            &self.connects,
            &self.connect_failures,
            &self.disconnects,
            &self.reconnect_attempts,
            &self.reconciliations,
            &self.groups_created,
            &self.groups_canceled,
            &self.items_added,
            &self.items_removed,
            &self.reads,
            &self.writes,
            &self.notifications,
            &self.errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }
}

impl Default for SessionStats {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Internal state
// =============================================================================

/// Notifications raised by transport callbacks.
enum ServerEvent {
    DataChanged {
        group: GroupHandle,
        values: Vec<ItemValueResult>,
    },
    Shutdown {
        reason: String,
        link: u64,
    },
}

struct SessionInner<C> {
    client: C,
    state: SessionState,
    target: Option<ConnectTarget>,
    groups: GroupTable,
    desired: Vec<DataItem>,
    /// Bumped on every connection opened, so notices from an older link can
    /// be told apart.
    link: u64,
}

impl<C> SessionInner<C> {
    fn new(client: C) -> Self {
        Self {
            client,
            state: SessionState::Disconnected,
            target: None,
            groups: GroupTable::new(),
            desired: Vec::new(),
            link: 0,
        }
    }

    fn is_connected(&self) -> bool {
        self.state.is_connected()
    }

    fn desired_mut(&mut self, name: &str) -> Option<&mut DataItem> {
        self.desired.iter_mut().find(|item| item.name == name)
    }

    /// Drops every trace of the server-side state.
    fn mark_disconnected(&mut self) {
        self.state = SessionState::Disconnected;
        self.groups.clear();
        for item in &mut self.desired {
            item.quality = ResultCode::ServerNotConnected;
        }
    }
}

/// Leaves the session `Disconnected` on every exit path of a teardown.
struct DisconnectGuard<'a, C> {
    inner: &'a mut SessionInner<C>,
}

impl<C> Deref for DisconnectGuard<'_, C> {
    type Target = SessionInner<C>;

    fn deref(&self) -> &Self::Target {
        self.inner
    }
}

impl<C> DerefMut for DisconnectGuard<'_, C> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.inner
    }
}

impl<C> Drop for DisconnectGuard<'_, C> {
    fn drop(&mut self) {
        self.inner.mark_disconnected();
    }
}

// =============================================================================
// SessionCore
// =============================================================================

struct SessionCore<C: ProtocolClient> {
    config: SessionConfig,
    inner: Mutex<SessionInner<C>>,
    hub: NotificationHub,
    stats: SessionStats,
    daemon: HealthDaemon,
    events: mpsc::UnboundedSender<ServerEvent>,
}

impl<C: ProtocolClient + 'static> SessionCore<C> {
    fn report(&self, code: ResultCode, message: impl Into<String>, source: Option<OpcDaError>) {
        self.stats.record_error();
        self.hub.emit_error(code, message, source.map(Arc::new));
    }

    fn data_callback(&self) -> DataChangeCallback {
        let events = self.events.clone();
        Arc::new(move |group, values| {
            if events.send(ServerEvent::DataChanged { group, values }).is_err() {
                debug!(group = %group, "Session closed, data change discarded");
            }
        })
    }

    fn shutdown_callback(&self, link: u64) -> ShutdownCallback {
        let events = self.events.clone();
        Arc::new(move |reason| {
            if events.send(ServerEvent::Shutdown { reason, link }).is_err() {
                debug!("Session closed, shutdown notice discarded");
            }
        })
    }

    /// Runs the connection-lost bookkeeping.
    fn link_lost(&self, inner: &mut SessionInner<C>, error: &OpcDaError) {
        error.log("session");
        inner.mark_disconnected();
        self.stats.record_disconnect();
        self.hub
            .emit_log(format!("OPC server disconnected: {error}"));
    }

    /// Catches links that dropped without a shutdown notice.
    fn sync_link_state(&self, inner: &mut SessionInner<C>) {
        if inner.is_connected() && !inner.client.is_connected() {
            let error = OpcDaError::connection_lost("transport reports the server link is down");
            self.link_lost(inner, &error);
        }
    }

    // =========================================================================
    // Connection lifecycle
    // =========================================================================

    async fn connect_locked(
        &self,
        inner: &mut SessionInner<C>,
        server_name: &str,
        host: &str,
    ) -> ResultCode {
        let (server_name, host) = (server_name.trim(), host.trim());
        if server_name.is_empty() || host.is_empty() {
            self.hub.emit_log("OPC server name or host not specified");
            return ResultCode::GenericFailure;
        }

        let target = ConnectTarget::new(server_name, host);
        self.sync_link_state(inner);
        if inner.is_connected() {
            if inner.target.as_ref() == Some(&target) {
                self.hub
                    .emit_log(format!("Already connected to OPC server {target}"));
                return ResultCode::Ok;
            }
            info!(to = %target, "Switching OPC server");
            self.teardown(inner).await;
        }

        inner.target = Some(target.clone());
        inner.state = SessionState::Connecting;
        let opened = self.open(inner, &target).await;
        self.daemon.start();

        match opened {
            Ok(()) => {
                inner.state = SessionState::Connected;
                self.stats.record_connect();
                info!(server = %target.server_name, host = %target.host, "OPC server connected");
                self.hub
                    .emit_log(format!("Connected to OPC server {target}"));
                ResultCode::Ok
            }
            Err(error) => {
                inner.state = SessionState::Disconnected;
                self.stats.record_connect_failure();
                error.log("connect");
                self.report(
                    ResultCode::GenericFailure,
                    format!("Failed to connect to OPC server {target}"),
                    Some(error),
                );
                ResultCode::GenericFailure
            }
        }
    }

    async fn open(&self, inner: &mut SessionInner<C>, target: &ConnectTarget) -> OpcDaResult<()> {
        let servers = inner.client.discover(&target.host).await?;
        if !servers.iter().any(|name| *name == target.server_name) {
            return Err(ConnectionError::server_not_found(&target.server_name, &target.host).into());
        }

        inner.link += 1;
        let on_shutdown = self.shutdown_callback(inner.link);
        inner
            .client
            .connect(&target.server_name, &target.host, on_shutdown)
            .await
    }

    async fn disconnect(&self) -> ResultCode {
        self.daemon.stop();

        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        // A tick that held the lock may have re-armed the daemon.
        self.daemon.stop();
        if !inner.is_connected() {
            self.hub.emit_log("OPC server already disconnected");
            return ResultCode::ServerNotConnected;
        }

        self.teardown(inner).await
    }

    /// Unhooks, empties and cancels every group newest first, then closes the
    /// connection. Each failing step raises one error event.
    async fn teardown(&self, inner: &mut SessionInner<C>) -> ResultCode {
        let target = inner.target.clone();
        let mut guard = DisconnectGuard { inner };
        let mut failures = 0usize;
        let mut link_down = !guard.client.is_connected();

        for group in guard.groups.drain_reverse() {
            guard.client.set_data_callback(group.handle(), None);
            if link_down {
                continue;
            }

            let handles = group.item_handles();
            if !handles.is_empty() {
                match guard.client.remove_items(group.handle(), &handles).await {
                    Ok(results) => {
                        for result in results.into_iter().filter(|result| !result.is_success()) {
                            failures += 1;
                            self.report(
                                ResultCode::GenericFailure,
                                format!(
                                    "Failed to unregister data item '{}': {}",
                                    result.item_name,
                                    result.code()
                                ),
                                Some(OperationError::item_rejected(&result.item_name, result.result_id).into()),
                            );
                        }
                    }
                    Err(error) => {
                        failures += 1;
                        link_down = error.is_connection_loss();
                        self.report(
                            ResultCode::GenericFailure,
                            format!("Failed to remove items of subscription group {}", group.name()),
                            Some(error),
                        );
                        if link_down {
                            continue;
                        }
                    }
                }
            }

            match guard.client.cancel_group(group.handle()).await {
                Ok(()) => self.stats.record_group_canceled(),
                Err(error) => {
                    failures += 1;
                    link_down = error.is_connection_loss();
                    self.report(
                        ResultCode::GenericFailure,
                        format!("Failed to cancel subscription group {}", group.name()),
                        Some(error),
                    );
                }
            }
        }

        if let Err(error) = guard.client.disconnect().await {
            failures += 1;
            self.report(
                ResultCode::GenericFailure,
                "Failed to close the OPC server connection",
                Some(error),
            );
        }
        drop(guard);

        self.stats.record_disconnect();
        let target = target.map(|t| t.to_string()).unwrap_or_default();
        if failures == 0 {
            self.hub
                .emit_log(format!("Disconnected from OPC server {target}"));
            ResultCode::Ok
        } else {
            warn!(server = %target, failures, "OPC server disconnected with errors");
            ResultCode::GenericFailure
        }
    }

    // =========================================================================
    // Reconciliation
    // =========================================================================

    /// Rejects invalid and duplicate items and carries over the live state of
    /// entries that did not change.
    fn normalize(&self, current: &[DataItem], items: Vec<DataItem>) -> Vec<DataItem> {
        let mut desired: Vec<DataItem> = Vec::with_capacity(items.len());

        for item in items {
            if let Err(error) = item.validate() {
                self.report(ResultCode::InvalidArgument, format!("Data item rejected: {error}"), Some(error));
                continue;
            }
            if desired.iter().any(|existing| existing.name == item.name) {
                self.report(
                    ResultCode::DuplicateName,
                    format!("Duplicate data item '{}' ignored", item.name),
                    Some(OperationError::duplicate_item(&item.name).into()),
                );
                continue;
            }

            let entry = match current.iter().find(|existing| existing.same_subscription(&item)) {
                Some(existing) => existing.clone(),
                None => item.with_quality(ResultCode::Unknown),
            };
            desired.push(entry);
        }

        desired
    }

    async fn reconcile_locked(&self, inner: &mut SessionInner<C>) {
        self.sync_link_state(inner);
        if !inner.is_connected() {
            self.report(
                ResultCode::ServerNotConnected,
                "OPC server not connected, data items will be registered after reconnection",
                None,
            );
            return;
        }

        self.stats.record_reconciliation();
        let outcome = Reconciler::new(
            &mut inner.client,
            &mut inner.groups,
            &mut inner.desired,
            &self.hub,
            &self.stats,
            self.config.group_deadband,
            self.data_callback(),
        )
        .run()
        .await;

        if let Err(error) = outcome {
            self.link_lost(inner, &error);
        }
    }

    // =========================================================================
    // Read / Write
    // =========================================================================

    async fn read(&self, item: &DataItem) -> Option<DataItem> {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.sync_link_state(inner);

        if !inner.is_connected() {
            self.report(
                ResultCode::ServerNotConnected,
                format!("OPC server not connected, cannot read data item '{}'", item.name),
                None,
            );
            return None;
        }
        if let Err(error) = item.validate() {
            self.report(ResultCode::InvalidArgument, format!("Cannot read: {error}"), Some(error));
            return None;
        }

        self.stats.record_read();
        let Some((group, handle)) = inner.groups.resolve(&item.name, item.update_rate_ms) else {
            self.report_unknown_item(item, "read");
            return Some(item.clone().with_quality(ResultCode::UnknownItemName));
        };

        match inner.client.read(group, &[handle]).await {
            Ok(values) => {
                let Some(value) = values.into_iter().next() else {
                    self.report_unknown_item(item, "read");
                    return Some(item.clone().with_quality(ResultCode::UnknownItemName));
                };

                let code = value.code();
                let result_id = value.result_id;
                let updated = match inner.desired_mut(&item.name) {
                    Some(entry) => {
                        entry.record_value(value.value, code);
                        entry.clone()
                    }
                    None => {
                        let mut copy = item.clone();
                        copy.record_value(value.value, code);
                        copy
                    }
                };

                if !code.is_ok() {
                    self.report(
                        code,
                        format!("Failed to read data item '{}': {code}", item.name),
                        Some(OperationError::item_rejected(&item.name, result_id).into()),
                    );
                }
                Some(updated)
            }
            Err(error) => {
                if error.is_connection_loss() {
                    self.link_lost(inner, &error);
                }
                self.report(
                    ResultCode::GenericFailure,
                    format!("Read error on data item '{}'", item.name),
                    Some(error),
                );
                None
            }
        }
    }

    async fn write(&self, item: &DataItem, value: Variant) -> ResultCode {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        self.sync_link_state(inner);

        if !inner.is_connected() {
            self.report(
                ResultCode::ServerNotConnected,
                format!("OPC server not connected, cannot write data item '{}'", item.name),
                None,
            );
            return ResultCode::ServerNotConnected;
        }
        if let Err(error) = item.validate() {
            self.report(ResultCode::InvalidArgument, format!("Cannot write: {error}"), Some(error));
            return ResultCode::InvalidArgument;
        }

        self.stats.record_write();
        let Some((group, handle)) = inner.groups.resolve(&item.name, item.update_rate_ms) else {
            return self.write_unknown_item(inner, item);
        };

        debug!(item = %item.name, value = %value, "Writing data item");
        match inner.client.write(group, &[(handle, value)]).await {
            Ok(results) => match results.into_iter().next() {
                Some(result) if result.is_success() => ResultCode::Ok,
                Some(result) => {
                    let code = result.code();
                    self.report(
                        code,
                        format!("Failed to write data item '{}': {code}", item.name),
                        Some(OperationError::item_rejected(&item.name, result.result_id).into()),
                    );
                    code
                }
                None => self.write_unknown_item(inner, item),
            },
            Err(error) => {
                if error.is_connection_loss() {
                    self.link_lost(inner, &error);
                }
                self.report(
                    ResultCode::GenericFailure,
                    format!("Write error on data item '{}'", item.name),
                    Some(error),
                );
                ResultCode::Unknown
            }
        }
    }

    fn write_unknown_item(&self, inner: &mut SessionInner<C>, item: &DataItem) -> ResultCode {
        if let Some(entry) = inner.desired_mut(&item.name) {
            entry.quality = ResultCode::Unknown;
        }
        self.report_unknown_item(item, "write");
        ResultCode::UnknownItemName
    }

    fn report_unknown_item(&self, item: &DataItem, operation: &str) {
        self.report(
            ResultCode::UnknownItemName,
            format!("Data item '{}' not found, {operation} skipped", item.name),
            Some(OperationError::unknown_item(&item.name).into()),
        );
    }

    // =========================================================================
    // Server notifications
    // =========================================================================

    async fn handle_server_event(&self, event: ServerEvent) {
        match event {
            ServerEvent::DataChanged { group, values } => self.apply_data_change(group, values).await,
            ServerEvent::Shutdown { reason, link } => self.handle_server_shutdown(reason, link).await,
        }
    }

    async fn apply_data_change(&self, group: GroupHandle, values: Vec<ItemValueResult>) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if !inner.groups.contains_handle(group) {
            debug!(group = %group, "Data change for a released group ignored");
            return;
        }

        for value in values {
            let code = value.code();
            let Some(entry) = inner.desired_mut(&value.item_name) else {
                debug!(item = %value.item_name, "Data change for an unknown item ignored");
                continue;
            };
            entry.record_value(value.value, code);
            let snapshot = entry.clone();

            self.stats.record_notification();
            self.hub.emit_data_changed(code, snapshot);
        }
    }

    async fn handle_server_shutdown(&self, reason: String, link: u64) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if !inner.is_connected() {
            debug!(reason = %reason, "Shutdown notice while disconnected ignored");
            return;
        }
        if link != inner.link {
            debug!(reason = %reason, link, current = inner.link, "Shutdown notice from a closed link ignored");
            return;
        }

        warn!(reason = %reason, "OPC server is shutting down");
        self.report(
            ResultCode::ServerShutdown,
            format!("OPC server shutdown: {reason}"),
            None,
        );
        self.teardown(inner).await;
        self.daemon.start();
    }
}

#[async_trait]
impl<C: ProtocolClient + 'static> HealthTarget for SessionCore<C> {
    async fn health_tick(&self) {
        let mut guard = self.inner.lock().await;
        let inner = &mut *guard;
        if !self.daemon.is_enabled() {
            debug!("Health daemon disabled while waiting, tick skipped");
            return;
        }
        self.sync_link_state(inner);

        if inner.is_connected() {
            if inner.desired.iter().any(|item| !item.is_good()) {
                self.hub.emit_log("Re-registering data items");
                self.reconcile_locked(inner).await;
            }
            return;
        }

        let Some(target) = inner.target.clone() else {
            debug!("No connection target, health tick skipped");
            return;
        };

        self.stats.record_reconnect_attempt();
        self.hub
            .emit_log(format!("Reconnecting to OPC server {target}"));
        if self
            .connect_locked(inner, &target.server_name, &target.host)
            .await
            .is_ok()
        {
            self.reconcile_locked(inner).await;
        }
    }
}

// =============================================================================
// Session
// =============================================================================

/// Resilient OPC DA client session.
///
/// Operations never return errors or panic on server faults: every failure
/// becomes a [`ResultCode`] and one error event on
/// [`notifications`](Self::notifications).
///
/// A session must be created inside a tokio runtime; it spawns the health
/// daemon and the event pump, both of which end when the session is shut
/// down or dropped.
///
/// # Example
///
/// ```rust,ignore
/// let session = Session::new(client, SessionConfig::default())?;
/// session.notifications().on_data_changed(|event| {
///     println!("{} -> {}", event.item.name, event.item.new_value);
/// });
///
/// session.connect("Matrikon.OPC.Simulation.1", "127.0.0.1").await;
/// session
///     .register_data_items(vec![DataItem::new("Random.Int4", 1000)])
///     .await;
/// ```
pub struct Session<C: ProtocolClient + 'static> {
    core: Arc<SessionCore<C>>,
    pump: JoinHandle<()>,
}

impl<C: ProtocolClient + 'static> Session<C> {
    /// Creates a session after validating `config`.
    pub fn new(client: C, config: SessionConfig) -> OpcDaResult<Self> {
        config.validate()?;
        Ok(Self::build(client, config))
    }

    /// Creates a session with the default configuration.
    pub fn with_defaults(client: C) -> Self {
        Self::build(client, SessionConfig::default())
    }

    fn build(client: C, config: SessionConfig) -> Self {
        let (events, receiver) = mpsc::unbounded_channel();
        let daemon = HealthDaemon::new(config.health_interval);
        let core = Arc::new(SessionCore {
            config,
            inner: Mutex::new(SessionInner::new(client)),
            hub: NotificationHub::new(),
            stats: SessionStats::new(),
            daemon,
            events,
        });

        let weak = Arc::downgrade(&core);
        let target: Weak<dyn HealthTarget> = weak;
        core.daemon.spawn(target);
        let pump = Self::spawn_pump(Arc::downgrade(&core), receiver);

        Self { core, pump }
    }

    fn spawn_pump(
        core: Weak<SessionCore<C>>,
        mut receiver: mpsc::UnboundedReceiver<ServerEvent>,
    ) -> JoinHandle<()> {
        tokio::spawn(async move {
            while let Some(event) = receiver.recv().await {
                let Some(core) = core.upgrade() else {
                    break;
                };
                core.handle_server_event(event).await;
            }
            debug!("Session event pump stopped");
        })
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    /// Returns the observer registry.
    pub fn notifications(&self) -> &NotificationHub {
        &self.core.hub
    }

    /// Returns the session statistics.
    pub fn stats(&self) -> &SessionStats {
        &self.core.stats
    }

    /// Returns the configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.core.config
    }

    /// Returns the health daemon.
    pub fn daemon(&self) -> &HealthDaemon {
        &self.core.daemon
    }

    /// Returns the connection state.
    pub async fn state(&self) -> SessionState {
        self.core.inner.lock().await.state
    }

    /// Returns `true` if connected.
    pub async fn is_connected(&self) -> bool {
        self.core.inner.lock().await.is_connected()
    }

    /// Returns the last connection target.
    pub async fn target(&self) -> Option<ConnectTarget> {
        self.core.inner.lock().await.target.clone()
    }

    /// Returns a snapshot of the desired item set.
    pub async fn data_items(&self) -> Vec<DataItem> {
        self.core.inner.lock().await.desired.clone()
    }

    /// Returns the number of subscription groups.
    pub async fn group_count(&self) -> usize {
        self.core.inner.lock().await.groups.len()
    }

    /// Returns the group rates in creation order.
    pub async fn group_rates(&self) -> Vec<u32> {
        self.core.inner.lock().await.groups.rates()
    }

    /// Returns snapshots of the subscription groups in creation order.
    pub async fn groups(&self) -> Vec<GroupSnapshot> {
        self.core.inner.lock().await.groups.snapshots()
    }

    // =========================================================================
    // Operations
    // =========================================================================

    /// Connects to `server_name` on `host`.
    pub async fn connect(&self, server_name: &str, host: &str) -> ResultCode {
        let mut guard = self.core.inner.lock().await;
        self.core.connect_locked(&mut guard, server_name, host).await
    }

    /// Cancels every group and closes the connection; disables the daemon.
    pub async fn disconnect(&self) -> ResultCode {
        self.core.disconnect().await
    }

    /// Replaces the desired item set and reconciles the server groups with it.
    pub async fn register_data_items(&self, items: Vec<DataItem>) {
        let mut guard = self.core.inner.lock().await;
        let inner = &mut *guard;
        inner.desired = self.core.normalize(&inner.desired, items);
        self.core.reconcile_locked(inner).await;
    }

    /// Reads the current value of a registered item.
    pub async fn read(&self, item: &DataItem) -> Option<DataItem> {
        self.core.read(item).await
    }

    /// Writes `value` to a registered item.
    pub async fn write(&self, item: &DataItem, value: impl Into<Variant>) -> ResultCode {
        self.core.write(item, value.into()).await
    }

    /// Lists the servers registered on `host`, or on the configured default
    /// host when `None`.
    pub async fn available_servers(&self, host: Option<&str>) -> Vec<String> {
        let host = host
            .map(str::trim)
            .filter(|host| !host.is_empty())
            .unwrap_or(self.core.config.default_host.as_str());

        let guard = self.core.inner.lock().await;
        match guard.client.discover(host).await {
            Ok(servers) => servers,
            Err(error) => {
                self.core.report(
                    ResultCode::GenericFailure,
                    format!("Failed to list OPC servers on {host}"),
                    Some(error),
                );
                Vec::new()
            }
        }
    }

    /// Removes all observers, disconnects and ends the background tasks.
    pub async fn shutdown(&self) {
        self.core.hub.clear_data_changed();
        self.core.disconnect().await;
        self.core.hub.clear();
        self.core.daemon.terminate();
        self.pump.abort();
        info!("OPC DA session shut down");
    }
}

impl<C: ProtocolClient + 'static> Drop for Session<C> {
    fn drop(&mut self) {
        self.core.daemon.terminate();
        self.pump.abort();
    }
}

impl<C: ProtocolClient + 'static> fmt::Debug for Session<C> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Session")
            .field("config", &self.core.config)
            .field("daemon", &self.core.daemon)
            .field("hub", &self.core.hub)
            .finish()
    }
}
