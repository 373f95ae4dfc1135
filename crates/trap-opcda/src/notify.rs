// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Notification fan-out.
//!
//! The [`NotificationHub`] carries three independent channels:
//!
//! - **data changed**: item registered/unregistered, pushed value changes,
//! - **error**: one event per failure, with the decoded [`ResultCode`],
//! - **log**: lifecycle messages (connected, reconnecting, group removed...).
//!
//! Observers run synchronously on the task raising the event, in
//! registration order. Dispatch iterates a snapshot of the observer list, so
//! an observer may register or remove observers (itself included) while it
//! runs.
//!
//! # Example
//!
//! ```
//! use trap_opcda::notify::NotificationHub;
//! use trap_opcda::ResultCode;
//!
//! let hub = NotificationHub::new();
//! let id = hub.on_error(|event| {
//!     eprintln!("{}: {}", event.code, event.message);
//! });
//!
//! hub.emit_error(ResultCode::GenericFailure, "something failed", None);
//! assert!(hub.unsubscribe(id));
//! ```

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use crate::error::OpcDaError;
use crate::result::ResultCode;
use crate::types::DataItem;

// =============================================================================
// Events
// =============================================================================

/// An item was registered, unregistered or received a new value.
#[derive(Debug, Clone)]
pub struct DataChangedEvent {
    /// What happened to the item.
    pub code: ResultCode,
    /// Snapshot of the item after the change.
    pub item: DataItem,
    /// When the event was raised.
    pub timestamp: DateTime<Utc>,
}

/// A failure.
#[derive(Debug, Clone)]
pub struct ErrorEvent {
    /// Decoded result code of the failure.
    pub code: ResultCode,
    /// Human readable description.
    pub message: String,
    /// Underlying fault, if one exists.
    pub source: Option<Arc<OpcDaError>>,
    /// When the event was raised.
    pub timestamp: DateTime<Utc>,
}

/// A lifecycle message.
#[derive(Debug, Clone)]
pub struct LogEvent {
    /// The message.
    pub message: String,
    /// When the event was raised.
    pub timestamp: DateTime<Utc>,
}

/// Identifier returned by every registration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct SubscriberId(u64);

impl SubscriberId {
    /// Returns the raw id.
    #[inline]
    pub const fn value(&self) -> u64 {
        self.0
    }
}

impl fmt::Display for SubscriberId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "sub-{}", self.0)
    }
}

type Observer<E> = Arc<dyn Fn(&E) + Send + Sync>;

// =============================================================================
// ObserverList
// =============================================================================

struct ObserverList<E> {
    observers: RwLock<Vec<(SubscriberId, Observer<E>)>>,
}

impl<E> ObserverList<E> {
    fn new() -> Self {
        Self {
            observers: RwLock::new(Vec::new()),
        }
    }

    fn push(&self, id: SubscriberId, observer: Observer<E>) {
        self.observers.write().push((id, observer));
    }

    fn remove(&self, id: SubscriberId) -> bool {
        let mut observers = self.observers.write();
        let before = observers.len();
        observers.retain(|(existing, _)| *existing != id);
        observers.len() != before
    }

    fn dispatch(&self, event: &E) {
        let snapshot: Vec<Observer<E>> = self
            .observers
            .read()
            .iter()
            .map(|(_, observer)| Arc::clone(observer))
            .collect();

        for observer in snapshot {
            observer(event);
        }
    }

    fn len(&self) -> usize {
        self.observers.read().len()
    }

    fn clear(&self) {
        self.observers.write().clear();
    }
}

// =============================================================================
// NotificationHub
// =============================================================================

/// Registry of data-changed, error and log observers.
pub struct NotificationHub {
    next_id: AtomicU64,
    data_changed: ObserverList<DataChangedEvent>,
    errors: ObserverList<ErrorEvent>,
    logs: ObserverList<LogEvent>,
}

impl NotificationHub {
    /// Creates an empty hub.
    pub fn new() -> Self {
        Self {
            next_id: AtomicU64::new(1),
            data_changed: ObserverList::new(),
            errors: ObserverList::new(),
            logs: ObserverList::new(),
        }
    }

    fn next_id(&self) -> SubscriberId {
        SubscriberId(self.next_id.fetch_add(1, Ordering::Relaxed))
    }

    /// Registers a data-changed observer.
    pub fn on_data_changed<F>(&self, observer: F) -> SubscriberId
    where
        F: Fn(&DataChangedEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.data_changed.push(id, Arc::new(observer));
        id
    }

    /// Registers an error observer.
    pub fn on_error<F>(&self, observer: F) -> SubscriberId
    where
        F: Fn(&ErrorEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.errors.push(id, Arc::new(observer));
        id
    }

    /// Registers a log observer.
    pub fn on_log<F>(&self, observer: F) -> SubscriberId
    where
        F: Fn(&LogEvent) + Send + Sync + 'static,
    {
        let id = self.next_id();
        self.logs.push(id, Arc::new(observer));
        id
    }

    /// Removes an observer from whichever channel holds it.
    ///
    /// Returns `false` if the id is unknown.
    pub fn unsubscribe(&self, id: SubscriberId) -> bool {
        self.data_changed.remove(id) || self.errors.remove(id) || self.logs.remove(id)
    }

    /// Removes every data-changed observer.
    pub fn clear_data_changed(&self) {
        self.data_changed.clear();
    }

    /// Removes every observer on all channels.
    pub fn clear(&self) {
        self.data_changed.clear();
        self.errors.clear();
        self.logs.clear();
    }

    /// Returns the total number of registered observers.
    pub fn observer_count(&self) -> usize {
        self.data_changed.len() + self.errors.len() + self.logs.len()
    }

    /// Emits a data-changed event.
    pub fn emit_data_changed(&self, code: ResultCode, item: DataItem) {
        tracing::debug!(item = %item.name, rate_ms = item.update_rate_ms, code = %code, "Data changed");
        let event = DataChangedEvent {
            code,
            item,
            timestamp: Utc::now(),
        };
        self.data_changed.dispatch(&event);
    }

    /// Emits an error event.
    pub fn emit_error(
        &self,
        code: ResultCode,
        message: impl Into<String>,
        source: Option<Arc<OpcDaError>>,
    ) {
        let message = message.into();
        match &source {
            Some(error) => tracing::warn!(code = %code, error = %error, "{message}"),
            None => tracing::warn!(code = %code, "{message}"),
        }
        let event = ErrorEvent {
            code,
            message,
            source,
            timestamp: Utc::now(),
        };
        self.errors.dispatch(&event);
    }

    /// Emits a log event.
    pub fn emit_log(&self, message: impl Into<String>) {
        let message = message.into();
        tracing::info!("{message}");
        let event = LogEvent {
            message,
            timestamp: Utc::now(),
        };
        self.logs.dispatch(&event);
    }
}

impl Default for NotificationHub {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for NotificationHub {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("NotificationHub")
            .field("data_changed", &self.data_changed.len())
            .field("errors", &self.errors.len())
            .field("logs", &self.logs.len())
            .finish()
    }
}
