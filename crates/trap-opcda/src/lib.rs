// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Resilient OPC DA client session layer for TRAP.
//!
//! This crate keeps a set of data items subscribed on an OPC DA server and
//! keeps it that way across server restarts and dropped links. The wire
//! binding is abstracted behind [`ProtocolClient`]; everything above it lives
//! here.
//!
//! # Features
//!
//! - Connection state machine with discovery-verified connects
//! - Rate-partitioned subscription groups with diff-based reconciliation
//! - Periodic health daemon for automatic reconnect and re-registration
//! - Synchronous read/write by item name
//! - Data-changed, error and log notifications for any number of observers
//!
//! # Error Handling
//!
//! Session operations do not return `Result`. Every failure is reported as a
//! [`ResultCode`] and one [`ErrorEvent`](notify::ErrorEvent) whose source is
//! an [`OpcDaError`]:
//!
//! ```text
//! OpcDaError
//! ├── Connection    - Discovery, connect and link-loss issues
//! ├── Operation     - Group/item/read/write failures
//! └── Configuration - Invalid settings
//! ```
//!
//! # Example
//!
//! ```rust,ignore
//! use trap_opcda::{DataItem, Session, SessionConfig};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let session = Session::new(client, SessionConfig::default())?;
//!     session.notifications().on_data_changed(|event| {
//!         println!("{}: {}", event.code, event.item);
//!     });
//!
//!     session.connect("Matrikon.OPC.Simulation.1", "127.0.0.1").await;
//!     session
//!         .register_data_items(vec![
//!             DataItem::new("Random.Int4", 1000),
//!             DataItem::new("Random.Real8", 250),
//!         ])
//!         .await;
//!
//!     let code = session.write(&DataItem::new("Random.Int4", 1000), 42i32).await;
//!     println!("write: {code}");
//!     Ok(())
//! }
//! ```

#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![deny(unsafe_code)]

pub mod client;
pub mod config;
pub mod error;
pub mod notify;
pub mod result;
pub mod types;

// Re-export commonly used types
pub use error::{
    ConfigurationError, ConnectionError, ErrorCode, ErrorSeverity, OpcDaError, OpcDaResult,
    OperationError,
};

pub use types::{DataItem, GroupHandle, GroupState, ItemDescriptor, ItemHandle, Variant};

pub use result::ResultCode;

pub use config::{SessionConfig, SessionConfigBuilder};

pub use notify::{DataChangedEvent, ErrorEvent, LogEvent, NotificationHub, SubscriberId};

// Re-export client types
pub use client::{
    ConnectTarget, DataChangeCallback, GroupSnapshot, HealthDaemon, ItemResult, ItemValueResult,
    ProtocolClient, Session, SessionState, SessionStats, ShutdownCallback,
};
