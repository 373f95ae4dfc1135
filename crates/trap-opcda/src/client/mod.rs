// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC DA client session layer.
//!
//! - **Transport Layer**: [`ProtocolClient`], the capability a COM binding or a
//!   test double implements
//! - **Session**: connection state machine, read/write and push handling
//! - **Subscriptions**: rate-partitioned groups kept in line with the desired
//!   item set by a diff-based reconciliation pass
//! - **Health Daemon**: periodic reconnect and re-registration
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                          Session                                │
//! │        (connect / register / read / write / notifications)      │
//! └─────────────────────────────────────────────────────────────────┘
//!            │                    │                     ▲
//!            ▼                    ▼                     │ ticks
//! ┌────────────────────┐ ┌────────────────────┐ ┌───────────────────┐
//! │     Reconciler     │ │  NotificationHub   │ │   HealthDaemon    │
//! │ (groups by rate)   │ │ (data/error/log)   │ │ (reconnect timer) │
//! └────────────────────┘ └────────────────────┘ └───────────────────┘
//!            │
//!            ▼
//! ┌─────────────────────────────────────────────────────────────────┐
//! │                       ProtocolClient                            │
//! │                 (abstract OPC DA transport)                     │
//! └─────────────────────────────────────────────────────────────────┘
//! ```

mod daemon;
mod session;
mod subscription;
mod transport;

pub use daemon::HealthDaemon;
pub use session::{ConnectTarget, Session, SessionState, SessionStats};
pub use subscription::GroupSnapshot;
pub use transport::{DataChangeCallback, ItemResult, ItemValueResult, ProtocolClient, ShutdownCallback};
