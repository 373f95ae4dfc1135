// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! OPC DA client error types.
//!
//! Transport implementations and the session internals report faults with
//! [`OpcDaError`]. The public session surface never returns these errors
//! directly: every failure is converted into a [`ResultCode`] plus one error
//! notification, and the fault itself travels along as the notification's
//! source.
//!
//! # Error Categories
//!
//! ```text
//! OpcDaError
//! ├── Connection    - Discovery, connect and link-loss issues
//! ├── Operation     - Group/item/read/write failures
//! └── Configuration - Invalid settings
//! ```
//!
//! # Examples
//!
//! ```
//! use trap_opcda::error::{ConnectionError, OpcDaError};
//! use trap_opcda::ResultCode;
//!
//! let error = OpcDaError::connection(ConnectionError::server_not_found(
//!     "Matrikon.OPC.Simulation.1",
//!     "127.0.0.1",
//! ));
//!
//! assert!(!error.is_connection_loss());
//! assert_eq!(error.result_code(), ResultCode::GenericFailure);
//! ```

use std::fmt;
use std::time::Duration;
use thiserror::Error;
use tracing::Level;

use crate::result::ResultCode;

// =============================================================================
// OpcDaError - Main Error Type
// =============================================================================

/// The main error type for OPC DA client operations.
#[derive(Debug, Error)]
pub enum OpcDaError {
    /// Connection-related errors.
    #[error("{0}")]
    Connection(#[from] ConnectionError),

    /// Group, item, read and write errors.
    #[error("{0}")]
    Operation(#[from] OperationError),

    /// Configuration errors.
    #[error("{0}")]
    Configuration(#[from] ConfigurationError),
}

impl OpcDaError {
    // =========================================================================
    // Factory Methods
    // =========================================================================

    /// Creates a connection error.
    #[inline]
    pub fn connection(error: ConnectionError) -> Self {
        Self::Connection(error)
    }

    /// Creates an operation error.
    #[inline]
    pub fn operation(error: OperationError) -> Self {
        Self::Operation(error)
    }

    /// Creates a configuration error.
    #[inline]
    pub fn configuration(error: ConfigurationError) -> Self {
        Self::Configuration(error)
    }

    /// Creates a not connected error.
    pub fn not_connected() -> Self {
        Self::Connection(ConnectionError::NotConnected)
    }

    /// Creates a link lost error.
    pub fn connection_lost(reason: impl Into<String>) -> Self {
        Self::Connection(ConnectionError::lost(reason))
    }

    /// Creates a transport failure for the named operation.
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Operation(OperationError::transport(operation, message))
    }

    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::Operation(OperationError::invalid_argument(message))
    }

    // =========================================================================
    // Error Properties
    // =========================================================================

    /// Returns `true` when the error means the server link is gone.
    ///
    /// A connection-class failure aborts the running operation and moves the
    /// session to `Disconnected`; every other failure is reported and the
    /// operation carries on with its remaining work.
    pub fn is_connection_loss(&self) -> bool {
        match self {
            Self::Connection(e) => e.is_connection_loss(),
            Self::Operation(_) | Self::Configuration(_) => false,
        }
    }

    /// Returns the result code reported to callers for this error.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::Connection(e) => e.result_code(),
            Self::Operation(e) => e.result_code(),
            Self::Configuration(_) => ResultCode::InvalidArgument,
        }
    }

    /// Returns the severity level of this error.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::Connection(e) => e.severity(),
            Self::Operation(e) => e.severity(),
            Self::Configuration(_) => ErrorSeverity::Critical,
        }
    }

    /// Returns the error category for logging.
    pub fn category(&self) -> &'static str {
        match self {
            Self::Connection(_) => "connection",
            Self::Operation(_) => "operation",
            Self::Configuration(_) => "configuration",
        }
    }

    /// Returns a unique error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::Connection(e) => e.error_code(),
            Self::Operation(e) => e.error_code(),
            Self::Configuration(e) => e.error_code(),
        }
    }

    /// Returns the tracing level for this error.
    pub fn tracing_level(&self) -> Level {
        self.severity().to_tracing_level()
    }

    /// Logs this error with appropriate level and context.
    pub fn log(&self, context: &str) {
        let code = self.error_code();

        match self.tracing_level() {
            Level::ERROR => tracing::error!(
                error_code = %code,
                category = self.category(),
                context = context,
                connection_loss = self.is_connection_loss(),
                "{self}"
            ),
            Level::WARN => tracing::warn!(
                error_code = %code,
                category = self.category(),
                context = context,
                connection_loss = self.is_connection_loss(),
                "{self}"
            ),
            _ => tracing::debug!(
                error_code = %code,
                category = self.category(),
                context = context,
                connection_loss = self.is_connection_loss(),
                "{self}"
            ),
        }
    }
}

// =============================================================================
// ConnectionError
// =============================================================================

/// Connection-related errors.
#[derive(Debug, Error)]
pub enum ConnectionError {
    /// The session has no live connection.
    #[error("Not connected to an OPC server")]
    NotConnected,

    /// Discovery did not list the requested server.
    #[error("OPC server '{server_name}' not found on host '{host}'")]
    ServerNotFound {
        /// Requested server name.
        server_name: String,
        /// Host that was queried.
        host: String,
    },

    /// Server discovery failed.
    #[error("Server discovery failed on host '{host}': {message}")]
    DiscoveryFailed {
        /// Host that was queried.
        host: String,
        /// Error message.
        message: String,
    },

    /// The server refused the connection.
    #[error("Connection to '{server_name}' on '{host}' refused: {message}")]
    Refused {
        /// Requested server name.
        server_name: String,
        /// Target host.
        host: String,
        /// Error message.
        message: String,
    },

    /// The link dropped while the session believed it was connected.
    #[error("Connection lost: {reason}")]
    Lost {
        /// Reason reported by the transport.
        reason: String,
    },
}

impl ConnectionError {
    /// Creates a server not found error.
    pub fn server_not_found(server_name: impl Into<String>, host: impl Into<String>) -> Self {
        Self::ServerNotFound {
            server_name: server_name.into(),
            host: host.into(),
        }
    }

    /// Creates a discovery failure.
    pub fn discovery_failed(host: impl Into<String>, message: impl Into<String>) -> Self {
        Self::DiscoveryFailed {
            host: host.into(),
            message: message.into(),
        }
    }

    /// Creates a connection refused error.
    pub fn refused(
        server_name: impl Into<String>,
        host: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        Self::Refused {
            server_name: server_name.into(),
            host: host.into(),
            message: message.into(),
        }
    }

    /// Creates a link lost error.
    pub fn lost(reason: impl Into<String>) -> Self {
        Self::Lost {
            reason: reason.into(),
        }
    }

    /// Returns `true` if the failure means an established link is gone.
    pub fn is_connection_loss(&self) -> bool {
        matches!(self, Self::NotConnected | Self::Lost { .. })
    }

    /// Returns the result code reported for this error.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::NotConnected | Self::Lost { .. } => ResultCode::ServerNotConnected,
            Self::ServerNotFound { .. } | Self::DiscoveryFailed { .. } | Self::Refused { .. } => {
                ResultCode::GenericFailure
            }
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::NotConnected | Self::Lost { .. } => ErrorSeverity::Warning,
            _ => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::NotConnected => ErrorCode::new(1, 1),
            Self::ServerNotFound { .. } => ErrorCode::new(1, 2),
            Self::DiscoveryFailed { .. } => ErrorCode::new(1, 3),
            Self::Refused { .. } => ErrorCode::new(1, 4),
            Self::Lost { .. } => ErrorCode::new(1, 5),
        }
    }
}

// =============================================================================
// OperationError
// =============================================================================

/// Errors raised by group, item, read and write operations.
#[derive(Debug, Error)]
pub enum OperationError {
    /// A caller-supplied value violates a precondition.
    #[error("Invalid argument: {message}")]
    InvalidArgument {
        /// Error message.
        message: String,
    },

    /// The item has no server-side registration.
    #[error("Unknown data item '{item_name}'")]
    UnknownItem {
        /// The item name.
        item_name: String,
    },

    /// The same item name appeared twice in one desired set.
    #[error("Duplicate data item '{item_name}'")]
    DuplicateItem {
        /// The item name.
        item_name: String,
    },

    /// The server returned a failure result for an item.
    #[error("Item '{item_name}' rejected: {code} (0x{result_id:08X})")]
    ItemRejected {
        /// The item name.
        item_name: String,
        /// Raw result identifier.
        result_id: u32,
        /// Decoded result code.
        code: ResultCode,
    },

    /// The transport rejected a whole call.
    #[error("{operation} failed: {message}")]
    Transport {
        /// Operation name.
        operation: &'static str,
        /// Error message.
        message: String,
    },
}

impl OperationError {
    /// Creates an invalid argument error.
    pub fn invalid_argument(message: impl Into<String>) -> Self {
        Self::InvalidArgument {
            message: message.into(),
        }
    }

    /// Creates an unknown item error.
    pub fn unknown_item(item_name: impl Into<String>) -> Self {
        Self::UnknownItem {
            item_name: item_name.into(),
        }
    }

    /// Creates a duplicate item error.
    pub fn duplicate_item(item_name: impl Into<String>) -> Self {
        Self::DuplicateItem {
            item_name: item_name.into(),
        }
    }

    /// Creates an item rejected error from a raw result identifier.
    pub fn item_rejected(item_name: impl Into<String>, result_id: u32) -> Self {
        Self::ItemRejected {
            item_name: item_name.into(),
            result_id,
            code: ResultCode::decode(result_id),
        }
    }

    /// Creates a transport failure.
    pub fn transport(operation: &'static str, message: impl Into<String>) -> Self {
        Self::Transport {
            operation,
            message: message.into(),
        }
    }

    /// Returns the result code reported for this error.
    pub fn result_code(&self) -> ResultCode {
        match self {
            Self::InvalidArgument { .. } => ResultCode::InvalidArgument,
            Self::UnknownItem { .. } => ResultCode::UnknownItemName,
            Self::DuplicateItem { .. } => ResultCode::DuplicateName,
            Self::ItemRejected { code, .. } => *code,
            Self::Transport { .. } => ResultCode::GenericFailure,
        }
    }

    /// Returns the severity level.
    pub fn severity(&self) -> ErrorSeverity {
        match self {
            Self::InvalidArgument { .. } | Self::DuplicateItem { .. } => ErrorSeverity::Warning,
            Self::UnknownItem { .. } | Self::ItemRejected { .. } => ErrorSeverity::Warning,
            Self::Transport { .. } => ErrorSeverity::Error,
        }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidArgument { .. } => ErrorCode::new(2, 1),
            Self::UnknownItem { .. } => ErrorCode::new(2, 2),
            Self::DuplicateItem { .. } => ErrorCode::new(2, 3),
            Self::ItemRejected { .. } => ErrorCode::new(2, 4),
            Self::Transport { .. } => ErrorCode::new(2, 5),
        }
    }
}

// =============================================================================
// ConfigurationError
// =============================================================================

/// Invalid session configuration.
#[derive(Debug, Error)]
pub enum ConfigurationError {
    /// Invalid interval value.
    #[error("Invalid interval for '{field}': {duration:?} ({reason})")]
    InvalidInterval {
        /// Field name.
        field: &'static str,
        /// The rejected duration.
        duration: Duration,
        /// Reason.
        reason: String,
    },

    /// A value is outside its permitted range.
    #[error("Invalid value for '{field}': {reason}")]
    InvalidValue {
        /// Field name.
        field: &'static str,
        /// Reason.
        reason: String,
    },

    /// Missing required field.
    #[error("Missing required configuration: {field}")]
    MissingField {
        /// The missing field.
        field: &'static str,
    },
}

impl ConfigurationError {
    /// Creates an invalid interval error.
    pub fn invalid_interval(field: &'static str, duration: Duration, reason: impl Into<String>) -> Self {
        Self::InvalidInterval {
            field,
            duration,
            reason: reason.into(),
        }
    }

    /// Creates an invalid value error.
    pub fn invalid_value(field: &'static str, reason: impl Into<String>) -> Self {
        Self::InvalidValue {
            field,
            reason: reason.into(),
        }
    }

    /// Creates a missing field error.
    pub fn missing_field(field: &'static str) -> Self {
        Self::MissingField { field }
    }

    /// Returns the error code.
    pub fn error_code(&self) -> ErrorCode {
        match self {
            Self::InvalidInterval { .. } => ErrorCode::new(3, 1),
            Self::InvalidValue { .. } => ErrorCode::new(3, 2),
            Self::MissingField { .. } => ErrorCode::new(3, 3),
        }
    }
}

// =============================================================================
// ErrorSeverity / ErrorCode
// =============================================================================

/// Severity level of an error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ErrorSeverity {
    /// Recoverable, expected in normal operation.
    Warning,
    /// Operation failed.
    Error,
    /// The session cannot work as configured.
    Critical,
}

impl ErrorSeverity {
    /// Converts to tracing level.
    pub fn to_tracing_level(self) -> Level {
        match self {
            Self::Warning => Level::WARN,
            Self::Error | Self::Critical => Level::ERROR,
        }
    }

    /// Returns the string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Warning => "warning",
            Self::Error => "error",
            Self::Critical => "critical",
        }
    }
}

impl fmt::Display for ErrorSeverity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Compact category/code pair used in structured logs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ErrorCode {
    category: u8,
    code: u8,
}

impl ErrorCode {
    /// Creates a new error code.
    pub const fn new(category: u8, code: u8) -> Self {
        Self { category, code }
    }

    /// Returns the full error code as a u16.
    pub fn as_u16(&self) -> u16 {
        ((self.category as u16) << 8) | (self.code as u16)
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "DA-{:02X}{:02X}", self.category, self.code)
    }
}

/// Result alias for OPC DA operations.
pub type OpcDaResult<T> = Result<T, OpcDaError>;

#[cfg(test)]
mod tests {
    use super::*;
    use crate::result::hresult;

    #[test]
    fn test_connection_loss_classification() {
        assert!(OpcDaError::not_connected().is_connection_loss());
        assert!(OpcDaError::connection_lost("RPC server unavailable").is_connection_loss());
        assert!(!OpcDaError::connection(ConnectionError::server_not_found("Srv", "host"))
            .is_connection_loss());
        assert!(!OpcDaError::transport("add_items", "boom").is_connection_loss());
    }

    #[test]
    fn test_result_codes() {
        assert_eq!(
            OpcDaError::not_connected().result_code(),
            ResultCode::ServerNotConnected
        );
        assert_eq!(
            OpcDaError::invalid_argument("blank name").result_code(),
            ResultCode::InvalidArgument
        );
        assert_eq!(
            OpcDaError::operation(OperationError::duplicate_item("T1")).result_code(),
            ResultCode::DuplicateName
        );
        assert_eq!(
            OpcDaError::transport("write", "rpc failure").result_code(),
            ResultCode::GenericFailure
        );
    }

    #[test]
    fn test_item_rejected_decodes_result_id() {
        let error = OperationError::item_rejected("Random.Int4", hresult::OPC_E_UNKNOWNITEMID);
        assert_eq!(error.result_code(), ResultCode::UnknownItemName);
        assert!(error.to_string().contains("0xC0040007"));
    }

    #[test]
    fn test_severity_and_category() {
        let error = OpcDaError::configuration(ConfigurationError::missing_field("default_host"));
        assert_eq!(error.severity(), ErrorSeverity::Critical);
        assert_eq!(error.category(), "configuration");
        assert_eq!(error.tracing_level(), Level::ERROR);

        assert_eq!(OpcDaError::not_connected().tracing_level(), Level::WARN);
    }

    #[test]
    fn test_error_code_display() {
        let code = OpcDaError::connection_lost("gone").error_code();
        assert_eq!(code.to_string(), "DA-0105");
        assert_eq!(code.as_u16(), 0x0105);
    }

    #[test]
    fn test_error_display() {
        let error = OpcDaError::connection(ConnectionError::refused(
            "Matrikon.OPC.Simulation.1",
            "10.0.0.5",
            "access denied",
        ));
        let message = error.to_string();
        assert!(message.contains("Matrikon.OPC.Simulation.1"));
        assert!(message.contains("10.0.0.5"));
    }
}
