// SPDX-License-Identifier: PolyForm-Noncommercial-1.0.0
// Copyright (c) 2025 Sylvex. All rights reserved.

//! Result and quality codes.
//!
//! [`ResultCode`] is both the return value of session operations and the
//! quality of a [`DataItem`](crate::DataItem). Raw 32-bit result identifiers
//! reported by the transport are translated with [`ResultCode::decode`].

use std::fmt;

use serde::{Deserialize, Serialize};

/// Raw HRESULT-style result identifiers used by OPC DA servers.
pub mod hresult {
    /// Operation succeeded.
    pub const S_OK: u32 = 0x0000_0000;
    /// Unspecified failure.
    pub const E_FAIL: u32 = 0x8000_4005;
    /// Not implemented.
    pub const E_NOTIMPL: u32 = 0x8000_4001;
    /// Out of memory.
    pub const E_OUTOFMEMORY: u32 = 0x8007_000E;
    /// Invalid argument.
    pub const E_INVALIDARG: u32 = 0x8007_0057;
    /// Access denied.
    pub const E_ACCESSDENIED: u32 = 0x8007_0005;
    /// The operation timed out.
    pub const E_TIMEOUT: u32 = 0x8007_05B4;
    /// The server object disconnected from its clients.
    pub const RPC_E_DISCONNECTED: u32 = 0x8001_0108;
    /// Invalid item handle.
    pub const OPC_E_INVALIDHANDLE: u32 = 0xC004_0001;
    /// Requested data type cannot be returned.
    pub const OPC_E_BADTYPE: u32 = 0xC004_0004;
    /// Operation not allowed on a public group.
    pub const OPC_E_PUBLIC: u32 = 0xC004_0005;
    /// Item access rights do not allow the operation.
    pub const OPC_E_BADRIGHTS: u32 = 0xC004_0006;
    /// Item id is not defined in the server address space.
    pub const OPC_E_UNKNOWNITEMID: u32 = 0xC004_0007;
    /// Item id syntax is invalid.
    pub const OPC_E_INVALIDITEMID: u32 = 0xC004_0008;
    /// Filter string is invalid.
    pub const OPC_E_INVALIDFILTER: u32 = 0xC004_0009;
    /// Item access path is unknown.
    pub const OPC_E_UNKNOWNPATH: u32 = 0xC004_000A;
    /// Value out of range.
    pub const OPC_E_RANGE: u32 = 0xC004_000B;
    /// Duplicate name not allowed.
    pub const OPC_E_DUPLICATENAME: u32 = 0xC004_000C;
    /// Requested update rate not supported, server chose another.
    pub const OPC_S_UNSUPPORTEDRATE: u32 = 0x0004_000D;
    /// Value was written but clamped.
    pub const OPC_S_CLAMP: u32 = 0x0004_000E;
    /// Object is still referenced.
    pub const OPC_S_INUSE: u32 = 0x0004_000F;
    /// Requested object not found.
    pub const OPC_E_NOTFOUND: u32 = 0xC004_0011;
    /// Property id is invalid for the item.
    pub const OPC_E_INVALID_PID: u32 = 0xC004_0203;
}

/// Outcome of a session operation and quality of a data item.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultCode {
    /// Success / good quality.
    Ok,
    /// Unknown outcome or not yet synchronized.
    #[default]
    Unknown,
    /// Unspecified failure.
    GenericFailure,
    /// The session is not connected to a server.
    ServerNotConnected,
    /// The item is not registered with the server.
    UnknownItemName,
    /// The server announced its shutdown.
    ServerShutdown,
    /// Lifecycle notification: the item was registered.
    ItemRegistered,
    /// Lifecycle notification: the item was unregistered.
    ItemUnregistered,
    /// Invalid argument.
    InvalidArgument,
    /// Server out of memory.
    OutOfMemory,
    /// Operation not implemented by the server.
    NotImplemented,
    /// Access denied.
    AccessDenied,
    /// The operation timed out.
    Timeout,
    /// Invalid item handle.
    InvalidHandle,
    /// Requested data type cannot be returned.
    BadType,
    /// Operation not allowed on a public group.
    Public,
    /// Item access rights do not allow the operation.
    BadRights,
    /// Item id syntax is invalid.
    InvalidItemId,
    /// Filter string is invalid.
    InvalidFilter,
    /// Item access path is unknown.
    UnknownPath,
    /// Value out of range.
    Range,
    /// Duplicate name.
    DuplicateName,
    /// Requested update rate not supported.
    UnsupportedRate,
    /// Value was clamped.
    Clamp,
    /// Object is still referenced.
    InUse,
    /// Requested object not found.
    NotFound,
    /// Property id is invalid.
    InvalidPropertyId,
}

impl ResultCode {
    /// Decodes a raw result identifier.
    ///
    /// Unrecognized identifiers decode to [`ResultCode::Unknown`].
    pub fn decode(result_id: u32) -> Self {
        match result_id {
            hresult::S_OK => Self::Ok,
            hresult::E_FAIL => Self::GenericFailure,
            hresult::E_NOTIMPL => Self::NotImplemented,
            hresult::E_OUTOFMEMORY => Self::OutOfMemory,
            hresult::E_INVALIDARG => Self::InvalidArgument,
            hresult::E_ACCESSDENIED => Self::AccessDenied,
            hresult::E_TIMEOUT => Self::Timeout,
            hresult::RPC_E_DISCONNECTED => Self::ServerNotConnected,
            hresult::OPC_E_INVALIDHANDLE => Self::InvalidHandle,
            hresult::OPC_E_BADTYPE => Self::BadType,
            hresult::OPC_E_PUBLIC => Self::Public,
            hresult::OPC_E_BADRIGHTS => Self::BadRights,
            hresult::OPC_E_UNKNOWNITEMID => Self::UnknownItemName,
            hresult::OPC_E_INVALIDITEMID => Self::InvalidItemId,
            hresult::OPC_E_INVALIDFILTER => Self::InvalidFilter,
            hresult::OPC_E_UNKNOWNPATH => Self::UnknownPath,
            hresult::OPC_E_RANGE => Self::Range,
            hresult::OPC_E_DUPLICATENAME => Self::DuplicateName,
            hresult::OPC_S_UNSUPPORTEDRATE => Self::UnsupportedRate,
            hresult::OPC_S_CLAMP => Self::Clamp,
            hresult::OPC_S_INUSE => Self::InUse,
            hresult::OPC_E_NOTFOUND => Self::NotFound,
            hresult::OPC_E_INVALID_PID => Self::InvalidPropertyId,
            _ => Self::Unknown,
        }
    }

    /// Returns the raw identifier for codes that have one on the wire.
    pub fn result_id(&self) -> Option<u32> {
        let id = match self {
            Self::Ok => hresult::S_OK,
            Self::GenericFailure => hresult::E_FAIL,
            Self::NotImplemented => hresult::E_NOTIMPL,
            Self::OutOfMemory => hresult::E_OUTOFMEMORY,
            Self::InvalidArgument => hresult::E_INVALIDARG,
            Self::AccessDenied => hresult::E_ACCESSDENIED,
            Self::Timeout => hresult::E_TIMEOUT,
            Self::ServerNotConnected => hresult::RPC_E_DISCONNECTED,
            Self::InvalidHandle => hresult::OPC_E_INVALIDHANDLE,
            Self::BadType => hresult::OPC_E_BADTYPE,
            Self::Public => hresult::OPC_E_PUBLIC,
            Self::BadRights => hresult::OPC_E_BADRIGHTS,
            Self::UnknownItemName => hresult::OPC_E_UNKNOWNITEMID,
            Self::InvalidItemId => hresult::OPC_E_INVALIDITEMID,
            Self::InvalidFilter => hresult::OPC_E_INVALIDFILTER,
            Self::UnknownPath => hresult::OPC_E_UNKNOWNPATH,
            Self::Range => hresult::OPC_E_RANGE,
            Self::DuplicateName => hresult::OPC_E_DUPLICATENAME,
            Self::UnsupportedRate => hresult::OPC_S_UNSUPPORTEDRATE,
            Self::Clamp => hresult::OPC_S_CLAMP,
            Self::InUse => hresult::OPC_S_INUSE,
            Self::NotFound => hresult::OPC_E_NOTFOUND,
            Self::InvalidPropertyId => hresult::OPC_E_INVALID_PID,
            Self::Unknown | Self::ServerShutdown | Self::ItemRegistered | Self::ItemUnregistered => {
                return None
            }
        };
        Some(id)
    }

    /// Returns `true` for [`ResultCode::Ok`].
    #[inline]
    pub fn is_ok(&self) -> bool {
        matches!(self, Self::Ok)
    }

    /// Returns `true` for the registration lifecycle notifications.
    #[inline]
    pub fn is_lifecycle(&self) -> bool {
        matches!(self, Self::ItemRegistered | Self::ItemUnregistered)
    }

    /// Returns the name of this code.
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ok => "Ok",
            Self::Unknown => "Unknown",
            Self::GenericFailure => "GenericFailure",
            Self::ServerNotConnected => "ServerNotConnected",
            Self::UnknownItemName => "UnknownItemName",
            Self::ServerShutdown => "ServerShutdown",
            Self::ItemRegistered => "ItemRegistered",
            Self::ItemUnregistered => "ItemUnregistered",
            Self::InvalidArgument => "InvalidArgument",
            Self::OutOfMemory => "OutOfMemory",
            Self::NotImplemented => "NotImplemented",
            Self::AccessDenied => "AccessDenied",
            Self::Timeout => "Timeout",
            Self::InvalidHandle => "InvalidHandle",
            Self::BadType => "BadType",
            Self::Public => "Public",
            Self::BadRights => "BadRights",
            Self::InvalidItemId => "InvalidItemId",
            Self::InvalidFilter => "InvalidFilter",
            Self::UnknownPath => "UnknownPath",
            Self::Range => "Range",
            Self::DuplicateName => "DuplicateName",
            Self::UnsupportedRate => "UnsupportedRate",
            Self::Clamp => "Clamp",
            Self::InUse => "InUse",
            Self::NotFound => "NotFound",
            Self::InvalidPropertyId => "InvalidPropertyId",
        }
    }
}

impl fmt::Display for ResultCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_decode_known_identifiers() {
        assert_eq!(ResultCode::decode(hresult::S_OK), ResultCode::Ok);
        assert_eq!(ResultCode::decode(hresult::E_FAIL), ResultCode::GenericFailure);
        assert_eq!(ResultCode::decode(hresult::E_INVALIDARG), ResultCode::InvalidArgument);
        assert_eq!(ResultCode::decode(hresult::OPC_E_BADRIGHTS), ResultCode::BadRights);
        assert_eq!(ResultCode::decode(hresult::OPC_S_CLAMP), ResultCode::Clamp);
        assert_eq!(ResultCode::decode(hresult::OPC_E_INVALID_PID), ResultCode::InvalidPropertyId);
    }

    #[test]
    fn test_unknown_item_id_maps_to_unknown_item_name() {
        assert_eq!(
            ResultCode::decode(hresult::OPC_E_UNKNOWNITEMID),
            ResultCode::UnknownItemName
        );
    }

    #[test]
    fn test_decode_unrecognized_is_unknown() {
        assert_eq!(ResultCode::decode(0xDEAD_BEEF), ResultCode::Unknown);
        assert_eq!(ResultCode::decode(1), ResultCode::Unknown);
    }

    #[test]
    fn test_result_id_inverse_of_decode() {
        for code in [
            ResultCode::Ok,
            ResultCode::GenericFailure,
            ResultCode::UnknownItemName,
            ResultCode::Range,
            ResultCode::Timeout,
        ] {
            let id = code.result_id().unwrap();
            assert_eq!(ResultCode::decode(id), code);
        }
        assert_eq!(ResultCode::ItemRegistered.result_id(), None);
        assert_eq!(ResultCode::Unknown.result_id(), None);
    }

    #[test]
    fn test_predicates_and_display() {
        assert!(ResultCode::Ok.is_ok());
        assert!(!ResultCode::Clamp.is_ok());
        assert!(ResultCode::ItemUnregistered.is_lifecycle());
        assert_eq!(ResultCode::default(), ResultCode::Unknown);
        assert_eq!(ResultCode::ServerNotConnected.to_string(), "ServerNotConnected");
    }

    #[test]
    fn test_serde_names() {
        let json = serde_json::to_string(&ResultCode::UnknownItemName).unwrap();
        assert_eq!(json, "\"unknown_item_name\"");
    }
}
