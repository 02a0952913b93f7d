//! Transport seam between the deferred RPC engine and the ubus bridge.
//!
//! The engine only ever talks to [`RpcTransport`]; the production
//! implementation is [`crate::ubus::UbusHttpTransport`], tests substitute a
//! scripted mock. Everything protocol-level the engine needs to know about a
//! transport failure is captured in [`TransportError`].

use serde_json::{Map, Value};

use crate::error::ErrorCode;

// =============================================================================
// TRANSPORT TRAIT
// =============================================================================

/// Async seam over the ubus JSON-RPC bridge. Enables mocking in tests.
#[async_trait::async_trait]
pub trait RpcTransport: Send + Sync {
    /// Invoke `method` on the ubus object `object` with `args`, returning the
    /// call's payload.
    ///
    /// # Errors
    ///
    /// Returns a [`TransportError`] if the request fails, the bridge rejects
    /// it, or the reply envelope is malformed.
    async fn invoke(
        &self,
        object: &str,
        method: &str,
        args: Map<String, Value>,
    ) -> Result<Value, TransportError>;
}

// =============================================================================
// ERROR
// =============================================================================

/// JSON-RPC error code uhttpd's ubus bridge emits when the target object is
/// not registered. For a modem object this means the device is absent.
pub const JSONRPC_OBJECT_NOT_FOUND: i32 = -32000;

/// JSON-RPC error code for a ubus request that timed out inside the bridge.
pub const JSONRPC_TIMEOUT: i32 = -32003;

/// ubus call status for a request that timed out on the bus.
const UBUS_STATUS_TIMEOUT: i32 = 7;

/// Errors produced by the transport layer.
#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    /// The HTTP client could not be constructed.
    #[error("http client build failed: {0}")]
    ClientBuild(String),

    /// The HTTP request itself failed (connection refused, DNS, timeout).
    #[error("http request failed: {0}")]
    Http(String),

    /// The endpoint answered with a non-success HTTP status.
    #[error("http status {status}")]
    Status { status: u16 },

    /// The bridge rejected the request with a JSON-RPC error envelope.
    #[error("rpc error {code}: {message}")]
    Rpc { code: i32, message: String },

    /// The call reached ubus but completed with a non-zero status.
    #[error("ubus call failed with status {code}: {}", ubus_status_text(*code))]
    UbusCall { code: i32 },

    /// The reply was not a JSON-RPC envelope this client understands.
    #[error("invalid rpc reply: {0}")]
    Decode(String),
}

impl TransportError {
    /// True when the failure says the addressed ubus object does not exist.
    pub fn is_object_missing(&self) -> bool {
        match self {
            Self::Rpc { code, message } => {
                *code == JSONRPC_OBJECT_NOT_FOUND || message.contains("Object not found")
            }
            _ => false,
        }
    }
}

impl ErrorCode for TransportError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::ClientBuild(_) => "E_HTTP_CLIENT_BUILD",
            Self::Http(_) => "E_HTTP_REQUEST",
            Self::Status { .. } => "E_HTTP_STATUS",
            Self::Rpc { .. } => "E_RPC",
            Self::UbusCall { .. } => "E_UBUS_CALL",
            Self::Decode(_) => "E_RPC_DECODE",
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Http(_) => true,
            Self::Status { status } => matches!(status, 429 | 500..=599),
            Self::Rpc { code, .. } => {
                matches!(*code, JSONRPC_OBJECT_NOT_FOUND | JSONRPC_TIMEOUT)
            }
            Self::UbusCall { code } => *code == UBUS_STATUS_TIMEOUT,
            Self::ClientBuild(_) | Self::Decode(_) => false,
        }
    }
}

// =============================================================================
// UBUS STATUS TEXT
// =============================================================================

/// Human text for ubus call status codes, as the bus itself names them.
pub fn ubus_status_text(code: i32) -> &'static str {
    match code {
        0 => "Command OK",
        1 => "Invalid command",
        2 => "Invalid argument",
        3 => "Method not found",
        4 => "Not found",
        5 => "No response",
        6 => "Permission denied",
        7 => "Request timed out",
        8 => "Not supported",
        9 => "Unknown error",
        10 => "Connection failed",
        _ => "Unrecognized status",
    }
}

#[cfg(test)]
#[path = "transport_test.rs"]
mod tests;
