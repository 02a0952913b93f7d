//! Error taxonomy for deferred RPC operations.
//!
//! Three failure families reach callers: the daemon rejected the call
//! (`Backend`), the daemon evicted a deferred result before it was picked up
//! (`DeferredExpired`), or the HTTP/JSON-RPC layer itself failed
//! (`Transport`). `Interrupted` covers the one lifecycle case the protocol
//! cannot express: the poll carrying a still-pending result was discarded
//! before it could deliver.

use crate::transport::TransportError;

// =============================================================================
// ERROR CODES
// =============================================================================

/// Grepable error code and retryable flag for structured errors.
pub trait ErrorCode: std::fmt::Display {
    fn error_code(&self) -> &'static str;

    fn retryable(&self) -> bool {
        false
    }
}

// =============================================================================
// RPC ERROR
// =============================================================================

/// Errors produced by deferred RPC calls.
#[derive(Debug, thiserror::Error)]
pub enum RpcError {
    /// The daemon reported an explicit error, either in the immediate
    /// response or packaged inside a ready deferred result.
    #[error("backend error: {message}")]
    Backend { message: String },

    /// The daemon evicted the deferred record before the result was
    /// collected.
    #[error("Deferred result expired")]
    DeferredExpired,

    /// The poll task for a pending deferred result was discarded before it
    /// delivered, which happens when a scheduler tick is cancelled mid-poll.
    #[error("deferred poll interrupted before the result arrived")]
    Interrupted,

    /// The request never reached the daemon, or its reply was unusable.
    #[error(transparent)]
    Transport(#[from] TransportError),
}

impl RpcError {
    /// True when the failure means the modem's RPC object is gone, which in
    /// practice means the device is unplugged or the daemon is not running.
    /// Front-ends traditionally key the "insert your modem" hint off this.
    pub fn is_device_absent(&self) -> bool {
        match self {
            Self::Transport(e) => e.is_object_missing(),
            _ => false,
        }
    }
}

impl ErrorCode for RpcError {
    fn error_code(&self) -> &'static str {
        match self {
            Self::Backend { .. } => "E_BACKEND",
            Self::DeferredExpired => "E_DEFERRED_EXPIRED",
            Self::Interrupted => "E_INTERRUPTED",
            Self::Transport(e) => e.error_code(),
        }
    }

    fn retryable(&self) -> bool {
        match self {
            Self::Backend { .. } | Self::Interrupted => false,
            Self::DeferredExpired => true,
            Self::Transport(e) => e.retryable(),
        }
    }
}

#[cfg(test)]
#[path = "error_test.rs"]
mod tests;
