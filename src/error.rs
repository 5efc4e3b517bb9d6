//! Error types for exprwire.

use thiserror::Error;

/// Main error type for all exprwire operations.
#[derive(Debug, Error)]
pub enum ExprwireError {
    /// I/O error during a socket operation.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The remote side closed the session during an in-progress read.
    #[error("remote process closed session prematurely")]
    PeerClosed,

    /// The remote side refused an RPC definition during the handshake.
    #[error("while trying to define '{expr}' with id={id}: {msg}")]
    HandshakeRejected {
        /// Client-chosen id of the rejected definition.
        id: u32,
        /// The expression the peer refused to bind.
        expr: String,
        /// The peer's reply message.
        msg: String,
    },

    /// Hostname or service resolution failed.
    #[error("failed to resolve {target}: {source}")]
    AddressResolution {
        /// The `host:port` form that could not be resolved.
        target: String,
        /// The resolver's error.
        source: std::io::Error,
    },

    /// No resolved address yielded a successful connection.
    #[error("cannot connect to {target}: {source}")]
    ConnectFailed {
        /// The `host:port` form that could not be reached.
        target: String,
        /// The last connect attempt's error.
        source: std::io::Error,
    },

    /// Protocol error (malformed descriptor bytes, wrong reply type, etc.).
    #[error("protocol error: {0}")]
    Protocol(String),
}

/// Result type alias using ExprwireError.
pub type Result<T> = std::result::Result<T, ExprwireError>;
