//! Error type shared by the language-client modules.

use script_editor_core::ChangeError;
use thiserror::Error;

/// Errors produced while talking to a language server.
///
/// Feature requests (completion, hover, folding, colors) never surface these to the editing
/// surface: callers log them and fall back to "no result".
#[derive(Debug, Error)]
pub enum LspError {
    /// I/O error on the underlying transport.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON (de)serialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// The server answered with a JSON-RPC error.
    #[error("JSON-RPC error: code={code}, message={message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message reported by the server.
        message: String,
    },

    /// No response arrived in time.
    #[error("request {method} timed out after {timeout_ms}ms")]
    Timeout {
        /// Request method.
        method: String,
        /// Configured timeout.
        timeout_ms: u64,
    },

    /// The connection is gone (server exited or the transport stopped).
    #[error("connection closed")]
    ConnectionClosed,

    /// A message did not have the expected shape.
    #[error("invalid message: {0}")]
    InvalidMessage(String),

    /// Server-supplied edits could not be applied to the document.
    #[error("invalid edit: {0}")]
    Change(#[from] ChangeError),
}
