//! Error types for the connection and session layers

use ocip_core::{DocumentError, ErrorDetails};
use thiserror::Error;

/// Result type alias for client operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors raised by the connection engine and the session handshake
#[derive(Error, Debug)]
pub enum Error {
    /// The connect attempt did not complete within the bound
    #[error("connect to {addr} timed out")]
    ConnectTimeout { addr: String },

    /// The connect attempt was refused or otherwise failed
    #[error("connect to {addr} failed: {source}")]
    ConnectFailed {
        addr: String,
        #[source]
        source: std::io::Error,
    },

    /// A send was attempted after the connection began closing
    #[error("connection closed (last error: {})", .last_error.as_deref().unwrap_or("none"))]
    Closed { last_error: Option<String> },

    /// Writing to the socket failed
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The connection went away before the awaited response arrived
    #[error("connection closed before a response arrived")]
    ConnectionClosed,

    /// The authentication reply carried no usable nonce
    #[error("authentication reply carried no nonce: {0}")]
    MissingNonce(#[source] DocumentError),

    /// The server rejected the login step
    #[error("login failed: {summary}")]
    LoginFailed { summary: String },

    /// A response document could not be navigated as expected
    #[error(transparent)]
    Document(#[from] DocumentError),

    /// The server answered with an error-tagged reply
    #[error("server error reply: {0}")]
    Protocol(#[from] ErrorDetails),
}
