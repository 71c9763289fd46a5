//! OCI-P session/transport engine for the ocip stack
//!
//! This crate owns the persistent TCP connection to the provisioning
//! server: the background framing reader, the positional request/response
//! correlation queue, and the session layer with its challenge-response
//! login handshake. Command shapes and response navigation live in
//! `ocip-core`; this crate only moves framed documents.
//!
//! The protocol carries no per-request identifier. Correlation is purely
//! positional: the Nth request written to the socket is answered by the
//! Nth complete inbound message. The connection keeps its pending queue
//! and the wire in lockstep by treating "enqueue + write" as one critical
//! section.

pub mod connection;
pub mod error;
pub mod promise;
pub mod session;

// Internal modules
#[cfg(test)]
mod tests;

pub use connection::{OciConnection, ENVELOPE_HEADER, ENVELOPE_TRAILER};
pub use error::{Error, Result};
pub use promise::ResponsePromise;
pub use session::OciSession;

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{Error, OciConnection, OciSession, ResponsePromise, Result};
    pub use ocip_core::prelude::*;
}
