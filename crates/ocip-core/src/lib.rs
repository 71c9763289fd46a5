//! OCI-P protocol model for the ocip stack
//!
//! This crate provides the protocol-level building blocks shared by the
//! client engine and the CLI: the generic response document model with
//! path-addressed lookup and table extraction, the closed set of request
//! commands with their wire serialization, and the login digest scheme.
//!
//! Nothing here touches the network; framing and delivery live in
//! `ocip-client`.

pub mod command;
pub mod digest;
pub mod document;
pub mod error;

pub use command::{Command, SearchCriteria, SearchField, SearchMode};
pub use document::{ErrorDetails, OciDocument, Value};
pub use error::{DocumentError, Result};

/// Re-export of common types for easier use
pub mod prelude {
    pub use crate::{
        Command, DocumentError, ErrorDetails, OciDocument, Result, SearchCriteria, SearchField,
        SearchMode, Value,
    };
}
