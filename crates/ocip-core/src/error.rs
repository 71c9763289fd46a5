//! Error types for the protocol model

use thiserror::Error;

/// Result type alias for document operations
pub type Result<T> = std::result::Result<T, DocumentError>;

/// Errors raised while parsing or navigating a response document
#[derive(Error, Debug)]
pub enum DocumentError {
    /// The response body is not well-formed XML
    #[error("invalid XML: {reason}")]
    Parse { reason: String },

    /// A dotted path did not resolve to a value
    #[error("path not found: {path}")]
    PathNotFound { path: String },

    /// A path resolved to a subtree where a text value was expected
    #[error("value at {path} is not text")]
    NotText { path: String },

    /// A node did not follow the colHeading/row/col table convention
    #[error("malformed table at {path}: {reason}")]
    MalformedTable { path: String, reason: String },
}

impl DocumentError {
    /// Create a new parse error
    pub fn parse(reason: impl ToString) -> Self {
        Self::Parse {
            reason: reason.to_string(),
        }
    }

    /// Create a new path-not-found error
    pub fn path_not_found(path: impl Into<String>) -> Self {
        Self::PathNotFound { path: path.into() }
    }

    /// Create a new malformed-table error
    pub fn malformed_table(path: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::MalformedTable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
