//! In-crate tests for the connection engine
