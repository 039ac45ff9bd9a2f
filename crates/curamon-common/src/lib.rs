//! Shared domain types for the curamon monitoring server.

pub mod types;
