//! Core shared types and user-facing error reporting.

pub mod error;

pub use error::{ErrorContext, user_friendly_error};
