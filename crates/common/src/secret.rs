//! Secret types for protecting sensitive values from accidental logging.
//!
//! This module re-exports types from the [`secrecy`] crate. Session tokens and
//! API credentials handed to the transport must be held in these types so that
//! any `Debug` derive or tracing field prints a redacted placeholder.
//!
//! # Example
//!
//! ```rust
//! use common::secret::{ExposeSecret, SecretString};
//!
//! #[derive(Debug)]
//! struct SessionCredentials {
//!     session_id: String,
//!     token: SecretString,
//! }
//!
//! let creds = SessionCredentials {
//!     session_id: "room-1".to_string(),
//!     token: SecretString::from("T1==cGFydG5lcl9pZD0"),
//! };
//!
//! assert!(!format!("{creds:?}").contains("cGFydG5lcl9pZD0"));
//! assert_eq!(creds.token.expose_secret(), "T1==cGFydG5lcl9pZD0");
//! ```
//!
//! Use `SecretString` for:
//! - Session tokens
//! - API keys and secrets

// Re-export the main types from secrecy
pub use secrecy::{ExposeSecret, SecretString};
