//! Common utilities and types shared across the room controller crates.

#![warn(clippy::pedantic)]

/// Module for identity types (streams, connections, views)
pub mod types;

/// Module for secret types that prevent accidental logging
pub mod secret;
