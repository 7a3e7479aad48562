//! # Room Test Utilities
//!
//! Recording mocks and fixtures for exercising the room controller without a
//! media stack or UI.
//!
//! ## Modules
//!
//! - `mock_transport` - Records every transport call, optionally failing some
//! - `mock_surface` - Keeps a featured/grid layout from attach/detach calls
//! - `mock_telemetry` - Recording telemetry sink and scripted resource probe
//! - `fixtures` - Config, streams and a spawned room wired to the mocks
//!
//! ## Usage
//!
//! ```rust,ignore
//! use room_test_utils::*;
//!
//! #[tokio::test]
//! async fn test_example() {
//!     let room = TestRoom::connected(test_config()).await;
//!     let alice = TestStream::new("alice");
//!
//!     room.handle.transport_event(alice.received()).await.unwrap();
//!
//!     let state = room.handle.get_state().await.unwrap();
//!     assert_eq!(state.featured, Some(alice.stream_id.clone()));
//! }
//! ```
//!
//! These helpers are only used from integration tests under `tests/`; unit
//! tests inside `room-controller` use their own local mocks.

pub mod fixtures;
pub mod mock_surface;
pub mod mock_telemetry;
pub mod mock_transport;

// Re-export commonly used items
pub use fixtures::*;
pub use mock_surface::*;
pub use mock_telemetry::*;
pub use mock_transport::*;
