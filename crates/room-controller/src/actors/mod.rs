//! Actor model for the room controller.
//!
//! ```text
//! transport callbacks ─┐
//! UI input (tap/press) ─┼─> mpsc mailbox ─> RoomActor
//! handle commands ──────┘                   ├── owns ParticipantRegistry
//!                                           ├── owns SlotAllocator
//!                                           └── owns TelemetrySampler (child token)
//! ```
//!
//! # Modules
//!
//! - [`room`] - `RoomActor` and its handle
//! - [`messages`] - Message, event and snapshot types
//! - [`metrics`] - Mailbox monitoring

pub mod messages;
pub mod metrics;
pub mod room;

pub use messages::*;
pub use metrics::MailboxMonitor;
pub use room::{RoomActor, RoomActorHandle};
