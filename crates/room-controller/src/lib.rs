//! Room Controller Library
//!
//! Participant registry and featured/grid slot arbitration for a multi-party
//! video room. The library owns no media or UI; it talks to them through the
//! traits in [`collaborators`].
//!
//! # Architecture
//!
//! ```text
//! Transport ──events──> RoomActor ──> ParticipantRegistry (create/destroy)
//!                          │      └─> SlotAllocator (featured/grid, quality)
//!                          │                 │
//!                          │             Directives
//!                          v                 v
//!                   TelemetrySampler    Transport / RenderingSurface
//! ```
//!
//! - The newest participant is always featured; the previous one drops to
//!   the tail of the grid.
//! - A long-press promotes a grid participant, swapping it in place with the
//!   featured one.
//! - All mutations are serialised through the actor mailbox.
//!
//! # Modules
//!
//! - [`actors`] - Room session actor and message types
//! - [`allocator`] - Featured/grid slot assignment
//! - [`registry`] - Live participant set
//! - [`config`] - Configuration from environment
//! - [`errors`] - Error types

pub mod actors;
pub mod allocator;
pub mod collaborators;
pub mod config;
pub mod errors;
pub mod observability;
pub mod participant;
pub mod registry;
pub mod telemetry;
