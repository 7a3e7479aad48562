//! Room controller error types.
//!
//! Registry and allocator errors are local: the actor logs them and keeps the
//! session running. Only `SessionClosed` and `Internal` indicate the room can no
//! longer accept work.

use thiserror::Error;

/// Room controller error type.
#[derive(Debug, Error)]
pub enum RoomError {
    /// An event referenced a stream, connection or view that is not live.
    #[error("Not found: {0}")]
    NotFound(String),

    /// A join arrived for a stream that is already live.
    #[error("Duplicate join: {0}")]
    DuplicateJoin(String),

    /// The transport collaborator reported a failure.
    #[error("Transport error: {0}")]
    Transport(String),

    /// Slot bookkeeping is inconsistent. Indicates a bug.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// Operation is not valid in the current session state.
    #[error("Cannot {operation} while {state}")]
    InvalidState {
        operation: &'static str,
        state: &'static str,
    },

    /// The session was torn down by `disconnect()` or a fatal transport error.
    #[error("Session closed")]
    SessionClosed,

    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// Internal error with context (actor channel failures and the like).
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RoomError {
    /// Returns a bounded label string for the error variant (for metrics).
    ///
    /// Uses enum variant names, not error message content.
    pub fn error_type_label(&self) -> &'static str {
        match self {
            RoomError::NotFound(_) => "not_found",
            RoomError::DuplicateJoin(_) => "duplicate_join",
            RoomError::Transport(_) => "transport",
            RoomError::InvariantViolation(_) => "invariant_violation",
            RoomError::InvalidState { .. } => "invalid_state",
            RoomError::SessionClosed => "session_closed",
            RoomError::Config(_) => "config",
            RoomError::Internal(_) => "internal",
        }
    }

    /// Whether the session can continue after this error.
    #[must_use]
    pub fn is_recoverable(&self) -> bool {
        matches!(
            self,
            RoomError::NotFound(_)
                | RoomError::DuplicateJoin(_)
                | RoomError::Transport(_)
                | RoomError::InvalidState { .. }
        )
    }
}
