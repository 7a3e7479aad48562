//! Message types for the room actor.
//!
//! Transport callbacks, UI input and commands all arrive through one
//! `tokio::sync::mpsc` mailbox. Request-reply uses `tokio::sync::oneshot`.

use crate::errors::RoomError;
use crate::participant::ParticipantInfo;

use common::types::{ConnectionId, StreamId, ViewHandle};
use serde::{Deserialize, Serialize};
use tokio::sync::oneshot;

/// Messages sent to `RoomActor`.
#[derive(Debug)]
pub enum RoomMessage {
    /// Begin joining the session.
    Connect {
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Leave the session and release all participant state. Idempotent.
    Disconnect { respond_to: oneshot::Sender<()> },

    /// Callback from the transport.
    Transport(TransportEvent),

    /// Input on a participant view.
    Input(UserInput),

    /// Swap a participant into the featured slot.
    Promote {
        stream_id: StreamId,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// Flip video delivery for a participant.
    ToggleVideo {
        stream_id: StreamId,
        respond_to: oneshot::Sender<Result<(), RoomError>>,
    },

    /// The featured view finished loading.
    FeaturedReady,

    /// Get a snapshot of room state.
    GetState {
        respond_to: oneshot::Sender<RoomSnapshot>,
    },
}

/// Events delivered by the transport collaborator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "event", rename_all = "snake_case")]
pub enum TransportEvent {
    Connected,
    Reconnecting,
    Reconnected,
    StreamReceived {
        stream_id: StreamId,
        connection_id: ConnectionId,
    },
    StreamDropped {
        stream_id: StreamId,
    },
    /// Transport failure. Only `fatal` errors end the session.
    Error {
        message: String,
        #[serde(default)]
        fatal: bool,
    },
}

impl TransportEvent {
    /// Bounded label for metrics.
    #[must_use]
    pub const fn event_type_label(&self) -> &'static str {
        match self {
            TransportEvent::Connected => "connected",
            TransportEvent::Reconnecting => "reconnecting",
            TransportEvent::Reconnected => "reconnected",
            TransportEvent::StreamReceived { .. } => "stream_received",
            TransportEvent::StreamDropped { .. } => "stream_dropped",
            TransportEvent::Error { .. } => "transport_error",
        }
    }
}

/// Input events emitted by the rendering surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "input", rename_all = "snake_case")]
pub enum UserInput {
    /// Mapped to toggle-video on the view's participant.
    Tap { view: ViewHandle },
    /// Mapped to promote on the view's participant.
    LongPress { view: ViewHandle },
}

impl UserInput {
    #[must_use]
    pub const fn view(&self) -> ViewHandle {
        match self {
            UserInput::Tap { view } | UserInput::LongPress { view } => *view,
        }
    }

    #[must_use]
    pub const fn event_type_label(&self) -> &'static str {
        match self {
            UserInput::Tap { .. } => "tap",
            UserInput::LongPress { .. } => "long_press",
        }
    }
}

/// Room session lifecycle.
///
/// ```text
/// Disconnected -> Connecting -> Connected <-> Reconnecting
///                      \            |             /
///                       +------> Closed <--------+
/// ```
///
/// `Closed` is terminal: reached by `disconnect()` or a fatal transport error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionState {
    Disconnected,
    Connecting,
    Connected,
    Reconnecting,
    Closed,
}

impl SessionState {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            SessionState::Disconnected => "disconnected",
            SessionState::Connecting => "connecting",
            SessionState::Connected => "connected",
            SessionState::Reconnecting => "reconnecting",
            SessionState::Closed => "closed",
        }
    }

    /// Whether remote streams can be live in this state.
    #[must_use]
    pub const fn is_live(self) -> bool {
        matches!(self, SessionState::Connected | SessionState::Reconnecting)
    }
}

/// Point-in-time view of the room.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RoomSnapshot {
    pub state: SessionState,
    pub featured: Option<StreamId>,
    /// Grid members in visual order.
    pub grid: Vec<StreamId>,
    /// Featured participant whose view is still loading.
    pub loading: Option<StreamId>,
    /// Live participants in join order.
    pub participants: Vec<ParticipantInfo>,
}

impl RoomSnapshot {
    #[must_use]
    pub fn participant(&self, stream_id: &StreamId) -> Option<&ParticipantInfo> {
        self.participants.iter().find(|p| &p.stream_id == stream_id)
    }
}
