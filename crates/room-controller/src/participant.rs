//! Participant entity and quality tiers.
//!
//! A `Participant` is the per-stream state the room tracks. Quality fields are
//! only written by the slot allocator; everything else is fixed at creation.

use common::types::{ConnectionId, StreamId, ViewHandle};
use serde::{Deserialize, Serialize};

/// Preferred video resolution tier requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Resolution {
    /// QVGA, used for grid tiles.
    Low,
    /// VGA, used for the featured slot.
    High,
}

impl Resolution {
    /// Nominal frame size in pixels.
    #[must_use]
    pub const fn dimensions(self) -> (u32, u32) {
        match self {
            Resolution::Low => (320, 240),
            Resolution::High => (640, 480),
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Resolution::Low => "low",
            Resolution::High => "high",
        }
    }
}

/// Preferred frame-rate tier requested from the transport.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FrameRate {
    Mid,
    Max,
}

impl FrameRate {
    /// Nominal frames per second.
    #[must_use]
    pub const fn fps(self) -> u32 {
        match self {
            FrameRate::Mid => 15,
            FrameRate::Max => 30,
        }
    }

    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            FrameRate::Mid => "mid",
            FrameRate::Max => "max",
        }
    }
}

/// Quality assigned to a participant by the slot it occupies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct QualityProfile {
    pub resolution: Resolution,
    pub frame_rate: FrameRate,
}

/// Quality for the featured slot.
pub const FEATURED_QUALITY: QualityProfile = QualityProfile {
    resolution: Resolution::High,
    frame_rate: FrameRate::Max,
};

/// Quality for grid tiles.
pub const GRID_QUALITY: QualityProfile = QualityProfile {
    resolution: Resolution::Low,
    frame_rate: FrameRate::Mid,
};

/// One live remote stream.
#[derive(Debug, Clone)]
pub struct Participant {
    stream_id: StreamId,
    connection_id: ConnectionId,
    view: ViewHandle,
    subscribed_to_video: bool,
    preferred_resolution: Resolution,
    preferred_frame_rate: FrameRate,
}

impl Participant {
    /// Create a participant with default (grid) quality and video enabled.
    pub(crate) fn new(stream_id: StreamId, connection_id: ConnectionId, view: ViewHandle) -> Self {
        Self {
            stream_id,
            connection_id,
            view,
            subscribed_to_video: true,
            preferred_resolution: GRID_QUALITY.resolution,
            preferred_frame_rate: GRID_QUALITY.frame_rate,
        }
    }

    #[must_use]
    pub fn stream_id(&self) -> &StreamId {
        &self.stream_id
    }

    #[must_use]
    pub fn connection_id(&self) -> &ConnectionId {
        &self.connection_id
    }

    #[must_use]
    pub fn view(&self) -> ViewHandle {
        self.view
    }

    #[must_use]
    pub fn subscribed_to_video(&self) -> bool {
        self.subscribed_to_video
    }

    #[must_use]
    pub fn preferred_resolution(&self) -> Resolution {
        self.preferred_resolution
    }

    #[must_use]
    pub fn preferred_frame_rate(&self) -> FrameRate {
        self.preferred_frame_rate
    }

    #[must_use]
    pub fn quality(&self) -> QualityProfile {
        QualityProfile {
            resolution: self.preferred_resolution,
            frame_rate: self.preferred_frame_rate,
        }
    }

    pub(crate) fn apply_quality(&mut self, quality: QualityProfile) {
        self.preferred_resolution = quality.resolution;
        self.preferred_frame_rate = quality.frame_rate;
    }

    pub(crate) fn set_subscribed_to_video(&mut self, enabled: bool) {
        self.subscribed_to_video = enabled;
    }

    /// Snapshot for state queries.
    #[must_use]
    pub fn to_info(&self) -> ParticipantInfo {
        ParticipantInfo {
            stream_id: self.stream_id.clone(),
            connection_id: self.connection_id.clone(),
            view: self.view,
            subscribed_to_video: self.subscribed_to_video,
            preferred_resolution: self.preferred_resolution,
            preferred_frame_rate: self.preferred_frame_rate,
        }
    }
}

/// Read-only view of a participant returned from the room actor.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ParticipantInfo {
    pub stream_id: StreamId,
    pub connection_id: ConnectionId,
    pub view: ViewHandle,
    pub subscribed_to_video: bool,
    pub preferred_resolution: Resolution,
    pub preferred_frame_rate: FrameRate,
}
