//! Seams to the systems the room controller talks through.
//!
//! The room actor owns the core state and calls out through these traits. All
//! calls are synchronous and must not block: implementations queue the work
//! onto their own runtime (media SDK, UI thread) and return.
//!
//! The `Tracing*` implementations only log what they are asked to do. The
//! binary uses them when no real media stack is wired in.

use crate::allocator::{Directive, SlotKind};
use crate::config::PublisherSettings;
use crate::errors::RoomError;
use crate::participant::{FrameRate, Resolution};
use crate::registry::ParticipantRegistry;
use crate::telemetry::ResourceProbe;

use common::secret::SecretString;
use common::types::{StreamId, ViewHandle};
use std::fmt;
use std::sync::Arc;
use tracing::info;

/// Credentials the transport needs to join a session.
#[derive(Clone)]
pub struct SessionCredentials {
    pub api_key: String,
    pub session_id: String,
    pub token: SecretString,
}

impl fmt::Debug for SessionCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionCredentials")
            .field("api_key", &self.api_key)
            .field("session_id", &self.session_id)
            .field("token", &"[REDACTED]")
            .finish()
    }
}

/// Real-time media session the room runs on.
///
/// The transport delivers its events back through
/// [`crate::actors::RoomActorHandle::transport_event`].
pub trait Transport: Send + Sync {
    /// Start connecting. Completion arrives later as a `Connected` event.
    fn connect(&self, credentials: &SessionCredentials) -> Result<(), RoomError>;

    /// Leave the session.
    fn disconnect(&self) -> Result<(), RoomError>;

    /// Start publishing the local camera and microphone.
    fn publish(&self, settings: &PublisherSettings) -> Result<(), RoomError>;

    /// Start receiving a remote stream.
    fn subscribe(&self, stream_id: &StreamId) -> Result<(), RoomError>;

    fn set_preferred_resolution(
        &self,
        stream_id: &StreamId,
        resolution: Resolution,
    ) -> Result<(), RoomError>;

    fn set_preferred_frame_rate(
        &self,
        stream_id: &StreamId,
        frame_rate: FrameRate,
    ) -> Result<(), RoomError>;

    /// Enable or disable video delivery (audio is unaffected).
    fn set_subscribe_to_video(&self, stream_id: &StreamId, enabled: bool) -> Result<(), RoomError>;
}

/// UI layer that displays participant views and user-facing indicators.
///
/// User input on views comes back as [`crate::actors::UserInput`].
pub trait RenderingSurface: Send + Sync {
    /// Show a view in a slot. Grid attaches insert at the given index.
    fn attach(&self, view: ViewHandle, stream_id: &StreamId, slot: SlotKind);

    /// Remove a view from wherever it is shown. Unknown views are ignored.
    fn detach(&self, view: ViewHandle);

    /// Visual grid position of a view, if it is in the grid.
    ///
    /// Only used to check the drawn layout against the allocator, never to
    /// decide which slot a participant holds.
    fn index_of(&self, view: ViewHandle) -> Option<usize>;

    /// Enable or disable long-press-to-promote on a view.
    fn set_promotable(&self, view: ViewHandle, enabled: bool);

    fn show_featured_loading(&self, visible: bool);

    fn show_reconnecting(&self, visible: bool);

    /// Show a transient error message to the user.
    fn show_error(&self, message: &str);
}

/// Which of the three telemetry text slots a report fills.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TelemetrySlot {
    Cpu,
    Memory,
    Battery,
}

impl TelemetrySlot {
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            TelemetrySlot::Cpu => "cpu",
            TelemetrySlot::Memory => "memory",
            TelemetrySlot::Battery => "battery",
        }
    }
}

/// Display sink for formatted resource reports.
pub trait TelemetrySink: Send + Sync {
    fn report(&self, slot: TelemetrySlot, text: String);
}

/// Everything the room actor talks to.
pub struct Collaborators {
    pub transport: Arc<dyn Transport>,
    pub surface: Arc<dyn RenderingSurface>,
    pub telemetry_sink: Arc<dyn TelemetrySink>,
    pub probe: Box<dyn ResourceProbe>,
}

/// Forward one allocator directive to the collaborator that handles it.
///
/// Surface calls cannot fail. Transport failures are returned after the
/// remaining calls for the directive have still been attempted.
pub fn apply_directive(
    transport: &dyn Transport,
    surface: &dyn RenderingSurface,
    directive: Directive,
) -> Result<(), RoomError> {
    match directive {
        Directive::ApplyQuality { stream_id, quality } => {
            let resolution = transport.set_preferred_resolution(&stream_id, quality.resolution);
            let frame_rate = transport.set_preferred_frame_rate(&stream_id, quality.frame_rate);
            resolution.and(frame_rate)
        }
        Directive::SetVideoEnabled { stream_id, enabled } => {
            transport.set_subscribe_to_video(&stream_id, enabled)
        }
        Directive::Attach {
            view,
            stream_id,
            slot,
        } => {
            surface.attach(view, &stream_id, slot);
            Ok(())
        }
        Directive::Detach { view } => {
            surface.detach(view);
            Ok(())
        }
        Directive::SetPromotable { view, enabled } => {
            surface.set_promotable(view, enabled);
            Ok(())
        }
        Directive::ShowFeaturedLoading { visible } => {
            surface.show_featured_loading(visible);
            Ok(())
        }
    }
}

/// Grid members whose on-screen position disagrees with the allocator.
///
/// Slot identity always comes from the allocator; the surface is only asked
/// where it drew each view. Views the surface cannot place (`index_of`
/// returns `None`) are skipped, so surfaces without a grid report nothing.
#[must_use]
pub fn surface_grid_mismatches(
    grid: &[StreamId],
    registry: &ParticipantRegistry,
    surface: &dyn RenderingSurface,
) -> Vec<StreamId> {
    grid.iter()
        .enumerate()
        .filter(|(index, stream_id)| {
            registry
                .lookup_by_stream(stream_id)
                .and_then(|p| surface.index_of(p.view()))
                .is_some_and(|shown| shown != *index)
        })
        .map(|(_, stream_id)| stream_id.clone())
        .collect()
}

/// Transport that only logs. Never produces events.
#[derive(Debug, Default)]
pub struct TracingTransport;

impl Transport for TracingTransport {
    fn connect(&self, credentials: &SessionCredentials) -> Result<(), RoomError> {
        info!(
            target: "room.transport",
            session_id = %credentials.session_id,
            "connect"
        );
        Ok(())
    }

    fn disconnect(&self) -> Result<(), RoomError> {
        info!(target: "room.transport", "disconnect");
        Ok(())
    }

    fn publish(&self, settings: &PublisherSettings) -> Result<(), RoomError> {
        info!(
            target: "room.transport",
            name = %settings.name,
            resolution = settings.resolution.as_str(),
            fps = settings.frame_rate.fps(),
            "publish"
        );
        Ok(())
    }

    fn subscribe(&self, stream_id: &StreamId) -> Result<(), RoomError> {
        info!(target: "room.transport", stream_id = %stream_id, "subscribe");
        Ok(())
    }

    fn set_preferred_resolution(
        &self,
        stream_id: &StreamId,
        resolution: Resolution,
    ) -> Result<(), RoomError> {
        info!(
            target: "room.transport",
            stream_id = %stream_id,
            resolution = resolution.as_str(),
            "set_preferred_resolution"
        );
        Ok(())
    }

    fn set_preferred_frame_rate(
        &self,
        stream_id: &StreamId,
        frame_rate: FrameRate,
    ) -> Result<(), RoomError> {
        info!(
            target: "room.transport",
            stream_id = %stream_id,
            frame_rate = frame_rate.as_str(),
            "set_preferred_frame_rate"
        );
        Ok(())
    }

    fn set_subscribe_to_video(&self, stream_id: &StreamId, enabled: bool) -> Result<(), RoomError> {
        info!(
            target: "room.transport",
            stream_id = %stream_id,
            enabled,
            "set_subscribe_to_video"
        );
        Ok(())
    }
}

/// Rendering surface that only logs. Has no grid, so `index_of` is always `None`.
#[derive(Debug, Default)]
pub struct TracingSurface;

impl RenderingSurface for TracingSurface {
    fn attach(&self, view: ViewHandle, stream_id: &StreamId, slot: SlotKind) {
        info!(target: "room.surface", view = %view, stream_id = %stream_id, ?slot, "attach");
    }

    fn detach(&self, view: ViewHandle) {
        info!(target: "room.surface", view = %view, "detach");
    }

    fn index_of(&self, _view: ViewHandle) -> Option<usize> {
        None
    }

    fn set_promotable(&self, view: ViewHandle, enabled: bool) {
        info!(target: "room.surface", view = %view, enabled, "set_promotable");
    }

    fn show_featured_loading(&self, visible: bool) {
        info!(target: "room.surface", visible, "show_featured_loading");
    }

    fn show_reconnecting(&self, visible: bool) {
        info!(target: "room.surface", visible, "show_reconnecting");
    }

    fn show_error(&self, message: &str) {
        info!(target: "room.surface", message, "show_error");
    }
}

/// Telemetry sink that writes each report to the log.
#[derive(Debug, Default)]
pub struct TracingTelemetrySink;

impl TelemetrySink for TracingTelemetrySink {
    fn report(&self, slot: TelemetrySlot, text: String) {
        info!(target: "room.telemetry", slot = slot.as_str(), "{text}");
    }
}
