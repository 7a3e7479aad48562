//! `RoomActor` - owns the room session and all participant state.
//!
//! The actor exclusively owns the `ParticipantRegistry`, the `SlotAllocator`
//! and the `TelemetrySampler`. Transport callbacks, user input and commands
//! are serialised through one mailbox, so a promote racing a leave for the
//! same stream always resolves to `NotFound`.
//!
//! # Session lifecycle
//!
//! - `connect()`: `Disconnected -> Connecting`
//! - transport `connected`: `Connecting -> Connected`, publish and start telemetry
//! - transport `reconnecting`/`reconnected`: `Connected <-> Reconnecting`
//! - `disconnect()` or a fatal transport error: stop telemetry, release all
//!   participants, `-> Closed` (terminal, idempotent)

use crate::allocator::{Directive, SlotAllocator};
use crate::collaborators::{
    apply_directive, surface_grid_mismatches, Collaborators, RenderingSurface, SessionCredentials,
    Transport,
};
use crate::config::{Config, PublisherSettings};
use crate::errors::RoomError;
use crate::observability::metrics;
use crate::registry::ParticipantRegistry;
use crate::telemetry::TelemetrySampler;

use super::messages::{RoomMessage, RoomSnapshot, SessionState, TransportEvent, UserInput};
use super::metrics::MailboxMonitor;

use common::types::{ConnectionId, StreamId};
use std::sync::Arc;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

/// Default channel buffer size for the room mailbox.
const ROOM_CHANNEL_BUFFER: usize = 256;

/// Handle to a `RoomActor`.
#[derive(Clone)]
pub struct RoomActorHandle {
    sender: mpsc::Sender<RoomMessage>,
    cancel_token: CancellationToken,
    mailbox: Arc<MailboxMonitor>,
    session_id: String,
}

impl RoomActorHandle {
    #[must_use]
    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    /// Begin joining the session.
    ///
    /// Completes once the transport has accepted the request; the session
    /// becomes `Connected` when the transport reports it.
    pub async fn connect(&self) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Connect { respond_to: tx }).await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Leave the session. Safe to call any number of times.
    pub async fn disconnect(&self) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        let delivered = self
            .send(RoomMessage::Disconnect { respond_to: tx })
            .await
            .is_ok();

        // A closed mailbox or a dropped reply both mean the actor tore the
        // session down on its way out
        if !delivered || rx.await.is_err() {
            debug!(
                target: "room.actor",
                session_id = %self.session_id,
                "Disconnect after room actor stopped"
            );
        }
        Ok(())
    }

    /// Deliver a transport callback. Fire-and-forget.
    pub async fn transport_event(&self, event: TransportEvent) -> Result<(), RoomError> {
        self.send(RoomMessage::Transport(event)).await
    }

    /// Deliver tap/long-press input from the rendering surface. Fire-and-forget.
    pub async fn user_input(&self, input: UserInput) -> Result<(), RoomError> {
        self.send(RoomMessage::Input(input)).await
    }

    /// Swap a grid participant into the featured slot.
    pub async fn promote(&self, stream_id: StreamId) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::Promote {
            stream_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Flip video delivery for one participant.
    pub async fn toggle_video(&self, stream_id: StreamId) -> Result<(), RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::ToggleVideo {
            stream_id,
            respond_to: tx,
        })
        .await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))?
    }

    /// Signal that the featured view has finished loading.
    pub async fn featured_ready(&self) -> Result<(), RoomError> {
        self.send(RoomMessage::FeaturedReady).await
    }

    /// Get current room state.
    pub async fn get_state(&self) -> Result<RoomSnapshot, RoomError> {
        let (tx, rx) = oneshot::channel();
        self.send(RoomMessage::GetState { respond_to: tx }).await?;

        rx.await
            .map_err(|e| RoomError::Internal(format!("response receive failed: {e}")))
    }

    /// Cancel the room actor. The session is torn down on the way out.
    pub fn cancel(&self) {
        self.cancel_token.cancel();
    }

    #[must_use]
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    #[must_use]
    pub fn mailbox_depth(&self) -> usize {
        self.mailbox.current_depth()
    }

    async fn send(&self, message: RoomMessage) -> Result<(), RoomError> {
        self.mailbox.record_enqueue();
        self.sender.send(message).await.map_err(|e| {
            self.mailbox.record_drop();
            RoomError::Internal(format!("channel send failed: {e}"))
        })
    }
}

/// The `RoomActor` implementation.
pub struct RoomActor {
    session_id: String,
    receiver: mpsc::Receiver<RoomMessage>,
    cancel_token: CancellationToken,
    state: SessionState,
    credentials: SessionCredentials,
    publisher: PublisherSettings,
    registry: ParticipantRegistry,
    allocator: SlotAllocator,
    telemetry: TelemetrySampler,
    transport: Arc<dyn Transport>,
    surface: Arc<dyn RenderingSurface>,
    mailbox: Arc<MailboxMonitor>,
}

impl RoomActor {
    /// Spawn a new room actor.
    ///
    /// Returns a handle and the task join handle.
    ///
    /// # Arguments
    ///
    /// * `config` - Session credentials, publisher settings and room policy
    /// * `collaborators` - Transport, rendering surface, telemetry sink and probe
    /// * `cancel_token` - Cancellation token; telemetry runs on a child of it
    #[must_use]
    pub fn spawn(
        config: &Config,
        collaborators: Collaborators,
        cancel_token: CancellationToken,
    ) -> (RoomActorHandle, JoinHandle<()>) {
        let (sender, receiver) = mpsc::channel(ROOM_CHANNEL_BUFFER);
        let mailbox = Arc::new(MailboxMonitor::new(config.session_id.clone()));

        let Collaborators {
            transport,
            surface,
            telemetry_sink,
            probe,
        } = collaborators;

        let actor = Self {
            session_id: config.session_id.clone(),
            receiver,
            cancel_token: cancel_token.clone(),
            state: SessionState::Disconnected,
            credentials: config.credentials(),
            publisher: config.publisher.clone(),
            registry: ParticipantRegistry::new(),
            allocator: SlotAllocator::new(config.auto_promote_on_featured_leave),
            telemetry: TelemetrySampler::new(probe, telemetry_sink, config.telemetry_interval),
            transport,
            surface,
            mailbox: Arc::clone(&mailbox),
        };

        let task_handle = tokio::spawn(actor.run());

        let handle = RoomActorHandle {
            sender,
            cancel_token,
            mailbox,
            session_id: config.session_id.clone(),
        };

        (handle, task_handle)
    }

    /// Run the actor message loop.
    #[instrument(skip_all, name = "room.actor", fields(session_id = %self.session_id))]
    async fn run(mut self) {
        info!(
            target: "room.actor",
            session_id = %self.session_id,
            "RoomActor started"
        );

        loop {
            tokio::select! {
                () = self.cancel_token.cancelled() => {
                    info!(
                        target: "room.actor",
                        session_id = %self.session_id,
                        "RoomActor received cancellation signal"
                    );
                    self.teardown("cancelled").await;
                    break;
                }

                msg = self.receiver.recv() => {
                    match msg {
                        Some(message) => {
                            self.handle_message(message).await;
                            self.mailbox.record_dequeue();
                        }
                        None => {
                            info!(
                                target: "room.actor",
                                session_id = %self.session_id,
                                "RoomActor channel closed, exiting"
                            );
                            self.teardown("handle dropped").await;
                            break;
                        }
                    }
                }
            }
        }

        info!(
            target: "room.actor",
            session_id = %self.session_id,
            state = self.state.as_str(),
            messages_processed = self.mailbox.messages_processed(),
            "RoomActor stopped"
        );
    }

    /// Handle a single message.
    async fn handle_message(&mut self, message: RoomMessage) {
        match message {
            RoomMessage::Connect { respond_to } => {
                let result = self.handle_connect();
                let _ = respond_to.send(result);
            }

            RoomMessage::Disconnect { respond_to } => {
                self.teardown("disconnect").await;
                let _ = respond_to.send(());
            }

            RoomMessage::Transport(event) => {
                metrics::record_event(event.event_type_label());
                self.handle_transport_event(event).await;
            }

            RoomMessage::Input(input) => {
                metrics::record_event(input.event_type_label());
                self.handle_input(input);
            }

            RoomMessage::Promote {
                stream_id,
                respond_to,
            } => {
                metrics::record_event("promote");
                let result = self.handle_promote(&stream_id);
                let _ = respond_to.send(result);
            }

            RoomMessage::ToggleVideo {
                stream_id,
                respond_to,
            } => {
                metrics::record_event("toggle_video");
                let result = self.handle_toggle_video(&stream_id);
                let _ = respond_to.send(result);
            }

            RoomMessage::FeaturedReady => {
                metrics::record_event("featured_ready");
                let directives = self.allocator.featured_ready(&self.registry);
                self.dispatch(directives);
            }

            RoomMessage::GetState { respond_to } => {
                let _ = respond_to.send(self.snapshot());
            }
        }
    }

    fn handle_connect(&mut self) -> Result<(), RoomError> {
        match self.state {
            SessionState::Disconnected => {}
            SessionState::Closed => return Err(RoomError::SessionClosed),
            other => {
                return Err(RoomError::InvalidState {
                    operation: "connect",
                    state: other.as_str(),
                })
            }
        }

        if let Err(e) = self.transport.connect(&self.credentials) {
            self.surface_transport_error(&e);
            return Err(e);
        }

        self.transition(SessionState::Connecting);
        Ok(())
    }

    async fn handle_transport_event(&mut self, event: TransportEvent) {
        if self.state == SessionState::Closed {
            debug!(
                target: "room.actor",
                event = event.event_type_label(),
                "Transport event after close ignored"
            );
            return;
        }

        match event {
            TransportEvent::Connected => self.handle_connected(),
            TransportEvent::Reconnecting => {
                if self.state == SessionState::Connected {
                    self.transition(SessionState::Reconnecting);
                    self.surface.show_reconnecting(true);
                } else {
                    self.ignore_event("reconnecting");
                }
            }
            TransportEvent::Reconnected => {
                if self.state == SessionState::Reconnecting {
                    self.transition(SessionState::Connected);
                    self.surface.show_reconnecting(false);
                } else {
                    self.ignore_event("reconnected");
                }
            }
            TransportEvent::StreamReceived {
                stream_id,
                connection_id,
            } => self.handle_stream_received(stream_id, connection_id),
            TransportEvent::StreamDropped { stream_id } => self.handle_stream_dropped(&stream_id),
            TransportEvent::Error { message, fatal } => {
                warn!(
                    target: "room.actor",
                    session_id = %self.session_id,
                    fatal,
                    error = %message,
                    "Transport reported an error"
                );
                metrics::record_error("transport");
                self.surface.show_error(&message);
                if fatal {
                    self.teardown("fatal transport error").await;
                }
            }
        }
    }

    fn handle_connected(&mut self) {
        if self.state != SessionState::Connecting {
            self.ignore_event("connected");
            return;
        }
        self.transition(SessionState::Connected);

        if let Err(e) = self.transport.publish(&self.publisher) {
            self.surface_transport_error(&e);
        }
        self.telemetry.start(&self.cancel_token);
    }

    #[instrument(skip_all, fields(session_id = %self.session_id, stream_id = %stream_id))]
    fn handle_stream_received(&mut self, stream_id: StreamId, connection_id: ConnectionId) {
        if !self.state.is_live() {
            self.ignore_event("stream_received");
            return;
        }

        let admission = self.registry.add(stream_id.clone(), connection_id);
        if !admission.is_created() {
            self.record_local_error(&RoomError::DuplicateJoin(format!("stream {stream_id}")));
            return;
        }

        if let Err(e) = self.transport.subscribe(&stream_id) {
            self.surface_transport_error(&e);
        }

        match self.allocator.on_join(&mut self.registry, &stream_id) {
            Ok(directives) => self.dispatch(directives),
            Err(e) => self.record_local_error(&e),
        }

        info!(
            target: "room.actor",
            live = self.registry.len(),
            "Participant joined"
        );
        self.after_mutation();
    }

    #[instrument(skip_all, fields(session_id = %self.session_id, stream_id = %stream_id))]
    fn handle_stream_dropped(&mut self, stream_id: &StreamId) {
        let participant = match self.registry.remove(stream_id) {
            Ok(participant) => participant,
            Err(e) => {
                self.record_local_error(&e);
                return;
            }
        };

        match self
            .allocator
            .on_leave(&mut self.registry, stream_id, participant.view())
        {
            Ok(directives) => self.dispatch(directives),
            Err(e) => self.record_local_error(&e),
        }

        info!(
            target: "room.actor",
            live = self.registry.len(),
            "Participant left"
        );
        self.after_mutation();
    }

    fn handle_input(&mut self, input: UserInput) {
        let Some(stream_id) = self
            .registry
            .lookup_by_view(input.view())
            .map(|p| p.stream_id().clone())
        else {
            self.record_local_error(&RoomError::NotFound(format!("view {}", input.view())));
            return;
        };

        // Failures are already logged and counted
        let _ = match input {
            UserInput::Tap { .. } => self.handle_toggle_video(&stream_id),
            UserInput::LongPress { .. } => self.handle_promote(&stream_id),
        };
    }

    fn handle_promote(&mut self, stream_id: &StreamId) -> Result<(), RoomError> {
        if self.state == SessionState::Closed {
            return Err(RoomError::SessionClosed);
        }
        let result = self.allocator.promote(&mut self.registry, stream_id);
        self.finish_allocation(result)
    }

    fn handle_toggle_video(&mut self, stream_id: &StreamId) -> Result<(), RoomError> {
        if self.state == SessionState::Closed {
            return Err(RoomError::SessionClosed);
        }
        let result = self.allocator.toggle_video(&mut self.registry, stream_id);
        self.finish_allocation(result)
    }

    fn finish_allocation(
        &mut self,
        result: Result<Vec<Directive>, RoomError>,
    ) -> Result<(), RoomError> {
        match result {
            Ok(directives) => {
                self.dispatch(directives);
                self.after_mutation();
                Ok(())
            }
            Err(e) => {
                self.record_local_error(&e);
                Err(e)
            }
        }
    }

    /// Release everything and enter `Closed`. No-op once closed.
    async fn teardown(&mut self, reason: &'static str) {
        if self.state == SessionState::Closed {
            debug!(target: "room.actor", reason, "Session already closed");
            return;
        }

        self.telemetry.stop().await;

        let directives = self.allocator.reset(&self.registry);
        self.dispatch(directives);
        let released = self.registry.clear();

        if self.state == SessionState::Reconnecting {
            self.surface.show_reconnecting(false);
        }
        if self.state != SessionState::Disconnected {
            if let Err(e) = self.transport.disconnect() {
                warn!(target: "room.actor", error = %e, "Transport disconnect failed");
            }
        }

        self.transition(SessionState::Closed);
        metrics::set_participants_active(0);

        info!(
            target: "room.actor",
            session_id = %self.session_id,
            reason,
            released = released.len(),
            "Session closed"
        );
    }

    fn dispatch(&self, directives: Vec<Directive>) {
        for directive in directives {
            if let Err(e) =
                apply_directive(self.transport.as_ref(), self.surface.as_ref(), directive)
            {
                self.surface_transport_error(&e);
            }
        }
    }

    /// Verify slot bookkeeping after every registry/allocator mutation.
    fn after_mutation(&self) {
        metrics::set_participants_active(self.registry.len());

        let result = self.allocator.check_invariants(&self.registry);
        if let Err(e) = &result {
            error!(
                target: "room.actor",
                session_id = %self.session_id,
                error = %e,
                "Slot invariants violated"
            );
            metrics::record_error(e.error_type_label());
        }
        debug_assert!(result.is_ok(), "slot invariants violated: {result:?}");

        let mismatched =
            surface_grid_mismatches(self.allocator.grid(), &self.registry, self.surface.as_ref());
        if !mismatched.is_empty() {
            warn!(
                target: "room.actor",
                session_id = %self.session_id,
                streams = ?mismatched,
                "Surface grid out of step with allocator"
            );
            metrics::record_error("surface_desync");
        }
    }

    fn surface_transport_error(&self, e: &RoomError) {
        warn!(
            target: "room.actor",
            session_id = %self.session_id,
            error = %e,
            "Transport call failed"
        );
        metrics::record_error(e.error_type_label());
        self.surface.show_error(&e.to_string());
    }

    /// Log and count an error that does not affect the session.
    fn record_local_error(&self, e: &RoomError) {
        metrics::record_error(e.error_type_label());
        if e.is_recoverable() {
            debug!(target: "room.actor", error = %e, "Recoverable room error ignored");
        } else {
            warn!(target: "room.actor", error = %e, "Room operation failed");
        }
    }

    fn ignore_event(&self, event: &'static str) {
        debug!(
            target: "room.actor",
            event,
            state = self.state.as_str(),
            "Transport event not valid in current state, ignored"
        );
    }

    fn transition(&mut self, next: SessionState) {
        debug!(
            target: "room.actor",
            from = self.state.as_str(),
            to = next.as_str(),
            "Session state transition"
        );
        self.state = next;
    }

    fn snapshot(&self) -> RoomSnapshot {
        RoomSnapshot {
            state: self.state,
            featured: self.allocator.featured().cloned(),
            grid: self.allocator.grid().to_vec(),
            loading: self.allocator.loading().cloned(),
            participants: self.registry.ordered().map(|p| p.to_info()).collect(),
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::allocator::SlotKind;
    use crate::collaborators::{TelemetrySink, TelemetrySlot};
    use crate::participant::{FrameRate, Resolution};
    use crate::telemetry::{ResourceProbe, ResourceSample};
    use common::secret::SecretString;
    use common::types::ViewHandle;
    use std::sync::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct Calls(Mutex<Vec<String>>);

    impl Calls {
        fn push(&self, call: String) {
            self.0.lock().unwrap().push(call);
        }

        fn count(&self, prefix: &str) -> usize {
            self.0
                .lock()
                .unwrap()
                .iter()
                .filter(|c| c.starts_with(prefix))
                .count()
        }
    }

    impl Transport for Calls {
        fn connect(&self, _credentials: &SessionCredentials) -> Result<(), RoomError> {
            self.push("connect".to_string());
            Ok(())
        }
        fn disconnect(&self) -> Result<(), RoomError> {
            self.push("disconnect".to_string());
            Ok(())
        }
        fn publish(&self, settings: &PublisherSettings) -> Result<(), RoomError> {
            self.push(format!("publish {}", settings.name));
            Ok(())
        }
        fn subscribe(&self, stream_id: &StreamId) -> Result<(), RoomError> {
            self.push(format!("subscribe {stream_id}"));
            Ok(())
        }
        fn set_preferred_resolution(
            &self,
            stream_id: &StreamId,
            resolution: Resolution,
        ) -> Result<(), RoomError> {
            self.push(format!("resolution {stream_id} {}", resolution.as_str()));
            Ok(())
        }
        fn set_preferred_frame_rate(
            &self,
            stream_id: &StreamId,
            frame_rate: FrameRate,
        ) -> Result<(), RoomError> {
            self.push(format!("frame_rate {stream_id} {}", frame_rate.as_str()));
            Ok(())
        }
        fn set_subscribe_to_video(
            &self,
            stream_id: &StreamId,
            enabled: bool,
        ) -> Result<(), RoomError> {
            self.push(format!("video {stream_id} {enabled}"));
            Ok(())
        }
    }

    impl RenderingSurface for Calls {
        fn attach(&self, view: ViewHandle, _stream_id: &StreamId, slot: SlotKind) {
            self.push(format!("attach {view} {slot:?}"));
        }
        fn detach(&self, view: ViewHandle) {
            self.push(format!("detach {view}"));
        }
        fn index_of(&self, _view: ViewHandle) -> Option<usize> {
            None
        }
        fn set_promotable(&self, view: ViewHandle, enabled: bool) {
            self.push(format!("promotable {view} {enabled}"));
        }
        fn show_featured_loading(&self, visible: bool) {
            self.push(format!("loading {visible}"));
        }
        fn show_reconnecting(&self, visible: bool) {
            self.push(format!("reconnecting {visible}"));
        }
        fn show_error(&self, message: &str) {
            self.push(format!("error {message}"));
        }
    }

    impl TelemetrySink for Calls {
        fn report(&self, slot: TelemetrySlot, _text: String) {
            self.push(format!("report {}", slot.as_str()));
        }
    }

    struct IdleProbe;

    impl ResourceProbe for IdleProbe {
        fn sample(&mut self) -> ResourceSample {
            ResourceSample {
                total_cpu: 0.0,
                process_cpu: 0.0,
                used_memory_mb: 0.0,
                memory_percent: 0.0,
                battery_level: None,
            }
        }
    }

    fn test_config() -> Config {
        Config {
            session_id: "session-test".to_string(),
            api_key: "key".to_string(),
            token: SecretString::from("token"),
            publisher: PublisherSettings::default(),
            telemetry_interval: Duration::from_millis(1000),
            auto_promote_on_featured_leave: false,
            metrics_bind_address: "127.0.0.1:0".to_string(),
            event_script: None,
        }
    }

    fn spawn_room() -> (RoomActorHandle, Arc<Calls>) {
        let calls = Arc::new(Calls::default());
        let collaborators = Collaborators {
            transport: Arc::clone(&calls) as Arc<dyn Transport>,
            surface: Arc::clone(&calls) as Arc<dyn RenderingSurface>,
            telemetry_sink: Arc::clone(&calls) as Arc<dyn TelemetrySink>,
            probe: Box::new(IdleProbe),
        };
        let (handle, _task) =
            RoomActor::spawn(&test_config(), collaborators, CancellationToken::new());
        (handle, calls)
    }

    async fn connected_room() -> (RoomActorHandle, Arc<Calls>) {
        let (handle, calls) = spawn_room();
        handle.connect().await.unwrap();
        handle
            .transport_event(TransportEvent::Connected)
            .await
            .unwrap();
        (handle, calls)
    }

    async fn join(handle: &RoomActorHandle, stream: &str) {
        handle
            .transport_event(TransportEvent::StreamReceived {
                stream_id: StreamId::from(stream),
                connection_id: ConnectionId::from(format!("conn-{stream}")),
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_room_actor_spawn_and_cancel() {
        let (handle, _calls) = spawn_room();
        assert_eq!(handle.session_id(), "session-test");
        assert!(!handle.is_cancelled());

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.state, SessionState::Disconnected);

        handle.cancel();
        assert!(handle.is_cancelled());
    }

    #[tokio::test]
    async fn test_connect_lifecycle() {
        let (handle, calls) = connected_room().await;

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.state, SessionState::Connected);
        assert_eq!(calls.count("connect"), 1);
        assert_eq!(calls.count("publish room-publisher"), 1);

        let second = handle.connect().await;
        assert!(matches!(
            second,
            Err(RoomError::InvalidState {
                operation: "connect",
                state: "connected"
            })
        ));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_reconnecting_toggles_indicator() {
        let (handle, calls) = connected_room().await;

        handle
            .transport_event(TransportEvent::Reconnecting)
            .await
            .unwrap();
        assert_eq!(
            handle.get_state().await.unwrap().state,
            SessionState::Reconnecting
        );

        handle
            .transport_event(TransportEvent::Reconnected)
            .await
            .unwrap();
        assert_eq!(
            handle.get_state().await.unwrap().state,
            SessionState::Connected
        );
        assert_eq!(calls.count("reconnecting true"), 1);
        assert_eq!(calls.count("reconnecting false"), 1);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_stream_received_subscribes_and_features() {
        let (handle, calls) = connected_room().await;
        join(&handle, "p1").await;

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.featured, Some(StreamId::from("p1")));
        assert_eq!(state.loading, Some(StreamId::from("p1")));
        assert!(state.grid.is_empty());
        assert_eq!(calls.count("subscribe p1"), 1);
        assert_eq!(calls.count("resolution p1 high"), 1);
        assert_eq!(calls.count("loading true"), 1);

        handle.featured_ready().await.unwrap();
        let state = handle.get_state().await.unwrap();
        assert_eq!(state.loading, None);
        assert_eq!(calls.count("attach view-1 Featured"), 1);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_duplicate_stream_is_ignored() {
        let (handle, calls) = connected_room().await;
        join(&handle, "p1").await;
        join(&handle, "p1").await;

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.participants.len(), 1);
        assert_eq!(calls.count("subscribe p1"), 1);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_streams_before_connected_are_ignored() {
        let (handle, _calls) = spawn_room();
        handle.connect().await.unwrap();
        join(&handle, "early").await;

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.state, SessionState::Connecting);
        assert!(state.participants.is_empty());
        handle.cancel();
    }

    #[tokio::test]
    async fn test_user_input_maps_to_toggle_and_promote() {
        let (handle, calls) = connected_room().await;
        join(&handle, "p1").await;
        join(&handle, "p2").await;

        let state = handle.get_state().await.unwrap();
        let p1_view = state.participant(&StreamId::from("p1")).unwrap().view;

        handle
            .user_input(UserInput::Tap { view: p1_view })
            .await
            .unwrap();
        let state = handle.get_state().await.unwrap();
        assert!(
            !state
                .participant(&StreamId::from("p1"))
                .unwrap()
                .subscribed_to_video
        );
        assert_eq!(calls.count("video p1 false"), 1);

        handle
            .user_input(UserInput::LongPress { view: p1_view })
            .await
            .unwrap();
        let state = handle.get_state().await.unwrap();
        assert_eq!(state.featured, Some(StreamId::from("p1")));
        assert_eq!(state.grid, vec![StreamId::from("p2")]);

        // Unknown view is ignored
        handle
            .user_input(UserInput::LongPress {
                view: ViewHandle::new(999),
            })
            .await
            .unwrap();
        let after = handle.get_state().await.unwrap();
        assert_eq!(after.featured, Some(StreamId::from("p1")));
        handle.cancel();
    }

    #[tokio::test]
    async fn test_non_fatal_error_is_surfaced_only() {
        let (handle, calls) = connected_room().await;
        join(&handle, "p1").await;

        handle
            .transport_event(TransportEvent::Error {
                message: "packet loss".to_string(),
                fatal: false,
            })
            .await
            .unwrap();

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.state, SessionState::Connected);
        assert_eq!(state.participants.len(), 1);
        assert_eq!(calls.count("error packet loss"), 1);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_fatal_error_tears_down() {
        let (handle, calls) = connected_room().await;
        join(&handle, "p1").await;

        handle
            .transport_event(TransportEvent::Error {
                message: "session expired".to_string(),
                fatal: true,
            })
            .await
            .unwrap();

        let state = handle.get_state().await.unwrap();
        assert_eq!(state.state, SessionState::Closed);
        assert!(state.participants.is_empty());
        assert_eq!(state.featured, None);
        assert_eq!(calls.count("disconnect"), 1);

        // Disconnect after a fatal error is still fine
        handle.disconnect().await.unwrap();
        assert_eq!(calls.count("disconnect"), 1);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_disconnect_is_idempotent() {
        let (handle, calls) = connected_room().await;
        join(&handle, "p1").await;
        join(&handle, "p2").await;

        handle.disconnect().await.unwrap();
        let first = handle.get_state().await.unwrap();
        handle.disconnect().await.unwrap();
        let second = handle.get_state().await.unwrap();

        assert_eq!(first, second);
        assert_eq!(first.state, SessionState::Closed);
        assert!(first.participants.is_empty());
        assert_eq!(calls.count("disconnect"), 1);

        // Closed is terminal
        assert!(matches!(
            handle.connect().await,
            Err(RoomError::SessionClosed)
        ));
        assert!(matches!(
            handle.promote(StreamId::from("p1")).await,
            Err(RoomError::SessionClosed)
        ));
        join(&handle, "p3").await;
        assert!(handle.get_state().await.unwrap().participants.is_empty());
        handle.cancel();
    }

    #[tokio::test]
    async fn test_disconnect_after_cancel_succeeds() {
        let (handle, _calls) = connected_room().await;
        handle.cancel();

        assert!(handle.disconnect().await.is_ok());
        assert!(handle.disconnect().await.is_ok());
    }

    #[tokio::test]
    async fn test_disconnect_racing_cancel_never_fails() {
        for _ in 0..100 {
            let (handle, calls) = connected_room().await;
            handle.cancel();
            handle.disconnect().await.unwrap();
            assert_eq!(calls.count("disconnect"), 1);
        }
    }

    #[tokio::test]
    async fn test_disconnect_before_connect_skips_transport() {
        let (handle, calls) = spawn_room();
        handle.disconnect().await.unwrap();

        assert_eq!(
            handle.get_state().await.unwrap().state,
            SessionState::Closed
        );
        assert_eq!(calls.count("disconnect"), 0);
        handle.cancel();
    }

    #[tokio::test]
    async fn test_promote_unknown_is_not_found() {
        let (handle, _calls) = connected_room().await;
        join(&handle, "p1").await;

        let result = handle.promote(StreamId::from("ghost")).await;
        assert!(matches!(result, Err(RoomError::NotFound(_))));

        let result = handle.toggle_video(StreamId::from("ghost")).await;
        assert!(matches!(result, Err(RoomError::NotFound(_))));
        handle.cancel();
    }

    #[tokio::test(start_paused = true)]
    async fn test_telemetry_runs_while_connected() {
        let (handle, calls) = connected_room().await;
        tokio::time::sleep(Duration::from_millis(2500)).await;

        let reports = calls.count("report cpu");
        assert!(reports >= 2, "expected at least two CPU reports, got {reports}");

        handle.disconnect().await.unwrap();
        let stopped = calls.count("report");
        tokio::time::sleep(Duration::from_millis(5000)).await;
        assert_eq!(calls.count("report"), stopped);
        handle.cancel();
    }
}
