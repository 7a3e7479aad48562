//! Pre-configured test data fixtures for room testing.
//!
//! Provides:
//! - Room configuration with test credentials
//! - Remote streams with matching transport events
//! - A spawned room actor wired to the recording mocks

use crate::mock_surface::MockSurface;
use crate::mock_telemetry::{RecordingSink, ScriptedProbe};
use crate::mock_transport::MockTransport;

use common::secret::SecretString;
use common::types::{ConnectionId, StreamId};
use room_controller::actors::{RoomActor, RoomActorHandle, TransportEvent};
use room_controller::collaborators::{Collaborators, RenderingSurface, TelemetrySink, Transport};
use room_controller::config::{Config, PublisherSettings};
use room_controller::telemetry::ResourceProbe;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Config with test credentials and default room policy.
#[must_use]
pub fn test_config() -> Config {
    Config {
        session_id: format!("session-{}", Uuid::new_v4()),
        api_key: "test-api-key".to_string(),
        token: SecretString::from("test-session-token"),
        publisher: PublisherSettings::default(),
        telemetry_interval: Duration::from_millis(1000),
        auto_promote_on_featured_leave: false,
        metrics_bind_address: "127.0.0.1:0".to_string(),
        event_script: None,
    }
}

/// Config that promotes the grid tail when the featured participant leaves.
#[must_use]
pub fn test_config_with_auto_promote() -> Config {
    Config {
        auto_promote_on_featured_leave: true,
        ..test_config()
    }
}

/// Test remote stream fixture.
#[derive(Debug, Clone)]
pub struct TestStream {
    pub stream_id: StreamId,
    pub connection_id: ConnectionId,
}

impl TestStream {
    /// Create a stream named after a participant.
    #[must_use]
    pub fn new(name: &str) -> Self {
        Self {
            stream_id: StreamId::from(format!("stream-{name}")),
            connection_id: ConnectionId::from(format!("conn-{name}")),
        }
    }

    /// Create a stream with random IDs.
    #[must_use]
    pub fn random() -> Self {
        let id = Uuid::new_v4();
        Self {
            stream_id: StreamId::from(format!("stream-{id}")),
            connection_id: ConnectionId::from(format!("conn-{id}")),
        }
    }

    /// The transport event announcing this stream.
    #[must_use]
    pub fn received(&self) -> TransportEvent {
        TransportEvent::StreamReceived {
            stream_id: self.stream_id.clone(),
            connection_id: self.connection_id.clone(),
        }
    }

    /// The transport event announcing this stream has gone.
    #[must_use]
    pub fn dropped(&self) -> TransportEvent {
        TransportEvent::StreamDropped {
            stream_id: self.stream_id.clone(),
        }
    }
}

/// A spawned room actor plus the mocks it talks to.
pub struct TestRoom {
    pub handle: RoomActorHandle,
    pub transport: Arc<MockTransport>,
    pub surface: Arc<MockSurface>,
    pub sink: Arc<RecordingSink>,
    pub cancel_token: CancellationToken,
    pub task: JoinHandle<()>,
}

impl TestRoom {
    /// Spawn a room with default mocks. The session is still `Disconnected`.
    #[must_use]
    pub fn spawn(config: Config) -> Self {
        Self::spawn_with(
            config,
            MockTransport::new(),
            Box::new(ScriptedProbe::default()),
        )
    }

    /// Spawn a room with a specific transport mock and probe.
    #[must_use]
    pub fn spawn_with(
        config: Config,
        transport: MockTransport,
        probe: Box<dyn ResourceProbe>,
    ) -> Self {
        let transport = Arc::new(transport);
        let surface = Arc::new(MockSurface::new());
        let sink = Arc::new(RecordingSink::new());
        let cancel_token = CancellationToken::new();

        let collaborators = Collaborators {
            transport: Arc::clone(&transport) as Arc<dyn Transport>,
            surface: Arc::clone(&surface) as Arc<dyn RenderingSurface>,
            telemetry_sink: Arc::clone(&sink) as Arc<dyn TelemetrySink>,
            probe,
        };
        let (handle, task) = RoomActor::spawn(&config, collaborators, cancel_token.child_token());

        Self {
            handle,
            transport,
            surface,
            sink,
            cancel_token,
            task,
        }
    }

    /// Spawn a room and drive it to `Connected`.
    pub async fn connected(config: Config) -> Self {
        let room = Self::spawn(config);
        room.connect().await;
        room
    }

    /// Connect and deliver the transport's `connected` callback.
    pub async fn connect(&self) {
        self.handle.connect().await.expect("connect should succeed");
        self.handle
            .transport_event(TransportEvent::Connected)
            .await
            .expect("connected event should be delivered");
        // The mailbox is FIFO: a state round-trip guarantees `Connected` was handled.
        self.handle
            .get_state()
            .await
            .expect("state query should succeed");
    }

    /// Deliver `stream_received` for a stream and mark its featured view loaded.
    pub async fn join(&self, stream: &TestStream) {
        self.handle
            .transport_event(stream.received())
            .await
            .expect("stream_received should be delivered");
        self.handle
            .featured_ready()
            .await
            .expect("featured_ready should be delivered");
    }

    /// Deliver `stream_dropped` for a stream.
    pub async fn leave(&self, stream: &TestStream) {
        self.handle
            .transport_event(stream.dropped())
            .await
            .expect("stream_dropped should be delivered");
    }

    /// Stop the actor and wait for it to exit.
    pub async fn shutdown(self) {
        self.cancel_token.cancel();
        let _ = self.task.await;
    }
}
