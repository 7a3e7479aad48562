//! Recording transport mock.
//!
//! Every call is recorded in order. Individual operations can be configured
//! to fail so tests can check that transport errors are surfaced without
//! touching room state.
//!
//! # Example
//!
//! ```rust,ignore
//! use room_test_utils::MockTransport;
//!
//! let transport = MockTransport::builder().fail_subscribe().build();
//! // Hand Arc::new(transport) to the room...
//! ```

use common::types::StreamId;
use room_controller::collaborators::{SessionCredentials, Transport};
use room_controller::config::PublisherSettings;
use room_controller::errors::RoomError;
use room_controller::participant::{FrameRate, Resolution};
use std::sync::Mutex;

/// One recorded transport call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TransportCall {
    Connect { session_id: String },
    Disconnect,
    Publish(PublisherSettings),
    Subscribe(StreamId),
    SetResolution(StreamId, Resolution),
    SetFrameRate(StreamId, FrameRate),
    SetVideo(StreamId, bool),
}

/// Mock transport that records calls.
#[derive(Debug, Default)]
pub struct MockTransport {
    calls: Mutex<Vec<TransportCall>>,
    fail_connect: bool,
    fail_publish: bool,
    fail_subscribe: bool,
}

impl MockTransport {
    /// Create a mock where every call succeeds.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn builder() -> MockTransportBuilder {
        MockTransportBuilder::default()
    }

    /// All calls so far, in order.
    pub fn calls(&self) -> Vec<TransportCall> {
        self.calls.lock().unwrap().clone()
    }

    /// Number of recorded calls matching a predicate.
    pub fn count(&self, predicate: impl Fn(&TransportCall) -> bool) -> usize {
        self.calls.lock().unwrap().iter().filter(|c| predicate(c)).count()
    }

    pub fn disconnect_count(&self) -> usize {
        self.count(|c| *c == TransportCall::Disconnect)
    }

    pub fn subscribed(&self) -> Vec<StreamId> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter_map(|c| match c {
                TransportCall::Subscribe(s) => Some(s.clone()),
                _ => None,
            })
            .collect()
    }

    /// Last resolution requested for a stream.
    pub fn last_resolution(&self, stream_id: &StreamId) -> Option<Resolution> {
        self.calls.lock().unwrap().iter().rev().find_map(|c| match c {
            TransportCall::SetResolution(s, r) if s == stream_id => Some(*r),
            _ => None,
        })
    }

    /// Last frame rate requested for a stream.
    pub fn last_frame_rate(&self, stream_id: &StreamId) -> Option<FrameRate> {
        self.calls.lock().unwrap().iter().rev().find_map(|c| match c {
            TransportCall::SetFrameRate(s, f) if s == stream_id => Some(*f),
            _ => None,
        })
    }

    /// Last video enable flag sent for a stream.
    pub fn last_video(&self, stream_id: &StreamId) -> Option<bool> {
        self.calls.lock().unwrap().iter().rev().find_map(|c| match c {
            TransportCall::SetVideo(s, enabled) if s == stream_id => Some(*enabled),
            _ => None,
        })
    }

    fn record(&self, call: TransportCall) {
        self.calls.lock().unwrap().push(call);
    }
}

impl Transport for MockTransport {
    fn connect(&self, credentials: &SessionCredentials) -> Result<(), RoomError> {
        self.record(TransportCall::Connect {
            session_id: credentials.session_id.clone(),
        });
        if self.fail_connect {
            return Err(RoomError::Transport("mock connect failure".to_string()));
        }
        Ok(())
    }

    fn disconnect(&self) -> Result<(), RoomError> {
        self.record(TransportCall::Disconnect);
        Ok(())
    }

    fn publish(&self, settings: &PublisherSettings) -> Result<(), RoomError> {
        self.record(TransportCall::Publish(settings.clone()));
        if self.fail_publish {
            return Err(RoomError::Transport("mock publish failure".to_string()));
        }
        Ok(())
    }

    fn subscribe(&self, stream_id: &StreamId) -> Result<(), RoomError> {
        self.record(TransportCall::Subscribe(stream_id.clone()));
        if self.fail_subscribe {
            return Err(RoomError::Transport(format!(
                "mock subscribe failure for {stream_id}"
            )));
        }
        Ok(())
    }

    fn set_preferred_resolution(
        &self,
        stream_id: &StreamId,
        resolution: Resolution,
    ) -> Result<(), RoomError> {
        self.record(TransportCall::SetResolution(stream_id.clone(), resolution));
        Ok(())
    }

    fn set_preferred_frame_rate(
        &self,
        stream_id: &StreamId,
        frame_rate: FrameRate,
    ) -> Result<(), RoomError> {
        self.record(TransportCall::SetFrameRate(stream_id.clone(), frame_rate));
        Ok(())
    }

    fn set_subscribe_to_video(&self, stream_id: &StreamId, enabled: bool) -> Result<(), RoomError> {
        self.record(TransportCall::SetVideo(stream_id.clone(), enabled));
        Ok(())
    }
}

/// Builder for `MockTransport`.
#[derive(Debug, Default)]
pub struct MockTransportBuilder {
    fail_connect: bool,
    fail_publish: bool,
    fail_subscribe: bool,
}

impl MockTransportBuilder {
    #[must_use]
    pub fn fail_connect(mut self) -> Self {
        self.fail_connect = true;
        self
    }

    #[must_use]
    pub fn fail_publish(mut self) -> Self {
        self.fail_publish = true;
        self
    }

    #[must_use]
    pub fn fail_subscribe(mut self) -> Self {
        self.fail_subscribe = true;
        self
    }

    #[must_use]
    pub fn build(self) -> MockTransport {
        MockTransport {
            calls: Mutex::new(Vec::new()),
            fail_connect: self.fail_connect,
            fail_publish: self.fail_publish,
            fail_subscribe: self.fail_subscribe,
        }
    }
}
