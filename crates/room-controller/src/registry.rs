//! Participant registry.
//!
//! Owns every live `Participant` and indexes it by stream, connection and view.
//! The registry performs no I/O; the room actor calls it and then hands the
//! participant to the slot allocator.

use crate::errors::RoomError;
use crate::participant::Participant;

use common::types::{ConnectionId, StreamId, ViewHandle};
use std::collections::hash_map::Entry;
use std::collections::{BTreeMap, HashMap};
use tracing::{debug, warn};

/// Result of [`ParticipantRegistry::add`].
#[derive(Debug)]
pub enum Admission<'a> {
    /// A new participant was created.
    Created(&'a Participant),
    /// The stream was already live; nothing changed.
    Existing(&'a Participant),
}

impl<'a> Admission<'a> {
    #[must_use]
    pub fn participant(&self) -> &'a Participant {
        match self {
            Admission::Created(p) | Admission::Existing(p) => p,
        }
    }

    #[must_use]
    pub fn is_created(&self) -> bool {
        matches!(self, Admission::Created(_))
    }
}

/// Authoritative set of live participants.
#[derive(Debug, Default)]
pub struct ParticipantRegistry {
    participants: HashMap<StreamId, Participant>,
    by_connection: HashMap<ConnectionId, StreamId>,
    /// View handles only ever increase, so iteration is join order.
    by_view: BTreeMap<ViewHandle, StreamId>,
    next_view: u64,
}

impl ParticipantRegistry {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a new stream.
    ///
    /// A stream that is already live is returned unchanged as
    /// [`Admission::Existing`]. A connection that publishes a second stream
    /// has its connection index moved to the newer stream.
    pub fn add(&mut self, stream_id: StreamId, connection_id: ConnectionId) -> Admission<'_> {
        let vacant = match self.participants.entry(stream_id.clone()) {
            Entry::Occupied(existing) => {
                debug!(
                    target: "room.registry",
                    stream_id = %stream_id,
                    "Duplicate join ignored"
                );
                return Admission::Existing(existing.into_mut());
            }
            Entry::Vacant(vacant) => vacant,
        };

        if let Some(previous) = self.by_connection.get(&connection_id) {
            warn!(
                target: "room.registry",
                connection_id = %connection_id,
                previous_stream_id = %previous,
                stream_id = %stream_id,
                "Connection already owns a live stream, re-indexing to the new stream"
            );
        }

        self.next_view += 1;
        let view = ViewHandle::new(self.next_view);

        self.by_connection
            .insert(connection_id.clone(), stream_id.clone());
        self.by_view.insert(view, stream_id.clone());

        debug!(
            target: "room.registry",
            stream_id = %stream_id,
            view = %view,
            live = self.by_view.len(),
            "Participant registered"
        );

        Admission::Created(vacant.insert(Participant::new(stream_id, connection_id, view)))
    }

    /// Remove a stream from every index.
    pub fn remove(&mut self, stream_id: &StreamId) -> Result<Participant, RoomError> {
        let participant = self
            .participants
            .remove(stream_id)
            .ok_or_else(|| RoomError::NotFound(format!("stream {stream_id}")))?;

        // Only drop the connection entry if it still points at this stream
        if self.by_connection.get(participant.connection_id()) == Some(stream_id) {
            self.by_connection.remove(participant.connection_id());
        }
        self.by_view.remove(&participant.view());

        debug!(
            target: "room.registry",
            stream_id = %stream_id,
            live = self.by_view.len(),
            "Participant removed"
        );

        Ok(participant)
    }

    #[must_use]
    pub fn lookup_by_stream(&self, stream_id: &StreamId) -> Option<&Participant> {
        self.participants.get(stream_id)
    }

    #[must_use]
    pub fn lookup_by_connection(&self, connection_id: &ConnectionId) -> Option<&Participant> {
        self.by_connection
            .get(connection_id)
            .and_then(|stream_id| self.participants.get(stream_id))
    }

    #[must_use]
    pub fn lookup_by_view(&self, view: ViewHandle) -> Option<&Participant> {
        self.by_view
            .get(&view)
            .and_then(|stream_id| self.participants.get(stream_id))
    }

    pub(crate) fn get_mut(&mut self, stream_id: &StreamId) -> Option<&mut Participant> {
        self.participants.get_mut(stream_id)
    }

    /// Live participants in join order.
    pub fn ordered(&self) -> impl Iterator<Item = &Participant> + '_ {
        self.by_view
            .values()
            .filter_map(|stream_id| self.participants.get(stream_id))
    }

    #[must_use]
    pub fn contains(&self, stream_id: &StreamId) -> bool {
        self.participants.contains_key(stream_id)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.participants.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.participants.is_empty()
    }

    /// Drop every participant, returning them in join order.
    pub fn clear(&mut self) -> Vec<Participant> {
        let by_view = std::mem::take(&mut self.by_view);
        let released = by_view
            .values()
            .filter_map(|stream_id| self.participants.remove(stream_id))
            .collect();
        self.participants.clear();
        self.by_connection.clear();
        released
    }
}
