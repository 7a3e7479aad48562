//! Slot allocator: decides who is featured and who sits in the grid.
//!
//! The allocator owns one featured slot and an ordered grid of stream IDs. It
//! never creates or destroys participants; it rewrites their quality and slot
//! and returns the [`Directive`]s the room actor must forward to the transport
//! and rendering surface.
//!
//! # Rules
//!
//! - A joining participant always becomes featured. The previous featured
//!   participant is demoted to the tail of the grid.
//! - A promote swaps the target with the featured participant in place: the
//!   demoted participant takes the grid index the target vacated.
//! - When the featured participant leaves the slot stays empty unless
//!   `auto_promote_on_featured_leave` is set, in which case the grid tail
//!   (the most recent arrival still in the grid) is promoted.
//! - Grid entry sets grid quality and re-enables video; featured entry sets
//!   featured quality.

use crate::errors::RoomError;
use crate::observability::metrics;
use crate::participant::{QualityProfile, FEATURED_QUALITY, GRID_QUALITY};
use crate::registry::ParticipantRegistry;

use common::types::{StreamId, ViewHandle};
use serde::Serialize;
use std::collections::HashSet;
use tracing::{debug, info, warn};

/// Where a participant's view is attached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SlotKind {
    Featured,
    /// Grid tile at the given visual position.
    Grid { index: usize },
}

/// Instruction for a collaborator, produced by an allocator transition.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Directive {
    /// Set the preferred resolution and frame rate for a stream.
    ApplyQuality {
        stream_id: StreamId,
        quality: QualityProfile,
    },
    /// Enable or disable video delivery for a stream (audio stays on).
    SetVideoEnabled { stream_id: StreamId, enabled: bool },
    /// Attach a view to a slot. Grid attaches insert at `index`.
    Attach {
        view: ViewHandle,
        stream_id: StreamId,
        slot: SlotKind,
    },
    /// Remove a view from whichever slot shows it.
    Detach { view: ViewHandle },
    /// Toggle the long-press-to-promote affordance on a view.
    SetPromotable { view: ViewHandle, enabled: bool },
    /// Show or hide the featured-slot loading indicator.
    ShowFeaturedLoading { visible: bool },
}

/// Featured/grid slot state.
#[derive(Debug, Default)]
pub struct SlotAllocator {
    featured: Option<StreamId>,
    grid: Vec<StreamId>,
    /// Featured stream whose view is not attached yet.
    loading: Option<StreamId>,
    auto_promote_on_featured_leave: bool,
}

impl SlotAllocator {
    #[must_use]
    pub fn new(auto_promote_on_featured_leave: bool) -> Self {
        Self {
            auto_promote_on_featured_leave,
            ..Self::default()
        }
    }

    #[must_use]
    pub fn featured(&self) -> Option<&StreamId> {
        self.featured.as_ref()
    }

    /// Grid members in visual order.
    #[must_use]
    pub fn grid(&self) -> &[StreamId] {
        &self.grid
    }

    /// Featured stream still waiting for its view to load.
    #[must_use]
    pub fn loading(&self) -> Option<&StreamId> {
        self.loading.as_ref()
    }

    /// Current slot of a stream.
    ///
    /// Linear in grid length, like the shift a grid leave already does.
    #[must_use]
    pub fn slot_of(&self, stream_id: &StreamId) -> Option<SlotKind> {
        if self.featured.as_ref() == Some(stream_id) {
            return Some(SlotKind::Featured);
        }
        self.grid
            .iter()
            .position(|s| s == stream_id)
            .map(|index| SlotKind::Grid { index })
    }

    /// Make a newly joined participant featured, demoting the current one.
    pub fn on_join(
        &mut self,
        registry: &mut ParticipantRegistry,
        stream_id: &StreamId,
    ) -> Result<Vec<Directive>, RoomError> {
        let view = view_of(registry, stream_id)?;
        let mut directives = Vec::new();

        if self.featured.as_ref() == Some(stream_id) {
            return Ok(directives);
        }

        if let Some(index) = self.grid.iter().position(|s| s == stream_id) {
            self.grid.remove(index);
            directives.push(Directive::Detach { view });
        }

        if let Some(previous) = self.featured.take() {
            self.vacate_featured(registry, &previous, &mut directives)?;
            let index = self.grid.len();
            self.grid.push(previous.clone());
            self.enter_grid(registry, &previous, index, &mut directives)?;
            metrics::record_slot_transition("demote");
        }

        self.featured = Some(stream_id.clone());
        self.loading = Some(stream_id.clone());
        set_quality(registry, stream_id, FEATURED_QUALITY, &mut directives)?;
        directives.push(Directive::SetPromotable {
            view,
            enabled: false,
        });
        directives.push(Directive::ShowFeaturedLoading { visible: true });
        metrics::record_slot_transition("join_featured");

        debug!(
            target: "room.allocator",
            stream_id = %stream_id,
            grid_len = self.grid.len(),
            "Joined participant featured"
        );

        Ok(directives)
    }

    /// The featured participant's view finished loading; attach it.
    pub fn featured_ready(&mut self, registry: &ParticipantRegistry) -> Vec<Directive> {
        let Some(stream_id) = self.loading.take() else {
            return Vec::new();
        };

        if self.featured.as_ref() != Some(&stream_id) {
            return Vec::new();
        }

        match registry.lookup_by_stream(&stream_id) {
            Some(participant) => vec![
                Directive::ShowFeaturedLoading { visible: false },
                Directive::Attach {
                    view: participant.view(),
                    stream_id,
                    slot: SlotKind::Featured,
                },
            ],
            None => Vec::new(),
        }
    }

    /// Release the slot held by a participant the registry just removed.
    ///
    /// `view` is the departed participant's view; it is no longer resolvable
    /// through the registry.
    pub fn on_leave(
        &mut self,
        registry: &mut ParticipantRegistry,
        stream_id: &StreamId,
        view: ViewHandle,
    ) -> Result<Vec<Directive>, RoomError> {
        let mut directives = Vec::new();

        match self.slot_of(stream_id) {
            Some(SlotKind::Featured) => {
                self.featured = None;
                if self.loading.as_ref() == Some(stream_id) {
                    self.loading = None;
                    directives.push(Directive::ShowFeaturedLoading { visible: false });
                } else {
                    directives.push(Directive::Detach { view });
                }
                metrics::record_slot_transition("leave_featured");

                if self.auto_promote_on_featured_leave {
                    if let Some(successor) = self.grid.pop() {
                        self.enter_featured_from_grid(registry, &successor, &mut directives)?;
                        metrics::record_slot_transition("auto_promote");
                        info!(
                            target: "room.allocator",
                            departed = %stream_id,
                            featured = %successor,
                            "Featured participant left, grid tail promoted"
                        );
                    }
                } else {
                    info!(
                        target: "room.allocator",
                        departed = %stream_id,
                        grid_len = self.grid.len(),
                        "Featured participant left, featured slot now empty"
                    );
                }
            }
            Some(SlotKind::Grid { index }) => {
                self.grid.remove(index);
                directives.push(Directive::Detach { view });
                metrics::record_slot_transition("leave_grid");
                debug!(
                    target: "room.allocator",
                    stream_id = %stream_id,
                    index,
                    "Grid participant left"
                );
            }
            None => {
                return Err(RoomError::NotFound(format!("slot for stream {stream_id}")));
            }
        }

        Ok(directives)
    }

    /// User-requested swap of a grid participant into the featured slot.
    pub fn promote(
        &mut self,
        registry: &mut ParticipantRegistry,
        target: &StreamId,
    ) -> Result<Vec<Directive>, RoomError> {
        let target_view = view_of(registry, target)?;
        let mut directives = Vec::new();

        let index = match self.slot_of(target) {
            Some(SlotKind::Featured) => return Ok(directives),
            Some(SlotKind::Grid { index }) => index,
            None => {
                return Err(RoomError::InvariantViolation(format!(
                    "live stream {target} holds no slot"
                )))
            }
        };

        directives.push(Directive::Detach { view: target_view });

        match self.featured.take() {
            Some(previous) => {
                self.vacate_featured(registry, &previous, &mut directives)?;
                if let Some(slot) = self.grid.get_mut(index) {
                    *slot = previous.clone();
                }
                self.enter_featured(registry, target, target_view, &mut directives)?;
                self.enter_grid(registry, &previous, index, &mut directives)?;
                debug!(
                    target: "room.allocator",
                    featured = %target,
                    demoted = %previous,
                    index,
                    "Promoted grid participant"
                );
            }
            None => {
                self.grid.remove(index);
                self.enter_featured(registry, target, target_view, &mut directives)?;
                debug!(
                    target: "room.allocator",
                    featured = %target,
                    "Promoted grid participant into empty featured slot"
                );
            }
        }

        metrics::record_slot_transition("promote");
        Ok(directives)
    }

    /// Flip video delivery for one participant, whatever its slot.
    pub fn toggle_video(
        &mut self,
        registry: &mut ParticipantRegistry,
        stream_id: &StreamId,
    ) -> Result<Vec<Directive>, RoomError> {
        let participant = registry
            .get_mut(stream_id)
            .ok_or_else(|| RoomError::NotFound(format!("stream {stream_id}")))?;

        let enabled = !participant.subscribed_to_video();
        participant.set_subscribed_to_video(enabled);

        debug!(
            target: "room.allocator",
            stream_id = %stream_id,
            enabled,
            "Video subscription toggled"
        );

        Ok(vec![Directive::SetVideoEnabled {
            stream_id: stream_id.clone(),
            enabled,
        }])
    }

    /// Forget every slot, returning detaches for the views still attached.
    pub fn reset(&mut self, registry: &ParticipantRegistry) -> Vec<Directive> {
        let mut directives = Vec::new();

        // A featured view that never finished loading was never attached
        let loading = self.loading.take();
        if loading.is_some() {
            directives.push(Directive::ShowFeaturedLoading { visible: false });
        }

        let featured = self.featured.take();
        let grid = std::mem::take(&mut self.grid);
        for stream_id in featured.iter().chain(grid.iter()) {
            if loading.as_ref() == Some(stream_id) {
                continue;
            }
            if let Some(participant) = registry.lookup_by_stream(stream_id) {
                directives.push(Directive::Detach {
                    view: participant.view(),
                });
            }
        }

        directives
    }

    /// Verify slot bookkeeping against the registry.
    pub fn check_invariants(&self, registry: &ParticipantRegistry) -> Result<(), RoomError> {
        let mut seen = HashSet::new();

        for stream_id in self.featured.iter().chain(self.grid.iter()) {
            if !seen.insert(stream_id) {
                return Err(RoomError::InvariantViolation(format!(
                    "stream {stream_id} holds two slots"
                )));
            }
            if !registry.contains(stream_id) {
                return Err(RoomError::InvariantViolation(format!(
                    "slot references departed stream {stream_id}"
                )));
            }
        }

        if seen.len() != registry.len() {
            return Err(RoomError::InvariantViolation(format!(
                "{} live participants but {} slotted",
                registry.len(),
                seen.len()
            )));
        }

        if let Some(loading) = &self.loading {
            if self.featured.as_ref() != Some(loading) {
                return Err(RoomError::InvariantViolation(format!(
                    "loading stream {loading} is not featured"
                )));
            }
        }

        if let Some(featured) = &self.featured {
            let quality = registry
                .lookup_by_stream(featured)
                .map(crate::participant::Participant::quality);
            if quality != Some(FEATURED_QUALITY) {
                return Err(RoomError::InvariantViolation(format!(
                    "featured stream {featured} has grid quality"
                )));
            }
        }

        Ok(())
    }

    /// Detach the outgoing featured participant's view, or cancel its load.
    fn vacate_featured(
        &mut self,
        registry: &ParticipantRegistry,
        stream_id: &StreamId,
        directives: &mut Vec<Directive>,
    ) -> Result<(), RoomError> {
        if self.loading.as_ref() == Some(stream_id) {
            self.loading = None;
            directives.push(Directive::ShowFeaturedLoading { visible: false });
            return Ok(());
        }
        let view = view_of(registry, stream_id)?;
        directives.push(Directive::Detach { view });
        Ok(())
    }

    fn enter_grid(
        &mut self,
        registry: &mut ParticipantRegistry,
        stream_id: &StreamId,
        index: usize,
        directives: &mut Vec<Directive>,
    ) -> Result<(), RoomError> {
        let participant = registry
            .get_mut(stream_id)
            .ok_or_else(|| RoomError::NotFound(format!("stream {stream_id}")))?;
        participant.apply_quality(GRID_QUALITY);
        participant.set_subscribed_to_video(true);
        let view = participant.view();

        directives.push(Directive::ApplyQuality {
            stream_id: stream_id.clone(),
            quality: GRID_QUALITY,
        });
        directives.push(Directive::SetVideoEnabled {
            stream_id: stream_id.clone(),
            enabled: true,
        });
        directives.push(Directive::Attach {
            view,
            stream_id: stream_id.clone(),
            slot: SlotKind::Grid { index },
        });
        directives.push(Directive::SetPromotable {
            view,
            enabled: true,
        });
        Ok(())
    }

    /// Seat an already-rendered participant in the featured slot.
    fn enter_featured(
        &mut self,
        registry: &mut ParticipantRegistry,
        stream_id: &StreamId,
        view: ViewHandle,
        directives: &mut Vec<Directive>,
    ) -> Result<(), RoomError> {
        self.featured = Some(stream_id.clone());
        set_quality(registry, stream_id, FEATURED_QUALITY, directives)?;
        directives.push(Directive::SetPromotable {
            view,
            enabled: false,
        });
        directives.push(Directive::Attach {
            view,
            stream_id: stream_id.clone(),
            slot: SlotKind::Featured,
        });
        Ok(())
    }

    fn enter_featured_from_grid(
        &mut self,
        registry: &mut ParticipantRegistry,
        stream_id: &StreamId,
        directives: &mut Vec<Directive>,
    ) -> Result<(), RoomError> {
        let view = view_of(registry, stream_id)?;
        directives.push(Directive::Detach { view });
        self.enter_featured(registry, stream_id, view, directives)
    }
}

fn view_of(registry: &ParticipantRegistry, stream_id: &StreamId) -> Result<ViewHandle, RoomError> {
    registry
        .lookup_by_stream(stream_id)
        .map(crate::participant::Participant::view)
        .ok_or_else(|| RoomError::NotFound(format!("stream {stream_id}")))
}

fn set_quality(
    registry: &mut ParticipantRegistry,
    stream_id: &StreamId,
    quality: QualityProfile,
    directives: &mut Vec<Directive>,
) -> Result<(), RoomError> {
    let participant = registry.get_mut(stream_id).ok_or_else(|| {
        warn!(
            target: "room.allocator",
            stream_id = %stream_id,
            "Quality change for unknown stream"
        );
        RoomError::NotFound(format!("stream {stream_id}"))
    })?;
    participant.apply_quality(quality);
    directives.push(Directive::ApplyQuality {
        stream_id: stream_id.clone(),
        quality,
    });
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use crate::participant::{FrameRate, Resolution};
    use common::types::ConnectionId;

    struct Room {
        registry: ParticipantRegistry,
        allocator: SlotAllocator,
    }

    impl Room {
        fn new() -> Self {
            Self::with_auto_promote(false)
        }

        fn with_auto_promote(auto_promote: bool) -> Self {
            Self {
                registry: ParticipantRegistry::new(),
                allocator: SlotAllocator::new(auto_promote),
            }
        }

        fn join(&mut self, stream: &str) -> Vec<Directive> {
            let stream_id = StreamId::from(stream);
            self.registry
                .add(stream_id.clone(), ConnectionId::new(format!("conn-{stream}")));
            let directives = self
                .allocator
                .on_join(&mut self.registry, &stream_id)
                .unwrap();
            self.allocator.check_invariants(&self.registry).unwrap();
            directives
        }

        fn leave(&mut self, stream: &str) -> Result<Vec<Directive>, RoomError> {
            let stream_id = StreamId::from(stream);
            let departed = self.registry.remove(&stream_id)?;
            let directives =
                self.allocator
                    .on_leave(&mut self.registry, &stream_id, departed.view())?;
            self.allocator.check_invariants(&self.registry).unwrap();
            Ok(directives)
        }

        fn promote(&mut self, stream: &str) -> Result<Vec<Directive>, RoomError> {
            let directives = self
                .allocator
                .promote(&mut self.registry, &StreamId::from(stream))?;
            self.allocator.check_invariants(&self.registry).unwrap();
            Ok(directives)
        }

        fn participant(&self, stream: &str) -> &crate::participant::Participant {
            self.registry
                .lookup_by_stream(&StreamId::from(stream))
                .unwrap()
        }

        fn featured(&self) -> Option<&str> {
            self.allocator.featured().map(StreamId::as_str)
        }

        fn grid(&self) -> Vec<&str> {
            self.allocator.grid().iter().map(StreamId::as_str).collect()
        }
    }

    #[test]
    fn test_scenario_a_join_demotes_previous_featured() {
        let mut room = Room::new();

        room.join("p1");
        assert_eq!(room.featured(), Some("p1"));
        assert!(room.grid().is_empty());

        room.join("p2");
        assert_eq!(room.featured(), Some("p2"));
        assert_eq!(room.grid(), vec!["p1"]);

        let p1 = room.participant("p1");
        assert_eq!(p1.preferred_resolution(), Resolution::Low);
        assert_eq!(p1.preferred_frame_rate(), FrameRate::Mid);
        assert!(p1.subscribed_to_video());

        let p2 = room.participant("p2");
        assert_eq!(p2.preferred_resolution(), Resolution::High);
        assert_eq!(p2.preferred_frame_rate(), FrameRate::Max);
    }

    #[test]
    fn test_join_directives_attach_demoted_at_grid_tail() {
        let mut room = Room::new();
        room.join("p1");
        room.allocator.featured_ready(&room.registry);
        room.join("p2");
        room.allocator.featured_ready(&room.registry);

        let p2_view = room.participant("p2").view();
        let directives = room.join("p3");

        let p2_attach = directives.iter().find_map(|d| match d {
            Directive::Attach { view, slot, .. } if *view == p2_view => Some(*slot),
            _ => None,
        });
        assert_eq!(p2_attach, Some(SlotKind::Grid { index: 1 }));
        assert!(directives.contains(&Directive::Detach { view: p2_view }));
        assert!(directives.contains(&Directive::SetPromotable {
            view: p2_view,
            enabled: true
        }));
        assert!(directives.contains(&Directive::ShowFeaturedLoading { visible: true }));
        assert_eq!(room.grid(), vec!["p1", "p2"]);
    }

    #[test]
    fn test_featured_ready_attaches_once() {
        let mut room = Room::new();
        room.join("p1");
        let view = room.participant("p1").view();
        assert_eq!(room.allocator.loading().map(StreamId::as_str), Some("p1"));

        let directives = room.allocator.featured_ready(&room.registry);
        assert!(directives.contains(&Directive::Attach {
            view,
            stream_id: StreamId::from("p1"),
            slot: SlotKind::Featured,
        }));
        assert!(room.allocator.loading().is_none());

        // Second readiness signal is a no-op
        assert!(room.allocator.featured_ready(&room.registry).is_empty());
    }

    #[test]
    fn test_demoting_a_loading_featured_does_not_detach_it() {
        let mut room = Room::new();
        room.join("p1");
        let p1_view = room.participant("p1").view();

        // p1 never became ready
        let directives = room.join("p2");
        assert!(!directives.contains(&Directive::Detach { view: p1_view }));
        assert!(directives.contains(&Directive::ShowFeaturedLoading { visible: false }));
        assert_eq!(room.allocator.loading().map(StreamId::as_str), Some("p2"));
    }

    #[test]
    fn test_scenario_b_promote_swaps_in_place() {
        let mut room = Room::new();
        room.join("p1");
        room.join("p2");

        room.promote("p1").unwrap();
        assert_eq!(room.featured(), Some("p1"));
        assert_eq!(room.grid(), vec!["p2"]);

        assert_eq!(room.participant("p1").quality(), FEATURED_QUALITY);
        assert_eq!(room.participant("p2").quality(), GRID_QUALITY);
    }

    #[test]
    fn test_promote_preserves_other_grid_positions() {
        let mut room = Room::new();
        for p in ["p1", "p2", "p3", "p4"] {
            room.join(p);
        }
        assert_eq!(room.grid(), vec!["p1", "p2", "p3"]);

        let directives = room.promote("p2").unwrap();
        assert_eq!(room.featured(), Some("p2"));
        assert_eq!(room.grid(), vec!["p1", "p4", "p3"]);

        let p4_view = room.participant("p4").view();
        assert!(directives.contains(&Directive::Attach {
            view: p4_view,
            stream_id: StreamId::from("p4"),
            slot: SlotKind::Grid { index: 1 },
        }));
        assert!(directives.contains(&Directive::SetPromotable {
            view: p4_view,
            enabled: true
        }));
    }

    #[test]
    fn test_promote_featured_is_noop() {
        let mut room = Room::new();
        room.join("p1");
        room.join("p2");

        let directives = room.promote("p2").unwrap();
        assert!(directives.is_empty());
        assert_eq!(room.featured(), Some("p2"));
        assert_eq!(room.grid(), vec!["p1"]);
    }

    #[test]
    fn test_promote_unknown_is_not_found() {
        let mut room = Room::new();
        room.join("p1");
        let result = room.promote("ghost");
        assert!(matches!(result, Err(RoomError::NotFound(_))));
        assert_eq!(room.featured(), Some("p1"));
    }

    #[test]
    fn test_promote_round_trip_restores_assignment() {
        let mut room = Room::new();
        for p in ["p1", "p2", "p3"] {
            room.join(p);
        }
        let before_featured = room.featured().map(str::to_string);
        let before_grid: Vec<String> = room.grid().iter().map(|s| s.to_string()).collect();

        room.promote("p1").unwrap();
        room.promote("p3").unwrap();

        assert_eq!(room.featured().map(str::to_string), before_featured);
        assert_eq!(
            room.grid().iter().map(|s| s.to_string()).collect::<Vec<_>>(),
            before_grid
        );
        assert_eq!(room.participant("p3").quality(), FEATURED_QUALITY);
        assert_eq!(room.participant("p1").quality(), GRID_QUALITY);
    }

    #[test]
    fn test_scenario_c_featured_leave_leaves_slot_empty() {
        let mut room = Room::new();
        room.join("p1");
        room.join("p2");

        room.leave("p2").unwrap();
        assert_eq!(room.featured(), None);
        assert_eq!(room.grid(), vec!["p1"]);
        assert_eq!(room.participant("p1").quality(), GRID_QUALITY);

        let result = room.leave("unknown");
        assert!(matches!(result, Err(RoomError::NotFound(_))));
        assert_eq!(room.grid(), vec!["p1"]);
        assert_eq!(room.participant("p1").quality(), GRID_QUALITY);
        assert!(room.participant("p1").subscribed_to_video());
    }

    #[test]
    fn test_featured_leave_with_auto_promote_takes_grid_tail() {
        let mut room = Room::with_auto_promote(true);
        for p in ["p1", "p2", "p3"] {
            room.join(p);
        }

        let directives = room.leave("p3").unwrap();
        assert_eq!(room.featured(), Some("p2"));
        assert_eq!(room.grid(), vec!["p1"]);
        assert_eq!(room.participant("p2").quality(), FEATURED_QUALITY);

        let p2_view = room.participant("p2").view();
        assert!(directives.contains(&Directive::Attach {
            view: p2_view,
            stream_id: StreamId::from("p2"),
            slot: SlotKind::Featured,
        }));
    }

    #[test]
    fn test_grid_leave_detaches_and_shifts() {
        let mut room = Room::new();
        for p in ["p1", "p2", "p3", "p4"] {
            room.join(p);
        }
        let p2_view = room.participant("p2").view();

        let directives = room.leave("p2").unwrap();
        assert_eq!(directives, vec![Directive::Detach { view: p2_view }]);
        assert_eq!(room.grid(), vec!["p1", "p3"]);
        assert_eq!(room.featured(), Some("p4"));
    }

    #[test]
    fn test_promote_into_empty_featured_slot() {
        let mut room = Room::new();
        for p in ["p1", "p2", "p3"] {
            room.join(p);
        }
        room.leave("p3").unwrap();
        assert_eq!(room.featured(), None);

        room.promote("p1").unwrap();
        assert_eq!(room.featured(), Some("p1"));
        assert_eq!(room.grid(), vec!["p2"]);
    }

    #[test]
    fn test_scenario_d_toggle_video_is_slot_independent() {
        let mut room = Room::new();
        room.join("p1");
        room.join("p2");

        let directives = room
            .allocator
            .toggle_video(&mut room.registry, &StreamId::from("p1"))
            .unwrap();
        assert_eq!(
            directives,
            vec![Directive::SetVideoEnabled {
                stream_id: StreamId::from("p1"),
                enabled: false
            }]
        );
        assert!(!room.participant("p1").subscribed_to_video());
        assert!(room.participant("p2").subscribed_to_video());
        assert_eq!(room.grid(), vec!["p1"]);

        room.allocator
            .toggle_video(&mut room.registry, &StreamId::from("p2"))
            .unwrap();
        assert!(!room.participant("p2").subscribed_to_video());
        assert_eq!(room.featured(), Some("p2"));
    }

    #[test]
    fn test_demotion_reenables_video() {
        let mut room = Room::new();
        room.join("p1");
        room.allocator
            .toggle_video(&mut room.registry, &StreamId::from("p1"))
            .unwrap();
        assert!(!room.participant("p1").subscribed_to_video());

        room.join("p2");
        assert!(room.participant("p1").subscribed_to_video());
    }

    #[test]
    fn test_featured_count_tracks_live_set_over_mixed_sequence() {
        let mut room = Room::with_auto_promote(true);
        let script = [
            ("join", "a"),
            ("join", "b"),
            ("join", "c"),
            ("promote", "a"),
            ("leave", "a"),
            ("join", "d"),
            ("promote", "b"),
            ("leave", "c"),
            ("leave", "b"),
            ("promote", "d"),
            ("leave", "d"),
        ];

        for (op, stream) in script {
            match op {
                "join" => {
                    room.join(stream);
                }
                "leave" => {
                    room.leave(stream).unwrap();
                }
                _ => {
                    room.promote(stream).unwrap();
                }
            }
            let featured = usize::from(room.featured().is_some());
            assert_eq!(featured, room.registry.len().min(1), "after {op} {stream}");
        }
        assert!(room.registry.is_empty());
        assert!(room.grid().is_empty());
    }

    #[test]
    fn test_reset_detaches_attached_views_only() {
        let mut room = Room::new();
        room.join("p1");
        room.join("p2");
        let p1_view = room.participant("p1").view();

        let directives = room.allocator.reset(&room.registry);
        assert!(directives.contains(&Directive::Detach { view: p1_view }));
        assert!(directives.contains(&Directive::ShowFeaturedLoading { visible: false }));
        // p2 was still loading, so it has nothing to detach
        let p2_view = room.participant("p2").view();
        assert!(!directives.contains(&Directive::Detach { view: p2_view }));
        assert!(room.allocator.featured().is_none());
        assert!(room.allocator.grid().is_empty());
    }

    #[test]
    fn test_check_invariants_detects_unslotted_participant() {
        let mut room = Room::new();
        room.join("p1");
        room.registry
            .add(StreamId::from("stray"), ConnectionId::from("conn-stray"));

        let result = room.allocator.check_invariants(&room.registry);
        assert!(matches!(result, Err(RoomError::InvariantViolation(_))));
    }
}
