//! Rendering surface mock that maintains a featured/grid layout.
//!
//! Attach and detach calls are applied to an in-memory layout the same way a
//! real UI container would: grid attaches insert at the requested index and
//! detaches shift later tiles left. Tests compare this layout with the room
//! snapshot to check that the directives kept both in step.

use common::types::{StreamId, ViewHandle};
use room_controller::allocator::SlotKind;
use room_controller::collaborators::RenderingSurface;
use std::collections::HashMap;
use std::sync::Mutex;

#[derive(Debug, Default)]
struct Layout {
    featured: Option<(ViewHandle, StreamId)>,
    grid: Vec<(ViewHandle, StreamId)>,
    promotable: HashMap<ViewHandle, bool>,
    featured_loading: bool,
    reconnecting: bool,
    reconnecting_shown: usize,
    errors: Vec<String>,
    attaches: usize,
    detaches: usize,
}

/// Mock rendering surface.
#[derive(Debug, Default)]
pub struct MockSurface {
    layout: Mutex<Layout>,
}

impl MockSurface {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Stream shown in the featured slot.
    pub fn featured_stream(&self) -> Option<StreamId> {
        self.layout
            .lock()
            .unwrap()
            .featured
            .as_ref()
            .map(|(_, s)| s.clone())
    }

    /// Streams shown in the grid, in visual order.
    pub fn grid_streams(&self) -> Vec<StreamId> {
        self.layout
            .lock()
            .unwrap()
            .grid
            .iter()
            .map(|(_, s)| s.clone())
            .collect()
    }

    /// Whether long-press-to-promote is enabled on a view.
    pub fn is_promotable(&self, view: ViewHandle) -> Option<bool> {
        self.layout.lock().unwrap().promotable.get(&view).copied()
    }

    pub fn featured_loading(&self) -> bool {
        self.layout.lock().unwrap().featured_loading
    }

    pub fn reconnecting(&self) -> bool {
        self.layout.lock().unwrap().reconnecting
    }

    /// How many times the reconnecting indicator was shown.
    pub fn reconnecting_shown(&self) -> usize {
        self.layout.lock().unwrap().reconnecting_shown
    }

    pub fn errors(&self) -> Vec<String> {
        self.layout.lock().unwrap().errors.clone()
    }

    /// Number of views currently attached anywhere.
    pub fn attached_views(&self) -> usize {
        let layout = self.layout.lock().unwrap();
        layout.grid.len() + usize::from(layout.featured.is_some())
    }

    pub fn attach_count(&self) -> usize {
        self.layout.lock().unwrap().attaches
    }

    pub fn detach_count(&self) -> usize {
        self.layout.lock().unwrap().detaches
    }
}

impl RenderingSurface for MockSurface {
    fn attach(&self, view: ViewHandle, stream_id: &StreamId, slot: SlotKind) {
        let mut layout = self.layout.lock().unwrap();
        layout.attaches += 1;
        match slot {
            SlotKind::Featured => {
                layout.featured = Some((view, stream_id.clone()));
            }
            SlotKind::Grid { index } => {
                let index = index.min(layout.grid.len());
                layout.grid.insert(index, (view, stream_id.clone()));
            }
        }
    }

    fn detach(&self, view: ViewHandle) {
        let mut layout = self.layout.lock().unwrap();
        layout.detaches += 1;
        if layout.featured.as_ref().is_some_and(|(v, _)| *v == view) {
            layout.featured = None;
        }
        layout.grid.retain(|(v, _)| *v != view);
    }

    fn index_of(&self, view: ViewHandle) -> Option<usize> {
        self.layout
            .lock()
            .unwrap()
            .grid
            .iter()
            .position(|(v, _)| *v == view)
    }

    fn set_promotable(&self, view: ViewHandle, enabled: bool) {
        self.layout.lock().unwrap().promotable.insert(view, enabled);
    }

    fn show_featured_loading(&self, visible: bool) {
        self.layout.lock().unwrap().featured_loading = visible;
    }

    fn show_reconnecting(&self, visible: bool) {
        let mut layout = self.layout.lock().unwrap();
        if visible {
            layout.reconnecting_shown += 1;
        }
        layout.reconnecting = visible;
    }

    fn show_error(&self, message: &str) {
        self.layout.lock().unwrap().errors.push(message.to_string());
    }
}
