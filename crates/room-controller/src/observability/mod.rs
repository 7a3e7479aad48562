//! Observability module for the room controller.
//!
//! Metric labels are bounded to prevent cardinality explosion:
//! - `event_type`: transport/user event kinds (~8 values)
//! - `transition`: slot transitions (6 values)
//! - `error_type`: `RoomError` variant labels plus `surface_desync` (9 values)
//!
//! Stream and connection IDs are never used as labels.
//!
//! # Metrics
//!
//! | Metric | Type | Labels | Purpose |
//! |--------|------|--------|---------|
//! | `room_participants_active` | Gauge | none | Live participants |
//! | `room_events_total` | Counter | `event_type` | Events processed by the room actor |
//! | `room_slot_transitions_total` | Counter | `transition` | Featured/grid transitions |
//! | `room_errors_total` | Counter | `error_type` | Errors handled by the room actor |
//! | `room_actor_mailbox_depth` | Gauge | none | Backpressure indicator |
//! | `room_telemetry_samples_total` | Counter | none | Resource samples taken |

pub mod metrics;

pub use metrics::{
    init_metrics_recorder, record_error, record_event, record_slot_transition,
    record_telemetry_sample, set_actor_mailbox_depth, set_participants_active,
};
