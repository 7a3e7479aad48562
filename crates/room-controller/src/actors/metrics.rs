//! Mailbox depth monitoring for the room actor.
//!
//! | Normal | Warning | Critical |
//! |--------|---------|----------|
//! | < 64   | 64-192  | > 192    |
//!
//! The handle records an enqueue before each send and the actor records a
//! dequeue once the message is handled, so depth counts in-flight messages.

use crate::observability::metrics::set_actor_mailbox_depth;

use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use tracing::{debug, warn};

/// Mailbox depth thresholds for the room actor.
pub const ROOM_MAILBOX_NORMAL: usize = 64;
pub const ROOM_MAILBOX_WARNING: usize = 192;

/// Mailbox depth level for alerting.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MailboxLevel {
    /// Below normal threshold.
    Normal,
    /// Between normal and warning thresholds.
    Warning,
    /// Above warning threshold.
    Critical,
}

/// Shared between the room actor and every clone of its handle.
#[derive(Debug)]
pub struct MailboxMonitor {
    /// Session the actor serves, for log context.
    session_id: String,
    depth: AtomicUsize,
    peak_depth: AtomicUsize,
    messages_processed: AtomicU64,
    /// Sends that failed because the actor had stopped.
    messages_dropped: AtomicU64,
}

impl MailboxMonitor {
    #[must_use]
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            depth: AtomicUsize::new(0),
            peak_depth: AtomicUsize::new(0),
            messages_processed: AtomicU64::new(0),
            messages_dropped: AtomicU64::new(0),
        }
    }

    /// Record a message about to be sent to the mailbox.
    pub fn record_enqueue(&self) {
        let new_depth = self.depth.fetch_add(1, Ordering::Relaxed) + 1;
        self.peak_depth.fetch_max(new_depth, Ordering::Relaxed);
        set_actor_mailbox_depth(new_depth);

        match level_for_depth(new_depth) {
            MailboxLevel::Critical => {
                warn!(
                    target: "room.actor.mailbox",
                    session_id = %self.session_id,
                    depth = new_depth,
                    threshold = ROOM_MAILBOX_WARNING,
                    "Mailbox depth critical"
                );
            }
            // Log once when crossing into the warning band
            MailboxLevel::Warning if new_depth == ROOM_MAILBOX_NORMAL + 1 => {
                debug!(
                    target: "room.actor.mailbox",
                    session_id = %self.session_id,
                    depth = new_depth,
                    "Mailbox depth elevated"
                );
            }
            _ => {}
        }
    }

    /// Record a message the actor has finished handling.
    pub fn record_dequeue(&self) {
        let previous = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            })
            .unwrap_or(0);
        self.messages_processed.fetch_add(1, Ordering::Relaxed);
        set_actor_mailbox_depth(previous.saturating_sub(1));
    }

    /// Record a send that never reached the actor. Undoes the enqueue.
    pub fn record_drop(&self) {
        let _ = self
            .depth
            .fetch_update(Ordering::Relaxed, Ordering::Relaxed, |d| {
                Some(d.saturating_sub(1))
            });
        let dropped = self.messages_dropped.fetch_add(1, Ordering::Relaxed) + 1;
        debug!(
            target: "room.actor.mailbox",
            session_id = %self.session_id,
            dropped,
            "Message dropped, room actor has stopped"
        );
    }

    #[must_use]
    pub fn current_depth(&self) -> usize {
        self.depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn peak_depth(&self) -> usize {
        self.peak_depth.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_processed(&self) -> u64 {
        self.messages_processed.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn messages_dropped(&self) -> u64 {
        self.messages_dropped.load(Ordering::Relaxed)
    }

    #[must_use]
    pub fn current_level(&self) -> MailboxLevel {
        level_for_depth(self.current_depth())
    }
}

fn level_for_depth(depth: usize) -> MailboxLevel {
    if depth > ROOM_MAILBOX_WARNING {
        MailboxLevel::Critical
    } else if depth > ROOM_MAILBOX_NORMAL {
        MailboxLevel::Warning
    } else {
        MailboxLevel::Normal
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_mailbox_monitor_enqueue_dequeue() {
        let monitor = MailboxMonitor::new("session-123");
        assert_eq!(monitor.current_depth(), 0);

        monitor.record_enqueue();
        monitor.record_enqueue();
        monitor.record_enqueue();
        assert_eq!(monitor.current_depth(), 3);
        assert_eq!(monitor.peak_depth(), 3);

        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 2);
        assert_eq!(monitor.peak_depth(), 3); // Peak stays at 3
        assert_eq!(monitor.messages_processed(), 1);
    }

    #[test]
    fn test_mailbox_monitor_levels() {
        let monitor = MailboxMonitor::new("session-123");
        assert_eq!(monitor.current_level(), MailboxLevel::Normal);

        for _ in 0..100 {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Warning);

        for _ in 0..100 {
            monitor.record_enqueue();
        }
        assert_eq!(monitor.current_level(), MailboxLevel::Critical);
    }

    #[test]
    fn test_drop_undoes_enqueue() {
        let monitor = MailboxMonitor::new("session-123");
        monitor.record_enqueue();
        monitor.record_drop();
        assert_eq!(monitor.current_depth(), 0);
        assert_eq!(monitor.messages_dropped(), 1);
    }

    #[test]
    fn test_dequeue_never_underflows() {
        let monitor = MailboxMonitor::new("session-123");
        monitor.record_dequeue();
        assert_eq!(monitor.current_depth(), 0);
    }
}
