//! Mailbox observation hooks

use crate::message::Message;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

/// Callbacks invoked by a mailbox for user-message traffic.
///
/// Every hook defaults to a no-op. Hooks run on the posting or draining
/// thread and must be cheap.
pub trait MailboxStatistics: Send + Sync {
    fn mailbox_started(&self) {}

    fn message_posted(&self, _message: &Message) {}

    fn message_received(&self, _message: &Message) {}

    /// A bounded mailbox discarded this message on overflow
    fn message_dropped(&self, _message: &Message) {}

    /// The mailbox drained and went idle
    fn mailbox_empty(&self) {}
}

/// Atomic counters implementing [`MailboxStatistics`]
#[derive(Debug, Default)]
pub struct MailboxMetrics {
    /// Total messages posted
    pub posted_messages: AtomicU64,

    /// Total messages handed to the actor
    pub received_messages: AtomicU64,

    /// Total messages dropped due to a full mailbox
    pub dropped_messages: AtomicU64,

    /// Number of times the mailbox went idle
    pub empty_cycles: AtomicU64,

    /// Posted minus received, sampled on every post/receive
    pub queue_depth: AtomicUsize,
}

impl MailboxMetrics {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn posted(&self) -> u64 {
        self.posted_messages.load(Ordering::Relaxed)
    }

    pub fn received(&self) -> u64 {
        self.received_messages.load(Ordering::Relaxed)
    }

    pub fn dropped(&self) -> u64 {
        self.dropped_messages.load(Ordering::Relaxed)
    }

    pub fn empty_cycles(&self) -> u64 {
        self.empty_cycles.load(Ordering::Relaxed)
    }

    pub fn depth(&self) -> usize {
        self.queue_depth.load(Ordering::Relaxed)
    }

    /// Get the drop rate (dropped / posted)
    pub fn drop_rate(&self) -> f64 {
        let posted = self.posted();
        if posted == 0 {
            0.0
        } else {
            self.dropped() as f64 / posted as f64
        }
    }

    fn update_depth(&self) {
        let posted = self.posted();
        let consumed = self.received() + self.dropped();
        self.queue_depth
            .store(posted.saturating_sub(consumed) as usize, Ordering::Relaxed);
    }
}

impl MailboxStatistics for MailboxMetrics {
    fn message_posted(&self, _message: &Message) {
        self.posted_messages.fetch_add(1, Ordering::Relaxed);
        self.update_depth();
    }

    fn message_received(&self, _message: &Message) {
        self.received_messages.fetch_add(1, Ordering::Relaxed);
        self.update_depth();
    }

    fn message_dropped(&self, _message: &Message) {
        self.dropped_messages.fetch_add(1, Ordering::Relaxed);
        self.update_depth();
    }

    fn mailbox_empty(&self) {
        self.empty_cycles.fetch_add(1, Ordering::Relaxed);
    }
}
