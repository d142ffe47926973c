//! User-message queues backing a mailbox

use crate::message::{MessageEnvelope, MAX_PRIORITY};
use crossbeam::queue::{ArrayQueue, SegQueue};

/// What a bounded queue does when it is full
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the oldest queued message (ring buffer behavior)
    #[default]
    DropOldest,

    /// Discard the incoming message
    DropNewest,
}

/// Queue for user messages.
///
/// `push` returns the envelope that was discarded to make room, if any.
pub trait MailboxQueue: Send + Sync {
    fn push(&self, envelope: MessageEnvelope) -> Option<MessageEnvelope>;

    fn pop(&self) -> Option<MessageEnvelope>;

    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Lock-free unbounded FIFO
#[derive(Default)]
pub struct UnboundedQueue {
    queue: SegQueue<MessageEnvelope>,
}

impl UnboundedQueue {
    pub fn new() -> Self {
        Self::default()
    }
}

impl MailboxQueue for UnboundedQueue {
    fn push(&self, envelope: MessageEnvelope) -> Option<MessageEnvelope> {
        self.queue.push(envelope);
        None
    }

    fn pop(&self) -> Option<MessageEnvelope> {
        self.queue.pop()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

/// Fixed-capacity ring buffer
pub struct BoundedQueue {
    queue: ArrayQueue<MessageEnvelope>,
    policy: OverflowPolicy,
}

impl BoundedQueue {
    /// Capacity is clamped to at least one slot
    pub fn new(capacity: usize, policy: OverflowPolicy) -> Self {
        Self {
            queue: ArrayQueue::new(capacity.max(1)),
            policy,
        }
    }

    pub fn capacity(&self) -> usize {
        self.queue.capacity()
    }
}

impl MailboxQueue for BoundedQueue {
    fn push(&self, envelope: MessageEnvelope) -> Option<MessageEnvelope> {
        match self.policy {
            OverflowPolicy::DropOldest => self.queue.force_push(envelope),
            OverflowPolicy::DropNewest => self.queue.push(envelope).err(),
        }
    }

    fn pop(&self) -> Option<MessageEnvelope> {
        self.queue.pop()
    }

    fn len(&self) -> usize {
        self.queue.len()
    }
}

const PRIORITY_LEVELS: usize = MAX_PRIORITY as usize + 1;

/// Eight FIFO sub-queues drained highest priority first
pub struct PriorityQueue {
    levels: [SegQueue<MessageEnvelope>; PRIORITY_LEVELS],
}

impl PriorityQueue {
    pub fn new() -> Self {
        Self {
            levels: std::array::from_fn(|_| SegQueue::new()),
        }
    }
}

impl Default for PriorityQueue {
    fn default() -> Self {
        Self::new()
    }
}

impl MailboxQueue for PriorityQueue {
    fn push(&self, envelope: MessageEnvelope) -> Option<MessageEnvelope> {
        let level = envelope.message.priority().min(MAX_PRIORITY) as usize;
        self.levels[level].push(envelope);
        None
    }

    fn pop(&self) -> Option<MessageEnvelope> {
        self.levels.iter().rev().find_map(SegQueue::pop)
    }

    fn len(&self) -> usize {
        self.levels.iter().map(SegQueue::len).sum()
    }
}
