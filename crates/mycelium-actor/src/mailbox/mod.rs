//! Per-actor mailboxes
//!
//! A mailbox holds two queues: system messages (always drained first) and
//! user messages (drained up to the dispatcher's throughput per activation).
//! An atomic idle/running flag guarantees that exactly one drain runs at a
//! time, which is the only thing serializing an actor's execution.
//!
//! # Scheduling
//!
//! ```text
//! post ─► enqueue ─► pending += 1 ─► CAS idle→running ─┬─► dispatcher.schedule(drain)
//!                                                      └─► (already running: nothing)
//!
//! drain: run() ─► store idle ─► pending? ─► CAS idle→running ─► run() again
//! ```
//!
//! The pending re-check after going idle closes the window in which a
//! message arrives just as the drain loop is finishing.

pub mod dispatcher;
pub mod metrics;
pub mod queue;

pub use dispatcher::{Dispatcher, SynchronizedDispatcher, Task, TokioDispatcher};
pub use metrics::{MailboxMetrics, MailboxStatistics};
pub use queue::{BoundedQueue, MailboxQueue, OverflowPolicy, PriorityQueue, UnboundedQueue};

use crate::message::{FailureReason, Message, MessageEnvelope, SystemMessage};
use crossbeam::queue::SegQueue;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicI64, AtomicU8, Ordering};
use std::sync::{Arc, OnceLock, Weak};

const IDLE: u8 = 0;
const RUNNING: u8 = 1;

/// The receiving end of a mailbox, implemented by the actor cell
pub trait MessageInvoker: Send + Sync {
    fn invoke_system_message(&self, message: SystemMessage);

    fn invoke_user_message(&self, envelope: MessageEnvelope);

    /// Called when an invocation panicked
    fn escalate_failure(&self, reason: FailureReason, message: Option<Message>);
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum RunOutcome {
    Drained,
    Yielded,
    Unregistered,
}

pub struct Mailbox {
    user: Box<dyn MailboxQueue>,
    system: SegQueue<SystemMessage>,
    user_pending: AtomicI64,
    system_pending: AtomicI64,
    status: AtomicU8,
    suspended: AtomicBool,
    invoker: OnceLock<Arc<dyn MessageInvoker>>,
    dispatcher: Arc<dyn Dispatcher>,
    statistics: Vec<Arc<dyn MailboxStatistics>>,
    this: Weak<Mailbox>,
}

impl Mailbox {
    pub fn new(
        user: Box<dyn MailboxQueue>,
        dispatcher: Arc<dyn Dispatcher>,
        statistics: Vec<Arc<dyn MailboxStatistics>>,
    ) -> Arc<Self> {
        Arc::new_cyclic(|this| Self {
            user,
            system: SegQueue::new(),
            user_pending: AtomicI64::new(0),
            system_pending: AtomicI64::new(0),
            status: AtomicU8::new(IDLE),
            suspended: AtomicBool::new(false),
            invoker: OnceLock::new(),
            dispatcher,
            statistics,
            this: this.clone(),
        })
    }

    /// Attach the invoker; only the first registration takes effect
    pub fn register_invoker(&self, invoker: Arc<dyn MessageInvoker>) {
        if self.invoker.set(invoker).is_err() {
            tracing::warn!("Mailbox invoker registered twice, ignoring");
        }
    }

    /// Enqueue a system message without scheduling a drain
    pub(crate) fn prime(&self, message: SystemMessage) {
        self.system.push(message);
        self.system_pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Begin processing anything primed or posted so far
    pub fn start(&self) {
        for stats in &self.statistics {
            stats.mailbox_started();
        }
        self.schedule();
    }

    pub fn post_user_message(&self, envelope: MessageEnvelope) {
        for stats in &self.statistics {
            stats.message_posted(&envelope.message);
        }

        match self.user.push(envelope) {
            None => {
                self.user_pending.fetch_add(1, Ordering::SeqCst);
            }
            Some(dropped) => {
                tracing::warn!(
                    message = dropped.message.type_name(),
                    "Mailbox full, message dropped"
                );
                for stats in &self.statistics {
                    stats.message_dropped(&dropped.message);
                }
            }
        }

        self.schedule();
    }

    pub fn post_system_message(&self, message: SystemMessage) {
        self.system.push(message);
        self.system_pending.fetch_add(1, Ordering::SeqCst);
        self.schedule();
    }

    pub fn user_message_count(&self) -> usize {
        self.user.len()
    }

    pub fn is_suspended(&self) -> bool {
        self.suspended.load(Ordering::SeqCst)
    }

    pub fn is_idle(&self) -> bool {
        self.status.load(Ordering::SeqCst) == IDLE
    }

    fn schedule(&self) {
        if self
            .status
            .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
            .is_ok()
        {
            self.dispatch();
        }
    }

    /// Hand a drain to the dispatcher; caller must hold the running flag
    fn dispatch(&self) {
        match self.this.upgrade() {
            Some(mailbox) => self
                .dispatcher
                .schedule(Box::new(move || mailbox.process_messages())),
            None => self.status.store(IDLE, Ordering::SeqCst),
        }
    }

    fn has_more_messages(&self) -> bool {
        self.system_pending.load(Ordering::SeqCst) > 0
            || (!self.suspended.load(Ordering::SeqCst)
                && self.user_pending.load(Ordering::SeqCst) > 0)
    }

    fn process_messages(&self) {
        loop {
            match self.run() {
                RunOutcome::Yielded if self.dispatcher.runs_inline() => continue,
                RunOutcome::Yielded => {
                    // keep the running flag and continue in a fresh activation
                    self.dispatch();
                    return;
                }
                RunOutcome::Unregistered | RunOutcome::Drained => {}
            }

            self.status.store(IDLE, Ordering::SeqCst);

            // the invoker may have been registered while this drain was bailing out
            if self.invoker.get().is_none()
                || !self.has_more_messages()
                || self
                    .status
                    .compare_exchange(IDLE, RUNNING, Ordering::SeqCst, Ordering::SeqCst)
                    .is_err()
            {
                break;
            }
        }

        for stats in &self.statistics {
            stats.mailbox_empty();
        }
    }

    fn run(&self) -> RunOutcome {
        let Some(invoker) = self.invoker.get() else {
            return RunOutcome::Unregistered;
        };
        let throughput = self.dispatcher.throughput();
        let mut processed = 0;

        loop {
            if let Some(message) = self.system.pop() {
                self.system_pending.fetch_sub(1, Ordering::SeqCst);
                match message {
                    SystemMessage::SuspendMailbox => self.suspended.store(true, Ordering::SeqCst),
                    SystemMessage::ResumeMailbox => self.suspended.store(false, Ordering::SeqCst),
                    message => {
                        let outcome =
                            catch_unwind(AssertUnwindSafe(|| invoker.invoke_system_message(message)));
                        if let Err(payload) = outcome {
                            invoker.escalate_failure(FailureReason::from_panic(payload), None);
                        }
                    }
                }
                continue;
            }

            if self.suspended.load(Ordering::SeqCst) {
                return RunOutcome::Drained;
            }

            if processed >= throughput {
                return RunOutcome::Yielded;
            }

            let Some(envelope) = self.user.pop() else {
                return RunOutcome::Drained;
            };
            self.user_pending.fetch_sub(1, Ordering::SeqCst);
            processed += 1;

            let message = envelope.message.clone();
            let outcome = catch_unwind(AssertUnwindSafe(|| invoker.invoke_user_message(envelope)));
            if let Err(payload) = outcome {
                invoker.escalate_failure(FailureReason::from_panic(payload), Some(message.clone()));
            }

            for stats in &self.statistics {
                stats.message_received(&message);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use parking_lot::Mutex;
    use std::time::Duration;

    #[derive(Default)]
    struct RecordingInvoker {
        log: Mutex<Vec<String>>,
        failures: Mutex<Vec<String>>,
    }

    impl MessageInvoker for RecordingInvoker {
        fn invoke_system_message(&self, message: SystemMessage) {
            self.log.lock().push(format!("sys:{}", message.type_name()));
        }

        fn invoke_user_message(&self, envelope: MessageEnvelope) {
            if let Some(value) = envelope.message.downcast_ref::<&str>() {
                if *value == "panic" {
                    panic!("user handler panicked");
                }
                self.log.lock().push(format!("user:{value}"));
            }
        }

        fn escalate_failure(&self, reason: FailureReason, _message: Option<Message>) {
            self.failures.lock().push(reason.to_string());
        }
    }

    fn user(value: &'static str) -> MessageEnvelope {
        MessageEnvelope::new(Message::from_any(value))
    }

    fn sync_mailbox(throughput: usize) -> (Arc<Mailbox>, Arc<RecordingInvoker>) {
        let mailbox = Mailbox::new(
            Box::new(UnboundedQueue::new()),
            Arc::new(SynchronizedDispatcher::new(throughput)),
            Vec::new(),
        );
        let invoker = Arc::new(RecordingInvoker::default());
        mailbox.register_invoker(invoker.clone());
        (mailbox, invoker)
    }

    #[test]
    fn test_system_messages_first() {
        let (mailbox, invoker) = sync_mailbox(300);
        // prime without scheduling so both queues are populated before draining
        mailbox.user.push(user("a"));
        mailbox.user_pending.fetch_add(1, Ordering::SeqCst);
        mailbox.prime(SystemMessage::Started);
        mailbox.start();

        assert_eq!(invoker.log.lock().as_slice(), ["sys:Started", "user:a"]);
        assert!(mailbox.is_idle());
    }

    #[test]
    fn test_suspend_and_resume() {
        let (mailbox, invoker) = sync_mailbox(300);
        mailbox.post_system_message(SystemMessage::SuspendMailbox);
        mailbox.post_user_message(user("a"));
        mailbox.post_user_message(user("b"));
        assert!(invoker.log.lock().is_empty());
        assert!(mailbox.is_suspended());

        mailbox.post_system_message(SystemMessage::ResumeMailbox);
        assert_eq!(invoker.log.lock().as_slice(), ["user:a", "user:b"]);
    }

    #[test]
    fn test_panic_is_escalated_and_drain_continues() {
        let (mailbox, invoker) = sync_mailbox(300);
        mailbox.post_user_message(user("panic"));
        mailbox.post_user_message(user("after"));

        assert_eq!(
            invoker.failures.lock().as_slice(),
            ["panic: user handler panicked"]
        );
        assert_eq!(invoker.log.lock().as_slice(), ["user:after"]);
    }

    #[test]
    fn test_throughput_yield_keeps_order() {
        let (mailbox, invoker) = sync_mailbox(2);
        mailbox.post_system_message(SystemMessage::SuspendMailbox);
        for value in ["1", "2", "3", "4", "5"] {
            mailbox.post_user_message(user(value));
        }
        mailbox.post_system_message(SystemMessage::ResumeMailbox);

        assert_eq!(
            invoker.log.lock().as_slice(),
            ["user:1", "user:2", "user:3", "user:4", "user:5"]
        );
        assert!(mailbox.is_idle());
    }

    #[test]
    fn test_inline_yield_does_not_nest() {
        #[derive(Default)]
        struct Counting(std::sync::atomic::AtomicUsize);

        impl MessageInvoker for Counting {
            fn invoke_system_message(&self, _message: SystemMessage) {}

            fn invoke_user_message(&self, _envelope: MessageEnvelope) {
                self.0.fetch_add(1, Ordering::SeqCst);
            }

            fn escalate_failure(&self, _reason: FailureReason, _message: Option<Message>) {}
        }

        let mailbox = Mailbox::new(
            Box::new(UnboundedQueue::new()),
            Arc::new(SynchronizedDispatcher::new(1)),
            Vec::new(),
        );
        let invoker = Arc::new(Counting::default());
        mailbox.register_invoker(invoker.clone());

        // one activation per message; nesting them would exhaust the stack
        mailbox.post_system_message(SystemMessage::SuspendMailbox);
        for _ in 0..200_000 {
            mailbox.post_user_message(user("m"));
        }
        mailbox.post_system_message(SystemMessage::ResumeMailbox);

        assert_eq!(invoker.0.load(Ordering::SeqCst), 200_000);
        assert_eq!(mailbox.user_message_count(), 0);
        assert!(mailbox.is_idle());
    }

    #[test]
    fn test_bounded_overflow_counts_drop() {
        let metrics = Arc::new(MailboxMetrics::new());
        let mailbox = Mailbox::new(
            Box::new(BoundedQueue::new(2, OverflowPolicy::DropOldest)),
            Arc::new(SynchronizedDispatcher::default()),
            vec![metrics.clone()],
        );
        let invoker = Arc::new(RecordingInvoker::default());
        mailbox.register_invoker(invoker.clone());

        mailbox.post_system_message(SystemMessage::SuspendMailbox);
        for value in ["a", "b", "c"] {
            mailbox.post_user_message(user(value));
        }
        mailbox.post_system_message(SystemMessage::ResumeMailbox);

        assert_eq!(invoker.log.lock().as_slice(), ["user:b", "user:c"]);
        assert_eq!(metrics.dropped(), 1);
        assert_eq!(metrics.received(), 2);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_posts_are_serialized() {
        struct Exclusive {
            active: std::sync::atomic::AtomicBool,
            overlaps: std::sync::atomic::AtomicUsize,
            count: std::sync::atomic::AtomicUsize,
        }

        impl MessageInvoker for Exclusive {
            fn invoke_system_message(&self, _message: SystemMessage) {}

            fn invoke_user_message(&self, _envelope: MessageEnvelope) {
                if self.active.swap(true, Ordering::SeqCst) {
                    self.overlaps.fetch_add(1, Ordering::SeqCst);
                }
                std::hint::spin_loop();
                self.count.fetch_add(1, Ordering::SeqCst);
                self.active.store(false, Ordering::SeqCst);
            }

            fn escalate_failure(&self, _reason: FailureReason, _message: Option<Message>) {}
        }

        let mailbox = Mailbox::new(
            Box::new(UnboundedQueue::new()),
            Arc::new(TokioDispatcher::new(tokio::runtime::Handle::current(), 10)),
            Vec::new(),
        );
        let invoker = Arc::new(Exclusive {
            active: AtomicBool::new(false),
            overlaps: Default::default(),
            count: Default::default(),
        });
        mailbox.register_invoker(invoker.clone());

        let mut senders = Vec::new();
        for _ in 0..8 {
            let mailbox = mailbox.clone();
            senders.push(tokio::spawn(async move {
                for _ in 0..500 {
                    mailbox.post_user_message(user("m"));
                }
            }));
        }
        for sender in senders {
            sender.await.unwrap();
        }

        for _ in 0..200 {
            if invoker.count.load(Ordering::SeqCst) == 4000 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert_eq!(invoker.count.load(Ordering::SeqCst), 4000);
        assert_eq!(invoker.overlaps.load(Ordering::SeqCst), 0);
    }
}
