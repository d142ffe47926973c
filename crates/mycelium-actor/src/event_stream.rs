//! Process-wide publish/subscribe bus
//!
//! Carries dead letters, supervision events, and anything the embedding
//! application publishes. Delivery is synchronous on the publishing thread.
//! A panicking subscriber is logged and skipped; it never reaches the
//! publisher or the other subscribers.
//!
//! # Example
//!
//! ```rust,ignore
//! let sub = system.event_stream().subscribe_to::<DeadLetterEvent, _>(|event| {
//!     println!("dead letter for {:?}", event.pid);
//! });
//! // ...
//! system.event_stream().unsubscribe(&sub);
//! ```

use crate::message::{AnyMessage, Message, MessageEnvelope, SystemMessage};
use crate::pid::Pid;
use crate::process::Process;
use parking_lot::RwLock;
use std::any::Any;
use std::fmt;
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;

type Handler = Box<dyn Fn(&AnyMessage) + Send + Sync>;
type Predicate = Box<dyn Fn(&AnyMessage) -> bool + Send + Sync>;

/// Handle to one subscriber; pass it to [`EventStream::unsubscribe`]
pub struct Subscription {
    id: u64,
    handler: Handler,
    predicate: RwLock<Option<Predicate>>,
    active: AtomicBool,
}

impl Subscription {
    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::Acquire)
    }

    /// Restrict delivery to events matching `predicate`
    pub fn with_predicate<P>(self: &Arc<Self>, predicate: P) -> Arc<Self>
    where
        P: Fn(&AnyMessage) -> bool + Send + Sync + 'static,
    {
        *self.predicate.write() = Some(Box::new(predicate));
        self.clone()
    }

    fn deliver(&self, event: &AnyMessage) {
        if !self.is_active() {
            return;
        }
        if let Some(predicate) = self.predicate.read().as_ref() {
            if !predicate(event) {
                return;
            }
        }
        (self.handler)(event);
    }
}

impl fmt::Debug for Subscription {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Subscription")
            .field("id", &self.id)
            .field("active", &self.is_active())
            .finish()
    }
}

#[derive(Default)]
pub struct EventStream {
    subscriptions: RwLock<Vec<Arc<Subscription>>>,
    next_id: AtomicU64,
}

impl EventStream {
    pub fn new() -> Self {
        Self::default()
    }

    /// Receive every published event
    pub fn subscribe<F>(&self, handler: F) -> Arc<Subscription>
    where
        F: Fn(&AnyMessage) + Send + Sync + 'static,
    {
        let subscription = Arc::new(Subscription {
            id: self.next_id.fetch_add(1, Ordering::Relaxed),
            handler: Box::new(handler),
            predicate: RwLock::new(None),
            active: AtomicBool::new(true),
        });
        self.subscriptions.write().push(subscription.clone());
        subscription
    }

    /// Receive events matching `predicate`
    pub fn subscribe_with_predicate<F, P>(&self, handler: F, predicate: P) -> Arc<Subscription>
    where
        F: Fn(&AnyMessage) + Send + Sync + 'static,
        P: Fn(&AnyMessage) -> bool + Send + Sync + 'static,
    {
        self.subscribe(handler).with_predicate(predicate)
    }

    /// Receive only events of type `T`
    pub fn subscribe_to<T, F>(&self, handler: F) -> Arc<Subscription>
    where
        T: Any,
        F: Fn(&T) + Send + Sync + 'static,
    {
        self.subscribe(move |event| {
            if let Some(event) = event.downcast_ref::<T>() {
                handler(event);
            }
        })
    }

    /// Stop delivery to `subscription`; safe to call during a publish
    pub fn unsubscribe(&self, subscription: &Subscription) {
        subscription.active.store(false, Ordering::Release);
        self.subscriptions
            .write()
            .retain(|existing| existing.id != subscription.id);
    }

    pub fn publish<T: Any + Send + Sync>(&self, event: T) {
        match Message::from_any(event) {
            Message::User(event) => self.publish_message(&event),
            other => self.publish_message(&other.into_any()),
        }
    }

    /// Deliver an already type-erased event
    pub fn publish_message(&self, event: &AnyMessage) {
        let subscriptions = self.subscriptions.read().clone();
        for subscription in subscriptions {
            let outcome = catch_unwind(AssertUnwindSafe(|| subscription.deliver(event)));
            if outcome.is_err() {
                tracing::error!(
                    subscription = subscription.id,
                    event = event.type_name(),
                    "EventStream subscriber panicked"
                );
            }
        }
    }

    pub fn len(&self) -> usize {
        self.subscriptions.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.subscriptions.read().is_empty()
    }
}

/// Exposes the event stream as a process so a PID can publish onto it
pub struct EventStreamProcess {
    stream: Arc<EventStream>,
}

impl EventStreamProcess {
    pub fn new(stream: Arc<EventStream>) -> Self {
        Self { stream }
    }
}

impl Process for EventStreamProcess {
    fn send_user_message(&self, _pid: &Pid, envelope: MessageEnvelope) {
        self.stream.publish_message(&envelope.message.into_any());
    }

    fn send_system_message(&self, _pid: &Pid, _message: SystemMessage) {}

    fn stop(&self, _pid: &Pid) {}
}
