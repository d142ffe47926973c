//! The actor trait

use crate::context::Context;
use crate::supervision::SupervisorStrategy;
use std::any::Any;
use std::sync::Arc;

/// Upcast helper so continuations can recover the concrete actor type
pub trait AsAny: Any {
    fn as_any_mut(&mut self) -> &mut dyn Any;
}

impl<T: Any> AsAny for T {
    fn as_any_mut(&mut self) -> &mut dyn Any {
        self
    }
}

/// A unit of computation driven by its mailbox.
///
/// `receive` is called once per message, never concurrently. Lifecycle
/// messages ([`Message::Started`], [`Message::Stopping`], ...) arrive through
/// the same method. Returning `Err` (or panicking) reports a failure to the
/// supervisor.
///
/// # Example
///
/// ```rust,ignore
/// struct Counter(u64);
///
/// impl Actor for Counter {
///     fn receive(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
///         if ctx.message_as::<Increment>().is_some() {
///             self.0 += 1;
///             ctx.respond(self.0);
///         }
///         Ok(())
///     }
/// }
/// ```
///
/// [`Message::Started`]: crate::message::Message::Started
/// [`Message::Stopping`]: crate::message::Message::Stopping
pub trait Actor: AsAny + Send + 'static {
    fn receive(&mut self, ctx: &mut Context) -> anyhow::Result<()>;

    /// Strategy for this actor's children; overrides the one in its props
    fn supervisor_strategy(&self) -> Option<Arc<dyn SupervisorStrategy>> {
        None
    }
}

pub(crate) type ReceiveFn = dyn Fn(&mut Context) -> anyhow::Result<()> + Send + Sync;

/// Actor backed by a shared closure
pub struct FnActor {
    receive: Arc<ReceiveFn>,
}

impl FnActor {
    pub(crate) fn new(receive: Arc<ReceiveFn>) -> Self {
        Self { receive }
    }
}

impl Actor for FnActor {
    fn receive(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
        (self.receive)(ctx)
    }
}
