//! Receive and send interception
//!
//! Middleware registered on [`Props`](crate::props::Props) wraps every
//! delivery into the actor and every user message the actor sends. Each
//! middleware gets the rest of the chain as a `next` handle and decides
//! whether (and with what envelope) to continue. The first registered
//! middleware is the outermost.
//!
//! ```rust,ignore
//! let props = Props::from_producer(Worker::default).with_receiver_middleware(
//!     |ctx: &mut Context, next: ReceiveNext<'_>| {
//!         tracing::trace!(message = ?ctx.message(), "receive");
//!         next.run(ctx)
//!     },
//! );
//! ```

use crate::actor::Actor;
use crate::context::Context;
use crate::message::MessageEnvelope;
use crate::pid::Pid;
use std::sync::Arc;

/// Wraps [`Actor::receive`]; the current message is readable from the context
pub type ReceiverMiddleware =
    Arc<dyn Fn(&mut Context, ReceiveNext<'_>) -> anyhow::Result<()> + Send + Sync>;

/// Wraps user messages sent from an actor's context
pub type SenderMiddleware =
    Arc<dyn Fn(&Context, &Pid, MessageEnvelope, SendNext<'_>) + Send + Sync>;

/// Runs once per spawn with the new actor's context, before `Started`
pub type InitHook = Arc<dyn Fn(&mut Context) + Send + Sync>;

/// The remainder of a receive chain
pub struct ReceiveNext<'a> {
    actor: &'a mut dyn Actor,
    rest: &'a [ReceiverMiddleware],
}

impl<'a> ReceiveNext<'a> {
    pub(crate) fn new(actor: &'a mut dyn Actor, chain: &'a [ReceiverMiddleware]) -> Self {
        Self { actor, rest: chain }
    }

    /// Hand the current message to the next middleware, or to the actor
    pub fn run(self, ctx: &mut Context) -> anyhow::Result<()> {
        match self.rest.split_first() {
            Some((middleware, rest)) => middleware(
                ctx,
                ReceiveNext {
                    actor: self.actor,
                    rest,
                },
            ),
            None => self.actor.receive(ctx),
        }
    }
}

/// The remainder of a send chain
pub struct SendNext<'a> {
    rest: &'a [SenderMiddleware],
}

impl<'a> SendNext<'a> {
    pub(crate) fn new(chain: &'a [SenderMiddleware]) -> Self {
        Self { rest: chain }
    }

    /// Pass the envelope to the next middleware, or deliver it to `target`
    pub fn run(self, ctx: &Context, target: &Pid, envelope: MessageEnvelope) {
        match self.rest.split_first() {
            Some((middleware, rest)) => middleware(ctx, target, envelope, SendNext { rest }),
            None => ctx.system().send_user_message(target, envelope),
        }
    }
}
