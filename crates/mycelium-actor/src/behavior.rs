//! Swappable receive functions
//!
//! A [`Behavior`] is a stack of receive functions owned by an actor. The top
//! of the stack handles each message:
//!
//! - [`Behavior::set`] (become) replaces the whole stack
//! - [`Behavior::become_stacked`] pushes on top of the current one
//! - [`Behavior::unbecome_stacked`] pops back to the previous one
//!
//! # Example
//!
//! ```rust,ignore
//! struct Light {
//!     behavior: Behavior<Light>,
//! }
//!
//! impl Actor for Light {
//!     fn receive(&mut self, ctx: &mut Context) -> anyhow::Result<()> {
//!         Behavior::dispatch(self, ctx, |light| &light.behavior)
//!     }
//! }
//! ```

use crate::context::Context;
use crate::error::ActorError;
use std::sync::Arc;

/// A receive function operating on actor state `A`
pub type BehaviorFn<A> = Arc<dyn Fn(&mut A, &mut Context) -> anyhow::Result<()> + Send + Sync>;

pub struct Behavior<A> {
    stack: Vec<BehaviorFn<A>>,
}

impl<A> Behavior<A> {
    pub fn new() -> Self {
        Self { stack: Vec::new() }
    }

    /// Stack with a single initial receive function
    pub fn with_receive<F>(receive: F) -> Self
    where
        F: Fn(&mut A, &mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        let mut behavior = Self::new();
        behavior.set(receive);
        behavior
    }

    /// Replace the whole stack with `receive`
    pub fn set<F>(&mut self, receive: F)
    where
        F: Fn(&mut A, &mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.set_fn(Arc::new(receive));
    }

    pub fn set_fn(&mut self, receive: BehaviorFn<A>) {
        self.stack.clear();
        self.stack.push(receive);
    }

    /// Push `receive` over the current behavior
    pub fn become_stacked<F>(&mut self, receive: F)
    where
        F: Fn(&mut A, &mut Context) -> anyhow::Result<()> + Send + Sync + 'static,
    {
        self.push_fn(Arc::new(receive));
    }

    pub fn push_fn(&mut self, receive: BehaviorFn<A>) {
        self.stack.push(receive);
    }

    /// Pop the current behavior, returning it.
    ///
    /// Popping an empty stack is a programming error; it is logged and
    /// reported as [`ActorError::EmptyBehavior`].
    pub fn unbecome_stacked(&mut self) -> Result<BehaviorFn<A>, ActorError> {
        self.stack.pop().ok_or_else(|| {
            tracing::error!("unbecome_stacked called on an empty behavior stack");
            ActorError::EmptyBehavior
        })
    }

    /// Alias of [`Behavior::unbecome_stacked`]
    pub fn pop_behavior(&mut self) -> Result<BehaviorFn<A>, ActorError> {
        self.unbecome_stacked()
    }

    /// Alias of [`Behavior::push_fn`]
    pub fn push_behavior(&mut self, receive: BehaviorFn<A>) {
        self.push_fn(receive);
    }

    /// Alias of [`Behavior::set_fn`]
    pub fn set_behavior(&mut self, receive: BehaviorFn<A>) {
        self.set_fn(receive);
    }

    /// The active receive function
    pub fn current(&self) -> Option<BehaviorFn<A>> {
        self.stack.last().cloned()
    }

    pub fn len(&self) -> usize {
        self.stack.len()
    }

    pub fn is_empty(&self) -> bool {
        self.stack.is_empty()
    }

    /// Run the active receive function against `actor`.
    ///
    /// With an empty stack the message is dropped and an error is logged; the
    /// actor keeps running.
    pub fn dispatch<G>(actor: &mut A, ctx: &mut Context, behavior: G) -> anyhow::Result<()>
    where
        G: Fn(&A) -> &Behavior<A>,
    {
        match behavior(actor).current() {
            Some(receive) => receive(actor, ctx),
            None => {
                tracing::error!(
                    pid = %ctx.self_pid(),
                    message = ctx.message().map(|m| m.type_name()).unwrap_or("none"),
                    "Behavior stack is empty, message dropped"
                );
                Ok(())
            }
        }
    }
}

impl<A> Default for Behavior<A> {
    fn default() -> Self {
        Self::new()
    }
}

impl<A> Clone for Behavior<A> {
    fn clone(&self) -> Self {
        Self {
            stack: self.stack.clone(),
        }
    }
}
