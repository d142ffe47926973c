//! Per-actor execution context
//!
//! A [`Context`] is handed to [`Actor::receive`] for every message. It
//! exposes the current message and the actor's side effects: sending,
//! spawning children, watching, stashing, and receive timeouts.
//!
//! Internally the context also owns the lifecycle state machine
//! (see `cell.rs`):
//!
//! ```text
//! None ─► Alive ─┬─► Restarting ─► (children gone) ─► Alive
//!                └─► Stopping ───► (children gone) ─► Stopped
//! ```
//!
//! [`Actor::receive`]: crate::actor::Actor::receive

mod cell;
mod receive_timeout;

pub(crate) use cell::ActorCell;

use crate::actor::Actor;
use crate::error::{ActorError, SpawnError};
use crate::future::{Future, FutureResult};
use crate::message::{
    Continuation, Failure, FailureReason, Message, MessageEnvelope, MessageHeader, SystemMessage,
};
use crate::middleware::SendNext;
use crate::pid::{Pid, PidSet};
use crate::props::Props;
use crate::supervision::{RestartStatistics, Supervisor};
use crate::system::ActorSystem;
use receive_timeout::ReceiveTimeoutTimer;
use std::any::Any;
use std::collections::VecDeque;
use std::time::Duration;

/// Lifecycle state of an actor
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum ContextState {
    None,
    Alive,
    Restarting,
    Stopping,
    Stopped,
}

pub struct Context {
    system: ActorSystem,
    props: Props,
    parent: Option<Pid>,
    self_pid: Pid,
    envelope: Option<MessageEnvelope>,
    state: ContextState,
    children: PidSet,
    watchers: PidSet,
    watching: PidSet,
    receive_timeout: ReceiveTimeoutTimer,
    restart_stats: RestartStatistics,
    stash: VecDeque<MessageEnvelope>,
}

impl Context {
    pub(crate) fn new(system: ActorSystem, props: Props, parent: Option<Pid>, self_pid: Pid) -> Self {
        Self {
            system,
            props,
            parent,
            self_pid,
            envelope: None,
            state: ContextState::None,
            children: PidSet::new(),
            watchers: PidSet::new(),
            watching: PidSet::new(),
            receive_timeout: ReceiveTimeoutTimer::default(),
            restart_stats: RestartStatistics::new(),
            stash: VecDeque::new(),
        }
    }

    pub fn system(&self) -> &ActorSystem {
        &self.system
    }

    pub fn self_pid(&self) -> &Pid {
        &self.self_pid
    }

    pub fn parent(&self) -> Option<&Pid> {
        self.parent.as_ref()
    }

    pub fn props(&self) -> &Props {
        &self.props
    }

    pub fn state(&self) -> ContextState {
        self.state
    }

    pub fn children(&self) -> Vec<Pid> {
        self.children.to_vec()
    }

    pub fn is_watching(&self, pid: &Pid) -> bool {
        self.watching.contains(pid)
    }

    pub fn watchers(&self) -> Vec<Pid> {
        self.watchers.to_vec()
    }

    pub fn restart_stats(&self) -> &RestartStatistics {
        &self.restart_stats
    }

    // ===== Current message =====

    pub fn envelope(&self) -> Option<&MessageEnvelope> {
        self.envelope.as_ref()
    }

    pub fn message(&self) -> Option<&Message> {
        self.envelope.as_ref().map(|e| &e.message)
    }

    /// The current user message, if it is a `T`
    pub fn message_as<T: Any>(&self) -> Option<&T> {
        self.message()?.downcast_ref::<T>()
    }

    pub fn sender(&self) -> Option<&Pid> {
        self.envelope.as_ref()?.sender.as_ref()
    }

    pub fn header(&self) -> Option<&MessageHeader> {
        self.envelope.as_ref().map(|e| &e.header)
    }

    // ===== Sending =====

    /// Fire-and-forget
    pub fn send<M: Any + Send + Sync>(&self, pid: &Pid, message: M) {
        self.send_user_message(pid, MessageEnvelope::new(Message::from_any(message)));
    }

    /// Send with this actor as the sender, so the target can respond
    pub fn request<M: Any + Send + Sync>(&self, pid: &Pid, message: M) {
        self.request_with_sender(pid, message, &self.self_pid);
    }

    pub fn request_with_sender<M: Any + Send + Sync>(&self, pid: &Pid, message: M, sender: &Pid) {
        let envelope =
            MessageEnvelope::new(Message::from_any(message)).with_sender(Some(sender.clone()));
        self.send_user_message(pid, envelope);
    }

    /// Send a request whose response resolves the returned future
    pub fn request_future<M: Any + Send + Sync>(
        &self,
        pid: &Pid,
        message: M,
        timeout: Duration,
    ) -> Future {
        let future = Future::new(&self.system, Some(timeout));
        self.request_with_sender(pid, message, future.pid());
        future
    }

    /// Reply to the sender of the current message.
    ///
    /// Without a sender the reply goes to dead letters.
    pub fn respond<M: Any + Send + Sync>(&self, message: M) {
        let envelope = MessageEnvelope::new(Message::from_any(message));
        match self.sender() {
            Some(sender) => self.send_user_message(sender, envelope),
            None => self.system.dead_letter_process().deliver(None, envelope),
        }
    }

    /// Re-send the current user message to `pid`, keeping its sender and header
    pub fn forward(&self, pid: &Pid) -> Result<(), ActorError> {
        let envelope = self.envelope.as_ref().ok_or(ActorError::NoCurrentMessage)?;
        if !envelope.message.is_user() {
            tracing::error!(
                pid = %self.self_pid,
                message = envelope.message.type_name(),
                "Lifecycle messages cannot be forwarded"
            );
            return Err(ActorError::ForwardNotAllowed(envelope.message.type_name()));
        }
        self.send_user_message(pid, envelope.clone());
        Ok(())
    }

    /// Every user message sent from this context passes the sender middleware
    fn send_user_message(&self, pid: &Pid, envelope: MessageEnvelope) {
        let chain = self.props.sender_middleware();
        if chain.is_empty() {
            self.system.send_user_message(pid, envelope);
        } else {
            SendNext::new(chain).run(self, pid, envelope);
        }
    }

    // ===== Stash =====

    /// Keep the current message for replay after the next restart
    pub fn stash(&mut self) {
        if let Some(envelope) = self.envelope.clone() {
            self.stash.push_back(envelope);
        }
    }

    pub fn stash_len(&self) -> usize {
        self.stash.len()
    }

    // ===== Watching =====

    /// Receive `Terminated` when `pid` stops
    pub fn watch(&mut self, pid: &Pid) {
        self.system.send_system_message(
            pid,
            SystemMessage::Watch {
                watcher: self.self_pid.clone(),
            },
        );
        self.watching.add(pid.clone());
    }

    pub fn unwatch(&mut self, pid: &Pid) {
        self.system.send_system_message(
            pid,
            SystemMessage::Unwatch {
                watcher: self.self_pid.clone(),
            },
        );
        self.watching.remove(pid);
    }

    // ===== Receive timeout =====

    /// Deliver [`Message::ReceiveTimeout`] once if no influencing message
    /// arrives within `duration`.
    ///
    /// The timer is one-shot: it is cleared when it fires, and handlers
    /// re-arm it if they want another. Durations under a millisecond
    /// cancel the timeout.
    pub fn set_receive_timeout(&mut self, duration: Duration) {
        if duration < Duration::from_millis(1) {
            self.cancel_receive_timeout();
            return;
        }
        if self.receive_timeout.duration() == Some(duration) {
            return;
        }
        self.receive_timeout.set_duration(Some(duration));
        self.receive_timeout.arm(&self.system, &self.self_pid);
    }

    pub fn cancel_receive_timeout(&mut self) {
        self.receive_timeout.set_duration(None);
        self.receive_timeout.stop();
    }

    pub fn receive_timeout(&self) -> Option<Duration> {
        self.receive_timeout.duration()
    }

    // ===== Children =====

    /// Spawn a child with a generated name
    pub fn spawn(&mut self, props: &Props) -> Result<Pid, SpawnError> {
        let name = self.system.registry().next_id();
        self.spawn_named(props, &name)
    }

    pub fn spawn_prefix(&mut self, props: &Props, prefix: &str) -> Result<Pid, SpawnError> {
        let name = format!("{prefix}{}", self.system.registry().next_id());
        self.spawn_named(props, &name)
    }

    /// Spawn a child whose id is `<parent id>/<name>`
    pub fn spawn_named(&mut self, props: &Props, name: &str) -> Result<Pid, SpawnError> {
        if props.guardian_strategy().is_some() {
            return Err(SpawnError::GuardianOnChild);
        }

        let id = format!("{}/{}", self.self_pid.id(), name);
        let pid = props.spawn(&self.system, &id, Some(self.self_pid.clone()))?;
        self.children.add(pid.clone());
        Ok(pid)
    }

    // ===== Stopping =====

    /// Stop `pid` immediately, after the message it is processing
    pub fn stop(&self, pid: &Pid) {
        self.system.stop(pid);
    }

    /// Stop `pid` and return a future resolved once it has terminated
    pub fn stop_future(&self, pid: &Pid) -> Future {
        self.system.stop_future(pid)
    }

    /// Stop `pid` after the messages already in its mailbox
    pub fn poison(&self, pid: &Pid) {
        self.system.poison(pid);
    }

    pub fn poison_future(&self, pid: &Pid) -> Future {
        self.system.poison_future(pid)
    }

    // ===== Reentrancy =====

    /// Continue inside this actor once `future` resolves.
    ///
    /// The continuation runs as a system message on this actor, with the
    /// current message restored, so it never races with `receive`.
    pub fn reenter_after<A, F>(&self, future: &Future, continuation: F)
    where
        A: Actor,
        F: FnOnce(&mut A, &mut Context, FutureResult) -> anyhow::Result<()> + Send + 'static,
    {
        let message = self.envelope.clone();
        let system = self.system.clone();
        let target = self.self_pid.clone();

        future.continue_with(move |result| {
            let result = result.clone();
            let callback = Box::new(move |actor: &mut dyn Actor, ctx: &mut Context| {
                match actor.as_any_mut().downcast_mut::<A>() {
                    Some(actor) => continuation(actor, ctx, result),
                    None => {
                        tracing::error!(
                            pid = %ctx.self_pid,
                            expected = std::any::type_name::<A>(),
                            "Continuation actor type mismatch, dropped"
                        );
                        Ok(())
                    }
                }
            });
            system.send_system_message(
                &target,
                SystemMessage::Continuation(Continuation::new(message, callback)),
            );
        });
    }

    // ===== Failure reporting =====

    fn report_failure(&self, reason: FailureReason, message: Option<Message>) {
        let failure = Failure {
            who: self.self_pid.clone(),
            reason,
            restart_stats: self.restart_stats.clone(),
            message,
        };

        self.system
            .send_system_message(&self.self_pid, SystemMessage::SuspendMailbox);

        match &self.parent {
            Some(parent) => self
                .system
                .send_system_message(parent, SystemMessage::Failure(failure)),
            None => self.handle_root_failure(failure),
        }
    }

    /// Root actors without a guardian supervise themselves with the default
    /// strategy
    fn handle_root_failure(&self, failure: Failure) {
        let Failure {
            who,
            reason,
            restart_stats,
            message,
        } = failure;
        self.system.default_strategy().handle_failure(
            &self.system,
            self,
            &who,
            &restart_stats,
            reason,
            message,
        );
    }
}

impl Supervisor for Context {
    fn children(&self) -> Vec<Pid> {
        self.children.to_vec()
    }

    fn escalate_failure(&self, reason: FailureReason, message: Option<Message>) {
        self.report_failure(reason, message);
    }

    fn restart_children(&self, pids: &[Pid]) {
        for pid in pids {
            self.system.send_system_message(pid, SystemMessage::Restart);
        }
    }

    fn stop_children(&self, pids: &[Pid]) {
        for pid in pids {
            self.system.stop(pid);
        }
    }

    fn resume_children(&self, pids: &[Pid]) {
        for pid in pids {
            self.system
                .send_system_message(pid, SystemMessage::ResumeMailbox);
        }
    }
}

impl std::fmt::Debug for Context {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Context")
            .field("self_pid", &self.self_pid)
            .field("parent", &self.parent)
            .field("state", &self.state)
            .field("children", &self.children.len())
            .finish()
    }
}
