//! Actor cell: the mailbox's invoker and the lifecycle state machine

use super::{Context, ContextState};
use crate::actor::Actor;
use crate::mailbox::MessageInvoker;
use crate::message::{
    Continuation, Failure, FailureReason, Message, MessageEnvelope, SystemMessage, Terminated,
};
use crate::middleware::ReceiveNext;
use crate::pid::Pid;
use parking_lot::Mutex;
use std::panic::{catch_unwind, AssertUnwindSafe};

/// Owns an actor instance and its context.
///
/// The mutex is only ever taken by the mailbox drain, which already runs
/// one at a time, so it is uncontended.
pub(crate) struct ActorCell {
    inner: Mutex<CellInner>,
}

struct CellInner {
    actor: Box<dyn Actor>,
    ctx: Context,
}

impl ActorCell {
    pub(crate) fn new(mut ctx: Context) -> Self {
        let actor = ctx.props.produce();
        ctx.state = ContextState::Alive;

        let hooks = ctx.props.on_init().clone();
        for hook in hooks.iter() {
            hook(&mut ctx);
        }

        Self {
            inner: Mutex::new(CellInner { actor, ctx }),
        }
    }
}

impl MessageInvoker for ActorCell {
    fn invoke_system_message(&self, message: SystemMessage) {
        self.inner.lock().invoke_system_message(message);
    }

    fn invoke_user_message(&self, envelope: MessageEnvelope) {
        self.inner.lock().invoke_user_message(envelope);
    }

    fn escalate_failure(&self, reason: FailureReason, message: Option<Message>) {
        let mut inner = self.inner.lock();
        inner.ctx.envelope = None;
        inner.fail(reason, message);
    }
}

impl CellInner {
    fn self_pid(&self) -> &Pid {
        &self.ctx.self_pid
    }

    fn invoke_system_message(&mut self, message: SystemMessage) {
        match message {
            SystemMessage::Started => {
                self.invoke_lifecycle(Message::Started);
            }
            SystemMessage::Watch { watcher } => self.handle_watch(watcher),
            SystemMessage::Unwatch { watcher } => {
                self.ctx.watchers.remove(&watcher);
            }
            SystemMessage::Stop => self.handle_stop(),
            SystemMessage::Terminated(terminated) => self.handle_terminated(terminated),
            SystemMessage::Failure(failure) => self.handle_failure(failure),
            SystemMessage::Restart => self.handle_restart(),
            SystemMessage::Continuation(continuation) => self.handle_continuation(continuation),
            SystemMessage::ReceiveTimeoutElapsed(generation) => {
                self.handle_receive_timeout(generation)
            }
            // consumed by the mailbox itself
            SystemMessage::SuspendMailbox | SystemMessage::ResumeMailbox => {}
        }
    }

    /// Returns false if the handler failed
    fn invoke_user_message(&mut self, envelope: MessageEnvelope) -> bool {
        if self.ctx.state == ContextState::Stopped {
            let pid = self.ctx.self_pid.clone();
            self.ctx
                .system
                .dead_letter_process()
                .deliver(Some(&pid), envelope);
            return true;
        }

        let influences = envelope.message.influences_receive_timeout()
            && self.ctx.receive_timeout.duration().is_some();
        if influences {
            self.ctx.receive_timeout.stop();
        }

        let succeeded = match envelope.message {
            Message::PoisonPill => {
                self.ctx.system.stop(&self.ctx.self_pid);
                true
            }
            _ => {
                let message = envelope.message.clone();
                let result = self.receive(envelope);
                self.check(result, Some(message))
            }
        };

        if influences && self.ctx.receive_timeout.duration().is_some() {
            self.ctx
                .receive_timeout
                .arm(&self.ctx.system, &self.ctx.self_pid);
        }

        succeeded
    }

    /// Run the receive chain; a panic is reported like a returned error
    fn receive(&mut self, envelope: MessageEnvelope) -> Result<(), FailureReason> {
        self.ctx.envelope = Some(envelope);
        let chain = self.ctx.props.receiver_middleware().clone();
        let actor = self.actor.as_mut();
        let ctx = &mut self.ctx;
        let outcome = catch_unwind(AssertUnwindSafe(|| ReceiveNext::new(actor, &chain).run(ctx)));
        self.ctx.envelope = None;
        flatten(outcome)
    }

    fn invoke_lifecycle(&mut self, message: Message) -> bool {
        let result = self.receive(MessageEnvelope::new(message.clone()));
        self.check(result, Some(message))
    }

    fn check(&mut self, result: Result<(), FailureReason>, message: Option<Message>) -> bool {
        match result {
            Ok(()) => true,
            Err(reason) => {
                self.fail(reason, message);
                false
            }
        }
    }

    /// Failures are only escalated while alive. During restart or stop the
    /// failure is logged and the transition carries on.
    fn fail(&mut self, reason: FailureReason, message: Option<Message>) {
        if self.ctx.state == ContextState::Alive {
            tracing::warn!(pid = %self.self_pid(), reason = %reason, "Actor failed");
            self.ctx.report_failure(reason, message);
        } else {
            tracing::error!(
                pid = %self.self_pid(),
                state = ?self.ctx.state,
                reason = %reason,
                "Actor failed while not alive, failure not escalated"
            );
        }
    }

    fn handle_watch(&mut self, watcher: Pid) {
        if self.ctx.state >= ContextState::Stopping {
            let terminated = Terminated {
                who: self.ctx.self_pid.clone(),
            };
            self.ctx
                .system
                .send_system_message(&watcher, SystemMessage::Terminated(terminated));
        } else {
            self.ctx.watchers.add(watcher);
        }
    }

    fn handle_stop(&mut self) {
        if self.ctx.state >= ContextState::Stopping {
            return;
        }

        self.ctx.state = ContextState::Stopping;
        self.invoke_lifecycle(Message::Stopping);
        self.stop_all_children();
        self.try_restart_or_terminate();
    }

    fn handle_restart(&mut self) {
        if self.ctx.state >= ContextState::Restarting {
            return;
        }

        self.ctx.state = ContextState::Restarting;
        self.invoke_lifecycle(Message::Restarting);
        self.stop_all_children();
        self.try_restart_or_terminate();
    }

    fn handle_terminated(&mut self, terminated: Terminated) {
        if self.ctx.state == ContextState::Stopped {
            return;
        }

        self.ctx.children.remove(&terminated.who);
        self.ctx.watching.remove(&terminated.who);

        self.invoke_lifecycle(Message::Terminated(terminated));
        self.try_restart_or_terminate();
    }

    fn handle_failure(&mut self, failure: Failure) {
        let strategy = self
            .actor
            .supervisor_strategy()
            .or_else(|| self.ctx.props.supervisor_strategy().cloned())
            .unwrap_or_else(|| self.ctx.system.default_strategy().clone());

        let Failure {
            who,
            reason,
            restart_stats,
            message,
        } = failure;

        strategy.handle_failure(
            &self.ctx.system,
            &self.ctx,
            &who,
            &restart_stats,
            reason,
            message,
        );
    }

    fn handle_continuation(&mut self, continuation: Continuation) {
        if self.ctx.state == ContextState::Stopped {
            tracing::debug!(pid = %self.self_pid(), "Continuation after stop dropped");
            return;
        }

        let Continuation { message, callback } = continuation;
        let failed_message = message.as_ref().map(|envelope| envelope.message.clone());

        self.ctx.envelope = message;
        let actor = self.actor.as_mut();
        let ctx = &mut self.ctx;
        let outcome = catch_unwind(AssertUnwindSafe(|| callback(actor, ctx)));
        self.ctx.envelope = None;

        self.check(flatten(outcome), failed_message);
    }

    fn handle_receive_timeout(&mut self, generation: u64) {
        if self.ctx.state != ContextState::Alive || !self.ctx.receive_timeout.is_current(generation)
        {
            return;
        }

        self.ctx.cancel_receive_timeout();
        self.ctx.system.send_user_message(
            &self.ctx.self_pid,
            MessageEnvelope::new(Message::ReceiveTimeout),
        );
    }

    fn stop_all_children(&self) {
        for child in self.ctx.children.iter() {
            self.ctx.system.stop(child);
        }
    }

    /// Finish a pending restart or stop once every child has terminated
    fn try_restart_or_terminate(&mut self) {
        if !self.ctx.children.is_empty() {
            return;
        }

        match self.ctx.state {
            ContextState::Restarting => {
                self.ctx.cancel_receive_timeout();
                self.restart();
            }
            ContextState::Stopping => {
                self.ctx.cancel_receive_timeout();
                self.finalize_stop();
            }
            _ => {}
        }
    }

    fn restart(&mut self) {
        self.actor = self.ctx.props.produce();
        self.ctx.state = ContextState::Alive;
        tracing::debug!(pid = %self.self_pid(), "Actor restarted");

        self.ctx
            .system
            .send_system_message(&self.ctx.self_pid, SystemMessage::ResumeMailbox);

        if !self.invoke_lifecycle(Message::Started) {
            return;
        }

        // replay ahead of anything still queued in the mailbox
        let mut stashed = std::mem::take(&mut self.ctx.stash).into_iter();
        for envelope in stashed.by_ref() {
            if !self.invoke_user_message(envelope) {
                break;
            }
        }
        for envelope in stashed.rev() {
            self.ctx.stash.push_front(envelope);
        }
    }

    fn finalize_stop(&mut self) {
        let system = self.ctx.system.clone();
        let self_pid = self.ctx.self_pid.clone();

        // anything still queued drains into dead letters
        system.send_system_message(&self_pid, SystemMessage::ResumeMailbox);
        system.registry().remove(&self_pid);

        self.invoke_lifecycle(Message::Stopped);

        let terminated = Terminated {
            who: self_pid.clone(),
        };
        for watcher in self.ctx.watchers.iter() {
            system.send_system_message(watcher, SystemMessage::Terminated(terminated.clone()));
        }
        if let Some(parent) = &self.ctx.parent {
            if !self.ctx.watchers.contains(parent) {
                system.send_system_message(parent, SystemMessage::Terminated(terminated));
            }
        }

        self.ctx.watchers.clear();
        self.ctx.watching.clear();
        self.ctx.stash.clear();
        self.ctx.state = ContextState::Stopped;

        tracing::debug!(pid = %self_pid, "Actor stopped");
    }
}

fn flatten(outcome: std::thread::Result<anyhow::Result<()>>) -> Result<(), FailureReason> {
    match outcome {
        Ok(result) => result.map_err(FailureReason::from),
        Err(payload) => Err(FailureReason::from_panic(payload)),
    }
}
