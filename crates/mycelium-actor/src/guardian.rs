//! Guardians: supervisors for root actors
//!
//! A root actor spawned with [`Props::with_guardian`] gets a guardian as its
//! parent. Guardians are plain processes (no mailbox, no actor), one per
//! distinct strategy instance, created lazily and never stopped.
//!
//! [`Props::with_guardian`]: crate::props::Props::with_guardian

use crate::message::{Failure, FailureReason, Message, MessageEnvelope, SystemMessage};
use crate::pid::Pid;
use crate::process::Process;
use crate::supervision::{Supervisor, SupervisorStrategy};
use crate::system::{ActorSystem, WeakActorSystem};
use dashmap::DashMap;
use std::sync::Arc;

#[derive(Default)]
pub(crate) struct Guardians {
    by_strategy: DashMap<usize, Pid>,
}

impl Guardians {
    /// Guardian for `strategy`, keyed by the strategy's allocation
    pub(crate) fn pid_for(&self, system: &ActorSystem, strategy: &Arc<dyn SupervisorStrategy>) -> Pid {
        let key = Arc::as_ptr(strategy) as *const () as usize;
        self.by_strategy
            .entry(key)
            .or_insert_with(|| {
                let id = format!("guardian{}", system.registry().next_id());
                let process = Arc::new(GuardianProcess {
                    strategy: strategy.clone(),
                    system: system.downgrade(),
                });
                let (pid, _) = system.registry().add(process, &id);
                tracing::debug!(guardian = %pid, "Guardian created");
                pid
            })
            .clone()
    }

    pub(crate) fn len(&self) -> usize {
        self.by_strategy.len()
    }
}

struct GuardianProcess {
    strategy: Arc<dyn SupervisorStrategy>,
    system: WeakActorSystem,
}

impl Process for GuardianProcess {
    fn send_user_message(&self, pid: &Pid, envelope: MessageEnvelope) {
        tracing::warn!(
            guardian = %pid,
            message = envelope.message.type_name(),
            "Guardian received a user message, dropped"
        );
    }

    fn send_system_message(&self, pid: &Pid, message: SystemMessage) {
        let Some(system) = self.system.upgrade() else {
            return;
        };

        match message {
            SystemMessage::Failure(Failure {
                who,
                reason,
                restart_stats,
                message,
            }) => {
                let supervisor = GuardianSupervisor {
                    system: system.clone(),
                    child: who.clone(),
                };
                self.strategy
                    .handle_failure(&system, &supervisor, &who, &restart_stats, reason, message);
            }
            other => {
                tracing::debug!(
                    guardian = %pid,
                    message = other.type_name(),
                    "Guardian ignored system message"
                );
            }
        }
    }

    fn stop(&self, _pid: &Pid) {}
}

/// Supervisor view handed to the strategy for one failing root actor
struct GuardianSupervisor {
    system: ActorSystem,
    child: Pid,
}

impl Supervisor for GuardianSupervisor {
    fn children(&self) -> Vec<Pid> {
        Vec::new()
    }

    fn escalate_failure(&self, reason: FailureReason, _message: Option<Message>) {
        tracing::error!(
            child = %self.child,
            reason = %reason,
            "Guardian cannot escalate, stopping actor"
        );
        self.system.stop(&self.child);
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
