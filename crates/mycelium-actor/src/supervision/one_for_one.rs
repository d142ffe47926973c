use super::{
    default_decider, log_failure, restart_budget_exhausted, Decider, Directive,
    RestartStatistics, Supervisor, SupervisorStrategy,
};
use crate::message::{FailureReason, Message};
use crate::pid::Pid;
use crate::system::ActorSystem;
use std::time::Duration;

/// Applies the decided directive to the failing child only.
///
/// A restart is permitted while the child has failed at most `max_retries`
/// times inside `within` (`Duration::ZERO` means no window); past that the
/// child is stopped.
pub struct OneForOneStrategy {
    max_retries: usize,
    within: Duration,
    decider: Decider,
}

impl OneForOneStrategy {
    pub fn new(max_retries: usize, within: Duration, decider: Decider) -> Self {
        Self {
            max_retries,
            within,
            decider,
        }
    }

    /// Strategy using the restart-always decider
    pub fn with_retries(max_retries: usize, within: Duration) -> Self {
        Self::new(max_retries, within, default_decider())
    }
}

impl SupervisorStrategy for OneForOneStrategy {
    fn handle_failure(
        &self,
        system: &ActorSystem,
        supervisor: &dyn Supervisor,
        child: &Pid,
        restart_stats: &RestartStatistics,
        reason: FailureReason,
        message: Option<Message>,
    ) {
        let children = std::slice::from_ref(child);
        match (self.decider)(&reason) {
            Directive::Resume => {
                log_failure(system, child, &reason, Directive::Resume);
                supervisor.resume_children(children);
            }
            Directive::Restart => {
                if restart_budget_exhausted(self.max_retries, self.within, restart_stats) {
                    log_failure(system, child, &reason, Directive::Stop);
                    supervisor.stop_children(children);
                } else {
                    log_failure(system, child, &reason, Directive::Restart);
                    supervisor.restart_children(children);
                }
            }
            Directive::Stop => {
                log_failure(system, child, &reason, Directive::Stop);
                supervisor.stop_children(children);
            }
            Directive::Escalate => supervisor.escalate_failure(reason, message),
        }
    }
}
