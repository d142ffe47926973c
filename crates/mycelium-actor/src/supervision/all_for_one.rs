use super::{
    default_decider, log_failure, restart_budget_exhausted, Decider, Directive,
    RestartStatistics, Supervisor, SupervisorStrategy,
};
use crate::message::{FailureReason, Message};
use crate::pid::Pid;
use crate::system::ActorSystem;
use std::time::Duration;

/// Like [`OneForOneStrategy`](super::OneForOneStrategy), but a restart or
/// stop is applied to every child of the supervisor.
///
/// Use when siblings share state that one failure invalidates.
pub struct AllForOneStrategy {
    max_retries: usize,
    within: Duration,
    decider: Decider,
}

impl AllForOneStrategy {
    pub fn new(max_retries: usize, within: Duration, decider: Decider) -> Self {
        Self {
            max_retries,
            within,
            decider,
        }
    }

    pub fn with_retries(max_retries: usize, within: Duration) -> Self {
        Self::new(max_retries, within, default_decider())
    }
}

/// Supervisor's children, including the failing one even when the
/// supervisor does not track it (guardians)
fn siblings(supervisor: &dyn Supervisor, child: &Pid) -> Vec<Pid> {
    let mut children = supervisor.children();
    if !children.contains(child) {
        children.push(child.clone());
    }
    children
}

impl SupervisorStrategy for AllForOneStrategy {
    fn handle_failure(
        &self,
        system: &ActorSystem,
        supervisor: &dyn Supervisor,
        child: &Pid,
        restart_stats: &RestartStatistics,
        reason: FailureReason,
        message: Option<Message>,
    ) {
        match (self.decider)(&reason) {
            Directive::Resume => {
                log_failure(system, child, &reason, Directive::Resume);
                supervisor.resume_children(std::slice::from_ref(child));
            }
            Directive::Restart => {
                let children = siblings(supervisor, child);
                if restart_budget_exhausted(self.max_retries, self.within, restart_stats) {
                    log_failure(system, child, &reason, Directive::Stop);
                    supervisor.stop_children(&children);
                } else {
                    log_failure(system, child, &reason, Directive::Restart);
                    supervisor.restart_children(&children);
                }
            }
            Directive::Stop => {
                log_failure(system, child, &reason, Directive::Stop);
                supervisor.stop_children(&siblings(supervisor, child));
            }
            Directive::Escalate => supervisor.escalate_failure(reason, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervision::test_support::{reason, RecordingSupervisor};

    #[tokio::test]
    async fn test_restart_applies_to_all_children() {
        let system = ActorSystem::new().unwrap();
        let a = Pid::new("nonhost", "parent/a");
        let b = Pid::new("nonhost", "parent/b");
        let supervisor = RecordingSupervisor {
            children: vec![a.clone(), b.clone()],
            ..Default::default()
        };
        let strategy = AllForOneStrategy::with_retries(1, Duration::ZERO);
        let stats = RestartStatistics::new();

        strategy.handle_failure(&system, &supervisor, &a, &stats, reason(), None);
        assert_eq!(supervisor.restarted.lock().as_slice(), [a.clone(), b.clone()]);

        strategy.handle_failure(&system, &supervisor, &a, &stats, reason(), None);
        assert_eq!(supervisor.stopped.lock().as_slice(), [a, b]);
    }

    #[tokio::test]
    async fn test_includes_untracked_failing_child() {
        let system = ActorSystem::new().unwrap();
        let supervisor = RecordingSupervisor::default();
        let child = Pid::new("nonhost", "root");
        let strategy = AllForOneStrategy::with_retries(5, Duration::ZERO);

        strategy.handle_failure(
            &system,
            &supervisor,
            &child,
            &RestartStatistics::new(),
            reason(),
            None,
        );
        assert_eq!(supervisor.restarted.lock().as_slice(), [child]);
    }
}
