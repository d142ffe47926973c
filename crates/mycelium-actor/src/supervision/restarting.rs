use super::{log_failure, Directive, RestartStatistics, Supervisor, SupervisorStrategy};
use crate::message::{FailureReason, Message};
use crate::pid::Pid;
use crate::system::ActorSystem;

/// Restarts the failing child on every failure, without a budget
#[derive(Debug, Clone, Copy, Default)]
pub struct RestartingStrategy;

impl RestartingStrategy {
    pub fn new() -> Self {
        Self
    }
}

impl SupervisorStrategy for RestartingStrategy {
    fn handle_failure(
        &self,
        system: &ActorSystem,
        supervisor: &dyn Supervisor,
        child: &Pid,
        _restart_stats: &RestartStatistics,
        reason: FailureReason,
        _message: Option<Message>,
    ) {
        log_failure(system, child, &reason, Directive::Restart);
        supervisor.restart_children(std::slice::from_ref(child));
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supervision::test_support::{reason, RecordingSupervisor};

    #[tokio::test]
    async fn test_always_restarts() {
        let system = ActorSystem::new().unwrap();
        let supervisor = RecordingSupervisor::default();
        let child = Pid::new("nonhost", "child");
        let stats = RestartStatistics::new();

        for _ in 0..100 {
            RestartingStrategy.handle_failure(&system, &supervisor, &child, &stats, reason(), None);
        }
        assert_eq!(supervisor.restarted.lock().len(), 100);
        assert!(supervisor.stopped.lock().is_empty());
    }
}
