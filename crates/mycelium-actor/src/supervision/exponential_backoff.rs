use super::{log_failure, Directive, RestartStatistics, Supervisor, SupervisorStrategy};
use crate::message::{FailureReason, Message, SystemMessage};
use crate::pid::Pid;
use crate::system::ActorSystem;
use rand::Rng;
use std::time::Duration;

const MAX_JITTER_NANOS: u64 = 500;

/// Always restarts, but delays the restart by
/// `failure_count * initial_backoff + jitter`.
///
/// The failure count starts over when the previous failure is older than
/// `backoff_window`.
#[derive(Debug, Clone, Copy)]
pub struct ExponentialBackoffStrategy {
    backoff_window: Duration,
    initial_backoff: Duration,
}

impl ExponentialBackoffStrategy {
    pub fn new(backoff_window: Duration, initial_backoff: Duration) -> Self {
        Self {
            backoff_window,
            initial_backoff,
        }
    }

    /// Delay before the restart for the given failure count, without jitter
    pub fn backoff_for(&self, failure_count: usize) -> Duration {
        let count = u32::try_from(failure_count).unwrap_or(u32::MAX);
        self.initial_backoff.saturating_mul(count)
    }

    fn record_failure(&self, restart_stats: &RestartStatistics) {
        if restart_stats.number_of_failures(self.backoff_window) == 0 {
            restart_stats.reset();
        }
        restart_stats.fail();
    }
}

impl SupervisorStrategy for ExponentialBackoffStrategy {
    fn handle_failure(
        &self,
        system: &ActorSystem,
        _supervisor: &dyn Supervisor,
        child: &Pid,
        restart_stats: &RestartStatistics,
        reason: FailureReason,
        _message: Option<Message>,
    ) {
        self.record_failure(restart_stats);

        let jitter = Duration::from_nanos(rand::thread_rng().gen_range(0..MAX_JITTER_NANOS));
        let delay = self.backoff_for(restart_stats.failure_count()) + jitter;

        log_failure(system, child, &reason, Directive::Restart);
        tracing::debug!(child = %child, ?delay, "Scheduling restart after backoff");

        // delivered straight to the child once the delay elapses
        let target = child.clone();
        let handle = system.runtime().clone();
        let system = system.clone();
        handle.spawn(async move {
            tokio::time::sleep(delay).await;
            system.send_system_message(&target, SystemMessage::Restart);
        });
    }
}
