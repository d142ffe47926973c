//! Supervision
//!
//! When an actor fails it suspends its own mailbox and reports a
//! [`Failure`](crate::message::Failure) to its parent. The parent's
//! [`SupervisorStrategy`] turns that into a [`Directive`] and applies it
//! through the [`Supervisor`] interface.
//!
//! Strategies:
//! - [`OneForOneStrategy`]: directive applies to the failing child only
//! - [`AllForOneStrategy`]: restart/stop applies to every child
//! - [`RestartingStrategy`]: always restart, no budget
//! - [`ExponentialBackoffStrategy`]: restart after a growing delay

mod all_for_one;
mod exponential_backoff;
mod one_for_one;
mod restart_stats;
mod restarting;

pub use all_for_one::AllForOneStrategy;
pub use exponential_backoff::ExponentialBackoffStrategy;
pub use one_for_one::OneForOneStrategy;
pub use restart_stats::RestartStatistics;
pub use restarting::RestartingStrategy;

use crate::message::{FailureReason, Message};
use crate::pid::Pid;
use crate::system::ActorSystem;
use std::sync::Arc;
use std::time::Duration;

/// Supervision directive issued by a strategy
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Directive {
    /// Resume the actor (continue processing)
    Resume,

    /// Restart the actor with fresh state
    Restart,

    /// Stop the actor permanently
    Stop,

    /// Escalate to the supervisor's own parent
    Escalate,
}

/// Maps a failure reason to a directive
pub type Decider = Arc<dyn Fn(&FailureReason) -> Directive + Send + Sync>;

/// Restart on every failure
pub fn default_decider() -> Decider {
    Arc::new(|_| Directive::Restart)
}

/// Strategy applied to root actors spawned without a guardian: one-for-one,
/// at most 10 restarts, restart on every failure
pub fn default_strategy() -> Arc<dyn SupervisorStrategy> {
    Arc::new(OneForOneStrategy::new(10, Duration::ZERO, default_decider()))
}

/// Converts a child's failure into actions on its supervisor
pub trait SupervisorStrategy: Send + Sync {
    fn handle_failure(
        &self,
        system: &ActorSystem,
        supervisor: &dyn Supervisor,
        child: &Pid,
        restart_stats: &RestartStatistics,
        reason: FailureReason,
        message: Option<Message>,
    );
}

/// Operations a strategy may apply.
///
/// All of them only send system messages, so they are safe to call from the
/// supervisor's own drain.
pub trait Supervisor {
    fn children(&self) -> Vec<Pid>;

    /// Report the supervisor's own failure upwards
    fn escalate_failure(&self, reason: FailureReason, message: Option<Message>);

    fn restart_children(&self, pids: &[Pid]);

    fn stop_children(&self, pids: &[Pid]);

    fn resume_children(&self, pids: &[Pid]);
}

/// Published on the event stream for every supervision decision
#[derive(Debug, Clone)]
pub struct SupervisorEvent {
    pub child: Pid,
    pub reason: FailureReason,
    pub directive: Directive,
}

pub(crate) fn log_failure(
    system: &ActorSystem,
    child: &Pid,
    reason: &FailureReason,
    directive: Directive,
) {
    if system.config().developer_supervision_logging {
        tracing::error!(child = %child, reason = %reason, ?directive, "Supervision: actor failed");
    } else {
        tracing::debug!(child = %child, reason = %reason, ?directive, "Supervision: actor failed");
    }

    system.event_stream().publish(SupervisorEvent {
        child: child.clone(),
        reason: reason.clone(),
        directive,
    });
}

/// Records the failure and decides whether the restart budget is exhausted.
///
/// The budget resets once exceeded, so a later failure starts counting anew.
pub(crate) fn restart_budget_exhausted(
    max_retries: usize,
    within: Duration,
    restart_stats: &RestartStatistics,
) -> bool {
    if max_retries == 0 {
        return true;
    }

    restart_stats.fail();

    if restart_stats.number_of_failures(within) > max_retries {
        restart_stats.reset();
        return true;
    }

    false
}
