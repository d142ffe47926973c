use parking_lot::Mutex;
use std::fmt;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Failure history of one actor.
///
/// Shared between the actor and the failure reports it sends, so a strategy
/// recording a failure updates the child's own history.
#[derive(Clone, Default)]
pub struct RestartStatistics {
    failures: Arc<Mutex<Vec<Instant>>>,
}

impl RestartStatistics {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a failure now
    pub fn fail(&self) {
        self.failures.lock().push(Instant::now());
    }

    #[cfg(test)]
    pub(crate) fn fail_at(&self, at: Instant) {
        self.failures.lock().push(at);
    }

    pub fn reset(&self) {
        self.failures.lock().clear();
    }

    /// Total recorded failures
    pub fn failure_count(&self) -> usize {
        self.failures.lock().len()
    }

    /// Failures inside `within` of now; `Duration::ZERO` counts everything.
    ///
    /// Failures older than the window are discarded.
    pub fn number_of_failures(&self, within: Duration) -> usize {
        let mut failures = self.failures.lock();
        if within.is_zero() {
            return failures.len();
        }
        let now = Instant::now();
        failures.retain(|at| now.duration_since(*at) < within);
        failures.len()
    }

    pub fn last_failure_time(&self) -> Option<Instant> {
        self.failures.lock().last().copied()
    }
}

impl fmt::Debug for RestartStatistics {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RestartStatistics")
            .field("failures", &self.failure_count())
            .finish()
    }
}
