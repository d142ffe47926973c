use crate::message::SystemMessage;
use crate::pid::Pid;
use crate::system::ActorSystem;
use std::time::Duration;
use tokio::task::AbortHandle;

/// One-shot receive-timeout timer.
///
/// Every arm or stop bumps the generation; an expiry only counts if it
/// carries the current generation, so an expiry racing with a reset is
/// discarded when it reaches the actor.
#[derive(Debug, Default)]
pub(crate) struct ReceiveTimeoutTimer {
    duration: Option<Duration>,
    generation: u64,
    task: Option<AbortHandle>,
}

impl ReceiveTimeoutTimer {
    pub(crate) fn duration(&self) -> Option<Duration> {
        self.duration
    }

    pub(crate) fn set_duration(&mut self, duration: Option<Duration>) {
        self.duration = duration;
    }

    pub(crate) fn arm(&mut self, system: &ActorSystem, pid: &Pid) {
        self.stop();
        let Some(duration) = self.duration else {
            return;
        };

        let generation = self.generation;
        let target = pid.clone();
        let sender = system.clone();
        let task = system.runtime().spawn(async move {
            tokio::time::sleep(duration).await;
            sender.send_system_message(&target, SystemMessage::ReceiveTimeoutElapsed(generation));
        });
        self.task = Some(task.abort_handle());
    }

    pub(crate) fn stop(&mut self) {
        if let Some(task) = self.task.take() {
            task.abort();
        }
        self.generation = self.generation.wrapping_add(1);
    }

    pub(crate) fn is_current(&self, generation: u64) -> bool {
        self.duration.is_some() && self.task.is_some() && self.generation == generation
    }
}
