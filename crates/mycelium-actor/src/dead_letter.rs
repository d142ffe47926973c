//! Sink for messages whose target no longer exists

use crate::event_stream::Subscription;
use crate::message::{Message, MessageEnvelope, SystemMessage, Terminated};
use crate::pid::Pid;
use crate::process::Process;
use crate::system::{ActorSystem, WeakActorSystem};
use crate::throttle::{Throttle, Valve};
use std::sync::Arc;

/// Published for every user message that reached the dead-letter process
#[derive(Debug, Clone)]
pub struct DeadLetterEvent {
    /// Intended recipient; `None` for replies sent without a sender to reply to
    pub pid: Option<Pid>,
    pub message: Message,
    pub sender: Option<Pid>,
}

/// Sent back to the requester when a request hits a dead target.
///
/// A future receiving it fails with
/// [`FutureError::DeadLetter`](crate::error::FutureError::DeadLetter)
/// instead of waiting for its timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeadLetterResponse {
    pub target: Option<Pid>,
}

pub struct DeadLetterProcess {
    system: WeakActorSystem,
}

impl DeadLetterProcess {
    pub(crate) fn new(system: WeakActorSystem) -> Self {
        Self { system }
    }

    pub(crate) fn deliver(&self, pid: Option<&Pid>, envelope: MessageEnvelope) {
        let Some(system) = self.system.upgrade() else {
            return;
        };

        let MessageEnvelope {
            message, sender, ..
        } = envelope;

        system.event_stream().publish(DeadLetterEvent {
            pid: pid.cloned(),
            message,
            sender: sender.clone(),
        });

        if let Some(sender) = sender {
            let response = DeadLetterResponse {
                target: pid.cloned(),
            };
            system.send_user_message(&sender, MessageEnvelope::new(Message::from_any(response)));
        }
    }
}

impl Process for DeadLetterProcess {
    fn send_user_message(&self, pid: &Pid, envelope: MessageEnvelope) {
        self.deliver(Some(pid), envelope);
    }

    fn send_system_message(&self, pid: &Pid, message: SystemMessage) {
        let Some(system) = self.system.upgrade() else {
            return;
        };

        match message {
            // a watch on a dead actor must still produce its Terminated
            SystemMessage::Watch { watcher } => {
                system.send_system_message(
                    &watcher,
                    SystemMessage::Terminated(Terminated { who: pid.clone() }),
                );
            }
            other => {
                tracing::debug!(
                    pid = %pid,
                    message = other.type_name(),
                    "System message to dead process dropped"
                );
            }
        }
    }

    fn stop(&self, _pid: &Pid) {}
}

fn describe(pid: &Option<Pid>) -> String {
    pid.as_ref()
        .map(ToString::to_string)
        .unwrap_or_else(|| "none".to_string())
}

/// Log dead letters, throttled per the system config
pub(crate) fn install_logging(system: &ActorSystem) -> Arc<Subscription> {
    let config = system.config();
    let request_logging = config.dead_letter_request_logging;
    let throttle = Throttle::new(
        config.dead_letter_throttle_count,
        config.dead_letter_throttle_interval(),
        |suppressed| tracing::info!(throttled = suppressed, "[DeadLetter] messages throttled"),
    );

    system
        .event_stream()
        .subscribe_to::<DeadLetterEvent, _>(move |event| {
            if event.sender.is_some() && !request_logging {
                return;
            }

            match throttle.should_throttle() {
                Valve::Open => tracing::info!(
                    pid = %describe(&event.pid),
                    message = event.message.type_name(),
                    sender = %describe(&event.sender),
                    "[DeadLetter]"
                ),
                Valve::Closing => tracing::info!(
                    pid = %describe(&event.pid),
                    message = event.message.type_name(),
                    sender = %describe(&event.sender),
                    "[DeadLetter] limit reached, further dead letters are throttled"
                ),
                Valve::Closed => {}
            }
        })
}
