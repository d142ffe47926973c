//! Delivery targets behind a PID

use crate::mailbox::Mailbox;
use crate::message::{MessageEnvelope, SystemMessage};
use crate::pid::Pid;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Anything a PID can resolve to.
///
/// Implementations must never block and must never panic on a dead target.
/// External transports implement this trait to appear as ordinary actors.
pub trait Process: Send + Sync {
    fn send_user_message(&self, pid: &Pid, envelope: MessageEnvelope);

    fn send_system_message(&self, pid: &Pid, message: SystemMessage);

    fn stop(&self, pid: &Pid);

    /// Dead processes are skipped by PID caches
    fn is_dead(&self) -> bool {
        false
    }

    /// Called when the registry drops this process
    fn mark_dead(&self) {}
}

/// Process backed by a local mailbox
pub struct ActorProcess {
    mailbox: Arc<Mailbox>,
    dead: AtomicBool,
}

impl ActorProcess {
    pub fn new(mailbox: Arc<Mailbox>) -> Self {
        Self {
            mailbox,
            dead: AtomicBool::new(false),
        }
    }

    pub fn mailbox(&self) -> &Arc<Mailbox> {
        &self.mailbox
    }
}

impl Process for ActorProcess {
    fn send_user_message(&self, _pid: &Pid, envelope: MessageEnvelope) {
        self.mailbox.post_user_message(envelope);
    }

    fn send_system_message(&self, _pid: &Pid, message: SystemMessage) {
        self.mailbox.post_system_message(message);
    }

    fn stop(&self, pid: &Pid) {
        self.dead.store(true, Ordering::Release);
        self.send_system_message(pid, SystemMessage::Stop);
    }

    fn is_dead(&self) -> bool {
        self.dead.load(Ordering::Acquire)
    }

    fn mark_dead(&self) {
        self.dead.store(true, Ordering::Release);
    }
}
