use crate::pid::Pid;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ActorError {
    #[error("No tokio runtime available: {0}")]
    NoRuntime(#[from] tokio::runtime::TryCurrentError),

    #[error("Invalid configuration: {0}")]
    Config(#[from] mycelium_config::ConfigError),

    #[error("Spawn failed: {0}")]
    Spawn(#[from] SpawnError),

    #[error("Behavior stack is empty")]
    EmptyBehavior,

    #[error("Message {0} cannot be forwarded")]
    ForwardNotAllowed(&'static str),

    #[error("No message is being processed")]
    NoCurrentMessage,
}

/// Errors returned synchronously from spawn calls
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SpawnError {
    #[error("Actor name already exists: {0}")]
    NameExists(Pid),

    #[error("Props used to spawn a child cannot carry a guardian strategy")]
    GuardianOnChild,
}

/// Errors delivered through a future instead of a result
#[derive(Error, Debug, Clone, Copy, PartialEq, Eq)]
pub enum FutureError {
    #[error("future: timeout")]
    Timeout,

    #[error("future: dead letter")]
    DeadLetter,
}

pub type Result<T> = std::result::Result<T, ActorError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = SpawnError::NameExists(Pid::new("nonhost", "worker"));
        assert_eq!(err.to_string(), "Actor name already exists: nonhost/worker");

        let err = ActorError::ForwardNotAllowed("Started");
        assert_eq!(err.to_string(), "Message Started cannot be forwarded");

        assert_eq!(FutureError::Timeout.to_string(), "future: timeout");
        assert_eq!(FutureError::DeadLetter.to_string(), "future: dead letter");
    }

    #[test]
    fn test_spawn_error_conversion() {
        let err: ActorError = SpawnError::GuardianOnChild.into();
        assert!(matches!(err, ActorError::Spawn(SpawnError::GuardianOnChild)));
    }
}
