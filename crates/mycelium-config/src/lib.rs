pub mod system;

pub use system::{ActorSystemConfig, ConfigError, Result};
