pub mod config;
pub mod error;
pub mod output;
pub mod termination;

pub use config::RecorderConfig;
pub use error::{Error, Result};
pub use termination::{StopReason, TerminationMonitor};
