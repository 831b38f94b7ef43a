mod chrome_finder;
mod error;
mod join;
mod launcher;
mod profile;
mod session;
mod watch;

pub use chrome_finder::ChromeFinder;
pub use error::{Error, Result};
pub use join::{default_strategies, JoinAttempt, JoinNegotiator, JoinStrategy};
pub use launcher::ChromeLauncher;
pub use profile::ProfileManager;
pub use session::Session;
pub use watch::{StopWatcher, STOP_BINDING};
