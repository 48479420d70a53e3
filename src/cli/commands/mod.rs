pub mod config;
pub mod replay;
pub mod watch;

pub use config::{CheckConfigCommand, ShowConfigCommand};
pub use replay::ReplayCommand;
pub use watch::WatchCommand;
