pub mod logger;

pub use logger::{init, log_access_denied, log_command_execution};
