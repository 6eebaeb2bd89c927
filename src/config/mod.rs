pub mod settings;

pub use settings::{Config, ConfigError, HttpSettings, LogFormat};
