use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use thiserror::Error;

use crate::security::{Verb, VerbClass};

/// Environment variable pointing at an alternative config file
pub const CONFIG_ENV: &str = "SHELLGATE_CONFIG";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    ReadError(#[from] std::io::Error),

    #[error("Failed to parse config file: {0}")]
    ParseError(#[from] toml::de::Error),

    #[error("Installation root not found")]
    RootNotFound,

    #[error("Invalid config value: {0}")]
    InvalidValue(String),
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct Config {
    pub gitlab_url: String,
    #[serde(default = "default_secret_file")]
    pub secret_file: PathBuf,
    #[serde(default)]
    pub http_settings: HttpSettings,
    /// Installation root; working directory of spawned processes
    #[serde(default)]
    pub root_dir: PathBuf,
    #[serde(default)]
    pub git_bin_dir: Option<PathBuf>,
    #[serde(default)]
    pub log_file: Option<PathBuf>,
    #[serde(default = "default_log_level")]
    pub log_level: String,
    #[serde(default)]
    pub log_format: LogFormat,
    #[serde(default)]
    pub audit_usernames: bool,
    #[serde(default)]
    pub git_trace_log_file: Option<PathBuf>,
    /// Verbs that go to the RPC backend when the API sends routing info,
    /// mapped to the shim binary under `<root_dir>/bin`
    #[serde(default = "default_remote_migration")]
    pub remote_migration: BTreeMap<String, String>,
}

#[derive(Debug, Deserialize, Serialize, Clone)]
pub struct HttpSettings {
    #[serde(default = "default_read_timeout")]
    pub read_timeout_seconds: u64,
    #[serde(default)]
    pub user: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
}

#[derive(Debug, Deserialize, Serialize, Clone, Copy, Default, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl Default for HttpSettings {
    fn default() -> Self {
        Self {
            read_timeout_seconds: default_read_timeout(),
            user: None,
            password: None,
        }
    }
}

fn default_secret_file() -> PathBuf {
    PathBuf::from(".gitlab_shell_secret")
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_read_timeout() -> u64 {
    300
}

fn default_remote_migration() -> BTreeMap<String, String> {
    [
        ("git-upload-pack", "gitaly-upload-pack"),
        ("git-receive-pack", "gitaly-receive-pack"),
        ("git-upload-archive", "gitaly-upload-archive"),
    ]
    .into_iter()
    .map(|(verb, shim)| (verb.to_string(), shim.to_string()))
    .collect()
}

impl Config {
    /// Installation root: the parent of the directory holding the binary
    pub fn default_root() -> Result<PathBuf, ConfigError> {
        let exe = std::env::current_exe()?;
        exe.parent()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .ok_or(ConfigError::RootNotFound)
    }

    /// Get the config file path
    pub fn config_path(root: &Path) -> PathBuf {
        match std::env::var_os(CONFIG_ENV) {
            Some(path) if !path.is_empty() => PathBuf::from(path),
            _ => root.join("config.toml"),
        }
    }

    /// Load configuration for the running installation
    pub fn load() -> Result<Self, ConfigError> {
        let root = Self::default_root()?;
        Self::load_from(&Self::config_path(&root), &root)
    }

    /// Load configuration from a file, filling `root_dir` when it is unset
    pub fn load_from(path: &Path, root: &Path) -> Result<Self, ConfigError> {
        if !path.exists() {
            return Err(ConfigError::ReadError(io::Error::new(
                io::ErrorKind::NotFound,
                format!("Config file not found: {}", path.display()),
            )));
        }

        let contents = fs::read_to_string(path)?;
        let mut config: Config = toml::from_str(&contents)?;

        if config.root_dir.as_os_str().is_empty() {
            config.root_dir = root.to_path_buf();
        }

        config.validate()?;

        Ok(config)
    }

    /// Create default configuration rooted at `root`
    pub fn default_config(root: impl Into<PathBuf>) -> Self {
        Config {
            gitlab_url: "http://localhost:8080".to_string(),
            secret_file: default_secret_file(),
            http_settings: HttpSettings::default(),
            root_dir: root.into(),
            git_bin_dir: None,
            log_file: None,
            log_level: default_log_level(),
            log_format: LogFormat::Text,
            audit_usernames: false,
            git_trace_log_file: None,
            remote_migration: default_remote_migration(),
        }
    }

    /// Validate configuration values
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !(self.gitlab_url.starts_with("http://") || self.gitlab_url.starts_with("https://")) {
            return Err(ConfigError::InvalidValue(format!(
                "gitlab_url must be an http(s) URL: {}",
                self.gitlab_url
            )));
        }

        if self.http_settings.read_timeout_seconds == 0 {
            return Err(ConfigError::InvalidValue(
                "read_timeout_seconds must be greater than 0".to_string(),
            ));
        }

        if !self.root_dir.is_absolute() {
            return Err(ConfigError::InvalidValue(format!(
                "root_dir must be absolute: {}",
                self.root_dir.display()
            )));
        }

        for (verb, shim) in &self.remote_migration {
            let eligible = Verb::from_name(verb)
                .is_some_and(|v| v.class() == VerbClass::Repository && v != Verb::LfsAuthenticate);
            if !eligible {
                return Err(ConfigError::InvalidValue(format!(
                    "remote_migration has no executable verb named {}",
                    verb
                )));
            }
            if shim.is_empty() || shim.contains('/') {
                return Err(ConfigError::InvalidValue(format!(
                    "remote_migration shim for {} must be a bare binary name",
                    verb
                )));
            }
        }

        Ok(())
    }

    /// Read the shared secret; `None` when the file does not exist
    pub fn secret(&self) -> Result<Option<String>, ConfigError> {
        let path = self.root_dir.join(&self.secret_file);
        match fs::read_to_string(&path) {
            Ok(secret) => Ok(Some(secret.trim().to_string())),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    /// Path of the remote-call shim for `verb`, if the verb is migrated
    pub fn remote_shim(&self, verb: Verb) -> Option<PathBuf> {
        self.remote_migration
            .get(verb.as_str())
            .map(|shim| self.root_dir.join("bin").join(shim))
    }

    /// Local executable for `verb`; a bare name is resolved through `PATH`
    pub fn git_executable(&self, verb: Verb) -> PathBuf {
        match &self.git_bin_dir {
            Some(dir) => dir.join(verb.as_str()),
            None => PathBuf::from(verb.as_str()),
        }
    }
}
