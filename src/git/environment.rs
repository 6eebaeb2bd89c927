use std::collections::BTreeMap;
use std::fs::OpenOptions;
use std::path::Path;

use tracing::warn;

use crate::access::AccessDecision;
use crate::git::GL_PROTOCOL;

/// The only variables inherited from the caller
pub const PASSTHROUGH_VARS: [&str; 4] = ["HOME", "PATH", "LD_LIBRARY_PATH", "LANG"];

const TRACE_VARS: [&str; 3] = ["GIT_TRACE", "GIT_TRACE_PACKET", "GIT_TRACE_PERFORMANCE"];

/// Caller variables captured once at startup
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassthroughEnv {
    vars: BTreeMap<String, String>,
}

impl PassthroughEnv {
    pub fn capture() -> Self {
        Self::from_pairs(
            PASSTHROUGH_VARS
                .iter()
                .filter_map(|name| std::env::var(name).ok().map(|value| (*name, value))),
        )
    }

    /// Keep only the passthrough names from `pairs`
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        let vars = pairs
            .into_iter()
            .map(|(name, value)| (name.into(), value.into()))
            .filter(|(name, _)| PASSTHROUGH_VARS.contains(&name.as_str()))
            .collect();
        Self { vars }
    }
}

/// The complete environment of a spawned process
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ExecutionEnvironment {
    vars: BTreeMap<String, String>,
}

impl ExecutionEnvironment {
    pub fn get(&self, name: &str) -> Option<&str> {
        self.vars.get(name).map(String::as_str)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.vars.contains_key(name)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.vars.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    pub fn len(&self) -> usize {
        self.vars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vars.is_empty()
    }

    fn set(&mut self, name: &str, value: impl Into<String>) {
        self.vars.insert(name.to_string(), value.into());
    }
}

pub struct EnvironmentBuilder<'a> {
    passthrough: &'a PassthroughEnv,
    trace_log_file: Option<&'a Path>,
}

impl<'a> EnvironmentBuilder<'a> {
    pub fn new(passthrough: &'a PassthroughEnv, trace_log_file: Option<&'a Path>) -> Self {
        Self {
            passthrough,
            trace_log_file,
        }
    }

    pub fn build(&self, decision: &AccessDecision, git_protocol: Option<&str>) -> ExecutionEnvironment {
        let mut env = ExecutionEnvironment::default();

        for (name, value) in &self.passthrough.vars {
            env.set(name, value.as_str());
        }

        env.set("GL_ID", decision.gl_id().to_string());
        env.set("GL_PROTOCOL", GL_PROTOCOL);
        env.set("GL_REPOSITORY", decision.gl_repository());
        env.set("GL_USERNAME", decision.gl_username());

        if let Some(protocol) = git_protocol {
            env.set("GIT_PROTOCOL", protocol);
        }

        if let Some(token) = decision.remote_call().and_then(|remote| remote.token.as_deref()) {
            env.set("GITALY_TOKEN", token);
        }

        if let Some(path) = self.trace_log_file.filter(|path| trace_log_writable(path)) {
            let path = path.to_string_lossy().into_owned();
            for name in TRACE_VARS {
                env.set(name, path.clone());
            }
        }

        env
    }
}

/// Tracing is only enabled for an absolute path that can be opened for append.
/// Failures are logged and never abort the invocation.
fn trace_log_writable(path: &Path) -> bool {
    if !path.is_absolute() {
        warn!(path = %path.display(), "git trace log path must be absolute, ignoring");
        return false;
    }

    match OpenOptions::new().create(true).append(true).open(path) {
        Ok(_) => true,
        Err(err) => {
            warn!(path = %path.display(), error = %err, "failed to open git trace log file");
            false
        }
    }
}
