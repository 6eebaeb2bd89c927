use std::path::{Path, PathBuf};

use crate::access::AccessDecision;
use crate::config::Config;
use crate::error::GatewayResult;
use crate::git::gitaly::RemoteRequest;
use crate::security::IncomingCommand;

/// How an authorized git command will run
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DispatchPlan {
    /// Run the git binary against the on-disk repository
    Local {
        executable: PathBuf,
        repository_path: PathBuf,
    },
    /// Run a shim that forwards the operation to the RPC backend
    Remote {
        executable: PathBuf,
        address: String,
        request: String,
    },
}

impl DispatchPlan {
    pub fn executable(&self) -> &Path {
        match self {
            DispatchPlan::Local { executable, .. } | DispatchPlan::Remote { executable, .. } => {
                executable
            }
        }
    }

    pub fn args(&self) -> Vec<String> {
        match self {
            DispatchPlan::Local {
                repository_path, ..
            } => vec![repository_path.to_string_lossy().into_owned()],
            DispatchPlan::Remote {
                address, request, ..
            } => vec![address.clone(), request.clone()],
        }
    }

    pub fn is_remote(&self) -> bool {
        matches!(self, DispatchPlan::Remote { .. })
    }

    /// Binary basename followed by its arguments, as written to the log
    pub fn describe(&self) -> String {
        let name = self
            .executable()
            .file_name()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_default();

        std::iter::once(name)
            .chain(self.args())
            .collect::<Vec<_>>()
            .join(" ")
    }
}

/// Chooses between local execution and the RPC backend for each invocation
pub struct ExecutionRouter<'a> {
    config: &'a Config,
}

impl<'a> ExecutionRouter<'a> {
    pub fn new(config: &'a Config) -> Self {
        Self { config }
    }

    /// Plan a command that runs a git binary.
    ///
    /// Remote mode needs both a migrated verb and routing info in the
    /// decision; either one missing falls back to local mode.
    pub fn route(
        &self,
        command: &IncomingCommand,
        decision: &AccessDecision,
        git_protocol: Option<&str>,
    ) -> GatewayResult<DispatchPlan> {
        let verb = command.verb();

        if let (Some(shim), Some(remote)) = (self.config.remote_shim(verb), decision.remote_call()) {
            let request = RemoteRequest::new(remote, decision, git_protocol);
            return Ok(DispatchPlan::Remote {
                executable: shim,
                address: remote.address.clone(),
                request: request.to_json()?,
            });
        }

        Ok(DispatchPlan::Local {
            executable: self.config.git_executable(verb),
            repository_path: decision.repository_path().to_path_buf(),
        })
    }
}
