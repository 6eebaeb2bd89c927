use std::io;
use std::path::PathBuf;
use std::process::Command;

use crate::git::environment::ExecutionEnvironment;

/// Everything needed to start the final process of a dispatch
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProcessInvocation {
    pub executable: PathBuf,
    pub args: Vec<String>,
    pub env: ExecutionEnvironment,
    pub current_dir: PathBuf,
}

impl ProcessInvocation {
    /// Build the command with a cleared environment; nothing is inherited
    pub fn command(&self) -> Command {
        let mut command = Command::new(&self.executable);
        command
            .args(&self.args)
            .env_clear()
            .envs(self.env.iter())
            .current_dir(&self.current_dir);
        command
    }
}

/// Starts the final process of a dispatch
pub trait ProcessLauncher: Send + Sync {
    /// Replace the current process with `invocation`.
    ///
    /// Implementations that replace the process only return on failure.
    fn launch(&self, invocation: &ProcessInvocation) -> io::Result<()>;
}

/// Replaces the running process image, never returning on success
#[derive(Debug, Default, Clone, Copy)]
pub struct ExecLauncher;

#[cfg(unix)]
impl ProcessLauncher for ExecLauncher {
    fn launch(&self, invocation: &ProcessInvocation) -> io::Result<()> {
        use std::os::unix::process::CommandExt;

        Err(invocation.command().exec())
    }
}

#[cfg(not(unix))]
impl ProcessLauncher for ExecLauncher {
    fn launch(&self, invocation: &ProcessInvocation) -> io::Result<()> {
        let status = invocation.command().status()?;
        std::process::exit(status.code().unwrap_or(1));
    }
}
