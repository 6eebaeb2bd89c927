#![allow(dead_code)]

use std::collections::BTreeMap;
use std::io;
use std::sync::{Arc, Mutex};

use async_trait::async_trait;
use shellgate::access::{GlId, Identity};
use shellgate::api::{
    AccessRequest, AccessResponse, ApiError, DiscoveredUser, GitalyInfo, InternalApi,
    LfsCredentials, RecoveryCodesResponse,
};
use shellgate::config::Config;
use shellgate::git::{ProcessInvocation, ProcessLauncher};
use shellgate::security::LfsOperation;
use shellgate::{Gateway, Invocation};
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::fmt::MakeWriter;

pub const ROOT_DIR: &str = "/opt/shellgate";
pub const REPOSITORY_PATH: &str = "/var/opt/gitlab/git-data/repositories/group/repo.git";
pub const GITALY_ADDRESS: &str = "unix:/var/opt/gitlab/gitaly/gitaly.socket";

/// Internal API double; clones share their call log
#[derive(Clone, Default)]
pub struct MockApi {
    access: Option<AccessResponse>,
    unreachable: bool,
    discovered: Option<DiscoveredUser>,
    lfs: Option<LfsCredentials>,
    recovery: RecoveryCodesResponse,
    calls: Arc<Mutex<Vec<&'static str>>>,
    requests: Arc<Mutex<Vec<AccessRequest>>>,
}

impl MockApi {
    pub fn answering(response: AccessResponse) -> Self {
        Self {
            access: Some(response),
            ..Self::default()
        }
    }

    pub fn unreachable() -> Self {
        Self {
            unreachable: true,
            ..Self::default()
        }
    }

    pub fn with_discovered(mut self, id: u64, username: &str) -> Self {
        self.discovered = Some(DiscoveredUser {
            id,
            username: username.to_string(),
            name: None,
        });
        self
    }

    pub fn with_lfs(mut self, credentials: LfsCredentials) -> Self {
        self.lfs = Some(credentials);
        self
    }

    pub fn with_recovery(mut self, recovery: RecoveryCodesResponse) -> Self {
        self.recovery = recovery;
        self
    }

    pub fn calls(&self) -> Vec<&'static str> {
        self.calls.lock().unwrap().clone()
    }

    pub fn access_requests(&self) -> Vec<AccessRequest> {
        self.requests.lock().unwrap().clone()
    }

    fn record(&self, call: &'static str) -> Result<(), ApiError> {
        self.calls.lock().unwrap().push(call);
        if self.unreachable {
            return Err(ApiError::Unreachable("connection refused".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl InternalApi for MockApi {
    async fn check_access(&self, request: &AccessRequest) -> Result<AccessResponse, ApiError> {
        self.requests.lock().unwrap().push(request.clone());
        self.record("check_access")?;
        Ok(self
            .access
            .clone()
            .unwrap_or_else(|| AccessResponse::denied("Access denied")))
    }

    async fn discover(&self, _who: &Identity) -> Result<Option<DiscoveredUser>, ApiError> {
        self.record("discover")?;
        Ok(self.discovered.clone())
    }

    async fn lfs_authenticate(
        &self,
        _who: &GlId,
        _project: &str,
        _operation: LfsOperation,
    ) -> Result<Option<LfsCredentials>, ApiError> {
        self.record("lfs_authenticate")?;
        Ok(self.lfs.clone())
    }

    async fn two_factor_recovery_codes(&self, _who: &GlId) -> Result<RecoveryCodesResponse, ApiError> {
        self.record("two_factor_recovery_codes")?;
        Ok(self.recovery.clone())
    }
}

/// Launcher that records invocations instead of replacing the process
#[derive(Clone, Default)]
pub struct RecordingLauncher {
    launched: Arc<Mutex<Vec<ProcessInvocation>>>,
    fail: bool,
}

impl RecordingLauncher {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn launched(&self) -> Vec<ProcessInvocation> {
        self.launched.lock().unwrap().clone()
    }
}

impl ProcessLauncher for RecordingLauncher {
    fn launch(&self, invocation: &ProcessInvocation) -> io::Result<()> {
        self.launched.lock().unwrap().push(invocation.clone());
        if self.fail {
            return Err(io::Error::new(io::ErrorKind::NotFound, "No such file or directory"));
        }
        Ok(())
    }
}

/// Allowed answer for a local repository with no RPC routing
pub fn allowed_response() -> AccessResponse {
    AccessResponse {
        status: true,
        message: None,
        repository_path: Some(REPOSITORY_PATH.to_string()),
        gl_repository: Some("project-26".to_string()),
        gl_id: Some("key-123".to_string()),
        gl_username: Some("alice".to_string()),
        gitaly: None,
    }
}

/// Allowed answer carrying RPC routing info and the given feature flags
pub fn remote_response(features: Option<BTreeMap<String, bool>>) -> AccessResponse {
    AccessResponse {
        gitaly: Some(GitalyInfo {
            address: GITALY_ADDRESS.to_string(),
            token: Some("gitaly-token".to_string()),
            repository: serde_json::json!({
                "storage_name": "default",
                "relative_path": "group/repo.git",
                "gl_repository": "project-26"
            }),
            features,
        }),
        ..allowed_response()
    }
}

pub fn flags(pairs: &[(&str, bool)]) -> BTreeMap<String, bool> {
    pairs
        .iter()
        .map(|(name, enabled)| (name.to_string(), *enabled))
        .collect()
}

pub fn test_config() -> Config {
    Config::default_config(ROOT_DIR)
}

pub fn gateway(config: Config, api: &MockApi, launcher: &RecordingLauncher) -> Gateway {
    Gateway::new(config, Box::new(api.clone()), Box::new(launcher.clone()))
}

pub fn key_invocation(command: &str) -> Invocation {
    Invocation::new(Identity::Resolved(GlId::key("123")), Some(command.to_string()))
}

/// What one gateway run produced on each stream
pub struct Outcome {
    pub succeeded: bool,
    pub stdout: String,
    pub stderr: String,
}

pub async fn run(gateway: &Gateway, invocation: &Invocation, stdin: &str) -> Outcome {
    let mut input = stdin.as_bytes();
    let mut out = Vec::new();
    let mut err_out = Vec::new();

    let succeeded = gateway
        .run(invocation, &mut input, &mut out, &mut err_out)
        .await;

    Outcome {
        succeeded,
        stdout: String::from_utf8(out).unwrap(),
        stderr: String::from_utf8(err_out).unwrap(),
    }
}

/// In-memory sink for log lines
#[derive(Clone, Default)]
pub struct LogCapture(Arc<Mutex<Vec<u8>>>);

impl LogCapture {
    /// Route this thread's logs into a fresh capture until the guard drops
    pub fn install() -> (Self, DefaultGuard) {
        let capture = Self::default();
        let subscriber = tracing_subscriber::fmt()
            .with_ansi(false)
            .with_max_level(tracing::Level::DEBUG)
            .with_writer(capture.clone())
            .finish();
        let guard = tracing::subscriber::set_default(subscriber);
        (capture, guard)
    }

    pub fn contents(&self) -> String {
        String::from_utf8(self.0.lock().unwrap().clone()).unwrap()
    }

    pub fn lines_containing(&self, needle: &str) -> Vec<String> {
        self.contents()
            .lines()
            .filter(|line| line.contains(needle))
            .map(str::to_string)
            .collect()
    }
}

impl io::Write for LogCapture {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

impl<'a> MakeWriter<'a> for LogCapture {
    type Writer = LogCapture;

    fn make_writer(&'a self) -> Self::Writer {
        self.clone()
    }
}
