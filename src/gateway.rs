use std::io::{BufRead, Write};

use crate::access::{AccessDecision, AccessVerifier, Identity, Principal};
use crate::api::InternalApi;
use crate::audit;
use crate::config::Config;
use crate::error::{GatewayError, GatewayResult};
use crate::error_translation::OutcomeReporter;
use crate::git::{
    EnvironmentBuilder, ExecutionRouter, PassthroughEnv, ProcessInvocation, ProcessLauncher,
};
use crate::handlers::{lfs, two_factor, welcome};
use crate::security::{CommandValidator, IncomingCommand, Verb};

/// Variable holding the command the SSH client asked for
pub const ORIGINAL_COMMAND_ENV: &str = "SSH_ORIGINAL_COMMAND";
/// Variable holding the client's git protocol hint
pub const GIT_PROTOCOL_ENV: &str = "GIT_PROTOCOL";

/// What the SSH transport handed over for one session
#[derive(Debug)]
pub struct Invocation {
    pub original_command: Option<String>,
    pub principal: Principal,
    pub git_protocol: Option<String>,
    pub passthrough: PassthroughEnv,
}

impl Invocation {
    pub fn new(identity: Identity, original_command: Option<String>) -> Self {
        Self {
            original_command,
            principal: Principal::new(identity),
            git_protocol: None,
            passthrough: PassthroughEnv::default(),
        }
    }

    /// Read the command, protocol hint and passthrough variables from the process
    pub fn from_env(identity: Identity) -> Self {
        let non_empty = |name: &str| std::env::var(name).ok().filter(|v| !v.is_empty());

        Self {
            original_command: non_empty(ORIGINAL_COMMAND_ENV),
            principal: Principal::new(identity),
            git_protocol: non_empty(GIT_PROTOCOL_ENV),
            passthrough: PassthroughEnv::capture(),
        }
    }

    pub fn with_git_protocol(mut self, protocol: impl Into<String>) -> Self {
        self.git_protocol = Some(protocol.into());
        self
    }

    pub fn with_passthrough(mut self, passthrough: PassthroughEnv) -> Self {
        self.passthrough = passthrough;
        self
    }
}

/// Parses, authorizes and dispatches one SSH command
pub struct Gateway {
    config: Config,
    api: Box<dyn InternalApi>,
    launcher: Box<dyn ProcessLauncher>,
    validator: CommandValidator,
}

impl Gateway {
    pub fn new(config: Config, api: Box<dyn InternalApi>, launcher: Box<dyn ProcessLauncher>) -> Self {
        Self {
            config,
            api,
            launcher,
            validator: CommandValidator::new(),
        }
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    /// Run the whole pipeline and report any failure on `err_out`.
    ///
    /// Returns whether the invocation succeeded.
    pub async fn run(
        &self,
        invocation: &Invocation,
        input: &mut dyn BufRead,
        out: &mut dyn Write,
        err_out: &mut dyn Write,
    ) -> bool {
        match self.dispatch(invocation, input, out).await {
            Ok(()) => true,
            Err(error) => {
                let command = invocation.original_command.as_deref().unwrap_or_default();
                let user = self.known_username(&invocation.principal);
                OutcomeReporter::report(&error, command, &user, err_out)
            }
        }
    }

    pub async fn dispatch(
        &self,
        invocation: &Invocation,
        input: &mut dyn BufRead,
        out: &mut dyn Write,
    ) -> GatewayResult<()> {
        let api = self.api.as_ref();

        let raw = match invocation.original_command.as_deref() {
            Some(raw) if !raw.trim().is_empty() => raw,
            _ => return welcome::greet(&invocation.principal, api, out).await,
        };

        let command = self.validator.validate(raw)?;
        let git_protocol = invocation.git_protocol.as_deref();
        let verifier = AccessVerifier::new(api);

        match command.verb() {
            Verb::TwoFactorRecoveryCodes => {
                let who = verifier.resolve_account(&invocation.principal).await?;
                two_factor::regenerate_recovery_codes(api, &who, input, out).await
            }
            Verb::LfsAuthenticate => {
                let decision = verifier
                    .verify(&command, &invocation.principal, git_protocol)
                    .await?;
                lfs::authenticate(api, decision.gl_id(), &command, out).await
            }
            Verb::UploadPack | Verb::ReceivePack | Verb::UploadArchive => {
                let decision = verifier
                    .verify(&command, &invocation.principal, git_protocol)
                    .await?;
                self.exec_git(&command, &decision, invocation).await
            }
        }
    }

    async fn exec_git(
        &self,
        command: &IncomingCommand,
        decision: &AccessDecision,
        invocation: &Invocation,
    ) -> GatewayResult<()> {
        let git_protocol = invocation.git_protocol.as_deref();

        let plan = ExecutionRouter::new(&self.config).route(command, decision, git_protocol)?;
        let env = EnvironmentBuilder::new(
            &invocation.passthrough,
            self.config.git_trace_log_file.as_deref(),
        )
        .build(decision, git_protocol);

        let user = self.decision_username(&invocation.principal, decision).await;
        audit::log_command_execution(&plan.describe(), &user, decision.gl_id());

        let process = ProcessInvocation {
            executable: plan.executable().to_path_buf(),
            args: plan.args(),
            env,
            current_dir: self.config.root_dir.clone(),
        };

        self.launcher.launch(&process).map_err(GatewayError::Exec)
    }

    /// How the caller appears in failure logs. Never calls the API.
    fn known_username(&self, principal: &Principal) -> String {
        if self.config.audit_usernames {
            if let Some(name) = principal.known_display_name() {
                return name;
            }
        }
        format!("user with id {}", principal.identity())
    }

    async fn decision_username(&self, principal: &Principal, decision: &AccessDecision) -> String {
        if !self.config.audit_usernames {
            return format!("user with id {}", decision.gl_id());
        }

        match decision.gl_username() {
            "" => principal.display_name(self.api.as_ref()).await,
            username => format!("@{}", username),
        }
    }
}
