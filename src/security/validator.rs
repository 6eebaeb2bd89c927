use std::collections::HashMap;
use std::fmt;
use thiserror::Error;

use crate::security::{ACCOUNT_VERBS, REPOSITORY_VERBS};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ValidationError {
    #[error("Command not allowed: {0}")]
    DisallowedVerb(String),

    #[error("Wrong number of arguments for {verb}: got {got}")]
    WrongArgumentCount { verb: &'static str, got: usize },

    #[error("Invalid LFS operation: {0}")]
    InvalidLfsOperation(String),

    #[error("Invalid command format")]
    InvalidFormat,

    #[error("Empty command")]
    EmptyCommand,
}

/// Operations the gateway knows how to dispatch
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Verb {
    UploadPack,
    ReceivePack,
    UploadArchive,
    LfsAuthenticate,
    TwoFactorRecoveryCodes,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerbClass {
    Repository,
    AccountAction,
}

/// Authorization category checked against the internal API
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AccessClass {
    UploadPack,
    ReceivePack,
    UploadArchive,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LfsOperation {
    Download,
    Upload,
}

impl Verb {
    pub const ALL: [Verb; 5] = [
        Verb::UploadPack,
        Verb::ReceivePack,
        Verb::UploadArchive,
        Verb::LfsAuthenticate,
        Verb::TwoFactorRecoveryCodes,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Verb::UploadPack => "git-upload-pack",
            Verb::ReceivePack => "git-receive-pack",
            Verb::UploadArchive => "git-upload-archive",
            Verb::LfsAuthenticate => "git-lfs-authenticate",
            Verb::TwoFactorRecoveryCodes => "2fa_recovery_codes",
        }
    }

    pub fn class(self) -> VerbClass {
        match self {
            Verb::TwoFactorRecoveryCodes => VerbClass::AccountAction,
            _ => VerbClass::Repository,
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|verb| verb.as_str() == name)
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl AccessClass {
    pub fn as_str(self) -> &'static str {
        match self {
            AccessClass::UploadPack => "git-upload-pack",
            AccessClass::ReceivePack => "git-receive-pack",
            AccessClass::UploadArchive => "git-upload-archive",
        }
    }
}

impl LfsOperation {
    fn parse(token: &str) -> Option<Self> {
        match token {
            "download" => Some(LfsOperation::Download),
            "upload" => Some(LfsOperation::Upload),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            LfsOperation::Download => "download",
            LfsOperation::Upload => "upload",
        }
    }
}

/// A command that passed the allowlist. Immutable once parsed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct IncomingCommand {
    verb: Verb,
    repository: String,
    lfs_operation: Option<LfsOperation>,
    args: Vec<String>,
}

impl IncomingCommand {
    pub fn verb(&self) -> Verb {
        self.verb
    }

    /// Repository path as requested by the client; empty for account actions
    pub fn repository(&self) -> &str {
        &self.repository
    }

    pub fn lfs_operation(&self) -> Option<LfsOperation> {
        self.lfs_operation
    }

    /// Tokens after normalization, verb first
    pub fn args(&self) -> &[String] {
        &self.args
    }

    /// The access class checked against the internal API.
    ///
    /// LFS authentication is checked as a fetch or a push depending on its
    /// operation, so this differs from the verb used for dispatch.
    pub fn access_class(&self) -> Option<AccessClass> {
        match self.verb {
            Verb::UploadPack => Some(AccessClass::UploadPack),
            Verb::ReceivePack => Some(AccessClass::ReceivePack),
            Verb::UploadArchive => Some(AccessClass::UploadArchive),
            Verb::LfsAuthenticate => match self.lfs_operation? {
                LfsOperation::Download => Some(AccessClass::UploadPack),
                LfsOperation::Upload => Some(AccessClass::ReceivePack),
            },
            Verb::TwoFactorRecoveryCodes => None,
        }
    }
}

impl fmt::Display for IncomingCommand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.args.join(" "))
    }
}

/// Parses the SSH original command and rejects anything outside the allowlist
pub struct CommandValidator {
    allowed_verbs: HashMap<&'static str, Verb>,
}

impl CommandValidator {
    pub fn new() -> Self {
        let allowed_verbs = REPOSITORY_VERBS
            .iter()
            .chain(ACCOUNT_VERBS.iter())
            .filter_map(|name| Verb::from_name(name).map(|verb| (*name, verb)))
            .collect();

        Self { allowed_verbs }
    }

    /// Validate a raw command string
    pub fn validate(&self, command: &str) -> Result<IncomingCommand, ValidationError> {
        let command = command.trim();

        if command.is_empty() {
            return Err(ValidationError::EmptyCommand);
        }

        let mut args = shlex::split(command).ok_or(ValidationError::InvalidFormat)?;
        Self::normalize_git_prefix(&mut args);

        let name = args.first().ok_or(ValidationError::EmptyCommand)?;
        let verb = self
            .check_verb(name)
            .ok_or_else(|| ValidationError::DisallowedVerb(name.clone()))?;

        if verb.class() == VerbClass::AccountAction {
            return Ok(IncomingCommand {
                verb,
                repository: String::new(),
                lfs_operation: None,
                args,
            });
        }

        let lfs_operation = match verb {
            Verb::LfsAuthenticate => {
                if args.len() < 3 {
                    return Err(ValidationError::WrongArgumentCount {
                        verb: verb.as_str(),
                        got: args.len(),
                    });
                }
                let operation = LfsOperation::parse(&args[2])
                    .ok_or_else(|| ValidationError::InvalidLfsOperation(args[2].clone()))?;
                Some(operation)
            }
            _ => {
                if args.len() != 2 {
                    return Err(ValidationError::WrongArgumentCount {
                        verb: verb.as_str(),
                        got: args.len(),
                    });
                }
                None
            }
        };

        Ok(IncomingCommand {
            verb,
            repository: args[1].clone(),
            lfs_operation,
            args,
        })
    }

    /// Some clients send `git upload-pack repo` instead of `git-upload-pack repo`
    fn normalize_git_prefix(args: &mut Vec<String>) {
        if args.len() == 3 && args[0] == "git" {
            let verb = format!("git-{}", args[1]);
            let repository = args.remove(2);
            *args = vec![verb, repository];
        }
    }

    fn check_verb(&self, name: &str) -> Option<Verb> {
        self.allowed_verbs.get(name).copied()
    }
}

impl Default for CommandValidator {
    fn default() -> Self {
        Self::new()
    }
}
