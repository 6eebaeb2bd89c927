pub mod validator;

pub use validator::{
    AccessClass, CommandValidator, IncomingCommand, LfsOperation, ValidationError, Verb, VerbClass,
};

/// Allowlist of verbs that operate on a repository
///
/// Every entry goes through an access check before anything runs.
/// Adding a new verb requires a handler in the gateway and careful security review.
pub const REPOSITORY_VERBS: &[&str] = &[
    "git-upload-pack",
    "git-receive-pack",
    "git-upload-archive",
    "git-lfs-authenticate",
];

/// Allowlist of verbs that act on the caller's account instead of a repository
pub const ACCOUNT_VERBS: &[&str] = &["2fa_recovery_codes"];
