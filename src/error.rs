use std::io;
use thiserror::Error;

// Import module-level errors for AppError
use crate::access::identity::IdentityError;
use crate::api::client::ApiError;
use crate::config::settings::ConfigError;
use crate::security::validator::ValidationError;

/// Failures of a single dispatch, from parsing to process replacement
///
/// `Display` is the single-line message shown to the SSH client.
#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("Disallowed command")]
    DisallowedCommand(#[from] ValidationError),

    #[error("{0}")]
    AccessDenied(String),

    #[error("Invalid repository path")]
    InvalidRepositoryPath,

    #[error("internal API unreachable")]
    ApiUnreachable,

    #[error("Failed to authorize your Git request: {0}")]
    Api(ApiError),

    #[error("Failed to build remote request: {0}")]
    RemoteRequest(#[from] serde_json::Error),

    #[error("Failed to execute git command: {0}")]
    Exec(#[source] io::Error),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl From<ApiError> for GatewayError {
    fn from(err: ApiError) -> Self {
        match err {
            ApiError::Unreachable(_) => GatewayError::ApiUnreachable,
            other => GatewayError::Api(other),
        }
    }
}

/// Top-level error for process startup, before a dispatch begins
#[derive(Debug, Error)]
pub enum AppError {
    #[error("{0}")]
    Gateway(#[from] GatewayError),

    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    #[error("API client error: {0}")]
    Api(#[from] ApiError),

    #[error("{0}")]
    Identity(#[from] IdentityError),

    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

/// Result type for dispatch operations
pub type GatewayResult<T> = std::result::Result<T, GatewayError>;

/// Result type for application-level operations
pub type AppResult<T> = std::result::Result<T, AppError>;
