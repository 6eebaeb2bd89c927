use std::io::Write;

use tracing::error;

use crate::audit;
use crate::error::GatewayError;

/// Prefix of every line written to the client's error stream
pub const MESSAGE_PREFIX: &str = "GitLab";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogSeverity {
    Warn,
    Error,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UserFacingError {
    pub message: String,
    pub log: Option<LogSeverity>,
}

/// The only place that writes failures to the client
pub struct OutcomeReporter;

impl OutcomeReporter {
    /// Map a failure to its client message and log severity
    pub fn translate(error: &GatewayError) -> UserFacingError {
        let log = match error {
            GatewayError::AccessDenied(_) => Some(LogSeverity::Warn),
            GatewayError::DisallowedCommand(_)
            | GatewayError::InvalidRepositoryPath
            | GatewayError::ApiUnreachable => None,
            GatewayError::Api(_)
            | GatewayError::RemoteRequest(_)
            | GatewayError::Exec(_)
            | GatewayError::Io(_) => Some(LogSeverity::Error),
        };

        UserFacingError {
            message: format!("{}: {}", MESSAGE_PREFIX, error),
            log,
        }
    }

    /// Log and print `error`. Always reports failure to the transport.
    pub fn report(error: &GatewayError, command: &str, user: &str, err_out: &mut dyn Write) -> bool {
        let translated = Self::translate(error);

        match translated.log {
            Some(LogSeverity::Warn) => audit::log_access_denied(command, user),
            Some(LogSeverity::Error) => {
                error!(command = %command, user = %user, error = %error, "command failed")
            }
            None => {}
        }

        // Nothing left to tell the client if stderr is gone
        let _ = writeln!(err_out, "{}", translated.message);
        let _ = err_out.flush();

        false
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::api::ApiError;
    use crate::security::ValidationError;

    #[test]
    fn test_disallowed_command() {
        let error = GatewayError::DisallowedCommand(ValidationError::DisallowedVerb("rm".to_string()));
        let translated = OutcomeReporter::translate(&error);

        assert_eq!(translated.message, "GitLab: Disallowed command");
        assert_eq!(translated.log, None);
    }

    #[test]
    fn test_access_denied_uses_service_message() {
        let error = GatewayError::AccessDenied("You are not allowed to push code to this project.".to_string());
        let translated = OutcomeReporter::translate(&error);

        assert_eq!(
            translated.message,
            "GitLab: You are not allowed to push code to this project."
        );
        assert_eq!(translated.log, Some(LogSeverity::Warn));
    }

    #[test]
    fn test_invalid_repository_path() {
        let translated = OutcomeReporter::translate(&GatewayError::InvalidRepositoryPath);
        assert_eq!(translated.message, "GitLab: Invalid repository path");
        assert_eq!(translated.log, None);
    }

    #[test]
    fn test_api_unreachable() {
        let error: GatewayError = ApiError::Unreachable("connection refused".to_string()).into();
        let translated = OutcomeReporter::translate(&error);

        assert_eq!(translated.message, "GitLab: internal API unreachable");
        assert_eq!(translated.log, None);
    }

    #[test]
    fn test_report_writes_single_line() {
        let mut err_out = Vec::new();
        let success = OutcomeReporter::report(
            &GatewayError::InvalidRepositoryPath,
            "git-upload-pack group/repo",
            "user with id key-1",
            &mut err_out,
        );

        assert!(!success);
        let written = String::from_utf8(err_out).unwrap();
        assert_eq!(written, "GitLab: Invalid repository path\n");
    }
}
