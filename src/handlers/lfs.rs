use std::io::Write;

use tracing::debug;

use crate::access::GlId;
use crate::api::InternalApi;
use crate::error::{GatewayError, GatewayResult};
use crate::security::{IncomingCommand, ValidationError};

/// Ask the API for LFS credentials and print the payload for git-lfs
pub async fn authenticate(
    api: &dyn InternalApi,
    who: &GlId,
    command: &IncomingCommand,
    out: &mut dyn Write,
) -> GatewayResult<()> {
    let operation = command.lfs_operation().ok_or_else(|| {
        GatewayError::DisallowedCommand(ValidationError::InvalidLfsOperation(String::new()))
    })?;

    match api.lfs_authenticate(who, command.repository(), operation).await? {
        Some(credentials) => {
            writeln!(out, "{}", credentials.authentication_payload()?)?;
            out.flush()?;
        }
        None => debug!(repository = command.repository(), "no LFS credentials issued"),
    }

    Ok(())
}
