use std::path::{Component, Path, PathBuf};

use crate::access::decision::{AccessDecision, RemoteCallInfo};
use crate::access::identity::{GlId, Identity, Principal};
use crate::api::{AccessRequest, InternalApi};
use crate::error::{GatewayError, GatewayResult};
use crate::git::GL_PROTOCOL;
use crate::security::{IncomingCommand, ValidationError};

const DEFAULT_DENIAL: &str = "Access denied";
const UNKNOWN_USER: &str = "Failed to resolve your user account";

/// Runs the authorization round-trip and turns the answer into a decision
pub struct AccessVerifier<'a> {
    api: &'a dyn InternalApi,
}

impl<'a> AccessVerifier<'a> {
    pub fn new(api: &'a dyn InternalApi) -> Self {
        Self { api }
    }

    /// Check a repository command. One request, no retry.
    pub async fn verify(
        &self,
        command: &IncomingCommand,
        principal: &Principal,
        git_protocol: Option<&str>,
    ) -> GatewayResult<AccessDecision> {
        let access = command.access_class().ok_or_else(|| {
            GatewayError::DisallowedCommand(ValidationError::DisallowedVerb(
                command.verb().to_string(),
            ))
        })?;

        let request = AccessRequest::new(
            access,
            command.repository(),
            principal.identity(),
            GL_PROTOCOL,
            git_protocol,
        );
        let response = self.api.check_access(&request).await?;

        if !response.status {
            return Err(GatewayError::AccessDenied(
                response
                    .message
                    .unwrap_or_else(|| DEFAULT_DENIAL.to_string()),
            ));
        }

        let repository_path = validate_repository_path(response.repository_path.as_deref())?;
        let gl_id = self.resolve_gl_id(principal, response.gl_id.as_deref()).await?;

        let (remote_call, feature_flags) = match response.gitaly {
            Some(gitaly) => (
                Some(RemoteCallInfo {
                    address: gitaly.address,
                    repository: gitaly.repository,
                    token: gitaly.token,
                }),
                gitaly.features,
            ),
            None => (None, None),
        };

        Ok(AccessDecision {
            repository_path,
            gl_id,
            gl_repository: response.gl_repository.unwrap_or_default(),
            gl_username: response.gl_username.unwrap_or_default(),
            remote_call,
            feature_flags,
        })
    }

    /// Resolve the caller for an account action, which has no access check
    pub async fn resolve_account(&self, principal: &Principal) -> GatewayResult<GlId> {
        principal
            .resolve(self.api)
            .await
            .ok_or_else(|| GatewayError::AccessDenied(UNKNOWN_USER.to_string()))
    }

    async fn resolve_gl_id(&self, principal: &Principal, returned: Option<&str>) -> GatewayResult<GlId> {
        if let Identity::Resolved(id) = principal.identity() {
            return Ok(id.clone());
        }

        if let Some(id) = returned.and_then(|id| id.parse().ok()) {
            return Ok(id);
        }

        self.resolve_account(principal).await
    }
}

/// The path must be absolute and already normalized
fn validate_repository_path(path: Option<&str>) -> GatewayResult<PathBuf> {
    let path = match path {
        Some(path) if !path.is_empty() => Path::new(path),
        _ => return Err(GatewayError::InvalidRepositoryPath),
    };

    let normalized = path
        .components()
        .all(|c| !matches!(c, Component::ParentDir | Component::CurDir));

    if !path.is_absolute() || !normalized {
        return Err(GatewayError::InvalidRepositoryPath);
    }

    Ok(path.to_path_buf())
}
