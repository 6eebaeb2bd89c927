use std::collections::BTreeMap;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::access::identity::{GlId, Identity};
use crate::security::{AccessClass, LfsOperation};

/// Wildcard ref change sent with every access check
pub const ANY_CHANGES: &str = "_any";

/// Errors that can occur while talking to the internal API
#[derive(Debug, Error)]
pub enum ApiError {
    #[error("internal API unreachable: {0}")]
    Unreachable(String),

    #[error("API request failed: {0}")]
    RequestFailed(String),

    #[error("Invalid API response: {0}")]
    InvalidResponse(String),

    #[error("JSON parsing error: {0}")]
    JsonError(#[from] serde_json::Error),
}

/// Body of an access check
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct AccessRequest {
    pub action: &'static str,
    pub project: String,
    pub changes: &'static str,
    pub protocol: &'static str,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_id: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub username: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub git_protocol: Option<String>,
}

impl AccessRequest {
    pub fn new(
        access: AccessClass,
        project: &str,
        who: &Identity,
        protocol: &'static str,
        git_protocol: Option<&str>,
    ) -> Self {
        let (key_id, user_id, username) = identity_params(who);
        Self {
            action: access.as_str(),
            project: project.to_string(),
            changes: ANY_CHANGES,
            protocol,
            key_id,
            user_id,
            username,
            git_protocol: git_protocol.map(str::to_string),
        }
    }
}

/// Splits an identity into the mutually exclusive API parameters
pub(crate) fn identity_params(who: &Identity) -> (Option<String>, Option<String>, Option<String>) {
    match who {
        Identity::Resolved(id) if id.is_key() => (Some(id.id().to_string()), None, None),
        Identity::Resolved(id) => (None, Some(id.id().to_string()), None),
        Identity::Pending { username } => (None, None, Some(username.clone())),
    }
}

/// Raw access check answer as returned by the internal API
#[derive(Debug, Clone, Default, Deserialize)]
pub struct AccessResponse {
    pub status: bool,
    #[serde(default)]
    pub message: Option<String>,
    #[serde(default)]
    pub repository_path: Option<String>,
    #[serde(default)]
    pub gl_repository: Option<String>,
    #[serde(default)]
    pub gl_id: Option<String>,
    #[serde(default)]
    pub gl_username: Option<String>,
    #[serde(default)]
    pub gitaly: Option<GitalyInfo>,
}

impl AccessResponse {
    pub fn denied(message: impl Into<String>) -> Self {
        Self {
            status: false,
            message: Some(message.into()),
            ..Self::default()
        }
    }
}

/// Routing hints for the RPC backend
#[derive(Debug, Clone, Default, Deserialize)]
pub struct GitalyInfo {
    pub address: String,
    #[serde(default)]
    pub token: Option<String>,
    #[serde(default)]
    pub repository: serde_json::Value,
    #[serde(default)]
    pub features: Option<BTreeMap<String, bool>>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct DiscoveredUser {
    pub id: u64,
    pub username: String,
    #[serde(default)]
    pub name: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct LfsCredentials {
    pub username: String,
    pub lfs_token: String,
    pub repository_http_path: String,
    #[serde(default)]
    pub expires_in: Option<u64>,
}

#[derive(Serialize)]
struct LfsHeader<'a> {
    #[serde(rename = "Authorization")]
    authorization: &'a str,
}

#[derive(Serialize)]
struct LfsPayload<'a> {
    header: LfsHeader<'a>,
    href: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    expires_in: Option<u64>,
}

impl LfsCredentials {
    pub fn authorization_header(&self) -> String {
        let credentials = format!("{}:{}", self.username, self.lfs_token);
        format!("Basic {}", STANDARD.encode(credentials))
    }

    /// JSON document printed back to the git-lfs client
    pub fn authentication_payload(&self) -> Result<String, ApiError> {
        let authorization = self.authorization_header();
        let payload = LfsPayload {
            header: LfsHeader {
                authorization: &authorization,
            },
            href: format!("{}/info/lfs", self.repository_http_path),
            expires_in: self.expires_in,
        };
        Ok(serde_json::to_string(&payload)?)
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct RecoveryCodesResponse {
    pub success: bool,
    #[serde(default)]
    pub recovery_codes: Vec<String>,
    #[serde(default)]
    pub message: Option<String>,
}

/// Contract of the internal authorization API
#[async_trait]
pub trait InternalApi: Send + Sync {
    /// Ask whether `request` may proceed. A refusal is `Ok` with `status == false`.
    async fn check_access(&self, request: &AccessRequest) -> Result<AccessResponse, ApiError>;

    /// Look up the user behind an identity; `None` when unknown
    async fn discover(&self, who: &Identity) -> Result<Option<DiscoveredUser>, ApiError>;

    async fn lfs_authenticate(
        &self,
        who: &GlId,
        project: &str,
        operation: LfsOperation,
    ) -> Result<Option<LfsCredentials>, ApiError>;

    async fn two_factor_recovery_codes(&self, who: &GlId) -> Result<RecoveryCodesResponse, ApiError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_access_request_for_key() {
        let who: Identity = "key-42".parse().unwrap();
        let request = AccessRequest::new(AccessClass::UploadPack, "group/repo", &who, "ssh", None);
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["action"], "git-upload-pack");
        assert_eq!(json["project"], "group/repo");
        assert_eq!(json["changes"], "_any");
        assert_eq!(json["protocol"], "ssh");
        assert_eq!(json["key_id"], "42");
        assert!(json.get("user_id").is_none());
        assert!(json.get("username").is_none());
        assert!(json.get("git_protocol").is_none());
    }

    #[test]
    fn test_access_request_for_pending_username() {
        let who: Identity = "username-alice".parse().unwrap();
        let request = AccessRequest::new(
            AccessClass::ReceivePack,
            "group/repo",
            &who,
            "ssh",
            Some("version=2"),
        );
        let json = serde_json::to_value(&request).unwrap();

        assert_eq!(json["username"], "alice");
        assert_eq!(json["git_protocol"], "version=2");
        assert!(json.get("key_id").is_none());
    }

    #[test]
    fn test_access_response_without_gitaly() {
        let response: AccessResponse = serde_json::from_str(
            r#"{"status": true, "repository_path": "/repos/group/repo.git", "gl_repository": "project-1", "gl_username": "alice"}"#,
        )
        .unwrap();

        assert!(response.status);
        assert!(response.gitaly.is_none());
        assert_eq!(response.gl_username.as_deref(), Some("alice"));
    }

    #[test]
    fn test_lfs_payload() {
        let credentials = LfsCredentials {
            username: "alice".to_string(),
            lfs_token: "secret".to_string(),
            repository_http_path: "https://gitlab.example.com/group/repo.git".to_string(),
            expires_in: Some(1800),
        };

        let payload: serde_json::Value =
            serde_json::from_str(&credentials.authentication_payload().unwrap()).unwrap();

        assert_eq!(payload["header"]["Authorization"], "Basic YWxpY2U6c2VjcmV0");
        assert_eq!(
            payload["href"],
            "https://gitlab.example.com/group/repo.git/info/lfs"
        );
        assert_eq!(payload["expires_in"], 1800);
    }

    #[test]
    fn test_lfs_payload_without_expiry() {
        let credentials = LfsCredentials {
            username: "alice".to_string(),
            lfs_token: "secret".to_string(),
            repository_http_path: "https://gitlab.example.com/group/repo.git".to_string(),
            expires_in: None,
        };

        let payload = credentials.authentication_payload().unwrap();
        assert!(!payload.contains("expires_in"));
    }
}
