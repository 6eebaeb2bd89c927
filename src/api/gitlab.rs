use std::time::Duration;

use async_trait::async_trait;
use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use reqwest::{Client, RequestBuilder, Response};
use serde::Serialize;
use tracing::debug;

use crate::access::identity::{GlId, Identity};
use crate::api::client::{
    AccessRequest, AccessResponse, ApiError, DiscoveredUser, InternalApi, LfsCredentials,
    RecoveryCodesResponse, identity_params,
};
use crate::config::Config;
use crate::security::LfsOperation;

const INTERNAL_API_PATH: &str = "/api/v4/internal";
const SECRET_HEADER: &str = "Gitlab-Shared-Secret";
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Message used when the API answers an access check with an error status
pub const API_NOT_ACCESSIBLE: &str = "API is not accessible";

#[derive(Serialize)]
struct LfsAuthenticateRequest<'a> {
    project: &'a str,
    operation: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

#[derive(Serialize)]
struct RecoveryCodesRequest<'a> {
    #[serde(skip_serializing_if = "Option::is_none")]
    key_id: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    user_id: Option<&'a str>,
}

fn id_params(who: &GlId) -> (Option<&str>, Option<&str>) {
    if who.is_key() {
        (Some(who.id()), None)
    } else {
        (None, Some(who.id()))
    }
}

/// HTTP client for the GitLab internal API
pub struct GitlabApiClient {
    base_url: String,
    secret: Option<String>,
    basic_auth: Option<(String, String)>,
    http_client: Client,
}

impl GitlabApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self, ApiError> {
        Self::with_timeout(base_url, DEFAULT_TIMEOUT)
    }

    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Result<Self, ApiError> {
        let http_client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ApiError::RequestFailed(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            secret: None,
            basic_auth: None,
            http_client,
        })
    }

    pub fn from_config(config: &Config) -> Result<Self, ApiError> {
        let timeout = Duration::from_secs(config.http_settings.read_timeout_seconds);
        let mut client = Self::with_timeout(&config.gitlab_url, timeout)?;

        client.secret = config
            .secret()
            .map_err(|e| ApiError::RequestFailed(format!("Failed to read secret: {}", e)))?;

        if let (Some(user), Some(password)) =
            (&config.http_settings.user, &config.http_settings.password)
        {
            client.basic_auth = Some((user.clone(), password.clone()));
        }

        Ok(client)
    }

    pub fn with_secret(mut self, secret: impl Into<String>) -> Self {
        self.secret = Some(secret.into());
        self
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{}/{}", self.base_url, INTERNAL_API_PATH, path)
    }

    fn authorize(&self, builder: RequestBuilder) -> RequestBuilder {
        let mut builder = builder;

        if let Some(secret) = &self.secret {
            builder = builder.header(SECRET_HEADER, STANDARD.encode(secret.trim()));
        }

        if let Some((user, password)) = &self.basic_auth {
            builder = builder.basic_auth(user, Some(password));
        }

        builder
    }

    async fn post<T: Serialize + ?Sized>(&self, path: &str, body: &T) -> Result<Response, ApiError> {
        self.authorize(self.http_client.post(self.endpoint(path)))
            .json(body)
            .send()
            .await
            .map_err(classify)
    }

    async fn get(&self, path: &str, query: &[(&str, &str)]) -> Result<Response, ApiError> {
        self.authorize(self.http_client.get(self.endpoint(path)))
            .query(query)
            .send()
            .await
            .map_err(classify)
    }
}

/// Any failure to complete the round trip is unreachable: refused or dropped
/// connections, timeouts and truncated bodies. Only a finished exchange with an
/// unusable answer is an invalid response.
fn classify(err: reqwest::Error) -> ApiError {
    if err.is_decode() {
        ApiError::InvalidResponse(err.to_string())
    } else if err.is_connect() || err.is_timeout() || err.is_request() || err.is_body() {
        ApiError::Unreachable(err.to_string())
    } else {
        ApiError::RequestFailed(err.to_string())
    }
}

async fn error_message(response: Response) -> Option<String> {
    let body: serde_json::Value = response.json().await.ok()?;
    body.get("message")?.as_str().map(str::to_string)
}

#[async_trait]
impl InternalApi for GitlabApiClient {
    async fn check_access(&self, request: &AccessRequest) -> Result<AccessResponse, ApiError> {
        debug!(action = request.action, project = %request.project, "performing access check");

        let response = self.post("allowed", request).await?;

        if !response.status().is_success() {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| API_NOT_ACCESSIBLE.to_string());
            return Ok(AccessResponse::denied(message));
        }

        response.json().await.map_err(classify)
    }

    async fn discover(&self, who: &Identity) -> Result<Option<DiscoveredUser>, ApiError> {
        let (key_id, user_id, username) = identity_params(who);
        let query: Vec<(&str, &str)> = [
            ("key_id", key_id.as_deref()),
            ("user_id", user_id.as_deref()),
            ("username", username.as_deref()),
        ]
        .into_iter()
        .filter_map(|(name, value)| value.map(|v| (name, v)))
        .collect();

        let response = self.get("discover", &query).await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        response.json().await.map_err(classify)
    }

    async fn lfs_authenticate(
        &self,
        who: &GlId,
        project: &str,
        operation: LfsOperation,
    ) -> Result<Option<LfsCredentials>, ApiError> {
        let (key_id, user_id) = id_params(who);
        let body = LfsAuthenticateRequest {
            project,
            operation: operation.as_str(),
            key_id,
            user_id,
        };

        let response = self.post("lfs_authenticate", &body).await?;

        if !response.status().is_success() {
            return Ok(None);
        }

        response.json().await.map(Some).map_err(classify)
    }

    async fn two_factor_recovery_codes(&self, who: &GlId) -> Result<RecoveryCodesResponse, ApiError> {
        let (key_id, user_id) = id_params(who);
        let body = RecoveryCodesRequest { key_id, user_id };

        let response = self.post("two_factor_recovery_codes", &body).await?;

        if !response.status().is_success() {
            let message = error_message(response)
                .await
                .unwrap_or_else(|| API_NOT_ACCESSIBLE.to_string());
            return Ok(RecoveryCodesResponse {
                success: false,
                recovery_codes: Vec::new(),
                message: Some(message),
            });
        }

        response.json().await.map_err(classify)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_endpoint_strips_trailing_slash() {
        let client = GitlabApiClient::new("http://localhost:8080/").unwrap();
        assert_eq!(
            client.endpoint("allowed"),
            "http://localhost:8080/api/v4/internal/allowed"
        );
    }

    #[test]
    fn test_id_params() {
        let key: GlId = "key-7".parse().unwrap();
        assert_eq!(id_params(&key), (Some("7"), None));

        let user: GlId = "user-9".parse().unwrap();
        assert_eq!(id_params(&user), (None, Some("9")));
    }
}
