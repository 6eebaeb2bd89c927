use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::access::{AccessDecision, RemoteCallInfo};
use crate::git::GL_PROTOCOL;

/// Request document handed to a remote-call shim as its second argument
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteRequest {
    pub repository: serde_json::Value,
    pub gl_repository: String,
    pub gl_id: String,
    pub gl_username: String,
    pub protocol: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub git_protocol: Option<String>,
    /// Feature flags forwarded as call metadata
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub metadata: BTreeMap<String, String>,
}

impl RemoteRequest {
    pub fn new(remote: &RemoteCallInfo, decision: &AccessDecision, git_protocol: Option<&str>) -> Self {
        Self {
            repository: remote.repository.clone(),
            gl_repository: decision.gl_repository().to_string(),
            gl_id: decision.gl_id().to_string(),
            gl_username: decision.gl_username().to_string(),
            protocol: GL_PROTOCOL.to_string(),
            git_protocol: git_protocol.map(str::to_string),
            metadata: feature_metadata(decision.feature_flags()),
        }
    }

    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }
}

/// Turn feature flags into string metadata, one entry per flag present.
///
/// Keys are the flag names exactly as the API sent them; the shim owns any
/// transport prefix such as `gitaly-feature-`. Flags the API did not send are
/// left out, never defaulted to `"false"`.
pub fn feature_metadata(flags: Option<&BTreeMap<String, bool>>) -> BTreeMap<String, String> {
    flags
        .into_iter()
        .flatten()
        .map(|(name, enabled)| (name.clone(), enabled.to_string()))
        .collect()
}
