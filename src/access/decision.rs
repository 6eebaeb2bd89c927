use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use crate::access::identity::GlId;

/// Where and how to reach the RPC backend for this repository
#[derive(Debug, Clone, PartialEq)]
pub struct RemoteCallInfo {
    pub address: String,
    /// Backend repository descriptor, passed through untouched
    pub repository: serde_json::Value,
    pub token: Option<String>,
}

/// An allowed access check. Refusals never become a decision.
#[derive(Debug, Clone, PartialEq)]
pub struct AccessDecision {
    pub(crate) repository_path: PathBuf,
    pub(crate) gl_id: GlId,
    pub(crate) gl_repository: String,
    pub(crate) gl_username: String,
    pub(crate) remote_call: Option<RemoteCallInfo>,
    pub(crate) feature_flags: Option<BTreeMap<String, bool>>,
}

impl AccessDecision {
    /// Absolute on-disk path of the repository
    pub fn repository_path(&self) -> &Path {
        &self.repository_path
    }

    pub fn gl_id(&self) -> &GlId {
        &self.gl_id
    }

    pub fn gl_repository(&self) -> &str {
        &self.gl_repository
    }

    pub fn gl_username(&self) -> &str {
        &self.gl_username
    }

    pub fn remote_call(&self) -> Option<&RemoteCallInfo> {
        self.remote_call.as_ref()
    }

    /// Flags as sent by the API. A flag missing here is not the same as `false`.
    pub fn feature_flags(&self) -> Option<&BTreeMap<String, bool>> {
        self.feature_flags.as_ref()
    }
}
