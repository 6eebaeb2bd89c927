use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use tokio::sync::OnceCell;
use tracing::debug;

use crate::api::{DiscoveredUser, InternalApi};

#[derive(Debug, Error, PartialEq, Eq)]
pub enum IdentityError {
    #[error("Unrecognized identity: {0}")]
    Unrecognized(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyType {
    Key,
    User,
}

impl KeyType {
    pub fn as_str(self) -> &'static str {
        match self {
            KeyType::Key => "key",
            KeyType::User => "user",
        }
    }
}

/// A concrete identifier such as `key-123` or `user-45`
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GlId {
    key_type: KeyType,
    id: String,
}

impl GlId {
    pub fn key(id: impl Into<String>) -> Self {
        Self {
            key_type: KeyType::Key,
            id: id.into(),
        }
    }

    pub fn user(id: impl Into<String>) -> Self {
        Self {
            key_type: KeyType::User,
            id: id.into(),
        }
    }

    pub fn key_type(&self) -> KeyType {
        self.key_type
    }

    pub fn id(&self) -> &str {
        &self.id
    }

    pub fn is_key(&self) -> bool {
        self.key_type == KeyType::Key
    }
}

impl fmt::Display for GlId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.key_type.as_str(), self.id)
    }
}

fn numeric(value: &str) -> Option<&str> {
    (!value.is_empty() && value.bytes().all(|b| b.is_ascii_digit())).then_some(value)
}

impl FromStr for GlId {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(id) = s.strip_prefix("key-").and_then(numeric) {
            return Ok(GlId::key(id));
        }
        if let Some(id) = s.strip_prefix("user-").and_then(numeric) {
            return Ok(GlId::user(id));
        }
        Err(IdentityError::Unrecognized(s.to_string()))
    }
}

/// Who is calling: either already identified, or a username still to be looked up
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Identity {
    Resolved(GlId),
    Pending { username: String },
}

impl FromStr for Identity {
    type Err = IdentityError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        if let Some(username) = s.strip_prefix("username-") {
            if username.is_empty() {
                return Err(IdentityError::Unrecognized(s.to_string()));
            }
            return Ok(Identity::Pending {
                username: username.to_string(),
            });
        }
        s.parse().map(Identity::Resolved)
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Identity::Resolved(id) => fmt::Display::fmt(id, f),
            Identity::Pending { username } => write!(f, "username-{}", username),
        }
    }
}

/// The caller of one invocation, with its discovery result memoized
#[derive(Debug)]
pub struct Principal {
    identity: Identity,
    discovered: OnceCell<Option<DiscoveredUser>>,
}

impl Principal {
    pub fn new(identity: Identity) -> Self {
        Self {
            identity,
            discovered: OnceCell::new(),
        }
    }

    pub fn identity(&self) -> &Identity {
        &self.identity
    }

    /// Look up the user behind this identity, at most once.
    ///
    /// An unreachable API yields `None` instead of an error so that the
    /// welcome banner still works without the API.
    pub async fn discover(&self, api: &dyn InternalApi) -> Option<&DiscoveredUser> {
        let identity = &self.identity;
        self.discovered
            .get_or_init(|| async move {
                match api.discover(identity).await {
                    Ok(user) => user,
                    Err(err) => {
                        debug!(identity = %identity, error = %err, "identity discovery failed");
                        None
                    }
                }
            })
            .await
            .as_ref()
    }

    /// Concrete identifier, discovering it for a pending username
    pub async fn resolve(&self, api: &dyn InternalApi) -> Option<GlId> {
        match &self.identity {
            Identity::Resolved(id) => Some(id.clone()),
            Identity::Pending { .. } => self
                .discover(api)
                .await
                .map(|user| GlId::user(user.id.to_string())),
        }
    }

    /// `@username` from an earlier discovery; never calls the API
    pub fn known_display_name(&self) -> Option<String> {
        self.discovered
            .get()?
            .as_ref()
            .map(|user| format!("@{}", user.username))
    }

    /// `@username` when known, `Anonymous` otherwise
    pub async fn display_name(&self, api: &dyn InternalApi) -> String {
        match self.discover(api).await {
            Some(user) => format!("@{}", user.username),
            None => "Anonymous".to_string(),
        }
    }
}
