pub mod decision;
pub mod identity;
pub mod verifier;

pub use decision::{AccessDecision, RemoteCallInfo};
pub use identity::{GlId, Identity, IdentityError, KeyType, Principal};
pub use verifier::AccessVerifier;
