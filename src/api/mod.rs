pub mod client;
pub mod gitlab;

pub use client::{
    AccessRequest, AccessResponse, ApiError, DiscoveredUser, GitalyInfo, InternalApi,
    LfsCredentials, RecoveryCodesResponse,
};
pub use gitlab::GitlabApiClient;
