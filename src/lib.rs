pub mod access;
pub mod api;
pub mod audit;
pub mod config;
pub mod error;
pub mod error_translation;
pub mod gateway;
pub mod git;
pub mod handlers;
pub mod security;

// Re-export commonly used types for convenience
pub use access::{AccessDecision, GlId, Identity, Principal};
pub use api::{GitlabApiClient, InternalApi};
pub use config::Config;
pub use error::{AppError, AppResult, GatewayError, GatewayResult};
pub use gateway::{Gateway, Invocation};
pub use git::{DispatchPlan, ExecLauncher, ProcessInvocation, ProcessLauncher};
pub use security::{CommandValidator, IncomingCommand, Verb};
