pub mod environment;
pub mod executor;
pub mod gitaly;
pub mod router;

// Re-export commonly used types
pub use environment::{EnvironmentBuilder, ExecutionEnvironment, PassthroughEnv};
pub use executor::{ExecLauncher, ProcessInvocation, ProcessLauncher};
pub use gitaly::{RemoteRequest, feature_metadata};
pub use router::{DispatchPlan, ExecutionRouter};

/// Protocol tag sent to the API and exported to spawned processes
pub const GL_PROTOCOL: &str = "ssh";
