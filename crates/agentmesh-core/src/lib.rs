// agentmesh-core - shared resource types and reconciliation primitives
//
// This crate provides the declarative resource types (Agent, ModelConfig,
// ToolServer/MCPServer, Memory, Team), the generated AgentConfig document,
// identifier canonicalization between resource names and the runtime's
// token language, and the resource registries both the controller and the
// runtime read against.

pub mod agent;
pub mod config;
pub mod error;
pub mod identifier;
pub mod memory;
pub mod model;
pub mod registry;
pub mod resource;
pub mod toolserver;
pub mod workflow;

// Re-export core types
pub use agent::{
    Agent, AgentSpec, ByoAgentSpec, DeclarativeAgentSpec, DeploymentHints, InlineToolRef, ToolRef,
    WorkflowAgentSpec,
};
pub use config::{
    AgentConfig, EmbeddingSection, HttpToolSection, MemorySection, ModelSection,
    RemoteAgentSection, SseToolSection, WorkflowSection,
};
pub use error::{AgentMeshError, AgentMeshResult};
pub use identifier::{canon, from_runtime, is_rfc1123_label, to_runtime};
pub use memory::{Memory, MemoryBackendKind, MemorySpec, PopularityExtensionPolicy};
pub use model::{ModelConfig, ModelConfigSpec, TlsTrust};
pub use registry::{
    AgentRegistry, MemoryRegistry, ModelConfigRegistry, Registry, ResourceManager, ResourceStore,
    TeamRegistry, ToolServerRegistry,
};
pub use resource::{
    AcceptedStatus, Condition, ConditionStatus, ObjectMeta, Resource, ResourceKind, ResourceRef,
};
pub use toolserver::{ToolServer, ToolServerSpec, ToolServerTransport};
pub use workflow::{LoopSpec, ParallelSpec, SequentialSpec, Team, TeamSpec, WorkflowPattern};

/// Version information
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

/// Default port the per-agent runtime listens on; used when synthesizing
/// remote-agent endpoint URLs (§4.3).
pub const DEFAULT_AGENT_PORT: u16 = 8080;

/// Default cap on model round-trips within a single task before the Event
/// Pipeline forces a terminal `budget-exceeded` error (§4.7).
pub const DEFAULT_MAX_STEPS: u32 = 25;
