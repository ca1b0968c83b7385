//! Per-agent execution runtime (§4.6-§4.10, §6): accepts inbound messages,
//! drives the Event Pipeline's model/tool round-trip loop, executes
//! Sequential/Parallel/Loop sub-agent workflows, and exposes the agent's
//! HTTP surface.

pub mod agent_card;
pub mod error;
pub mod intake;
pub mod model;
pub mod pipeline;
pub mod protocol;
pub mod server;
pub mod session;
pub mod tools;
pub mod wire;
pub mod workflow_executor;
pub mod workflow_runner;

pub use error::{RuntimeError, RuntimeResult};
pub use server::{router, RuntimeState};
