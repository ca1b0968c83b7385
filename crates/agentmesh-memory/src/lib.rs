//! Agent memory backends — resolves a `Memory` resource's `backend` field
//! into a running store (§4.10).
//!
//! ## Memory Backends
//!
//! - **InMemoryBackend**: lock-free, ephemeral, cleared on restart (default)
//! - **FileBackend**: persistent JSON file storage that survives restarts
//! - **VectorServiceBackend**: opaque connector to an external vector service
//!
//! ## Usage
//!
//! ```rust,no_run
//! use agentmesh_memory::SimpleMemory;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let memory = SimpleMemory::in_memory();
//! let memory = SimpleMemory::file("./agent-memory.json").await?;
//! # Ok(())
//! # }
//! ```

pub mod backend;
pub mod entry;
pub mod error;
pub mod query;

pub use backend::file::FileBackend;
pub use backend::memory::InMemoryBackend;
pub use backend::vector_service::VectorServiceBackend;
pub use backend::{MemoryBackend, SimpleMemory};
pub use entry::MemoryEntry;
pub use error::{MemoryError, MemoryResult};
pub use query::MemoryQuery;
