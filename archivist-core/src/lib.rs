//! Campaign archivist: retrieval-augmented answers about a role-playing campaign.
//!
//! This crate provides:
//! - A read-only record store of events and entities with semantic search
//! - Six retrieval tools the model can call
//! - Best-effort correction of misspelled entity names
//! - A bounded tool-use loop and the trace of the tools it called
//!
//! # Quick Start
//!
//! ```ignore
//! use archivist_core::{Archivist, ArchivistConfig, HashingEmbedder, MemoryStore};
//! use std::sync::Arc;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let config = ArchivistConfig::from_env()?;
//!     let store = MemoryStore::open(&config.db_path, Arc::new(HashingEmbedder::new())).await?;
//!     let engine = Arc::new(claude::Claude::from_env()?);
//!
//!     let archivist = Archivist::new(config, engine, Arc::new(store)).await?;
//!     let answer = archivist.ask("Who is Thalantyr?").await?;
//!     println!("{}", answer.answer);
//!     Ok(())
//! }
//! ```

pub mod archivist;
pub mod config;
pub mod corrector;
pub mod engine;
pub mod orchestrator;
pub mod pool;
pub mod store;
pub mod testing;
pub mod tools;
pub mod trace;
pub mod transcript;

// Re-export for convenience
pub use archivist_macros::Tool;

// Primary public API
pub use archivist::{
    store_health, Answer, Archivist, AskError, HealthReport, HealthStatus, StoreStats,
};
pub use config::{ArchivistConfig, ConfigError};
pub use corrector::NameCorrector;
pub use engine::CompletionEngine;
pub use orchestrator::{Orchestrator, OrchestratorError, Run};
pub use pool::{PoolError, WorkerPool};
pub use store::{
    CampaignSnapshot, Collection, Embedder, HashingEmbedder, HttpEmbedder, MemoryStore,
    RecordStore, StoreError,
};
pub use testing::{ScriptedEngine, ScriptedTurn};
pub use trace::{extract_trace, ToolInvocationRecord, Trace};
pub use tools::{CampaignTools, ToolCall, ToolError};
