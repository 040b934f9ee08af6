//! # quill-core - Runtime for the Quill coding agent
//!
//! `quill-core` powers the Quill terminal coding agent. It provides the
//! reusable building blocks for multi-provider LLM orchestration, safety-
//! gated tool execution, structured file edits, and bounded-memory session
//! history.
//!
//! ## Highlights
//!
//! - **Provider Abstraction**: one streaming interface over Gemini and
//!   OpenAI, with per-provider wire translation, tool-schema mapping, and
//!   incremental tool-call assembly.
//! - **Tool System**: a categorised registry of typed tools for file IO,
//!   structured edits (text replacement, line ranges, unified diffs,
//!   context-marker patches), search, and process execution, each guarded
//!   by workspace-boundary checks and a typed failure taxonomy.
//! - **Session Store**: append-only per-session event logs with a
//!   compaction-aware read view, so long conversations stay inside the
//!   model's context window.
//! - **Compaction**: a sliding-window selector plus LLM-written summaries
//!   that replace the oldest invocations while keeping a configurable
//!   overlap.
//! - **Agent Loop**: streaming turn orchestration with approval gating,
//!   checkpoint hooks, per-category deadlines, and a panic boundary around
//!   every tool call.
//!
//! ## Architecture Overview
//!
//! - `config/`: runtime settings plus centralized constants.
//! - `llm/`: the neutral content model, provider trait, and adapters.
//! - `models/`: the model catalogue and `provider/model` resolver.
//! - `tools/`: built-in tools and the registry.
//! - `session/`: the event store.
//! - `compaction/`: selector and summarizer.
//! - `agent/`: the loop and its policies.
//! - `telemetry/`: token accounting.
//!
//! ## Quickstart
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use quill_core::agent::Agent;
//! use quill_core::llm::create_provider;
//! use quill_core::models::{Backend, ModelResolver};
//! use quill_core::session::{InMemorySessionStore, SessionStore};
//! use quill_core::tools::builtin_registry;
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let resolver = ModelResolver::default();
//!     let resolved = resolver.resolve_str("gemini/flash", None)?;
//!     let provider = create_provider(
//!         resolved.descriptor.backend,
//!         std::env::var("GOOGLE_API_KEY")?,
//!         None,
//!     )?;
//!
//!     let store = InMemorySessionStore::new();
//!     let session = store.create("local", "default").await?;
//!     let agent = Agent::new(
//!         provider,
//!         resolved.descriptor.id.clone(),
//!         Arc::new(builtin_registry()),
//!         session,
//!         std::env::current_dir()?,
//!     );
//!
//!     let outcome = agent
//!         .run_turn("What does this repository do?", Default::default())
//!         .await?;
//!     println!("{outcome:?}");
//!     Ok(())
//! }
//! ```

pub mod agent;
pub mod compaction;
pub mod config;
pub mod llm;
pub mod models;
pub mod project_doc;
pub mod session;
pub mod telemetry;
pub mod tools;
pub mod utils;

pub use agent::{Agent, TurnOutcome};
pub use config::QuillConfig;
pub use models::{ModelRef, ModelResolver};
pub use session::{InMemorySessionStore, Session, SessionStore};
pub use tools::{ToolRegistry, builtin_registry};
