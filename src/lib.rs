//! # pdftrans
//!
//! Agent orchestration runtime for English-to-Chinese academic PDF
//! translation: a fixed pipeline of cooperating agents (terminology, OCR
//! routing, translation, review, indexing) coordinated by an
//! [`OrchestratorAgent`](pdftrans_agents::OrchestratorAgent), streamed to
//! clients over Server-Sent Events.
//!
//! ## Quick Start
//!
//! ```toml
//! [dependencies]
//! # Everything: agents, stores, workflow entry point and SSE endpoint.
//! pdftrans = "0.1"
//!
//! # Core types and the event bus only, no concrete agents or stores.
//! pdftrans = { version = "0.1", default-features = false }
//!
//! # Agents and stores, no HTTP/SSE surface.
//! pdftrans = { version = "0.1", default-features = false, features = ["agents", "store"] }
//! ```
//!
//! ```rust,no_run
//! use pdftrans::{AgentContext, Event};
//!
//! # fn example() {
//! let ctx = AgentContext::new("task-1", "paper.pdf", vec![]);
//! ctx.publish(Event::new("orchestrator", "started", 0));
//! # }
//! ```

#![warn(missing_docs)]

/// Core traits and types: [`Agent`], [`AgentContext`], [`Event`],
/// [`QualityReport`] and friends. Always available regardless of feature
/// flags.
pub use pdftrans_core::*;

/// The in-process publish/subscribe event fan-out (`EventBus`). Always
/// available: the workflow entry point and the SSE endpoint both depend on
/// it, and it has no optional dependencies of its own.
pub use pdftrans_eventbus::*;

/// The concrete agents (`OrchestratorAgent`, `OCRAgent`, `TranslationAgent`,
/// `ReviewAgent`, `TerminologyAgent`, `IndexAgent`) and the `services`
/// trait boundary they depend on.
#[cfg(feature = "agents")]
pub use pdftrans_agents as agents;

/// The persistent stores: per-domain glossary files, the SQLite+FTS5 paper
/// repository, and the filesystem-backed translation result store.
#[cfg(feature = "store")]
pub use pdftrans_store as store;

/// The workflow entry point (`run_translation_workflow`) and the SSE
/// streaming endpoint.
#[cfg(feature = "server")]
pub use pdftrans_server as server;
