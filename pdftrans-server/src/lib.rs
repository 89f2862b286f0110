//! # pdftrans-server
//!
//! The workflow entry point and HTTP streaming surface for the PDF
//! translation agent runtime.
//!
//! - [`run_translation_workflow`] - drive one task end to end and return its
//!   result
//! - [`stream_translation`] - the `GET /sse/translation/{task_id}` handler
//! - [`create_router`] - mounts `stream_translation` behind CORS and
//!   request-trace layers
//! - [`TaskDirectory`] - the liveness interface the SSE endpoint consults
//!   instead of reaching into orchestrator internals
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use pdftrans_server::{run_translation_workflow, InMemoryTaskDirectory, WorkflowDeps, WorkflowRequest};
//! use std::sync::Arc;
//!
//! # async fn example(orchestrator: Arc<pdftrans_agents::OrchestratorAgent>) -> pdftrans_core::Result<()> {
//! let deps = WorkflowDeps { orchestrator, directory: Arc::new(InMemoryTaskDirectory::new()) };
//! let request = WorkflowRequest::new(vec![], "paper.pdf");
//! let result = run_translation_workflow(&deps, request).await?;
//! println!("{}", result.task_id);
//! # Ok(())
//! # }
//! ```

pub mod directory;
pub mod sse;
pub mod workflow;

pub use directory::{InMemoryTaskDirectory, TaskDirectory, TaskOutcome};
pub use sse::{create_router, stream_translation, SseState};
pub use workflow::{run_translation_workflow, PromptProfileSummary, WorkflowDeps, WorkflowRequest, WorkflowResult};
