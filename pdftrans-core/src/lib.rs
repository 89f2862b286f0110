//! # pdftrans-core
//!
//! Core traits and types for the PDF translation agent runtime.
//!
//! - [`Agent`] / [`ContextAgent`] — the fundamental agent contract.
//! - [`AgentRegistry`] — type-indexed constructor lookup for dynamic wiring.
//! - [`AgentContext`] — the mutable record threaded through one task.
//! - [`CancellationToken`] — scoped cooperative cancellation.
//! - [`Event`] — the wire shape published on the `EventBus`.
//! - Shared value types: [`QualityReport`], [`GlossaryEntry`], [`PaperMetadata`],
//!   [`PromptProfile`].

pub mod agent;
pub mod context;
pub mod error;
pub mod event;
pub mod types;

pub use agent::{Agent, AgentRegistry, ContextAgent};
pub use context::{AgentContext, CancellationToken, EventPublisher, NullPublisher};
pub use error::{PdfTransError, Result};
pub use event::Event;
pub use types::{
    FormatIssue, FormatIssueKind, GlossaryEntry, GlossaryFile, MergeConflict, PaperMetadata,
    ParsedDocument, ParsedPage, PipelineResult, PipelineType, PromptProfile, QualityReport,
    TermIssue, TextBlock,
};
