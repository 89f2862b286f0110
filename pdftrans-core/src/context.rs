use crate::error::{PdfTransError, Result};
use crate::types::{PaperMetadata, PipelineType, ParsedDocument, PromptProfile, QualityReport};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// A single atomic cancellation flag scoped to one `AgentContext`.
///
/// `check()` surfaces a distinguished `PdfTransError::Cancelled`; agents call
/// it on entry and between meaningful sub-steps (between pages, between
/// retries, around each remote call). A cancelled token is never retried.
#[derive(Clone, Default)]
pub struct CancellationToken {
    cancelled: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.cancelled.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.cancelled.load(Ordering::SeqCst)
    }

    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            Err(PdfTransError::Cancelled)
        } else {
            Ok(())
        }
    }
}

/// Receiver-side handle agents use to publish progress events for one task,
/// decoupled from the concrete `EventBus` implementation (which lives in the
/// sibling `pdftrans-eventbus` crate and is never depended on by core types).
pub trait EventPublisher: Send + Sync {
    fn publish(&self, event: crate::event::Event);
}

/// A publisher that drops every event. Useful for tests and for standalone
/// agent invocations (e.g. `TerminologyAgent` in `extract` mode) that don't
/// participate in a streamed task.
pub struct NullPublisher;

impl EventPublisher for NullPublisher {
    fn publish(&self, _event: crate::event::Event) {}
}

/// The sole mutable object shared across agents for one translation task.
///
/// Modeled as a plain struct with explicit optionals rather than a dynamic
/// attribute bag: agents discriminate on which fields are populated, never
/// on a type hierarchy.
pub struct AgentContext {
    pub task_id: String,
    pub filename: String,
    pub file_content: Vec<u8>,
    pub event_bus: Arc<dyn EventPublisher>,
    pub enable_ocr: bool,
    pub pipeline_type: PipelineType,
    pub parsed_pdf: Option<ParsedDocument>,
    pub ocr_md: Option<String>,
    pub ocr_images: HashMap<String, Vec<u8>>,
    pub glossary: HashMap<String, String>,
    pub prompt_profile: Option<PromptProfile>,
    pub translated_md: String,
    pub images: HashMap<String, Vec<u8>>,
    pub quality_report: Option<QualityReport>,
    pub paper_metadata: Option<PaperMetadata>,
    pub translation_id: Option<String>,
    pub cancellation_token: CancellationToken,
}

impl AgentContext {
    pub fn new(task_id: impl Into<String>, filename: impl Into<String>, file_content: Vec<u8>) -> Self {
        Self {
            task_id: task_id.into(),
            filename: filename.into(),
            file_content,
            event_bus: Arc::new(NullPublisher),
            enable_ocr: false,
            pipeline_type: PipelineType::None,
            parsed_pdf: None,
            ocr_md: None,
            ocr_images: HashMap::new(),
            glossary: HashMap::new(),
            prompt_profile: None,
            translated_md: String::new(),
            images: HashMap::new(),
            quality_report: None,
            paper_metadata: None,
            translation_id: None,
            cancellation_token: CancellationToken::new(),
        }
    }

    pub fn with_event_bus(mut self, event_bus: Arc<dyn EventPublisher>) -> Self {
        self.event_bus = event_bus;
        self
    }

    pub fn with_enable_ocr(mut self, enable_ocr: bool) -> Self {
        self.enable_ocr = enable_ocr;
        self
    }

    pub fn with_cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancellation_token = token;
        self
    }

    pub fn publish(&self, event: crate::event::Event) {
        self.event_bus.publish(event);
    }

    /// Fold newly discovered glossary entries in. `glossary` is monotonic
    /// within one run: existing entries are never overwritten.
    pub fn merge_glossary(&mut self, entries: impl IntoIterator<Item = (String, String)>) {
        for (en, zh) in entries {
            self.glossary.entry(en).or_insert(zh);
        }
    }
}
