//! The single entry point production callers (the HTTP layer, a CLI, a test
//! harness) use to run one translation task end to end: `run_translation_workflow`.
//! Grounded on `adk-server`'s `rest/controllers/runtime.rs`, which wraps an
//! `Agent::run` invocation in request construction, id generation and a
//! serializable response shape the transport layer can hand back as-is.

use crate::directory::{TaskDirectory, TaskOutcome};
use pdftrans_agents::OrchestratorAgent;
use pdftrans_core::{AgentContext, CancellationToken, ContextAgent, EventPublisher, Result};
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;

/// Collaborators `run_translation_workflow` needs beyond the request itself:
/// the orchestrator to drive and the directory to report liveness through.
pub struct WorkflowDeps {
    pub orchestrator: Arc<OrchestratorAgent>,
    pub directory: Arc<dyn TaskDirectory>,
}

/// Caller-supplied inputs for one translation run. `task_id` and
/// `cancellation_token` are optional: absent, the workflow generates its own.
pub struct WorkflowRequest {
    pub file_content: Vec<u8>,
    pub filename: String,
    pub task_id: Option<String>,
    pub enable_ocr: bool,
    pub cancellation_token: Option<CancellationToken>,
    pub event_bus: Option<Arc<dyn EventPublisher>>,
}

impl WorkflowRequest {
    pub fn new(file_content: Vec<u8>, filename: impl Into<String>) -> Self {
        Self {
            file_content,
            filename: filename.into(),
            task_id: None,
            enable_ocr: false,
            cancellation_token: None,
            event_bus: None,
        }
    }
}

/// The `prompt_profile` slice of a `WorkflowResult`: counts rather than the
/// full terminology map, matching the wire shape in spec §6.
#[derive(Debug, Clone, Serialize)]
pub struct PromptProfileSummary {
    pub domain: String,
    pub terminology_count: usize,
    pub keep_english: Vec<String>,
    pub generated_prompt: String,
}

/// The workflow entry's return value: everything a caller needs without
/// reaching back into the orchestrator or the stores.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowResult {
    pub task_id: String,
    pub translation_id: Option<String>,
    pub markdown: String,
    pub translated_md: String,
    pub ocr_markdown: Option<String>,
    pub images: HashMap<String, Vec<u8>>,
    pub ocr_images: HashMap<String, Vec<u8>>,
    pub quality_report: Option<pdftrans_core::QualityReport>,
    pub glossary: HashMap<String, String>,
    pub prompt_profile: Option<PromptProfileSummary>,
}

fn generate_task_id() -> String {
    uuid::Uuid::new_v4().simple().to_string()[..8].to_string()
}

/// Runs one translation task to completion and returns the in-memory
/// result. Progress is observable concurrently through the `EventBus` the
/// caller wired into `request.event_bus` (or the SSE endpoint's
/// subscription to the same `task_id`); this call does not itself stream
/// anything, it just drives the orchestrator and reports liveness via
/// `deps.directory`.
pub async fn run_translation_workflow(deps: &WorkflowDeps, request: WorkflowRequest) -> Result<WorkflowResult> {
    let task_id = request.task_id.unwrap_or_else(generate_task_id);

    let mut ctx = AgentContext::new(task_id.clone(), request.filename, request.file_content)
        .with_enable_ocr(request.enable_ocr);
    if let Some(token) = request.cancellation_token {
        ctx = ctx.with_cancellation_token(token);
    }
    if let Some(bus) = request.event_bus {
        ctx = ctx.with_event_bus(bus);
    }

    deps.directory.mark_running(&task_id);

    let outcome = deps.orchestrator.run(ctx).await;

    let result = match outcome {
        Ok(ctx) => {
            let prompt_profile = ctx.prompt_profile.as_ref().map(|p| PromptProfileSummary {
                domain: p.domain.clone(),
                terminology_count: p.terminology.len(),
                keep_english: p.keep_english.clone(),
                generated_prompt: p.generated_prompt.clone(),
            });

            let result = WorkflowResult {
                task_id: ctx.task_id.clone(),
                translation_id: ctx.translation_id.clone(),
                markdown: ctx.translated_md.clone(),
                translated_md: ctx.translated_md.clone(),
                ocr_markdown: ctx.ocr_md.clone(),
                images: ctx.images.clone(),
                ocr_images: ctx.ocr_images.clone(),
                quality_report: ctx.quality_report.clone(),
                glossary: ctx.glossary.clone(),
                prompt_profile,
            };

            deps.directory.mark_done(&task_id, TaskOutcome::Success(Arc::new(result.clone())));
            Ok(result)
        }
        Err(err) => {
            deps.directory.mark_done(&task_id, TaskOutcome::Failed(err.to_string()));
            Err(err)
        }
    };

    result
}
