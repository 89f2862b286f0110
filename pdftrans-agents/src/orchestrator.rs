use crate::index::IndexAgent;
use crate::ocr::OCRAgent;
use crate::review::ReviewAgent;
use crate::services::DocumentParser;
use crate::terminology::TerminologyAgent;
use crate::translation::TranslationAgent;
use async_trait::async_trait;
use pdftrans_core::{Agent, AgentContext, ContextAgent, Event, PdfTransError, Result};
use pdftrans_store::TranslationStore;
use std::sync::Arc;
use tracing::{info, warn};

const AUTO_FIX_THRESHOLD: i32 = 70;
const TERMINOLOGY_SAMPLE_CHARS: usize = 3000;
const TERMINOLOGY_DOMAIN: &str = "general";

/// Drives one translation task end to end: terminology seeding, OCR
/// routing, translation, review, a single bounded auto-fix pass, indexing
/// and persistence. The only agent that owns the overall progress
/// narrative; every other agent just reports its own slice.
pub struct OrchestratorAgent {
    parser: Arc<dyn DocumentParser>,
    terminology: Arc<TerminologyAgent>,
    ocr: Arc<OCRAgent>,
    translation: Arc<TranslationAgent>,
    review: Arc<ReviewAgent>,
    index: Arc<IndexAgent>,
    store: Arc<TranslationStore>,
}

impl OrchestratorAgent {
    pub fn new(
        parser: Arc<dyn DocumentParser>,
        terminology: Arc<TerminologyAgent>,
        ocr: Arc<OCRAgent>,
        translation: Arc<TranslationAgent>,
        review: Arc<ReviewAgent>,
        index: Arc<IndexAgent>,
        store: Arc<TranslationStore>,
    ) -> Self {
        Self { parser, terminology, ocr, translation, review, index, store }
    }

    fn emit(&self, ctx: &AgentContext, stage: &str, progress: i32) {
        ctx.publish(Event::new("orchestrator", stage, progress));
    }

    /// Phase 1: best-effort terminology extraction. Any failure (parser or
    /// extraction) is logged and the run continues with whatever glossary
    /// it already has.
    async fn terminology_prep(&self, ctx: &mut AgentContext) {
        self.emit(ctx, "terminology", 5);

        let text = match self.parser.extract_text(&ctx.file_content).await {
            Ok(text) => text,
            Err(err) => {
                warn!(task_id = %ctx.task_id, error = %err, "terminology prep: text extraction failed, proceeding with empty text");
                String::new()
            }
        };
        let sample: String = text.chars().take(TERMINOLOGY_SAMPLE_CHARS).collect();

        match self.terminology.extract(&sample, TERMINOLOGY_DOMAIN).await {
            Ok(result) => ctx.merge_glossary(result.glossary.entries.into_iter().map(|e| (e.english, e.chinese))),
            Err(err) => {
                warn!(task_id = %ctx.task_id, error = %err, "terminology prep failed, continuing without a seeded glossary");
            }
        }

        self.emit(ctx, "terminology", 15);
    }

    /// Phase 5: rerun translation then review exactly once. If either step
    /// fails, the earlier (pre-auto-fix) `translated_md`/`quality_report`
    /// are left untouched by returning the error to the caller, which treats
    /// it as non-fatal.
    async fn run_auto_fix(&self, ctx: &mut AgentContext) -> Result<()> {
        self.emit(ctx, "auto_fix", 87);
        self.translation.retranslate(ctx).await?;
        ctx.cancellation_token.check()?;

        let report = self.review.review(&ctx.translated_md, &ctx.glossary);
        ctx.quality_report = Some(report);
        self.emit(ctx, "auto_fix", 95);
        Ok(())
    }

    async fn persist(&self, ctx: &mut AgentContext) {
        self.emit(ctx, "saving", 97);

        let prompt_profile = ctx.prompt_profile.as_ref().and_then(|p| serde_json::to_value(p).ok());
        let request = pdftrans_store::SaveRequest {
            task_id: ctx.task_id.clone(),
            filename: ctx.filename.clone(),
            translated_md: ctx.translated_md.clone(),
            ocr_md: ctx.ocr_md.clone(),
            images: ctx.images.clone(),
            quality_report: ctx.quality_report.clone(),
            provider: None,
            model: None,
            prompt_profile,
        };

        match self.store.save(request).await {
            Ok(()) => ctx.translation_id = Some(ctx.task_id.clone()),
            Err(err) => warn!(task_id = %ctx.task_id, error = %err, "saving translation result failed, continuing"),
        }

        self.emit(ctx, "saving", 99);
    }
}

#[async_trait]
impl Agent for OrchestratorAgent {
    fn name(&self) -> &str {
        "orchestrator"
    }

    fn description(&self) -> &str {
        "coordinates terminology, OCR, translation, review, indexing and persistence for one task"
    }
}

#[async_trait]
impl ContextAgent for OrchestratorAgent {
    async fn run(&self, ctx: AgentContext) -> Result<AgentContext> {
        let mut ctx = ctx;

        self.terminology_prep(&mut ctx).await;
        ctx.cancellation_token.check()?;

        self.emit(&ctx, "ocr", 16);
        self.ocr.run(&mut ctx).await.map_err(|err| {
            self.emit(&ctx, "error", 16);
            PdfTransError::Orchestrator(format!("ocr phase failed: {err}"))
        })?;
        self.emit(&ctx, "ocr", 25);
        ctx.cancellation_token.check()?;

        self.emit(&ctx, "translation", 26);
        self.translation.translate(&mut ctx).await.map_err(|err| {
            self.emit(&ctx, "error", 26);
            PdfTransError::Orchestrator(format!("translation phase failed: {err}"))
        })?;
        self.emit(&ctx, "translation", 70);
        ctx.cancellation_token.check()?;

        self.emit(&ctx, "review", 75);
        let report = self.review.review(&ctx.translated_md, &ctx.glossary);
        let needs_fix = report.score < AUTO_FIX_THRESHOLD;
        ctx.quality_report = Some(report);
        self.emit(&ctx, "review", 85);
        ctx.cancellation_token.check()?;

        if needs_fix {
            info!(task_id = %ctx.task_id, "quality score below threshold, running one auto-fix pass");
            if let Err(err) = self.run_auto_fix(&mut ctx).await {
                warn!(task_id = %ctx.task_id, error = %err, "auto-fix pass failed, keeping the earlier translation and review");
            }
        }
        ctx.cancellation_token.check()?;

        self.emit(&ctx, "indexing", 91);
        if let Err(err) = self.index.run(&mut ctx).await {
            warn!(task_id = %ctx.task_id, error = %err, "indexing failed, continuing without a paper record");
        }
        self.emit(&ctx, "indexing", 96);

        self.persist(&mut ctx).await;

        self.emit(&ctx, "complete", 100);
        Ok(ctx)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ocr::OCRAgent;
    use crate::review::ReviewAgent;
    use crate::services::{EmbeddingService, NullEmbeddingService, OCRService, TermCandidate, TranslationService};
    use pdftrans_core::{NullPublisher, PaperMetadata, ParsedDocument, ParsedPage, PipelineType, PromptProfile, TextBlock};
    use pdftrans_store::{GlossaryStore, PaperRepository};
    use std::collections::HashMap;
    use tempfile::tempdir;

    struct StubParser {
        text: String,
    }

    #[async_trait]
    impl DocumentParser for StubParser {
        async fn extract_text(&self, _bytes: &[u8]) -> Result<String> {
            Ok(self.text.clone())
        }
        async fn parse_structured(&self, _bytes: &[u8]) -> Result<ParsedDocument> {
            Ok(ParsedDocument {
                pages: vec![ParsedPage {
                    blocks: vec![TextBlock { text: self.text.clone(), y: 0.0, font_size: 10.0, bold: false }],
                    tables: vec![],
                }],
            })
        }
    }

    struct UnavailableOCR;

    #[async_trait]
    impl OCRService for UnavailableOCR {
        async fn is_available(&self) -> bool {
            false
        }
        async fn ocr_to_markdown(&self, _bytes: &[u8], _filename: &str) -> Result<(String, HashMap<String, Vec<u8>>)> {
            unreachable!()
        }
    }

    struct StubService {
        low_score_once: bool,
    }

    #[async_trait]
    impl TranslationService for StubService {
        async fn build_prompt_profile(&self, _abstract_text: &str, _filename: &str) -> Result<PromptProfile> {
            Ok(PromptProfile { domain: "nlp".into(), generated_prompt: "translate".into(), ..Default::default() })
        }
        async fn translate_page(&self, page_text: &str, _prompt: &str) -> Result<String> {
            if self.low_score_once {
                Ok(page_text.to_string())
            } else {
                Ok(format!("译文: {page_text}"))
            }
        }
        async fn translate_segment(&self, segment: &str, prompt: &str) -> Result<String> {
            self.translate_page(segment, prompt).await
        }
        async fn extract_terms(&self, _text: &str, _domain: &str) -> Result<Vec<TermCandidate>> {
            Ok(vec![])
        }
        async fn extract_paper_metadata(&self, _text: &str) -> Result<PaperMetadata> {
            Ok(PaperMetadata::default())
        }
    }

    async fn build_agent(dir: &std::path::Path, low_score_once: bool) -> OrchestratorAgent {
        let parser: Arc<dyn DocumentParser> = Arc::new(StubParser { text: "Transformer models are useful.".into() });
        let service: Arc<dyn TranslationService> = Arc::new(StubService { low_score_once });
        let glossary = Arc::new(GlossaryStore::new(dir.join("glossary")));
        let repo = Arc::new(PaperRepository::connect("sqlite::memory:").await.unwrap());
        let store = Arc::new(TranslationStore::new(dir.join("translations")));

        let terminology = Arc::new(TerminologyAgent::new(Arc::clone(&service), Arc::clone(&glossary)));
        let ocr = Arc::new(OCRAgent::new(Arc::clone(&parser), Arc::new(UnavailableOCR)));
        let translation = Arc::new(TranslationAgent::new(Arc::clone(&parser), Arc::clone(&service), glossary));
        let review = Arc::new(ReviewAgent::new());
        let embeddings: Arc<dyn EmbeddingService> = Arc::new(NullEmbeddingService);
        let index = Arc::new(IndexAgent::new(repo, service, embeddings));

        OrchestratorAgent::new(parser, terminology, ocr, translation, review, index, store)
    }

    #[tokio::test]
    async fn happy_path_reaches_complete_and_persists() {
        let dir = tempdir().unwrap();
        let agent = build_agent(dir.path(), false).await;
        let ctx = AgentContext::new("t1", "paper.pdf", vec![1, 2, 3]).with_event_bus(Arc::new(NullPublisher));

        let out = agent.run(ctx).await.unwrap();
        assert_eq!(out.pipeline_type, PipelineType::Llm);
        assert!(out.translated_md.contains("译文"));
        assert!(out.quality_report.is_some());
        assert_eq!(out.translation_id.as_deref(), Some("t1"));

        let saved = TranslationStore::new(dir.path().join("translations")).translated_md("t1").await.unwrap();
        assert!(saved.is_some());
    }

    #[tokio::test]
    async fn low_score_triggers_auto_fix_and_keeps_result_even_if_it_errors() {
        let dir = tempdir().unwrap();
        let agent = build_agent(dir.path(), true).await;
        let ctx = AgentContext::new("t1", "paper.pdf", vec![1, 2, 3]).with_event_bus(Arc::new(NullPublisher));

        let out = agent.run(ctx).await.unwrap();
        assert!(out.quality_report.is_some());
        assert!(!out.translated_md.is_empty());
    }
}
