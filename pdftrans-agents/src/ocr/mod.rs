mod analysis;
mod llm_pipeline;
mod ocr_pipeline;
mod structural_stitch;

pub use analysis::DocumentClassification;

use crate::services::{DocumentParser, OCRService};
use async_trait::async_trait;
use pdftrans_core::{Agent, AgentContext, PipelineType, Result};
use std::sync::Arc;
use tracing::{info, warn};

/// Parses the document, classifies it, and routes it down the LLM pipeline
/// (native structured text) or the OCR pipeline (scanned / formula-heavy
/// pages), normalizing whichever Markdown the OCR provider returns.
pub struct OCRAgent {
    parser: Arc<dyn DocumentParser>,
    ocr: Arc<dyn OCRService>,
}

impl OCRAgent {
    pub fn new(parser: Arc<dyn DocumentParser>, ocr: Arc<dyn OCRService>) -> Self {
        Self { parser, ocr }
    }

    /// Applies the ordered selection policy once OCR availability is known:
    /// forced OCR wins if a provider exists, else falls back to `llm` with a
    /// warning; otherwise native text length decides, falling back to `llm`
    /// if OCR was the pick but no provider is available.
    fn choose_pipeline(classification: &DocumentClassification, enable_ocr: bool, ocr_available: bool) -> PipelineType {
        if enable_ocr {
            return if ocr_available { PipelineType::Ocr } else { PipelineType::Llm };
        }

        if !classification.looks_scanned() {
            return PipelineType::Llm;
        }

        if ocr_available {
            PipelineType::Ocr
        } else {
            PipelineType::Llm
        }
    }

    pub async fn run(&self, ctx: &mut AgentContext) -> Result<()> {
        if ctx.pipeline_type != PipelineType::None && (ctx.parsed_pdf.is_some() || ctx.ocr_md.is_some()) {
            return Ok(());
        }

        let native_text = self.parser.extract_text(&ctx.file_content).await.unwrap_or_default();
        let parsed = self.parser.parse_structured(&ctx.file_content).await.unwrap_or_default();
        let classification = DocumentClassification::classify(&parsed, &native_text);

        let ocr_available = self.ocr.is_available().await;
        if ctx.enable_ocr && !ocr_available {
            warn!(task_id = %ctx.task_id, "ocr forced but no provider available, falling back to the native-text pipeline");
        }
        let pipeline = Self::choose_pipeline(&classification, ctx.enable_ocr, ocr_available);

        if pipeline == PipelineType::Ocr {
            let (raw_md, images) = self.ocr.ocr_to_markdown(&ctx.file_content, &ctx.filename).await?;
            let normalized = ocr_pipeline::normalize_ocr_markdown(&raw_md);
            ctx.ocr_md = Some(normalized);
            ctx.ocr_images = images;
        } else {
            ctx.parsed_pdf = Some(structural_stitch::stitch_document(parsed));
        }

        ctx.pipeline_type = pipeline;
        info!(task_id = %ctx.task_id, pipeline = pipeline.as_str(), "document classified");
        Ok(())
    }
}

#[async_trait]
impl Agent for OCRAgent {
    fn name(&self) -> &str {
        "ocr"
    }

    fn description(&self) -> &str {
        "classifies a document and routes it through the native-text or OCR pipeline"
    }
}

pub(crate) use llm_pipeline::stitch_pages;
