mod pipeline;

use crate::ocr::stitch_pages;
use crate::services::{DocumentParser, TranslationService};
use async_trait::async_trait;
use pdftrans_core::{Agent, AgentContext, GlossaryEntry, PipelineType, PromptProfile, Result};
use pdftrans_store::GlossaryStore;
use std::sync::Arc;
use tracing::debug;

const TERMINOLOGY_SAMPLE_CHARS: usize = 3000;
const ABSTRACT_SAMPLE_CHARS: usize = 1500;
const GENERAL_DOMAIN: &str = "general";

/// Builds the translation prompt, dispatches per-page or per-segment
/// translation work, and keeps the glossary store in sync with whatever
/// terminology the run discovers.
pub struct TranslationAgent {
    parser: Arc<dyn DocumentParser>,
    service: Arc<dyn TranslationService>,
    glossary: Arc<GlossaryStore>,
}

impl TranslationAgent {
    pub fn new(parser: Arc<dyn DocumentParser>, service: Arc<dyn TranslationService>, glossary: Arc<GlossaryStore>) -> Self {
        Self { parser, service, glossary }
    }

    fn entries_from_map(
        terms: impl IntoIterator<Item = (String, String)>,
        domain: &str,
    ) -> Vec<GlossaryEntry> {
        terms
            .into_iter()
            .map(|(english, chinese)| GlossaryEntry::now(english, chinese, domain, "llm_extract"))
            .collect()
    }

    /// Non-fatal: seeds `ctx.glossary` from an LLM pass over the first
    /// [`TERMINOLOGY_SAMPLE_CHARS`] characters of native text, before OCR or
    /// translation has run.
    pub async fn seed_terminology(&self, ctx: &mut AgentContext) -> Result<()> {
        let text = self.parser.extract_text(&ctx.file_content).await?;
        let sample: String = text.chars().take(TERMINOLOGY_SAMPLE_CHARS).collect();
        if sample.trim().is_empty() {
            return Ok(());
        }

        let candidates = self.service.extract_terms(&sample, GENERAL_DOMAIN).await?;
        let entries: Vec<GlossaryEntry> = candidates
            .into_iter()
            .map(|c| {
                let chinese = if c.keep_english { c.english.clone() } else { c.chinese };
                GlossaryEntry::now(c.english, chinese, GENERAL_DOMAIN, "llm_extract")
            })
            .collect();

        let (file, _conflicts) = self.glossary.merge(GENERAL_DOMAIN, entries).await?;
        ctx.merge_glossary(file.entries.into_iter().map(|e| (e.english, e.chinese)));
        Ok(())
    }

    fn abstract_sample(ctx: &AgentContext) -> String {
        match ctx.pipeline_type {
            PipelineType::Ocr => ctx.ocr_md.as_deref().unwrap_or_default().chars().take(ABSTRACT_SAMPLE_CHARS).collect(),
            _ => ctx
                .parsed_pdf
                .as_ref()
                .and_then(|doc| doc.pages.first())
                .map(|page| page.blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join(" "))
                .unwrap_or_default()
                .chars()
                .take(ABSTRACT_SAMPLE_CHARS)
                .collect(),
        }
    }

    fn page_texts(ctx: &AgentContext) -> Vec<String> {
        ctx.parsed_pdf
            .as_ref()
            .map(|doc| {
                doc.pages
                    .iter()
                    .map(|page| {
                        let mut text = page.blocks.iter().map(|b| b.text.as_str()).collect::<Vec<_>>().join("\n");
                        for table in &page.tables {
                            text.push_str("\n\n");
                            text.push_str(table);
                        }
                        text
                    })
                    .collect()
            })
            .unwrap_or_default()
    }

    fn ocr_segments(ctx: &AgentContext) -> Vec<String> {
        let md = ctx.ocr_md.as_deref().unwrap_or_default();
        md.split("\n\n").map(|s| s.to_string()).filter(|s| !s.trim().is_empty()).collect()
    }

    async fn dispatch(&self, ctx: &mut AgentContext, prompt_profile: &PromptProfile) -> Result<()> {
        let (segments, per_page) = match ctx.pipeline_type {
            PipelineType::Ocr => (Self::ocr_segments(ctx), false),
            _ => (Self::page_texts(ctx), true),
        };

        let translated = pipeline::translate_many(
            Arc::clone(&self.service) as Arc<dyn TranslationService>,
            segments,
            prompt_profile.generated_prompt.clone(),
            ctx.cancellation_token.clone(),
            per_page,
            Arc::clone(&ctx.event_bus),
        )
        .await?;

        ctx.translated_md = stitch_pages(&translated);
        if ctx.pipeline_type == PipelineType::Ocr {
            ctx.images = ctx.ocr_images.clone();
        }
        Ok(())
    }

    /// First translation pass: builds and stores the prompt profile, then
    /// dispatches to the pipeline chosen during the OCR phase.
    pub async fn translate(&self, ctx: &mut AgentContext) -> Result<()> {
        let abstract_text = Self::abstract_sample(ctx);
        let mut prompt_profile = self.service.build_prompt_profile(&abstract_text, &ctx.filename).await?;
        prompt_profile.merge_glossary(&ctx.glossary);

        let domain = prompt_profile.domain.clone();
        let entries = Self::entries_from_map(prompt_profile.terminology.clone(), &domain);
        let (file, _conflicts) = self.glossary.merge(&domain, entries).await?;
        ctx.merge_glossary(file.entries.into_iter().map(|e| (e.english, e.chinese)));
        prompt_profile.merge_glossary(&ctx.glossary);

        self.dispatch(ctx, &prompt_profile).await?;
        ctx.prompt_profile = Some(prompt_profile);
        Ok(())
    }

    /// Auto-fix pass: reuses the prompt profile built on the first pass and
    /// re-derives segments from the already-parsed structure or OCR
    /// Markdown, never from `ctx.translated_md` itself.
    pub async fn retranslate(&self, ctx: &mut AgentContext) -> Result<()> {
        let prompt_profile = ctx
            .prompt_profile
            .clone()
            .ok_or_else(|| pdftrans_core::PdfTransError::Translation("missing prompt profile for auto-fix pass".into()))?;
        debug!(task_id = %ctx.task_id, "re-running translation for auto-fix");
        self.dispatch(ctx, &prompt_profile).await
    }
}

#[async_trait]
impl Agent for TranslationAgent {
    fn name(&self) -> &str {
        "translation"
    }

    fn description(&self) -> &str {
        "builds the translation prompt and translates a document's pages or segments"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TermCandidate;
    use pdftrans_core::{ParsedDocument, ParsedPage, PaperMetadata, TextBlock};
    use tempfile::tempdir;

    struct StubParser;

    #[async_trait]
    impl DocumentParser for StubParser {
        async fn extract_text(&self, _bytes: &[u8]) -> Result<String> {
            Ok("Transformer models are widely used.".to_string())
        }
        async fn parse_structured(&self, _bytes: &[u8]) -> Result<ParsedDocument> {
            Ok(ParsedDocument {
                pages: vec![ParsedPage {
                    blocks: vec![TextBlock { text: "Transformer models are widely used.".into(), y: 0.0, font_size: 10.0, bold: false }],
                    tables: vec![],
                }],
            })
        }
    }

    struct StubService;

    #[async_trait]
    impl TranslationService for StubService {
        async fn build_prompt_profile(&self, _abstract_text: &str, _filename: &str) -> Result<PromptProfile> {
            Ok(PromptProfile { domain: "nlp".into(), generated_prompt: "translate to Chinese".into(), ..Default::default() })
        }
        async fn translate_page(&self, page_text: &str, _prompt: &str) -> Result<String> {
            Ok(format!("译文: {page_text}"))
        }
        async fn translate_segment(&self, segment: &str, prompt: &str) -> Result<String> {
            self.translate_page(segment, prompt).await
        }
        async fn extract_terms(&self, _text: &str, _domain: &str) -> Result<Vec<TermCandidate>> {
            Ok(vec![TermCandidate { english: "Transformer".into(), chinese: "变换器".into(), keep_english: false }])
        }
        async fn extract_paper_metadata(&self, _text: &str) -> Result<PaperMetadata> {
            Ok(PaperMetadata::default())
        }
    }

    #[tokio::test]
    async fn seed_terminology_merges_extracted_terms_into_context_glossary() {
        let dir = tempdir().unwrap();
        let glossary = Arc::new(GlossaryStore::new(dir.path()));
        let agent = TranslationAgent::new(Arc::new(StubParser), Arc::new(StubService), glossary);
        let mut ctx = AgentContext::new("t1", "paper.pdf", vec![]);
        agent.seed_terminology(&mut ctx).await.unwrap();
        assert_eq!(ctx.glossary.get("Transformer").unwrap(), "变换器");
    }

    #[tokio::test]
    async fn translate_sets_translated_md_and_prompt_profile() {
        let dir = tempdir().unwrap();
        let glossary = Arc::new(GlossaryStore::new(dir.path()));
        let agent = TranslationAgent::new(Arc::new(StubParser), Arc::new(StubService), glossary);
        let mut ctx = AgentContext::new("t1", "paper.pdf", vec![]);
        ctx.pipeline_type = PipelineType::Llm;
        ctx.parsed_pdf = Some(ParsedDocument {
            pages: vec![ParsedPage {
                blocks: vec![TextBlock { text: "Transformer models are widely used.".into(), y: 0.0, font_size: 10.0, bold: false }],
                tables: vec![],
            }],
        });
        agent.translate(&mut ctx).await.unwrap();
        assert!(ctx.translated_md.contains("译文"));
        assert_eq!(ctx.prompt_profile.unwrap().domain, "nlp");
    }
}
