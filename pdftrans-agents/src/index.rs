//! Paper indexing: turns a finished translation into structured metadata
//! (title, domain, methodology, keywords, ...) and persists it to the
//! `PaperRepository` for downstream search.

use crate::services::{EmbeddingService, TranslationService};
use async_trait::async_trait;
use pdftrans_core::{Agent, AgentContext, Event, PaperMetadata, Result};
use pdftrans_store::PaperRepository;
use regex::Regex;
use std::sync::{Arc, OnceLock};
use tracing::{info, warn};

const METADATA_SAMPLE_CHARS: usize = 8000;
const ABSTRACT_FALLBACK_CHARS: usize = 500;
const MIN_KEYWORDS_BEFORE_ENRICHMENT: usize = 5;
const MAX_KEYWORDS: usize = 10;

fn title_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?m)^#\s+(.+)$").unwrap())
}

fn markup_pattern() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[#|*`\[\]()]").unwrap())
}

/// Extracts paper metadata from a completed translation and indexes it.
pub struct IndexAgent {
    repository: Arc<PaperRepository>,
    service: Arc<dyn TranslationService>,
    embeddings: Arc<dyn EmbeddingService>,
}

impl IndexAgent {
    pub fn new(
        repository: Arc<PaperRepository>,
        service: Arc<dyn TranslationService>,
        embeddings: Arc<dyn EmbeddingService>,
    ) -> Self {
        Self { repository, service, embeddings }
    }

    /// Rule-based extraction used when the LLM pass fails or returns nothing
    /// usable: title from the first `# ` heading, domain from the prompt
    /// profile, keywords from the first glossary entries, abstract from the
    /// first [`ABSTRACT_FALLBACK_CHARS`] characters stripped of Markdown
    /// punctuation.
    fn fallback_metadata(translated_md: &str, ctx: &AgentContext) -> PaperMetadata {
        let mut meta = PaperMetadata::default();

        if let Some(caps) = title_pattern().captures(translated_md) {
            meta.title_zh = caps[1].trim().to_string();
        }

        if let Some(profile) = &ctx.prompt_profile {
            meta.domain = profile.domain.clone();
        }

        if !ctx.glossary.is_empty() {
            meta.keywords = ctx.glossary.keys().take(MAX_KEYWORDS).cloned().collect();
        }

        let clean: String = markup_pattern().replace_all(translated_md, "").into_owned();
        meta.abstract_text = clean.chars().take(ABSTRACT_FALLBACK_CHARS).collect::<String>().trim().to_string();

        meta
    }

    async fn extract_metadata(&self, ctx: &AgentContext) -> PaperMetadata {
        let sample: String = ctx.translated_md.chars().take(METADATA_SAMPLE_CHARS).collect();
        match self.service.extract_paper_metadata(&sample).await {
            Ok(meta) if !meta.title.is_empty() || !meta.title_zh.is_empty() || !meta.domain.is_empty() => {
                info!(task_id = %ctx.task_id, title = %meta.title, "metadata extraction succeeded");
                meta
            }
            Ok(_) => {
                warn!(task_id = %ctx.task_id, "llm returned empty metadata, falling back to rule-based extraction");
                Self::fallback_metadata(&ctx.translated_md, ctx)
            }
            Err(err) => {
                warn!(task_id = %ctx.task_id, error = %err, "metadata extraction failed, falling back to rule-based extraction");
                Self::fallback_metadata(&ctx.translated_md, ctx)
            }
        }
    }

    /// Fills in gaps left by either extraction path using information
    /// already sitting on the context: domain from the prompt profile if
    /// still unset, and glossary terms appended to keywords until there are
    /// at least [`MIN_KEYWORDS_BEFORE_ENRICHMENT`] of them (capped at
    /// [`MAX_KEYWORDS`]).
    fn enrich(mut metadata: PaperMetadata, ctx: &AgentContext) -> PaperMetadata {
        if metadata.domain.is_empty() {
            if let Some(profile) = &ctx.prompt_profile {
                if !profile.domain.is_empty() {
                    metadata.domain = profile.domain.clone();
                }
            }
        }

        if metadata.keywords.len() < MIN_KEYWORDS_BEFORE_ENRICHMENT && !ctx.glossary.is_empty() {
            let mut seen: std::collections::HashSet<String> = metadata.keywords.iter().cloned().collect();
            for term in ctx.glossary.keys().take(MAX_KEYWORDS) {
                if metadata.keywords.len() >= MAX_KEYWORDS {
                    break;
                }
                if seen.insert(term.clone()) {
                    metadata.keywords.push(term.clone());
                }
            }
        }

        metadata
    }

    /// Runs the full indexing phase: skip if there's nothing translated yet,
    /// otherwise extract, enrich, embed and persist, then write the result
    /// back onto `ctx.paper_metadata`.
    pub async fn run(&self, ctx: &mut AgentContext) -> Result<()> {
        if ctx.translated_md.trim().is_empty() {
            ctx.publish(Event::new("index", "skip", 91).with_detail(serde_json::json!({
                "message": "no translated content, skipping indexing",
            })));
            return Ok(());
        }

        ctx.publish(Event::new("index", "extracting", 91).with_detail(serde_json::json!({
            "message": "extracting paper metadata",
        })));

        let metadata = self.extract_metadata(ctx).await;

        ctx.publish(Event::new("index", "extracting", 93).with_detail(serde_json::json!({
            "message": format!(
                "metadata extracted: {} | domain: {}",
                if metadata.title_zh.is_empty() { &metadata.title } else { &metadata.title_zh },
                metadata.domain,
            ),
            "domain": metadata.domain,
            "keywords": metadata.keywords,
        })));

        ctx.cancellation_token.check()?;

        let metadata = Self::enrich(metadata, ctx);
        let embedding = self.embeddings.embed(&metadata.abstract_text).await.unwrap_or(None);

        ctx.publish(Event::new("index", "saving_db", 95).with_detail(serde_json::json!({
            "message": "writing paper record",
        })));

        let quality_score = ctx.quality_report.as_ref().map(|r| r.score);
        self.repository
            .upsert(&ctx.task_id, &metadata, embedding.as_deref(), quality_score, &ctx.filename)
            .await?;

        ctx.publish(Event::new("index", "complete", 96).with_detail(serde_json::json!({
            "message": format!("indexing complete: {} | {} keywords", metadata.domain, metadata.keywords.len()),
            "paper_id": ctx.task_id,
        })));

        info!(
            task_id = %ctx.task_id,
            domain = %metadata.domain,
            keywords = metadata.keywords.len(),
            "indexing complete"
        );

        ctx.paper_metadata = Some(metadata);
        Ok(())
    }
}

#[async_trait]
impl Agent for IndexAgent {
    fn name(&self) -> &str {
        "index"
    }

    fn description(&self) -> &str {
        "extracts structured paper metadata and persists it for search"
    }
}
