//! Interfaces for the external collaborators this crate orchestrates but
//! does not implement: the concrete LLM, OCR and embedding providers, and
//! the PDF parsing library. Production wiring supplies concrete
//! implementations; tests supply stubs.

use async_trait::async_trait;
use pdftrans_core::{PaperMetadata, ParsedDocument, PromptProfile, Result};

/// One candidate term returned by an LLM terminology extraction call.
#[derive(Debug, Clone, PartialEq)]
pub struct TermCandidate {
    pub english: String,
    pub chinese: String,
    pub keep_english: bool,
}

#[async_trait]
pub trait DocumentParser: Send + Sync {
    /// Best-effort plain text extraction, used for terminology seeding and
    /// the native-text-length pipeline-selection heuristic.
    async fn extract_text(&self, bytes: &[u8]) -> Result<String>;

    /// Full structured parse (pages, text blocks, tables) for the LLM path.
    async fn parse_structured(&self, bytes: &[u8]) -> Result<ParsedDocument>;
}

#[async_trait]
pub trait OCRService: Send + Sync {
    async fn is_available(&self) -> bool;

    /// Markdown plus any extracted images, keyed by file name.
    async fn ocr_to_markdown(
        &self,
        bytes: &[u8],
        filename: &str,
    ) -> Result<(String, std::collections::HashMap<String, Vec<u8>>)>;
}

#[async_trait]
pub trait TranslationService: Send + Sync {
    /// Analyze the document abstract and produce domain, terminology
    /// mapping, keep-in-English list and a rendered prompt.
    async fn build_prompt_profile(&self, abstract_text: &str, filename: &str) -> Result<PromptProfile>;

    /// Translate one page's concatenated text under the given prompt.
    async fn translate_page(&self, page_text: &str, prompt: &str) -> Result<String>;

    /// Translate one Markdown segment (OCR path) under the given prompt.
    async fn translate_segment(&self, segment: &str, prompt: &str) -> Result<String>;

    /// Extract `{english, chinese, keep_english?}` term candidates from a
    /// text sample for a domain.
    async fn extract_terms(&self, text: &str, domain: &str) -> Result<Vec<TermCandidate>>;

    /// Produce structured paper metadata from (a prefix of) the translated
    /// document.
    async fn extract_paper_metadata(&self, text: &str) -> Result<PaperMetadata>;
}

#[async_trait]
pub trait EmbeddingService: Send + Sync {
    async fn embed(&self, text: &str) -> Result<Option<Vec<f32>>>;
}

/// An `EmbeddingService` that never computes anything: indexing still
/// completes, just without a vector to search against.
pub struct NullEmbeddingService;

#[async_trait]
impl EmbeddingService for NullEmbeddingService {
    async fn embed(&self, _text: &str) -> Result<Option<Vec<f32>>> {
        Ok(None)
    }
}
