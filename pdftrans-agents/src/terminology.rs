//! Standalone terminology management agent: extract, query, update and merge
//! operations over the [`GlossaryStore`]. Unlike [`crate::orchestrator`]'s
//! pipeline agents, `TerminologyAgent` doesn't implement `ContextAgent` — it
//! takes and returns structured values per `action`, the way the Python
//! original dispatches on an `action` field rather than exposing four
//! separate methods on the wire.

use crate::services::TranslationService;
use async_trait::async_trait;
use pdftrans_core::{Agent, GlossaryEntry, GlossaryFile, MergeConflict, PdfTransError, Result};
use pdftrans_store::GlossaryStore;
use std::sync::Arc;

const EXTRACT_SAMPLE_CHARS: usize = 3000;

/// Result of an `extract` call: the merged glossary for the domain plus any
/// conflicts the merge surfaced.
#[derive(Debug, Clone)]
pub struct ExtractResult {
    pub glossary: GlossaryFile,
    pub conflicts: Vec<MergeConflict>,
}

/// Manages the per-domain glossary: extracts new terms via an LLM, and
/// exposes query/update/merge against the backing [`GlossaryStore`].
pub struct TerminologyAgent {
    service: Arc<dyn TranslationService>,
    store: Arc<GlossaryStore>,
}

impl TerminologyAgent {
    pub fn new(service: Arc<dyn TranslationService>, store: Arc<GlossaryStore>) -> Self {
        Self { service, store }
    }

    /// `extract`: prompt the LLM over up to [`EXTRACT_SAMPLE_CHARS`] of
    /// `text`, convert the returned candidates to [`GlossaryEntry`] values
    /// stamped with `source: "llm_extract"`, then merge into the store.
    pub async fn extract(&self, text: &str, domain: &str) -> Result<ExtractResult> {
        let sample: String = text.chars().take(EXTRACT_SAMPLE_CHARS).collect();
        if sample.trim().is_empty() {
            return Ok(ExtractResult { glossary: self.store.load(domain).await, conflicts: Vec::new() });
        }

        let candidates = self.service.extract_terms(&sample, domain).await?;
        let entries: Vec<GlossaryEntry> = candidates
            .into_iter()
            .filter(|c| !c.english.trim().is_empty() && !c.chinese.trim().is_empty())
            .map(|c| {
                let mut entry = GlossaryEntry::now(c.english, c.chinese, domain, "llm_extract");
                entry.keep_english = c.keep_english;
                entry
            })
            .collect();

        if entries.is_empty() {
            return Ok(ExtractResult { glossary: self.store.load(domain).await, conflicts: Vec::new() });
        }

        let (glossary, conflicts) = self.store.merge(domain, entries).await?;
        Ok(ExtractResult { glossary, conflicts })
    }

    /// `query`: case-insensitive substring match on English or Chinese,
    /// within `domain` or, when `None`, across every known domain.
    pub async fn query(&self, domain: Option<&str>, term: &str) -> Result<Vec<GlossaryEntry>> {
        self.store.query(domain, term).await
    }

    /// `update`: upsert a single entry, preserving original English casing.
    pub async fn update(
        &self,
        domain: &str,
        english: &str,
        chinese: &str,
        source: &str,
    ) -> Result<GlossaryFile> {
        if english.trim().is_empty() {
            return Err(PdfTransError::Terminology("english term must not be empty".into()));
        }
        let entry = GlossaryEntry::now(english, chinese, domain, source);
        self.store.update(entry).await
    }

    /// `merge`: fold candidate entries into the stored glossary, keeping
    /// existing translations verbatim and surfacing conflicts.
    pub async fn merge(&self, domain: &str, entries: Vec<GlossaryEntry>) -> Result<(GlossaryFile, Vec<MergeConflict>)> {
        self.store.merge(domain, entries).await
    }
}

#[async_trait]
impl Agent for TerminologyAgent {
    fn name(&self) -> &str {
        "terminology"
    }

    fn description(&self) -> &str {
        "extracts, queries, updates and merges per-domain glossary terms"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::services::TermCandidate;
    use async_trait::async_trait;
    use pdftrans_core::{PaperMetadata, PromptProfile};
    use tempfile::tempdir;

    struct StubService;

    #[async_trait]
    impl TranslationService for StubService {
        async fn build_prompt_profile(&self, _abstract_text: &str, _filename: &str) -> Result<PromptProfile> {
            Ok(PromptProfile::default())
        }
        async fn translate_page(&self, page_text: &str, _prompt: &str) -> Result<String> {
            Ok(page_text.to_string())
        }
        async fn translate_segment(&self, segment: &str, prompt: &str) -> Result<String> {
            self.translate_page(segment, prompt).await
        }
        async fn extract_terms(&self, _text: &str, _domain: &str) -> Result<Vec<TermCandidate>> {
            Ok(vec![
                TermCandidate { english: "Transformer".into(), chinese: "变换器".into(), keep_english: false },
                TermCandidate { english: "BERT".into(), chinese: "BERT".into(), keep_english: true },
            ])
        }
        async fn extract_paper_metadata(&self, _text: &str) -> Result<PaperMetadata> {
            Ok(PaperMetadata::default())
        }
    }

    #[tokio::test]
    async fn extract_merges_candidates_into_store() {
        let dir = tempdir().unwrap();
        let store = Arc::new(GlossaryStore::new(dir.path()));
        let agent = TerminologyAgent::new(Arc::new(StubService), store);

        let result = agent.extract("Transformer models use BERT.", "nlp").await.unwrap();
        assert_eq!(result.conflicts.len(), 0);
        assert!(result.glossary.entries.iter().any(|e| e.english == "Transformer" && e.chinese == "变换器"));
        assert!(result.glossary.entries.iter().any(|e| e.english == "BERT" && e.keep_english));
    }

    #[tokio::test]
    async fn extract_on_blank_text_is_a_no_op() {
        let dir = tempdir().unwrap();
        let store = Arc::new(GlossaryStore::new(dir.path()));
        let agent = TerminologyAgent::new(Arc::new(StubService), store);
        let result = agent.extract("   ", "nlp").await.unwrap();
        assert!(result.glossary.entries.is_empty());
        assert!(result.conflicts.is_empty());
    }

    #[tokio::test]
    async fn update_rejects_empty_english() {
        let dir = tempdir().unwrap();
        let store = Arc::new(GlossaryStore::new(dir.path()));
        let agent = TerminologyAgent::new(Arc::new(StubService), store);
        let err = agent.update("nlp", "", "", "user_edit").await.unwrap_err();
        assert!(matches!(err, PdfTransError::Terminology(_)));
    }

    #[tokio::test]
    async fn merge_reports_conflicts_scenario_4() {
        let dir = tempdir().unwrap();
        let store = Arc::new(GlossaryStore::new(dir.path()));
        let agent = TerminologyAgent::new(Arc::new(StubService), Arc::clone(&store));
        agent.update("nlp", "Transformer", "变换器", "user_edit").await.unwrap();

        let (glossary, conflicts) = agent
            .merge("nlp", vec![GlossaryEntry::now("Transformer", "Transformer模型", "nlp", "llm_extract")])
            .await
            .unwrap();

        assert_eq!(conflicts.len(), 1);
        assert_eq!(conflicts[0].existing, "变换器");
        assert_eq!(conflicts[0].incoming, "Transformer模型");
        assert_eq!(glossary.entries.iter().find(|e| e.english == "Transformer").unwrap().chinese, "变换器");
    }
}
