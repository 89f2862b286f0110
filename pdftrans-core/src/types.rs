use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Which pipeline a document was routed through by `OCRAgent`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PipelineType {
    #[default]
    None,
    Llm,
    Ocr,
}

impl PipelineType {
    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineType::None => "",
            PipelineType::Llm => "llm",
            PipelineType::Ocr => "ocr",
        }
    }
}

/// One text fragment extracted from a PDF page, with enough layout
/// information for cross-page stitching heuristics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TextBlock {
    pub text: String,
    pub y: f32,
    pub font_size: f32,
    pub bold: bool,
}

/// One page of a natively-parsed (non-OCR) PDF.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedPage {
    pub blocks: Vec<TextBlock>,
    pub tables: Vec<String>,
}

/// The structured document produced by a `DocumentParser` on the LLM path.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ParsedDocument {
    pub pages: Vec<ParsedPage>,
}

/// Rendered translation prompt plus the inputs used to build it.
/// Reused verbatim across an auto-fix rerun.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PromptProfile {
    pub domain: String,
    pub terminology: HashMap<String, String>,
    pub keep_english: Vec<String>,
    pub generated_prompt: String,
}

impl PromptProfile {
    /// Merge the run's glossary into this profile's terminology map.
    /// Existing profile entries win on conflict.
    pub fn merge_glossary(&mut self, glossary: &HashMap<String, String>) {
        for (en, zh) in glossary {
            self.terminology.entry(en.clone()).or_insert_with(|| zh.clone());
        }
    }
}

/// One inconsistent-terminology finding in a `QualityReport`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TermIssue {
    pub english_term: String,
    pub observed_translations: Vec<String>,
    pub locations: Vec<String>,
    pub suggested: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FormatIssueKind {
    BrokenTable,
    MissingFormula,
    BrokenHeading,
    MissingImage,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FormatIssue {
    pub kind: FormatIssueKind,
    pub location: String,
    pub description: String,
}

/// Quality assessment produced by `ReviewAgent`. Round-trippable to/from
/// JSON and persisted alongside the translation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub score: i32,
    pub term_issues: Vec<TermIssue>,
    pub format_issues: Vec<FormatIssue>,
    pub untranslated: Vec<String>,
    pub suggestions: Vec<String>,
    pub timestamp: DateTime<Utc>,
}

impl QualityReport {
    pub fn new(
        term_issues: Vec<TermIssue>,
        format_issues: Vec<FormatIssue>,
        untranslated: Vec<String>,
        suggestions: Vec<String>,
    ) -> Self {
        let score = Self::score_for(term_issues.len(), format_issues.len(), untranslated.len());
        Self { score, term_issues, format_issues, untranslated, suggestions, timestamp: Utc::now() }
    }

    /// `100 - 5*terminology - 3*format - 2*untranslated`, clamped to `[0, 100]`.
    pub fn score_for(term_issues: usize, format_issues: usize, untranslated: usize) -> i32 {
        let raw = 100 - 5 * term_issues as i32 - 3 * format_issues as i32 - 2 * untranslated as i32;
        raw.clamp(0, 100)
    }
}

/// A per-domain glossary entry, persisted as part of a `{domain}.json` file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct GlossaryEntry {
    pub english: String,
    pub chinese: String,
    #[serde(default)]
    pub keep_english: bool,
    pub domain: String,
    pub source: String,
    pub updated_at: String,
}

impl GlossaryEntry {
    pub fn now(
        english: impl Into<String>,
        chinese: impl Into<String>,
        domain: impl Into<String>,
        source: impl Into<String>,
    ) -> Self {
        Self {
            english: english.into(),
            chinese: chinese.into(),
            keep_english: false,
            domain: domain.into(),
            source: source.into(),
            updated_at: Utc::now().to_rfc3339(),
        }
    }
}

/// A single domain's glossary file: `{domain}.json`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GlossaryFile {
    pub domain: String,
    pub entries: Vec<GlossaryEntry>,
    pub updated_at: String,
}

/// A merge conflict surfaced by `TerminologyAgent::merge` / `GlossaryStore::merge`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MergeConflict {
    pub english: String,
    pub existing: String,
    pub incoming: String,
}

/// Metadata extracted by `IndexAgent` and persisted in `PaperRepository`.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PaperMetadata {
    pub title: String,
    pub title_zh: String,
    pub authors: Vec<String>,
    #[serde(rename = "abstract")]
    pub abstract_text: String,
    pub domain: String,
    pub research_problem: String,
    pub methodology: String,
    pub contributions: Vec<String>,
    pub keywords: Vec<String>,
    pub tags: Vec<String>,
    pub base_models: Vec<String>,
    pub year: Option<i32>,
    pub venue: String,
}

/// Output of one pipeline's `execute(bytes, filename)`.
#[derive(Debug, Clone, Default)]
pub struct PipelineResult {
    pub translated_md: String,
    pub images: HashMap<String, Vec<u8>>,
    pub ocr_md: Option<String>,
    pub ocr_images: HashMap<String, Vec<u8>>,
    pub prompt_profile: Option<PromptProfile>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn score_clamps_to_zero() {
        assert_eq!(QualityReport::score_for(30, 30, 30), 0);
    }

    #[test]
    fn score_matches_formula() {
        assert_eq!(QualityReport::score_for(1, 1, 1), 90);
    }

    #[test]
    fn quality_report_round_trips() {
        let report = QualityReport::new(
            vec![TermIssue {
                english_term: "Transformer".into(),
                observed_translations: vec!["变换器".into(), "Transformer模型".into()],
                locations: vec!["Line 3".into()],
                suggested: "变换器".into(),
            }],
            vec![],
            vec![],
            vec!["fix terminology".into()],
        );
        let json = serde_json::to_string(&report).unwrap();
        let back: QualityReport = serde_json::from_str(&json).unwrap();
        assert_eq!(report, back);
        assert_eq!(report.score, 95);
    }

    #[test]
    fn prompt_profile_merge_keeps_existing_on_conflict() {
        let mut profile = PromptProfile::default();
        profile.terminology.insert("Transformer".into(), "变换器".into());
        let mut glossary = HashMap::new();
        glossary.insert("Transformer".into(), "Transformer模型".into());
        glossary.insert("Encoder".into(), "编码器".into());
        profile.merge_glossary(&glossary);
        assert_eq!(profile.terminology.get("Transformer").unwrap(), "变换器");
        assert_eq!(profile.terminology.get("Encoder").unwrap(), "编码器");
    }
}

#[cfg(test)]
mod property_tests {
    use super::*;
    use proptest::prelude::*;

    proptest! {
        /// `score == 100 - 5*terms - 3*format - 2*untranslated`, clamped to `[0, 100]`, for any counts.
        #[test]
        fn score_matches_formula_and_stays_in_range(terms in 0usize..20, format in 0usize..20, untranslated in 0usize..20) {
            let score = QualityReport::score_for(terms, format, untranslated);
            let raw = 100 - 5 * terms as i32 - 3 * format as i32 - 2 * untranslated as i32;
            prop_assert_eq!(score, raw.clamp(0, 100));
            prop_assert!((0..=100).contains(&score));
        }

        /// Any `QualityReport` built from arbitrary findings round-trips through JSON unchanged.
        #[test]
        fn quality_report_round_trips_for_arbitrary_findings(
            term_count in 0usize..5,
            format_count in 0usize..5,
            untranslated_count in 0usize..5,
        ) {
            let term_issues: Vec<TermIssue> = (0..term_count)
                .map(|i| TermIssue {
                    english_term: format!("term{i}"),
                    observed_translations: vec![format!("译{i}"), format!("译法{i}")],
                    locations: vec![format!("Line {i}")],
                    suggested: format!("译{i}"),
                })
                .collect();
            let format_issues: Vec<FormatIssue> = (0..format_count)
                .map(|i| FormatIssue {
                    kind: FormatIssueKind::BrokenTable,
                    location: format!("Line {i}"),
                    description: format!("issue {i}"),
                })
                .collect();
            let untranslated: Vec<String> = (0..untranslated_count).map(|i| format!("block {i}")).collect();

            let report = QualityReport::new(term_issues, format_issues, untranslated, vec![]);
            let json = serde_json::to_string(&report).unwrap();
            let back: QualityReport = serde_json::from_str(&json).unwrap();
            prop_assert_eq!(report, back);
        }
    }
}
