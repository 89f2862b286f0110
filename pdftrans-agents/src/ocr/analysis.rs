use pdftrans_core::ParsedDocument;

/// Cheap structural signals used to pick a pipeline before any LLM or OCR
/// call is made.
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct DocumentClassification {
    pub native_text_len: usize,
    pub table_count: usize,
    pub formula_density: f32,
    pub non_latin_ratio: f32,
}

impl DocumentClassification {
    pub fn classify(doc: &ParsedDocument, native_text: &str) -> Self {
        let table_count = doc.pages.iter().map(|p| p.tables.len()).sum();

        let mut dollar_runs = 0usize;
        let mut total_chars = 0usize;
        let mut non_latin = 0usize;
        for ch in native_text.chars() {
            total_chars += 1;
            if ch == '$' {
                dollar_runs += 1;
            }
            if !ch.is_ascii() && !ch.is_whitespace() {
                non_latin += 1;
            }
        }

        let formula_density = if total_chars > 0 {
            dollar_runs as f32 / total_chars as f32
        } else {
            0.0
        };
        let non_latin_ratio = if total_chars > 0 { non_latin as f32 / total_chars as f32 } else { 0.0 };

        Self { native_text_len: total_chars, table_count, formula_density, non_latin_ratio }
    }

    /// A document with almost no recoverable native text is a scan; OCR is
    /// the only path that will produce anything at all. `native_text_len` is
    /// a character count, not a byte count, so CJK-heavy native text isn't
    /// overcounted.
    pub fn looks_scanned(&self) -> bool {
        self.native_text_len < 200
    }

    /// Formula-dense pages survive OCR's Markdown/LaTeX normalization better
    /// than the raw per-block text the LLM pipeline works from.
    pub fn is_formula_heavy(&self) -> bool {
        self.formula_density > 0.01
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pdftrans_core::{ParsedPage, TextBlock};

    fn doc_with_table() -> ParsedDocument {
        ParsedDocument {
            pages: vec![ParsedPage {
                blocks: vec![TextBlock { text: "hello".into(), y: 0.0, font_size: 10.0, bold: false }],
                tables: vec!["| a | b |".into()],
            }],
        }
    }

    #[test]
    fn sparse_text_looks_scanned() {
        let classification = DocumentClassification::classify(&ParsedDocument::default(), "");
        assert!(classification.looks_scanned());
    }

    #[test]
    fn long_native_text_does_not_look_scanned() {
        let text = "a".repeat(500);
        let classification = DocumentClassification::classify(&ParsedDocument::default(), &text);
        assert!(!classification.looks_scanned());
    }

    #[test]
    fn cjk_heavy_text_is_counted_by_characters_not_bytes() {
        // 90 three-byte CJK characters: 270 bytes but only 90 characters.
        let text = "文".repeat(90);
        let classification = DocumentClassification::classify(&ParsedDocument::default(), &text);
        assert_eq!(classification.native_text_len, 90);
        assert!(classification.looks_scanned());
    }

    #[test]
    fn counts_tables_from_pages() {
        let classification = DocumentClassification::classify(&doc_with_table(), "hello world this is long enough text to not look scanned at all, honestly");
        assert_eq!(classification.table_count, 1);
    }
}
