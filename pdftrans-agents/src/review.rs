use pdftrans_core::{FormatIssue, FormatIssueKind, QualityReport, TermIssue};
use regex::Regex;
use std::collections::{BTreeSet, HashMap};
use std::sync::OnceLock;

fn cjk_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[一-鿿]+").unwrap())
}

fn ascii_alpha_run_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"[A-Za-z]{2,}").unwrap())
}

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[[^\]]*\]\(([^)]*)\)").unwrap())
}

fn contains_cjk(line: &str) -> bool {
    cjk_regex().is_match(line)
}

fn is_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    trimmed.starts_with('#')
}

fn heading_level(line: &str) -> Option<usize> {
    let trimmed = line.trim_start();
    if !trimmed.starts_with('#') {
        return None;
    }
    let level = trimmed.chars().take_while(|c| *c == '#').count();
    let rest = &trimmed[level..];
    if rest.is_empty() || rest.starts_with(' ') {
        Some(level)
    } else {
        None
    }
}

fn is_short_single_token(line: &str) -> bool {
    let trimmed = line.trim();
    trimmed.len() <= 30 && !trimmed.contains(' ')
}

fn is_table_row(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim().trim_matches('|');
    !trimmed.is_empty() && trimmed.chars().all(|c| matches!(c, '-' | ':' | '|' | ' '))
}

fn column_count(line: &str) -> usize {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').count()
}

/// Pure, deterministic quality analysis with no external I/O.
/// Given `translated_md` and the run's `glossary`, produces a `QualityReport`.
pub struct ReviewAgent;

impl Default for ReviewAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl ReviewAgent {
    pub fn new() -> Self {
        Self
    }

    pub fn name(&self) -> &str {
        "review"
    }

    pub fn description(&self) -> &str {
        "scores translated markdown for terminology consistency, format integrity and untranslated content"
    }

    pub fn review(&self, translated_md: &str, glossary: &HashMap<String, String>) -> QualityReport {
        let lines: Vec<&str> = translated_md.lines().collect();

        let term_issues = Self::terminology_issues(&lines, glossary);
        let format_issues = Self::format_issues(&lines);
        let untranslated = Self::untranslated_blocks(&lines);
        let suggestions = Self::suggestions(&term_issues, &format_issues, &untranslated);

        QualityReport::new(term_issues, format_issues, untranslated, suggestions)
    }

    fn terminology_issues(lines: &[&str], glossary: &HashMap<String, String>) -> Vec<TermIssue> {
        let mut issues = Vec::new();
        let mut glossary_entries: Vec<(&String, &String)> = glossary.iter().collect();
        glossary_entries.sort_by_key(|(en, _)| en.as_str());

        for (english, expected_chinese) in glossary_entries {
            let Ok(term_re) = Regex::new(&format!(r"(?i)\b{}\b", regex::escape(english))) else { continue };

            let mut renderings: BTreeSet<String> = BTreeSet::new();
            let mut locations: BTreeSet<usize> = BTreeSet::new();

            for (idx, line) in lines.iter().enumerate() {
                let term_on_line = term_re.is_match(line);
                let has_expected = line.contains(expected_chinese.as_str());

                if term_on_line {
                    locations.insert(idx + 1);
                    for m in cjk_regex().find_iter(line) {
                        renderings.insert(m.as_str().to_string());
                    }
                } else if has_expected {
                    // Expected translation used correctly elsewhere; still a
                    // candidate location if another rendering shows up too.
                    locations.insert(idx + 1);
                    renderings.insert(expected_chinese.clone());
                }
            }

            if renderings.len() >= 2 {
                issues.push(TermIssue {
                    english_term: english.clone(),
                    observed_translations: renderings.into_iter().collect(),
                    locations: locations.into_iter().map(|n| format!("Line {n}")).collect(),
                    suggested: expected_chinese.clone(),
                });
            }
        }

        issues
    }

    fn format_issues(lines: &[&str]) -> Vec<FormatIssue> {
        let mut issues = Vec::new();
        issues.extend(Self::broken_tables(lines));
        issues.extend(Self::unclosed_math(lines));
        if let Some(issue) = Self::broken_heading(lines) {
            issues.push(issue);
        }
        issues.extend(Self::missing_images(lines));
        issues
    }

    fn broken_tables(lines: &[&str]) -> Vec<FormatIssue> {
        let mut issues = Vec::new();
        let mut idx = 0;
        while idx < lines.len() {
            if !is_table_row(lines[idx]) {
                idx += 1;
                continue;
            }
            let start = idx;
            let mut column_counts: BTreeSet<usize> = BTreeSet::new();
            while idx < lines.len() && is_table_row(lines[idx]) {
                if !is_separator_row(lines[idx]) {
                    column_counts.insert(column_count(lines[idx]));
                }
                idx += 1;
            }
            if column_counts.len() > 1 {
                issues.push(FormatIssue {
                    kind: FormatIssueKind::BrokenTable,
                    location: format!("Line {}", start + 1),
                    description: "table rows have inconsistent column counts".to_string(),
                });
            }
        }
        issues
    }

    fn unclosed_math(lines: &[&str]) -> Vec<FormatIssue> {
        let mut issues = Vec::new();
        let full_text = lines.join("\n");
        let display_marker_count = full_text.matches("$$").count();

        if display_marker_count % 2 != 0 {
            if let Some((idx, _)) = lines.iter().enumerate().find(|(_, l)| l.contains("$$")) {
                issues.push(FormatIssue {
                    kind: FormatIssueKind::MissingFormula,
                    location: format!("Line {}", idx + 1),
                    description: "unclosed display math ($$...$$)".to_string(),
                });
            }
            return issues;
        }

        let mut in_fence = false;
        let mut in_display_math = false;
        for (idx, line) in lines.iter().enumerate() {
            let trimmed = line.trim();
            if trimmed.starts_with("```") {
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                continue;
            }
            if trimmed == "$$" {
                in_display_math = !in_display_math;
                continue;
            }
            if in_display_math {
                continue;
            }

            let stripped = strip_inline_code(line);
            let residual_dollars = stripped.matches('$').count();
            if residual_dollars % 2 != 0 {
                issues.push(FormatIssue {
                    kind: FormatIssueKind::MissingFormula,
                    location: format!("Line {}", idx + 1),
                    description: "unclosed inline math ($...$)".to_string(),
                });
            }
        }
        issues
    }

    fn broken_heading(lines: &[&str]) -> Option<FormatIssue> {
        let mut previous_level: Option<usize> = None;
        for (idx, line) in lines.iter().enumerate() {
            let Some(level) = heading_level(line) else { continue };
            if let Some(prev) = previous_level {
                if level > prev + 1 {
                    return Some(FormatIssue {
                        kind: FormatIssueKind::BrokenHeading,
                        location: format!("Line {}", idx + 1),
                        description: format!("heading level jumps from {prev} to {level}"),
                    });
                }
            }
            previous_level = Some(level);
        }
        None
    }

    fn missing_images(lines: &[&str]) -> Vec<FormatIssue> {
        let mut issues = Vec::new();
        for (idx, line) in lines.iter().enumerate() {
            for cap in image_regex().captures_iter(line) {
                let path = cap.get(1).map(|m| m.as_str()).unwrap_or("");
                if path.trim().is_empty() {
                    issues.push(FormatIssue {
                        kind: FormatIssueKind::MissingImage,
                        location: format!("Line {}", idx + 1),
                        description: "image reference has an empty path".to_string(),
                    });
                }
            }
        }
        issues
    }

    fn untranslated_blocks(lines: &[&str]) -> Vec<String> {
        let mut blocks = Vec::new();
        let mut run: Vec<&str> = Vec::new();
        let mut in_fence = false;
        let mut in_display_math = false;

        let mut flush = |run: &mut Vec<&str>, blocks: &mut Vec<String>| {
            if run.len() >= 3 {
                blocks.push(run.join("\n"));
            }
            run.clear();
        };

        for line in lines {
            let trimmed = line.trim();
            if trimmed.starts_with("```") {
                flush(&mut run, &mut blocks);
                in_fence = !in_fence;
                continue;
            }
            if in_fence {
                flush(&mut run, &mut blocks);
                continue;
            }
            if trimmed == "$$" {
                flush(&mut run, &mut blocks);
                in_display_math = !in_display_math;
                continue;
            }
            if in_display_math {
                flush(&mut run, &mut blocks);
                continue;
            }

            let qualifies = !trimmed.is_empty()
                && !contains_cjk(line)
                && !is_heading(line)
                && !is_short_single_token(line)
                && ascii_alpha_run_regex().is_match(line);

            if qualifies {
                run.push(line);
            } else {
                flush(&mut run, &mut blocks);
            }
        }
        flush(&mut run, &mut blocks);
        blocks
    }

    fn suggestions(
        term_issues: &[TermIssue],
        format_issues: &[FormatIssue],
        untranslated: &[String],
    ) -> Vec<String> {
        let mut out = Vec::new();
        for issue in term_issues {
            out.push(format!(
                "Inconsistent translation of '{}': use '{}' (observed: {})",
                issue.english_term,
                issue.suggested,
                issue.observed_translations.join(", ")
            ));
        }
        if !format_issues.is_empty() {
            out.push(format!("{} formatting issue(s) detected; review tables, headings, math and images.", format_issues.len()));
        }
        if !untranslated.is_empty() {
            out.push(format!("{} paragraph(s) appear untranslated.", untranslated.len()));
        }
        out
    }
}

fn strip_inline_code(line: &str) -> String {
    let mut out = String::with_capacity(line.len());
    let mut in_code = false;
    for ch in line.chars() {
        if ch == '`' {
            in_code = !in_code;
            continue;
        }
        if !in_code {
            out.push(ch);
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scenario_5_scoring_matches_spec() {
        let md = "# Title\n\
### Subsection\n\
This uses the Transformer model, also written 变换器.\n\
Another line mentions Transformer again as Transformer模型 architecture.\n\
This is one English line with at least thirty one characters here.\n\
This is another English line with at least thirty one characters here.\n\
This is a third English line with at least thirty one characters here.\n";

        let mut glossary = HashMap::new();
        glossary.insert("Transformer".to_string(), "变换器".to_string());

        let agent = ReviewAgent::new();
        let report = agent.review(md, &glossary);

        assert_eq!(report.term_issues.len(), 1);
        assert_eq!(report.format_issues.len(), 1);
        assert_eq!(report.format_issues[0].kind, FormatIssueKind::BrokenHeading);
        assert_eq!(report.untranslated.len(), 1);
        assert_eq!(report.score, 90);
    }

    #[test]
    fn broken_table_detects_inconsistent_columns() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 | 3 |\n";
        let agent = ReviewAgent::new();
        let report = agent.review(md, &HashMap::new());
        assert_eq!(report.format_issues.len(), 1);
        assert_eq!(report.format_issues[0].kind, FormatIssueKind::BrokenTable);
    }

    #[test]
    fn consistent_table_is_not_flagged() {
        let md = "| a | b |\n|---|---|\n| 1 | 2 |\n";
        let agent = ReviewAgent::new();
        let report = agent.review(md, &HashMap::new());
        assert!(report.format_issues.is_empty());
    }

    #[test]
    fn unclosed_display_math_is_flagged() {
        let md = "intro\n\n$$\nE = mc^2\n";
        let agent = ReviewAgent::new();
        let report = agent.review(md, &HashMap::new());
        assert_eq!(report.format_issues.len(), 1);
        assert_eq!(report.format_issues[0].kind, FormatIssueKind::MissingFormula);
    }

    #[test]
    fn missing_image_path_is_flagged() {
        let md = "see the figure below\n\n![caption]()\n";
        let agent = ReviewAgent::new();
        let report = agent.review(md, &HashMap::new());
        assert_eq!(report.format_issues.len(), 1);
        assert_eq!(report.format_issues[0].kind, FormatIssueKind::MissingImage);
    }

    #[test]
    fn fully_translated_text_has_no_untranslated_blocks() {
        let md = "这是中文内容。\n这也是中文内容。\n这还是中文内容。\n";
        let agent = ReviewAgent::new();
        let report = agent.review(md, &HashMap::new());
        assert!(report.untranslated.is_empty());
        assert_eq!(report.score, 100);
    }

    #[test]
    fn code_fences_are_excluded_from_untranslated_scan() {
        let md = "```\nfn main() { println!(\"hello world\"); }\nlet x = compute_value();\nlet y = another_call();\n```\n";
        let agent = ReviewAgent::new();
        let report = agent.review(md, &HashMap::new());
        assert!(report.untranslated.is_empty());
    }
}
