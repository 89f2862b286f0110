/// Joins per-page translated Markdown into one document, repairing the two
/// artifacts a page-by-page LLM pass reliably introduces at page boundaries:
/// a sentence cut mid-flow, and a table whose rows got split across pages.
///
/// Pure and idempotent: feeding it the same pages twice produces the same
/// string, and it never needs to see its own prior output.
pub fn stitch_pages(pages: &[String]) -> String {
    let mut out = String::new();
    for (idx, page) in pages.iter().enumerate() {
        let page = page.trim();
        if page.is_empty() {
            continue;
        }
        if out.is_empty() {
            out.push_str(page);
            continue;
        }
        if idx > 0 && ends_mid_table(&out) && starts_as_table(page) {
            out.push('\n');
            out.push_str(strip_duplicate_separator(page));
        } else if continues_sentence(&out, page) {
            out.push(' ');
            out.push_str(page);
        } else {
            out.push_str("\n\n");
            out.push_str(page);
        }
    }
    out
}

fn last_nonempty_line(text: &str) -> &str {
    text.lines().rev().find(|l| !l.trim().is_empty()).unwrap_or("")
}

fn first_nonempty_line(text: &str) -> &str {
    text.lines().find(|l| !l.trim().is_empty()).unwrap_or("")
}

fn ends_mid_table(text: &str) -> bool {
    last_nonempty_line(text).trim_start().starts_with('|')
}

fn starts_as_table(text: &str) -> bool {
    first_nonempty_line(text).trim_start().starts_with('|')
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim().trim_matches('|');
    !trimmed.is_empty() && trimmed.chars().all(|c| matches!(c, '-' | ':' | '|' | ' '))
}

/// A page continuing a table from the previous one often repeats the header
/// separator row; drop it so the merged table stays well-formed.
fn strip_duplicate_separator(page: &str) -> &str {
    let mut lines = page.lines();
    if let Some(first) = lines.clone().next() {
        if is_separator_row(first) {
            return page.splitn(2, '\n').nth(1).unwrap_or("").trim_start();
        }
    }
    page
}

fn ends_sentence(line: &str) -> bool {
    matches!(
        line.trim_end().chars().last(),
        Some('.') | Some('!') | Some('?') | Some('。') | Some('!') | Some('?') | Some(':') | Some('：')
    )
}

fn continues_sentence(prev: &str, next: &str) -> bool {
    let last = last_nonempty_line(prev);
    let first = first_nonempty_line(next);
    if last.is_empty() || first.is_empty() {
        return false;
    }
    if last.trim_start().starts_with('#') || first.trim_start().starts_with('#') {
        return false;
    }
    if last.trim_start().starts_with('|') || first.trim_start().starts_with('|') {
        return false;
    }
    if ends_sentence(last) {
        return false;
    }
    let starts_new_block = first.trim_start().starts_with('-')
        || first.trim_start().starts_with('*')
        || first.trim_start().chars().next().map(|c| c.is_numeric()).unwrap_or(false);
    !starts_new_block
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn merges_table_split_across_pages_without_duplicate_separator() {
        let pages = vec![
            "# Results\n\n| a | b |\n|---|---|\n| 1 | 2 |".to_string(),
            "|---|---|\n| 3 | 4 |".to_string(),
        ];
        let merged = stitch_pages(&pages);
        assert_eq!(merged.matches("---").count(), 1);
        assert!(merged.contains("| 3 | 4 |"));
    }

    #[test]
    fn joins_sentence_cut_at_page_boundary_with_a_space() {
        let pages = vec!["This sentence continues".to_string(), "on the next page.".to_string()];
        let merged = stitch_pages(&pages);
        assert_eq!(merged, "This sentence continues on the next page.");
    }

    #[test]
    fn keeps_paragraph_break_when_previous_page_ends_a_sentence() {
        let pages = vec!["First paragraph.".to_string(), "Second paragraph.".to_string()];
        let merged = stitch_pages(&pages);
        assert_eq!(merged, "First paragraph.\n\nSecond paragraph.");
    }

    #[test]
    fn is_idempotent_over_its_own_output() {
        let pages = vec!["One.".to_string(), "Two.".to_string()];
        let once = stitch_pages(&pages);
        let twice = stitch_pages(&[once.clone()]);
        assert_eq!(once, twice);
    }
}
