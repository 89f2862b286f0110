//! Cross-page repair for the LLM pipeline, operating on a freshly parsed
//! [`ParsedDocument`] *before* any page is translated — the counterpart to
//! [`super::stitch_pages`], which patches the same class of boundary defects
//! after translation on the OCR path's plain Markdown.

use pdftrans_core::{ParsedDocument, ParsedPage, TextBlock};

const FONT_SIZE_RATIO_THRESHOLD: f32 = 1.15;

fn ends_with_terminator(text: &str) -> bool {
    matches!(
        text.trim_end().chars().last(),
        Some('.') | Some('!') | Some('?') | Some('。') | Some('!') | Some('?') | Some(':') | Some('：')
    )
}

fn is_all_caps_heading(line: &str) -> bool {
    let letters: String = line.chars().filter(|c| c.is_alphabetic()).collect();
    letters.chars().count() >= 6 && letters.chars().all(|c| c.is_uppercase())
}

fn is_numbered_heading(line: &str) -> bool {
    let trimmed = line.trim_start();
    let digits: String = trimmed.chars().take_while(|c| c.is_ascii_digit()).collect();
    if digits.is_empty() {
        return false;
    }
    matches!(trimmed.as_bytes().get(digits.len()), Some(b'.') | Some(b')'))
}

fn looks_like_heading(text: &str) -> bool {
    let line = text.trim();
    line.starts_with('#') || is_all_caps_heading(line) || is_numbered_heading(line)
}

fn font_sizes_close(a: f32, b: f32) -> bool {
    if a <= 0.0 || b <= 0.0 {
        return true;
    }
    let ratio = if a > b { a / b } else { b / a };
    ratio < FONT_SIZE_RATIO_THRESHOLD
}

fn should_merge_blocks(tail: &TextBlock, head: &TextBlock) -> bool {
    !ends_with_terminator(&tail.text) && !looks_like_heading(&head.text) && font_sizes_close(tail.font_size, head.font_size)
}

fn table_column_count(table: &str) -> usize {
    table
        .lines()
        .find(|l| !l.trim().is_empty())
        .map(|l| l.trim().trim_matches('|').split('|').count())
        .unwrap_or(0)
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim().trim_matches('|');
    !trimmed.is_empty() && trimmed.chars().all(|c| matches!(c, '-' | ':' | '|' | ' '))
}

/// A continuation table never carries its own header separator row; a
/// genuinely independent table does.
fn has_independent_header(table: &str) -> bool {
    table.lines().nth(1).map(is_separator_row).unwrap_or(false)
}

fn merge_tables(prev: &mut String, next: &str) {
    let rows: Vec<&str> = next.lines().filter(|l| !l.trim().is_empty()).collect();
    for row in rows {
        prev.push('\n');
        prev.push_str(row);
    }
}

/// Merges the tail of page N into the head of page N+1 wherever the
/// heuristics in the module doc hold, for both prose blocks and tables.
/// Pages themselves are preserved (never dropped), only their contents
/// shift across the boundary.
pub fn stitch_document(mut doc: ParsedDocument) -> ParsedDocument {
    for idx in 0..doc.pages.len().saturating_sub(1) {
        stitch_table_boundary(&mut doc.pages, idx);
        stitch_text_boundary(&mut doc.pages, idx);
    }
    doc
}

fn stitch_text_boundary(pages: &mut [ParsedPage], idx: usize) {
    let should_merge = match (pages[idx].blocks.last(), pages[idx + 1].blocks.first()) {
        (Some(tail), Some(head)) => should_merge_blocks(tail, head),
        _ => false,
    };
    if !should_merge {
        return;
    }
    let head = pages[idx + 1].blocks.remove(0);
    let tail = pages[idx].blocks.last_mut().unwrap();
    tail.text.push(' ');
    tail.text.push_str(&head.text);
}

fn stitch_table_boundary(pages: &mut [ParsedPage], idx: usize) {
    let should_merge = match (pages[idx].tables.last(), pages[idx + 1].tables.first()) {
        (Some(prev), Some(next)) => {
            table_column_count(prev) == table_column_count(next) && !has_independent_header(next)
        }
        _ => false,
    };
    if !should_merge {
        return;
    }
    let next = pages[idx + 1].tables.remove(0);
    let prev = pages[idx].tables.last_mut().unwrap();
    merge_tables(prev, &next);
}
