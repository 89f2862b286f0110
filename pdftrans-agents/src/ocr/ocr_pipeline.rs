use regex::Regex;
use std::sync::OnceLock;

fn page_marker_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<!--\s*Page\s+\d+\s*-->").unwrap())
}

fn html_table_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<table[^>]*>(.*?)</table>").unwrap())
}

fn html_row_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<tr[^>]*>(.*?)</tr>").unwrap())
}

fn html_cell_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<t[dh][^>]*>(.*?)</t[dh]>").unwrap())
}

fn image_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"!\[([^\]]*)\]\(([^)]*)\)").unwrap())
}

fn html_img_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"<img\b[^>]*>").unwrap())
}

fn img_src_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"src\s*=\s*"([^"]*)""#).unwrap())
}

fn img_alt_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r#"alt\s*=\s*"([^"]*)""#).unwrap())
}

fn html_div_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"(?s)<div([^>]*)>(.*?)</div>").unwrap())
}

fn strip_tags(cell: &str) -> String {
    let mut out = String::with_capacity(cell.len());
    let mut in_tag = false;
    for ch in cell.chars() {
        match ch {
            '<' => in_tag = true,
            '>' => in_tag = false,
            _ if !in_tag => out.push(ch),
            _ => {}
        }
    }
    out.trim().to_string()
}

/// Converts any raw `<table>` HTML an OCR provider emits into a Markdown
/// table, inserting a separator row after the header.
fn html_tables_to_markdown(input: &str) -> String {
    html_table_regex()
        .replace_all(input, |caps: &regex::Captures| {
            let body = &caps[1];
            let rows: Vec<Vec<String>> = html_row_regex()
                .captures_iter(body)
                .map(|row_caps| {
                    html_cell_regex()
                        .captures_iter(&row_caps[1])
                        .map(|cell_caps| strip_tags(&cell_caps[1]))
                        .collect()
                })
                .collect();

            if rows.is_empty() {
                return String::new();
            }

            let mut md = String::new();
            for (idx, row) in rows.iter().enumerate() {
                md.push('|');
                for cell in row {
                    md.push(' ');
                    md.push_str(cell);
                    md.push_str(" |");
                }
                md.push('\n');
                if idx == 0 {
                    md.push('|');
                    for _ in row {
                        md.push_str(" --- |");
                    }
                    md.push('\n');
                }
            }
            md
        })
        .into_owned()
}

/// Fills in missing separator rows and pads or truncates rows whose cell
/// count doesn't match the header, one Markdown table block at a time.
fn repair_tables(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut idx = 0;

    while idx < lines.len() {
        if !is_table_row(lines[idx]) {
            out.push(lines[idx].to_string());
            idx += 1;
            continue;
        }

        let header = lines[idx];
        let column_count = cells(header).len();
        out.push(header.to_string());
        idx += 1;

        if idx < lines.len() && is_separator_row(lines[idx]) {
            out.push(lines[idx].to_string());
            idx += 1;
        } else {
            out.push(synthetic_separator(column_count));
        }

        while idx < lines.len() && is_table_row(lines[idx]) {
            out.push(normalize_row(lines[idx], column_count));
            idx += 1;
        }
    }

    out.join("\n")
}

fn is_table_row(line: &str) -> bool {
    line.trim_start().starts_with('|')
}

fn is_separator_row(line: &str) -> bool {
    let trimmed = line.trim().trim_matches('|');
    !trimmed.is_empty() && trimmed.chars().all(|c| matches!(c, '-' | ':' | '|' | ' '))
}

fn cells(line: &str) -> Vec<&str> {
    let trimmed = line.trim();
    let inner = trimmed.strip_prefix('|').unwrap_or(trimmed);
    let inner = inner.strip_suffix('|').unwrap_or(inner);
    inner.split('|').map(|c| c.trim()).collect()
}

fn synthetic_separator(column_count: usize) -> String {
    let mut row = String::from("|");
    for _ in 0..column_count.max(1) {
        row.push_str(" --- |");
    }
    row
}

fn normalize_row(line: &str, column_count: usize) -> String {
    let mut row_cells: Vec<String> = cells(line).into_iter().map(|c| c.to_string()).collect();
    row_cells.resize(column_count, String::new());
    let mut row = String::from("|");
    for cell in row_cells {
        row.push(' ');
        row.push_str(&cell);
        row.push_str(" |");
    }
    row
}

/// Rewrites raw `<img src="..." alt="...">` tags into Markdown image syntax
/// so the rest of the pipeline only ever deals with one image
/// representation.
fn html_images_to_markdown(input: &str) -> String {
    html_img_regex()
        .replace_all(input, |caps: &regex::Captures| {
            let tag = &caps[0];
            let src = img_src_regex().captures(tag).map(|c| c[1].to_string()).unwrap_or_default();
            let alt = img_alt_regex().captures(tag).map(|c| c[1].to_string()).unwrap_or_default();
            format!("![{alt}]({src})")
        })
        .into_owned()
}

fn is_centered(div_attrs: &str) -> bool {
    let compact: String = div_attrs.chars().filter(|c| !c.is_whitespace()).collect::<String>().to_lowercase();
    compact.contains("text-align:center") || compact.contains(r#"class="caption""#)
}

/// Figure captions an OCR provider wraps in a `<div>` lose their visual
/// centering once stripped to text; a centered caption div becomes a
/// Markdown blockquote so the figcaption stays visually distinct. A
/// non-centered div is just unwrapped to plain text.
fn normalize_div_captions(input: &str) -> String {
    html_div_regex()
        .replace_all(input, |caps: &regex::Captures| {
            let attrs = &caps[1];
            let body = strip_tags(&caps[2]);
            if body.is_empty() {
                return String::new();
            }
            if is_centered(attrs) {
                format!("> {body}")
            } else {
                body
            }
        })
        .into_owned()
}

/// Replaces an empty or generic image alt with the caption on the line right
/// after it, when one looks present.
fn normalize_images(input: &str) -> String {
    let lines: Vec<&str> = input.lines().collect();
    let mut out = Vec::with_capacity(lines.len());

    for (idx, line) in lines.iter().enumerate() {
        if let Some(caps) = image_regex().captures(line) {
            let alt = caps.get(1).map(|m| m.as_str()).unwrap_or("");
            let path = caps.get(2).map(|m| m.as_str()).unwrap_or("");
            if alt.trim().is_empty() || alt.eq_ignore_ascii_case("image") {
                if let Some(next) = lines.get(idx + 1) {
                    let caption = next.trim();
                    let quoted_caption = caption.strip_prefix('>').map(|c| c.trim());
                    if !caption.is_empty() && (caption.starts_with("Figure") || caption.starts_with('图')) {
                        out.push(format!("![{caption}]({path})"));
                        continue;
                    }
                    if let Some(quoted) = quoted_caption {
                        if !quoted.is_empty() {
                            out.push(format!("![{quoted}]({path})"));
                            continue;
                        }
                    }
                }
                out.push(format!("![figure]({path})"));
                continue;
            }
        }
        out.push(line.to_string());
    }
    out.join("\n")
}

/// Splits raw OCR output on `<!-- Page N -->` markers, stitches the
/// resulting paragraphs with [`super::llm_pipeline::stitch_pages`], then
/// repairs tables and image references.
pub fn normalize_ocr_markdown(raw: &str) -> String {
    let pages: Vec<String> = page_marker_regex()
        .split(raw)
        .map(|p| p.trim().to_string())
        .filter(|p| !p.is_empty())
        .collect();

    let stitched = if pages.is_empty() { raw.trim().to_string() } else { super::llm_pipeline::stitch_pages(&pages) };
    let with_captions = normalize_div_captions(&stitched);
    let with_md_images = html_images_to_markdown(&with_captions);
    let with_md_tables = html_tables_to_markdown(&with_md_images);
    let repaired = repair_tables(&with_md_tables);
    normalize_images(&repaired)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn converts_html_table_to_markdown() {
        let input = "<table><tr><th>a</th><th>b</th></tr><tr><td>1</td><td>2</td></tr></table>";
        let out = html_tables_to_markdown(input);
        assert!(out.contains("| a | b |"));
        assert!(out.contains("| --- | --- |"));
        assert!(out.contains("| 1 | 2 |"));
    }

    #[test]
    fn repairs_missing_separator_row() {
        let input = "| a | b |\n| 1 | 2 |";
        let out = repair_tables(input);
        let lines: Vec<&str> = out.lines().collect();
        assert_eq!(lines[1].trim(), "| --- | --- |");
    }

    #[test]
    fn pads_short_rows_to_header_width() {
        let input = "| a | b | c |\n|---|---|---|\n| 1 | 2 |";
        let out = repair_tables(input);
        let last_line = out.lines().last().unwrap();
        assert_eq!(cells(last_line).len(), 3);
    }

    #[test]
    fn fills_missing_image_alt_from_following_caption() {
        let input = "![]()\nFigure 1: a plot of results";
        let out = normalize_images(input);
        assert!(out.starts_with("![Figure 1: a plot of results]"));
    }

    #[test]
    fn converts_html_img_tag_to_markdown_image() {
        let input = r#"<img src="figures/fig1.png" alt="loss curve">"#;
        let out = html_images_to_markdown(input);
        assert_eq!(out, "![loss curve](figures/fig1.png)");
    }

    #[test]
    fn centered_caption_div_becomes_blockquote() {
        let input = r#"<div style="text-align: center">Figure 1: loss curve</div>"#;
        let out = normalize_div_captions(input);
        assert_eq!(out, "> Figure 1: loss curve");
    }

    #[test]
    fn non_centered_caption_div_stays_plain_text() {
        let input = r#"<div class="notes">see appendix</div>"#;
        let out = normalize_div_captions(input);
        assert_eq!(out, "see appendix");
    }

    #[test]
    fn blockquoted_caption_after_image_fills_alt() {
        let input = "![]()\n> Figure 1: loss curve";
        let out = normalize_images(input);
        assert!(out.starts_with("![Figure 1: loss curve]"));
    }

    #[test]
    fn strips_page_markers_and_stitches() {
        let raw = "<!-- Page 1 -->\nFirst page text.\n<!-- Page 2 -->\nSecond page text.";
        let out = normalize_ocr_markdown(raw);
        assert!(!out.contains("<!--"));
        assert!(out.contains("First page text."));
        assert!(out.contains("Second page text."));
    }
}
