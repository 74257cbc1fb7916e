use anyhow::{bail, Result};
use deunicode::deunicode;

/// Column header every repaired transcript starts with.
pub const CANONICAL_HEADER: &str = "name|gender|text";

pub const DELIMITER: char = '|';

/// Rebuild a raw model response into a strict `name|gender|text` transcript.
///
/// The input is untrusted: models wrap tables in prose and code fences, swap
/// the delimiter for commas, invent their own headers, line-wrap mid-utterance
/// and leave markdown rules between rows. Empty or garbage input never panics;
/// the only failure is "no usable rows", which callers treat as a retryable
/// generation failure.
pub fn repair(raw: &str) -> Result<String> {
    let mut text = raw.to_string();

    // Replace everything up to and including a model-provided header with the
    // canonical one. This swallows any preamble and opening code fence, so the
    // first fence marker left in the text is the closing one; whatever follows
    // it is commentary.
    let had_header = match locate_header_line(&text) {
        Some(end) => {
            text = format!("{}\n{}", CANONICAL_HEADER, &text[end..]);
            true
        }
        None => false,
    };
    if had_header {
        if let Some(pos) = text.find("```") {
            text.truncate(pos);
        }
    }

    let mut lines: Vec<String> = Vec::new();
    for line in text.lines() {
        let line = line.trim();
        if line.is_empty() || line.starts_with("```") || is_rule_line(line) {
            continue;
        }
        lines.push(line.to_string());
    }

    if !first_line_is_header(&lines) {
        lines.insert(0, CANONICAL_HEADER.to_string());
    }
    // Model-provided headers are not trustworthy; line 0 is always ours.
    lines[0] = CANONICAL_HEADER.to_string();

    let merged = merge_wrapped_lines(lines);

    let rows: Vec<String> = merged
        .into_iter()
        .filter(|l| delimiter_count(l) >= 2 && l.matches("-|").count() < 2)
        .map(|l| normalize_row(&l))
        .collect();

    if rows.len() <= 1 {
        bail!("no usable rows in repaired transcript");
    }

    let mut out = rows.join("\n");
    out.push('\n');
    Ok(out)
}

/// Byte offset just past the first line that reads like a column header,
/// whatever delimiter or quoting the model chose.
fn locate_header_line(text: &str) -> Option<usize> {
    let mut offset = 0;
    for line in text.split_inclusive('\n') {
        if looks_like_header(line) {
            return Some(offset + line.len());
        }
        offset += line.len();
    }
    None
}

fn looks_like_header(line: &str) -> bool {
    let lower = line.trim().to_lowercase();
    let lower = lower.trim_start_matches(['"', '\'', '|', '*', ' ']);
    // A tight match keeps prose that merely mentions the column names from
    // being mistaken for the header.
    lower.starts_with("name") && lower.contains("gender") && lower.contains("text") && lower.len() <= 64
}

fn first_line_is_header(lines: &[String]) -> bool {
    lines.first().is_some_and(|l| {
        let lower = l.to_lowercase();
        lower.contains("name") && lower.contains("gender")
    })
}

/// Markdown rules and delimiter-only junk between rows.
fn is_rule_line(line: &str) -> bool {
    !line.is_empty()
        && line
            .chars()
            .all(|c| c == '-' || c == DELIMITER || c.is_whitespace())
}

/// A line with fewer than two delimiters cannot be a full row; the model
/// line-wrapped mid-utterance, so glue it onto the previous line.
fn merge_wrapped_lines(lines: Vec<String>) -> Vec<String> {
    let mut merged: Vec<String> = Vec::new();
    for line in lines {
        if delimiter_count(&line) < 2 {
            if let Some(prev) = merged.last_mut() {
                prev.push(' ');
                prev.push_str(&line);
                continue;
            }
        }
        merged.push(line);
    }
    merged
}

fn delimiter_count(line: &str) -> usize {
    line.chars().filter(|c| *c == DELIMITER).count()
}

fn normalize_row(line: &str) -> String {
    let line = line.trim_matches(|c: char| c == DELIMITER || c.is_whitespace());
    let line = line.replace("\\n", " ").replace("\\t", " ");
    deunicode(&line)
}
