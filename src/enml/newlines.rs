//! Reduction of structural sentinel tokens into clean text.
//!
//! The builder is deliberately generous with `BLOCK_OPEN`/`BLOCK_CLOSE`
//! sentinels; this module collapses them into the minimal number of blank
//! lines, then applies layout heuristics between heterogeneous block types.

use std::sync::OnceLock;

use regex::Regex;

use super::section::MdToken;

/// Renders a token array to text: 4 reduction passes over the sentinels,
/// then character emission with space dedup, then layout formatting and
/// blank-line collapsing.
pub fn render_md_tokens(tokens: &[MdToken]) -> String {
    use MdToken::*;

    let mut md: Vec<&MdToken> = tokens.iter().collect();

    // Pass 1: trim leading opens and trailing closes.
    while md.first() == Some(&&BlockOpen) {
        md.remove(0);
    }
    while md.last() == Some(&&BlockClose) {
        md.pop();
    }

    // Pass 2: collapse consecutive identical open/close sentinels, which
    // stack up when nested block tags close together.
    let mut temp: Vec<&MdToken> = Vec::with_capacity(md.len());
    let mut last: Option<&MdToken> = None;
    for v in md {
        let duplicate = matches!(v, BlockOpen | BlockClose) && last == Some(v);
        if !duplicate {
            temp.push(v);
        }
        last = Some(v);
    }

    // Pass 3: a close immediately followed by an open is one paragraph
    // break, not two.
    let mut merged: Vec<MdToken> = Vec::with_capacity(temp.len());
    for v in temp {
        if merged.last() == Some(&BlockClose) && *v == BlockOpen {
            merged.pop();
            merged.push(NewlineMerged);
        } else {
            merged.push(v.clone());
        }
    }

    // Pass 4: drop a break sentinel sitting right after an explicit newline.
    let mut reduced: Vec<MdToken> = Vec::with_capacity(merged.len());
    let mut last: Option<MdToken> = None;
    for v in merged {
        let redundant =
            last == Some(Newline) && matches!(v, NewlineMerged | BlockOpen | BlockClose);
        last = Some(v.clone());
        if !redundant {
            reduced.push(v);
        }
    }

    // Character emission. SPACE only lands when the previous character is
    // not already whitespace or start-of-output.
    let mut output = String::new();
    for v in &reduced {
        match v {
            BlockOpen | BlockClose | Newline | NewlineMerged => output.push('\n'),
            Space => {
                let prev = output.chars().last();
                match prev {
                    None | Some(' ') | Some('\n') | Some('\t') => {}
                    Some(_) => output.push(' '),
                }
            }
            Text(s) => output.push_str(s),
        }
    }

    if output.trim().is_empty() {
        return String::new();
    }

    let lines: Vec<String> = output.split('\n').map(|l| l.to_string()).collect();
    let output = format_md_layout(lines).join("\n");

    static COLLAPSE: OnceLock<Regex> = OnceLock::new();
    COLLAPSE
        .get_or_init(|| Regex::new(r"\n{3,}").unwrap())
        .replace_all(&output, "\n\n")
        .into_owned()
}

fn is_heading(line: &str) -> bool {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^#+\s").unwrap()).is_match(line)
}

fn is_list_item(line: &str) -> bool {
    line.trim_start().starts_with("- ")
}

fn is_code_line(line: &str) -> bool {
    line.starts_with('\t')
}

fn is_table_line(line: &str) -> bool {
    line.starts_with("| ")
}

/// Lines this long are assumed to be full paragraphs; shorter ones are
/// treated as intentionally hard-wrapped and left alone.
fn is_plain_paragraph(line: &str) -> bool {
    line.len() >= 80
        && !is_list_item(line)
        && !is_heading(line)
        && !is_code_line(line)
        && !is_table_line(line)
}

/// Inserts exactly one blank line at every transition between heterogeneous
/// block categories. Running it on its own output is a no-op.
pub fn format_md_layout(lines: Vec<String>) -> Vec<String> {
    let mut out: Vec<String> = Vec::with_capacity(lines.len());
    let mut previous = String::new();
    for line in lines {
        let blank = if is_list_item(&previous) && !line.is_empty() && !is_list_item(&line) {
            true
        } else if is_list_item(&line) && !previous.is_empty() && !is_list_item(&previous) {
            true
        } else if is_heading(&line) && !previous.is_empty() {
            true
        } else if is_heading(&previous) && !line.is_empty() {
            true
        } else if is_code_line(&line) && !is_code_line(&previous) && !previous.is_empty() {
            true
        } else if !is_code_line(&line) && is_code_line(&previous) && !line.is_empty() {
            true
        } else if is_table_line(&line) && !is_table_line(&previous) && !previous.is_empty() {
            true
        } else if !is_table_line(&line) && is_table_line(&previous) && !line.is_empty() {
            true
        } else {
            (is_plain_paragraph(&line) && !previous.is_empty())
                || (is_plain_paragraph(&previous) && !line.is_empty())
        };

        if blank {
            out.push(String::new());
        }
        previous = line.clone();
        out.push(line);
    }
    out
}
