//! Inline CSS evaluation for Evernote-specific style flags.
//!
//! Evernote emits the same semantic property under several vendor-prefix
//! spellings (`-en-`, `--en-`, `-evernote-`, `--evernote-`), sometimes with
//! malformed declaration blocks. Everything here degrades to `None` plus a
//! warning rather than failing the conversion.

use std::collections::HashMap;

pub type AttrMap = HashMap<String, String>;

/// Expands a bare property name into the vendor-prefix spellings Evernote
/// has been observed to use, in lookup order.
fn en_aliases(base: &str) -> [String; 4] {
    [
        format!("-en-{base}"),
        format!("--en-{base}"),
        format!("-evernote-{base}"),
        format!("--evernote-{base}"),
    ]
}

/// Returns the first matching value among `properties` from a CSS
/// declaration block, lower-cased and trimmed.
///
/// A malformed block (a non-empty declaration with no `:`) is logged and
/// treated as having no value at all.
pub fn css_value(style: &str, properties: &[&str]) -> Option<String> {
    let mut parsed: Vec<(String, String)> = Vec::new();
    for decl in style.split(';') {
        let decl = decl.trim();
        if decl.is_empty() {
            continue;
        }
        match decl.split_once(':') {
            Some((name, value)) => {
                parsed.push((name.trim().to_lowercase(), value.trim().to_lowercase()));
            }
            None => {
                log::warn!("Invalid CSS declaration block: {:?}", style);
                return None;
            }
        }
    }

    for prop in properties {
        let prop = prop.to_lowercase();
        if let Some((_, value)) = parsed.iter().find(|(name, _)| *name == prop) {
            return Some(value.clone());
        }
    }
    None
}

fn en_css_value(attrs: &AttrMap, base: &str) -> Option<String> {
    let style = attrs.get("style")?;
    let aliases = en_aliases(base);
    let props: Vec<&str> = aliases.iter().map(|s| s.as_str()).collect();
    css_value(style, &props)
}

/// True for `<code>` and for blocks flagged with the codeblock style.
pub fn is_code_block(tag_name: &str, attrs: &AttrMap) -> bool {
    if tag_name == "code" {
        return true;
    }
    en_css_value(attrs, "codeblock").as_deref() == Some("true")
}

/// True when a highlight style is present and not literally "false". Any
/// other value, including a colour, counts as highlighted.
pub fn is_highlight(attrs: &AttrMap) -> bool {
    match en_css_value(attrs, "highlight") {
        Some(v) => v != "false",
        None => false,
    }
}

/// True for `display: none` (and its longhand variants starting with "none").
pub fn is_invisible_block(attrs: &AttrMap) -> bool {
    let Some(style) = attrs.get("style") else {
        return false;
    };
    match css_value(style, &["display"]) {
        Some(v) => v.starts_with("none"),
        None => false,
    }
}

/// True when a `ul`/`ol` is actually an Evernote checkbox list.
pub fn is_checkbox_list(attrs: &AttrMap) -> bool {
    en_css_value(attrs, "todo").as_deref() == Some("true")
}

/// Checked state of a checkbox list item.
pub fn is_checked(attrs: &AttrMap) -> bool {
    en_css_value(attrs, "checked").as_deref() == Some("true")
}

/// The note-level task group id carried by a task-group block, if any.
pub fn task_group_id(attrs: &AttrMap) -> Option<String> {
    if en_css_value(attrs, "task-group").as_deref() != Some("true") {
        return None;
    }
    en_css_value(attrs, "id")
}

/// Bold/italic decisions deferred from a `<span style=...>`.
pub fn span_is_bold(attrs: &AttrMap) -> bool {
    let Some(style) = attrs.get("style") else {
        return false;
    };
    if let Some(weight) = css_value(style, &["font-weight"]) {
        if weight == "bold" || weight == "bolder" {
            return true;
        }
        if let Ok(w) = weight.parse::<u32>() {
            if w >= 700 {
                return true;
            }
        }
    }
    match css_value(style, &["font-family"]) {
        Some(family) => family.contains("bold"),
        None => false,
    }
}

pub fn span_is_italic(attrs: &AttrMap) -> bool {
    let Some(style) = attrs.get("style") else {
        return false;
    };
    matches!(css_value(style, &["font-style"]).as_deref(), Some("italic"))
}
