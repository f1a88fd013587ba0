//! Tag classification predicates.
//!
//! Pure, total functions over a lower-cased tag name. Both the open-tag and
//! close-tag handlers go through these so that the two sides stay symmetric.

/// Generic block-level containers that only contribute paragraph breaks.
pub fn is_block_tag(n: &str) -> bool {
    matches!(n, "div" | "p" | "dl" | "dd" | "dt" | "center" | "address")
}

pub fn is_strong_tag(n: &str) -> bool {
    matches!(n, "strong" | "b" | "big")
}

pub fn is_strike_tag(n: &str) -> bool {
    matches!(n, "strike" | "s" | "del")
}

pub fn is_em_tag(n: &str) -> bool {
    matches!(n, "em" | "i" | "u")
}

pub fn is_quote_tag(n: &str) -> bool {
    n == "q"
}

pub fn is_inline_code_tag(n: &str) -> bool {
    matches!(n, "samp" | "kbd")
}

pub fn is_anchor(n: &str) -> bool {
    n == "a"
}

pub fn is_list_tag(n: &str) -> bool {
    matches!(n, "ol" | "ul")
}

/// Tags whose closing only ends the current line/paragraph.
pub fn is_new_line_only_end_tag(n: &str) -> bool {
    matches!(
        n,
        "div"
            | "p"
            | "li"
            | "h1"
            | "h2"
            | "h3"
            | "h4"
            | "h5"
            | "h6"
            | "dl"
            | "dd"
            | "dt"
            | "center"
            | "address"
    )
}

pub fn is_heading_tag(n: &str) -> bool {
    matches!(n, "h1" | "h2" | "h3" | "h4" | "h5" | "h6")
}

/// Returns the heading level for `h1`..`h6`, or `None`.
pub fn heading_level(n: &str) -> Option<usize> {
    if !is_heading_tag(n) {
        return None;
    }
    n[1..].parse().ok()
}

/// Closing tags that carry no structure or styling of their own.
pub fn is_ignored_end_tag(n: &str) -> bool {
    matches!(
        n,
        "en-note"
            | "en-todo"
            | "en-media"
            | "body"
            | "html"
            | "font"
            | "br"
            | "hr"
            | "tbody"
            | "thead"
            | "sup"
            | "sub"
            | "img"
            | "abbr"
            | "cite"
            | "small"
            | "tt"
            | "ins"
            | "colgroup"
            | "col"
            | "var"
            | "map"
            | "area"
    )
}

/// Opening tags that are known and deliberately not styled.
pub fn is_ignored_open_tag(n: &str) -> bool {
    matches!(
        n,
        "body"
            | "html"
            | "font"
            | "sup"
            | "sub"
            | "abbr"
            | "cite"
            | "small"
            | "tt"
            | "ins"
            | "colgroup"
            | "col"
            | "var"
            | "map"
            | "area"
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strong_variants() {
        assert!(is_strong_tag("strong"));
        assert!(is_strong_tag("b"));
        assert!(is_strong_tag("big"));
        assert!(!is_strong_tag("em"));
    }

    #[test]
    fn test_em_includes_underline() {
        assert!(is_em_tag("em"));
        assert!(is_em_tag("i"));
        assert!(is_em_tag("u"));
        assert!(!is_em_tag("b"));
    }

    #[test]
    fn test_strike_variants() {
        assert!(is_strike_tag("strike"));
        assert!(is_strike_tag("s"));
        assert!(is_strike_tag("del"));
    }

    #[test]
    fn test_new_line_only_end_tags() {
        for n in ["div", "p", "li", "h1", "h6", "dl", "dd", "dt", "center", "address"] {
            assert!(is_new_line_only_end_tag(n), "{n}");
        }
        assert!(!is_new_line_only_end_tag("table"));
        assert!(!is_new_line_only_end_tag("span"));
    }

    #[test]
    fn test_heading_level() {
        assert_eq!(heading_level("h1"), Some(1));
        assert_eq!(heading_level("h6"), Some(6));
        assert_eq!(heading_level("h7"), None);
        assert_eq!(heading_level("div"), None);
    }

    #[test]
    fn test_evernote_void_tags_ignored_on_close() {
        // These are handled entirely at open time; their synthetic close
        // must not be reported as unsupported.
        for n in ["en-note", "en-todo", "en-media", "br", "hr", "img"] {
            assert!(is_ignored_end_tag(n), "{n}");
        }
    }

    #[test]
    fn test_block_does_not_include_li() {
        assert!(is_block_tag("div"));
        assert!(is_block_tag("address"));
        assert!(!is_block_tag("li"));
        assert!(!is_block_tag("ul"));
    }
}
