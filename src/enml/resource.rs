//! Resource records and `<en-media>` reference resolution.

use serde::{Deserialize, Serialize};

/// A binary resource (image or attachment) belonging to a note. Produced by
/// the container reader; the conversion core never touches the actual bytes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceEntity {
    /// Content id, normally the MD5 hex digest of the body. May be empty
    /// for exports that only reference resources positionally.
    pub id: String,
    pub mime: String,
    pub title: String,
    pub filename: String,
}

impl ResourceEntity {
    pub fn is_image(&self) -> bool {
        self.mime.starts_with("image/")
    }
}

/// A checklist/task record extracted from the note container. Task groups in
/// the markup only carry a group id; the actual items live outside the ENML.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ExtractedTask {
    pub title: String,
    pub completed: bool,
    pub group_id: String,
}

/// Finds the resource an `<en-media hash="...">` reference points at.
///
/// Exact id matches win; otherwise the first id-less entry of the remaining
/// pool is adopted and assigned the hash (some exports reference resources
/// only by position). Either way the match is removed from `remaining` so a
/// resource is never emitted twice.
pub fn resolve_media(
    hash: &str,
    resources: &[ResourceEntity],
    remaining: &mut Vec<ResourceEntity>,
) -> Option<ResourceEntity> {
    if hash.is_empty() {
        return None;
    }

    if let Some(found) = resources.iter().find(|r| !r.id.is_empty() && r.id == hash) {
        remaining.retain(|r| r.id != hash);
        return Some(found.clone());
    }

    if let Some(pos) = remaining.iter().position(|r| r.id.is_empty()) {
        let mut adopted = remaining.remove(pos);
        adopted.id = hash.to_string();
        return Some(adopted);
    }

    None
}

/// Markdown link text cannot contain `]` or line breaks.
pub fn escape_link_text(text: &str) -> String {
    text.replace(['\n', '\r'], " ").replace(']', "\\]")
}

/// Renders a resolved resource as a Markdown reference, preferring the
/// explicit `alt` attribute, then the resource title, then its filename.
pub fn media_reference(resource: &ResourceEntity, alt_attr: Option<&str>) -> String {
    let alt = match alt_attr {
        Some(a) if !a.is_empty() => a.to_string(),
        _ if !resource.title.is_empty() => resource.title.clone(),
        _ if !resource.filename.is_empty() => resource.filename.clone(),
        _ => String::new(),
    };
    let alt = escape_link_text(&alt);
    if resource.is_image() {
        format!("![{}](:/{})", alt, resource.id)
    } else {
        format!("[{}](:/{})", alt, resource.id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn resource(id: &str, mime: &str) -> ResourceEntity {
        ResourceEntity {
            id: id.to_string(),
            mime: mime.to_string(),
            title: String::new(),
            filename: String::new(),
        }
    }

    #[test]
    fn test_resolve_exact_match_removes_from_pool() {
        let resources = vec![resource("abc", "image/png"), resource("def", "image/png")];
        let mut remaining = resources.clone();
        let found = resolve_media("abc", &resources, &mut remaining).unwrap();
        assert_eq!(found.id, "abc");
        assert_eq!(remaining.len(), 1);
        assert_eq!(remaining[0].id, "def");
    }

    #[test]
    fn test_resolve_idless_fallback_assigns_hash() {
        let resources = vec![resource("", "application/pdf")];
        let mut remaining = resources.clone();
        let found = resolve_media("cafe", &resources, &mut remaining).unwrap();
        assert_eq!(found.id, "cafe");
        assert!(remaining.is_empty());
    }

    #[test]
    fn test_resolve_miss() {
        let resources = vec![resource("abc", "image/png")];
        let mut remaining = resources.clone();
        assert!(resolve_media("zzz", &resources, &mut remaining).is_none());
        assert_eq!(remaining.len(), 1);
    }

    #[test]
    fn test_media_reference_alt_precedence() {
        let mut r = resource("abc", "image/png");
        r.title = "Title".to_string();
        r.filename = "file.png".to_string();
        assert_eq!(media_reference(&r, Some("pic")), "![pic](:/abc)");
        assert_eq!(media_reference(&r, None), "![Title](:/abc)");
        r.title.clear();
        assert_eq!(media_reference(&r, None), "![file.png](:/abc)");
    }

    #[test]
    fn test_media_reference_non_image() {
        let r = resource("abc", "application/pdf");
        assert_eq!(media_reference(&r, Some("doc")), "[doc](:/abc)");
    }

    #[test]
    fn test_escape_link_text() {
        assert_eq!(escape_link_text("a]b\nc"), "a\\]b c");
    }
}
