//! Streaming ENEX parser producing the conversion core's inputs.

use std::fs;
use std::path::Path;

use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use chrono::{DateTime, NaiveDateTime, Utc};
use quick_xml::events::Event;
use quick_xml::Reader;
use serde::{Deserialize, Serialize};

use crate::enml::{self, ExtractedTask, ResourceEntity};
use crate::error::{ConvertError, ImportError};

/// A parsed Evernote note: raw ENML markup plus everything the converter
/// needs to resolve references inside it.
#[derive(Debug, Clone)]
pub struct EnexNote {
    pub title: String,
    /// Raw ENML content, including its XML prolog.
    pub content: String,
    pub tags: Vec<String>,
    pub created: Option<DateTime<Utc>>,
    pub updated: Option<DateTime<Utc>>,
    pub resources: Vec<EnexResource>,
    pub tasks: Vec<ExtractedTask>,
}

/// A note resource with its decoded body. The entity id is the MD5 hex
/// digest of the body, which is what `<en-media hash="...">` references.
#[derive(Debug, Clone)]
pub struct EnexResource {
    pub entity: ResourceEntity,
    pub data: Vec<u8>,
}

/// Preview metadata for an ENEX file
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnexPreview {
    /// Number of notes found
    pub note_count: usize,
    /// Number of resources/attachments
    pub resource_count: usize,
    /// Number of extracted task records
    pub task_count: usize,
    /// Sample notes for preview (first 10)
    pub notes: Vec<EnexNotePreview>,
    /// Warnings during preview
    pub warnings: Vec<String>,
}

/// Preview info for a single note
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnexNotePreview {
    pub title: String,
    pub tags: Vec<String>,
    pub has_attachments: bool,
    pub created: Option<String>,
}

/// Parse Evernote date format (YYYYMMDDTHHmmssZ)
pub fn parse_evernote_date(date_str: &str) -> Option<DateTime<Utc>> {
    // Format: 20231231T235959Z
    let clean = date_str.trim();
    if clean.len() < 15 {
        return None;
    }

    let without_z = clean.trim_end_matches('Z');
    NaiveDateTime::parse_from_str(without_z, "%Y%m%dT%H%M%S")
        .ok()
        .map(|dt| dt.and_utc())
}

#[derive(Default)]
struct PendingResource {
    data: Vec<u8>,
    mime: String,
    filename: Option<String>,
}

impl PendingResource {
    fn into_resource(self) -> EnexResource {
        let id = if self.data.is_empty() {
            // No body to hash; the converter's positional fallback applies.
            String::new()
        } else {
            format!("{:x}", md5::compute(&self.data))
        };
        let filename = self.filename.unwrap_or_default();
        EnexResource {
            entity: ResourceEntity {
                id,
                mime: self.mime,
                title: filename.clone(),
                filename,
            },
            data: self.data,
        }
    }
}

#[derive(Default)]
struct PendingTask {
    title: String,
    completed: bool,
    group_id: String,
}

/// Parse an ENEX document and extract its notes.
pub fn parse_enex(content: &str) -> Result<Vec<EnexNote>, ImportError> {
    let mut reader = Reader::from_str(content);
    reader.config_mut().trim_text(true);

    let mut notes: Vec<EnexNote> = Vec::new();

    let mut current_note: Option<EnexNote> = None;
    let mut current_resource: Option<PendingResource> = None;
    let mut current_task: Option<PendingTask> = None;
    let mut current_element = String::new();
    let mut in_resource_attrs = false;

    loop {
        match reader.read_event()? {
            Event::Start(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                current_element = name.clone();

                match name.as_str() {
                    "note" => {
                        current_note = Some(EnexNote {
                            title: String::new(),
                            content: String::new(),
                            tags: Vec::new(),
                            created: None,
                            updated: None,
                            resources: Vec::new(),
                            tasks: Vec::new(),
                        });
                    }
                    "resource" => {
                        current_resource = Some(PendingResource::default());
                    }
                    "resource-attributes" => {
                        in_resource_attrs = true;
                    }
                    "task" => {
                        current_task = Some(PendingTask::default());
                    }
                    _ => {}
                }
            }
            Event::End(ref e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();

                match name.as_str() {
                    "note" => {
                        if let Some(note) = current_note.take() {
                            notes.push(note);
                        }
                    }
                    "resource" => {
                        if let (Some(note), Some(resource)) =
                            (current_note.as_mut(), current_resource.take())
                        {
                            note.resources.push(resource.into_resource());
                        }
                    }
                    "resource-attributes" => {
                        in_resource_attrs = false;
                    }
                    "task" => {
                        if let (Some(note), Some(task)) =
                            (current_note.as_mut(), current_task.take())
                        {
                            note.tasks.push(ExtractedTask {
                                title: task.title,
                                completed: task.completed,
                                group_id: task.group_id,
                            });
                        }
                    }
                    _ => {}
                }
                current_element.clear();
            }
            Event::Text(e) => {
                let text = e.unescape().unwrap_or_default().to_string();

                let Some(note) = current_note.as_mut() else {
                    continue;
                };

                if let Some(task) = current_task.as_mut() {
                    match current_element.as_str() {
                        "title" => task.title = text,
                        "taskstatus" => task.completed = text.eq_ignore_ascii_case("completed"),
                        "taskgroupnotelevelid" => task.group_id = text,
                        _ => {}
                    }
                } else if let Some(resource) = current_resource.as_mut() {
                    match current_element.as_str() {
                        "data" => {
                            // Base64, possibly wrapped across lines
                            let cleaned: String =
                                text.chars().filter(|c| !c.is_whitespace()).collect();
                            match BASE64.decode(cleaned.as_bytes()) {
                                Ok(decoded) => resource.data = decoded,
                                Err(err) => {
                                    log::warn!("Failed to decode resource data: {}", err);
                                }
                            }
                        }
                        "mime" => resource.mime = text,
                        "file-name" if in_resource_attrs => {
                            resource.filename = Some(text);
                        }
                        _ => {}
                    }
                } else {
                    match current_element.as_str() {
                        "title" => note.title = text,
                        "tag" => note.tags.push(text),
                        "created" => note.created = parse_evernote_date(&text),
                        "updated" => note.updated = parse_evernote_date(&text),
                        _ => {}
                    }
                }
            }
            Event::CData(e) => {
                // Note content is carried in CDATA
                if current_element == "content" {
                    if let Some(note) = current_note.as_mut() {
                        note.content = String::from_utf8_lossy(&e).to_string();
                    }
                }
            }
            Event::Eof => break,
            _ => {}
        }
    }

    Ok(notes)
}

/// Read and parse an .enex file from disk.
pub fn read_enex_file(path: &Path) -> Result<Vec<EnexNote>, ImportError> {
    let content = fs::read_to_string(path)?;
    parse_enex(&content)
}

/// Convert a parsed note's ENML content to Markdown.
pub fn note_to_markdown(note: &EnexNote) -> Result<String, ConvertError> {
    let resources: Vec<ResourceEntity> =
        note.resources.iter().map(|r| r.entity.clone()).collect();
    enml::convert(&note.content, &resources, &note.tasks)
}

/// Preview an ENEX document without converting it.
pub fn preview_enex(content: &str) -> Result<EnexPreview, ImportError> {
    let notes = parse_enex(content)?;

    let mut resource_count = 0;
    let mut task_count = 0;
    let mut preview_notes = Vec::new();
    let mut warnings = Vec::new();

    for (i, note) in notes.iter().enumerate() {
        resource_count += note.resources.len();
        task_count += note.tasks.len();

        if i < 10 {
            preview_notes.push(EnexNotePreview {
                title: note.title.clone(),
                tags: note.tags.clone(),
                has_attachments: !note.resources.is_empty(),
                created: note.created.map(|d| d.to_rfc3339()),
            });
        }
    }

    if notes.is_empty() {
        warnings.push("No notes found in ENEX file".to_string());
    }

    Ok(EnexPreview {
        note_count: notes.len(),
        resource_count,
        task_count,
        notes: preview_notes,
        warnings,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Datelike;

    const SAMPLE: &str = r#"<?xml version="1.0" encoding="UTF-8"?>
<en-export export-date="20240101T120000Z" application="Evernote">
  <note>
    <title>First note</title>
    <content><![CDATA[<?xml version="1.0"?><en-note><p>Hello <b>world</b></p></en-note>]]></content>
    <created>20231231T235959Z</created>
    <updated>20240101T000130Z</updated>
    <tag>alpha</tag>
    <tag>beta</tag>
    <resource>
      <data encoding="base64">aGVsbG8=</data>
      <mime>image/png</mime>
      <resource-attributes>
        <file-name>hello.png</file-name>
      </resource-attributes>
    </resource>
  </note>
</en-export>"#;

    #[test]
    fn test_parse_evernote_date() {
        let date = parse_evernote_date("20231231T235959Z").unwrap();
        assert_eq!(date.year(), 2023);
        assert_eq!(date.month(), 12);
        assert_eq!(date.day(), 31);
        assert!(parse_evernote_date("garbage").is_none());
        assert!(parse_evernote_date("").is_none());
    }

    #[test]
    fn test_parse_sample_note() {
        let notes = parse_enex(SAMPLE).unwrap();
        assert_eq!(notes.len(), 1);
        let note = &notes[0];
        assert_eq!(note.title, "First note");
        assert_eq!(note.tags, vec!["alpha", "beta"]);
        assert!(note.content.contains("<en-note>"));
        assert_eq!(note.created.unwrap().year(), 2023);
        assert_eq!(note.resources.len(), 1);
    }

    #[test]
    fn test_resource_id_is_md5_of_body() {
        let notes = parse_enex(SAMPLE).unwrap();
        let resource = &notes[0].resources[0];
        assert_eq!(resource.data, b"hello");
        // md5("hello")
        assert_eq!(resource.entity.id, "5d41402abc4b2a76b9719d911017c592");
        assert_eq!(resource.entity.mime, "image/png");
        assert_eq!(resource.entity.filename, "hello.png");
    }

    #[test]
    fn test_note_to_markdown() {
        let notes = parse_enex(SAMPLE).unwrap();
        let md = note_to_markdown(&notes[0]).unwrap();
        assert!(md.starts_with("Hello **world**"), "{md:?}");
        // The unreferenced resource trails the body.
        assert!(md.ends_with("![hello.png](:/5d41402abc4b2a76b9719d911017c592)"));
    }

    #[test]
    fn test_task_extraction() {
        let enex = r#"<en-export><note>
            <title>T</title>
            <content><![CDATA[<en-note/>]]></content>
            <task><title>Buy milk</title><taskStatus>completed</taskStatus><taskGroupNoteLevelID>g1</taskGroupNoteLevelID></task>
            <task><title>Call home</title><taskStatus>open</taskStatus><taskGroupNoteLevelID>g1</taskGroupNoteLevelID></task>
        </note></en-export>"#;
        let notes = parse_enex(enex).unwrap();
        assert_eq!(notes[0].tasks.len(), 2);
        assert_eq!(notes[0].tasks[0].title, "Buy milk");
        assert!(notes[0].tasks[0].completed);
        assert_eq!(notes[0].tasks[1].group_id, "g1");
        assert!(!notes[0].tasks[1].completed);
    }

    #[test]
    fn test_preview() {
        let preview = preview_enex(SAMPLE).unwrap();
        assert_eq!(preview.note_count, 1);
        assert_eq!(preview.resource_count, 1);
        assert_eq!(preview.notes[0].title, "First note");
        assert!(preview.notes[0].has_attachments);
        assert!(preview.warnings.is_empty());
    }

    #[test]
    fn test_preview_empty_export_warns() {
        let preview = preview_enex("<en-export></en-export>").unwrap();
        assert_eq!(preview.note_count, 0);
        assert!(!preview.warnings.is_empty());
    }

    #[test]
    fn test_read_enex_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("sample.enex");
        fs::write(&path, SAMPLE).unwrap();
        let notes = read_enex_file(&path).unwrap();
        assert_eq!(notes.len(), 1);
    }
}
