//! ENML-to-Markdown conversion.
//!
//! ENML is the constrained HTML dialect inside an Evernote note's
//! `<content>` element, wrapped in `<en-note>`. The converter is a pure
//! function of (markup, resources, tasks): it streams the markup through a
//! section tree builder, renders the tree to a token stream, normalizes the
//! structural sentinels into minimal blank lines, and finally appends any
//! resources the markup never referenced as trailing attachment links.
//!
//! Diagnostics go through the `log` facade; the caller decides the sink.

mod builder;
mod newlines;
mod resource;
mod section;
mod style;
mod table;
mod tags;

use std::collections::HashMap;

use quick_xml::events::{BytesStart, Event};
use quick_xml::Reader;

use crate::error::ConvertError;

use builder::TreeBuilder;
use section::SectionArena;
use table::collect_tokens;

pub use resource::{ExtractedTask, ResourceEntity};
pub use style::AttrMap;

fn attr_map(e: &BytesStart) -> AttrMap {
    let mut attrs = HashMap::new();
    for attr in e.attributes().flatten() {
        let key = String::from_utf8_lossy(attr.key.as_ref()).to_lowercase();
        let value = match attr.unescape_value() {
            Ok(v) => v.into_owned(),
            Err(_) => String::from_utf8_lossy(&attr.value).into_owned(),
        };
        attrs.insert(key, value);
    }
    attrs
}

/// Converts a note's ENML markup to Markdown.
///
/// `resources` and `tasks` come from the container the note was read from;
/// neither is mutated. Warnings about malformed structure are logged and the
/// content is preserved; the only failures are XML syntax errors and builder
/// invariant violations.
pub fn convert(
    markup: &str,
    resources: &[ResourceEntity],
    tasks: &[ExtractedTask],
) -> Result<String, ConvertError> {
    let mut reader = Reader::from_str(markup);
    // The builder's stack discipline assumes the tokenizer enforces tag
    // matching.
    reader.config_mut().check_end_names = true;
    let mut tree = TreeBuilder::new(resources, tasks);

    loop {
        match reader.read_event()? {
            Event::Start(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                tree.on_open_tag(&name, &attr_map(&e));
            }
            Event::Empty(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                tree.on_open_tag(&name, &attr_map(&e));
                tree.on_close_tag(&name)?;
            }
            Event::Text(e) => {
                // ENML in the wild carries HTML entities like &nbsp; that
                // strict XML unescaping rejects.
                let text = match e.unescape() {
                    Ok(t) => t.into_owned(),
                    Err(_) => {
                        html_escape::decode_html_entities(&String::from_utf8_lossy(&e))
                            .into_owned()
                    }
                };
                tree.on_text(&text);
            }
            Event::CData(e) => {
                tree.on_text(&String::from_utf8_lossy(&e));
            }
            Event::End(e) => {
                let name = String::from_utf8_lossy(e.name().as_ref()).to_lowercase();
                tree.on_close_tag(&name)?;
            }
            Event::Eof => break,
            // Prolog, doctype, comments and processing instructions carry
            // no note content.
            _ => {}
        }
    }

    let (arena, remaining) = tree.finish();
    let mut tokens = Vec::new();
    collect_tokens(&arena, SectionArena::ROOT, &mut tokens);

    let body = newlines::render_md_tokens(&tokens);
    let mut output = body.trim_start_matches('\n').trim_end().to_string();

    // Resources the markup never referenced still belong to the note;
    // append them as attachment links so nothing is lost.
    for orphan in &remaining {
        let link = resource::media_reference(orphan, None);
        if output.is_empty() {
            output.push_str(&link);
        } else {
            output.push_str("\n\n");
            output.push_str(&link);
        }
    }

    Ok(output)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn convert_plain(markup: &str) -> String {
        convert(markup, &[], &[]).unwrap()
    }

    fn image(id: &str) -> ResourceEntity {
        ResourceEntity {
            id: id.to_string(),
            mime: "image/png".to_string(),
            title: "pic".to_string(),
            filename: "pic.png".to_string(),
        }
    }

    #[test]
    fn test_heading_and_paragraph() {
        let md = convert_plain("<en-note><h1>Title</h1><p>Hello <b>world</b></p></en-note>");
        assert_eq!(md, "# Title\n\nHello **world**");
    }

    #[test]
    fn test_simple_list() {
        let md = convert_plain("<en-note><ul><li>one</li><li>two</li></ul></en-note>");
        assert_eq!(md, "- one\n- two");
    }

    #[test]
    fn test_self_linking_anchor() {
        let md =
            convert_plain("<en-note><a href=\"http://x.com\">http://x.com</a></en-note>");
        assert_eq!(md, "http://x.com");
    }

    #[test]
    fn test_media_reference() {
        let resources = vec![image("r1")];
        let md = convert(
            "<en-note><en-media hash=\"r1\" type=\"image/png\" alt=\"pic\"/></en-note>",
            &resources,
            &[],
        )
        .unwrap();
        assert_eq!(md, "![pic](:/r1)");
    }

    #[test]
    fn test_media_reference_emits_no_warnings() {
        use std::sync::Mutex;

        static WARNINGS: Mutex<Vec<String>> = Mutex::new(Vec::new());
        struct Capture;
        impl log::Log for Capture {
            fn enabled(&self, metadata: &log::Metadata) -> bool {
                metadata.level() <= log::Level::Warn
            }
            fn log(&self, record: &log::Record) {
                if record.level() <= log::Level::Warn {
                    WARNINGS.lock().unwrap().push(record.args().to_string());
                }
            }
            fn flush(&self) {}
        }
        static LOGGER: Capture = Capture;
        let _ = log::set_logger(&LOGGER);
        log::set_max_level(log::LevelFilter::Warn);

        let resources = vec![image("r1")];
        let md = convert(
            "<en-note><en-media hash=\"r1\" type=\"image/png\"/></en-note>",
            &resources,
            &[],
        )
        .unwrap();
        assert_eq!(md, "![pic](:/r1)");

        // A fully supported tag must not be reported as unsupported.
        let warnings = WARNINGS.lock().unwrap();
        assert!(
            warnings.iter().all(|w| !w.contains("en-media")),
            "{warnings:?}"
        );
    }

    #[test]
    fn test_inline_code() {
        let md = convert_plain("<en-note><code>x=1</code></en-note>");
        assert_eq!(md, "`x=1`");
    }

    #[test]
    fn test_ordered_list_counters() {
        let md = convert_plain(
            "<en-note><ol><li>one</li><li>two</li><li>three</li></ol></en-note>",
        );
        assert_eq!(md, "1. one\n2. two\n3. three");
    }

    #[test]
    fn test_unreferenced_resource_appended() {
        let resources = vec![image("r1")];
        let md = convert("<en-note><p>text</p></en-note>", &resources, &[]).unwrap();
        assert_eq!(md, "text\n\n![pic](:/r1)");
    }

    #[test]
    fn test_referenced_resource_not_repeated() {
        let resources = vec![image("r1"), image("r2")];
        let md = convert(
            "<en-note><en-media hash=\"r1\" type=\"image/png\"/></en-note>",
            &resources,
            &[],
        )
        .unwrap();
        assert_eq!(md.matches(":/r1").count(), 1);
        assert_eq!(md.matches(":/r2").count(), 1);
        assert!(md.ends_with("![pic](:/r2)"));
    }

    #[test]
    fn test_attachment_link_for_non_image() {
        let resources = vec![ResourceEntity {
            id: "d1".to_string(),
            mime: "application/pdf".to_string(),
            title: String::new(),
            filename: "report.pdf".to_string(),
        }];
        let md = convert("<en-note/>", &resources, &[]).unwrap();
        assert_eq!(md, "[report.pdf](:/d1)");
    }

    #[test]
    fn test_entities_decoded() {
        let md = convert_plain("<en-note><p>a &amp; b &lt;c&gt;</p></en-note>");
        assert_eq!(md, "a & b <c>");
    }

    #[test]
    fn test_html_entities_decoded() {
        // &nbsp; is not a predefined XML entity but shows up in real notes.
        let md = convert_plain("<en-note><p>a&nbsp;b</p></en-note>");
        assert_eq!(md, "a\u{a0}b");
    }

    #[test]
    fn test_table_without_header_synthesized() {
        let md = convert_plain(
            "<en-note><table><tr><td>a</td><td>b</td></tr><tr><td>c</td><td>d</td></tr></table></en-note>",
        );
        let lines: Vec<&str> = md.lines().collect();
        assert!(lines[0].starts_with('|') && lines[0].trim_matches(['|', ' ']).is_empty());
        assert!(lines[1].contains("---"));
        assert_eq!(lines[0].matches('|').count(), lines[2].matches('|').count());
    }

    #[test]
    fn test_table_with_header() {
        let md = convert_plain(
            "<en-note><table><tr><th>H1</th><th>H2</th></tr><tr><td>a</td><td>b</td></tr></table></en-note>",
        );
        let lines: Vec<&str> = md.lines().collect();
        assert!(lines[0].contains("H1"));
        assert!(lines[1].contains("---"));
        assert!(lines[2].contains('a'));
    }

    #[test]
    fn test_nested_table_flattened() {
        let md = convert_plain(
            "<en-note><table><tr><td>outer<table><tr><td>inner</td></tr></table></td></tr></table></en-note>",
        );
        assert!(md.contains("outer"));
        assert!(md.contains("inner"));
        // The outer table must not render as pipe rows.
        for line in md.lines() {
            assert!(!line.contains("outer") || !line.starts_with("| "), "{line:?}");
        }
    }

    #[test]
    fn test_blank_lines_collapse() {
        let md = convert_plain(
            "<en-note><div>a</div><div><br/></div><div><br/></div><div><br/></div><div>b</div></en-note>",
        );
        assert!(!md.contains("\n\n\n"), "{md:?}");
    }

    #[test]
    fn test_en_todo_markers() {
        let md = convert_plain(
            "<en-note><div><en-todo checked=\"true\"/>done</div><div><en-todo/>open</div></en-note>",
        );
        assert!(md.contains("- [x] done"));
        assert!(md.contains("- [ ] open"));
    }

    #[test]
    fn test_horizontal_rule() {
        let md = convert_plain("<en-note><div>a</div><hr/><div>b</div></en-note>");
        assert!(md.contains("* * *"));
    }

    #[test]
    fn test_strike_and_emphasis() {
        let md = convert_plain("<en-note><p><s>gone</s> <i>soft</i></p></en-note>");
        assert_eq!(md, "~~gone~~ *soft*");
    }

    #[test]
    fn test_xml_prolog_and_doctype_ignored() {
        let md = convert_plain(
            "<?xml version=\"1.0\" encoding=\"UTF-8\"?><!DOCTYPE en-note SYSTEM \"http://xml.evernote.com/pub/enml2.dtd\"><en-note><p>hi</p></en-note>",
        );
        assert_eq!(md, "hi");
    }

    #[test]
    fn test_malformed_xml_is_an_error() {
        assert!(convert("<en-note><p>oops</en-note>", &[], &[]).is_err());
    }

    #[test]
    fn test_inputs_not_mutated() {
        let resources = vec![image("r1")];
        let before = resources.clone();
        convert(
            "<en-note><en-media hash=\"r1\" type=\"image/png\"/></en-note>",
            &resources,
            &[],
        )
        .unwrap();
        assert_eq!(resources, before);
    }
}
