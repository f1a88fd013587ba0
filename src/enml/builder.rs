//! The section tree builder: a state machine over the ENML tag stream.
//!
//! Events must arrive in exact document order; the tag, list, anchor and
//! span stacks all rely on it. Malformed-but-well-formed input is handled by
//! warning and keeping the content rather than dropping it.

use std::sync::OnceLock;

use crate::error::ConvertError;

use super::resource::{media_reference, resolve_media, ExtractedTask, ResourceEntity};
use super::section::{MdToken, Section, SectionArena, SectionId, SectionItem, SectionKind};
use super::style::{self, AttrMap};
use super::table::collect_tokens;
use super::tags;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ListTag {
    Ul,
    Ol,
    CheckboxList,
    TaskList,
}

#[derive(Debug)]
struct ListState {
    tag: ListTag,
    counter: usize,
    started_text: bool,
}

/// Flags recorded when a tag opens. The close handler dispatches on these,
/// not on the raw tag name, so whatever the attributes meant at open time is
/// what gets honored.
#[derive(Debug)]
struct OpenTag {
    name: String,
    visible: bool,
    is_code_block: bool,
    is_highlight: bool,
    is_task_list: bool,
}

#[derive(Debug, Clone, Copy, Default)]
struct SpanStyle {
    bold: bool,
    italic: bool,
}

#[derive(Debug, Default)]
struct ParserState {
    tags: Vec<OpenTag>,
    lists: Vec<ListState>,
    anchors: Vec<String>,
    spans: Vec<SpanStyle>,
    in_code: u32,
    in_pre: bool,
    in_quote: bool,
}

pub struct TreeBuilder<'a> {
    arena: SectionArena,
    stack: Vec<SectionId>,
    state: ParserState,
    resources: &'a [ResourceEntity],
    tasks: &'a [ExtractedTask],
    remaining: Vec<ResourceEntity>,
}

impl<'a> TreeBuilder<'a> {
    pub fn new(resources: &'a [ResourceEntity], tasks: &'a [ExtractedTask]) -> Self {
        TreeBuilder {
            arena: SectionArena::new(),
            stack: vec![SectionArena::ROOT],
            state: ParserState::default(),
            resources,
            tasks,
            remaining: resources.to_vec(),
        }
    }

    fn current(&self) -> SectionId {
        *self.stack.last().unwrap_or(&SectionArena::ROOT)
    }

    fn current_section(&mut self) -> &mut Section {
        let id = self.current();
        self.arena.get_mut(id)
    }

    fn push_section(&mut self, kind: SectionKind) -> SectionId {
        let id = self.arena.push_child(self.current(), kind);
        self.stack.push(id);
        id
    }

    fn pop_section(&mut self) {
        if self.stack.len() > 1 {
            self.stack.pop();
        } else {
            log::warn!("Tried to pop the root section");
        }
    }

    fn emit(&mut self, token: MdToken) {
        self.current_section().push_token(token);
    }

    fn emit_text(&mut self, text: impl Into<String>) {
        self.current_section().push_text(text);
    }

    /// Open-tag transition. `name` must already be lower-cased.
    pub fn on_open_tag(&mut self, name: &str, attrs: &AttrMap) {
        let mut tag = OpenTag {
            name: name.to_string(),
            visible: true,
            is_code_block: false,
            is_highlight: false,
            is_task_list: false,
        };
        self.open_dispatch(name, attrs, &mut tag);
        self.state.tags.push(tag);
    }

    fn open_dispatch(&mut self, name: &str, attrs: &AttrMap, tag: &mut OpenTag) {
        // Before a task list has produced any content, block tags inside it
        // are swallowed so the rendered items aren't preceded by blank lines.
        if let Some(list) = self.state.lists.last() {
            if list.tag == ListTag::TaskList && !list.started_text && tags::is_block_tag(name) {
                return;
            }
        }

        if name == "en-note" {
            // Root marker.
        } else if name == "table" {
            self.push_section(SectionKind::Table);
        } else if name == "tbody" || name == "thead" {
            // Not represented in the tree.
        } else if name == "tr" {
            if self.arena.get(self.current()).kind != SectionKind::Table {
                log::warn!("Found a <tr> tag outside of a table");
            }
            self.push_section(SectionKind::Tr);
        } else if name == "td" || name == "th" {
            let parent = self.current();
            if self.arena.get(parent).kind == SectionKind::Tr {
                if name == "th" {
                    self.arena.get_mut(parent).is_header = true;
                }
            } else {
                log::warn!("Found a <{}> tag outside of a <tr>", name);
            }
            self.push_section(SectionKind::Td);
        } else if name == "caption" {
            if self.arena.get(self.current()).kind != SectionKind::Table {
                log::warn!("Found a <caption> tag outside of a table");
            }
            self.push_section(SectionKind::Caption);
        } else if style::is_invisible_block(attrs) {
            tag.visible = false;
            self.push_section(SectionKind::Hidden);
        } else if style::is_code_block(name, attrs) {
            tag.is_code_block = true;
            if self.state.in_code == 0 {
                self.push_section(SectionKind::Code);
            }
            self.state.in_code += 1;
        } else if tags::is_block_tag(name) {
            match style::task_group_id(attrs) {
                Some(group_id) => self.open_task_group(tag, &group_id),
                None => self.emit(MdToken::BlockOpen),
            }
        } else if tags::is_list_tag(name) {
            self.emit(MdToken::BlockOpen);
            let list_tag = if style::is_checkbox_list(attrs) {
                ListTag::CheckboxList
            } else if name == "ol" {
                ListTag::Ol
            } else {
                ListTag::Ul
            };
            self.state.lists.push(ListState {
                tag: list_tag,
                counter: 1,
                started_text: false,
            });
        } else if name == "li" {
            self.open_list_item(attrs);
        } else if style::is_highlight(attrs) {
            tag.is_highlight = true;
            self.emit_text("==");
        } else if tags::is_strong_tag(name) {
            self.emit_text("**");
        } else if tags::is_strike_tag(name) {
            self.emit_text("~~");
        } else if tags::is_inline_code_tag(name) {
            self.emit_text("`");
        } else if tags::is_quote_tag(name) {
            self.emit_text("\"");
        } else if name == "img" {
            // Images without a source have nothing to render.
            if let Some(src) = attrs.get("src") {
                let alt = attrs.get("alt").map(String::as_str).unwrap_or("");
                let alt = super::resource::escape_link_text(alt);
                self.emit_text(format!("![{}]({})", alt, src));
            }
        } else if tags::is_anchor(name) {
            let href = attrs.get("href").cloned().unwrap_or_default();
            self.state.anchors.push(href);
            self.emit_text("[");
        } else if tags::is_em_tag(name) {
            self.emit_text("*");
        } else if name == "en-todo" {
            let checked = attrs.get("checked").map(String::as_str) == Some("true");
            self.emit_text(if checked { "- [x] " } else { "- [ ] " });
        } else if name == "hr" {
            self.emit(MdToken::BlockOpen);
            self.emit_text("* * *");
            self.emit(MdToken::BlockClose);
        } else if let Some(level) = tags::heading_level(name) {
            self.emit(MdToken::BlockOpen);
            self.emit_text(format!("{} ", "#".repeat(level)));
        } else if name == "blockquote" {
            self.emit(MdToken::BlockOpen);
            self.state.in_quote = true;
        } else if name == "pre" {
            self.emit(MdToken::BlockOpen);
            self.state.in_pre = true;
        } else if name == "br" {
            self.emit(MdToken::Newline);
        } else if name == "en-media" {
            self.open_media(attrs);
        } else if name == "span" {
            let span = SpanStyle {
                bold: style::span_is_bold(attrs),
                italic: style::span_is_italic(attrs),
            };
            self.state.spans.push(span);
            if span.bold {
                self.emit_text("**");
            }
            if span.italic {
                self.emit_text("*");
            }
        } else if tags::is_ignored_open_tag(name) {
            // Known and deliberately unstyled.
        } else {
            log::warn!("Unsupported start tag: {}", name);
        }
    }

    /// Task group blocks carry only a group id; the items themselves were
    /// extracted from the container and are rendered here. The literal
    /// markup that follows inside the block is suppressed.
    fn open_task_group(&mut self, tag: &mut OpenTag, group_id: &str) {
        tag.is_task_list = true;
        self.emit(MdToken::BlockOpen);
        for task in self.tasks.iter().filter(|t| t.group_id == group_id) {
            let marker = if task.completed { "- [x] " } else { "- [ ] " };
            self.emit_text(format!("{}{}", marker, task.title));
            self.emit(MdToken::Newline);
        }
        self.state.lists.push(ListState {
            tag: ListTag::TaskList,
            counter: 1,
            started_text: false,
        });
    }

    fn open_list_item(&mut self, attrs: &AttrMap) {
        if self.state.lists.is_empty() {
            // Legacy behavior: no marker for this tag, but any descendant
            // content keeps flowing through.
            log::warn!("Found a <li> tag outside of a list");
            return;
        }

        let depth = self.state.lists.len();
        let list = self.state.lists.last_mut().unwrap();
        if list.tag == ListTag::TaskList {
            // Items were already rendered from the extracted task records.
            list.started_text = true;
            return;
        }

        let marker = match list.tag {
            ListTag::CheckboxList => {
                if style::is_checked(attrs) {
                    "- [x] ".to_string()
                } else {
                    "- [ ] ".to_string()
                }
            }
            ListTag::Ol => {
                let m = format!("{}. ", list.counter);
                list.counter += 1;
                m
            }
            ListTag::Ul | ListTag::TaskList => "- ".to_string(),
        };

        self.emit(MdToken::BlockOpen);
        self.emit_text(format!("{}{}", "    ".repeat(depth - 1), marker));
    }

    fn open_media(&mut self, attrs: &AttrMap) {
        let hash = attrs.get("hash").map(String::as_str).unwrap_or("");
        match resolve_media(hash, self.resources, &mut self.remaining) {
            Some(resource) => {
                let alt = attrs.get("alt").map(String::as_str);
                self.emit_text(media_reference(&resource, alt));
            }
            None => {
                log::warn!("Media reference {:?} matches no resource", hash);
            }
        }
    }

    /// Text event. Whitespace-only runs become a deduplicated space; inside
    /// `<pre>` every line is tab-indented so it renders as code.
    pub fn on_text(&mut self, text: &str) {
        let kind = self.arena.get(self.current()).kind;
        if matches!(kind, SectionKind::Table | SectionKind::Tr) {
            // Stray text between table cells.
            return;
        }

        if let Some(list) = self.state.lists.last_mut() {
            list.started_text = true;
            if list.tag == ListTag::TaskList {
                return;
            }
        }

        if self.state.in_code > 0 {
            self.emit_text(text);
            return;
        }

        if self.state.in_pre {
            for (i, line) in text.split('\n').enumerate() {
                if i > 0 {
                    self.emit(MdToken::Newline);
                }
                self.emit_text(format!("\t{}", line.trim_end_matches('\r')));
            }
            return;
        }

        if text.trim().is_empty() {
            self.emit(MdToken::Space);
            return;
        }

        static WHITESPACE: OnceLock<regex::Regex> = OnceLock::new();
        let collapsed = WHITESPACE
            .get_or_init(|| regex::Regex::new(r"[ \t\r\n]+").unwrap())
            .replace_all(text, " ")
            .into_owned();

        if self.state.in_quote && self.at_line_start() {
            self.emit_text("> ");
        }
        self.emit_text(collapsed);
    }

    fn at_line_start(&self) -> bool {
        match self.arena.get(self.current()).lines.last() {
            None | Some(SectionItem::Child(_)) => true,
            Some(SectionItem::Token(t)) => t.is_sentinel(),
        }
    }

    /// Close-tag transition, dispatched on the flags recorded at open time.
    pub fn on_close_tag(&mut self, name: &str) -> Result<(), ConvertError> {
        let Some(tag) = self.state.tags.pop() else {
            log::warn!("Unexpected closing tag: {}", name);
            return Ok(());
        };

        if !tag.visible {
            self.pop_section();
            return Ok(());
        }
        if tag.is_highlight {
            self.emit_text("==");
            return Ok(());
        }
        if tag.is_code_block {
            self.close_code_block();
            return Ok(());
        }

        let n = tag.name.as_str();
        if tags::is_new_line_only_end_tag(n) {
            self.emit(MdToken::BlockClose);
            if tag.is_task_list {
                self.state.lists.pop();
            }
        } else if matches!(n, "td" | "th" | "tr" | "caption" | "table") {
            self.pop_section();
        } else if tags::is_ignored_end_tag(n) {
            // No structure or styling of its own.
        } else if tags::is_list_tag(n) {
            self.emit(MdToken::BlockClose);
            self.state.lists.pop();
        } else if tags::is_strong_tag(n) {
            self.emit_text("**");
        } else if tags::is_strike_tag(n) {
            self.emit_text("~~");
        } else if tags::is_inline_code_tag(n) {
            self.emit_text("`");
        } else if tags::is_quote_tag(n) {
            self.emit_text("\"");
        } else if n == "blockquote" {
            self.emit(MdToken::BlockOpen);
            self.state.in_quote = false;
        } else if n == "pre" {
            self.state.in_pre = false;
            self.emit(MdToken::BlockClose);
        } else if tags::is_anchor(n) {
            self.close_anchor()?;
        } else if n == "span" {
            let span = self.state.spans.pop().unwrap_or_default();
            if span.italic {
                self.emit_text("*");
            }
            if span.bold {
                self.emit_text("**");
            }
        } else if tags::is_em_tag(n) {
            self.emit_text("*");
        } else {
            log::warn!("Unsupported end tag: {}", n);
        }
        Ok(())
    }

    /// On the outermost code close, the accumulated content is re-rendered
    /// as either a fenced block or inline code.
    fn close_code_block(&mut self) {
        self.state.in_code = self.state.in_code.saturating_sub(1);
        if self.state.in_code > 0 {
            return;
        }

        let code_id = self.current();
        if self.arena.get(code_id).kind != SectionKind::Code {
            log::warn!("Code block closed while not inside a code section");
            return;
        }

        let mut tokens = Vec::new();
        collect_tokens(&self.arena, code_id, &mut tokens);
        let content = super::newlines::render_md_tokens(&tokens);
        let content = content.trim_matches('\n').to_string();

        self.pop_section();
        let parent = self.current();
        let parent_section = self.arena.get_mut(parent);
        if parent_section.lines.last() == Some(&SectionItem::Child(code_id)) {
            parent_section.lines.pop();
        }

        if content.is_empty() {
            return;
        }

        if content.contains('\n') {
            self.emit(MdToken::BlockOpen);
            self.emit_text("```");
            self.emit(MdToken::Newline);
            self.emit_text(content);
            self.emit(MdToken::Newline);
            self.emit_text("```");
            self.emit(MdToken::BlockClose);
        } else {
            self.emit_text(format!("`{}`", content.replace('`', "``")));
        }
    }

    /// Decides how to close a link from what was actually captured between
    /// the brackets, then rewrites the token tail accordingly.
    fn close_anchor(&mut self) -> Result<(), ConvertError> {
        let href = self.state.anchors.pop().unwrap_or_default();
        let id = self.current();

        let bracket = self.arena.get(id).lines.iter().rposition(
            |item| matches!(item, SectionItem::Token(MdToken::Text(t)) if t == "["),
        );
        let Some(idx) = bracket else {
            return Err(ConvertError::UnbalancedAnchor);
        };

        #[derive(Debug)]
        enum LinkContent {
            EmptyBracket,
            TrivialHref,
            WhitespaceOnly,
            Normal,
        }

        let kind = {
            let content = &self.arena.get(id).lines[idx + 1..];
            let mut has_child = false;
            let mut has_space = false;
            let mut texts: Vec<&String> = Vec::new();
            for item in content {
                match item {
                    SectionItem::Child(_) => has_child = true,
                    SectionItem::Token(MdToken::Text(t)) => texts.push(t),
                    SectionItem::Token(MdToken::Space) => has_space = true,
                    SectionItem::Token(_) => {}
                }
            }
            if !has_child && texts.is_empty() && !has_space {
                LinkContent::EmptyBracket
            } else if !has_child && texts.last().map(|s| s.as_str()) == Some(href.as_str()) {
                LinkContent::TrivialHref
            } else if !has_child && texts.iter().all(|t| t.trim().is_empty()) {
                LinkContent::WhitespaceOnly
            } else {
                LinkContent::Normal
            }
        };

        let section = self.arena.get_mut(id);
        match kind {
            LinkContent::EmptyBracket => {
                // Nothing visible was captured (content was CSS-rendered or
                // absent). A placeholder keeps a non-empty URL reachable.
                section.lines.truncate(idx);
                if !href.is_empty() {
                    section.push_text(format!("[(L)]({})", href));
                }
            }
            LinkContent::TrivialHref => {
                // [url](url) is redundant; the renderer auto-links bare URLs.
                section.lines.truncate(idx);
                section.push_text(href);
            }
            LinkContent::WhitespaceOnly => {
                section.lines.truncate(idx);
                section.push_token(MdToken::Space);
                section.push_text(href);
            }
            LinkContent::Normal => {
                let is_trimmable = |item: &SectionItem| {
                    matches!(item, SectionItem::Token(MdToken::Space))
                        || matches!(item, SectionItem::Token(MdToken::Text(t)) if t.is_empty())
                };
                while section.lines.len() > idx + 1
                    && is_trimmable(section.lines.last().unwrap())
                {
                    section.lines.pop();
                }
                while section.lines.len() > idx + 1 && is_trimmable(&section.lines[idx + 1]) {
                    section.lines.remove(idx + 1);
                }
                section.push_text(format!("]({})", href));
            }
        }
        Ok(())
    }

    /// Ends the run, returning the finished tree and whatever resources were
    /// never referenced by the markup.
    pub fn finish(self) -> (SectionArena, Vec<ResourceEntity>) {
        if self.stack.len() > 1 {
            log::warn!("Input ended with {} unclosed section(s)", self.stack.len() - 1);
        }
        (self.arena, self.remaining)
    }
}
