//! The section tree built from the ENML event stream.
//!
//! Sections live in a flat arena and are addressed by index; the builder
//! keeps its own traversal stack of indices, so no node ever stores a parent
//! reference that could outlive construction.

/// A Markdown output token. Structural sentinels are resolved to actual
/// newlines/spaces by the normalizer in a later pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MdToken {
    Text(String),
    BlockOpen,
    BlockClose,
    Newline,
    NewlineMerged,
    Space,
}

impl MdToken {
    pub fn is_sentinel(&self) -> bool {
        !matches!(self, MdToken::Text(_))
    }

    pub fn text(s: impl Into<String>) -> MdToken {
        MdToken::Text(s.into())
    }
}

/// What kind of structural region a section represents.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SectionKind {
    Text,
    Table,
    Tr,
    Td,
    Caption,
    Hidden,
    Code,
}

/// One entry in a section's ordered content.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SectionItem {
    Token(MdToken),
    Child(SectionId),
}

pub type SectionId = usize;

#[derive(Debug, Clone)]
pub struct Section {
    pub kind: SectionKind,
    pub lines: Vec<SectionItem>,
    /// Only meaningful on `Tr` rows: set when the row contains `<th>` cells.
    pub is_header: bool,
}

impl Section {
    pub fn new(kind: SectionKind) -> Self {
        Section {
            kind,
            lines: Vec::new(),
            is_header: false,
        }
    }

    pub fn push_token(&mut self, token: MdToken) {
        self.lines.push(SectionItem::Token(token));
    }

    pub fn push_text(&mut self, text: impl Into<String>) {
        self.push_token(MdToken::Text(text.into()));
    }
}

/// Flat arena of sections. Index 0 is always the implicit root Text section.
#[derive(Debug)]
pub struct SectionArena {
    nodes: Vec<Section>,
}

impl SectionArena {
    pub fn new() -> Self {
        SectionArena {
            nodes: vec![Section::new(SectionKind::Text)],
        }
    }

    pub const ROOT: SectionId = 0;

    /// Creates a node and records it as a child of `parent`.
    pub fn push_child(&mut self, parent: SectionId, kind: SectionKind) -> SectionId {
        let id = self.nodes.len();
        self.nodes.push(Section::new(kind));
        self.nodes[parent].lines.push(SectionItem::Child(id));
        id
    }

    pub fn get(&self, id: SectionId) -> &Section {
        &self.nodes[id]
    }

    pub fn get_mut(&mut self, id: SectionId) -> &mut Section {
        &mut self.nodes[id]
    }
}

impl Default for SectionArena {
    fn default() -> Self {
        Self::new()
    }
}
