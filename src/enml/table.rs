//! Table rendering.
//!
//! Markdown pipe-tables cannot nest, so a table containing another table (or
//! stray row/cell structure inside a cell) is rendered as flat block text
//! instead of producing invalid syntax.

use super::newlines::render_md_tokens;
use super::section::{MdToken, SectionArena, SectionId, SectionItem, SectionKind};

const MIN_COL_WIDTH: usize = 3;

fn is_table_structure(kind: SectionKind) -> bool {
    matches!(
        kind,
        SectionKind::Table | SectionKind::Tr | SectionKind::Td | SectionKind::Caption
    )
}

/// True when any cell of the table contains nested table structure.
pub fn table_has_sub_tables(arena: &SectionArena, table: SectionId) -> bool {
    for row in child_ids(arena, table) {
        for cell in child_ids(arena, row) {
            for item in &arena.get(cell).lines {
                if let SectionItem::Child(c) = item {
                    if is_table_structure(arena.get(*c).kind) {
                        return true;
                    }
                }
            }
        }
    }
    false
}

fn child_ids(arena: &SectionArena, id: SectionId) -> Vec<SectionId> {
    arena
        .get(id)
        .lines
        .iter()
        .filter_map(|item| match item {
            SectionItem::Child(c) => Some(*c),
            SectionItem::Token(_) => None,
        })
        .collect()
}

/// Flattens a section's content to tokens, dropping hidden regions and
/// expanding nested tables through [`draw_table`].
pub fn collect_tokens(arena: &SectionArena, id: SectionId, out: &mut Vec<MdToken>) {
    for item in &arena.get(id).lines {
        match item {
            SectionItem::Token(t) => out.push(t.clone()),
            SectionItem::Child(c) => match arena.get(*c).kind {
                SectionKind::Table => out.extend(draw_table(arena, *c)),
                SectionKind::Hidden => {}
                _ => collect_tokens(arena, *c, out),
            },
        }
    }
}

/// Rows of a table-like section. Malformed nesting can hang a `td` directly
/// under a `table`, or ask us to flatten a bare row/cell; normalize all of
/// those into row shapes instead of dropping them.
fn rows_of(arena: &SectionArena, id: SectionId) -> Vec<SectionId> {
    match arena.get(id).kind {
        SectionKind::Tr | SectionKind::Td | SectionKind::Caption => vec![id],
        _ => child_ids(arena, id),
    }
}

fn cells_of(arena: &SectionArena, row: SectionId) -> Vec<SectionId> {
    match arena.get(row).kind {
        SectionKind::Td | SectionKind::Caption => vec![row],
        _ => child_ids(arena, row),
    }
}

/// Renders a table section to output tokens: a pipe-table when the content
/// allows it, flat block text when nested tables are present.
pub fn draw_table(arena: &SectionArena, table: SectionId) -> Vec<MdToken> {
    let flat_render = table_has_sub_tables(arena, table);

    let mut out: Vec<MdToken> = vec![MdToken::BlockOpen];
    let mut header_done = false;
    let mut caption: Option<SectionId> = None;

    for row in rows_of(arena, table) {
        if arena.get(row).kind == SectionKind::Caption {
            caption = Some(row);
            continue;
        }

        if flat_render {
            out.push(MdToken::BlockOpen);
            for cell in cells_of(arena, row) {
                out.push(MdToken::BlockOpen);
                draw_flat_cell(arena, cell, &mut out);
                out.push(MdToken::BlockClose);
            }
            out.push(MdToken::BlockClose);
            continue;
        }

        let is_header = arena.get(row).is_header;
        let mut line: Vec<String> = Vec::new();
        let mut divider: Vec<String> = Vec::new();
        let mut empty_header: Option<Vec<String>> = None;

        for cell in cells_of(arena, row) {
            let mut tokens = Vec::new();
            collect_tokens(arena, cell, &mut tokens);

            // A Markdown cell cannot hold real newlines; <br> is supported
            // by the renderers. Pipes have to be escaped.
            let text = render_md_tokens(&tokens)
                .replace('|', "\\|")
                .replace('\n', "<br>");

            let width = text.chars().count().max(MIN_COL_WIDTH);
            line.push(format!("{text:<width$}"));

            if !header_done {
                if !is_header {
                    empty_header
                        .get_or_insert_with(Vec::new)
                        .push(" ".repeat(width));
                }
                divider.push("-".repeat(width));
            }
        }

        if let Some(empty) = empty_header.take() {
            // No header row seen yet and this one is plain data: synthesize
            // a blank header with the same column count.
            out.push(MdToken::text(format!("| {} |", empty.join(" | "))));
            out.push(MdToken::Newline);
            out.push(MdToken::text(format!("| {} |", divider.join(" | "))));
            out.push(MdToken::Newline);
            header_done = true;
        }

        out.push(MdToken::text(format!("| {} |", line.join(" | "))));
        out.push(MdToken::Newline);

        if !header_done {
            out.push(MdToken::text(format!("| {} |", divider.join(" | "))));
            out.push(MdToken::Newline);
            header_done = true;
        }
    }

    out.push(MdToken::BlockClose);

    if let Some(caption) = caption {
        let mut tokens = Vec::new();
        collect_tokens(arena, caption, &mut tokens);
        out.extend(tokens);
        out.push(MdToken::BlockClose);
    }

    out
}

/// Flat mode: runs of plain content are coalesced and normalized as one
/// block; nested tables are recursively flattened at the point they occur.
fn draw_flat_cell(arena: &SectionArena, cell: SectionId, out: &mut Vec<MdToken>) {
    let mut current: Vec<MdToken> = Vec::new();

    let flush = |current: &mut Vec<MdToken>, out: &mut Vec<MdToken>| {
        if current.is_empty() {
            return;
        }
        let text = render_md_tokens(current);
        if !text.is_empty() {
            out.push(MdToken::Text(text));
        }
        current.clear();
    };

    for item in &arena.get(cell).lines {
        match item {
            SectionItem::Child(c) if is_table_structure(arena.get(*c).kind) => {
                flush(&mut current, out);
                out.extend(draw_table(arena, *c));
            }
            SectionItem::Child(c) => match arena.get(*c).kind {
                SectionKind::Hidden => {}
                _ => collect_tokens(arena, *c, &mut current),
            },
            SectionItem::Token(t) => current.push(t.clone()),
        }
    }

    flush(&mut current, out);
}
