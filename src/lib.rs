//! Evernote ENML to Markdown conversion.
//!
//! The `enex` module reads Evernote export files (.enex) and the `enml`
//! module converts each note's XHTML-dialect body into Markdown, resolving
//! `<en-media>` references against the note's resources and expanding
//! Evernote task groups into checkbox lists.

pub mod enex;
pub mod enml;
pub mod error;

pub use enex::{note_to_markdown, parse_enex, preview_enex, read_enex_file, EnexNote};
pub use enml::convert;
pub use error::{ConvertError, ImportError};
