//! ENEX container reading.
//!
//! Handles the outer Evernote .enex export structure:
//! - note metadata (title, tags, created/updated timestamps)
//! - ENML content payloads
//! - resources (base64 data, mime type, filename) with MD5 content ids
//! - note-level task records referenced by task-group blocks

mod reader;

pub use reader::*;
