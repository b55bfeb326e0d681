//! Extraction module
//!
//! Stateless functions that turn a fetched HTML page into structured data:
//!
//! - `Document`: typed accessors over the parsed tree (title, headings, text blocks, tables, links)
//! - `extract_content`: the Content Extractor (title, headings, body text, tables)
//! - `extract_entities`: the Entity Extractor (award, category, date and price mentions)

mod content;
mod document;
mod entities;
mod normalize;

use serde::{Deserialize, Serialize};

pub use content::{extract_content, ExtractedContent};
pub use document::{BlockKind, Document, HeadingLevel, RawTable, TextBlock};
pub use entities::{extract_entities, EntityKind, ExtractedEntity, CONTEXT_RADIUS};
pub use normalize::{normalize_multiline, normalize_text};

/// One extracted table
///
/// Rows may have different lengths when the source markup does; nothing is padded.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableData {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}
