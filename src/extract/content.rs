//! Content Extractor: reduces a document to title, headings, body text and tables

use crate::extract::document::{BlockKind, Document, HeadingLevel};
use crate::extract::normalize::normalize_text;
use crate::extract::TableData;

/// Paragraphs must be longer than this (trimmed characters) to count as content
const MIN_PARAGRAPH_CHARS: usize = 20;

/// List items must be longer than this (trimmed characters) to count as content
const MIN_LIST_ITEM_CHARS: usize = 10;

const CONTENT_LEVELS: [HeadingLevel; 3] = [HeadingLevel::H1, HeadingLevel::H2, HeadingLevel::H3];

/// Flat, normalised representation of one page
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ExtractedContent {
    pub title: String,
    pub headings: Vec<String>,
    pub content: String,
    pub tables: Vec<TableData>,
}

/// Runs the Content Extractor over a parsed document
///
/// - **title**: declared `<title>`, else the first `<h1>`, else empty
/// - **headings**: every non-empty h1/h2/h3 in document order
/// - **content**: qualifying paragraphs and list items joined by a blank line
/// - **tables**: every table with at least one header or one body row
///
/// Never fails; absent parts come back empty.
pub fn extract_content(document: &Document) -> ExtractedContent {
    let title = document
        .declared_title()
        .or_else(|| document.headings(&[HeadingLevel::H1]).into_iter().next())
        .unwrap_or_default();

    let headings = document.headings(&CONTENT_LEVELS);

    let content = document
        .text_blocks()
        .into_iter()
        .filter(|block| {
            let length = block.text.trim().chars().count();
            match block.kind {
                BlockKind::Paragraph => length > MIN_PARAGRAPH_CHARS,
                BlockKind::ListItem => length > MIN_LIST_ITEM_CHARS,
            }
        })
        .map(|block| normalize_text(&block.text))
        .collect::<Vec<_>>()
        .join("\n\n");

    let tables = document
        .tables()
        .into_iter()
        .filter(|table| !table.headers.is_empty() || !table.rows.is_empty())
        .map(|table| TableData {
            headers: table.headers,
            rows: table.rows,
        })
        .collect();

    ExtractedContent {
        title,
        headings,
        content,
        tables,
    }
}
