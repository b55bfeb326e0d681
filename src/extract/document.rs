//! Typed view over a parsed HTML document
//!
//! The extractors only see the accessors defined here; none of them walk the
//! raw tree or build selectors themselves.

use crate::extract::normalize::normalize_text;
use scraper::{ElementRef, Html, Selector};
use url::Url;

/// Heading levels recognised by [`Document::headings`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum HeadingLevel {
    H1,
    H2,
    H3,
}

impl HeadingLevel {
    fn tag(&self) -> &'static str {
        match self {
            Self::H1 => "h1",
            Self::H2 => "h2",
            Self::H3 => "h3",
        }
    }
}

/// Kind of a body text block
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BlockKind {
    Paragraph,
    ListItem,
}

/// A paragraph or list item with its raw (unnormalised) text
#[derive(Debug, Clone, PartialEq)]
pub struct TextBlock {
    pub kind: BlockKind,
    pub text: String,
}

/// Cells of one table, split into header cells and body rows
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawTable {
    pub headers: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

/// A parsed HTML document
///
/// Parsing never fails: malformed markup yields a best-effort tree and the
/// accessors simply return fewer items.
pub struct Document {
    html: Html,
}

impl Document {
    /// Parses a full HTML document
    pub fn parse(source: &str) -> Self {
        Self {
            html: Html::parse_document(source),
        }
    }

    /// Text of the document's `<title>`, normalised; None if absent or empty
    pub fn declared_title(&self) -> Option<String> {
        let title_selector = Selector::parse("title").ok()?;

        self.html
            .select(&title_selector)
            .next()
            .map(|element| normalize_text(&element_text(&element)))
            .filter(|s| !s.is_empty())
    }

    /// Normalised texts of all headings at the given levels, in document order
    ///
    /// Empty headings are skipped.
    pub fn headings(&self, levels: &[HeadingLevel]) -> Vec<String> {
        if levels.is_empty() {
            return Vec::new();
        }

        let group = levels
            .iter()
            .map(HeadingLevel::tag)
            .collect::<Vec<_>>()
            .join(", ");

        let Ok(selector) = Selector::parse(&group) else {
            return Vec::new();
        };

        self.html
            .select(&selector)
            .map(|element| normalize_text(&element_text(&element)))
            .filter(|text| !text.is_empty())
            .collect()
    }

    /// All `<p>` and `<li>` elements in document order, with raw text
    pub fn text_blocks(&self) -> Vec<TextBlock> {
        let Ok(selector) = Selector::parse("p, li") else {
            return Vec::new();
        };

        self.html
            .select(&selector)
            .map(|element| {
                let kind = if element.value().name() == "li" {
                    BlockKind::ListItem
                } else {
                    BlockKind::Paragraph
                };
                TextBlock {
                    kind,
                    text: element_text(&element),
                }
            })
            .collect()
    }

    /// Every `<table>` element, in document order
    ///
    /// Headers come from the `<th>` cells of the table's `<thead>` if it has
    /// one; otherwise from every cell of the first row, and that row is not
    /// repeated as a body row. Body rows are the `<td>` cells of each remaining
    /// row; rows without data cells are dropped. Rows of nested tables belong
    /// to the nested table only. Cell texts are normalised.
    pub fn tables(&self) -> Vec<RawTable> {
        let (Ok(table_sel), Ok(row_sel), Ok(th_sel), Ok(td_sel), Ok(cell_sel)) = (
            Selector::parse("table"),
            Selector::parse("tr"),
            Selector::parse("th"),
            Selector::parse("td"),
            Selector::parse("th, td"),
        ) else {
            return Vec::new();
        };

        let mut tables = Vec::new();

        for table in self.html.select(&table_sel) {
            let own_rows: Vec<ElementRef> = table
                .select(&row_sel)
                .filter(|row| belongs_to(row, &table))
                .collect();

            let head_rows: Vec<&ElementRef> =
                own_rows.iter().filter(|row| is_in_thead(row)).collect();

            let (headers, body_rows): (Vec<String>, Vec<&ElementRef>) = if !head_rows.is_empty() {
                let headers = head_rows
                    .iter()
                    .flat_map(|row| row.select(&th_sel))
                    .map(|cell| normalize_text(&element_text(&cell)))
                    .collect();
                let body = own_rows.iter().filter(|row| !is_in_thead(row)).collect();
                (headers, body)
            } else if let Some((first, rest)) = own_rows.split_first() {
                let headers = first
                    .select(&cell_sel)
                    .map(|cell| normalize_text(&element_text(&cell)))
                    .collect();
                (headers, rest.iter().collect())
            } else {
                (Vec::new(), Vec::new())
            };

            let rows = body_rows
                .into_iter()
                .map(|row| {
                    row.select(&td_sel)
                        .map(|cell| normalize_text(&element_text(&cell)))
                        .collect::<Vec<_>>()
                })
                .filter(|cells| !cells.is_empty())
                .collect();

            tables.push(RawTable { headers, rows });
        }

        tables
    }

    /// Outbound links resolved against `base_url`
    ///
    /// Includes `<a href>` (except `download` links) and canonical links.
    /// Fragment-only, `javascript:`, `mailto:`, `tel:` and `data:` hrefs are
    /// dropped, as is anything that does not resolve to http(s). Order follows
    /// the document; duplicates are kept.
    pub fn links(&self, base_url: &Url) -> Vec<Url> {
        let mut links = Vec::new();

        if let Ok(a_selector) = Selector::parse("a[href]") {
            for element in self.html.select(&a_selector) {
                if element.value().attr("download").is_some() {
                    continue;
                }
                if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                    links.push(url);
                }
            }
        }

        if let Ok(canonical_selector) = Selector::parse("link[rel='canonical'][href]") {
            for element in self.html.select(&canonical_selector) {
                if let Some(url) = element.value().attr("href").and_then(|h| resolve_link(h, base_url)) {
                    links.push(url);
                }
            }
        }

        links
    }
}

fn element_text(element: &ElementRef) -> String {
    // Joined with spaces so adjacent inline elements don't fuse words
    element.text().collect::<Vec<_>>().join(" ")
}

/// True if `table` is the nearest enclosing table of `row`
fn belongs_to(row: &ElementRef, table: &ElementRef) -> bool {
    row.ancestors()
        .find(|node| {
            node.value()
                .as_element()
                .map(|e| e.name() == "table")
                .unwrap_or(false)
        })
        .map(|node| node.id() == table.id())
        .unwrap_or(false)
}

fn is_in_thead(row: &ElementRef) -> bool {
    for node in row.ancestors() {
        if let Some(element) = node.value().as_element() {
            match element.name() {
                "thead" => return true,
                "table" => return false,
                _ => {}
            }
        }
    }
    false
}

fn resolve_link(href: &str, base_url: &Url) -> Option<Url> {
    let href = href.trim();

    if href.is_empty() || href.starts_with('#') {
        return None;
    }

    let lower = href.to_ascii_lowercase();
    if lower.starts_with("javascript:")
        || lower.starts_with("mailto:")
        || lower.starts_with("tel:")
        || lower.starts_with("data:")
    {
        return None;
    }

    let absolute = base_url.join(href).ok()?;
    if absolute.scheme() == "http" || absolute.scheme() == "https" {
        Some(absolute)
    } else {
        None
    }
}
