//! Whitespace normalisation shared by the extractors
//!
//! Both functions are idempotent: applying them to their own output is a no-op.

/// Collapses every whitespace run (newlines included) to a single space and trims
///
/// # Examples
///
/// ```
/// use stevie_crawler::extract::normalize_text;
///
/// assert_eq!(normalize_text("  Best\n\n  New   Product \t"), "Best New Product");
/// ```
pub fn normalize_text(text: &str) -> String {
    text.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalises text while keeping its line structure
///
/// Each line is collapsed like [`normalize_text`], runs of blank lines are
/// collapsed so non-empty lines are separated by a single newline, and the
/// result is trimmed.
pub fn normalize_multiline(text: &str) -> String {
    text.lines()
        .map(normalize_text)
        .filter(|line| !line.is_empty())
        .collect::<Vec<_>>()
        .join("\n")
}
