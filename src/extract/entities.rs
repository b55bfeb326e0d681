//! Entity Extractor: typed award/category/date/price mentions with context
//!
//! Every entity type is a row in one ordered pattern table. Patterns run in
//! table order over the whole text and each non-overlapping match of each
//! pattern yields one entity, so the output is fully determined by the input.

use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Characters of context kept on each side of a match start
pub const CONTEXT_RADIUS: usize = 50;

/// Entity types
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EntityKind {
    Award,
    Category,
    Date,
    Price,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Award => "award",
            Self::Category => "category",
            Self::Date => "date",
            Self::Price => "price",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed mention found in page text
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExtractedEntity {
    #[serde(rename = "type")]
    pub kind: EntityKind,
    pub value: String,
    /// Up to [`CONTEXT_RADIUS`] characters either side of the match start, trimmed
    pub context: String,
}

struct EntityPattern {
    kind: EntityKind,
    regex: Regex,
    /// Capture group holding the value; 0 is the whole match
    group: usize,
}

impl EntityPattern {
    fn new(kind: EntityKind, pattern: &str, group: usize) -> Self {
        Self {
            kind,
            regex: Regex::new(pattern).expect("entity pattern must compile"),
            group,
        }
    }
}

const MONTHS: &str =
    "January|February|March|April|May|June|July|August|September|October|November|December";

static PATTERNS: Lazy<Vec<EntityPattern>> = Lazy::new(|| {
    vec![
        // "The Stevie Awards for Women in Business", "Stevie Award in Sales & Customer Service"
        EntityPattern::new(
            EntityKind::Award,
            r"(?:The\s+)?Stevie\s+Awards?\s+(?:for|in)\s+[A-Z][\w&'-]*(?:\s+(?:(?:in|of|and|for|the|&)\s+)*[A-Z][\w&'-]*)*",
            0,
        ),
        // Capitalised phrase ending in Award(s)/Prize: "Gold Stevie Award", "Grand Prize"
        EntityPattern::new(
            EntityKind::Award,
            r"\b(?:[A-Z][\w&'-]*\s+){1,6}(?:Awards?|Prize)\b",
            0,
        ),
        EntityPattern::new(
            EntityKind::Award,
            r"\b(?:American Business Awards|International Business Awards|Stevie Awards for Women in Business|Stevie Awards for Sales (?:&|and) Customer Service|Asia-Pacific Stevie Awards|German Stevie Awards|Middle East (?:&|and) North Africa Stevie Awards|Stevie Awards for Great Employers|Stevie Awards for Technology Excellence)\b",
            0,
        ),
        EntityPattern::new(
            EntityKind::Category,
            r"(?i)\bcategor(?:y|ies)\s*:\s*([^.\n\r]+)",
            1,
        ),
        EntityPattern::new(
            EntityKind::Date,
            &format!(r"\b(?:{})\s+\d{{1,2}}(?:st|nd|rd|th)?,?\s+\d{{4}}\b", MONTHS),
            0,
        ),
        EntityPattern::new(EntityKind::Date, r"\b\d{1,2}/\d{1,2}/\d{2,4}\b", 0),
        EntityPattern::new(EntityKind::Date, r"\b\d{4}-\d{2}-\d{2}\b", 0),
        EntityPattern::new(
            EntityKind::Price,
            r"\$(?:\d{1,3}(?:,\d{3})+|\d+)(?:\.\d{2})?",
            0,
        ),
    ]
});

/// Extracts all entities from normalised text
///
/// Order is pattern-table order, then match position. Repeats across
/// patterns are kept.
///
/// # Examples
///
/// ```
/// use stevie_crawler::extract::{extract_entities, EntityKind};
///
/// let entities = extract_entities("Fee: $695.00.");
/// assert_eq!(entities[0].kind, EntityKind::Price);
/// assert_eq!(entities[0].value, "$695.00");
/// ```
pub fn extract_entities(text: &str) -> Vec<ExtractedEntity> {
    let mut entities = Vec::new();

    for pattern in PATTERNS.iter() {
        for captures in pattern.regex.captures_iter(text) {
            let (Some(whole), Some(value)) = (captures.get(0), captures.get(pattern.group)) else {
                continue;
            };

            let value = value.as_str().trim();
            if value.is_empty() {
                continue;
            }

            entities.push(ExtractedEntity {
                kind: pattern.kind,
                value: value.to_string(),
                context: context_window(text, whole.start()),
            });
        }
    }

    entities
}

/// Text from `CONTEXT_RADIUS` chars before `start` to `CONTEXT_RADIUS` chars after, trimmed
fn context_window(text: &str, start: usize) -> String {
    let from = text[..start]
        .char_indices()
        .rev()
        .nth(CONTEXT_RADIUS - 1)
        .map(|(i, _)| i)
        .unwrap_or(0);

    let to = text[start..]
        .char_indices()
        .nth(CONTEXT_RADIUS)
        .map(|(i, _)| start + i)
        .unwrap_or(text.len());

    text[from..to].trim().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn of_kind(entities: &[ExtractedEntity], kind: EntityKind) -> Vec<String> {
        entities
            .iter()
            .filter(|e| e.kind == kind)
            .map(|e| e.value.clone())
            .collect()
    }

    #[test]
    fn test_women_in_business_example() {
        let text = "The Stevie Awards for Women in Business opens March 1, 2024. Fee: $695.00.";
        let entities = extract_entities(text);

        let awards = of_kind(&entities, EntityKind::Award);
        assert!(awards.iter().any(|a| a.contains("Women in Business")));
        assert_eq!(of_kind(&entities, EntityKind::Date), vec!["March 1, 2024"]);
        assert_eq!(of_kind(&entities, EntityKind::Price), vec!["$695.00"]);
    }

    #[test]
    fn test_award_patterns_keep_duplicates() {
        let text = "Winners of the American Business Awards were announced.";
        let awards = of_kind(&extract_entities(text), EntityKind::Award);
        // Matched by the generic phrase pattern and the known-program list
        assert_eq!(awards.len(), 2);
        assert!(awards.iter().all(|a| a.ends_with("American Business Awards")));
    }

    #[test]
    fn test_category_label() {
        let text = "Category: Best New Product or Service of the Year. Entries open now.";
        let categories = of_kind(&extract_entities(text), EntityKind::Category);
        assert_eq!(categories, vec!["Best New Product or Service of the Year"]);

        let text = "CATEGORIES:   Marketing Campaign\nOther text";
        let categories = of_kind(&extract_entities(text), EntityKind::Category);
        assert_eq!(categories, vec!["Marketing Campaign"]);
    }

    #[test]
    fn test_date_families() {
        let text = "Deadline June 3rd 2025, extended to 06/17/2025 (ISO 2025-06-17).";
        let dates = of_kind(&extract_entities(text), EntityKind::Date);
        assert_eq!(dates, vec!["June 3rd 2025", "06/17/2025", "2025-06-17"]);
    }

    #[test]
    fn test_prices() {
        let text = "Early entry $495, standard $1,295.50, late $10000.";
        let prices = of_kind(&extract_entities(text), EntityKind::Price);
        assert_eq!(prices, vec!["$495", "$1,295.50", "$10000"]);
    }

    #[test]
    fn test_context_window_is_clipped_and_trimmed() {
        let text = "Fee: $695.00.";
        let entity = &extract_entities(text)[0];
        assert_eq!(entity.context, "Fee: $695.00.");

        let padding = "x".repeat(80);
        let text = format!("{} $100 {}", padding, padding);
        let entity = &extract_entities(&text)[0];
        let start = padding.len() + 1;
        let expected = text[start - CONTEXT_RADIUS..start + CONTEXT_RADIUS].trim();
        assert_eq!(entity.context, expected);
    }

    #[test]
    fn test_context_window_multibyte() {
        let text = "Préférence – Zürich gala, entry fee $250 payable in full.";
        let entity = extract_entities(text)
            .into_iter()
            .find(|e| e.kind == EntityKind::Price)
            .unwrap();
        assert_eq!(entity.value, "$250");
        assert!(entity.context.contains("Zürich"));
    }

    #[test]
    fn test_deterministic() {
        let text = "The Stevie Awards for Sales & Customer Service: Category: Sales Team. \
                    Held 2024-02-27 and 2/27/24. Fee $295.";
        assert_eq!(extract_entities(text), extract_entities(text));
    }

    #[test]
    fn test_no_entities_in_plain_text() {
        assert!(extract_entities("nothing to see here").is_empty());
        assert!(extract_entities("").is_empty());
    }

    #[test]
    fn test_serialized_type_field() {
        let entity = ExtractedEntity {
            kind: EntityKind::Price,
            value: "$1".to_string(),
            context: "$1".to_string(),
        };
        let json = serde_json::to_string(&entity).unwrap();
        assert_eq!(json, r#"{"type":"price","value":"$1","context":"$1"}"#);
    }
}
