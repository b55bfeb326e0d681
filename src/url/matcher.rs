use crate::ConfigError;
use regex::{Regex, RegexBuilder};

/// A compiled URL glob pattern
///
/// Patterns are matched against the full serialized URL, ignoring ASCII
/// case. A query string or fragment after the matched part is accepted, so
/// `**/*.pdf` also matches `kit.pdf?v=2` and `kit.pdf#page=2`. Supported syntax:
/// - `**` matches any run of characters, including `/`
/// - `*` matches any run of characters except `/`
/// - `?` matches a single character except `/`
/// - `{a,b,c}` matches any one of the comma-separated alternatives
///
/// Every other character matches itself literally.
///
/// # Examples
///
/// ```
/// use stevie_crawler::url::UrlPattern;
///
/// let pattern = UrlPattern::new("https://www.stevieawards.com/**").unwrap();
/// assert!(pattern.matches("https://www.stevieawards.com/aba/categories"));
/// assert!(!pattern.matches("https://other.com/aba"));
///
/// let assets = UrlPattern::new("**/*.{png,jpg}").unwrap();
/// assert!(assets.matches("https://example.com/img/logo.png"));
/// ```
#[derive(Debug, Clone)]
pub struct UrlPattern {
    source: String,
    regex: Regex,
}

impl UrlPattern {
    /// Compiles a glob pattern
    ///
    /// # Returns
    ///
    /// * `Ok(UrlPattern)` - The compiled pattern
    /// * `Err(ConfigError::InvalidPattern)` - Empty pattern or unbalanced braces
    pub fn new(glob: &str) -> Result<Self, ConfigError> {
        if glob.trim().is_empty() {
            return Err(ConfigError::InvalidPattern(
                "URL pattern cannot be empty".to_string(),
            ));
        }

        let translated = glob_to_regex(glob)?;
        let regex = RegexBuilder::new(&translated)
            .case_insensitive(true)
            .build()
            .map_err(|e| {
                ConfigError::InvalidPattern(format!("Pattern '{}' failed to compile: {}", glob, e))
            })?;

        Ok(Self {
            source: glob.to_string(),
            regex,
        })
    }

    /// Returns true if the URL matches, up to an optional query or fragment
    pub fn matches(&self, url: &str) -> bool {
        self.regex.is_match(url)
    }

    /// The glob this pattern was compiled from
    pub fn as_str(&self) -> &str {
        &self.source
    }
}

fn glob_to_regex(glob: &str) -> Result<String, ConfigError> {
    let mut out = String::with_capacity(glob.len() * 2 + 2);
    out.push('^');

    let mut chars = glob.chars().peekable();
    let mut in_group = false;

    while let Some(c) = chars.next() {
        match c {
            '*' => {
                if chars.peek() == Some(&'*') {
                    chars.next();
                    out.push_str(".*");
                } else {
                    out.push_str("[^/]*");
                }
            }
            '?' => out.push_str("[^/]"),
            '{' if !in_group => {
                in_group = true;
                out.push_str("(?:");
            }
            '}' if in_group => {
                in_group = false;
                out.push(')');
            }
            ',' if in_group => out.push('|'),
            '{' | '}' => {
                return Err(ConfigError::InvalidPattern(format!(
                    "Unbalanced braces in pattern '{}'",
                    glob
                )));
            }
            other => {
                let mut buf = [0u8; 4];
                out.push_str(&regex::escape(other.encode_utf8(&mut buf)));
            }
        }
    }

    if in_group {
        return Err(ConfigError::InvalidPattern(format!(
            "Unbalanced braces in pattern '{}'",
            glob
        )));
    }

    // Trailing query string or fragment
    out.push_str("(?:[?#].*)?$");
    Ok(out)
}
