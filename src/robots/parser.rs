//! Robots.txt rules, matched with the robotstxt crate

use robotstxt::DefaultMatcher;

/// Parsed robots.txt data for one origin
#[derive(Debug, Clone)]
pub struct ParsedRobots {
    /// Raw robots.txt content
    content: String,
    /// Set when robots.txt was missing or unreachable
    allow_all: bool,
}

impl ParsedRobots {
    /// Wraps raw robots.txt content; rules are evaluated on demand
    pub fn from_content(content: &str) -> Self {
        Self {
            content: content.to_string(),
            allow_all: false,
        }
    }

    /// Permissive rules, used when robots.txt cannot be fetched
    pub fn allow_all() -> Self {
        Self {
            content: String::new(),
            allow_all: true,
        }
    }

    /// Returns true if these rules permit everything
    pub fn is_permissive(&self) -> bool {
        self.allow_all || self.content.trim().is_empty()
    }

    /// Checks if a URL is allowed for the given user agent
    ///
    /// # Arguments
    ///
    /// * `url` - Absolute URL or path (e.g., "/winners/2024")
    /// * `user_agent` - Full user agent; only the product token before the
    ///   first `/` is matched against `User-agent` lines
    pub fn is_allowed(&self, url: &str, user_agent: &str) -> bool {
        if self.is_permissive() {
            return true;
        }

        let mut matcher = DefaultMatcher::default();
        matcher.one_agent_allowed_by_robots(&self.content, product_token(user_agent), url)
    }
}

/// "stevie-crawler/1.0 (+https://...)" -> "stevie-crawler"
fn product_token(user_agent: &str) -> &str {
    user_agent
        .split(|c: char| c == '/' || c.is_whitespace())
        .find(|part| !part.is_empty())
        .unwrap_or(user_agent)
}
