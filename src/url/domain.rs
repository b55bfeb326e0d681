use crate::{UrlError, UrlResult};
use url::Url;

/// Extracts the domain from a URL
///
/// The domain is the lowercase host component; it keys all per-domain
/// rate-limiter and robots.txt state. Ports are not part of the domain.
///
/// # Examples
///
/// ```
/// use url::Url;
/// use stevie_crawler::url::extract_domain;
///
/// let url = Url::parse("https://www.StevieAwards.com/aba").unwrap();
/// assert_eq!(extract_domain(&url), Some("www.stevieawards.com".to_string()));
/// ```
pub fn extract_domain(url: &Url) -> Option<String> {
    url.host_str().map(|h| h.to_lowercase())
}

/// Parses a work-item URL, requiring an http(s) scheme and a host
///
/// # Returns
///
/// * `Ok((Url, String))` - The parsed URL and its domain
/// * `Err(UrlError)` - Unparseable, non-http(s), or host-less URL
pub fn parse_http_url(raw: &str) -> UrlResult<(Url, String)> {
    let url = Url::parse(raw).map_err(|e| UrlError::Parse(format!("{}: {}", raw, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let domain = extract_domain(&url).ok_or(UrlError::MissingDomain)?;
    Ok((url, domain))
}
