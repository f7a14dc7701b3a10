//! URL scanning shared by the heuristic evaluator and the submission gateway.

use std::sync::LazyLock;

use regex::Regex;

static URL_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)https?://[^\s)]+").expect("URL_RE regex should compile"));

/// A URL-looking token found in note text.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UrlMatch<'a> {
    pub url: &'a str,
    /// Byte offset of the match in the scanned text.
    pub start: usize,
}

/// All URL-looking tokens in `text`, in order.
pub fn find_urls(text: &str) -> Vec<UrlMatch<'_>> {
    URL_RE
        .find_iter(text)
        .map(|m| UrlMatch {
            url: m.as_str(),
            start: m.start(),
        })
        .collect()
}

/// Whether `url` is syntactically valid: http(s) scheme and a dot in the host.
pub fn is_valid_url(url: &str) -> bool {
    let lower = url.to_ascii_lowercase();
    let rest = match lower
        .strip_prefix("https://")
        .or_else(|| lower.strip_prefix("http://"))
    {
        Some(rest) => rest,
        None => return false,
    };
    let host = rest
        .split(|c| matches!(c, '/' | '?' | '#'))
        .next()
        .unwrap_or_default();
    let host = host.rsplit('@').next().unwrap_or_default();
    let host = host.split(':').next().unwrap_or_default();
    host.contains('.') && !host.starts_with('.') && !host.ends_with('.')
}

/// Counts of URL-looking tokens: (total, invalid).
pub fn url_counts(text: &str) -> (usize, usize) {
    let urls = find_urls(text);
    let invalid = urls.iter().filter(|m| !is_valid_url(m.url)).count();
    (urls.len(), invalid)
}

/// Whether `text` contains at least one syntactically valid URL.
pub fn has_valid_url(text: &str) -> bool {
    find_urls(text).iter().any(|m| is_valid_url(m.url))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_find_urls_stops_at_paren_and_space() {
        let urls = find_urls("see (https://example.com/a) and HTTP://foo.org/b c");
        assert_eq!(urls.len(), 2);
        assert_eq!(urls[0].url, "https://example.com/a");
        assert_eq!(urls[1].url, "HTTP://foo.org/b");
    }

    #[test]
    fn test_is_valid_url() {
        assert!(is_valid_url("https://example.com"));
        assert!(is_valid_url("http://sub.example.org/path?q=1"));
        assert!(is_valid_url("https://user@example.com:8080/x"));
        assert!(!is_valid_url("https://localhost/page.html"));
        assert!(!is_valid_url("ftp://example.com"));
        assert!(!is_valid_url("https://"));
    }

    #[test]
    fn test_url_counts() {
        assert_eq!(url_counts("no links"), (0, 0));
        assert_eq!(
            url_counts("https://a.com https://broken https://nodot/x"),
            (3, 2)
        );
        assert!(has_valid_url("ref https://a.com"));
        assert!(!has_valid_url("ref https://broken"));
    }
}
