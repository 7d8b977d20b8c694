use url::Url;

/// Only absolute http(s) URLs with a host are accepted.
pub fn is_valid_url(s: &str) -> bool {
    let s = s.trim();
    if !(s.starts_with("http://") || s.starts_with("https://")) {
        return false;
    }
    match Url::parse(s) {
        Ok(u) => {
            matches!(u.scheme(), "http" | "https")
                && u.host_str().is_some_and(|h| !h.is_empty() && !h.starts_with('.'))
        }
        Err(_) => false,
    }
}

/// Prefix `https://` when the scheme is missing.
pub fn normalize_input_url(s: &str) -> String {
    let s = s.trim();
    if s.starts_with("http://") || s.starts_with("https://") {
        s.to_string()
    } else {
        format!("https://{s}")
    }
}

/// Lowercased host without a leading `www.`; empty when unparsable.
pub fn domain_of(url: &str) -> String {
    let host = Url::parse(url.trim())
        .ok()
        .and_then(|u| u.host_str().map(str::to_ascii_lowercase))
        .unwrap_or_default();
    strip_www(&host).to_string()
}

pub fn strip_www(host: &str) -> &str {
    host.strip_prefix("www.").unwrap_or(host)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validity() {
        assert!(is_valid_url("https://www.reuters.com/world/x"));
        assert!(is_valid_url("http://example.org"));
        assert!(!is_valid_url("ftp://example.org"));
        assert!(!is_valid_url("example.org/path"));
        assert!(!is_valid_url("https://"));
        assert!(!is_valid_url(""));
    }

    #[test]
    fn prefixing_and_domains() {
        assert_eq!(normalize_input_url("bbc.com/news"), "https://bbc.com/news");
        assert_eq!(normalize_input_url("http://a.b"), "http://a.b");
        assert_eq!(domain_of("https://WWW.BBC.com/news/1"), "bbc.com");
        assert_eq!(domain_of("https://abcnews.com.co/story"), "abcnews.com.co");
        assert_eq!(domain_of("not a url"), "");
    }
}
