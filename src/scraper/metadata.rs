//! Page metadata from JSON-LD, OpenGraph and Dublin Core, in that priority.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use select::document::Document;
use select::predicate::{Attr, Name, Predicate};
use serde_json::Value;
use std::collections::HashMap;

#[derive(Debug, Default, Clone, PartialEq)]
pub struct PageMetadata {
    pub title: Option<String>,
    pub authors: Vec<String>,
    pub published: Option<String>,
    pub modified: Option<String>,
    pub description: Option<String>,
    pub section: Option<String>,
    pub keywords: Vec<String>,
    pub image: Option<String>,
}

pub fn extract_metadata(doc: &Document) -> PageMetadata {
    let mut md = PageMetadata::default();
    if let Some(ld) = json_ld_article(doc) {
        apply_json_ld(&mut md, &ld);
    }

    let meta = meta_map(doc);
    let get = |k: &str| meta.get(k).cloned();

    // OpenGraph
    fill(&mut md.title, get("og:title"));
    fill(&mut md.description, get("og:description"));
    fill(&mut md.published, get("article:published_time"));
    fill(&mut md.modified, get("article:modified_time"));
    fill(&mut md.section, get("article:section"));
    fill(&mut md.image, get("og:image"));
    if md.authors.is_empty() {
        md.authors.extend(get("article:author"));
    }

    // Dublin Core
    fill(&mut md.title, get("dc.title").or_else(|| get("dcterms.title")));
    fill(
        &mut md.description,
        get("dc.description").or_else(|| get("dcterms.description")),
    );
    fill(&mut md.published, get("dc.date").or_else(|| get("dcterms.date")));
    if md.authors.is_empty() {
        md.authors
            .extend(get("dc.creator").or_else(|| get("dcterms.creator")));
    }

    if md.keywords.is_empty() {
        if let Some(k) = get("keywords") {
            md.keywords = split_keywords(&k);
        }
    }

    md.published = md.published.map(|d| normalize_date(&d));
    md.modified = md.modified.map(|d| normalize_date(&d));
    md
}

fn fill(slot: &mut Option<String>, value: Option<String>) {
    if slot.as_deref().map_or(true, str::is_empty) {
        if let Some(v) = value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty()) {
            *slot = Some(v);
        }
    }
}

/// `<meta>` content keyed by lowercased `property` or `name`; first occurrence wins.
fn meta_map(doc: &Document) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for node in doc.find(Name("meta")) {
        let Some(content) = node.attr("content") else {
            continue;
        };
        let key = node.attr("property").or_else(|| node.attr("name"));
        if let Some(k) = key {
            out.entry(k.trim().to_ascii_lowercase())
                .or_insert_with(|| content.to_string());
        }
    }
    out
}

fn is_article_type(v: &Value) -> bool {
    let matches = |s: &str| s == "NewsArticle" || s == "Article";
    match v.get("@type") {
        Some(Value::String(s)) => matches(s),
        Some(Value::Array(a)) => a.iter().filter_map(Value::as_str).any(matches),
        _ => false,
    }
}

fn json_ld_article(doc: &Document) -> Option<Value> {
    for node in doc.find(Name("script").and(Attr("type", "application/ld+json"))) {
        let Ok(v) = serde_json::from_str::<Value>(node.text().trim()) else {
            continue;
        };
        let candidates: Vec<Value> = match v {
            Value::Array(items) => items,
            Value::Object(ref o) if o.contains_key("@graph") => o
                .get("@graph")
                .and_then(Value::as_array)
                .cloned()
                .unwrap_or_default(),
            other => vec![other],
        };
        if let Some(found) = candidates.into_iter().find(is_article_type) {
            return Some(found);
        }
    }
    None
}

fn names_of(v: &Value) -> Vec<String> {
    match v {
        Value::String(s) => vec![s.clone()],
        Value::Object(o) => o
            .get("name")
            .and_then(Value::as_str)
            .map(|s| vec![s.to_string()])
            .unwrap_or_default(),
        Value::Array(a) => a.iter().flat_map(names_of).collect(),
        _ => Vec::new(),
    }
}

fn split_keywords(s: &str) -> Vec<String> {
    s.split(',')
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}

fn apply_json_ld(md: &mut PageMetadata, ld: &Value) {
    let s = |k: &str| ld.get(k).and_then(Value::as_str).map(str::to_string);
    fill(&mut md.title, s("headline"));
    fill(&mut md.published, s("datePublished"));
    fill(&mut md.modified, s("dateModified"));
    fill(&mut md.description, s("description"));
    fill(&mut md.section, s("articleSection"));
    if let Some(a) = ld.get("author") {
        md.authors = names_of(a).into_iter().filter(|n| !n.is_empty()).collect();
    }
    match ld.get("keywords") {
        Some(Value::String(k)) => md.keywords = split_keywords(k),
        Some(Value::Array(a)) => {
            md.keywords = a
                .iter()
                .filter_map(Value::as_str)
                .map(str::to_string)
                .collect()
        }
        _ => {}
    }
    match ld.get("image") {
        Some(Value::String(u)) => fill(&mut md.image, Some(u.clone())),
        Some(img @ Value::Object(_)) => {
            fill(&mut md.image, img.get("url").and_then(Value::as_str).map(str::to_string))
        }
        _ => {}
    }
}

/// RFC 3339 when the input parses as a common date form, otherwise unchanged.
pub fn normalize_date(raw: &str) -> String {
    let s = raw.trim();
    if let Ok(dt) = DateTime::parse_from_rfc3339(s) {
        return dt.to_rfc3339();
    }
    if let Ok(dt) = DateTime::parse_from_rfc2822(s) {
        return dt.to_rfc3339();
    }
    if let Ok(dt) = DateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S%z") {
        return dt.to_rfc3339();
    }
    if let Ok(naive) = NaiveDateTime::parse_from_str(s, "%Y-%m-%dT%H:%M:%S") {
        return naive.and_utc().to_rfc3339();
    }
    if let Ok(d) = NaiveDate::parse_from_str(s, "%Y-%m-%d") {
        if let Some(naive) = d.and_hms_opt(0, 0, 0) {
            return naive.and_utc().to_rfc3339();
        }
    }
    s.to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn json_ld_wins_over_opengraph() {
        let html = r#"<html><head>
            <meta property="og:title" content="OG title">
            <meta property="og:description" content="OG description">
            <meta property="article:section" content="World">
            <script type="application/ld+json">
              {"@type":"NewsArticle","headline":"LD headline",
               "author":[{"name":"Ann Lee"},{"name":"Bo Chen"}],
               "datePublished":"2024-03-01","keywords":"floods, weather"}
            </script></head><body></body></html>"#;
        let md = extract_metadata(&Document::from(html));
        assert_eq!(md.title.as_deref(), Some("LD headline"));
        assert_eq!(md.authors, vec!["Ann Lee", "Bo Chen"]);
        assert_eq!(md.published.as_deref(), Some("2024-03-01T00:00:00+00:00"));
        assert_eq!(md.keywords, vec!["floods", "weather"]);
        // Not set by JSON-LD, so OpenGraph fills them.
        assert_eq!(md.description.as_deref(), Some("OG description"));
        assert_eq!(md.section.as_deref(), Some("World"));
    }

    #[test]
    fn dublin_core_is_last_resort() {
        let html = r#"<html><head>
            <meta name="DC.title" content="DC title">
            <meta name="DC.creator" content="J. Smith">
            <meta name="DC.date" content="Tue, 05 Mar 2024 10:00:00 GMT">
            </head></html>"#;
        let md = extract_metadata(&Document::from(html));
        assert_eq!(md.title.as_deref(), Some("DC title"));
        assert_eq!(md.authors, vec!["J. Smith"]);
        assert_eq!(md.published.as_deref(), Some("2024-03-05T10:00:00+00:00"));
    }

    #[test]
    fn graph_and_garbage_json_ld() {
        let html = r#"<script type="application/ld+json">{not json</script>
            <script type="application/ld+json">
              {"@graph":[{"@type":"WebPage"},{"@type":["Article"],"headline":"In graph","author":"Solo"}]}
            </script>"#;
        let md = extract_metadata(&Document::from(html));
        assert_eq!(md.title.as_deref(), Some("In graph"));
        assert_eq!(md.authors, vec!["Solo"]);
    }

    #[test]
    fn unparseable_dates_pass_through() {
        assert_eq!(normalize_date("last Tuesday"), "last Tuesday");
        assert_eq!(
            normalize_date("2024-01-02T03:04:05Z"),
            "2024-01-02T03:04:05+00:00"
        );
    }
}
