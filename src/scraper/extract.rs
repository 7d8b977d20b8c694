//! Main-text extraction over a parsed HTML document.
//!
//! Strategies run in order; the first one yielding at least
//! [`MIN_CONTENT_CHARS`] characters wins.

use select::document::Document;
use select::node::Node;
use select::predicate::{Name, Predicate};

pub const MIN_CONTENT_CHARS: usize = 100;

const CHROME: &[&str] = &[
    "nav", "footer", "aside", "header", "script", "style", "noscript", "form",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Strategy {
    Article,
    Paragraphs,
    Density,
}

impl Strategy {
    pub const ALL: [Strategy; 3] = [Strategy::Article, Strategy::Paragraphs, Strategy::Density];

    pub fn name(self) -> &'static str {
        match self {
            Strategy::Article => "article",
            Strategy::Paragraphs => "paragraphs",
            Strategy::Density => "density",
        }
    }

    pub fn run(self, doc: &Document) -> Option<String> {
        let paras = match self {
            Strategy::Article => doc
                .find(Name("article").descendant(Name("p")))
                .filter(|n| !inside_chrome(n))
                .map(|n| collapse_ws(&n.text()))
                .collect(),
            Strategy::Paragraphs => doc
                .find(Name("body").descendant(Name("p")))
                .filter(|n| !inside_chrome(n))
                .map(|n| collapse_ws(&n.text()))
                .collect(),
            Strategy::Density => densest_div(doc),
        };
        let text = join_paragraphs(paras);
        (text.chars().count() >= MIN_CONTENT_CHARS).then_some(text)
    }
}

/// First strategy with enough text, with its name.
pub fn extract_main_text(doc: &Document) -> Option<(&'static str, String)> {
    Strategy::ALL
        .into_iter()
        .find_map(|s| s.run(doc).map(|t| (s.name(), t)))
}

/// Text of the first non-empty `<h1>`.
pub fn heading_title(doc: &Document) -> Option<String> {
    doc.find(Name("h1"))
        .map(|n| collapse_ws(&n.text()))
        .find(|t| !t.is_empty())
}

pub fn document_title(doc: &Document) -> Option<String> {
    doc.find(Name("title"))
        .next()
        .map(|n| collapse_ws(&n.text()))
        .filter(|t| !t.is_empty())
}

pub fn collapse_ws(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

fn join_paragraphs(paras: Vec<String>) -> String {
    paras
        .into_iter()
        .filter(|p| !p.is_empty())
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn inside_chrome(node: &Node) -> bool {
    let mut cur = node.parent();
    while let Some(p) = cur {
        if p.name().is_some_and(|n| CHROME.contains(&n)) {
            return true;
        }
        cur = p.parent();
    }
    false
}

fn densest_div(doc: &Document) -> Vec<String> {
    let mut best: (usize, Vec<String>) = (0, Vec::new());
    for div in doc.find(Name("div")) {
        if inside_chrome(&div) {
            continue;
        }
        let paras: Vec<String> = div
            .children()
            .filter(|c| c.name() == Some("p"))
            .map(|c| collapse_ws(&c.text()))
            .collect();
        let len: usize = paras.iter().map(String::len).sum();
        if len > best.0 {
            best = (len, paras);
        }
    }
    best.1
}
