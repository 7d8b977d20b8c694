//! # Source Credibility
//!
//! Maps news domains to a 0..=100 credibility score.
//!
//! - Built-in tiered table (`default_seed()`), optionally extended from JSON.
//! - Known fake-news domains always score 0.
//! - Lookup is case-insensitive and ignores a leading `www.`; subdomains
//!   fall back to their registered parent (`edition.cnn.com` -> `cnn.com`).
//! - Unknown domains get `default_score` (50).

use serde::Deserialize;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, RwLock};
use std::time::SystemTime;
use std::{
    fs,
    path::{Path, PathBuf},
};

use super::url::strip_www;

#[derive(Debug, Clone, Deserialize)]
pub struct CredibilityTable {
    #[serde(default = "default_default_score")]
    pub default_score: u8,
    #[serde(default)]
    pub scores: HashMap<String, u8>,
    #[serde(default)]
    pub fake_domains: HashSet<String>,
}

fn default_default_score() -> u8 {
    50
}

impl CredibilityTable {
    /// Built-in table extended with entries from `path`. A missing or invalid
    /// file leaves the built-in table as is.
    pub fn load_with_overrides<P: AsRef<Path>>(path: P) -> Self {
        let mut table = Self::default_seed();
        let path = path.as_ref();
        let Ok(raw) = fs::read_to_string(path) else {
            return table;
        };
        match serde_json::from_str::<CredibilityTable>(&raw) {
            Ok(extra) => {
                for (d, s) in extra.scores {
                    table.scores.insert(normalize(&d), s.min(100));
                }
                for d in extra.fake_domains {
                    table.fake_domains.insert(normalize(&d));
                }
                table.default_score = extra.default_score.min(100);
                tracing::info!(path = %path.display(), "source credibility overrides loaded");
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "invalid credibility overrides ignored");
            }
        }
        table
    }

    pub fn is_known_fake(&self, domain: &str) -> bool {
        self.fake_domains.contains(&normalize(domain))
    }

    /// Score for a domain (not a URL).
    pub fn credibility(&self, domain: &str) -> u8 {
        let d = normalize(domain);
        if self.fake_domains.contains(&d) {
            return 0;
        }
        if let Some(&s) = self.scores.get(&d) {
            return s;
        }
        // Parent-domain fallback, never below a two-label suffix.
        let mut rest = d.as_str();
        while let Some((_, parent)) = rest.split_once('.') {
            if !parent.contains('.') {
                break;
            }
            if let Some(&s) = self.scores.get(parent) {
                return s;
            }
            rest = parent;
        }
        self.default_score
    }

    /// Trusted domain this one imitates (typosquat or `.com.co` clone), if any.
    pub fn lookalike_of(&self, domain: &str) -> Option<String> {
        let d = normalize(domain);
        if self.scores.contains_key(&d) {
            return None;
        }
        if let Some(base) = d.strip_suffix(".co") {
            if self.scores.get(base).is_some_and(|&s| s >= 70) {
                return Some(base.to_string());
            }
        }
        self.scores
            .iter()
            .filter(|(_, &s)| s >= 70)
            .filter(|(k, _)| {
                let dist = strsim::levenshtein(k, &d);
                dist > 0 && dist <= 2 && k.len() > 5
            })
            .map(|(k, _)| k.clone())
            .min()
    }

    pub fn default_seed() -> Self {
        let mut scores = HashMap::new();
        for (k, v) in [
            // Tier 1: international wire services and broadcasters
            ("bbc.com", 90),
            ("bbc.co.uk", 90),
            ("reuters.com", 95),
            ("apnews.com", 95),
            ("nytimes.com", 85),
            ("washingtonpost.com", 85),
            ("theguardian.com", 85),
            ("wsj.com", 85),
            ("economist.com", 90),
            ("bloomberg.com", 85),
            ("ft.com", 90),
            ("aljazeera.com", 80),
            ("france24.com", 85),
            ("dw.com", 85),
            // Tier 2: national outlets
            ("npr.org", 85),
            ("pbs.org", 85),
            ("time.com", 80),
            ("theatlantic.com", 80),
            ("newyorker.com", 80),
            ("politico.com", 80),
            ("axios.com", 80),
            ("latimes.com", 80),
            ("chicagotribune.com", 80),
            ("bostonglobe.com", 80),
            ("usatoday.com", 75),
            ("cnn.com", 75),
            ("nbcnews.com", 80),
            ("abcnews.go.com", 80),
            ("cbsnews.com", 80),
            // Tier 3: mainstream, uneven
            ("foxnews.com", 70),
            ("newsweek.com", 70),
            ("thehill.com", 75),
            ("vox.com", 75),
            ("slate.com", 70),
            ("thedailybeast.com", 65),
            ("huffpost.com", 65),
            ("buzzfeednews.com", 70),
            ("vice.com", 65),
            // Tier 4: tabloids
            ("nypost.com", 60),
            ("dailymail.co.uk", 55),
            ("thesun.co.uk", 50),
            ("mirror.co.uk", 55),
            ("express.co.uk", 55),
            // Tier 5: highly partisan
            ("breitbart.com", 45),
            ("dailycaller.com", 45),
            ("theblaze.com", 45),
            ("oann.com", 40),
            ("newsmax.com", 40),
            // Tier 6: misinformation
            ("infowars.com", 20),
            ("naturalnews.com", 15),
            ("zerohedge.com", 25),
            // Science and technology
            ("scientificamerican.com", 90),
            ("nature.com", 95),
            ("science.org", 95),
            ("newscientist.com", 85),
            ("wired.com", 80),
            ("techcrunch.com", 75),
            ("arstechnica.com", 85),
            ("technologyreview.com", 85),
            // Business
            ("cnbc.com", 80),
            ("forbes.com", 75),
            ("businessinsider.com", 70),
            ("marketwatch.com", 75),
            // International
            ("cbc.ca", 85),
            ("abc.net.au", 85),
            ("smh.com.au", 80),
            ("irishtimes.com", 80),
            ("independent.co.uk", 75),
            ("telegraph.co.uk", 75),
            ("thelocal.fr", 75),
            ("thelocal.de", 75),
            ("spiegel.de", 85),
            ("scmp.com", 75),
        ] {
            scores.insert(k.to_string(), v);
        }

        let fake_domains = [
            "infowars.com",
            "naturalnews.com",
            "worldnewsdailyreport.com",
            "empirenews.net",
            "nationalreport.net",
            "worldtruth.tv",
            "beforeitsnews.com",
            "endingthefed.com",
            "dcclothesline.com",
            "redflagnews.com",
            "disclose.tv",
            "yournewswire.com",
            "newspunch.com",
            "americannews.com",
            "thelastlineofdefense.org",
            "libertywriters.com",
            "civictribune.com",
            "amplifyingglass.com",
            "abcnews.com.co",
            "usatoday.com.co",
            "washingtonpost.com.co",
            "nbc.com.co",
            "cnn.com.co",
            "foxnews.com.co",
        ]
        .into_iter()
        .map(str::to_string)
        .collect();

        Self {
            default_score: 50,
            scores,
            fake_domains,
        }
    }
}

/// Credibility table rebuilt whenever the override file's mtime changes.
#[derive(Debug)]
pub struct HotCredibility {
    path: PathBuf,
    inner: RwLock<(Arc<CredibilityTable>, Option<SystemTime>)>,
}

impl HotCredibility {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let mtime = fs::metadata(&path).and_then(|m| m.modified()).ok();
        let table = Arc::new(CredibilityTable::load_with_overrides(&path));
        Self {
            path,
            inner: RwLock::new((table, mtime)),
        }
    }

    pub fn current(&self) -> Arc<CredibilityTable> {
        let mtime = fs::metadata(&self.path).and_then(|m| m.modified()).ok();
        if let Ok(g) = self.inner.read() {
            if g.1 == mtime {
                return g.0.clone();
            }
        }
        let fresh = Arc::new(CredibilityTable::load_with_overrides(&self.path));
        if let Ok(mut g) = self.inner.write() {
            *g = (fresh.clone(), mtime);
        }
        fresh
    }
}

fn normalize(domain: &str) -> String {
    let d = domain.trim().trim_end_matches('.').to_ascii_lowercase();
    strip_www(&d).to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    fn t() -> CredibilityTable {
        CredibilityTable::default_seed()
    }

    #[test]
    fn known_unknown_and_fake() {
        let c = t();
        assert_eq!(c.credibility("reuters.com"), 95);
        assert_eq!(c.credibility("www.BBC.com"), 90);
        assert_eq!(c.credibility("totally-unknown.example"), 50);
        // Listed in both tables: the fake list wins.
        assert_eq!(c.credibility("infowars.com"), 0);
        assert_eq!(c.credibility("cnn.com.co"), 0);
        assert!(c.is_known_fake("www.infowars.com"));
        assert!(!c.is_known_fake("cnn.com"));
    }

    #[test]
    fn subdomain_falls_back_to_parent() {
        let c = t();
        assert_eq!(c.credibility("edition.cnn.com"), 75);
        assert_eq!(c.credibility("news.bbc.co.uk"), 90);
        // No collapse to a bare public suffix.
        assert_eq!(c.credibility("random.co.uk"), 50);
    }

    #[test]
    fn lookalikes_are_flagged() {
        let c = t();
        assert_eq!(c.lookalike_of("cnn.com.co").as_deref(), Some("cnn.com"));
        assert_eq!(c.lookalike_of("reuter.com").as_deref(), Some("reuters.com"));
        assert_eq!(c.lookalike_of("reuters.com"), None);
        assert_eq!(c.lookalike_of("example.org"), None);
    }

    #[test]
    fn overrides_extend_builtin_table() {
        let dir = tempfile::tempdir().unwrap();
        let p = dir.path().join("cred.json");
        fs::write(
            &p,
            r#"{"default_score": 40, "scores": {"Local-Gazette.com": 72}, "fake_domains": ["bogus.news"]}"#,
        )
        .unwrap();
        let c = CredibilityTable::load_with_overrides(&p);
        assert_eq!(c.credibility("local-gazette.com"), 72);
        assert_eq!(c.credibility("bogus.news"), 0);
        assert_eq!(c.credibility("unknown.example"), 40);
        assert_eq!(c.credibility("reuters.com"), 95);
    }
}
