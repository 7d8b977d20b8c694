//! TF-IDF vectorizer with smooth idf, document-frequency pruning and L2 row norm.

use anyhow::{bail, Result};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap, HashSet};

use super::stopwords::is_stop_word;

/// Sparse row: `(feature index, value)` sorted by index.
pub type SparseVec = Vec<(usize, f64)>;

/// Lowercase word tokens of at least two alphanumeric chars.
pub fn tokenize(text: &str) -> impl Iterator<Item = String> + '_ {
    text.split(|c: char| !c.is_alphanumeric())
        .filter(|t| t.chars().count() >= 2)
        .map(|t| t.to_lowercase())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TfidfVectorizer {
    vocabulary: HashMap<String, usize>,
    idf: Vec<f64>,
    stop_words: bool,
}

impl TfidfVectorizer {
    /// Learn vocabulary and idf. Terms present in more than `max_df * n_docs`
    /// documents are dropped.
    pub fn fit<S: AsRef<str>>(docs: &[S], max_df: f64, stop_words: bool) -> Result<Self> {
        let n_docs = docs.len();
        if n_docs == 0 {
            bail!("cannot fit vectorizer on an empty corpus");
        }

        let mut df: BTreeMap<String, usize> = BTreeMap::new();
        for doc in docs {
            let seen: HashSet<String> = tokenize(doc.as_ref())
                .filter(|t| !(stop_words && is_stop_word(t)))
                .collect();
            for term in seen {
                *df.entry(term).or_insert(0) += 1;
            }
        }

        let max_doc_count = max_df.clamp(0.0, 1.0) * n_docs as f64;
        let mut vocabulary = HashMap::new();
        let mut idf = Vec::new();
        // BTreeMap keeps indices stable: alphabetical, like sklearn.
        for (term, count) in df {
            if count as f64 > max_doc_count {
                continue;
            }
            vocabulary.insert(term, idf.len());
            idf.push(((1.0 + n_docs as f64) / (1.0 + count as f64)).ln() + 1.0);
        }

        if vocabulary.is_empty() {
            bail!("empty vocabulary; documents only contain stop words or max_df is too low");
        }

        Ok(Self {
            vocabulary,
            idf,
            stop_words,
        })
    }

    pub fn n_features(&self) -> usize {
        self.idf.len()
    }

    pub fn transform(&self, text: &str) -> SparseVec {
        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for tok in tokenize(text) {
            if let Some(&ix) = self.vocabulary.get(&tok) {
                *counts.entry(ix).or_insert(0.0) += 1.0;
            }
        }

        let mut row: SparseVec = counts
            .into_iter()
            .map(|(ix, tf)| (ix, tf * self.idf[ix]))
            .collect();

        let norm = row.iter().map(|(_, v)| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            for (_, v) in row.iter_mut() {
                *v /= norm;
            }
        }
        row
    }

    pub fn stop_words(&self) -> bool {
        self.stop_words
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tokenize_lowercases_and_drops_short() {
        let toks: Vec<String> = tokenize("A Big-Deal, x 42!").collect();
        assert_eq!(toks, vec!["big", "deal", "42"]);
    }

    #[test]
    fn max_df_prunes_ubiquitous_terms() {
        let docs = ["senate passes budget", "senate rejects bill", "senate adjourns"];
        let v = TfidfVectorizer::fit(&docs, 0.7, false).unwrap();
        assert!(!v.vocabulary.contains_key("senate"));
        assert!(v.vocabulary.contains_key("budget"));
    }

    #[test]
    fn rows_are_l2_normalized() {
        let docs = ["alpha beta gamma", "delta epsilon", "alpha zeta"];
        let v = TfidfVectorizer::fit(&docs, 1.0, false).unwrap();
        let row = v.transform("alpha beta beta unknown");
        let norm: f64 = row.iter().map(|(_, x)| x * x).sum();
        assert!((norm - 1.0).abs() < 1e-9);
        assert!(v.transform("nothing known here").is_empty());
    }

    #[test]
    fn stop_words_are_removed_when_enabled() {
        let docs = ["the cat sat", "the dog ran", "a bird flew"];
        let v = TfidfVectorizer::fit(&docs, 1.0, true).unwrap();
        assert!(!v.vocabulary.contains_key("the"));
        assert!(v.vocabulary.contains_key("cat"));
    }

    #[test]
    fn empty_corpus_is_an_error() {
        let docs: [&str; 0] = [];
        assert!(TfidfVectorizer::fit(&docs, 0.7, true).is_err());
    }
}
