//! Lexicon polarity in `[-1.0, 1.0]`.
//!
//! Mean of the lexicon scores of the words that have one. A negator within
//! the previous 1..=3 tokens flips and halves a word's score; an intensifier
//! right before a word scales it by 1.3.

use once_cell::sync::Lazy;
use std::collections::HashMap;

static LEXICON: Lazy<HashMap<String, f64>> = Lazy::new(|| {
    let raw = include_str!("../../assets/polarity_lexicon.json");
    serde_json::from_str::<HashMap<String, f64>>(raw).unwrap_or_default()
});

const NEGATION_FACTOR: f64 = -0.5;
const INTENSIFIER_FACTOR: f64 = 1.3;

pub fn polarity(text: &str) -> f64 {
    let tokens: Vec<String> = tokenize(text).collect();
    let mut sum = 0.0;
    let mut hits = 0usize;

    for i in 0..tokens.len() {
        let Some(&base) = LEXICON.get(tokens[i].as_str()) else {
            continue;
        };

        let negated = (1..=3).any(|k| i >= k && is_negator(tokens[i - k].as_str()));
        let intensified = i >= 1 && is_intensifier(tokens[i - 1].as_str());

        let mut s = base;
        if intensified {
            s *= INTENSIFIER_FACTOR;
        }
        if negated {
            s *= NEGATION_FACTOR;
        }
        sum += s.clamp(-1.0, 1.0);
        hits += 1;
    }

    if hits == 0 {
        return 0.0;
    }
    (sum / hits as f64).clamp(-1.0, 1.0)
}

/// Lowercase tokens; apostrophes stay inside words so "won't" survives.
fn tokenize(s: &str) -> impl Iterator<Item = String> + '_ {
    s.split(|c: char| !(c.is_alphanumeric() || c == '\''))
        .map(|t| t.trim_matches('\''))
        .filter(|t| !t.is_empty())
        .map(|t| t.to_lowercase())
}

fn is_negator(tok: &str) -> bool {
    matches!(
        tok,
        "not"
            | "no"
            | "never"
            | "isn't"
            | "wasn't"
            | "aren't"
            | "won't"
            | "can't"
            | "cannot"
            | "don't"
            | "doesn't"
            | "didn't"
            | "without"
    )
}

fn is_intensifier(tok: &str) -> bool {
    matches!(
        tok,
        "very" | "extremely" | "really" | "highly" | "incredibly" | "totally"
    )
}
