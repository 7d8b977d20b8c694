//! Word/sentence/syllable counts and Flesch reading ease.

use once_cell::sync::OnceCell;
use regex::Regex;

pub fn word_count(text: &str) -> usize {
    text.split_whitespace().count()
}

/// Runs of `.`, `!`, `?` end a sentence; non-empty text has at least one.
pub fn sentence_count(text: &str) -> usize {
    static RE: OnceCell<Regex> = OnceCell::new();
    let re = RE.get_or_init(|| Regex::new(r"[.!?]+").expect("static regex"));
    let n = re
        .split(text)
        .filter(|s| s.chars().any(|c| c.is_alphanumeric()))
        .count();
    if n == 0 && !text.trim().is_empty() {
        1
    } else {
        n
    }
}

/// Vowel-group heuristic with silent trailing `e`; every word has >= 1.
pub fn syllables(word: &str) -> usize {
    let w: Vec<char> = word
        .chars()
        .filter(|c| c.is_ascii_alphabetic())
        .map(|c| c.to_ascii_lowercase())
        .collect();
    if w.is_empty() {
        return 0;
    }

    let is_vowel = |c: char| matches!(c, 'a' | 'e' | 'i' | 'o' | 'u' | 'y');
    let mut count = 0;
    let mut prev_vowel = false;
    for &c in &w {
        let v = is_vowel(c);
        if v && !prev_vowel {
            count += 1;
        }
        prev_vowel = v;
    }

    let n = w.len();
    if n > 2 && w[n - 1] == 'e' && !is_vowel(w[n - 2]) && !(w[n - 2] == 'l' && !is_vowel(w[n - 3]))
    {
        count -= 1;
    }
    count.max(1)
}

/// `206.835 - 1.015 * (words / sentences) - 84.6 * (syllables / words)`.
/// Empty text scores 0.
pub fn flesch_reading_ease(text: &str) -> f64 {
    let words: Vec<&str> = text.split_whitespace().collect();
    if words.is_empty() {
        return 0.0;
    }
    let sentences = sentence_count(text).max(1) as f64;
    let syl: usize = words.iter().map(|w| syllables(w)).sum();
    let n = words.len() as f64;
    206.835 - 1.015 * (n / sentences) - 84.6 * (syl as f64 / n)
}
