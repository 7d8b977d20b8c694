//! Four-factor trust score.
//!
//! Each factor is a 0..=100 heuristic; the score is their weighted mean,
//! rounded and clamped. Fully deterministic for a given text and prediction.

use once_cell::sync::OnceCell;
use regex::Regex;
use serde::{Deserialize, Serialize};

use super::polarity::polarity;
use super::readability::{flesch_reading_ease, word_count};
use super::weights::TrustWeights;
use crate::classifier::Prediction;

const SENSATIONAL_PHRASES: &[&str] = &[
    "shocking",
    "amazing",
    "unbelievable",
    "secret",
    "conspiracy",
    "miracle",
    "incredible",
    "never seen before",
    "won't believe",
];

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum TrustLevel {
    #[serde(rename = "High Trust")]
    High,
    #[serde(rename = "Medium Trust")]
    Medium,
    #[serde(rename = "Low Trust")]
    Low,
}

impl TrustLevel {
    pub fn from_score(score: i64) -> Self {
        if score >= 70 {
            TrustLevel::High
        } else if score >= 50 {
            TrustLevel::Medium
        } else {
            TrustLevel::Low
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TrustLevel::High => "High Trust",
            TrustLevel::Medium => "Medium Trust",
            TrustLevel::Low => "Low Trust",
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrustFactors {
    pub source_credibility: i64,
    pub content_analysis: i64,
    pub language_analysis: i64,
    pub fact_verification: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustDetails {
    pub word_count: usize,
    pub has_citations: u8,
    pub sensationalism_level: usize,
    pub readability_score: f64,
    pub sentiment_polarity: f64,
    pub prediction_confidence: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TrustAssessment {
    pub score: i64,
    pub trust_level: TrustLevel,
    pub factors: TrustFactors,
    pub details: TrustDetails,
}

fn citation_re() -> &'static Regex {
    static RE: OnceCell<Regex> = OnceCell::new();
    RE.get_or_init(|| {
        Regex::new(r"according to|reported by|cited|source|reference").expect("static regex")
    })
}

pub fn sensationalism_level(lower: &str) -> usize {
    SENSATIONAL_PHRASES
        .iter()
        .filter(|p| lower.contains(*p))
        .count()
}

fn round_to(x: f64, places: i32) -> f64 {
    let m = 10f64.powi(places);
    (x * m).round() / m
}

fn clamp100(x: f64) -> f64 {
    x.clamp(0.0, 100.0)
}

/// Weighted mean of factor values, rounded and clamped to 0..=100.
pub fn weighted_score(factors: [f64; 4], weights: &TrustWeights) -> i64 {
    let w = if weights.is_valid() {
        *weights
    } else {
        TrustWeights::default()
    };
    let sum = factors[0] * w.source_credibility
        + factors[1] * w.content_analysis
        + factors[2] * w.language_analysis
        + factors[3] * w.fact_verification;
    clamp100((sum / w.total()).round()) as i64
}

pub fn assess(text: &str, prediction: &Prediction, weights: &TrustWeights) -> TrustAssessment {
    let lower = text.to_lowercase();

    let has_citations = citation_re().is_match(&lower);
    let source_credibility = clamp100(65.0 + if has_citations { 15.0 } else { 0.0 });

    let words = word_count(&lower);
    let readability = flesch_reading_ease(&lower);
    let readability_norm = readability.clamp(0.0, 100.0);
    let content_analysis =
        clamp100(((40.0 + words as f64 / 20.0 + readability_norm / 5.0) / 3.0 * 100.0).min(85.0));

    let sensational = sensationalism_level(&lower);
    let abs_polarity = polarity(&lower).abs();
    let language_analysis =
        clamp100((80.0 - sensational as f64 * 10.0 - abs_polarity * 20.0).max(30.0));

    let fact_verification = clamp100(50.0 + prediction.confidence * 40.0);

    let factor_values = [
        source_credibility,
        content_analysis,
        language_analysis,
        fact_verification,
    ];
    let score = weighted_score(factor_values, weights);

    TrustAssessment {
        score,
        trust_level: TrustLevel::from_score(score),
        factors: TrustFactors {
            source_credibility: source_credibility as i64,
            content_analysis: content_analysis as i64,
            language_analysis: language_analysis as i64,
            fact_verification: fact_verification as i64,
        },
        details: TrustDetails {
            word_count: words,
            has_citations: u8::from(has_citations),
            sensationalism_level: sensational,
            readability_score: round_to(readability, 1),
            sentiment_polarity: round_to(abs_polarity, 2),
            prediction_confidence: round_to(prediction.confidence, 2),
        },
    }
}

/// Source-aware adjustment used for URL analysis: known fake sources lose 30
/// points, highly credible ones (> 80) gain 10.
pub fn adjust_for_source(score: i64, credibility: u8, known_fake: bool) -> i64 {
    let mut s = score;
    if known_fake {
        s = (s - 30).max(0);
    }
    if credibility > 80 {
        s = (s + 10).min(100);
    }
    s.clamp(0, 100)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classifier::Label;

    fn pred(confidence: f64) -> Prediction {
        Prediction {
            label: Label::Real,
            confidence,
            p_real: confidence,
        }
    }

    #[test]
    fn level_boundaries() {
        assert_eq!(TrustLevel::from_score(70), TrustLevel::High);
        assert_eq!(TrustLevel::from_score(69), TrustLevel::Medium);
        assert_eq!(TrustLevel::from_score(50), TrustLevel::Medium);
        assert_eq!(TrustLevel::from_score(49), TrustLevel::Low);
        assert_eq!(
            serde_json::to_string(&TrustLevel::Medium).unwrap(),
            "\"Medium Trust\""
        );
    }

    #[test]
    fn equal_factors_give_that_value() {
        let w = TrustWeights::default();
        assert_eq!(weighted_score([64.0; 4], &w), 64);
        let skewed = TrustWeights {
            source_credibility: 5.0,
            content_analysis: 0.1,
            language_analysis: 2.0,
            fact_verification: 0.7,
        };
        assert_eq!(weighted_score([42.0; 4], &skewed), 42);
    }

    #[test]
    fn default_weighting_is_30_25_25_20() {
        let w = TrustWeights::default();
        // 100*.3 + 0*.25 + 0*.25 + 0*.2 = 30
        assert_eq!(weighted_score([100.0, 0.0, 0.0, 0.0], &w), 30);
        assert_eq!(weighted_score([0.0, 0.0, 0.0, 100.0], &w), 20);
    }

    #[test]
    fn citations_and_sensationalism_move_factors() {
        let w = TrustWeights::default();
        let cited = assess(
            "According to officials, the report was published on Monday.",
            &pred(0.9),
            &w,
        );
        assert_eq!(cited.details.has_citations, 1);
        assert_eq!(cited.factors.source_credibility, 80);

        let hype = assess(
            "Shocking secret miracle! You won't believe this unbelievable conspiracy.",
            &pred(0.9),
            &w,
        );
        assert_eq!(hype.details.has_citations, 0);
        assert_eq!(hype.factors.source_credibility, 65);
        assert!(hype.details.sensationalism_level >= 5);
        assert_eq!(hype.factors.language_analysis, 30);
    }

    #[test]
    fn fact_verification_tracks_confidence() {
        let w = TrustWeights::default();
        let a = assess("Plain statement.", &pred(0.5), &w);
        let b = assess("Plain statement.", &pred(1.0), &w);
        assert_eq!(a.factors.fact_verification, 70);
        assert_eq!(b.factors.fact_verification, 90);
        assert!(b.score >= a.score);
    }

    #[test]
    fn everything_stays_in_range() {
        let w = TrustWeights::default();
        let long = "word ".repeat(5000);
        for text in ["", "!!!", long.as_str(), "a b c d e f g h"] {
            for c in [0.0, 0.5, 1.0] {
                let t = assess(text, &pred(c), &w);
                assert!((0..=100).contains(&t.score));
                for f in [
                    t.factors.source_credibility,
                    t.factors.content_analysis,
                    t.factors.language_analysis,
                    t.factors.fact_verification,
                ] {
                    assert!((0..=100).contains(&f));
                }
            }
        }
    }

    #[test]
    fn source_adjustment() {
        assert_eq!(adjust_for_source(50, 0, true), 20);
        assert_eq!(adjust_for_source(20, 0, true), 0);
        assert_eq!(adjust_for_source(95, 90, false), 100);
        assert_eq!(adjust_for_source(60, 80, false), 60);
    }
}
