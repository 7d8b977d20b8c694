//! Trust scoring: text heuristics, lexicon polarity, configurable weights.

pub mod polarity;
pub mod readability;
pub mod trust;
pub mod weights;

pub use trust::{
    adjust_for_source, assess, TrustAssessment, TrustDetails, TrustFactors, TrustLevel,
};
pub use weights::{HotReloadWeights, TrustWeights};

use serde::{Deserialize, Serialize};

use crate::classifier::Label;

/// Body of `POST /trust-score`; also what the pipeline consumer publishes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrustScoreResponse {
    pub score: i64,
    pub trust_level: TrustLevel,
    pub prediction: Label,
    pub factors: TrustFactors,
    pub details: TrustDetails,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub analysis_id: Option<String>,
}

impl TrustScoreResponse {
    pub fn new(assessment: TrustAssessment, prediction: Label) -> Self {
        Self {
            score: assessment.score,
            trust_level: assessment.trust_level,
            prediction,
            factors: assessment.factors,
            details: assessment.details,
            analysis_id: None,
        }
    }
}
