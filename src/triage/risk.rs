use crate::catalogue::DiseaseRiskTable;
use crate::error::{AppError, Result};
use crate::metrics::UNKNOWN_LABEL_WARNINGS_TOTAL;
use crate::models::{LabelDistribution, PredictionResult, RiskTier};
use tracing::warn;

/// At or above this confidence the disease's own base risk is reported
pub const BASE_RISK_THRESHOLD: f64 = 0.70;

/// At or above this confidence (and below the base threshold) risk is forced to MEDIUM
pub const MEDIUM_RISK_FLOOR: f64 = 0.40;

/// Tier used when the predicted label has no risk table entry
pub const UNKNOWN_LABEL_RISK: RiskTier = RiskTier::High;

const MODERATE_CONFIDENCE_MESSAGE: &str =
    "Prediction confidence is moderate. Consider consulting a doctor.";
const LOW_CONFIDENCE_MESSAGE: &str =
    "Low confidence prediction. Please consult a doctor for accurate diagnosis.";

/// The classifier produced a label the risk table does not know about
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownLabelWarning {
    pub label: String,
}

/// Outcome of risk resolution for one distribution
#[derive(Debug, Clone, PartialEq)]
pub struct RiskAssessment {
    pub result: PredictionResult,
    pub message: &'static str,
    pub warning: Option<UnknownLabelWarning>,
}

/// User-facing message for a given raw confidence
pub fn risk_message(confidence: f64) -> &'static str {
    if confidence >= BASE_RISK_THRESHOLD {
        ""
    } else if confidence >= MEDIUM_RISK_FLOOR {
        MODERATE_CONFIDENCE_MESSAGE
    } else {
        LOW_CONFIDENCE_MESSAGE
    }
}

/// Turns a label distribution into a prediction with a risk tier
pub struct RiskResolver<'a> {
    table: &'a DiseaseRiskTable,
}

impl<'a> RiskResolver<'a> {
    pub fn new(table: &'a DiseaseRiskTable) -> Self {
        Self { table }
    }

    /// Resolve the top label, its confidence and the reported tier.
    ///
    /// Low-confidence predictions never report the table's tier: below
    /// [`MEDIUM_RISK_FLOOR`] the result is HIGH, below [`BASE_RISK_THRESHOLD`]
    /// it is MEDIUM. A label missing from the table is not fatal; it is
    /// reported as [`UNKNOWN_LABEL_RISK`] and flagged on the assessment.
    pub fn resolve(&self, distribution: &LabelDistribution) -> Result<RiskAssessment> {
        let (label, confidence) = distribution
            .top()
            .ok_or_else(|| AppError::Internal("Classifier returned no labels".to_string()))?;

        let warning = if self.table.contains(label) {
            None
        } else {
            UNKNOWN_LABEL_WARNINGS_TOTAL.inc();
            warn!(label = %label, "Predicted label has no risk table entry, defaulting to HIGH");
            Some(UnknownLabelWarning {
                label: label.to_string(),
            })
        };

        let risk_tier = if confidence >= BASE_RISK_THRESHOLD {
            self.table.get(label).unwrap_or(UNKNOWN_LABEL_RISK)
        } else if confidence >= MEDIUM_RISK_FLOOR {
            RiskTier::Medium
        } else {
            RiskTier::High
        };

        Ok(RiskAssessment {
            result: PredictionResult {
                top_label: label.to_string(),
                confidence,
                risk_tier,
            },
            message: risk_message(confidence),
            warning,
        })
    }
}
