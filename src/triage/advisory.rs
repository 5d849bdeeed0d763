use crate::catalogue::AdvisoryCatalogue;
use crate::models::{AdviceLevel, AdvisoryBundle, RiskTier};
use serde::Serialize;
use strum::Display;
use tracing::debug;

/// Below this confidence advice is always `high`
pub const LOW_CONFIDENCE_ADVICE: f64 = 0.30;

/// Below this confidence advice is at least `medium`
pub const MODERATE_CONFIDENCE_ADVICE: f64 = 0.50;

/// Which catalogue entry an advisory bundle came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Display)]
#[serde(rename_all = "snake_case")]
#[strum(serialize_all = "snake_case")]
pub enum AdvisorySource {
    /// Entry keyed by (disease, risk tier)
    Exact,
    /// Disease-wide entry with no risk tier
    DiseaseDefault,
    /// Catalogue-wide "consult a physician" bundle
    Generic,
}

/// Looks up and personalises advisory content
#[derive(Debug, Clone)]
pub struct AdvisorySelector<'a> {
    catalogue: &'a AdvisoryCatalogue,
    max_items: usize,
}

impl<'a> AdvisorySelector<'a> {
    pub fn new(catalogue: &'a AdvisoryCatalogue, max_items: usize) -> Self {
        Self {
            catalogue,
            max_items,
        }
    }

    /// Static bundle for `(disease, risk)`; never empty, never fails
    pub fn select(&self, disease: &str, risk: RiskTier) -> (&'a AdvisoryBundle, AdvisorySource) {
        let found = self
            .catalogue
            .exact(disease, risk)
            .filter(|b| !b.is_empty())
            .map(|b| (b, AdvisorySource::Exact))
            .or_else(|| {
                self.catalogue
                    .disease_default(disease)
                    .filter(|b| !b.is_empty())
                    .map(|b| (b, AdvisorySource::DiseaseDefault))
            });

        match found {
            Some(hit) => hit,
            None => {
                debug!(disease = %disease, risk = %risk, "No advisory entry, using generic bundle");
                (self.catalogue.generic(), AdvisorySource::Generic)
            }
        }
    }

    /// Per-response copy of the bundle for `(disease, risk)` at `confidence`
    pub fn advise(&self, disease: &str, risk: RiskTier, confidence: f64) -> AdvisoryBundle {
        let (bundle, _) = self.select(disease, risk);
        self.personalize(bundle, risk, confidence)
    }

    /// Derive the response copy of a static bundle.
    ///
    /// Sections are cut to the configured limit first; the precautions list then
    /// gets a confidence-dependent opening line and, for MEDIUM and HIGH risk, a
    /// closing line about seeing a provider.
    pub fn personalize(
        &self,
        bundle: &AdvisoryBundle,
        risk: RiskTier,
        confidence: f64,
    ) -> AdvisoryBundle {
        let mut advice = bundle.clone().truncated(self.max_items);
        advice.advice_level = advice_level(bundle.advice_level, risk, confidence);

        let mut precautions = Vec::with_capacity(advice.precautions.len() + 2);
        precautions.push(opening_line(confidence));
        precautions.append(&mut advice.precautions);
        if let Some(line) = risk_line(risk) {
            precautions.push(line.to_string());
        }
        advice.precautions = precautions;
        advice
    }
}

/// Advice level for a response
pub fn advice_level(static_level: AdviceLevel, risk: RiskTier, confidence: f64) -> AdviceLevel {
    if risk == RiskTier::High || confidence < LOW_CONFIDENCE_ADVICE {
        AdviceLevel::High
    } else if risk == RiskTier::Medium || confidence < MODERATE_CONFIDENCE_ADVICE {
        AdviceLevel::Medium
    } else {
        static_level
    }
}

fn opening_line(confidence: f64) -> String {
    let percent = (confidence * 100.0).floor() as u32;
    if confidence < LOW_CONFIDENCE_ADVICE {
        format!(
            "The prediction confidence is low ({}%). These suggestions are general guidelines. \
             Please consult a healthcare professional for an accurate assessment.",
            percent
        )
    } else if confidence < MODERATE_CONFIDENCE_ADVICE {
        format!(
            "Based on your symptoms, here are some helpful suggestions. The prediction \
             confidence is moderate ({}%), so professional consultation is recommended.",
            percent
        )
    } else {
        "Based on your symptoms analysis, here are personalized suggestions to help you feel better."
            .to_string()
    }
}

fn risk_line(risk: RiskTier) -> Option<&'static str> {
    match risk {
        RiskTier::High => Some(
            "Given the risk assessment, we strongly recommend consulting a healthcare provider \
             as soon as possible.",
        ),
        RiskTier::Medium => Some(
            "If symptoms persist or worsen, consider scheduling a consultation with a \
             healthcare provider.",
        ),
        RiskTier::Low => None,
    }
}
