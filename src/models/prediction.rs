use crate::error::{AppError, Result};
use crate::models::RiskTier;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Minimum raw length (after trimming) accepted before normalisation runs
pub const MIN_QUERY_CHARS: usize = 3;

/// Tolerance used when checking that a distribution sums to one
pub const PROBABILITY_TOLERANCE: f64 = 1e-6;

/// Raw symptom text for one request
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SymptomQuery {
    text: String,
}

impl SymptomQuery {
    /// Validate raw caller input
    pub fn parse(raw: &str) -> Result<Self> {
        let trimmed = raw.trim();
        if trimmed.is_empty() {
            return Err(AppError::InvalidInput(
                "Symptoms cannot be empty. Please enter your symptoms.".to_string(),
            ));
        }
        if trimmed.chars().count() < MIN_QUERY_CHARS {
            return Err(AppError::InvalidInput(
                "Please enter more descriptive symptoms.".to_string(),
            ));
        }
        Ok(Self {
            text: trimmed.to_string(),
        })
    }

    pub fn text(&self) -> &str {
        &self.text
    }
}

/// Probability per disease label; keys are kept sorted so iteration order never
/// depends on hashing.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LabelDistribution {
    probabilities: BTreeMap<String, f64>,
}

impl LabelDistribution {
    /// Build a distribution from vote counts (votes / total)
    pub fn from_votes(votes: &BTreeMap<String, usize>) -> Result<Self> {
        let total: usize = votes.values().sum();
        if total == 0 {
            return Err(AppError::Internal(
                "Cannot build a distribution from zero votes".to_string(),
            ));
        }

        let probabilities = votes
            .iter()
            .map(|(label, &count)| (label.clone(), count as f64 / total as f64))
            .collect();

        Ok(Self { probabilities })
    }

    /// Build a distribution from explicit probabilities, checking the invariants
    pub fn from_probabilities(probabilities: BTreeMap<String, f64>) -> Result<Self> {
        if probabilities.is_empty() {
            return Err(AppError::Internal("Empty label distribution".to_string()));
        }
        if let Some((label, p)) = probabilities
            .iter()
            .find(|&(_, &p)| !(0.0..=1.0).contains(&p) || p.is_nan())
        {
            return Err(AppError::Internal(format!(
                "Probability {} for '{}' is outside [0, 1]",
                p, label
            )));
        }
        let sum: f64 = probabilities.values().sum();
        if (sum - 1.0).abs() > PROBABILITY_TOLERANCE {
            return Err(AppError::Internal(format!(
                "Probabilities sum to {} instead of 1",
                sum
            )));
        }
        Ok(Self { probabilities })
    }

    /// Label with maximal probability; ties go to the lexicographically smaller label
    pub fn top(&self) -> Option<(&str, f64)> {
        let mut best: Option<(&str, f64)> = None;
        for (label, &p) in &self.probabilities {
            match best {
                Some((_, best_p)) if p <= best_p => {}
                _ => best = Some((label.as_str(), p)),
            }
        }
        best
    }

    pub fn probability(&self, label: &str) -> f64 {
        self.probabilities.get(label).copied().unwrap_or(0.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, f64)> {
        self.probabilities.iter().map(|(l, &p)| (l.as_str(), p))
    }

    pub fn len(&self) -> usize {
        self.probabilities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.probabilities.is_empty()
    }

    pub fn total(&self) -> f64 {
        self.probabilities.values().sum()
    }
}

/// Outcome of risk resolution
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PredictionResult {
    pub top_label: String,
    pub confidence: f64,
    pub risk_tier: RiskTier,
}
