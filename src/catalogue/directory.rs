use crate::error::{AppError, Result};
use crate::models::{AdvisoryBundle, Practitioner, RiskTier};
use std::collections::HashMap;
use validator::Validate;

/// Advisory bundles keyed by disease and, optionally, risk tier
#[derive(Debug, Clone)]
pub struct AdvisoryCatalogue {
    by_tier: HashMap<String, HashMap<RiskTier, AdvisoryBundle>>,
    defaults: HashMap<String, AdvisoryBundle>,
    generic: AdvisoryBundle,
}

impl AdvisoryCatalogue {
    pub fn new(generic: AdvisoryBundle) -> Self {
        Self {
            by_tier: HashMap::new(),
            defaults: HashMap::new(),
            generic,
        }
    }

    /// Register a bundle; `risk = None` makes it the disease-wide default
    pub fn insert(&mut self, disease: String, risk: Option<RiskTier>, bundle: AdvisoryBundle) {
        match risk {
            Some(tier) => {
                self.by_tier.entry(disease).or_default().insert(tier, bundle);
            }
            None => {
                self.defaults.insert(disease, bundle);
            }
        }
    }

    pub fn exact(&self, disease: &str, risk: RiskTier) -> Option<&AdvisoryBundle> {
        self.by_tier.get(disease).and_then(|tiers| tiers.get(&risk))
    }

    pub fn disease_default(&self, disease: &str) -> Option<&AdvisoryBundle> {
        self.defaults.get(disease)
    }

    pub fn generic(&self) -> &AdvisoryBundle {
        &self.generic
    }

    /// Number of disease-specific bundles
    pub fn len(&self) -> usize {
        self.defaults.len() + self.by_tier.values().map(HashMap::len).sum::<usize>()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Static practitioner directory
#[derive(Debug, Clone, Default)]
pub struct PractitionerDirectory {
    practitioners: Vec<Practitioner>,
}

impl PractitionerDirectory {
    pub fn new(practitioners: Vec<Practitioner>) -> Result<Self> {
        for practitioner in &practitioners {
            practitioner.validate().map_err(|e| {
                AppError::Validation(format!(
                    "Practitioner '{}' is invalid: {}",
                    practitioner.name, e
                ))
            })?;
        }
        Ok(Self { practitioners })
    }

    pub fn all(&self) -> &[Practitioner] {
        &self.practitioners
    }

    /// Practitioners whose specialty matches, ignoring case
    pub fn by_specialty(&self, specialty: &str) -> Vec<&Practitioner> {
        self.practitioners
            .iter()
            .filter(|p| p.specialty.eq_ignore_ascii_case(specialty))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.practitioners.len()
    }

    pub fn is_empty(&self) -> bool {
        self.practitioners.is_empty()
    }
}
