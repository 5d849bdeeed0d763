use crate::models::RiskTier;
use std::collections::{HashMap, HashSet};

/// Disease → base risk tier
#[derive(Debug, Clone, Default)]
pub struct DiseaseRiskTable {
    tiers: HashMap<String, RiskTier>,
}

impl DiseaseRiskTable {
    pub fn new(entries: impl IntoIterator<Item = (String, RiskTier)>) -> Self {
        Self {
            tiers: entries.into_iter().collect(),
        }
    }

    pub fn get(&self, disease: &str) -> Option<RiskTier> {
        self.tiers.get(disease).copied()
    }

    pub fn contains(&self, disease: &str) -> bool {
        self.tiers.contains_key(disease)
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }
}

/// Disease → ordered list of acceptable specialties.
///
/// Generalist lookups ignore ASCII case, the same way the practitioner
/// directory matches specialties.
#[derive(Debug, Clone, Default)]
pub struct SpecialtyMap {
    by_disease: HashMap<String, Vec<String>>,
    default_specialties: Vec<String>,
    generalists: HashSet<String>,
}

impl SpecialtyMap {
    pub fn new(
        entries: impl IntoIterator<Item = (String, Vec<String>)>,
        default_specialties: Vec<String>,
        generalists: impl IntoIterator<Item = String>,
    ) -> Self {
        Self {
            by_disease: entries.into_iter().collect(),
            default_specialties,
            generalists: generalists
                .into_iter()
                .map(|s| s.to_ascii_lowercase())
                .collect(),
        }
    }

    /// Specialties for `disease`, most relevant first; unmapped diseases get the defaults
    pub fn specialties_for(&self, disease: &str) -> &[String] {
        self.by_disease
            .get(disease)
            .map(Vec::as_slice)
            .unwrap_or(self.default_specialties.as_slice())
    }

    pub fn has_mapping(&self, disease: &str) -> bool {
        self.by_disease.contains_key(disease)
    }

    pub fn is_generalist(&self, specialty: &str) -> bool {
        self.generalists.contains(&specialty.to_ascii_lowercase())
    }
}
