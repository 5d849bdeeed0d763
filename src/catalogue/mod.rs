//! Static lookup tables: disease risk, advisory content, specialty mapping and
//! the practitioner directory. Parsed once from TOML and read-only afterwards.

mod directory;
mod tables;

pub use directory::{AdvisoryCatalogue, PractitionerDirectory};
pub use tables::{DiseaseRiskTable, SpecialtyMap};

use crate::error::{AppError, Result};
use crate::models::{AdviceLevel, AdvisoryBundle, Practitioner, RiskTier};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;
use tracing::info;

const BUILTIN_CATALOGUE: &str = include_str!("../../data/catalogue.toml");

/// Everything the catalogue knows about one disease
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DiseaseProfile {
    pub name: String,
    pub base_risk: RiskTier,

    /// Acceptable specialties, most relevant first
    #[serde(default)]
    pub specialties: Vec<String>,

    /// Symptom phrases used by the synthetic corpus
    #[serde(default)]
    pub symptoms: Vec<String>,
}

/// Advisory content as written in the catalogue file
#[derive(Debug, Clone, Deserialize)]
struct AdvisoryEntry {
    #[serde(default)]
    disease: Option<String>,
    #[serde(default)]
    risk: Option<RiskTier>,
    advice_level: AdviceLevel,
    #[serde(default)]
    precautions: Vec<String>,
    #[serde(default)]
    dos: Vec<String>,
    #[serde(default)]
    donts: Vec<String>,
    #[serde(default)]
    consult_when: Vec<String>,
}

impl AdvisoryEntry {
    fn into_bundle(self, disclaimer: &str) -> AdvisoryBundle {
        AdvisoryBundle {
            advice_level: self.advice_level,
            precautions: self.precautions,
            dos: self.dos,
            donts: self.donts,
            consult_when: self.consult_when,
            disclaimer: disclaimer.to_string(),
        }
    }
}

#[derive(Debug, Deserialize)]
struct CatalogueFile {
    disclaimer: String,
    #[serde(default)]
    generalists: Vec<String>,
    #[serde(default)]
    default_specialties: Vec<String>,
    generic: AdvisoryEntry,
    #[serde(default, rename = "disease")]
    diseases: Vec<DiseaseProfile>,
    #[serde(default, rename = "advisory")]
    advisories: Vec<AdvisoryEntry>,
    #[serde(default, rename = "practitioner")]
    practitioners: Vec<Practitioner>,
}

/// Immutable set of static tables
#[derive(Debug, Clone)]
pub struct Catalogue {
    diseases: Vec<DiseaseProfile>,
    risk_table: DiseaseRiskTable,
    advisory: AdvisoryCatalogue,
    specialties: SpecialtyMap,
    directory: PractitionerDirectory,
    disclaimer: String,
}

impl Catalogue {
    /// Catalogue compiled into the binary
    pub fn builtin() -> Result<Self> {
        Self::from_toml_str(BUILTIN_CATALOGUE)
    }

    /// Read a catalogue file from disk
    pub fn from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let catalogue = Self::from_toml_str(&content)?;
        info!(path = %path.display(), diseases = catalogue.diseases.len(), "Loaded catalogue");
        Ok(catalogue)
    }

    /// Use `path` when given, otherwise the built-in catalogue
    pub fn load(path: Option<&Path>) -> Result<Self> {
        match path {
            Some(p) => Self::from_path(p),
            None => Self::builtin(),
        }
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        let file: CatalogueFile = toml::from_str(content)?;
        Self::build(file)
    }

    fn build(file: CatalogueFile) -> Result<Self> {
        let mut seen = HashSet::new();
        for disease in &file.diseases {
            if !seen.insert(disease.name.as_str()) {
                return Err(AppError::Validation(format!(
                    "Disease '{}' is listed more than once",
                    disease.name
                )));
            }
        }

        let generic = file.generic.into_bundle(&file.disclaimer);
        if generic.is_empty() {
            return Err(AppError::Validation(
                "Generic advisory bundle must not be empty".to_string(),
            ));
        }

        let mut advisory = AdvisoryCatalogue::new(generic);
        for entry in file.advisories {
            let disease = entry.disease.clone().ok_or_else(|| {
                AppError::Validation("Advisory entry is missing its disease".to_string())
            })?;
            let risk = entry.risk;
            advisory.insert(disease, risk, entry.into_bundle(&file.disclaimer));
        }

        let risk_table = DiseaseRiskTable::new(
            file.diseases
                .iter()
                .map(|d| (d.name.clone(), d.base_risk)),
        );

        let default_specialties = if file.default_specialties.is_empty() {
            file.generalists.clone()
        } else {
            file.default_specialties
        };
        let specialties = SpecialtyMap::new(
            file.diseases
                .iter()
                .filter(|d| !d.specialties.is_empty())
                .map(|d| (d.name.clone(), d.specialties.clone())),
            default_specialties,
            file.generalists,
        );

        let directory = PractitionerDirectory::new(file.practitioners)?;

        Ok(Self {
            diseases: file.diseases,
            risk_table,
            advisory,
            specialties,
            directory,
            disclaimer: file.disclaimer,
        })
    }

    pub fn diseases(&self) -> &[DiseaseProfile] {
        &self.diseases
    }

    pub fn risk_table(&self) -> &DiseaseRiskTable {
        &self.risk_table
    }

    pub fn advisory(&self) -> &AdvisoryCatalogue {
        &self.advisory
    }

    pub fn specialties(&self) -> &SpecialtyMap {
        &self.specialties
    }

    pub fn directory(&self) -> &PractitionerDirectory {
        &self.directory
    }

    pub fn disclaimer(&self) -> &str {
        &self.disclaimer
    }
}
