use crate::catalogue::Catalogue;
use crate::config::{ModelConfig, ModelSource};
use crate::error::{AppError, Result};
use crate::metrics::MODEL_READY;
use crate::ml::classifier::RandomForestClassifier;
use crate::ml::dataset::SyntheticCorpus;
use crate::ml::features::FeatureEncoder;
use crate::ml::normalizer::TextNormalizer;
use crate::ml::training::{ForestTrainer, ModelMetadata, TrainedModel, TrainingConfig};
use crate::models::{LabelDistribution, SymptomQuery};
use async_trait::async_trait;
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{error, info, warn};

/// Bumped whenever the artifact layout changes
pub const ARTIFACT_FORMAT_VERSION: u32 = 1;

/// Hex SHA-256 of artifact bytes
pub fn fingerprint(bytes: &[u8]) -> String {
    format!("{:x}", Sha256::digest(bytes))
}

/// Persisted output of training: vocabulary, forest and metadata
#[derive(Debug, Serialize, Deserialize)]
pub struct ModelArtifact {
    format_version: u32,
    pub encoder: FeatureEncoder,
    pub forest: RandomForestClassifier,
    pub metadata: ModelMetadata,
}

impl ModelArtifact {
    pub fn from_trained(model: TrainedModel) -> Self {
        Self {
            format_version: ARTIFACT_FORMAT_VERSION,
            encoder: model.encoder,
            forest: model.forest,
            metadata: model.metadata,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        Ok(bincode::serialize(self)?)
    }

    /// Decode an artifact and stamp its fingerprint into the metadata
    pub fn from_bytes(bytes: &[u8]) -> Result<Self> {
        // Structural checks on the vocabulary and forest surface as custom errors
        let mut artifact: ModelArtifact =
            bincode::deserialize(bytes).map_err(|e| match *e {
                bincode::ErrorKind::Custom(message) => AppError::Validation(message),
                other => AppError::Serialization(other.to_string()),
            })?;

        if artifact.format_version != ARTIFACT_FORMAT_VERSION {
            return Err(AppError::Serialization(format!(
                "Unsupported artifact format version {} (expected {})",
                artifact.format_version, ARTIFACT_FORMAT_VERSION
            )));
        }
        if artifact.encoder.n_features() != artifact.forest.n_features() {
            return Err(AppError::Validation(format!(
                "Vocabulary has {} terms but the forest expects {} features",
                artifact.encoder.n_features(),
                artifact.forest.n_features()
            )));
        }

        artifact.metadata.fingerprint = Some(fingerprint(bytes));
        Ok(artifact)
    }

    /// Write the artifact, returning its fingerprint
    pub fn save(&self, path: &Path) -> Result<String> {
        let bytes = self.to_bytes()?;
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }
        std::fs::write(path, &bytes)?;
        let digest = fingerprint(&bytes);
        info!(
            path = %path.display(),
            bytes = bytes.len(),
            fingerprint = %digest,
            "Saved model artifact"
        );
        Ok(digest)
    }

    pub fn load(path: &Path) -> Result<Self> {
        let bytes = std::fs::read(path)?;
        Self::from_bytes(&bytes)
    }
}

/// Read-only set of everything a prediction needs
#[derive(Debug)]
pub struct ModelBundle {
    normalizer: TextNormalizer,
    encoder: FeatureEncoder,
    forest: RandomForestClassifier,
    catalogue: Catalogue,
    metadata: ModelMetadata,
}

impl ModelBundle {
    pub fn new(artifact: ModelArtifact, catalogue: Catalogue) -> Result<Self> {
        if artifact.encoder.n_features() != artifact.forest.n_features() {
            return Err(AppError::Validation(
                "Encoder and forest disagree on feature count".to_string(),
            ));
        }

        let unmapped: Vec<&str> = artifact
            .forest
            .labels()
            .iter()
            .filter(|label| !catalogue.risk_table().contains(label))
            .map(|label| label.as_str())
            .collect();
        if !unmapped.is_empty() {
            warn!(
                count = unmapped.len(),
                labels = ?unmapped,
                "Classifier labels missing from the disease risk table"
            );
        }

        Ok(Self {
            normalizer: TextNormalizer::new(),
            encoder: artifact.encoder,
            forest: artifact.forest,
            catalogue,
            metadata: artifact.metadata,
        })
    }

    /// Normalise, encode and classify one query
    pub fn classify(&self, query: &SymptomQuery) -> Result<LabelDistribution> {
        let text = self.normalizer.normalize(query.text())?;
        let features = self.encoder.encode(&text);
        self.forest.classify(&features)
    }

    pub fn catalogue(&self) -> &Catalogue {
        &self.catalogue
    }

    pub fn metadata(&self) -> &ModelMetadata {
        &self.metadata
    }

    pub fn encoder(&self) -> &FeatureEncoder {
        &self.encoder
    }

    pub fn forest(&self) -> &RandomForestClassifier {
        &self.forest
    }

    pub fn labels(&self) -> &[String] {
        self.forest.labels()
    }

    pub fn vocabulary_size(&self) -> usize {
        self.encoder.n_features()
    }

    /// Version string with a short fingerprint suffix when known
    pub fn version(&self) -> String {
        match &self.metadata.fingerprint {
            Some(fp) => format!("{}+{}", self.metadata.version, &fp[..fp.len().min(12)]),
            None => self.metadata.version.clone(),
        }
    }
}

/// Two-state holder of the current bundle: empty until a load succeeds.
///
/// Replacement swaps the whole `Arc`, so in-flight requests keep the
/// snapshot they started with.
#[derive(Debug, Default)]
pub struct BundleHandle {
    current: RwLock<Option<Arc<ModelBundle>>>,
}

impl BundleHandle {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn ready(bundle: ModelBundle) -> Self {
        let handle = Self::new();
        handle.install(bundle);
        handle
    }

    pub fn current(&self) -> Result<Arc<ModelBundle>> {
        self.current.read().clone().ok_or_else(|| {
            AppError::ModelUnavailable(
                "The prediction model is not loaded. Please try again later.".to_string(),
            )
        })
    }

    /// Atomically replace the bundle, returning the previous one
    pub fn install(&self, bundle: ModelBundle) -> Option<Arc<ModelBundle>> {
        let previous = self.current.write().replace(Arc::new(bundle));
        MODEL_READY.set(1.0);
        previous
    }

    pub fn is_ready(&self) -> bool {
        self.current.read().is_some()
    }
}

/// Source of the model bundle at startup
#[async_trait]
pub trait BundleLoader: Send + Sync {
    async fn load_model_bundle(&self) -> Result<ModelBundle>;

    fn describe(&self) -> String;
}

/// Loads a trained artifact from disk
pub struct ArtifactBundleLoader {
    artifact_path: PathBuf,
    catalogue_path: Option<PathBuf>,
}

impl ArtifactBundleLoader {
    pub fn new(artifact_path: PathBuf, catalogue_path: Option<PathBuf>) -> Self {
        Self {
            artifact_path,
            catalogue_path,
        }
    }
}

#[async_trait]
impl BundleLoader for ArtifactBundleLoader {
    async fn load_model_bundle(&self) -> Result<ModelBundle> {
        let artifact_path = self.artifact_path.clone();
        let catalogue_path = self.catalogue_path.clone();

        tokio::task::spawn_blocking(move || {
            let artifact = ModelArtifact::load(&artifact_path)?;
            let catalogue = Catalogue::load(catalogue_path.as_deref())?;
            ModelBundle::new(artifact, catalogue)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Bundle loader task failed: {}", e)))?
    }

    fn describe(&self) -> String {
        format!("artifact:{}", self.artifact_path.display())
    }
}

/// Trains a fresh model from the catalogue's symptom phrases
pub struct TrainingBundleLoader {
    catalogue_path: Option<PathBuf>,
    config: TrainingConfig,
    save_to: Option<PathBuf>,
}

impl TrainingBundleLoader {
    pub fn new(catalogue_path: Option<PathBuf>, config: TrainingConfig) -> Self {
        Self {
            catalogue_path,
            config,
            save_to: None,
        }
    }

    /// Also persist the trained artifact
    pub fn with_output(mut self, path: PathBuf) -> Self {
        self.save_to = Some(path);
        self
    }
}

/// Train and package an artifact from a catalogue
pub fn train_artifact(catalogue: &Catalogue, config: &TrainingConfig) -> Result<ModelArtifact> {
    let samples = SyntheticCorpus::from_config(config).generate(catalogue.diseases());
    let trained = ForestTrainer::new(config.clone())?.train(&samples)?;
    // Round-trip through bytes so the fingerprint matches what would be saved
    let artifact = ModelArtifact::from_trained(trained);
    ModelArtifact::from_bytes(&artifact.to_bytes()?)
}

#[async_trait]
impl BundleLoader for TrainingBundleLoader {
    async fn load_model_bundle(&self) -> Result<ModelBundle> {
        let catalogue_path = self.catalogue_path.clone();
        let config = self.config.clone();
        let save_to = self.save_to.clone();

        tokio::task::spawn_blocking(move || {
            let catalogue = Catalogue::load(catalogue_path.as_deref())?;
            let artifact = train_artifact(&catalogue, &config)?;
            if let Some(path) = save_to {
                if let Err(e) = artifact.save(&path) {
                    warn!(path = %path.display(), error = %e, "Failed to persist trained artifact");
                }
            }
            ModelBundle::new(artifact, catalogue)
        })
        .await
        .map_err(|e| AppError::Internal(format!("Bundle loader task failed: {}", e)))?
    }

    fn describe(&self) -> String {
        format!("train:seed={}", self.config.seed)
    }
}

/// Pick the loader the configuration asks for
pub fn loader_from_config(config: &ModelConfig) -> Box<dyn BundleLoader> {
    match config.source {
        ModelSource::Artifact => Box::new(ArtifactBundleLoader::new(
            config.artifact_path.clone(),
            config.catalogue_path.clone(),
        )),
        ModelSource::Train => Box::new(
            TrainingBundleLoader::new(config.catalogue_path.clone(), config.training.clone())
                .with_output(config.artifact_path.clone()),
        ),
    }
}

/// Run the loader once; a failure leaves the handle uninitialized
pub async fn initialize(handle: &BundleHandle, loader: &dyn BundleLoader) -> bool {
    let source = loader.describe();
    match loader.load_model_bundle().await {
        Ok(bundle) => {
            info!(
                source = %source,
                version = %bundle.version(),
                labels = bundle.labels().len(),
                vocabulary = bundle.vocabulary_size(),
                "Model bundle ready"
            );
            handle.install(bundle);
            true
        }
        Err(e) => {
            error!(
                source = %source,
                error = %e,
                "Model bundle failed to load; serving in degraded mode"
            );
            MODEL_READY.set(0.0);
            false
        }
    }
}
