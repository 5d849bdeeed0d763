/// Machine learning path for symptom classification
///
/// This module provides:
/// - Text normalisation into canonical tokens
/// - TF-IDF feature encoding over unigrams and bigrams
/// - A voting ensemble of CART decision trees
/// - Offline training on a synthetic, seeded corpus
/// - Artifact persistence and the process-wide model bundle

pub mod bundle;
pub mod classifier;
pub mod dataset;
pub mod features;
pub mod normalizer;
pub mod training;

pub use bundle::{
    initialize, loader_from_config, train_artifact, ArtifactBundleLoader, BundleHandle,
    BundleLoader, ModelArtifact, ModelBundle, TrainingBundleLoader,
};
pub use classifier::{DecisionTree, RandomForestClassifier, TreeParams};
pub use dataset::{SymptomSample, SyntheticCorpus};
pub use features::{FeatureConfig, FeatureEncoder, FeatureVector, NormMode, Vocabulary};
pub use normalizer::{NormalizedText, TextNormalizer};
pub use training::{
    ClassMetrics, ForestTrainer, ModelMetadata, ModelMetrics, TrainedModel, TrainingConfig,
};
