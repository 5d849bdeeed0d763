use crate::error::{AppError, Result};
use crate::ml::classifier::{DecisionTree, RandomForestClassifier, TreeParams};
use crate::ml::dataset::SymptomSample;
use crate::ml::features::{FeatureConfig, FeatureEncoder, NormMode};
use crate::ml::normalizer::{NormalizedText, TextNormalizer};
use chrono::{DateTime, Utc};
use ndarray::{Array2, Axis};
use rand::rngs::StdRng;
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use tracing::{debug, info};

/// Offline training configuration
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrainingConfig {
    /// Synthetic samples generated per disease
    #[serde(default = "default_samples_per_disease")]
    pub samples_per_disease: usize,

    #[serde(default = "default_min_symptoms")]
    pub min_symptoms: usize,

    #[serde(default = "default_max_symptoms")]
    pub max_symptoms: usize,

    /// Fraction of each class held out for evaluation
    #[serde(default = "default_test_fraction")]
    pub test_fraction: f64,

    #[serde(default = "default_max_features")]
    pub max_features: usize,

    #[serde(default = "default_n_trees")]
    pub n_trees: usize,

    #[serde(default = "default_max_depth")]
    pub max_depth: usize,

    #[serde(default = "default_min_samples_split")]
    pub min_samples_split: usize,

    #[serde(default = "default_seed")]
    pub seed: u64,
}

impl Default for TrainingConfig {
    fn default() -> Self {
        Self {
            samples_per_disease: default_samples_per_disease(),
            min_symptoms: default_min_symptoms(),
            max_symptoms: default_max_symptoms(),
            test_fraction: default_test_fraction(),
            max_features: default_max_features(),
            n_trees: default_n_trees(),
            max_depth: default_max_depth(),
            min_samples_split: default_min_samples_split(),
            seed: default_seed(),
        }
    }
}

impl TrainingConfig {
    pub fn feature_config(&self) -> FeatureConfig {
        FeatureConfig {
            max_features: self.max_features,
            ngram_range: (1, 2),
            norm: NormMode::L2,
        }
    }

    pub fn validate(&self) -> Result<()> {
        if self.n_trees == 0 {
            return Err(AppError::Configuration("n_trees must be at least 1".to_string()));
        }
        if self.max_depth == 0 {
            return Err(AppError::Configuration("max_depth must be at least 1".to_string()));
        }
        if self.min_samples_split < 2 {
            return Err(AppError::Configuration(
                "min_samples_split must be at least 2".to_string(),
            ));
        }
        if !(0.0..1.0).contains(&self.test_fraction) {
            return Err(AppError::Configuration(format!(
                "test_fraction {} must lie in [0, 1)",
                self.test_fraction
            )));
        }
        if self.min_symptoms == 0 || self.min_symptoms > self.max_symptoms {
            return Err(AppError::Configuration(format!(
                "Invalid symptom range {}..={}",
                self.min_symptoms, self.max_symptoms
            )));
        }
        Ok(())
    }

    fn hyperparameters(&self) -> BTreeMap<String, String> {
        [
            ("n_trees", self.n_trees.to_string()),
            ("max_depth", self.max_depth.to_string()),
            ("min_samples_split", self.min_samples_split.to_string()),
            ("max_features", self.max_features.to_string()),
            ("ngram_range", "(1, 2)".to_string()),
            ("test_fraction", self.test_fraction.to_string()),
            ("seed", self.seed.to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect()
    }
}

fn default_samples_per_disease() -> usize {
    20
}

fn default_min_symptoms() -> usize {
    3
}

fn default_max_symptoms() -> usize {
    6
}

fn default_test_fraction() -> f64 {
    0.2
}

fn default_max_features() -> usize {
    500
}

fn default_n_trees() -> usize {
    100
}

fn default_max_depth() -> usize {
    20
}

fn default_min_samples_split() -> usize {
    5
}

fn default_seed() -> u64 {
    42
}

/// Model evaluation metrics
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ModelMetrics {
    /// Accuracy
    pub accuracy: f64,

    /// Macro-averaged precision
    pub precision: f64,

    /// Macro-averaged recall
    pub recall: f64,

    /// Macro-averaged F1 score
    pub f1_score: f64,

    /// Per-class metrics
    pub per_class_metrics: BTreeMap<String, ClassMetrics>,
}

/// Per-class evaluation metrics
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ClassMetrics {
    pub precision: f64,
    pub recall: f64,
    pub f1_score: f64,
    pub support: usize,
}

impl ModelMetrics {
    /// Compute accuracy and macro metrics from label indices
    pub fn calculate(y_true: &[usize], y_pred: &[usize], labels: &[String]) -> Self {
        let n_samples = y_true.len();
        if n_samples == 0 || labels.is_empty() {
            return Self::default();
        }

        let correct = y_true
            .iter()
            .zip(y_pred.iter())
            .filter(|(t, p)| t == p)
            .count();
        let accuracy = correct as f64 / n_samples as f64;

        let mut per_class = BTreeMap::new();
        for (class_idx, label) in labels.iter().enumerate() {
            let tp = y_true
                .iter()
                .zip(y_pred.iter())
                .filter(|(t, p)| **t == class_idx && **p == class_idx)
                .count();
            let fp = y_true
                .iter()
                .zip(y_pred.iter())
                .filter(|(t, p)| **p == class_idx && **t != class_idx)
                .count();
            let fn_count = y_true
                .iter()
                .zip(y_pred.iter())
                .filter(|(t, p)| **t == class_idx && **p != class_idx)
                .count();

            let precision = if tp + fp > 0 {
                tp as f64 / (tp + fp) as f64
            } else {
                0.0
            };
            let recall = if tp + fn_count > 0 {
                tp as f64 / (tp + fn_count) as f64
            } else {
                0.0
            };
            let f1 = if precision + recall > 0.0 {
                2.0 * precision * recall / (precision + recall)
            } else {
                0.0
            };
            let support = y_true.iter().filter(|&&t| t == class_idx).count();

            per_class.insert(
                label.clone(),
                ClassMetrics {
                    precision,
                    recall,
                    f1_score: f1,
                    support,
                },
            );
        }

        let n_classes = labels.len() as f64;
        let precision = per_class.values().map(|m| m.precision).sum::<f64>() / n_classes;
        let recall = per_class.values().map(|m| m.recall).sum::<f64>() / n_classes;
        let f1_score = per_class.values().map(|m| m.f1_score).sum::<f64>() / n_classes;

        Self {
            accuracy,
            precision,
            recall,
            f1_score,
            per_class_metrics: per_class,
        }
    }
}

/// Model metadata
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelMetadata {
    /// Model name
    pub name: String,

    /// Model version
    pub version: String,

    /// Training timestamp
    pub trained_at: DateTime<Utc>,

    pub n_training_samples: usize,
    pub n_test_samples: usize,
    pub n_features: usize,
    pub n_labels: usize,

    /// Held-out metrics, absent when no samples were held out
    pub validation_metrics: Option<ModelMetrics>,

    /// Hyperparameters
    pub hyperparameters: BTreeMap<String, String>,

    /// SHA-256 of the artifact bytes, filled in on load
    #[serde(skip)]
    pub fingerprint: Option<String>,
}

/// Output of a training run
#[derive(Debug)]
pub struct TrainedModel {
    pub encoder: FeatureEncoder,
    pub forest: RandomForestClassifier,
    pub metadata: ModelMetadata,
}

/// Stratified split: each label contributes `round(n × test_fraction)` samples to the test set
pub fn stratified_split(
    samples: &[SymptomSample],
    test_fraction: f64,
    seed: u64,
) -> (Vec<SymptomSample>, Vec<SymptomSample>) {
    let mut by_label: BTreeMap<&str, Vec<&SymptomSample>> = BTreeMap::new();
    for sample in samples {
        by_label.entry(sample.label.as_str()).or_default().push(sample);
    }

    let mut rng = StdRng::seed_from_u64(seed);
    let mut train = Vec::new();
    let mut test = Vec::new();

    for (_, mut group) in by_label {
        group.shuffle(&mut rng);
        let mut n_test = (group.len() as f64 * test_fraction).round() as usize;
        // Keep at least one training sample per label
        if n_test >= group.len() {
            n_test = group.len().saturating_sub(1);
        }
        test.extend(group[..n_test].iter().map(|s| (*s).clone()));
        train.extend(group[n_test..].iter().map(|s| (*s).clone()));
    }

    (train, test)
}

/// Forest trainer
pub struct ForestTrainer {
    config: TrainingConfig,
    normalizer: TextNormalizer,
}

impl ForestTrainer {
    pub fn new(config: TrainingConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            normalizer: TextNormalizer::new(),
        })
    }

    pub fn config(&self) -> &TrainingConfig {
        &self.config
    }

    /// Split, fit the vocabulary and forest, then evaluate on the held-out part
    pub fn train(&self, samples: &[SymptomSample]) -> Result<TrainedModel> {
        if samples.is_empty() {
            return Err(AppError::Validation("Training corpus is empty".to_string()));
        }

        let labels: Vec<String> = samples
            .iter()
            .map(|s| s.label.clone())
            .collect::<BTreeSet<_>>()
            .into_iter()
            .collect();
        if labels.len() < 2 {
            return Err(AppError::Validation(format!(
                "Training corpus needs at least two labels, found {}",
                labels.len()
            )));
        }
        let label_index: BTreeMap<&str, usize> = labels
            .iter()
            .enumerate()
            .map(|(i, l)| (l.as_str(), i))
            .collect();

        let (train, test) = stratified_split(samples, self.config.test_fraction, self.config.seed);
        info!(
            train = train.len(),
            test = test.len(),
            labels = labels.len(),
            "Training symptom classifier"
        );

        let (train_docs, train_y) = self.prepare(&train, &label_index)?;
        let encoder = FeatureEncoder::fit(&train_docs, &self.config.feature_config())?;
        let x = encoder.encode_batch(&train_docs);

        let trees = fit_forest(&x, &train_y, &self.config)?;
        let forest = RandomForestClassifier::new(labels.clone(), trees, encoder.n_features())?;

        let validation_metrics = if test.is_empty() {
            None
        } else {
            let (test_docs, test_y) = self.prepare(&test, &label_index)?;
            let y_pred = test_docs
                .iter()
                .map(|doc| forest.predict_index(&encoder.encode(doc)))
                .collect::<Result<Vec<_>>>()?;
            Some(ModelMetrics::calculate(&test_y, &y_pred, &labels))
        };

        if let Some(metrics) = &validation_metrics {
            info!(
                accuracy = metrics.accuracy,
                f1 = metrics.f1_score,
                "Held-out evaluation complete"
            );
        }

        let metadata = ModelMetadata {
            name: "symptom-random-forest".to_string(),
            version: env!("CARGO_PKG_VERSION").to_string(),
            trained_at: Utc::now(),
            n_training_samples: train.len(),
            n_test_samples: test.len(),
            n_features: encoder.n_features(),
            n_labels: labels.len(),
            validation_metrics,
            hyperparameters: self.config.hyperparameters(),
            fingerprint: None,
        };

        Ok(TrainedModel {
            encoder,
            forest,
            metadata,
        })
    }

    fn prepare(
        &self,
        samples: &[SymptomSample],
        label_index: &BTreeMap<&str, usize>,
    ) -> Result<(Vec<NormalizedText>, Vec<usize>)> {
        let mut docs = Vec::with_capacity(samples.len());
        let mut y = Vec::with_capacity(samples.len());
        for sample in samples {
            docs.push(self.normalizer.normalize(&sample.text)?);
            let idx = label_index.get(sample.label.as_str()).copied().ok_or_else(|| {
                AppError::Internal(format!("Label '{}' missing from index", sample.label))
            })?;
            y.push(idx);
        }
        Ok((docs, y))
    }
}

/// Fit `n_trees` trees in parallel on bootstrap samples; tree `i` is seeded with `seed + i`
pub fn fit_forest(
    x: &Array2<f64>,
    y: &[usize],
    config: &TrainingConfig,
) -> Result<Vec<DecisionTree>> {
    (0..config.n_trees)
        .into_par_iter()
        .map(|i| {
            let seed = config.seed.wrapping_add(i as u64);
            let mut rng = StdRng::seed_from_u64(seed);
            let rows = bootstrap_rows(y.len(), &mut rng);

            let sample_x = x.select(Axis(0), &rows);
            let sample_y: Vec<usize> = rows.iter().map(|&r| y[r]).collect();
            let params = TreeParams {
                max_depth: config.max_depth,
                min_samples_split: config.min_samples_split,
                seed,
            };

            let tree = DecisionTree::fit(&sample_x, &sample_y, params)?;
            debug!(tree = i, classes = tree.classes().len(), "Fitted tree");
            Ok(tree)
        })
        .collect()
}

/// Draw `n` row indices with replacement
fn bootstrap_rows(n: usize, rng: &mut StdRng) -> Vec<usize> {
    (0..n).map(|_| rng.gen_range(0..n)).collect()
}
