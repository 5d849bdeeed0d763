use crate::error::{AppError, Result};
use crate::ml::normalizer::NormalizedText;
use ndarray::{Array1, Array2};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

/// Vector normalisation applied after TF-IDF weighting
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum NormMode {
    #[default]
    L2,
    None,
}

/// Feature extraction configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FeatureConfig {
    /// Maximum vocabulary size
    pub max_features: usize,

    /// N-gram range (min, max)
    pub ngram_range: (usize, usize),

    /// Normalisation mode, frozen into the vocabulary
    pub norm: NormMode,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            max_features: 500,
            ngram_range: (1, 2), // Unigrams and bigrams
            norm: NormMode::L2,
        }
    }
}

/// Generate the n-gram terms of a token stream, in order of appearance
pub fn extract_terms(tokens: &[String], ngram_range: (usize, usize)) -> Vec<String> {
    let (min_n, max_n) = ngram_range;
    let mut terms = Vec::new();

    for n in min_n.max(1)..=max_n {
        for window in tokens.windows(n) {
            terms.push(window.join(" "));
        }
    }

    terms
}

/// Frozen term → index mapping with per-term IDF weights.
///
/// Indices are assigned in lexicographic term order and cover `[0, len)`
/// without gaps.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawVocabulary")]
pub struct Vocabulary {
    index: BTreeMap<String, usize>,
    idf: Vec<f64>,
    ngram_range: (usize, usize),
    norm: NormMode,
}

#[derive(Deserialize)]
struct RawVocabulary {
    index: BTreeMap<String, usize>,
    idf: Vec<f64>,
    ngram_range: (usize, usize),
    norm: NormMode,
}

impl TryFrom<RawVocabulary> for Vocabulary {
    type Error = AppError;

    /// Decoded vocabularies get the same guarantees as fitted ones
    fn try_from(raw: RawVocabulary) -> Result<Self> {
        let (min_n, max_n) = raw.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(AppError::Validation(format!(
                "Invalid n-gram range ({}, {})",
                min_n, max_n
            )));
        }
        if raw.idf.is_empty() || raw.idf.len() != raw.index.len() {
            return Err(AppError::Validation(format!(
                "Vocabulary has {} terms but {} IDF weights",
                raw.index.len(),
                raw.idf.len()
            )));
        }
        let indices: BTreeSet<usize> = raw.index.values().copied().collect();
        if indices.len() != raw.idf.len() || indices.iter().any(|&i| i >= raw.idf.len()) {
            return Err(AppError::Validation(
                "Vocabulary indices must cover 0..len without gaps".to_string(),
            ));
        }
        if let Some(w) = raw.idf.iter().find(|w| !w.is_finite() || **w <= 0.0) {
            return Err(AppError::Validation(format!("Invalid IDF weight {}", w)));
        }

        Ok(Self {
            index: raw.index,
            idf: raw.idf,
            ngram_range: raw.ngram_range,
            norm: raw.norm,
        })
    }
}

impl Vocabulary {
    /// Learn the vocabulary and smoothed IDF weights from a corpus
    pub fn fit(documents: &[NormalizedText], config: &FeatureConfig) -> Result<Self> {
        validate_config(config)?;
        if documents.is_empty() {
            return Err(AppError::Validation(
                "Cannot fit a vocabulary on an empty corpus".to_string(),
            ));
        }

        let mut corpus_freq: BTreeMap<String, usize> = BTreeMap::new();
        let mut doc_freq: BTreeMap<String, usize> = BTreeMap::new();

        for doc in documents {
            let terms = extract_terms(doc.tokens(), config.ngram_range);
            let unique: BTreeSet<&String> = terms.iter().collect();

            for term in unique {
                *doc_freq.entry(term.clone()).or_insert(0) += 1;
            }
            for term in terms {
                *corpus_freq.entry(term).or_insert(0) += 1;
            }
        }

        // Highest corpus frequency first, lexicographic among equals
        let mut ranked: Vec<(String, usize)> = corpus_freq.into_iter().collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
        ranked.truncate(config.max_features);

        let kept: BTreeSet<String> = ranked.into_iter().map(|(term, _)| term).collect();
        if kept.is_empty() {
            return Err(AppError::Validation(
                "Corpus produced an empty vocabulary".to_string(),
            ));
        }

        let n_docs = documents.len() as f64;
        let mut index = BTreeMap::new();
        let mut idf = Vec::with_capacity(kept.len());

        for (idx, term) in kept.into_iter().enumerate() {
            let df = doc_freq.get(&term).copied().unwrap_or(0) as f64;
            idf.push(((1.0 + n_docs) / (1.0 + df)).ln() + 1.0);
            index.insert(term, idx);
        }

        Ok(Self {
            index,
            idf,
            ngram_range: config.ngram_range,
            norm: config.norm,
        })
    }

    /// Build a vocabulary from explicit (term, idf) pairs
    pub fn from_weights(
        weights: impl IntoIterator<Item = (String, f64)>,
        ngram_range: (usize, usize),
        norm: NormMode,
    ) -> Result<Self> {
        let sorted: BTreeMap<String, f64> = weights.into_iter().collect();
        if sorted.is_empty() {
            return Err(AppError::Validation("Vocabulary cannot be empty".to_string()));
        }
        if let Some((term, w)) = sorted.iter().find(|(_, w)| !w.is_finite() || **w <= 0.0) {
            return Err(AppError::Validation(format!(
                "Invalid IDF weight {} for term '{}'",
                w, term
            )));
        }

        let mut index = BTreeMap::new();
        let mut idf = Vec::with_capacity(sorted.len());
        for (idx, (term, weight)) in sorted.into_iter().enumerate() {
            index.insert(term, idx);
            idf.push(weight);
        }

        Ok(Self {
            index,
            idf,
            ngram_range,
            norm,
        })
    }

    pub fn len(&self) -> usize {
        self.idf.len()
    }

    pub fn is_empty(&self) -> bool {
        self.idf.is_empty()
    }

    pub fn index_of(&self, term: &str) -> Option<usize> {
        self.index.get(term).copied()
    }

    pub fn idf(&self, index: usize) -> Option<f64> {
        self.idf.get(index).copied()
    }

    pub fn norm(&self) -> NormMode {
        self.norm
    }

    pub fn ngram_range(&self) -> (usize, usize) {
        self.ngram_range
    }

    /// Terms with their indices, in index order
    pub fn terms(&self) -> impl Iterator<Item = (&str, usize)> {
        self.index.iter().map(|(t, &i)| (t.as_str(), i))
    }
}

fn validate_config(config: &FeatureConfig) -> Result<()> {
    let (min_n, max_n) = config.ngram_range;
    if config.max_features == 0 {
        return Err(AppError::Configuration(
            "max_features must be greater than zero".to_string(),
        ));
    }
    if min_n == 0 || min_n > max_n {
        return Err(AppError::Configuration(format!(
            "Invalid n-gram range ({}, {})",
            min_n, max_n
        )));
    }
    Ok(())
}

/// Dense TF-IDF weights; length always equals the vocabulary size
#[derive(Debug, Clone, PartialEq)]
pub struct FeatureVector {
    values: Array1<f64>,
}

impl FeatureVector {
    pub fn from_values(values: Vec<f64>) -> Self {
        Self {
            values: Array1::from_vec(values),
        }
    }

    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }

    pub fn get(&self, index: usize) -> f64 {
        self.values.get(index).copied().unwrap_or(0.0)
    }

    pub fn values(&self) -> &Array1<f64> {
        &self.values
    }

    /// Number of non-zero weights
    pub fn nnz(&self) -> usize {
        self.values.iter().filter(|v| **v != 0.0).count()
    }

    pub fn l2_norm(&self) -> f64 {
        self.values.dot(&self.values).sqrt()
    }
}

/// Maps normalised text onto the frozen vocabulary
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FeatureEncoder {
    vocabulary: Vocabulary,
}

impl FeatureEncoder {
    pub fn new(vocabulary: Vocabulary) -> Self {
        Self { vocabulary }
    }

    /// Fit a vocabulary on the corpus and wrap it
    pub fn fit(documents: &[NormalizedText], config: &FeatureConfig) -> Result<Self> {
        Ok(Self::new(Vocabulary::fit(documents, config)?))
    }

    pub fn vocabulary(&self) -> &Vocabulary {
        &self.vocabulary
    }

    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    /// Encode one document. Terms outside the vocabulary are ignored.
    pub fn encode(&self, text: &NormalizedText) -> FeatureVector {
        let vocab = &self.vocabulary;

        let mut counts: BTreeMap<usize, f64> = BTreeMap::new();
        for term in extract_terms(text.tokens(), vocab.ngram_range) {
            if let Some(idx) = vocab.index_of(&term) {
                *counts.entry(idx).or_insert(0.0) += 1.0;
            }
        }

        let mut values = Array1::zeros(vocab.len());
        for (idx, tf) in counts {
            values[idx] = tf * vocab.idf[idx];
        }

        if vocab.norm == NormMode::L2 {
            let norm = values.dot(&values).sqrt();
            if norm > 0.0 {
                values.mapv_inplace(|v| v / norm);
            }
        }

        FeatureVector { values }
    }

    /// Encode a corpus into an (n_documents × n_features) matrix
    pub fn encode_batch(&self, documents: &[NormalizedText]) -> Array2<f64> {
        let mut matrix = Array2::zeros((documents.len(), self.n_features()));
        for (i, doc) in documents.iter().enumerate() {
            matrix.row_mut(i).assign(self.encode(doc).values());
        }
        matrix
    }
}
