use crate::error::{AppError, Result};
use crate::ml::features::FeatureVector;
use crate::models::LabelDistribution;
use ndarray::Array2;
use serde::{Deserialize, Serialize};
use smartcore::linalg::basic::matrix::DenseMatrix;
use smartcore::tree::decision_tree_classifier::{
    DecisionTreeClassifier, DecisionTreeClassifierParameters, SplitCriterion,
};
use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

type CartModel = DecisionTreeClassifier<f64, i32, DenseMatrix<f64>, Vec<i32>>;

/// Growth limits for a single CART tree
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TreeParams {
    pub max_depth: usize,
    pub min_samples_split: usize,
    pub seed: u64,
}

impl TreeParams {
    fn to_smartcore(self) -> DecisionTreeClassifierParameters {
        let max_depth = u16::try_from(self.max_depth).unwrap_or(u16::MAX);
        DecisionTreeClassifierParameters {
            seed: Some(self.seed),
            ..DecisionTreeClassifierParameters::default()
                .with_criterion(SplitCriterion::Gini)
                .with_max_depth(max_depth)
                .with_min_samples_split(self.min_samples_split)
        }
    }
}

fn ndarray_to_densematrix(arr: &Array2<f64>) -> DenseMatrix<f64> {
    let shape = arr.shape();
    let data: Vec<f64> = arr.iter().copied().collect();
    DenseMatrix::new(shape[0], shape[1], data, false)
}

fn vec_to_labels(vec: &[usize]) -> Result<Vec<i32>> {
    vec.iter()
        .map(|&x| {
            i32::try_from(x)
                .map_err(|_| AppError::Validation(format!("Label index {} is out of range", x)))
        })
        .collect()
}

/// Gini CART tree fitted with smartcore.
///
/// Alongside the model it keeps the label indices it was trained on and the
/// feature width, so a forest can check both when it is assembled or decoded.
#[derive(Serialize, Deserialize)]
#[serde(try_from = "RawTree")]
pub struct DecisionTree {
    model: CartModel,
    classes: Vec<usize>,
    n_features: usize,
}

#[derive(Deserialize)]
struct RawTree {
    model: CartModel,
    classes: Vec<usize>,
    n_features: usize,
}

impl TryFrom<RawTree> for DecisionTree {
    type Error = AppError;

    fn try_from(raw: RawTree) -> Result<Self> {
        if raw.n_features == 0 {
            return Err(AppError::Validation("Decision tree has no features".to_string()));
        }
        if raw.classes.len() < 2 || raw.classes.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AppError::Validation(
                "Decision tree classes must be sorted, unique and at least two".to_string(),
            ));
        }
        Ok(Self {
            model: raw.model,
            classes: raw.classes,
            n_features: raw.n_features,
        })
    }
}

impl fmt::Debug for DecisionTree {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DecisionTree")
            .field("classes", &self.classes)
            .field("n_features", &self.n_features)
            .finish_non_exhaustive()
    }
}

impl DecisionTree {
    /// Fit on an (n_samples × n_features) matrix with one label index per row
    pub fn fit(x: &Array2<f64>, y: &[usize], params: TreeParams) -> Result<Self> {
        if x.nrows() != y.len() {
            return Err(AppError::Validation(format!(
                "{} rows but {} labels",
                x.nrows(),
                y.len()
            )));
        }
        if x.ncols() == 0 {
            return Err(AppError::Validation("Training matrix has no features".to_string()));
        }

        let classes: Vec<usize> = y.iter().copied().collect::<BTreeSet<_>>().into_iter().collect();
        if classes.len() < 2 {
            return Err(AppError::Validation(
                "A decision tree needs at least two classes".to_string(),
            ));
        }

        let model = CartModel::fit(
            &ndarray_to_densematrix(x),
            &vec_to_labels(y)?,
            params.to_smartcore(),
        )
        .map_err(|e| AppError::Internal(format!("Failed to train decision tree: {}", e)))?;

        Ok(Self {
            model,
            classes,
            n_features: x.ncols(),
        })
    }

    /// Tree that votes for `label` on every input.
    ///
    /// All training rows are identical, so no split exists and the root keeps
    /// the majority label.
    pub fn constant(label: usize, n_labels: usize, n_features: usize) -> Result<Self> {
        if label >= n_labels || n_labels < 2 {
            return Err(AppError::Validation(format!(
                "Label {} is not one of {} labels",
                label, n_labels
            )));
        }
        let other = if label == 0 { 1 } else { 0 };
        let x = Array2::zeros((3, n_features));
        Self::fit(
            &x,
            &[label, label, other],
            TreeParams {
                max_depth: 1,
                min_samples_split: 2,
                seed: 0,
            },
        )
    }

    /// Label indices seen in the training sample
    pub fn classes(&self) -> &[usize] {
        &self.classes
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    /// Label index this tree votes for
    pub fn predict(&self, features: &DenseMatrix<f64>) -> Result<usize> {
        let output = self
            .model
            .predict(features)
            .map_err(|e| AppError::Internal(format!("Prediction failed: {}", e)))?;
        output
            .first()
            .and_then(|&v| usize::try_from(v).ok())
            .ok_or_else(|| AppError::Internal("Decision tree returned no vote".to_string()))
    }
}

/// Voting ensemble of independently trained trees.
///
/// The label list is sorted and unique, so label index order is also
/// lexicographic order.
#[derive(Debug, Serialize, Deserialize)]
#[serde(try_from = "RawForest")]
pub struct RandomForestClassifier {
    labels: Vec<String>,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

#[derive(Deserialize)]
struct RawForest {
    labels: Vec<String>,
    trees: Vec<DecisionTree>,
    n_features: usize,
}

impl TryFrom<RawForest> for RandomForestClassifier {
    type Error = AppError;

    fn try_from(raw: RawForest) -> Result<Self> {
        Self::new(raw.labels, raw.trees, raw.n_features)
    }
}

impl RandomForestClassifier {
    pub fn new(labels: Vec<String>, trees: Vec<DecisionTree>, n_features: usize) -> Result<Self> {
        if labels.is_empty() {
            return Err(AppError::Validation("Classifier has no labels".to_string()));
        }
        if labels.windows(2).any(|w| w[0] >= w[1]) {
            return Err(AppError::Validation(
                "Classifier labels must be sorted and unique".to_string(),
            ));
        }
        if trees.is_empty() {
            return Err(AppError::Validation("Classifier has no trees".to_string()));
        }

        for (i, tree) in trees.iter().enumerate() {
            if let Some(label) = tree.classes().iter().find(|&&c| c >= labels.len()) {
                return Err(AppError::Validation(format!(
                    "Tree {} votes for unknown label index {}",
                    i, label
                )));
            }
            if tree.n_features() != n_features {
                return Err(AppError::Validation(format!(
                    "Tree {} was fitted on {} features but vectors have {}",
                    i,
                    tree.n_features(),
                    n_features
                )));
            }
        }

        Ok(Self {
            labels,
            trees,
            n_features,
        })
    }

    pub fn labels(&self) -> &[String] {
        &self.labels
    }

    pub fn n_trees(&self) -> usize {
        self.trees.len()
    }

    pub fn n_features(&self) -> usize {
        self.n_features
    }

    pub fn trees(&self) -> &[DecisionTree] {
        &self.trees
    }

    /// Tally one vote per tree, returning counts per label index
    pub fn votes(&self, features: &FeatureVector) -> Result<Vec<usize>> {
        if features.len() != self.n_features {
            return Err(AppError::Internal(format!(
                "Feature vector has length {} but the model expects {}",
                features.len(),
                self.n_features
            )));
        }

        let row = DenseMatrix::new(1, self.n_features, features.values().to_vec(), false);
        let mut tally = vec![0usize; self.labels.len()];
        for tree in &self.trees {
            let label = tree.predict(&row)?;
            let slot = tally.get_mut(label).ok_or_else(|| {
                AppError::Internal(format!("Tree voted for unknown label index {}", label))
            })?;
            *slot += 1;
        }
        Ok(tally)
    }

    /// Probability per label: votes for the label / total trees
    pub fn classify(&self, features: &FeatureVector) -> Result<LabelDistribution> {
        let tally = self.votes(features)?;
        let votes: BTreeMap<String, usize> = self.labels.iter().cloned().zip(tally).collect();
        LabelDistribution::from_votes(&votes)
    }

    /// Most-voted label index; ties go to the smaller index
    pub fn predict_index(&self, features: &FeatureVector) -> Result<usize> {
        let tally = self.votes(features)?;
        let mut best = 0;
        for (idx, &count) in tally.iter().enumerate() {
            if count > tally[best] {
                best = idx;
            }
        }
        Ok(best)
    }
}
