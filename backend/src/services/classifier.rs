//! Severity classifier lifecycle
//!
//! Split the enriched corpus, fit the boosted ensemble, evaluate it on the
//! held-out rows and persist it together with the feature layout it was
//! trained on.

use std::collections::BTreeMap;
use std::fs;
use std::path::Path;

use chrono::{DateTime, Utc};
use rand::{rngs::StdRng, seq::SliceRandom, SeedableRng};
use serde::{Deserialize, Serialize};
use shared::{EnrichedObservation, SEVERITY_LABELS, SEVERITY_LEVELS};

use crate::config::TrainingConfig;
use crate::error::{AppError, AppResult};
use crate::services::boosting::{argmax, BoostingParams, SoftmaxBooster};
use crate::services::features::{FeatureVector, FEATURE_COUNT, FEATURE_NAMES};

/// Bumped whenever the artifact layout changes
pub const MODEL_FORMAT_VERSION: u32 = 1;

/// Share of all rows held out for the final test
pub const TEST_FRACTION: f64 = 0.2;

/// Share of the remaining rows held out for validation
pub const VALIDATION_FRACTION: f64 = 0.25;

impl From<&TrainingConfig> for BoostingParams {
    fn from(config: &TrainingConfig) -> Self {
        Self {
            n_estimators: config.n_estimators,
            learning_rate: config.learning_rate,
            max_depth: config.max_depth,
            min_child_weight: config.min_child_weight,
            lambda: config.lambda,
        }
    }
}

// ============================================================================
// Stratified split
// ============================================================================

/// Row indices of a train/validation/test split
#[derive(Debug, Clone, PartialEq)]
pub struct SplitIndices {
    pub train: Vec<usize>,
    pub validation: Vec<usize>,
    pub test: Vec<usize>,
}

/// Hold out `ceil(fraction * n)` of `indices`, keeping class proportions.
///
/// Per-class quotas use the largest-remainder method so they add up to the
/// exact total. Returns `(kept, held_out)`, both sorted.
pub fn stratified_holdout(
    indices: &[usize],
    labels: &[usize],
    fraction: f64,
    rng: &mut StdRng,
) -> (Vec<usize>, Vec<usize>) {
    let n = indices.len();
    let total = ((fraction * n as f64).ceil() as usize).min(n);

    let mut groups: BTreeMap<usize, Vec<usize>> = BTreeMap::new();
    for &i in indices {
        groups.entry(labels[i]).or_default().push(i);
    }

    let mut quotas: BTreeMap<usize, usize> = BTreeMap::new();
    let mut remainders: Vec<(f64, usize, usize)> = Vec::new();
    for (&class, members) in &groups {
        let exact = fraction * members.len() as f64;
        let base = (exact.floor() as usize).min(members.len());
        quotas.insert(class, base);
        remainders.push((exact - base as f64, members.len(), class));
    }

    // Largest fractional part first, then the larger class, then the lower label
    remainders.sort_by(|a, b| {
        b.0.total_cmp(&a.0)
            .then_with(|| b.1.cmp(&a.1))
            .then_with(|| a.2.cmp(&b.2))
    });
    let mut assigned: usize = quotas.values().sum();
    for (_, size, class) in remainders.iter().cycle().take(remainders.len() * 2) {
        if assigned >= total {
            break;
        }
        if let Some(quota) = quotas.get_mut(class) {
            if *quota < *size {
                *quota += 1;
                assigned += 1;
            }
        }
    }

    let mut kept = Vec::with_capacity(n - total);
    let mut held = Vec::with_capacity(total);
    for (class, mut members) in groups {
        members.shuffle(rng);
        let quota = quotas.get(&class).copied().unwrap_or(0);
        held.extend_from_slice(&members[..quota]);
        kept.extend_from_slice(&members[quota..]);
    }

    kept.sort_unstable();
    held.sort_unstable();
    (kept, held)
}

/// 60/20/20 split: test first, then validation out of the remainder
pub fn stratified_split(labels: &[usize], seed: u64) -> SplitIndices {
    let mut rng = StdRng::seed_from_u64(seed);
    let all: Vec<usize> = (0..labels.len()).collect();

    let (rest, test) = stratified_holdout(&all, labels, TEST_FRACTION, &mut rng);
    let (train, validation) = stratified_holdout(&rest, labels, VALIDATION_FRACTION, &mut rng);

    SplitIndices {
        train,
        validation,
        test,
    }
}

// ============================================================================
// Model artifact
// ============================================================================

/// Evaluation results stored with the model
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EvaluationMetrics {
    pub train_rows: usize,
    pub validation_rows: usize,
    pub test_rows: usize,
    pub validation_accuracy: Option<f64>,
    pub test_accuracy: Option<f64>,
    /// Rows per severity level across all splits
    pub class_counts: Vec<usize>,
}

/// Persisted classifier
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelArtifact {
    pub format_version: u32,
    pub feature_names: Vec<String>,
    pub feature_count: usize,
    pub class_count: usize,
    pub class_labels: Vec<String>,
    pub hyperparameters: BoostingParams,
    pub seed: u64,
    pub metrics: EvaluationMetrics,
    pub trained_at: DateTime<Utc>,
    pub booster: SoftmaxBooster,
}

impl ModelArtifact {
    /// Reject artifacts whose layout differs from the current feature builder
    pub fn check_compatible(&self) -> AppResult<()> {
        if self.format_version != MODEL_FORMAT_VERSION {
            return Err(AppError::ModelIncompatible(format!(
                "format version {} (expected {})",
                self.format_version, MODEL_FORMAT_VERSION
            )));
        }
        if self.feature_count != FEATURE_COUNT || self.booster.n_features != FEATURE_COUNT {
            return Err(AppError::ModelIncompatible(format!(
                "{} features (expected {})",
                self.feature_count, FEATURE_COUNT
            )));
        }
        if self.feature_names.iter().map(String::as_str).ne(FEATURE_NAMES.iter().copied()) {
            return Err(AppError::ModelIncompatible(format!(
                "feature names {:?} (expected {:?})",
                self.feature_names, FEATURE_NAMES
            )));
        }
        if self.class_count != SEVERITY_LEVELS || self.booster.n_classes != SEVERITY_LEVELS {
            return Err(AppError::ModelIncompatible(format!(
                "{} classes (expected {})",
                self.class_count, SEVERITY_LEVELS
            )));
        }
        self.booster.validate().map_err(AppError::ModelIncompatible)
    }
}

fn accuracy(booster: &SoftmaxBooster, rows: &[Vec<f64>], labels: &[usize], indices: &[usize]) -> Option<f64> {
    if indices.is_empty() {
        return None;
    }
    let correct = indices
        .iter()
        .filter(|&&i| booster.predict(&rows[i]) == labels[i])
        .count();
    Some(correct as f64 / indices.len() as f64)
}

// ============================================================================
// Classifier
// ============================================================================

/// Trained severity classifier
#[derive(Debug, Clone)]
pub struct SeverityClassifier {
    artifact: ModelArtifact,
}

impl SeverityClassifier {
    /// Train on the enriched rows of a corpus
    pub fn train(corpus: &[EnrichedObservation], settings: &TrainingConfig) -> AppResult<Self> {
        let (rows, labels): (Vec<Vec<f64>>, Vec<usize>) = corpus
            .iter()
            .filter_map(|record| {
                FeatureVector::from_enriched(record)
                    .map(|f| (f.as_slice().to_vec(), record.observation.severity.index()))
            })
            .unzip();

        if rows.is_empty() {
            return Err(AppError::TrainingData(
                "no rows carry weather features".to_string(),
            ));
        }

        let mut class_counts = vec![0usize; SEVERITY_LEVELS];
        for &label in &labels {
            class_counts[label] += 1;
        }
        let distinct = class_counts.iter().filter(|&&c| c > 0).count();
        if distinct < 2 {
            return Err(AppError::TrainingData(format!(
                "need at least 2 severity classes, found {}",
                distinct
            )));
        }

        tracing::info!(
            "Training on {} of {} corpus rows (class counts {:?})",
            rows.len(),
            corpus.len(),
            class_counts
        );

        let split = stratified_split(&labels, settings.seed);
        if split.train.is_empty() {
            return Err(AppError::TrainingData(format!(
                "{} rows are too few to split",
                rows.len()
            )));
        }
        tracing::info!(
            "Split: {} train, {} validation, {} test",
            split.train.len(),
            split.validation.len(),
            split.test.len()
        );

        let params = BoostingParams::from(settings);
        let train_rows: Vec<Vec<f64>> = split.train.iter().map(|&i| rows[i].clone()).collect();
        let train_labels: Vec<usize> = split.train.iter().map(|&i| labels[i]).collect();
        let booster = SoftmaxBooster::fit(&train_rows, &train_labels, SEVERITY_LEVELS, &params)
            .map_err(AppError::TrainingData)?;

        let validation_accuracy = accuracy(&booster, &rows, &labels, &split.validation);
        if let Some(acc) = validation_accuracy {
            tracing::info!("Validation accuracy: {:.4}", acc);
        }
        let test_accuracy = accuracy(&booster, &rows, &labels, &split.test);
        if let Some(acc) = test_accuracy {
            tracing::info!("Test accuracy: {:.4}", acc);
        }

        Ok(Self {
            artifact: ModelArtifact {
                format_version: MODEL_FORMAT_VERSION,
                feature_names: FEATURE_NAMES.iter().map(|s| s.to_string()).collect(),
                feature_count: FEATURE_COUNT,
                class_count: SEVERITY_LEVELS,
                class_labels: SEVERITY_LABELS.iter().map(|s| s.to_string()).collect(),
                hyperparameters: params,
                seed: settings.seed,
                metrics: EvaluationMetrics {
                    train_rows: split.train.len(),
                    validation_rows: split.validation.len(),
                    test_rows: split.test.len(),
                    validation_accuracy,
                    test_accuracy,
                    class_counts,
                },
                trained_at: Utc::now(),
                booster,
            },
        })
    }

    pub fn from_artifact(artifact: ModelArtifact) -> AppResult<Self> {
        artifact.check_compatible()?;
        Ok(Self { artifact })
    }

    pub fn artifact(&self) -> &ModelArtifact {
        &self.artifact
    }

    pub fn metrics(&self) -> &EvaluationMetrics {
        &self.artifact.metrics
    }

    /// Probability of each severity level, indexed by level
    pub fn predict_proba(&self, features: &FeatureVector) -> [f64; SEVERITY_LEVELS] {
        let probs = self.artifact.booster.predict_proba(features.as_slice());
        let mut out = [0.0; SEVERITY_LEVELS];
        for (slot, p) in out.iter_mut().zip(probs) {
            *slot = p;
        }
        out
    }

    /// Most probable severity level index
    pub fn predict(&self, features: &FeatureVector) -> usize {
        argmax(&self.predict_proba(features))
    }

    /// Write the artifact as JSON
    pub fn save(&self, path: &Path) -> AppResult<()> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let json = serde_json::to_string(&self.artifact)?;
        fs::write(path, json)?;
        tracing::info!("Saved model to {}", path.display());
        Ok(())
    }

    /// Read an artifact and check it against the current feature layout
    pub fn load(path: &Path) -> AppResult<Self> {
        let text = fs::read_to_string(path)?;
        let artifact: ModelArtifact = serde_json::from_str(&text)
            .map_err(|e| AppError::ModelIncompatible(format!("unreadable artifact: {}", e)))?;
        Self::from_artifact(artifact)
    }
}
