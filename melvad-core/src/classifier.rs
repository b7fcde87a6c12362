//! Classifier: hyperparameters, marshalling, training, persistence, prediction.
//!
//! ## State machine
//!
//! ```text
//!                 configure            train / load
//! Unconfigured ─────────────► Configured ─────────────► Trained | Loaded
//!                                 ▲                           │
//!                                 └──────── configure ────────┘
//! ```
//!
//! `train` replaces the held model only once fitting *and* persistence
//! succeed; any error leaves the previous model in place.

use std::fmt;
use std::path::{Path, PathBuf};

use tracing::{debug, info};

use crate::error::{Result, VadError};
use crate::features::FeatureVector;
use crate::svm::{marshal, Hyperparameters, Optimizer, Problem, SmoOptimizer};

/// A feature vector paired with its class label.
#[derive(Debug, Clone, PartialEq)]
pub struct TrainingExample {
    pub features: FeatureVector,
    pub label: i32,
}

impl TrainingExample {
    pub fn new(features: FeatureVector, label: i32) -> Self {
        Self { features, label }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ClassifierState {
    Unconfigured,
    Configured,
    Trained,
    Loaded,
}

enum ModelSlot<M> {
    Unconfigured,
    Configured,
    Trained(M),
    Loaded(M),
}

impl<M> ModelSlot<M> {
    fn state(&self) -> ClassifierState {
        match self {
            Self::Unconfigured => ClassifierState::Unconfigured,
            Self::Configured => ClassifierState::Configured,
            Self::Trained(_) => ClassifierState::Trained,
            Self::Loaded(_) => ClassifierState::Loaded,
        }
    }

    fn model(&self) -> Option<&M> {
        match self {
            Self::Trained(m) | Self::Loaded(m) => Some(m),
            Self::Unconfigured | Self::Configured => None,
        }
    }
}

/// SVM classifier owning at most one model at a time.
pub struct Classifier<O: Optimizer = SmoOptimizer> {
    optimizer: O,
    model_path: PathBuf,
    num_features: usize,
    params: Hyperparameters,
    slot: ModelSlot<O::Model>,
}

impl Classifier<SmoOptimizer> {
    /// Unconfigured classifier that persists trained models to `model_path`.
    pub fn new(model_path: impl Into<PathBuf>) -> Self {
        Self::with_optimizer(SmoOptimizer::new(), model_path)
    }
}

impl<O: Optimizer> Classifier<O> {
    pub fn with_optimizer(optimizer: O, model_path: impl Into<PathBuf>) -> Self {
        Self {
            optimizer,
            model_path: model_path.into(),
            num_features: 0,
            params: Hyperparameters::default(),
            slot: ModelSlot::Unconfigured,
        }
    }

    /// Set the feature dimension and hyperparameters, discarding any held model.
    ///
    /// A `gamma` of 0 is replaced by `1 / num_features`.
    ///
    /// # Errors
    /// `VadError::Configuration` if `num_features` is 0. The classifier is left
    /// untouched in that case.
    pub fn configure(&mut self, num_features: usize, params: Hyperparameters) -> Result<()> {
        if num_features == 0 {
            return Err(VadError::Configuration("numFeatures must be > 0".into()));
        }
        self.num_features = num_features;
        self.params = params.resolved(num_features);
        self.slot = ModelSlot::Configured;
        debug!(num_features, kernel = ?self.params.kernel, gamma = self.params.gamma, "classifier configured");
        Ok(())
    }

    /// Fit a model on `examples`, persist it, then make it the held model.
    ///
    /// # Errors
    /// - `VadError::Configuration` if the classifier is unconfigured.
    /// - `VadError::DimensionMismatch` if any example has the wrong length.
    /// - `VadError::Parameter` with the optimizer's diagnostic.
    /// - `VadError::Persistence` if the model cannot be written.
    pub fn train(&mut self, examples: &[TrainingExample]) -> Result<()> {
        self.ensure_configured()?;

        let mut problem = Problem::with_capacity(self.num_features, examples.len());
        for example in examples {
            problem.push(example.label, marshal(&example.features, self.num_features)?);
        }

        if let Some(reason) = self.optimizer.check_parameter(&problem, &self.params) {
            return Err(VadError::Parameter(reason));
        }

        info!(
            examples = problem.len(),
            num_features = self.num_features,
            kernel = ?self.params.kernel,
            "training classifier"
        );
        let model = self.optimizer.train(&problem, &self.params);
        self.optimizer
            .save_model(&model, &self.model_path)
            .map_err(|e| into_persistence(&self.model_path, e))?;
        info!(path = %self.model_path.display(), "model trained and saved");

        self.slot = ModelSlot::Trained(model);
        Ok(())
    }

    /// Replace the held model with one deserialized from `source`.
    ///
    /// # Errors
    /// - `VadError::Configuration` if the classifier is unconfigured.
    /// - `VadError::Persistence` if the artifact is absent or malformed.
    /// - `VadError::DimensionMismatch` if it was trained for another dimension.
    pub fn load(&mut self, source: impl AsRef<Path>) -> Result<()> {
        self.ensure_configured()?;
        let source = source.as_ref();
        let model = self
            .optimizer
            .load_model(source)
            .map_err(|e| into_persistence(source, e))?;
        if let Some(dimension) = self.optimizer.model_dimension(&model) {
            if dimension != self.num_features {
                return Err(VadError::DimensionMismatch {
                    expected: self.num_features,
                    actual: dimension,
                });
            }
        }
        info!(path = %source.display(), "model loaded");
        self.slot = ModelSlot::Loaded(model);
        Ok(())
    }

    /// # Errors
    /// `VadError::ModelNotReady` without a held model,
    /// `VadError::DimensionMismatch` for a wrong-length vector.
    pub fn predict(&self, features: &[f64]) -> Result<i32> {
        let model = self.slot.model().ok_or(VadError::ModelNotReady)?;
        let x = marshal(features, self.num_features)?;
        Ok(self.optimizer.predict(model, &x))
    }

    /// `(label, probability)` for every trained label.
    ///
    /// # Errors
    /// As [`Classifier::predict`], plus `VadError::ProbabilityUnavailable`
    /// when the model was trained without probability estimates.
    pub fn predict_probability(&self, features: &[f64]) -> Result<Vec<(i32, f64)>> {
        let model = self.slot.model().ok_or(VadError::ModelNotReady)?;
        let x = marshal(features, self.num_features)?;
        self.optimizer
            .predict_probability(model, &x)
            .ok_or(VadError::ProbabilityUnavailable)
    }

    pub fn state(&self) -> ClassifierState {
        self.slot.state()
    }

    pub fn num_features(&self) -> usize {
        self.num_features
    }

    pub fn hyperparameters(&self) -> &Hyperparameters {
        &self.params
    }

    pub fn model_path(&self) -> &Path {
        &self.model_path
    }

    pub fn model(&self) -> Option<&O::Model> {
        self.slot.model()
    }

    fn ensure_configured(&self) -> Result<()> {
        match self.slot {
            ModelSlot::Unconfigured => Err(VadError::Configuration(
                "classifier must be configured first".into(),
            )),
            _ => Ok(()),
        }
    }
}

/// Back-end save/load failures surface as `Persistence` whatever their kind.
fn into_persistence(path: &Path, err: VadError) -> VadError {
    match err {
        VadError::Persistence { .. } => err,
        other => VadError::persistence(path, other),
    }
}

impl<O: Optimizer> fmt::Debug for Classifier<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Classifier")
            .field("model_path", &self.model_path)
            .field("num_features", &self.num_features)
            .field("params", &self.params)
            .field("state", &self.state())
            .finish()
    }
}
