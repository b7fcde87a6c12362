//! Support vector classification.
//!
//! ```text
//!   Vec<FeatureVector> + labels
//!        │ marshal (1-based sparse nodes, sentinel-terminated)
//!        ▼
//!   ┌─────────┐  check_parameter   ┌──────────────┐
//!   │ Problem │ ─────────────────► │  Optimizer   │ ── train ──► Model
//!   └─────────┘                    │ (SmoOptimizer│ ◄─ load_model
//!                                  │  by default) │ ── save_model
//!                                  └──────────────┘
//! ```
//!
//! The `Optimizer` trait is the seam between the classifier and the
//! numerical back-end. `SmoOptimizer` is a pure-Rust one-vs-one C-SVC with
//! second-order working-set selection, optional Platt-scaled probability
//! estimates, and a JSON model artifact.

pub mod kernel;
pub mod model;
pub mod params;
pub mod probability;
mod smo;
mod solver;
pub mod sparse;

use std::path::Path;

use crate::error::Result;

pub use kernel::Kernel;
pub use model::{SvmModel, MODEL_FORMAT_VERSION};
pub use params::{Hyperparameters, KernelType};
pub use smo::SmoOptimizer;
pub use sparse::{marshal, Problem, SvmNode};

/// Numerical back-end that trains, evaluates and persists SVM models.
pub trait Optimizer {
    type Model;

    /// Human-readable reason the problem/parameter pair is unusable, if any.
    fn check_parameter(&self, problem: &Problem, params: &Hyperparameters) -> Option<String>;

    /// Train on a problem that already passed `check_parameter`.
    fn train(&self, problem: &Problem, params: &Hyperparameters) -> Self::Model;

    fn predict(&self, model: &Self::Model, x: &[SvmNode]) -> i32;

    /// Per-label probabilities, `None` when the model was trained without them.
    fn predict_probability(&self, model: &Self::Model, x: &[SvmNode]) -> Option<Vec<(i32, f64)>>;

    fn save_model(&self, model: &Self::Model, path: &Path) -> Result<()>;

    fn load_model(&self, path: &Path) -> Result<Self::Model>;

    /// Feature dimension recorded in the model, when the back-end tracks it.
    fn model_dimension(&self, _model: &Self::Model) -> Option<usize> {
        None
    }
}
