//! # melvad-core
//!
//! Frame-level voice activity detection from mel filter-bank energies.
//!
//! ## Architecture
//!
//! ```text
//! SampleStream → Framer → SpectralAnalyzer (rustfft) → MelFilterBank → FeatureVector
//!                                                                         │
//!                                            training: (vector, label) ───┤
//!                                                                         ▼
//!                                                     Classifier<Optimizer> ──► Model file
//!                                                                         │
//!                                                   inference: predict ◄──┘
//! ```
//!
//! Everything runs synchronously on the caller's thread. Each `FeatureExtractor`
//! and each `Classifier` is single-owner.

#![forbid(unsafe_code)]
#![warn(clippy::all)]

pub mod audio;
pub mod classifier;
pub mod config;
pub mod engine;
pub mod error;
pub mod features;
pub mod svm;

// Convenience re-exports for downstream crates
pub use audio::{list_dir, MemoryStream, SampleStream, WavStream};
pub use classifier::{Classifier, ClassifierState, TrainingExample};
pub use config::{load_config, save_config, VadConfig};
pub use engine::{FrameDecision, LabeledSource, TrainingReport, Vad, NON_SPEECH_LABEL, SPEECH_LABEL};
pub use error::{Result, VadError};
pub use features::{
    FeatureConfig, FeatureExtractor, FeatureVector, ZeroEnergyPolicy, MIN_FEATURE_VALUE,
    MIN_FILTER_ENERGY,
};
pub use svm::{Hyperparameters, KernelType, Optimizer, SmoOptimizer};
