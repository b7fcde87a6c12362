//! `Vad`: wires dataset enumeration, feature extraction and the classifier.
//!
//! ## Training
//!
//! ```text
//! [LabeledSource { dir, label }, ...]
//!     └─► list_dir(dir) → *.wav → WavStream → FeatureExtractor::extract
//!         └─► one TrainingExample per frame → Classifier::train → model file
//! ```
//!
//! ## Classification
//!
//! ```text
//! SampleStream → FeatureExtractor::extract → Classifier::predict (per frame)
//!     └─► Vec<FrameDecision>
//! ```
//!
//! Decisions are raw per-frame labels; no smoothing or hangover is applied.

use std::path::{Path, PathBuf};

use serde::Serialize;
use tracing::{debug, info};

use crate::audio::{list_dir, SampleStream, WavStream};
use crate::classifier::{Classifier, TrainingExample};
use crate::config::VadConfig;
use crate::error::{Result, VadError};
use crate::features::FeatureExtractor;
use crate::svm::{Optimizer, SmoOptimizer};

pub const SPEECH_LABEL: i32 = 1;
pub const NON_SPEECH_LABEL: i32 = -1;

/// A directory of WAV files whose every frame carries `label`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LabeledSource {
    pub dir: PathBuf,
    pub label: i32,
}

impl LabeledSource {
    pub fn new(dir: impl Into<PathBuf>, label: i32) -> Self {
        Self {
            dir: dir.into(),
            label,
        }
    }

    pub fn speech(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, SPEECH_LABEL)
    }

    pub fn non_speech(dir: impl Into<PathBuf>) -> Self {
        Self::new(dir, NON_SPEECH_LABEL)
    }
}

/// What went into a training run.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct TrainingReport {
    /// WAV files decoded.
    pub files: usize,
    /// Frames, i.e. training examples.
    pub examples: usize,
    /// `(label, frames)` in source order.
    pub label_counts: Vec<(i32, usize)>,
}

impl TrainingReport {
    pub fn count_for(&self, label: i32) -> usize {
        self.label_counts
            .iter()
            .filter(|(l, _)| *l == label)
            .map(|(_, n)| n)
            .sum()
    }

    fn record(&mut self, label: i32, frames: usize) {
        self.files += 1;
        self.examples += frames;
        match self.label_counts.iter_mut().find(|(l, _)| *l == label) {
            Some((_, n)) => *n += frames,
            None => self.label_counts.push((label, frames)),
        }
    }
}

/// Label assigned to one frame.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FrameDecision {
    pub index: usize,
    pub start_ms: f64,
    pub label: i32,
}

impl FrameDecision {
    pub fn is_speech(&self) -> bool {
        self.label == SPEECH_LABEL
    }
}

/// Owns one feature extractor and one classifier.
#[derive(Debug)]
pub struct Vad<O: Optimizer = SmoOptimizer> {
    config: VadConfig,
    extractor: FeatureExtractor,
    classifier: Classifier<O>,
}

impl Vad<SmoOptimizer> {
    /// # Errors
    /// `VadError::Configuration` if the config is invalid.
    pub fn new(config: VadConfig) -> Result<Self> {
        Self::with_optimizer(config, SmoOptimizer::new())
    }
}

impl<O: Optimizer> Vad<O> {
    pub fn with_optimizer(config: VadConfig, optimizer: O) -> Result<Self> {
        config.validate()?;
        let extractor = FeatureExtractor::new(config.features.clone())?;
        let mut classifier = Classifier::with_optimizer(optimizer, config.model_path.clone());
        classifier.configure(extractor.num_features(), config.svm.clone())?;
        Ok(Self {
            config,
            extractor,
            classifier,
        })
    }

    pub fn config(&self) -> &VadConfig {
        &self.config
    }

    pub fn classifier(&self) -> &Classifier<O> {
        &self.classifier
    }

    pub fn extractor_mut(&mut self) -> &mut FeatureExtractor {
        &mut self.extractor
    }

    /// Extract and label every frame of every WAV file under `sources`.
    ///
    /// Files are visited in sorted order per directory; non-`.wav` files and
    /// subdirectories are skipped.
    ///
    /// # Errors
    /// I/O errors listing a directory, `VadError::AudioDecode` for unreadable
    /// WAVs, and any extraction error.
    pub fn build_dataset(
        &mut self,
        sources: &[LabeledSource],
    ) -> Result<(Vec<TrainingExample>, TrainingReport)> {
        let mut examples = Vec::new();
        let mut report = TrainingReport::default();

        for source in sources {
            for path in list_dir(&source.dir)? {
                if !is_wav(&path) {
                    debug!(path = %path.display(), "skipping non-WAV file");
                    continue;
                }
                let mut stream = WavStream::open(&path)?;
                let frames = self.extractor.extract(&mut stream)?;
                report.record(source.label, frames.len());
                examples.extend(
                    frames
                        .into_iter()
                        .map(|features| TrainingExample::new(features, source.label)),
                );
            }
        }

        Ok((examples, report))
    }

    /// Build the dataset from `sources`, train, and persist the model.
    ///
    /// # Errors
    /// Everything `build_dataset` and `Classifier::train` can return.
    pub fn train(&mut self, sources: &[LabeledSource]) -> Result<TrainingReport> {
        let (examples, report) = self.build_dataset(sources)?;
        info!(
            files = report.files,
            examples = report.examples,
            "dataset built"
        );
        self.classifier.train(&examples)?;
        Ok(report)
    }

    /// Load the model at the configured `modelPath`.
    pub fn load_model(&mut self) -> Result<()> {
        let path = self.config.model_path.clone();
        self.classifier.load(path)
    }

    /// One decision per frame of `stream`.
    ///
    /// # Errors
    /// `VadError::ModelNotReady` before a model is trained or loaded, plus any
    /// extraction error.
    pub fn classify_stream<S: SampleStream + ?Sized>(
        &mut self,
        stream: &mut S,
    ) -> Result<Vec<FrameDecision>> {
        if self.classifier.model().is_none() {
            return Err(VadError::ModelNotReady);
        }
        let layout = self.extractor.layout_for(stream.sample_rate())?;
        let features = self.extractor.extract(stream)?;
        features
            .iter()
            .enumerate()
            .map(|(index, vector)| {
                Ok(FrameDecision {
                    index,
                    start_ms: layout.frame_start_ms(index),
                    label: self.classifier.predict(vector)?,
                })
            })
            .collect()
    }

    pub fn classify_file(&mut self, path: impl AsRef<Path>) -> Result<Vec<FrameDecision>> {
        let mut stream = WavStream::open(path)?;
        self.classify_stream(&mut stream)
    }
}

fn is_wav(path: &Path) -> bool {
    path.extension()
        .and_then(|ext| ext.to_str())
        .is_some_and(|ext| ext.eq_ignore_ascii_case("wav"))
}
