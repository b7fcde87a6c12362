//! Feature extraction pipeline: frames → magnitude spectra → mel log-energies.
//!
//! ## Pipeline stages (per stream)
//!
//! ```text
//! 1. Rewind the stream
//! 2. Derive FrameLayout from the stream's sample rate
//! 3. For every (zero-padded) frame:
//!    a. SpectralAnalyzer → |X[k]|, k < frame_size / 2
//!    b. MelFilterBank    → ln(Σ w·|X|) per filter, zero energy per policy
//! 4. Rewind the stream again
//! ```
//!
//! The analyzer and filter bank are cached for the last sample rate seen, so
//! extracting a batch of same-rate files builds them once.

pub mod framer;
pub mod mel;
pub mod spectrum;

pub use framer::{FrameLayout, Frames};
pub use mel::{MelFilterBank, ZeroEnergyPolicy, MIN_FEATURE_VALUE, MIN_FILTER_ENERGY};
pub use spectrum::SpectralAnalyzer;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::audio::SampleStream;
use crate::error::{Result, VadError};

/// One log mel-energy per filter.
pub type FeatureVector = Vec<f64>;

/// Framing and filter-bank settings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[serde(default)]
pub struct FeatureConfig {
    /// Frame duration in milliseconds. Default: 20.
    pub duration_ms: u32,
    /// Number of mel filters, i.e. feature dimension. Default: 26.
    pub filters_count: usize,
    /// Handling of zero-energy filters. Default: floor.
    pub zero_energy: ZeroEnergyPolicy,
}

impl Default for FeatureConfig {
    fn default() -> Self {
        Self {
            duration_ms: 20,
            filters_count: 26,
            zero_energy: ZeroEnergyPolicy::Floor,
        }
    }
}

impl FeatureConfig {
    pub fn validate(&self) -> Result<()> {
        if self.duration_ms == 0 {
            return Err(VadError::Configuration("durationMs must be > 0".into()));
        }
        if self.filters_count == 0 {
            return Err(VadError::Configuration("filtersCount must be >= 1".into()));
        }
        Ok(())
    }
}

/// Filter bank + analyzer built for one sample rate.
#[derive(Debug)]
struct Analysis {
    layout: FrameLayout,
    filter_bank: MelFilterBank,
    analyzer: SpectralAnalyzer,
}

impl Analysis {
    fn build(sample_rate: u32, config: &FeatureConfig) -> Result<Self> {
        let layout = FrameLayout::new(sample_rate, config.duration_ms)?;
        Ok(Self {
            filter_bank: MelFilterBank::new(&layout, config.filters_count)?,
            analyzer: SpectralAnalyzer::new(layout.frame_size)?,
            layout,
        })
    }
}

/// Turns a sample stream into one feature vector per frame.
#[derive(Debug)]
pub struct FeatureExtractor {
    config: FeatureConfig,
    analysis: Option<Analysis>,
}

impl FeatureExtractor {
    /// # Errors
    /// `VadError::Configuration` if the config is invalid.
    pub fn new(config: FeatureConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            analysis: None,
        })
    }

    pub fn config(&self) -> &FeatureConfig {
        &self.config
    }

    /// Dimension of every vector this extractor produces.
    pub fn num_features(&self) -> usize {
        self.config.filters_count
    }

    /// Frame layout for `sample_rate` under this extractor's duration.
    pub fn layout_for(&self, sample_rate: u32) -> Result<FrameLayout> {
        FrameLayout::new(sample_rate, self.config.duration_ms)
    }

    /// Extract features for every frame of `stream`, in order.
    ///
    /// The stream is rewound before and after extraction, so repeated calls on
    /// an unchanged stream return identical results.
    ///
    /// # Errors
    /// - `VadError::Configuration` if the sample rate is zero or the frame
    ///   would be empty.
    /// - `VadError::DegenerateInput` for unusable filter energies (see
    ///   `ZeroEnergyPolicy`).
    pub fn extract<S: SampleStream + ?Sized>(&mut self, stream: &mut S) -> Result<Vec<FeatureVector>> {
        stream.rewind();
        let result = self.extract_from_start(stream);
        stream.rewind();
        result
    }

    fn extract_from_start<S: SampleStream + ?Sized>(
        &mut self,
        stream: &mut S,
    ) -> Result<Vec<FeatureVector>> {
        let sample_rate = stream.sample_rate();
        let policy = self.config.zero_energy;
        let analysis = self.analysis_for(sample_rate)?;
        let frame_size = analysis.layout.frame_size;

        let mut out = Vec::with_capacity(stream.sample_count().div_ceil(frame_size));
        for (index, frame) in Frames::new(stream, frame_size).enumerate() {
            let spectrum = analysis.analyzer.analyze(&frame)?;
            let features = analysis
                .filter_bank
                .apply(&spectrum, policy)
                .map_err(|e| match e {
                    VadError::DegenerateInput { filter, .. } => {
                        VadError::DegenerateInput { frame: index, filter }
                    }
                    other => other,
                })?;
            out.push(features);
        }

        debug!(sample_rate, frame_size, frames = out.len(), "features extracted");
        Ok(out)
    }

    fn analysis_for(&mut self, sample_rate: u32) -> Result<&mut Analysis> {
        let stale = self
            .analysis
            .as_ref()
            .map_or(true, |a| a.layout.sample_rate != sample_rate);
        if stale {
            // Drop the old plan before building the new one.
            self.analysis = None;
            self.analysis = Some(Analysis::build(sample_rate, &self.config)?);
        }
        self.analysis
            .as_mut()
            .ok_or_else(|| VadError::Configuration("filter bank unavailable".into()))
    }
}
