//! Triangular mel-spaced filter bank and log-energy aggregation.
//!
//! ## Construction
//!
//! `filters_count + 2` boundary frequencies are spaced uniformly on the mel
//! scale between 0 Hz and Nyquist. Filter `i` rises linearly from `B[i]` to a
//! peak of 1 at `B[i+1]` and falls back to 0 at `B[i+2]`. Bin `k` sits at
//! `k * 1000 / duration_ms` Hz.

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::framer::FrameLayout;
use crate::error::{Result, VadError};

/// Smallest filter energy fed to the logarithm under `ZeroEnergyPolicy::Floor`.
pub const MIN_FILTER_ENERGY: f64 = 1e-10;

/// `MIN_FILTER_ENERGY.ln()`: the value a silent filter produces.
pub const MIN_FEATURE_VALUE: f64 = -23.025_850_929_940_457;

/// What to do when a filter collects zero energy (e.g. digital silence).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ZeroEnergyPolicy {
    /// Clamp the energy to `MIN_FILTER_ENERGY` before taking the log.
    #[default]
    Floor,
    /// Fail with `VadError::DegenerateInput`.
    Reject,
}

pub fn hz_to_mel(hz: f64) -> f64 {
    1127.0 * (1.0 + hz / 700.0).ln()
}

pub fn mel_to_hz(mel: f64) -> f64 {
    700.0 * ((mel / 1127.0).exp() - 1.0)
}

/// Weight of the triangle `(lower, center, upper)` at frequency `freq`.
pub fn triangle_weight(lower: f64, center: f64, upper: f64, freq: f64) -> f64 {
    if lower <= freq && freq <= center {
        (freq - lower) / (center - lower)
    } else if center <= freq && freq <= upper {
        (upper - freq) / (upper - center)
    } else {
        0.0
    }
}

/// Immutable bank of `filters_count` triangular filters over `frame_size / 2` bins.
#[derive(Debug, Clone)]
pub struct MelFilterBank {
    boundaries: Vec<f64>,
    filters: Vec<Vec<f64>>,
    bins: usize,
}

impl MelFilterBank {
    /// # Errors
    /// `VadError::Configuration` if `filters_count` is zero.
    pub fn new(layout: &FrameLayout, filters_count: usize) -> Result<Self> {
        if filters_count == 0 {
            return Err(VadError::Configuration("filter count is zero".into()));
        }

        let mel_low = hz_to_mel(0.0);
        let mel_high = hz_to_mel(f64::from(layout.sample_rate) / 2.0);
        let step = (mel_high - mel_low) / (filters_count + 1) as f64;
        let boundaries: Vec<f64> = (0..filters_count + 2)
            .map(|i| mel_to_hz(mel_low + i as f64 * step))
            .collect();

        let bins = layout.bins();
        let bin_hz = layout.bin_hz();
        let filters = boundaries
            .windows(3)
            .map(|b| {
                (0..bins)
                    .map(|k| triangle_weight(b[0], b[1], b[2], k as f64 * bin_hz))
                    .collect()
            })
            .collect();

        debug!(
            sample_rate = layout.sample_rate,
            frame_size = layout.frame_size,
            filters_count,
            "mel filter bank built"
        );

        Ok(Self {
            boundaries,
            filters,
            bins,
        })
    }

    pub fn filters_count(&self) -> usize {
        self.filters.len()
    }

    /// Number of spectrum bins each filter spans.
    pub fn bins(&self) -> usize {
        self.bins
    }

    /// The `filters_count + 2` boundary frequencies in Hz.
    pub fn boundaries(&self) -> &[f64] {
        &self.boundaries
    }

    pub fn filters(&self) -> &[Vec<f64>] {
        &self.filters
    }

    /// Weighted spectral energy under each filter.
    ///
    /// # Errors
    /// `VadError::DimensionMismatch` if `spectrum` does not have `bins()` values.
    pub fn energies(&self, spectrum: &[f64]) -> Result<Vec<f64>> {
        if spectrum.len() != self.bins {
            return Err(VadError::DimensionMismatch {
                expected: self.bins,
                actual: spectrum.len(),
            });
        }
        Ok(self
            .filters
            .iter()
            .map(|w| w.iter().zip(spectrum).map(|(w, m)| w * m).sum())
            .collect())
    }

    /// Natural log of each filter energy, guarded by `policy`.
    ///
    /// # Errors
    /// - `VadError::DimensionMismatch` on a wrong-length spectrum.
    /// - `VadError::DegenerateInput` for a non-finite energy, or a zero energy
    ///   under `ZeroEnergyPolicy::Reject`. The reported `frame` is 0; the
    ///   pipeline fills in the real index.
    pub fn apply(&self, spectrum: &[f64], policy: ZeroEnergyPolicy) -> Result<Vec<f64>> {
        self.energies(spectrum)?
            .into_iter()
            .enumerate()
            .map(|(filter, energy)| {
                let degenerate = VadError::DegenerateInput { frame: 0, filter };
                if !energy.is_finite() {
                    return Err(degenerate);
                }
                match policy {
                    ZeroEnergyPolicy::Reject if energy <= 0.0 => Err(degenerate),
                    _ if energy <= MIN_FILTER_ENERGY => Ok(MIN_FEATURE_VALUE),
                    _ => Ok(energy.ln()),
                }
            })
            .collect()
    }
}
