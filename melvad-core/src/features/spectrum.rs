//! Magnitude spectrum of a single frame.

use std::sync::Arc;

use rustfft::{num_complex::Complex, Fft, FftPlanner};

use crate::error::{Result, VadError};

/// Computes the non-redundant half of a frame's magnitude spectrum.
///
/// The FFT plan and its buffers are owned by the analyzer and reused for every
/// frame; they are released when the analyzer is dropped.
pub struct SpectralAnalyzer {
    frame_size: usize,
    fft: Arc<dyn Fft<f64>>,
    buffer: Vec<Complex<f64>>,
    scratch: Vec<Complex<f64>>,
}

impl SpectralAnalyzer {
    /// # Errors
    /// `VadError::Configuration` if `frame_size` is zero.
    pub fn new(frame_size: usize) -> Result<Self> {
        if frame_size == 0 {
            return Err(VadError::Configuration("frame size is zero".into()));
        }
        let fft = FftPlanner::<f64>::new().plan_fft_forward(frame_size);
        let scratch = vec![Complex::new(0.0, 0.0); fft.get_inplace_scratch_len()];
        Ok(Self {
            frame_size,
            fft,
            buffer: vec![Complex::new(0.0, 0.0); frame_size],
            scratch,
        })
    }

    pub fn frame_size(&self) -> usize {
        self.frame_size
    }

    /// Forward transform of `frame`, returning `|X[k]|` for `k < frame_size / 2`.
    ///
    /// A frame shorter than `frame_size` is zero-padded.
    ///
    /// # Errors
    /// `VadError::DimensionMismatch` if the frame is longer than `frame_size`.
    pub fn analyze(&mut self, frame: &[f64]) -> Result<Vec<f64>> {
        if frame.len() > self.frame_size {
            return Err(VadError::DimensionMismatch {
                expected: self.frame_size,
                actual: frame.len(),
            });
        }
        for (i, slot) in self.buffer.iter_mut().enumerate() {
            *slot = Complex::new(frame.get(i).copied().unwrap_or(0.0), 0.0);
        }
        self.fft.process_with_scratch(&mut self.buffer, &mut self.scratch);

        Ok(self.buffer[..self.frame_size / 2]
            .iter()
            .map(|c| c.norm())
            .collect())
    }
}

impl std::fmt::Debug for SpectralAnalyzer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpectralAnalyzer")
            .field("frame_size", &self.frame_size)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use std::f64::consts::PI;

    #[test]
    fn keeps_first_half() {
        let mut a = SpectralAnalyzer::new(160).unwrap();
        assert_eq!(a.analyze(&[0.0; 160]).unwrap().len(), 80);
        let mut odd = SpectralAnalyzer::new(7).unwrap();
        assert_eq!(odd.analyze(&[0.0; 7]).unwrap().len(), 3);
    }

    #[test]
    fn dc_energy_lands_in_bin_zero() {
        let mut a = SpectralAnalyzer::new(64).unwrap();
        let mag = a.analyze(&[0.5; 64]).unwrap();
        assert_abs_diff_eq!(mag[0], 32.0, epsilon = 1e-9);
        for m in &mag[1..] {
            assert_abs_diff_eq!(*m, 0.0, epsilon = 1e-9);
        }
    }

    #[test]
    fn sine_peaks_at_its_bin() {
        let n = 128;
        let k = 10;
        let frame: Vec<f64> = (0..n)
            .map(|i| (2.0 * PI * k as f64 * i as f64 / n as f64).sin())
            .collect();
        let mut a = SpectralAnalyzer::new(n).unwrap();
        let mag = a.analyze(&frame).unwrap();
        let peak = mag
            .iter()
            .enumerate()
            .max_by(|a, b| a.1.total_cmp(b.1))
            .map(|(i, _)| i)
            .unwrap();
        assert_eq!(peak, k);
        assert_abs_diff_eq!(mag[k], n as f64 / 2.0, epsilon = 1e-6);
    }

    #[test]
    fn short_frame_is_padded_and_long_frame_rejected() {
        let mut a = SpectralAnalyzer::new(8).unwrap();
        let padded = a.analyze(&[1.0, 1.0]).unwrap();
        assert_abs_diff_eq!(padded[0], 2.0, epsilon = 1e-12);
        assert!(matches!(
            a.analyze(&[0.0; 9]),
            Err(VadError::DimensionMismatch { expected: 8, actual: 9 })
        ));
    }

    #[test]
    fn reuse_is_deterministic() {
        let mut a = SpectralAnalyzer::new(32).unwrap();
        let frame: Vec<f64> = (0..32).map(|i| (i as f64 * 0.37).cos()).collect();
        let first = a.analyze(&frame).unwrap();
        let _ = a.analyze(&[0.0; 32]).unwrap();
        assert_eq!(a.analyze(&frame).unwrap(), first);
    }

    #[test]
    fn zero_frame_size_is_configuration_error() {
        assert!(matches!(
            SpectralAnalyzer::new(0),
            Err(VadError::Configuration(_))
        ));
    }
}
