//! Fixed-size, non-overlapping framing of a sample stream.

use crate::audio::SampleStream;
use crate::error::{Result, VadError};

/// Frame geometry derived from a sample rate and a frame duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FrameLayout {
    pub sample_rate: u32,
    pub duration_ms: u32,
    /// `round(sample_rate * duration_ms / 1000)`, always > 0.
    pub frame_size: usize,
}

impl FrameLayout {
    /// # Errors
    /// `VadError::Configuration` when the rate or duration is zero or the
    /// product rounds to an empty frame.
    pub fn new(sample_rate: u32, duration_ms: u32) -> Result<Self> {
        if sample_rate == 0 {
            return Err(VadError::Configuration("sample rate is zero".into()));
        }
        if duration_ms == 0 {
            return Err(VadError::Configuration("frame duration is zero".into()));
        }
        let frame_size = (f64::from(sample_rate) * f64::from(duration_ms) / 1000.0).round() as usize;
        if frame_size == 0 {
            return Err(VadError::Configuration(format!(
                "{duration_ms} ms at {sample_rate} Hz gives an empty frame"
            )));
        }
        Ok(Self {
            sample_rate,
            duration_ms,
            frame_size,
        })
    }

    /// Number of non-redundant spectrum bins kept per frame.
    pub fn bins(&self) -> usize {
        self.frame_size / 2
    }

    /// Frequency spacing between adjacent bins, in Hz.
    pub fn bin_hz(&self) -> f64 {
        1000.0 / f64::from(self.duration_ms)
    }

    /// Start offset of frame `index` in milliseconds.
    pub fn frame_start_ms(&self, index: usize) -> f64 {
        index as f64 * self.frame_size as f64 * 1000.0 / f64::from(self.sample_rate)
    }
}

/// Lazy iterator of zero-padded frames read from the stream's current position.
///
/// Yields `ceil(N / frame_size)` frames for `N` remaining samples. Restart by
/// rewinding the stream.
pub struct Frames<'a, S: SampleStream + ?Sized> {
    stream: &'a mut S,
    frame_size: usize,
    done: bool,
}

impl<'a, S: SampleStream + ?Sized> Frames<'a, S> {
    pub fn new(stream: &'a mut S, frame_size: usize) -> Self {
        Self {
            stream,
            frame_size,
            done: frame_size == 0,
        }
    }
}

impl<S: SampleStream + ?Sized> Iterator for Frames<'_, S> {
    type Item = Vec<f64>;

    fn next(&mut self) -> Option<Vec<f64>> {
        if self.done {
            return None;
        }
        let mut frame = vec![0.0; self.frame_size];
        let n = self.stream.read_into(&mut frame);
        if n < self.frame_size {
            self.done = true;
        }
        // Samples past `n` stay zero.
        (n > 0).then_some(frame)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::MemoryStream;

    fn ramp(n: usize) -> MemoryStream {
        MemoryStream::new((1..=n).map(|i| i as f64).collect(), 1_000)
    }

    #[test]
    fn frame_count_is_ceiling() {
        for (n, f) in [(10, 5), (11, 5), (14, 5), (1, 5), (5, 5), (7, 1)] {
            let mut s = ramp(n);
            let count = Frames::new(&mut s, f).count();
            assert_eq!(count, n.div_ceil(f), "n={n} f={f}");
        }
    }

    #[test]
    fn last_frame_is_zero_padded() {
        let mut s = ramp(7);
        let frames: Vec<_> = Frames::new(&mut s, 4).collect();
        assert_eq!(frames.len(), 2);
        assert_eq!(frames[0], vec![1.0, 2.0, 3.0, 4.0]);
        assert_eq!(frames[1], vec![5.0, 6.0, 7.0, 0.0]);
    }

    #[test]
    fn short_stream_yields_one_padded_frame() {
        let mut s = ramp(2);
        let frames: Vec<_> = Frames::new(&mut s, 6).collect();
        assert_eq!(frames, vec![vec![1.0, 2.0, 0.0, 0.0, 0.0, 0.0]]);
    }

    #[test]
    fn empty_stream_yields_nothing() {
        let mut s = MemoryStream::new(vec![], 8_000);
        assert_eq!(Frames::new(&mut s, 4).count(), 0);
    }

    #[test]
    fn restart_after_rewind() {
        let mut s = ramp(6);
        let first: Vec<_> = Frames::new(&mut s, 4).collect();
        s.rewind();
        let second: Vec<_> = Frames::new(&mut s, 4).collect();
        assert_eq!(first, second);
    }

    #[test]
    fn layout_rounds_frame_size() {
        let layout = FrameLayout::new(22_050, 10).unwrap();
        // 220.5 rounds away from zero
        assert_eq!(layout.frame_size, 221);
        assert_eq!(layout.bins(), 110);
        assert_eq!(FrameLayout::new(16_000, 20).unwrap().frame_size, 320);
    }

    #[test]
    fn layout_rejects_degenerate_input() {
        assert!(matches!(FrameLayout::new(0, 20), Err(VadError::Configuration(_))));
        assert!(matches!(FrameLayout::new(16_000, 0), Err(VadError::Configuration(_))));
        assert!(matches!(FrameLayout::new(100, 1), Err(VadError::Configuration(_))));
    }
}
