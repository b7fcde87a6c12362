//! Sample sources consumed by the feature pipeline.
//!
//! A `SampleStream` is a rewindable, sequential source of mono `f64` samples
//! at a known rate. The pipeline only borrows streams; callers own them.

pub mod dataset;
pub mod wav;

pub use dataset::list_dir;
pub use wav::WavStream;

/// Sequential, rewindable source of mono samples.
pub trait SampleStream {
    /// Sample rate in Hz. Zero means "unknown" and fails feature extraction.
    fn sample_rate(&self) -> u32;

    /// Channel count of the underlying source (samples are already mono).
    fn channel_count(&self) -> u16 {
        1
    }

    /// Total number of mono samples in the stream.
    fn sample_count(&self) -> usize;

    /// Read the next sample, or `None` at end of stream.
    fn read_next(&mut self) -> Option<f64>;

    /// Move the read position back to the first sample.
    fn rewind(&mut self);

    /// Fill `buf` from the current position and return how many samples were read.
    fn read_into(&mut self, buf: &mut [f64]) -> usize {
        let mut n = 0;
        for slot in buf.iter_mut() {
            match self.read_next() {
                Some(s) => {
                    *slot = s;
                    n += 1;
                }
                None => break,
            }
        }
        n
    }
}

/// In-memory sample stream.
#[derive(Debug, Clone)]
pub struct MemoryStream {
    samples: Vec<f64>,
    sample_rate: u32,
    channels: u16,
    position: usize,
}

impl MemoryStream {
    pub fn new(samples: Vec<f64>, sample_rate: u32) -> Self {
        Self {
            samples,
            sample_rate,
            channels: 1,
            position: 0,
        }
    }

    /// Record the channel count of the source the samples were mixed down from.
    pub fn with_source_channels(mut self, channels: u16) -> Self {
        self.channels = channels.max(1);
        self
    }

    /// Current read position (samples consumed since the last rewind).
    pub fn position(&self) -> usize {
        self.position
    }

    pub fn samples(&self) -> &[f64] {
        &self.samples
    }
}

impl SampleStream for MemoryStream {
    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn channel_count(&self) -> u16 {
        self.channels
    }

    fn sample_count(&self) -> usize {
        self.samples.len()
    }

    fn read_next(&mut self) -> Option<f64> {
        let s = self.samples.get(self.position).copied()?;
        self.position += 1;
        Some(s)
    }

    fn rewind(&mut self) {
        self.position = 0;
    }

    fn read_into(&mut self, buf: &mut [f64]) -> usize {
        let remaining = &self.samples[self.position..];
        let n = remaining.len().min(buf.len());
        buf[..n].copy_from_slice(&remaining[..n]);
        self.position += n;
        n
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn read_into_stops_at_end() {
        let mut s = MemoryStream::new(vec![1.0, 2.0, 3.0], 8_000);
        let mut buf = [0.0; 2];
        assert_eq!(s.read_into(&mut buf), 2);
        assert_eq!(buf, [1.0, 2.0]);
        assert_eq!(s.read_into(&mut buf), 1);
        assert_eq!(buf[0], 3.0);
        assert_eq!(s.read_into(&mut buf), 0);
    }

    #[test]
    fn rewind_restarts_reading() {
        let mut s = MemoryStream::new(vec![0.5, -0.5], 8_000);
        assert_eq!(s.read_next(), Some(0.5));
        assert_eq!(s.read_next(), Some(-0.5));
        assert_eq!(s.read_next(), None);
        s.rewind();
        assert_eq!(s.position(), 0);
        assert_eq!(s.read_next(), Some(0.5));
    }

    #[test]
    fn source_channels_never_zero() {
        let s = MemoryStream::new(vec![], 16_000).with_source_channels(0);
        assert_eq!(s.channel_count(), 1);
        assert_eq!(s.sample_count(), 0);
    }
}
