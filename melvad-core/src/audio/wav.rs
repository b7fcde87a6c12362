//! WAV-file sample stream backed by `hound`.
//!
//! The whole file is decoded on open and mixed down to mono, so rewinding is
//! free and the file handle is closed before the first read.

use std::path::{Path, PathBuf};

use tracing::info;

use super::{MemoryStream, SampleStream};
use crate::error::{Result, VadError};

/// A decoded WAV file exposed as a mono `SampleStream`.
#[derive(Debug, Clone)]
pub struct WavStream {
    path: PathBuf,
    inner: MemoryStream,
}

impl WavStream {
    /// Decode `path` into memory.
    ///
    /// Integer PCM is normalized to `[-1.0, 1.0]`; float PCM is taken as-is.
    /// Interleaved channels are averaged into one.
    ///
    /// # Errors
    /// `VadError::AudioDecode` if the file is missing or not a readable WAV.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let mut reader = hound::WavReader::open(path)
            .map_err(|e| VadError::AudioDecode(format!("{}: {e}", path.display())))?;
        let spec = reader.spec();
        let channels = usize::from(spec.channels.max(1));
        let decode_err = |e: hound::Error| VadError::AudioDecode(format!("{}: {e}", path.display()));

        let interleaved: Vec<f64> = match spec.sample_format {
            hound::SampleFormat::Float => reader
                .samples::<f32>()
                .map(|s| s.map(f64::from).map_err(decode_err))
                .collect::<Result<Vec<_>>>()?,
            hound::SampleFormat::Int => {
                let max = ((1_i64 << (spec.bits_per_sample.max(1) - 1)) - 1).max(1) as f64;
                reader
                    .samples::<i32>()
                    .map(|s| s.map(|v| v as f64 / max).map_err(decode_err))
                    .collect::<Result<Vec<_>>>()?
            }
        };

        let mono = if channels == 1 {
            interleaved
        } else {
            interleaved
                .chunks(channels)
                .map(|frame| frame.iter().sum::<f64>() / channels as f64)
                .collect()
        };

        info!(
            file = %path.display(),
            channels = spec.channels,
            sample_rate = spec.sample_rate,
            sample_count = mono.len(),
            "opened wav stream"
        );

        Ok(Self {
            path: path.to_path_buf(),
            inner: MemoryStream::new(mono, spec.sample_rate).with_source_channels(spec.channels),
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl SampleStream for WavStream {
    fn sample_rate(&self) -> u32 {
        self.inner.sample_rate()
    }

    fn channel_count(&self) -> u16 {
        self.inner.channel_count()
    }

    fn sample_count(&self) -> usize {
        self.inner.sample_count()
    }

    fn read_next(&mut self) -> Option<f64> {
        self.inner.read_next()
    }

    fn rewind(&mut self) {
        self.inner.rewind();
    }

    fn read_into(&mut self, buf: &mut [f64]) -> usize {
        self.inner.read_into(buf)
    }
}
