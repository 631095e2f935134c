//! In-memory audio produced by the MML renderer.
//!
//! An [`AudioBuffer`] holds one sample sequence per channel at a fixed
//! sample rate. It is produced once per render and consumed by playback
//! or by the MP3 export pipeline; it is never persisted.

use hound::{SampleFormat, WavReader};
use std::io::Read;
use std::path::Path;
use std::time::Duration;
use thiserror::Error;

/// Errors that can occur while building an audio buffer.
#[derive(Debug, Error)]
pub enum BufferError {
    /// A buffer needs at least one channel.
    #[error("audio buffer has no channels")]
    NoChannels,
    /// The sample rate must be positive.
    #[error("audio buffer has a zero sample rate")]
    ZeroSampleRate,
    /// Every channel must hold the same number of samples.
    #[error("channel {channel} has {actual} samples, expected {expected}")]
    MismatchedLengths {
        channel: usize,
        expected: usize,
        actual: usize,
    },
    /// The WAV data could not be decoded.
    #[error("invalid WAV data: {0}")]
    Wav(#[from] hound::Error),
}

/// Per-channel audio samples in the range -1.0 to 1.0.
#[derive(Debug, Clone, PartialEq)]
pub struct AudioBuffer {
    sample_rate: u32,
    channels: Vec<Vec<f32>>,
}

impl AudioBuffer {
    /// Creates a buffer from per-channel sample vectors.
    ///
    /// # Errors
    ///
    /// Returns error if there are no channels, the sample rate is zero,
    /// or the channels differ in length.
    pub fn new(sample_rate: u32, channels: Vec<Vec<f32>>) -> Result<Self, BufferError> {
        if sample_rate == 0 {
            return Err(BufferError::ZeroSampleRate);
        }
        let expected = channels.first().ok_or(BufferError::NoChannels)?.len();
        if let Some((channel, samples)) = channels
            .iter()
            .enumerate()
            .find(|(_, samples)| samples.len() != expected)
        {
            return Err(BufferError::MismatchedLengths {
                channel,
                expected,
                actual: samples.len(),
            });
        }

        Ok(Self {
            sample_rate,
            channels,
        })
    }

    /// Creates a buffer by splitting interleaved samples (L, R, L, R, ...).
    ///
    /// A trailing partial frame is dropped.
    pub fn from_interleaved(
        sample_rate: u32,
        channel_count: u16,
        samples: &[f32],
    ) -> Result<Self, BufferError> {
        let count = channel_count as usize;
        if count == 0 {
            return Err(BufferError::NoChannels);
        }

        let frames = samples.len() / count;
        let mut channels = vec![Vec::with_capacity(frames); count];
        for frame in samples.chunks_exact(count) {
            for (channel, sample) in channels.iter_mut().zip(frame) {
                channel.push(*sample);
            }
        }

        Self::new(sample_rate, channels)
    }

    /// Decodes a WAV stream into a buffer.
    ///
    /// Integer PCM of any bit depth is normalized to -1.0..1.0;
    /// float PCM is taken as-is.
    pub fn from_wav<R: Read>(reader: WavReader<R>) -> Result<Self, BufferError> {
        let spec = reader.spec();
        let samples: Vec<f32> = match spec.sample_format {
            SampleFormat::Float => reader.into_samples::<f32>().collect::<Result<_, _>>()?,
            SampleFormat::Int => {
                let scale = (1u64 << (spec.bits_per_sample.saturating_sub(1))) as f32;
                reader
                    .into_samples::<i32>()
                    .map(|s| s.map(|v| v as f32 / scale))
                    .collect::<Result<_, _>>()?
            }
        };

        Self::from_interleaved(spec.sample_rate, spec.channels, &samples)
    }

    /// Reads and decodes a WAV file.
    pub fn read_wav<P: AsRef<Path>>(path: P) -> Result<Self, BufferError> {
        Self::from_wav(WavReader::open(path)?)
    }

    /// Returns the number of channels.
    pub fn number_of_channels(&self) -> usize {
        self.channels.len()
    }

    /// Returns the sample rate in Hz.
    pub fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    /// Returns the number of samples in each channel.
    pub fn len(&self) -> usize {
        self.channels[0].len()
    }

    /// Returns true if the buffer holds no samples.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Returns the samples of one channel, if it exists.
    pub fn channel_data(&self, index: usize) -> Option<&[f32]> {
        self.channels.get(index).map(Vec::as_slice)
    }

    /// Returns the playback length.
    pub fn duration(&self) -> Duration {
        Duration::from_secs_f64(self.len() as f64 / self.sample_rate as f64)
    }

    /// Pads with silence or truncates so the buffer lasts `seconds`.
    pub fn fit_to_duration(mut self, seconds: f64) -> Self {
        let target = (seconds.max(0.0) * self.sample_rate as f64).round() as usize;
        for channel in &mut self.channels {
            channel.resize(target, 0.0);
        }
        self
    }

    /// Interleaves the channels for an output device.
    pub fn to_interleaved(&self) -> Vec<f32> {
        let mut out = Vec::with_capacity(self.len() * self.channels.len());
        for i in 0..self.len() {
            out.extend(self.channels.iter().map(|channel| channel[i]));
        }
        out
    }
}
