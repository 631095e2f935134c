//! Interfaces to the external MP3 encoding capability.
//!
//! [`LameEncoder`] wraps the LAME library. The export pipeline only sees
//! the [`Mp3Encoder`] trait so it can be exercised without LAME.

use mp3lame_encoder::{max_required_buffer_size, Bitrate, Builder, DualPcm, FlushNoGap};
use thiserror::Error;

/// Bytes reserved for the final flush, as recommended by LAME.
const FLUSH_BUFFER_SIZE: usize = 7200;

/// Errors reported by the encoding capability.
#[derive(Debug, Error)]
pub enum EncodeError {
    /// The encoder does not support the requested bitrate.
    #[error("unsupported bitrate: {0} kbps")]
    UnsupportedBitrate(u32),
    /// The encoder rejected its configuration.
    #[error("failed to configure MP3 encoder: {0}")]
    Configure(String),
    /// Encoding a frame or flushing failed.
    #[error("MP3 encoding failed: {0}")]
    Encode(String),
}

/// Parameters an encoder is constructed with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct EncoderSettings {
    /// Number of channels in the source audio.
    pub channels: usize,
    /// Sample rate of the source audio in Hz.
    pub sample_rate: u32,
    /// Target bitrate in kbps.
    pub bitrate_kbps: u32,
}

/// An MP3 encoder fed with left/right sample slices.
pub trait Mp3Encoder {
    /// Encodes one frame of samples, returning any bytes produced.
    fn encode_buffer(&mut self, left: &[f32], right: &[f32]) -> Result<Vec<u8>, EncodeError>;

    /// Emits any buffered output.
    fn flush(&mut self) -> Result<Vec<u8>, EncodeError>;
}

/// Creates encoders for the export worker.
pub trait EncoderFactory: Send + Sync {
    fn create(&self, settings: EncoderSettings) -> Result<Box<dyn Mp3Encoder>, EncodeError>;
}

/// Maps a kbps value onto a LAME bitrate.
fn lame_bitrate(kbps: u32) -> Result<Bitrate, EncodeError> {
    Ok(match kbps {
        8 => Bitrate::Kbps8,
        16 => Bitrate::Kbps16,
        24 => Bitrate::Kbps24,
        32 => Bitrate::Kbps32,
        40 => Bitrate::Kbps40,
        48 => Bitrate::Kbps48,
        64 => Bitrate::Kbps64,
        80 => Bitrate::Kbps80,
        96 => Bitrate::Kbps96,
        112 => Bitrate::Kbps112,
        128 => Bitrate::Kbps128,
        160 => Bitrate::Kbps160,
        192 => Bitrate::Kbps192,
        224 => Bitrate::Kbps224,
        256 => Bitrate::Kbps256,
        320 => Bitrate::Kbps320,
        other => return Err(EncodeError::UnsupportedBitrate(other)),
    })
}

/// Returns true if `kbps` is a bitrate the LAME encoder accepts.
pub fn is_supported_bitrate(kbps: u32) -> bool {
    lame_bitrate(kbps).is_ok()
}

/// Converts f32 samples (-1.0 to 1.0) to 16-bit PCM.
fn to_pcm16(samples: &[f32], out: &mut Vec<i16>) {
    out.clear();
    out.extend(
        samples
            .iter()
            .map(|s| (s * 32767.0).clamp(-32768.0, 32767.0) as i16),
    );
}

/// MP3 encoder backed by LAME.
pub struct LameEncoder {
    encoder: mp3lame_encoder::Encoder,
    left: Vec<i16>,
    right: Vec<i16>,
}

impl LameEncoder {
    /// Creates an encoder for the given source format and bitrate.
    ///
    /// # Errors
    ///
    /// Returns error if LAME rejects the channel count, sample rate or bitrate.
    pub fn new(settings: EncoderSettings) -> Result<Self, EncodeError> {
        let bitrate = lame_bitrate(settings.bitrate_kbps)?;
        let channels = u8::try_from(settings.channels)
            .map_err(|_| EncodeError::Configure(format!("{} channels", settings.channels)))?;

        let mut builder = Builder::new()
            .ok_or_else(|| EncodeError::Configure("failed to allocate LAME".to_string()))?;
        builder
            .set_num_channels(channels)
            .map_err(|e| EncodeError::Configure(format!("channels: {:?}", e)))?;
        builder
            .set_sample_rate(settings.sample_rate)
            .map_err(|e| EncodeError::Configure(format!("sample rate: {:?}", e)))?;
        builder
            .set_brate(bitrate)
            .map_err(|e| EncodeError::Configure(format!("bitrate: {:?}", e)))?;
        let encoder = builder
            .build()
            .map_err(|e| EncodeError::Configure(format!("{:?}", e)))?;

        Ok(Self {
            encoder,
            left: Vec::new(),
            right: Vec::new(),
        })
    }
}

impl Mp3Encoder for LameEncoder {
    fn encode_buffer(&mut self, left: &[f32], right: &[f32]) -> Result<Vec<u8>, EncodeError> {
        to_pcm16(left, &mut self.left);
        to_pcm16(right, &mut self.right);

        let mut out = Vec::with_capacity(max_required_buffer_size(self.left.len()));
        self.encoder
            .encode_to_vec(
                DualPcm {
                    left: &self.left,
                    right: &self.right,
                },
                &mut out,
            )
            .map_err(|e| EncodeError::Encode(format!("{:?}", e)))?;
        Ok(out)
    }

    fn flush(&mut self) -> Result<Vec<u8>, EncodeError> {
        let mut out = Vec::with_capacity(FLUSH_BUFFER_SIZE);
        self.encoder
            .flush_to_vec::<FlushNoGap>(&mut out)
            .map_err(|e| EncodeError::Encode(format!("{:?}", e)))?;
        Ok(out)
    }
}

/// Factory producing [`LameEncoder`]s.
#[derive(Debug, Clone, Copy, Default)]
pub struct LameEncoderFactory;

impl EncoderFactory for LameEncoderFactory {
    fn create(&self, settings: EncoderSettings) -> Result<Box<dyn Mp3Encoder>, EncodeError> {
        Ok(Box::new(LameEncoder::new(settings)?))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_supported_bitrates() {
        assert!(is_supported_bitrate(128));
        assert!(is_supported_bitrate(320));
        assert!(!is_supported_bitrate(100));
        assert!(matches!(
            lame_bitrate(0),
            Err(EncodeError::UnsupportedBitrate(0))
        ));
    }

    #[test]
    fn test_pcm16_conversion_clamps() {
        let mut out = Vec::new();
        to_pcm16(&[0.0, 0.5, 1.0, -1.0, 2.0, -2.0], &mut out);
        assert_eq!(out, vec![0, 16383, 32767, -32767, 32767, -32768]);
    }

    #[test]
    fn test_lame_encodes_silence() {
        let settings = EncoderSettings {
            channels: 2,
            sample_rate: 44100,
            bitrate_kbps: 128,
        };
        let mut encoder = LameEncoder::new(settings).unwrap();

        let silence = vec![0.0f32; 1152];
        let mut bytes = Vec::new();
        for _ in 0..8 {
            bytes.extend(encoder.encode_buffer(&silence, &silence).unwrap());
        }
        bytes.extend(encoder.flush().unwrap());

        assert!(!bytes.is_empty());
    }
}
