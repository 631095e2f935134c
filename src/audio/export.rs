//! MP3 export functionality.
//!
//! Renders MML through the synthesis capability, encodes the audio in
//! fixed-size frames and writes the result as `mml_music.mp3`.

use super::buffer::AudioBuffer;
use super::encoder::{EncodeError, EncoderFactory, EncoderSettings, Mp3Encoder};
use super::synth::{MmlRenderer, SynthError};
use std::fs;
use std::path::{Path, PathBuf};
use thiserror::Error;
use uuid::Uuid;

/// Samples per encoder call, the MPEG-1 Layer III frame granularity.
pub const FRAME_SIZE: usize = 1152;

/// Extra render time appended to the estimated duration.
pub const RENDER_MARGIN_SECS: f64 = 1.0;

/// Bitrate used when none is configured.
pub const DEFAULT_BITRATE_KBPS: u32 = 128;

/// File name of the exported artifact.
pub const EXPORT_FILE_NAME: &str = "mml_music.mp3";

/// MIME type of the exported artifact.
pub const MP3_MIME_TYPE: &str = "audio/mp3";

/// Errors that can occur during export.
#[derive(Debug, Error)]
pub enum ExportError {
    /// The renderer returned no audio.
    #[error("Failed to render MML.")]
    RenderFailure,
    #[error(transparent)]
    Synth(#[from] SynthError),
    #[error(transparent)]
    Encode(#[from] EncodeError),
    /// The artifact could not be written.
    #[error("failed to write {}: {source}", path.display())]
    Delivery {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    /// The export worker could not be started or stopped unexpectedly.
    #[error("export worker failed: {0}")]
    Worker(String),
}

/// The encoded file, ready for delivery.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Mp3Artifact {
    pub file_name: String,
    pub mime_type: &'static str,
    pub bytes: Vec<u8>,
}

impl Mp3Artifact {
    /// Wraps encoded bytes under the standard export file name.
    pub fn new(bytes: Vec<u8>) -> Self {
        Self {
            file_name: EXPORT_FILE_NAME.to_string(),
            mime_type: MP3_MIME_TYPE,
            bytes,
        }
    }
}

/// Destination for exported artifacts.
pub trait ArtifactSink {
    /// Delivers the artifact, returning where it ended up.
    fn deliver(&mut self, artifact: &Mp3Artifact) -> Result<PathBuf, ExportError>;
}

/// Builds a `map_err` adapter tagging I/O errors with `path`.
fn delivery_error(path: &Path) -> impl FnOnce(std::io::Error) -> ExportError {
    let path = path.to_path_buf();
    move |source| ExportError::Delivery { path, source }
}

/// Writes artifacts into a directory.
///
/// The bytes go to a uniquely named temporary file first, which is then
/// renamed over the final name.
#[derive(Debug, Clone)]
pub struct DirectorySink {
    dir: PathBuf,
}

impl DirectorySink {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }
}

impl ArtifactSink for DirectorySink {
    fn deliver(&mut self, artifact: &Mp3Artifact) -> Result<PathBuf, ExportError> {
        fs::create_dir_all(&self.dir).map_err(delivery_error(&self.dir))?;

        let final_path = self.dir.join(&artifact.file_name);
        let temp_path = self
            .dir
            .join(format!(".{}.{}.part", artifact.file_name, Uuid::new_v4()));

        fs::write(&temp_path, &artifact.bytes).map_err(delivery_error(&temp_path))?;
        if let Err(source) = fs::rename(&temp_path, &final_path) {
            let _ = fs::remove_file(&temp_path);
            return Err(ExportError::Delivery {
                path: final_path,
                source,
            });
        }

        tracing::info!(
            "Wrote {} ({}, {} bytes)",
            final_path.display(),
            artifact.mime_type,
            artifact.bytes.len()
        );
        Ok(final_path)
    }
}

/// Encodes a buffer frame by frame and returns the concatenated MP3 bytes.
///
/// A mono buffer is fed to the encoder as identical left and right
/// channels. Empty chunks are skipped; the encoder is flushed once at the
/// end.
///
/// # Arguments
///
/// * `buffer` - The rendered audio
/// * `encoder` - Encoder configured for the buffer's format
/// * `progress_callback` - Optional callback for progress updates (0.0 to 1.0)
pub fn encode_frames<F>(
    buffer: &AudioBuffer,
    encoder: &mut dyn Mp3Encoder,
    mut progress_callback: Option<F>,
) -> Result<Vec<u8>, EncodeError>
where
    F: FnMut(f32),
{
    let empty: &[f32] = &[];
    let left = buffer.channel_data(0).unwrap_or(empty);
    let right = buffer.channel_data(1).unwrap_or(left);

    let mut chunks: Vec<Vec<u8>> = Vec::new();
    let mut frames = 0usize;

    for start in (0..left.len()).step_by(FRAME_SIZE) {
        let end = (start + FRAME_SIZE).min(left.len());
        let chunk = encoder.encode_buffer(&left[start..end], &right[start..end])?;
        if !chunk.is_empty() {
            chunks.push(chunk);
        }
        frames += 1;

        if let Some(ref mut callback) = progress_callback {
            callback(end as f32 / left.len() as f32);
        }
    }

    let tail = encoder.flush()?;
    if !tail.is_empty() {
        chunks.push(tail);
    }

    tracing::debug!("Encoded {} frames into {} chunks", frames, chunks.len());
    Ok(chunks.concat())
}

/// Exports MML text to an MP3 file.
///
/// Asks the renderer for the performance length, renders it with a
/// one-second margin, encodes it and hands the artifact to `sink`.
///
/// # Arguments
///
/// * `mml` - The MML source text
/// * `renderer` - Synthesis capability used for rendering
/// * `encoders` - Creates the MP3 encoder for the rendered format
/// * `sink` - Where the finished file is written
/// * `bitrate_kbps` - MP3 bitrate
/// * `progress_callback` - Optional callback for progress updates (0.0 to 1.0)
///
/// # Returns
///
/// The path the artifact was delivered to
///
/// # Errors
///
/// Returns error if:
/// - The renderer fails or returns no audio
/// - The encoder cannot be created or fails
/// - The file cannot be written
pub fn export_to_mp3<F>(
    mml: &str,
    renderer: &mut dyn MmlRenderer,
    encoders: &dyn EncoderFactory,
    sink: &mut dyn ArtifactSink,
    bitrate_kbps: u32,
    progress_callback: Option<F>,
) -> Result<PathBuf, ExportError>
where
    F: FnMut(f32),
{
    let duration = renderer.duration(mml)? + RENDER_MARGIN_SECS;
    tracing::info!("Rendering {:.2}s of audio for export", duration);

    let buffer = renderer
        .render(mml, duration)?
        .ok_or(ExportError::RenderFailure)?;

    // Only the first two channels are encoded.
    let mut encoder = encoders.create(EncoderSettings {
        channels: buffer.number_of_channels().min(2),
        sample_rate: buffer.sample_rate(),
        bitrate_kbps,
    })?;

    let bytes = encode_frames(&buffer, encoder.as_mut(), progress_callback)?;
    sink.deliver(&Mp3Artifact::new(bytes))
}
