//! Audio side of the application.
//!
//! Synthesis and MP3 encoding are external capabilities reached through
//! traits. This module provides:
//! - The [`MmlPlayer`] / [`MmlRenderer`] and [`Mp3Encoder`] interfaces
//! - A command-line renderer adapter and a rodio-backed player
//! - A LAME-backed encoder
//! - The MP3 export pipeline

pub mod buffer;
pub mod command;
pub mod encoder;
pub mod engine;
pub mod export;
pub mod synth;

pub use buffer::AudioBuffer;
pub use command::CommandRenderer;
pub use encoder::{EncoderFactory, LameEncoderFactory, Mp3Encoder};
pub use engine::AudioEngine;
pub use export::{export_to_mp3, DirectorySink, ExportError};
pub use synth::{MmlPlayer, MmlRenderer, PlayerEvent, RenderTask, SynthError};
