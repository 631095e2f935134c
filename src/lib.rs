//! mmltui - A terminal-based MML player and MP3 exporter.
//!
//! This library provides the core functionality for the MML player app.

pub mod app;
pub mod audio;
pub mod controller;
pub mod editor;
pub mod ui;

// Re-export commonly used types
pub use app::{App, ExportSettings};
pub use audio::{engine::AudioEngine, export::export_to_mp3};
pub use controller::{Command, Controller, Input, SessionState};
pub use editor::MmlEditor;
