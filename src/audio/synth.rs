//! Interfaces to the external MML synthesis capability.
//!
//! MML parsing and synthesis are not done here. A player reports its
//! lifecycle through [`PlayerEvent`]s that the UI polls, and hands out a
//! [`MmlRenderer`] that can be moved onto the export worker.

use super::buffer::{AudioBuffer, BufferError};
use std::process::ExitStatus;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::thread;
use thiserror::Error;

/// Errors reported by the synthesis capability.
#[derive(Debug, Error)]
pub enum SynthError {
    /// No renderer command was configured.
    #[error("no MML renderer configured (use --renderer or MMLTUI_RENDERER)")]
    NotConfigured,
    /// The renderer command template is unusable.
    #[error("invalid renderer command: {0}")]
    InvalidCommand(String),
    /// The renderer process could not be started.
    #[error("failed to launch renderer `{program}`: {source}")]
    Launch {
        program: String,
        #[source]
        source: std::io::Error,
    },
    /// The renderer exited unsuccessfully.
    #[error("renderer exited with {status}: {stderr}")]
    RendererFailed { status: ExitStatus, stderr: String },
    /// Temporary files could not be written or removed.
    #[error("renderer I/O error: {0}")]
    Io(#[from] std::io::Error),
    /// The rendered audio could not be decoded.
    #[error(transparent)]
    Buffer(#[from] BufferError),
    /// The audio output device is unavailable.
    #[error("audio output unavailable: {0}")]
    Output(String),
    /// The background render thread could not run to completion.
    #[error("render worker failed: {0}")]
    Worker(String),
}

/// Lifecycle events emitted by a player.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PlayerEvent {
    /// The player finished initializing.
    Ready,
    /// Playback started.
    Play,
    /// Playback ended, either on request or at the end of the music.
    Stop,
    /// Playback failed; the message is absent if the capability gave none.
    Error(Option<String>),
}

/// Offline rendering of MML text into audio.
pub trait MmlRenderer: Send {
    /// Returns the estimated performance length of `mml` in seconds.
    fn duration(&mut self, mml: &str) -> Result<f64, SynthError>;

    /// Renders `mml` into a buffer lasting `duration_secs`.
    ///
    /// Returns `Ok(None)` when the capability produced no audio.
    fn render(&mut self, mml: &str, duration_secs: f64)
        -> Result<Option<AudioBuffer>, SynthError>;
}

/// Real-time playback of MML text.
pub trait MmlPlayer {
    /// Starts playing `mml`. Failures are reported as [`PlayerEvent::Error`].
    fn play(&mut self, mml: &str);

    /// Stops playback. A [`PlayerEvent::Stop`] follows if something was playing.
    fn stop(&mut self);

    /// Returns the next pending lifecycle event.
    fn poll_event(&mut self) -> Option<PlayerEvent>;

    /// Returns an independent renderer for offline export.
    fn renderer(&self) -> Box<dyn MmlRenderer>;
}

/// Result of rendering a whole performance.
pub type RenderResult = Result<Option<AudioBuffer>, SynthError>;

/// A render running on its own thread.
///
/// The renderer is asked for the performance length and then renders
/// exactly that much. Dropping the task abandons the result; the thread
/// finishes on its own.
pub struct RenderTask {
    rx: Receiver<RenderResult>,
}

impl RenderTask {
    /// Starts rendering `mml` on a new thread.
    ///
    /// # Errors
    ///
    /// Returns error if the thread cannot be spawned.
    pub fn spawn(mut renderer: Box<dyn MmlRenderer>, mml: String) -> Result<Self, SynthError> {
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("mml-render".to_string())
            .spawn(move || {
                let result = renderer
                    .duration(&mml)
                    .and_then(|duration| renderer.render(&mml, duration));
                let _ = tx.send(result);
            })
            .map_err(|e| SynthError::Worker(e.to_string()))?;

        Ok(Self { rx })
    }

    /// Returns the result once the render has finished.
    pub fn poll(&self) -> Option<RenderResult> {
        match self.rx.try_recv() {
            Ok(result) => Some(result),
            Err(TryRecvError::Empty) => None,
            Err(TryRecvError::Disconnected) => Some(Err(SynthError::Worker(
                "render thread stopped unexpectedly".to_string(),
            ))),
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use std::sync::mpsc::Sender;
    use std::time::{Duration, Instant};

    /// Renderer that blocks until the test releases it.
    pub struct GatedRenderer {
        pub gate: Receiver<()>,
        pub buffer: Option<AudioBuffer>,
    }

    impl GatedRenderer {
        /// Returns the renderer and the sender that releases it.
        pub fn new(buffer: Option<AudioBuffer>) -> (Self, Sender<()>) {
            let (release, gate) = mpsc::channel();
            (Self { gate, buffer }, release)
        }
    }

    impl MmlRenderer for GatedRenderer {
        fn duration(&mut self, _mml: &str) -> Result<f64, SynthError> {
            let _ = self.gate.recv();
            Ok(self.buffer.as_ref().map_or(0.0, |b| b.duration().as_secs_f64()))
        }

        fn render(&mut self, _mml: &str, _duration_secs: f64) -> RenderResult {
            Ok(self.buffer.clone())
        }
    }

    /// Polls `task` until it finishes or ten seconds pass.
    pub fn wait_for(task: &RenderTask) -> RenderResult {
        let deadline = Instant::now() + Duration::from_secs(10);
        loop {
            if let Some(result) = task.poll() {
                return result;
            }
            assert!(Instant::now() < deadline, "render did not finish");
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_render_task_runs_off_the_calling_thread() {
        let buffer = AudioBuffer::new(44100, vec![vec![0.25; 441]]).unwrap();
        let (renderer, release) = GatedRenderer::new(Some(buffer.clone()));

        let task = RenderTask::spawn(Box::new(renderer), "t120o5cde".to_string()).unwrap();
        // Still blocked in the renderer, but spawn has already returned
        assert!(task.poll().is_none());

        release.send(()).unwrap();
        assert_eq!(wait_for(&task).unwrap(), Some(buffer));
    }

    #[test]
    fn test_render_task_reports_missing_audio() {
        let (renderer, release) = GatedRenderer::new(None);
        release.send(()).unwrap();

        let task = RenderTask::spawn(Box::new(renderer), "cde".to_string()).unwrap();
        assert_eq!(wait_for(&task).unwrap(), None);
    }
}
