//! Audio engine for MML playback.
//!
//! Renders MML through a [`CommandRenderer`] on a background thread and
//! plays the result with rodio. Lifecycle changes are queued as
//! [`PlayerEvent`]s; the finished render and the end of the music are both
//! picked up when the UI polls for events.

use super::buffer::AudioBuffer;
use super::command::CommandRenderer;
use super::synth::{MmlPlayer, MmlRenderer, PlayerEvent, RenderResult, RenderTask, SynthError};
use rodio::buffer::SamplesBuffer;
use rodio::{OutputStream, OutputStreamHandle, Sink};
use std::collections::VecDeque;

/// The MML player backed by the default audio output device.
pub struct AudioEngine {
    /// Renderer used for playback (and cloned for export).
    renderer: CommandRenderer,
    /// Audio output stream (must be kept alive).
    _stream: OutputStream,
    /// Audio output handle for creating sinks.
    stream_handle: OutputStreamHandle,
    /// Render in progress for the next performance.
    pending: Option<RenderTask>,
    /// Sink of the performance currently playing.
    sink: Option<Sink>,
    /// Events not yet picked up by the UI.
    events: VecDeque<PlayerEvent>,
}

impl AudioEngine {
    /// Creates a new engine and queues the `Ready` event.
    ///
    /// # Errors
    ///
    /// Returns error if audio output cannot be initialized.
    pub fn new(renderer: CommandRenderer) -> Result<Self, SynthError> {
        let (stream, stream_handle) =
            OutputStream::try_default().map_err(|e| SynthError::Output(e.to_string()))?;

        let mut events = VecDeque::new();
        events.push_back(PlayerEvent::Ready);

        Ok(Self {
            renderer,
            _stream: stream,
            stream_handle,
            pending: None,
            sink: None,
            events,
        })
    }

    /// Returns whether a performance is currently playing.
    pub fn is_playing(&self) -> bool {
        self.sink.is_some()
    }

    /// Starts the sink for a finished render, or reports why it cannot.
    fn finish_render(&mut self, result: RenderResult) {
        match result.and_then(|buffer| match buffer {
            Some(buffer) => self.start(buffer).map(|()| true),
            None => Ok(false),
        }) {
            Ok(true) => {
                tracing::info!("Playback started");
                self.events.push_back(PlayerEvent::Play);
            }
            Ok(false) => {
                tracing::warn!("Renderer produced no audio");
                self.events.push_back(PlayerEvent::Error(None));
            }
            Err(e) => {
                tracing::error!("Playback failed: {}", e);
                self.events.push_back(PlayerEvent::Error(Some(e.to_string())));
            }
        }
    }

    fn start(&mut self, buffer: AudioBuffer) -> Result<(), SynthError> {
        let sink =
            Sink::try_new(&self.stream_handle).map_err(|e| SynthError::Output(e.to_string()))?;
        sink.append(SamplesBuffer::new(
            buffer.number_of_channels() as u16,
            buffer.sample_rate(),
            buffer.to_interleaved(),
        ));
        sink.play();
        self.sink = Some(sink);
        Ok(())
    }
}

impl MmlPlayer for AudioEngine {
    fn play(&mut self, mml: &str) {
        if self.is_playing() || self.pending.is_some() {
            return;
        }

        match RenderTask::spawn(self.renderer(), mml.to_string()) {
            Ok(task) => {
                tracing::debug!("Rendering MML for playback");
                self.pending = Some(task);
            }
            Err(e) => {
                tracing::error!("Playback failed: {}", e);
                self.events.push_back(PlayerEvent::Error(Some(e.to_string())));
            }
        }
    }

    fn stop(&mut self) {
        if self.pending.take().is_some() {
            tracing::info!("Playback cancelled while rendering");
            self.events.push_back(PlayerEvent::Stop);
        } else if let Some(sink) = self.sink.take() {
            sink.stop();
            tracing::info!("Playback stopped");
            self.events.push_back(PlayerEvent::Stop);
        }
    }

    fn poll_event(&mut self) -> Option<PlayerEvent> {
        if let Some(result) = self.pending.as_ref().and_then(RenderTask::poll) {
            self.pending = None;
            self.finish_render(result);
        }
        if self.sink.as_ref().is_some_and(Sink::empty) {
            self.sink = None;
            tracing::info!("Playback reached the end");
            self.events.push_back(PlayerEvent::Stop);
        }
        self.events.pop_front()
    }

    fn renderer(&self) -> Box<dyn MmlRenderer> {
        Box::new(self.renderer.detached())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::{Duration, Instant};

    #[test]
    #[ignore] // Requires an audio output device
    fn test_engine_reports_ready_first() {
        let renderer = CommandRenderer::new("true {input} {output}").unwrap();
        let mut engine = AudioEngine::new(renderer).unwrap();
        assert_eq!(engine.poll_event(), Some(PlayerEvent::Ready));
        assert_eq!(engine.poll_event(), None);

        // A renderer that writes nothing surfaces as a message-less error
        engine.play("cde");
        let deadline = Instant::now() + Duration::from_secs(10);
        let event = loop {
            if let Some(event) = engine.poll_event() {
                break event;
            }
            assert!(Instant::now() < deadline, "render did not finish");
            std::thread::sleep(Duration::from_millis(5));
        };
        assert_eq!(event, PlayerEvent::Error(None));
        assert!(!engine.is_playing());
    }
}
