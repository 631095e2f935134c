//! Application state and event handling.
//!
//! This module defines the main application state that coordinates
//! between the MML editor, the player, the export worker and the TUI.

use crate::audio::export::{export_to_mp3, DirectorySink, DEFAULT_BITRATE_KBPS};
use crate::audio::{EncoderFactory, ExportError, MmlPlayer, PlayerEvent, SynthError};
use crate::controller::{Command, Controller, Input};
use crate::editor::MmlEditor;
use ratatui::layout::Rect;
use std::path::PathBuf;
use std::sync::mpsc::{self, Receiver, TryRecvError};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Where and how exports are written.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ExportSettings {
    /// Directory receiving `mml_music.mp3`.
    pub output_dir: PathBuf,
    /// MP3 bitrate in kbps.
    pub bitrate_kbps: u32,
}

impl Default for ExportSettings {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("output"),
            bitrate_kbps: DEFAULT_BITRATE_KBPS,
        }
    }
}

/// Messages posted by the export worker.
#[derive(Debug)]
pub enum ExportMessage {
    Progress(f32),
    Finished(Result<PathBuf, ExportError>),
}

/// The on-screen buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Button {
    Play,
    Stop,
    Export,
}

/// Layout regions for mouse hit testing.
/// Stores the screen coordinates of each clickable element.
#[derive(Debug, Clone, Copy, Default)]
pub struct LayoutRegions {
    pub play_button: Rect,
    pub stop_button: Rect,
    pub export_button: Rect,
    /// The text area inside the editor border.
    pub editor: Rect,
}

impl LayoutRegions {
    /// Returns the button at the given screen coordinates.
    pub fn button_at(&self, x: u16, y: u16) -> Option<Button> {
        if contains(self.play_button, x, y) {
            Some(Button::Play)
        } else if contains(self.stop_button, x, y) {
            Some(Button::Stop)
        } else if contains(self.export_button, x, y) {
            Some(Button::Export)
        } else {
            None
        }
    }

    /// Checks if a point is within the editor text area.
    pub fn is_in_editor(&self, x: u16, y: u16) -> bool {
        contains(self.editor, x, y)
    }
}

/// Checks if a point is within a rectangle.
fn contains(rect: Rect, x: u16, y: u16) -> bool {
    x >= rect.x && x < rect.x + rect.width && y >= rect.y && y < rect.y + rect.height
}

/// Main application state.
pub struct App {
    /// Playback/export state machine.
    controller: Controller,
    /// The MML source being edited.
    pub editor: MmlEditor,
    /// The player, absent if it failed to initialize.
    player: Option<Box<dyn MmlPlayer>>,
    /// Creates MP3 encoders for export workers.
    encoders: Arc<dyn EncoderFactory>,
    /// Export destination and bitrate.
    pub export_settings: ExportSettings,
    /// Channel from the running export worker, if any.
    export_rx: Option<Receiver<ExportMessage>>,
    /// Layout regions for mouse hit testing (updated each frame).
    pub layout: LayoutRegions,
    /// Whether the help overlay is visible.
    pub show_help: bool,
    /// Help overlay scroll offset.
    pub help_scroll: u16,
}

impl App {
    /// Creates a new application.
    ///
    /// A player construction error is not fatal: the app starts with all
    /// controls disabled and the reason in the status line.
    ///
    /// # Arguments
    ///
    /// * `player` - The player, or the error from constructing it
    /// * `encoders` - Encoder factory used by exports
    /// * `export_settings` - Output directory and bitrate
    pub fn new(
        player: Result<Box<dyn MmlPlayer>, SynthError>,
        encoders: Arc<dyn EncoderFactory>,
        export_settings: ExportSettings,
    ) -> Self {
        let mut controller = Controller::new();
        let player = match player {
            Ok(player) => Some(player),
            Err(e) => {
                controller.handle(Input::PlayerFailed(e.to_string()));
                None
            }
        };

        Self {
            controller,
            editor: MmlEditor::new(),
            player,
            encoders,
            export_settings,
            export_rx: None,
            layout: LayoutRegions::default(),
            show_help: false,
            help_scroll: 0,
        }
    }

    /// Returns the state machine.
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Updates the layout regions (called during rendering).
    pub fn update_layout(&mut self, layout: LayoutRegions) {
        self.layout = layout;
    }

    /// Feeds an input to the controller and carries out its command.
    fn dispatch(&mut self, input: Input) {
        if let Some(command) = self.controller.handle(input) {
            self.execute(command);
        }
    }

    fn execute(&mut self, command: Command) {
        match command {
            Command::Play(mml) => {
                if let Some(player) = self.player.as_mut() {
                    player.play(&mml);
                }
            }
            Command::Stop => {
                if let Some(player) = self.player.as_mut() {
                    player.stop();
                }
            }
            Command::Export(mml) => {
                if let Err(e) = self.spawn_export(mml) {
                    self.dispatch(Input::ExportFinished(Err(e)));
                }
            }
        }
    }

    /// Starts the export pipeline on a worker thread.
    fn spawn_export(&mut self, mml: String) -> Result<(), ExportError> {
        let mut renderer = self
            .player
            .as_ref()
            .ok_or_else(|| ExportError::Worker("no player available".to_string()))?
            .renderer();
        let encoders = Arc::clone(&self.encoders);
        let settings = self.export_settings.clone();
        let (tx, rx) = mpsc::channel();

        thread::Builder::new()
            .name("mp3-export".to_string())
            .spawn(move || {
                let progress_tx = tx.clone();
                let mut last_percent = None;
                let mut sink = DirectorySink::new(&settings.output_dir);
                let result = export_to_mp3(
                    &mml,
                    renderer.as_mut(),
                    encoders.as_ref(),
                    &mut sink,
                    settings.bitrate_kbps,
                    Some(|fraction: f32| {
                        // Only whole-percent changes are worth a redraw
                        let percent = (fraction * 100.0) as u32;
                        if last_percent != Some(percent) {
                            last_percent = Some(percent);
                            let _ = progress_tx.send(ExportMessage::Progress(fraction));
                        }
                    }),
                );
                let _ = tx.send(ExportMessage::Finished(result));
            })
            .map_err(|e| ExportError::Worker(e.to_string()))?;

        self.export_rx = Some(rx);
        Ok(())
    }

    /// Processes pending player events and export messages.
    /// Should be called on every iteration of the main loop.
    pub fn update(&mut self) {
        while let Some(event) = self.player.as_mut().and_then(|p| p.poll_event()) {
            let input = match event {
                PlayerEvent::Ready => Input::PlayerReady,
                PlayerEvent::Play => Input::PlayerPlaying,
                PlayerEvent::Stop => Input::PlayerStopped,
                PlayerEvent::Error(message) => Input::PlayerError(message),
            };
            self.dispatch(input);
        }

        while let Some(rx) = &self.export_rx {
            match rx.try_recv() {
                Ok(ExportMessage::Progress(fraction)) => {
                    self.dispatch(Input::ExportProgress(fraction));
                }
                Ok(ExportMessage::Finished(result)) => {
                    self.export_rx = None;
                    self.dispatch(Input::ExportFinished(result));
                }
                Err(TryRecvError::Empty) => break,
                Err(TryRecvError::Disconnected) => {
                    tracing::error!("Export worker stopped without reporting a result");
                    self.export_rx = None;
                    self.dispatch(Input::ExportFinished(Err(ExportError::Worker(
                        "export worker stopped unexpectedly".to_string(),
                    ))));
                }
            }
        }
    }

    /// Handles the Play button.
    pub fn press_play(&mut self) {
        let mml = self.editor.text();
        self.dispatch(Input::PlayClicked(mml));
    }

    /// Handles the Stop button.
    pub fn press_stop(&mut self) {
        self.dispatch(Input::StopClicked);
    }

    /// Handles the Save as MP3 button.
    pub fn press_export(&mut self) {
        let mml = self.editor.text();
        self.dispatch(Input::ExportClicked(mml));
    }

    pub fn press(&mut self, button: Button) {
        match button {
            Button::Play => self.press_play(),
            Button::Stop => self.press_stop(),
            Button::Export => self.press_export(),
        }
    }

    /// Handles a left click at screen coordinates.
    ///
    /// # Returns
    ///
    /// true if the click hit a button or the editor
    pub fn handle_mouse_click(&mut self, x: u16, y: u16) -> bool {
        if let Some(button) = self.layout.button_at(x, y) {
            self.press(button);
            true
        } else if self.layout.is_in_editor(x, y) {
            let row = self.editor.scroll + (y - self.layout.editor.y) as usize;
            let col = (x - self.layout.editor.x) as usize;
            self.editor.set_cursor(row, col);
            true
        } else {
            false
        }
    }

    /// Returns true while an export worker is running.
    pub fn export_in_flight(&self) -> bool {
        self.export_rx.is_some()
    }

    /// Stops playback and waits for a running export to be delivered.
    ///
    /// Call before exiting so the worker is not cut off mid-write.
    pub fn shutdown(&mut self) {
        if let Some(player) = self.player.as_mut() {
            player.stop();
        }
        if self.export_in_flight() {
            tracing::info!("Waiting for the MP3 export to finish");
        }
        while self.export_in_flight() {
            self.update();
            thread::sleep(Duration::from_millis(10));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::audio::export::tests::{FakeEncoderFactory, FakeRenderer, SharedLog};
    use crate::audio::export::EXPORT_FILE_NAME;
    use crate::audio::synth::tests::GatedRenderer;
    use crate::audio::{AudioBuffer, MmlRenderer, RenderTask};
    use crate::controller::{
        Controls, SessionState, STATUS_ENTER_MML, STATUS_PLAYING, STATUS_RENDERING,
        STATUS_STOPPED,
    };
    use std::collections::VecDeque;
    use std::time::Instant;
    use uuid::Uuid;

    /// Player that starts and stops instantly.
    struct FakePlayer {
        log: SharedLog,
        events: VecDeque<PlayerEvent>,
        buffer: Option<AudioBuffer>,
    }

    impl MmlPlayer for FakePlayer {
        fn play(&mut self, _mml: &str) {
            self.events.push_back(PlayerEvent::Play);
        }

        fn stop(&mut self) {
            self.events.push_back(PlayerEvent::Stop);
        }

        fn poll_event(&mut self) -> Option<PlayerEvent> {
            self.events.pop_front()
        }

        fn renderer(&self) -> Box<dyn MmlRenderer> {
            Box::new(FakeRenderer {
                log: Arc::clone(&self.log),
                duration: 0.5,
                buffer: self.buffer.clone(),
            })
        }
    }

    /// Player that renders on a background thread, like the real engine.
    struct BackgroundPlayer {
        renderer: Option<GatedRenderer>,
        task: Option<RenderTask>,
        events: VecDeque<PlayerEvent>,
    }

    impl MmlPlayer for BackgroundPlayer {
        fn play(&mut self, mml: &str) {
            if let Some(renderer) = self.renderer.take() {
                self.task = Some(RenderTask::spawn(Box::new(renderer), mml.to_string()).unwrap());
            }
        }

        fn stop(&mut self) {
            if self.task.take().is_some() {
                self.events.push_back(PlayerEvent::Stop);
            }
        }

        fn poll_event(&mut self) -> Option<PlayerEvent> {
            if let Some(result) = self.task.as_ref().and_then(RenderTask::poll) {
                self.task = None;
                self.events.push_back(match result {
                    Ok(Some(_)) => PlayerEvent::Play,
                    Ok(None) => PlayerEvent::Error(None),
                    Err(e) => PlayerEvent::Error(Some(e.to_string())),
                });
            }
            self.events.pop_front()
        }

        fn renderer(&self) -> Box<dyn MmlRenderer> {
            Box::new(FakeRenderer {
                log: SharedLog::default(),
                duration: 0.0,
                buffer: None,
            })
        }
    }

    fn background_app(renderer: GatedRenderer) -> App {
        let player = BackgroundPlayer {
            renderer: Some(renderer),
            task: None,
            events: VecDeque::from([PlayerEvent::Ready]),
        };
        let mut app = App::new(
            Ok(Box::new(player)),
            Arc::new(FakeEncoderFactory {
                log: SharedLog::default(),
            }),
            ExportSettings::default(),
        );
        app.update();
        app.editor.set_text("t120o5cde");
        app
    }

    fn test_app(buffer: Option<AudioBuffer>) -> (App, SharedLog, PathBuf) {
        let log = SharedLog::default();
        let player = FakePlayer {
            log: Arc::clone(&log),
            events: VecDeque::from([PlayerEvent::Ready]),
            buffer,
        };
        let output_dir = std::env::temp_dir().join(format!("mmltui-app-{}", Uuid::new_v4()));
        let app = App::new(
            Ok(Box::new(player)),
            Arc::new(FakeEncoderFactory {
                log: Arc::clone(&log),
            }),
            ExportSettings {
                output_dir: output_dir.clone(),
                bitrate_kbps: 128,
            },
        );
        (app, log, output_dir)
    }

    fn wait_for_export(app: &mut App) {
        let deadline = Instant::now() + Duration::from_secs(10);
        while app.export_in_flight() {
            assert!(Instant::now() < deadline, "export did not finish");
            app.update();
            thread::sleep(Duration::from_millis(5));
        }
    }

    #[test]
    fn test_player_failure_disables_controls() {
        let app = App::new(
            Err(SynthError::NotConfigured),
            Arc::new(crate::audio::LameEncoderFactory),
            ExportSettings::default(),
        );
        assert_eq!(app.controller().controls(), Controls::disabled());
        assert!(app.controller().status().contains("no MML renderer"));
    }

    #[test]
    fn test_play_and_stop_roundtrip() {
        let (mut app, _, _) = test_app(None);
        app.update();
        assert_eq!(app.controller().state(), SessionState::Ready);

        app.editor.set_text("t120o5cde");
        app.press_play();
        app.update();
        assert!(app.controller().is_playing());

        app.press_stop();
        app.update();
        assert_eq!(app.controller().state(), SessionState::Ready);
        assert_eq!(app.controller().controls(), Controls::interactive());
    }

    #[test]
    fn test_blank_input_never_reaches_player() {
        let (mut app, log, _) = test_app(None);
        app.update();
        app.editor.set_text("  \n ");
        app.press_play();
        app.press_export();
        app.update();
        assert_eq!(app.controller().status(), STATUS_ENTER_MML);
        assert_eq!(app.controller().state(), SessionState::Ready);
        assert!(!app.export_in_flight());
        assert_eq!(log.lock().unwrap().durations, 0);
    }

    #[test]
    fn test_export_end_to_end() {
        let buffer = AudioBuffer::new(44100, vec![vec![0.1; 3000]]).unwrap();
        let (mut app, log, output_dir) = test_app(Some(buffer));
        app.update();

        app.editor.set_text("t120o5cde");
        app.press_export();
        assert!(app.controller().is_exporting());
        wait_for_export(&mut app);

        {
            let log = log.lock().unwrap();
            assert_eq!(log.durations, 1);
            assert_eq!(log.renders.len(), 1);
            assert_eq!(log.frames.len(), 3);
            assert_eq!(log.flushes, 1);
        }
        let path = output_dir.join(EXPORT_FILE_NAME);
        assert!(path.exists());
        assert_eq!(app.controller().state(), SessionState::Ready);
        assert!(app.controller().status().starts_with("Saved MP3 file to"));

        std::fs::remove_dir_all(&output_dir).unwrap();
    }

    #[test]
    fn test_export_render_failure() {
        let (mut app, log, output_dir) = test_app(None);
        app.update();

        app.editor.set_text("cde");
        app.press_export();
        wait_for_export(&mut app);

        let controls = app.controller().controls();
        assert!(controls.play && controls.export && !controls.stop);
        assert!(app.controller().status().contains("Failed to render MML."));
        assert!(log.lock().unwrap().frames.is_empty());
        assert!(!output_dir.exists());
    }

    #[test]
    fn test_mouse_clicks_hit_buttons() {
        let (mut app, _, _) = test_app(None);
        app.update();
        app.editor.set_text("cde");
        app.update_layout(LayoutRegions {
            play_button: Rect::new(1, 1, 10, 1),
            stop_button: Rect::new(12, 1, 10, 1),
            export_button: Rect::new(23, 1, 16, 1),
            editor: Rect::new(1, 4, 40, 10),
        });

        assert!(app.handle_mouse_click(3, 1));
        app.update();
        assert!(app.controller().is_playing());

        assert!(app.handle_mouse_click(15, 1));
        app.update();
        assert!(!app.controller().is_playing());

        assert!(app.handle_mouse_click(2, 4));
        assert_eq!(app.editor.cursor(), (0, 1));
        assert!(!app.handle_mouse_click(60, 30));
    }

    #[test]
    fn test_ui_keeps_running_while_play_renders() {
        let buffer = AudioBuffer::new(44100, vec![vec![0.1; 441]]).unwrap();
        let (renderer, release) = GatedRenderer::new(Some(buffer));
        let mut app = background_app(renderer);

        app.press_play();
        for _ in 0..3 {
            app.update();
        }
        assert!(app.controller().is_play_pending());
        assert_eq!(app.controller().state(), SessionState::Ready);
        assert_eq!(app.controller().status(), STATUS_RENDERING);

        // Export stays blocked until the pending play resolves
        app.press_export();
        assert!(!app.export_in_flight());

        release.send(()).unwrap();
        let deadline = Instant::now() + Duration::from_secs(10);
        while !app.controller().is_playing() {
            assert!(Instant::now() < deadline, "playback did not start");
            app.update();
            thread::sleep(Duration::from_millis(5));
        }
        assert_eq!(app.controller().status(), STATUS_PLAYING);
    }

    #[test]
    fn test_stop_while_play_renders() {
        let (renderer, release) = GatedRenderer::new(None);
        let mut app = background_app(renderer);

        app.press_play();
        app.update();
        app.press_stop();
        app.update();

        assert!(!app.controller().is_play_pending());
        assert_eq!(app.controller().state(), SessionState::Ready);
        assert_eq!(app.controller().controls(), Controls::interactive());
        assert_eq!(app.controller().status(), STATUS_STOPPED);
        drop(release);
    }

    #[test]
    fn test_export_delivery_failure_restores_controls() {
        let buffer = AudioBuffer::new(44100, vec![vec![0.1; 1200]]).unwrap();
        let (mut app, log, output_dir) = test_app(Some(buffer));
        // The output directory path is taken by a regular file
        std::fs::write(&output_dir, b"not a directory").unwrap();
        app.update();

        app.editor.set_text("t120o5cde");
        app.press_export();
        wait_for_export(&mut app);

        assert_eq!(log.lock().unwrap().flushes, 1);
        assert!(app
            .controller()
            .status()
            .starts_with("An error occurred while saving MP3: failed to write"));
        assert_eq!(app.controller().state(), SessionState::Ready);
        let controls = app.controller().controls();
        assert!(controls.play && controls.export && !controls.stop);

        std::fs::remove_file(&output_dir).unwrap();
    }

    #[test]
    fn test_shutdown_waits_for_export() {
        let buffer = AudioBuffer::new(44100, vec![vec![0.1; 5000]]).unwrap();
        let (mut app, _, output_dir) = test_app(Some(buffer));
        app.update();

        app.editor.set_text("t120o5cde");
        app.press_export();
        app.shutdown();

        assert!(!app.export_in_flight());
        assert!(output_dir.join(EXPORT_FILE_NAME).exists());
        // Only the final file remains, no temporary parts
        assert_eq!(std::fs::read_dir(&output_dir).unwrap().count(), 1);

        std::fs::remove_dir_all(&output_dir).unwrap();
    }
}
