//! Playback/export control state.
//!
//! The [`Controller`] owns the session state, the enabled state and labels
//! of the Play / Stop / Save buttons, and the status text. It does no I/O:
//! every user action and player event goes through [`Controller::handle`],
//! which validates the transition and returns the [`Command`] the host must
//! carry out, if any.
//!
//! Playing and exporting are states of one enum, so they can never be
//! active at the same time. A play request that is still rendering counts
//! as playback: it blocks export and can be cancelled with Stop.

use crate::audio::ExportError;
use std::path::PathBuf;

/// Status shown while the player is starting.
pub const STATUS_PREPARING: &str = "Preparing MML player...";
/// Status shown once the player is ready.
pub const STATUS_READY: &str = "MML player is ready.";
/// Prompt shown when play or export is requested with blank input.
pub const STATUS_ENTER_MML: &str = "Please enter MML code.";
/// Status shown while the music is being rendered for playback.
pub const STATUS_RENDERING: &str = "Rendering MML...";
/// Status shown while playing.
pub const STATUS_PLAYING: &str = "Playing MML...";
/// Status shown after playback ends.
pub const STATUS_STOPPED: &str = "Playback stopped.";
/// Status shown when an export starts.
pub const STATUS_EXPORTING: &str = "Creating MP3 file... please wait.";
/// Fallback for player errors without a message.
pub const DEFAULT_PLAYER_ERROR: &str = "Failed to parse MML.";

/// Play button label when idle.
pub const LABEL_PLAY: &str = "Play";
/// Play button label while playing.
pub const LABEL_PLAYING: &str = "Playing...";
/// Export button label when idle.
pub const LABEL_EXPORT: &str = "Save as MP3";
/// Export button label while exporting.
pub const LABEL_EXPORTING: &str = "Generating MP3...";

/// The current session state.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionState {
    /// Waiting for the player to initialize (or it failed to).
    #[default]
    Idle,
    /// Player ready, nothing in progress.
    Ready,
    /// Music is playing.
    Playing,
    /// An MP3 export is running.
    Exporting,
    /// The last playback attempt failed.
    Error,
}

/// Whether the external player is usable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum PlayerStatus {
    /// Initialization has not finished.
    #[default]
    Pending,
    /// The player reported ready.
    Available,
    /// The player could not be created; nothing can be played this session.
    Unavailable,
}

/// Enabled state and labels of the three buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Controls {
    pub play: bool,
    pub stop: bool,
    pub export: bool,
    pub play_label: &'static str,
    pub export_label: &'static str,
}

impl Controls {
    /// Everything disabled, default labels.
    pub const fn disabled() -> Self {
        Self {
            play: false,
            stop: false,
            export: false,
            play_label: LABEL_PLAY,
            export_label: LABEL_EXPORT,
        }
    }

    /// Play and export enabled, stop disabled.
    pub const fn interactive() -> Self {
        Self {
            play: true,
            export: true,
            ..Self::disabled()
        }
    }

    const fn playing() -> Self {
        Self {
            stop: true,
            play_label: LABEL_PLAYING,
            ..Self::disabled()
        }
    }

    const fn exporting() -> Self {
        Self {
            export_label: LABEL_EXPORTING,
            ..Self::disabled()
        }
    }
}

impl Default for Controls {
    fn default() -> Self {
        Self::disabled()
    }
}

/// Everything the controller reacts to.
#[derive(Debug)]
pub enum Input {
    /// The player finished initializing.
    PlayerReady,
    /// The player could not be created.
    PlayerFailed(String),
    /// The player started playing.
    PlayerPlaying,
    /// The player stopped (on request or at the end of the music).
    PlayerStopped,
    /// The player reported an error.
    PlayerError(Option<String>),
    /// The user pressed Play with the given MML text.
    PlayClicked(String),
    /// The user pressed Stop.
    StopClicked,
    /// The user pressed Save as MP3 with the given MML text.
    ExportClicked(String),
    /// The export made progress (0.0 to 1.0).
    ExportProgress(f32),
    /// The export finished.
    ExportFinished(Result<PathBuf, ExportError>),
}

/// Side effects the host must perform.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    /// Ask the player to play this MML.
    Play(String),
    /// Ask the player to stop.
    Stop,
    /// Start an export of this MML.
    Export(String),
}

/// The playback/export state machine.
#[derive(Debug, Clone, PartialEq)]
pub struct Controller {
    state: SessionState,
    player: PlayerStatus,
    /// A play command was issued and the player has not started yet.
    play_pending: bool,
    controls: Controls,
    status: String,
}

impl Default for Controller {
    fn default() -> Self {
        Self::new()
    }
}

impl Controller {
    /// Creates a controller waiting for the player.
    pub fn new() -> Self {
        Self {
            state: SessionState::Idle,
            player: PlayerStatus::Pending,
            play_pending: false,
            controls: Controls::disabled(),
            status: STATUS_PREPARING.to_string(),
        }
    }

    pub fn state(&self) -> SessionState {
        self.state
    }

    pub fn player_status(&self) -> PlayerStatus {
        self.player
    }

    pub fn controls(&self) -> Controls {
        self.controls
    }

    pub fn status(&self) -> &str {
        &self.status
    }

    pub fn is_playing(&self) -> bool {
        self.state == SessionState::Playing
    }

    pub fn is_exporting(&self) -> bool {
        self.state == SessionState::Exporting
    }

    /// Returns true while a play request waits for the player to start.
    pub fn is_play_pending(&self) -> bool {
        self.play_pending
    }

    fn set_status(&mut self, message: impl Into<String>) {
        self.status = message.into();
    }

    /// Moves to `state` with the given controls.
    fn enter(&mut self, state: SessionState, controls: Controls) {
        tracing::debug!("Session state {:?} -> {:?}", self.state, state);
        self.state = state;
        self.controls = controls;
    }

    /// Returns true if a play or export request may proceed.
    fn can_start(&self, enabled: bool) -> bool {
        self.player == PlayerStatus::Available
            && enabled
            && !self.play_pending
            && !self.is_playing()
            && !self.is_exporting()
    }

    /// Applies one input and returns the command to perform, if any.
    pub fn handle(&mut self, input: Input) -> Option<Command> {
        match input {
            Input::PlayerReady => {
                if self.player == PlayerStatus::Pending {
                    tracing::info!("MML player is ready");
                    self.player = PlayerStatus::Available;
                    self.enter(SessionState::Ready, Controls::interactive());
                    self.set_status(STATUS_READY);
                }
                None
            }

            Input::PlayerFailed(reason) => {
                tracing::error!("MML player initialization failed: {}", reason);
                self.player = PlayerStatus::Unavailable;
                self.enter(SessionState::Idle, Controls::disabled());
                self.set_status(format!("Failed to initialize the MML player: {}", reason));
                None
            }

            Input::PlayClicked(mml) => {
                if !self.can_start(self.controls.play) {
                    return None;
                }
                if mml.trim().is_empty() {
                    self.set_status(STATUS_ENTER_MML);
                    return None;
                }
                self.play_pending = true;
                self.controls = Controls::playing();
                self.set_status(STATUS_RENDERING);
                Some(Command::Play(mml))
            }

            Input::PlayerPlaying => {
                self.play_pending = false;
                if self.player == PlayerStatus::Available && !self.is_exporting() {
                    self.enter(SessionState::Playing, Controls::playing());
                    self.set_status(STATUS_PLAYING);
                }
                None
            }

            Input::StopClicked => {
                if (self.is_playing() || self.play_pending) && self.controls.stop {
                    Some(Command::Stop)
                } else {
                    None
                }
            }

            Input::PlayerStopped => {
                if self.is_playing() || std::mem::take(&mut self.play_pending) {
                    self.enter(SessionState::Ready, Controls::interactive());
                    self.set_status(STATUS_STOPPED);
                }
                None
            }

            Input::PlayerError(message) => {
                let message = message
                    .filter(|m| !m.trim().is_empty())
                    .unwrap_or_else(|| DEFAULT_PLAYER_ERROR.to_string());
                tracing::error!("MML player error: {}", message);
                self.play_pending = false;
                self.set_status(format!("Error: {}", message));
                // An export in flight keeps its state until the worker reports back
                if self.player == PlayerStatus::Available && !self.is_exporting() {
                    self.enter(SessionState::Error, Controls::interactive());
                }
                None
            }

            Input::ExportClicked(mml) => {
                if !self.can_start(self.controls.export) {
                    return None;
                }
                if mml.trim().is_empty() {
                    self.set_status(STATUS_ENTER_MML);
                    return None;
                }
                tracing::info!("Starting MP3 export");
                self.enter(SessionState::Exporting, Controls::exporting());
                self.set_status(STATUS_EXPORTING);
                Some(Command::Export(mml))
            }

            Input::ExportProgress(fraction) => {
                if self.is_exporting() {
                    let percent = (fraction.clamp(0.0, 1.0) * 100.0).round();
                    self.set_status(format!("Creating MP3 file... {:.0}%", percent));
                }
                None
            }

            Input::ExportFinished(result) => {
                if !self.is_exporting() {
                    tracing::warn!("Ignoring export result outside of an export");
                    return None;
                }
                match result {
                    Ok(path) => {
                        tracing::info!("MP3 export finished: {}", path.display());
                        self.set_status(format!("Saved MP3 file to {}!", path.display()));
                    }
                    Err(e) => {
                        tracing::error!("MP3 export failed: {:?}", e);
                        self.set_status(format!("An error occurred while saving MP3: {}", e));
                    }
                }
                self.enter(SessionState::Ready, Controls::interactive());
                None
            }
        }
    }
}
