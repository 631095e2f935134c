//! mmltui - A terminal-based MML player and MP3 exporter.
//!
//! This application provides a small editor for Music Macro Language (MML)
//! with Play / Stop / Save as MP3 controls. MML rendering is delegated to an
//! external renderer program; MP3 encoding uses LAME.
//!
//! # Features
//!
//! - MML editing with keyboard and mouse
//! - Playback through the default audio output
//! - MP3 export (`mml_music.mp3`) without blocking the UI
//! - Headless export for scripting (`--export`)
//!
//! # Usage
//!
//! ```bash
//! cargo run -- --renderer "mml2wav {input} {output}"
//! cargo run -- -r "mml2wav {input} {output}" --export song.mml
//! ```
//!
//! Press `F1` for help with keyboard shortcuts.

mod app;
mod audio;
mod controller;
mod editor;
mod ui;

use app::{App, ExportSettings};
use audio::encoder::is_supported_bitrate;
use audio::export::{export_to_mp3, DirectorySink, DEFAULT_BITRATE_KBPS};
use audio::{AudioEngine, CommandRenderer, LameEncoderFactory, MmlPlayer, SynthError};

use anyhow::{bail, Context, Result};
use crossterm::event::{
    self, DisableBracketedPaste, DisableMouseCapture, EnableBracketedPaste, EnableMouseCapture,
    Event, KeyCode, KeyEvent, KeyEventKind, KeyModifiers, MouseButton, MouseEventKind,
};
use crossterm::execute;
use crossterm::terminal::{
    disable_raw_mode, enable_raw_mode, EnterAlternateScreen, LeaveAlternateScreen,
};
use ratatui::backend::CrosstermBackend;
use ratatui::Terminal;
use std::io::{self, Stdout};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

/// Environment variable holding the renderer command template.
const RENDERER_ENV: &str = "MMLTUI_RENDERER";

/// Command-line options for the application.
#[derive(Debug, Default, PartialEq)]
struct CliOptions {
    /// Renderer command template.
    renderer: Option<String>,
    /// Output directory for exports.
    output_dir: Option<PathBuf>,
    /// MP3 bitrate in kbps.
    bitrate_kbps: Option<u32>,
    /// MML file to export without starting the UI.
    export: Option<PathBuf>,
    /// MML file to load into the editor.
    input: Option<PathBuf>,
    /// Print help and exit.
    help: bool,
}

impl CliOptions {
    /// Parses command-line arguments (excluding the program name).
    ///
    /// Supports:
    /// - `--renderer <cmd>` or `-r <cmd>`: Renderer command template
    /// - `--output <dir>` or `-o <dir>`: Export directory
    /// - `--bitrate <kbps>` or `-b <kbps>`: MP3 bitrate
    /// - `--export <file>` or `-e <file>`: Export an MML file and exit
    /// - `--help` or `-h`: Print help and exit
    /// - A positional `.mml` file to open in the editor
    fn parse<I>(args: I) -> Result<Self>
    where
        I: IntoIterator<Item = String>,
    {
        let mut options = Self::default();
        let mut args = args.into_iter();

        while let Some(arg) = args.next() {
            let mut value = |name: &str| {
                args.next()
                    .with_context(|| format!("{} requires an argument", name))
            };
            match arg.as_str() {
                "--renderer" | "-r" => options.renderer = Some(value("--renderer")?),
                "--output" | "-o" => options.output_dir = Some(PathBuf::from(value("--output")?)),
                "--bitrate" | "-b" => {
                    let raw = value("--bitrate")?;
                    let kbps: u32 = raw
                        .parse()
                        .with_context(|| format!("Invalid bitrate: {}", raw))?;
                    if !is_supported_bitrate(kbps) {
                        bail!("Unsupported MP3 bitrate: {} kbps", kbps);
                    }
                    options.bitrate_kbps = Some(kbps);
                }
                "--export" | "-e" => options.export = Some(PathBuf::from(value("--export")?)),
                "--help" | "-h" => options.help = true,
                other if !other.starts_with('-') && options.input.is_none() => {
                    options.input = Some(PathBuf::from(other));
                }
                other => bail!("Unknown option: {} (use --help for usage information)", other),
            }
        }

        Ok(options)
    }

    /// Returns the renderer template, falling back to the environment.
    fn renderer_template(&self) -> Option<String> {
        self.renderer
            .clone()
            .or_else(|| std::env::var(RENDERER_ENV).ok())
            .filter(|t| !t.trim().is_empty())
    }

    fn export_settings(&self) -> ExportSettings {
        let defaults = ExportSettings::default();
        ExportSettings {
            output_dir: self.output_dir.clone().unwrap_or(defaults.output_dir),
            bitrate_kbps: self.bitrate_kbps.unwrap_or(DEFAULT_BITRATE_KBPS),
        }
    }
}

fn print_help() {
    eprintln!("mmltui - Terminal MML player and MP3 exporter");
    eprintln!();
    eprintln!("Usage: mmltui [OPTIONS] [FILE.mml]");
    eprintln!();
    eprintln!("Options:");
    eprintln!("  -r, --renderer CMD   Renderer command, e.g. \"mml2wav {{input}} {{output}}\"");
    eprintln!("                       (default: ${})", RENDERER_ENV);
    eprintln!("  -o, --output DIR     Directory for mml_music.mp3 (default: output)");
    eprintln!("  -b, --bitrate KBPS   MP3 bitrate (default: {})", DEFAULT_BITRATE_KBPS);
    eprintln!("  -e, --export FILE    Export FILE to MP3 without starting the UI");
    eprintln!("  -h, --help           Print this help message");
}

/// Main entry point.
fn main() -> Result<()> {
    // Parse CLI options first (before any terminal setup)
    let cli = CliOptions::parse(std::env::args().skip(1))?;
    if cli.help {
        print_help();
        return Ok(());
    }

    tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_writer(std::io::stderr)
        .init();

    if let Some(ref path) = cli.export {
        return run_headless_export(&cli, path);
    }

    let initial_text = match cli.input {
        Some(ref path) => Some(
            std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read MML file: {}", path.display()))?,
        ),
        None => None,
    };

    let player = create_player(&cli);
    let mut app = App::new(
        player,
        Arc::new(LameEncoderFactory),
        cli.export_settings(),
    );
    if let Some(text) = initial_text {
        app.editor.set_text(&text);
    }

    let mut terminal = setup_terminal().context("Failed to setup terminal")?;

    // Run main loop
    let result = run_app(&mut terminal, &mut app);

    // Restore terminal
    restore_terminal(&mut terminal).context("Failed to restore terminal")?;

    if app.export_in_flight() {
        eprintln!("Waiting for the MP3 export to finish...");
    }
    app.shutdown();

    result
}

/// Creates the player from the configured renderer.
fn create_player(cli: &CliOptions) -> Result<Box<dyn MmlPlayer>, SynthError> {
    let template = cli.renderer_template().ok_or(SynthError::NotConfigured)?;
    let renderer = CommandRenderer::new(&template)?;
    let engine = AudioEngine::new(renderer)?;
    Ok(Box::new(engine))
}

/// Exports an MML file to MP3 without the UI.
fn run_headless_export(cli: &CliOptions, path: &PathBuf) -> Result<()> {
    let mml = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read MML file: {}", path.display()))?;
    if mml.trim().is_empty() {
        bail!("{} contains no MML code", path.display());
    }

    let template = cli
        .renderer_template()
        .ok_or(SynthError::NotConfigured)
        .context("Cannot export")?;
    let mut renderer = CommandRenderer::new(&template).context("Cannot export")?;
    let settings = cli.export_settings();
    let mut sink = DirectorySink::new(&settings.output_dir);

    let output = export_to_mp3(
        &mml,
        &mut renderer,
        &LameEncoderFactory,
        &mut sink,
        settings.bitrate_kbps,
        None::<fn(f32)>,
    )
    .context("MP3 export failed")?;

    println!("{}", output.display());
    Ok(())
}

/// Sets up the terminal for TUI rendering.
fn setup_terminal() -> Result<Terminal<CrosstermBackend<Stdout>>> {
    enable_raw_mode().context("Failed to enable raw mode")?;
    let mut stdout = io::stdout();
    execute!(
        stdout,
        EnterAlternateScreen,
        EnableMouseCapture,
        EnableBracketedPaste
    )
    .context("Failed to enter alternate screen")?;
    let backend = CrosstermBackend::new(stdout);
    let terminal = Terminal::new(backend).context("Failed to create terminal")?;
    Ok(terminal)
}

/// Restores the terminal to its original state.
fn restore_terminal(terminal: &mut Terminal<CrosstermBackend<Stdout>>) -> Result<()> {
    disable_raw_mode().context("Failed to disable raw mode")?;
    execute!(
        terminal.backend_mut(),
        LeaveAlternateScreen,
        DisableMouseCapture,
        DisableBracketedPaste
    )
    .context("Failed to leave alternate screen")?;
    terminal.show_cursor().context("Failed to show cursor")?;
    Ok(())
}

/// Main application loop.
fn run_app(terminal: &mut Terminal<CrosstermBackend<Stdout>>, app: &mut App) -> Result<()> {
    loop {
        // Pick up player events and export progress
        app.update();

        terminal.draw(|frame| ui::render(frame, app))?;

        // Handle events with a short timeout to keep the status fresh
        if event::poll(Duration::from_millis(16))? {
            match event::read()? {
                Event::Key(key) if key.kind == KeyEventKind::Press => {
                    if handle_key(app, key) {
                        return Ok(());
                    }
                }
                Event::Mouse(mouse) => match mouse.kind {
                    MouseEventKind::Down(MouseButton::Left) => {
                        if app.show_help {
                            app.show_help = false;
                        } else {
                            app.handle_mouse_click(mouse.column, mouse.row);
                        }
                    }
                    MouseEventKind::ScrollUp if app.show_help => {
                        app.help_scroll = app.help_scroll.saturating_sub(1);
                    }
                    MouseEventKind::ScrollDown if app.show_help => {
                        app.help_scroll = app.help_scroll.saturating_add(1);
                    }
                    _ => {}
                },
                Event::Paste(text) if !app.show_help => app.editor.insert_str(&text),
                _ => {}
            }
        }
    }
}

/// Handles a key press.
///
/// # Returns
///
/// true if the application should quit
fn handle_key(app: &mut App, key: KeyEvent) -> bool {
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);

    if ctrl && key.code == KeyCode::Char('c') {
        return true;
    }

    if app.show_help {
        // Help overlay is visible - handle close and scroll
        match key.code {
            KeyCode::F(1) | KeyCode::Esc => {
                app.show_help = false;
                app.help_scroll = 0;
            }
            KeyCode::Up => app.help_scroll = app.help_scroll.saturating_sub(1),
            KeyCode::Down => app.help_scroll = app.help_scroll.saturating_add(1),
            _ => {}
        }
        return false;
    }

    match key.code {
        KeyCode::F(1) => app.show_help = true,
        // Quitting mid-export would cut the worker off while it writes
        KeyCode::Esc => return !app.export_in_flight(),
        KeyCode::F(5) => app.press_play(),
        KeyCode::F(6) => app.press_stop(),
        KeyCode::F(7) => app.press_export(),
        KeyCode::Char(c) if ctrl => match c {
            'q' => return !app.export_in_flight(),
            'p' => app.press_play(),
            't' => app.press_stop(),
            'e' => app.press_export(),
            'l' => app.editor.clear(),
            _ => {}
        },
        KeyCode::Char(c) => app.editor.insert_char(c),
        KeyCode::Enter => app.editor.insert_newline(),
        KeyCode::Tab => app.editor.insert_str("  "),
        KeyCode::Backspace => app.editor.backspace(),
        KeyCode::Delete => app.editor.delete(),
        KeyCode::Left => app.editor.move_left(),
        KeyCode::Right => app.editor.move_right(),
        KeyCode::Up => app.editor.move_up(),
        KeyCode::Down => app.editor.move_down(),
        KeyCode::Home => app.editor.move_home(),
        KeyCode::End => app.editor.move_end(),
        _ => {}
    }

    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(args: &[&str]) -> Result<CliOptions> {
        CliOptions::parse(args.iter().map(|s| s.to_string()))
    }

    #[test]
    fn test_parse_options() {
        let cli = parse(&[
            "-r",
            "mml2wav {input} {output}",
            "--output",
            "out",
            "-b",
            "192",
            "song.mml",
        ])
        .unwrap();
        assert_eq!(cli.renderer.as_deref(), Some("mml2wav {input} {output}"));
        assert_eq!(cli.input, Some(PathBuf::from("song.mml")));
        let settings = cli.export_settings();
        assert_eq!(settings.output_dir, PathBuf::from("out"));
        assert_eq!(settings.bitrate_kbps, 192);
    }

    #[test]
    fn test_parse_defaults_and_errors() {
        let cli = parse(&[]).unwrap();
        assert_eq!(cli.export_settings(), ExportSettings::default());

        assert!(parse(&["--bitrate", "100"]).is_err());
        assert!(parse(&["--bitrate", "fast"]).is_err());
        assert!(parse(&["--output"]).is_err());
        assert!(parse(&["--frobnicate"]).is_err());
        assert!(parse(&["a.mml", "b.mml"]).is_err());
    }
}
