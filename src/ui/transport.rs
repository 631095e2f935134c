//! Transport bar rendering.
//!
//! Displays the Play / Stop / Save as MP3 buttons and the session state.

use crate::app::{App, LayoutRegions};
use crate::controller::SessionState;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Renders one button; disabled buttons are dimmed.
fn render_button(frame: &mut Frame, area: Rect, key: &str, label: &str, enabled: bool, color: Color) {
    let style = if enabled {
        Style::default()
            .fg(Color::Black)
            .bg(color)
            .add_modifier(Modifier::BOLD)
    } else {
        Style::default().fg(Color::DarkGray)
    };
    let key_style = if enabled {
        style
    } else {
        style.add_modifier(Modifier::DIM)
    };

    frame.render_widget(
        Paragraph::new(Line::from(vec![
            Span::styled(format!(" {} ", key), key_style),
            Span::styled(format!("{} ", label), style),
        ])),
        area,
    );
}

/// Renders the transport bar at the top of the screen.
///
/// Returns the button regions for mouse hit testing.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `area` - The area to render in
/// * `app` - Application state
pub fn render_transport(frame: &mut Frame, area: Rect, app: &App) -> LayoutRegions {
    let block = Block::default()
        .title(" mmltui ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let controller = app.controller();
    let controls = controller.controls();

    // Divide into sections
    let chunks = Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Length(18), // Play
            Constraint::Length(1),
            Constraint::Length(12), // Stop
            Constraint::Length(1),
            Constraint::Length(25), // Save as MP3
            Constraint::Min(12),    // State
        ])
        .split(inner);

    render_button(frame, chunks[0], "F5", controls.play_label, controls.play, Color::Green);
    render_button(frame, chunks[2], "F6", "Stop", controls.stop, Color::Red);
    render_button(frame, chunks[4], "F7", controls.export_label, controls.export, Color::Cyan);

    let (state_str, state_color) = match controller.state() {
        _ if controller.is_play_pending() => ("[~] RENDERING", Color::Yellow),
        SessionState::Idle => ("[ ] IDLE", Color::DarkGray),
        SessionState::Ready => ("[.] READY", Color::Blue),
        SessionState::Playing => ("[>] PLAYING", Color::Green),
        SessionState::Exporting => ("[*] EXPORTING", Color::Cyan),
        SessionState::Error => ("[!] ERROR", Color::Red),
    };
    frame.render_widget(
        Paragraph::new(Line::from(Span::styled(
            state_str,
            Style::default().fg(state_color).add_modifier(Modifier::BOLD),
        )))
        .right_aligned(),
        chunks[5],
    );

    LayoutRegions {
        play_button: chunks[0],
        stop_button: chunks[2],
        export_button: chunks[4],
        ..LayoutRegions::default()
    }
}

/// Renders the status line at the bottom of the screen.
pub fn render_status(frame: &mut Frame, area: Rect, app: &App) {
    let block = Block::default()
        .title(" Status ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Gray));

    let color = match app.controller().state() {
        SessionState::Error => Color::Red,
        SessionState::Exporting => Color::Cyan,
        _ => Color::Yellow,
    };

    let status = Paragraph::new(Line::from(vec![
        Span::styled(
            app.controller().status(),
            Style::default().fg(color).add_modifier(Modifier::ITALIC),
        ),
        Span::styled("   F1: help", Style::default().fg(Color::DarkGray)),
    ]))
    .block(block);
    frame.render_widget(status, area);
}
