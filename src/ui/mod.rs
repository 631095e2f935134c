//! Terminal user interface components.
//!
//! This module provides the visual components of the MML player: the
//! transport bar with its buttons, the MML editor and the status line.

mod editor;
mod help;
mod transport;

use crate::app::App;
use ratatui::layout::{Constraint, Direction, Layout, Rect};
use ratatui::Frame;

pub use editor::render_editor;
pub use help::render_help;
pub use transport::{render_status, render_transport};

/// Renders the complete UI layout and updates layout regions.
///
/// The layout is divided into:
/// - Top: Transport bar with Play / Stop / Save as MP3
/// - Center: MML editor
/// - Bottom: Status line
pub fn render(frame: &mut Frame, app: &mut App) {
    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Length(3), // Transport
            Constraint::Min(3),    // Editor
            Constraint::Length(3), // Status
        ])
        .split(frame.area());

    let mut layout = render_transport(frame, chunks[0], app);
    layout.editor = render_editor(frame, chunks[1], app);
    render_status(frame, chunks[2], app);

    // Update app's layout regions for mouse hit testing
    app.update_layout(layout);

    if app.show_help {
        render_help(frame, app.help_scroll);
    }
}

/// Helper function to center a rectangle within another rectangle.
pub fn centered_rect(percent_x: u16, percent_y: u16, area: Rect) -> Rect {
    let popup_layout = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Percentage((100 - percent_y) / 2),
            Constraint::Percentage(percent_y),
            Constraint::Percentage((100 - percent_y) / 2),
        ])
        .split(area);

    Layout::default()
        .direction(Direction::Horizontal)
        .constraints([
            Constraint::Percentage((100 - percent_x) / 2),
            Constraint::Percentage(percent_x),
            Constraint::Percentage((100 - percent_x) / 2),
        ])
        .split(popup_layout[1])[1]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::app::ExportSettings;
    use crate::audio::{LameEncoderFactory, SynthError};
    use ratatui::backend::TestBackend;
    use ratatui::Terminal;
    use std::sync::Arc;

    fn buffer_text(terminal: &Terminal<TestBackend>) -> String {
        terminal
            .backend()
            .buffer()
            .content()
            .iter()
            .map(|cell| cell.symbol())
            .collect()
    }

    #[test]
    fn test_render_records_layout_regions() {
        let mut app = App::new(
            Err(SynthError::NotConfigured),
            Arc::new(LameEncoderFactory),
            ExportSettings::default(),
        );
        let mut terminal = Terminal::new(TestBackend::new(100, 20)).unwrap();

        terminal.draw(|frame| render(frame, &mut app)).unwrap();

        let layout = app.layout;
        assert_eq!(layout.play_button.y, 1);
        assert!(layout.play_button.width > 0);
        assert!(layout.stop_button.x > layout.play_button.x);
        assert!(layout.export_button.x > layout.stop_button.x);
        assert_eq!(layout.editor.y, 4);

        let text = buffer_text(&terminal);
        assert!(text.contains("Save as MP3"));
        assert!(text.contains("Failed to initialize the MML player"));
    }

    #[test]
    fn test_render_help_overlay() {
        let mut app = App::new(
            Err(SynthError::NotConfigured),
            Arc::new(LameEncoderFactory),
            ExportSettings::default(),
        );
        app.show_help = true;
        let mut terminal = Terminal::new(TestBackend::new(100, 40)).unwrap();

        terminal.draw(|frame| render(frame, &mut app)).unwrap();

        assert!(buffer_text(&terminal).contains("Keyboard Shortcuts"));
    }
}
