//! Help overlay rendering.
//!
//! Displays keyboard shortcuts and commands in a modal overlay.

use ratatui::layout::{Constraint, Direction, Layout};
use ratatui::style::{Color, Modifier, Style};
use ratatui::text::{Line, Span};
use ratatui::widgets::{Block, Borders, Clear, Paragraph};
use ratatui::Frame;

use super::centered_rect;

/// Key binding entry for the help display.
struct KeyBinding {
    key: &'static str,
    description: &'static str,
}

const GENERAL_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "F1",
        description: "Toggle this help",
    },
    KeyBinding {
        key: "Esc / Ctrl+Q",
        description: "Quit (not while saving an MP3)",
    },
    KeyBinding {
        key: "Ctrl+C",
        description: "Quit, finishing any MP3 export first",
    },
];

const TRANSPORT_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "F5 / Ctrl+P",
        description: "Play the MML",
    },
    KeyBinding {
        key: "F6 / Ctrl+T",
        description: "Stop playback",
    },
    KeyBinding {
        key: "F7 / Ctrl+E",
        description: "Save as MP3 (mml_music.mp3)",
    },
];

const EDIT_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Arrows",
        description: "Move the cursor",
    },
    KeyBinding {
        key: "Home / End",
        description: "Start / end of line",
    },
    KeyBinding {
        key: "Enter",
        description: "New line",
    },
    KeyBinding {
        key: "Backspace / Del",
        description: "Delete character",
    },
    KeyBinding {
        key: "Ctrl+L",
        description: "Clear the editor",
    },
];

const MOUSE_BINDINGS: &[KeyBinding] = &[
    KeyBinding {
        key: "Click button",
        description: "Play / Stop / Save as MP3",
    },
    KeyBinding {
        key: "Click text",
        description: "Move the cursor",
    },
];

/// Renders the help overlay.
///
/// # Arguments
///
/// * `frame` - The frame to render to
/// * `scroll` - Vertical scroll offset
pub fn render_help(frame: &mut Frame, scroll: u16) {
    let area = centered_rect(60, 70, frame.area());

    // Clear the area behind the popup
    frame.render_widget(Clear, area);

    let block = Block::default()
        .title(" Help - Keyboard Shortcuts ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(Color::Cyan));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let chunks = Layout::default()
        .direction(Direction::Vertical)
        .constraints([
            Constraint::Min(1),    // Scrollable content
            Constraint::Length(1), // Fixed footer
        ])
        .split(inner);

    let section_style = Style::default()
        .fg(Color::Yellow)
        .add_modifier(Modifier::BOLD | Modifier::UNDERLINED);
    let key_style = Style::default()
        .fg(Color::Cyan)
        .add_modifier(Modifier::BOLD);
    let desc_style = Style::default().fg(Color::White);

    let sections: [(&'static str, &[KeyBinding]); 4] = [
        ("General", GENERAL_BINDINGS),
        ("Transport", TRANSPORT_BINDINGS),
        ("Editing", EDIT_BINDINGS),
        ("Mouse", MOUSE_BINDINGS),
    ];

    let mut lines: Vec<Line<'static>> = Vec::new();
    for (title, bindings) in sections {
        lines.push(Line::from(Span::styled(title, section_style)));
        for binding in bindings {
            lines.push(Line::from(vec![
                Span::styled(format!("{:18}", binding.key), key_style),
                Span::styled(binding.description, desc_style),
            ]));
        }
        lines.push(Line::from(""));
    }

    let help_text = Paragraph::new(lines).scroll((scroll, 0));
    frame.render_widget(help_text, chunks[0]);

    let footer = Paragraph::new(Line::from(Span::styled(
        "Scroll: Up/Down  |  Close: F1/Esc",
        Style::default()
            .fg(Color::DarkGray)
            .add_modifier(Modifier::ITALIC),
    )));
    frame.render_widget(footer, chunks[1]);
}
