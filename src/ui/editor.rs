//! MML text area rendering.

use crate::app::App;
use ratatui::layout::Rect;
use ratatui::style::{Color, Style};
use ratatui::text::Line;
use ratatui::widgets::{Block, Borders, Paragraph};
use ratatui::Frame;

/// Renders the MML editor and places the terminal cursor.
///
/// Returns the inner text area for mouse hit testing.
pub fn render_editor(frame: &mut Frame, area: Rect, app: &mut App) -> Rect {
    let busy = app.controller().is_playing() || app.controller().is_exporting();
    let block = Block::default()
        .title(" MML ")
        .borders(Borders::ALL)
        .border_style(Style::default().fg(if busy { Color::Gray } else { Color::Cyan }));

    let inner = block.inner(area);
    frame.render_widget(block, area);

    let editor = &mut app.editor;
    editor.scroll_to_cursor(inner.height as usize);

    let lines: Vec<Line> = editor
        .lines()
        .iter()
        .skip(editor.scroll)
        .take(inner.height as usize)
        .map(|line| Line::from(line.as_str()))
        .collect();
    frame.render_widget(
        Paragraph::new(lines).style(Style::default().fg(Color::White)),
        inner,
    );

    if inner.width > 0 && inner.height > 0 {
        let (row, col) = editor.cursor();
        let x = inner.x + (col.min(inner.width as usize - 1)) as u16;
        let y = inner.y + (row - editor.scroll) as u16;
        frame.set_cursor_position((x, y));
    }

    inner
}
