//! A minimal multi-line text editor for MML source.
//!
//! The cursor is tracked as (row, column) in characters, so multi-byte
//! text such as Japanese lyrics in comments is edited correctly.

/// Multi-line text buffer with a cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MmlEditor {
    lines: Vec<String>,
    row: usize,
    col: usize,
    /// First visible line (kept in sync by the renderer).
    pub scroll: usize,
}

impl Default for MmlEditor {
    fn default() -> Self {
        Self {
            lines: vec![String::new()],
            row: 0,
            col: 0,
            scroll: 0,
        }
    }
}

/// Byte offset of the `col`-th character of `line`.
fn byte_index(line: &str, col: usize) -> usize {
    line.char_indices()
        .nth(col)
        .map(|(i, _)| i)
        .unwrap_or(line.len())
}

fn char_len(line: &str) -> usize {
    line.chars().count()
}

impl MmlEditor {
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates an editor holding `text`, with the cursor at the end.
    pub fn from_text(text: &str) -> Self {
        let mut editor = Self::default();
        editor.set_text(text);
        editor
    }

    /// Replaces the whole text and moves the cursor to the end.
    pub fn set_text(&mut self, text: &str) {
        self.lines = text.lines().map(String::from).collect();
        if text.ends_with('\n') || self.lines.is_empty() {
            self.lines.push(String::new());
        }
        self.row = self.lines.len() - 1;
        self.col = char_len(&self.lines[self.row]);
        self.scroll = 0;
    }

    /// Returns the full text, lines joined with `\n`.
    pub fn text(&self) -> String {
        self.lines.join("\n")
    }

    pub fn lines(&self) -> &[String] {
        &self.lines
    }

    /// Returns the cursor as (row, column).
    pub fn cursor(&self) -> (usize, usize) {
        (self.row, self.col)
    }

    pub fn clear(&mut self) {
        *self = Self::default();
    }

    pub fn insert_char(&mut self, c: char) {
        if c == '\n' {
            self.insert_newline();
            return;
        }
        let line = &mut self.lines[self.row];
        let at = byte_index(line, self.col);
        line.insert(at, c);
        self.col += 1;
    }

    /// Inserts a string, handling embedded newlines (used for pastes).
    pub fn insert_str(&mut self, text: &str) {
        for c in text.chars().filter(|c| *c != '\r') {
            self.insert_char(c);
        }
    }

    /// Splits the current line at the cursor.
    pub fn insert_newline(&mut self) {
        let line = &mut self.lines[self.row];
        let at = byte_index(line, self.col);
        let rest = line.split_off(at);
        self.row += 1;
        self.col = 0;
        self.lines.insert(self.row, rest);
    }

    /// Deletes the character before the cursor, joining lines at column 0.
    pub fn backspace(&mut self) {
        if self.col > 0 {
            let line = &mut self.lines[self.row];
            let at = byte_index(line, self.col - 1);
            line.remove(at);
            self.col -= 1;
        } else if self.row > 0 {
            let current = self.lines.remove(self.row);
            self.row -= 1;
            self.col = char_len(&self.lines[self.row]);
            self.lines[self.row].push_str(&current);
        }
    }

    /// Deletes the character under the cursor, joining lines at the end.
    pub fn delete(&mut self) {
        let len = char_len(&self.lines[self.row]);
        if self.col < len {
            let line = &mut self.lines[self.row];
            let at = byte_index(line, self.col);
            line.remove(at);
        } else if self.row + 1 < self.lines.len() {
            let next = self.lines.remove(self.row + 1);
            self.lines[self.row].push_str(&next);
        }
    }

    pub fn move_left(&mut self) {
        if self.col > 0 {
            self.col -= 1;
        } else if self.row > 0 {
            self.row -= 1;
            self.col = char_len(&self.lines[self.row]);
        }
    }

    pub fn move_right(&mut self) {
        if self.col < char_len(&self.lines[self.row]) {
            self.col += 1;
        } else if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = 0;
        }
    }

    pub fn move_up(&mut self) {
        if self.row > 0 {
            self.row -= 1;
            self.col = self.col.min(char_len(&self.lines[self.row]));
        }
    }

    pub fn move_down(&mut self) {
        if self.row + 1 < self.lines.len() {
            self.row += 1;
            self.col = self.col.min(char_len(&self.lines[self.row]));
        }
    }

    pub fn move_home(&mut self) {
        self.col = 0;
    }

    pub fn move_end(&mut self) {
        self.col = char_len(&self.lines[self.row]);
    }

    /// Places the cursor at (row, column), clamped to the text.
    pub fn set_cursor(&mut self, row: usize, col: usize) {
        self.row = row.min(self.lines.len() - 1);
        self.col = col.min(char_len(&self.lines[self.row]));
    }

    /// Adjusts `scroll` so the cursor row is within `height` visible lines.
    pub fn scroll_to_cursor(&mut self, height: usize) {
        if height == 0 {
            return;
        }
        if self.row < self.scroll {
            self.scroll = self.row;
        } else if self.row >= self.scroll + height {
            self.scroll = self.row + 1 - height;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_typing_and_newlines() {
        let mut editor = MmlEditor::new();
        editor.insert_str("t120\no5cde");
        assert_eq!(editor.text(), "t120\no5cde");
        assert_eq!(editor.cursor(), (1, 5));

        editor.move_home();
        editor.insert_newline();
        assert_eq!(editor.lines(), &["t120", "", "o5cde"]);
        assert_eq!(editor.cursor(), (2, 0));
    }

    #[test]
    fn test_backspace_joins_lines() {
        let mut editor = MmlEditor::from_text("ab\ncd");
        editor.set_cursor(1, 0);
        editor.backspace();
        assert_eq!(editor.text(), "abcd");
        assert_eq!(editor.cursor(), (0, 2));

        editor.backspace();
        assert_eq!(editor.text(), "acd");
    }

    #[test]
    fn test_delete_joins_lines() {
        let mut editor = MmlEditor::from_text("ab\ncd");
        editor.set_cursor(0, 2);
        editor.delete();
        assert_eq!(editor.text(), "abcd");
        editor.set_cursor(0, 0);
        editor.delete();
        assert_eq!(editor.text(), "bcd");
    }

    #[test]
    fn test_multibyte_editing() {
        let mut editor = MmlEditor::from_text("/*ドレミ*/");
        editor.set_cursor(0, 3);
        editor.backspace();
        assert_eq!(editor.text(), "/*レミ*/");
        editor.insert_char('ソ');
        assert_eq!(editor.text(), "/*ソレミ*/");
    }

    #[test]
    fn test_cursor_movement_clamps() {
        let mut editor = MmlEditor::from_text("long line\nab");
        editor.set_cursor(0, 9);
        editor.move_down();
        assert_eq!(editor.cursor(), (1, 2));
        editor.move_right();
        assert_eq!(editor.cursor(), (1, 2));
        editor.move_home();
        editor.move_left();
        assert_eq!(editor.cursor(), (0, 9));
        editor.set_cursor(10, 10);
        assert_eq!(editor.cursor(), (1, 2));
    }

    #[test]
    fn test_from_text_trailing_newline() {
        let editor = MmlEditor::from_text("cde\n");
        assert_eq!(editor.lines(), &["cde", ""]);
        assert_eq!(editor.text(), "cde\n");
        assert_eq!(MmlEditor::from_text("").text(), "");
    }

    #[test]
    fn test_scroll_follows_cursor() {
        let mut editor = MmlEditor::from_text("1\n2\n3\n4\n5\n6");
        editor.scroll_to_cursor(3);
        assert_eq!(editor.scroll, 3);
        editor.set_cursor(0, 0);
        editor.scroll_to_cursor(3);
        assert_eq!(editor.scroll, 0);
    }
}
