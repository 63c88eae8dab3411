//! Terminal grid with scrollback and cursor tracking.

use std::collections::VecDeque;

use agentrix_core::{Cell, CellAttributes, Color, Dimensions, Position};

/// Cursor state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Cursor {
    /// Current position
    pub position: Position,
    /// Visibility (DECTCEM)
    pub visible: bool,
}

impl Default for Cursor {
    fn default() -> Self {
        Self {
            position: Position::origin(),
            visible: true,
        }
    }
}

/// Attributes and colors applied to newly printed characters.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Pen {
    /// Text attributes
    pub attrs: CellAttributes,
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
}

impl Default for Pen {
    fn default() -> Self {
        Self {
            attrs: CellAttributes::default(),
            fg: Color::Default,
            bg: Color::Default,
        }
    }
}

/// Visible screen plus the lines that scrolled off its top.
#[derive(Debug)]
pub struct Grid {
    /// Visible rows, top first
    rows: Vec<Vec<Cell>>,
    /// Lines scrolled off the top, oldest first
    scrollback: VecDeque<Vec<Cell>>,
    /// Maximum retained scrollback lines
    scrollback_limit: usize,
    dimensions: Dimensions,
    cursor: Cursor,
    saved_cursor: Option<(Cursor, Pen)>,
    /// Set after printing into the last column; the next print wraps first
    wrap_pending: bool,
    pen: Pen,
}

impl Grid {
    /// Create an empty grid.
    pub fn new(dimensions: Dimensions, scrollback_limit: usize) -> Self {
        Self {
            rows: blank_rows(dimensions),
            scrollback: VecDeque::new(),
            scrollback_limit,
            dimensions,
            cursor: Cursor::default(),
            saved_cursor: None,
            wrap_pending: false,
            pen: Pen::default(),
        }
    }

    /// Get cell at position, or `None` when out of bounds.
    pub fn cell(&self, row: u16, col: u16) -> Option<&Cell> {
        self.rows.get(row as usize)?.get(col as usize)
    }

    /// Get mutable cell at position, or `None` when out of bounds.
    pub fn cell_mut(&mut self, row: u16, col: u16) -> Option<&mut Cell> {
        self.rows.get_mut(row as usize)?.get_mut(col as usize)
    }

    /// Get a visible row.
    pub fn row(&self, row: u16) -> Option<&[Cell]> {
        self.rows.get(row as usize).map(Vec::as_slice)
    }

    /// Lines that scrolled off the top, oldest first.
    pub fn scrollback(&self) -> impl Iterator<Item = &[Cell]> {
        self.scrollback.iter().map(Vec::as_slice)
    }

    /// Number of retained scrollback lines.
    pub fn scrollback_len(&self) -> usize {
        self.scrollback.len()
    }

    /// Visible screen as text, trailing whitespace trimmed per line.
    pub fn to_plain_text(&self) -> String {
        join_lines(self.rows.iter())
    }

    /// Scrollback followed by the visible screen, as text.
    ///
    /// Trailing blank lines of the screen are dropped.
    pub fn transcript_text(&self) -> String {
        let text = join_lines(self.scrollback.iter().chain(self.rows.iter()));
        text.trim_end_matches('\n').to_string()
    }

    /// Get cursor reference.
    pub fn cursor(&self) -> &Cursor {
        &self.cursor
    }

    /// Get dimensions.
    pub fn dimensions(&self) -> Dimensions {
        self.dimensions
    }

    /// Current pen.
    pub fn pen(&self) -> &Pen {
        &self.pen
    }

    /// Mutable pen for SGR updates.
    pub fn pen_mut(&mut self) -> &mut Pen {
        &mut self.pen
    }

    /// Move the cursor, clamped to the screen. Cancels a pending wrap.
    pub fn move_cursor(&mut self, row: u16, col: u16) {
        self.cursor.position = Position::new(
            row.min(self.dimensions.rows.saturating_sub(1)),
            col.min(self.dimensions.cols.saturating_sub(1)),
        );
        self.wrap_pending = false;
    }

    /// Show or hide the cursor.
    pub fn set_cursor_visible(&mut self, visible: bool) {
        self.cursor.visible = visible;
    }

    /// Write a character at the cursor with the current pen and advance.
    pub fn put_char(&mut self, c: char) {
        if self.dimensions.is_empty() {
            return;
        }
        if self.wrap_pending {
            self.cursor.position.col = 0;
            self.line_feed();
        }

        let Position { row, col } = self.cursor.position;
        let pen = self.pen;
        if let Some(cell) = self.cell_mut(row, col) {
            *cell = Cell {
                character: c,
                fg: pen.fg,
                bg: pen.bg,
                attrs: pen.attrs,
            };
        }

        if col + 1 >= self.dimensions.cols {
            self.wrap_pending = true;
        } else {
            self.cursor.position.col = col + 1;
        }
    }

    /// Move down one row, scrolling the screen at the bottom.
    pub fn line_feed(&mut self) {
        self.wrap_pending = false;
        if self.cursor.position.row + 1 >= self.dimensions.rows {
            self.scroll_up(1);
        } else {
            self.cursor.position.row += 1;
        }
    }

    /// Move up one row, scrolling the screen down at the top.
    pub fn reverse_index(&mut self) {
        self.wrap_pending = false;
        if self.cursor.position.row == 0 {
            self.rows.pop();
            self.rows.insert(0, blank_row(self.dimensions.cols, self.pen.bg));
        } else {
            self.cursor.position.row -= 1;
        }
    }

    /// Return the cursor to column 0.
    pub fn carriage_return(&mut self) {
        self.cursor.position.col = 0;
        self.wrap_pending = false;
    }

    /// Scroll the screen up, moving top lines into scrollback.
    pub fn scroll_up(&mut self, lines: u16) {
        for _ in 0..lines.min(self.dimensions.rows) {
            let top = self.rows.remove(0);
            self.rows.push(blank_row(self.dimensions.cols, self.pen.bg));
            if self.scrollback_limit > 0 {
                if self.scrollback.len() == self.scrollback_limit {
                    self.scrollback.pop_front();
                }
                self.scrollback.push_back(top);
            }
        }
    }

    /// Blank columns `[from, to)` of a row using the pen background.
    pub fn erase_in_row(&mut self, row: u16, from: u16, to: u16) {
        let blank = Cell::blank(self.pen.bg);
        if let Some(cells) = self.rows.get_mut(row as usize) {
            let end = (to as usize).min(cells.len());
            for cell in cells.iter_mut().take(end).skip(from as usize) {
                *cell = blank.clone();
            }
        }
    }

    /// Blank whole rows `[from, to)`.
    pub fn erase_rows(&mut self, from: u16, to: u16) {
        for row in from..to.min(self.dimensions.rows) {
            self.erase_in_row(row, 0, self.dimensions.cols);
        }
    }

    /// Drop all scrollback.
    pub fn clear_scrollback(&mut self) {
        self.scrollback.clear();
    }

    /// Save cursor and pen (DECSC).
    pub fn save_cursor(&mut self) {
        self.saved_cursor = Some((self.cursor.clone(), self.pen));
    }

    /// Restore cursor and pen (DECRC).
    pub fn restore_cursor(&mut self) {
        if let Some((cursor, pen)) = self.saved_cursor.take() {
            self.cursor = cursor;
            self.pen = pen;
            self.wrap_pending = false;
        }
    }

    /// Return to the power-on state: blank screen, no scrollback, cursor
    /// at the origin, default pen.
    pub fn reset(&mut self) {
        self.rows = blank_rows(self.dimensions);
        self.scrollback.clear();
        self.cursor = Cursor::default();
        self.saved_cursor = None;
        self.wrap_pending = false;
        self.pen = Pen::default();
    }

    /// Resize, keeping the top-left content. The cursor is clamped.
    pub fn resize(&mut self, dimensions: Dimensions) {
        let cols = dimensions.cols as usize;
        self.rows.resize_with(dimensions.rows as usize, || {
            blank_row(dimensions.cols, Color::Default)
        });
        for row in &mut self.rows {
            row.resize(cols, Cell::default());
        }
        self.dimensions = dimensions;
        self.wrap_pending = false;

        let pos = self.cursor.position;
        self.move_cursor(pos.row, pos.col);
    }
}

fn blank_row(cols: u16, bg: Color) -> Vec<Cell> {
    vec![Cell::blank(bg); cols as usize]
}

fn blank_rows(dimensions: Dimensions) -> Vec<Vec<Cell>> {
    (0..dimensions.rows)
        .map(|_| blank_row(dimensions.cols, Color::Default))
        .collect()
}

fn join_lines<'a>(rows: impl Iterator<Item = &'a Vec<Cell>>) -> String {
    rows.map(|row| {
        row.iter()
            .map(|c| c.character)
            .collect::<String>()
            .trim_end()
            .to_string()
    })
    .collect::<Vec<_>>()
    .join("\n")
}
