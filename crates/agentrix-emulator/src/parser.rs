//! ANSI/VT escape sequence handling using the VTE crate.

use base64::Engine;
use tracing::debug;
use vte::{Params, Perform};

use agentrix_core::{Color, Dimensions, Theme};

use crate::grid::{Grid, Pen};

/// Out-of-band request raised by the byte stream.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TerminalEvent {
    /// BEL received
    Bell,
    /// OSC 52 clipboard write (decoded text)
    Clipboard(String),
    /// OSC 8 hyperlink the program made openable
    OpenLink(String),
    /// OSC 0/2 window title
    Title(String),
}

/// Off-screen terminal: a VTE state machine driving a [`Grid`].
///
/// The VTE state is kept between [`Parser::process`] calls, so escape
/// sequences split across chunks are decoded correctly.
pub struct Parser {
    screen: Screen,
    vt: vte::Parser,
    theme: Theme,
}

impl std::fmt::Debug for Parser {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Parser")
            .field("grid", &self.screen.grid)
            .field("theme", &self.theme)
            .finish_non_exhaustive()
    }
}

impl Parser {
    /// Create a parser over a blank grid.
    pub fn new(dimensions: Dimensions, scrollback_limit: usize) -> Self {
        Self::with_grid(Grid::new(dimensions, scrollback_limit))
    }

    /// Create a parser over an existing grid.
    pub fn with_grid(grid: Grid) -> Self {
        Self {
            screen: Screen {
                grid,
                events: Vec::new(),
            },
            vt: vte::Parser::new(),
            theme: Theme::plain(),
        }
    }

    /// Get a reference to the grid.
    pub fn grid(&self) -> &Grid {
        &self.screen.grid
    }

    /// Get a mutable reference to the grid.
    pub fn grid_mut(&mut self) -> &mut Grid {
        &mut self.screen.grid
    }

    /// Feed bytes. Returns the number of bytes consumed.
    pub fn process(&mut self, bytes: &[u8]) -> usize {
        for byte in bytes {
            self.vt.advance(&mut self.screen, *byte);
        }
        bytes.len()
    }

    /// Full reset: screen, scrollback, cursor, pen and parser state.
    ///
    /// The theme is not part of the terminal state and survives.
    pub fn reset(&mut self) {
        self.vt = vte::Parser::new();
        self.screen.grid.reset();
        self.screen.events.clear();
    }

    /// Current theme.
    pub fn theme(&self) -> &Theme {
        &self.theme
    }

    /// Set the theme used for default colors.
    pub fn set_theme(&mut self, theme: Theme) {
        self.theme = theme;
    }

    /// Resolve a cell color against the theme.
    pub fn resolve_fg(&self, color: Color) -> Color {
        match color {
            Color::Default => self.theme.foreground,
            other => other,
        }
    }

    /// Resolve a cell background against the theme.
    pub fn resolve_bg(&self, color: Color) -> Color {
        match color {
            Color::Default => self.theme.background,
            other => other,
        }
    }

    /// Drain side-channel events raised since the last call.
    pub fn take_events(&mut self) -> Vec<TerminalEvent> {
        std::mem::take(&mut self.screen.events)
    }
}

/// The `Perform` half of the parser. Split out so the VTE state machine
/// and the grid can be borrowed independently.
struct Screen {
    grid: Grid,
    events: Vec<TerminalEvent>,
}

fn first_param(params: &Params, default: u16) -> u16 {
    match params.iter().next().map(|p| p[0]) {
        None | Some(0) => default,
        Some(n) => n,
    }
}

fn parse_extended_color(iter: &mut vte::ParamsIter<'_>) -> Option<Color> {
    match iter.next()?[0] {
        5 => Some(Color::Indexed(iter.next()?[0] as u8)),
        2 => {
            let r = iter.next()?[0] as u8;
            let g = iter.next()?[0] as u8;
            let b = iter.next()?[0] as u8;
            Some(Color::Rgb { r, g, b })
        }
        _ => None,
    }
}

impl Screen {
    fn apply_sgr(&mut self, params: &Params) {
        if params.is_empty() {
            *self.grid.pen_mut() = Pen::default();
            return;
        }

        let mut iter = params.iter();
        while let Some(param) = iter.next() {
            let pen = self.grid.pen_mut();
            match param[0] {
                0 => *pen = Pen::default(),
                1 => pen.attrs.bold = true,
                2 => pen.attrs.dim = true,
                3 => pen.attrs.italic = true,
                4 => pen.attrs.underline = true,
                5 => pen.attrs.blink = true,
                7 => pen.attrs.reverse = true,
                8 => pen.attrs.hidden = true,
                9 => pen.attrs.strikethrough = true,
                22 => {
                    pen.attrs.bold = false;
                    pen.attrs.dim = false;
                }
                23 => pen.attrs.italic = false,
                24 => pen.attrs.underline = false,
                25 => pen.attrs.blink = false,
                27 => pen.attrs.reverse = false,
                28 => pen.attrs.hidden = false,
                29 => pen.attrs.strikethrough = false,
                n @ 30..=37 => pen.fg = Color::from_ansi((n - 30) as u8),
                39 => pen.fg = Color::Default,
                n @ 40..=47 => pen.bg = Color::from_ansi((n - 40) as u8),
                49 => pen.bg = Color::Default,
                n @ 90..=97 => pen.fg = Color::from_ansi((n - 90 + 8) as u8),
                n @ 100..=107 => pen.bg = Color::from_ansi((n - 100 + 8) as u8),
                38 => {
                    if let Some(color) = parse_extended_color(&mut iter) {
                        pen.fg = color;
                    }
                }
                48 => {
                    if let Some(color) = parse_extended_color(&mut iter) {
                        pen.bg = color;
                    }
                }
                _ => {}
            }
        }
    }

    fn erase_in_display(&mut self, mode: u16) {
        let pos = self.grid.cursor().position;
        let dims = self.grid.dimensions();
        match mode {
            0 => {
                self.grid.erase_in_row(pos.row, pos.col, dims.cols);
                self.grid.erase_rows(pos.row + 1, dims.rows);
            }
            1 => {
                self.grid.erase_rows(0, pos.row);
                self.grid.erase_in_row(pos.row, 0, pos.col + 1);
            }
            2 => self.grid.erase_rows(0, dims.rows),
            3 => {
                self.grid.erase_rows(0, dims.rows);
                self.grid.clear_scrollback();
            }
            _ => {}
        }
    }

    fn erase_in_line(&mut self, mode: u16) {
        let pos = self.grid.cursor().position;
        let cols = self.grid.dimensions().cols;
        match mode {
            0 => self.grid.erase_in_row(pos.row, pos.col, cols),
            1 => self.grid.erase_in_row(pos.row, 0, pos.col + 1),
            2 => self.grid.erase_in_row(pos.row, 0, cols),
            _ => {}
        }
    }

    fn set_private_mode(&mut self, params: &Params, enabled: bool) {
        for param in params.iter() {
            match param[0] {
                25 => self.grid.set_cursor_visible(enabled),
                mode => debug!(mode, enabled, "Ignoring private mode"),
            }
        }
    }

    fn handle_osc(&mut self, params: &[&[u8]]) {
        let Some(&command) = params.first() else {
            return;
        };
        match command {
            b"0" | b"2" => {
                if let Some(title) = params.get(1) {
                    self.events
                        .push(TerminalEvent::Title(String::from_utf8_lossy(title).into_owned()));
                }
            }
            b"8" => {
                // OSC 8 ; params ; uri. An empty uri closes the link.
                if let Some(uri) = params.get(2).filter(|uri| !uri.is_empty()) {
                    self.events
                        .push(TerminalEvent::OpenLink(String::from_utf8_lossy(uri).into_owned()));
                }
            }
            b"52" => {
                let Some(data) = params.get(2) else {
                    return;
                };
                if *data == b"?" {
                    return;
                }
                match base64::engine::general_purpose::STANDARD.decode(data) {
                    Ok(bytes) => self
                        .events
                        .push(TerminalEvent::Clipboard(String::from_utf8_lossy(&bytes).into_owned())),
                    Err(e) => debug!("Ignoring undecodable clipboard payload: {}", e),
                }
            }
            _ => {}
        }
    }
}

impl Perform for Screen {
    fn print(&mut self, c: char) {
        self.grid.put_char(c);
    }

    fn execute(&mut self, byte: u8) {
        match byte {
            0x07 => self.events.push(TerminalEvent::Bell),
            0x08 => {
                let pos = self.grid.cursor().position;
                self.grid.move_cursor(pos.row, pos.col.saturating_sub(1));
            }
            0x09 => {
                let pos = self.grid.cursor().position;
                self.grid.move_cursor(pos.row, (pos.col / 8 + 1) * 8);
            }
            0x0A..=0x0C => self.grid.line_feed(),
            0x0D => self.grid.carriage_return(),
            _ => {}
        }
    }

    fn hook(&mut self, _params: &Params, _intermediates: &[u8], _ignore: bool, _c: char) {}

    fn put(&mut self, _byte: u8) {}

    fn unhook(&mut self) {}

    fn osc_dispatch(&mut self, params: &[&[u8]], _bell_terminated: bool) {
        self.handle_osc(params);
    }

    fn csi_dispatch(&mut self, params: &Params, intermediates: &[u8], _ignore: bool, c: char) {
        let pos = self.grid.cursor().position;

        if intermediates == b"?" {
            match c {
                'h' => self.set_private_mode(params, true),
                'l' => self.set_private_mode(params, false),
                _ => {}
            }
            return;
        }

        match c {
            'A' => self
                .grid
                .move_cursor(pos.row.saturating_sub(first_param(params, 1)), pos.col),
            'B' => self
                .grid
                .move_cursor(pos.row.saturating_add(first_param(params, 1)), pos.col),
            'C' => self
                .grid
                .move_cursor(pos.row, pos.col.saturating_add(first_param(params, 1))),
            'D' => self
                .grid
                .move_cursor(pos.row, pos.col.saturating_sub(first_param(params, 1))),
            'E' => self
                .grid
                .move_cursor(pos.row.saturating_add(first_param(params, 1)), 0),
            'F' => self
                .grid
                .move_cursor(pos.row.saturating_sub(first_param(params, 1)), 0),
            'G' => self.grid.move_cursor(pos.row, first_param(params, 1) - 1),
            'd' => self.grid.move_cursor(first_param(params, 1) - 1, pos.col),
            'H' | 'f' => {
                let mut iter = params.iter();
                let row = iter.next().map(|p| p[0]).unwrap_or(1).max(1) - 1;
                let col = iter.next().map(|p| p[0]).unwrap_or(1).max(1) - 1;
                self.grid.move_cursor(row, col);
            }
            'J' => self.erase_in_display(params.iter().next().map(|p| p[0]).unwrap_or(0)),
            'K' => self.erase_in_line(params.iter().next().map(|p| p[0]).unwrap_or(0)),
            'S' => self.grid.scroll_up(first_param(params, 1)),
            'm' => self.apply_sgr(params),
            's' => self.grid.save_cursor(),
            'u' => self.grid.restore_cursor(),
            _ => {}
        }
    }

    fn esc_dispatch(&mut self, intermediates: &[u8], _ignore: bool, byte: u8) {
        if !intermediates.is_empty() {
            return;
        }
        match byte {
            b'c' => {
                self.grid.reset();
                self.events.clear();
            }
            b'7' => self.grid.save_cursor(),
            b'8' => self.grid.restore_cursor(),
            b'D' => self.grid.line_feed(),
            b'M' => self.grid.reverse_index(),
            b'E' => {
                self.grid.carriage_return();
                self.grid.line_feed();
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agentrix_core::Position;

    fn parser() -> Parser {
        Parser::new(Dimensions::new(24, 80), 1000)
    }

    fn row_text(parser: &Parser, row: u16) -> String {
        parser
            .grid()
            .row(row)
            .unwrap()
            .iter()
            .map(|c| c.character)
            .collect::<String>()
            .trim_end()
            .to_string()
    }

    #[test]
    fn test_parser_process_basic() {
        let mut parser = parser();
        let bytes = b"Hello, World!";
        assert_eq!(parser.process(bytes), bytes.len());
        assert_eq!(row_text(&parser, 0), "Hello, World!");
        assert_eq!(parser.grid().cursor().position.col, 13);
    }

    #[test]
    fn test_crlf_moves_to_next_line() {
        let mut parser = parser();
        parser.process(b"one\r\ntwo");
        assert_eq!(row_text(&parser, 0), "one");
        assert_eq!(row_text(&parser, 1), "two");
    }

    #[test]
    fn test_escape_split_across_chunks() {
        let mut parser = parser();
        parser.process(b"\x1b[3");
        parser.process(b"1mX");
        let cell = parser.grid().cell(0, 0).unwrap();
        assert_eq!(cell.character, 'X');
        assert_eq!(cell.fg, Color::Red);
    }

    #[test]
    fn test_utf8_split_across_chunks() {
        let mut parser = parser();
        let bytes = "é".as_bytes();
        parser.process(&bytes[..1]);
        parser.process(&bytes[1..]);
        assert_eq!(parser.grid().cell(0, 0).unwrap().character, 'é');
    }

    #[test]
    fn test_backspace_and_tab() {
        let mut parser = parser();
        parser.process(b"abc\x08");
        assert_eq!(parser.grid().cursor().position.col, 2);
        parser.process(b"\r\t");
        assert_eq!(parser.grid().cursor().position.col, 8);
    }

    #[test]
    fn test_csi_cursor_movement() {
        let mut parser = parser();
        parser.process(b"\x1b[11;21H");
        assert_eq!(parser.grid().cursor().position, Position::new(10, 20));

        parser.process(b"\x1b[5A");
        assert_eq!(parser.grid().cursor().position.row, 5);

        parser.process(b"\x1b[3G");
        assert_eq!(parser.grid().cursor().position.col, 2);

        parser.process(b"\x1b[H");
        assert_eq!(parser.grid().cursor().position, Position::origin());
    }

    #[test]
    fn test_sgr_colors_and_attributes() {
        let mut parser = parser();
        parser.process(b"\x1b[1;4;92;48;5;200mX\x1b[0mY\x1b[38;2;1;2;3mZ");

        let x = parser.grid().cell(0, 0).unwrap();
        assert!(x.attrs.bold);
        assert!(x.attrs.underline);
        assert_eq!(x.fg, Color::BrightGreen);
        assert_eq!(x.bg, Color::Indexed(200));

        let y = parser.grid().cell(0, 1).unwrap();
        assert!(y.attrs.is_default());
        assert_eq!(y.fg, Color::Default);

        let z = parser.grid().cell(0, 2).unwrap();
        assert_eq!(z.fg, Color::Rgb { r: 1, g: 2, b: 3 });
    }

    #[test]
    fn test_erase_in_display_and_line() {
        let mut parser = Parser::new(Dimensions::new(3, 10), 0);
        parser.process(b"XXXXXXXXXX\r\nXXXXXXXXXX\r\nXXXXXXXXXX");

        parser.process(b"\x1b[2;6H\x1b[K");
        assert_eq!(row_text(&parser, 1), "XXXXX");

        parser.process(b"\x1b[1;4H\x1b[J");
        assert_eq!(row_text(&parser, 0), "XXX");
        assert_eq!(row_text(&parser, 1), "");
        assert_eq!(row_text(&parser, 2), "");
    }

    #[test]
    fn test_output_scrolls_into_scrollback() {
        let mut parser = Parser::new(Dimensions::new(2, 10), 100);
        parser.process(b"a\r\nb\r\nc\r\n");
        assert_eq!(parser.grid().scrollback_len(), 2);
        assert_eq!(parser.grid().transcript_text(), "a\nb\nc");
    }

    #[test]
    fn test_cursor_visibility() {
        let mut parser = parser();
        parser.process(b"\x1b[?25l");
        assert!(!parser.grid().cursor().visible);
        parser.process(b"\x1b[?25h");
        assert!(parser.grid().cursor().visible);
    }

    #[test]
    fn test_reset_clears_screen_and_parser_state() {
        let mut parser = Parser::new(Dimensions::new(2, 10), 100);
        parser.process(b"a\r\nb\r\nc\x1b[31");
        parser.reset();
        parser.process(b"mZ");

        // The half-read CSI was dropped, so "mZ" prints literally.
        assert_eq!(parser.grid().transcript_text(), "mZ");
        assert_eq!(parser.grid().scrollback_len(), 0);
        assert_eq!(parser.grid().cell(0, 1).unwrap().fg, Color::Default);
    }

    #[test]
    fn test_ris_sequence_resets() {
        let mut parser = parser();
        parser.process(b"junk\x1bcok");
        assert_eq!(parser.grid().transcript_text(), "ok");
    }

    #[test]
    fn test_theme_survives_reset() {
        let mut parser = parser();
        let theme = Theme::default();
        parser.set_theme(theme);
        parser.reset();
        assert_eq!(parser.theme(), &theme);
        assert_eq!(parser.resolve_fg(Color::Default), theme.foreground);
        assert_eq!(parser.resolve_bg(Color::Red), Color::Red);
    }

    #[test]
    fn test_bell_event() {
        let mut parser = parser();
        parser.process(b"done\x07");
        assert_eq!(parser.take_events(), vec![TerminalEvent::Bell]);
        assert!(parser.take_events().is_empty());
    }

    #[test]
    fn test_clipboard_event() {
        let mut parser = parser();
        // "hello" in base64
        parser.process(b"\x1b]52;c;aGVsbG8=\x07");
        assert_eq!(
            parser.take_events(),
            vec![TerminalEvent::Clipboard("hello".to_string())]
        );

        parser.process(b"\x1b]52;c;?\x07\x1b]52;c;!!!\x07");
        assert!(parser.take_events().is_empty());
    }

    #[test]
    fn test_hyperlink_event() {
        let mut parser = parser();
        parser.process(b"\x1b]8;;https://example.com\x1b\\link\x1b]8;;\x1b\\");
        assert_eq!(
            parser.take_events(),
            vec![TerminalEvent::OpenLink("https://example.com".to_string())]
        );
        assert_eq!(row_text(&parser, 0), "link");
    }

    #[test]
    fn test_title_event() {
        let mut parser = parser();
        parser.process(b"\x1b]0;build\x07");
        assert_eq!(
            parser.take_events(),
            vec![TerminalEvent::Title("build".to_string())]
        );
    }
}
