//! Cell, color and theme types for terminal rendering.

use serde::{Deserialize, Serialize};

/// Terminal color supporting ANSI, 256-color palette, and true RGB.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Color {
    /// Default terminal color
    Default,

    /// Standard ANSI colors (0-7)
    Black,
    /// ANSI Red
    Red,
    /// ANSI Green
    Green,
    /// ANSI Yellow
    Yellow,
    /// ANSI Blue
    Blue,
    /// ANSI Magenta
    Magenta,
    /// ANSI Cyan
    Cyan,
    /// ANSI White
    White,

    /// Bright ANSI colors (8-15)
    BrightBlack,
    /// Bright Red
    BrightRed,
    /// Bright Green
    BrightGreen,
    /// Bright Yellow
    BrightYellow,
    /// Bright Blue
    BrightBlue,
    /// Bright Magenta
    BrightMagenta,
    /// Bright Cyan
    BrightCyan,
    /// Bright White
    BrightWhite,

    /// 256-color palette index (0-255)
    Indexed(u8),

    /// True color RGB (24-bit)
    Rgb {
        /// Red component
        r: u8,
        /// Green component
        g: u8,
        /// Blue component
        b: u8,
    },
}

impl Color {
    /// Map an ANSI palette index (0-15) to a named color.
    ///
    /// Indices above 15 become [`Color::Indexed`].
    pub fn from_ansi(index: u8) -> Self {
        match index {
            0 => Color::Black,
            1 => Color::Red,
            2 => Color::Green,
            3 => Color::Yellow,
            4 => Color::Blue,
            5 => Color::Magenta,
            6 => Color::Cyan,
            7 => Color::White,
            8 => Color::BrightBlack,
            9 => Color::BrightRed,
            10 => Color::BrightGreen,
            11 => Color::BrightYellow,
            12 => Color::BrightBlue,
            13 => Color::BrightMagenta,
            14 => Color::BrightCyan,
            15 => Color::BrightWhite,
            n => Color::Indexed(n),
        }
    }

    /// X11 color spec (`rgb:rr/gg/bb`) for OSC 10/11/12 theme sequences.
    ///
    /// Only true colors have an unambiguous spec; palette colors depend on
    /// the host terminal's palette and return `None`.
    pub fn x11_spec(&self) -> Option<String> {
        match self {
            Color::Rgb { r, g, b } => Some(format!("rgb:{r:02x}/{g:02x}/{b:02x}")),
            _ => None,
        }
    }
}

/// Text attributes for a terminal cell.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct CellAttributes {
    /// Bold/bright text
    pub bold: bool,
    /// Dimmed text
    pub dim: bool,
    /// Italic text
    pub italic: bool,
    /// Underlined text
    pub underline: bool,
    /// Blinking text
    pub blink: bool,
    /// Reverse video (swap fg/bg)
    pub reverse: bool,
    /// Hidden text
    pub hidden: bool,
    /// Strikethrough text
    pub strikethrough: bool,
}

impl CellAttributes {
    /// Check if attributes are all default (no formatting).
    pub fn is_default(&self) -> bool {
        *self == Self::default()
    }
}

/// Single character cell in the terminal grid.
#[derive(Debug, Clone, PartialEq)]
pub struct Cell {
    /// Unicode character (space if empty)
    pub character: char,
    /// Foreground color
    pub fg: Color,
    /// Background color
    pub bg: Color,
    /// Text attributes
    pub attrs: CellAttributes,
}

impl Default for Cell {
    fn default() -> Self {
        Self {
            character: ' ',
            fg: Color::Default,
            bg: Color::Default,
            attrs: CellAttributes::default(),
        }
    }
}

impl Cell {
    /// Create a new cell with a character and default styling.
    pub fn new(character: char) -> Self {
        Self {
            character,
            ..Default::default()
        }
    }

    /// Blank cell painted with a background color (used by erase operations).
    pub fn blank(bg: Color) -> Self {
        Self {
            bg,
            ..Default::default()
        }
    }

    /// Check if cell is empty (space with default attributes).
    pub fn is_empty(&self) -> bool {
        self.character == ' ' && self.attrs.is_default()
    }
}

/// Custom colors applied on top of a terminal widget's defaults.
///
/// A full terminal reset drops these on some widgets, so the render
/// adapter reapplies the theme after every reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Theme {
    /// Default foreground
    pub foreground: Color,
    /// Default background
    pub background: Color,
    /// Cursor color
    pub cursor: Color,
}

impl Default for Theme {
    fn default() -> Self {
        Self {
            foreground: Color::Rgb {
                r: 0xe5,
                g: 0xe7,
                b: 0xeb,
            },
            background: Color::Rgb {
                r: 0x0b,
                g: 0x10,
                b: 0x20,
            },
            cursor: Color::Rgb {
                r: 0xf9,
                g: 0x73,
                b: 0x16,
            },
        }
    }
}

impl Theme {
    /// Theme that leaves every color at the widget default.
    pub fn plain() -> Self {
        Self {
            foreground: Color::Default,
            background: Color::Default,
            cursor: Color::Default,
        }
    }
}
