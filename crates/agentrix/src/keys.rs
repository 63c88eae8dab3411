//! Key event translation for `attach`.
//!
//! Printable characters go through the text-commit path; everything else
//! is encoded as the byte sequence a terminal would send.

use crossterm::event::{KeyCode, KeyEvent, KeyEventKind, KeyModifiers};

/// What a key press means for the attachment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyAction {
    /// Leave the attachment (Ctrl-])
    Detach,
    /// Committed text
    Text(String),
    /// Backspace
    DeleteBackward,
    /// Raw bytes (control keys, escape sequences)
    Bytes(Vec<u8>),
}

/// Translate a key event. Releases and unmapped keys yield `None`.
pub fn translate(key: &KeyEvent) -> Option<KeyAction> {
    if key.kind == KeyEventKind::Release {
        return None;
    }
    let ctrl = key.modifiers.contains(KeyModifiers::CONTROL);
    let alt = key.modifiers.contains(KeyModifiers::ALT);

    let action = match key.code {
        KeyCode::Char(']') if ctrl => KeyAction::Detach,
        KeyCode::Char(c) if ctrl => KeyAction::Bytes(with_alt(alt, vec![control_byte(c)?])),
        KeyCode::Char(c) if alt => {
            let mut bytes = vec![0x1b];
            bytes.extend_from_slice(c.to_string().as_bytes());
            KeyAction::Bytes(bytes)
        }
        KeyCode::Char(c) => KeyAction::Text(c.to_string()),
        KeyCode::Backspace if !alt => KeyAction::DeleteBackward,
        KeyCode::Backspace => KeyAction::Bytes(vec![0x1b, 0x7f]),
        KeyCode::Enter => KeyAction::Bytes(vec![b'\r']),
        KeyCode::Tab => KeyAction::Bytes(vec![b'\t']),
        KeyCode::BackTab => KeyAction::Bytes(b"\x1b[Z".to_vec()),
        KeyCode::Esc => KeyAction::Bytes(vec![0x1b]),
        KeyCode::Up => KeyAction::Bytes(cursor_key(b'A', key.modifiers)),
        KeyCode::Down => KeyAction::Bytes(cursor_key(b'B', key.modifiers)),
        KeyCode::Right => KeyAction::Bytes(cursor_key(b'C', key.modifiers)),
        KeyCode::Left => KeyAction::Bytes(cursor_key(b'D', key.modifiers)),
        KeyCode::Home => KeyAction::Bytes(cursor_key(b'H', key.modifiers)),
        KeyCode::End => KeyAction::Bytes(cursor_key(b'F', key.modifiers)),
        KeyCode::PageUp => KeyAction::Bytes(b"\x1b[5~".to_vec()),
        KeyCode::PageDown => KeyAction::Bytes(b"\x1b[6~".to_vec()),
        KeyCode::Insert => KeyAction::Bytes(b"\x1b[2~".to_vec()),
        KeyCode::Delete => KeyAction::Bytes(b"\x1b[3~".to_vec()),
        KeyCode::F(n) => KeyAction::Bytes(function_key(n)?),
        _ => return None,
    };
    Some(action)
}

fn with_alt(alt: bool, mut bytes: Vec<u8>) -> Vec<u8> {
    if alt {
        bytes.insert(0, 0x1b);
    }
    bytes
}

/// C0 byte for Ctrl+`c`.
fn control_byte(c: char) -> Option<u8> {
    match c.to_ascii_lowercase() {
        c @ 'a'..='z' => Some(c as u8 - b'a' + 1),
        ' ' | '@' | '2' => Some(0x00),
        '[' | '3' => Some(0x1b),
        '\\' | '4' => Some(0x1c),
        '5' => Some(0x1d),
        '^' | '6' => Some(0x1e),
        '_' | '-' | '7' => Some(0x1f),
        '8' | '?' => Some(0x7f),
        _ => None,
    }
}

/// `CSI final`, or `CSI 1;m final` with xterm modifier parameters.
fn cursor_key(final_byte: u8, modifiers: KeyModifiers) -> Vec<u8> {
    let mut param = 1;
    if modifiers.contains(KeyModifiers::SHIFT) {
        param += 1;
    }
    if modifiers.contains(KeyModifiers::ALT) {
        param += 2;
    }
    if modifiers.contains(KeyModifiers::CONTROL) {
        param += 4;
    }
    if param == 1 {
        vec![0x1b, b'[', final_byte]
    } else {
        let mut bytes = format!("\x1b[1;{param}").into_bytes();
        bytes.push(final_byte);
        bytes
    }
}

fn function_key(n: u8) -> Option<Vec<u8>> {
    let seq: &[u8] = match n {
        1 => b"\x1bOP",
        2 => b"\x1bOQ",
        3 => b"\x1bOR",
        4 => b"\x1bOS",
        5 => b"\x1b[15~",
        6 => b"\x1b[17~",
        7 => b"\x1b[18~",
        8 => b"\x1b[19~",
        9 => b"\x1b[20~",
        10 => b"\x1b[21~",
        11 => b"\x1b[23~",
        12 => b"\x1b[24~",
        _ => return None,
    };
    Some(seq.to_vec())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn key(code: KeyCode, modifiers: KeyModifiers) -> KeyEvent {
        KeyEvent::new(code, modifiers)
    }

    #[test]
    fn test_plain_char_is_text() {
        assert_eq!(
            translate(&key(KeyCode::Char('a'), KeyModifiers::NONE)),
            Some(KeyAction::Text("a".to_string()))
        );
        assert_eq!(
            translate(&key(KeyCode::Char('A'), KeyModifiers::SHIFT)),
            Some(KeyAction::Text("A".to_string()))
        );
    }

    #[test]
    fn test_ctrl_keys() {
        assert_eq!(
            translate(&key(KeyCode::Char('c'), KeyModifiers::CONTROL)),
            Some(KeyAction::Bytes(vec![0x03]))
        );
        assert_eq!(
            translate(&key(KeyCode::Char(']'), KeyModifiers::CONTROL)),
            Some(KeyAction::Detach)
        );
        assert_eq!(translate(&key(KeyCode::Char('é'), KeyModifiers::CONTROL)), None);
    }

    #[test]
    fn test_alt_prefixes_escape() {
        assert_eq!(
            translate(&key(KeyCode::Char('x'), KeyModifiers::ALT)),
            Some(KeyAction::Bytes(vec![0x1b, b'x']))
        );
    }

    #[test]
    fn test_backspace_and_enter() {
        assert_eq!(
            translate(&key(KeyCode::Backspace, KeyModifiers::NONE)),
            Some(KeyAction::DeleteBackward)
        );
        assert_eq!(
            translate(&key(KeyCode::Enter, KeyModifiers::NONE)),
            Some(KeyAction::Bytes(vec![b'\r']))
        );
    }

    #[test]
    fn test_arrow_keys() {
        assert_eq!(
            translate(&key(KeyCode::Up, KeyModifiers::NONE)),
            Some(KeyAction::Bytes(b"\x1b[A".to_vec()))
        );
        assert_eq!(
            translate(&key(KeyCode::Left, KeyModifiers::CONTROL)),
            Some(KeyAction::Bytes(b"\x1b[1;5D".to_vec()))
        );
    }

    #[test]
    fn test_function_keys() {
        assert_eq!(
            translate(&key(KeyCode::F(1), KeyModifiers::NONE)),
            Some(KeyAction::Bytes(b"\x1bOP".to_vec()))
        );
        assert_eq!(translate(&key(KeyCode::F(20), KeyModifiers::NONE)), None);
    }

    #[test]
    fn test_release_ignored() {
        let mut event = key(KeyCode::Char('a'), KeyModifiers::NONE);
        event.kind = KeyEventKind::Release;
        assert_eq!(translate(&event), None);
    }
}
