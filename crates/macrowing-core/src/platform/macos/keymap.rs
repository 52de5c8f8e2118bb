//! macOS virtual key codes (ANSI layout)

use crate::input::{Key, NamedKey};

fn named_keycode(key: NamedKey) -> Option<u16> {
    let code = match key {
        NamedKey::Enter => 36,
        NamedKey::Tab => 48,
        NamedKey::Space => 49,
        NamedKey::Backspace => 51,
        NamedKey::Esc => 53,
        NamedKey::Cmd | NamedKey::CmdL => 55,
        NamedKey::CmdR => 54,
        NamedKey::Shift | NamedKey::ShiftL => 56,
        NamedKey::ShiftR => 60,
        NamedKey::CapsLock => 57,
        NamedKey::Alt | NamedKey::AltL => 58,
        NamedKey::AltR | NamedKey::AltGr => 61,
        NamedKey::Ctrl | NamedKey::CtrlL => 59,
        NamedKey::CtrlR => 62,
        NamedKey::Insert => 114,
        NamedKey::Delete => 117,
        NamedKey::Home => 115,
        NamedKey::End => 119,
        NamedKey::PageUp => 116,
        NamedKey::PageDown => 121,
        NamedKey::Left => 123,
        NamedKey::Right => 124,
        NamedKey::Down => 125,
        NamedKey::Up => 126,
        NamedKey::F(n) => return function_keycode(n),
        NamedKey::Menu
        | NamedKey::NumLock
        | NamedKey::Pause
        | NamedKey::PrintScreen
        | NamedKey::ScrollLock => return None,
    };
    Some(code)
}

fn function_keycode(n: u8) -> Option<u16> {
    const F_KEYS: [u16; 20] = [
        122, 120, 99, 118, 96, 97, 98, 100, 101, 109, 103, 111, 105, 107, 113, 106, 64, 79, 80, 90,
    ];
    F_KEYS.get(usize::from(n).checked_sub(1)?).copied()
}

/// Convert char to (keycode, needs_shift)
fn char_keycode(c: char) -> Option<(u16, bool)> {
    Some(match c {
        'a' | 'A' => (0, c.is_uppercase()),
        'b' | 'B' => (11, c.is_uppercase()),
        'c' | 'C' => (8, c.is_uppercase()),
        'd' | 'D' => (2, c.is_uppercase()),
        'e' | 'E' => (14, c.is_uppercase()),
        'f' | 'F' => (3, c.is_uppercase()),
        'g' | 'G' => (5, c.is_uppercase()),
        'h' | 'H' => (4, c.is_uppercase()),
        'i' | 'I' => (34, c.is_uppercase()),
        'j' | 'J' => (38, c.is_uppercase()),
        'k' | 'K' => (40, c.is_uppercase()),
        'l' | 'L' => (37, c.is_uppercase()),
        'm' | 'M' => (46, c.is_uppercase()),
        'n' | 'N' => (45, c.is_uppercase()),
        'o' | 'O' => (31, c.is_uppercase()),
        'p' | 'P' => (35, c.is_uppercase()),
        'q' | 'Q' => (12, c.is_uppercase()),
        'r' | 'R' => (15, c.is_uppercase()),
        's' | 'S' => (1, c.is_uppercase()),
        't' | 'T' => (17, c.is_uppercase()),
        'u' | 'U' => (32, c.is_uppercase()),
        'v' | 'V' => (9, c.is_uppercase()),
        'w' | 'W' => (13, c.is_uppercase()),
        'x' | 'X' => (7, c.is_uppercase()),
        'y' | 'Y' => (16, c.is_uppercase()),
        'z' | 'Z' => (6, c.is_uppercase()),
        '0' | ')' => (29, c == ')'),
        '1' | '!' => (18, c == '!'),
        '2' | '@' => (19, c == '@'),
        '3' | '#' => (20, c == '#'),
        '4' | '$' => (21, c == '$'),
        '5' | '%' => (23, c == '%'),
        '6' | '^' => (22, c == '^'),
        '7' | '&' => (26, c == '&'),
        '8' | '*' => (28, c == '*'),
        '9' | '(' => (25, c == '('),
        ' ' => (49, false),
        '\n' => (36, false),
        '\t' => (48, false),
        '-' | '_' => (27, c == '_'),
        '=' | '+' => (24, c == '+'),
        '[' | '{' => (33, c == '{'),
        ']' | '}' => (30, c == '}'),
        '\\' | '|' => (42, c == '|'),
        ';' | ':' => (41, c == ':'),
        '\'' | '"' => (39, c == '"'),
        ',' | '<' => (43, c == '<'),
        '.' | '>' => (47, c == '>'),
        '/' | '?' => (44, c == '?'),
        '`' | '~' => (50, c == '~'),
        _ => return None,
    })
}

/// Key code to post for `key`, and whether shift must be held
pub fn keycode_for(key: Key) -> Option<(u16, bool)> {
    match key {
        Key::Named(n) => named_keycode(n).map(|c| (c, false)),
        Key::Char(c) => char_keycode(c),
    }
}

/// Reverse mapping used by the event tap
pub fn key_for_keycode(keycode: u16, shift: bool) -> Option<Key> {
    let named = match keycode {
        36 => Some(NamedKey::Enter),
        48 => Some(NamedKey::Tab),
        49 => Some(NamedKey::Space),
        51 => Some(NamedKey::Backspace),
        53 => Some(NamedKey::Esc),
        54 => Some(NamedKey::CmdR),
        55 => Some(NamedKey::Cmd),
        56 => Some(NamedKey::Shift),
        57 => Some(NamedKey::CapsLock),
        58 => Some(NamedKey::Alt),
        59 => Some(NamedKey::Ctrl),
        60 => Some(NamedKey::ShiftR),
        61 => Some(NamedKey::AltR),
        62 => Some(NamedKey::CtrlR),
        114 => Some(NamedKey::Insert),
        115 => Some(NamedKey::Home),
        116 => Some(NamedKey::PageUp),
        117 => Some(NamedKey::Delete),
        119 => Some(NamedKey::End),
        121 => Some(NamedKey::PageDown),
        123 => Some(NamedKey::Left),
        124 => Some(NamedKey::Right),
        125 => Some(NamedKey::Down),
        126 => Some(NamedKey::Up),
        _ => (1..=20u8)
            .find(|&n| function_keycode(n) == Some(keycode))
            .map(NamedKey::F),
    };
    if let Some(n) = named {
        return Some(Key::Named(n));
    }

    // Printable keys: take the first char that maps back to this code
    // with the same shift state
    (' '..='~')
        .find(|&c| char_keycode(c) == Some((keycode, shift)))
        .map(Key::Char)
}
