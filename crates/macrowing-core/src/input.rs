//! Keyboard and mouse input synthesis
//!
//! `InputSynth` is the seam between the player and the OS. Platform
//! backends live in [`crate::platform`]; tests plug in their own.

use crate::error::Error;
use std::fmt;
use thiserror::Error as ThisError;

/// Failure to synthesize one input primitive
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum SynthError {
    #[error("unknown key '{0}'")]
    UnknownKey(String),
    #[error("{0}")]
    Os(String),
}

impl From<SynthError> for Error {
    fn from(e: SynthError) -> Self {
        match e {
            SynthError::UnknownKey(k) => Error::unknown_key(&k),
            SynthError::Os(reason) => Error::action_failed("input synthesis", &reason),
        }
    }
}

pub type SynthResult<T> = std::result::Result<T, SynthError>;

/// Mouse buttons the player can press
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum MouseButton {
    Left,
    Right,
    Middle,
}

impl MouseButton {
    /// Unrecognized names fall back to the left button
    pub fn from_name(name: &str) -> Self {
        match name.trim().to_ascii_lowercase().as_str() {
            "right" => Self::Right,
            "middle" | "center" => Self::Middle,
            _ => Self::Left,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Left => "left",
            Self::Right => "right",
            Self::Middle => "middle",
        }
    }
}

impl fmt::Display for MouseButton {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Non-character keys
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub enum NamedKey {
    Alt,
    AltL,
    AltR,
    AltGr,
    Backspace,
    CapsLock,
    Cmd,
    CmdL,
    CmdR,
    Ctrl,
    CtrlL,
    CtrlR,
    Delete,
    Down,
    End,
    Enter,
    Esc,
    F(u8),
    Home,
    Insert,
    Left,
    Menu,
    NumLock,
    PageDown,
    PageUp,
    Pause,
    PrintScreen,
    Right,
    ScrollLock,
    Shift,
    ShiftL,
    ShiftR,
    Space,
    Tab,
    Up,
}

impl NamedKey {
    pub fn from_name(name: &str) -> Option<Self> {
        let lower = name.trim().to_ascii_lowercase();
        let key = match lower.as_str() {
            "alt" | "option" => Self::Alt,
            "alt_l" => Self::AltL,
            "alt_r" => Self::AltR,
            "alt_gr" => Self::AltGr,
            "backspace" => Self::Backspace,
            "caps_lock" => Self::CapsLock,
            "cmd" | "win" | "super" | "meta" => Self::Cmd,
            "cmd_l" | "super_l" => Self::CmdL,
            "cmd_r" | "super_r" => Self::CmdR,
            "ctrl" | "control" => Self::Ctrl,
            "ctrl_l" => Self::CtrlL,
            "ctrl_r" => Self::CtrlR,
            "delete" | "del" => Self::Delete,
            "down" => Self::Down,
            "end" => Self::End,
            "enter" | "return" => Self::Enter,
            "esc" | "escape" => Self::Esc,
            "home" => Self::Home,
            "insert" => Self::Insert,
            "left" => Self::Left,
            "menu" => Self::Menu,
            "num_lock" => Self::NumLock,
            "page_down" => Self::PageDown,
            "page_up" => Self::PageUp,
            "pause" => Self::Pause,
            "print_screen" => Self::PrintScreen,
            "right" => Self::Right,
            "scroll_lock" => Self::ScrollLock,
            "shift" => Self::Shift,
            "shift_l" => Self::ShiftL,
            "shift_r" => Self::ShiftR,
            "space" => Self::Space,
            "tab" => Self::Tab,
            "up" => Self::Up,
            other => {
                let n: u8 = other.strip_prefix('f')?.parse().ok()?;
                if (1..=20).contains(&n) {
                    Self::F(n)
                } else {
                    return None;
                }
            }
        };
        Some(key)
    }

    pub fn name(&self) -> String {
        let s = match self {
            Self::Alt => "alt",
            Self::AltL => "alt_l",
            Self::AltR => "alt_r",
            Self::AltGr => "alt_gr",
            Self::Backspace => "backspace",
            Self::CapsLock => "caps_lock",
            Self::Cmd => "cmd",
            Self::CmdL => "cmd_l",
            Self::CmdR => "cmd_r",
            Self::Ctrl => "ctrl",
            Self::CtrlL => "ctrl_l",
            Self::CtrlR => "ctrl_r",
            Self::Delete => "delete",
            Self::Down => "down",
            Self::End => "end",
            Self::Enter => "enter",
            Self::Esc => "esc",
            Self::F(n) => return format!("f{}", n),
            Self::Home => "home",
            Self::Insert => "insert",
            Self::Left => "left",
            Self::Menu => "menu",
            Self::NumLock => "num_lock",
            Self::PageDown => "page_down",
            Self::PageUp => "page_up",
            Self::Pause => "pause",
            Self::PrintScreen => "print_screen",
            Self::Right => "right",
            Self::ScrollLock => "scroll_lock",
            Self::Shift => "shift",
            Self::ShiftL => "shift_l",
            Self::ShiftR => "shift_r",
            Self::Space => "space",
            Self::Tab => "tab",
            Self::Up => "up",
        };
        s.to_string()
    }

    /// Left/right variants collapse onto their generic modifier
    pub fn modifier(&self) -> Option<NamedKey> {
        match self {
            Self::Ctrl | Self::CtrlL | Self::CtrlR => Some(Self::Ctrl),
            Self::Alt | Self::AltL | Self::AltR | Self::AltGr => Some(Self::Alt),
            Self::Shift | Self::ShiftL | Self::ShiftR => Some(Self::Shift),
            Self::Cmd | Self::CmdL | Self::CmdR => Some(Self::Cmd),
            _ => None,
        }
    }
}

/// A key as stored in a macro: a named special key or a literal character
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Key {
    Named(NamedKey),
    Char(char),
}

impl Key {
    /// Named keys win over literal characters; anything else is unknown
    pub fn parse(s: &str) -> SynthResult<Self> {
        if let Some(named) = NamedKey::from_name(s) {
            return Ok(Self::Named(named));
        }
        let mut chars = s.chars();
        match (chars.next(), chars.next()) {
            (Some(c), None) => Ok(Self::Char(c)),
            _ => Err(SynthError::UnknownKey(s.to_string())),
        }
    }

    pub fn modifier(&self) -> Option<NamedKey> {
        match self {
            Self::Named(n) => n.modifier(),
            Self::Char(_) => None,
        }
    }
}

impl fmt::Display for Key {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Named(n) => f.write_str(&n.name()),
            Self::Char(c) => write!(f, "{}", c),
        }
    }
}

/// OS-level input primitives the player drives
pub trait InputSynth: Send + Sync {
    fn key_down(&self, key: Key) -> SynthResult<()>;
    fn key_up(&self, key: Key) -> SynthResult<()>;
    fn button_down(&self, button: MouseButton) -> SynthResult<()>;
    fn button_up(&self, button: MouseButton) -> SynthResult<()>;
    fn move_to(&self, x: i32, y: i32) -> SynthResult<()>;
    fn scroll(&self, dx: i32, dy: i32) -> SynthResult<()>;
    fn cursor_position(&self) -> SynthResult<(i32, i32)>;
}
