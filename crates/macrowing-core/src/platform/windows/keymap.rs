//! Windows virtual-key codes

use crate::input::{Key, NamedKey};

const NAMED: &[(NamedKey, u16)] = &[
    (NamedKey::Backspace, 0x08),
    (NamedKey::Tab, 0x09),
    (NamedKey::Enter, 0x0D),
    (NamedKey::Shift, 0x10),
    (NamedKey::Ctrl, 0x11),
    (NamedKey::Alt, 0x12),
    (NamedKey::Pause, 0x13),
    (NamedKey::CapsLock, 0x14),
    (NamedKey::Esc, 0x1B),
    (NamedKey::Space, 0x20),
    (NamedKey::PageUp, 0x21),
    (NamedKey::PageDown, 0x22),
    (NamedKey::End, 0x23),
    (NamedKey::Home, 0x24),
    (NamedKey::Left, 0x25),
    (NamedKey::Up, 0x26),
    (NamedKey::Right, 0x27),
    (NamedKey::Down, 0x28),
    (NamedKey::PrintScreen, 0x2C),
    (NamedKey::Insert, 0x2D),
    (NamedKey::Delete, 0x2E),
    (NamedKey::Cmd, 0x5B),
    (NamedKey::CmdL, 0x5B),
    (NamedKey::CmdR, 0x5C),
    (NamedKey::Menu, 0x5D),
    (NamedKey::NumLock, 0x90),
    (NamedKey::ScrollLock, 0x91),
    (NamedKey::ShiftL, 0xA0),
    (NamedKey::ShiftR, 0xA1),
    (NamedKey::CtrlL, 0xA2),
    (NamedKey::CtrlR, 0xA3),
    (NamedKey::AltL, 0xA4),
    (NamedKey::AltR, 0xA5),
    (NamedKey::AltGr, 0xA5),
];

const VK_F1: u16 = 0x70;

pub fn vk_for(key: NamedKey) -> Option<u16> {
    if let NamedKey::F(n) = key {
        return (1..=20).contains(&n).then(|| VK_F1 + u16::from(n) - 1);
    }
    NAMED.iter().find(|(k, _)| *k == key).map(|(_, vk)| *vk)
}

/// Key for a low-level hook event. `ch` is the translated character, if any.
pub fn key_for_vk(vk: u16, ch: Option<char>) -> Option<Key> {
    if (VK_F1..VK_F1 + 20).contains(&vk) {
        return Some(Key::Named(NamedKey::F((vk - VK_F1 + 1) as u8)));
    }
    // First match wins, so generic entries shadow their aliases
    if let Some((named, _)) = NAMED.iter().find(|(_, v)| *v == vk) {
        return Some(Key::Named(*named));
    }
    if let Some(c) = ch.filter(|c| !c.is_control()) {
        return Some(Key::Char(c));
    }
    match vk {
        0x30..=0x39 | 0x41..=0x5A => char::from_u32(u32::from(vk))
            .map(|c| Key::Char(c.to_ascii_lowercase())),
        _ => None,
    }
}
