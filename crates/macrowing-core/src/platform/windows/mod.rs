//! Windows platform implementation
//!
//! Uses SendInput for input injection.

mod keymap;

pub use keymap::{key_for_vk, vk_for};

use crate::input::{InputSynth, Key, MouseButton, SynthError, SynthResult};
use crate::Result;
use std::sync::Arc;

use windows::Win32::Foundation::POINT;
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_KEYBOARD, INPUT_MOUSE, KEYBDINPUT, KEYBD_EVENT_FLAGS,
    KEYEVENTF_KEYUP, KEYEVENTF_UNICODE, MOUSEEVENTF_HWHEEL, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MIDDLEDOWN, MOUSEEVENTF_MIDDLEUP, MOUSEEVENTF_RIGHTDOWN,
    MOUSEEVENTF_RIGHTUP, MOUSEEVENTF_WHEEL, MOUSEINPUT, MOUSE_EVENT_FLAGS, VIRTUAL_KEY,
};
use windows::Win32::UI::WindowsAndMessaging::{GetCursorPos, SetCursorPos};

const WHEEL_DELTA: i32 = 120;

/// Windows needs no runtime permission for SendInput
pub fn has_input_permission() -> bool {
    true
}

pub fn synth() -> Result<Arc<dyn InputSynth>> {
    Ok(Arc::new(SendInputSynth))
}

/// SendInput-backed synthesizer
pub struct SendInputSynth;

impl SendInputSynth {
    fn key(&self, key: Key, up: bool) -> SynthResult<()> {
        let input = match key {
            Key::Named(n) => {
                let vk = vk_for(n).ok_or_else(|| SynthError::UnknownKey(key.to_string()))?;
                let flags = if up {
                    KEYEVENTF_KEYUP
                } else {
                    KEYBD_EVENT_FLAGS(0)
                };
                make_key_input(VIRTUAL_KEY(vk), 0, flags)
            }
            Key::Char(c) => {
                // KEYEVENTF_UNICODE only carries one UTF-16 unit
                let code = u16::try_from(u32::from(c))
                    .map_err(|_| SynthError::UnknownKey(c.to_string()))?;
                let mut flags = KEYEVENTF_UNICODE;
                if up {
                    flags |= KEYEVENTF_KEYUP;
                }
                make_key_input(VIRTUAL_KEY(0), code, flags)
            }
        };
        send_inputs(&[input])
    }
}

impl InputSynth for SendInputSynth {
    fn key_down(&self, key: Key) -> SynthResult<()> {
        self.key(key, false)
    }

    fn key_up(&self, key: Key) -> SynthResult<()> {
        self.key(key, true)
    }

    fn button_down(&self, button: MouseButton) -> SynthResult<()> {
        let flags = match button {
            MouseButton::Left => MOUSEEVENTF_LEFTDOWN,
            MouseButton::Right => MOUSEEVENTF_RIGHTDOWN,
            MouseButton::Middle => MOUSEEVENTF_MIDDLEDOWN,
        };
        send_inputs(&[make_mouse_input(flags, 0)])
    }

    fn button_up(&self, button: MouseButton) -> SynthResult<()> {
        let flags = match button {
            MouseButton::Left => MOUSEEVENTF_LEFTUP,
            MouseButton::Right => MOUSEEVENTF_RIGHTUP,
            MouseButton::Middle => MOUSEEVENTF_MIDDLEUP,
        };
        send_inputs(&[make_mouse_input(flags, 0)])
    }

    fn move_to(&self, x: i32, y: i32) -> SynthResult<()> {
        unsafe { SetCursorPos(x, y) }
            .map_err(|e| SynthError::Os(format!("Failed to move cursor: {:?}", e)))
    }

    fn scroll(&self, dx: i32, dy: i32) -> SynthResult<()> {
        let mut inputs = Vec::with_capacity(2);
        if dy != 0 {
            inputs.push(make_mouse_input(MOUSEEVENTF_WHEEL, dy * WHEEL_DELTA));
        }
        if dx != 0 {
            inputs.push(make_mouse_input(MOUSEEVENTF_HWHEEL, dx * WHEEL_DELTA));
        }
        if inputs.is_empty() {
            return Ok(());
        }
        send_inputs(&inputs)
    }

    fn cursor_position(&self) -> SynthResult<(i32, i32)> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }
            .map_err(|e| SynthError::Os(format!("Failed to read cursor: {:?}", e)))?;
        Ok((point.x, point.y))
    }
}

fn make_mouse_input(flags: MOUSE_EVENT_FLAGS, data: i32) -> INPUT {
    INPUT {
        r#type: INPUT_MOUSE,
        Anonymous: INPUT_0 {
            mi: MOUSEINPUT {
                dx: 0,
                dy: 0,
                mouseData: data as _,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn make_key_input(vk: VIRTUAL_KEY, scan: u16, flags: KEYBD_EVENT_FLAGS) -> INPUT {
    INPUT {
        r#type: INPUT_KEYBOARD,
        Anonymous: INPUT_0 {
            ki: KEYBDINPUT {
                wVk: vk,
                wScan: scan,
                dwFlags: flags,
                time: 0,
                dwExtraInfo: 0,
            },
        },
    }
}

fn send_inputs(inputs: &[INPUT]) -> SynthResult<()> {
    let sent = unsafe { SendInput(inputs, std::mem::size_of::<INPUT>() as i32) };

    if sent as usize != inputs.len() {
        return Err(SynthError::Os(format!(
            "SendInput failed: sent {} of {}",
            sent,
            inputs.len()
        )));
    }

    Ok(())
}
