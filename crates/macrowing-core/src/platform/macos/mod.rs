//! macOS platform implementation
//!
//! Synthesizes input with CGEvent injection via cidre.

mod keymap;

pub use keymap::{key_for_keycode, keycode_for};

use crate::input::{InputSynth, Key, MouseButton, SynthError, SynthResult};
use crate::{Error, Result};
use cidre::cg;
use std::ffi::c_void;
use parking_lot::Mutex;
use std::sync::Arc;

#[repr(C)]
#[derive(Clone, Copy)]
struct CGPoint {
    x: f64,
    y: f64,
}

// Raw FFI for what cidre does not expose
#[link(name = "CoreGraphics", kind = "framework")]
extern "C" {
    fn CGEventPost(tap: u32, event: *const c_void);
    fn CGEventCreate(source: *const c_void) -> *mut c_void;
    fn CGEventGetLocation(event: *const c_void) -> CGPoint;
    fn CGEventSetIntegerValueField(event: *mut c_void, field: u32, value: i64);
    fn CGEventGetIntegerValueField(event: *const c_void, field: u32) -> i64;
}

#[link(name = "CoreFoundation", kind = "framework")]
extern "C" {
    fn CFRelease(cf: *const c_void);
}

const HID_EVENT_TAP: u32 = 0;
const FLAG_SHIFT: u64 = 0x20000;
/// kCGEventSourceUserData
const FIELD_SOURCE_USER_DATA: u32 = 42;
/// Marks events posted by [`CgSynth`]
pub const SYNTH_TAG: i64 = 0x4D57_4D57;

fn tag(event: &mut cg::Event) {
    unsafe {
        CGEventSetIntegerValueField(
            event as *mut cg::Event as *mut c_void,
            FIELD_SOURCE_USER_DATA,
            SYNTH_TAG,
        );
    }
}

fn post_event(event: &mut cg::Event) {
    tag(event);
    unsafe {
        CGEventPost(HID_EVENT_TAP, event as *const cg::Event as *const c_void);
    }
}

/// True for events this process posted through [`CgSynth`]
pub fn is_synthesized(event: &cg::Event) -> bool {
    let tag = unsafe {
        CGEventGetIntegerValueField(event as *const cg::Event as *const c_void, FIELD_SOURCE_USER_DATA)
    };
    tag == SYNTH_TAG
}

/// Check if the process may post and listen to input events
pub fn has_input_permission() -> bool {
    cidre::ax::is_process_trusted()
}

pub fn synth() -> Result<Arc<dyn InputSynth>> {
    if !has_input_permission() {
        cidre::ax::is_process_trusted_with_prompt(true);
        return Err(Error::permission_denied(
            "Accessibility permissions required. Enable in System Settings > Privacy & Security > Accessibility",
        ));
    }
    Ok(Arc::new(CgSynth::default()))
}

/// CGEvent-backed synthesizer
#[derive(Default)]
pub struct CgSynth {
    /// Button currently held, so moves are posted as drags
    held: Mutex<Option<MouseButton>>,
}

impl CgSynth {
    fn location(&self) -> SynthResult<cg::Point> {
        let (x, y) = self.cursor_position()?;
        Ok(cg::Point {
            x: f64::from(x),
            y: f64::from(y),
        })
    }

    fn post_key(&self, key: Key, down: bool) -> SynthResult<()> {
        let (code, shift) = keycode_for(key).ok_or_else(|| SynthError::UnknownKey(key.to_string()))?;
        let mut evt = cg::Event::keyboard(None, code, down)
            .ok_or_else(|| SynthError::Os("CGEventCreateKeyboardEvent failed".into()))?;
        if shift {
            evt.set_flags(cg::EventFlags(FLAG_SHIFT));
        }
        post_event(&mut evt);
        Ok(())
    }

    fn post_button(&self, button: MouseButton, down: bool) -> SynthResult<()> {
        let pos = self.location()?;
        let (event_type, btn) = match (button, down) {
            (MouseButton::Left, true) => (cg::EventType::LEFT_MOUSE_DOWN, cg::MouseButton::Left),
            (MouseButton::Left, false) => (cg::EventType::LEFT_MOUSE_UP, cg::MouseButton::Left),
            (MouseButton::Right, true) => (cg::EventType::RIGHT_MOUSE_DOWN, cg::MouseButton::Right),
            (MouseButton::Right, false) => (cg::EventType::RIGHT_MOUSE_UP, cg::MouseButton::Right),
            (MouseButton::Middle, true) => (cg::EventType::OHTER_MOUSE_DOWN, cg::MouseButton::Center),
            (MouseButton::Middle, false) => (cg::EventType::OHTER_MOUSE_UP, cg::MouseButton::Center),
        };
        let mut evt = cg::Event::mouse(None, event_type, pos, btn)
            .ok_or_else(|| SynthError::Os("CGEventCreateMouseEvent failed".into()))?;
        post_event(&mut evt);
        *self.held.lock() = down.then_some(button);
        Ok(())
    }
}

impl InputSynth for CgSynth {
    fn key_down(&self, key: Key) -> SynthResult<()> {
        self.post_key(key, true)
    }

    fn key_up(&self, key: Key) -> SynthResult<()> {
        self.post_key(key, false)
    }

    fn button_down(&self, button: MouseButton) -> SynthResult<()> {
        self.post_button(button, true)
    }

    fn button_up(&self, button: MouseButton) -> SynthResult<()> {
        self.post_button(button, false)
    }

    fn move_to(&self, x: i32, y: i32) -> SynthResult<()> {
        let pos = cg::Point {
            x: f64::from(x),
            y: f64::from(y),
        };
        let held = *self.held.lock();
        let (event_type, btn) = match held {
            Some(MouseButton::Left) => (cg::EventType::LEFT_MOUSE_DRAGGED, cg::MouseButton::Left),
            Some(MouseButton::Right) => (cg::EventType::RIGHT_MOUSE_DRAGGED, cg::MouseButton::Right),
            Some(MouseButton::Middle) => (cg::EventType::OHTER_MOUSE_DRAGGED, cg::MouseButton::Center),
            None => (cg::EventType::MOUSE_MOVED, cg::MouseButton::Left),
        };
        let mut evt = cg::Event::mouse(None, event_type, pos, btn)
            .ok_or_else(|| SynthError::Os("CGEventCreateMouseEvent failed".into()))?;
        post_event(&mut evt);
        Ok(())
    }

    fn scroll(&self, dx: i32, dy: i32) -> SynthResult<()> {
        let mut evt = cg::Event::wheel_2(None, cg::ScrollEventUnit::Line, dy, dx)
            .ok_or_else(|| SynthError::Os("CGEventCreateScrollWheelEvent failed".into()))?;
        post_event(&mut evt);
        Ok(())
    }

    fn cursor_position(&self) -> SynthResult<(i32, i32)> {
        unsafe {
            let evt = CGEventCreate(std::ptr::null());
            if evt.is_null() {
                return Err(SynthError::Os("CGEventCreate failed".into()));
            }
            let p = CGEventGetLocation(evt);
            CFRelease(evt);
            Ok((p.x.round() as i32, p.y.round() as i32))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn posted_events_are_recognised() {
        let mut evt = cg::Event::keyboard(None, 0, true).unwrap();
        assert!(!is_synthesized(&evt));
        tag(&mut evt);
        assert!(is_synthesized(&evt));
    }

    #[test]
    fn held_button_turns_moves_into_drags() {
        let synth = CgSynth::default();
        assert_eq!(*synth.held.lock(), None);
        *synth.held.lock() = Some(MouseButton::Right);
        assert_eq!(*synth.held.lock(), Some(MouseButton::Right));
    }
}
