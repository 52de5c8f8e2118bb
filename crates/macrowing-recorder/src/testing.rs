//! In-memory test doubles

use macrowing_core::{InputSynth, Key, MouseButton, SynthError, SynthResult};
use parking_lot::Mutex;
use std::thread;
use std::time::{Duration, Instant};

#[derive(Debug, Clone, PartialEq)]
pub enum SynthCall {
    KeyDown(Key),
    KeyUp(Key),
    ButtonDown(MouseButton),
    ButtonUp(MouseButton),
    MoveTo(i32, i32),
    Scroll(i32, i32),
}

/// Records every primitive instead of touching the OS
#[derive(Default)]
pub struct RecordingSynth {
    calls: Mutex<Vec<(Instant, SynthCall)>>,
    cursor: Mutex<(i32, i32)>,
    key_latency: Duration,
    panic_on_key: bool,
    blind_cursor: bool,
}

impl RecordingSynth {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every key primitive blocks this long before it is recorded
    pub fn with_key_latency(mut self, latency: Duration) -> Self {
        self.key_latency = latency;
        self
    }

    /// Key primitives panic
    pub fn panicking(mut self) -> Self {
        self.panic_on_key = true;
        self
    }

    /// `cursor_position` always fails
    pub fn blind_cursor(mut self) -> Self {
        self.blind_cursor = true;
        self
    }

    pub fn calls(&self) -> Vec<SynthCall> {
        self.calls.lock().iter().map(|(_, c)| c.clone()).collect()
    }

    pub fn timestamps(&self) -> Vec<Instant> {
        self.calls.lock().iter().map(|(t, _)| *t).collect()
    }

    fn push(&self, call: SynthCall) {
        self.calls.lock().push((Instant::now(), call));
    }

    fn key(&self, call: SynthCall) -> SynthResult<()> {
        if self.panic_on_key {
            panic!("synthetic key failure");
        }
        if !self.key_latency.is_zero() {
            thread::sleep(self.key_latency);
        }
        self.push(call);
        Ok(())
    }
}

impl InputSynth for RecordingSynth {
    fn key_down(&self, key: Key) -> SynthResult<()> {
        self.key(SynthCall::KeyDown(key))
    }

    fn key_up(&self, key: Key) -> SynthResult<()> {
        self.key(SynthCall::KeyUp(key))
    }

    fn button_down(&self, button: MouseButton) -> SynthResult<()> {
        self.push(SynthCall::ButtonDown(button));
        Ok(())
    }

    fn button_up(&self, button: MouseButton) -> SynthResult<()> {
        self.push(SynthCall::ButtonUp(button));
        Ok(())
    }

    fn move_to(&self, x: i32, y: i32) -> SynthResult<()> {
        *self.cursor.lock() = (x, y);
        self.push(SynthCall::MoveTo(x, y));
        Ok(())
    }

    fn scroll(&self, dx: i32, dy: i32) -> SynthResult<()> {
        self.push(SynthCall::Scroll(dx, dy));
        Ok(())
    }

    fn cursor_position(&self) -> SynthResult<(i32, i32)> {
        if self.blind_cursor {
            return Err(SynthError::Os("no cursor".to_string()));
        }
        Ok(*self.cursor.lock())
    }
}
