//! Raw input events as delivered by the capture layer

use macrowing_core::{Key, MouseButton};
use std::time::Instant;

/// One raw event, stamped when the OS hook delivered it
#[derive(Debug, Clone, PartialEq)]
pub struct RawEvent {
    pub at: Instant,
    pub kind: RawEventKind,
}

#[derive(Debug, Clone, PartialEq)]
pub enum RawEventKind {
    KeyDown { key: Key },
    KeyUp { key: Key },
    ButtonDown { x: i32, y: i32, button: MouseButton },
    ButtonUp { x: i32, y: i32, button: MouseButton },
    MouseMove { x: i32, y: i32 },
    Scroll { x: i32, y: i32, dx: i32, dy: i32 },
}

impl RawEvent {
    pub fn new(kind: RawEventKind) -> Self {
        Self {
            at: Instant::now(),
            kind,
        }
    }

    pub fn at(at: Instant, kind: RawEventKind) -> Self {
        Self { at, kind }
    }
}
