//! Turns raw input events into timed actions
//!
//! The recorder does not own an event source. Whoever drives it (usually
//! [`MacroEngine`](crate::engine::MacroEngine)) feeds it every raw event
//! through [`Recorder::on_raw_event`]; events that arrive while it is not
//! recording are dropped.

use crate::events::{RawEvent, RawEventKind};
use crate::notify::{Observers, Receiver};
use macrowing_core::{Action, ActionKind, Settings};
use parking_lot::Mutex;
use std::time::Instant;
use tracing::{debug, info};

/// Recorder configuration
#[derive(Debug, Clone, PartialEq)]
pub struct RecorderConfig {
    /// Record pointer motion at all
    pub record_mouse_movement: bool,
    /// Record key-up events
    pub record_key_release: bool,
    /// Mouse move sampling - record once the pointer travelled this many pixels
    pub mouse_move_threshold: f64,
}

impl Default for RecorderConfig {
    fn default() -> Self {
        Self {
            record_mouse_movement: false,
            record_key_release: true,
            mouse_move_threshold: 10.0,
        }
    }
}

impl RecorderConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            record_mouse_movement: settings.record_mouse_movement,
            record_key_release: settings.record_key_release,
            mouse_move_threshold: settings.mouse_move_threshold,
        }
    }
}

/// Notifications published while recording
#[derive(Debug, Clone, PartialEq)]
pub enum RecorderEvent {
    Started,
    ActionRecorded(Action),
    Stopped { count: usize },
}

struct State {
    recording: bool,
    buffer: Vec<Action>,
    last_action_time: Instant,
    last_mouse: (i32, i32),
}

pub struct Recorder {
    config: Mutex<RecorderConfig>,
    state: Mutex<State>,
    observers: Observers<RecorderEvent>,
}

impl Recorder {
    pub fn new(config: RecorderConfig) -> Self {
        Self {
            config: Mutex::new(config),
            state: Mutex::new(State {
                recording: false,
                buffer: Vec::new(),
                last_action_time: Instant::now(),
                last_mouse: (0, 0),
            }),
            observers: Observers::new(),
        }
    }

    pub fn config(&self) -> RecorderConfig {
        self.config.lock().clone()
    }

    /// Takes effect for the next recorded event
    pub fn set_config(&self, config: RecorderConfig) {
        *self.config.lock() = config;
    }

    pub fn subscribe(&self) -> Receiver<RecorderEvent> {
        self.observers.subscribe()
    }

    /// Begin a fresh recording. Returns false if one is already running.
    pub fn start(&self) -> bool {
        let mut state = self.state.lock();
        if state.recording {
            return false;
        }
        state.recording = true;
        state.buffer.clear();
        state.last_action_time = Instant::now();
        state.last_mouse = (0, 0);
        self.observers.publish(RecorderEvent::Started);
        info!("Recording started");
        true
    }

    /// Finish recording and hand back the captured actions
    pub fn stop(&self) -> Vec<Action> {
        let mut state = self.state.lock();
        if !state.recording {
            return Vec::new();
        }
        state.recording = false;
        let actions = std::mem::take(&mut state.buffer);
        self.observers.publish(RecorderEvent::Stopped {
            count: actions.len(),
        });
        info!("Recording stopped with {} actions", actions.len());
        actions
    }

    pub fn is_recording(&self) -> bool {
        self.state.lock().recording
    }

    pub fn action_count(&self) -> usize {
        self.state.lock().buffer.len()
    }

    pub fn on_raw_event(&self, event: &RawEvent) {
        let config = self.config();
        let mut state = self.state.lock();
        if !state.recording {
            return;
        }

        let kind = match &event.kind {
            RawEventKind::KeyDown { key } => ActionKind::KeyPress {
                key: key.to_string(),
            },
            RawEventKind::KeyUp { key } => {
                if !config.record_key_release {
                    return;
                }
                ActionKind::KeyRelease {
                    key: key.to_string(),
                }
            }
            RawEventKind::ButtonDown { x, y, button } => ActionKind::MouseClick {
                x: *x,
                y: *y,
                button: button.as_str().to_string(),
            },
            RawEventKind::ButtonUp { x, y, button } => ActionKind::MouseRelease {
                x: *x,
                y: *y,
                button: button.as_str().to_string(),
            },
            RawEventKind::MouseMove { x, y } => {
                if !config.record_mouse_movement {
                    return;
                }
                let (lx, ly) = state.last_mouse;
                let dx = f64::from(*x) - f64::from(lx);
                let dy = f64::from(*y) - f64::from(ly);
                if (dx * dx + dy * dy).sqrt() < config.mouse_move_threshold {
                    return;
                }
                state.last_mouse = (*x, *y);
                ActionKind::MouseMove { x: *x, y: *y }
            }
            RawEventKind::Scroll { x, y, dx, dy } => ActionKind::MouseScroll {
                x: *x,
                y: *y,
                dx: *dx,
                dy: *dy,
            },
        };

        // First action never inherits lead time
        let delay = if state.buffer.is_empty() {
            0.0
        } else {
            event
                .at
                .saturating_duration_since(state.last_action_time)
                .as_secs_f64()
                * 1000.0
        };
        state.last_action_time = event.at;

        let action = Action::new(kind).with_delay(delay);
        debug!("Recorded {}", action);
        state.buffer.push(action.clone());
        self.observers.publish(RecorderEvent::ActionRecorded(action));
    }
}

impl Default for Recorder {
    fn default() -> Self {
        Self::new(RecorderConfig::default())
    }
}
