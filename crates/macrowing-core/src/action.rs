//! A single timed input event inside a macro
//!
//! Actions serialize to the stable macro file shape:
//! `{"action_type": "mouse_click", "data": {"x": 1, "y": 2, "button": "left"}, "delay_before": 0.0}`

use crate::error::Error;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::fmt;

/// Wire tag for an action kind
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ActionType {
    KeyPress,
    KeyRelease,
    MouseClick,
    MouseRelease,
    MouseMove,
    MouseScroll,
    Delay,
}

impl ActionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::KeyPress => "key_press",
            Self::KeyRelease => "key_release",
            Self::MouseClick => "mouse_click",
            Self::MouseRelease => "mouse_release",
            Self::MouseMove => "mouse_move",
            Self::MouseScroll => "mouse_scroll",
            Self::Delay => "delay",
        }
    }
}

/// What an action does, with the payload each kind needs
#[derive(Debug, Clone, PartialEq)]
pub enum ActionKind {
    KeyPress { key: String },
    KeyRelease { key: String },
    /// Jump to `(x, y)` and press `button`
    MouseClick { x: i32, y: i32, button: String },
    /// Release `button`; the position is informational only
    MouseRelease { x: i32, y: i32, button: String },
    MouseMove { x: i32, y: i32 },
    /// Scroll by `(dx, dy)`; the position is informational only
    MouseScroll { x: i32, y: i32, dx: i32, dy: i32 },
    Delay { ms: f64 },
}

impl ActionKind {
    pub fn action_type(&self) -> ActionType {
        match self {
            Self::KeyPress { .. } => ActionType::KeyPress,
            Self::KeyRelease { .. } => ActionType::KeyRelease,
            Self::MouseClick { .. } => ActionType::MouseClick,
            Self::MouseRelease { .. } => ActionType::MouseRelease,
            Self::MouseMove { .. } => ActionType::MouseMove,
            Self::MouseScroll { .. } => ActionType::MouseScroll,
            Self::Delay { .. } => ActionType::Delay,
        }
    }
}

/// One action plus the wait that precedes it
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "ActionRecord", into = "ActionRecord")]
pub struct Action {
    pub kind: ActionKind,
    /// Milliseconds to wait after the previous action before running this one
    pub delay_before: f64,
}

impl Action {
    pub fn new(kind: ActionKind) -> Self {
        Self {
            kind,
            delay_before: 0.0,
        }
    }

    pub fn with_delay(mut self, delay_before: f64) -> Self {
        self.delay_before = sanitize_ms(delay_before);
        self
    }

    pub fn key_press(key: impl Into<String>) -> Self {
        Self::new(ActionKind::KeyPress { key: key.into() })
    }

    pub fn key_release(key: impl Into<String>) -> Self {
        Self::new(ActionKind::KeyRelease { key: key.into() })
    }

    pub fn click(x: i32, y: i32, button: impl Into<String>) -> Self {
        Self::new(ActionKind::MouseClick {
            x,
            y,
            button: button.into(),
        })
    }

    pub fn release(x: i32, y: i32, button: impl Into<String>) -> Self {
        Self::new(ActionKind::MouseRelease {
            x,
            y,
            button: button.into(),
        })
    }

    pub fn move_to(x: i32, y: i32) -> Self {
        Self::new(ActionKind::MouseMove { x, y })
    }

    pub fn scroll(dx: i32, dy: i32) -> Self {
        Self::new(ActionKind::MouseScroll { x: 0, y: 0, dx, dy })
    }

    pub fn delay(ms: f64) -> Self {
        Self::new(ActionKind::Delay { ms: sanitize_ms(ms) })
    }

    pub fn action_type(&self) -> ActionType {
        self.kind.action_type()
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.kind {
            ActionKind::KeyPress { key } => write!(f, "Press key: {}", key),
            ActionKind::KeyRelease { key } => write!(f, "Release key: {}", key),
            ActionKind::MouseClick { x, y, button } => {
                write!(f, "Click {} at ({}, {})", button, x, y)
            }
            ActionKind::MouseRelease { button, .. } => write!(f, "Release {} button", button),
            ActionKind::MouseMove { x, y } => write!(f, "Move to ({}, {})", x, y),
            ActionKind::MouseScroll { dx, dy, .. } => write!(f, "Scroll ({}, {})", dx, dy),
            ActionKind::Delay { ms } => write!(f, "Wait {}ms", ms),
        }
    }
}

/// Negative, NaN and infinite delays collapse to zero
pub(crate) fn sanitize_ms(ms: f64) -> f64 {
    if ms.is_finite() && ms > 0.0 {
        ms
    } else {
        0.0
    }
}

// ============================================================================
// Wire format
// ============================================================================

#[derive(Serialize, Deserialize)]
struct ActionRecord {
    action_type: ActionType,
    #[serde(default)]
    data: Map<String, Value>,
    #[serde(default)]
    delay_before: f64,
}

impl From<Action> for ActionRecord {
    fn from(action: Action) -> Self {
        let action_type = action.action_type();
        let mut data = Map::new();
        match action.kind {
            ActionKind::KeyPress { key } | ActionKind::KeyRelease { key } => {
                data.insert("key".into(), key.into());
            }
            ActionKind::MouseClick { x, y, button } | ActionKind::MouseRelease { x, y, button } => {
                data.insert("x".into(), x.into());
                data.insert("y".into(), y.into());
                data.insert("button".into(), button.into());
            }
            ActionKind::MouseMove { x, y } => {
                data.insert("x".into(), x.into());
                data.insert("y".into(), y.into());
            }
            ActionKind::MouseScroll { x, y, dx, dy } => {
                data.insert("x".into(), x.into());
                data.insert("y".into(), y.into());
                data.insert("dx".into(), dx.into());
                data.insert("dy".into(), dy.into());
            }
            ActionKind::Delay { ms } => {
                data.insert("ms".into(), ms.into());
            }
        }
        Self {
            action_type,
            data,
            delay_before: action.delay_before,
        }
    }
}

impl TryFrom<ActionRecord> for Action {
    type Error = Error;

    fn try_from(record: ActionRecord) -> Result<Self, Self::Error> {
        let d = &record.data;
        let kind = match record.action_type {
            ActionType::KeyPress => ActionKind::KeyPress {
                key: str_field(d, "key", ""),
            },
            ActionType::KeyRelease => ActionKind::KeyRelease {
                key: str_field(d, "key", ""),
            },
            ActionType::MouseClick => ActionKind::MouseClick {
                x: int_field(d, "x")?,
                y: int_field(d, "y")?,
                button: str_field(d, "button", "left"),
            },
            ActionType::MouseRelease => ActionKind::MouseRelease {
                x: int_field(d, "x")?,
                y: int_field(d, "y")?,
                button: str_field(d, "button", "left"),
            },
            ActionType::MouseMove => ActionKind::MouseMove {
                x: int_field(d, "x")?,
                y: int_field(d, "y")?,
            },
            ActionType::MouseScroll => ActionKind::MouseScroll {
                x: int_field(d, "x")?,
                y: int_field(d, "y")?,
                dx: int_field(d, "dx")?,
                dy: int_field(d, "dy")?,
            },
            ActionType::Delay => ActionKind::Delay {
                ms: sanitize_ms(float_field(d, "ms")?),
            },
        };
        Ok(Self {
            kind,
            delay_before: sanitize_ms(record.delay_before),
        })
    }
}

fn str_field(data: &Map<String, Value>, name: &str, default: &str) -> String {
    match data.get(name) {
        Some(Value::String(s)) => s.clone(),
        Some(Value::Null) | None => default.to_string(),
        Some(other) => other.to_string(),
    }
}

fn float_field(data: &Map<String, Value>, name: &str) -> Result<f64, Error> {
    match data.get(name) {
        None | Some(Value::Null) => Ok(0.0),
        Some(v) => v
            .as_f64()
            .ok_or_else(|| Error::invalid_format(format!("'{}' must be a number, got {}", name, v))),
    }
}

fn int_field(data: &Map<String, Value>, name: &str) -> Result<i32, Error> {
    if let Some(i) = data.get(name).and_then(Value::as_i64) {
        return i32::try_from(i)
            .map_err(|_| Error::invalid_format(format!("'{}' out of range: {}", name, i)));
    }
    Ok(float_field(data, name)?.round() as i32)
}
