//! Smooth mouse trajectories
//!
//! Pure functions: identical inputs always give identical paths, so the
//! player's motion can be tested without touching a real pointer.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

/// Empirical pointer speed, milliseconds per pixel at speed 1.0
pub const MS_PER_PIXEL: f64 = 0.8;

/// Maps normalized time progress to normalized distance progress
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Easing {
    Linear,
    EaseInQuad,
    EaseOutQuad,
    EaseInOutQuad,
    #[default]
    EaseOutCubic,
    EaseOutExpo,
}

impl Easing {
    pub const ALL: [Easing; 6] = [
        Easing::Linear,
        Easing::EaseInQuad,
        Easing::EaseOutQuad,
        Easing::EaseInOutQuad,
        Easing::EaseOutCubic,
        Easing::EaseOutExpo,
    ];

    pub fn apply(self, t: f64) -> f64 {
        match self {
            Self::Linear => t,
            Self::EaseInQuad => t * t,
            Self::EaseOutQuad => {
                let u = 1.0 - t;
                1.0 - u * u
            }
            Self::EaseInOutQuad => {
                if t < 0.5 {
                    2.0 * t * t
                } else {
                    let u = -2.0 * t + 2.0;
                    1.0 - u * u / 2.0
                }
            }
            Self::EaseOutCubic => {
                let u = 1.0 - t;
                1.0 - u * u * u
            }
            Self::EaseOutExpo => {
                if t == 1.0 {
                    1.0
                } else {
                    1.0 - 2f64.powf(-10.0 * t)
                }
            }
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Linear => "linear",
            Self::EaseInQuad => "ease_in_quad",
            Self::EaseOutQuad => "ease_out_quad",
            Self::EaseInOutQuad => "ease_in_out_quad",
            Self::EaseOutCubic => "ease_out_cubic",
            Self::EaseOutExpo => "ease_out_expo",
        }
    }
}

impl fmt::Display for Easing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Easing {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let wanted = s.trim().to_ascii_lowercase().replace('-', "_");
        Self::ALL
            .into_iter()
            .find(|e| e.as_str() == wanted)
            .ok_or_else(|| format!("unknown easing '{}'", s))
    }
}

/// One intermediate pointer position and the pause that follows it
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct PathPoint {
    pub x: i32,
    pub y: i32,
    pub delay_ms: f64,
}

fn distance(x0: i32, y0: i32, x1: i32, y1: i32) -> f64 {
    let dx = f64::from(x1) - f64::from(x0);
    let dy = f64::from(y1) - f64::from(y0);
    (dx * dx + dy * dy).sqrt()
}

/// How long a move should take, clamped to `[min_ms, max_ms]`
pub fn duration_for_distance(
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    speed_multiplier: f64,
    min_ms: f64,
    max_ms: f64,
) -> f64 {
    let speed = if speed_multiplier.is_finite() && speed_multiplier > 0.0 {
        speed_multiplier
    } else {
        1.0
    };
    let base = distance(x0, y0, x1, y1) * MS_PER_PIXEL / speed;
    base.min(max_ms).max(min_ms)
}

/// Interpolated positions from `(x0, y0)` to `(x1, y1)`, inclusive of both ends
pub fn sample_path(
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
    duration_ms: f64,
    easing: Easing,
    steps_per_second: u32,
) -> Vec<PathPoint> {
    let duration_ms = if duration_ms.is_finite() {
        duration_ms.max(0.0)
    } else {
        0.0
    };
    let steps = ((duration_ms / 1000.0 * f64::from(steps_per_second)) as usize).max(2);
    let delay_ms = duration_ms / steps as f64;

    let (fx0, fy0) = (f64::from(x0), f64::from(y0));
    let (dx, dy) = (f64::from(x1) - fx0, f64::from(y1) - fy0);

    (0..=steps)
        .map(|i| {
            let t = i as f64 / steps as f64;
            let eased = easing.apply(t);
            PathPoint {
                x: (fx0 + dx * eased).round() as i32,
                y: (fy0 + dy * eased).round() as i32,
                delay_ms,
            }
        })
        .collect()
}
