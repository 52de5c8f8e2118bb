//! macrowing-core - Macro data model and input primitives
//!
//! Value types for timed actions and macros, the smooth-motion trajectory
//! generator, and OS input synthesis behind the [`InputSynth`] trait.
//!
//! ## Platform Support
//!
//! - **macOS**: CGEvent injection via cidre
//! - **Windows**: SendInput
//! - **Linux**: Coming soon (XTest)

pub mod action;
pub mod error;
pub mod input;
pub mod macros;
pub mod platform;
pub mod settings;
pub mod trajectory;

pub use action::{Action, ActionKind, ActionType};
pub use error::{Error, ErrorCode, Result};
pub use input::{InputSynth, Key, MouseButton, NamedKey, SynthError, SynthResult};
pub use macros::Macro;
pub use settings::Settings;
pub use trajectory::{duration_for_distance, sample_path, Easing, PathPoint};

pub mod prelude {
    pub use crate::action::{Action, ActionKind, ActionType};
    pub use crate::error::{Error, ErrorCode, Result};
    pub use crate::input::{InputSynth, Key, MouseButton, NamedKey};
    pub use crate::macros::Macro;
    pub use crate::settings::Settings;
    pub use crate::trajectory::Easing;
}

/// Input synthesizer for the current platform
pub fn system_synth() -> Result<std::sync::Arc<dyn InputSynth>> {
    platform::current::synth()
}

/// Check if the process may synthesize input
pub fn has_input_permission() -> bool {
    platform::current::has_input_permission()
}
