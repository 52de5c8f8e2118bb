//! Linux platform implementation
//!
//! TODO: XTest (or uinput) backend for synthesis.

use crate::input::InputSynth;
use crate::{Error, Result};
use std::sync::Arc;

/// Input synthesis is not available on Linux yet
pub fn synth() -> Result<Arc<dyn InputSynth>> {
    Err(Error::not_implemented(
        "Linux input synthesis is not supported yet",
    ))
}

/// Linux has no permission prompt; always reports ready
pub fn has_input_permission() -> bool {
    true
}
