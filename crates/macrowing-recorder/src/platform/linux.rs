//! Linux capture
//!
//! TODO: evdev or XRecord source.

use crate::capture::InputSource;
use macrowing_core::{Error, Result};

pub fn source() -> Result<Box<dyn InputSource>> {
    Err(Error::not_implemented("Linux input capture is not supported yet"))
}
