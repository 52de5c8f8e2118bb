//! macrowing-recorder - Macro recording, playback, hotkeys and storage
//!
//! Raw input flows from an [`InputSource`] through the [`MacroEngine`] into
//! the [`Recorder`] and the [`HotkeyManager`]; the [`Player`] replays
//! macros through an [`InputSynth`](macrowing_core::InputSynth).
//!
//! ## Platform Support
//!
//! - **macOS**: CGEventTap capture
//! - **Windows**: Low-level keyboard and mouse hooks
//! - **Linux**: Coming soon

pub mod capture;
pub mod engine;
pub mod events;
pub mod hotkeys;
pub mod notify;
pub mod platform;
pub mod player;
pub mod recorder;
pub mod storage;

#[cfg(test)]
mod testing;

pub use capture::{ChannelSource, EventStream, InputSource, Injector};
pub use engine::MacroEngine;
pub use events::{RawEvent, RawEventKind};
pub use hotkeys::{BindingInfo, HotkeyCombo, HotkeyManager, PANIC_ID};
pub use notify::Receiver;
pub use player::{PlayOutcome, Player, PlayerConfig, PlayerEvent, PlayerState, StopReason};
pub use recorder::{Recorder, RecorderConfig, RecorderEvent};
pub use storage::MacroStorage;

pub mod prelude {
    pub use crate::capture::{ChannelSource, EventStream, InputSource};
    pub use crate::engine::MacroEngine;
    pub use crate::events::{RawEvent, RawEventKind};
    pub use crate::hotkeys::{HotkeyCombo, HotkeyManager};
    pub use crate::player::{PlayOutcome, Player, PlayerConfig, PlayerEvent, PlayerState};
    pub use crate::recorder::{Recorder, RecorderConfig, RecorderEvent};
    pub use crate::storage::MacroStorage;
}

/// Input source for the current platform
pub fn system_source() -> macrowing_core::Result<Box<dyn InputSource>> {
    platform::current::source()
}
