//! # MacroWing
//!
//! Record keyboard and mouse macros and replay them with their original
//! timing, loops and smooth mouse motion.
//!
//! ## Features
//!
//! - **Recording**: Raw input becomes timed actions
//! - **Playback**: Pause, resume, stop and loops on a background thread
//! - **Hotkeys**: Bind macros to key combos, plus a panic key
//! - **Storage**: JSON persistence with import and export
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use macrowing::prelude::*;
//!
//! let settings = Settings::default();
//! let engine = MacroEngine::new(macrowing::system_synth()?, &settings);
//! engine.attach(macrowing::system_source()?.as_ref())?;
//!
//! engine.start_recording();
//! std::thread::sleep(std::time::Duration::from_secs(5));
//! let mac = engine.finish_recording("demo");
//!
//! engine.play(&mac)?;
//! # Ok::<(), macrowing::Error>(())
//! ```

// Re-export the data model and synthesis
pub use macrowing_core::*;

// Re-export the engine crate
pub use macrowing_recorder as recorder;

pub use macrowing_recorder::{
    system_source, ChannelSource, EventStream, HotkeyCombo, HotkeyManager, InputSource,
    MacroEngine, MacroStorage, PlayOutcome, Player, PlayerConfig, PlayerEvent, PlayerState,
    RawEvent, RawEventKind, Recorder, RecorderConfig, RecorderEvent, StopReason,
};

/// Prelude - import everything you need
pub mod prelude {
    pub use macrowing_core::prelude::*;
    pub use macrowing_recorder::prelude::*;
}
