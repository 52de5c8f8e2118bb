//! Application context: recorder, player and hotkeys behind one capture stream
//!
//! Recording and playback are mutually exclusive. Starting a recording
//! stops playback; asking to play while recording is refused.

use crate::capture::{EventStream, InputSource};
use crate::hotkeys::HotkeyManager;
use crate::player::{PlayOutcome, Player, PlayerConfig};
use crate::recorder::{Recorder, RecorderConfig};
use macrowing_core::{Action, Error, InputSynth, Macro, Result, Settings};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, info, warn};

const DISPATCH_POLL: Duration = Duration::from_millis(50);

struct Dispatch {
    stop: Arc<AtomicBool>,
    handle: thread::JoinHandle<()>,
}

pub struct MacroEngine {
    recorder: Arc<Recorder>,
    player: Arc<Player>,
    hotkeys: Arc<HotkeyManager>,
    panic_key: String,
    dispatch: Mutex<Option<Dispatch>>,
    /// Held across start_recording and every play request
    mode: Arc<Mutex<()>>,
}

impl MacroEngine {
    pub fn new(synth: Arc<dyn InputSynth>, settings: &Settings) -> Self {
        Self::with_configs(
            synth,
            RecorderConfig::from_settings(settings),
            PlayerConfig::from_settings(settings),
            &settings.panic_key,
        )
    }

    pub fn with_configs(
        synth: Arc<dyn InputSynth>,
        recorder: RecorderConfig,
        player: PlayerConfig,
        panic_key: &str,
    ) -> Self {
        Self {
            recorder: Arc::new(Recorder::new(recorder)),
            player: Arc::new(Player::new(synth, player)),
            hotkeys: Arc::new(HotkeyManager::new()),
            panic_key: panic_key.to_string(),
            dispatch: Mutex::new(None),
            mode: Arc::new(Mutex::new(())),
        }
    }

    pub fn recorder(&self) -> &Arc<Recorder> {
        &self.recorder
    }

    pub fn player(&self) -> &Arc<Player> {
        &self.player
    }

    pub fn hotkeys(&self) -> &Arc<HotkeyManager> {
        &self.hotkeys
    }

    /// Subscribe to `source` and route its events to the recorder and
    /// hotkeys. Replaces any previous source.
    pub fn attach(&self, source: &dyn InputSource) -> Result<()> {
        self.detach();
        let stream = source.subscribe()?;
        let stop = Arc::new(AtomicBool::new(false));
        let handle = spawn_dispatch(
            stream,
            stop.clone(),
            self.recorder.clone(),
            self.hotkeys.clone(),
        )?;
        *self.dispatch.lock() = Some(Dispatch { stop, handle });
        info!("Input source attached");
        Ok(())
    }

    /// Stop dispatching and release the capture stream
    pub fn detach(&self) -> bool {
        let Some(dispatch) = self.dispatch.lock().take() else {
            return false;
        };
        dispatch.stop.store(true, Ordering::SeqCst);
        let _ = dispatch.handle.join();
        info!("Input source detached");
        true
    }

    pub fn is_attached(&self) -> bool {
        self.dispatch.lock().is_some()
    }

    /// Stops any playback first. Returns false if already recording.
    pub fn start_recording(&self) -> bool {
        let _mode = self.mode.lock();
        self.player.stop();
        self.recorder.start()
    }

    pub fn stop_recording(&self) -> Vec<Action> {
        self.recorder.stop()
    }

    /// Stop recording and wrap the result in a new macro
    pub fn finish_recording(&self, name: &str) -> Macro {
        Macro::from_recording(name, self.recorder.stop())
    }

    pub fn play(&self, mac: &Macro) -> Result<PlayOutcome> {
        play_unless_recording(&self.mode, &self.recorder, &self.player, mac)
    }

    pub fn stop_playback(&self) -> bool {
        self.player.stop()
    }

    /// Bind every enabled macro that has a hotkey, plus the panic key.
    /// Returns how many macros were bound.
    pub fn register_hotkeys(&self, macros: &[Macro]) -> usize {
        let mut bound = 0;
        for mac in macros.iter().filter(|m| m.enabled()) {
            let Some(combo) = mac.hotkey() else {
                continue;
            };
            let mode = self.mode.clone();
            let recorder = self.recorder.clone();
            let player = self.player.clone();
            let target = mac.clone();
            let ok = self.hotkeys.bind(
                mac.id(),
                combo,
                move || {
                    if let Err(e) = play_unless_recording(&mode, &recorder, &player, &target) {
                        warn!("Hotkey playback of {} failed: {}", target.name(), e);
                    }
                },
                mac.name(),
            );
            if ok {
                bound += 1;
            }
        }

        let player = self.player.clone();
        if !self.hotkeys.set_panic(&self.panic_key, move || {
            info!("Panic key pressed");
            player.stop();
        }) {
            warn!("Panic key '{}' could not be bound", self.panic_key);
        }
        info!("Registered {} macro hotkeys", bound);
        bound
    }

    /// Stop everything and release the input source. Safe to call twice.
    pub fn shutdown(&self) {
        self.player.stop();
        if self.recorder.is_recording() {
            self.recorder.stop();
        }
        self.detach();
        self.hotkeys.unbind_all();
        debug!("Engine shut down");
    }
}

impl Drop for MacroEngine {
    fn drop(&mut self) {
        self.shutdown();
    }
}

fn play_unless_recording(
    mode: &Mutex<()>,
    recorder: &Recorder,
    player: &Player,
    mac: &Macro,
) -> Result<PlayOutcome> {
    let _mode = mode.lock();
    if recorder.is_recording() {
        info!("Ignoring play of {} while recording", mac.name());
        return Ok(PlayOutcome::RejectedWhileRecording);
    }
    player.play(mac)
}

fn spawn_dispatch(
    stream: EventStream,
    stop: Arc<AtomicBool>,
    recorder: Arc<Recorder>,
    hotkeys: Arc<HotkeyManager>,
) -> Result<thread::JoinHandle<()>> {
    thread::Builder::new()
        .name("macrowing-dispatch".into())
        .spawn(move || {
            while !stop.load(Ordering::SeqCst) {
                match stream.recv_timeout(DISPATCH_POLL) {
                    Ok(Some(event)) => {
                        recorder.on_raw_event(&event);
                        hotkeys.on_raw_event(&event);
                    }
                    Ok(None) => {}
                    Err(()) => {
                        warn!("Input source closed");
                        break;
                    }
                }
            }
            stream.stop();
        })
        .map_err(|e| Error::action_failed("attach", &e.to_string()))
}
