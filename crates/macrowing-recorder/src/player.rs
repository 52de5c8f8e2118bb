//! Real-time macro playback
//!
//! Each run executes on its own thread. The controlling side talks to it
//! through a [`RunToken`]: cancellation and pause are cooperative and are
//! observed at every timed wait and between input primitives, never in
//! the middle of one.

use crate::notify::{Observers, Receiver};
use crossbeam_channel::{bounded, RecvTimeoutError};
use macrowing_core::{
    duration_for_distance, sample_path, Action, ActionKind, Easing, Error, InputSynth, Key,
    Macro, MouseButton, Result, Settings, SynthError,
};
use parking_lot::{Condvar, Mutex};
use std::panic::{catch_unwind, AssertUnwindSafe};
use std::sync::atomic::{AtomicBool, AtomicU32, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::{Duration, Instant};
use tracing::{debug, error, info, warn};

/// Longest uninterrupted sleep inside a timed wait
const POLL_SLICE: Duration = Duration::from_millis(5);

#[derive(Debug, Clone, PartialEq)]
pub struct PlayerConfig {
    pub smooth_mouse_enabled: bool,
    pub easing: Easing,
    /// Divides the natural move duration
    pub speed: f64,
    pub min_duration_ms: f64,
    pub max_duration_ms: f64,
    pub steps_per_second: u32,
    /// Upper bound on how long `stop` waits for the playback thread
    pub stop_timeout: Duration,
}

impl Default for PlayerConfig {
    fn default() -> Self {
        Self::from_settings(&Settings::default())
    }
}

impl PlayerConfig {
    pub fn from_settings(settings: &Settings) -> Self {
        Self {
            smooth_mouse_enabled: settings.smooth_mouse_enabled,
            easing: settings.smooth_mouse_easing,
            speed: settings.smooth_mouse_speed,
            min_duration_ms: settings.smooth_mouse_min_duration,
            max_duration_ms: settings.smooth_mouse_max_duration,
            steps_per_second: settings.smooth_mouse_steps_per_second,
            stop_timeout: Duration::from_millis(settings.stop_timeout_ms),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StopReason {
    /// Every loop ran to completion
    Finished,
    /// `stop` was requested
    Cancelled,
    /// The playback thread did not exit within the stop timeout
    Abandoned,
}

#[derive(Debug, Clone, PartialEq)]
pub enum PlayerEvent {
    Started { macro_id: String },
    Paused,
    Resumed,
    ActionExecuted { index: usize },
    ActionFailed { index: usize, message: String },
    LoopCompleted { loop_index: u32 },
    Stopped { reason: StopReason },
    Error { message: String },
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayerState {
    Idle,
    Playing,
    Paused,
}

/// What a play request resulted in
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PlayOutcome {
    Started,
    /// Macro had no actions; nothing ran
    Empty,
    /// A recording is in progress
    RejectedWhileRecording,
}

#[derive(Default)]
struct Control {
    cancelled: bool,
    paused: bool,
}

/// Cancellation and pause flags shared with one playback thread
#[derive(Default)]
pub(crate) struct RunToken {
    control: Mutex<Control>,
    signal: Condvar,
}

impl RunToken {
    pub(crate) fn cancel(&self) {
        self.control.lock().cancelled = true;
        self.signal.notify_all();
    }

    pub(crate) fn is_cancelled(&self) -> bool {
        self.control.lock().cancelled
    }

    /// Returns false if the flag was already in that state
    pub(crate) fn set_paused(&self, paused: bool) -> bool {
        let mut control = self.control.lock();
        if control.paused == paused || control.cancelled {
            return false;
        }
        control.paused = paused;
        self.signal.notify_all();
        true
    }

    pub(crate) fn is_paused(&self) -> bool {
        self.control.lock().paused
    }

    /// Wait `ms` of unpaused time. Returns false once cancelled.
    pub(crate) fn sleep_ms(&self, ms: f64) -> bool {
        let mut remaining = if ms.is_finite() && ms > 0.0 {
            Duration::from_secs_f64(ms / 1000.0)
        } else {
            Duration::ZERO
        };
        let mut control = self.control.lock();
        loop {
            if control.cancelled {
                return false;
            }
            if control.paused {
                self.signal.wait_for(&mut control, POLL_SLICE);
                continue;
            }
            if remaining.is_zero() {
                return true;
            }
            let started = Instant::now();
            self.signal.wait_for(&mut control, remaining.min(POLL_SLICE));
            remaining = remaining.saturating_sub(started.elapsed());
        }
    }

    /// Block while paused. Returns false once cancelled.
    pub(crate) fn checkpoint(&self) -> bool {
        self.sleep_ms(0.0)
    }
}

/// One playback run, shared between the player and its thread
struct Run {
    macro_id: String,
    token: RunToken,
    current_loop: AtomicU32,
    stopped: AtomicBool,
}

impl Run {
    fn new(macro_id: &str) -> Self {
        Self {
            macro_id: macro_id.to_string(),
            token: RunToken::default(),
            current_loop: AtomicU32::new(0),
            stopped: AtomicBool::new(false),
        }
    }

    fn is_live(&self) -> bool {
        !self.stopped.load(Ordering::SeqCst)
    }

    /// Events from an abandoned thread are discarded
    fn emit(&self, observers: &Observers<PlayerEvent>, event: PlayerEvent) {
        if self.is_live() {
            observers.publish(event);
        }
    }

    /// Publishes `Stopped` exactly once per run
    fn finish(&self, observers: &Observers<PlayerEvent>, reason: StopReason) -> bool {
        if self.stopped.swap(true, Ordering::SeqCst) {
            return false;
        }
        info!("Playback of {} stopped ({:?})", self.macro_id, reason);
        observers.publish(PlayerEvent::Stopped { reason });
        true
    }
}

struct ActiveRun {
    run: Arc<Run>,
    done: Receiver<()>,
    handle: thread::JoinHandle<()>,
}

/// Plays one macro at a time
pub struct Player {
    synth: Arc<dyn InputSynth>,
    config: Mutex<PlayerConfig>,
    observers: Arc<Observers<PlayerEvent>>,
    active: Mutex<Option<ActiveRun>>,
    /// Serializes play and stop
    transition: Mutex<()>,
}

impl Player {
    pub fn new(synth: Arc<dyn InputSynth>, config: PlayerConfig) -> Self {
        Self {
            synth,
            config: Mutex::new(config),
            observers: Arc::new(Observers::new()),
            active: Mutex::new(None),
            transition: Mutex::new(()),
        }
    }

    pub fn config(&self) -> PlayerConfig {
        self.config.lock().clone()
    }

    /// Applies to the next run
    pub fn set_config(&self, config: PlayerConfig) {
        *self.config.lock() = config;
    }

    pub fn subscribe(&self) -> Receiver<PlayerEvent> {
        self.observers.subscribe()
    }

    /// Start playing `mac`, stopping whatever is playing first.
    ///
    /// An empty macro is a no-op. Errors only if the playback thread
    /// cannot be spawned.
    pub fn play(&self, mac: &Macro) -> Result<PlayOutcome> {
        if mac.is_empty() {
            debug!("Macro {} has no actions, nothing to play", mac.id());
            return Ok(PlayOutcome::Empty);
        }

        let _transition = self.transition.lock();
        self.stop_active();

        let run = Arc::new(Run::new(mac.id()));
        let (done_tx, done_rx) = bounded(1);
        let execution = Execution {
            run: run.clone(),
            synth: self.synth.clone(),
            config: self.config(),
            observers: self.observers.clone(),
            actions: mac.actions().to_vec(),
            loop_count: mac.loop_count(),
            loop_delay: mac.loop_delay(),
        };

        info!(
            "Playing {} ({} actions, loops: {})",
            mac.name(),
            mac.len(),
            mac.loop_count()
        );
        self.observers.publish(PlayerEvent::Started {
            macro_id: mac.id().to_string(),
        });

        let observers = self.observers.clone();
        let spawned = thread::Builder::new()
            .name("macrowing-player".into())
            .spawn(move || {
                execution.run_to_end();
                let _ = done_tx.send(());
            });

        match spawned {
            Ok(handle) => {
                *self.active.lock() = Some(ActiveRun {
                    run,
                    done: done_rx,
                    handle,
                });
                Ok(PlayOutcome::Started)
            }
            Err(e) => {
                error!("Failed to spawn playback thread: {}", e);
                observers.publish(PlayerEvent::Error {
                    message: e.to_string(),
                });
                run.finish(&observers, StopReason::Cancelled);
                Err(Error::action_failed("play", &e.to_string()))
            }
        }
    }

    /// Cancel the active run and wait for it, bounded by the stop timeout.
    /// Returns true if something was playing.
    pub fn stop(&self) -> bool {
        let _transition = self.transition.lock();
        self.stop_active()
    }

    fn stop_active(&self) -> bool {
        let Some(active) = self.active.lock().take() else {
            return false;
        };
        if !active.run.is_live() {
            let _ = active.handle.join();
            return false;
        }

        active.run.token.cancel();
        let timeout = self.config.lock().stop_timeout;
        match active.done.recv_timeout(timeout) {
            Ok(()) | Err(RecvTimeoutError::Disconnected) => {
                let _ = active.handle.join();
            }
            Err(RecvTimeoutError::Timeout) => {
                warn!(
                    "Playback thread did not exit within {:?}, abandoning it",
                    timeout
                );
                active.run.finish(&self.observers, StopReason::Abandoned);
            }
        }
        true
    }

    /// Returns true if playback transitioned to paused
    pub fn pause(&self) -> bool {
        let paused = self.with_live_run(|run| run.token.set_paused(true));
        if paused {
            info!("Playback paused");
            self.observers.publish(PlayerEvent::Paused);
        }
        paused
    }

    /// Returns true if playback transitioned back to playing
    pub fn resume(&self) -> bool {
        let resumed = self.with_live_run(|run| run.token.set_paused(false));
        if resumed {
            info!("Playback resumed");
            self.observers.publish(PlayerEvent::Resumed);
        }
        resumed
    }

    pub fn toggle_pause(&self) -> bool {
        match self.state() {
            PlayerState::Playing => self.pause(),
            PlayerState::Paused => self.resume(),
            PlayerState::Idle => false,
        }
    }

    pub fn state(&self) -> PlayerState {
        self.with_live_run(|run| {
            Some(if run.token.is_paused() {
                PlayerState::Paused
            } else {
                PlayerState::Playing
            })
        })
        .unwrap_or(PlayerState::Idle)
    }

    pub fn is_playing(&self) -> bool {
        self.state() != PlayerState::Idle
    }

    pub fn current_macro_id(&self) -> Option<String> {
        self.with_live_run(|run| Some(run.macro_id.clone()))
    }

    /// Zero-based index of the loop being played
    pub fn current_loop(&self) -> u32 {
        self.with_live_run(|run| Some(run.current_loop.load(Ordering::SeqCst)))
            .unwrap_or(0)
    }

    fn with_live_run<T: Default>(&self, f: impl FnOnce(&Run) -> T) -> T {
        match self.active.lock().as_ref() {
            Some(active) if active.run.is_live() => f(&active.run),
            _ => T::default(),
        }
    }
}

impl Drop for Player {
    fn drop(&mut self) {
        self.stop();
    }
}

/// Everything the playback thread owns
struct Execution {
    run: Arc<Run>,
    synth: Arc<dyn InputSynth>,
    config: PlayerConfig,
    observers: Arc<Observers<PlayerEvent>>,
    actions: Vec<Action>,
    loop_count: u32,
    loop_delay: f64,
}

impl Execution {
    fn run_to_end(&self) {
        let outcome = catch_unwind(AssertUnwindSafe(|| self.run_loops()));
        let reason = match outcome {
            Ok(()) if self.run.token.is_cancelled() => StopReason::Cancelled,
            Ok(()) => StopReason::Finished,
            Err(panic) => {
                let message = panic
                    .downcast_ref::<&str>()
                    .map(|s| s.to_string())
                    .or_else(|| panic.downcast_ref::<String>().cloned())
                    .unwrap_or_else(|| "playback thread panicked".to_string());
                error!("Playback error: {}", message);
                self.run
                    .emit(&self.observers, PlayerEvent::Error { message });
                StopReason::Cancelled
            }
        };
        self.run.finish(&self.observers, reason);
    }

    fn run_loops(&self) {
        let token = &self.run.token;
        let mut iteration: u32 = 0;
        while self.loop_count == 0 || iteration < self.loop_count {
            self.run.current_loop.store(iteration, Ordering::SeqCst);

            for (index, action) in self.actions.iter().enumerate() {
                if !token.sleep_ms(action.delay_before) || !token.checkpoint() {
                    return;
                }
                match self.execute(action) {
                    Ok(true) => self
                        .run
                        .emit(&self.observers, PlayerEvent::ActionExecuted { index }),
                    Ok(false) => return,
                    Err(e) => {
                        warn!("Action {} ({}) failed: {}", index, action, e);
                        self.run.emit(
                            &self.observers,
                            PlayerEvent::ActionFailed {
                                index,
                                message: e.to_string(),
                            },
                        );
                    }
                }
            }

            if token.is_cancelled() {
                return;
            }
            debug!("Loop {} completed", iteration);
            self.run.emit(
                &self.observers,
                PlayerEvent::LoopCompleted {
                    loop_index: iteration,
                },
            );
            iteration = iteration.saturating_add(1);

            let more = self.loop_count == 0 || iteration < self.loop_count;
            if more && !token.sleep_ms(self.loop_delay) {
                return;
            }
        }
    }

    /// Ok(false) means cancellation interrupted the action
    fn execute(&self, action: &Action) -> std::result::Result<bool, SynthError> {
        let synth = self.synth.as_ref();
        match &action.kind {
            ActionKind::KeyPress { key } => synth.key_down(Key::parse(key)?)?,
            ActionKind::KeyRelease { key } => synth.key_up(Key::parse(key)?)?,
            ActionKind::MouseClick { x, y, button } => {
                synth.move_to(*x, *y)?;
                synth.button_down(MouseButton::from_name(button))?;
            }
            ActionKind::MouseRelease { button, .. } => {
                synth.button_up(MouseButton::from_name(button))?
            }
            ActionKind::MouseMove { x, y } => {
                if self.config.smooth_mouse_enabled {
                    return self.smooth_move(*x, *y);
                }
                synth.move_to(*x, *y)?;
            }
            ActionKind::MouseScroll { dx, dy, .. } => synth.scroll(*dx, *dy)?,
            ActionKind::Delay { ms } => return Ok(self.run.token.sleep_ms(*ms)),
        }
        Ok(true)
    }

    fn smooth_move(&self, x: i32, y: i32) -> std::result::Result<bool, SynthError> {
        let (x0, y0) = match self.synth.cursor_position() {
            Ok(pos) => pos,
            Err(e) => {
                warn!("Cursor position unavailable ({}), jumping to ({}, {})", e, x, y);
                self.synth.move_to(x, y)?;
                return Ok(true);
            }
        };
        let config = &self.config;
        let duration = duration_for_distance(
            x0,
            y0,
            x,
            y,
            config.speed,
            config.min_duration_ms,
            config.max_duration_ms,
        );
        let path = sample_path(x0, y0, x, y, duration, config.easing, config.steps_per_second);

        for point in path {
            if !self.run.token.checkpoint() {
                return Ok(false);
            }
            self.synth.move_to(point.x, point.y)?;
            if !self.run.token.sleep_ms(point.delay_ms) {
                return Ok(false);
            }
        }
        // Land exactly on target whatever the rounding did
        self.synth.move_to(x, y)?;
        Ok(true)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{RecordingSynth, SynthCall};
    use macrowing_core::NamedKey;

    fn instant_config() -> PlayerConfig {
        PlayerConfig {
            smooth_mouse_enabled: false,
            ..Default::default()
        }
    }

    fn macro_of(actions: Vec<Action>) -> Macro {
        let mut mac = Macro::new("test");
        mac.set_actions(actions);
        mac
    }

    /// Collect events until `Stopped` or the deadline
    fn until_stopped(rx: &Receiver<PlayerEvent>, within: Duration) -> Vec<PlayerEvent> {
        let deadline = Instant::now() + within;
        let mut events = Vec::new();
        while let Some(left) = deadline.checked_duration_since(Instant::now()) {
            match rx.recv_timeout(left) {
                Ok(e) => {
                    let stopped = matches!(e, PlayerEvent::Stopped { .. });
                    events.push(e);
                    if stopped {
                        break;
                    }
                }
                Err(_) => break,
            }
        }
        events
    }

    fn count(events: &[PlayerEvent], pred: impl Fn(&PlayerEvent) -> bool) -> usize {
        events.iter().filter(|e| pred(e)).count()
    }

    fn wait_until(within: Duration, mut cond: impl FnMut() -> bool) -> bool {
        let deadline = Instant::now() + within;
        while Instant::now() < deadline {
            if cond() {
                return true;
            }
            thread::sleep(Duration::from_millis(2));
        }
        cond()
    }

    #[test]
    fn sleep_freezes_while_paused() {
        let token = Arc::new(RunToken::default());
        token.set_paused(true);
        let sleeper = {
            let token = token.clone();
            thread::spawn(move || {
                let started = Instant::now();
                let finished = token.sleep_ms(50.0);
                (finished, started.elapsed())
            })
        };
        thread::sleep(Duration::from_millis(100));
        token.set_paused(false);
        let (finished, elapsed) = sleeper.join().unwrap();
        assert!(finished);
        assert!(elapsed >= Duration::from_millis(145), "{:?}", elapsed);
    }

    #[test]
    fn cancel_interrupts_sleep() {
        let token = Arc::new(RunToken::default());
        let sleeper = {
            let token = token.clone();
            thread::spawn(move || token.sleep_ms(10_000.0))
        };
        thread::sleep(Duration::from_millis(20));
        let cancelled_at = Instant::now();
        token.cancel();
        assert!(!sleeper.join().unwrap());
        assert!(cancelled_at.elapsed() < Duration::from_millis(100));
    }

    #[test]
    fn two_loops_with_delays() {
        let synth = Arc::new(RecordingSynth::new());
        let player = Player::new(synth.clone(), instant_config());
        let rx = player.subscribe();

        let mut mac = macro_of(vec![
            Action::key_press("a"),
            Action::delay(100.0),
            Action::click(50, 50, "left").with_delay(50.0),
        ]);
        mac.set_loop_count(2);
        mac.set_loop_delay(200.0);

        assert_eq!(player.play(&mac).unwrap(), PlayOutcome::Started);
        let events = until_stopped(&rx, Duration::from_secs(5));

        let once = vec![
            SynthCall::KeyDown(Key::Char('a')),
            SynthCall::MoveTo(50, 50),
            SynthCall::ButtonDown(MouseButton::Left),
        ];
        let expected: Vec<_> = once.iter().chain(once.iter()).cloned().collect();
        assert_eq!(synth.calls(), expected);

        let times = synth.timestamps();
        let first_click = times[1] - times[0];
        let between_loops = times[3] - times[2];
        let total = times[5] - times[0];
        assert!(first_click >= Duration::from_millis(150), "{:?}", first_click);
        assert!(between_loops >= Duration::from_millis(200), "{:?}", between_loops);
        assert!(total >= Duration::from_millis(500), "{:?}", total);
        assert!(total < Duration::from_millis(1500), "{:?}", total);

        assert_eq!(
            count(&events, |e| matches!(e, PlayerEvent::LoopCompleted { .. })),
            2
        );
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::Stopped {
                reason: StopReason::Finished
            })
        );
        assert!(wait_until(Duration::from_millis(200), || player.state()
            == PlayerState::Idle));
    }

    #[test]
    fn loop_count_three_runs_three_times() {
        let synth = Arc::new(RecordingSynth::new());
        let player = Player::new(synth.clone(), instant_config());
        let rx = player.subscribe();

        let mut mac = macro_of(vec![Action::key_press("x"), Action::key_release("x")]);
        mac.set_loop_count(3);
        player.play(&mac).unwrap();
        let events = until_stopped(&rx, Duration::from_secs(5));

        let loops: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                PlayerEvent::LoopCompleted { loop_index } => Some(*loop_index),
                _ => None,
            })
            .collect();
        assert_eq!(loops, vec![0, 1, 2]);
        assert_eq!(synth.calls().len(), 6);
        assert_eq!(
            count(&events, |e| matches!(e, PlayerEvent::ActionExecuted { .. })),
            6
        );
    }

    #[test]
    fn zero_loops_repeat_until_stopped() {
        let synth = Arc::new(RecordingSynth::new());
        let player = Player::new(synth.clone(), instant_config());
        let rx = player.subscribe();

        let mut mac = macro_of(vec![Action::key_press("x")]);
        mac.set_loop_count(0);
        mac.set_loop_delay(2.0);
        player.play(&mac).unwrap();
        assert!(wait_until(Duration::from_secs(2), || synth.calls().len() >= 5));
        assert!(player.stop());

        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::Stopped {
                reason: StopReason::Cancelled
            })
        );
        assert!(count(&events, |e| matches!(e, PlayerEvent::LoopCompleted { .. })) >= 4);
        assert_eq!(player.state(), PlayerState::Idle);
    }

    #[test]
    fn stop_while_paused_emits_one_stopped() {
        let synth = Arc::new(RecordingSynth::new());
        let player = Player::new(synth.clone(), instant_config());
        let rx = player.subscribe();

        player
            .play(&macro_of(vec![Action::key_press("a"), Action::delay(5_000.0)]))
            .unwrap();
        assert!(wait_until(Duration::from_secs(1), || !synth.calls().is_empty()));
        assert!(player.pause());
        assert_eq!(player.state(), PlayerState::Paused);
        assert!(!player.pause());

        assert!(player.stop());
        assert!(!player.stop());
        assert_eq!(player.state(), PlayerState::Idle);

        thread::sleep(Duration::from_millis(50));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            count(&events, |e| matches!(e, PlayerEvent::Stopped { .. })),
            1
        );
        assert!(events.contains(&PlayerEvent::Paused));
    }

    #[test]
    fn pause_mid_move_resumes_from_same_step() {
        let synth = Arc::new(RecordingSynth::new());
        let player = Player::new(
            synth.clone(),
            PlayerConfig {
                smooth_mouse_enabled: true,
                easing: Easing::Linear,
                speed: 1.0,
                min_duration_ms: 400.0,
                max_duration_ms: 400.0,
                steps_per_second: 100,
                ..Default::default()
            },
        );
        let rx = player.subscribe();

        player.play(&macro_of(vec![Action::move_to(1000, 0)])).unwrap();
        assert!(wait_until(Duration::from_secs(1), || synth.calls().len() >= 5));
        assert!(player.pause());
        thread::sleep(Duration::from_millis(20));
        let while_paused = synth.calls().len();
        thread::sleep(Duration::from_millis(100));
        assert_eq!(synth.calls().len(), while_paused);
        assert!(player.resume());

        let events = until_stopped(&rx, Duration::from_secs(5));
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::Stopped {
                reason: StopReason::Finished
            })
        );

        let xs: Vec<i32> = synth
            .calls()
            .into_iter()
            .map(|c| match c {
                SynthCall::MoveTo(x, _) => x,
                other => panic!("unexpected {:?}", other),
            })
            .collect();
        // 41 samples plus the final snap
        assert_eq!(xs.len(), 42);
        assert_eq!(xs[0], 0);
        assert!(xs[..41].windows(2).all(|w| w[0] < w[1]), "{:?}", xs);
        assert_eq!(xs[40], 1000);
        assert_eq!(xs[41], 1000);
    }

    #[test]
    fn bad_action_does_not_abort_run() {
        let synth = Arc::new(RecordingSynth::new());
        let player = Player::new(synth.clone(), instant_config());
        let rx = player.subscribe();

        player
            .play(&macro_of(vec![
                Action::key_press("not_a_key"),
                Action::key_press("enter"),
            ]))
            .unwrap();
        let events = until_stopped(&rx, Duration::from_secs(2));

        assert!(events.iter().any(
            |e| matches!(e, PlayerEvent::ActionFailed { index: 0, message } if message.contains("not_a_key"))
        ));
        assert!(events.contains(&PlayerEvent::ActionExecuted { index: 1 }));
        assert_eq!(
            synth.calls(),
            vec![SynthCall::KeyDown(Key::Named(NamedKey::Enter))]
        );
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::Stopped {
                reason: StopReason::Finished
            })
        );
    }

    #[test]
    fn empty_macro_is_a_noop() {
        let synth = Arc::new(RecordingSynth::new());
        let player = Player::new(synth.clone(), instant_config());
        let rx = player.subscribe();

        assert_eq!(player.play(&Macro::new("empty")).unwrap(), PlayOutcome::Empty);
        assert_eq!(player.state(), PlayerState::Idle);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn empty_macro_leaves_current_run_alone() {
        let synth = Arc::new(RecordingSynth::new());
        let player = Player::new(synth.clone(), instant_config());

        let long = macro_of(vec![Action::delay(5_000.0)]);
        player.play(&long).unwrap();
        player.play(&Macro::new("empty")).unwrap();
        assert_eq!(player.current_macro_id().as_deref(), Some(long.id()));
        player.stop();
    }

    #[test]
    fn play_replaces_active_run() {
        let synth = Arc::new(RecordingSynth::new());
        let player = Player::new(synth.clone(), instant_config());
        let rx = player.subscribe();

        let first = macro_of(vec![Action::delay(5_000.0)]);
        let second = macro_of(vec![Action::key_press("b")]);
        player.play(&first).unwrap();
        player.play(&second).unwrap();
        let mut events = until_stopped(&rx, Duration::from_secs(1));
        events.extend(until_stopped(&rx, Duration::from_secs(2)));

        assert_eq!(
            events,
            vec![
                PlayerEvent::Started {
                    macro_id: first.id().to_string()
                },
                PlayerEvent::Stopped {
                    reason: StopReason::Cancelled
                },
                PlayerEvent::Started {
                    macro_id: second.id().to_string()
                },
                PlayerEvent::ActionExecuted { index: 0 },
                PlayerEvent::LoopCompleted { loop_index: 0 },
                PlayerEvent::Stopped {
                    reason: StopReason::Finished
                },
            ]
        );
    }

    #[test]
    fn stuck_thread_is_abandoned_once() {
        let synth = Arc::new(RecordingSynth::new().with_key_latency(Duration::from_millis(300)));
        let player = Player::new(
            synth.clone(),
            PlayerConfig {
                stop_timeout: Duration::from_millis(30),
                ..instant_config()
            },
        );
        let rx = player.subscribe();

        player.play(&macro_of(vec![Action::key_press("a"), Action::key_press("b")])).unwrap();
        thread::sleep(Duration::from_millis(20));
        let started = Instant::now();
        assert!(player.stop());
        assert!(started.elapsed() < Duration::from_millis(250));
        assert_eq!(player.state(), PlayerState::Idle);

        // Let the abandoned thread wind down
        thread::sleep(Duration::from_millis(400));
        let events: Vec<_> = rx.try_iter().collect();
        assert_eq!(
            count(&events, |e| matches!(e, PlayerEvent::Stopped { .. })),
            1
        );
        assert!(events.contains(&PlayerEvent::Stopped {
            reason: StopReason::Abandoned
        }));
        assert!(!events.contains(&PlayerEvent::ActionExecuted { index: 0 }));
    }

    #[test]
    fn panic_in_thread_is_reported() {
        let synth = Arc::new(RecordingSynth::new().panicking());
        let player = Player::new(synth, instant_config());
        let rx = player.subscribe();

        player.play(&macro_of(vec![Action::key_press("a")])).unwrap();
        let events = until_stopped(&rx, Duration::from_secs(2));
        assert!(events
            .iter()
            .any(|e| matches!(e, PlayerEvent::Error { .. })));
        assert!(matches!(events.last(), Some(PlayerEvent::Stopped { .. })));
        assert!(wait_until(Duration::from_millis(200), || player.state()
            == PlayerState::Idle));
    }

    #[test]
    fn toggle_pause_flips_state() {
        let synth = Arc::new(RecordingSynth::new());
        let player = Player::new(synth, instant_config());
        assert!(!player.toggle_pause());

        player.play(&macro_of(vec![Action::delay(5_000.0)])).unwrap();
        assert!(player.toggle_pause());
        assert_eq!(player.state(), PlayerState::Paused);
        assert!(player.toggle_pause());
        assert_eq!(player.state(), PlayerState::Playing);
        player.stop();
    }

    #[test]
    fn unreadable_cursor_still_reaches_target() {
        let synth = Arc::new(RecordingSynth::new().blind_cursor());
        let player = Player::new(synth.clone(), PlayerConfig::default());
        let rx = player.subscribe();

        player.play(&macro_of(vec![Action::move_to(100, 100)])).unwrap();
        let events = until_stopped(&rx, Duration::from_secs(2));
        assert_eq!(synth.calls(), vec![SynthCall::MoveTo(100, 100)]);
        assert!(events.contains(&PlayerEvent::ActionExecuted { index: 0 }));
        assert_eq!(
            count(&events, |e| matches!(e, PlayerEvent::ActionFailed { .. })),
            0
        );
    }

    #[test]
    fn stop_during_last_action_skips_loop_completed() {
        let synth = Arc::new(RecordingSynth::new().with_key_latency(Duration::from_millis(200)));
        let player = Player::new(synth.clone(), instant_config());
        let rx = player.subscribe();

        player.play(&macro_of(vec![Action::key_press("a")])).unwrap();
        thread::sleep(Duration::from_millis(50));
        assert!(player.stop());
        let events = until_stopped(&rx, Duration::from_secs(2));

        assert_eq!(synth.calls().len(), 1);
        assert_eq!(
            count(&events, |e| matches!(e, PlayerEvent::LoopCompleted { .. })),
            0
        );
        assert_eq!(
            events.last(),
            Some(&PlayerEvent::Stopped {
                reason: StopReason::Cancelled
            })
        );
    }
}
