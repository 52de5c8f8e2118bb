//! macOS capture via a listen-only CGEventTap
//!
//! Requires Accessibility permission. Modifier keys arrive as
//! `FLAGS_CHANGED`; the flag bit tells down from up. Events posted by
//! the player carry a source tag and are skipped.

use crate::capture::{EventStream, InputSource};
use crate::events::{RawEvent, RawEventKind};
use cidre::{cf, cg};
use crossbeam_channel::{bounded, unbounded, Sender};
use macrowing_core::platform::macos::{is_synthesized, key_for_keycode};
use macrowing_core::{Error, Key, MouseButton, NamedKey, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

const FLAG_SHIFT: u64 = 0x20000;
const FLAG_CTRL: u64 = 0x40000;
const FLAG_ALT: u64 = 0x80000;
const FLAG_CMD: u64 = 0x100000;

struct TapState {
    tx: Sender<RawEvent>,
}

pub struct EventTapSource;

pub fn source() -> Result<Box<dyn InputSource>> {
    if !macrowing_core::has_input_permission() {
        cidre::ax::is_process_trusted_with_prompt(true);
        return Err(Error::permission_denied(
            "Accessibility permissions required to listen for input",
        )
        .with_suggestions(vec![
            "Enable in System Settings > Privacy & Security > Accessibility".to_string(),
        ]));
    }
    Ok(Box::new(EventTapSource))
}

impl InputSource for EventTapSource {
    fn subscribe(&self) -> Result<EventStream> {
        let (tx, rx) = unbounded();
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = bounded::<bool>(1);

        let stop1 = stop.clone();
        let handle = thread::Builder::new()
            .name("macrowing-event-tap".into())
            .spawn(move || run_event_tap(tx, stop1, ready_tx))?;

        match ready_rx.recv_timeout(Duration::from_secs(2)) {
            Ok(true) => Ok(EventStream::new(rx, stop, vec![handle])),
            _ => {
                stop.store(true, Ordering::SeqCst);
                let _ = handle.join();
                Err(Error::permission_denied("Failed to create event tap")
                    .with_suggestions(vec![
                        "Grant Accessibility and Input Monitoring permissions".to_string(),
                    ]))
            }
        }
    }
}

fn run_event_tap(tx: Sender<RawEvent>, stop: Arc<AtomicBool>, ready: Sender<bool>) {
    let mask = cg::EventType::LEFT_MOUSE_DOWN.mask()
        | cg::EventType::LEFT_MOUSE_UP.mask()
        | cg::EventType::RIGHT_MOUSE_DOWN.mask()
        | cg::EventType::RIGHT_MOUSE_UP.mask()
        | cg::EventType::OHTER_MOUSE_DOWN.mask()
        | cg::EventType::OHTER_MOUSE_UP.mask()
        | cg::EventType::MOUSE_MOVED.mask()
        | cg::EventType::LEFT_MOUSE_DRAGGED.mask()
        | cg::EventType::RIGHT_MOUSE_DRAGGED.mask()
        | cg::EventType::OHTER_MOUSE_DRAGGED.mask()
        | cg::EventType::KEY_DOWN.mask()
        | cg::EventType::KEY_UP.mask()
        | cg::EventType::FLAGS_CHANGED.mask()
        | cg::EventType::SCROLL_WHEEL.mask();

    let state = Box::into_raw(Box::new(TapState { tx }));

    let tap = cg::EventTap::new(
        cg::EventTapLocation::Session,
        cg::EventTapPlacement::TailAppend,
        cg::EventTapOpts::LISTEN_ONLY,
        mask,
        tap_callback,
        state,
    );

    let Some(tap) = tap else {
        error!("Failed to create event tap");
        let _ = ready.send(false);
        drop(unsafe { Box::from_raw(state) });
        return;
    };

    let Some(src) = cf::MachPort::run_loop_src(&tap, 0) else {
        error!("Failed to create run loop source");
        let _ = ready.send(false);
        drop(tap);
        drop(unsafe { Box::from_raw(state) });
        return;
    };

    let rl = cf::RunLoop::current();
    rl.add_src(&src, cf::RunLoopMode::default());
    let _ = ready.send(true);
    debug!("Event tap running");

    while !stop.load(Ordering::Relaxed) {
        cf::RunLoop::run_in_mode(cf::RunLoopMode::default(), 0.05, true);
    }

    rl.remove_src(&src, cf::RunLoopMode::default());
    drop(src);
    drop(tap);
    // The tap is gone, so the callback can no longer see the state
    drop(unsafe { Box::from_raw(state) });
    debug!("Event tap stopped");
}

fn modifier_flag(key: Key) -> Option<u64> {
    match key.modifier()? {
        NamedKey::Shift => Some(FLAG_SHIFT),
        NamedKey::Ctrl => Some(FLAG_CTRL),
        NamedKey::Alt => Some(FLAG_ALT),
        NamedKey::Cmd => Some(FLAG_CMD),
        _ => None,
    }
}

extern "C" fn tap_callback(
    _proxy: *mut cg::EventTapProxy,
    event_type: cg::EventType,
    event: &mut cg::Event,
    user_info: *mut TapState,
) -> Option<&cg::Event> {
    let state = unsafe { &*user_info };
    // Our own playback
    if is_synthesized(event) {
        return Some(event);
    }
    let loc = event.location();
    let (x, y) = (loc.x.round() as i32, loc.y.round() as i32);
    let flags = event.flags().0;

    let kind = match event_type {
        cg::EventType::LEFT_MOUSE_DOWN => Some(RawEventKind::ButtonDown { x, y, button: MouseButton::Left }),
        cg::EventType::RIGHT_MOUSE_DOWN => Some(RawEventKind::ButtonDown { x, y, button: MouseButton::Right }),
        cg::EventType::OHTER_MOUSE_DOWN => Some(RawEventKind::ButtonDown { x, y, button: MouseButton::Middle }),
        cg::EventType::LEFT_MOUSE_UP => Some(RawEventKind::ButtonUp { x, y, button: MouseButton::Left }),
        cg::EventType::RIGHT_MOUSE_UP => Some(RawEventKind::ButtonUp { x, y, button: MouseButton::Right }),
        cg::EventType::OHTER_MOUSE_UP => Some(RawEventKind::ButtonUp { x, y, button: MouseButton::Middle }),

        cg::EventType::MOUSE_MOVED
        | cg::EventType::LEFT_MOUSE_DRAGGED
        | cg::EventType::RIGHT_MOUSE_DRAGGED
        | cg::EventType::OHTER_MOUSE_DRAGGED => Some(RawEventKind::MouseMove { x, y }),

        cg::EventType::SCROLL_WHEEL => {
            let dy = event.field_i64(cg::EventField::SCROLL_WHEEL_EVENT_DELTA_AXIS1) as i32;
            let dx = event.field_i64(cg::EventField::SCROLL_WHEEL_EVENT_DELTA_AXIS2) as i32;
            (dx != 0 || dy != 0).then_some(RawEventKind::Scroll { x, y, dx, dy })
        }

        cg::EventType::KEY_DOWN | cg::EventType::KEY_UP => {
            let keycode = event.field_i64(cg::EventField::KEYBOARD_EVENT_KEYCODE) as u16;
            key_for_keycode(keycode, flags & FLAG_SHIFT != 0).map(|key| {
                if event_type == cg::EventType::KEY_DOWN {
                    RawEventKind::KeyDown { key }
                } else {
                    RawEventKind::KeyUp { key }
                }
            })
        }

        cg::EventType::FLAGS_CHANGED => {
            let keycode = event.field_i64(cg::EventField::KEYBOARD_EVENT_KEYCODE) as u16;
            key_for_keycode(keycode, false).and_then(|key| {
                let bit = modifier_flag(key)?;
                Some(if flags & bit != 0 {
                    RawEventKind::KeyDown { key }
                } else {
                    RawEventKind::KeyUp { key }
                })
            })
        }

        _ => None,
    };

    if let Some(kind) = kind {
        let _ = state.tx.send(RawEvent::new(kind));
    }
    Some(event)
}
