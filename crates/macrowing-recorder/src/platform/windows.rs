//! Windows capture via low-level keyboard and mouse hooks
//!
//! The hooks run on a dedicated thread with its own message loop. Stopping
//! the stream posts `WM_QUIT` to that thread, which unhooks and exits.

use crate::capture::{EventStream, InputSource};
use crate::events::{RawEvent, RawEventKind};
use crossbeam_channel::{bounded, unbounded, Sender};
use macrowing_core::platform::windows::key_for_vk;
use macrowing_core::{Error, MouseButton, Result};
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;
use tracing::{debug, error};

use windows::Win32::Foundation::{LPARAM, LRESULT, WPARAM};
use windows::Win32::System::LibraryLoader::GetModuleHandleW;
use windows::Win32::System::Threading::GetCurrentThreadId;
use windows::Win32::UI::Input::KeyboardAndMouse::{MapVirtualKeyW, MAPVK_VK_TO_CHAR};
use windows::Win32::UI::WindowsAndMessaging::{
    CallNextHookEx, DispatchMessageW, GetMessageW, PeekMessageW, PostThreadMessageW,
    SetWindowsHookExW, TranslateMessage, UnhookWindowsHookEx, HC_ACTION, HHOOK, KBDLLHOOKSTRUCT,
    KBDLLHOOKSTRUCT_FLAGS, MSG, MSLLHOOKSTRUCT, PM_NOREMOVE, WH_KEYBOARD_LL, WH_MOUSE_LL,
    WM_KEYDOWN, WM_KEYUP, WM_LBUTTONDOWN, WM_LBUTTONUP, WM_MBUTTONDOWN, WM_MBUTTONUP,
    WM_MOUSEHWHEEL, WM_MOUSEMOVE, WM_MOUSEWHEEL, WM_QUIT, WM_RBUTTONDOWN, WM_RBUTTONUP,
    WM_SYSKEYDOWN, WM_SYSKEYUP,
};

const WHEEL_DELTA: i32 = 120;
const LLKHF_INJECTED: u32 = 0x10;
const LLMHF_INJECTED: u32 = 0x1;

/// Hook procedures have no user data, so the live sender sits here
static HOOK_SENDER: Mutex<Option<Sender<RawEvent>>> = parking_lot::const_mutex(None);

fn forward(kind: RawEventKind) {
    if let Some(tx) = HOOK_SENDER.lock().as_ref() {
        let _ = tx.send(RawEvent::new(kind));
    }
}

/// `WH_KEYBOARD_LL` + `WH_MOUSE_LL` source
pub struct HookSource;

pub fn source() -> Result<Box<dyn InputSource>> {
    Ok(Box::new(HookSource))
}

impl InputSource for HookSource {
    fn subscribe(&self) -> Result<EventStream> {
        let (tx, rx) = unbounded();
        *HOOK_SENDER.lock() = Some(tx);

        // Handshake so subscribe only returns once the hooks are installed
        let (ready_tx, ready_rx) = bounded::<std::result::Result<u32, String>>(1);
        let handle = thread::Builder::new()
            .name("macrowing-hooks".into())
            .spawn(move || run_hooks(ready_tx))?;

        let thread_id = match ready_rx.recv_timeout(Duration::from_secs(2)) {
            Ok(Ok(id)) => id,
            Ok(Err(reason)) => {
                HOOK_SENDER.lock().take();
                let _ = handle.join();
                return Err(Error::permission_denied(reason));
            }
            Err(_) => {
                HOOK_SENDER.lock().take();
                return Err(Error::action_failed(
                    "install hooks",
                    "hook thread did not signal readiness",
                ));
            }
        };
        debug!("Input hooks installed on thread {}", thread_id);

        let stream = EventStream::new(rx, Arc::new(AtomicBool::new(false)), vec![handle])
            .with_stop_hook(move || {
                HOOK_SENDER.lock().take();
                unsafe {
                    let _ = PostThreadMessageW(thread_id, WM_QUIT, WPARAM(0), LPARAM(0));
                }
            });
        Ok(stream)
    }
}

fn run_hooks(ready_tx: Sender<std::result::Result<u32, String>>) {
    // Ensure the thread has a message queue
    let mut msg = MSG::default();
    unsafe {
        let _ = PeekMessageW(&mut msg, None, 0, 0, PM_NOREMOVE);
    }
    let thread_id = unsafe { GetCurrentThreadId() };

    let hmodule = match unsafe { GetModuleHandleW(None) } {
        Ok(h) => h,
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };

    let mouse_hook = match unsafe { SetWindowsHookExW(WH_MOUSE_LL, Some(mouse_hook_proc), hmodule, 0) } {
        Ok(h) if !h.0.is_null() => h,
        Ok(_) => {
            let _ = ready_tx.send(Err(windows::core::Error::from_win32().to_string()));
            return;
        }
        Err(e) => {
            let _ = ready_tx.send(Err(e.to_string()));
            return;
        }
    };

    let keyboard_hook =
        match unsafe { SetWindowsHookExW(WH_KEYBOARD_LL, Some(keyboard_hook_proc), hmodule, 0) } {
            Ok(h) if !h.0.is_null() => h,
            other => {
                let reason = match other {
                    Err(e) => e.to_string(),
                    Ok(_) => windows::core::Error::from_win32().to_string(),
                };
                error!("Keyboard hook failed: {}", reason);
                let _ = ready_tx.send(Err(reason));
                unsafe {
                    let _ = UnhookWindowsHookEx(mouse_hook);
                }
                return;
            }
        };

    let _ = ready_tx.send(Ok(thread_id));

    // Message loop keeps LL hook callbacks flowing
    loop {
        let r = unsafe { GetMessageW(&mut msg, None, 0, 0) };
        if r.0 == 0 || r.0 == -1 {
            break;
        }
        unsafe {
            let _ = TranslateMessage(&msg);
            DispatchMessageW(&msg);
        }
    }

    unsafe {
        let _ = UnhookWindowsHookEx(mouse_hook);
        let _ = UnhookWindowsHookEx(keyboard_hook);
    }
    debug!("Input hooks removed");
}

fn next_hook(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    unsafe { CallNextHookEx(HHOOK(std::ptr::null_mut()), n_code, w_param, l_param) }
}

fn char_for_vk(vk: u32) -> Option<char> {
    let mapped = unsafe { MapVirtualKeyW(vk, MAPVK_VK_TO_CHAR) };
    // High bit marks dead keys
    if mapped == 0 || mapped & 0x8000_0000 != 0 {
        return None;
    }
    char::from_u32(mapped & 0xFFFF).map(|c| c.to_ascii_lowercase())
}

unsafe extern "system" fn keyboard_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        let info = &*(l_param.0 as *const KBDLLHOOKSTRUCT);
        let injected = (info.flags & KBDLLHOOKSTRUCT_FLAGS(LLKHF_INJECTED)).0 != 0;
        if !injected {
            let msg = w_param.0 as u32;
            let vk = info.vkCode;
            if let Some(key) = key_for_vk(vk as u16, char_for_vk(vk)) {
                match msg {
                    WM_KEYDOWN | WM_SYSKEYDOWN => forward(RawEventKind::KeyDown { key }),
                    WM_KEYUP | WM_SYSKEYUP => forward(RawEventKind::KeyUp { key }),
                    _ => {}
                }
            }
        }
    }
    next_hook(n_code, w_param, l_param)
}

unsafe extern "system" fn mouse_hook_proc(n_code: i32, w_param: WPARAM, l_param: LPARAM) -> LRESULT {
    if n_code == HC_ACTION as i32 {
        let info = &*(l_param.0 as *const MSLLHOOKSTRUCT);
        if info.flags & LLMHF_INJECTED == 0 {
            let (x, y) = (info.pt.x, info.pt.y);
            // mouseData high word contains signed wheel delta
            let wheel = i32::from(((info.mouseData >> 16) & 0xFFFF) as i16) / WHEEL_DELTA;
            let kind = match w_param.0 as u32 {
                WM_LBUTTONDOWN => Some(RawEventKind::ButtonDown { x, y, button: MouseButton::Left }),
                WM_RBUTTONDOWN => Some(RawEventKind::ButtonDown { x, y, button: MouseButton::Right }),
                WM_MBUTTONDOWN => Some(RawEventKind::ButtonDown { x, y, button: MouseButton::Middle }),
                WM_LBUTTONUP => Some(RawEventKind::ButtonUp { x, y, button: MouseButton::Left }),
                WM_RBUTTONUP => Some(RawEventKind::ButtonUp { x, y, button: MouseButton::Right }),
                WM_MBUTTONUP => Some(RawEventKind::ButtonUp { x, y, button: MouseButton::Middle }),
                WM_MOUSEMOVE => Some(RawEventKind::MouseMove { x, y }),
                WM_MOUSEWHEEL => Some(RawEventKind::Scroll { x, y, dx: 0, dy: wheel }),
                WM_MOUSEHWHEEL => Some(RawEventKind::Scroll { x, y, dx: wheel, dy: 0 }),
                _ => None,
            };
            if let Some(kind) = kind {
                forward(kind);
            }
        }
    }
    next_hook(n_code, w_param, l_param)
}
