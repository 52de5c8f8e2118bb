//! Raw input capture
//!
//! An [`InputSource`] hands out [`EventStream`]s. Dropping or stopping a
//! stream detaches it from the source and joins its capture threads.

use crate::events::{RawEvent, RawEventKind};
pub use crossbeam_channel::{Receiver, Sender};
use crossbeam_channel::{unbounded, RecvTimeoutError};
use macrowing_core::Result;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread;
use std::time::Duration;

/// Something that can deliver raw keyboard and mouse events
pub trait InputSource: Send + Sync {
    fn subscribe(&self) -> Result<EventStream>;
}

type StopHook = Box<dyn FnOnce() + Send>;

/// Streaming event source - owns the capture threads
pub struct EventStream {
    stop: Arc<AtomicBool>,
    events_rx: Receiver<RawEvent>,
    threads: Vec<thread::JoinHandle<()>>,
    on_stop: Option<StopHook>,
}

impl EventStream {
    pub fn new(
        events_rx: Receiver<RawEvent>,
        stop: Arc<AtomicBool>,
        threads: Vec<thread::JoinHandle<()>>,
    ) -> Self {
        Self {
            stop,
            events_rx,
            threads,
            on_stop: None,
        }
    }

    /// Run `hook` when the stream stops, before capture threads are joined.
    /// Used to wake threads blocked in an OS message loop.
    pub fn with_stop_hook(mut self, hook: impl FnOnce() + Send + 'static) -> Self {
        self.on_stop = Some(Box::new(hook));
        self
    }

    /// Stop the event stream
    pub fn stop(mut self) {
        self.shutdown();
    }

    fn shutdown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(hook) = self.on_stop.take() {
            hook();
        }
        for t in self.threads.drain(..) {
            let _ = t.join();
        }
    }

    /// Try receive without blocking
    pub fn try_recv(&self) -> Option<RawEvent> {
        self.events_rx.try_recv().ok()
    }

    /// Receive with timeout. `Err` means the source is gone.
    pub fn recv_timeout(&self, timeout: Duration) -> std::result::Result<Option<RawEvent>, ()> {
        match self.events_rx.recv_timeout(timeout) {
            Ok(e) => Ok(Some(e)),
            Err(RecvTimeoutError::Timeout) => Ok(None),
            Err(RecvTimeoutError::Disconnected) => Err(()),
        }
    }
}

impl Drop for EventStream {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// In-process source fed through an [`Injector`]
#[derive(Clone, Default)]
pub struct ChannelSource {
    slot: Arc<Mutex<Option<Sender<RawEvent>>>>,
}

/// Feeds events into the currently subscribed stream of a [`ChannelSource`]
#[derive(Clone)]
pub struct Injector {
    slot: Arc<Mutex<Option<Sender<RawEvent>>>>,
}

impl ChannelSource {
    pub fn new() -> (Self, Injector) {
        let source = Self::default();
        let injector = Injector {
            slot: source.slot.clone(),
        };
        (source, injector)
    }
}

impl InputSource for ChannelSource {
    fn subscribe(&self) -> Result<EventStream> {
        let (tx, rx) = unbounded();
        *self.slot.lock() = Some(tx);
        let slot = self.slot.clone();
        let stream = EventStream::new(rx, Arc::new(AtomicBool::new(false)), Vec::new())
            .with_stop_hook(move || {
                slot.lock().take();
            });
        Ok(stream)
    }
}

impl Injector {
    /// Returns false when nobody is subscribed
    pub fn send(&self, event: RawEvent) -> bool {
        match self.slot.lock().as_ref() {
            Some(tx) => tx.send(event).is_ok(),
            None => false,
        }
    }

    pub fn send_now(&self, kind: RawEventKind) -> bool {
        self.send(RawEvent::new(kind))
    }

    pub fn is_attached(&self) -> bool {
        self.slot.lock().is_some()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use macrowing_core::Key;

    #[test]
    fn injected_events_reach_the_stream() {
        let (source, injector) = ChannelSource::new();
        assert!(!injector.send_now(RawEventKind::MouseMove { x: 1, y: 1 }));

        let stream = source.subscribe().unwrap();
        assert!(injector.send_now(RawEventKind::KeyDown { key: Key::Char('a') }));
        let got = stream.try_recv().unwrap();
        assert_eq!(got.kind, RawEventKind::KeyDown { key: Key::Char('a') });
    }

    #[test]
    fn stopping_detaches_from_the_source() {
        let (source, injector) = ChannelSource::new();
        let stream = source.subscribe().unwrap();
        assert!(injector.is_attached());
        stream.stop();
        assert!(!injector.is_attached());
        assert!(!injector.send_now(RawEventKind::MouseMove { x: 0, y: 0 }));
    }
}
