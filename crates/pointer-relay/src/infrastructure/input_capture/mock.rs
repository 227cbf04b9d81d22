//! Mock pointer source for tests.
//!
//! Lets tests inject synthetic [`RawPointerEvent`]s without an input backend.
//! The mock is `Clone` and all clones share state, so a test can keep one
//! handle for injecting while the lifecycle controller owns another.

use std::sync::{
    atomic::{AtomicU32, Ordering},
    mpsc::{self, Sender},
    Arc, Mutex,
};

use super::{CaptureError, PointerSource, RawPointerEvent};

#[derive(Default)]
struct Shared {
    sender: Mutex<Option<Sender<RawPointerEvent>>>,
    unavailable: Mutex<Option<String>>,
    start_count: AtomicU32,
    stop_count: AtomicU32,
}

/// A mock implementation of [`PointerSource`].
#[derive(Clone, Default)]
pub struct MockPointerSource {
    shared: Arc<Shared>,
}

impl MockPointerSource {
    /// Creates an available, unstarted mock source.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a source whose [`probe`](PointerSource::probe) reports `reason`.
    pub fn unavailable(reason: &str) -> Self {
        let source = Self::new();
        *source.shared.unavailable.lock().expect("lock poisoned") = Some(reason.to_string());
        source
    }

    /// Injects an event as if a capture backend produced it.
    ///
    /// Returns `false` when the source is not started; the event is dropped.
    pub fn inject_event(&self, event: RawPointerEvent) -> bool {
        let guard = self.shared.sender.lock().expect("lock poisoned");
        match guard.as_ref() {
            Some(sender) => sender.send(event).is_ok(),
            None => false,
        }
    }

    /// Shorthand for injecting a [`RawPointerEvent::Move`].
    pub fn inject_move(&self, x: f64, y: f64) -> bool {
        self.inject_event(RawPointerEvent::Move { x, y })
    }

    /// Shorthand for injecting a [`RawPointerEvent::Button`].
    pub fn inject_button(&self, x: f64, y: f64, button: &str, pressed: bool) -> bool {
        self.inject_event(RawPointerEvent::Button {
            x,
            y,
            button: button.to_string(),
            pressed,
        })
    }

    /// Returns `true` while a subscription is open.
    pub fn is_active(&self) -> bool {
        self.shared.sender.lock().expect("lock poisoned").is_some()
    }

    /// Number of successful [`start`](PointerSource::start) calls.
    pub fn start_count(&self) -> u32 {
        self.shared.start_count.load(Ordering::SeqCst)
    }

    /// Number of [`stop`](PointerSource::stop) calls.
    pub fn stop_count(&self) -> u32 {
        self.shared.stop_count.load(Ordering::SeqCst)
    }
}

impl PointerSource for MockPointerSource {
    fn probe(&self) -> Result<(), CaptureError> {
        match self.shared.unavailable.lock().expect("lock poisoned").as_ref() {
            Some(reason) => Err(CaptureError::Unavailable(reason.clone())),
            None => Ok(()),
        }
    }

    fn start(&self) -> Result<mpsc::Receiver<RawPointerEvent>, CaptureError> {
        let (tx, rx) = mpsc::channel();
        *self.shared.sender.lock().expect("lock poisoned") = Some(tx);
        self.shared.start_count.fetch_add(1, Ordering::SeqCst);
        Ok(rx)
    }

    fn stop(&self) {
        // Dropping the sender closes the channel.
        *self.shared.sender.lock().expect("lock poisoned") = None;
        self.shared.stop_count.fetch_add(1, Ordering::SeqCst);
    }
}
