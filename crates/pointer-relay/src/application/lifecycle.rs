//! CaptureLifecycle: the single entry and exit point that keeps the capture
//! subscription and the overlay connection in step with `Config.enabled`.
//!
//! `start()` always stops first, then opens the capture subscription, spawns
//! the pump thread that feeds the [`EventPublisher`], and asks the connection
//! to connect.  `stop()` undoes all of it in reverse.  The two are never
//! toggled independently, so an open subscription always has a connection
//! attempt behind it and no connection outlives a stop.
//!
//! Lifecycle calls are serialized by their own mutex; the capture path never
//! takes it.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    mpsc::{Receiver, RecvTimeoutError},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::thread::{self, JoinHandle};
use std::time::Duration;

use pointer_core::{Config, ConfigHolder};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

use super::publish_events::EventPublisher;
use crate::infrastructure::input_capture::{CaptureError, PointerSource, RawPointerEvent};

/// How often the pump re-checks its stop flag while the source is idle.
const PUMP_POLL: Duration = Duration::from_millis(50);

/// Connection control as seen by the lifecycle controller.
pub trait ConnectionControl: Send + Sync {
    /// Begins connecting (and keeps retrying) unless forwarding is disabled.
    fn connect(&self);
    /// Cancels retries and closes any live connection.  Idempotent.
    fn close(&self);
}

/// Result of the one-time capability probe.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Availability {
    /// `on_load()` (or the first `start()`) has not run yet.
    Unprobed,
    Available,
    /// A required capability is missing; every `start()` is a no-op.
    Unavailable(String),
}

struct Subscription {
    session: Uuid,
    active: Arc<AtomicBool>,
    pump: JoinHandle<()>,
}

struct Control {
    availability: Availability,
    subscription: Option<Subscription>,
}

/// Owns the capture subscription and drives the connection alongside it.
pub struct CaptureLifecycle {
    config: ConfigHolder,
    publisher: Arc<EventPublisher>,
    connection: Arc<dyn ConnectionControl>,
    source: Box<dyn PointerSource>,
    control: Mutex<Control>,
}

impl CaptureLifecycle {
    pub fn new(
        config: ConfigHolder,
        publisher: Arc<EventPublisher>,
        connection: Arc<dyn ConnectionControl>,
        source: Box<dyn PointerSource>,
    ) -> Self {
        Self {
            config,
            publisher,
            connection,
            source,
            control: Mutex::new(Control {
                availability: Availability::Unprobed,
                subscription: None,
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Control> {
        self.control.lock().unwrap_or_else(PoisonError::into_inner)
    }

    // ── Host hooks ────────────────────────────────────────────────────────────

    /// Probes the capture source, then starts if the current config is enabled.
    pub fn on_load(&self) {
        let mut control = self.lock();
        self.ensure_probed(&mut control);
        self.apply_locked(&mut control, self.config.is_enabled());
    }

    /// Stops everything.  The host calls this before unloading.
    pub fn on_unload(&self) {
        self.stop();
    }

    /// Applies settings changed by the host.
    pub fn on_config_changed(&self, config: Config) {
        self.reconcile(config);
    }

    // ── Reconciliation ────────────────────────────────────────────────────────

    /// Stores `config`, then starts when it is enabled and stops otherwise.
    pub fn reconcile(&self, config: Config) {
        let mut control = self.lock();
        let enabled = config.enabled;
        self.config.replace(config);
        self.apply_locked(&mut control, enabled);
    }

    /// (Re)starts capture and connection.  Safe to call while running.
    pub fn start(&self) {
        let mut control = self.lock();
        self.start_locked(&mut control);
    }

    /// Tears down capture and connection.  Safe to call while stopped.
    pub fn stop(&self) {
        let mut control = self.lock();
        self.stop_locked(&mut control);
    }

    /// Returns `true` while a capture subscription is open.
    pub fn is_running(&self) -> bool {
        self.lock().subscription.is_some()
    }

    /// Outcome of the capability probe.
    pub fn availability(&self) -> Availability {
        self.lock().availability.clone()
    }

    fn apply_locked(&self, control: &mut Control, enabled: bool) {
        if enabled {
            self.start_locked(control);
        } else {
            self.stop_locked(control);
        }
    }

    fn ensure_probed(&self, control: &mut Control) {
        if control.availability != Availability::Unprobed {
            return;
        }
        control.availability = match self.source.probe() {
            Ok(()) => Availability::Available,
            Err(e) => {
                error!("missing dependency, pointer relay disabled for this session: {e}");
                Availability::Unavailable(e.to_string())
            }
        };
    }

    fn start_locked(&self, control: &mut Control) {
        self.stop_locked(control);

        self.ensure_probed(control);
        if let Availability::Unavailable(reason) = &control.availability {
            debug!("start ignored, capture unavailable: {reason}");
            return;
        }

        let config = self.config.snapshot();
        if !config.enabled {
            debug!("start ignored, relay disabled");
            return;
        }

        self.publisher.rearm(config.publish_interval);

        let events = match self.source.start() {
            Ok(events) => events,
            Err(e) => {
                error!("pointer capture could not start: {e}");
                return;
            }
        };

        let active = Arc::new(AtomicBool::new(true));
        let pump = match spawn_pump(events, Arc::clone(&active), Arc::clone(&self.publisher)) {
            Ok(pump) => pump,
            Err(e) => {
                error!("pointer capture could not start: {e}");
                self.source.stop();
                return;
            }
        };

        let session = Uuid::new_v4();
        control.subscription = Some(Subscription {
            session,
            active,
            pump,
        });
        self.connection.connect();
        info!(
            "relay session {session} started: {} every {} ms",
            config.endpoint_url,
            config.publish_interval.as_millis()
        );
    }

    fn stop_locked(&self, control: &mut Control) {
        let subscription = control.subscription.take();
        if let Some(sub) = &subscription {
            sub.active.store(false, Ordering::SeqCst);
        }
        self.source.stop();
        if let Some(sub) = subscription {
            if sub.pump.join().is_err() {
                warn!("capture pump for session {} panicked", sub.session);
            }
            info!("relay session {} stopped", sub.session);
        }
        self.connection.close();
        self.publisher.reset();
    }
}

fn spawn_pump(
    events: Receiver<RawPointerEvent>,
    active: Arc<AtomicBool>,
    publisher: Arc<EventPublisher>,
) -> Result<JoinHandle<()>, CaptureError> {
    thread::Builder::new()
        .name("pointer-capture-pump".to_string())
        .spawn(move || pump(&events, &active, &publisher))
        .map_err(|e| CaptureError::StartFailed(e.to_string()))
}

/// Feeds capture events into the publisher until the subscription ends.
fn pump(events: &Receiver<RawPointerEvent>, active: &AtomicBool, publisher: &EventPublisher) {
    while active.load(Ordering::SeqCst) {
        match events.recv_timeout(PUMP_POLL) {
            Ok(event) => {
                // Events already queued when stop began are discarded.
                if !active.load(Ordering::SeqCst) {
                    break;
                }
                dispatch(publisher, event);
            }
            Err(RecvTimeoutError::Timeout) => {}
            Err(RecvTimeoutError::Disconnected) => break,
        }
    }
    debug!("capture pump exiting");
}

fn dispatch(publisher: &EventPublisher, event: RawPointerEvent) {
    match event {
        RawPointerEvent::Move { x, y } => publisher.on_move(x, y),
        RawPointerEvent::Button {
            x,
            y,
            button,
            pressed,
        } => publisher.on_button(x, y, &button, pressed),
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────
