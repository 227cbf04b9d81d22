//! ConnectionManager: keeps at most one live connection to the overlay and
//! retries on a fixed cadence while the overlay is absent.
//!
//! # State machine
//!
//! ```text
//!               connect()                 attempt ok
//! Disconnected ───────────▶ Connecting ───────────────▶ Connected
//!      ▲                        │                          │
//!      │   attempt failed:      │                          │ write failed:
//!      │   schedule one retry   │                          │ connect() again
//!      └────────────────────────┴──────────────────────────┘
//! ```
//!
//! `close()` returns to `Disconnected` from anywhere and cancels everything
//! in flight.
//!
//! # Threading
//!
//! [`ConnectionManager::send`] is called on the capture pump thread and must
//! never block: it only checks the state and pushes the frame onto the live
//! link's bounded queue.  Connection attempts, retry timers, and the per-link
//! writer run as tokio tasks on the runtime whose [`Handle`] the manager was
//! built with.
//!
//! All mutable state sits behind one `std::sync::Mutex` that is never held
//! across an `.await`.
//!
//! # Cancellation
//!
//! Every `close()` bumps an epoch.  Attempt and retry tasks carry the epoch
//! they were started in and discard their result when it no longer matches,
//! so an attempt that completes after `close()` can never resurrect a
//! connection.

use std::sync::{
    atomic::{AtomicU64, Ordering},
    Arc, Mutex, MutexGuard, PoisonError,
};
use std::time::Duration;

use pointer_core::{ConfigHolder, ConnectionState, OutboundMessage};
use tokio::runtime::Handle;
use tokio::sync::mpsc::{self, error::TrySendError};
use tokio::task::JoinHandle;
use tracing::{debug, info, trace, warn};

use super::transport::{ConnectError, Connector, SendError, Transport};
use crate::application::lifecycle::ConnectionControl;
use crate::application::publish_events::MessageSink;

/// Upper bound on a single connection attempt.
pub const CONNECT_TIMEOUT: Duration = Duration::from_secs(5);

/// Fixed delay before retrying a failed attempt.
pub const RETRY_DELAY: Duration = Duration::from_secs(5);

/// Frames queued per link before new frames are dropped.
const LINK_QUEUE_DEPTH: usize = 256;

/// Timing knobs for the retry loop.  Fixed backoff only.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub connect_timeout: Duration,
    pub retry_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            connect_timeout: CONNECT_TIMEOUT,
            retry_delay: RETRY_DELAY,
        }
    }
}

/// Point-in-time copy of [`ConnectionStats`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StatsSnapshot {
    pub attempts: u64,
    pub connects: u64,
    pub retries_scheduled: u64,
    pub send_failures: u64,
    pub frames_written: u64,
    pub frames_dropped: u64,
}

/// Monotonic counters describing the manager's activity.
#[derive(Debug, Default)]
pub struct ConnectionStats {
    attempts: AtomicU64,
    connects: AtomicU64,
    retries_scheduled: AtomicU64,
    send_failures: AtomicU64,
    frames_written: AtomicU64,
    frames_dropped: AtomicU64,
}

impl ConnectionStats {
    /// Returns the current counter values.
    pub fn snapshot(&self) -> StatsSnapshot {
        StatsSnapshot {
            attempts: self.attempts.load(Ordering::Relaxed),
            connects: self.connects.load(Ordering::Relaxed),
            retries_scheduled: self.retries_scheduled.load(Ordering::Relaxed),
            send_failures: self.send_failures.load(Ordering::Relaxed),
            frames_written: self.frames_written.load(Ordering::Relaxed),
            frames_dropped: self.frames_dropped.load(Ordering::Relaxed),
        }
    }
}

fn bump(counter: &AtomicU64) {
    counter.fetch_add(1, Ordering::Relaxed);
}

/// The live connection: a queue into the writer task that owns the transport.
struct Link {
    id: u64,
    frames: mpsc::Sender<String>,
}

/// Everything guarded by the manager's mutex.
#[derive(Default)]
struct Slots {
    state: ConnectionState,
    /// "Desired running": set by `connect()`, cleared by `close()`.
    desired: bool,
    epoch: u64,
    next_link_id: u64,
    attempt: Option<JoinHandle<()>>,
    /// Single-slot retry schedule; replaced, never stacked.
    retry: Option<JoinHandle<()>>,
    link: Option<Link>,
}

fn cancel(slot: &mut Option<JoinHandle<()>>) {
    if let Some(task) = slot.take() {
        task.abort();
    }
}

struct Inner {
    config: ConfigHolder,
    connector: Arc<dyn Connector>,
    policy: RetryPolicy,
    runtime: Handle,
    slots: Mutex<Slots>,
    stats: ConnectionStats,
}

/// Reconnecting client for the overlay endpoint.
///
/// Cheap to clone; all clones drive the same connection.
#[derive(Clone)]
pub struct ConnectionManager {
    inner: Arc<Inner>,
}

impl ConnectionManager {
    /// Creates a manager that reads the endpoint from `config`, opens
    /// connections through `connector`, and spawns its tasks on `runtime`.
    pub fn new(
        config: ConfigHolder,
        connector: Arc<dyn Connector>,
        policy: RetryPolicy,
        runtime: Handle,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                connector,
                policy,
                runtime,
                slots: Mutex::new(Slots::default()),
                stats: ConnectionStats::default(),
            }),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Slots> {
        self.inner
            .slots
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Current connection state.
    pub fn state(&self) -> ConnectionState {
        self.lock().state
    }

    /// Returns `true` between `connect()` and `close()`.
    pub fn is_desired(&self) -> bool {
        self.lock().desired
    }

    /// Returns `true` while a retry is scheduled.
    pub fn has_pending_retry(&self) -> bool {
        self.lock().retry.is_some()
    }

    /// Activity counters.
    pub fn stats(&self) -> StatsSnapshot {
        self.inner.stats.snapshot()
    }

    /// Starts connecting unless forwarding is disabled.
    ///
    /// Returns immediately; the attempt runs in the background with a
    /// bounded timeout.  Calling this while an attempt is in flight or a link
    /// is live only cancels any pending retry.
    pub fn connect(&self) {
        let config = self.inner.config.snapshot();
        if !config.enabled {
            debug!("relay disabled; not connecting");
            return;
        }

        let mut slots = self.lock();
        slots.desired = true;
        cancel(&mut slots.retry);
        if slots.attempt.is_some() || slots.link.is_some() {
            return;
        }

        slots.state = ConnectionState::Connecting;
        bump(&self.inner.stats.attempts);
        let epoch = slots.epoch;
        let this = self.clone();
        let url = config.endpoint_url;
        debug!("connecting to overlay at {url}");
        slots.attempt = Some(
            self.inner
                .runtime
                .spawn(async move { this.run_attempt(epoch, url).await }),
        );
    }

    /// Hands `message` to the live link without blocking.
    ///
    /// Dropped silently unless the state is `Connected`.  A dead link is
    /// treated as a send failure and triggers reconnection.
    pub fn send(&self, message: &OutboundMessage) {
        let mut slots = self.lock();
        if !slots.state.accepts_writes() {
            bump(&self.inner.stats.frames_dropped);
            trace!("{} frame dropped: {}", message.type_name(), slots.state);
            return;
        }
        let Some(link) = slots.link.as_ref() else {
            bump(&self.inner.stats.frames_dropped);
            return;
        };

        let frame = match message.to_json() {
            Ok(frame) => frame,
            Err(e) => {
                warn!("failed to serialize {} frame: {e}", message.type_name());
                return;
            }
        };

        match link.frames.try_send(frame) {
            Ok(()) => {}
            Err(TrySendError::Full(_)) => {
                bump(&self.inner.stats.frames_dropped);
                debug!("link queue full; dropping {} frame", message.type_name());
            }
            Err(TrySendError::Closed(_)) => {
                let link_id = link.id;
                self.fail_link(&mut slots, link_id, &SendError::Closed);
                drop(slots);
                self.connect();
            }
        }
    }

    /// Cancels any pending retry or attempt, closes the live link, and
    /// returns to `Disconnected`.  Safe to call repeatedly.
    pub fn close(&self) {
        let mut slots = self.lock();
        slots.desired = false;
        slots.epoch = slots.epoch.wrapping_add(1);
        cancel(&mut slots.retry);
        cancel(&mut slots.attempt);
        // Dropping the link closes its queue; the writer flushes what is
        // already queued and then closes the transport.
        let had_link = slots.link.take().is_some();
        slots.state = ConnectionState::Disconnected;
        if had_link {
            info!("overlay connection closed");
        }
    }

    // ── Background tasks ──────────────────────────────────────────────────────

    async fn run_attempt(self, epoch: u64, url: String) {
        let timeout = self.inner.policy.connect_timeout;
        let outcome = match tokio::time::timeout(timeout, self.inner.connector.connect(&url)).await
        {
            Ok(result) => result,
            Err(_) => Err(ConnectError::Timeout(timeout)),
        };
        match outcome {
            Ok(transport) => self.on_connected(epoch, &url, transport),
            Err(e) => self.on_connect_failed(epoch, &url, e),
        }
    }

    fn on_connected(&self, epoch: u64, url: &str, transport: Box<dyn Transport>) {
        let mut slots = self.lock();
        if slots.epoch != epoch || !slots.desired {
            drop(slots);
            debug!("discarding connection to {url}: relay stopped while connecting");
            self.inner.runtime.spawn(async move {
                let mut transport = transport;
                transport.close().await;
            });
            return;
        }

        slots.attempt = None;
        cancel(&mut slots.retry);

        let (tx, rx) = mpsc::channel(LINK_QUEUE_DEPTH);
        let link_id = slots.next_link_id;
        slots.next_link_id = slots.next_link_id.wrapping_add(1);
        slots.link = Some(Link { id: link_id, frames: tx });
        slots.state = ConnectionState::Connected;
        bump(&self.inner.stats.connects);

        let this = self.clone();
        self.inner
            .runtime
            .spawn(async move { this.run_writer(link_id, transport, rx).await });
        info!("connected to overlay at {url}");
    }

    fn on_connect_failed(&self, epoch: u64, url: &str, error: ConnectError) {
        let mut slots = self.lock();
        if slots.epoch != epoch || !slots.desired {
            return;
        }
        slots.attempt = None;
        slots.state = ConnectionState::Disconnected;
        warn!(
            "failed to connect to overlay at {url}: {error}; retrying in {:?}",
            self.inner.policy.retry_delay
        );
        self.schedule_retry(&mut slots, epoch);
    }

    /// Cancel-then-reschedule: at most one retry is ever outstanding.
    fn schedule_retry(&self, slots: &mut Slots, epoch: u64) {
        cancel(&mut slots.retry);
        bump(&self.inner.stats.retries_scheduled);
        let delay = self.inner.policy.retry_delay;
        let this = self.clone();
        slots.retry = Some(self.inner.runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            this.on_retry_due(epoch);
        }));
    }

    fn on_retry_due(&self, epoch: u64) {
        {
            let mut slots = self.lock();
            if slots.epoch != epoch || !slots.desired {
                return;
            }
            // Detach rather than abort: this is the running retry task.
            slots.retry = None;
        }
        self.connect();
    }

    async fn run_writer(
        self,
        link_id: u64,
        mut transport: Box<dyn Transport>,
        mut frames: mpsc::Receiver<String>,
    ) {
        while let Some(frame) = frames.recv().await {
            if let Err(e) = transport.send_text(frame).await {
                let reconnect = {
                    let mut slots = self.lock();
                    self.fail_link(&mut slots, link_id, &e)
                };
                transport.close().await;
                if reconnect {
                    self.connect();
                }
                return;
            }
            bump(&self.inner.stats.frames_written);
        }
        transport.close().await;
    }

    /// Tears down link `link_id` after a write failure.
    ///
    /// Returns `false` when the link is no longer current (already replaced
    /// or closed), in which case nothing changes.
    fn fail_link(&self, slots: &mut Slots, link_id: u64, error: &SendError) -> bool {
        match slots.link.as_ref() {
            Some(link) if link.id == link_id => {}
            _ => return false,
        }
        slots.link = None;
        slots.state = ConnectionState::Disconnected;
        bump(&self.inner.stats.send_failures);
        warn!("overlay send failed: {error}; reconnecting");
        true
    }
}

impl MessageSink for ConnectionManager {
    fn deliver(&self, message: &OutboundMessage) {
        self.send(message);
    }

    fn is_ready(&self) -> bool {
        self.state() == ConnectionState::Connected
    }
}

impl ConnectionControl for ConnectionManager {
    fn connect(&self) {
        ConnectionManager::connect(self);
    }

    fn close(&self) {
        ConnectionManager::close(self);
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::infrastructure::network::mock::{MockConnector, ScriptedOutcome};
    use pointer_core::{Config, PointerState};

    fn manager(connector: &MockConnector) -> ConnectionManager {
        manager_with(connector, Config::default())
    }

    fn manager_with(connector: &MockConnector, config: Config) -> ConnectionManager {
        ConnectionManager::new(
            ConfigHolder::new(config),
            Arc::new(connector.clone()),
            RetryPolicy::default(),
            Handle::current(),
        )
    }

    fn mouse_at(x: i32, y: i32) -> OutboundMessage {
        OutboundMessage::mouse(&PointerState {
            x,
            y,
            ..PointerState::default()
        })
    }

    /// Lets spawned tasks run without advancing the paused clock.
    async fn settle() {
        for _ in 0..20 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_reaches_connected() {
        // Arrange
        let connector = MockConnector::accepting();
        let mgr = manager(&connector);

        // Act
        mgr.connect();
        settle().await;

        // Assert
        assert_eq!(mgr.state(), ConnectionState::Connected);
        assert_eq!(connector.attempts(), 1);
        assert_eq!(connector.urls(), vec![Config::default().endpoint_url]);
        assert!(!mgr.has_pending_retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_connect_is_noop_when_disabled() {
        let connector = MockConnector::accepting();
        let mgr = manager_with(
            &connector,
            Config {
                enabled: false,
                ..Config::default()
            },
        );

        mgr.connect();
        settle().await;

        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(connector.attempts(), 0);
        assert!(!mgr.is_desired());
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_attempt_schedules_exactly_one_retry_then_connects() {
        // Arrange – refuse once, then accept
        let connector = MockConnector::scripted(&[ScriptedOutcome::Refuse], ScriptedOutcome::Accept);
        let mgr = manager(&connector);

        // Act – first attempt fails
        mgr.connect();
        settle().await;

        // Assert – disconnected with one retry pending
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert!(mgr.has_pending_retry());
        assert_eq!(mgr.stats().retries_scheduled, 1);

        // Act – nothing happens before the retry delay elapses
        tokio::time::sleep(RETRY_DELAY - Duration::from_millis(1)).await;
        assert_eq!(connector.attempts(), 1);

        tokio::time::sleep(Duration::from_millis(2)).await;
        settle().await;

        // Assert
        assert_eq!(mgr.state(), ConnectionState::Connected);
        assert_eq!(connector.attempts(), 2);
        assert_eq!(connector.links().len(), 1, "no duplicate connections");
        let stats = mgr.stats();
        assert_eq!(stats.retries_scheduled, 1);
        assert_eq!(stats.connects, 1);
        assert!(!mgr.has_pending_retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_unreachable_peer_retries_at_fixed_cadence() {
        // Arrange
        let connector = MockConnector::refusing();
        let mgr = manager(&connector);

        // Act – three full retry periods
        mgr.connect();
        settle().await;
        for _ in 0..3 {
            tokio::time::sleep(RETRY_DELAY).await;
            settle().await;
        }

        // Assert – one attempt per period, never more than one retry pending
        assert_eq!(connector.attempts(), 4);
        assert_eq!(mgr.stats().retries_scheduled, 4);
        assert!(mgr.has_pending_retry());
    }

    #[tokio::test(start_paused = true)]
    async fn test_hanging_attempt_times_out_and_retries() {
        // Arrange
        let connector = MockConnector::scripted(&[ScriptedOutcome::Hang], ScriptedOutcome::Accept);
        let mgr = manager(&connector);

        // Act
        mgr.connect();
        settle().await;
        assert_eq!(mgr.state(), ConnectionState::Connecting);

        tokio::time::sleep(CONNECT_TIMEOUT).await;
        settle().await;

        // Assert – timed out, retry pending
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert!(mgr.has_pending_retry());

        tokio::time::sleep(RETRY_DELAY).await;
        settle().await;
        assert_eq!(mgr.state(), ConnectionState::Connected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_repeated_connect_does_not_open_second_link() {
        let connector = MockConnector::accepting();
        let mgr = manager(&connector);

        mgr.connect();
        mgr.connect();
        settle().await;
        mgr.connect();
        settle().await;

        assert_eq!(connector.attempts(), 1);
        assert_eq!(connector.open_links(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_disconnected_is_dropped() {
        // Arrange
        let connector = MockConnector::refusing();
        let mgr = manager(&connector);
        mgr.connect();
        settle().await;

        // Act
        mgr.send(&mouse_at(1, 2));

        // Assert
        assert_eq!(mgr.stats().frames_dropped, 1);
        assert!(connector.all_frames().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_sink_is_ready_only_while_connected() {
        // Arrange
        let connector = MockConnector::accepting();
        let mgr = manager(&connector);
        assert!(!mgr.is_ready());

        // Act
        mgr.connect();
        settle().await;
        let ready_when_connected = mgr.is_ready();
        mgr.close();

        // Assert
        assert!(ready_when_connected);
        assert!(!mgr.is_ready());
    }

    #[tokio::test(start_paused = true)]
    async fn test_send_while_connected_writes_frames_in_order() {
        // Arrange
        let connector = MockConnector::accepting();
        let mgr = manager(&connector);
        mgr.connect();
        settle().await;

        // Act
        mgr.send(&mouse_at(1, 1));
        mgr.send(&OutboundMessage::click("left", true, &PointerState::default()));
        mgr.send(&mouse_at(2, 2));
        settle().await;

        // Assert
        let frames = connector.all_frames();
        assert_eq!(frames.len(), 3);
        assert!(frames[0].contains("\"x\":1"));
        assert!(frames[1].starts_with("{\"type\":\"click\""));
        assert!(frames[2].contains("\"x\":2"));
        assert_eq!(mgr.stats().frames_written, 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_write_failure_disconnects_and_reconnects_immediately() {
        // Arrange
        let connector = MockConnector::accepting();
        let mgr = manager(&connector);
        mgr.connect();
        settle().await;
        let first = connector.last_link().expect("first link");

        // Act
        first.fail_writes();
        mgr.send(&mouse_at(5, 5));
        settle().await;

        // Assert – reconnected without waiting for the retry delay
        assert!(first.is_closed());
        assert_eq!(mgr.state(), ConnectionState::Connected);
        assert_eq!(connector.attempts(), 2);
        assert_eq!(connector.open_links(), 1);
        assert_eq!(mgr.stats().send_failures, 1);
        assert_eq!(mgr.stats().retries_scheduled, 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_cancels_pending_retry() {
        // Arrange
        let connector = MockConnector::refusing();
        let mgr = manager(&connector);
        mgr.connect();
        settle().await;
        assert!(mgr.has_pending_retry());

        // Act
        mgr.close();
        tokio::time::sleep(RETRY_DELAY * 3).await;
        settle().await;

        // Assert – the cancelled retry never fired
        assert!(!mgr.has_pending_retry());
        assert_eq!(connector.attempts(), 1);
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_closes_live_link_and_is_idempotent() {
        let connector = MockConnector::accepting();
        let mgr = manager(&connector);
        mgr.connect();
        settle().await;

        mgr.close();
        mgr.close();
        settle().await;

        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert!(!mgr.is_desired());
        assert_eq!(connector.open_links(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_attempt_in_flight_during_close_does_not_resurrect() {
        // Arrange – the first attempt hangs until the timeout
        let connector = MockConnector::scripted(&[ScriptedOutcome::Hang], ScriptedOutcome::Accept);
        let mgr = manager(&connector);
        mgr.connect();
        settle().await;

        // Act
        mgr.close();
        tokio::time::sleep(CONNECT_TIMEOUT + RETRY_DELAY * 2).await;
        settle().await;

        // Assert
        assert_eq!(mgr.state(), ConnectionState::Disconnected);
        assert_eq!(connector.attempts(), 1);
        assert!(connector.links().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_close_then_connect_opens_fresh_link() {
        let connector = MockConnector::accepting();
        let mgr = manager(&connector);

        mgr.connect();
        settle().await;
        mgr.close();
        mgr.connect();
        settle().await;

        assert_eq!(mgr.state(), ConnectionState::Connected);
        assert_eq!(connector.links().len(), 2);
        assert_eq!(connector.open_links(), 1);
    }

    #[test]
    fn test_default_policy_uses_five_second_timings() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.connect_timeout, Duration::from_secs(5));
        assert_eq!(policy.retry_delay, Duration::from_secs(5));
    }
}
