//! EventPublisher: turns capture callbacks into overlay frames.
//!
//! Two delivery policies share one publish primitive:
//!
//! - **Continuous** (`mouse`): admitted only when the sink is ready and the
//!   [`IntervalGate`] says at least one publish interval has passed since the
//!   last admission.  Rejected updates are discarded, never queued, and an
//!   update skipped for an unready sink does not consume a gate slot.
//! - **Discrete** (`click`): bypasses the gate and is handed to the sink
//!   immediately.
//!
//! All callback work runs under one mutex and messages are handed to the
//! [`MessageSink`] while it is held, so frames leave in the order the events
//! arrived even when several threads call in.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Instant;

use pointer_core::{IntervalGate, OutboundMessage, PointerState, PublishInterval};
use tracing::{debug, trace};

/// Destination for outbound frames.
///
/// Implementations must not block: this is called on the capture path.
/// Delivery is best-effort and never reports failure to the caller.
#[cfg_attr(test, mockall::automock)]
pub trait MessageSink: Send + Sync {
    /// Hands one message to the transport (or drops it).
    fn deliver(&self, message: &OutboundMessage);

    /// Returns `true` while delivered messages can actually reach the wire.
    fn is_ready(&self) -> bool;
}

struct PublisherState {
    pointer: PointerState,
    gate: IntervalGate,
}

/// Converts raw pointer callbacks into `mouse` and `click` frames.
pub struct EventPublisher {
    state: Mutex<PublisherState>,
    sink: Arc<dyn MessageSink>,
}

impl EventPublisher {
    /// Creates a publisher that throttles `mouse` frames to `interval` and
    /// delivers everything through `sink`.
    pub fn new(interval: PublishInterval, sink: Arc<dyn MessageSink>) -> Self {
        Self {
            state: Mutex::new(PublisherState {
                pointer: PointerState::new(),
                gate: IntervalGate::new(interval),
            }),
            sink,
        }
    }

    fn lock(&self) -> MutexGuard<'_, PublisherState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Handles a position update.
    pub fn on_move(&self, x: f64, y: f64) {
        self.on_move_at(x, y, Instant::now());
    }

    /// [`on_move`](Self::on_move) with an explicit clock reading.
    pub fn on_move_at(&self, x: f64, y: f64, now: Instant) {
        let mut state = self.lock();
        state.pointer.move_to(x, y);
        let message = OutboundMessage::mouse(&state.pointer);
        self.publish(&mut state, now, message);
    }

    /// Handles a button transition.
    ///
    /// Always sends one `click` frame, then tries a gated `mouse` frame so the
    /// overlay's position is resynchronized around the click.
    pub fn on_button(&self, x: f64, y: f64, button: &str, pressed: bool) {
        self.on_button_at(x, y, button, pressed, Instant::now());
    }

    /// [`on_button`](Self::on_button) with an explicit clock reading.
    pub fn on_button_at(&self, x: f64, y: f64, button: &str, pressed: bool, now: Instant) {
        let mut state = self.lock();
        state.pointer.move_to(x, y);
        if let Err(e) = state.pointer.apply_button(button, pressed) {
            debug!("{e}; button map unchanged");
        }

        let click = OutboundMessage::click(button, pressed, &state.pointer);
        self.publish(&mut state, now, click);
        let mouse = OutboundMessage::mouse(&state.pointer);
        self.publish(&mut state, now, mouse);
    }

    /// Delivers one message.  Continuous messages must first find the sink
    /// ready and then pass the gate; discrete ones always go through.
    ///
    /// Returns `true` when the message was handed to the sink.
    fn publish(&self, state: &mut PublisherState, now: Instant, message: OutboundMessage) -> bool {
        if message.is_continuous() {
            if !self.sink.is_ready() {
                trace!("position update skipped, sink not ready");
                return false;
            }
            if !state.gate.try_admit(now) {
                trace!("position update throttled");
                return false;
            }
        }
        self.sink.deliver(&message);
        true
    }

    /// Clears the gate and adopts `interval` for subsequent `mouse` frames.
    pub fn rearm(&self, interval: PublishInterval) {
        self.lock().gate.rearm(interval);
    }

    /// Forgets the pointer position, held buttons, and the last admission.
    pub fn reset(&self) {
        let mut state = self.lock();
        state.pointer = PointerState::new();
        state.gate.reset();
    }

    /// Copy of the current pointer state.
    pub fn pointer(&self) -> PointerState {
        self.lock().pointer
    }
}

// ── Tests ─────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use mockall::predicate::function;
    use pointer_core::{ButtonStates, ClickMessage, MouseMessage};
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    /// Records every delivered message in order.
    #[derive(Default)]
    struct RecordingSink {
        messages: Mutex<Vec<OutboundMessage>>,
        offline: AtomicBool,
    }

    impl RecordingSink {
        fn set_offline(&self, offline: bool) {
            self.offline.store(offline, Ordering::SeqCst);
        }

        fn messages(&self) -> Vec<OutboundMessage> {
            self.messages.lock().unwrap().clone()
        }

        fn count(&self, type_name: &str) -> usize {
            self.messages()
                .iter()
                .filter(|m| m.type_name() == type_name)
                .count()
        }
    }

    impl MessageSink for RecordingSink {
        fn deliver(&self, message: &OutboundMessage) {
            self.messages.lock().unwrap().push(message.clone());
        }

        fn is_ready(&self) -> bool {
            !self.offline.load(Ordering::SeqCst)
        }
    }

    fn make_publisher(interval_ms: u32) -> (EventPublisher, Arc<RecordingSink>) {
        let sink = Arc::new(RecordingSink::default());
        let publisher = EventPublisher::new(
            PublishInterval::from_millis(interval_ms).unwrap(),
            Arc::clone(&sink) as Arc<dyn MessageSink>,
        );
        (publisher, sink)
    }

    fn ms(n: u64) -> Duration {
        Duration::from_millis(n)
    }

    // ── Continuous channel ────────────────────────────────────────────────────

    #[test]
    fn test_second_move_within_interval_is_throttled() {
        // Arrange
        let (publisher, sink) = make_publisher(16);
        let t0 = Instant::now();

        // Act
        publisher.on_move_at(100.0, 200.0, t0);
        publisher.on_move_at(105.0, 205.0, t0 + ms(5));

        // Assert – only the first is sent, but state tracks the latest
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(
            messages[0],
            OutboundMessage::Mouse(MouseMessage {
                x: 100,
                y: 200,
                buttons: ButtonStates::default(),
            })
        );
        assert_eq!((publisher.pointer().x, publisher.pointer().y), (105, 205));
    }

    #[test]
    fn test_move_exactly_one_interval_later_is_sent() {
        let (publisher, sink) = make_publisher(16);
        let t0 = Instant::now();

        publisher.on_move_at(1.0, 1.0, t0);
        publisher.on_move_at(2.0, 2.0, t0 + ms(16));

        assert_eq!(sink.count("mouse"), 2);
    }

    #[test]
    fn test_dense_move_stream_is_bounded_by_elapsed_over_interval() {
        // Arrange – one update every 4 ms for 636 ms at a 16 ms interval
        let (publisher, sink) = make_publisher(16);
        let t0 = Instant::now();

        // Act
        for i in 0..160u64 {
            publisher.on_move_at(i as f64, 0.0, t0 + ms(i * 4));
        }

        // Assert – ⌈636 / 16⌉ = 40, allow ±1
        let sent = sink.count("mouse");
        assert!((39..=41).contains(&sent), "sent {sent} mouse frames");
    }

    #[test]
    fn test_irregular_stream_never_exceeds_bound() {
        // Arrange – 3 ms spacing does not divide the interval
        let (publisher, sink) = make_publisher(16);
        let t0 = Instant::now();

        // Act – last update at 477 ms
        for i in 0..160u64 {
            publisher.on_move_at(0.0, i as f64, t0 + ms(i * 3));
        }

        // Assert – ⌈477 / 16⌉ + 1 = 31
        assert!(sink.count("mouse") <= 31);
    }

    #[test]
    fn test_fractional_coordinates_truncate() {
        let (publisher, sink) = make_publisher(16);

        publisher.on_move_at(10.9, -3.7, Instant::now());

        match &sink.messages()[0] {
            OutboundMessage::Mouse(m) => assert_eq!((m.x, m.y), (10, -3)),
            other => panic!("expected mouse frame, got {other:?}"),
        }
    }

    #[test]
    fn test_moves_while_sink_not_ready_leave_gate_open() {
        // Arrange
        let (publisher, sink) = make_publisher(100);
        let t0 = Instant::now();
        sink.set_offline(true);
        publisher.on_move_at(1.0, 1.0, t0);

        // Act – the sink comes back within the same interval
        sink.set_offline(false);
        publisher.on_move_at(2.0, 2.0, t0 + ms(10));

        // Assert – the first frame after reconnecting is not held back
        let messages = sink.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0], OutboundMessage::mouse(&publisher.pointer()));
    }

    #[test]
    fn test_click_is_delivered_while_sink_not_ready() {
        let (publisher, sink) = make_publisher(16);
        sink.set_offline(true);

        publisher.on_button_at(5.0, 6.0, "left", true, Instant::now());

        // The sink decides what to do with it; the mouse frame is skipped.
        assert_eq!(sink.count("click"), 1);
        assert_eq!(sink.count("mouse"), 0);
        assert!(publisher.pointer().buttons.left);
    }

    // ── Discrete channel ──────────────────────────────────────────────────────

    #[test]
    fn test_button_sends_click_then_mouse_with_updated_state() {
        // Arrange
        let (publisher, sink) = make_publisher(16);

        // Act
        publisher.on_button_at(50.0, 60.0, "left", true, Instant::now());

        // Assert
        let messages = sink.messages();
        assert_eq!(messages.len(), 2);
        assert_eq!(
            messages[0],
            OutboundMessage::Click(ClickMessage {
                button: "left".to_string(),
                pressed: true,
                x: 50,
                y: 60,
            })
        );
        match &messages[1] {
            OutboundMessage::Mouse(m) => {
                assert!(m.buttons.left);
                assert_eq!((m.x, m.y), (50, 60));
            }
            other => panic!("expected mouse frame, got {other:?}"),
        }
    }

    #[test]
    fn test_every_button_event_produces_exactly_one_click_despite_throttle() {
        // Arrange
        let (publisher, sink) = make_publisher(100);
        let t0 = Instant::now();
        publisher.on_move_at(0.0, 0.0, t0);

        // Act – six transitions within one interval
        for (i, pressed) in [true, false, true, false, true, false].iter().enumerate() {
            publisher.on_button_at(0.0, 0.0, "right", *pressed, t0 + ms(i as u64));
        }

        // Assert
        let clicks: Vec<bool> = sink
            .messages()
            .iter()
            .filter_map(|m| match m {
                OutboundMessage::Click(c) => Some(c.pressed),
                _ => None,
            })
            .collect();
        assert_eq!(clicks, vec![true, false, true, false, true, false]);
        assert_eq!(sink.count("mouse"), 1, "gated mouse frames stay throttled");
    }

    #[test]
    fn test_click_precedes_following_mouse_frame() {
        let (publisher, sink) = make_publisher(16);
        let t0 = Instant::now();

        publisher.on_move_at(1.0, 1.0, t0);
        publisher.on_button_at(2.0, 2.0, "middle", true, t0 + ms(20));
        publisher.on_move_at(3.0, 3.0, t0 + ms(40));

        let types: Vec<&str> = sink.messages().iter().map(|m| m.type_name()).collect();
        assert_eq!(types, vec!["mouse", "click", "mouse", "mouse"]);
    }

    #[test]
    fn test_unsupported_button_sends_click_without_touching_state() {
        // Arrange
        let (publisher, sink) = make_publisher(16);

        // Act
        publisher.on_button_at(5.0, 5.0, "x1", true, Instant::now());

        // Assert
        assert_eq!(publisher.pointer().buttons, ButtonStates::default());
        match &sink.messages()[0] {
            OutboundMessage::Click(c) => assert_eq!(c.button, "x1"),
            other => panic!("expected click frame, got {other:?}"),
        }
    }

    #[test]
    fn test_button_release_clears_state() {
        let (publisher, _sink) = make_publisher(16);
        let t0 = Instant::now();

        publisher.on_button_at(0.0, 0.0, "left", true, t0);
        publisher.on_button_at(0.0, 0.0, "left", false, t0 + ms(1));

        assert!(!publisher.pointer().buttons.left);
    }

    // ── Lifecycle helpers ─────────────────────────────────────────────────────

    #[test]
    fn test_reset_clears_pointer_and_gate() {
        // Arrange
        let (publisher, sink) = make_publisher(100);
        let t0 = Instant::now();
        publisher.on_button_at(10.0, 10.0, "left", true, t0);

        // Act
        publisher.reset();
        publisher.on_move_at(20.0, 20.0, t0 + ms(1));

        // Assert – gate reopened and the button map is back to released
        assert_eq!(sink.count("mouse"), 2);
        assert!(!publisher.pointer().buttons.left);
    }

    #[test]
    fn test_rearm_adopts_new_interval() {
        let (publisher, sink) = make_publisher(100);
        let t0 = Instant::now();
        publisher.on_move_at(0.0, 0.0, t0);

        publisher.rearm(PublishInterval::from_millis(8).unwrap());
        publisher.on_move_at(1.0, 0.0, t0 + ms(1));
        publisher.on_move_at(2.0, 0.0, t0 + ms(9));

        assert_eq!(sink.count("mouse"), 3);
    }

    #[test]
    fn test_mock_sink_receives_exactly_one_click() {
        // Arrange
        let mut sink = MockMessageSink::new();
        sink.expect_is_ready().return_const(true);
        sink.expect_deliver()
            .with(function(|m: &OutboundMessage| m.type_name() == "click"))
            .times(1)
            .return_const(());
        sink.expect_deliver()
            .with(function(|m: &OutboundMessage| m.type_name() == "mouse"))
            .times(1)
            .return_const(());
        let publisher = EventPublisher::new(PublishInterval::default(), Arc::new(sink));

        // Act / Assert – expectations are verified on drop
        publisher.on_button_at(1.0, 2.0, "left", false, Instant::now());
    }
}
