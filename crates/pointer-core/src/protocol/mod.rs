//! Overlay wire protocol: message types and the publish throttle.

pub mod messages;
pub mod throttle;

pub use messages::{ClickMessage, MouseMessage, OutboundMessage};
pub use throttle::IntervalGate;
