//! # pointer-core
//!
//! Shared library for pointer-relay containing the pointer domain model, the
//! overlay wire messages, and the publish throttle.
//!
//! This crate has zero dependencies on OS APIs, input backends, or network
//! sockets.
//!
//! # Architecture overview
//!
//! pointer-relay forwards mouse movement and button transitions from a capture
//! source to a broadcast overlay over a WebSocket.  This crate is the shared
//! foundation:
//!
//! - **`domain`** – The single live [`PointerState`], the recognized
//!   [`ButtonId`] set, and the runtime [`Config`] with its validated
//!   [`PublishInterval`].
//!
//! - **`protocol`** – The JSON text frames the overlay understands
//!   ([`OutboundMessage`]) and the [`IntervalGate`] that rate-limits
//!   continuous position updates.

pub mod domain;
pub mod protocol;

pub use domain::config::{Config, ConfigError, ConfigHolder, PublishInterval};
pub use domain::connection::ConnectionState;
pub use domain::pointer::{ButtonId, ButtonStates, PointerState, UnsupportedButton};
pub use protocol::messages::{ClickMessage, MouseMessage, OutboundMessage};
pub use protocol::throttle::IntervalGate;
