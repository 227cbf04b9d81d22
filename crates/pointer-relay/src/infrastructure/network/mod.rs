//! Network infrastructure: the overlay connection.
//!
//! # Sub-modules
//!
//! - **`transport`** – The [`Connector`]/[`Transport`] seam and its WebSocket
//!   implementation.
//!
//! - **`connection_manager`** – Owns the single overlay connection: bounded
//!   connect attempts, a fixed-delay retry loop, and a per-link writer task
//!   that keeps `send` non-blocking.
//!
//! - **`mock`** – A scripted [`Connector`] for tests.

pub mod connection_manager;
pub mod mock;
pub mod transport;

pub use connection_manager::{ConnectionManager, RetryPolicy, StatsSnapshot};
pub use transport::{ConnectError, Connector, SendError, Transport, WsConnector};
