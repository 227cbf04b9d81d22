//! Connection lifecycle states shared by the relay and its status reporting.

use std::fmt;

/// Where the overlay connection currently stands.
///
/// Only [`Connected`](ConnectionState::Connected) lets frames through; in every
/// other state outgoing messages are dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub enum ConnectionState {
    #[default]
    Disconnected,
    Connecting,
    Connected,
}

impl ConnectionState {
    /// Returns `true` when writes should be attempted.
    pub fn accepts_writes(self) -> bool {
        self == ConnectionState::Connected
    }
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            ConnectionState::Disconnected => "disconnected",
            ConnectionState::Connecting => "connecting",
            ConnectionState::Connected => "connected",
        };
        f.write_str(label)
    }
}
