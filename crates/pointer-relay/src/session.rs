//! RelaySession: one owned object wiring config, publisher, connection, and
//! lifecycle together.
//!
//! There is no global state: everything a running relay needs lives here and
//! is dropped with it.

use std::sync::Arc;

use pointer_core::{Config, ConfigHolder, ConnectionState};
use tokio::runtime::Handle;

use crate::application::lifecycle::{Availability, CaptureLifecycle, ConnectionControl};
use crate::application::publish_events::{EventPublisher, MessageSink};
use crate::infrastructure::input_capture::PointerSource;
use crate::infrastructure::network::{ConnectionManager, Connector, RetryPolicy, StatsSnapshot};

/// A fully wired relay.
pub struct RelaySession {
    pub config: ConfigHolder,
    pub publisher: Arc<EventPublisher>,
    pub connection: ConnectionManager,
    pub lifecycle: CaptureLifecycle,
}

impl RelaySession {
    /// Builds a session.  Nothing starts until [`on_load`](Self::on_load).
    ///
    /// Connection tasks are spawned on `runtime`.
    pub fn new(
        config: Config,
        policy: RetryPolicy,
        connector: Arc<dyn Connector>,
        source: Box<dyn PointerSource>,
        runtime: Handle,
    ) -> Self {
        let interval = config.publish_interval;
        let config = ConfigHolder::new(config);
        let connection = ConnectionManager::new(config.clone(), connector, policy, runtime);
        let publisher = Arc::new(EventPublisher::new(
            interval,
            Arc::new(connection.clone()) as Arc<dyn MessageSink>,
        ));
        let lifecycle = CaptureLifecycle::new(
            config.clone(),
            Arc::clone(&publisher),
            Arc::new(connection.clone()) as Arc<dyn ConnectionControl>,
            source,
        );
        Self {
            config,
            publisher,
            connection,
            lifecycle,
        }
    }

    pub fn on_load(&self) {
        self.lifecycle.on_load();
    }

    pub fn on_unload(&self) {
        self.lifecycle.on_unload();
    }

    pub fn on_config_changed(&self, config: Config) {
        self.lifecycle.on_config_changed(config);
    }

    /// Current overlay connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.connection.state()
    }

    pub fn stats(&self) -> StatsSnapshot {
        self.connection.stats()
    }

    pub fn availability(&self) -> Availability {
        self.lifecycle.availability()
    }
}
