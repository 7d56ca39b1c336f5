//! Process state shared by the event loop: keyspace, command table, clock, config.

use std::net::SocketAddr;
use std::time::Duration;

use coral_common::clock::MonotonicClock;
use coral_common::config::ServerConfig;
use coral_common::error::CoralResult;
use coral_core::dispatch::CommandRegistry;
use coral_core::keyspace::KeyspaceStore;
use tracing::info;

use crate::network::ServerReactor;

/// Everything the reactor drives besides sockets.
#[derive(Debug)]
pub struct ServerApp {
    pub config: ServerConfig,
    pub store: KeyspaceStore,
    pub registry: CommandRegistry,
    pub clock: MonotonicClock,
}

impl ServerApp {
    #[must_use]
    pub fn new(config: ServerConfig) -> Self {
        let store = KeyspaceStore::new(
            config.large_set_threshold,
            config.normalized_reclaim_threads(),
        );
        Self {
            config,
            store,
            registry: CommandRegistry::with_builtin_commands(),
            clock: MonotonicClock::new(),
        }
    }

    /// Current monotonic time in milliseconds.
    #[must_use]
    pub fn now_ms(&self) -> u64 {
        self.clock.now_ms()
    }
}

/// Binds the listener and drives the reactor until a fatal error.
///
/// # Errors
///
/// Returns the first bind, registration, or poll error; per-connection I/O faults are
/// absorbed by dropping the connection and never reach here.
pub fn run(config: ServerConfig) -> CoralResult<()> {
    let bind_addr = SocketAddr::from(([0, 0, 0, 0], config.listen_port));
    let mut app = ServerApp::new(config);
    let mut reactor = ServerReactor::bind(bind_addr, &app.config)?;
    info!(port = app.config.listen_port, "coral-server listening");
    loop {
        let _ = reactor.poll_once(&mut app, Some(Duration::from_millis(10)))?;
    }
}
