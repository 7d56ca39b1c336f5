//! Runtime configuration used by server bootstrap code.

/// Process-wide configuration consumed by the reactor and the keyspace.
///
/// The defaults carry the limits the store is specified against: a 32 MiB frame ceiling,
/// a 200k argument ceiling, and a five-minute idle timeout.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerConfig {
    /// TCP port the listener binds on.
    pub listen_port: u16,
    /// Largest accepted request/response frame payload in bytes.
    pub max_frame_bytes: usize,
    /// Largest accepted argument count in one request.
    pub max_args: usize,
    /// Connections idle longer than this are evicted.
    pub idle_timeout_ms: u64,
    /// Upper bound of keys expired per event-loop iteration.
    pub expire_budget_per_tick: usize,
    /// Sorted sets larger than this are destroyed off the event-loop thread.
    pub large_set_threshold: usize,
    /// Worker threads in the deferred-destruction pool.
    ///
    /// A value of `0` is clamped to one worker.
    pub reclaim_threads: usize,
    /// Readiness event buffer capacity.
    pub max_events: usize,
    /// Hard cap on one connection's pending output before the connection is dropped.
    pub max_outgoing_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_port: 1234,
            max_frame_bytes: 32 << 20,
            max_args: 200 * 1000,
            idle_timeout_ms: 300 * 1000,
            expire_budget_per_tick: 2000,
            large_set_threshold: 1000,
            reclaim_threads: 4,
            max_events: 256,
            max_outgoing_bytes: 64 << 20,
        }
    }
}

impl ServerConfig {
    /// Returns the reclaimer pool size, clamped to at least one worker.
    #[must_use]
    pub fn normalized_reclaim_threads(&self) -> usize {
        self.reclaim_threads.max(1)
    }

    /// Returns the readiness event capacity, clamped to a usable minimum.
    #[must_use]
    pub fn normalized_max_events(&self) -> usize {
        self.max_events.max(64)
    }
}
