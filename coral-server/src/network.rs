//! Reactor-style network event loop for the length-prefixed binary protocol.
//!
//! One `mio::Poll` instance owns the listener and every accepted connection. Each readiness
//! cycle also runs the timer work: idle-connection eviction (oldest first, via the intrusive
//! idle list) and budgeted TTL expiry, with the poll timeout bounded by the nearest deadline
//! so timers fire without busy-waiting.

use std::collections::HashMap;
use std::io::{Read, Write};
use std::net::SocketAddr;
use std::time::Duration;

use coral_common::config::ServerConfig;
use coral_common::error::{CoralError, CoralResult};
use mio::net::{TcpListener, TcpStream};
use mio::{Events, Interest, Poll, Token};
use tracing::debug;

use crate::app::ServerApp;
use crate::ingress::drain_frames;

mod idle;
#[cfg(test)]
mod tests;

use idle::{IdleLinks, IdleList, IdleNode};

const LISTENER_TOKEN: Token = Token(0);
const CONNECTION_TOKEN_START: usize = 1;
const READ_CHUNK_BYTES: usize = 64 * 1024;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ConnectionLifecycle {
    Active,
    Draining,
    Closing,
}

#[derive(Debug)]
struct ReactorConnection {
    socket: TcpStream,
    incoming: Vec<u8>,
    outgoing: Vec<u8>,
    lifecycle: ConnectionLifecycle,
    interest: Interest,
    last_active_ms: u64,
    idle: IdleLinks<Token>,
}

impl ReactorConnection {
    fn new(socket: TcpStream, now_ms: u64) -> Self {
        Self {
            socket,
            incoming: Vec::new(),
            outgoing: Vec::new(),
            lifecycle: ConnectionLifecycle::Active,
            interest: Interest::READABLE,
            last_active_ms: now_ms,
            idle: IdleLinks::default(),
        }
    }

    fn on_peer_closed_or_error(&mut self) {
        if self.lifecycle == ConnectionLifecycle::Active {
            self.lifecycle = ConnectionLifecycle::Draining;
        }
    }

    fn mark_draining(&mut self) {
        if self.lifecycle == ConnectionLifecycle::Active {
            self.lifecycle = ConnectionLifecycle::Draining;
        }
    }

    fn mark_closing(&mut self) {
        self.lifecycle = ConnectionLifecycle::Closing;
    }

    fn can_read(&self) -> bool {
        // Reads stay paused while replies are pending; flushing re-enables them.
        self.lifecycle == ConnectionLifecycle::Active && self.outgoing.is_empty()
    }

    fn should_try_flush(&self) -> bool {
        !self.outgoing.is_empty()
    }

    fn should_close_now(&self) -> bool {
        self.lifecycle == ConnectionLifecycle::Closing
            || (self.lifecycle == ConnectionLifecycle::Draining && self.outgoing.is_empty())
    }
}

impl IdleNode<Token> for ReactorConnection {
    fn idle_links(&self) -> &IdleLinks<Token> {
        &self.idle
    }

    fn idle_links_mut(&mut self) -> &mut IdleLinks<Token> {
        &mut self.idle
    }
}

/// One reactor instance owning the listener and all accepted connections.
#[derive(Debug)]
pub struct ServerReactor {
    poll: Poll,
    events: Events,
    listener: TcpListener,
    next_token: usize,
    connections: HashMap<Token, ReactorConnection>,
    idle: IdleList<Token>,
}

impl ServerReactor {
    /// Binds the listener and registers it in the reactor poller.
    ///
    /// # Errors
    ///
    /// Returns `CoralError::Io` if the bind or poll registration fails.
    pub fn bind(addr: SocketAddr, config: &ServerConfig) -> CoralResult<Self> {
        let poll =
            Poll::new().map_err(|error| CoralError::Io(format!("create poll failed: {error}")))?;
        let mut listener = TcpListener::bind(addr)
            .map_err(|error| CoralError::Io(format!("bind listener failed: {error}")))?;
        poll.registry()
            .register(&mut listener, LISTENER_TOKEN, Interest::READABLE)
            .map_err(|error| {
                CoralError::Io(format!("register listener in poll failed: {error}"))
            })?;
        Ok(Self {
            poll,
            events: Events::with_capacity(config.normalized_max_events()),
            listener,
            next_token: CONNECTION_TOKEN_START,
            connections: HashMap::new(),
            idle: IdleList::new(),
        })
    }

    /// Processes one readiness cycle plus the timer work that came due.
    ///
    /// The wait is bounded by the nearest idle or TTL deadline, so a quiet process still
    /// wakes up in time to evict and expire.
    ///
    /// # Errors
    ///
    /// Returns `CoralError::Io` if polling or socket registration fails; faults on an
    /// individual connection only drop that connection.
    pub fn poll_once(
        &mut self,
        app: &mut ServerApp,
        timeout: Option<Duration>,
    ) -> CoralResult<usize> {
        let timeout = self.timer_bounded_timeout(app, timeout);
        match self.poll.poll(&mut self.events, timeout) {
            Ok(()) => {}
            Err(error) if error.kind() == std::io::ErrorKind::Interrupted => self.events.clear(),
            Err(error) => return Err(CoralError::Io(format!("poll wait failed: {error}"))),
        }
        let ready_events: Vec<(Token, bool, bool, bool)> = self
            .events
            .iter()
            .map(|event| {
                (
                    event.token(),
                    event.is_readable(),
                    event.is_writable(),
                    event.is_read_closed() || event.is_write_closed() || event.is_error(),
                )
            })
            .collect();

        for &(token, readable, writable, closed_or_error) in &ready_events {
            if token == LISTENER_TOKEN {
                self.accept_new_connections(app)?;
                continue;
            }
            self.handle_connection_event(app, token, readable, writable, closed_or_error)?;
        }

        self.process_timers(app)?;
        Ok(ready_events.len())
    }

    #[cfg(test)]
    fn local_addr(&self) -> CoralResult<SocketAddr> {
        self.listener
            .local_addr()
            .map_err(|error| CoralError::Io(format!("query local address failed: {error}")))
    }

    #[cfg(test)]
    fn connection_count(&self) -> usize {
        self.connections.len()
    }

    /// Shrinks the caller's wait to the nearest idle or TTL deadline.
    fn timer_bounded_timeout(
        &self,
        app: &ServerApp,
        timeout: Option<Duration>,
    ) -> Option<Duration> {
        let now_ms = app.clock.now_ms();
        let mut deadline: Option<u64> = None;
        if let Some(token) = self.idle.front() {
            if let Some(connection) = self.connections.get(&token) {
                deadline = Some(
                    connection
                        .last_active_ms
                        .saturating_add(app.config.idle_timeout_ms),
                );
            }
        }
        if let Some(expiry) = app.store.next_expiry_ms() {
            deadline = Some(deadline.map_or(expiry, |current| current.min(expiry)));
        }
        let timer_wait = deadline.map(|at| Duration::from_millis(at.saturating_sub(now_ms)));
        match (timeout, timer_wait) {
            (Some(wait), Some(timer)) => Some(wait.min(timer)),
            (wait, timer) => wait.or(timer),
        }
    }

    fn accept_new_connections(&mut self, app: &ServerApp) -> CoralResult<()> {
        loop {
            match self.listener.accept() {
                Ok((mut socket, peer)) => {
                    let token = self.allocate_connection_token();
                    self.poll
                        .registry()
                        .register(&mut socket, token, Interest::READABLE)
                        .map_err(|error| {
                            CoralError::Io(format!(
                                "register accepted connection in poll failed: {error}"
                            ))
                        })?;
                    let _ = socket.set_nodelay(true);
                    let _ = self
                        .connections
                        .insert(token, ReactorConnection::new(socket, app.clock.now_ms()));
                    self.idle.push_back(token, &mut self.connections);
                    debug!(token = token.0, %peer, "accepted connection");
                }
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => return Ok(()),
                Err(error) => {
                    return Err(CoralError::Io(format!("accept connection failed: {error}")));
                }
            }
        }
    }

    fn handle_connection_event(
        &mut self,
        app: &mut ServerApp,
        token: Token,
        readable: bool,
        writable: bool,
        closed_or_error: bool,
    ) -> CoralResult<()> {
        self.idle.detach(token, &mut self.connections);
        let Some(mut connection) = self.connections.remove(&token) else {
            return Ok(());
        };

        // Read before acting on a close flag: a peer may send a full request and then
        // shut down its write side, and that request still deserves a reply.
        if readable && connection.can_read() {
            Self::read_connection_bytes(app, &mut connection);
        }
        if closed_or_error {
            connection.on_peer_closed_or_error();
        }
        if (writable || readable) && connection.should_try_flush() {
            Self::flush_connection_writes(&mut connection);
        }
        if connection.outgoing.len() > app.config.max_outgoing_bytes {
            // A reader this slow would pin the whole reply backlog in memory.
            connection.mark_closing();
        }

        if connection.should_close_now() {
            self.close_connection(token, connection)?;
            return Ok(());
        }

        connection.last_active_ms = app.clock.now_ms();
        self.refresh_connection_interest(token, &mut connection)?;
        let _ = self.connections.insert(token, connection);
        self.idle.push_back(token, &mut self.connections);
        Ok(())
    }

    fn read_connection_bytes(app: &mut ServerApp, connection: &mut ReactorConnection) {
        let mut chunk = [0_u8; READ_CHUNK_BYTES];
        loop {
            match connection.socket.read(&mut chunk) {
                Ok(0) => {
                    if !connection.incoming.is_empty() {
                        debug!("peer closed mid-frame with buffered request bytes");
                    }
                    connection.mark_draining();
                    return;
                }
                Ok(read_len) => {
                    connection.incoming.extend_from_slice(&chunk[..read_len]);
                    match drain_frames(app, &mut connection.incoming, &mut connection.outgoing) {
                        Ok(_served) => {
                            if connection.should_try_flush() {
                                // Pending replies pause the read side; remaining input stays
                                // in kernel buffers until the flush completes.
                                return;
                            }
                        }
                        Err(error) => {
                            debug!("dropping connection on protocol error: {error}");
                            connection.mark_closing();
                            return;
                        }
                    }
                }
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => return,
                Err(_error) => {
                    connection.mark_closing();
                    return;
                }
            }
        }
    }

    fn flush_connection_writes(connection: &mut ReactorConnection) {
        while !connection.outgoing.is_empty() {
            match connection.socket.write(connection.outgoing.as_slice()) {
                Ok(0) => {
                    connection.mark_closing();
                    return;
                }
                Ok(written) => {
                    let _ = connection.outgoing.drain(..written);
                }
                Err(error) if error.kind() == std::io::ErrorKind::WouldBlock => return,
                Err(_error) => {
                    connection.mark_closing();
                    return;
                }
            }
        }
    }

    fn refresh_connection_interest(
        &self,
        token: Token,
        connection: &mut ReactorConnection,
    ) -> CoralResult<()> {
        let mut next_interest = if connection.can_read() {
            Interest::READABLE
        } else {
            Interest::WRITABLE
        };
        if !connection.outgoing.is_empty() {
            next_interest |= Interest::WRITABLE;
        }
        if next_interest == connection.interest {
            return Ok(());
        }

        self.poll
            .registry()
            .reregister(&mut connection.socket, token, next_interest)
            .map_err(|error| {
                CoralError::Io(format!("refresh connection poll interest failed: {error}"))
            })?;
        connection.interest = next_interest;
        Ok(())
    }

    /// Evicts idle connections past the timeout, then runs one budgeted expiry sweep.
    fn process_timers(&mut self, app: &mut ServerApp) -> CoralResult<()> {
        let now_ms = app.clock.now_ms();
        while let Some(token) = self.idle.front() {
            let Some(connection) = self.connections.get(&token) else {
                break;
            };
            if now_ms.saturating_sub(connection.last_active_ms) < app.config.idle_timeout_ms {
                break;
            }
            self.idle.detach(token, &mut self.connections);
            if let Some(connection) = self.connections.remove(&token) {
                debug!(token = token.0, "evicting idle connection");
                self.close_connection(token, connection)?;
            }
        }
        let _ = app
            .store
            .expire_due(now_ms, app.config.expire_budget_per_tick);
        Ok(())
    }

    fn close_connection(&self, token: Token, mut connection: ReactorConnection) -> CoralResult<()> {
        self.poll
            .registry()
            .deregister(&mut connection.socket)
            .map_err(|error| {
                CoralError::Io(format!(
                    "deregister closed connection {} failed: {error}",
                    token.0
                ))
            })?;
        debug!(token = token.0, "closed connection");
        Ok(())
    }

    fn allocate_connection_token(&mut self) -> Token {
        let token = Token(self.next_token);
        self.next_token = self.next_token.saturating_add(1);
        token
    }
}
