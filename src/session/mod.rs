//! `Session`: the per-connection state machine (spec.md Section 4.7, the
//! system's "heart", component C7).
//!
//! Grounded on `boltr::server::connection::Connection`'s message loop
//! shape and `boltr::server::state_machine::ConnectionState`'s
//! enum-with-transitions style, but driving spec.md's read → dispatch →
//! write cycle instead of Bolt's handshake states. The "strand" the
//! source pins a session to (Section 9's "Per-session strand" note) is
//! modeled here as: the `Session` owns its `Connection`, write queue, and
//! read buffer exclusively inside the one task `run()` is spawned onto;
//! every external interaction — including the handler chain's own
//! `context.send`/`context.recv` calls during dispatch — goes through the
//! `Context`'s command channel into that task, never touching state
//! directly.

pub mod context;
pub mod queue;
pub mod state;
pub mod timer;

pub use context::{Context, OutMessage};

use std::net::SocketAddr;
use std::sync::atomic::Ordering;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::mpsc;

use crate::connection::{Connection, Shutdown};
use crate::error::RouteError;
use crate::message::codec::{CodecError, Decoded};
use crate::message::{Request, Response};
use crate::routing::RoutingTable;
use context::Command;
use queue::WriteQueue;
use state::SessionState;

/// Invoked for every non-end-of-stream failure: I/O errors, timeouts, and
/// parse errors (spec.md Section 6's "error sink"). Receives the peer
/// address as the "context string" the spec calls for.
pub type ErrorSink = Arc<dyn Fn(&RouteError, Option<SocketAddr>) + Send + Sync>;

const READ_CHUNK: usize = 8 * 1024;

/// Extracts a human-readable message from a caught panic payload, falling
/// back to a generic message for payloads that aren't `&str`/`String` (the
/// two types `panic!`/`.unwrap()` actually produce).
fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "handler panicked".to_string()
    }
}

/// The per-connection state machine. Generic over the message type it
/// reads (`Request` for the server role, `Response` for the client role),
/// since both roles share every other piece of the read/dispatch/write
/// cycle — only the decoder and dispatch function differ, and those are
/// supplied as plain function pointers at construction.
pub struct Session<M> {
    connection: Box<dyn Connection>,
    table: Arc<RwLock<RoutingTable<M>>>,
    decode: fn(&[u8]) -> Result<Decoded<M>, CodecError>,
    dispatch: fn(&RoutingTable<M>, &M, &Context) -> bool,
    read_buf: BytesMut,
    queue: WriteQueue,
    state: SessionState,
    open: Arc<std::sync::atomic::AtomicBool>,
    commands: mpsc::UnboundedReceiver<Command>,
    command_tx: mpsc::UnboundedSender<Command>,
    peer_addr: Option<SocketAddr>,
    error_sink: Option<ErrorSink>,
}

impl<M: Send + 'static> Session<M> {
    fn new(
        connection: Box<dyn Connection>,
        table: Arc<RwLock<RoutingTable<M>>>,
        decode: fn(&[u8]) -> Result<Decoded<M>, CodecError>,
        dispatch: fn(&RoutingTable<M>, &M, &Context) -> bool,
        error_sink: Option<ErrorSink>,
    ) -> (Self, Context) {
        let peer_addr = connection.peer_addr();
        let open = Arc::new(std::sync::atomic::AtomicBool::new(true));
        let (command_tx, commands) = mpsc::unbounded_channel();
        let ctx = Context::new(command_tx.clone(), open.clone(), peer_addr);
        let session = Self {
            connection,
            table,
            decode,
            dispatch,
            read_buf: BytesMut::with_capacity(READ_CHUNK),
            queue: WriteQueue::new(),
            state: SessionState::Idle,
            open,
            commands,
            command_tx,
            peer_addr,
            error_sink,
        };
        (session, ctx)
    }

    fn report(&self, err: &RouteError) {
        // A clean peer close surfaces as `Ok(None)` from `read_one`, not as
        // an error here — every `RouteError` that reaches `report` is a
        // genuine failure.
        tracing::warn!(peer = ?self.peer_addr, error = %err, "session error");
        if let Some(sink) = &self.error_sink {
            sink(err, self.peer_addr);
        }
    }

    fn do_shutdown(&mut self) {
        if !self.open.load(Ordering::Acquire) {
            return;
        }
        let _ = self.connection.shutdown(Shutdown::Both);
        self.open.store(false, Ordering::Release);
        self.state = SessionState::Closed;
        tracing::debug!(peer = ?self.peer_addr, "session closed");
    }

    /// Reads until one complete message is decoded, or the deadline
    /// elapses, or the peer closes cleanly (`Ok(false)`).
    async fn read_one(&mut self, deadline: Option<Duration>) -> Result<Option<M>, RouteError> {
        loop {
            match (self.decode)(&self.read_buf) {
                Ok(Decoded::Complete(msg, used)) => {
                    let _ = self.read_buf.split_to(used);
                    return Ok(Some(msg));
                }
                Ok(Decoded::Partial) => {}
                Err(e) => return Err(RouteError::Parse(e.to_string())),
            }

            let mut chunk = [0u8; READ_CHUNK];
            let n = timer::guard(deadline, async {
                self.connection.read(&mut chunk).await
            })
            .await?;
            if n == 0 {
                return Ok(None);
            }
            self.read_buf.extend_from_slice(&chunk[..n]);
        }
    }

    /// Runs a single dispatch synchronously (spec.md: "Dispatch is
    /// synchronous on-strand"), then drains every command the handler
    /// chain just posted — re-entrant `recv()` calls are forwarded back
    /// onto the channel so the outer loop picks them up next.
    async fn dispatch_and_drain(&mut self, msg: M) -> Result<(), RouteError> {
        self.state = SessionState::Dispatching;
        let ctx = Context::new(self.command_tx.clone(), self.open.clone(), self.peer_addr);
        {
            let table = self.table.read().unwrap();
            let dispatch = self.dispatch;
            let outcome = std::panic::catch_unwind(std::panic::AssertUnwindSafe(|| dispatch(&table, &msg, &ctx)));
            if let Err(payload) = outcome {
                return Err(RouteError::handler(panic_message(&payload)));
            }
        }
        while let Ok(command) = self.commands.try_recv() {
            match command {
                Command::Send { message, deadline } => {
                    let is_first = self.queue.enqueue(message, deadline);
                    if is_first {
                        self.drain_writes().await?;
                    }
                }
                Command::Recv { deadline } => {
                    let _ = self.command_tx.send(Command::Recv { deadline });
                }
                Command::Shutdown => self.do_shutdown(),
            }
        }
        Ok(())
    }

    /// Writes the queue front-to-back, one write in flight at a time
    /// (spec.md invariant 2). Stops and shuts down as soon as a written
    /// message reports `need_eof`.
    async fn drain_writes(&mut self) -> Result<(), RouteError> {
        loop {
            let (buf, need_eof, deadline) = match self.queue.front() {
                Some((message, deadline)) => {
                    self.state = SessionState::Writing;
                    let mut buf = BytesMut::new();
                    message.encode(&mut buf);
                    (buf, message.need_eof(), *deadline)
                }
                None => break,
            };
            timer::guard(deadline, async { self.connection.write(&buf).await }).await?;
            let more_pending = self.queue.on_write_complete();
            if need_eof {
                self.do_shutdown();
                return Ok(());
            }
            if !more_pending {
                break;
            }
        }
        self.state = SessionState::Idle;
        Ok(())
    }

    /// The session's main loop: waits for the next command (an initial
    /// `recv`/`send` posted at construction, a handler's own scheduling
    /// call, or an external caller's), drives it to completion, and
    /// repeats until shutdown.
    async fn run(mut self) {
        loop {
            let command = match self.commands.recv().await {
                Some(c) => c,
                None => break,
            };
            match command {
                Command::Shutdown => {
                    self.do_shutdown();
                    break;
                }
                Command::Recv { deadline } => {
                    self.state = SessionState::Reading;
                    match self.read_one(deadline).await {
                        Ok(Some(msg)) => {
                            if let Err(e) = self.dispatch_and_drain(msg).await {
                                self.report(&e);
                                self.do_shutdown();
                                break;
                            }
                        }
                        Ok(None) => {
                            self.do_shutdown();
                            break;
                        }
                        Err(e) => {
                            self.report(&e);
                            self.do_shutdown();
                            break;
                        }
                    }
                }
                Command::Send { message, deadline } => {
                    let is_first = self.queue.enqueue(message, deadline);
                    if is_first {
                        if let Err(e) = self.drain_writes().await {
                            self.report(&e);
                            self.do_shutdown();
                            break;
                        }
                    }
                }
            }
            if !self.connection.is_open() {
                break;
            }
        }
    }
}

impl Session<Request> {
    /// Builds a server-role session around an accepted connection and
    /// immediately arms its first read, without spawning the task that
    /// drives it. Used by [`crate::server::Server::serve`], which spawns
    /// `run()` itself so it can hold a `max_connections` permit for the
    /// session's whole lifetime instead of just its construction — see
    /// DESIGN.md.
    pub(crate) fn prepare_server(
        connection: Box<dyn Connection>,
        table: Arc<RwLock<RoutingTable<Request>>>,
        deadline: Option<Duration>,
        error_sink: Option<ErrorSink>,
    ) -> (Self, Context) {
        use crate::routing::dispatch_request;

        let (session, ctx) = Self::new(connection, table, crate::message::codec::decode_request, dispatch_request, error_sink);
        ctx.recv_maybe_after(deadline);
        (session, ctx)
    }

    /// Builds a server-role session and spawns the task that drives it to
    /// completion, returning the `Context` the caller (or the dispatcher,
    /// for subsequent cycles) uses to drive it. Mirrors spec.md's
    /// `Session::recv(socket, router, [duration], [on_error]) → Context`
    /// external interface. Callers that need to hold a resource for the
    /// session's whole lifetime (as `Server::serve` does for
    /// `max_connections`) should use [`Self::prepare_server`] and spawn
    /// `run()` themselves instead.
    pub fn spawn_server(
        connection: Box<dyn Connection>,
        table: Arc<RwLock<RoutingTable<Request>>>,
        deadline: Option<Duration>,
        error_sink: Option<ErrorSink>,
    ) -> Context {
        let (session, ctx) = Self::prepare_server(connection, table, deadline, error_sink);
        tokio::spawn(session.run());
        ctx
    }
}

#[cfg(feature = "client")]
impl Session<Response> {
    /// Spawns a client-role session around a connected socket, sends
    /// `request` immediately, and returns the `Context` whose not-found
    /// chain receives the eventual response. Mirrors spec.md's
    /// `Session::send(socket, request, router, [duration], [on_error]) →
    /// Context` external interface.
    pub fn spawn_client(
        connection: Box<dyn Connection>,
        request: Request,
        table: Arc<RwLock<RoutingTable<Response>>>,
        deadline: Option<Duration>,
        error_sink: Option<ErrorSink>,
    ) -> Context {
        use crate::routing::dispatch_fallback;

        let (session, ctx) = Self::new(connection, table, crate::message::codec::decode_response, dispatch_fallback, error_sink);
        ctx.send_maybe_after(request, deadline);
        tokio::spawn(session.run());
        ctx
    }
}

impl Context {
    fn recv_maybe_after(&self, deadline: Option<Duration>) {
        match deadline {
            Some(d) => self.recv_after(d),
            None => self.recv(),
        }
    }

    fn send_maybe_after(&self, message: impl Into<OutMessage>, deadline: Option<Duration>) {
        match deadline {
            Some(d) => self.send_after(message, d),
            None => self.send(message),
        }
    }
}
