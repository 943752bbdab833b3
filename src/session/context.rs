//! The handler-facing `Context`: a cheap, cloneable handle onto a live
//! `Session`, grounded on
//! `original_source/include/beast_router/session.hpp`'s nested `context`
//! class.
//!
//! The source's context posts onto the session's `boost::asio::strand`
//! before touching state. Here the equivalent is an actor channel: every
//! scheduling method sends a [`Command`] to the owning `Session`'s task
//! rather than mutating anything directly, so `Context` can be held and
//! called from any thread (spec.md Section 4.8) without needing to be
//! `Sync` over shared mutable session state.

use std::any::Any;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use bytes::BytesMut;
use tokio::sync::mpsc;

use crate::message::codec::{encode_request, encode_response};
use crate::message::{Request, Response};

/// Either half of the duplex HTTP exchange a `Context::send` can schedule.
///
/// spec.md's data model treats `HttpMessage` as a tagged union precisely
/// so a single `Context` type works for both the server role (sends
/// `Response`s) and the client role (sends `Request`s).
#[derive(Debug, Clone)]
pub enum OutMessage {
    Response(Response),
    Request(Request),
}

impl From<Response> for OutMessage {
    fn from(r: Response) -> Self {
        OutMessage::Response(r)
    }
}

impl From<Request> for OutMessage {
    fn from(r: Request) -> Self {
        OutMessage::Request(r)
    }
}

impl OutMessage {
    pub(crate) fn need_eof(&self) -> bool {
        match self {
            OutMessage::Response(r) => r.need_eof(),
            // A request never closes the connection the client just wrote
            // to; the response half decides that.
            OutMessage::Request(_) => false,
        }
    }

    pub(crate) fn encode(&self, buf: &mut BytesMut) {
        match self {
            OutMessage::Response(r) => encode_response(buf, r),
            OutMessage::Request(r) => encode_request(buf, r),
        }
    }
}

/// Commands posted to a `Session`'s task through its command channel.
pub(crate) enum Command {
    Recv { deadline: Option<Duration> },
    Send { message: OutMessage, deadline: Option<Duration> },
    Shutdown,
}

#[derive(Clone)]
pub struct Context {
    commands: mpsc::UnboundedSender<Command>,
    open: Arc<AtomicBool>,
    user_data: Arc<Mutex<Option<Arc<dyn Any + Send + Sync>>>>,
    peer_addr: Option<SocketAddr>,
}

impl Context {
    pub(crate) fn new(
        commands: mpsc::UnboundedSender<Command>,
        open: Arc<AtomicBool>,
        peer_addr: Option<SocketAddr>,
    ) -> Self {
        Self {
            commands,
            open,
            user_data: Arc::new(Mutex::new(None)),
            peer_addr,
        }
    }

    /// Schedules a new read cycle with no inactivity deadline.
    pub fn recv(&self) {
        self.post(Command::Recv { deadline: None });
    }

    /// Schedules a new read cycle, arming the timer for `deadline`.
    pub fn recv_after(&self, deadline: Duration) {
        self.post(Command::Recv { deadline: Some(deadline) });
    }

    /// Schedules a write with no inactivity deadline.
    pub fn send(&self, message: impl Into<OutMessage>) {
        self.post(Command::Send { message: message.into(), deadline: None });
    }

    /// Schedules a write, arming the timer for `deadline` before it starts.
    pub fn send_after(&self, message: impl Into<OutMessage>, deadline: Duration) {
        self.post(Command::Send { message: message.into(), deadline: Some(deadline) });
    }

    /// Whether the underlying connection is still open. Once it reports
    /// `false`, every other method on this (or any other) `Context` handle
    /// to the same session becomes a no-op — spec.md Section 7.
    pub fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    /// The remote address, if the underlying stream has one. Stands in for
    /// spec.md's `get_stream()` escape hatch — see DESIGN.md.
    pub fn peer_addr(&self) -> Option<SocketAddr> {
        self.peer_addr
    }

    /// Sets the per-context user-data slot. The first call to this method
    /// fixes the slot's type for the lifetime of this `Context` value;
    /// later calls may change the value (and its type).
    pub fn set_user_data<T: Any + Send + Sync + 'static>(&self, value: T) {
        *self.user_data.lock().unwrap() = Some(Arc::new(value));
    }

    /// Reads the user-data slot, or `None` if unset or set with a
    /// different type than `T` (spec.md invariant 7: a mismatched `get`
    /// fails rather than panicking).
    pub fn get_user_data<T: Any + Send + Sync + 'static>(&self) -> Option<Arc<T>> {
        self.user_data.lock().unwrap().clone()?.downcast::<T>().ok()
    }

    fn post(&self, command: Command) {
        // A closed channel means the owning Session already shut down;
        // dropping the command here is the documented no-op for
        // stale-Context operations (spec.md Section 7).
        let _ = self.commands.send(command);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mismatched_type_get_returns_none() {
        let (tx, _rx) = mpsc::unbounded_channel();
        let ctx = Context::new(tx, Arc::new(AtomicBool::new(true)), None);
        ctx.set_user_data::<String>("A".to_string());
        assert_eq!(ctx.get_user_data::<String>().as_deref().map(String::as_str), Some("A"));
        assert!(ctx.get_user_data::<u32>().is_none());
    }

    #[test]
    fn closed_context_send_does_not_panic() {
        let (tx, rx) = mpsc::unbounded_channel();
        drop(rx);
        let ctx = Context::new(tx, Arc::new(AtomicBool::new(false)), None);
        ctx.send(Response::new(200));
        assert!(!ctx.is_open());
    }
}
