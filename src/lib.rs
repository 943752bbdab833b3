//! routewire — an asynchronous HTTP routing and session engine.
//!
//! A small library for building HTTP/1.1 servers (and, behind the
//! `client` feature, issuing one-off requests) around a regex-pattern
//! `Router`, an arity-adapting handler chain, and a per-connection
//! `Session` state machine that owns its read/write cycle end to end.
//!
//! # Architecture
//!
//! - **`message`** — `Method`, `Request`, `Response`, and the default
//!   HTTP/1.1 wire codec.
//! - **`chain`** — the ordered, arity-adapting handler storage bound to
//!   one routing table entry.
//! - **`routing`** — `RoutingTable`, the dispatcher, and the `Router`
//!   façade applications build against.
//! - **`connection`** — the plain/TLS byte-stream abstraction a `Session`
//!   drives.
//! - **`session`** — `Session` (the per-connection state machine) and
//!   `Context` (the handle handlers use to send, recv, and stash
//!   per-dispatch user data).
//! - **`server`** — the `Server` builder: binds a listener and spawns one
//!   `Session` per accepted connection.
//! - **`client`** — a one-shot request/response convenience wrapper
//!   (feature-gated).

pub mod chain;
pub mod connection;
pub mod error;
pub mod message;
pub mod routing;
pub mod server;
pub mod session;

#[cfg(feature = "client")]
pub mod client;
