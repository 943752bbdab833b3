//! The `Server` builder: binds a listener and spawns one `Session` per
//! accepted connection, grounded on `boltr::server::builder::BoltServer`
//! (`server/builder.rs`), which does the same for Bolt connections via
//! its own `spawn_connection`.

use std::net::SocketAddr;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use tokio::net::TcpListener;

use crate::connection::TcpConnection;
use crate::error::RouteError;
use crate::message::Request;
use crate::routing::RoutingTable;
use crate::session::{ErrorSink, Session};

#[cfg(feature = "tls")]
use crate::connection::tls::TlsServerConnection;
#[cfg(feature = "tls")]
use tokio_rustls::rustls::ServerConfig;

/// Fluent server configuration, mirroring `BoltServer`'s
/// `.idle_timeout(...)`, `.max_sessions(...)`, `.shutdown(...)` chain
/// ending in `.serve(addr)`.
pub struct Server {
    table: Arc<RwLock<RoutingTable<Request>>>,
    idle_timeout: Option<Duration>,
    max_connections: Option<usize>,
    error_sink: Option<ErrorSink>,
}

impl Server {
    /// Starts a builder around an already-built routing table (see
    /// [`crate::routing::Router::build`]).
    pub fn builder(table: Arc<RwLock<RoutingTable<Request>>>) -> Self {
        Self {
            table,
            idle_timeout: None,
            max_connections: None,
            error_sink: None,
        }
    }

    /// Arms a read deadline on every session's first `recv()`. Handlers
    /// that call `ctx.recv()` themselves choose their own deadline and
    /// override this default for that call.
    pub fn idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Caps the number of concurrently accepted connections. Once
    /// reached, `serve` stops `accept`-ing until a session finishes.
    pub fn max_connections(mut self, max: usize) -> Self {
        self.max_connections = Some(max);
        self
    }

    /// Registers the callback invoked for every non-end-of-stream session
    /// error (spec.md Section 6's "error sink").
    pub fn shutdown(mut self, on_error: ErrorSink) -> Self {
        self.error_sink = Some(on_error);
        self
    }

    /// Binds `addr` and serves plain-TCP connections until the listener
    /// itself fails.
    pub async fn serve(self, addr: SocketAddr) -> Result<(), RouteError> {
        let listener = TcpListener::bind(addr).await.map_err(RouteError::Bind)?;
        tracing::info!(%addr, "listening");
        let permits = self.max_connections.map(|max| Arc::new(tokio::sync::Semaphore::new(max)));

        loop {
            let permit = match &permits {
                Some(sem) => Some(sem.clone().acquire_owned().await.expect("semaphore never closed")),
                None => None,
            };
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };
            tracing::debug!(%peer, "accepted connection");

            let table = self.table.clone();
            let deadline = self.idle_timeout;
            let error_sink = self.error_sink.clone();
            tokio::spawn(async move {
                let connection: Box<dyn crate::connection::Connection> = Box::new(TcpConnection::new(stream, peer));
                let (session, _ctx) = Session::prepare_server(connection, table, deadline, error_sink);
                // Holds the permit for the session's whole lifetime, not
                // just its construction — `prepare_server` doesn't spawn,
                // so `run()` completing here is what releases the slot.
                session.run().await;
                drop(permit);
            });
        }
    }

    /// Binds `addr` and serves TLS connections, handshaking each accepted
    /// socket with `tls_config` before handing it to a `Session`.
    #[cfg(feature = "tls")]
    pub async fn serve_tls(self, addr: SocketAddr, tls_config: Arc<ServerConfig>) -> Result<(), RouteError> {
        let listener = TcpListener::bind(addr).await.map_err(RouteError::Bind)?;
        tracing::info!(%addr, "listening (tls)");
        let permits = self.max_connections.map(|max| Arc::new(tokio::sync::Semaphore::new(max)));

        loop {
            let permit = match &permits {
                Some(sem) => Some(sem.clone().acquire_owned().await.expect("semaphore never closed")),
                None => None,
            };
            let (stream, peer) = match listener.accept().await {
                Ok(pair) => pair,
                Err(e) => {
                    tracing::warn!(error = %e, "accept failed");
                    continue;
                }
            };

            let table = self.table.clone();
            let deadline = self.idle_timeout;
            let error_sink = self.error_sink.clone();
            let tls_config = tls_config.clone();
            tokio::spawn(async move {
                match TlsServerConnection::handshake(stream, peer, tls_config).await {
                    Ok(tls_stream) => {
                        tracing::debug!(%peer, "tls handshake complete");
                        let connection: Box<dyn crate::connection::Connection> = Box::new(tls_stream);
                        let (session, _ctx) = Session::prepare_server(connection, table, deadline, error_sink);
                        session.run().await;
                    }
                    Err(e) => {
                        tracing::warn!(%peer, error = %e, "tls handshake failed");
                        if let Some(sink) = &error_sink {
                            sink(&e, Some(peer));
                        }
                    }
                }
                drop(permit);
            });
        }
    }
}
