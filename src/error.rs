//! Error types for the routing and session engine.

/// Errors that can occur while driving a session or dispatching a request.
///
/// Each variant wraps the I/O error at its own origin rather than relying on
/// a single blanket `#[from] std::io::Error`, since callers and the error
/// sink need to distinguish *where* a failure occurred (read vs. write vs.
/// connect vs. bind) per the recovery table in spec.md Section 7.
#[derive(Debug, thiserror::Error)]
pub enum RouteError {
    /// I/O failure while reading from the connection.
    #[error("read failure: {0}")]
    Read(#[source] std::io::Error),

    /// I/O failure while writing to the connection.
    #[error("write failure: {0}")]
    Write(#[source] std::io::Error),

    /// The wire parser could not make sense of the incoming bytes.
    #[error("protocol error: {0}")]
    Parse(String),

    /// TLS handshake failed.
    #[error("handshake failure: {0}")]
    Handshake(String),

    /// A timer armed on a session expired before the expected I/O completed.
    #[error("operation timed out")]
    TimedOut,

    /// Client-side DNS resolution failure.
    #[error("resolve failure: {0}")]
    Resolve(#[source] std::io::Error),

    /// Client-side TCP dial failure.
    #[error("connect failure: {0}")]
    Connect(#[source] std::io::Error),

    /// A handler panicked or returned an error the core must surface.
    #[error("handler fault: {0}")]
    Handler(String),

    /// The listener could not bind its address.
    #[error("bind failure: {0}")]
    Bind(#[source] std::io::Error),
}

impl RouteError {
    /// Wraps a handler-side failure (panic payload, user error) as a `Handler` fault.
    pub fn handler(e: impl std::fmt::Display) -> Self {
        Self::Handler(e.to_string())
    }
}
