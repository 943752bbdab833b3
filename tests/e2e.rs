//! End-to-end session/dispatch scenarios, driven over an in-memory
//! duplex stream instead of a real socket (the teacher has no test
//! harness of its own for this layer, so this follows the ambient-stack
//! convention of exercising `Session` through its public `Connection`
//! trait rather than reaching into its internals).

use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use bytes::Bytes;
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

use routewire::chain::Handler;
use routewire::connection::{Connection, Shutdown};
use routewire::error::RouteError;
use routewire::message::{Request, Response};
use routewire::routing::Router;
use routewire::session::{Context, Session};

/// A `Connection` over one half of an in-memory duplex pipe, so a
/// `Session` can be driven in tests without a real TCP socket.
struct DuplexConnection {
    stream: DuplexStream,
    open: Arc<AtomicBool>,
}

impl DuplexConnection {
    fn new(stream: DuplexStream) -> Self {
        Self {
            stream,
            open: Arc::new(AtomicBool::new(true)),
        }
    }
}

#[async_trait::async_trait]
impl Connection for DuplexConnection {
    async fn read(&mut self, buf: &mut [u8]) -> Result<usize, RouteError> {
        if !self.open.load(Ordering::Acquire) {
            return Ok(0);
        }
        self.stream.read(buf).await.map_err(RouteError::Read)
    }

    async fn write(&mut self, data: &[u8]) -> Result<usize, RouteError> {
        self.stream.write_all(data).await.map_err(RouteError::Write)?;
        self.stream.flush().await.map_err(RouteError::Write)?;
        Ok(data.len())
    }

    fn shutdown(&mut self, _direction: Shutdown) -> Result<(), RouteError> {
        self.open.store(false, Ordering::Release);
        Ok(())
    }

    fn is_open(&self) -> bool {
        self.open.load(Ordering::Acquire)
    }

    fn peer_addr(&self) -> Option<SocketAddr> {
        None
    }
}

async fn write_all(stream: &mut DuplexStream, bytes: &[u8]) {
    stream.write_all(bytes).await.unwrap();
    stream.flush().await.unwrap();
}

async fn read_to_blank_line(stream: &mut DuplexStream) -> String {
    let mut acc = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        let n = stream.read(&mut chunk).await.unwrap();
        assert_ne!(n, 0, "peer closed before a full response arrived");
        acc.extend_from_slice(&chunk[..n]);
        if let Some(headers_end) = find_headers_end(&acc) {
            let body_len = content_length(&acc[..headers_end]);
            if acc.len() >= headers_end + body_len {
                return String::from_utf8_lossy(&acc).into_owned();
            }
        }
    }
}

/// Reads exactly one complete response out of `stream`, carrying any bytes
/// beyond it over in `leftover` for the next call — needed when two
/// responses can arrive back-to-back in the same read.
async fn read_one_response(stream: &mut DuplexStream, leftover: &mut Vec<u8>) -> String {
    loop {
        if let Some(headers_end) = find_headers_end(leftover) {
            let total = headers_end + content_length(&leftover[..headers_end]);
            if leftover.len() >= total {
                let response: Vec<u8> = leftover.drain(..total).collect();
                return String::from_utf8_lossy(&response).into_owned();
            }
        }
        let mut chunk = [0u8; 1024];
        let n = stream.read(&mut chunk).await.unwrap();
        assert_ne!(n, 0, "peer closed before a full response arrived");
        leftover.extend_from_slice(&chunk[..n]);
    }
}

fn find_headers_end(buf: &[u8]) -> Option<usize> {
    buf.windows(4).position(|w| w == b"\r\n\r\n").map(|p| p + 4)
}

fn content_length(head: &[u8]) -> usize {
    let text = String::from_utf8_lossy(head);
    for line in text.lines() {
        if let Some(v) = line.strip_prefix("Content-Length:").or_else(|| line.strip_prefix("content-length:")) {
            return v.trim().parse().unwrap_or(0);
        }
    }
    0
}

/// E1: a single GET against a matching route receives that route's response.
#[tokio::test]
async fn single_get_receives_matching_response() {
    let table = Router::<Request>::new()
        .get(r"^/hello$", vec![Handler::two_arg(|_req: &Request, ctx: &Context| {
            ctx.send(Response::new(200).with_body(Bytes::from_static(b"hi")));
        })])
        .build();

    let (client_side, server_side) = tokio::io::duplex(4096);
    let connection: Box<dyn Connection> = Box::new(DuplexConnection::new(server_side));
    let _ctx = Session::spawn_server(connection, table, None, None);

    let mut client_side = client_side;
    write_all(&mut client_side, b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let response = read_to_blank_line(&mut client_side).await;
    assert!(response.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(response.ends_with("hi"));
}

/// E2: a chain of handlers on the same route shares one `Context`, so
/// user-data set by an earlier handler is visible to a later one.
#[tokio::test]
async fn chained_handlers_share_user_data() {
    let table = Router::<Request>::new()
        .get(
            r"^/greet$",
            vec![
                Handler::two_arg(|_req: &Request, ctx: &Context| {
                    ctx.set_user_data(String::from("alice"));
                    true
                }),
                Handler::two_arg(|_req: &Request, ctx: &Context| {
                    let name = ctx.get_user_data::<String>().expect("set by the first handler");
                    ctx.send(Response::new(200).with_body(Bytes::from(format!("hello {name}"))));
                }),
            ],
        )
        .build();

    let (client_side, server_side) = tokio::io::duplex(4096);
    let connection: Box<dyn Connection> = Box::new(DuplexConnection::new(server_side));
    let _ctx = Session::spawn_server(connection, table, None, None);

    let mut client_side = client_side;
    write_all(&mut client_side, b"GET /greet HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let response = read_to_blank_line(&mut client_side).await;
    assert!(response.ends_with("hello alice"));
}

/// E3: a chain whose first handler returns `false` short-circuits before
/// its second handler runs; the match is not "handled" (`begin_execute`
/// returned `false`), so the not-found chain still runs afterward
/// (SPEC_FULL.md Open Question 4, resolved from the original dispatcher's
/// `is_handled` semantics).
#[tokio::test]
async fn short_circuited_chain_still_runs_not_found() {
    let table = Router::<Request>::new()
        .get(
            r"^/gate$",
            vec![
                Handler::two_arg(|_req: &Request, ctx: &Context| {
                    ctx.send(Response::new(403));
                    false
                }),
                Handler::two_arg(|_req: &Request, ctx: &Context| {
                    ctx.send(Response::new(200));
                }),
            ],
        )
        .not_found(vec![Handler::one_arg(|ctx: &Context| {
            ctx.send(Response::new(404));
        })])
        .build();

    let (client_side, server_side) = tokio::io::duplex(4096);
    let connection: Box<dyn Connection> = Box::new(DuplexConnection::new(server_side));
    let _ctx = Session::spawn_server(connection, table, None, None);

    let mut client_side = client_side;
    write_all(&mut client_side, b"GET /gate HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let mut leftover = Vec::new();
    let first = read_one_response(&mut client_side, &mut leftover).await;
    assert!(first.starts_with("HTTP/1.1 403 Forbidden\r\n"), "short-circuiting handler's own response still sends");
    let second = read_one_response(&mut client_side, &mut leftover).await;
    assert!(second.starts_with("HTTP/1.1 404 Not Found\r\n"), "short-circuit does not suppress not-found");
}

/// E4: a target with no matching route falls through to the not-found chain.
#[tokio::test]
async fn unmatched_target_runs_not_found() {
    let table = Router::<Request>::new()
        .get(r"^/known$", vec![Handler::one_arg(|ctx: &Context| {
            ctx.send(Response::new(200));
        })])
        .build();

    let (client_side, server_side) = tokio::io::duplex(4096);
    let connection: Box<dyn Connection> = Box::new(DuplexConnection::new(server_side));
    let _ctx = Session::spawn_server(connection, table, None, None);

    let mut client_side = client_side;
    write_all(&mut client_side, b"GET /unknown HTTP/1.1\r\nHost: x\r\n\r\n").await;
    let response = read_to_blank_line(&mut client_side).await;
    assert!(response.starts_with("HTTP/1.1 404 Not Found\r\n"));
}

/// E5: two writes scheduled back-to-back from one handler arrive on the
/// wire in the order they were scheduled, one in flight at a time.
#[tokio::test]
async fn queued_writes_arrive_in_scheduling_order() {
    let table = Router::<Request>::new()
        .get(r"^/both$", vec![Handler::two_arg(|_req: &Request, ctx: &Context| {
            ctx.send(Response::new(200).with_body(Bytes::from_static(b"first")));
            ctx.send(Response::new(200).with_header("Connection", "close").with_body(Bytes::from_static(b"second")));
        })])
        .build();

    let (client_side, server_side) = tokio::io::duplex(4096);
    let connection: Box<dyn Connection> = Box::new(DuplexConnection::new(server_side));
    let _ctx = Session::spawn_server(connection, table, None, None);

    let mut client_side = client_side;
    write_all(&mut client_side, b"GET /both HTTP/1.1\r\nHost: x\r\n\r\n").await;

    let mut acc = Vec::new();
    let mut chunk = [0u8; 1024];
    loop {
        match client_side.read(&mut chunk).await {
            Ok(0) => break,
            Ok(n) => acc.extend_from_slice(&chunk[..n]),
            Err(_) => break,
        }
    }
    let text = String::from_utf8_lossy(&acc);
    let first_at = text.find("first").expect("first response body present");
    let second_at = text.find("second").expect("second response body present");
    assert!(first_at < second_at, "writes arrived out of scheduling order");
}

/// E6: a session armed with an idle read timeout shuts down once that
/// deadline elapses without the peer sending anything.
#[tokio::test(start_paused = true)]
async fn idle_read_timeout_closes_the_session() {
    let table = Router::<Request>::new().build();

    let (client_side, server_side) = tokio::io::duplex(4096);
    let connection: Box<dyn Connection> = Box::new(DuplexConnection::new(server_side));
    let _ctx = Session::spawn_server(connection, table, Some(Duration::from_millis(50)), None);

    let mut client_side = client_side;
    tokio::time::advance(Duration::from_millis(200)).await;

    let mut chunk = [0u8; 16];
    let n = client_side.read(&mut chunk).await.unwrap();
    assert_eq!(n, 0, "expected the session to close the stream after the idle deadline");
}
