//! The client-role convenience wrapper, feature-gated behind `client`
//! exactly as `boltr` gates its own client module.
//!
//! Grounded on `boltr::client::session::BoltSession`'s ergonomic wrapper
//! over `boltr::client::connection::BoltConnection`: a one-shot
//! request/response round trip over a fresh connection, built on the same
//! `Session`/`Context`/`Router` machinery the server role uses.

use std::net::SocketAddr;
use std::sync::{Arc, Mutex};

use crate::chain::Handler;
use crate::connection::{Connection, TcpConnection};
use crate::error::RouteError;
use crate::message::{Request, Response};
use crate::routing::Router;
use crate::session::{Context, Session};

/// A minimal HTTP client: one TCP connection per request, no connection
/// pooling or pipelining (spec.md Non-goals).
pub struct Client;

impl Client {
    /// Connects to `addr`, writes `request`, and resolves with the first
    /// response the server sends back.
    pub async fn request(addr: SocketAddr, request: Request) -> Result<Response, RouteError> {
        let (tx, rx) = tokio::sync::oneshot::channel();
        let tx = Arc::new(Mutex::new(Some(tx)));

        let router = Router::<Response>::new().not_found(vec![Handler::two_arg({
            let tx = tx.clone();
            move |response: &Response, _ctx: &Context| {
                if let Some(sender) = tx.lock().unwrap().take() {
                    let _ = sender.send(response.clone());
                }
            }
        })]);
        let table = router.build();

        let connection = TcpConnection::connect(addr).await?;
        let boxed: Box<dyn Connection> = Box::new(connection);
        let _ctx = Session::spawn_client(boxed, request, table, None, None);

        rx.await.map_err(|_| {
            RouteError::Read(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "connection closed before a response arrived",
            ))
        })
    }
}
