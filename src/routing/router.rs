//! The `Router` façade: the public builder applications use to register
//! handler chains, grounded on the fluent shape of
//! `original_source/include/beast_router/router.hpp`'s public API.

use std::sync::{Arc, RwLock};

use crate::chain::{Handler, HandlerChain};
use crate::message::{Method, Request, Response};
use crate::routing::table::RoutingTable;
use crate::session::Context;

/// Builds a [`RoutingTable`] one chain at a time. Consumes and returns
/// `self` so chains can be registered fluently:
/// `Router::new().get("^/hello$", vec![...]).post(...)`.
pub struct Router<M> {
    table: RoutingTable<M>,
}

impl<M> Router<M> {
    fn insert(mut self, method: Method, pattern: &str, handlers: Vec<Handler<M>>) -> Self {
        self.table.insert(method, pattern, HandlerChain::new(handlers));
        self
    }

    pub fn get(self, pattern: &str, handlers: Vec<Handler<M>>) -> Self {
        self.insert(Method::Get, pattern, handlers)
    }

    pub fn put(self, pattern: &str, handlers: Vec<Handler<M>>) -> Self {
        self.insert(Method::Put, pattern, handlers)
    }

    pub fn post(self, pattern: &str, handlers: Vec<Handler<M>>) -> Self {
        self.insert(Method::Post, pattern, handlers)
    }

    /// Named `delete_` since `delete` collides with nothing in Rust but
    /// reads awkwardly as a bare keyword-adjacent identifier — matches the
    /// source's own `DELETE_` macro-generated method name.
    pub fn delete_(self, pattern: &str, handlers: Vec<Handler<M>>) -> Self {
        self.insert(Method::Delete, pattern, handlers)
    }

    pub fn head(self, pattern: &str, handlers: Vec<Handler<M>>) -> Self {
        self.insert(Method::Head, pattern, handlers)
    }

    pub fn options(self, pattern: &str, handlers: Vec<Handler<M>>) -> Self {
        self.insert(Method::Options, pattern, handlers)
    }

    pub fn patch(self, pattern: &str, handlers: Vec<Handler<M>>) -> Self {
        self.insert(Method::Patch, pattern, handlers)
    }

    /// Replaces the fallback chain run when no route matches (server role)
    /// or when a response arrives (client role).
    pub fn not_found(mut self, handlers: Vec<Handler<M>>) -> Self {
        self.table.set_not_found(HandlerChain::new(handlers));
        self
    }

    /// Configuration escape hatch for SPEC_FULL.md's Open Question 1: when
    /// set, the dispatcher stops at the first matching chain instead of
    /// running every matching chain under a method.
    pub fn first_match_wins(mut self, value: bool) -> Self {
        self.table.set_first_match_wins(value);
        self
    }

    pub fn build(self) -> Arc<RwLock<RoutingTable<M>>> {
        Arc::new(RwLock::new(self.table))
    }
}

impl Router<Request> {
    /// A server-role router with the default 404 not-found chain already
    /// installed, so an unconfigured server never hangs a client
    /// (spec.md Section 4.5).
    pub fn new() -> Self {
        let mut table = RoutingTable::empty();
        table.set_not_found(HandlerChain::new(vec![Handler::one_arg(|ctx: &Context| {
            ctx.send(Response::new(404));
        })]));
        Self { table }
    }
}

impl Default for Router<Request> {
    fn default() -> Self {
        Self::new()
    }
}

impl Router<Response> {
    /// A client-role router with no default chain — an unmatched response
    /// is simply dropped (spec.md Section 4.6's client-mode edge case).
    pub fn new() -> Self {
        Self { table: RoutingTable::empty() }
    }
}

impl Default for Router<Response> {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn server_router_has_default_not_found() {
        let table = Router::<Request>::new().build();
        assert!(table.read().unwrap().not_found().is_some());
    }

    #[test]
    fn client_router_has_no_default_not_found() {
        let table = Router::<Response>::new().build();
        assert!(table.read().unwrap().not_found().is_none());
    }
}
