//! The routing table: method → insertion-ordered `(pattern, chain)` list.
//!
//! Grounded on `original_source/include/beast_router/router.hpp`'s
//! resource map, restructured per spec.md's "Regex caching" and
//! "Iteration order" design notes: the compiled `Regex` is cached
//! alongside its source pattern (the original recompiles on every
//! dispatch), and `Vec` preserves insertion order within a method instead
//! of a hash map's unspecified order.

use std::collections::HashMap;

use regex::Regex;

use crate::chain::HandlerChain;
use crate::message::Method;

pub(crate) struct Entry<M> {
    pub(crate) regex: Regex,
    pub(crate) chain: HandlerChain<M>,
}

/// Holds every handler chain bound to a (method, pattern) pair, plus the
/// distinguished not-found chain. Shared across a connection's sessions
/// behind a reader/writer lock (spec.md Section 5): `Dispatcher` takes the
/// reader side; registering a route (at startup through `Router`, or later
/// against the live `Arc<RwLock<RoutingTable<M>>>` `Router::build` hands
/// back) takes the writer side. `insert`/`set_not_found`/
/// `set_first_match_wins` are `pub` for exactly that reason — a caller
/// holding the built table can call `table.write().unwrap().insert(...)` to
/// register a route after the server is already serving connections.
pub struct RoutingTable<M> {
    methods: HashMap<Method, Vec<Entry<M>>>,
    not_found: Option<HandlerChain<M>>,
    first_match_wins: bool,
}

impl<M> RoutingTable<M> {
    pub fn empty() -> Self {
        Self {
            methods: HashMap::new(),
            not_found: None,
            first_match_wins: false,
        }
    }

    /// Registers `chain` under `(method, pattern)`. Replaces the chain of
    /// an existing entry whose pattern is textually identical rather than
    /// adding a second, shadowing entry — spec.md Section 3's "inserting a
    /// (method, pattern) that already exists replaces the chain".
    pub fn insert(&mut self, method: Method, pattern: &str, chain: HandlerChain<M>) {
        let regex = Regex::new(pattern).unwrap_or_else(|e| panic!("invalid route pattern {pattern:?}: {e}"));
        let entries = self.methods.entry(method).or_default();
        match entries.iter_mut().find(|e| e.regex.as_str() == pattern) {
            Some(existing) => {
                existing.regex = regex;
                existing.chain = chain;
            }
            None => entries.push(Entry { regex, chain }),
        }
    }

    pub fn set_not_found(&mut self, chain: HandlerChain<M>) {
        self.not_found = Some(chain);
    }

    pub fn set_first_match_wins(&mut self, value: bool) {
        self.first_match_wins = value;
    }

    pub(crate) fn entries(&self, method: Method) -> &[Entry<M>] {
        self.methods.get(&method).map(Vec::as_slice).unwrap_or(&[])
    }

    pub(crate) fn not_found(&self) -> Option<&HandlerChain<M>> {
        self.not_found.as_ref()
    }

    pub(crate) fn first_match_wins(&self) -> bool {
        self.first_match_wins
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chain::Handler;
    use crate::message::Request;
    use crate::routing::dispatcher::dispatch_request;
    use crate::session::testing::fake_context;

    #[test]
    fn inserting_same_pattern_replaces_the_chain() {
        use std::sync::atomic::{AtomicBool, Ordering};
        use std::sync::Arc;

        let first_ran = Arc::new(AtomicBool::new(false));
        let second_ran = Arc::new(AtomicBool::new(false));

        let mut table: RoutingTable<Request> = RoutingTable::empty();
        {
            let flag = first_ran.clone();
            table.insert(
                Method::Get,
                "^/x$",
                HandlerChain::new(vec![Handler::one_arg(move |_ctx| {
                    flag.store(true, Ordering::SeqCst);
                    true
                })]),
            );
        }
        {
            let flag = second_ran.clone();
            table.insert(
                Method::Get,
                "^/x$",
                HandlerChain::new(vec![Handler::one_arg(move |_ctx| {
                    flag.store(true, Ordering::SeqCst);
                    true
                })]),
            );
        }

        assert_eq!(table.entries(Method::Get).len(), 1, "second insert must replace, not add");

        let req = Request::new(Method::Get, "/x");
        let ctx = fake_context();
        dispatch_request(&table, &req, &ctx);
        assert!(!first_ran.load(Ordering::SeqCst), "replaced chain must not run");
        assert!(second_ran.load(Ordering::SeqCst), "replacement chain must run");
    }

    #[test]
    fn write_lock_allows_registering_a_route_after_build() {
        use std::sync::{Arc, RwLock};

        let table: Arc<RwLock<RoutingTable<Request>>> = Arc::new(RwLock::new(RoutingTable::empty()));
        table.write().unwrap().insert(
            Method::Get,
            "^/late$",
            HandlerChain::new(vec![Handler::one_arg(|ctx| ctx.send(crate::message::Response::new(200)))]),
        );

        let ctx = fake_context();
        let req = Request::new(Method::Get, "/late");
        let guard = table.read().unwrap();
        assert!(dispatch_request(&guard, &req, &ctx));
    }
}
