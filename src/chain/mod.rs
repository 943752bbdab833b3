//! Handler chains: the ordered, arity-adapting callback storage bound to a
//! single (method, path pattern) entry in the routing table.
//!
//! Grounded on `original_source/include/beast_router/base/storage.hpp` and
//! `base/clb.hpp`'s `callback`/`callback_impl` type erasure, reimplemented
//! the idiomatic way: a closure-capturing enum instead of a virtual
//! dispatch table, per the "Type erasure of handlers" design note in
//! spec.md Section 9.
//!
//! `HandlerChain` is generic over the message type `M` a chain receives,
//! since the same chain shape serves both server-role dispatch (`M =
//! Request`) and client-role response handling (`M = Response`), mirroring
//! how the source's `session<IsRequest, ...>::request_type` flips between
//! `http::request` and `http::response` depending on role.

use regex::Captures;

use crate::session::Context;

type BoxedFn<M> = Box<dyn Fn(&M, &Context, &Captures<'_>) -> bool + Send + Sync>;

/// One adapted handler in a chain.
///
/// A handler written to take fewer parameters than the full
/// `(message, context, captures)` triple still gets called on every
/// dispatch — the adapter just drops the arguments it doesn't need.
pub struct Handler<M>(BoxedFn<M>);

impl<M: 'static> Handler<M> {
    /// Adapts a handler that wants the full `(message, context, captures)` triple.
    pub fn three_arg<F, R>(f: F) -> Self
    where
        F: Fn(&M, &Context, &Captures<'_>) -> R + Send + Sync + 'static,
        R: Into<HandlerReturn>,
    {
        Handler(Box::new(move |msg, ctx, m| f(msg, ctx, m).into().0))
    }

    /// Adapts a handler that wants `(message, context)`.
    pub fn two_arg<F, R>(f: F) -> Self
    where
        F: Fn(&M, &Context) -> R + Send + Sync + 'static,
        R: Into<HandlerReturn>,
    {
        Handler(Box::new(move |msg, ctx, _| f(msg, ctx).into().0))
    }

    /// Adapts a handler that only wants the `context`.
    pub fn one_arg<F, R>(f: F) -> Self
    where
        F: Fn(&Context) -> R + Send + Sync + 'static,
        R: Into<HandlerReturn>,
    {
        Handler(Box::new(move |_, ctx, _| f(ctx).into().0))
    }

    fn call(&self, msg: &M, ctx: &Context, m: &Captures<'_>) -> bool {
        (self.0)(msg, ctx, m)
    }
}

/// Normalizes a handler's return value: `bool` forwards as-is, `()` means
/// "continue" (`true`).
pub struct HandlerReturn(bool);

impl From<bool> for HandlerReturn {
    fn from(b: bool) -> Self {
        HandlerReturn(b)
    }
}

impl From<()> for HandlerReturn {
    fn from(_: ()) -> Self {
        HandlerReturn(true)
    }
}

/// An ordered, non-empty sequence of adapted handlers bound to one
/// (method, pattern) entry.
///
/// Invariant: a chain always has at least one handler — [`HandlerChain::new`]
/// panics on an empty vector, mirroring the source's compile-time
/// `sizeof...(OnRequest) >= 1` constraint (spec.md Section 3).
pub struct HandlerChain<M> {
    handlers: Vec<Handler<M>>,
}

impl<M> HandlerChain<M> {
    pub fn new(handlers: Vec<Handler<M>>) -> Self {
        assert!(!handlers.is_empty(), "a handler chain must have at least one handler");
        Self { handlers }
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        false
    }

    /// Runs every handler in construction order, stopping at the first
    /// `false` return. Returns `true` ("handled") iff every handler ran to
    /// completion without short-circuiting.
    pub fn begin_execute(&self, msg: &M, ctx: &Context, captures: &Captures<'_>) -> bool {
        for handler in &self.handlers {
            if !handler.call(msg, ctx, captures) {
                return false;
            }
        }
        true
    }
}
