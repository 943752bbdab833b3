//! Routes an incoming message to its handler chain(s).
//!
//! Grounded on `original_source/include/beast_router/base/dispatcher.hpp`,
//! restructured the way `boltr::server::builder` restructures its C++
//! counterpart into an idiomatic free function plus trait, per spec.md
//! Section 4.6.

use regex::{Captures, Regex};

use crate::message::{Method, Request};
use crate::routing::table::RoutingTable;
use crate::session::Context;

/// A message that can be routed by method and target — implemented only
/// by `Request`. Responses (client role) skip method/pattern matching
/// entirely and always run the not-found chain (spec.md Section 4.6.3).
pub trait Routable {
    fn method(&self) -> Method;
    fn target(&self) -> &str;
}

impl Routable for Request {
    fn method(&self) -> Method {
        self.method
    }

    fn target(&self) -> &str {
        &self.target
    }
}

/// A full (anchored start-and-end) match, regardless of whether the
/// pattern itself contains `^`/`$` — spec.md's "full match on target" rule.
fn full_match<'t>(regex: &Regex, text: &'t str) -> Option<Captures<'t>> {
    regex.captures(text).filter(|c| {
        let whole = c.get(0).expect("capture group 0 always present on a match");
        whole.start() == 0 && whole.end() == text.len()
    })
}

fn empty_captures() -> Captures<'static> {
    static EMPTY: std::sync::OnceLock<Regex> = std::sync::OnceLock::new();
    EMPTY.get_or_init(|| Regex::new("").unwrap()).captures("").unwrap()
}

/// Server-role dispatch: matches `msg`'s method and target against the
/// table's patterns in insertion order, running every matching chain
/// (spec.md Section 4.6 steps 1-2). A chain only counts as *handled* when
/// `begin_execute` returns `true` — a matched-but-short-circuited chain
/// (one of its handlers returned `false`) does not suppress the not-found
/// fallback, matching `is_handled` in the original dispatcher: it is set
/// only on a `true` return from `begin_execute`, and `!is_handled` is
/// re-checked independently afterward. See SPEC_FULL.md's Open Question 4.
pub fn dispatch_request<M: Routable>(table: &RoutingTable<M>, msg: &M, ctx: &Context) -> bool {
    let mut is_handled = false;
    for entry in table.entries(msg.method()) {
        if let Some(captures) = full_match(&entry.regex, msg.target()) {
            if entry.chain.begin_execute(msg, ctx, &captures) {
                is_handled = true;
            }
            if table.first_match_wins() {
                break;
            }
        }
    }
    if !is_handled {
        if let Some(chain) = table.not_found() {
            chain.begin_execute(msg, ctx, &empty_captures());
        }
    }
    is_handled
}

/// Client-role dispatch: always runs the not-found chain (the client's
/// single response handler), with an empty regex match — spec.md Section
/// 4.6.3. If no such chain is registered the response is silently dropped.
pub fn dispatch_fallback<M>(table: &RoutingTable<M>, msg: &M, ctx: &Context) -> bool {
    match table.not_found() {
        Some(chain) => {
            chain.begin_execute(msg, ctx, &empty_captures());
            true
        }
        None => false,
    }
}
