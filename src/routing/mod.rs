//! The routing table, dispatcher, and `Router` façade (spec.md Sections
//! 4.5 and 4.6).

pub mod dispatcher;
pub mod router;
pub mod table;

pub use dispatcher::{dispatch_fallback, dispatch_request, Routable};
pub use router::Router;
pub use table::RoutingTable;
