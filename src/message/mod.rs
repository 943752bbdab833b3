//! HTTP messages: methods, requests, responses, and the default wire codec.

pub mod codec;
pub mod headers;
pub mod method;
pub mod request;
pub mod response;

pub use method::Method;
pub use request::Request;
pub use response::Response;
