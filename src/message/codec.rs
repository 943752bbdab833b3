//! The default HTTP/1.1 wire codec.
//!
//! Parser and serializer are treated as a black box by the rest of the
//! crate (`Session` only knows it can hand bytes to a parser and get a
//! `Request`/`Response` back, and hand a message to a serializer and get
//! bytes). This module supplies one concrete implementation of that
//! contract so the engine is testable end-to-end; it is intentionally
//! minimal — headers plus `Content-Length` framing, no chunked
//! transfer-encoding, no trailers, no HTTP/2.

use bytes::{Bytes, BytesMut};

use crate::message::headers::Headers;
use crate::message::method::Method;
use crate::message::request::Request;
use crate::message::response::Response;

/// Outcome of attempting to decode one message from a buffer.
#[derive(Debug)]
pub enum Decoded<T> {
    /// A complete message plus the number of bytes it consumed.
    Complete(T, usize),
    /// Not enough bytes buffered yet; read more and retry.
    Partial,
}

/// Errors distinguishing the three cases the session cares about (spec.md
/// Section 6): end-of-stream, a message still in flight, and a malformed one.
#[derive(Debug, thiserror::Error)]
pub enum CodecError {
    #[error("partial message")]
    Partial,
    #[error("malformed message: {0}")]
    Protocol(String),
}

const MAX_HEADERS: usize = 64;

/// Parses as many complete requests as `buf` contains is not this codec's
/// job — one call decodes at most one message, leaving any remaining bytes
/// in place for the caller to re-buffer.
pub fn decode_request(buf: &[u8]) -> Result<Decoded<Request>, CodecError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Request::new(&mut headers);

    let head_len = match parsed.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => return Ok(Decoded::Partial),
        Err(e) => return Err(CodecError::Protocol(e.to_string())),
    };

    let method_token = parsed.method.ok_or_else(|| CodecError::Protocol("missing method".into()))?;
    let target = parsed.path.ok_or_else(|| CodecError::Protocol("missing target".into()))?;
    let version = parsed.version.ok_or_else(|| CodecError::Protocol("missing version".into()))?;

    let mut collected = Headers::new();
    for h in parsed.headers.iter() {
        collected.insert(h.name.to_string(), String::from_utf8_lossy(h.value).into_owned());
    }

    let body_len = content_length(&collected)?;
    let total_len = head_len + body_len;
    if buf.len() < total_len {
        return Ok(Decoded::Partial);
    }

    let request = Request {
        method: Method::parse(method_token),
        target: target.to_string(),
        version: (1, version as u8),
        headers: collected,
        body: Bytes::copy_from_slice(&buf[head_len..total_len]),
    };

    Ok(Decoded::Complete(request, total_len))
}

/// Parses a response out of `buf`, mirroring [`decode_request`] for the
/// client role.
pub fn decode_response(buf: &[u8]) -> Result<Decoded<Response>, CodecError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut parsed = httparse::Response::new(&mut headers);

    let head_len = match parsed.parse(buf) {
        Ok(httparse::Status::Complete(n)) => n,
        Ok(httparse::Status::Partial) => return Ok(Decoded::Partial),
        Err(e) => return Err(CodecError::Protocol(e.to_string())),
    };

    let status = parsed.code.ok_or_else(|| CodecError::Protocol("missing status".into()))?;
    let reason = parsed.reason.unwrap_or("").to_string();
    let version = parsed.version.ok_or_else(|| CodecError::Protocol("missing version".into()))?;

    let mut collected = Headers::new();
    for h in parsed.headers.iter() {
        collected.insert(h.name.to_string(), String::from_utf8_lossy(h.value).into_owned());
    }

    let body_len = content_length(&collected)?;
    let total_len = head_len + body_len;
    if buf.len() < total_len {
        return Ok(Decoded::Partial);
    }

    let response = Response {
        status,
        reason,
        version: (1, version as u8),
        headers: collected,
        body: Bytes::copy_from_slice(&buf[head_len..total_len]),
    };

    Ok(Decoded::Complete(response, total_len))
}

fn content_length(headers: &Headers) -> Result<usize, CodecError> {
    match headers.get("content-length") {
        Some(v) => v
            .trim()
            .parse()
            .map_err(|_| CodecError::Protocol(format!("bad Content-Length: {v}"))),
        None => Ok(0),
    }
}

/// Serializes a request onto the wire (client role).
pub fn encode_request(buf: &mut BytesMut, request: &Request) {
    buf.extend_from_slice(request.method.as_str().as_bytes());
    buf.extend_from_slice(b" ");
    buf.extend_from_slice(request.target.as_bytes());
    buf.extend_from_slice(format!(" HTTP/{}.{}\r\n", request.version.0, request.version.1).as_bytes());
    encode_headers_and_body(buf, &request.headers, &request.body);
}

/// Serializes a response onto the wire (server role).
pub fn encode_response(buf: &mut BytesMut, response: &Response) {
    buf.extend_from_slice(
        format!(
            "HTTP/{}.{} {} {}\r\n",
            response.version.0, response.version.1, response.status, response.reason
        )
        .as_bytes(),
    );
    encode_headers_and_body(buf, &response.headers, &response.body);
}

fn encode_headers_and_body(buf: &mut BytesMut, headers: &Headers, body: &Bytes) {
    let needs_content_length = headers.get("content-length").is_none() && !body.is_empty();
    for (name, value) in headers.iter() {
        buf.extend_from_slice(name.as_bytes());
        buf.extend_from_slice(b": ");
        buf.extend_from_slice(value.as_bytes());
        buf.extend_from_slice(b"\r\n");
    }
    if needs_content_length {
        buf.extend_from_slice(format!("Content-Length: {}\r\n", body.len()).as_bytes());
    }
    buf.extend_from_slice(b"\r\n");
    buf.extend_from_slice(body);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_simple_get() {
        let wire = b"GET /hello HTTP/1.1\r\nHost: x\r\n\r\n";
        match decode_request(wire).unwrap() {
            Decoded::Complete(req, len) => {
                assert_eq!(req.method, Method::Get);
                assert_eq!(req.target, "/hello");
                assert_eq!(len, wire.len());
            }
            Decoded::Partial => panic!("expected complete parse"),
        }
    }

    #[test]
    fn partial_head_yields_partial() {
        let wire = b"GET /hello HTTP/1.1\r\nHost: x\r\n";
        assert!(matches!(decode_request(wire).unwrap(), Decoded::Partial));
    }

    #[test]
    fn partial_body_yields_partial() {
        let wire = b"POST /x HTTP/1.1\r\nContent-Length: 5\r\n\r\nhi";
        assert!(matches!(decode_request(wire).unwrap(), Decoded::Partial));
    }

    #[test]
    fn round_trips_request_with_body() {
        let req = Request::new(Method::Post, "/echo")
            .with_header("Host", "x")
            .with_body(Bytes::from_static(b"hello"));
        let mut buf = BytesMut::new();
        encode_request(&mut buf, &req);
        let decoded = match decode_request(&buf).unwrap() {
            Decoded::Complete(r, _) => r,
            Decoded::Partial => panic!("expected complete parse"),
        };
        assert_eq!(decoded.method, Method::Post);
        assert_eq!(decoded.body, Bytes::from_static(b"hello"));
    }

    #[test]
    fn encode_response_adds_content_length() {
        let resp = Response::new(200).with_body(Bytes::from_static(b"hi"));
        let mut buf = BytesMut::new();
        encode_response(&mut buf, &resp);
        let text = String::from_utf8_lossy(&buf);
        assert!(text.starts_with("HTTP/1.1 200 OK\r\n"));
        assert!(text.contains("Content-Length: 2\r\n"));
        assert!(text.ends_with("hi"));
    }

    #[test]
    fn decodes_response() {
        let wire = b"HTTP/1.1 404 Not Found\r\nContent-Length: 0\r\n\r\n";
        match decode_response(wire).unwrap() {
            Decoded::Complete(resp, len) => {
                assert_eq!(resp.status, 404);
                assert_eq!(len, wire.len());
            }
            Decoded::Partial => panic!("expected complete parse"),
        }
    }
}
