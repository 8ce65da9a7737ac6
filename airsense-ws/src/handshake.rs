// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-ws - Opening handshake
//!
//! A listener opens a connection with an HTTP/1.1 `GET` carrying
//! `Upgrade: websocket`, `Connection: Upgrade`, `Sec-WebSocket-Version: 13`
//! and a `Sec-WebSocket-Key`.  The server answers `101 Switching Protocols`
//! with a `Sec-WebSocket-Accept` derived from the key, after which both
//! sides exchange frames.

use alloc::format;
use alloc::string::String;
use base64::prelude::*;
use core::fmt;
#[allow(unused_imports)]
use log::{debug, error, info, trace, warn};
use sha1::{Digest, Sha1};

use crate::{GUID, MAX_HEADERS, VERSION};

/// A parsed upgrade request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Upgrade<'a> {
    /// Requested path
    pub path: &'a str,

    /// Value of `Sec-WebSocket-Key`
    pub key: &'a str,

    /// Length of the request head, including the terminating blank line.
    /// Any bytes after this are the client's first frames.
    pub header_len: usize,
}

/// Reasons an upgrade request was rejected
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HandshakeError {
    /// The request head has not been fully received yet
    Incomplete,

    /// Not a valid HTTP request
    Malformed,

    /// Not a GET request
    Method,

    /// Missing or wrong `Upgrade` or `Connection` header
    NotUpgrade,

    /// Missing or unsupported `Sec-WebSocket-Version`
    Version,

    /// Missing `Sec-WebSocket-Key`
    MissingKey,
}

impl fmt::Display for HandshakeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            HandshakeError::Incomplete => write!(f, "Incomplete request"),
            HandshakeError::Malformed => write!(f, "Malformed request"),
            HandshakeError::Method => write!(f, "Invalid method"),
            HandshakeError::NotUpgrade => write!(f, "Not a WebSocket upgrade"),
            HandshakeError::Version => write!(f, "Unsupported WebSocket version"),
            HandshakeError::MissingKey => write!(f, "Missing WebSocket key"),
        }
    }
}

/// Parses an upgrade request from `buf`.
///
/// Returns:
/// - `Ok(Upgrade)` if `buf` starts with a complete, valid, upgrade request
/// - `Err(HandshakeError::Incomplete)` if more bytes are needed
/// - `Err(HandshakeError)` if the request is not a valid upgrade
pub fn parse_upgrade(buf: &[u8]) -> Result<Upgrade<'_>, HandshakeError> {
    let mut headers = [httparse::EMPTY_HEADER; MAX_HEADERS];
    let mut req = httparse::Request::new(&mut headers);
    let header_len = match req.parse(buf) {
        Ok(httparse::Status::Complete(len)) => len,
        Ok(httparse::Status::Partial) => return Err(HandshakeError::Incomplete),
        Err(e) => {
            debug!("ws:    Failed to parse upgrade request: {e}");
            return Err(HandshakeError::Malformed);
        }
    };

    let (method, path) = match (req.method, req.path) {
        (Some(method), Some(path)) => (method, path),
        _ => return Err(HandshakeError::Malformed),
    };
    if method != "GET" {
        return Err(HandshakeError::Method);
    }

    let upgrade = header_value(req.headers, "upgrade")
        .is_some_and(|value| value.eq_ignore_ascii_case("websocket"));
    let connection = header_value(req.headers, "connection").is_some_and(|value| {
        value
            .split(',')
            .any(|token| token.trim().eq_ignore_ascii_case("upgrade"))
    });
    if !upgrade || !connection {
        return Err(HandshakeError::NotUpgrade);
    }

    if header_value(req.headers, "sec-websocket-version") != Some(VERSION) {
        return Err(HandshakeError::Version);
    }

    let key = header_value(req.headers, "sec-websocket-key")
        .filter(|key| !key.is_empty())
        .ok_or(HandshakeError::MissingKey)?;

    Ok(Upgrade {
        path,
        key,
        header_len,
    })
}

// Finds a header by case-insensitive name, returning its trimmed value.
fn header_value<'b>(headers: &[httparse::Header<'b>], name: &str) -> Option<&'b str> {
    headers
        .iter()
        .find(|h| h.name.eq_ignore_ascii_case(name))
        .and_then(|h| core::str::from_utf8(h.value).ok())
        .map(str::trim)
}

/// Computes the `Sec-WebSocket-Accept` value for a client's key.
pub fn accept_key(key: &str) -> String {
    let mut hasher = Sha1::new();
    hasher.update(key.as_bytes());
    hasher.update(GUID.as_bytes());
    BASE64_STANDARD.encode(hasher.finalize())
}

/// Builds the `101 Switching Protocols` response for a client's key.
pub fn upgrade_response(key: &str) -> String {
    format!(
        "HTTP/1.1 101 Switching Protocols\r\n\
         Upgrade: websocket\r\n\
         Connection: Upgrade\r\n\
         Sec-WebSocket-Accept: {}\r\n\
         \r\n",
        accept_key(key)
    )
}

/// Returns the response to send, before closing the connection, when an
/// upgrade request is rejected.
pub fn reject_response(error: &HandshakeError) -> &'static str {
    match error {
        HandshakeError::Method => {
            "HTTP/1.1 405 Method Not Allowed\r\n\
             Allow: GET\r\n\
             Connection: close\r\n\
             Content-Length: 0\r\n\
             \r\n"
        }
        HandshakeError::NotUpgrade | HandshakeError::Version => {
            "HTTP/1.1 426 Upgrade Required\r\n\
             Upgrade: websocket\r\n\
             Sec-WebSocket-Version: 13\r\n\
             Connection: close\r\n\
             Content-Length: 0\r\n\
             \r\n"
        }
        HandshakeError::Incomplete | HandshakeError::Malformed | HandshakeError::MissingKey => {
            "HTTP/1.1 400 Bad Request\r\n\
             Connection: close\r\n\
             Content-Length: 0\r\n\
             \r\n"
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const REQUEST: &[u8] = b"GET / HTTP/1.1\r\n\
        Host: 192.168.1.20:81\r\n\
        Upgrade: websocket\r\n\
        Connection: keep-alive, Upgrade\r\n\
        Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
        Sec-WebSocket-Version: 13\r\n\
        \r\n";

    #[test]
    fn accept_key_matches_rfc_sample() {
        assert_eq!(
            accept_key("dGhlIHNhbXBsZSBub25jZQ=="),
            "s3pPLMBiTxaQ9kYGzzhZRbK+xOo="
        );
    }

    #[test]
    fn parses_upgrade_request() {
        let upgrade = parse_upgrade(REQUEST).unwrap();
        assert_eq!(upgrade.path, "/");
        assert_eq!(upgrade.key, "dGhlIHNhbXBsZSBub25jZQ==");
        assert_eq!(upgrade.header_len, REQUEST.len());
    }

    #[test]
    fn header_len_excludes_trailing_frame_bytes() {
        let mut buf = REQUEST.to_vec();
        buf.extend_from_slice(&[0x81, 0x80]);
        let upgrade = parse_upgrade(&buf).unwrap();
        assert_eq!(upgrade.header_len, REQUEST.len());
    }

    #[test]
    fn partial_request_is_incomplete() {
        assert_eq!(
            parse_upgrade(&REQUEST[..40]),
            Err(HandshakeError::Incomplete)
        );
    }

    #[test]
    fn rejects_non_get() {
        let request = b"POST / HTTP/1.1\r\nUpgrade: websocket\r\n\r\n";
        assert_eq!(parse_upgrade(request), Err(HandshakeError::Method));
    }

    #[test]
    fn rejects_plain_http() {
        let request = b"GET / HTTP/1.1\r\nHost: airsense\r\n\r\n";
        assert_eq!(parse_upgrade(request), Err(HandshakeError::NotUpgrade));
    }

    #[test]
    fn rejects_wrong_version() {
        let request = b"GET / HTTP/1.1\r\n\
            Upgrade: WebSocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Key: dGhlIHNhbXBsZSBub25jZQ==\r\n\
            Sec-WebSocket-Version: 8\r\n\
            \r\n";
        assert_eq!(parse_upgrade(request), Err(HandshakeError::Version));
    }

    #[test]
    fn rejects_missing_key() {
        let request = b"GET / HTTP/1.1\r\n\
            Upgrade: websocket\r\n\
            Connection: Upgrade\r\n\
            Sec-WebSocket-Version: 13\r\n\
            \r\n";
        assert_eq!(parse_upgrade(request), Err(HandshakeError::MissingKey));
    }

    #[test]
    fn rejects_garbage() {
        assert_eq!(
            parse_upgrade(b"\x00\x01\x02 nonsense\r\n\r\n"),
            Err(HandshakeError::Malformed)
        );
    }

    #[test]
    fn response_carries_accept_key() {
        let response = upgrade_response("dGhlIHNhbXBsZSBub25jZQ==");
        assert!(response.starts_with("HTTP/1.1 101 Switching Protocols\r\n"));
        assert!(response.contains("Sec-WebSocket-Accept: s3pPLMBiTxaQ9kYGzzhZRbK+xOo=\r\n"));
        assert!(response.ends_with("\r\n\r\n"));
    }

    #[test]
    fn reject_responses() {
        assert!(reject_response(&HandshakeError::Method).starts_with("HTTP/1.1 405"));
        assert!(reject_response(&HandshakeError::Version).starts_with("HTTP/1.1 426"));
        assert!(reject_response(&HandshakeError::Malformed).starts_with("HTTP/1.1 400"));
    }
}
