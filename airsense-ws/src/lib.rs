// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense is a tiny WiFi air quality station.
//!
//! airsense-ws - The server side of the WebSocket protocol (RFC 6455), as
//! much of it as airsense needs to push records to listeners:
//!
//! - [`handshake`] - parses the HTTP upgrade request and builds the
//!   response.
//! - [`frame`] - encodes server frames and decodes client frames.
//!
//! This crate does no I/O.  The firmware reads bytes from its sockets, hands
//! them to this crate, and writes back whatever it is given.
//!
//! This crate is `no_std` and platform agnostic, and requires an `alloc`
//! implementation.

#![cfg_attr(not(test), no_std)]

extern crate alloc;

pub mod frame;
pub mod handshake;

pub use frame::{Frame, FrameError, Opcode, decode, encode, encode_close, truncate};
pub use handshake::{
    HandshakeError, Upgrade, accept_key, parse_upgrade, reject_response, upgrade_response,
};

/// GUID appended to the client's key when computing `Sec-WebSocket-Accept`.
pub const GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

/// The only protocol version supported.
pub const VERSION: &str = "13";

/// Maximum number of headers accepted in an upgrade request.
pub const MAX_HEADERS: usize = 32;

/// Largest payload accepted in a client frame.  Listeners are not expected
/// to send anything of substance.
pub const MAX_PAYLOAD: usize = 1024;

/// Largest payload permitted in a control frame.
pub const MAX_CONTROL_PAYLOAD: usize = 125;

/// Close status code sent on a normal close.
pub const CLOSE_NORMAL: u16 = 1000;

/// Close status code sent when a client violates the protocol.
pub const CLOSE_PROTOCOL_ERROR: u16 = 1002;

/// Close status code sent when a client frame is too large.
pub const CLOSE_TOO_BIG: u16 = 1009;
