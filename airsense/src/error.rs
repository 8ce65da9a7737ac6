// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense - Error types

use core::fmt;

use airsense_ws::{FrameError, HandshakeError};

/// airsense firmware error type
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AirsenseError {
    /// A listener's upgrade request was rejected
    Handshake(HandshakeError),

    /// A listener broke the WebSocket protocol
    Protocol(FrameError),

    /// Other airsense errors
    Airsense(ErrorKind),
}

impl fmt::Display for AirsenseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            AirsenseError::Handshake(e) => write!(f, "handshake failed: {e}"),
            AirsenseError::Protocol(e) => write!(f, "protocol error: {e}"),
            AirsenseError::Airsense(kind) => write!(f, "{kind}"),
        }
    }
}

/// AirsenseError::Airsense error kinds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    Network,
    Timeout,
    TooLarge,
    NoSubscriber,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Network => write!(f, "network error"),
            ErrorKind::Timeout => write!(f, "timeout"),
            ErrorKind::TooLarge => write!(f, "request too large"),
            ErrorKind::NoSubscriber => write!(f, "no record subscriber available"),
        }
    }
}

impl From<embassy_net::tcp::Error> for AirsenseError {
    fn from(_error: embassy_net::tcp::Error) -> Self {
        AirsenseError::Airsense(ErrorKind::Network)
    }
}

impl From<HandshakeError> for AirsenseError {
    fn from(error: HandshakeError) -> Self {
        AirsenseError::Handshake(error)
    }
}

impl From<FrameError> for AirsenseError {
    fn from(error: FrameError) -> Self {
        AirsenseError::Protocol(error)
    }
}
