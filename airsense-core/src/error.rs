// Copyright (C) 2025 Piers Finlayson <piers@piers.rocks>
//
// MIT License

//! airsense-core - Error types

use core::fmt;

/// airsense-core error type
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Error {
    /// The network never reported association within the retry policy
    AssociationTimeout { attempts: u32 },
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Error::AssociationTimeout { attempts } => {
                write!(f, "Network association timed out after {attempts} attempts")
            }
        }
    }
}
