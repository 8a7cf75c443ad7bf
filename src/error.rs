//! Unified error type for the thermostat core.
//!
//! Storage and settings failures convert into [`Error`], which adds the
//! record codec failures on top.  Rule fragments and command payloads keep
//! their own enums: they are logged and skipped where they are parsed and
//! never travel further.

use core::fmt;

use crate::app::ports::{ConfigError, StorageError};

// ---------------------------------------------------------------------------
// Top-level error
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
pub enum Error {
    /// A storage backend refused a read or write.
    Storage(StorageError),
    /// Settings failed to load or validate.
    Config(ConfigError),
    /// A stored record exists but could not be decoded.
    Decode(&'static str),
    /// The record could not be encoded for storage.
    Encode(&'static str),
}

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Storage(e) => write!(f, "storage: {e}"),
            Self::Config(e) => write!(f, "config: {e}"),
            Self::Decode(what) => write!(f, "decode: {what}"),
            Self::Encode(what) => write!(f, "encode: {what}"),
        }
    }
}

impl std::error::Error for Error {}

impl From<StorageError> for Error {
    fn from(e: StorageError) -> Self {
        Self::Storage(e)
    }
}

impl From<ConfigError> for Error {
    fn from(e: ConfigError) -> Self {
        Self::Config(e)
    }
}

// ---------------------------------------------------------------------------
// Convenience Result alias
// ---------------------------------------------------------------------------

/// Crate-wide `Result` alias.
pub type Result<T> = core::result::Result<T, Error>;
