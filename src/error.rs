// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Crate-wide error taxonomy.
//!
//! Every fallible operation in this crate returns [`Result`] so failures
//! never cross component boundaries unmanaged. A failing sub-step is folded
//! into the parent operation's error with a human-readable reason. No
//! component retries automatically; retry policy belongs to the caller.

use std::time::Duration;
use thiserror::Error;

pub type Result<T> = std::result::Result<T, Error>;

#[derive(Debug, Error)]
pub enum Error {
    /// Invalid or inconsistent configuration (wrong key kind for a codec
    /// mode, malformed config file, etc.)
    #[error("invalid configuration: {reason}")]
    Configuration { reason: String },

    /// Transport, proxy, or session-state failure.
    #[error("connectivity failure during {operation}: {reason}")]
    Connectivity { operation: String, reason: String },

    /// Encryption, decryption, signing, or key-format failure.
    #[error("crypto failure during {operation}: {reason}")]
    Crypto { operation: String, reason: String },

    /// A bounded wait elapsed before the sub-operation completed.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout { operation: String, timeout: Duration },

    /// A named record (key bundle, RPC endpoint, onion service) is absent.
    #[error("{kind} not found: {name}")]
    NotFound { kind: String, name: String },

    /// Key store I/O failure. `save` fails loudly; this is that failure.
    #[error("key store I/O failure: {0}")]
    Storage(#[from] std::io::Error),
}

impl Error {
    pub fn configuration(reason: impl Into<String>) -> Self {
        Error::Configuration {
            reason: reason.into(),
        }
    }

    pub fn connectivity(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Connectivity {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn crypto(operation: impl Into<String>, reason: impl Into<String>) -> Self {
        Error::Crypto {
            operation: operation.into(),
            reason: reason.into(),
        }
    }

    pub fn timeout(operation: impl Into<String>, timeout: Duration) -> Self {
        Error::Timeout {
            operation: operation.into(),
            timeout,
        }
    }

    pub fn not_found(kind: impl Into<String>, name: impl Into<String>) -> Self {
        Error::NotFound {
            kind: kind.into(),
            name: name.into(),
        }
    }

    /// True for the decryption/signature failures a receiver should treat
    /// as a bad or foreign message rather than a local bug.
    pub fn is_crypto(&self) -> bool {
        matches!(self, Error::Crypto { .. })
    }
}
