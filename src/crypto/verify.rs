// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Signature verification for decoded messages.
//!
//! A decoded message's embedded signer key is advisory only. Verification
//! binds it to a key the caller knows out of band: the result is valid only
//! when a signature is present, the embedded key equals the expected key,
//! and the ECDSA signature verifies over the payload.
//!
//! "no signature" and "invalid signature" are distinct outcomes so callers
//! can reject forged messages while merely downgrading unsigned ones.

use k256::ecdsa::signature::Verifier;
use k256::ecdsa::{Signature, VerifyingKey};

use crate::crypto::codec::DecodedMessage;
use crate::crypto::keys::normalize_public_key;

/// Outcome of a missing signature.
pub const REASON_NO_SIGNATURE: &str = "no signature";

/// Outcome of a present but unverifiable signature (wrong signer key,
/// malformed bytes, or a signature that does not cover the payload).
pub const REASON_INVALID_SIGNATURE: &str = "invalid signature";

/// Verification verdict with a reason on failure.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Verification {
    pub is_valid: bool,
    pub reason: Option<&'static str>,
}

impl Verification {
    fn valid() -> Self {
        Self {
            is_valid: true,
            reason: None,
        }
    }

    fn invalid(reason: &'static str) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
        }
    }
}

/// Verify a decoded message against the expected signer public key.
///
/// `expected_public_key` accepts compressed (33-byte) or uncompressed
/// (65-byte) SEC1 encoding.
pub fn verify_signature(decoded: &DecodedMessage, expected_public_key: &[u8]) -> Verification {
    let Some(signature_bytes) = &decoded.signature else {
        return Verification::invalid(REASON_NO_SIGNATURE);
    };

    // Both keys are normalized to compressed form before comparison so the
    // encoding a peer chose cannot affect the verdict.
    let Ok(expected) = normalize_public_key(expected_public_key) else {
        return Verification::invalid(REASON_INVALID_SIGNATURE);
    };
    let embedded = match &decoded.signer_public_key {
        Some(bytes) => match normalize_public_key(bytes) {
            Ok(normalized) => normalized,
            Err(_) => return Verification::invalid(REASON_INVALID_SIGNATURE),
        },
        None => return Verification::invalid(REASON_INVALID_SIGNATURE),
    };
    if embedded != expected {
        return Verification::invalid(REASON_INVALID_SIGNATURE);
    }

    let Ok(verifying_key) = VerifyingKey::from_sec1_bytes(&expected) else {
        return Verification::invalid(REASON_INVALID_SIGNATURE);
    };
    let Ok(signature) = Signature::from_slice(signature_bytes) else {
        return Verification::invalid(REASON_INVALID_SIGNATURE);
    };

    match verifying_key.verify(&decoded.payload, &signature) {
        Ok(()) => Verification::valid(),
        Err(_) => Verification::invalid(REASON_INVALID_SIGNATURE),
    }
}
