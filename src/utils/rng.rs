// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Injected randomness capability.
//!
//! Key material, nonces, and service identifiers are all drawn through
//! [`RandomSource`] rather than a global generator, so tests can inject a
//! deterministic source and production injects the OS CSPRNG.

use rand::rngs::OsRng;
use rand::RngCore;

/// Source of cryptographically secure random bytes.
pub trait RandomSource: Send + Sync {
    fn fill_bytes(&self, dest: &mut [u8]);
}

/// Production randomness backed by the operating system CSPRNG.
#[derive(Debug, Clone, Copy, Default)]
pub struct OsRandom;

impl RandomSource for OsRandom {
    fn fill_bytes(&self, dest: &mut [u8]) {
        OsRng.fill_bytes(dest);
    }
}

/// Draw a fixed-size array from a [`RandomSource`].
pub fn random_array<const N: usize>(rng: &dyn RandomSource) -> [u8; N] {
    let mut out = [0u8; N];
    rng.fill_bytes(&mut out);
    out
}
