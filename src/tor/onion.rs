// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Onion service records.
//!
//! Service ids follow the v3 shape: 32 random bytes, base32-encoded
//! lowercase, suffixed `.onion`. Ids and keypairs are drawn from the
//! injected randomness source; uniqueness across the registry's lifetime is
//! enforced by [`crate::tor::TorConnectivityManager`].

use ed25519_dalek::SigningKey;
use serde::{Deserialize, Serialize};

use crate::utils::rng::{random_array, RandomSource};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnionServiceStatus {
    Active,
    Stopped,
}

/// A registered rendezvous endpoint reachable through the Tor network.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OnionService {
    pub service_id: String,
    /// ed25519 service identity keypair, secret seed then public key.
    pub secret_key: [u8; 32],
    pub public_key: [u8; 32],
    pub port: u16,
    pub status: OnionServiceStatus,
}

/// Generate a v3-style service id.
pub fn generate_service_id(rng: &dyn RandomSource) -> String {
    let raw: [u8; 32] = random_array(rng);
    let encoded = data_encoding::BASE32_NOPAD.encode(&raw).to_lowercase();
    format!("{}.onion", encoded)
}

/// Generate a fresh ed25519 service keypair from the injected source.
pub fn generate_service_keypair(rng: &dyn RandomSource) -> ([u8; 32], [u8; 32]) {
    let seed: [u8; 32] = random_array(rng);
    let signing = SigningKey::from_bytes(&seed);
    (seed, signing.verifying_key().to_bytes())
}
