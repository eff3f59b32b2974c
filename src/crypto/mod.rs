// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Privacy-preserving message crypto.
//!
//! This module implements the key lifecycle and the encode/decode protocol:
//!
//! - **Keys**: symmetric, encryption (secp256k1), and signing (secp256k1)
//!   material with public-key derivation and lossless hex round trips
//! - **Vault**: named key bundles over a pluggable persisted store, with an
//!   XOR-obfuscated variant whose mask key never leaves memory
//! - **Codec**: topic-scoped sign-then-encrypt envelopes (XChaCha20-Poly1305,
//!   shared-key or ECIES-style)
//! - **Verify**: binding an embedded signature to an out-of-band-known key
//!
//! ## Security Considerations
//!
//! - Nonces and ephemeral keys are fresh per encode, drawn from the injected
//!   randomness source
//! - A decoded message's embedded signer key authorizes nothing until
//!   verified against a key known out of band
//! - The obfuscated vault hides bytes from casual inspection only; its mask
//!   key is in-memory and unrecoverable across restarts

pub mod codec;
pub mod keys;
pub mod vault;
pub mod verify;

pub use codec::{CodecConfig, DecodedMessage, KeyMode, MessageCodec};
pub use keys::{
    generate_private, generate_symmetric, hex_decode, hex_encode, KeyBundle, KeyKind, KeyMaterial,
};
pub use vault::{FileKeyStore, KeyStore, KeyVault, MemoryKeyStore, ObfuscatedKeyVault};
pub use verify::{
    verify_signature, Verification, REASON_INVALID_SIGNATURE, REASON_NO_SIGNATURE,
};
