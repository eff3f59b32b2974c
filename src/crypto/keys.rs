// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Key material generation and encoding.
//!
//! Three key kinds exist: a 32-byte symmetric key, a secp256k1 encryption
//! private key, and a secp256k1 signing private key. Public keys are derived
//! on demand as 33-byte compressed SEC1 points. All generation draws from an
//! injected [`RandomSource`].

use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{EncodedPoint, PublicKey, SecretKey};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::utils::rng::{random_array, RandomSource};

/// Size of secret key material for every kind, in bytes.
pub const SECRET_KEY_SIZE: usize = 32;

/// Size of a compressed SEC1 public key, in bytes.
pub const PUBLIC_KEY_SIZE: usize = 33;

/// What a piece of key material is for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum KeyKind {
    /// Shared secret used for both encryption and decryption.
    Symmetric,
    /// secp256k1 private key for ECIES-style encryption.
    Encryption,
    /// secp256k1 private key for ECDSA signatures.
    Signing,
}

/// Fixed-size secret key bytes tagged with their kind.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyMaterial {
    kind: KeyKind,
    bytes: Vec<u8>,
}

impl KeyMaterial {
    /// Wrap raw bytes as key material, validating the kind's fixed size.
    ///
    /// For the asymmetric kinds the bytes must also be a valid secp256k1
    /// scalar.
    pub fn new(kind: KeyKind, bytes: Vec<u8>) -> Result<Self> {
        if bytes.len() != SECRET_KEY_SIZE {
            return Err(Error::crypto(
                "key material",
                format!(
                    "invalid key size: expected {} bytes, got {}",
                    SECRET_KEY_SIZE,
                    bytes.len()
                ),
            ));
        }
        if kind != KeyKind::Symmetric {
            SecretKey::from_slice(&bytes).map_err(|e| {
                Error::crypto("key material", format!("invalid secp256k1 scalar: {}", e))
            })?;
        }
        Ok(Self { kind, bytes })
    }

    pub fn kind(&self) -> KeyKind {
        self.kind
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.bytes
    }

    pub fn to_hex(&self) -> String {
        hex_encode(&self.bytes)
    }

    /// Derive the compressed public key for Encryption/Signing material.
    ///
    /// Fails for symmetric keys, which have no public half.
    pub fn public_key(&self) -> Result<Vec<u8>> {
        if self.kind == KeyKind::Symmetric {
            return Err(Error::crypto(
                "derive public key",
                "symmetric keys have no public half",
            ));
        }
        let secret = SecretKey::from_slice(&self.bytes)
            .map_err(|e| Error::crypto("derive public key", format!("invalid private key: {}", e)))?;
        Ok(secret.public_key().to_encoded_point(true).as_bytes().to_vec())
    }
}

/// Generate a fresh 32-byte symmetric key.
pub fn generate_symmetric(rng: &dyn RandomSource) -> KeyMaterial {
    let bytes: [u8; SECRET_KEY_SIZE] = random_array(rng);
    KeyMaterial {
        kind: KeyKind::Symmetric,
        bytes: bytes.to_vec(),
    }
}

/// Generate a fresh secp256k1 private key of the given kind.
///
/// Candidate bytes outside the curve order are rejected and redrawn; the
/// loop terminates almost immediately in practice (rejection odds < 2^-128).
pub fn generate_private(rng: &dyn RandomSource, kind: KeyKind) -> Result<KeyMaterial> {
    if kind == KeyKind::Symmetric {
        return Err(Error::crypto(
            "generate private key",
            "symmetric keys are generated with generate_symmetric",
        ));
    }
    loop {
        let candidate: [u8; SECRET_KEY_SIZE] = random_array(rng);
        if SecretKey::from_slice(&candidate).is_ok() {
            return Ok(KeyMaterial {
                kind,
                bytes: candidate.to_vec(),
            });
        }
    }
}

/// Parse a compressed or uncompressed SEC1 public key, returning the
/// compressed 33-byte form.
pub fn normalize_public_key(bytes: &[u8]) -> Result<Vec<u8>> {
    if bytes.len() != 33 && bytes.len() != 65 {
        return Err(Error::crypto(
            "parse public key",
            format!("expected 33 or 65 bytes, got {}", bytes.len()),
        ));
    }
    let point = EncodedPoint::from_bytes(bytes)
        .map_err(|e| Error::crypto("parse public key", format!("malformed point: {}", e)))?;
    let parsed = PublicKey::from_encoded_point(&point);
    if parsed.is_some().into() {
        let parsed = parsed.unwrap();
        Ok(parsed.to_encoded_point(true).as_bytes().to_vec())
    } else {
        Err(Error::crypto("parse public key", "invalid curve point"))
    }
}

/// Lossless byte-to-hex encoding.
pub fn hex_encode(bytes: &[u8]) -> String {
    hex::encode(bytes)
}

/// Exact inverse of [`hex_encode`].
pub fn hex_decode(s: &str) -> Result<Vec<u8>> {
    hex::decode(s).map_err(|e| Error::crypto("hex decode", e.to_string()))
}

/// Up to three pieces of key material addressed by one logical name in the
/// vault: a symmetric key, an encryption keypair, and a signing keypair.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct KeyBundle {
    pub symmetric: Option<KeyMaterial>,
    pub encryption: Option<KeyMaterial>,
    pub signing: Option<KeyMaterial>,
}

impl KeyBundle {
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a bundle containing all three key kinds.
    pub fn generate_full(rng: &dyn RandomSource) -> Result<Self> {
        Ok(Self {
            symmetric: Some(generate_symmetric(rng)),
            encryption: Some(generate_private(rng, KeyKind::Encryption)?),
            signing: Some(generate_private(rng, KeyKind::Signing)?),
        })
    }

    pub fn is_empty(&self) -> bool {
        self.symmetric.is_none() && self.encryption.is_none() && self.signing.is_none()
    }
}
