// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Topic-scoped message encoding and decoding.
//!
//! A codec pairs a key mode with a content topic and turns payloads into
//! opaque authenticated blobs. When a signing key is configured the payload
//! is signed first and the signature travels inside the encrypted envelope
//! (sign-then-encrypt, in both key modes), so the AEAD tag covers it and the
//! transport never sees signer identity.
//!
//! The codec does not enforce topic matching on decode. Topic routing is the
//! transport's contract; the topic in the envelope is advisory metadata.
//!
//! ## Wire layout
//!
//! Outer envelope (bincode): `{version, topic, ciphertext, timestamp_ms}`.
//! Ciphertext layout depends on the key mode:
//! - Symmetric: `nonce (24) || aead_ciphertext`
//! - ECIES: `ephemeral_pub (33) || nonce (24) || aead_ciphertext`
//!
//! Inner envelope (bincode, encrypted): `{payload, signature?, signer_public_key?}`.

use std::sync::Arc;

use chacha20poly1305::aead::{Aead, KeyInit};
use chacha20poly1305::{XChaCha20Poly1305, XNonce};
use hkdf::Hkdf;
use k256::ecdsa::signature::Signer;
use k256::ecdsa::{Signature, SigningKey};
use k256::elliptic_curve::sec1::{FromEncodedPoint, ToEncodedPoint};
use k256::{EncodedPoint, PublicKey, SecretKey};
use serde::{Deserialize, Serialize};
use sha2::Sha256;

use crate::crypto::keys::{normalize_public_key, KeyKind, KeyMaterial, PUBLIC_KEY_SIZE};
use crate::error::{Error, Result};
use crate::utils::rng::{random_array, RandomSource};

/// Envelope version; bump on incompatible layout changes.
const ENVELOPE_VERSION: u8 = 1;

/// XChaCha20-Poly1305 nonce size in bytes.
const NONCE_SIZE: usize = 24;

/// How the codec encrypts and decrypts.
#[derive(Clone)]
pub enum KeyMode {
    /// Shared secret; the same configuration encodes and decodes.
    Symmetric(KeyMaterial),
    /// ECIES encode side: encrypt to the recipient's public key.
    AsymmetricEncrypt { recipient_public: Vec<u8> },
    /// ECIES decode side: decrypt with the local private key.
    AsymmetricDecrypt { private: KeyMaterial },
}

/// Full codec configuration: topic, key mode, optional signing key.
#[derive(Clone)]
pub struct CodecConfig {
    pub topic: String,
    pub mode: KeyMode,
    pub signing_key: Option<KeyMaterial>,
}

impl CodecConfig {
    pub fn symmetric(topic: impl Into<String>, key: KeyMaterial) -> Self {
        Self {
            topic: topic.into(),
            mode: KeyMode::Symmetric(key),
            signing_key: None,
        }
    }

    pub fn asymmetric_encrypt(topic: impl Into<String>, recipient_public: Vec<u8>) -> Self {
        Self {
            topic: topic.into(),
            mode: KeyMode::AsymmetricEncrypt { recipient_public },
            signing_key: None,
        }
    }

    pub fn asymmetric_decrypt(topic: impl Into<String>, private: KeyMaterial) -> Self {
        Self {
            topic: topic.into(),
            mode: KeyMode::AsymmetricDecrypt { private },
            signing_key: None,
        }
    }

    pub fn with_signing_key(mut self, key: KeyMaterial) -> Self {
        self.signing_key = Some(key);
        self
    }
}

/// Versioned outer envelope carried on the wire.
#[derive(Debug, Serialize, Deserialize)]
struct OuterEnvelope {
    version: u8,
    topic: String,
    ciphertext: Vec<u8>,
    timestamp_ms: i64,
}

/// Plaintext envelope protected by the AEAD.
#[derive(Debug, Serialize, Deserialize)]
struct InnerEnvelope {
    payload: Vec<u8>,
    signature: Option<Vec<u8>>,
    signer_public_key: Option<Vec<u8>>,
}

/// Result of decoding a blob.
///
/// The embedded `signer_public_key` is advisory only: it authenticates
/// nothing until checked against an out-of-band-known key with
/// [`crate::crypto::verify::verify_signature`].
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedMessage {
    pub payload: Vec<u8>,
    pub signature: Option<Vec<u8>>,
    pub signer_public_key: Option<Vec<u8>>,
    pub timestamp_ms: i64,
}

/// Topic-scoped encoder/decoder.
#[derive(Clone)]
pub struct MessageCodec {
    config: CodecConfig,
    rng: Arc<dyn RandomSource>,
}

impl MessageCodec {
    /// Build a codec, validating that the configured keys match their roles.
    pub fn new(config: CodecConfig, rng: Arc<dyn RandomSource>) -> Result<Self> {
        if config.topic.is_empty() {
            return Err(Error::configuration("codec topic must not be empty"));
        }
        match &config.mode {
            KeyMode::Symmetric(key) => {
                if key.kind() != KeyKind::Symmetric {
                    return Err(Error::configuration(
                        "symmetric mode requires symmetric key material",
                    ));
                }
            }
            KeyMode::AsymmetricEncrypt { recipient_public } => {
                normalize_public_key(recipient_public)
                    .map_err(|e| Error::configuration(format!("recipient public key: {}", e)))?;
            }
            KeyMode::AsymmetricDecrypt { private } => {
                if private.kind() != KeyKind::Encryption {
                    return Err(Error::configuration(
                        "asymmetric decrypt mode requires encryption key material",
                    ));
                }
            }
        }
        if let Some(signing) = &config.signing_key {
            if signing.kind() != KeyKind::Signing {
                return Err(Error::configuration(
                    "signing key must be signing key material",
                ));
            }
        }
        Ok(Self { config, rng })
    }

    pub fn topic(&self) -> &str {
        &self.config.topic
    }

    /// Encrypt (and optionally sign) a payload into an opaque blob.
    pub fn encode(&self, payload: &[u8]) -> Result<Vec<u8>> {
        let inner = self.build_inner(payload)?;
        let inner_bytes = bincode::serialize(&inner)
            .map_err(|e| Error::crypto("encode", format!("envelope serialization: {}", e)))?;

        let ciphertext = match &self.config.mode {
            KeyMode::Symmetric(key) => {
                let nonce: [u8; NONCE_SIZE] = random_array(self.rng.as_ref());
                let sealed = seal(key.as_bytes(), &nonce, &inner_bytes)?;
                let mut out = nonce.to_vec();
                out.extend_from_slice(&sealed);
                out
            }
            KeyMode::AsymmetricEncrypt { recipient_public } => {
                self.ecies_seal(recipient_public, &inner_bytes)?
            }
            KeyMode::AsymmetricDecrypt { .. } => {
                return Err(Error::configuration(
                    "codec configured for asymmetric decrypt cannot encode",
                ));
            }
        };

        let outer = OuterEnvelope {
            version: ENVELOPE_VERSION,
            topic: self.config.topic.clone(),
            ciphertext,
            timestamp_ms: chrono::Utc::now().timestamp_millis(),
        };
        bincode::serialize(&outer)
            .map_err(|e| Error::crypto("encode", format!("envelope serialization: {}", e)))
    }

    /// Decrypt a blob and surface its signature metadata.
    ///
    /// Fails with a crypto error on key mismatch or corrupted input; the
    /// AEAD authentication tag makes the two indistinguishable.
    pub fn decode(&self, blob: &[u8]) -> Result<DecodedMessage> {
        let outer: OuterEnvelope = bincode::deserialize(blob)
            .map_err(|e| Error::crypto("decode", format!("malformed envelope: {}", e)))?;
        if outer.version != ENVELOPE_VERSION {
            return Err(Error::crypto(
                "decode",
                format!("unsupported envelope version {}", outer.version),
            ));
        }

        let inner_bytes = match &self.config.mode {
            KeyMode::Symmetric(key) => {
                if outer.ciphertext.len() <= NONCE_SIZE {
                    return Err(Error::crypto("decode", "ciphertext too short"));
                }
                let (nonce, sealed) = outer.ciphertext.split_at(NONCE_SIZE);
                open(key.as_bytes(), nonce, sealed)?
            }
            KeyMode::AsymmetricDecrypt { private } => {
                self.ecies_open(private, &outer.ciphertext)?
            }
            KeyMode::AsymmetricEncrypt { .. } => {
                return Err(Error::configuration(
                    "codec configured for asymmetric encrypt cannot decode",
                ));
            }
        };

        let inner: InnerEnvelope = bincode::deserialize(&inner_bytes)
            .map_err(|e| Error::crypto("decode", format!("malformed inner envelope: {}", e)))?;

        Ok(DecodedMessage {
            payload: inner.payload,
            signature: inner.signature,
            signer_public_key: inner.signer_public_key,
            timestamp_ms: outer.timestamp_ms,
        })
    }

    fn build_inner(&self, payload: &[u8]) -> Result<InnerEnvelope> {
        let Some(signing) = &self.config.signing_key else {
            return Ok(InnerEnvelope {
                payload: payload.to_vec(),
                signature: None,
                signer_public_key: None,
            });
        };
        let signing_key = SigningKey::from_slice(signing.as_bytes())
            .map_err(|e| Error::crypto("sign", format!("invalid signing key: {}", e)))?;
        let signature: Signature = signing_key.sign(payload);
        let signer_public = signing.public_key()?;
        Ok(InnerEnvelope {
            payload: payload.to_vec(),
            signature: Some(signature.to_bytes().to_vec()),
            signer_public_key: Some(signer_public),
        })
    }

    /// ECIES seal: fresh ephemeral keypair, ECDH with the recipient key,
    /// HKDF-SHA256 to a 32-byte AEAD key.
    fn ecies_seal(&self, recipient_public: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
        let recipient = parse_public_key(recipient_public)?;
        let ephemeral = loop {
            let candidate: [u8; 32] = random_array(self.rng.as_ref());
            if let Ok(secret) = SecretKey::from_slice(&candidate) {
                break secret;
            }
        };
        let ephemeral_pub = ephemeral
            .public_key()
            .to_encoded_point(true)
            .as_bytes()
            .to_vec();

        let shared =
            k256::ecdh::diffie_hellman(ephemeral.to_nonzero_scalar(), recipient.as_affine());
        let key = derive_aead_key(shared.raw_secret_bytes())?;

        let nonce: [u8; NONCE_SIZE] = random_array(self.rng.as_ref());
        let sealed = seal(&key, &nonce, plaintext)?;

        let mut out = ephemeral_pub;
        out.extend_from_slice(&nonce);
        out.extend_from_slice(&sealed);
        Ok(out)
    }

    fn ecies_open(&self, private: &KeyMaterial, ciphertext: &[u8]) -> Result<Vec<u8>> {
        if ciphertext.len() <= PUBLIC_KEY_SIZE + NONCE_SIZE {
            return Err(Error::crypto("decode", "ciphertext too short"));
        }
        let (eph_pub_bytes, rest) = ciphertext.split_at(PUBLIC_KEY_SIZE);
        let (nonce, sealed) = rest.split_at(NONCE_SIZE);

        let ephemeral_pub = parse_public_key(eph_pub_bytes)?;
        let secret = SecretKey::from_slice(private.as_bytes())
            .map_err(|e| Error::crypto("decode", format!("invalid private key: {}", e)))?;

        let shared =
            k256::ecdh::diffie_hellman(secret.to_nonzero_scalar(), ephemeral_pub.as_affine());
        let key = derive_aead_key(shared.raw_secret_bytes())?;

        open(&key, nonce, sealed)
    }
}

fn parse_public_key(bytes: &[u8]) -> Result<PublicKey> {
    let point = EncodedPoint::from_bytes(bytes)
        .map_err(|e| Error::crypto("parse public key", format!("malformed point: {}", e)))?;
    let parsed = PublicKey::from_encoded_point(&point);
    if parsed.is_some().into() {
        Ok(parsed.unwrap())
    } else {
        Err(Error::crypto("parse public key", "invalid curve point"))
    }
}

fn derive_aead_key(shared_secret: &[u8]) -> Result<[u8; 32]> {
    let hkdf = Hkdf::<Sha256>::new(None, shared_secret);
    let mut key = [0u8; 32];
    hkdf.expand(&[], &mut key)
        .map_err(|e| Error::crypto("key derivation", format!("HKDF expansion failed: {}", e)))?;
    Ok(key)
}

fn seal(key: &[u8], nonce: &[u8], plaintext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::crypto("encrypt", format!("invalid key: {}", e)))?;
    cipher
        .encrypt(XNonce::from_slice(nonce), plaintext)
        .map_err(|e| Error::crypto("encrypt", format!("AEAD failure: {}", e)))
}

fn open(key: &[u8], nonce: &[u8], ciphertext: &[u8]) -> Result<Vec<u8>> {
    let cipher = XChaCha20Poly1305::new_from_slice(key)
        .map_err(|e| Error::crypto("decrypt", format!("invalid key: {}", e)))?;
    cipher
        .decrypt(XNonce::from_slice(nonce), ciphertext)
        .map_err(|_| Error::crypto("decrypt", "authentication failed (wrong key or corrupted input)"))
}
