// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Key persistence.
//!
//! A [`KeyVault`] saves and loads [`KeyBundle`]s through a pluggable
//! [`KeyStore`] backend. Records are stored as a JSON map of logical name to
//! hex-encoded key fields. `load` fails softly (returns `None`) when a record
//! is missing or cannot be parsed; `save` fails loudly on storage I/O errors.
//!
//! [`ObfuscatedKeyVault`] additionally XOR-masks the serialized record with a
//! mask key generated at construction. The mask key lives only in memory and
//! is never persisted, so a vault created later cannot read earlier blobs.
//! This is obfuscation, not encryption; see the type docs.

use std::collections::BTreeMap;
use std::fs;
use std::path::PathBuf;
use std::sync::Mutex;

use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine;
use serde::{Deserialize, Serialize};

use crate::crypto::keys::{hex_decode, hex_encode, KeyBundle, KeyKind, KeyMaterial};
use crate::error::{Error, Result};
use crate::utils::rng::RandomSource;

/// Backend holding one opaque string value per logical name.
pub trait KeyStore: Send + Sync {
    fn put(&self, name: &str, value: &str) -> Result<()>;
    fn get(&self, name: &str) -> Result<Option<String>>;
    fn remove(&self, name: &str) -> Result<()>;
}

/// File-backed store: a single JSON object mapping names to values.
pub struct FileKeyStore {
    path: PathBuf,
}

impl FileKeyStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    fn read_map(&self) -> Result<BTreeMap<String, String>> {
        match fs::read_to_string(&self.path) {
            Ok(contents) => Ok(serde_json::from_str(&contents).unwrap_or_default()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(BTreeMap::new()),
            Err(e) => Err(e.into()),
        }
    }

    fn write_map(&self, map: &BTreeMap<String, String>) -> Result<()> {
        let contents = serde_json::to_string_pretty(map)
            .map_err(|e| Error::configuration(format!("key store serialization: {}", e)))?;
        fs::write(&self.path, contents)?;
        Ok(())
    }
}

impl KeyStore for FileKeyStore {
    fn put(&self, name: &str, value: &str) -> Result<()> {
        let mut map = self.read_map()?;
        map.insert(name.to_string(), value.to_string());
        self.write_map(&map)
    }

    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self.read_map()?.get(name).cloned())
    }

    fn remove(&self, name: &str) -> Result<()> {
        let mut map = self.read_map()?;
        if map.remove(name).is_some() {
            self.write_map(&map)?;
        }
        Ok(())
    }
}

/// In-memory store for tests and ephemeral sessions.
#[derive(Default)]
pub struct MemoryKeyStore {
    entries: Mutex<BTreeMap<String, String>>,
}

impl MemoryKeyStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl KeyStore for MemoryKeyStore {
    fn put(&self, name: &str, value: &str) -> Result<()> {
        self.entries
            .lock()
            .expect("key store lock poisoned")
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn get(&self, name: &str) -> Result<Option<String>> {
        Ok(self
            .entries
            .lock()
            .expect("key store lock poisoned")
            .get(name)
            .cloned())
    }

    fn remove(&self, name: &str) -> Result<()> {
        self.entries
            .lock()
            .expect("key store lock poisoned")
            .remove(name);
        Ok(())
    }
}

/// Persisted record shape: every field optional, hex-encoded. Public keys
/// are stored alongside the private halves so readers of the raw store can
/// share them without loading the crate.
#[derive(Debug, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StoredBundle {
    #[serde(skip_serializing_if = "Option::is_none")]
    symmetric_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    public_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signing_private_key: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    signing_public_key: Option<String>,
}

impl StoredBundle {
    fn from_bundle(bundle: &KeyBundle) -> Result<Self> {
        let mut record = StoredBundle::default();
        if let Some(sym) = &bundle.symmetric {
            record.symmetric_key = Some(sym.to_hex());
        }
        if let Some(enc) = &bundle.encryption {
            record.private_key = Some(enc.to_hex());
            record.public_key = Some(hex_encode(&enc.public_key()?));
        }
        if let Some(sig) = &bundle.signing {
            record.signing_private_key = Some(sig.to_hex());
            record.signing_public_key = Some(hex_encode(&sig.public_key()?));
        }
        Ok(record)
    }

    fn into_bundle(self) -> Result<KeyBundle> {
        let mut bundle = KeyBundle::new();
        if let Some(hex) = self.symmetric_key {
            bundle.symmetric = Some(KeyMaterial::new(KeyKind::Symmetric, hex_decode(&hex)?)?);
        }
        if let Some(hex) = self.private_key {
            bundle.encryption = Some(KeyMaterial::new(KeyKind::Encryption, hex_decode(&hex)?)?);
        }
        if let Some(hex) = self.signing_private_key {
            bundle.signing = Some(KeyMaterial::new(KeyKind::Signing, hex_decode(&hex)?)?);
        }
        Ok(bundle)
    }
}

/// Key lifecycle manager over a [`KeyStore`] backend.
pub struct KeyVault<S: KeyStore> {
    store: S,
}

impl<S: KeyStore> KeyVault<S> {
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Persist a bundle under a logical name. Storage failures propagate.
    pub fn save(&self, name: &str, bundle: &KeyBundle) -> Result<()> {
        let record = StoredBundle::from_bundle(bundle)?;
        let serialized = serde_json::to_string(&record)
            .map_err(|e| Error::configuration(format!("bundle serialization: {}", e)))?;
        self.store.put(name, &serialized)?;
        tracing::debug!(name, "key bundle saved");
        Ok(())
    }

    /// Load a bundle by name. Missing records and parse mismatches both
    /// return `Ok(None)`; only backend I/O failures propagate.
    pub fn load(&self, name: &str) -> Result<Option<KeyBundle>> {
        let Some(raw) = self.store.get(name)? else {
            return Ok(None);
        };
        let Ok(record) = serde_json::from_str::<StoredBundle>(&raw) else {
            tracing::warn!(name, "stored key bundle failed to parse, treating as absent");
            return Ok(None);
        };
        match record.into_bundle() {
            Ok(bundle) => Ok(Some(bundle)),
            Err(e) => {
                tracing::warn!(name, error = %e, "stored key bundle is malformed, treating as absent");
                Ok(None)
            }
        }
    }

    /// Remove a bundle. Removing an absent name is not an error.
    pub fn clear(&self, name: &str) -> Result<()> {
        self.store.remove(name)?;
        tracing::debug!(name, "key bundle cleared");
        Ok(())
    }
}

/// Vault variant that XOR-masks serialized records before persisting.
///
/// The mask key is drawn from the injected [`RandomSource`] at construction
/// and held only in memory. Losing the process loses the mask, which makes
/// every previously written blob unreadable (load returns `None`). This is a
/// known structural weakness of the scheme, kept deliberately: the masking
/// hides key material from casual inspection of the store, nothing more.
pub struct ObfuscatedKeyVault<S: KeyStore> {
    store: S,
    mask: [u8; 32],
}

impl<S: KeyStore> ObfuscatedKeyVault<S> {
    pub fn new(store: S, rng: &dyn RandomSource) -> Self {
        let mut mask = [0u8; 32];
        rng.fill_bytes(&mut mask);
        Self { store, mask }
    }

    fn apply_mask(&self, bytes: &mut [u8]) {
        for (i, b) in bytes.iter_mut().enumerate() {
            *b ^= self.mask[i % self.mask.len()];
        }
    }

    pub fn save(&self, name: &str, bundle: &KeyBundle) -> Result<()> {
        let record = StoredBundle::from_bundle(bundle)?;
        let mut bytes = serde_json::to_vec(&record)
            .map_err(|e| Error::configuration(format!("bundle serialization: {}", e)))?;
        self.apply_mask(&mut bytes);
        self.store.put(name, &BASE64.encode(&bytes))?;
        tracing::debug!(name, "obfuscated key bundle saved");
        Ok(())
    }

    pub fn load(&self, name: &str) -> Result<Option<KeyBundle>> {
        let Some(raw) = self.store.get(name)? else {
            return Ok(None);
        };
        let Ok(mut bytes) = BASE64.decode(raw.as_bytes()) else {
            return Ok(None);
        };
        self.apply_mask(&mut bytes);
        let Ok(record) = serde_json::from_slice::<StoredBundle>(&bytes) else {
            // Wrong mask key or corrupted blob; indistinguishable by design.
            tracing::warn!(name, "obfuscated bundle did not unmask, treating as absent");
            return Ok(None);
        };
        match record.into_bundle() {
            Ok(bundle) => Ok(Some(bundle)),
            Err(_) => Ok(None),
        }
    }

    pub fn clear(&self, name: &str) -> Result<()> {
        self.store.remove(name)
    }
}
