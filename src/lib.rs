// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
pub mod config;
pub mod crypto;
pub mod error;
pub mod node;
pub mod tor;
pub mod utils;

// Re-export the main types
pub use config::{AppConfig, EndpointConfig, ProxyConfig};
pub use crypto::{
    CodecConfig, DecodedMessage, KeyBundle, KeyKind, KeyMaterial, KeyMode, KeyVault, MessageCodec,
    ObfuscatedKeyVault, Verification,
};
pub use error::{Error, Result};
pub use node::{LightTransport, NodeSession, SessionState};
pub use tor::{ConnectivityState, OnionService, TorConnectivityManager};
pub use utils::{OsRandom, RandomSource};
