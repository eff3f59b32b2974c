// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Configuration surface.
//!
//! Every value here is an explicit input: the core derives nothing from the
//! environment. The CLI loads an [`AppConfig`] from a TOML file and passes
//! the pieces down.

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// Local SOCKS proxy endpoint (a running Tor instance).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ProxyConfig {
    pub host: String,
    pub port: u16,
}

impl ProxyConfig {
    /// SOCKS5 URL with remote DNS resolution, the form Tor expects.
    pub fn socks_url(&self) -> String {
        format!("socks5h://{}:{}", self.host, self.port)
    }
}

impl Default for ProxyConfig {
    fn default() -> Self {
        Self {
            host: "127.0.0.1".to_string(),
            port: 9050,
        }
    }
}

/// One private RPC endpoint reachable through the proxy.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EndpointConfig {
    pub name: String,
    pub url: String,
    pub timeout_ms: u64,
}

impl EndpointConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

/// Top-level configuration for the node binary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AppConfig {
    /// Content topic for the message channel.
    pub topic: String,
    /// Path of the persisted key store file.
    pub key_store_path: String,
    /// Bound on each proxy probe.
    pub probe_timeout_ms: u64,
    /// URL fetched through the proxy for the SOCKS-path test.
    pub check_url: String,
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub endpoints: Vec<EndpointConfig>,
}

impl AppConfig {
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self> {
        let contents = std::fs::read_to_string(path.as_ref()).map_err(|e| {
            Error::configuration(format!(
                "cannot read config file {}: {}",
                path.as_ref().display(),
                e
            ))
        })?;
        toml::from_str(&contents)
            .map_err(|e| Error::configuration(format!("invalid config file: {}", e)))
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_millis(self.probe_timeout_ms)
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            topic: "/veilmsg/1/chat/proto".to_string(),
            key_store_path: "./keys.json".to_string(),
            probe_timeout_ms: 5_000,
            check_url: "https://check.torproject.org/api/ip".to_string(),
            proxy: ProxyConfig::default(),
            endpoints: vec![],
        }
    }
}
