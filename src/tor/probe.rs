// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Proxy probe capability.
//!
//! Connectivity state only advances on explicit successful probes, so the
//! probes are a trait: tests inject fakes with scripted outcomes and
//! production injects [`TcpSocksProbe`], which checks TCP reachability of
//! the proxy and then fetches a check URL through it. Neither check speaks
//! the SOCKS protocol itself; that stays inside reqwest.

use std::time::Duration;

use async_trait::async_trait;
use tokio::net::TcpStream;

use crate::config::ProxyConfig;

/// Bounded-time reachability checks against the local proxy.
#[async_trait]
pub trait ProxyProbe: Send + Sync {
    /// Is something listening at the proxy address?
    async fn check_reachable(&self, proxy: &ProxyConfig, timeout: Duration) -> bool;

    /// Does a request actually route through the SOCKS path?
    async fn check_socks_path(&self, proxy: &ProxyConfig, timeout: Duration) -> bool;
}

/// Production probe: TCP connect for liveness, an HTTP fetch through the
/// SOCKS5 proxy for the path test.
pub struct TcpSocksProbe {
    check_url: String,
}

impl TcpSocksProbe {
    pub fn new(check_url: impl Into<String>) -> Self {
        Self {
            check_url: check_url.into(),
        }
    }
}

#[async_trait]
impl ProxyProbe for TcpSocksProbe {
    async fn check_reachable(&self, proxy: &ProxyConfig, timeout: Duration) -> bool {
        let address = format!("{}:{}", proxy.host, proxy.port);
        matches!(
            tokio::time::timeout(timeout, TcpStream::connect(&address)).await,
            Ok(Ok(_))
        )
    }

    async fn check_socks_path(&self, proxy: &ProxyConfig, timeout: Duration) -> bool {
        let Ok(socks) = reqwest::Proxy::all(proxy.socks_url()) else {
            return false;
        };
        let Ok(client) = reqwest::Client::builder()
            .proxy(socks)
            .timeout(timeout)
            .build()
        else {
            return false;
        };
        // Any response proves the path; the status code is irrelevant.
        client.get(&self.check_url).send().await.is_ok()
    }
}
