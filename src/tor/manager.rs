// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Tor connectivity manager.
//!
//! Models proxy readiness, the onion-service registry, and private RPC
//! dispatch. State walks `Disconnected → CheckingProxy → ProxyReady →
//! Connected` and only advances on explicit successful probes; a failed
//! probe resets to `Disconnected` with no internal retry. Shutdown clears
//! the onion registry but keeps configured RPC endpoints.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use serde_json::Value;
use tokio::sync::RwLock;

use crate::config::ProxyConfig;
use crate::error::{Error, Result};
use crate::tor::onion::{
    generate_service_id, generate_service_keypair, OnionService, OnionServiceStatus,
};
use crate::tor::probe::ProxyProbe;
use crate::tor::rpc::{RpcDispatcher, RpcEndpoint};
use crate::utils::rng::RandomSource;

/// Connectivity lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectivityState {
    Disconnected,
    CheckingProxy,
    ProxyReady,
    Connected,
}

pub struct TorConnectivityManager {
    proxy: ProxyConfig,
    probe_timeout: Duration,
    probe: Arc<dyn ProxyProbe>,
    dispatcher: Arc<dyn RpcDispatcher>,
    rng: Arc<dyn RandomSource>,
    state: RwLock<ConnectivityState>,
    onion_services: RwLock<HashMap<String, OnionService>>,
    /// Every id ever issued; uniqueness holds for the registry's lifetime,
    /// not just for currently registered services.
    issued_ids: RwLock<HashSet<String>>,
    endpoints: RwLock<HashMap<String, RpcEndpoint>>,
}

impl TorConnectivityManager {
    pub fn new(
        proxy: ProxyConfig,
        probe_timeout: Duration,
        probe: Arc<dyn ProxyProbe>,
        dispatcher: Arc<dyn RpcDispatcher>,
        rng: Arc<dyn RandomSource>,
    ) -> Self {
        Self {
            proxy,
            probe_timeout,
            probe,
            dispatcher,
            rng,
            state: RwLock::new(ConnectivityState::Disconnected),
            onion_services: RwLock::new(HashMap::new()),
            issued_ids: RwLock::new(HashSet::new()),
            endpoints: RwLock::new(HashMap::new()),
        }
    }

    pub async fn state(&self) -> ConnectivityState {
        *self.state.read().await
    }

    /// Probe the proxy and the SOCKS path, advancing to `Connected` only if
    /// both pass. Any failure resets to `Disconnected` and propagates; the
    /// call is safe to retry.
    pub async fn initialize(&self) -> Result<()> {
        *self.state.write().await = ConnectivityState::CheckingProxy;
        tracing::info!(
            proxy = %self.proxy.socks_url(),
            "checking Tor proxy liveness"
        );

        if !self
            .probe
            .check_reachable(&self.proxy, self.probe_timeout)
            .await
        {
            *self.state.write().await = ConnectivityState::Disconnected;
            return Err(Error::connectivity(
                "initialize",
                format!("proxy at {}:{} is not reachable", self.proxy.host, self.proxy.port),
            ));
        }
        *self.state.write().await = ConnectivityState::ProxyReady;

        if !self
            .probe
            .check_socks_path(&self.proxy, self.probe_timeout)
            .await
        {
            *self.state.write().await = ConnectivityState::Disconnected;
            return Err(Error::connectivity(
                "initialize",
                "SOCKS path test failed",
            ));
        }

        *self.state.write().await = ConnectivityState::Connected;
        tracing::info!("Tor connectivity established");
        Ok(())
    }

    /// Register an onion service on the given port. Requires `Connected`.
    pub async fn create_onion_service(&self, port: u16) -> Result<OnionService> {
        self.ensure_connected("create_onion_service").await?;

        let mut issued = self.issued_ids.write().await;
        let service_id = loop {
            let candidate = generate_service_id(self.rng.as_ref());
            if issued.insert(candidate.clone()) {
                break candidate;
            }
        };
        drop(issued);

        let (secret_key, public_key) = generate_service_keypair(self.rng.as_ref());
        let service = OnionService {
            service_id: service_id.clone(),
            secret_key,
            public_key,
            port,
            status: OnionServiceStatus::Active,
        };
        self.onion_services
            .write()
            .await
            .insert(service_id.clone(), service.clone());
        tracing::info!(service_id = %service_id, port, "onion service registered");
        Ok(service)
    }

    pub async fn onion_service(&self, service_id: &str) -> Option<OnionService> {
        self.onion_services.read().await.get(service_id).cloned()
    }

    pub async fn remove_onion_service(&self, service_id: &str) -> Result<()> {
        if self
            .onion_services
            .write()
            .await
            .remove(service_id)
            .is_none()
        {
            return Err(Error::not_found("onion service", service_id));
        }
        Ok(())
    }

    /// Register (or replace) a private RPC endpoint. Endpoints survive
    /// shutdown and reinitialize.
    pub async fn register_endpoint(&self, name: &str, url: &str, timeout: Duration) {
        let endpoint = RpcEndpoint {
            name: name.to_string(),
            url: url.to_string(),
            proxy: self.proxy.clone(),
            timeout,
        };
        self.endpoints
            .write()
            .await
            .insert(name.to_string(), endpoint);
        tracing::debug!(name, url, "rpc endpoint registered");
    }

    pub async fn remove_endpoint(&self, name: &str) -> Result<()> {
        if self.endpoints.write().await.remove(name).is_none() {
            return Err(Error::not_found("rpc endpoint", name));
        }
        Ok(())
    }

    /// Dispatch a JSON-RPC call through the proxy with the endpoint's
    /// timeout. Dispatched exactly once: timeouts and transport failures
    /// surface to the caller, whose responsibility retry is. Manager state
    /// is unchanged by failure.
    pub async fn make_private_call(
        &self,
        name: &str,
        method: &str,
        params: Value,
    ) -> Result<Value> {
        self.ensure_connected("make_private_call").await?;

        let endpoint = self
            .endpoints
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| Error::not_found("rpc endpoint", name))?;

        match tokio::time::timeout(
            endpoint.timeout,
            self.dispatcher.dispatch(&endpoint, method, params),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(Error::timeout(
                format!("rpc call '{}' to endpoint '{}'", method, name),
                endpoint.timeout,
            )),
        }
    }

    /// Reset to `Disconnected` and clear the onion registry. Configured
    /// endpoints remain registered. Idempotent.
    pub async fn shutdown(&self) {
        *self.state.write().await = ConnectivityState::Disconnected;
        let cleared = {
            let mut services = self.onion_services.write().await;
            let count = services.len();
            services.clear();
            count
        };
        tracing::info!(cleared_services = cleared, "Tor connectivity manager shut down");
    }

    async fn ensure_connected(&self, operation: &str) -> Result<()> {
        let state = *self.state.read().await;
        if state == ConnectivityState::Connected {
            Ok(())
        } else {
            Err(Error::connectivity(
                operation,
                format!("manager not initialized (state: {:?})", state),
            ))
        }
    }
}
