// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Private RPC endpoints and dispatch.
//!
//! Endpoints are registered by name and every call routes through the
//! endpoint's SOCKS proxy descriptor. Dispatch sits behind a trait so tests
//! can script latency and failures; the manager owns the timeout and the
//! exactly-once dispatch contract.

use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use crate::config::ProxyConfig;
use crate::error::{Error, Result};

/// A named private RPC endpoint.
#[derive(Debug, Clone)]
pub struct RpcEndpoint {
    pub name: String,
    pub url: String,
    pub proxy: ProxyConfig,
    pub timeout: Duration,
}

/// Transport seam for a single JSON-RPC call.
#[async_trait]
pub trait RpcDispatcher: Send + Sync {
    async fn dispatch(&self, endpoint: &RpcEndpoint, method: &str, params: Value) -> Result<Value>;
}

/// Production dispatcher: JSON-RPC 2.0 over HTTP through the endpoint's
/// SOCKS5 proxy. Applies no timeout of its own; the manager bounds the call.
#[derive(Default)]
pub struct HttpRpcDispatcher;

impl HttpRpcDispatcher {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl RpcDispatcher for HttpRpcDispatcher {
    async fn dispatch(&self, endpoint: &RpcEndpoint, method: &str, params: Value) -> Result<Value> {
        let proxy = reqwest::Proxy::all(endpoint.proxy.socks_url()).map_err(|e| {
            Error::configuration(format!("invalid proxy descriptor for '{}': {}", endpoint.name, e))
        })?;
        let client = reqwest::Client::builder().proxy(proxy).build().map_err(|e| {
            Error::connectivity("rpc dispatch", format!("client construction failed: {}", e))
        })?;

        let body = json!({
            "jsonrpc": "2.0",
            "id": 1,
            "method": method,
            "params": params,
        });

        let response = client
            .post(&endpoint.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| Error::connectivity("rpc dispatch", e.to_string()))?;

        let reply: Value = response
            .json()
            .await
            .map_err(|e| Error::connectivity("rpc dispatch", format!("malformed reply: {}", e)))?;

        if let Some(error) = reply.get("error").filter(|e| !e.is_null()) {
            return Err(Error::connectivity(
                "rpc dispatch",
                format!("endpoint '{}' returned error: {}", endpoint.name, error),
            ));
        }
        Ok(reply.get("result").cloned().unwrap_or(Value::Null))
    }
}
