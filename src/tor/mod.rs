// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! Tor-based connectivity.
//!
//! Gates outbound calls through a local SOCKS proxy and tracks onion
//! service registrations. This module only probes proxy liveness and builds
//! proxy descriptors; it implements neither the SOCKS nor the Tor control
//! protocol.

pub mod manager;
pub mod onion;
pub mod probe;
pub mod rpc;

pub use manager::{ConnectivityState, TorConnectivityManager};
pub use onion::{OnionService, OnionServiceStatus};
pub use probe::{ProxyProbe, TcpSocksProbe};
pub use rpc::{HttpRpcDispatcher, RpcDispatcher, RpcEndpoint};

/// Default SOCKS5 proxy port for a local Tor daemon.
pub const DEFAULT_SOCKS_PORT: u16 = 9050;
