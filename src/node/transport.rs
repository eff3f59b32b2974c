// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! The external P2P transport seam.
//!
//! The session layer depends on exactly four transport operations —
//! start/stop, subscribe, send, and historical query — and treats the
//! transport as opaque. Production wires in an adapter over a real pub/sub
//! light node; tests and the demo CLI use [`LoopbackTransport`].

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};

use crate::error::{Error, Result};

/// Inbound raw-blob channel capacity per subscription.
const SUBSCRIPTION_BUFFER: usize = 256;

/// Opaque pub/sub light-node connection.
#[async_trait]
pub trait LightTransport: Send + Sync {
    async fn start(&self) -> Result<()>;

    async fn stop(&self) -> Result<()>;

    /// Subscribe to a content topic; raw blobs arrive on the returned
    /// receiver from the transport's own execution context.
    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>>;

    async fn send(&self, topic: &str, blob: Vec<u8>) -> Result<()>;

    /// Fetch historical blobs retained for a topic.
    async fn query(&self, topic: &str) -> Result<Vec<Vec<u8>>>;
}

/// In-process transport that loops published blobs back to subscribers and
/// retains them for historical queries. Backs tests and the demo CLI.
#[derive(Default)]
pub struct LoopbackTransport {
    started: RwLock<bool>,
    subscribers: RwLock<HashMap<String, Vec<mpsc::Sender<Vec<u8>>>>>,
    history: RwLock<HashMap<String, Vec<Vec<u8>>>>,
}

impl LoopbackTransport {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    async fn ensure_started(&self, operation: &str) -> Result<()> {
        if *self.started.read().await {
            Ok(())
        } else {
            Err(Error::connectivity(operation, "transport not started"))
        }
    }
}

#[async_trait]
impl LightTransport for LoopbackTransport {
    async fn start(&self) -> Result<()> {
        *self.started.write().await = true;
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        *self.started.write().await = false;
        self.subscribers.write().await.clear();
        Ok(())
    }

    async fn subscribe(&self, topic: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        self.ensure_started("subscribe").await?;
        let (tx, rx) = mpsc::channel(SUBSCRIPTION_BUFFER);
        self.subscribers
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(tx);
        Ok(rx)
    }

    async fn send(&self, topic: &str, blob: Vec<u8>) -> Result<()> {
        self.ensure_started("send").await?;
        self.history
            .write()
            .await
            .entry(topic.to_string())
            .or_default()
            .push(blob.clone());

        let mut subscribers = self.subscribers.write().await;
        if let Some(senders) = subscribers.get_mut(topic) {
            // Drop senders whose receivers are gone; a full buffer only
            // loses this blob, the subscription stays live.
            senders.retain(|tx| match tx.try_send(blob.clone()) {
                Ok(()) => true,
                Err(mpsc::error::TrySendError::Full(_)) => {
                    tracing::warn!(topic, "subscriber buffer full, blob dropped");
                    true
                }
                Err(mpsc::error::TrySendError::Closed(_)) => false,
            });
        }
        Ok(())
    }

    async fn query(&self, topic: &str) -> Result<Vec<Vec<u8>>> {
        self.ensure_started("query").await?;
        Ok(self
            .history
            .read()
            .await
            .get(topic)
            .cloned()
            .unwrap_or_default())
    }
}
