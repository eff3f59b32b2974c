// Copyright (c) 2025 Veilmsg
// SPDX-License-Identifier: BUSL-1.1
//! P2P light-node session lifecycle.
//!
//! A [`NodeSession`] owns one transport connection and walks
//! `Uninitialized → Starting → Subscribing → Ready → ShuttingDown →
//! Uninitialized`. State-mutating calls come from a single logical owner;
//! the one genuinely concurrent path is the inbound pump task, which shares
//! only the state flag and the observer slot with the owner.
//!
//! Inbound blobs are decoded, signature-checked when an expected sender key
//! is configured, and forwarded to the single registered observer.
//! Registering a new observer replaces the prior one. The observer is
//! invoked from the pump's execution context and must not block.

use std::sync::Arc;

use tokio::sync::{Mutex, RwLock};
use tokio::task::JoinHandle;
use uuid::Uuid;

use crate::crypto::codec::{DecodedMessage, MessageCodec};
use crate::crypto::verify::verify_signature;
use crate::error::{Error, Result};
use crate::node::transport::LightTransport;

/// Session lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionState {
    Uninitialized,
    Starting,
    Subscribing,
    Ready,
    ShuttingDown,
}

/// Callback receiving decoded inbound messages. Invoked on the pump task;
/// must be re-entrant-safe and non-blocking.
pub type Observer = Box<dyn Fn(DecodedMessage) + Send + Sync>;

pub struct NodeSession {
    session_id: String,
    transport: Arc<dyn LightTransport>,
    decoder: Arc<MessageCodec>,
    /// When set, inbound messages failing verification against this key are
    /// dropped before reaching the observer.
    expected_sender_key: Option<Vec<u8>>,
    state: Arc<RwLock<SessionState>>,
    observer: Arc<RwLock<Option<Observer>>>,
    pump_task: Mutex<Option<JoinHandle<()>>>,
}

impl NodeSession {
    pub fn new(
        transport: Arc<dyn LightTransport>,
        decoder: MessageCodec,
        expected_sender_key: Option<Vec<u8>>,
    ) -> Self {
        Self {
            session_id: Uuid::new_v4().to_string(),
            transport,
            decoder: Arc::new(decoder),
            expected_sender_key,
            state: Arc::new(RwLock::new(SessionState::Uninitialized)),
            observer: Arc::new(RwLock::new(None)),
            pump_task: Mutex::new(None),
        }
    }

    pub fn session_id(&self) -> &str {
        &self.session_id
    }

    pub async fn state(&self) -> SessionState {
        *self.state.read().await
    }

    /// Register the observer for inbound messages, replacing any prior one.
    pub async fn set_observer(&self, observer: Observer) {
        *self.observer.write().await = Some(observer);
    }

    /// Start the transport and subscribe to the decoder's topic.
    ///
    /// Fails if the session is already started (not idempotent-succeeding).
    /// Any failing sub-step resets the session to `Uninitialized` and
    /// propagates the failure.
    pub async fn start(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state != SessionState::Uninitialized {
                return Err(Error::connectivity(
                    "start",
                    format!("session already started (state: {:?})", *state),
                ));
            }
            *state = SessionState::Starting;
        }
        tracing::info!(session_id = %self.session_id, "starting node session");

        if let Err(e) = self.transport.start().await {
            *self.state.write().await = SessionState::Uninitialized;
            return Err(Error::connectivity(
                "start",
                format!("transport start failed: {}", e),
            ));
        }

        *self.state.write().await = SessionState::Subscribing;
        let rx = match self.transport.subscribe(self.decoder.topic()).await {
            Ok(rx) => rx,
            Err(e) => {
                let _ = self.transport.stop().await;
                *self.state.write().await = SessionState::Uninitialized;
                return Err(Error::connectivity(
                    "start",
                    format!("subscribe failed: {}", e),
                ));
            }
        };

        // Ready must be visible before the pump runs: a transport may flush
        // retained blobs at subscribe time, and the pump must not treat
        // those early deliveries as a teardown signal.
        *self.state.write().await = SessionState::Ready;
        let pump = self.spawn_pump(rx);
        *self.pump_task.lock().await = Some(pump);
        tracing::info!(
            session_id = %self.session_id,
            topic = self.decoder.topic(),
            "node session ready"
        );
        Ok(())
    }

    /// Encode and send a payload. Requires `Ready`; failure leaves session
    /// state unchanged.
    pub async fn publish(&self, encoder: &MessageCodec, payload: &[u8]) -> Result<()> {
        self.ensure_ready("publish").await?;
        let blob = encoder.encode(payload)?;
        self.transport.send(encoder.topic(), blob).await?;
        tracing::debug!(
            session_id = %self.session_id,
            topic = encoder.topic(),
            bytes = payload.len(),
            "message published"
        );
        Ok(())
    }

    /// Fetch and decode historical messages for the session's topic.
    ///
    /// Blobs that fail to decode (foreign keys, corruption) are skipped.
    pub async fn query_history(&self) -> Result<Vec<DecodedMessage>> {
        self.ensure_ready("query_history").await?;
        let blobs = self.transport.query(self.decoder.topic()).await?;
        let mut decoded = Vec::with_capacity(blobs.len());
        for blob in blobs {
            match self.decoder.decode(&blob) {
                Ok(message) => decoded.push(message),
                Err(e) => {
                    tracing::debug!(session_id = %self.session_id, error = %e, "skipping undecodable historical blob")
                }
            }
        }
        Ok(decoded)
    }

    /// Tear down the session. Safe and idempotent from any state.
    ///
    /// The pump task is stopped before the observer is cleared, so no
    /// delivery is processed after this returns.
    pub async fn shutdown(&self) -> Result<()> {
        {
            let mut state = self.state.write().await;
            if *state == SessionState::Uninitialized {
                // Nothing running; still make sure the observer is gone.
                *self.observer.write().await = None;
                return Ok(());
            }
            *state = SessionState::ShuttingDown;
        }
        tracing::info!(session_id = %self.session_id, "shutting down node session");

        if let Some(pump) = self.pump_task.lock().await.take() {
            pump.abort();
            let _ = pump.await;
        }
        *self.observer.write().await = None;

        if let Err(e) = self.transport.stop().await {
            tracing::warn!(session_id = %self.session_id, error = %e, "transport stop failed during shutdown");
        }

        *self.state.write().await = SessionState::Uninitialized;
        Ok(())
    }

    async fn ensure_ready(&self, operation: &str) -> Result<()> {
        let state = *self.state.read().await;
        if state == SessionState::Ready {
            Ok(())
        } else {
            Err(Error::connectivity(
                operation,
                format!("session not connected (state: {:?})", state),
            ))
        }
    }

    fn spawn_pump(&self, mut rx: tokio::sync::mpsc::Receiver<Vec<u8>>) -> JoinHandle<()> {
        let decoder = self.decoder.clone();
        let observer = self.observer.clone();
        let state = self.state.clone();
        let expected_sender_key = self.expected_sender_key.clone();
        let session_id = self.session_id.clone();

        tokio::spawn(async move {
            while let Some(blob) = rx.recv().await {
                // Re-check the flag per message; shutdown aborts this task,
                // this guards the window while ShuttingDown is in progress.
                // Only teardown states end the pump.
                let current = *state.read().await;
                if matches!(
                    current,
                    SessionState::ShuttingDown | SessionState::Uninitialized
                ) {
                    break;
                }

                let decoded = match decoder.decode(&blob) {
                    Ok(decoded) => decoded,
                    Err(e) => {
                        tracing::warn!(session_id = %session_id, error = %e, "dropping undecodable inbound message");
                        continue;
                    }
                };

                if let Some(expected) = &expected_sender_key {
                    let verdict = verify_signature(&decoded, expected);
                    if !verdict.is_valid {
                        tracing::warn!(
                            session_id = %session_id,
                            reason = verdict.reason.unwrap_or("unknown"),
                            "dropping inbound message failing signature check"
                        );
                        continue;
                    }
                }

                if let Some(callback) = observer.read().await.as_ref() {
                    callback(decoded);
                } else {
                    tracing::debug!(session_id = %session_id, "inbound message with no observer registered");
                }
            }
        })
    }
}
