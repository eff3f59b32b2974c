//! Node session lifecycle and delivery behavior.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::{mpsc, RwLock};
use veilmsg_node::crypto::{
    generate_private, generate_symmetric, CodecConfig, KeyKind, KeyMaterial, MessageCodec,
};
use veilmsg_node::error::Result;
use veilmsg_node::node::{LightTransport, LoopbackTransport, NodeSession, SessionState};
use veilmsg_node::utils::{OsRandom, RandomSource};

/// Transport that flushes one retained blob into every new subscription,
/// the way a store-backed pub/sub node replays recent traffic at join.
struct FlushingTransport {
    retained: Vec<u8>,
    subscribers: RwLock<Vec<mpsc::Sender<Vec<u8>>>>,
}

impl FlushingTransport {
    fn new(retained: Vec<u8>) -> Arc<Self> {
        Arc::new(Self {
            retained,
            subscribers: RwLock::new(Vec::new()),
        })
    }
}

#[async_trait]
impl LightTransport for FlushingTransport {
    async fn start(&self) -> Result<()> {
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        Ok(())
    }

    async fn subscribe(&self, _topic: &str) -> Result<mpsc::Receiver<Vec<u8>>> {
        let (tx, rx) = mpsc::channel(8);
        let _ = tx.try_send(self.retained.clone());
        self.subscribers.write().await.push(tx);
        Ok(rx)
    }

    async fn send(&self, _topic: &str, blob: Vec<u8>) -> Result<()> {
        for tx in self.subscribers.read().await.iter() {
            let _ = tx.try_send(blob.clone());
        }
        Ok(())
    }

    async fn query(&self, _topic: &str) -> Result<Vec<Vec<u8>>> {
        Ok(vec![self.retained.clone()])
    }
}

fn rng() -> Arc<dyn RandomSource> {
    Arc::new(OsRandom)
}

fn codec_pair(topic: &str) -> (MessageCodec, MessageCodec, KeyMaterial) {
    let key = generate_symmetric(&OsRandom);
    let encoder = MessageCodec::new(CodecConfig::symmetric(topic, key.clone()), rng()).unwrap();
    let decoder = MessageCodec::new(CodecConfig::symmetric(topic, key.clone()), rng()).unwrap();
    (encoder, decoder, key)
}

async fn recv_within(rx: &mut mpsc::Receiver<Vec<u8>>, ms: u64) -> Option<Vec<u8>> {
    tokio::time::timeout(Duration::from_millis(ms), rx.recv())
        .await
        .ok()
        .flatten()
}

#[tokio::test]
async fn test_publish_before_start_fails_not_connected() {
    let (encoder, decoder, _) = codec_pair("/t");
    let session = NodeSession::new(LoopbackTransport::new(), decoder, None);

    let err = session.publish(&encoder, b"too early").await.unwrap_err();
    assert!(err.to_string().contains("not connected"), "got: {err}");
}

#[tokio::test]
async fn test_double_start_fails_without_shutdown() {
    let (_, decoder, _) = codec_pair("/t");
    let session = NodeSession::new(LoopbackTransport::new(), decoder, None);

    session.start().await.unwrap();
    assert!(session.start().await.is_err());
}

#[tokio::test]
async fn test_shutdown_is_idempotent() {
    let (_, decoder, _) = codec_pair("/t");
    let session = NodeSession::new(LoopbackTransport::new(), decoder, None);

    session.start().await.unwrap();
    session.shutdown().await.unwrap();
    session.shutdown().await.unwrap();
    session.shutdown().await.unwrap();
    assert_eq!(session.state().await, SessionState::Uninitialized);
}

#[tokio::test]
async fn test_end_to_end_encode_publish_observe() {
    let (encoder, decoder, _) = codec_pair("/veilmsg/1/e2e");
    let session = NodeSession::new(LoopbackTransport::new(), decoder, None);

    let (tx, mut rx) = mpsc::channel(8);
    session
        .set_observer(Box::new(move |decoded| {
            let _ = tx.try_send(decoded.payload);
        }))
        .await;

    session.start().await.unwrap();
    session.publish(&encoder, b"hello").await.unwrap();

    assert_eq!(recv_within(&mut rx, 500).await, Some(b"hello".to_vec()));
}

#[tokio::test]
async fn test_corrupted_blob_never_reaches_observer() {
    let transport = LoopbackTransport::new();
    let (encoder, decoder, _) = codec_pair("/t");
    let session = NodeSession::new(transport.clone(), decoder, None);

    let (tx, mut rx) = mpsc::channel(8);
    session
        .set_observer(Box::new(move |decoded| {
            let _ = tx.try_send(decoded.payload);
        }))
        .await;
    session.start().await.unwrap();

    // Inject a corrupted blob straight through the transport.
    let mut blob = encoder.encode(b"mangled").unwrap();
    let last = blob.len() - 1;
    blob[last] ^= 0xff;
    transport.send("/t", blob).await.unwrap();

    assert_eq!(recv_within(&mut rx, 200).await, None);

    // A clean message afterwards still arrives.
    session.publish(&encoder, b"clean").await.unwrap();
    assert_eq!(recv_within(&mut rx, 500).await, Some(b"clean".to_vec()));
}

#[tokio::test]
async fn test_new_observer_replaces_prior_one() {
    let (encoder, decoder, _) = codec_pair("/t");
    let session = NodeSession::new(LoopbackTransport::new(), decoder, None);

    let (old_tx, mut old_rx) = mpsc::channel(8);
    session
        .set_observer(Box::new(move |decoded| {
            let _ = old_tx.try_send(decoded.payload);
        }))
        .await;

    let (new_tx, mut new_rx) = mpsc::channel(8);
    session
        .set_observer(Box::new(move |decoded| {
            let _ = new_tx.try_send(decoded.payload);
        }))
        .await;

    session.start().await.unwrap();
    session.publish(&encoder, b"to whom").await.unwrap();

    assert_eq!(recv_within(&mut new_rx, 500).await, Some(b"to whom".to_vec()));
    assert_eq!(recv_within(&mut old_rx, 200).await, None);
}

#[tokio::test]
async fn test_signature_gate_drops_foreign_senders() {
    let trusted = generate_private(&OsRandom, KeyKind::Signing).unwrap();
    let foreign = generate_private(&OsRandom, KeyKind::Signing).unwrap();
    let trusted_pub = trusted.public_key().unwrap();

    let key = generate_symmetric(&OsRandom);
    let trusted_encoder = MessageCodec::new(
        CodecConfig::symmetric("/t", key.clone()).with_signing_key(trusted),
        rng(),
    )
    .unwrap();
    let foreign_encoder = MessageCodec::new(
        CodecConfig::symmetric("/t", key.clone()).with_signing_key(foreign),
        rng(),
    )
    .unwrap();
    let decoder = MessageCodec::new(CodecConfig::symmetric("/t", key), rng()).unwrap();

    let session = NodeSession::new(LoopbackTransport::new(), decoder, Some(trusted_pub));
    let (tx, mut rx) = mpsc::channel(8);
    session
        .set_observer(Box::new(move |decoded| {
            let _ = tx.try_send(decoded.payload);
        }))
        .await;
    session.start().await.unwrap();

    session.publish(&foreign_encoder, b"spoofed").await.unwrap();
    assert_eq!(recv_within(&mut rx, 200).await, None);

    session.publish(&trusted_encoder, b"genuine").await.unwrap();
    assert_eq!(recv_within(&mut rx, 500).await, Some(b"genuine".to_vec()));
}

#[tokio::test]
async fn test_no_delivery_after_shutdown() {
    let transport = LoopbackTransport::new();
    let (encoder, decoder, _) = codec_pair("/t");
    let session = NodeSession::new(transport.clone(), decoder, None);

    let (tx, mut rx) = mpsc::channel(8);
    session
        .set_observer(Box::new(move |decoded| {
            let _ = tx.try_send(decoded.payload);
        }))
        .await;
    session.start().await.unwrap();
    session.shutdown().await.unwrap();

    // The loopback is stopped too; restart it to prove the gate is the
    // session, not the transport.
    transport.start().await.unwrap();
    transport.send("/t", encoder.encode(b"late").unwrap()).await.unwrap();

    assert_eq!(recv_within(&mut rx, 200).await, None);
}

#[tokio::test]
async fn test_blob_flushed_at_subscribe_time_does_not_kill_delivery() {
    let (encoder, decoder, _) = codec_pair("/t");
    let early = encoder.encode(b"early").unwrap();
    let session = NodeSession::new(FlushingTransport::new(early), decoder, None);

    let (tx, mut rx) = mpsc::channel(8);
    session
        .set_observer(Box::new(move |decoded| {
            let _ = tx.try_send(decoded.payload);
        }))
        .await;
    session.start().await.unwrap();

    // The blob queued before start completed must arrive, and the pump
    // must stay alive for everything after it.
    assert_eq!(recv_within(&mut rx, 500).await, Some(b"early".to_vec()));
    session.publish(&encoder, b"later").await.unwrap();
    assert_eq!(recv_within(&mut rx, 500).await, Some(b"later".to_vec()));
}

#[tokio::test]
async fn test_query_history_returns_decoded_messages() {
    let transport = LoopbackTransport::new();
    let (encoder, decoder, _) = codec_pair("/t");
    let session = NodeSession::new(transport, decoder, None);

    session.start().await.unwrap();
    session.publish(&encoder, b"first").await.unwrap();
    session.publish(&encoder, b"second").await.unwrap();

    let history = session.query_history().await.unwrap();
    let payloads: Vec<_> = history.into_iter().map(|m| m.payload).collect();
    assert_eq!(payloads, vec![b"first".to_vec(), b"second".to_vec()]);
}
