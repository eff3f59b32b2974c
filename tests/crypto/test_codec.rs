//! Codec round-trip and failure properties.

use std::sync::Arc;

use veilmsg_node::crypto::{
    generate_private, generate_symmetric, CodecConfig, KeyKind, MessageCodec,
};
use veilmsg_node::utils::{OsRandom, RandomSource};
use veilmsg_node::Error;

fn rng() -> Arc<dyn RandomSource> {
    Arc::new(OsRandom)
}

#[test]
fn test_symmetric_round_trip_various_payloads() {
    let key = generate_symmetric(&OsRandom);
    let codec = MessageCodec::new(CodecConfig::symmetric("/veilmsg/1/t", key), rng()).unwrap();

    let payloads: Vec<Vec<u8>> = vec![
        b"".to_vec(),
        b"hello".to_vec(),
        "héllo wörld 🧅".as_bytes().to_vec(),
        vec![0u8; 64 * 1024],
    ];
    for payload in payloads {
        let blob = codec.encode(&payload).unwrap();
        let decoded = codec.decode(&blob).unwrap();
        assert_eq!(decoded.payload, payload);
    }
}

#[test]
fn test_asymmetric_round_trip() {
    let private = generate_private(&OsRandom, KeyKind::Encryption).unwrap();
    let public = private.public_key().unwrap();

    let encoder = MessageCodec::new(CodecConfig::asymmetric_encrypt("/t", public), rng()).unwrap();
    let decoder = MessageCodec::new(CodecConfig::asymmetric_decrypt("/t", private), rng()).unwrap();

    let blob = encoder.encode(b"for your eyes only").unwrap();
    assert_eq!(decoder.decode(&blob).unwrap().payload, b"for your eyes only");
}

#[test]
fn test_asymmetric_decode_with_wrong_private_key_fails() {
    let recipient = generate_private(&OsRandom, KeyKind::Encryption).unwrap();
    let interloper = generate_private(&OsRandom, KeyKind::Encryption).unwrap();
    let public = recipient.public_key().unwrap();

    let encoder = MessageCodec::new(CodecConfig::asymmetric_encrypt("/t", public), rng()).unwrap();
    let decoder =
        MessageCodec::new(CodecConfig::asymmetric_decrypt("/t", interloper), rng()).unwrap();

    let blob = encoder.encode(b"secret").unwrap();
    let err = decoder.decode(&blob).unwrap_err();
    assert!(err.is_crypto(), "wrong key should yield a crypto error, got {err}");
}

#[test]
fn test_each_encode_produces_distinct_blob() {
    // Fresh nonce per encode: identical payloads must never produce
    // identical ciphertext.
    let key = generate_symmetric(&OsRandom);
    let codec = MessageCodec::new(CodecConfig::symmetric("/t", key), rng()).unwrap();
    let a = codec.encode(b"same payload").unwrap();
    let b = codec.encode(b"same payload").unwrap();
    assert_ne!(a, b);
}

#[test]
fn test_flipping_any_ciphertext_region_fails_decode() {
    let key = generate_symmetric(&OsRandom);
    let codec = MessageCodec::new(CodecConfig::symmetric("/t", key), rng()).unwrap();
    let blob = codec.encode(b"integrity matters").unwrap();

    // Corrupt a byte at the front, middle, and end of the blob.
    for index in [blob.len() / 4, blob.len() / 2, blob.len() - 1] {
        let mut corrupted = blob.clone();
        corrupted[index] ^= 0x01;
        assert!(
            codec.decode(&corrupted).is_err(),
            "flipped byte {} should break decode",
            index
        );
    }
}

#[test]
fn test_truncated_blob_fails_decode() {
    let key = generate_symmetric(&OsRandom);
    let codec = MessageCodec::new(CodecConfig::symmetric("/t", key), rng()).unwrap();
    let blob = codec.encode(b"short me").unwrap();
    let err = codec.decode(&blob[..blob.len() / 2]).unwrap_err();
    assert!(err.is_crypto());
}

#[test]
fn test_signed_asymmetric_carries_signature_through() {
    let recipient = generate_private(&OsRandom, KeyKind::Encryption).unwrap();
    let signing = generate_private(&OsRandom, KeyKind::Signing).unwrap();
    let signer_pub = signing.public_key().unwrap();

    let encoder = MessageCodec::new(
        CodecConfig::asymmetric_encrypt("/t", recipient.public_key().unwrap())
            .with_signing_key(signing),
        rng(),
    )
    .unwrap();
    let decoder =
        MessageCodec::new(CodecConfig::asymmetric_decrypt("/t", recipient), rng()).unwrap();

    let blob = encoder.encode(b"signed and sealed").unwrap();
    let decoded = decoder.decode(&blob).unwrap();
    assert_eq!(decoded.signer_public_key, Some(signer_pub));
    assert!(decoded.signature.is_some());
}

#[test]
fn test_mode_misuse_is_configuration_error() {
    let private = generate_private(&OsRandom, KeyKind::Encryption).unwrap();
    let decoder = MessageCodec::new(CodecConfig::asymmetric_decrypt("/t", private), rng()).unwrap();
    assert!(matches!(
        decoder.encode(b"nope"),
        Err(Error::Configuration { .. })
    ));
}
