//! Signature verification policy matrix.

use std::sync::Arc;

use veilmsg_node::crypto::{
    generate_private, generate_symmetric, verify_signature, CodecConfig, KeyKind, MessageCodec,
    REASON_INVALID_SIGNATURE, REASON_NO_SIGNATURE,
};
use veilmsg_node::utils::OsRandom;

#[test]
fn test_signed_round_trip_verifies_against_signer_key() {
    let signing = generate_private(&OsRandom, KeyKind::Signing).unwrap();
    let signer_pub = signing.public_key().unwrap();
    let codec = MessageCodec::new(
        CodecConfig::symmetric("/t", generate_symmetric(&OsRandom)).with_signing_key(signing),
        Arc::new(OsRandom),
    )
    .unwrap();

    let decoded = codec.decode(&codec.encode(b"attested").unwrap()).unwrap();
    let verdict = verify_signature(&decoded, &signer_pub);
    assert!(verdict.is_valid);
    assert_eq!(verdict.reason, None);
}

#[test]
fn test_different_public_key_yields_invalid_signature() {
    let signing = generate_private(&OsRandom, KeyKind::Signing).unwrap();
    let codec = MessageCodec::new(
        CodecConfig::symmetric("/t", generate_symmetric(&OsRandom)).with_signing_key(signing),
        Arc::new(OsRandom),
    )
    .unwrap();
    let decoded = codec.decode(&codec.encode(b"attested").unwrap()).unwrap();

    let other = generate_private(&OsRandom, KeyKind::Signing).unwrap();
    let verdict = verify_signature(&decoded, &other.public_key().unwrap());
    assert!(!verdict.is_valid);
    assert_eq!(verdict.reason, Some(REASON_INVALID_SIGNATURE));
}

#[test]
fn test_unsigned_message_yields_no_signature() {
    let codec = MessageCodec::new(
        CodecConfig::symmetric("/t", generate_symmetric(&OsRandom)),
        Arc::new(OsRandom),
    )
    .unwrap();
    let decoded = codec.decode(&codec.encode(b"plain").unwrap()).unwrap();

    let key = generate_private(&OsRandom, KeyKind::Signing).unwrap();
    let verdict = verify_signature(&decoded, &key.public_key().unwrap());
    assert!(!verdict.is_valid);
    // Distinct from "invalid signature" so callers can downgrade rather
    // than reject unsigned traffic.
    assert_eq!(verdict.reason, Some(REASON_NO_SIGNATURE));
}

#[test]
fn test_embedded_key_is_advisory_only() {
    // A message signed by an attacker embeds the attacker's key. The
    // verdict against the key the caller trusts must be invalid even though
    // the embedded signature is internally consistent.
    let attacker = generate_private(&OsRandom, KeyKind::Signing).unwrap();
    let trusted = generate_private(&OsRandom, KeyKind::Signing).unwrap();

    let codec = MessageCodec::new(
        CodecConfig::symmetric("/t", generate_symmetric(&OsRandom)).with_signing_key(attacker),
        Arc::new(OsRandom),
    )
    .unwrap();
    let decoded = codec.decode(&codec.encode(b"spoof").unwrap()).unwrap();

    let verdict = verify_signature(&decoded, &trusted.public_key().unwrap());
    assert!(!verdict.is_valid);
    assert_eq!(verdict.reason, Some(REASON_INVALID_SIGNATURE));
}
