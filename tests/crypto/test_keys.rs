//! Key material and hex round-trip properties.

use rand::{rngs::OsRng, Rng, RngCore};
use veilmsg_node::crypto::{
    generate_private, generate_symmetric, hex_decode, hex_encode, KeyBundle, KeyKind,
};
use veilmsg_node::utils::OsRandom;

#[test]
fn test_hex_round_trip_arbitrary_bytes() {
    let mut rng = OsRng;
    for _ in 0..50 {
        let len = rng.gen_range(0..512);
        let mut bytes = vec![0u8; len];
        rng.fill_bytes(&mut bytes);

        let encoded = hex_encode(&bytes);
        let decoded = hex_decode(&encoded).expect("hex decode should round trip");
        assert_eq!(decoded, bytes);
    }
}

#[test]
fn test_hex_encode_is_lowercase_ascii() {
    let encoded = hex_encode(&[0xDE, 0xAD, 0xBE, 0xEF]);
    assert_eq!(encoded, "deadbeef");
}

#[test]
fn test_symmetric_keys_are_distinct() {
    let a = generate_symmetric(&OsRandom);
    let b = generate_symmetric(&OsRandom);
    assert_ne!(a.as_bytes(), b.as_bytes());
    assert_eq!(a.as_bytes().len(), 32);
}

#[test]
fn test_public_key_derivation_is_deterministic() {
    let key = generate_private(&OsRandom, KeyKind::Encryption).unwrap();
    let first = key.public_key().unwrap();
    let second = key.public_key().unwrap();
    assert_eq!(first, second);
    assert_eq!(first.len(), 33);
}

#[test]
fn test_signing_and_encryption_keys_are_independent() {
    let bundle = KeyBundle::generate_full(&OsRandom).unwrap();
    let encryption = bundle.encryption.unwrap();
    let signing = bundle.signing.unwrap();
    assert_ne!(encryption.as_bytes(), signing.as_bytes());
    assert_ne!(
        encryption.public_key().unwrap(),
        signing.public_key().unwrap()
    );
}
