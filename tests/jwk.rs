//! Tests for JWK conversions and key set lookups in the decoding pipeline.

use assert_matches::assert_matches;
use base64ct::{Base64UrlUnpadded, Encoding};
use serde_json::json;

use std::sync::Arc;

mod shared;

use crate::shared::{create_claims, header_fields};
use jwt_decoder::{
    alg::{Hs256, Hs256Key, Hs512, Hs512Key},
    decode,
    jwk::{JsonWebKey, JsonWebKeySet, JwkError, KeyType},
    AlgorithmExt, DecodeError, DecodeOptions, KeyLookupError,
};

fn assert_jwk_roundtrip(jwk: &JsonWebKey<'_>) {
    let jwk_string = serde_json::to_string(jwk).unwrap();
    let restored: JsonWebKey<'_> = serde_json::from_str(&jwk_string).unwrap();
    assert_eq!(restored, *jwk);

    let json = serde_json::to_value(jwk).unwrap();
    let restored_from_json: JsonWebKey<'_> = serde_json::from_value(json).unwrap();
    assert_eq!(restored_from_json, *jwk);
}

#[test]
fn hs256_jwk() {
    const KEY: &str =
        "AyM1SysPpbyDfgZld3umj1qzKObwVMkoqQ-EstJQLr_T-1qS0gZH75aKtMN3Yj0iPS4hcgUuTwjAzZr1Z9CAow";

    let key = Base64UrlUnpadded::decode_vec(KEY).unwrap();
    let key = Hs256Key::new(key);

    let jwk = JsonWebKey::from(&key);
    assert_eq!(jwk.key_type(), KeyType::Symmetric);
    assert_eq!(
        serde_json::to_value(&jwk).unwrap(),
        json!({ "kty": "oct", "k": KEY })
    );
    assert_jwk_roundtrip(&jwk);
    assert_eq!(Hs256Key::try_from(&jwk).unwrap().as_ref(), key.as_ref());
}

#[test]
fn hs256_incorrect_key_type() {
    let jwk = json!({
        "kty": "OKP",
        "crv": "Ed25519",
        "x": "NK0ABg2FlJUVj9UIOrh4wOlLtlV3WL70SQYXSl4Kh0c",
    });
    let jwk: JsonWebKey<'_> = serde_json::from_value(jwk).unwrap();
    let err = Hs256Key::try_from(&jwk).unwrap_err();

    assert_matches!(
        err,
        JwkError::UnexpectedKeyType {
            expected: KeyType::Symmetric,
            actual: KeyType::KeyPair,
        }
    );
}

fn key_set() -> JsonWebKeySet {
    serde_json::from_value(json!({
        "keys": [
            { "kty": "oct", "kid": "2024-01", "k": "b2xkLXNlY3JldA", "use": "sig" },
            { "kty": "oct", "kid": "2024-02", "k": "bmV3LXNlY3JldA" },
            {
                "kty": "OKP",
                "kid": "signing-service",
                "crv": "Ed25519",
                "x": "NK0ABg2FlJUVj9UIOrh4wOlLtlV3WL70SQYXSl4Kh0c",
            },
        ],
    }))
    .unwrap()
}

#[test]
fn decoding_with_key_set() {
    let key_set = key_set();
    assert_eq!(key_set.keys().len(), 3);
    let options = DecodeOptions::default()
        .with_algorithms(["HS256", "HS512"])
        .with_jwks(Arc::new(key_set));

    let claims = create_claims();
    for (kid, secret) in [("2024-01", b"old-secret"), ("2024-02", b"new-secret")] {
        let header = header_fields(json!({ "kid": kid }));
        let token = Hs256.token(&header, &claims, &Hs256Key::new(secret)).unwrap();
        let decoded = decode(&token, &options).unwrap();
        assert_eq!(decoded.header().key_id(), Some(kid));
        assert_eq!(*decoded.payload(), claims);

        // The same `oct` key can be used with any allowed HMAC algorithm.
        let token = Hs512.token(&header, &claims, &Hs512Key::new(secret)).unwrap();
        decode(&token, &options).unwrap();
    }

    // Key with a correct `kid` but the wrong secret.
    let header = header_fields(json!({ "kid": "2024-02" }));
    let token = Hs256
        .token(&header, &claims, &Hs256Key::new(b"old-secret"))
        .unwrap();
    assert_matches!(
        decode(&token, &options).unwrap_err(),
        DecodeError::InvalidSignature
    );

    // Key of an unsuitable type.
    let header = header_fields(json!({ "kid": "signing-service" }));
    let token = Hs256
        .token(&header, &claims, &Hs256Key::new(b"new-secret"))
        .unwrap();
    assert_matches!(
        decode(&token, &options).unwrap_err(),
        DecodeError::InvalidSignature
    );
}

#[test]
fn key_set_lookup_errors_are_propagated() {
    let options = DecodeOptions::default()
        .with_algorithm("HS256")
        .with_jwks(Arc::new(key_set()));
    let claims = create_claims();
    let key = Hs256Key::new(b"new-secret");

    let token = Hs256.token(&header_fields(json!({})), &claims, &key).unwrap();
    let err = decode(&token, &options).unwrap_err();
    let DecodeError::KeyResolution(err) = err else {
        panic!("unexpected error: {err}");
    };
    assert_matches!(
        err.downcast_ref::<KeyLookupError>(),
        Some(KeyLookupError::MissingKeyId)
    );

    let header = header_fields(json!({ "kid": "2023-12" }));
    let token = Hs256.token(&header, &claims, &key).unwrap();
    let err = decode(&token, &options).unwrap_err();
    let DecodeError::KeyResolution(err) = err else {
        panic!("unexpected error: {err}");
    };
    assert_matches!(
        err.downcast_ref::<KeyLookupError>(),
        Some(KeyLookupError::UnknownKeyId(kid)) if kid == "2023-12"
    );

    let options = DecodeOptions::default()
        .with_algorithm("HS256")
        .with_jwks(Arc::new(JsonWebKeySet::default()));
    let header = header_fields(json!({ "kid": "2024-02" }));
    let token = Hs256.token(&header, &claims, &key).unwrap();
    let err = decode(&token, &options).unwrap_err();
    let DecodeError::KeyResolution(err) = err else {
        panic!("unexpected error: {err}");
    };
    assert_matches!(
        err.downcast_ref::<KeyLookupError>(),
        Some(KeyLookupError::EmptyKeySet)
    );
}

#[cfg(feature = "p256")]
mod es256 {
    use super::*;
    use jwt_decoder::{alg::Es256, Algorithm};

    type PublicKey = <Es256 as Algorithm>::VerifyingKey;

    #[test]
    fn verifying_jwk() {
        let jwk = json!({
            "kty": "EC",
            "crv": "P-256",
            "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
            "y": "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0",
        });
        let jwk: JsonWebKey<'_> = serde_json::from_value(jwk).unwrap();
        assert_jwk_roundtrip(&jwk);

        let public_key = PublicKey::try_from(&jwk).unwrap();
        assert_eq!(JsonWebKey::from(&public_key), jwk);
    }

    #[test]
    fn incorrect_curve() {
        let jwk = json!({
            "kty": "EC",
            "crv": "P-384",
            "x": "f83OJ3D2xF1Bg8vub9tLe1gHMzV76e8Tus9uPHvRVEU",
            "y": "x_FEzRu9m36HLN_tue659LNpXW6pCyStikYjKIWI5a0",
        });
        let jwk: JsonWebKey<'_> = serde_json::from_value(jwk).unwrap();
        let err = PublicKey::try_from(&jwk).unwrap_err();
        assert_matches!(err, JwkError::UnexpectedValue { .. });
    }
}

#[cfg(feature = "ed25519-dalek")]
mod ed25519 {
    use super::*;
    use jwt_decoder::{alg::Ed25519, Algorithm};

    type PublicKey = <Ed25519 as Algorithm>::VerifyingKey;

    #[test]
    fn verifying_jwk() {
        let jwk = json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "NK0ABg2FlJUVj9UIOrh4wOlLtlV3WL70SQYXSl4Kh0c",
            // Private key is ignored.
            "d": "8fyd_fcp8v4cR2pj74QMiTxo7hcYz1jZ1FeyTgWnsGI"
        });
        let jwk: JsonWebKey<'_> = serde_json::from_value(jwk).unwrap();
        assert_jwk_roundtrip(&jwk);
        let jwk_value = serde_json::to_value(&jwk).unwrap();
        assert!(jwk_value.get("d").is_none());

        let public_key = PublicKey::try_from(&jwk).unwrap();
        assert_eq!(JsonWebKey::from(&public_key), jwk);
    }

    #[test]
    fn incorrect_key_length() {
        let jwk = json!({
            "kty": "OKP",
            "crv": "Ed25519",
            "x": "NK0ABg2FlJUVj9UIOrh4wOlLtlV3WL70SQYX",
        });
        let jwk: JsonWebKey<'_> = serde_json::from_value(jwk).unwrap();
        let err = PublicKey::try_from(&jwk).unwrap_err();
        assert_matches!(err, JwkError::UnexpectedLen { expected: 32, .. });
    }
}
