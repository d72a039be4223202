//! Functionality shared by `algorithms`, `decoding` and `rsa` tests.

#![allow(dead_code)] // not all helpers are used by every test crate

use assert_matches::assert_matches;
use base64ct::{Base64UrlUnpadded, Encoding};
use rand::{seq::index::sample as sample_indexes, thread_rng};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};

use jwt_decoder::{
    decode, jwk::JsonWebKey, Algorithm, AlgorithmExt, DecodeError, DecodeOptions, DecodingKey,
};

pub type Obj = Map<String, Value>;

#[derive(Debug, PartialEq, Serialize, Deserialize)]
pub struct SampleClaims {
    #[serde(rename = "sub")]
    pub subject: String,
    pub name: String,
    #[serde(default)]
    pub admin: bool,
    #[serde(rename = "iat")]
    pub issued_at: i64,
}

pub fn create_claims() -> Value {
    json!({
        "sub": "1234567890",
        "name": "John Doe",
        "admin": true,
        "iat": 1_598_954_400,
    })
}

pub fn header_fields(value: Value) -> Obj {
    match value {
        Value::Object(fields) => fields,
        _ => panic!("header fields must be an object"),
    }
}

/// Creates options accepting a single `algorithm` with the specified `key`.
pub fn options_for(algorithm: &str, key: DecodingKey) -> DecodeOptions {
    DecodeOptions::default()
        .with_algorithm(algorithm)
        .with_key(key)
}

pub fn test_algorithm<A>(
    algorithm: &A,
    signing_key: &A::SigningKey,
    verifying_key: &A::VerifyingKey,
) where
    A: Algorithm,
    for<'a> JsonWebKey<'a>: From<&'a A::VerifyingKey>,
{
    // Maximum number of signature bits mangled.
    const MAX_MANGLED_BITS: usize = 128;

    let claims = create_claims();
    let options = options_for(&algorithm.name(), DecodingKey::from_key(verifying_key));

    // Successful case.
    let token_string = algorithm
        .token(&header_fields(json!({ "typ": "JWT" })), &claims, signing_key)
        .unwrap();
    let token = decode(&token_string, &options).unwrap();
    assert_eq!(*token.payload(), claims);
    assert_eq!(token.header().algorithm(), Some(&*algorithm.name()));
    assert_eq!(token.header().token_type(), Some("JWT"));
    let typed_claims: SampleClaims = token.claims().unwrap();
    assert_eq!(typed_claims.subject, "1234567890");

    // Mutate signature bits.
    let signature = token_string.rsplit('.').next().unwrap();
    let signature_start = token_string.rfind('.').unwrap() + 1;
    let signature = Base64UrlUnpadded::decode_vec(signature).unwrap();
    let signature_bits = signature.len() * 8;

    let mangled_bits: Box<dyn Iterator<Item = usize>> = if signature_bits <= MAX_MANGLED_BITS {
        Box::new(0..signature_bits)
    } else {
        let indexes = sample_indexes(&mut thread_rng(), signature_bits, MAX_MANGLED_BITS);
        Box::new(indexes.into_iter())
    };

    for i in mangled_bits {
        let mut mangled_signature = signature.clone();
        mangled_signature[i / 8] ^= 1 << (i % 8) as u8;
        let mangled_signature = Base64UrlUnpadded::encode_string(&mangled_signature);

        let mut mangled_str = token_string.clone();
        mangled_str.replace_range(signature_start.., &mangled_signature);
        let err = decode(&mangled_str, &options).unwrap_err();
        assert_matches!(err, DecodeError::InvalidSignature);

        // The token is still decoded if verification is disabled.
        let unverified = options.clone().with_verification(false);
        let token = decode(&mangled_str, &unverified).unwrap();
        assert_eq!(*token.payload(), claims);
    }

    // Truncate signature.
    let truncated_str = &token_string[..token_string.len() - 4];
    let err = decode(truncated_str, &options).unwrap_err();
    assert_matches!(
        err,
        DecodeError::InvalidSignature | DecodeError::InvalidSegmentEncoding
    );

    // Mutate header.
    let mangled_header = format!(r#"{{"alg":"{}","typ":"JWS"}}"#, algorithm.name());
    let mangled_header = Base64UrlUnpadded::encode_string(mangled_header.as_bytes());
    let header_end = token_string.find('.').unwrap();
    assert_ne!(mangled_header, &token_string[..header_end]);
    let mut mangled_str = token_string.clone();
    mangled_str.replace_range(..header_end, &mangled_header);
    let err = decode(&mangled_str, &options).unwrap_err();
    assert_matches!(err, DecodeError::InvalidSignature);

    // Mutate claims.
    let claims_string = Base64UrlUnpadded::encode_string(
        &serde_json::to_vec(&{
            let mut mangled_claims = claims.clone();
            mangled_claims["iat"] = json!(1_598_954_401);
            mangled_claims
        })
        .unwrap(),
    );
    assert_ne!(
        claims_string,
        token_string[(header_end + 1)..(signature_start - 1)]
    );
    let mut mangled_str = token_string.clone();
    mangled_str.replace_range((header_end + 1)..(signature_start - 1), &claims_string);
    let err = decode(&mangled_str, &options).unwrap_err();
    assert_matches!(err, DecodeError::InvalidSignature);

    // Strip the signature.
    let stripped_str = &token_string[..(signature_start - 1)];
    let err = decode(stripped_str, &options).unwrap_err();
    assert_matches!(err, DecodeError::InvalidSegmentCount);
}
