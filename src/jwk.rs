//! Basic support of [JSON Web Keys](https://tools.ietf.org/html/rfc7517.html) (JWK)
//! and key sets (JWKS).
//!
//! The functionality defined in this module allows converting between
//! the [generic JWK format](JsonWebKey) and key presentation specific for the crypto backend.
//! Only public key material is retained: the decoding pipeline never needs private keys,
//! so private fields of deserialized keys (e.g., `d` for EC keys) are ignored.
//!
//! # Examples
//!
//! ```
//! use jwt_decoder::{jwk::JsonWebKeySet, JwksResolver};
//!
//! # fn main() -> anyhow::Result<()> {
//! let json_str = r#"{
//!     "keys": [
//!         { "kty": "oct", "kid": "2024-01", "k": "dGVzdA" },
//!         { "kty": "oct", "kid": "2024-02", "k": "dGVzdDI" }
//!     ]
//! }"#;
//! let key_set: JsonWebKeySet = serde_json::from_str(json_str)?;
//! let keys = key_set.lookup(Some("2024-02"))?;
//! assert_eq!(keys.len(), 1);
//! assert!(key_set.lookup(Some("2023-12")).is_err());
//! # Ok(())
//! # }
//! ```

use serde::{Deserialize, Deserializer, Serialize, Serializer};

use core::fmt;
use std::borrow::Cow;

use crate::{alg::SecretBytes, error::KeyLookupError, DecodingKey, JwksResolver, Keys};

/// Type of a [`JsonWebKey`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum KeyType {
    /// Public RSA key. Maps to the `RSA` value of the `kty` field for JWKs.
    Rsa,
    /// Public key in an ECDSA crypto system. Maps to the `EC` value
    /// of the `kty` field for JWKs.
    EllipticCurve,
    /// Symmetric key. Maps to the `oct` value of the `kty` field for JWKs.
    Symmetric,
    /// Generic asymmetric key. Maps to the `OKP` value of the `kty` field for JWKs.
    KeyPair,
}

impl fmt::Display for KeyType {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Rsa => "RSA",
            Self::EllipticCurve => "EC",
            Self::Symmetric => "oct",
            Self::KeyPair => "OKP",
        })
    }
}

/// Errors that can occur when transforming a [`JsonWebKey`] into the presentation specific for
/// a crypto backend, via [`TryFrom`] trait.
#[derive(Debug)]
#[non_exhaustive]
pub enum JwkError {
    /// Key type (the `kty` field) is not as expected.
    UnexpectedKeyType {
        /// Expected key type.
        expected: KeyType,
        /// Actual key type.
        actual: KeyType,
    },
    /// JWK field has an unexpected value.
    UnexpectedValue {
        /// Field name.
        field: String,
        /// Expected value of the field.
        expected: String,
        /// Actual value of the field.
        actual: String,
    },
    /// JWK field has an unexpected byte length.
    UnexpectedLen {
        /// Field name.
        field: String,
        /// Expected byte length of the field.
        expected: usize,
        /// Actual byte length of the field.
        actual: usize,
    },
    /// Custom error specific to a crypto backend.
    Custom(anyhow::Error),
}

impl fmt::Display for JwkError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::UnexpectedKeyType { expected, actual } => {
                write!(formatter, "Unexpected key type: {actual} (expected {expected})")
            }
            Self::UnexpectedValue {
                field,
                expected,
                actual,
            } => {
                write!(
                    formatter,
                    "field `{field}` has unexpected value (expected: {expected}, got: {actual})"
                )
            }
            Self::UnexpectedLen {
                field,
                expected,
                actual,
            } => {
                write!(
                    formatter,
                    "field `{field}` has unexpected length (expected: {expected}, got: {actual})"
                )
            }
            Self::Custom(err) => fmt::Display::fmt(err, formatter),
        }
    }
}

impl std::error::Error for JwkError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::Custom(err) => Some(err.as_ref()),
            _ => None,
        }
    }
}

impl JwkError {
    /// Creates a `Custom` error variant.
    pub fn custom(err: impl Into<anyhow::Error>) -> Self {
        Self::Custom(err.into())
    }

    pub(crate) fn key_type(jwk: &JsonWebKey<'_>, expected: KeyType) -> Self {
        let actual = jwk.key_type();
        debug_assert_ne!(actual, expected);
        Self::UnexpectedKeyType { actual, expected }
    }
}

impl Serialize for SecretBytes<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        base64url::serialize(self.as_ref(), serializer)
    }
}

impl<'de> Deserialize<'de> for SecretBytes<'_> {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        base64url::deserialize(deserializer).map(SecretBytes::new)
    }
}

/// Public [JWK] presentation: (de)serialization and conversions to backend-specific keys.
///
/// See [RFC 7518] for the details about key presentation.
///
/// [RFC 7518]: https://tools.ietf.org/html/rfc7518#section-6
/// [JWK]: https://tools.ietf.org/html/rfc7517.html
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kty")]
#[non_exhaustive]
pub enum JsonWebKey<'a> {
    /// Public RSA key. Has `kty` field set to `RSA`.
    #[serde(rename = "RSA")]
    Rsa {
        /// Key modulus (`n`). Serialized in the base64-url encoding using
        /// the big endian presentation with the minimum necessary number of bytes.
        #[serde(rename = "n", with = "base64url")]
        modulus: Cow<'a, [u8]>,
        /// Public exponent (`e`). Serialized in the base64-url encoding using
        /// the big endian presentation with the minimum necessary number of bytes.
        #[serde(rename = "e", with = "base64url")]
        public_exponent: Cow<'a, [u8]>,
    },
    /// Public key in an ECDSA crypto system. Has `kty` field set to `EC`.
    #[serde(rename = "EC")]
    EllipticCurve {
        /// Curve name (`crv`), such as `P-256`.
        #[serde(rename = "crv")]
        curve: Cow<'a, str>,
        /// `x` coordinate of the curve point. Serialized in the base64-url encoding.
        #[serde(with = "base64url")]
        x: Cow<'a, [u8]>,
        /// `y` coordinate of the curve point. Serialized in the base64-url encoding.
        #[serde(with = "base64url")]
        y: Cow<'a, [u8]>,
    },
    /// Generic symmetric key, e.g. for `HS256` algorithm. Has `kty` field set to `oct`.
    #[serde(rename = "oct")]
    Symmetric {
        /// Bytes representing this key. Serialized in the base64-url encoding.
        #[serde(rename = "k")]
        secret: SecretBytes<'a>,
    },
    /// Generic asymmetric key. This key type is used, for example for Ed25519 keys.
    #[serde(rename = "OKP")]
    KeyPair {
        /// Curve name (`crv`), such as `Ed25519`.
        #[serde(rename = "crv")]
        curve: Cow<'a, str>,
        /// Public key bytes. Serialized in the base64-url encoding.
        #[serde(with = "base64url")]
        x: Cow<'a, [u8]>,
    },
}

impl JsonWebKey<'_> {
    /// Gets the type of this key.
    pub fn key_type(&self) -> KeyType {
        match self {
            Self::Rsa { .. } => KeyType::Rsa,
            Self::EllipticCurve { .. } => KeyType::EllipticCurve,
            Self::Symmetric { .. } => KeyType::Symmetric,
            Self::KeyPair { .. } => KeyType::KeyPair,
        }
    }

    /// Converts this key into an owned version, detaching it from the borrowed data.
    pub fn into_owned(self) -> JsonWebKey<'static> {
        fn owned<T: ToOwned + ?Sized>(cow: Cow<'_, T>) -> Cow<'static, T> {
            Cow::Owned(cow.into_owned())
        }

        match self {
            Self::Rsa {
                modulus,
                public_exponent,
            } => JsonWebKey::Rsa {
                modulus: owned(modulus),
                public_exponent: owned(public_exponent),
            },
            Self::EllipticCurve { curve, x, y } => JsonWebKey::EllipticCurve {
                curve: owned(curve),
                x: owned(x),
                y: owned(y),
            },
            Self::Symmetric { secret } => JsonWebKey::Symmetric {
                secret: SecretBytes::owned(secret.to_vec()),
            },
            Self::KeyPair { curve, x } => JsonWebKey::KeyPair {
                curve: owned(curve),
                x: owned(x),
            },
        }
    }
}

#[cfg(any(feature = "p256", feature = "ed25519-dalek"))]
impl JsonWebKey<'_> {
    pub(crate) fn ensure_curve(curve: &str, expected: &str) -> Result<(), JwkError> {
        if curve == expected {
            Ok(())
        } else {
            Err(JwkError::UnexpectedValue {
                field: "crv".to_owned(),
                expected: expected.to_owned(),
                actual: curve.to_owned(),
            })
        }
    }

    pub(crate) fn ensure_len(
        field: &str,
        bytes: &[u8],
        expected_len: usize,
    ) -> Result<(), JwkError> {
        if bytes.len() == expected_len {
            Ok(())
        } else {
            Err(JwkError::UnexpectedLen {
                field: field.to_owned(),
                expected: expected_len,
                actual: bytes.len(),
            })
        }
    }
}

/// Entry of a [`JsonWebKeySet`]: a key together with its ID (`kid`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct KeySetEntry {
    /// Key ID.
    #[serde(rename = "kid", default, skip_serializing_if = "Option::is_none")]
    pub key_id: Option<String>,
    /// Key material.
    #[serde(flatten)]
    pub key: JsonWebKey<'static>,
}

/// JSON Web Key Set, as defined in [RFC 7517](https://tools.ietf.org/html/rfc7517#section-5).
///
/// The set implements [`JwksResolver`] by looking up keys by the `kid` declared in the token
/// header. If several entries share the same `kid`, all of them are returned as candidates.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct JsonWebKeySet {
    keys: Vec<KeySetEntry>,
}

impl JsonWebKeySet {
    /// Creates a key set from the provided entries.
    pub fn new(keys: Vec<KeySetEntry>) -> Self {
        Self { keys }
    }

    /// Adds a key with the specified ID to this set.
    #[must_use]
    pub fn with_key(mut self, key_id: impl Into<String>, key: JsonWebKey<'_>) -> Self {
        self.keys.push(KeySetEntry {
            key_id: Some(key_id.into()),
            key: key.into_owned(),
        });
        self
    }

    /// Returns entries in this set.
    pub fn keys(&self) -> &[KeySetEntry] {
        &self.keys
    }

    /// Finds keys with the specified ID.
    pub fn find(&self, key_id: &str) -> Result<Keys, KeyLookupError> {
        if self.keys.is_empty() {
            return Err(KeyLookupError::EmptyKeySet);
        }
        let keys: Keys = self
            .keys
            .iter()
            .filter(|entry| entry.key_id.as_deref() == Some(key_id))
            .map(|entry| DecodingKey::from_jwk(&entry.key))
            .collect();
        if keys.is_empty() {
            Err(KeyLookupError::UnknownKeyId(key_id.to_owned()))
        } else {
            Ok(keys)
        }
    }
}

impl JwksResolver for JsonWebKeySet {
    fn lookup(&self, key_id: Option<&str>) -> anyhow::Result<Keys> {
        let key_id = key_id.ok_or(KeyLookupError::MissingKeyId)?;
        Ok(self.find(key_id)?)
    }
}

mod base64url {
    use base64ct::{Base64UrlUnpadded, Encoding};
    use serde::{
        de::{Error as DeError, Unexpected, Visitor},
        Deserializer, Serializer,
    };

    use core::fmt;
    use std::borrow::Cow;

    pub fn serialize<S>(value: &[u8], serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        serializer.serialize_str(&Base64UrlUnpadded::encode_string(value))
    }

    pub fn deserialize<'de, D>(deserializer: D) -> Result<Cow<'static, [u8]>, D::Error>
    where
        D: Deserializer<'de>,
    {
        struct Base64Visitor;

        impl Visitor<'_> for Base64Visitor {
            type Value = Vec<u8>;

            fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.write_str("base64url-encoded data")
            }

            fn visit_str<E: DeError>(self, value: &str) -> Result<Self::Value, E> {
                Base64UrlUnpadded::decode_vec(value)
                    .map_err(|_| E::invalid_value(Unexpected::Str(value), &self))
            }
        }

        deserializer.deserialize_str(Base64Visitor).map(Cow::Owned)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::alg::Hs256Key;

    use assert_matches::assert_matches;

    fn create_jwk() -> JsonWebKey<'static> {
        JsonWebKey::KeyPair {
            curve: Cow::Borrowed("Ed25519"),
            x: Cow::Borrowed(b"test"),
        }
    }

    #[test]
    fn serializing_jwk() {
        let jwk = create_jwk();

        let json = serde_json::to_value(&jwk).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "crv": "Ed25519", "kty": "OKP", "x": "dGVzdA" })
        );

        let restored: JsonWebKey<'_> = serde_json::from_value(json).unwrap();
        assert_eq!(restored, jwk);
    }

    #[test]
    fn private_fields_are_ignored() {
        let json = serde_json::json!({
            "crv": "Ed25519",
            "kty": "OKP",
            "x": "dGVzdA",
            "d": "c2VjcmV0",
        });
        let jwk: JsonWebKey<'_> = serde_json::from_value(json).unwrap();
        assert_eq!(jwk, create_jwk());
    }

    #[test]
    fn jwk_deserialization_errors() {
        let missing_field_json = r#"{"crv":"Ed25519"}"#;
        let missing_field_err = serde_json::from_str::<JsonWebKey<'_>>(missing_field_json)
            .unwrap_err()
            .to_string();
        assert!(
            missing_field_err.contains("missing field `kty`"),
            "{missing_field_err}"
        );

        let base64_json = r#"{"crv":"Ed25519","kty":"OKP","x":"??"}"#;
        let base64_err = serde_json::from_str::<JsonWebKey<'_>>(base64_json)
            .unwrap_err()
            .to_string();
        assert!(
            base64_err.contains("invalid value: string \"??\""),
            "{base64_err}"
        );
        assert!(base64_err.contains("base64url-encoded data"), "{base64_err}");
    }

    #[test]
    fn key_set_lookup() {
        let json_str = r#"{
            "keys": [
                { "kty": "oct", "kid": "first", "k": "dGVzdA", "use": "sig" },
                { "kty": "OKP", "crv": "Ed25519", "x": "dGVzdA" },
                { "kty": "oct", "kid": "second", "k": "dGVzdDI" },
                { "kty": "oct", "kid": "second", "k": "dGVzdDM" }
            ]
        }"#;
        let key_set: JsonWebKeySet = serde_json::from_str(json_str).unwrap();
        assert_eq!(key_set.keys().len(), 4);
        assert_eq!(key_set.keys()[1].key_id, None);

        let keys = key_set.find("first").unwrap();
        let key = keys.iter().next().unwrap();
        assert_matches!(key.jwk(), JsonWebKey::Symmetric { secret } if secret.as_ref() == b"test");
        let hs_key = Hs256Key::try_from(key.jwk()).unwrap();
        assert_eq!(hs_key.as_ref(), b"test");

        assert_eq!(key_set.find("second").unwrap().len(), 2);
        assert_matches!(
            key_set.find("third").unwrap_err(),
            KeyLookupError::UnknownKeyId(kid) if kid == "third"
        );
    }

    #[test]
    fn key_set_lookup_errors() {
        let err = JsonWebKeySet::default().lookup(Some("kid")).unwrap_err();
        assert_matches!(err.downcast_ref::<KeyLookupError>(), Some(KeyLookupError::EmptyKeySet));

        let key_set = JsonWebKeySet::default().with_key("kid", create_jwk());
        let err = key_set.lookup(None).unwrap_err();
        assert_matches!(err.downcast_ref::<KeyLookupError>(), Some(KeyLookupError::MissingKeyId));
        assert_eq!(key_set.lookup(Some("kid")).unwrap().len(), 1);
    }
}
