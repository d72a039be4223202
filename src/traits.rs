//! Traits for typed signature algorithms.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{ser::SerializeMap, Serialize, Serializer};
use serde_json::{Map, Value};

use core::num::NonZeroUsize;
use std::borrow::Cow;

/// Signature for a certain JWT signing [`Algorithm`].
///
/// We require that signature can be restored from a byte slice,
/// and can be represented as a byte slice.
pub trait AlgorithmSignature: Sized {
    /// Constant byte length of signatures supported by the [`Algorithm`], or `None` if
    /// the signature length is variable.
    ///
    /// If this value is `Some(_)`, signatures of other lengths are rejected without
    /// calling [`Self::try_from_slice()`].
    const LENGTH: Option<NonZeroUsize> = None;

    /// Attempts to restore a signature from a byte slice. This method may fail
    /// if the slice is malformed.
    fn try_from_slice(slice: &[u8]) -> anyhow::Result<Self>;

    /// Represents this signature as bytes.
    fn as_bytes(&self) -> Cow<'_, [u8]>;
}

/// JWT signing algorithm.
pub trait Algorithm {
    /// Key used when issuing new tokens.
    type SigningKey;
    /// Key used when verifying tokens. May coincide with [`Self::SigningKey`] for symmetric
    /// algorithms (e.g., `HS*`).
    type VerifyingKey;
    /// Signature produced by the algorithm.
    type Signature: AlgorithmSignature;

    /// Returns the name of this algorithm, as mentioned in the `alg` field of the JWT header.
    fn name(&self) -> Cow<'static, str>;

    /// Signs a `message` with the `signing_key`.
    fn sign(&self, signing_key: &Self::SigningKey, message: &[u8]) -> Self::Signature;

    /// Verifies the `message` against the `signature` and `verifying_key`.
    fn verify_signature(
        &self,
        signature: &Self::Signature,
        verifying_key: &Self::VerifyingKey,
        message: &[u8],
    ) -> bool;

    /// Verifies a raw `signature`. Returns `false` if the signature has an unexpected length
    /// or cannot be parsed.
    fn verify_raw_signature(
        &self,
        signature: &[u8],
        verifying_key: &Self::VerifyingKey,
        message: &[u8],
    ) -> bool {
        if let Some(expected_len) = Self::Signature::LENGTH {
            if signature.len() != expected_len.get() {
                return false;
            }
        }
        Self::Signature::try_from_slice(signature)
            .map_or(false, |signature| {
                self.verify_signature(&signature, verifying_key, message)
            })
    }
}

/// Automatically implemented extensions of the `Algorithm` trait.
pub trait AlgorithmExt: Algorithm {
    /// Creates a new token and serializes it to string.
    ///
    /// The `alg` field is set from [`Algorithm::name()`] and is placed first in the header;
    /// `header_fields` are appended after it (an `alg` entry among them is ignored).
    fn token<T>(
        &self,
        header_fields: &Map<String, Value>,
        payload: &T,
        signing_key: &Self::SigningKey,
    ) -> Result<String, serde_json::Error>
    where
        T: Serialize + ?Sized;
}

impl<A: Algorithm + ?Sized> AlgorithmExt for A {
    fn token<T>(
        &self,
        header_fields: &Map<String, Value>,
        payload: &T,
        signing_key: &Self::SigningKey,
    ) -> Result<String, serde_json::Error>
    where
        T: Serialize + ?Sized,
    {
        let header = CompleteHeader {
            algorithm: &self.name(),
            fields: header_fields,
        };
        let mut buffer = Vec::new();
        encode_base64_buf(serde_json::to_vec(&header)?, &mut buffer);

        buffer.push(b'.');
        encode_base64_buf(serde_json::to_vec(payload)?, &mut buffer);

        let signature = self.sign(signing_key, &buffer);
        buffer.push(b'.');
        encode_base64_buf(signature.as_bytes(), &mut buffer);

        // SAFETY: safe by construction: base64 alphabet and `.` char are valid UTF-8.
        Ok(unsafe { String::from_utf8_unchecked(buffer) })
    }
}

/// Header with the `alg` field followed by user-provided fields.
struct CompleteHeader<'a> {
    algorithm: &'a str,
    fields: &'a Map<String, Value>,
}

impl Serialize for CompleteHeader<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(None)?;
        map.serialize_entry("alg", self.algorithm)?;
        for (name, value) in self.fields {
            if name != "alg" {
                map.serialize_entry(name, value)?;
            }
        }
        map.end()
    }
}

fn encode_base64_buf(source: impl AsRef<[u8]>, buffer: &mut Vec<u8>) {
    let source = source.as_ref();
    let previous_len = buffer.len();
    let encoded_len = Base64UrlUnpadded::encoded_len(source);
    buffer.resize(previous_len + encoded_len, 0);
    // Cannot fail: the buffer is resized to fit the encoded data.
    let _ = Base64UrlUnpadded::encode(source, &mut buffer[previous_len..]);
}
