//! Token segments, JWT header and segment decoding.

use base64ct::{Base64UrlUnpadded, Encoding};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{Map, Value};
use smallvec::SmallVec;

use crate::{AlgorithmMatching, DecodeError};

/// Maximum "reasonable" signature size in bytes.
pub(crate) const SIGNATURE_SIZE: usize = 128;

/// Decoded signature bytes.
pub(crate) type SignatureBytes = SmallVec<[u8; SIGNATURE_SIZE]>;

/// Raw `.`-separated segments of a token.
#[derive(Debug, Clone, Copy)]
pub(crate) struct Segments<'a> {
    header: &'a str,
    payload: &'a str,
    signature: Option<&'a str>,
    signing_input: &'a str,
}

impl<'a> Segments<'a> {
    /// Splits `token` into segments. Fails if the token is empty, or if the number of
    /// segments is neither 2 nor 3.
    pub fn split(token: &'a str) -> Result<Self, DecodeError> {
        if token.is_empty() {
            return Err(DecodeError::EmptyToken);
        }

        let parts: SmallVec<[&str; 3]> = token.splitn(4, '.').collect();
        match parts[..] {
            [header, payload] => Ok(Self {
                header,
                payload,
                signature: None,
                signing_input: token,
            }),
            [header, payload, signature] => Ok(Self {
                header,
                payload,
                signature: Some(signature),
                signing_input: &token[..header.len() + 1 + payload.len()],
            }),
            _ => Err(DecodeError::InvalidSegmentCount),
        }
    }

    /// Checks that the segment count is acceptable for the declared algorithm.
    /// 3 segments are always accepted; 2 segments only if verification is disabled
    /// or the token declares the `none` algorithm.
    pub fn validate_count(
        &self,
        verify: bool,
        declared_alg: Option<&str>,
        matching: AlgorithmMatching,
    ) -> Result<(), DecodeError> {
        if self.signature.is_some() || !verify {
            return Ok(());
        }
        match declared_alg {
            Some(alg) if matching.matches("none", alg) => Ok(()),
            _ => Err(DecodeError::InvalidSegmentCount),
        }
    }

    pub fn header(&self) -> &'a str {
        self.header
    }

    pub fn payload(&self) -> &'a str {
        self.payload
    }

    /// Header and payload segments joined by `.`, i.e., the bytes covered by the signature.
    pub fn signing_input(&self) -> &'a [u8] {
        self.signing_input.as_bytes()
    }

    pub fn decode_signature(&self) -> Result<SignatureBytes, DecodeError> {
        let Some(signature) = self.signature else {
            return Ok(SignatureBytes::new());
        };
        let signature = trim_padding(signature);
        let mut decoded: SignatureBytes = smallvec::smallvec![0; 3 * (signature.len() + 3) / 4];
        let len = Base64UrlUnpadded::decode(signature, &mut decoded)
            .map_err(|_| DecodeError::InvalidSegmentEncoding)?
            .len();
        decoded.truncate(len);
        Ok(decoded)
    }
}

/// RFC 7515 defines base64url without padding, but trailing `=` chars are easy to trim,
/// so they are tolerated.
fn trim_padding(mut segment: &str) -> &str {
    for _ in 0..2 {
        if let Some(trimmed) = segment.strip_suffix('=') {
            segment = trimmed;
        }
    }
    segment
}

/// Decodes a base64url-encoded JSON segment. All decoding failures are mapped
/// to [`DecodeError::InvalidSegmentEncoding`].
pub(crate) fn decode_segment<T: DeserializeOwned>(raw_segment: &str) -> Result<T, DecodeError> {
    let bytes = Base64UrlUnpadded::decode_vec(trim_padding(raw_segment))
        .map_err(|_| DecodeError::InvalidSegmentEncoding)?;
    serde_json::from_slice(&bytes).map_err(|_| DecodeError::InvalidSegmentEncoding)
}

/// JWT header.
///
/// Unlike claims, the header is not validated by the decoding pipeline beyond its `alg`
/// field. All fields used to find the verifying key (`kid`, `x5c`, etc.) are provided
/// by the adversary in the case of an attack, so key resolvers must treat them
/// as untrusted input.
///
/// See [RFC 7515](https://tools.ietf.org/html/rfc7515#section-4.1) for the description
/// of the fields.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Header {
    fields: Map<String, Value>,
}

impl Header {
    /// Creates a header from the provided `fields`.
    pub fn new(fields: Map<String, Value>) -> Self {
        Self { fields }
    }

    /// Gets the signing algorithm declared by the token (the `alg` field).
    /// Returns `None` if the field is absent or is not a string.
    pub fn algorithm(&self) -> Option<&str> {
        self.fields.get("alg").and_then(Value::as_str)
    }

    /// Gets the identifier of the key that has signed the token (the `kid` field).
    pub fn key_id(&self) -> Option<&str> {
        self.fields.get("kid").and_then(Value::as_str)
    }

    /// Gets the token type (the `typ` field).
    pub fn token_type(&self) -> Option<&str> {
        self.fields.get("typ").and_then(Value::as_str)
    }

    /// Gets the raw X.509 certificate chain (the `x5c` field).
    pub fn certificate_chain(&self) -> Option<&Value> {
        self.fields.get("x5c")
    }

    /// Gets an arbitrary header field.
    pub fn get(&self, name: &str) -> Option<&Value> {
        self.fields.get(name)
    }

    /// Returns all header fields.
    pub fn fields(&self) -> &Map<String, Value> {
        &self.fields
    }

    /// Converts this header into the underlying JSON object.
    pub fn into_fields(self) -> Map<String, Value> {
        self.fields
    }

    pub(crate) fn decode(raw_segment: &str) -> Result<Self, DecodeError> {
        decode_segment(raw_segment).map(Self::new)
    }
}

impl From<Map<String, Value>> for Header {
    fn from(fields: Map<String, Value>) -> Self {
        Self::new(fields)
    }
}

/// Successfully decoded (and, if enabled, verified) token.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodedToken {
    payload: Value,
    header: Header,
}

impl DecodedToken {
    pub(crate) fn new(payload: Value, header: Header) -> Self {
        Self { payload, header }
    }

    /// Gets the token header.
    pub fn header(&self) -> &Header {
        &self.header
    }

    /// Gets the token payload.
    pub fn payload(&self) -> &Value {
        &self.payload
    }

    /// Deserializes the payload into a typed claims structure.
    pub fn claims<T: DeserializeOwned>(&self) -> Result<T, serde_json::Error> {
        T::deserialize(&self.payload)
    }

    /// Splits this token into the payload and header, in this order.
    pub fn into_parts(self) -> (Value, Header) {
        (self.payload, self.header)
    }
}
