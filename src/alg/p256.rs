//! `ES256` backend on top of the `p256` crate.

use p256::{
    ecdsa::{
        signature::{DigestSigner, DigestVerifier},
        Signature, SigningKey, VerifyingKey,
    },
    EncodedPoint, FieldBytes,
};
use sha2::{Digest, Sha256};

use core::num::NonZeroUsize;
use std::borrow::Cow;

use crate::{
    jwk::{JsonWebKey, JwkError, KeyType},
    Algorithm, AlgorithmSignature,
};

/// Curve name used in the `crv` field of `EC` keys.
const CURVE: &str = "P-256";
/// Byte size of a single curve point coordinate.
const COORDINATE_SIZE: usize = 32;

impl AlgorithmSignature for Signature {
    const LENGTH: Option<NonZeroUsize> = NonZeroUsize::new(2 * COORDINATE_SIZE);

    fn try_from_slice(slice: &[u8]) -> anyhow::Result<Self> {
        Signature::from_slice(slice).map_err(|err| anyhow::anyhow!(err))
    }

    fn as_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_bytes().to_vec())
    }
}

/// ECDSA signatures on the secp256r1 curve (aka P-256) with SHA-256,
/// declared as `ES256` in token headers.
///
/// Signatures are encoded as the concatenation of the `r` and `s` scalars, as required
/// by [RFC 7518]; DER-encoded signatures are rejected.
///
/// [RFC 7518]: https://www.rfc-editor.org/rfc/rfc7518.html#section-3.4
#[derive(Debug, Clone, Copy, Default)]
pub struct Es256;

impl Algorithm for Es256 {
    type SigningKey = SigningKey;
    type VerifyingKey = VerifyingKey;
    type Signature = Signature;

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("ES256")
    }

    fn sign(&self, signing_key: &Self::SigningKey, message: &[u8]) -> Self::Signature {
        signing_key.sign_digest(Sha256::new_with_prefix(message))
    }

    fn verify_signature(
        &self,
        signature: &Self::Signature,
        verifying_key: &Self::VerifyingKey,
        message: &[u8],
    ) -> bool {
        verifying_key
            .verify_digest(Sha256::new_with_prefix(message), signature)
            .is_ok()
    }
}

impl<'a> From<&'a VerifyingKey> for JsonWebKey<'a> {
    fn from(key: &'a VerifyingKey) -> JsonWebKey<'a> {
        let point = key.to_encoded_point(false);
        let coordinate = |bytes: Option<&FieldBytes>| bytes.map_or_else(Vec::new, |b| b.to_vec());
        JsonWebKey::EllipticCurve {
            curve: Cow::Borrowed(CURVE),
            x: Cow::Owned(coordinate(point.x())),
            y: Cow::Owned(coordinate(point.y())),
        }
    }
}

/// Only the public half of the key is exposed.
impl<'a> From<&'a SigningKey> for JsonWebKey<'a> {
    fn from(key: &'a SigningKey) -> JsonWebKey<'a> {
        JsonWebKey::from(key.verifying_key())
    }
}

impl TryFrom<&JsonWebKey<'_>> for VerifyingKey {
    type Error = JwkError;

    fn try_from(jwk: &JsonWebKey<'_>) -> Result<Self, Self::Error> {
        let JsonWebKey::EllipticCurve { curve, x, y } = jwk else {
            return Err(JwkError::key_type(jwk, KeyType::EllipticCurve));
        };
        JsonWebKey::ensure_curve(curve, CURVE)?;
        JsonWebKey::ensure_len("x", x, COORDINATE_SIZE)?;
        JsonWebKey::ensure_len("y", y, COORDINATE_SIZE)?;

        let point = EncodedPoint::from_affine_coordinates(
            FieldBytes::from_slice(x),
            FieldBytes::from_slice(y),
            false,
        );
        Self::from_encoded_point(&point).map_err(|err| JwkError::custom(anyhow::anyhow!(err)))
    }
}
