//! `EdDSA` (Ed25519) backend on top of `ed25519-dalek`.

use ed25519_dalek::{Signature, Signer, PUBLIC_KEY_LENGTH, SIGNATURE_LENGTH};

use core::num::NonZeroUsize;
use std::borrow::Cow;

use crate::{
    jwk::{JsonWebKey, JwkError, KeyType},
    Algorithm, AlgorithmSignature,
};

/// Curve name used in the `crv` field of `OKP` keys.
const CURVE: &str = "Ed25519";

impl AlgorithmSignature for Signature {
    const LENGTH: Option<NonZeroUsize> = NonZeroUsize::new(SIGNATURE_LENGTH);

    fn try_from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
        Self::from_slice(bytes).map_err(|err| anyhow::anyhow!(err))
    }

    fn as_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Owned(self.to_bytes().to_vec())
    }
}

/// Signatures on the Ed25519 curve, declared as `EdDSA` in token headers
/// (see the [IANA registry]).
///
/// Verification uses the strict variant of the algorithm, which rejects small-order keys
/// and non-canonical signatures.
///
/// [IANA registry]: https://www.iana.org/assignments/jose/jose.xhtml
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
pub struct Ed25519;

impl Algorithm for Ed25519 {
    type SigningKey = ed25519_dalek::SigningKey;
    type VerifyingKey = ed25519_dalek::VerifyingKey;
    type Signature = Signature;

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed("EdDSA")
    }

    fn sign(&self, signing_key: &Self::SigningKey, message: &[u8]) -> Self::Signature {
        signing_key.sign(message)
    }

    fn verify_signature(
        &self,
        signature: &Self::Signature,
        verifying_key: &Self::VerifyingKey,
        message: &[u8],
    ) -> bool {
        verifying_key.verify_strict(message, signature).is_ok()
    }
}

impl<'a> From<&'a ed25519_dalek::VerifyingKey> for JsonWebKey<'a> {
    fn from(key: &'a ed25519_dalek::VerifyingKey) -> JsonWebKey<'a> {
        JsonWebKey::KeyPair {
            curve: Cow::Borrowed(CURVE),
            x: Cow::Borrowed(key.as_bytes()),
        }
    }
}

/// Only the public half of the key is exposed.
impl<'a> From<&'a ed25519_dalek::SigningKey> for JsonWebKey<'a> {
    fn from(key: &'a ed25519_dalek::SigningKey) -> JsonWebKey<'a> {
        JsonWebKey::KeyPair {
            curve: Cow::Borrowed(CURVE),
            x: Cow::Borrowed(key.as_ref().as_bytes()),
        }
    }
}

impl TryFrom<&JsonWebKey<'_>> for ed25519_dalek::VerifyingKey {
    type Error = JwkError;

    fn try_from(jwk: &JsonWebKey<'_>) -> Result<Self, Self::Error> {
        let JsonWebKey::KeyPair { curve, x } = jwk else {
            return Err(JwkError::key_type(jwk, KeyType::KeyPair));
        };
        JsonWebKey::ensure_curve(curve, CURVE)?;
        JsonWebKey::ensure_len("x", x, PUBLIC_KEY_LENGTH)?;

        let mut bytes = [0_u8; PUBLIC_KEY_LENGTH];
        bytes.copy_from_slice(x);
        Self::from_bytes(&bytes).map_err(|err| JwkError::custom(anyhow::anyhow!(err)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn signing_key() -> ed25519_dalek::SigningKey {
        ed25519_dalek::SigningKey::from_bytes(&[42; 32])
    }

    #[test]
    fn signing_and_verification() {
        let signing_key = signing_key();
        let verifying_key = signing_key.verifying_key();
        let signature = Ed25519.sign(&signing_key, b"message");
        assert!(Ed25519.verify_signature(&signature, &verifying_key, b"message"));
        assert!(!Ed25519.verify_signature(&signature, &verifying_key, b"other"));

        let raw = signature.as_bytes();
        assert_eq!(raw.len(), SIGNATURE_LENGTH);
        assert!(Ed25519.verify_raw_signature(&raw, &verifying_key, b"message"));
        assert!(!Ed25519.verify_raw_signature(&raw[1..], &verifying_key, b"message"));
    }

    #[test]
    fn jwk_conversions() {
        let signing_key = signing_key();
        let verifying_key = signing_key.verifying_key();
        let jwk = JsonWebKey::from(&signing_key);
        assert_eq!(jwk, JsonWebKey::from(&verifying_key));
        assert_eq!(
            ed25519_dalek::VerifyingKey::try_from(&jwk).unwrap(),
            verifying_key
        );

        let wrong_curve = JsonWebKey::KeyPair {
            curve: Cow::Borrowed("X25519"),
            x: Cow::Borrowed(verifying_key.as_bytes()),
        };
        let err = ed25519_dalek::VerifyingKey::try_from(&wrong_curve).unwrap_err();
        assert!(matches!(err, JwkError::UnexpectedValue { ref field, .. } if field == "crv"));
    }
}
