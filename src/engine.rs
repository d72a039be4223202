//! Signature engine: verification of signatures for named algorithms.

use crate::{
    alg::{Hs256, Hs384, Hs512},
    jwk::{JsonWebKey, JwkError},
    Algorithm, DecodingKey,
};

/// Engine verifying signatures for algorithms identified by name (e.g., `HS256`).
///
/// The engine receives the algorithm identifier from the configured allow-list,
/// never the value declared by the token.
pub trait SignatureEngine: Send + Sync {
    /// Checks whether the engine recognizes the algorithm.
    fn supports(&self, algorithm: &str) -> bool;

    /// Verifies `signature` over `signing_input` with the specified algorithm and key.
    /// Must return `false` (rather than panic) if the key is not suitable for the algorithm
    /// or the signature is malformed.
    fn verify(
        &self,
        algorithm: &str,
        key: &DecodingKey,
        signing_input: &[u8],
        signature: &[u8],
    ) -> bool;
}

/// Default [`SignatureEngine`] backed by the algorithms from the [`alg`](crate::alg) module.
///
/// `HS256`, `HS384` and `HS512` are always supported. `RS*` / `PS*`, `ES256` and `EdDSA`
/// require the `rsa`, `p256` and `ed25519-dalek` crate features respectively.
#[derive(Debug, Clone, Copy, Default)]
pub struct StandardAlgorithms;

impl StandardAlgorithms {
    const HMAC_ALGORITHMS: [&'static str; 3] = ["HS256", "HS384", "HS512"];
}

/// Verifies a signature with a typed algorithm, converting the key from its JWK presentation.
fn verify_with<A>(
    algorithm: &A,
    key: &DecodingKey,
    signing_input: &[u8],
    signature: &[u8],
) -> bool
where
    A: Algorithm,
    A::VerifyingKey: for<'a> TryFrom<&'a JsonWebKey<'static>, Error = JwkError>,
{
    let Ok(verifying_key) = A::VerifyingKey::try_from(key.jwk()) else {
        return false;
    };
    algorithm.verify_raw_signature(signature, &verifying_key, signing_input)
}

impl SignatureEngine for StandardAlgorithms {
    fn supports(&self, algorithm: &str) -> bool {
        if Self::HMAC_ALGORITHMS.contains(&algorithm) {
            return true;
        }
        #[cfg(feature = "rsa")]
        if crate::alg::Rsa::with_name(algorithm).is_some() {
            return true;
        }
        #[cfg(feature = "p256")]
        if algorithm == "ES256" {
            return true;
        }
        #[cfg(feature = "ed25519-dalek")]
        if algorithm == "EdDSA" {
            return true;
        }
        false
    }

    fn verify(
        &self,
        algorithm: &str,
        key: &DecodingKey,
        signing_input: &[u8],
        signature: &[u8],
    ) -> bool {
        match algorithm {
            "HS256" => verify_with(&Hs256, key, signing_input, signature),
            "HS384" => verify_with(&Hs384, key, signing_input, signature),
            "HS512" => verify_with(&Hs512, key, signing_input, signature),
            #[cfg(feature = "p256")]
            "ES256" => verify_with(&crate::alg::Es256, key, signing_input, signature),
            #[cfg(feature = "ed25519-dalek")]
            "EdDSA" => verify_with(&crate::alg::Ed25519, key, signing_input, signature),
            #[cfg(feature = "rsa")]
            other => crate::alg::Rsa::with_name(other).map_or(false, |rsa| {
                verify_with(&rsa, key, signing_input, signature)
            }),
            #[cfg(not(feature = "rsa"))]
            _ => false,
        }
    }
}
