//! Typed signature algorithms backing [`StandardAlgorithms`](crate::StandardAlgorithms).
//!
//! Each algorithm can sign tokens (see [`AlgorithmExt`](crate::AlgorithmExt)) and verify
//! signatures with a key converted from its [JWK presentation](crate::jwk::JsonWebKey).

mod hmacs;
mod secret;

#[cfg(feature = "ed25519-dalek")]
mod eddsa_dalek;
#[cfg(feature = "p256")]
mod p256;
#[cfg(feature = "rsa")]
mod rsa;

pub use self::{hmacs::*, secret::SecretBytes};

#[cfg(feature = "ed25519-dalek")]
#[cfg_attr(docsrs, doc(cfg(feature = "ed25519-dalek")))]
pub use self::eddsa_dalek::Ed25519;
#[cfg(feature = "p256")]
#[cfg_attr(docsrs, doc(cfg(feature = "p256")))]
pub use self::p256::Es256;
#[cfg(feature = "rsa")]
#[cfg_attr(docsrs, doc(cfg(feature = "rsa")))]
pub use self::rsa::{ModulusBits, ModulusBitsError, Rsa, RsaPrivateKey, RsaPublicKey, RsaSignature};
