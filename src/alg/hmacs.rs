//! JWT algorithms based on HMACs.

use anyhow::ensure;
use hmac::{
    digest::{
        core_api::BlockSizeUser, generic_array::GenericArray, typenum::Unsigned, CtOutput,
        KeyInit, OutputSizeUser,
    },
    Hmac, Mac,
};
use rand_core::{CryptoRng, RngCore};
use sha2::{Sha256, Sha384, Sha512};
use smallvec::{smallvec, SmallVec};
use zeroize::Zeroize;

use core::{fmt, num::NonZeroUsize};
use std::borrow::Cow;

use crate::{
    alg::SecretBytes,
    jwk::{JsonWebKey, JwkError, KeyType},
    Algorithm, AlgorithmSignature,
};

macro_rules! define_hmac_signature {
    (
        $(#[$($attr:meta)+])*
        struct $name:ident<$digest:ident>;
    ) => {
        $(#[$($attr)+])*
        #[derive(Clone, PartialEq, Eq)]
        pub struct $name(CtOutput<Hmac<$digest>>);

        impl fmt::Debug for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.debug_tuple(stringify!($name)).field(&"_").finish()
            }
        }

        impl AlgorithmSignature for $name {
            const LENGTH: Option<NonZeroUsize> =
                NonZeroUsize::new(<$digest as OutputSizeUser>::OutputSize::USIZE);

            fn try_from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
                let expected_len = <$digest as OutputSizeUser>::OutputSize::USIZE;
                ensure!(bytes.len() == expected_len, "Invalid signature length");
                let bytes = GenericArray::clone_from_slice(bytes);
                Ok(Self(CtOutput::new(bytes)))
            }

            fn as_bytes(&self) -> Cow<'_, [u8]> {
                Cow::Owned(self.0.clone().into_bytes().to_vec())
            }
        }
    };
}

define_hmac_signature!(
    /// Signature produced by the [`Hs256`] algorithm.
    struct Hs256Signature<Sha256>;
);
define_hmac_signature!(
    /// Signature produced by the [`Hs384`] algorithm.
    struct Hs384Signature<Sha384>;
);
define_hmac_signature!(
    /// Signature produced by the [`Hs512`] algorithm.
    struct Hs512Signature<Sha512>;
);

macro_rules! define_hmac_key {
    (
        $(#[$($attr:meta)+])*
        struct $name:ident<$digest:ident>([u8; $buffer_size:expr]);
    ) => {
        $(#[$($attr)+])*
        #[derive(Clone, Zeroize)]
        pub struct $name(pub(crate) SmallVec<[u8; $buffer_size]>);

        impl Drop for $name {
            fn drop(&mut self) {
                self.zeroize();
            }
        }

        impl fmt::Debug for $name {
            fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
                formatter.debug_tuple(stringify!($name)).field(&"_").finish()
            }
        }

        impl $name {
            /// Generates a random key using a cryptographically secure RNG.
            /// The key length is equal to the block size of the hash function.
            pub fn generate<R: CryptoRng + RngCore>(rng: &mut R) -> Self {
                let mut key = $name(smallvec![0; <$digest as BlockSizeUser>::BlockSize::USIZE]);
                rng.fill_bytes(&mut key.0);
                key
            }

            /// Creates a key from the specified `bytes`.
            pub fn new(bytes: impl AsRef<[u8]>) -> Self {
                Self(bytes.as_ref().into())
            }

            /// Computes HMAC with this key and the specified `message`.
            fn hmac(&self, message: impl AsRef<[u8]>) -> CtOutput<Hmac<$digest>> {
                let mut hmac = <Hmac<$digest> as KeyInit>::new_from_slice(&self.0)
                    .expect("HMACs work with any key size");
                hmac.update(message.as_ref());
                hmac.finalize()
            }
        }

        impl From<&[u8]> for $name {
            fn from(bytes: &[u8]) -> Self {
                $name(bytes.into())
            }
        }

        impl AsRef<[u8]> for $name {
            fn as_ref(&self) -> &[u8] {
                &self.0
            }
        }
    };
}

define_hmac_key! {
    /// Signing / verifying key for `HS256` algorithm. Zeroed on drop.
    struct Hs256Key<Sha256>([u8; 64]);
}
define_hmac_key! {
    /// Signing / verifying key for `HS384` algorithm. Zeroed on drop.
    struct Hs384Key<Sha384>([u8; 128]);
}
define_hmac_key! {
    /// Signing / verifying key for `HS512` algorithm. Zeroed on drop.
    struct Hs512Key<Sha512>([u8; 128]);
}

macro_rules! define_hmac_algorithm {
    (
        $(#[$($attr:meta)+])*
        struct $name:ident($key:ident, $signature:ident) = $alg_name:expr;
    ) => {
        $(#[$($attr)+])*
        #[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
        pub struct $name;

        impl Algorithm for $name {
            type SigningKey = $key;
            type VerifyingKey = $key;
            type Signature = $signature;

            fn name(&self) -> Cow<'static, str> {
                Cow::Borrowed($alg_name)
            }

            fn sign(&self, signing_key: &Self::SigningKey, message: &[u8]) -> Self::Signature {
                $signature(signing_key.hmac(message))
            }

            fn verify_signature(
                &self,
                signature: &Self::Signature,
                verifying_key: &Self::VerifyingKey,
                message: &[u8],
            ) -> bool {
                // `CtOutput` comparison is constant-time.
                verifying_key.hmac(message) == signature.0
            }
        }

        impl<'a> From<&'a $key> for JsonWebKey<'a> {
            fn from(key: &'a $key) -> JsonWebKey<'a> {
                JsonWebKey::Symmetric {
                    secret: SecretBytes::borrowed(key.as_ref()),
                }
            }
        }

        impl TryFrom<&JsonWebKey<'_>> for $key {
            type Error = JwkError;

            fn try_from(jwk: &JsonWebKey<'_>) -> Result<Self, Self::Error> {
                match jwk {
                    JsonWebKey::Symmetric { secret } => Ok(Self::new(secret)),
                    _ => Err(JwkError::key_type(jwk, KeyType::Symmetric)),
                }
            }
        }
    };
}

define_hmac_algorithm! {
    /// `HS256` signing algorithm.
    ///
    /// See [RFC 7518] for the algorithm specification.
    ///
    /// [RFC 7518]: https://tools.ietf.org/html/rfc7518#section-3.2
    struct Hs256(Hs256Key, Hs256Signature) = "HS256";
}
define_hmac_algorithm! {
    /// `HS384` signing algorithm.
    ///
    /// See [RFC 7518] for the algorithm specification.
    ///
    /// [RFC 7518]: https://tools.ietf.org/html/rfc7518#section-3.2
    struct Hs384(Hs384Key, Hs384Signature) = "HS384";
}
define_hmac_algorithm! {
    /// `HS512` signing algorithm.
    ///
    /// See [RFC 7518] for the algorithm specification.
    ///
    /// [RFC 7518]: https://tools.ietf.org/html/rfc7518#section-3.2
    struct Hs512(Hs512Key, Hs512Signature) = "HS512";
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::thread_rng;

    #[test]
    fn signature_lengths() {
        assert_eq!(Hs256Signature::LENGTH.map(NonZeroUsize::get), Some(32));
        assert_eq!(Hs384Signature::LENGTH.map(NonZeroUsize::get), Some(48));
        assert_eq!(Hs512Signature::LENGTH.map(NonZeroUsize::get), Some(64));
        assert!(Hs256Signature::try_from_slice(&[0; 31]).is_err());
    }

    #[test]
    fn generated_keys_have_block_size() {
        assert_eq!(Hs256Key::generate(&mut thread_rng()).as_ref().len(), 64);
        assert_eq!(Hs512Key::generate(&mut thread_rng()).as_ref().len(), 128);
    }

    #[test]
    fn hmac_verification() {
        let key = Hs384Key::new(b"super_secret_key_donut_steel");
        let signature = Hs384.sign(&key, b"message");
        assert!(Hs384.verify_signature(&signature, &key, b"message"));
        assert!(!Hs384.verify_signature(&signature, &key, b"other message"));
        assert!(!Hs384.verify_signature(&signature, &Hs384Key::new(b"wrong"), b"message"));

        let raw_signature = signature.as_bytes();
        assert!(Hs384.verify_raw_signature(&raw_signature, &key, b"message"));
        assert!(!Hs384.verify_raw_signature(&raw_signature[1..], &key, b"message"));
    }

    #[test]
    fn jwk_conversions() {
        let key = Hs256Key::new(b"test");
        let jwk = JsonWebKey::from(&key);
        assert_eq!(
            serde_json::to_value(&jwk).unwrap(),
            serde_json::json!({ "kty": "oct", "k": "dGVzdA" })
        );
        let restored = Hs256Key::try_from(&jwk).unwrap();
        assert_eq!(restored.as_ref(), b"test");

        let okp = JsonWebKey::KeyPair {
            curve: Cow::Borrowed("Ed25519"),
            x: Cow::Borrowed(b"test"),
        };
        let err = Hs256Key::try_from(&okp).unwrap_err();
        assert!(matches!(
            err,
            JwkError::UnexpectedKeyType {
                expected: KeyType::Symmetric,
                actual: KeyType::KeyPair,
            }
        ));
    }
}
