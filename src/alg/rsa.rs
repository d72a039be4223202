//! `RS*` and `PS*` backends on top of the `rsa` crate.

pub use rsa::{RsaPrivateKey, RsaPublicKey};

use rand_core::{CryptoRng, OsRng, RngCore};
use rsa::{traits::PublicKeyParts, BigUint, Pkcs1v15Sign, Pss};
use sha2::{Digest, Sha256, Sha384, Sha512};

use core::fmt;
use std::borrow::Cow;

use crate::{
    jwk::{JsonWebKey, JwkError, KeyType},
    Algorithm, AlgorithmSignature,
};

/// RSA signature. Its length equals the byte length of the key modulus.
#[derive(Debug)]
pub struct RsaSignature(Vec<u8>);

impl AlgorithmSignature for RsaSignature {
    fn try_from_slice(bytes: &[u8]) -> anyhow::Result<Self> {
        let bits = bytes.len() * 8;
        ModulusBits::try_from(bits)?;
        Ok(Self(bytes.to_vec()))
    }

    fn as_bytes(&self) -> Cow<'_, [u8]> {
        Cow::Borrowed(&self.0)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum HashAlg {
    Sha256,
    Sha384,
    Sha512,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Padding {
    Pkcs1v15,
    Pss,
}

/// Bit length of an RSA key modulus (aka RSA key length).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[non_exhaustive]
pub enum ModulusBits {
    /// 2048 bits. This is the minimum recommended key length as of 2020.
    TwoKilobytes,
    /// 3072 bits.
    ThreeKilobytes,
    /// 4096 bits.
    FourKilobytes,
}

impl ModulusBits {
    /// Converts this length to the numeric value.
    pub fn bits(self) -> usize {
        match self {
            Self::TwoKilobytes => 2_048,
            Self::ThreeKilobytes => 3_072,
            Self::FourKilobytes => 4_096,
        }
    }
}

impl TryFrom<usize> for ModulusBits {
    type Error = ModulusBitsError;

    fn try_from(value: usize) -> Result<Self, Self::Error> {
        [Self::TwoKilobytes, Self::ThreeKilobytes, Self::FourKilobytes]
            .into_iter()
            .find(|bits| bits.bits() == value)
            .ok_or(ModulusBitsError(value))
    }
}

/// Error returned when an integer does not correspond to a supported [`ModulusBits`] value.
#[derive(Debug)]
pub struct ModulusBitsError(usize);

impl fmt::Display for ModulusBitsError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            formatter,
            "Unsupported bit length of RSA modulus: {}; only lengths 2048, 3072 and 4096 \
             are supported",
            self.0
        )
    }
}

impl std::error::Error for ModulusBitsError {}

/// Signatures using [RSA] with one of the SHA-2 hash functions, as described in [RFC 7518].
///
/// `RS*` algorithms use PKCS#1 v1.5 padding, and `PS*` ones use PSS padding with the salt
/// length equal to the hash output size. The numeric suffix (`256`, `384` or `512`)
/// denotes the hash function. Only keys with the lengths listed in [`ModulusBits`]
/// produce acceptable signatures.
///
/// [RSA]: https://en.wikipedia.org/wiki/RSA_(cryptosystem)
/// [RFC 7518]: https://www.rfc-editor.org/rfc/rfc7518.html#section-3.3
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Rsa {
    hash_alg: HashAlg,
    padding: Padding,
}

impl Rsa {
    /// All supported variations together with their JWS names.
    const VARIANTS: [(&'static str, Self); 6] = [
        ("RS256", Self::rs256()),
        ("RS384", Self::rs384()),
        ("RS512", Self::rs512()),
        ("PS256", Self::ps256()),
        ("PS384", Self::ps384()),
        ("PS512", Self::ps512()),
    ];

    const fn new(hash_alg: HashAlg, padding: Padding) -> Self {
        Self { hash_alg, padding }
    }

    /// RSA with SHA-256 and PKCS#1 v1.5 padding.
    pub const fn rs256() -> Self {
        Self::new(HashAlg::Sha256, Padding::Pkcs1v15)
    }

    /// RSA with SHA-384 and PKCS#1 v1.5 padding.
    pub const fn rs384() -> Self {
        Self::new(HashAlg::Sha384, Padding::Pkcs1v15)
    }

    /// RSA with SHA-512 and PKCS#1 v1.5 padding.
    pub const fn rs512() -> Self {
        Self::new(HashAlg::Sha512, Padding::Pkcs1v15)
    }

    /// RSA with SHA-256 and PSS padding.
    pub const fn ps256() -> Self {
        Self::new(HashAlg::Sha256, Padding::Pss)
    }

    /// RSA with SHA-384 and PSS padding.
    pub const fn ps384() -> Self {
        Self::new(HashAlg::Sha384, Padding::Pss)
    }

    /// RSA with SHA-512 and PSS padding.
    pub const fn ps512() -> Self {
        Self::new(HashAlg::Sha512, Padding::Pss)
    }

    /// Returns the variation with the specified JWS name, or `None` if the name
    /// is not one of `RS256`, `RS384`, `RS512`, `PS256`, `PS384`, `PS512`.
    pub fn with_name(name: &str) -> Option<Self> {
        Self::VARIANTS
            .iter()
            .find_map(|&(variant_name, rsa)| (variant_name == name).then_some(rsa))
    }

    fn jws_name(self) -> &'static str {
        Self::VARIANTS
            .iter()
            .find_map(|&(name, rsa)| (rsa == self).then_some(name))
            .unwrap_or_default()
    }

    fn digest(self, message: &[u8]) -> Vec<u8> {
        match self.hash_alg {
            HashAlg::Sha256 => Sha256::digest(message).to_vec(),
            HashAlg::Sha384 => Sha384::digest(message).to_vec(),
            HashAlg::Sha512 => Sha512::digest(message).to_vec(),
        }
    }

    fn pkcs1v15_scheme(self) -> Pkcs1v15Sign {
        match self.hash_alg {
            HashAlg::Sha256 => Pkcs1v15Sign::new::<Sha256>(),
            HashAlg::Sha384 => Pkcs1v15Sign::new::<Sha384>(),
            HashAlg::Sha512 => Pkcs1v15Sign::new::<Sha512>(),
        }
    }

    fn pss_scheme(self) -> Pss {
        match self.hash_alg {
            HashAlg::Sha256 => Pss::new::<Sha256>(),
            HashAlg::Sha384 => Pss::new::<Sha384>(),
            HashAlg::Sha512 => Pss::new::<Sha512>(),
        }
    }

    /// Generates a new key pair with the specified modulus bit length (aka key length).
    pub fn generate<R: CryptoRng + RngCore>(
        rng: &mut R,
        modulus_bits: ModulusBits,
    ) -> rsa::errors::Result<(RsaPrivateKey, RsaPublicKey)> {
        let signing_key = RsaPrivateKey::new(rng, modulus_bits.bits())?;
        let verifying_key = signing_key.to_public_key();
        Ok((signing_key, verifying_key))
    }
}

impl Algorithm for Rsa {
    type SigningKey = RsaPrivateKey;
    type VerifyingKey = RsaPublicKey;
    type Signature = RsaSignature;

    fn name(&self) -> Cow<'static, str> {
        Cow::Borrowed(self.jws_name())
    }

    fn sign(&self, signing_key: &Self::SigningKey, message: &[u8]) -> Self::Signature {
        let digest = self.digest(message);
        let signature = match self.padding {
            Padding::Pkcs1v15 => {
                signing_key.sign_with_rng(&mut OsRng, self.pkcs1v15_scheme(), &digest)
            }
            Padding::Pss => signing_key.sign_with_rng(&mut OsRng, self.pss_scheme(), &digest),
        };
        RsaSignature(signature.expect("Unexpected RSA signature failure"))
    }

    fn verify_signature(
        &self,
        signature: &Self::Signature,
        verifying_key: &Self::VerifyingKey,
        message: &[u8],
    ) -> bool {
        if ModulusBits::try_from(verifying_key.size() * 8).is_err() {
            return false;
        }
        let digest = self.digest(message);
        let result = match self.padding {
            Padding::Pkcs1v15 => {
                verifying_key.verify(self.pkcs1v15_scheme(), &digest, &signature.0)
            }
            Padding::Pss => verifying_key.verify(self.pss_scheme(), &digest, &signature.0),
        };
        result.is_ok()
    }
}

impl<'a> From<&'a RsaPublicKey> for JsonWebKey<'a> {
    fn from(key: &'a RsaPublicKey) -> JsonWebKey<'a> {
        JsonWebKey::Rsa {
            modulus: Cow::Owned(key.n().to_bytes_be()),
            public_exponent: Cow::Owned(key.e().to_bytes_be()),
        }
    }
}

/// Only the public half of the key is exposed.
impl<'a> From<&'a RsaPrivateKey> for JsonWebKey<'a> {
    fn from(key: &'a RsaPrivateKey) -> JsonWebKey<'a> {
        JsonWebKey::from(key.as_ref())
    }
}

impl TryFrom<&JsonWebKey<'_>> for RsaPublicKey {
    type Error = JwkError;

    fn try_from(jwk: &JsonWebKey<'_>) -> Result<Self, Self::Error> {
        let JsonWebKey::Rsa {
            modulus,
            public_exponent,
        } = jwk
        else {
            return Err(JwkError::key_type(jwk, KeyType::Rsa));
        };

        let n = BigUint::from_bytes_be(modulus);
        let e = BigUint::from_bytes_be(public_exponent);
        Self::new(n, e).map_err(|err| JwkError::custom(anyhow::anyhow!(err)))
    }
}
