//! Verification keys and key resolution strategies.

use base64ct::{Base64, Encoding};
use serde_json::Value;

use core::{fmt, slice};
use std::{borrow::Cow, sync::Arc};

use crate::{alg::SecretBytes, error::KeyLookupError, jwk::JsonWebKey, DecodeError, Header};

/// Opaque key used to verify token signatures.
///
/// Internally, a key is represented as a public [`JsonWebKey`]; symmetric secrets
/// are represented as `oct` keys. The signature engine converts
/// the key into the presentation specific for a certain algorithm.
#[derive(Debug, Clone, PartialEq)]
pub struct DecodingKey {
    jwk: JsonWebKey<'static>,
}

impl DecodingKey {
    /// Creates a key from a shared secret (e.g., for `HS*` algorithms).
    pub fn from_secret(secret: impl AsRef<[u8]>) -> Self {
        Self {
            jwk: JsonWebKey::Symmetric {
                secret: SecretBytes::owned(secret.as_ref().to_vec()),
            },
        }
    }

    /// Creates a key from a JWK.
    pub fn from_jwk(jwk: &JsonWebKey<'_>) -> Self {
        Self {
            jwk: jwk.clone().into_owned(),
        }
    }

    /// Creates a key from a backend-specific key presentation, such as
    /// [`Hs256Key`](crate::alg::Hs256Key).
    pub fn from_key<'a, K>(key: &'a K) -> Self
    where
        JsonWebKey<'a>: From<&'a K>,
    {
        Self::from_jwk(&JsonWebKey::from(key))
    }

    /// Returns the JWK presentation of this key.
    pub fn jwk(&self) -> &JsonWebKey<'static> {
        &self.jwk
    }
}

impl From<JsonWebKey<'_>> for DecodingKey {
    fn from(jwk: JsonWebKey<'_>) -> Self {
        Self {
            jwk: jwk.into_owned(),
        }
    }
}

/// Ordered list of candidate keys. A token is accepted if any of the keys verifies it,
/// which allows rotating keys without downtime.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Keys(Vec<DecodingKey>);

impl Keys {
    /// Creates an empty list.
    pub fn new() -> Self {
        Self::default()
    }

    /// Checks whether the list is empty.
    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Returns the number of keys.
    pub fn len(&self) -> usize {
        self.0.len()
    }

    /// Iterates over the keys.
    pub fn iter(&self) -> slice::Iter<'_, DecodingKey> {
        self.0.iter()
    }
}

impl From<DecodingKey> for Keys {
    fn from(key: DecodingKey) -> Self {
        Self(vec![key])
    }
}

impl From<Vec<DecodingKey>> for Keys {
    fn from(keys: Vec<DecodingKey>) -> Self {
        Self(keys)
    }
}

impl From<Option<DecodingKey>> for Keys {
    fn from(key: Option<DecodingKey>) -> Self {
        Self(key.into_iter().collect())
    }
}

impl FromIterator<DecodingKey> for Keys {
    fn from_iter<I: IntoIterator<Item = DecodingKey>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}

impl<'a> IntoIterator for &'a Keys {
    type Item = &'a DecodingKey;
    type IntoIter = slice::Iter<'a, DecodingKey>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}

type HeaderFn = dyn Fn(&Header) -> anyhow::Result<Keys> + Send + Sync;
type HeaderAndPayloadFn = dyn Fn(&Header, &Value) -> anyhow::Result<Keys> + Send + Sync;

/// Custom key resolver callback.
///
/// The variant records which context the callback consumes; it is chosen
/// when the resolver is registered.
#[derive(Clone)]
#[non_exhaustive]
pub enum KeyResolver {
    /// Callback receiving the token header.
    Header(Arc<HeaderFn>),
    /// Callback receiving the token header and payload.
    HeaderAndPayload(Arc<HeaderAndPayloadFn>),
}

impl fmt::Debug for KeyResolver {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Header(_) => "Header",
            Self::HeaderAndPayload(_) => "HeaderAndPayload",
        };
        formatter.debug_tuple(name).field(&"_").finish()
    }
}

impl KeyResolver {
    /// Creates a resolver consuming only the token header.
    pub fn from_header<F>(resolver: F) -> Self
    where
        F: Fn(&Header) -> anyhow::Result<Keys> + Send + Sync + 'static,
    {
        Self::Header(Arc::new(resolver))
    }

    /// Creates a resolver consuming the token header and payload.
    pub fn from_header_and_payload<F>(resolver: F) -> Self
    where
        F: Fn(&Header, &Value) -> anyhow::Result<Keys> + Send + Sync + 'static,
    {
        Self::HeaderAndPayload(Arc::new(resolver))
    }

    fn resolve(&self, header: &Header, payload: &Value) -> anyhow::Result<Keys> {
        match self {
            Self::Header(resolver) => resolver(header),
            Self::HeaderAndPayload(resolver) => resolver(header, payload),
        }
    }
}

/// Source of keys indexed by key ID (`kid`), such as a JSON Web Key Set.
///
/// Implementations may perform I/O (e.g., refresh a remote key set); retrying is
/// the responsibility of the implementation.
pub trait JwksResolver: Send + Sync {
    /// Looks up keys for the `kid` declared in the token header.
    fn lookup(&self, key_id: Option<&str>) -> anyhow::Result<Keys>;
}

impl<F> JwksResolver for F
where
    F: Fn(Option<&str>) -> anyhow::Result<Keys> + Send + Sync,
{
    fn lookup(&self, key_id: Option<&str>) -> anyhow::Result<Keys> {
        self(key_id)
    }
}

/// Resolver of verifying keys from an X.509 certificate chain embedded into the token
/// header (the `x5c` field).
///
/// The implementation is responsible for validating the chain against the trusted roots
/// and revocation lists, and for extracting the key of the leaf certificate.
pub trait CertificateChainResolver: Send + Sync {
    /// Resolves the key from the DER-encoded `chain`, leaf certificate first.
    fn lookup(
        &self,
        root_certificates: &[Vec<u8>],
        crls: &[Vec<u8>],
        chain: &[Vec<u8>],
    ) -> anyhow::Result<Keys>;
}

/// Configuration of `x5c`-based key resolution.
#[derive(Clone)]
pub struct X5cSource {
    root_certificates: Vec<Vec<u8>>,
    crls: Vec<Vec<u8>>,
    resolver: Arc<dyn CertificateChainResolver>,
}

impl fmt::Debug for X5cSource {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("X5cSource")
            .field("root_certificates", &self.root_certificates.len())
            .field("crls", &self.crls.len())
            .finish_non_exhaustive()
    }
}

impl X5cSource {
    /// Creates a source with the specified DER-encoded trusted roots.
    pub fn new(
        root_certificates: Vec<Vec<u8>>,
        resolver: Arc<dyn CertificateChainResolver>,
    ) -> Self {
        Self {
            root_certificates,
            crls: Vec::new(),
            resolver,
        }
    }

    /// Sets DER-encoded certificate revocation lists.
    #[must_use]
    pub fn with_crls(mut self, crls: Vec<Vec<u8>>) -> Self {
        self.crls = crls;
        self
    }

    fn resolve(&self, header: &Header) -> anyhow::Result<Keys> {
        let chain = certificate_chain(header)?;
        self.resolver
            .lookup(&self.root_certificates, &self.crls, &chain)
    }
}

/// Decodes the `x5c` header field. As per RFC 7515, certificates in the chain are encoded
/// with standard (not URL-safe) base64.
fn certificate_chain(header: &Header) -> Result<Vec<Vec<u8>>, KeyLookupError> {
    let chain = header
        .certificate_chain()
        .ok_or(KeyLookupError::MissingCertificateChain)?;
    let Value::Array(chain) = chain else {
        return Err(KeyLookupError::MalformedCertificateChain);
    };
    chain
        .iter()
        .map(|cert| {
            let cert = cert
                .as_str()
                .ok_or(KeyLookupError::MalformedCertificateChain)?;
            Base64::decode_vec(cert).map_err(|_| KeyLookupError::MalformedCertificateChain)
        })
        .collect()
}

/// All configured ways of obtaining verification keys.
#[derive(Debug, Clone, Default)]
pub(crate) struct KeySources {
    pub key: Option<Keys>,
    pub resolver: Option<KeyResolver>,
    pub jwks: Option<Arc<dyn JwksResolver>>,
    pub x5c: Option<X5cSource>,
}

impl fmt::Debug for dyn JwksResolver {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str("JwksResolver")
    }
}

impl KeySources {
    /// Resolves candidate keys using the first configured strategy, in the following order:
    /// JWKS, certificate chain, custom resolver, static key.
    pub fn resolve(&self, header: &Header, payload: &Value) -> Result<Cow<'_, Keys>, DecodeError> {
        let keys = if let Some(jwks) = &self.jwks {
            Cow::Owned(
                jwks.lookup(header.key_id())
                    .map_err(DecodeError::KeyResolution)?,
            )
        } else if let Some(x5c) = &self.x5c {
            Cow::Owned(x5c.resolve(header).map_err(DecodeError::KeyResolution)?)
        } else if let Some(resolver) = &self.resolver {
            Cow::Owned(
                resolver
                    .resolve(header, payload)
                    .map_err(DecodeError::KeyResolution)?,
            )
        } else if let Some(key) = &self.key {
            Cow::Borrowed(key)
        } else {
            Cow::Owned(Keys::new())
        };

        if keys.is_empty() {
            Err(DecodeError::NoVerificationKey)
        } else {
            Ok(keys)
        }
    }
}
