//! Decoder-level defaults merged with per-call overrides.

use chrono::Duration;

use core::fmt;
use std::sync::Arc;

use crate::{
    decode, AlgorithmMatching, AllowedAlgorithm, ClaimsValidator, DecodeError, DecodeOptions,
    DecodedToken, JwksResolver, KeyResolver, Keys, PayloadDecoder, SignatureEngine, X5cSource,
};

/// Reusable decoder holding defaults for multiple [`decode`](crate::decode()) calls.
///
/// With the `clock` feature, a decoder validates the `exp` and `nbf` claims with
/// [`TimeClaims`](crate::TimeClaims) and the configured leeway unless another validator
/// is set via [`Self::with_claims_validator()`].
///
/// # Examples
///
/// ```
/// use jwt_decoder::{
///     alg::{Hs256, Hs256Key}, AlgorithmExt, DecodeOverrides, Decoder, DecodingKey,
/// };
/// use serde_json::{json, Map};
///
/// # fn main() -> anyhow::Result<()> {
/// let token = Hs256.token(&Map::new(), &json!({ "sub": "1" }), &Hs256Key::new(b"s3cr3t"))?;
/// let decoder = Decoder::default()
///     .with_algorithm("HS256")
///     .with_verification_key(DecodingKey::from_secret(b"s3cr3t"));
/// let decoded = decoder.decode(&token, &DecodeOverrides::default())?;
/// assert_eq!(decoded.payload()["sub"], "1");
///
/// // Per-call options take precedence.
/// let overrides = DecodeOverrides::default()
///     .with_key(DecodingKey::from_secret(b"wrong-secret"));
/// assert!(decoder.decode(&token, &overrides).is_err());
/// # Ok(())
/// # }
/// ```
#[derive(Clone)]
pub struct Decoder {
    verification_key: Option<Keys>,
    signing_key: Option<Keys>,
    algorithm: Option<AllowedAlgorithm>,
    algorithms: Vec<AllowedAlgorithm>,
    payload_decoder: Option<PayloadDecoder>,
    leeway: Option<Duration>,
    jwks: Option<Arc<dyn JwksResolver>>,
    matching: Option<AlgorithmMatching>,
    engine: Option<Arc<dyn SignatureEngine>>,
    claims_validator: Option<Arc<dyn ClaimsValidator>>,
}

impl Default for Decoder {
    fn default() -> Self {
        Self {
            verification_key: None,
            signing_key: None,
            algorithm: None,
            algorithms: Vec::new(),
            payload_decoder: None,
            leeway: None,
            jwks: None,
            matching: None,
            engine: None,
            claims_validator: default_claims_validator(),
        }
    }
}

#[cfg(feature = "clock")]
fn default_claims_validator() -> Option<Arc<dyn ClaimsValidator>> {
    Some(Arc::new(crate::TimeClaims::new()))
}

#[cfg(not(feature = "clock"))]
fn default_claims_validator() -> Option<Arc<dyn ClaimsValidator>> {
    None
}

impl fmt::Debug for Decoder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("Decoder")
            .field("verification_key", &self.verification_key)
            .field("signing_key", &self.signing_key)
            .field("algorithm", &self.algorithm)
            .field("algorithms", &self.algorithms)
            .field("payload_decoder", &self.payload_decoder)
            .field("leeway", &self.leeway)
            .field("jwks", &self.jwks)
            .field("matching", &self.matching)
            .field("claims_validator", &self.claims_validator.is_some())
            .finish_non_exhaustive()
    }
}

impl Decoder {
    /// Sets the verification key(s).
    #[must_use]
    pub fn with_verification_key(mut self, key: impl Into<Keys>) -> Self {
        self.verification_key = Some(key.into());
        self
    }

    /// Sets the signing key. It is used for verification only if no verification key is set;
    /// this is useful for symmetric algorithms, for which both keys coincide.
    #[must_use]
    pub fn with_signing_key(mut self, key: impl Into<Keys>) -> Self {
        self.signing_key = Some(key.into());
        self
    }

    /// Sets the single allowed algorithm. It is combined with [`Self::with_algorithms()`].
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: impl Into<AllowedAlgorithm>) -> Self {
        self.algorithm = Some(algorithm.into());
        self
    }

    /// Sets the allowed algorithms.
    #[must_use]
    pub fn with_algorithms<I>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<AllowedAlgorithm>,
    {
        self.algorithms = algorithms.into_iter().map(Into::into).collect();
        self
    }

    /// Sets the custom payload decoder.
    #[must_use]
    pub fn with_payload_decoder(mut self, decoder: PayloadDecoder) -> Self {
        self.payload_decoder = Some(decoder);
        self
    }

    /// Sets the expiration leeway.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = Some(leeway);
        self
    }

    /// Sets the JWKS resolver.
    #[must_use]
    pub fn with_jwks(mut self, jwks: Arc<dyn JwksResolver>) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Sets the comparison mode for algorithm identifiers.
    #[must_use]
    pub fn with_algorithm_matching(mut self, matching: AlgorithmMatching) -> Self {
        self.matching = Some(matching);
        self
    }

    /// Sets the signature engine used for named algorithms.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn SignatureEngine>) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Replaces the claims validator.
    #[must_use]
    pub fn with_claims_validator(mut self, validator: Arc<dyn ClaimsValidator>) -> Self {
        self.claims_validator = Some(validator);
        self
    }

    /// Disables claims validation.
    #[must_use]
    pub fn without_claims_validation(mut self) -> Self {
        self.claims_validator = None;
        self
    }

    /// Computes effective options for a single call.
    pub fn decode_options(&self, overrides: &DecodeOverrides) -> DecodeOptions {
        let mut options = DecodeOptions::default();

        let key = overrides
            .key
            .as_ref()
            .or(self.verification_key.as_ref())
            .or(self.signing_key.as_ref());
        if let Some(key) = key {
            options = options.with_key(key.clone());
        }

        // `with_algorithm` skips duplicates while retaining the first occurrence.
        for algorithm in self.algorithm.iter().chain(&self.algorithms) {
            options = options.with_algorithm(algorithm.clone());
        }
        if let Some(decoder) = &self.payload_decoder {
            options = options.with_payload_decoder(decoder.clone());
        }
        if let Some(leeway) = self.leeway {
            options = options.with_leeway(leeway);
        }
        if let Some(jwks) = &self.jwks {
            options = options.with_jwks(Arc::clone(jwks));
        }
        if let Some(matching) = self.matching {
            options = options.with_algorithm_matching(matching);
        }
        if let Some(engine) = &self.engine {
            options = options.with_engine(Arc::clone(engine));
        }
        if let Some(validator) = &self.claims_validator {
            options = options.with_claims_validator(Arc::clone(validator));
        }

        overrides.apply(options)
    }

    /// Decodes `token` using the options merged from this decoder and `overrides`.
    ///
    /// # Errors
    ///
    /// Returns an error if decoding fails.
    pub fn decode(
        &self,
        token: &str,
        overrides: &DecodeOverrides,
    ) -> Result<DecodedToken, DecodeError> {
        decode(token, &self.decode_options(overrides))
    }
}

/// Per-call options overriding [`Decoder`] defaults. Each supplied entry replaces
/// the corresponding decoder-level entry as a whole.
#[derive(Clone, Default)]
pub struct DecodeOverrides {
    verify: Option<bool>,
    key: Option<Keys>,
    algorithms: Option<Vec<AllowedAlgorithm>>,
    payload_decoder: Option<PayloadDecoder>,
    leeway: Option<Duration>,
    jwks: Option<Arc<dyn JwksResolver>>,
    key_resolver: Option<KeyResolver>,
    x5c: Option<X5cSource>,
    matching: Option<AlgorithmMatching>,
    claims_validator: Option<Arc<dyn ClaimsValidator>>,
}

impl fmt::Debug for DecodeOverrides {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DecodeOverrides")
            .field("verify", &self.verify)
            .field("key", &self.key)
            .field("algorithms", &self.algorithms)
            .field("payload_decoder", &self.payload_decoder)
            .field("leeway", &self.leeway)
            .field("jwks", &self.jwks)
            .field("key_resolver", &self.key_resolver)
            .field("x5c", &self.x5c)
            .field("matching", &self.matching)
            .field("claims_validator", &self.claims_validator.is_some())
            .finish()
    }
}

impl DecodeOverrides {
    /// Enables or disables verification.
    #[must_use]
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = Some(verify);
        self
    }

    /// Overrides the verification key(s).
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Keys>) -> Self {
        self.key = Some(key.into());
        self
    }

    /// Overrides the algorithm allow-list.
    #[must_use]
    pub fn with_algorithms<I>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<AllowedAlgorithm>,
    {
        self.algorithms = Some(algorithms.into_iter().map(Into::into).collect());
        self
    }

    /// Overrides the payload decoder.
    #[must_use]
    pub fn with_payload_decoder(mut self, decoder: PayloadDecoder) -> Self {
        self.payload_decoder = Some(decoder);
        self
    }

    /// Overrides the leeway.
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = Some(leeway);
        self
    }

    /// Overrides the JWKS resolver.
    #[must_use]
    pub fn with_jwks(mut self, jwks: Arc<dyn JwksResolver>) -> Self {
        self.jwks = Some(jwks);
        self
    }

    /// Sets the custom key resolver.
    #[must_use]
    pub fn with_key_resolver(mut self, resolver: KeyResolver) -> Self {
        self.key_resolver = Some(resolver);
        self
    }

    /// Sets the certificate chain source.
    #[must_use]
    pub fn with_x5c(mut self, x5c: X5cSource) -> Self {
        self.x5c = Some(x5c);
        self
    }

    /// Overrides the comparison mode for algorithm identifiers.
    #[must_use]
    pub fn with_algorithm_matching(mut self, matching: AlgorithmMatching) -> Self {
        self.matching = Some(matching);
        self
    }

    /// Overrides the claims validator.
    #[must_use]
    pub fn with_claims_validator(mut self, validator: Arc<dyn ClaimsValidator>) -> Self {
        self.claims_validator = Some(validator);
        self
    }

    fn apply(&self, mut options: DecodeOptions) -> DecodeOptions {
        if let Some(verify) = self.verify {
            options = options.with_verification(verify);
        }
        if let Some(key) = &self.key {
            options = options.with_key(key.clone());
        }
        if let Some(algorithms) = &self.algorithms {
            options = options.with_algorithms(algorithms.iter().cloned());
        }
        if let Some(decoder) = &self.payload_decoder {
            options = options.with_payload_decoder(decoder.clone());
        }
        if let Some(leeway) = self.leeway {
            options = options.with_leeway(leeway);
        }
        if let Some(jwks) = &self.jwks {
            options = options.with_jwks(Arc::clone(jwks));
        }
        if let Some(resolver) = &self.key_resolver {
            options = options.with_key_resolver(resolver.clone());
        }
        if let Some(x5c) = &self.x5c {
            options = options.with_x5c(x5c.clone());
        }
        if let Some(matching) = self.matching {
            options = options.with_algorithm_matching(matching);
        }
        if let Some(validator) = &self.claims_validator {
            options = options.with_claims_validator(Arc::clone(validator));
        }
        options
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{jwk::JsonWebKeySet, DecodingKey};

    fn names(options: &DecodeOptions) -> Vec<&str> {
        options
            .algorithms()
            .iter()
            .filter_map(AllowedAlgorithm::name)
            .collect()
    }

    fn key(options: &DecodeOptions) -> Option<&DecodingKey> {
        options.key_sources.key.as_ref()?.iter().next()
    }

    #[test]
    fn key_precedence() {
        let signing = DecodingKey::from_secret(b"signing");
        let verification = DecodingKey::from_secret(b"verification");
        let per_call = DecodingKey::from_secret(b"per-call");

        let decoder = Decoder::default().with_signing_key(signing.clone());
        let options = decoder.decode_options(&DecodeOverrides::default());
        assert_eq!(key(&options), Some(&signing));

        let decoder = decoder.with_verification_key(verification.clone());
        let options = decoder.decode_options(&DecodeOverrides::default());
        assert_eq!(key(&options), Some(&verification));

        let overrides = DecodeOverrides::default().with_key(per_call.clone());
        let options = decoder.decode_options(&overrides);
        assert_eq!(key(&options), Some(&per_call));

        let options = Decoder::default().decode_options(&DecodeOverrides::default());
        assert!(options.key_sources.key.is_none());
    }

    #[test]
    fn algorithms_are_merged_without_duplicates() {
        let decoder = Decoder::default()
            .with_algorithm("HS512")
            .with_algorithms(["HS256", "HS512", "RS256", "HS256"]);
        let options = decoder.decode_options(&DecodeOverrides::default());
        assert_eq!(names(&options), ["HS512", "HS256", "RS256"]);

        let overrides = DecodeOverrides::default().with_algorithms(["ES256"]);
        let options = decoder.decode_options(&overrides);
        assert_eq!(names(&options), ["ES256"]);
    }

    #[test]
    fn overrides_replace_entries() {
        let decoder = Decoder::default()
            .with_leeway(Duration::seconds(10))
            .with_jwks(Arc::new(JsonWebKeySet::default()));
        let options = decoder.decode_options(&DecodeOverrides::default());
        assert!(options.verifies());
        assert_eq!(options.leeway(), Duration::seconds(10));
        assert!(options.key_sources.jwks.is_some());

        let overrides = DecodeOverrides::default()
            .with_verification(false)
            .with_leeway(Duration::seconds(30))
            .with_key_resolver(KeyResolver::from_header(|_| Ok(Keys::new())));
        let options = decoder.decode_options(&overrides);
        assert!(!options.verifies());
        assert_eq!(options.leeway(), Duration::seconds(30));
        assert!(options.key_sources.resolver.is_some());
        assert!(options.key_sources.jwks.is_some());
    }

    #[test]
    fn claims_validation_and_matching_are_forwarded() {
        let decoder = Decoder::default();
        let options = decoder.decode_options(&DecodeOverrides::default());
        assert_eq!(options.algorithm_matching(), AlgorithmMatching::Exact);
        #[cfg(feature = "clock")]
        assert!(options.claims_validator().is_some());

        let decoder = decoder
            .without_claims_validation()
            .with_algorithm_matching(AlgorithmMatching::CaseInsensitive);
        let options = decoder.decode_options(&DecodeOverrides::default());
        assert!(options.claims_validator().is_none());
        assert_eq!(
            options.algorithm_matching(),
            AlgorithmMatching::CaseInsensitive
        );

        let validator = crate::TimeClaims::with_clock(|| {
            chrono::TimeZone::timestamp_opt(&chrono::Utc, 0, 0).unwrap()
        });
        let overrides = DecodeOverrides::default()
            .with_algorithm_matching(AlgorithmMatching::Exact)
            .with_claims_validator(Arc::new(validator.require_expiration()));
        let options = decoder.decode_options(&overrides);
        assert!(options.claims_validator().is_some());
        assert_eq!(options.algorithm_matching(), AlgorithmMatching::Exact);
    }
}
