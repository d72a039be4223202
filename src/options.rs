//! Options of the decoding pipeline.

use chrono::Duration;
use serde_json::{Map, Value};

use core::fmt;
use std::sync::Arc;

use crate::{
    claims::ClaimsValidator,
    engine::{SignatureEngine, StandardAlgorithms},
    error::OptionsError,
    jwk::{JsonWebKey, JsonWebKeySet},
    keys::KeySources,
    AlgorithmMatching, AllowedAlgorithm, DecodingKey, Header, JwksResolver, KeyResolver, Keys,
    X5cSource,
};

type PayloadDecoderFn = dyn Fn(&str, &Header, &[u8]) -> anyhow::Result<String> + Send + Sync;

/// Custom transform of the raw payload segment.
///
/// The decoder receives the raw (base64url-encoded) payload segment, the decoded header
/// and the decoded signature bytes. It must return a base64url-encoded JSON string,
/// which is then parsed in the same way as a standard payload segment. This allows,
/// for example, decrypting or unwrapping the payload before it is parsed.
#[derive(Clone)]
pub struct PayloadDecoder(Arc<PayloadDecoderFn>);

impl fmt::Debug for PayloadDecoder {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.debug_tuple("PayloadDecoder").field(&"_").finish()
    }
}

impl PayloadDecoder {
    /// Creates a decoder from the provided function.
    pub fn new<F>(decoder: F) -> Self
    where
        F: Fn(&str, &Header, &[u8]) -> anyhow::Result<String> + Send + Sync + 'static,
    {
        Self(Arc::new(decoder))
    }

    pub(crate) fn decode(
        &self,
        raw_segment: &str,
        header: &Header,
        signature: &[u8],
    ) -> anyhow::Result<String> {
        (self.0)(raw_segment, header, signature)
    }
}

/// Effective options of a single [`decode`](crate::decode()) call.
///
/// Options are immutable once built and can be shared among threads; all collaborators
/// are required to be `Send + Sync`.
///
/// # Examples
///
/// ```
/// use jwt_decoder::{AlgorithmMatching, DecodeOptions, DecodingKey};
///
/// let options = DecodeOptions::default()
///     .with_algorithms(["HS256", "HS512"])
///     .with_key(DecodingKey::from_secret(b"s3cr3t"))
///     .with_algorithm_matching(AlgorithmMatching::Exact);
/// assert!(options.verifies());
/// assert_eq!(options.algorithms().len(), 2);
/// ```
#[derive(Clone)]
pub struct DecodeOptions {
    verify: bool,
    algorithms: Vec<AllowedAlgorithm>,
    pub(crate) key_sources: KeySources,
    payload_decoder: Option<PayloadDecoder>,
    leeway: Duration,
    matching: AlgorithmMatching,
    engine: Arc<dyn SignatureEngine>,
    claims_validator: Option<Arc<dyn ClaimsValidator>>,
}

impl Default for DecodeOptions {
    fn default() -> Self {
        Self {
            verify: true,
            algorithms: Vec::new(),
            key_sources: KeySources::default(),
            payload_decoder: None,
            leeway: Duration::zero(),
            matching: AlgorithmMatching::default(),
            engine: Arc::new(StandardAlgorithms),
            claims_validator: None,
        }
    }
}

impl fmt::Debug for DecodeOptions {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter
            .debug_struct("DecodeOptions")
            .field("verify", &self.verify)
            .field("algorithms", &self.algorithms)
            .field("key_sources", &self.key_sources)
            .field("payload_decoder", &self.payload_decoder)
            .field("leeway", &self.leeway)
            .field("matching", &self.matching)
            .field("claims_validator", &self.claims_validator.is_some())
            .finish_non_exhaustive()
    }
}

impl DecodeOptions {
    /// Enables or disables verification. If verification is disabled, the token is only
    /// checked to be well-formed; its header and payload are returned as is.
    #[must_use]
    pub fn with_verification(mut self, verify: bool) -> Self {
        self.verify = verify;
        self
    }

    /// Replaces the algorithm allow-list.
    #[must_use]
    pub fn with_algorithms<I>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<AllowedAlgorithm>,
    {
        self.algorithms = algorithms.into_iter().map(Into::into).collect();
        self
    }

    /// Adds an algorithm to the allow-list, unless it is already present.
    #[must_use]
    pub fn with_algorithm(mut self, algorithm: impl Into<AllowedAlgorithm>) -> Self {
        let algorithm = algorithm.into();
        if !self.algorithms.contains(&algorithm) {
            self.algorithms.push(algorithm);
        }
        self
    }

    /// Sets static verification key(s). Several keys can be provided to support key rotation.
    #[must_use]
    pub fn with_key(mut self, key: impl Into<Keys>) -> Self {
        self.key_sources.key = Some(key.into());
        self
    }

    /// Sets the custom key resolver.
    #[must_use]
    pub fn with_key_resolver(mut self, resolver: KeyResolver) -> Self {
        self.key_sources.resolver = Some(resolver);
        self
    }

    /// Sets the source of keys indexed by key ID (e.g., a [`JsonWebKeySet`]).
    #[must_use]
    pub fn with_jwks(mut self, jwks: Arc<dyn JwksResolver>) -> Self {
        self.key_sources.jwks = Some(jwks);
        self
    }

    /// Configures resolution of keys from the `x5c` header field.
    #[must_use]
    pub fn with_x5c(mut self, x5c: X5cSource) -> Self {
        self.key_sources.x5c = Some(x5c);
        self
    }

    /// Sets the custom payload decoder.
    #[must_use]
    pub fn with_payload_decoder(mut self, decoder: PayloadDecoder) -> Self {
        self.payload_decoder = Some(decoder);
        self
    }

    /// Sets the leeway for time-related claims. The leeway is not used by the pipeline
    /// itself; it is provided to the [`ClaimsValidator`].
    #[must_use]
    pub fn with_leeway(mut self, leeway: Duration) -> Self {
        self.leeway = leeway;
        self
    }

    /// Sets the comparison mode for algorithm identifiers.
    #[must_use]
    pub fn with_algorithm_matching(mut self, matching: AlgorithmMatching) -> Self {
        self.matching = matching;
        self
    }

    /// Sets the signature engine used for named algorithms.
    #[must_use]
    pub fn with_engine(mut self, engine: Arc<dyn SignatureEngine>) -> Self {
        self.engine = engine;
        self
    }

    /// Sets the claims validator invoked after the signature is verified.
    #[must_use]
    pub fn with_claims_validator(mut self, validator: Arc<dyn ClaimsValidator>) -> Self {
        self.claims_validator = Some(validator);
        self
    }

    /// Checks whether verification is enabled.
    pub fn verifies(&self) -> bool {
        self.verify
    }

    /// Returns the algorithm allow-list.
    pub fn algorithms(&self) -> &[AllowedAlgorithm] {
        &self.algorithms
    }

    /// Returns the leeway for time-related claims.
    pub fn leeway(&self) -> Duration {
        self.leeway
    }

    /// Returns the comparison mode for algorithm identifiers.
    pub fn algorithm_matching(&self) -> AlgorithmMatching {
        self.matching
    }

    pub(crate) fn payload_decoder(&self) -> Option<&PayloadDecoder> {
        self.payload_decoder.as_ref()
    }

    pub(crate) fn engine(&self) -> &dyn SignatureEngine {
        self.engine.as_ref()
    }

    pub(crate) fn claims_validator(&self) -> Option<&dyn ClaimsValidator> {
        self.claims_validator.as_deref()
    }
}

/// Loosely typed options, e.g. read from a configuration file.
///
/// The allow-list may be spelled in several ways. They are reconciled once,
/// in [`Self::into_options()`], with the following precedence (the first present entry wins,
/// even if it is empty or `null`):
///
/// 1. `"algorithm"` entry
/// 2. typed algorithm set with [`Self::with_typed_algorithm()`]
/// 3. `"algorithms"` entry
/// 4. typed algorithms set with [`Self::with_typed_algorithms()`]
///
/// Textual entries may contain a string or an array of strings.
///
/// Other recognized entries are:
///
/// - `"verify"`: Boolean flag
/// - `"leeway"`: non-negative number of seconds
/// - `"key"`: shared secret (string) or a JWK (object)
/// - `"jwks"`: JSON Web Key Set (`{ "keys": [...] }`)
///
/// Unrecognized entries are ignored.
///
/// # Examples
///
/// ```
/// use jwt_decoder::{DecodeOptions, RawOptions};
/// use serde_json::json;
///
/// # fn main() -> anyhow::Result<()> {
/// let raw = RawOptions::from_json(json!({
///     "algorithms": ["HS256"],
///     "key": "s3cr3t",
///     "leeway": 30,
/// }))?;
/// let options = raw.into_options(DecodeOptions::default())?;
/// assert_eq!(options.algorithms()[0].name(), Some("HS256"));
/// assert_eq!(options.leeway().num_seconds(), 30);
/// # Ok(())
/// # }
/// ```
#[derive(Debug, Clone, Default)]
pub struct RawOptions {
    entries: Map<String, Value>,
    algorithm: Option<AllowedAlgorithm>,
    algorithms: Option<Vec<AllowedAlgorithm>>,
}

impl RawOptions {
    /// Creates options from string-keyed entries.
    pub fn new(entries: Map<String, Value>) -> Self {
        Self {
            entries,
            algorithm: None,
            algorithms: None,
        }
    }

    /// Creates options from a JSON value, which must be an object.
    pub fn from_json(value: Value) -> Result<Self, OptionsError> {
        match value {
            Value::Object(entries) => Ok(Self::new(entries)),
            _ => Err(OptionsError::NotAnObject),
        }
    }

    /// Sets the typed single algorithm.
    #[must_use]
    pub fn with_typed_algorithm(mut self, algorithm: impl Into<AllowedAlgorithm>) -> Self {
        self.algorithm = Some(algorithm.into());
        self
    }

    /// Sets the typed algorithm list.
    #[must_use]
    pub fn with_typed_algorithms<I>(mut self, algorithms: I) -> Self
    where
        I: IntoIterator,
        I::Item: Into<AllowedAlgorithm>,
    {
        self.algorithms = Some(algorithms.into_iter().map(Into::into).collect());
        self
    }

    /// Resolves the allow-list according to the precedence rules.
    /// Returns `None` if no form of the allow-list is present.
    fn allowed_algorithms(&mut self) -> Result<Option<Vec<AllowedAlgorithm>>, OptionsError> {
        if let Some(value) = self.entries.remove("algorithm") {
            return parse_algorithms("algorithm", value).map(Some);
        }
        if let Some(algorithm) = self.algorithm.take() {
            return Ok(Some(vec![algorithm]));
        }
        if let Some(value) = self.entries.remove("algorithms") {
            return parse_algorithms("algorithms", value).map(Some);
        }
        Ok(self.algorithms.take())
    }

    /// Converts these options into [`DecodeOptions`], overriding the corresponding entries
    /// in `base`.
    pub fn into_options(mut self, base: DecodeOptions) -> Result<DecodeOptions, OptionsError> {
        let mut options = base;
        if let Some(algorithms) = self.allowed_algorithms()? {
            options = options.with_algorithms(algorithms);
        }

        if let Some(value) = self.entries.get("verify") {
            let verify = value
                .as_bool()
                .ok_or_else(|| unexpected_value("verify", "Boolean"))?;
            options = options.with_verification(verify);
        }

        if let Some(value) = self.entries.get("leeway") {
            let leeway = value
                .as_u64()
                .and_then(|secs| i64::try_from(secs).ok())
                .and_then(Duration::try_seconds)
                .ok_or_else(|| unexpected_value("leeway", "non-negative number of seconds"))?;
            options = options.with_leeway(leeway);
        }

        if let Some(value) = self.entries.remove("key") {
            let key = match value {
                Value::String(secret) => DecodingKey::from_secret(secret),
                value @ Value::Object(_) => {
                    let jwk: JsonWebKey<'static> = serde_json::from_value(value)
                        .map_err(|_| unexpected_value("key", "secret string or JWK"))?;
                    DecodingKey::from(jwk)
                }
                _ => return Err(unexpected_value("key", "secret string or JWK")),
            };
            options = options.with_key(key);
        }

        if let Some(value) = self.entries.remove("jwks") {
            let key_set: JsonWebKeySet = serde_json::from_value(value)
                .map_err(|_| unexpected_value("jwks", "JSON Web Key Set"))?;
            options = options.with_jwks(Arc::new(key_set));
        }
        Ok(options)
    }
}

impl From<Map<String, Value>> for RawOptions {
    fn from(entries: Map<String, Value>) -> Self {
        Self::new(entries)
    }
}

fn unexpected_value(option: &str, expected: &'static str) -> OptionsError {
    OptionsError::UnexpectedValue {
        option: option.to_owned(),
        expected,
    }
}

fn parse_algorithms(option: &str, value: Value) -> Result<Vec<AllowedAlgorithm>, OptionsError> {
    const EXPECTED: &str = "algorithm name or an array of names";

    match value {
        Value::Null => Ok(Vec::new()),
        Value::String(name) => Ok(vec![AllowedAlgorithm::Name(name)]),
        Value::Array(names) => names
            .into_iter()
            .map(|name| match name {
                Value::String(name) => Ok(AllowedAlgorithm::Name(name)),
                _ => Err(unexpected_value(option, EXPECTED)),
            })
            .collect(),
        _ => Err(unexpected_value(option, EXPECTED)),
    }
}
