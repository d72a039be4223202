//! Algorithm allow-lists and negotiation of the token algorithm.

use serde_json::Value;

use core::fmt;
use std::sync::Arc;

use crate::{DecodeError, DecodingKey, Header};

/// Comparison mode for algorithm identifiers.
///
/// Applies to allow-list membership of [`AllowedAlgorithm::Name`] entries and to
/// the `none` check for 2-segment tokens. Historically, JWT decoders disagreed
/// on whether `alg` values are case-sensitive, so the choice is explicit.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum AlgorithmMatching {
    /// Identifiers must match exactly (as required by RFC 7515).
    #[default]
    Exact,
    /// Identifiers are compared ignoring ASCII case (legacy behavior).
    CaseInsensitive,
}

impl AlgorithmMatching {
    /// Checks whether the `declared` algorithm identifier matches the `allowed` one.
    pub fn matches(self, allowed: &str, declared: &str) -> bool {
        match self {
            Self::Exact => allowed == declared,
            Self::CaseInsensitive => allowed.eq_ignore_ascii_case(declared),
        }
    }
}

/// Inputs provided to a [`CustomAlgorithm`] for signature verification.
#[derive(Debug, Clone, Copy)]
#[non_exhaustive]
pub struct VerificationInput<'a> {
    /// Header and payload segments joined by `.`, exactly as they appear in the token.
    pub signing_input: &'a [u8],
    /// Decoded signature bytes.
    pub signature: &'a [u8],
    /// Candidate key.
    pub key: &'a DecodingKey,
    /// Decoded token header.
    pub header: &'a Header,
    /// Decoded token payload.
    pub payload: &'a Value,
}

/// Capability-bearing algorithm that decides on its own which `alg` values it handles
/// and how signatures are verified.
///
/// Custom algorithms receive the decoded header and payload in addition to the signature,
/// which allows implementing schemes that need header-embedded material
/// (e.g., an inline certificate).
pub trait CustomAlgorithm: Send + Sync {
    /// Checks whether this algorithm handles tokens with the `declared` algorithm.
    fn matches(&self, declared: &str) -> bool;

    /// Verifies the token signature. Must not panic on malformed input; return `false`
    /// instead.
    fn verify(&self, input: &VerificationInput<'_>) -> bool;
}

/// Entry of an algorithm allow-list.
#[derive(Clone)]
#[non_exhaustive]
pub enum AllowedAlgorithm {
    /// Plain algorithm identifier, such as `HS256`. Verification is delegated
    /// to the [`SignatureEngine`](crate::SignatureEngine).
    Name(String),
    /// Custom algorithm.
    Custom(Arc<dyn CustomAlgorithm>),
}

impl fmt::Debug for AllowedAlgorithm {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name(name) => formatter.debug_tuple("Name").field(name).finish(),
            Self::Custom(_) => formatter.debug_tuple("Custom").field(&"_").finish(),
        }
    }
}

impl PartialEq for AllowedAlgorithm {
    fn eq(&self, other: &Self) -> bool {
        match (self, other) {
            (Self::Name(x), Self::Name(y)) => x == y,
            (Self::Custom(x), Self::Custom(y)) => Arc::ptr_eq(x, y),
            _ => false,
        }
    }
}

impl AllowedAlgorithm {
    /// Wraps a custom algorithm.
    pub fn custom(algorithm: impl CustomAlgorithm + 'static) -> Self {
        Self::Custom(Arc::new(algorithm))
    }

    /// Returns the identifier of this algorithm, if it is a plain identifier.
    pub fn name(&self) -> Option<&str> {
        match self {
            Self::Name(name) => Some(name),
            Self::Custom(_) => None,
        }
    }

    fn matches(&self, declared: &str, matching: AlgorithmMatching) -> bool {
        match self {
            Self::Name(name) => matching.matches(name, declared),
            Self::Custom(algorithm) => algorithm.matches(declared),
        }
    }

    /// Checks whether this is a plain `none` entry matching `declared`.
    pub(crate) fn allows_unsigned(&self, declared: &str) -> bool {
        matches!(self, Self::Name(name) if name.eq_ignore_ascii_case("none"))
            && declared.eq_ignore_ascii_case("none")
    }
}

impl From<&str> for AllowedAlgorithm {
    fn from(name: &str) -> Self {
        Self::Name(name.to_owned())
    }
}

impl From<String> for AllowedAlgorithm {
    fn from(name: String) -> Self {
        Self::Name(name)
    }
}

/// Allow-list entries that matched the algorithm declared by a token.
#[derive(Debug)]
pub(crate) struct NegotiatedAlgorithms<'a> {
    pub declared: &'a str,
    pub matched: Vec<&'a AllowedAlgorithm>,
}

impl NegotiatedAlgorithms<'_> {
    /// Checks whether signature verification should be skipped for this token.
    /// This is only the case if the allow-list explicitly contains `none`.
    pub fn is_unsigned(&self) -> bool {
        self.matched
            .iter()
            .any(|algorithm| algorithm.allows_unsigned(self.declared))
    }
}

/// Checks the algorithm declared in the token `header` against the `allowed` list.
pub(crate) fn negotiate<'a>(
    allowed: &'a [AllowedAlgorithm],
    header: &'a Header,
    matching: AlgorithmMatching,
) -> Result<NegotiatedAlgorithms<'a>, DecodeError> {
    if allowed.is_empty() {
        return Err(DecodeError::NoAlgorithmSpecified);
    }
    let declared = header
        .algorithm()
        .ok_or(DecodeError::MissingAlgorithmHeader)?;

    let matched: Vec<_> = allowed
        .iter()
        .filter(|algorithm| algorithm.matches(declared, matching))
        .collect();
    if matched.is_empty() {
        return Err(DecodeError::IncorrectAlgorithm);
    }
    Ok(NegotiatedAlgorithms { declared, matched })
}
