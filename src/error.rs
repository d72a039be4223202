//! Error handling.

use core::fmt;

/// Coarse classification of a [`DecodeError`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[non_exhaustive]
pub enum ErrorKind {
    /// The token is not a well-formed JWT: wrong number of segments, bad base64url
    /// or bad JSON.
    Structural,
    /// The algorithm allow-list is misconfigured, or the token declares an algorithm
    /// that is not allowed.
    Algorithm,
    /// No (algorithm, key) combination has verified the token signature.
    Verification,
    /// A collaborator (key resolver, payload decoder, claims validator) has failed.
    Collaborator,
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        formatter.write_str(match self {
            Self::Structural => "structural",
            Self::Algorithm => "algorithm",
            Self::Verification => "verification",
            Self::Collaborator => "collaborator",
        })
    }
}

/// Errors that may occur when decoding a token.
///
/// All errors are terminal for the decoding call; the pipeline never retries
/// or recovers locally.
#[derive(Debug)]
#[non_exhaustive]
pub enum DecodeError {
    /// Token string is empty.
    EmptyToken,
    /// Token has an unsupported number of segments.
    ///
    /// Tokens must consist of 3 base64url-encoded parts (header, claims, and signature)
    /// separated by periods. 2 parts are only accepted if verification is disabled
    /// or the token declares the `none` algorithm.
    InvalidSegmentCount,
    /// Header, claims or signature segment cannot be decoded from base64url or parsed as JSON.
    InvalidSegmentEncoding,
    /// Verification is enabled, but the algorithm allow-list is empty.
    NoAlgorithmSpecified,
    /// Token header does not contain a string `alg` field.
    MissingAlgorithmHeader,
    /// Algorithm declared in the token header is not in the allow-list.
    IncorrectAlgorithm,
    /// Allowed algorithm is not recognized by the signature engine.
    UnsupportedAlgorithm(String),
    /// Token signature has failed verification for all candidate keys and algorithms.
    InvalidSignature,
    /// Key resolution produced no candidate keys.
    NoVerificationKey,
    /// Key resolver (JWKS, certificate chain or a custom callback) has failed.
    KeyResolution(anyhow::Error),
    /// Custom payload decoder has failed.
    PayloadDecoder(anyhow::Error),
    /// Claims validator has rejected the token claims.
    Claims(anyhow::Error),
}

impl DecodeError {
    /// Returns the coarse classification of this error.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::EmptyToken | Self::InvalidSegmentCount | Self::InvalidSegmentEncoding => {
                ErrorKind::Structural
            }
            Self::NoAlgorithmSpecified
            | Self::MissingAlgorithmHeader
            | Self::IncorrectAlgorithm
            | Self::UnsupportedAlgorithm(_) => ErrorKind::Algorithm,
            Self::InvalidSignature => ErrorKind::Verification,
            Self::NoVerificationKey
            | Self::KeyResolution(_)
            | Self::PayloadDecoder(_)
            | Self::Claims(_) => ErrorKind::Collaborator,
        }
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyToken => formatter.write_str("Token is empty"),
            Self::InvalidSegmentCount => formatter.write_str("Not enough or too many segments"),
            Self::InvalidSegmentEncoding => formatter.write_str("Invalid segment encoding"),
            Self::NoAlgorithmSpecified => formatter.write_str("An algorithm must be specified"),
            Self::MissingAlgorithmHeader => formatter.write_str("Token is missing alg header"),
            Self::IncorrectAlgorithm => formatter.write_str("Expected a different algorithm"),
            Self::UnsupportedAlgorithm(alg) => {
                write!(formatter, "Algorithm `{alg}` is not supported")
            }
            Self::InvalidSignature => formatter.write_str("Signature verification failed"),
            Self::NoVerificationKey => formatter.write_str("No verification key available"),
            Self::KeyResolution(e) => write!(formatter, "Cannot resolve verification key: {e}"),
            Self::PayloadDecoder(e) => write!(formatter, "Cannot decode payload: {e}"),
            Self::Claims(e) => write!(formatter, "Claims validation failed: {e}"),
        }
    }
}

impl std::error::Error for DecodeError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            Self::KeyResolution(e) | Self::PayloadDecoder(e) | Self::Claims(e) => Some(e.as_ref()),
            _ => None,
        }
    }
}

/// Errors raised by the bundled key lookups ([`JsonWebKeySet`] and the `x5c` header
/// extraction).
///
/// [`JsonWebKeySet`]: crate::jwk::JsonWebKeySet
#[derive(Debug)]
#[non_exhaustive]
pub enum KeyLookupError {
    /// Token header has no `kid` field, but the key set requires one.
    MissingKeyId,
    /// Key set contains no keys.
    EmptyKeySet,
    /// Key set has no key with the requested ID.
    UnknownKeyId(String),
    /// Token header has no `x5c` field.
    MissingCertificateChain,
    /// `x5c` header field is not an array of base64-encoded certificates.
    MalformedCertificateChain,
}

impl fmt::Display for KeyLookupError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::MissingKeyId => formatter.write_str("Token header has no `kid` field"),
            Self::EmptyKeySet => formatter.write_str("No keys found in key set"),
            Self::UnknownKeyId(kid) => write!(formatter, "Could not find key for kid `{kid}`"),
            Self::MissingCertificateChain => formatter.write_str("Token header has no `x5c` field"),
            Self::MalformedCertificateChain => {
                formatter.write_str("Token header has malformed `x5c` field")
            }
        }
    }
}

impl std::error::Error for KeyLookupError {}

/// Errors that can occur when building [`DecodeOptions`] from loosely typed input.
///
/// [`DecodeOptions`]: crate::DecodeOptions
#[derive(Debug)]
#[non_exhaustive]
pub enum OptionsError {
    /// Options are not represented by a JSON object.
    NotAnObject,
    /// Option has a value of unexpected type.
    UnexpectedValue {
        /// Option name.
        option: String,
        /// Human-readable description of the expected value.
        expected: &'static str,
    },
}

impl fmt::Display for OptionsError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::NotAnObject => formatter.write_str("Decode options must be a JSON object"),
            Self::UnexpectedValue { option, expected } => {
                write!(formatter, "Option `{option}` has unexpected value (expected {expected})")
            }
        }
    }
}

impl std::error::Error for OptionsError {}
