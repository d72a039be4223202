//! Validation of token claims.

use chrono::{DateTime, Duration, Utc};
use serde::Deserialize;
use serde_json::Value;

use core::fmt;

use crate::DecodeOptions;

/// Validator of token claims, invoked by the decoding pipeline after the token signature
/// has been verified.
///
/// Validators are only invoked if verification is enabled.
pub trait ClaimsValidator: Send + Sync {
    /// Validates the token `payload`. `options` are the effective options of the decoding
    /// call; e.g., [`DecodeOptions::leeway()`] should be respected by time-related checks.
    fn validate(&self, payload: &Value, options: &DecodeOptions) -> anyhow::Result<()>;
}

/// Errors raised by [`TimeClaims`].
#[derive(Debug, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum ClaimsError {
    /// Token payload is not an object, or a time-related claim is not a timestamp.
    Malformed(String),
    /// Required claim is missing from the token.
    MissingClaim(&'static str),
    /// Token has expired.
    Expired,
    /// Token is not yet valid as per `nbf` claim.
    NotMature,
}

impl fmt::Display for ClaimsError {
    fn fmt(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Malformed(message) => write!(formatter, "Malformed claims: {message}"),
            Self::MissingClaim(claim) => write!(formatter, "Claim `{claim}` is missing"),
            Self::Expired => formatter.write_str("Token has expired"),
            Self::NotMature => formatter.write_str("Token is not yet ready"),
        }
    }
}

impl std::error::Error for ClaimsError {}

/// Time-related claims as per [JWT spec].
///
/// [JWT spec]: https://tools.ietf.org/html/rfc7519#section-4.1
#[derive(Debug, Deserialize)]
struct StandardClaims {
    #[serde(rename = "exp", default, with = "self::serde_timestamp")]
    expiration: Option<DateTime<Utc>>,
    #[serde(rename = "nbf", default, with = "self::serde_timestamp")]
    not_before: Option<DateTime<Utc>>,
}

/// [`ClaimsValidator`] checking the expiration (`exp`) and maturity (`nbf`) claims.
///
/// The claims are compared against the current time provided by the clock function,
/// with the [leeway](DecodeOptions::leeway()) of the decoding options. Missing claims
/// are accepted unless required via [`Self::require_expiration()`].
///
/// # Examples
///
/// ```
/// # use chrono::{Duration, TimeZone, Utc};
/// # use jwt_decoder::{ClaimsValidator, DecodeOptions, TimeClaims};
/// # use serde_json::json;
/// let now = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
/// let validator = TimeClaims::with_clock(move || now).require_expiration();
/// let options = DecodeOptions::default().with_leeway(Duration::seconds(30));
///
/// let expired_recently = json!({ "exp": now.timestamp() - 10 });
/// assert!(validator.validate(&expired_recently, &options).is_ok());
/// let expired = json!({ "exp": now.timestamp() - 60 });
/// assert!(validator.validate(&expired, &options).is_err());
/// assert!(validator.validate(&json!({}), &options).is_err());
/// ```
#[derive(Debug, Clone, Copy)]
pub struct TimeClaims<F = fn() -> DateTime<Utc>> {
    clock_fn: F,
    require_expiration: bool,
}

impl<F: Fn() -> DateTime<Utc>> TimeClaims<F> {
    /// Creates a validator with the specified source of the current time.
    pub fn with_clock(clock_fn: F) -> Self {
        Self {
            clock_fn,
            require_expiration: false,
        }
    }

    /// Requires the `exp` claim to be present.
    #[must_use]
    pub fn require_expiration(mut self) -> Self {
        self.require_expiration = true;
        self
    }

    fn check(&self, payload: &Value, leeway: Duration) -> Result<(), ClaimsError> {
        if !payload.is_object() {
            return Err(ClaimsError::Malformed("payload is not an object".to_owned()));
        }
        let claims = StandardClaims::deserialize(payload)
            .map_err(|err| ClaimsError::Malformed(err.to_string()))?;
        let now = (self.clock_fn)();

        match claims.expiration {
            Some(expiration) => {
                let is_expired = expiration
                    .checked_add_signed(leeway)
                    .map_or(false, |expiration| now > expiration);
                if is_expired {
                    return Err(ClaimsError::Expired);
                }
            }
            None if self.require_expiration => return Err(ClaimsError::MissingClaim("exp")),
            None => { /* optional claim */ }
        }
        if let Some(not_before) = claims.not_before {
            let is_immature = not_before
                .checked_sub_signed(leeway)
                .map_or(false, |not_before| now < not_before);
            if is_immature {
                return Err(ClaimsError::NotMature);
            }
        }
        Ok(())
    }
}

#[cfg(feature = "clock")]
#[cfg_attr(docsrs, doc(cfg(feature = "clock")))]
impl TimeClaims {
    /// Creates a validator using [`Utc::now()`] as the clock source.
    pub fn new() -> Self {
        Self::with_clock(Utc::now)
    }
}

#[cfg(feature = "clock")]
impl Default for TimeClaims {
    fn default() -> Self {
        Self::new()
    }
}

impl<F> ClaimsValidator for TimeClaims<F>
where
    F: Fn() -> DateTime<Utc> + Send + Sync,
{
    fn validate(&self, payload: &Value, options: &DecodeOptions) -> anyhow::Result<()> {
        self.check(payload, options.leeway()).map_err(Into::into)
    }
}

mod serde_timestamp {
    use chrono::{DateTime, Utc};
    use serde::{
        de::{Error as DeError, Visitor},
        Deserializer,
    };

    use core::fmt;

    struct TimestampVisitor;

    impl<'de> Visitor<'de> for TimestampVisitor {
        type Value = DateTime<Utc>;

        fn expecting(&self, formatter: &mut fmt::Formatter<'_>) -> fmt::Result {
            formatter.write_str("UTC timestamp")
        }

        fn visit_i64<E: DeError>(self, value: i64) -> Result<Self::Value, E> {
            DateTime::from_timestamp(value, 0)
                .ok_or_else(|| E::custom("timestamp is out of range"))
        }

        fn visit_u64<E: DeError>(self, value: u64) -> Result<Self::Value, E> {
            let value = i64::try_from(value).map_err(DeError::custom)?;
            self.visit_i64(value)
        }

        #[allow(clippy::cast_possible_truncation)] // range is checked by `from_timestamp`
        fn visit_f64<E: DeError>(self, value: f64) -> Result<Self::Value, E> {
            if !value.is_finite() {
                return Err(E::custom("timestamp is not finite"));
            }
            self.visit_i64(value.trunc() as i64)
        }
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(
        deserializer: D,
    ) -> Result<Option<DateTime<Utc>>, D::Error> {
        deserializer.deserialize_any(TimestampVisitor).map(Some)
    }
}
