//! Decoding pipeline: stages from token splitting to claims validation.

use serde_json::Value;

use crate::{
    algorithm::negotiate,
    token::{decode_segment, Segments, SignatureBytes},
    verify::{verify_signature, SignedParts},
    DecodeError, DecodeOptions, DecodedToken, Header,
};

/// Pipeline stage reached by a [`DecodeContext`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Init,
    SegmentsValidated,
    AlgorithmChecked,
    SignatureChecked,
    ClaimsChecked,
    Done,
}

/// Per-call decoding state. Segments are split and decoded once, when the context
/// is created; later stages reuse the decoded values.
#[derive(Debug)]
pub(crate) struct DecodeContext<'a> {
    options: &'a DecodeOptions,
    segments: Segments<'a>,
    header: Header,
    payload: Value,
    signature: SignatureBytes,
    stage: Stage,
}

impl<'a> DecodeContext<'a> {
    fn new(token: &'a str, options: &'a DecodeOptions) -> Result<Self, DecodeError> {
        tracing::trace!(stage = ?Stage::Init, "decoding token");

        let segments = Segments::split(token)?;
        let header = Header::decode(segments.header())?;
        segments.validate_count(
            options.verifies(),
            header.algorithm(),
            options.algorithm_matching(),
        )?;
        let signature = segments.decode_signature()?;
        let payload = Self::decode_payload(options, &segments, &header, &signature)?;

        let mut this = Self {
            options,
            segments,
            header,
            payload,
            signature,
            stage: Stage::Init,
        };
        this.advance(Stage::SegmentsValidated);
        Ok(this)
    }

    fn decode_payload(
        options: &DecodeOptions,
        segments: &Segments<'_>,
        header: &Header,
        signature: &[u8],
    ) -> Result<Value, DecodeError> {
        if let Some(decoder) = options.payload_decoder() {
            let encoded = decoder
                .decode(segments.payload(), header, signature)
                .map_err(DecodeError::PayloadDecoder)?;
            decode_segment(&encoded)
        } else {
            decode_segment(segments.payload())
        }
    }

    fn advance(&mut self, stage: Stage) {
        tracing::trace!(from = ?self.stage, to = ?stage, "pipeline stage completed");
        self.stage = stage;
    }

    fn run(mut self) -> Result<DecodedToken, DecodeError> {
        if self.options.verifies() {
            self.check_algorithm_and_signature()?;
            self.check_claims()?;
        }
        self.advance(Stage::Done);
        Ok(DecodedToken::new(self.payload, self.header))
    }

    fn check_algorithm_and_signature(&mut self) -> Result<(), DecodeError> {
        let options = self.options;
        let negotiated = negotiate(
            options.algorithms(),
            &self.header,
            options.algorithm_matching(),
        )?;
        tracing::trace!(
            stage = ?Stage::AlgorithmChecked,
            declared = negotiated.declared,
            matched = negotiated.matched.len(),
            "algorithm negotiated"
        );

        if !negotiated.is_unsigned() {
            let keys = options.key_sources.resolve(&self.header, &self.payload)?;
            let parts = SignedParts {
                signing_input: self.segments.signing_input(),
                signature: &self.signature,
                header: &self.header,
                payload: &self.payload,
            };
            verify_signature(&negotiated, &keys, options.engine(), &parts)?;
        }
        self.advance(Stage::SignatureChecked);
        Ok(())
    }

    fn check_claims(&mut self) -> Result<(), DecodeError> {
        if let Some(validator) = self.options.claims_validator() {
            validator
                .validate(&self.payload, self.options)
                .map_err(DecodeError::Claims)?;
        }
        self.advance(Stage::ClaimsChecked);
        Ok(())
    }
}

/// Decodes and (unless disabled in `options`) verifies a token.
///
/// The pipeline runs the following stages; each of them either succeeds or terminates
/// decoding with an error:
///
/// 1. The token is split into segments; the header, payload and signature are decoded.
/// 2. If verification is enabled, the algorithm declared in the token header is checked
///    against the allow-list.
/// 3. Candidate keys are resolved, and the signature is verified with every
///    (allowed algorithm, key) combination until one succeeds.
/// 4. The [`ClaimsValidator`](crate::ClaimsValidator), if any, checks the payload.
///
/// # Errors
///
/// Returns an error if any stage fails. See [`DecodeError`] for the possible failures.
///
/// # Examples
///
/// ```
/// use jwt_decoder::{decode, DecodeError, DecodeOptions};
///
/// // Token with `{"alg":"none"}` header and `{"sub":"1"}` payload.
/// let token = "eyJhbGciOiJub25lIn0.eyJzdWIiOiIxIn0";
/// let options = DecodeOptions::default().with_algorithm("HS256");
/// let err = decode(token, &options).unwrap_err();
/// assert!(matches!(err, DecodeError::IncorrectAlgorithm));
///
/// // Unsigned tokens are only accepted if `none` is explicitly allowed.
/// let options = options.with_algorithm("none");
/// let token = decode(token, &options)?;
/// assert_eq!(token.payload()["sub"], "1");
/// # Ok::<_, DecodeError>(())
/// ```
pub fn decode(token: &str, options: &DecodeOptions) -> Result<DecodedToken, DecodeError> {
    let result = DecodeContext::new(token, options).and_then(DecodeContext::run);
    if let Err(err) = &result {
        tracing::debug!(kind = %err.kind(), "token rejected");
    }
    result
}
