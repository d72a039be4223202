//! Signature verification over (algorithm, key) combinations.

use serde_json::Value;

use crate::{
    algorithm::NegotiatedAlgorithms, AllowedAlgorithm, DecodeError, Header, Keys,
    SignatureEngine, VerificationInput,
};

/// Token parts covered by verification.
#[derive(Debug, Clone, Copy)]
pub(crate) struct SignedParts<'a> {
    pub signing_input: &'a [u8],
    pub signature: &'a [u8],
    pub header: &'a Header,
    pub payload: &'a Value,
}

/// Verifies `parts` with every matched algorithm and every candidate key, in order.
/// Succeeds as soon as a single combination verifies the signature.
///
/// Named algorithms not recognized by the `engine` are skipped. If no combination verifies
/// the signature and every matched algorithm was skipped, the first unrecognized name
/// is reported, since this signals a misconfiguration rather than a forged token.
pub(crate) fn verify_signature(
    negotiated: &NegotiatedAlgorithms<'_>,
    keys: &Keys,
    engine: &dyn SignatureEngine,
    parts: &SignedParts<'_>,
) -> Result<(), DecodeError> {
    if negotiated.is_unsigned() {
        return Ok(());
    }

    let mut unsupported = None;
    let mut tried_supported = false;
    for &algorithm in &negotiated.matched {
        if let AllowedAlgorithm::Name(name) = algorithm {
            if !engine.supports(name) {
                unsupported.get_or_insert(name);
                continue;
            }
        }
        tried_supported = true;

        for key in keys {
            let is_valid = match algorithm {
                AllowedAlgorithm::Name(name) => {
                    engine.verify(name, key, parts.signing_input, parts.signature)
                }
                AllowedAlgorithm::Custom(custom) => custom.verify(&VerificationInput {
                    signing_input: parts.signing_input,
                    signature: parts.signature,
                    key,
                    header: parts.header,
                    payload: parts.payload,
                }),
            };
            if is_valid {
                tracing::trace!(declared = negotiated.declared, "signature verified");
                return Ok(());
            }
        }
    }

    match unsupported {
        Some(name) if !tried_supported => Err(DecodeError::UnsupportedAlgorithm(name.clone())),
        _ => Err(DecodeError::InvalidSignature),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{
        algorithm::negotiate,
        alg::{Hs256, Hs256Key},
        Algorithm, AlgorithmMatching, AlgorithmSignature, CustomAlgorithm, DecodingKey,
        StandardAlgorithms,
    };

    use assert_matches::assert_matches;
    use serde_json::json;

    use std::sync::atomic::{AtomicUsize, Ordering};

    const SIGNING_INPUT: &[u8] = b"header.payload";

    fn hs256_header() -> Header {
        serde_json::from_value(json!({ "alg": "HS256" })).unwrap()
    }

    fn sign(secret: &[u8]) -> Vec<u8> {
        Hs256
            .sign(&Hs256Key::new(secret), SIGNING_INPUT)
            .as_bytes()
            .into_owned()
    }

    fn check(
        allowed: &[AllowedAlgorithm],
        keys: &Keys,
        signature: &[u8],
    ) -> Result<(), DecodeError> {
        let header = hs256_header();
        let negotiated = negotiate(allowed, &header, AlgorithmMatching::Exact)?;
        let parts = SignedParts {
            signing_input: SIGNING_INPUT,
            signature,
            header: &header,
            payload: &Value::Null,
        };
        verify_signature(&negotiated, keys, &StandardAlgorithms, &parts)
    }

    #[test]
    fn any_key_can_verify_signature() {
        let signature = sign(b"new");
        let allowed = [AllowedAlgorithm::from("HS256")];
        let keys: Keys = [b"old".as_slice(), b"new"]
            .into_iter()
            .map(DecodingKey::from_secret)
            .collect();
        check(&allowed, &keys, &signature).unwrap();

        let keys = Keys::from(DecodingKey::from_secret(b"other"));
        assert_matches!(
            check(&allowed, &keys, &signature).unwrap_err(),
            DecodeError::InvalidSignature
        );
    }

    #[test]
    fn unsupported_algorithm_is_reported() {
        struct AnyAlgorithm;

        impl CustomAlgorithm for AnyAlgorithm {
            fn matches(&self, _declared: &str) -> bool {
                true
            }

            fn verify(&self, _input: &VerificationInput<'_>) -> bool {
                false
            }
        }

        let header = serde_json::from_value(json!({ "alg": "XS256" })).unwrap();
        let allowed = [AllowedAlgorithm::from("XS256")];
        let negotiated = negotiate(&allowed, &header, AlgorithmMatching::Exact).unwrap();
        let parts = SignedParts {
            signing_input: SIGNING_INPUT,
            signature: b"",
            header: &header,
            payload: &Value::Null,
        };
        let keys = Keys::from(DecodingKey::from_secret(b"secret"));
        let err = verify_signature(&negotiated, &keys, &StandardAlgorithms, &parts).unwrap_err();
        assert_matches!(err, DecodeError::UnsupportedAlgorithm(alg) if alg == "XS256");

        let allowed = [AllowedAlgorithm::custom(AnyAlgorithm)];
        let negotiated = negotiate(&allowed, &header, AlgorithmMatching::Exact).unwrap();
        let err = verify_signature(&negotiated, &keys, &StandardAlgorithms, &parts).unwrap_err();
        assert_matches!(err, DecodeError::InvalidSignature);
    }

    #[test]
    fn unsupported_entries_do_not_shadow_later_ones() {
        struct Accepting;

        impl CustomAlgorithm for Accepting {
            fn matches(&self, declared: &str) -> bool {
                declared == "XS256"
            }

            fn verify(&self, _input: &VerificationInput<'_>) -> bool {
                true
            }
        }

        let header = serde_json::from_value(json!({ "alg": "XS256" })).unwrap();
        let parts = SignedParts {
            signing_input: SIGNING_INPUT,
            signature: b"",
            header: &header,
            payload: &Value::Null,
        };
        let keys = Keys::from(DecodingKey::from_secret(b"secret"));

        let allowed = [
            AllowedAlgorithm::from("XS256"),
            AllowedAlgorithm::custom(Accepting),
        ];
        let negotiated = negotiate(&allowed, &header, AlgorithmMatching::Exact).unwrap();
        verify_signature(&negotiated, &keys, &StandardAlgorithms, &parts).unwrap();
    }

    #[test]
    fn mixed_entries_report_invalid_signature() {
        let signature = sign(b"secret");
        let header = hs256_header();
        let allowed = [AllowedAlgorithm::from("hs256"), AllowedAlgorithm::from("HS256")];
        let negotiated =
            negotiate(&allowed, &header, AlgorithmMatching::CaseInsensitive).unwrap();
        let parts = SignedParts {
            signing_input: SIGNING_INPUT,
            signature: &signature,
            header: &header,
            payload: &Value::Null,
        };

        let keys = Keys::from(DecodingKey::from_secret(b"secret"));
        verify_signature(&negotiated, &keys, &StandardAlgorithms, &parts).unwrap();

        let keys = Keys::from(DecodingKey::from_secret(b"other"));
        let err = verify_signature(&negotiated, &keys, &StandardAlgorithms, &parts).unwrap_err();
        assert_matches!(err, DecodeError::InvalidSignature);
    }

    #[test]
    fn custom_algorithm_receives_all_combinations() {
        #[derive(Default)]
        struct Counting(AtomicUsize);

        impl CustomAlgorithm for Counting {
            fn matches(&self, declared: &str) -> bool {
                declared == "HS256"
            }

            fn verify(&self, input: &VerificationInput<'_>) -> bool {
                assert_eq!(input.signing_input, SIGNING_INPUT);
                assert_eq!(input.header.algorithm(), Some("HS256"));
                self.0.fetch_add(1, Ordering::SeqCst);
                false
            }
        }

        let counting = std::sync::Arc::new(Counting::default());
        let allowed = [
            AllowedAlgorithm::Custom(counting.clone()),
            AllowedAlgorithm::Custom(counting.clone()),
        ];
        let keys: Keys = [b"1".as_slice(), b"2", b"3"]
            .into_iter()
            .map(DecodingKey::from_secret)
            .collect();
        assert_matches!(
            check(&allowed, &keys, b"signature").unwrap_err(),
            DecodeError::InvalidSignature
        );
        assert_eq!(counting.0.load(Ordering::SeqCst), 6);
    }
}
