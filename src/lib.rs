//! Hardened [JSON web token (JWT)][JWT] decoding pipeline with explicit algorithm allow-lists,
//! key rotation and pluggable key resolution.
//!
//! # Design choices
//!
//! - The algorithm declared by a token is never trusted on its own. It must match an entry
//!   of the configured allow-list, and the signature is verified with the algorithm
//!   from the allow-list (not the one from the token header). This eliminates
//!   [algorithm switching attacks][switching].
//! - Unsigned tokens (`alg: none`) are only accepted if `none` is explicitly allowed.
//! - Verification keys are an ordered list of candidates ([`Keys`]). A token is accepted
//!   if any (allowed algorithm, key) combination verifies its signature, which allows
//!   rotating keys without downtime.
//! - Keys can be obtained from a [JSON Web Key Set](jwk::JsonWebKeySet) (by the `kid` header
//!   field), from an X.509 certificate chain embedded into the token (the `x5c` field),
//!   from a custom [`KeyResolver`] callback, or can be specified statically.
//! - Decoding options are immutable and can be shared across threads; decoding itself
//!   is a pure function of the token and the options.
//!
//! ## Supported algorithms
//!
//! Signatures for algorithms in the allow-list are verified by a [`SignatureEngine`].
//! The default engine, [`StandardAlgorithms`], supports the following algorithms:
//!
//! | Algorithm(s) | Feature | Description |
//! |--------------|---------|-------------|
//! | `HS256`, `HS384`, `HS512` | - | Uses pure Rust [`sha2`] crate |
//! | `ES256` | [`p256`] | Pure Rust implementation |
//! | `EdDSA` (Ed25519) | [`ed25519-dalek`] | Pure Rust implementation |
//! | `RS*`, `PS*` (RSA) | [`rsa`] | Uses pure Rust [`rsa`] crate with blinding |
//!
//! Algorithms that need access to the entire token (for example, to read key material
//! from the header) can be expressed via [`CustomAlgorithm`].
//!
//! # Crate features
//!
//! - `clock` (on by default) enables getting the current time using `Utc::now()`
//!   from [`chrono`] in the [`TimeClaims`] validator. Without it, the validator must be created
//!   with an explicit clock function.
//! - `p256`, `ed25519-dalek` and `rsa` enable the corresponding signature backends.
//!
//! [JWT]: https://jwt.io/
//! [switching]: https://auth0.com/blog/critical-vulnerabilities-in-json-web-token-libraries/
//! [`sha2`]: https://docs.rs/sha2/
//! [`p256`]: https://docs.rs/p256/
//! [`ed25519-dalek`]: https://doc.dalek.rs/ed25519_dalek/
//! [`rsa`]: https://docs.rs/rsa/
//! [`chrono`]: https://docs.rs/chrono/
//!
//! # Examples
//!
//! Basic decoding:
//!
//! ```
//! use jwt_decoder::{prelude::*, alg::{Hs256, Hs256Key}, DecodeError, DecodingKey};
//! use serde::Deserialize;
//! use serde_json::{json, Map};
//!
//! /// Custom claims encoded in the token.
//! #[derive(Debug, Deserialize)]
//! struct CustomClaims {
//!     #[serde(rename = "sub")]
//!     subject: String,
//! }
//!
//! # fn main() -> anyhow::Result<()> {
//! // Create a token (e.g., on the issuer side).
//! let key = Hs256Key::new(b"super_secret_key_donut_steel");
//! let mut header_fields = Map::new();
//! header_fields.insert("kid".to_owned(), json!("my-key"));
//! let token = Hs256.token(&header_fields, &json!({ "sub": "alice" }), &key)?;
//!
//! // Decode the token.
//! let options = DecodeOptions::default()
//!     .with_algorithm("HS256")
//!     .with_key(DecodingKey::from_secret(b"super_secret_key_donut_steel"));
//! let decoded = decode(&token, &options)?;
//! assert_eq!(decoded.header().key_id(), Some("my-key"));
//! let claims: CustomClaims = decoded.claims()?;
//! assert_eq!(claims.subject, "alice");
//!
//! // Tokens declaring an algorithm outside the allow-list are rejected.
//! let options = options.with_algorithms(["RS256"]);
//! let err = decode(&token, &options).unwrap_err();
//! assert!(matches!(err, DecodeError::IncorrectAlgorithm));
//! # Ok(())
//! # } // end main()
//! ```
//!
//! ## Key rotation and key sets
//!
//! ```
//! # use jwt_decoder::{prelude::*, alg::{Hs256, Hs256Key}, jwk::{JsonWebKey, JsonWebKeySet}};
//! # use serde_json::{json, Map};
//! # use std::sync::Arc;
//! # fn main() -> anyhow::Result<()> {
//! let old_key = Hs256Key::new(b"old_secret");
//! let new_key = Hs256Key::new(b"new_secret");
//! let key_set = JsonWebKeySet::default()
//!     .with_key("old", JsonWebKey::from(&old_key))
//!     .with_key("new", JsonWebKey::from(&new_key));
//!
//! let mut header_fields = Map::new();
//! header_fields.insert("kid".to_owned(), json!("new"));
//! let token = Hs256.token(&header_fields, &json!({ "sub": "bob" }), &new_key)?;
//!
//! let options = DecodeOptions::default()
//!     .with_algorithm("HS256")
//!     .with_jwks(Arc::new(key_set));
//! let decoded = decode(&token, &options)?;
//! assert_eq!(decoded.payload()["sub"], "bob");
//! # Ok(())
//! # }
//! ```

#![cfg_attr(docsrs, feature(doc_cfg))]
#![warn(missing_debug_implementations, missing_docs, bare_trait_objects)]
#![warn(clippy::all, clippy::pedantic)]
#![allow(
    clippy::missing_errors_doc,
    clippy::must_use_candidate,
    clippy::module_name_repetitions
)]

pub mod alg;
mod algorithm;
mod claims;
mod config;
mod engine;
mod error;
pub mod jwk;
mod keys;
mod options;
mod pipeline;
mod token;
mod traits;
mod verify;

/// Prelude to neatly import all necessary stuff from the crate.
pub mod prelude {
    pub use crate::{decode, AlgorithmExt as _, DecodeOptions, DecodedToken, Header};
}

pub use crate::{
    algorithm::{AlgorithmMatching, AllowedAlgorithm, CustomAlgorithm, VerificationInput},
    claims::{ClaimsError, ClaimsValidator, TimeClaims},
    config::{DecodeOverrides, Decoder},
    engine::{SignatureEngine, StandardAlgorithms},
    error::{DecodeError, ErrorKind, KeyLookupError, OptionsError},
    keys::{CertificateChainResolver, DecodingKey, JwksResolver, KeyResolver, Keys, X5cSource},
    options::{DecodeOptions, PayloadDecoder, RawOptions},
    pipeline::decode,
    token::{DecodedToken, Header},
    traits::{Algorithm, AlgorithmExt, AlgorithmSignature},
};
