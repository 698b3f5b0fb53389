//! # radiochat-auth
//!
//! Member token verification for the relay.
//!
//! Every websocket handshake carries an HS512 JWT issued by the association's
//! identity provider. [`TokenVerifier`] checks the signature against the
//! shared secret and turns the `lidnr` claim into an [`Identity`], the key
//! used to route radio replies back to a user.

#![deny(unsafe_code)]

pub mod errors;
pub mod identity;
pub mod verifier;

pub use errors::AuthError;
pub use identity::{DisplayName, Identity};
pub use verifier::{DEFAULT_LEEWAY_SECS, TokenVerifier, VerifiedToken};
