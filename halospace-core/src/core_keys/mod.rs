//! Key management module
//!
//! Public keys identify every principal in a space: the space itself, identities,
//! devices, feeds and credentials. Keys compare by their 32 bytes, never by reference.
//!
//! Signing is an external concern; [`Keyring`] is the in-memory [`Signer`] used by
//! tests, the CLI and anything else that needs to mint credentials locally.

mod keyring;
mod public_key;

pub use keyring::{verify_signature, Keyring, Signer};
pub use public_key::{PublicKey, PUBLIC_KEY_LENGTH};

use thiserror::Error;

/// Key errors
#[derive(Debug, Error)]
pub enum KeyError {
    #[error("Key not found in keyring: {0}")]
    NotFound(PublicKey),

    #[error("Invalid key length: expected {expected}, got {actual}")]
    InvalidLength { expected: usize, actual: usize },

    #[error("Invalid hex encoding: {0}")]
    InvalidHex(String),

    #[error("Other error: {0}")]
    Other(String),
}
