//! Credentials module
//!
//! A credential is a signed, typed assertion about a subject. Spaces are nothing more than
//! the result of replaying their credentials in order, so everything here is deterministic:
//! the canonical encoding, the id derivation and the verification rules.
//!
//! - [`Assertion`]: the closed set of payloads, tagged by `@type`
//! - [`CredentialBuilder`] / [`CredentialSigner`]: signing, optionally through a device chain
//! - [`SignatureVerifier`]: signature plus bounded delegation-chain verification
//! - factory functions for the common credential sequences

mod assertions;
mod auth;
mod builder;
mod credential;
mod encoding;
mod factory;
mod verifier;

pub use assertions::{
    Assertion, Auth, AuthMethod, AuthorizedDevice, CancelDelegatedInvitation, AdmittedFeed,
    DelegateSpaceInvitation, DeviceProfile, DeviceProfileDocument, FeedDesignation,
    IdentityProfile, MemberProfile, ProfileDocument, SpaceGenesis, SpaceMember, SpaceRole,
};
pub use auth::{create_auth_credential, HaloAuthVerifier};
pub use builder::{CredentialBuilder, CredentialSigner};
pub use credential::{now_millis, Chain, Credential, Proof};
pub use encoding::{canonical_payload, credential_id, decode_credential, encode_credential};
pub use factory::{
    create_admission_credentials, create_cancel_delegated_invitation_credential,
    create_delegated_invitation_credential, create_device_authorization,
    create_device_profile_credential, create_feed_admission_credential,
    create_genesis_credential_sequence, create_identity_profile_credential,
    create_member_profile_credential, InvitationParams,
};
pub use verifier::{
    CredentialVerifier, SignatureVerifier, TrustingVerifier, VerificationResult,
    DEFAULT_MAX_CHAIN_DEPTH,
};

use crate::core_keys::{KeyError, PublicKey};
use thiserror::Error;

/// Credential errors
#[derive(Debug, Error)]
pub enum CredentialError {
    #[error("Signing key {signing_key} differs from issuer {issuer} but no chain was provided")]
    MissingChain { issuer: PublicKey, signing_key: PublicKey },

    #[error("Key error: {0}")]
    Key(#[from] KeyError),

    #[error("Failed to encode credential: {0}")]
    Encoding(String),

    #[error("Failed to decode credential: {0}")]
    Decoding(String),
}
