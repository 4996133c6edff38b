//! Challenge-response authentication between devices of one identity
//!
//! The connecting device answers a random challenge with an `Auth` credential carrying the
//! challenge as its nonce. The responder accepts it when the credential verifies, was issued
//! by the expected identity and was signed by a device that identity has authorized.

use super::assertions::{Assertion, Auth};
use super::builder::CredentialSigner;
use super::credential::Credential;
use super::encoding::decode_credential;
use super::verifier::SignatureVerifier;
use super::CredentialError;
use crate::core_state::DeviceStateMachine;
use crate::metrics::record_counter;
use std::sync::Arc;
use tracing::{debug, warn};

/// Answer `nonce` as the signer's identity
pub fn create_auth_credential(signer: &CredentialSigner, nonce: Vec<u8>) -> Result<Credential, CredentialError> {
    signer.sign_builder(signer.builder(signer.issuer(), Assertion::Auth(Auth {})).nonce(nonce))
}

/// Verifies `Auth` credentials against the devices of the local HALO
pub struct HaloAuthVerifier {
    devices: Arc<DeviceStateMachine>,
    verifier: SignatureVerifier,
}

impl HaloAuthVerifier {
    pub fn new(devices: Arc<DeviceStateMachine>) -> Self {
        Self { devices, verifier: SignatureVerifier::new() }
    }

    pub fn with_verifier(devices: Arc<DeviceStateMachine>, verifier: SignatureVerifier) -> Self {
        Self { devices, verifier }
    }

    pub async fn verify(&self, challenge: &[u8], credential: &Credential) -> bool {
        let accepted = self.check(challenge, credential).await;
        record_counter(if accepted { "halo.auth.accepted" } else { "halo.auth.rejected" }, 1);
        accepted
    }

    async fn check(&self, challenge: &[u8], credential: &Credential) -> bool {
        if !matches!(credential.assertion, Assertion::Auth(_)) {
            warn!(credential_type = credential.type_name(), "Auth expected");
            return false;
        }
        if credential.proof.nonce.as_deref() != Some(challenge) {
            warn!("Auth nonce does not match challenge");
            return false;
        }

        let result = self.verifier.verify_sync(credential);
        if !result.is_pass() {
            warn!(?result, "Auth credential failed verification");
            return false;
        }

        let identity_key = self.devices.identity_key();
        if credential.issuer != identity_key {
            warn!(issuer = %credential.issuer.truncate(), "Auth issued by another identity");
            return false;
        }

        let signing_key = credential.proof.signing_key;
        if signing_key != identity_key && !self.devices.is_authorized(&signing_key).await {
            warn!(device = %signing_key.truncate(), "Auth signed by an unauthorized device");
            return false;
        }

        debug!(device = %signing_key.truncate(), "Device authenticated");
        true
    }

    /// Same as [`verify`](Self::verify) for a credential still in wire form
    pub async fn verify_encoded(&self, challenge: &[u8], bytes: &[u8]) -> bool {
        match decode_credential(bytes) {
            Ok(credential) => self.verify(challenge, &credential).await,
            Err(e) => {
                warn!(error = %e, "Malformed auth credential");
                record_counter("halo.auth.rejected", 1);
                false
            }
        }
    }
}
