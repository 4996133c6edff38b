//! Identity profile, read from the HALO space

use super::credential_consumer::{CredentialProcessor, ProcessorError};
use crate::core_credentials::{Assertion, Credential, ProfileDocument};
use crate::core_keys::PublicKey;
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, warn};

pub struct ProfileStateMachine {
    identity_key: PublicKey,
    profile: watch::Sender<Option<ProfileDocument>>,
}

impl ProfileStateMachine {
    pub fn new(identity_key: PublicKey) -> Self {
        let (profile, _rx) = watch::channel(None);
        Self { identity_key, profile }
    }

    pub fn profile(&self) -> Option<ProfileDocument> {
        self.profile.borrow().clone()
    }

    /// Receiver that observes every later profile change
    pub fn subscribe(&self) -> watch::Receiver<Option<ProfileDocument>> {
        self.profile.subscribe()
    }
}

#[async_trait]
impl CredentialProcessor for ProfileStateMachine {
    async fn process_credential(&self, credential: &Credential) -> Result<(), ProcessorError> {
        let Assertion::IdentityProfile(assertion) = &credential.assertion else {
            return Ok(());
        };

        if credential.issuer != self.identity_key || credential.subject != self.identity_key {
            warn!(
                issuer = %credential.issuer.truncate(),
                subject = %credential.subject.truncate(),
                "Identity profile for another identity"
            );
            return Ok(());
        }

        debug!(identity = %self.identity_key.truncate(), "Identity profile updated");
        self.profile.send_replace(Some(assertion.profile.clone()));
        Ok(())
    }
}
