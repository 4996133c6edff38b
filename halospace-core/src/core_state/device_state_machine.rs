//! Devices authorized by an identity, read from its HALO space

use super::credential_consumer::{CredentialProcessor, ProcessorError};
use crate::core_credentials::{Assertion, Chain, Credential, DeviceProfileDocument};
use crate::core_keys::PublicKey;
use async_trait::async_trait;
use std::collections::HashMap;
use tokio::sync::{watch, RwLock};
use tracing::{debug, warn};

/// Tracks the devices of `identity_key` and the credential chain of the local device
pub struct DeviceStateMachine {
    identity_key: PublicKey,
    device_key: PublicKey,
    devices: RwLock<HashMap<PublicKey, DeviceProfileDocument>>,
    /// Set once, by the first authorization of the local device
    device_chain: watch::Sender<Option<Chain>>,
}

impl DeviceStateMachine {
    pub fn new(identity_key: PublicKey, device_key: PublicKey) -> Self {
        let (device_chain, _rx) = watch::channel(None);
        Self { identity_key, device_key, devices: RwLock::new(HashMap::new()), device_chain }
    }

    pub fn identity_key(&self) -> PublicKey {
        self.identity_key
    }

    pub fn device_key(&self) -> PublicKey {
        self.device_key
    }

    pub async fn authorized_devices(&self) -> HashMap<PublicKey, DeviceProfileDocument> {
        self.devices.read().await.clone()
    }

    pub async fn is_authorized(&self, device_key: &PublicKey) -> bool {
        self.devices.read().await.contains_key(device_key)
    }

    /// Chain proving the local device acts for the identity, once known
    pub fn device_chain(&self) -> Option<Chain> {
        self.device_chain.borrow().clone()
    }

    /// Resolves when the local device's authorization has been processed
    pub async fn wait_for_device_chain(&self) -> Option<Chain> {
        let mut rx = self.device_chain.subscribe();
        let chain = rx.wait_for(Option::is_some).await.ok()?;
        chain.clone()
    }

    async fn authorize(&self, credential: &Credential, device_key: PublicKey, identity_key: PublicKey) {
        if credential.issuer != self.identity_key {
            warn!(
                device = %device_key.truncate(),
                issuer = %credential.issuer.truncate(),
                "Device authorization not issued by the identity"
            );
            return;
        }
        if identity_key != self.identity_key || credential.subject != device_key {
            warn!(
                device = %device_key.truncate(),
                identity = %identity_key.truncate(),
                "Device authorization for another identity or subject"
            );
            return;
        }

        self.devices.write().await.entry(device_key).or_default();
        debug!(device = %device_key.truncate(), "Device authorized");

        if device_key == self.device_key {
            let chain = Chain::new(credential.clone());
            self.device_chain.send_if_modified(|slot| {
                if slot.is_some() {
                    return false;
                }
                *slot = Some(chain);
                true
            });
        }
    }

    async fn update_profile(&self, credential: &Credential, profile: &DeviceProfileDocument) {
        if credential.issuer != self.identity_key {
            warn!(
                device = %credential.subject.truncate(),
                issuer = %credential.issuer.truncate(),
                "Device profile not issued by the identity"
            );
            return;
        }
        match self.devices.write().await.get_mut(&credential.subject) {
            Some(existing) => *existing = profile.clone(),
            None => warn!(device = %credential.subject.truncate(), "Profile for unknown device"),
        }
    }
}

#[async_trait]
impl CredentialProcessor for DeviceStateMachine {
    async fn process_credential(&self, credential: &Credential) -> Result<(), ProcessorError> {
        match &credential.assertion {
            Assertion::AuthorizedDevice(assertion) => {
                self.authorize(credential, assertion.device_key, assertion.identity_key).await
            }
            Assertion::DeviceProfile(assertion) => self.update_profile(credential, &assertion.profile).await,
            _ => {}
        }
        Ok(())
    }
}
