//! Test fixtures: a ready-made space and a recording credential processor

use crate::core_credentials::{
    create_device_authorization, create_genesis_credential_sequence, Chain, Credential, CredentialSigner,
};
use crate::core_keys::{Keyring, PublicKey, Signer};
use crate::core_state::{CredentialProcessor, ProcessOptions, ProcessorError, SpaceStateMachine};
use async_trait::async_trait;
use std::sync::Arc;
use tokio::sync::watch;
use tokio::time::{timeout, Duration};

const WAIT_TIMEOUT: Duration = Duration::from_secs(5);

/// A space created by one identity writing through an authorized device.
///
/// All keys live in one keyring. The genesis sequence is signed once and cached, so
/// every call to [`genesis_sequence`](Self::genesis_sequence) yields the same ids.
pub struct TestSpace {
    pub space_key: PublicKey,
    pub identity_key: PublicKey,
    pub device_key: PublicKey,
    pub control_feed: PublicKey,
    pub data_feed: PublicKey,
    keyring: Keyring,
    signer: Arc<dyn Signer>,
    device_chain: Chain,
    genesis: Vec<Credential>,
}

impl TestSpace {
    pub fn new() -> Self {
        let keyring = Keyring::new();
        let create = || keyring.create_key().expect("create key");
        let (space_key, identity_key, device_key) = (create(), create(), create());
        let (control_feed, data_feed) = (create(), create());
        let signer: Arc<dyn Signer> = Arc::new(keyring.clone());

        let identity = CredentialSigner::with_key(signer.clone(), identity_key);
        let device_chain =
            Chain::new(create_device_authorization(&identity, device_key).expect("authorize device"));
        let device = CredentialSigner::with_chain(signer.clone(), device_chain.clone(), device_key);

        let genesis = create_genesis_credential_sequence(
            &CredentialSigner::with_key(signer.clone(), space_key),
            &device,
            control_feed,
            data_feed,
        )
        .expect("genesis sequence");

        Self {
            space_key,
            identity_key,
            device_key,
            control_feed,
            data_feed,
            keyring,
            signer,
            device_chain,
            genesis,
        }
    }

    /// Genesis, owner admission, control feed, data feed
    pub fn genesis_sequence(&self) -> Vec<Credential> {
        self.genesis.clone()
    }

    pub fn control_options(&self) -> ProcessOptions {
        ProcessOptions::from_feed(self.control_feed)
    }

    /// A state machine that has applied the genesis sequence
    pub async fn bootstrapped(&self) -> SpaceStateMachine {
        let mut machine = SpaceStateMachine::new(self.space_key);
        for credential in self.genesis_sequence() {
            let applied = machine.process(credential, self.control_options()).await.expect("process genesis");
            assert!(applied, "genesis sequence rejected");
        }
        machine
    }

    /// The keyring holding every key of this space
    pub fn signer(&self) -> Arc<dyn Signer> {
        self.signer.clone()
    }

    pub fn space_signer(&self) -> CredentialSigner {
        CredentialSigner::with_key(self.signer.clone(), self.space_key)
    }

    pub fn identity_signer(&self) -> CredentialSigner {
        CredentialSigner::with_key(self.signer.clone(), self.identity_key)
    }

    /// Signs as the identity through the device key
    pub fn device_signer(&self) -> CredentialSigner {
        CredentialSigner::with_chain(self.signer.clone(), self.device_chain.clone(), self.device_key)
    }

    /// A fresh identity sharing this space's keyring
    pub fn new_member_signer(&self) -> CredentialSigner {
        let key = self.keyring.create_key().expect("create key");
        CredentialSigner::with_key(self.signer.clone(), key)
    }

    /// A unique `AuthorizedDevice` credential for a new device of the identity
    pub fn authorize_new_device(&self) -> Credential {
        let device_key = self.keyring.create_key().expect("create key");
        create_device_authorization(&self.identity_signer(), device_key).expect("authorize device")
    }
}

impl Default for TestSpace {
    fn default() -> Self {
        Self::new()
    }
}

/// Records the ids it is handed, optionally failing after a number of credentials
pub struct RecordingProcessor {
    seen: watch::Sender<Vec<PublicKey>>,
    failed: watch::Sender<bool>,
    fail_after: Option<usize>,
}

impl RecordingProcessor {
    pub fn new() -> Self {
        Self { seen: watch::Sender::new(Vec::new()), failed: watch::Sender::new(false), fail_after: None }
    }

    /// Accepts `count` credentials, then fails
    pub fn failing_after(count: usize) -> Self {
        Self { fail_after: Some(count), ..Self::new() }
    }

    pub fn seen(&self) -> Vec<PublicKey> {
        self.seen.borrow().clone()
    }

    /// Wait until at least `count` ids were recorded
    pub async fn wait_for(&self, count: usize) -> Vec<PublicKey> {
        let mut rx = self.seen.subscribe();
        let seen = timeout(WAIT_TIMEOUT, rx.wait_for(|seen| seen.len() >= count))
            .await
            .expect("timed out waiting for credentials")
            .expect("processor dropped");
        seen.clone()
    }

    pub async fn wait_for_failure(&self) {
        let mut rx = self.failed.subscribe();
        timeout(WAIT_TIMEOUT, rx.wait_for(|failed| *failed))
            .await
            .expect("timed out waiting for failure")
            .expect("processor dropped");
    }
}

impl Default for RecordingProcessor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialProcessor for RecordingProcessor {
    async fn process_credential(&self, credential: &Credential) -> Result<(), ProcessorError> {
        if self.fail_after.is_some_and(|limit| self.seen.borrow().len() >= limit) {
            self.failed.send_replace(true);
            return Err(ProcessorError::Other("configured to fail".to_string()));
        }
        let id = credential.id.ok_or_else(|| ProcessorError::Invariant("credential without id".to_string()))?;
        self.seen.send_modify(|seen| seen.push(id));
        Ok(())
    }
}
