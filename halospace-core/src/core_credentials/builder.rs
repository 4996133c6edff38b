//! Credential construction and signing

use super::assertions::Assertion;
use super::credential::{now_millis, Chain, Credential, Proof};
use super::encoding::{canonical_payload, credential_id};
use super::CredentialError;
use crate::core_keys::{PublicKey, Signer};
use std::sync::Arc;

/// Builder for signed credentials
///
/// # Example
/// ```
/// use halospace_core::core_credentials::{Assertion, CredentialBuilder, SpaceGenesis};
/// use halospace_core::core_keys::Keyring;
///
/// let keyring = Keyring::new();
/// let space_key = keyring.create_key().unwrap();
/// let genesis = CredentialBuilder::new(
///     space_key,
///     space_key,
///     Assertion::SpaceGenesis(SpaceGenesis { space_key }),
/// )
/// .sign(&keyring)
/// .unwrap();
/// assert!(genesis.id.is_some());
/// ```
#[derive(Debug, Clone)]
pub struct CredentialBuilder {
    issuer: PublicKey,
    subject: PublicKey,
    assertion: Assertion,
    signing_key: Option<PublicKey>,
    chain: Option<Chain>,
    nonce: Option<Vec<u8>>,
    parents: Vec<PublicKey>,
    issuance_date: Option<u64>,
}

impl CredentialBuilder {
    pub fn new(issuer: PublicKey, subject: PublicKey, assertion: Assertion) -> Self {
        Self {
            issuer,
            subject,
            assertion,
            signing_key: None,
            chain: None,
            nonce: None,
            parents: Vec::new(),
            issuance_date: None,
        }
    }

    /// Sign with a device key instead of the issuer key; requires a chain
    pub fn signing_key(mut self, key: PublicKey) -> Self {
        self.signing_key = Some(key);
        self
    }

    pub fn chain(mut self, chain: Chain) -> Self {
        self.chain = Some(chain);
        self
    }

    pub fn nonce(mut self, nonce: Vec<u8>) -> Self {
        self.nonce = Some(nonce);
        self
    }

    pub fn parents(mut self, parents: Vec<PublicKey>) -> Self {
        self.parents = parents;
        self
    }

    pub fn issuance_date(mut self, millis: u64) -> Self {
        self.issuance_date = Some(millis);
        self
    }

    /// Sign and assign the content-derived id
    pub fn sign(self, signer: &dyn Signer) -> Result<Credential, CredentialError> {
        let signing_key = self.signing_key.unwrap_or(self.issuer);
        if signing_key != self.issuer && self.chain.is_none() {
            return Err(CredentialError::MissingChain { issuer: self.issuer, signing_key });
        }

        let mut credential = Credential {
            id: None,
            issuer: self.issuer,
            issuance_date: self.issuance_date.unwrap_or_else(now_millis),
            subject: self.subject,
            assertion: self.assertion,
            parent_credential_ids: self.parents,
            proof: Proof { signature: Vec::new(), signing_key, nonce: self.nonce },
            chain: self.chain.map(Box::new),
        };

        let payload = canonical_payload(&credential)?;
        credential.proof.signature = signer.sign(&signing_key, &payload)?;
        credential.id = Some(credential_id(&credential)?);
        Ok(credential)
    }
}

/// Issues credentials as one principal, optionally through a delegated device key.
#[derive(Clone)]
pub struct CredentialSigner {
    signer: Arc<dyn Signer>,
    issuer: PublicKey,
    signing_key: PublicKey,
    chain: Option<Chain>,
}

impl CredentialSigner {
    /// Sign directly with the issuer key
    pub fn with_key(signer: Arc<dyn Signer>, issuer: PublicKey) -> Self {
        Self { signer, issuer, signing_key: issuer, chain: None }
    }

    /// Sign with `device_key`, whose authority over the chain's issuer is proven by `chain`
    pub fn with_chain(signer: Arc<dyn Signer>, chain: Chain, device_key: PublicKey) -> Self {
        let issuer = chain.credential.issuer;
        Self { signer, issuer, signing_key: device_key, chain: Some(chain) }
    }

    pub fn issuer(&self) -> PublicKey {
        self.issuer
    }

    pub fn signing_key(&self) -> PublicKey {
        self.signing_key
    }

    /// The underlying key store, for credentials signed by a different principal
    pub fn raw(&self) -> &dyn Signer {
        self.signer.as_ref()
    }

    /// Builder preconfigured with this principal as issuer
    pub fn builder(&self, subject: PublicKey, assertion: Assertion) -> CredentialBuilder {
        let builder = CredentialBuilder::new(self.issuer, subject, assertion);
        match &self.chain {
            Some(chain) => builder.signing_key(self.signing_key).chain(chain.clone()),
            None => builder,
        }
    }

    pub fn issue(&self, subject: PublicKey, assertion: Assertion) -> Result<Credential, CredentialError> {
        self.builder(subject, assertion).sign(self.signer.as_ref())
    }

    pub fn sign_builder(&self, builder: CredentialBuilder) -> Result<Credential, CredentialError> {
        builder.sign(self.signer.as_ref())
    }
}

impl std::fmt::Debug for CredentialSigner {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialSigner")
            .field("issuer", &self.issuer)
            .field("signing_key", &self.signing_key)
            .field("delegated", &self.chain.is_some())
            .finish()
    }
}
