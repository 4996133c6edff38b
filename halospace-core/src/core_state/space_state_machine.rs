//! Space state machine
//!
//! Verifies, authorizes and dispatches every credential of a space, keeps the ordered
//! credential log and feeds it to registered consumers.
//!
//! `process` has one suspension point, verification. Everything after it runs without
//! awaiting, so an append can never interleave with consumer registration.

use super::credential_consumer::{ConsumerId, CredentialConsumer, CredentialProcessor};
use super::events::{EventBroadcaster, SpaceEvent};
use super::feed_state_machine::{FeedInfo, FeedStateMachine};
use super::invitation_state_machine::InvitationStateMachine;
use super::member_state_machine::{MemberInfo, MemberStateMachine};
use super::StateMachineError;
use crate::config::SpaceConfig;
use crate::core_credentials::{
    credential_id, Assertion, Credential, CredentialVerifier, DelegateSpaceInvitation,
    SignatureVerifier, SpaceRole, TrustingVerifier, VerificationResult,
};
use crate::core_keys::PublicKey;
use crate::metrics::{record_counter, record_gauge, Timer};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, trace, warn, Instrument};

/// An applied credential and where it was read from
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialEntry {
    pub credential: Credential,
    pub source_feed: PublicKey,
    pub revoked: bool,
}

/// Per-call options for [`SpaceStateMachine::process`]
#[derive(Debug, Clone, Copy)]
pub struct ProcessOptions {
    pub source_feed: PublicKey,
    /// Trust the credential without verifying its proof
    pub skip_verification: bool,
}

impl ProcessOptions {
    pub fn from_feed(source_feed: PublicKey) -> Self {
        Self { source_feed, skip_verification: false }
    }

    pub fn skip_verification(mut self) -> Self {
        self.skip_verification = true;
        self
    }
}

pub struct SpaceStateMachine {
    space_key: PublicKey,
    verifier: Arc<dyn CredentialVerifier>,
    genesis: Option<Credential>,
    members: MemberStateMachine,
    feeds: FeedStateMachine,
    invitations: InvitationStateMachine,
    log: Vec<CredentialEntry>,
    index: HashMap<PublicKey, usize>,
    consumers: Vec<CredentialConsumer>,
    next_consumer_id: u64,
    events: EventBroadcaster,
}

impl SpaceStateMachine {
    /// Space verified with the default [`SignatureVerifier`]
    pub fn new(space_key: PublicKey) -> Self {
        Self::with_verifier(space_key, Arc::new(SignatureVerifier::new()), EventBroadcaster::default())
    }

    pub fn from_config(space_key: PublicKey, config: &SpaceConfig) -> Self {
        let verifier: Arc<dyn CredentialVerifier> = if config.verify_credentials {
            Arc::new(SignatureVerifier::with_max_chain_depth(config.max_chain_depth))
        } else {
            Arc::new(TrustingVerifier)
        };
        Self::with_verifier(space_key, verifier, EventBroadcaster::new(config.event_capacity))
    }

    pub fn with_verifier(
        space_key: PublicKey,
        verifier: Arc<dyn CredentialVerifier>,
        events: EventBroadcaster,
    ) -> Self {
        Self {
            space_key,
            verifier,
            genesis: None,
            members: MemberStateMachine::new(space_key, events.clone()),
            feeds: FeedStateMachine::new(space_key, events.clone()),
            invitations: InvitationStateMachine::new(events.clone()),
            log: Vec::new(),
            index: HashMap::new(),
            consumers: Vec::new(),
            next_consumer_id: 0,
            events,
        }
    }

    /// Verify, authorize and apply one credential.
    ///
    /// `Ok(true)` when applied or already seen, `Ok(false)` when rejected. Rejected
    /// credentials are neither stored nor forwarded. `Err` only for broken invariants.
    pub async fn process(
        &mut self,
        credential: Credential,
        options: ProcessOptions,
    ) -> Result<bool, StateMachineError> {
        let span = tracing::debug_span!(
            "space_process",
            space_key = %self.space_key.truncate(),
            credential_type = credential.type_name(),
        );
        let timer = Timer::new("space.process.duration_ms");
        let result = self.process_inner(credential, options).instrument(span).await;
        timer.stop();
        result
    }

    async fn process_inner(
        &mut self,
        mut credential: Credential,
        options: ProcessOptions,
    ) -> Result<bool, StateMachineError> {
        if let Some(id) = &credential.id {
            if self.index.contains_key(id) {
                trace!(credential_id = %id.truncate(), "Credential already processed");
                record_counter("space.credentials.duplicate", 1);
                return Ok(true);
            }
        }

        if !options.skip_verification {
            if let VerificationResult::Fail { errors } = self.verifier.verify(&credential).await {
                return Ok(self.reject(&credential, &format!("verification failed: {}", errors.join("; "))));
            }
        }

        let id = match credential_id(&credential) {
            Ok(id) => id,
            Err(e) => return Ok(self.reject(&credential, &e.to_string())),
        };
        match credential.id {
            Some(declared) if declared != id => {
                return Ok(self.reject(&credential, "declared id does not match content"));
            }
            Some(_) => {}
            None => {
                if self.index.contains_key(&id) {
                    record_counter("space.credentials.duplicate", 1);
                    return Ok(true);
                }
                credential.id = Some(id);
            }
        }

        if !self.dispatch(&credential, options.source_feed)? {
            return Ok(false);
        }

        let sequence = self.log.len();
        self.index.insert(id, sequence);
        self.log.push(CredentialEntry { credential, source_feed: options.source_feed, revoked: false });
        self.forward(sequence);

        let type_name = self.log[sequence].credential.type_name();
        debug!(credential_id = %id.truncate(), sequence, "Credential applied");
        self.events.emit(SpaceEvent::CredentialProcessed { credential_id: id, type_name, sequence });
        record_counter("space.credentials.processed", 1);
        record_gauge("space.credentials.log_size", self.log.len() as f64);
        Ok(true)
    }

    /// Type dispatch with authorization. Returns whether the credential was applied.
    fn dispatch(&mut self, credential: &Credential, source_feed: PublicKey) -> Result<bool, StateMachineError> {
        match &credential.assertion {
            Assertion::SpaceGenesis(assertion) => {
                if self.genesis.is_some() {
                    return Ok(self.reject(credential, "space already has a genesis credential"));
                }
                if credential.issuer != self.space_key
                    || credential.subject != self.space_key
                    || assertion.space_key != self.space_key
                {
                    return Ok(self.reject(credential, "genesis must be issued by and for the space key"));
                }
                self.genesis = Some(credential.clone());
                Ok(true)
            }
            Assertion::SpaceMember(assertion) => {
                if !self.require_genesis(credential) {
                    return Ok(false);
                }
                if assertion.space_key != self.space_key {
                    return Ok(self.reject(credential, "member credential for a different space"));
                }
                if !self.can_admit_members(&credential.issuer) {
                    return Ok(self.reject(credential, "issuer cannot admit members"));
                }
                if !self.members.process(credential)? {
                    return Ok(false);
                }
                self.invitations.process(credential)?;
                Ok(true)
            }
            Assertion::MemberProfile(_) => {
                if !self.require_genesis(credential) {
                    return Ok(false);
                }
                self.members.process(credential)
            }
            Assertion::AdmittedFeed(_) => {
                if !self.require_genesis(credential) {
                    return Ok(false);
                }
                if !self.can_admit_feeds(&credential.issuer) {
                    return Ok(self.reject(credential, "issuer cannot admit feeds"));
                }
                self.feeds.process(credential, source_feed)
            }
            Assertion::DelegateSpaceInvitation(_) | Assertion::CancelDelegatedInvitation(_) => {
                if !self.require_genesis(credential) {
                    return Ok(false);
                }
                if !self.can_admit_members(&credential.issuer) {
                    return Ok(self.reject(credential, "issuer cannot manage invitations"));
                }
                self.invitations.process(credential)?;
                Ok(true)
            }
            other => {
                if !self.require_genesis(credential) {
                    return Ok(false);
                }
                trace!(credential_type = other.type_name(), "Credential type not interpreted by the space");
                Ok(true)
            }
        }
    }

    fn require_genesis(&self, credential: &Credential) -> bool {
        if self.genesis.is_some() {
            return true;
        }
        self.reject(credential, "space genesis not yet processed")
    }

    fn can_admit_members(&self, issuer: &PublicKey) -> bool {
        *issuer == self.space_key || self.members.effective_role(issuer).can_admit_members()
    }

    fn can_admit_feeds(&self, issuer: &PublicKey) -> bool {
        *issuer == self.space_key || self.members.effective_role(issuer).can_admit_feeds()
    }

    /// Logs the rejection and returns false
    fn reject(&self, credential: &Credential, reason: &str) -> bool {
        warn!(
            credential_type = credential.type_name(),
            issuer = %credential.issuer.truncate(),
            subject = %credential.subject.truncate(),
            reason,
            "Credential rejected"
        );
        record_counter("space.credentials.rejected", 1);
        false
    }

    /// Push `log[sequence]` to every live consumer, dropping consumers whose task stopped
    fn forward(&mut self, sequence: usize) {
        let credential = &self.log[sequence].credential;
        let mut failed = Vec::new();
        for consumer in self.consumers.iter().filter(|c| c.is_live()) {
            if !consumer.push(credential) {
                failed.push(consumer.id());
            }
        }
        for id in failed {
            warn!(consumer = %id, "Dropping stopped credential consumer");
            self.close_consumer(id);
        }
    }

    /// Register a processor: it receives the whole log in order, then every later credential.
    ///
    /// Must be called within a tokio runtime.
    pub fn add_credential_processor(&mut self, processor: Arc<dyn CredentialProcessor>) -> ConsumerId {
        let id = ConsumerId(self.next_consumer_id);
        self.next_consumer_id += 1;

        let mut consumer = CredentialConsumer::spawn(id, processor);
        for entry in &self.log {
            if !consumer.push(&entry.credential) {
                break;
            }
        }
        consumer.set_live();
        debug!(consumer = %id, backlog = self.log.len(), "Credential consumer registered");

        self.consumers.push(consumer);
        record_gauge("space.consumers.active", self.consumers.len() as f64);
        id
    }

    /// Stop delivering to a consumer; in-flight credentials are abandoned
    pub fn remove_credential_processor(&mut self, id: ConsumerId) -> Result<(), StateMachineError> {
        if self.close_consumer(id) {
            Ok(())
        } else {
            Err(StateMachineError::UnknownConsumer(id))
        }
    }

    fn close_consumer(&mut self, id: ConsumerId) -> bool {
        let Some(position) = self.consumers.iter().position(|c| c.id() == id) else {
            return false;
        };
        self.consumers.remove(position).close();
        record_gauge("space.consumers.active", self.consumers.len() as f64);
        true
    }

    /// Mark `revoked` as revoked by `revocation`. Log entries are never removed.
    pub fn on_revoked(&mut self, revoked: &Credential, revocation: &Credential) -> Result<(), StateMachineError> {
        let id = match revoked.id {
            Some(id) => id,
            None => credential_id(revoked).map_err(|_| StateMachineError::MissingCredentialId)?,
        };
        let sequence = *self.index.get(&id).ok_or(StateMachineError::UnknownCredential(id))?;

        let entry = &mut self.log[sequence];
        entry.revoked = true;
        debug!(
            credential_id = %id.truncate(),
            revocation = ?revocation.id.map(|id| id.truncate()),
            "Credential revoked"
        );

        if let Assertion::SpaceMember(_) = &entry.credential.assertion {
            let subject = entry.credential.subject;
            self.members.mark_removed(&subject);
        }
        Ok(())
    }

    pub fn space_key(&self) -> PublicKey {
        self.space_key
    }

    pub fn genesis_credential(&self) -> Option<&Credential> {
        self.genesis.as_ref()
    }

    pub fn members(&self) -> &HashMap<PublicKey, MemberInfo> {
        self.members.members()
    }

    pub fn member(&self, key: &PublicKey) -> Option<&MemberInfo> {
        self.members.member(key)
    }

    pub fn creator(&self) -> Option<&MemberInfo> {
        self.members.creator()
    }

    pub fn get_role(&self, key: &PublicKey) -> Option<SpaceRole> {
        self.members.get_role(key)
    }

    /// Parents for the next member credential issued in this space
    pub fn member_leaf_ids(&self) -> Vec<PublicKey> {
        self.members.leaf_ids()
    }

    pub fn feeds(&self) -> &HashMap<PublicKey, FeedInfo> {
        self.feeds.feeds()
    }

    pub fn feed(&self, key: &PublicKey) -> Option<&FeedInfo> {
        self.feeds.feed(key)
    }

    /// Outstanding invitations, keyed by delegating credential id
    pub fn invitations(&self) -> &HashMap<PublicKey, DelegateSpaceInvitation> {
        self.invitations.invitations()
    }

    /// Applied credentials in log order
    pub fn credentials(&self) -> &[CredentialEntry] {
        &self.log
    }

    pub fn credential(&self, id: &PublicKey) -> Option<&CredentialEntry> {
        self.index.get(id).map(|&sequence| &self.log[sequence])
    }

    pub fn is_processed(&self, id: &PublicKey) -> bool {
        self.index.contains_key(id)
    }

    pub fn consumer_count(&self) -> usize {
        self.consumers.len()
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpaceEvent> {
        self.events.subscribe()
    }

    pub(crate) fn events(&self) -> &EventBroadcaster {
        &self.events
    }
}

impl Drop for SpaceStateMachine {
    fn drop(&mut self) {
        for consumer in self.consumers.drain(..) {
            consumer.close();
        }
    }
}
