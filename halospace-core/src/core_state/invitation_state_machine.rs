//! Delegated invitations
//!
//! Delegation, redemption and cancellation of one invitation can be written by different
//! peers and arrive in any order. Cancellation and single-use redemption are remembered
//! even for invitations never seen, so a delegation arriving late cannot resurrect them.

use super::events::{EventBroadcaster, SpaceEvent};
use super::StateMachineError;
use crate::core_credentials::{now_millis, Assertion, Credential, DelegateSpaceInvitation};
use crate::core_keys::PublicKey;
use std::collections::{HashMap, HashSet};
use tracing::{debug, warn};

pub struct InvitationStateMachine {
    /// Keyed by the id of the delegating credential
    invitations: HashMap<PublicKey, DelegateSpaceInvitation>,
    cancelled: HashSet<PublicKey>,
    redeemed: HashSet<PublicKey>,
    events: EventBroadcaster,
}

impl InvitationStateMachine {
    pub fn new(events: EventBroadcaster) -> Self {
        Self {
            invitations: HashMap::new(),
            cancelled: HashSet::new(),
            redeemed: HashSet::new(),
            events,
        }
    }

    pub fn process(&mut self, credential: &Credential) -> Result<(), StateMachineError> {
        self.process_at(credential, now_millis())
    }

    /// Like [`process`](Self::process), with expiry evaluated at `now` (ms since epoch)
    pub fn process_at(&mut self, credential: &Credential, now: u64) -> Result<(), StateMachineError> {
        match &credential.assertion {
            Assertion::DelegateSpaceInvitation(invitation) => {
                let id = credential.id.ok_or(StateMachineError::MissingCredentialId)?;
                self.delegate(id, invitation, now);
            }
            Assertion::CancelDelegatedInvitation(cancel) => self.cancel(cancel.credential_id),
            Assertion::SpaceMember(member) => {
                if let Some(id) = member.invitation_credential_id {
                    self.redeem(id);
                }
            }
            other => {
                return Err(StateMachineError::UnexpectedAssertion {
                    machine: "invitation",
                    type_name: other.type_name(),
                })
            }
        }
        Ok(())
    }

    fn delegate(&mut self, id: PublicKey, invitation: &DelegateSpaceInvitation, now: u64) {
        if self.cancelled.contains(&id) {
            debug!(invitation = %id.truncate(), "Delegation of a cancelled invitation ignored");
            return;
        }
        if self.redeemed.contains(&id) && !invitation.multi_use {
            debug!(invitation = %id.truncate(), "Delegation of a redeemed invitation ignored");
            return;
        }
        if invitation.is_expired_at(now) {
            warn!(invitation = %id.truncate(), expires_on = ?invitation.expires_on, "Invitation already expired");
            return;
        }
        if self.invitations.contains_key(&id) {
            return;
        }

        self.invitations.insert(id, invitation.clone());
        self.events.emit(SpaceEvent::InvitationOutstanding {
            credential_id: id,
            invitation_id: invitation.invitation_id.clone(),
        });
    }

    fn cancel(&mut self, id: PublicKey) {
        self.cancelled.insert(id);
        if self.invitations.remove(&id).is_some() {
            debug!(invitation = %id.truncate(), "Invitation cancelled");
            self.events.emit(SpaceEvent::InvitationRemoved { credential_id: id });
        }
    }

    fn redeem(&mut self, id: PublicKey) {
        self.redeemed.insert(id);
        let single_use = self.invitations.get(&id).is_some_and(|invitation| !invitation.multi_use);
        if single_use {
            self.invitations.remove(&id);
            debug!(invitation = %id.truncate(), "Invitation redeemed");
            self.events.emit(SpaceEvent::InvitationRemoved { credential_id: id });
        }
    }

    /// Outstanding invitations, keyed by delegating credential id
    pub fn invitations(&self) -> &HashMap<PublicKey, DelegateSpaceInvitation> {
        &self.invitations
    }

    pub fn is_cancelled(&self, id: &PublicKey) -> bool {
        self.cancelled.contains(id)
    }

    pub fn is_redeemed(&self, id: &PublicKey) -> bool {
        self.redeemed.contains(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_credentials::{
        AuthMethod, CancelDelegatedInvitation, CredentialBuilder, SpaceMember, SpaceRole,
    };
    use crate::core_keys::Keyring;

    struct Harness {
        keyring: Keyring,
        admin: PublicKey,
        space_key: PublicKey,
        machine: InvitationStateMachine,
    }

    fn harness() -> Harness {
        let keyring = Keyring::new();
        let admin = keyring.create_key().unwrap();
        Harness { keyring, admin, space_key: PublicKey::random(), machine: InvitationStateMachine::new(EventBroadcaster::default()) }
    }

    impl Harness {
        fn delegation(&self, multi_use: bool, expires_on: Option<u64>) -> Credential {
            CredentialBuilder::new(
                self.admin,
                self.space_key,
                Assertion::DelegateSpaceInvitation(DelegateSpaceInvitation {
                    invitation_id: "X".to_string(),
                    swarm_key: PublicKey::random(),
                    role: SpaceRole::Admin,
                    auth_method: AuthMethod::KnownPublicKey,
                    multi_use,
                    expires_on,
                    guest_key: None,
                }),
            )
            .sign(&self.keyring)
            .unwrap()
        }

        fn cancellation(&self, invitation: &Credential) -> Credential {
            CredentialBuilder::new(
                self.admin,
                self.space_key,
                Assertion::CancelDelegatedInvitation(CancelDelegatedInvitation {
                    credential_id: invitation.id.unwrap(),
                }),
            )
            .sign(&self.keyring)
            .unwrap()
        }

        fn admission(&self, invitation: &Credential) -> Credential {
            CredentialBuilder::new(
                self.admin,
                PublicKey::random(),
                Assertion::SpaceMember(SpaceMember {
                    space_key: self.space_key,
                    role: SpaceRole::Admin,
                    profile: None,
                    genesis_feed_key: PublicKey::random(),
                    invitation_credential_id: invitation.id,
                }),
            )
            .sign(&self.keyring)
            .unwrap()
        }

        fn apply(&mut self, credential: &Credential) {
            self.machine.process(credential).unwrap();
        }

        fn outstanding(&self, invitation: &Credential) -> bool {
            self.machine.invitations().contains_key(&invitation.id.unwrap())
        }
    }

    #[test]
    fn test_delegate() {
        let mut h = harness();
        let invitation = h.delegation(false, None);
        let mut events = h.machine.events.subscribe();
        h.apply(&invitation);

        assert!(h.outstanding(&invitation));
        assert!(matches!(events.try_recv().unwrap(), SpaceEvent::InvitationOutstanding { .. }));
    }

    #[test]
    fn test_delegate_then_cancel() {
        let mut h = harness();
        let invitation = h.delegation(false, None);
        h.apply(&invitation);
        h.apply(&h.cancellation(&invitation));

        assert!(!h.outstanding(&invitation));
        assert!(h.machine.is_cancelled(&invitation.id.unwrap()));
    }

    #[test]
    fn test_cancel_before_delegate() {
        let mut h = harness();
        let invitation = h.delegation(false, None);
        h.apply(&h.cancellation(&invitation));
        h.apply(&invitation);

        assert!(!h.outstanding(&invitation));
    }

    #[test]
    fn test_single_use_redeemed_twice() {
        let mut h = harness();
        let invitation = h.delegation(false, None);
        h.apply(&invitation);
        h.apply(&h.admission(&invitation));
        assert!(!h.outstanding(&invitation));

        h.apply(&h.admission(&invitation));
        assert!(!h.outstanding(&invitation));
        assert!(h.machine.is_redeemed(&invitation.id.unwrap()));
    }

    #[test]
    fn test_multi_use_redeemed_twice() {
        let mut h = harness();
        let invitation = h.delegation(true, None);
        h.apply(&invitation);
        h.apply(&h.admission(&invitation));
        h.apply(&h.admission(&invitation));

        assert!(h.outstanding(&invitation));
    }

    #[test]
    fn test_redeem_before_delegate() {
        let mut h = harness();
        let invitation = h.delegation(false, None);
        h.apply(&h.admission(&invitation));
        h.apply(&invitation);

        assert!(!h.outstanding(&invitation));
    }

    #[test]
    fn test_expired_delegation() {
        let mut h = harness();
        let invitation = h.delegation(false, Some(now_millis() - 1_000));
        h.apply(&invitation);
        assert!(!h.outstanding(&invitation));

        let valid = h.delegation(false, Some(10_000));
        h.machine.process_at(&valid, 5_000).unwrap();
        assert!(h.outstanding(&valid));
    }

    #[test]
    fn test_missing_id_is_an_error() {
        let mut h = harness();
        let mut invitation = h.delegation(false, None);
        invitation.id = None;
        assert!(matches!(h.machine.process(&invitation), Err(StateMachineError::MissingCredentialId)));
    }
}
