//! Space roster
//!
//! One [`MemberInfo`] per identity ever admitted. A later `SpaceMember` credential for the
//! same subject replaces its role, subject to three rules: the issuer must be able to admit
//! members, the space creator keeps `OWNER`, and nobody changes their own role.
//!
//! Member credentials form a [`CredentialGraph`] through their parent references. While the
//! graph is a single chain each credential is applied on top of the current roster. Once it
//! forks, the roster is recomputed from the whole graph: credentials are replayed in causal
//! order, and anything issued by a member on a branch concurrent with that member's removal
//! is discarded, along with whatever depended on it.

use super::credential_graph::{Causality, CredentialGraph, VertexId};
use super::events::{EventBroadcaster, SpaceEvent};
use super::StateMachineError;
use crate::core_credentials::{Assertion, Credential, ProfileDocument, SpaceMember, SpaceRole};
use crate::core_keys::PublicKey;
use std::collections::{HashMap, HashSet};
use tracing::{debug, trace, warn};

/// A member of the space
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MemberInfo {
    pub key: PublicKey,
    /// Latest applied `SpaceMember` credential
    pub credential: Credential,
    pub assertion: SpaceMember,
    /// Admitting credential was revoked, or discarded in favour of a concurrent removal
    pub removed: bool,
    pub profile: Option<ProfileDocument>,
}

pub struct MemberStateMachine {
    space_key: PublicKey,
    members: HashMap<PublicKey, MemberInfo>,
    creator: Option<PublicKey>,
    graph: CredentialGraph,
    /// Members whose admission was revoked through [`mark_removed`](Self::mark_removed)
    revoked: HashSet<PublicKey>,
    events: EventBroadcaster,
}

/// Roster derived from the whole credential graph
struct Resolution {
    /// Subject to the vertex holding its current credential
    state: HashMap<PublicKey, VertexId>,
    accepted: HashSet<VertexId>,
    creator: Option<PublicKey>,
}

impl MemberStateMachine {
    pub fn new(space_key: PublicKey, events: EventBroadcaster) -> Self {
        Self {
            space_key,
            members: HashMap::new(),
            creator: None,
            graph: CredentialGraph::new(),
            revoked: HashSet::new(),
            events,
        }
    }

    /// Apply a `SpaceMember` or `MemberProfile` credential.
    ///
    /// Returns `Ok(false)` when the credential is not applicable to this roster.
    pub fn process(&mut self, credential: &Credential) -> Result<bool, StateMachineError> {
        match &credential.assertion {
            Assertion::SpaceMember(assertion) => self.process_member(credential, assertion),
            Assertion::MemberProfile(assertion) => {
                Ok(self.process_profile(credential, &assertion.profile))
            }
            other => Err(StateMachineError::UnexpectedAssertion {
                machine: "member",
                type_name: other.type_name(),
            }),
        }
    }

    fn process_member(&mut self, credential: &Credential, assertion: &SpaceMember) -> Result<bool, StateMachineError> {
        if assertion.space_key != self.space_key {
            warn!(
                subject = %credential.subject.truncate(),
                space_key = %assertion.space_key.truncate(),
                "Member credential for a different space"
            );
            return Ok(false);
        }

        let id = credential.id.ok_or(StateMachineError::MissingCredentialId)?;
        if self.graph.contains(&id) {
            trace!(credential_id = %id.truncate(), "Member credential already in the graph");
            return Ok(true);
        }

        let vertex = self.graph.insert(id, credential.clone());
        if self.graph.leaves().len() == 1 {
            let verdict = check_update(
                &self.space_key,
                self.creator.as_ref(),
                |key| self.effective_role(key),
                self.members.contains_key(&credential.subject),
                credential,
                assertion,
            );
            if let Err(reason) = verdict {
                self.graph.pop();
                warn!(
                    member = %credential.subject.truncate(),
                    issuer = %credential.issuer.truncate(),
                    reason,
                    "Member credential rejected"
                );
                return Ok(false);
            }
            self.apply(credential, assertion);
            return Ok(true);
        }

        let resolution = self.resolve();
        if !resolution.accepted.contains(&vertex) {
            self.graph.pop();
            warn!(
                member = %credential.subject.truncate(),
                issuer = %credential.issuer.truncate(),
                "Member credential not applicable on any branch"
            );
            return Ok(false);
        }
        debug!(credential_id = %id.truncate(), leaves = self.graph.leaves().len(), "Roster recomputed");
        self.commit(resolution);
        Ok(true)
    }

    /// Apply a credential that extends the only branch
    fn apply(&mut self, credential: &Credential, assertion: &SpaceMember) {
        let subject = credential.subject;
        self.revoked.remove(&subject);

        let Some(previous) = self.get_role(&subject) else {
            self.members.insert(
                subject,
                MemberInfo {
                    key: subject,
                    credential: credential.clone(),
                    assertion: assertion.clone(),
                    removed: false,
                    profile: assertion.profile.clone(),
                },
            );
            if self.creator.is_none() {
                debug!(member = %subject.truncate(), "Space creator admitted");
                self.creator = Some(subject);
            }
            debug!(member = %subject.truncate(), role = %assertion.role, "Member admitted");
            let role = self.effective_role(&subject);
            self.events.emit(SpaceEvent::MemberAdmitted { member: subject, role });
            return;
        };

        if let Some(existing) = self.members.get_mut(&subject) {
            existing.credential = credential.clone();
            existing.assertion = assertion.clone();
            existing.removed = false;
            if assertion.profile.is_some() {
                existing.profile = assertion.profile.clone();
            }
        }

        let role = self.effective_role(&subject);
        if previous == role {
            debug!(member = %subject.truncate(), %role, "Member readmitted with the same role");
        } else {
            debug!(member = %subject.truncate(), %previous, %role, "Member role changed");
            self.events.emit(SpaceEvent::MemberRoleChanged { member: subject, previous, role });
        }
    }

    /// Recompute the roster from every branch of the graph.
    ///
    /// Replays in causal order, then discards credentials whose issuer was removed on a
    /// concurrent branch and replays again, until the set of discarded credentials is stable.
    fn resolve(&self) -> Resolution {
        let order = self.graph.causal_order();
        let causality = self.graph.causality();
        let mut discarded = HashSet::new();
        let mut rounds = 0;
        loop {
            let resolution = self.replay(&order, &discarded);
            let next = self.concurrent_with_removals(&resolution, &causality);
            rounds += 1;
            if next == discarded {
                trace!(rounds, discarded = discarded.len(), "Roster resolution settled");
                return resolution;
            }
            if rounds > self.graph.len() {
                warn!(rounds, "Roster resolution did not settle");
                return resolution;
            }
            discarded = next;
        }
    }

    fn replay(&self, order: &[VertexId], discarded: &HashSet<VertexId>) -> Resolution {
        let mut state: HashMap<PublicKey, VertexId> = HashMap::new();
        let mut accepted = HashSet::new();
        let mut creator = self.creator;

        for &vertex in order {
            if discarded.contains(&vertex) {
                continue;
            }
            let credential = &self.graph.vertex(vertex).credential;
            let Assertion::SpaceMember(assertion) = &credential.assertion else {
                continue;
            };

            let verdict = check_update(
                &self.space_key,
                creator.as_ref(),
                |key| self.resolved_role(&state, creator.as_ref(), key),
                state.contains_key(&credential.subject),
                credential,
                assertion,
            );
            if verdict.is_err() {
                continue;
            }
            if creator.is_none() {
                creator = Some(credential.subject);
            }
            state.insert(credential.subject, vertex);
            accepted.insert(vertex);
        }

        Resolution { state, accepted, creator }
    }

    /// Credentials issued by a member concurrently with an accepted removal of that member
    fn concurrent_with_removals(&self, resolution: &Resolution, causality: &Causality) -> HashSet<VertexId> {
        let mut discarded = HashSet::new();
        for &removal in &resolution.accepted {
            if self.vertex_role(removal).can_admit_members() {
                continue;
            }
            let removed = self.graph.vertex(removal).credential.subject;
            for (vertex, candidate) in self.graph.vertices().iter().enumerate() {
                if candidate.credential.issuer == removed && causality.concurrent(vertex, removal) {
                    discarded.insert(vertex);
                }
            }
        }
        discarded
    }

    fn resolved_role(
        &self,
        state: &HashMap<PublicKey, VertexId>,
        creator: Option<&PublicKey>,
        key: &PublicKey,
    ) -> SpaceRole {
        let Some(&vertex) = state.get(key) else {
            return SpaceRole::Removed;
        };
        if self.revoked.contains(key) {
            SpaceRole::Removed
        } else if creator == Some(key) {
            SpaceRole::Owner
        } else {
            self.vertex_role(vertex)
        }
    }

    fn vertex_role(&self, vertex: VertexId) -> SpaceRole {
        match &self.graph.vertex(vertex).credential.assertion {
            Assertion::SpaceMember(assertion) => assertion.role,
            _ => SpaceRole::Removed,
        }
    }

    /// Replace the roster with a resolution and announce what changed
    fn commit(&mut self, resolution: Resolution) {
        let before: HashMap<PublicKey, SpaceRole> =
            self.members.keys().map(|key| (*key, self.effective_role(key))).collect();
        if self.creator.is_none() {
            self.creator = resolution.creator;
        }

        for member in self.members.values_mut() {
            if !resolution.state.contains_key(&member.key) {
                member.removed = true;
            }
        }
        for (subject, vertex) in &resolution.state {
            let credential = &self.graph.vertex(*vertex).credential;
            let Assertion::SpaceMember(assertion) = &credential.assertion else {
                continue;
            };
            let profile = assertion
                .profile
                .clone()
                .or_else(|| self.members.get(subject).and_then(|member| member.profile.clone()));
            let info = MemberInfo {
                key: *subject,
                credential: credential.clone(),
                assertion: assertion.clone(),
                removed: self.revoked.contains(subject),
                profile,
            };
            self.members.insert(*subject, info);
        }

        let mut keys: Vec<PublicKey> = self.members.keys().copied().collect();
        keys.sort();
        for member in keys {
            let role = self.effective_role(&member);
            match before.get(&member) {
                None => {
                    debug!(member = %member.truncate(), %role, "Member admitted");
                    self.events.emit(SpaceEvent::MemberAdmitted { member, role });
                }
                Some(&previous) if previous != role => {
                    let discarded = !resolution.state.contains_key(&member);
                    debug!(member = %member.truncate(), %previous, %role, discarded, "Member role changed");
                    if discarded {
                        self.events.emit(SpaceEvent::MemberRemoved { member });
                    } else {
                        self.events.emit(SpaceEvent::MemberRoleChanged { member, previous, role });
                    }
                }
                Some(_) => {}
            }
        }
    }

    fn process_profile(&mut self, credential: &Credential, profile: &ProfileDocument) -> bool {
        let subject = credential.subject;
        if credential.issuer != subject {
            warn!(member = %subject.truncate(), issuer = %credential.issuer.truncate(), "Profile issued by another principal");
            return false;
        }
        let Some(member) = self.members.get_mut(&subject) else {
            warn!(member = %subject.truncate(), "Profile update for unknown member");
            return false;
        };

        member.profile = Some(profile.clone());
        self.events.emit(SpaceEvent::MemberProfileUpdated { member: subject });
        true
    }

    /// Current role. `None` for identities never admitted.
    pub fn get_role(&self, key: &PublicKey) -> Option<SpaceRole> {
        let member = self.members.get(key)?;
        if member.removed {
            Some(SpaceRole::Removed)
        } else if self.creator.as_ref() == Some(key) {
            Some(SpaceRole::Owner)
        } else {
            Some(member.assertion.role)
        }
    }

    /// Role for authorization checks; unknown identities count as `REMOVED`
    pub fn effective_role(&self, key: &PublicKey) -> SpaceRole {
        self.get_role(key).unwrap_or(SpaceRole::Removed)
    }

    /// Flag a member whose admitting credential was revoked. Returns false for unknown keys.
    pub fn mark_removed(&mut self, key: &PublicKey) -> bool {
        match self.members.get_mut(key) {
            Some(member) => {
                member.removed = true;
                self.revoked.insert(*key);
                self.events.emit(SpaceEvent::MemberRemoved { member: *key });
                true
            }
            None => false,
        }
    }

    /// Ids of the member credentials no other member credential builds on; a new member
    /// credential lists them as its parents.
    pub fn leaf_ids(&self) -> Vec<PublicKey> {
        self.graph.leaf_ids()
    }

    pub fn members(&self) -> &HashMap<PublicKey, MemberInfo> {
        &self.members
    }

    pub fn member(&self, key: &PublicKey) -> Option<&MemberInfo> {
        self.members.get(key)
    }

    pub fn creator(&self) -> Option<&MemberInfo> {
        self.creator.as_ref().and_then(|key| self.members.get(key))
    }
}

/// Why `credential` cannot be applied to a roster described by `role_of`, if it cannot
fn check_update(
    space_key: &PublicKey,
    creator: Option<&PublicKey>,
    role_of: impl Fn(&PublicKey) -> SpaceRole,
    is_member: bool,
    credential: &Credential,
    assertion: &SpaceMember,
) -> Result<(), &'static str> {
    let subject = credential.subject;
    if credential.issuer != *space_key && !role_of(&credential.issuer).can_admit_members() {
        return Err("issuer cannot admit members");
    }
    if is_member && credential.issuer == subject {
        return Err("members cannot change their own role");
    }
    if creator == Some(&subject) && assertion.role != SpaceRole::Owner {
        return Err("space creator cannot be demoted");
    }
    Ok(())
}
