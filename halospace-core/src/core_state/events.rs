//! Space change notifications
//!
//! State machines emit after mutating and before returning to the caller, so a subscriber
//! that reads state on receipt sees at least the change it was told about.

use crate::core_credentials::{FeedDesignation, SpaceRole};
use crate::core_keys::PublicKey;
use tokio::sync::broadcast;

/// Events emitted while processing space credentials
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SpaceEvent {
    MemberAdmitted {
        member: PublicKey,
        role: SpaceRole,
    },
    MemberRoleChanged {
        member: PublicKey,
        previous: SpaceRole,
        role: SpaceRole,
    },
    MemberProfileUpdated {
        member: PublicKey,
    },
    /// Admitting credential was revoked
    MemberRemoved {
        member: PublicKey,
    },
    FeedAdmitted {
        feed: PublicKey,
        parent: PublicKey,
        designation: FeedDesignation,
    },
    InvitationOutstanding {
        credential_id: PublicKey,
        invitation_id: String,
    },
    InvitationRemoved {
        credential_id: PublicKey,
    },
    CredentialProcessed {
        credential_id: PublicKey,
        type_name: &'static str,
        sequence: usize,
    },
}

impl SpaceEvent {
    /// Key of the entity the event is about
    pub fn key(&self) -> &PublicKey {
        match self {
            SpaceEvent::MemberAdmitted { member, .. }
            | SpaceEvent::MemberRoleChanged { member, .. }
            | SpaceEvent::MemberProfileUpdated { member }
            | SpaceEvent::MemberRemoved { member } => member,
            SpaceEvent::FeedAdmitted { feed, .. } => feed,
            SpaceEvent::InvitationOutstanding { credential_id, .. }
            | SpaceEvent::InvitationRemoved { credential_id }
            | SpaceEvent::CredentialProcessed { credential_id, .. } => credential_id,
        }
    }
}

/// Fan-out of [`SpaceEvent`]s over a tokio broadcast channel
///
/// Slow subscribers lag and lose the oldest events; state machines never block on them.
#[derive(Clone)]
pub struct EventBroadcaster {
    tx: broadcast::Sender<SpaceEvent>,
}

impl EventBroadcaster {
    /// # Arguments
    /// * `capacity` - Number of events buffered per subscriber, at least one
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Returns the number of subscribers that received the event
    pub fn emit(&self, event: SpaceEvent) -> usize {
        self.tx.send(event).unwrap_or(0)
    }

    pub fn subscribe(&self) -> broadcast::Receiver<SpaceEvent> {
        self.tx.subscribe()
    }

    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl Default for EventBroadcaster {
    fn default() -> Self {
        Self::new(100)
    }
}

impl std::fmt::Debug for EventBroadcaster {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EventBroadcaster").field("subscribers", &self.subscriber_count()).finish()
    }
}
