//! Credential state machines
//!
//! [`SpaceStateMachine`] owns the credential log of one space and the member, feed and
//! invitation machines derived from it. Sub-machines only see what the orchestrator hands
//! them and never reference each other.
//!
//! [`DeviceStateMachine`] and [`ProfileStateMachine`] read an identity's HALO space. They
//! are [`CredentialProcessor`]s and attach to that space as consumers.

mod credential_consumer;
mod credential_graph;
mod device_state_machine;
mod events;
mod feed_state_machine;
mod handle;
mod invitation_state_machine;
mod member_state_machine;
mod profile_state_machine;
mod space_state_machine;

pub use credential_consumer::{ConsumerId, CredentialProcessor, ProcessorError};
pub use credential_graph::{Causality, CredentialGraph, Vertex, VertexId};
pub use device_state_machine::DeviceStateMachine;
pub use events::{EventBroadcaster, SpaceEvent};
pub use feed_state_machine::{FeedInfo, FeedStateMachine};
pub use handle::SpaceHandle;
pub use invitation_state_machine::InvitationStateMachine;
pub use member_state_machine::{MemberInfo, MemberStateMachine};
pub use profile_state_machine::ProfileStateMachine;
pub use space_state_machine::{CredentialEntry, ProcessOptions, SpaceStateMachine};

use crate::core_keys::PublicKey;
use thiserror::Error;

/// Broken invariants. Bad input is never reported here; it is rejected and logged.
#[derive(Debug, Error)]
pub enum StateMachineError {
    #[error("{machine} state machine cannot process {type_name} credentials")]
    UnexpectedAssertion { machine: &'static str, type_name: &'static str },

    #[error("Credential {0} is not in the space log")]
    UnknownCredential(PublicKey),

    #[error("Credential has no id")]
    MissingCredentialId,

    #[error("Unknown credential consumer: {0}")]
    UnknownConsumer(ConsumerId),
}
