//! Shared, serialized access to a space

use super::credential_consumer::{ConsumerId, CredentialProcessor};
use super::events::{EventBroadcaster, SpaceEvent};
use super::space_state_machine::{ProcessOptions, SpaceStateMachine};
use super::StateMachineError;
use crate::core_credentials::Credential;
use crate::core_keys::PublicKey;
use std::sync::Arc;
use tokio::sync::{broadcast, Mutex};

/// Cloneable handle to a [`SpaceStateMachine`].
///
/// Calls queue on a tokio mutex, so each `process` runs to completion, consumer dispatch
/// included, before the next one starts, whichever feed it came from.
#[derive(Clone)]
pub struct SpaceHandle {
    space_key: PublicKey,
    inner: Arc<Mutex<SpaceStateMachine>>,
    events: EventBroadcaster,
}

impl SpaceHandle {
    pub fn new(machine: SpaceStateMachine) -> Self {
        let events = machine.events().clone();
        Self { space_key: machine.space_key(), inner: Arc::new(Mutex::new(machine)), events }
    }

    pub fn space_key(&self) -> PublicKey {
        self.space_key
    }

    pub async fn process(&self, credential: Credential, options: ProcessOptions) -> Result<bool, StateMachineError> {
        self.inner.lock().await.process(credential, options).await
    }

    /// Process credentials from one feed in order; returns how many were applied
    pub async fn process_all(
        &self,
        credentials: impl IntoIterator<Item = Credential>,
        options: ProcessOptions,
    ) -> Result<usize, StateMachineError> {
        let mut machine = self.inner.lock().await;
        let mut applied = 0;
        for credential in credentials {
            if machine.process(credential, options).await? {
                applied += 1;
            }
        }
        Ok(applied)
    }

    pub async fn add_credential_processor(&self, processor: Arc<dyn CredentialProcessor>) -> ConsumerId {
        self.inner.lock().await.add_credential_processor(processor)
    }

    pub async fn remove_credential_processor(&self, id: ConsumerId) -> Result<(), StateMachineError> {
        self.inner.lock().await.remove_credential_processor(id)
    }

    pub async fn on_revoked(&self, revoked: &Credential, revocation: &Credential) -> Result<(), StateMachineError> {
        self.inner.lock().await.on_revoked(revoked, revocation)
    }

    /// Read the state under the lock
    pub async fn with_state<R>(&self, f: impl FnOnce(&SpaceStateMachine) -> R) -> R {
        f(&*self.inner.lock().await)
    }

    /// Subscribe without taking the lock
    pub fn subscribe(&self) -> broadcast::Receiver<SpaceEvent> {
        self.events.subscribe()
    }
}

impl std::fmt::Debug for SpaceHandle {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SpaceHandle").field("space_key", &self.space_key).finish()
    }
}
