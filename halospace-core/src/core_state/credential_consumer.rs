//! Credential consumers
//!
//! A consumer owns an unbounded queue and a task draining it into a
//! [`CredentialProcessor`]. The space pushes its backlog and, once live, every new
//! credential onto the queue without awaiting, so a slow processor never stalls
//! ingestion and always sees credentials in log order.

use crate::core_credentials::Credential;
use async_trait::async_trait;
use std::fmt;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tracing::{debug, error};

/// Failure reported by a processor; tears down that consumer only
#[derive(Debug, Error)]
pub enum ProcessorError {
    #[error("Processor invariant violated: {0}")]
    Invariant(String),

    #[error("Processor failed: {0}")]
    Other(String),
}

/// Receives the full credential history of a space, then live credentials.
///
/// Credentials the processor does not understand must be ignored, not reported.
#[async_trait]
pub trait CredentialProcessor: Send + Sync {
    async fn process_credential(&self, credential: &Credential) -> Result<(), ProcessorError>;
}

/// Handle for a registered consumer
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ConsumerId(pub(crate) u64);

impl fmt::Display for ConsumerId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "consumer-{}", self.0)
    }
}

pub(crate) struct CredentialConsumer {
    id: ConsumerId,
    tx: mpsc::UnboundedSender<Credential>,
    task: JoinHandle<()>,
    /// Backlog has been queued; new credentials may follow
    live: bool,
}

impl CredentialConsumer {
    /// Spawns the draining task on the current tokio runtime
    pub(crate) fn spawn(id: ConsumerId, processor: Arc<dyn CredentialProcessor>) -> Self {
        let (tx, mut rx) = mpsc::unbounded_channel::<Credential>();
        let task = tokio::spawn(async move {
            while let Some(credential) = rx.recv().await {
                if let Err(e) = processor.process_credential(&credential).await {
                    error!(consumer = %id, error = %e, "Credential processor failed, closing consumer");
                    crate::metrics::record_counter("space.consumers.failed", 1);
                    return;
                }
            }
            debug!(consumer = %id, "Consumer queue closed");
        });

        Self { id, tx, task, live: false }
    }

    pub(crate) fn id(&self) -> ConsumerId {
        self.id
    }

    pub(crate) fn is_live(&self) -> bool {
        self.live
    }

    pub(crate) fn set_live(&mut self) {
        self.live = true;
    }

    /// Queue a credential. Returns false once the draining task has stopped.
    pub(crate) fn push(&self, credential: &Credential) -> bool {
        !self.task.is_finished() && self.tx.send(credential.clone()).is_ok()
    }

    /// Stop delivery; queued credentials are dropped
    pub(crate) fn close(self) {
        self.task.abort();
    }
}

impl fmt::Debug for CredentialConsumer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CredentialConsumer").field("id", &self.id).field("live", &self.live).finish()
    }
}
