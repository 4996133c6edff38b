//! In-memory keyring
//!
//! Holds Ed25519 signing keys indexed by their public key. The credential layer only
//! depends on the [`Signer`] trait, so a hardware or remote signer can stand in.

use super::{KeyError, PublicKey};
use ed25519_dalek::{Signature, Signer as _, SigningKey, Verifier, VerifyingKey};
use std::collections::HashMap;
use std::sync::{Arc, PoisonError, RwLock};

/// Produces signatures on behalf of a key
pub trait Signer: Send + Sync {
    /// Sign `payload` with the secret half of `key`
    fn sign(&self, key: &PublicKey, payload: &[u8]) -> Result<Vec<u8>, KeyError>;
}

fn handle_poison<T>(_err: PoisonError<T>) -> KeyError {
    KeyError::Other("Lock poisoned: a thread panicked while holding the lock".to_string())
}

/// In-memory keyring (non-persistent)
#[derive(Clone, Default)]
pub struct Keyring {
    keys: Arc<RwLock<HashMap<PublicKey, SigningKey>>>,
}

impl Keyring {
    /// Create an empty keyring
    pub fn new() -> Self {
        Self::default()
    }

    /// Generate a new Ed25519 key and return its public half
    pub fn create_key(&self) -> Result<PublicKey, KeyError> {
        use rand::RngCore;
        let mut seed = [0u8; 32];
        rand::rng().fill_bytes(&mut seed);

        let signing_key = SigningKey::from_bytes(&seed);
        let public = PublicKey::from_bytes(signing_key.verifying_key().to_bytes());

        self.keys.write().map_err(handle_poison)?.insert(public, signing_key);
        Ok(public)
    }

    /// Import a key from its 32-byte secret seed
    pub fn import_seed(&self, seed: &[u8; 32]) -> Result<PublicKey, KeyError> {
        let signing_key = SigningKey::from_bytes(seed);
        let public = PublicKey::from_bytes(signing_key.verifying_key().to_bytes());
        self.keys.write().map_err(handle_poison)?.insert(public, signing_key);
        Ok(public)
    }

    /// Whether the keyring can sign for `key`
    pub fn contains(&self, key: &PublicKey) -> bool {
        self.keys.read().map(|keys| keys.contains_key(key)).unwrap_or(false)
    }

    /// List all public keys held
    pub fn list(&self) -> Result<Vec<PublicKey>, KeyError> {
        Ok(self.keys.read().map_err(handle_poison)?.keys().copied().collect())
    }
}

impl Signer for Keyring {
    fn sign(&self, key: &PublicKey, payload: &[u8]) -> Result<Vec<u8>, KeyError> {
        let keys = self.keys.read().map_err(handle_poison)?;
        let signing_key = keys.get(key).ok_or(KeyError::NotFound(*key))?;
        Ok(signing_key.sign(payload).to_bytes().to_vec())
    }
}

impl std::fmt::Debug for Keyring {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let count = self.keys.read().map(|keys| keys.len()).unwrap_or(0);
        f.debug_struct("Keyring").field("keys", &count).field("secrets", &"<redacted>").finish()
    }
}

/// Verify an Ed25519 signature
///
/// Returns false for malformed keys or signatures rather than erroring; callers only
/// need to know whether the proof holds.
pub fn verify_signature(key: &PublicKey, payload: &[u8], signature: &[u8]) -> bool {
    let verifying_key = match VerifyingKey::from_bytes(key.as_bytes()) {
        Ok(vk) => vk,
        Err(_) => return false,
    };

    let signature = match Signature::from_slice(signature) {
        Ok(sig) => sig,
        Err(_) => return false,
    };

    verifying_key.verify(payload, &signature).is_ok()
}
