//! Fixed-length public key type

use super::KeyError;
use serde::de::{self, Visitor};
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

/// Length of every key handled by the credential layer
pub const PUBLIC_KEY_LENGTH: usize = 32;

/// A 32-byte public key with value equality.
///
/// Used as the map key for members, devices, feeds and credential ids, so two keys
/// decoded from different credentials are the same entry whenever their bytes match.
/// Serialized as lowercase hex.
#[derive(Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct PublicKey([u8; PUBLIC_KEY_LENGTH]);

impl PublicKey {
    /// Create key from bytes
    pub fn from_bytes(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        PublicKey(bytes)
    }

    /// Create key from a slice, checking the length
    pub fn from_slice(bytes: &[u8]) -> Result<Self, KeyError> {
        let array: [u8; PUBLIC_KEY_LENGTH] = bytes.try_into().map_err(|_| {
            KeyError::InvalidLength { expected: PUBLIC_KEY_LENGTH, actual: bytes.len() }
        })?;
        Ok(PublicKey(array))
    }

    /// Parse key from hex
    pub fn from_hex(s: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(s).map_err(|e| KeyError::InvalidHex(e.to_string()))?;
        Self::from_slice(&bytes)
    }

    /// Random key, for ids and keys that never sign (swarm keys, feed keys in tests)
    pub fn random() -> Self {
        use rand::RngCore;
        let mut bytes = [0u8; PUBLIC_KEY_LENGTH];
        rand::rng().fill_bytes(&mut bytes);
        PublicKey(bytes)
    }

    /// Get bytes representation
    pub fn as_bytes(&self) -> &[u8; PUBLIC_KEY_LENGTH] {
        &self.0
    }

    /// Hex representation
    pub fn to_hex(&self) -> String {
        hex::encode(self.0)
    }

    /// First 8 hex chars, for log fields
    pub fn truncate(&self) -> String {
        hex::encode(&self.0[..4])
    }
}

impl fmt::Display for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_hex())
    }
}

impl fmt::Debug for PublicKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "PublicKey({})", self.truncate())
    }
}

impl From<[u8; PUBLIC_KEY_LENGTH]> for PublicKey {
    fn from(bytes: [u8; PUBLIC_KEY_LENGTH]) -> Self {
        PublicKey(bytes)
    }
}

impl FromStr for PublicKey {
    type Err = KeyError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_hex(s)
    }
}

impl Serialize for PublicKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&self.to_hex())
    }
}

impl<'de> Deserialize<'de> for PublicKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        struct HexKeyVisitor;

        impl Visitor<'_> for HexKeyVisitor {
            type Value = PublicKey;

            fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "a {}-byte hex encoded public key", PUBLIC_KEY_LENGTH)
            }

            fn visit_str<E: de::Error>(self, v: &str) -> Result<PublicKey, E> {
                PublicKey::from_hex(v).map_err(E::custom)
            }
        }

        deserializer.deserialize_str(HexKeyVisitor)
    }
}
