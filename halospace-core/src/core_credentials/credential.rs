//! Credential envelope, proof and delegation chain

use super::assertions::Assertion;
use crate::core_keys::PublicKey;
use serde::{Deserialize, Serialize};
use std::time::{SystemTime, UNIX_EPOCH};

/// A signed assertion about `subject`, issued by `issuer`.
///
/// When `proof.signing_key` differs from `issuer` the credential was signed by a device
/// acting for the issuer, and `chain` must prove that delegation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Credential {
    /// Derived from the signed content, see [`super::credential_id`]
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub id: Option<PublicKey>,
    pub issuer: PublicKey,
    /// Milliseconds since the unix epoch
    pub issuance_date: u64,
    pub subject: PublicKey,
    pub assertion: Assertion,
    /// Credentials the issuer had observed when issuing this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub parent_credential_ids: Vec<PublicKey>,
    pub proof: Proof,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub chain: Option<Box<Chain>>,
}

impl Credential {
    /// `@type` of the assertion
    pub fn type_name(&self) -> &'static str {
        self.assertion.type_name()
    }

    /// Whether a device signed on behalf of the issuer
    pub fn is_delegated(&self) -> bool {
        self.proof.signing_key != self.issuer
    }
}

/// Signature over the canonical encoding
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Proof {
    #[serde(with = "hex_bytes")]
    pub signature: Vec<u8>,
    pub signing_key: PublicKey,
    /// Freshness challenge, covered by the signature
    #[serde(default, skip_serializing_if = "Option::is_none", with = "hex_bytes::option")]
    pub nonce: Option<Vec<u8>>,
}

/// Proof that `proof.signing_key` acts for `issuer`: an `AuthorizedDevice` credential,
/// possibly itself delegated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Chain {
    pub credential: Credential,
}

impl Chain {
    pub fn new(credential: Credential) -> Self {
        Chain { credential }
    }

    /// Number of nested credentials, this one included
    pub fn depth(&self) -> usize {
        1 + self.credential.chain.as_ref().map_or(0, |chain| chain.depth())
    }
}

/// Current time in milliseconds since the unix epoch
pub fn now_millis() -> u64 {
    SystemTime::now().duration_since(UNIX_EPOCH).map(|d| d.as_millis() as u64).unwrap_or(0)
}

pub(crate) mod hex_bytes {
    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(bytes: &[u8], serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(&hex::encode(bytes))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Vec<u8>, D::Error> {
        let s = String::deserialize(deserializer)?;
        hex::decode(s).map_err(serde::de::Error::custom)
    }

    pub mod option {
        use serde::{Deserialize, Deserializer, Serializer};

        pub fn serialize<S: Serializer>(
            bytes: &Option<Vec<u8>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error> {
            match bytes {
                Some(bytes) => serializer.serialize_some(&hex::encode(bytes)),
                None => serializer.serialize_none(),
            }
        }

        pub fn deserialize<'de, D: Deserializer<'de>>(
            deserializer: D,
        ) -> Result<Option<Vec<u8>>, D::Error> {
            let s: Option<String> = Option::deserialize(deserializer)?;
            s.map(|s| hex::decode(s).map_err(serde::de::Error::custom)).transpose()
        }
    }
}
