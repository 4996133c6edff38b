//! Canonical encoding and credential ids
//!
//! The signature covers a deterministic JSON rendering of everything except the id,
//! the signature itself and the delegation chain. The chain is excluded because it is
//! verified independently and may be re-attached by whoever relays the credential.

use super::assertions::Assertion;
use super::credential::Credential;
use super::CredentialError;
use crate::core_keys::PublicKey;
use serde::Serialize;

const SIGNING_DOMAIN: &[u8] = b"halospace.credential.v1\0";

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct SigningView<'a> {
    issuer: &'a PublicKey,
    issuance_date: u64,
    subject: &'a PublicKey,
    assertion: &'a Assertion,
    parent_credential_ids: &'a [PublicKey],
    signing_key: &'a PublicKey,
    nonce: Option<String>,
}

/// Bytes signed by `credential.proof.signing_key`
pub fn canonical_payload(credential: &Credential) -> Result<Vec<u8>, CredentialError> {
    let view = SigningView {
        issuer: &credential.issuer,
        issuance_date: credential.issuance_date,
        subject: &credential.subject,
        assertion: &credential.assertion,
        parent_credential_ids: &credential.parent_credential_ids,
        signing_key: &credential.proof.signing_key,
        nonce: credential.proof.nonce.as_ref().map(hex::encode),
    };

    let mut payload = SIGNING_DOMAIN.to_vec();
    serde_json::to_writer(&mut payload, &view)
        .map_err(|e| CredentialError::Encoding(e.to_string()))?;
    Ok(payload)
}

/// Content-derived id: BLAKE3 over the canonical payload and the signature
pub fn credential_id(credential: &Credential) -> Result<PublicKey, CredentialError> {
    let payload = canonical_payload(credential)?;
    let mut hasher = blake3::Hasher::new();
    hasher.update(&payload);
    hasher.update(&credential.proof.signature);
    Ok(PublicKey::from_bytes(*hasher.finalize().as_bytes()))
}

/// Wire encoding
pub fn encode_credential(credential: &Credential) -> Result<Vec<u8>, CredentialError> {
    serde_json::to_vec(credential).map_err(|e| CredentialError::Encoding(e.to_string()))
}

pub fn decode_credential(bytes: &[u8]) -> Result<Credential, CredentialError> {
    serde_json::from_slice(bytes).map_err(|e| CredentialError::Decoding(e.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_credentials::{CredentialBuilder, SpaceGenesis};
    use crate::core_keys::Keyring;

    fn genesis(keyring: &Keyring) -> Credential {
        let space_key = keyring.create_key().unwrap();
        CredentialBuilder::new(
            space_key,
            space_key,
            Assertion::SpaceGenesis(SpaceGenesis { space_key }),
        )
        .sign(keyring)
        .unwrap()
    }

    #[test]
    fn test_payload_is_stable() {
        let keyring = Keyring::new();
        let credential = genesis(&keyring);
        assert_eq!(canonical_payload(&credential).unwrap(), canonical_payload(&credential).unwrap());
    }

    #[test]
    fn test_payload_ignores_id_and_signature() {
        let keyring = Keyring::new();
        let credential = genesis(&keyring);

        let mut stripped = credential.clone();
        stripped.id = None;
        stripped.proof.signature.clear();
        assert_eq!(canonical_payload(&credential).unwrap(), canonical_payload(&stripped).unwrap());
    }

    #[test]
    fn test_payload_covers_nonce() {
        let keyring = Keyring::new();
        let credential = genesis(&keyring);

        let mut with_nonce = credential.clone();
        with_nonce.proof.nonce = Some(vec![1, 2, 3]);
        assert_ne!(canonical_payload(&credential).unwrap(), canonical_payload(&with_nonce).unwrap());
    }

    #[test]
    fn test_id_matches_builder() {
        let keyring = Keyring::new();
        let credential = genesis(&keyring);
        assert_eq!(credential.id, Some(credential_id(&credential).unwrap()));
    }

    #[test]
    fn test_wire_decoding_preserves_id() {
        let keyring = Keyring::new();
        let credential = genesis(&keyring);

        let bytes = encode_credential(&credential).unwrap();
        let decoded = decode_credential(&bytes).unwrap();
        assert_eq!(decoded, credential);
        assert_eq!(credential_id(&decoded).unwrap(), credential.id.unwrap());
    }

    #[test]
    fn test_decode_garbage() {
        assert!(matches!(decode_credential(b"not json"), Err(CredentialError::Decoding(_))));
    }
}
