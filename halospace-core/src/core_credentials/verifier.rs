//! Credential verification
//!
//! A credential passes when its signature holds under `proof.signing_key` and, if that
//! key is not the issuer, the attached chain proves the key was authorized by the
//! issuer through `AuthorizedDevice` credentials down to a directly signed root.

use super::assertions::Assertion;
use super::credential::Credential;
use super::encoding::canonical_payload;
use crate::core_keys::{verify_signature, PublicKey};
use async_trait::async_trait;

/// Default bound on nested delegation chains
pub const DEFAULT_MAX_CHAIN_DEPTH: usize = 8;

/// Outcome of verification
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationResult {
    Pass,
    Fail { errors: Vec<String> },
}

impl VerificationResult {
    pub fn is_pass(&self) -> bool {
        matches!(self, VerificationResult::Pass)
    }

    fn from_errors(errors: Vec<String>) -> Self {
        if errors.is_empty() {
            VerificationResult::Pass
        } else {
            VerificationResult::Fail { errors }
        }
    }
}

/// Checks a credential's proof and delegation chain
#[async_trait]
pub trait CredentialVerifier: Send + Sync {
    async fn verify(&self, credential: &Credential) -> VerificationResult;
}

/// Ed25519 verifier over the canonical encoding
#[derive(Debug, Clone)]
pub struct SignatureVerifier {
    max_chain_depth: usize,
}

impl SignatureVerifier {
    pub fn new() -> Self {
        Self { max_chain_depth: DEFAULT_MAX_CHAIN_DEPTH }
    }

    pub fn with_max_chain_depth(max_chain_depth: usize) -> Self {
        Self { max_chain_depth }
    }

    /// Synchronous verification, collecting every error found
    pub fn verify_sync(&self, credential: &Credential) -> VerificationResult {
        let mut errors = Vec::new();
        self.verify_at_depth(credential, 0, &mut errors);
        VerificationResult::from_errors(errors)
    }

    fn verify_at_depth(&self, credential: &Credential, depth: usize, errors: &mut Vec<String>) {
        if credential.is_delegated() {
            match &credential.chain {
                None => errors.push("Delegated credential is missing credential chain.".to_string()),
                Some(chain) => {
                    if depth + 1 > self.max_chain_depth {
                        errors.push(format!(
                            "Credential chain exceeds maximum depth of {}.",
                            self.max_chain_depth
                        ));
                        return;
                    }
                    self.verify_chain_link(
                        &chain.credential,
                        &credential.issuer,
                        &credential.proof.signing_key,
                        depth + 1,
                        errors,
                    );
                }
            }
        }

        match canonical_payload(credential) {
            Ok(payload) => {
                if !verify_signature(&credential.proof.signing_key, &payload, &credential.proof.signature) {
                    errors.push("Invalid signature.".to_string());
                }
            }
            Err(e) => errors.push(format!("Failed to encode credential: {}", e)),
        }
    }

    /// `link` must be an `AuthorizedDevice` issued by `authority` for `device`
    fn verify_chain_link(
        &self,
        link: &Credential,
        authority: &PublicKey,
        device: &PublicKey,
        depth: usize,
        errors: &mut Vec<String>,
    ) {
        if &link.issuer != authority {
            errors.push("Invalid credential chain: invalid issuer.".to_string());
        }
        if &link.subject != device {
            errors.push("Invalid credential chain: subject does not match signing key.".to_string());
        }
        match &link.assertion {
            Assertion::AuthorizedDevice(assertion) => {
                if &assertion.identity_key != authority || &assertion.device_key != device {
                    errors.push("Invalid credential chain: assertion keys do not match.".to_string());
                }
            }
            _ => errors.push(
                "Invalid credential chain: credential is not of type AuthorizedDevice.".to_string(),
            ),
        }

        self.verify_at_depth(link, depth, errors);
    }
}

impl Default for SignatureVerifier {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl CredentialVerifier for SignatureVerifier {
    async fn verify(&self, credential: &Credential) -> VerificationResult {
        self.verify_sync(credential)
    }
}

/// Accepts everything; for replaying logs that were verified when first ingested
#[derive(Debug, Clone, Default)]
pub struct TrustingVerifier;

#[async_trait]
impl CredentialVerifier for TrustingVerifier {
    async fn verify(&self, _credential: &Credential) -> VerificationResult {
        VerificationResult::Pass
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_credentials::{
        AuthorizedDevice, Chain, CredentialBuilder, SpaceMember, SpaceRole,
    };
    use crate::core_keys::Keyring;

    fn member_assertion(space_key: PublicKey) -> Assertion {
        Assertion::SpaceMember(SpaceMember {
            space_key,
            role: SpaceRole::Admin,
            profile: None,
            genesis_feed_key: PublicKey::random(),
            invitation_credential_id: None,
        })
    }

    fn authorize(keyring: &Keyring, identity: PublicKey, device: PublicKey) -> Credential {
        CredentialBuilder::new(
            identity,
            device,
            Assertion::AuthorizedDevice(AuthorizedDevice { device_key: device, identity_key: identity }),
        )
        .sign(keyring)
        .unwrap()
    }

    #[test]
    fn test_pass_without_chain() {
        let keyring = Keyring::new();
        let issuer = keyring.create_key().unwrap();
        let credential = CredentialBuilder::new(issuer, PublicKey::random(), member_assertion(PublicKey::random()))
            .sign(&keyring)
            .unwrap();

        assert_eq!(SignatureVerifier::new().verify_sync(&credential), VerificationResult::Pass);
    }

    #[test]
    fn test_fail_tampered_signature() {
        let keyring = Keyring::new();
        let issuer = keyring.create_key().unwrap();
        let mut credential = CredentialBuilder::new(issuer, PublicKey::random(), member_assertion(PublicKey::random()))
            .sign(&keyring)
            .unwrap();
        credential.proof.signature[0] = credential.proof.signature[0].wrapping_add(1);

        assert!(!SignatureVerifier::new().verify_sync(&credential).is_pass());
    }

    #[test]
    fn test_fail_tampered_issuer() {
        let keyring = Keyring::new();
        let issuer = keyring.create_key().unwrap();
        let space_key = PublicKey::random();
        let mut credential = CredentialBuilder::new(issuer, PublicKey::random(), member_assertion(space_key))
            .sign(&keyring)
            .unwrap();
        credential.issuer = space_key;

        assert!(!SignatureVerifier::new().verify_sync(&credential).is_pass());
    }

    #[test]
    fn test_fail_removed_nonce() {
        let keyring = Keyring::new();
        let issuer = keyring.create_key().unwrap();
        let mut credential = CredentialBuilder::new(issuer, PublicKey::random(), member_assertion(PublicKey::random()))
            .nonce(PublicKey::random().as_bytes().to_vec())
            .sign(&keyring)
            .unwrap();
        credential.proof.nonce = None;

        assert!(!SignatureVerifier::new().verify_sync(&credential).is_pass());
    }

    #[test]
    fn test_fail_injected_nonce() {
        let keyring = Keyring::new();
        let issuer = keyring.create_key().unwrap();
        let mut credential = CredentialBuilder::new(issuer, PublicKey::random(), member_assertion(PublicKey::random()))
            .sign(&keyring)
            .unwrap();
        credential.proof.nonce = Some(PublicKey::random().as_bytes().to_vec());

        assert!(!SignatureVerifier::new().verify_sync(&credential).is_pass());
    }

    #[test]
    fn test_pass_delegated_with_one_device() {
        let keyring = Keyring::new();
        let identity = keyring.create_key().unwrap();
        let device = keyring.create_key().unwrap();

        let credential = CredentialBuilder::new(identity, PublicKey::random(), member_assertion(PublicKey::random()))
            .signing_key(device)
            .chain(Chain::new(authorize(&keyring, identity, device)))
            .sign(&keyring)
            .unwrap();

        assert_eq!(SignatureVerifier::new().verify_sync(&credential), VerificationResult::Pass);
    }

    #[test]
    fn test_fail_missing_chain() {
        let keyring = Keyring::new();
        let identity = keyring.create_key().unwrap();
        let device = keyring.create_key().unwrap();

        let mut credential = CredentialBuilder::new(identity, PublicKey::random(), member_assertion(PublicKey::random()))
            .signing_key(device)
            .chain(Chain::new(authorize(&keyring, identity, device)))
            .sign(&keyring)
            .unwrap();
        credential.chain = None;

        match SignatureVerifier::new().verify_sync(&credential) {
            VerificationResult::Fail { errors } => {
                assert!(errors.iter().any(|e| e.contains("missing credential chain")));
            }
            VerificationResult::Pass => panic!("expected failure"),
        }
    }

    #[test]
    fn test_fail_chain_for_other_device() {
        let keyring = Keyring::new();
        let identity = keyring.create_key().unwrap();
        let device = keyring.create_key().unwrap();
        let other_device = keyring.create_key().unwrap();

        let credential = CredentialBuilder::new(identity, PublicKey::random(), member_assertion(PublicKey::random()))
            .signing_key(device)
            .chain(Chain::new(authorize(&keyring, identity, other_device)))
            .sign(&keyring)
            .unwrap();

        assert!(!SignatureVerifier::new().verify_sync(&credential).is_pass());
    }

    #[test]
    fn test_fail_chain_with_wrong_assertion_type() {
        let keyring = Keyring::new();
        let identity = keyring.create_key().unwrap();
        let device = keyring.create_key().unwrap();

        let bogus = CredentialBuilder::new(identity, device, member_assertion(PublicKey::random()))
            .sign(&keyring)
            .unwrap();
        let credential = CredentialBuilder::new(identity, PublicKey::random(), member_assertion(PublicKey::random()))
            .signing_key(device)
            .chain(Chain::new(bogus))
            .sign(&keyring)
            .unwrap();

        assert!(!SignatureVerifier::new().verify_sync(&credential).is_pass());
    }

    #[test]
    fn test_pass_nested_chain() {
        let keyring = Keyring::new();
        let identity = keyring.create_key().unwrap();
        let device_a = keyring.create_key().unwrap();
        let device_b = keyring.create_key().unwrap();

        // B authorized by A on behalf of the identity.
        let a_authorized = authorize(&keyring, identity, device_a);
        let b_authorized = CredentialBuilder::new(
            identity,
            device_b,
            Assertion::AuthorizedDevice(AuthorizedDevice { device_key: device_b, identity_key: identity }),
        )
        .signing_key(device_a)
        .chain(Chain::new(a_authorized))
        .sign(&keyring)
        .unwrap();

        let credential = CredentialBuilder::new(identity, PublicKey::random(), member_assertion(PublicKey::random()))
            .signing_key(device_b)
            .chain(Chain::new(b_authorized))
            .sign(&keyring)
            .unwrap();

        assert!(SignatureVerifier::new().verify_sync(&credential).is_pass());
        assert!(!SignatureVerifier::with_max_chain_depth(1).verify_sync(&credential).is_pass());
    }

    #[tokio::test]
    async fn test_async_trait_object() {
        let keyring = Keyring::new();
        let issuer = keyring.create_key().unwrap();
        let credential = CredentialBuilder::new(issuer, PublicKey::random(), member_assertion(PublicKey::random()))
            .sign(&keyring)
            .unwrap();

        let verifier: Box<dyn CredentialVerifier> = Box::new(SignatureVerifier::default());
        assert!(verifier.verify(&credential).await.is_pass());
        assert!(TrustingVerifier.verify(&credential).await.is_pass());
    }
}
