//! Factories for the credential sequences peers actually exchange

use super::assertions::{
    AdmittedFeed, Assertion, AuthMethod, AuthorizedDevice, CancelDelegatedInvitation,
    DelegateSpaceInvitation, DeviceProfile, DeviceProfileDocument, FeedDesignation,
    IdentityProfile, MemberProfile, ProfileDocument, SpaceGenesis, SpaceMember, SpaceRole,
};
use super::builder::CredentialSigner;
use super::credential::Credential;
use super::CredentialError;
use crate::core_keys::PublicKey;

/// Credentials that bootstrap a new space:
/// genesis, the creator's OWNER admission, then the creator's control and data feeds.
///
/// `space` must sign directly with the space key. `creator` may sign through a device chain.
pub fn create_genesis_credential_sequence(
    space: &CredentialSigner,
    creator: &CredentialSigner,
    control_feed_key: PublicKey,
    data_feed_key: PublicKey,
) -> Result<Vec<Credential>, CredentialError> {
    let space_key = space.issuer();

    let genesis = space.issue(space_key, Assertion::SpaceGenesis(SpaceGenesis { space_key }))?;
    let owner = space.issue(
        creator.issuer(),
        Assertion::SpaceMember(SpaceMember {
            space_key,
            role: SpaceRole::Owner,
            profile: None,
            genesis_feed_key: control_feed_key,
            invitation_credential_id: None,
        }),
    )?;
    let control_feed =
        create_feed_admission_credential(creator, space_key, control_feed_key, FeedDesignation::Control)?;
    let data_feed =
        create_feed_admission_credential(creator, space_key, data_feed_key, FeedDesignation::Data)?;

    Ok(vec![genesis, owner, control_feed, data_feed])
}

/// Admits `identity_key` with `role`.
///
/// `invitation_credential_id` marks the delegated invitation this admission redeems.
pub fn create_admission_credentials(
    admitter: &CredentialSigner,
    space_key: PublicKey,
    identity_key: PublicKey,
    role: SpaceRole,
    genesis_feed_key: PublicKey,
    profile: Option<ProfileDocument>,
    invitation_credential_id: Option<PublicKey>,
) -> Result<Vec<Credential>, CredentialError> {
    let member = admitter.issue(
        identity_key,
        Assertion::SpaceMember(SpaceMember {
            space_key,
            role,
            profile,
            genesis_feed_key,
            invitation_credential_id,
        }),
    )?;
    Ok(vec![member])
}

/// Admits a feed owned by the signer's identity and written by the signer's device
pub fn create_feed_admission_credential(
    signer: &CredentialSigner,
    space_key: PublicKey,
    feed_key: PublicKey,
    designation: FeedDesignation,
) -> Result<Credential, CredentialError> {
    signer.issue(
        feed_key,
        Assertion::AdmittedFeed(AdmittedFeed {
            space_key,
            device_key: signer.signing_key(),
            identity_key: signer.issuer(),
            designation,
        }),
    )
}

/// Parameters of a delegated invitation
#[derive(Debug, Clone)]
pub struct InvitationParams {
    pub invitation_id: String,
    pub swarm_key: PublicKey,
    pub role: SpaceRole,
    pub auth_method: AuthMethod,
    pub multi_use: bool,
    pub expires_on: Option<u64>,
    pub guest_key: Option<PublicKey>,
}

impl InvitationParams {
    /// Single-use invitation with a fresh id and swarm key
    pub fn new(role: SpaceRole) -> Self {
        Self {
            invitation_id: uuid::Uuid::new_v4().to_string(),
            swarm_key: PublicKey::random(),
            role,
            auth_method: AuthMethod::SharedSecret,
            multi_use: false,
            expires_on: None,
            guest_key: None,
        }
    }

    pub fn multi_use(mut self, multi_use: bool) -> Self {
        self.multi_use = multi_use;
        self
    }

    pub fn expires_on(mut self, millis: u64) -> Self {
        self.expires_on = Some(millis);
        self
    }

    pub fn auth_method(mut self, auth_method: AuthMethod) -> Self {
        self.auth_method = auth_method;
        self
    }

    /// Restrict to a known guest; implies `KNOWN_PUBLIC_KEY` authentication
    pub fn guest_key(mut self, guest_key: PublicKey) -> Self {
        self.guest_key = Some(guest_key);
        self.auth_method = AuthMethod::KnownPublicKey;
        self
    }
}

/// Delegates an invitation to the space; the subject is the space key
pub fn create_delegated_invitation_credential(
    signer: &CredentialSigner,
    space_key: PublicKey,
    params: InvitationParams,
) -> Result<Credential, CredentialError> {
    signer.issue(
        space_key,
        Assertion::DelegateSpaceInvitation(DelegateSpaceInvitation {
            invitation_id: params.invitation_id,
            swarm_key: params.swarm_key,
            role: params.role,
            auth_method: params.auth_method,
            multi_use: params.multi_use,
            expires_on: params.expires_on,
            guest_key: params.guest_key,
        }),
    )
}

/// Cancels the delegated invitation whose credential id is `invitation_credential_id`
pub fn create_cancel_delegated_invitation_credential(
    signer: &CredentialSigner,
    space_key: PublicKey,
    invitation_credential_id: PublicKey,
) -> Result<Credential, CredentialError> {
    signer.issue(
        space_key,
        Assertion::CancelDelegatedInvitation(CancelDelegatedInvitation {
            credential_id: invitation_credential_id,
        }),
    )
}

/// `identity` authorizes `device_key` to sign on its behalf
pub fn create_device_authorization(
    identity: &CredentialSigner,
    device_key: PublicKey,
) -> Result<Credential, CredentialError> {
    identity.issue(
        device_key,
        Assertion::AuthorizedDevice(AuthorizedDevice { device_key, identity_key: identity.issuer() }),
    )
}

pub fn create_member_profile_credential(
    member: &CredentialSigner,
    profile: ProfileDocument,
) -> Result<Credential, CredentialError> {
    member.issue(member.issuer(), Assertion::MemberProfile(MemberProfile { profile }))
}

pub fn create_identity_profile_credential(
    identity: &CredentialSigner,
    profile: ProfileDocument,
) -> Result<Credential, CredentialError> {
    identity.issue(identity.issuer(), Assertion::IdentityProfile(IdentityProfile { profile }))
}

pub fn create_device_profile_credential(
    identity: &CredentialSigner,
    device_key: PublicKey,
    profile: DeviceProfileDocument,
) -> Result<Credential, CredentialError> {
    identity.issue(device_key, Assertion::DeviceProfile(DeviceProfile { profile }))
}
