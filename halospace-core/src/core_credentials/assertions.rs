//! Typed credential payloads
//!
//! The set of assertions is closed: every concern the space layer understands has one
//! variant, tagged on the wire by its `@type` string.

use crate::core_keys::PublicKey;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Space-level roles, ordered by authority
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SpaceRole {
    /// Former member, or a subject that was never admitted
    Removed,
    /// Can write data and admit its own feeds
    Editor,
    /// Can admit members, delegate and cancel invitations
    Admin,
    /// Space creator
    Owner,
}

impl SpaceRole {
    /// Owner or Admin
    pub fn can_admit_members(&self) -> bool {
        matches!(self, SpaceRole::Owner | SpaceRole::Admin)
    }

    /// Editor, Admin or Owner
    pub fn can_admit_feeds(&self) -> bool {
        *self >= SpaceRole::Editor
    }
}

impl fmt::Display for SpaceRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            SpaceRole::Removed => "REMOVED",
            SpaceRole::Editor => "EDITOR",
            SpaceRole::Admin => "ADMIN",
            SpaceRole::Owner => "OWNER",
        };
        f.write_str(name)
    }
}

/// What a feed carries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FeedDesignation {
    /// Credentials and other control messages
    Control,
    /// Application data
    Data,
}

/// How a guest proves it may redeem an invitation
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum AuthMethod {
    None,
    SharedSecret,
    KnownPublicKey,
}

/// Identity or member profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProfileDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub avatar_cid: Option<String>,
}

impl ProfileDocument {
    pub fn named(display_name: impl Into<String>) -> Self {
        Self { display_name: Some(display_name.into()), avatar_cid: None }
    }
}

/// Device profile
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfileDocument {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub platform: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os: Option<String>,
}

/// Root credential of a space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceGenesis {
    pub space_key: PublicKey,
}

/// Admits the subject identity into a space, or changes its role
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceMember {
    pub space_key: PublicKey,
    pub role: SpaceRole,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub profile: Option<ProfileDocument>,
    pub genesis_feed_key: PublicKey,
    /// Delegated invitation redeemed by this admission
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub invitation_credential_id: Option<PublicKey>,
}

/// Member updates its profile within a space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberProfile {
    pub profile: ProfileDocument,
}

/// Admits the subject feed into a space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmittedFeed {
    pub space_key: PublicKey,
    pub device_key: PublicKey,
    pub identity_key: PublicKey,
    pub designation: FeedDesignation,
}

/// Standing offer to join a space
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DelegateSpaceInvitation {
    pub invitation_id: String,
    pub swarm_key: PublicKey,
    pub role: SpaceRole,
    pub auth_method: AuthMethod,
    pub multi_use: bool,
    /// Milliseconds since the unix epoch
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_on: Option<u64>,
    /// Expected guest, for `KNOWN_PUBLIC_KEY` invitations
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub guest_key: Option<PublicKey>,
}

impl DelegateSpaceInvitation {
    pub fn is_expired_at(&self, now_millis: u64) -> bool {
        self.expires_on.is_some_and(|expires_on| expires_on <= now_millis)
    }
}

/// Withdraws a delegated invitation, referenced by its credential id
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CancelDelegatedInvitation {
    pub credential_id: PublicKey,
}

/// Identity delegates signing authority to a device
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthorizedDevice {
    pub device_key: PublicKey,
    pub identity_key: PublicKey,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeviceProfile {
    pub profile: DeviceProfileDocument,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct IdentityProfile {
    pub profile: ProfileDocument,
}

/// Challenge response presented when opening a connection
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Auth {}

/// Credential payload, tagged by `@type`
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "@type")]
pub enum Assertion {
    SpaceGenesis(SpaceGenesis),
    SpaceMember(SpaceMember),
    MemberProfile(MemberProfile),
    AdmittedFeed(AdmittedFeed),
    DelegateSpaceInvitation(DelegateSpaceInvitation),
    CancelDelegatedInvitation(CancelDelegatedInvitation),
    AuthorizedDevice(AuthorizedDevice),
    DeviceProfile(DeviceProfile),
    IdentityProfile(IdentityProfile),
    Auth(Auth),
}

impl Assertion {
    /// The `@type` tag
    pub fn type_name(&self) -> &'static str {
        match self {
            Assertion::SpaceGenesis(_) => "SpaceGenesis",
            Assertion::SpaceMember(_) => "SpaceMember",
            Assertion::MemberProfile(_) => "MemberProfile",
            Assertion::AdmittedFeed(_) => "AdmittedFeed",
            Assertion::DelegateSpaceInvitation(_) => "DelegateSpaceInvitation",
            Assertion::CancelDelegatedInvitation(_) => "CancelDelegatedInvitation",
            Assertion::AuthorizedDevice(_) => "AuthorizedDevice",
            Assertion::DeviceProfile(_) => "DeviceProfile",
            Assertion::IdentityProfile(_) => "IdentityProfile",
            Assertion::Auth(_) => "Auth",
        }
    }
}
