//! A sample space: one owner writing through a device, one admin with its own feed,
//! a profile and two invitations of which one is cancelled.

use crate::replay::LogEntry;
use anyhow::{Context, Result};
use halospace_core::core_credentials::{
    create_admission_credentials, create_cancel_delegated_invitation_credential,
    create_delegated_invitation_credential, create_device_authorization, create_feed_admission_credential,
    create_genesis_credential_sequence, create_member_profile_credential, Chain, CredentialSigner, FeedDesignation,
    InvitationParams, ProfileDocument, SpaceRole,
};
use halospace_core::core_keys::{Keyring, PublicKey, Signer};
use std::sync::Arc;

pub struct DemoLog {
    pub space_key: PublicKey,
    pub entries: Vec<LogEntry>,
}

pub fn build_space() -> Result<DemoLog> {
    let keyring = Keyring::new();
    let signer: Arc<dyn Signer> = Arc::new(keyring.clone());

    let space_key = keyring.create_key()?;
    let owner_key = keyring.create_key()?;
    let device_key = keyring.create_key()?;
    let admin_key = keyring.create_key()?;
    let (control_feed, data_feed, admin_feed) = (keyring.create_key()?, keyring.create_key()?, keyring.create_key()?);

    let space = CredentialSigner::with_key(signer.clone(), space_key);
    let owner = CredentialSigner::with_key(signer.clone(), owner_key);
    let device = CredentialSigner::with_chain(
        signer.clone(),
        Chain::new(create_device_authorization(&owner, device_key)?),
        device_key,
    );
    let admin = CredentialSigner::with_key(signer, admin_key);

    let mut entries: Vec<LogEntry> = create_genesis_credential_sequence(&space, &device, control_feed, data_feed)?
        .into_iter()
        .map(|credential| LogEntry { credential, source_feed: control_feed })
        .collect();

    let mut admin_log = create_admission_credentials(
        &device,
        space_key,
        admin_key,
        SpaceRole::Admin,
        control_feed,
        None,
        None,
    )?;
    admin_log.push(create_feed_admission_credential(&admin, space_key, admin_feed, FeedDesignation::Control)?);
    admin_log.push(create_member_profile_credential(&admin, ProfileDocument::named("admin"))?);

    let open = create_delegated_invitation_credential(&admin, space_key, InvitationParams::new(SpaceRole::Editor))?;
    let withdrawn = create_delegated_invitation_credential(
        &admin,
        space_key,
        InvitationParams::new(SpaceRole::Editor).multi_use(true),
    )?;
    let cancel = create_cancel_delegated_invitation_credential(&admin, space_key, withdrawn.id.context("signed credential without id")?)?;
    admin_log.extend([open, withdrawn, cancel]);

    entries.extend(admin_log.into_iter().map(|credential| LogEntry { credential, source_feed: admin_feed }));
    Ok(DemoLog { space_key, entries })
}
