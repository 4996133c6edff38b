/*
    halo_auth.rs - Device authentication backed by a HALO space

    The device and profile machines consume the identity's HALO space; the auth verifier
    then accepts exactly the devices that space has authorized.
*/

use halospace_core::core_credentials::{
    create_auth_credential, create_device_authorization, create_device_profile_credential,
    create_identity_profile_credential, Assertion, AuthorizedDevice, Chain, CredentialSigner, DeviceProfileDocument,
    HaloAuthVerifier, ProfileDocument,
};
use halospace_core::core_keys::PublicKey;
use halospace_core::core_state::{DeviceStateMachine, ProfileStateMachine, SpaceStateMachine};
use halospace_core::test_utils::TestSpace;
use std::sync::Arc;
use std::time::Duration;

struct Halo {
    space: TestSpace,
    machine: SpaceStateMachine,
    devices: Arc<DeviceStateMachine>,
    profile: Arc<ProfileStateMachine>,
}

async fn halo() -> Halo {
    let space = TestSpace::new();
    let mut machine = space.bootstrapped().await;
    let devices = Arc::new(DeviceStateMachine::new(space.identity_key, space.device_key));
    let profile = Arc::new(ProfileStateMachine::new(space.identity_key));
    machine.add_credential_processor(devices.clone());
    machine.add_credential_processor(profile.clone());
    Halo { space, machine, devices, profile }
}

fn nonce() -> Vec<u8> {
    PublicKey::random().as_bytes().to_vec()
}

#[tokio::test]
async fn test_device_authenticates_after_authorization() {
    let Halo { space, mut machine, devices, .. } = halo().await;
    let verifier = HaloAuthVerifier::new(devices.clone());
    let device = space.device_signer();

    let challenge = nonce();
    let response = create_auth_credential(&device, challenge.clone()).unwrap();
    assert!(!verifier.verify(&challenge, &response).await);

    let authorization = create_device_authorization(&space.identity_signer(), space.device_key).unwrap();
    assert!(machine.process(authorization, space.control_options()).await.unwrap());

    let chain = tokio::time::timeout(Duration::from_secs(5), devices.wait_for_device_chain()).await.unwrap();
    assert!(chain.is_some());
    assert!(verifier.verify(&challenge, &response).await);
}

#[tokio::test]
async fn test_second_device_uses_published_chain() {
    let Halo { space, mut machine, devices, .. } = halo().await;
    let laptop = space.authorize_new_device();
    let laptop_key = laptop.subject;
    machine.process(laptop.clone(), space.control_options()).await.unwrap();

    let profile = DeviceProfileDocument { label: Some("laptop".to_string()), ..Default::default() };
    let described = create_device_profile_credential(&space.identity_signer(), laptop_key, profile.clone()).unwrap();
    machine.process(described, space.control_options()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), async {
        while devices.authorized_devices().await.get(&laptop_key) != Some(&profile) {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    let signer = CredentialSigner::with_chain(space.signer(), Chain::new(laptop), laptop_key);
    let challenge = nonce();
    let response = create_auth_credential(&signer, challenge.clone()).unwrap();
    assert!(HaloAuthVerifier::new(devices).verify(&challenge, &response).await);
}

#[tokio::test]
async fn test_profile_follows_halo() {
    let Halo { space, mut machine, profile, .. } = halo().await;
    let mut updates = profile.subscribe();

    let credential =
        create_identity_profile_credential(&space.identity_signer(), ProfileDocument::named("alice")).unwrap();
    machine.process(credential, space.control_options()).await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), updates.wait_for(Option::is_some)).await.unwrap().unwrap();
    assert_eq!(profile.profile(), Some(ProfileDocument::named("alice")));
}

#[tokio::test]
async fn test_authorization_by_stranger_is_not_a_device() {
    let Halo { space, mut machine, devices, .. } = halo().await;
    let stranger = space.new_member_signer();
    let rogue = PublicKey::random();
    let forged = stranger
        .issue(rogue, Assertion::AuthorizedDevice(AuthorizedDevice { device_key: rogue, identity_key: space.identity_key }))
        .unwrap();
    machine.process(forged, space.control_options()).await.unwrap();

    // Consumers see the log in order, so once the genuine device shows up the forged one was handled.
    let genuine = space.authorize_new_device();
    let genuine_key = genuine.subject;
    machine.process(genuine, space.control_options()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), async {
        while !devices.is_authorized(&genuine_key).await {
            tokio::task::yield_now().await;
        }
    })
    .await
    .unwrap();

    assert!(!devices.is_authorized(&rogue).await);
}
