//! Feed tree
//!
//! Each admitted feed remembers the feed its admission was recorded on. Following parents
//! leads back to the genesis feed, which is its own parent.

use super::events::{EventBroadcaster, SpaceEvent};
use super::StateMachineError;
use crate::core_credentials::{AdmittedFeed, Assertion, Credential};
use crate::core_keys::PublicKey;
use std::collections::HashMap;
use tracing::{debug, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedInfo {
    pub key: PublicKey,
    /// Feed the admitting credential was read from
    pub parent: PublicKey,
    pub credential: Credential,
    pub assertion: AdmittedFeed,
}

pub struct FeedStateMachine {
    space_key: PublicKey,
    feeds: HashMap<PublicKey, FeedInfo>,
    events: EventBroadcaster,
}

impl FeedStateMachine {
    pub fn new(space_key: PublicKey, events: EventBroadcaster) -> Self {
        Self { space_key, feeds: HashMap::new(), events }
    }

    pub fn process(&mut self, credential: &Credential, from_feed: PublicKey) -> Result<bool, StateMachineError> {
        let Assertion::AdmittedFeed(assertion) = &credential.assertion else {
            return Err(StateMachineError::UnexpectedAssertion {
                machine: "feed",
                type_name: credential.type_name(),
            });
        };

        if assertion.space_key != self.space_key {
            warn!(
                feed = %credential.subject.truncate(),
                space_key = %assertion.space_key.truncate(),
                "Feed admission for a different space"
            );
            return Ok(false);
        }

        let key = credential.subject;
        if self.feeds.contains_key(&key) {
            warn!(feed = %key.truncate(), "Feed already admitted");
            return Ok(true);
        }

        debug!(feed = %key.truncate(), parent = %from_feed.truncate(), designation = ?assertion.designation, "Feed admitted");
        self.feeds.insert(
            key,
            FeedInfo { key, parent: from_feed, credential: credential.clone(), assertion: assertion.clone() },
        );
        self.events.emit(SpaceEvent::FeedAdmitted {
            feed: key,
            parent: from_feed,
            designation: assertion.designation,
        });
        Ok(true)
    }

    pub fn feeds(&self) -> &HashMap<PublicKey, FeedInfo> {
        &self.feeds
    }

    pub fn feed(&self, key: &PublicKey) -> Option<&FeedInfo> {
        self.feeds.get(key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core_credentials::{CredentialBuilder, FeedDesignation, MemberProfile, ProfileDocument};
    use crate::core_keys::Keyring;

    fn admit_feed(keyring: &Keyring, identity: PublicKey, space_key: PublicKey, feed: PublicKey) -> Credential {
        CredentialBuilder::new(
            identity,
            feed,
            Assertion::AdmittedFeed(AdmittedFeed {
                space_key,
                device_key: identity,
                identity_key: identity,
                designation: FeedDesignation::Data,
            }),
        )
        .sign(keyring)
        .unwrap()
    }

    #[test]
    fn test_feed_tree() {
        let keyring = Keyring::new();
        let identity = keyring.create_key().unwrap();
        let space_key = PublicKey::random();
        let genesis_feed = PublicKey::random();
        let data_feed = PublicKey::random();
        let mut machine = FeedStateMachine::new(space_key, EventBroadcaster::default());

        let mut events = machine.events.subscribe();
        assert!(machine.process(&admit_feed(&keyring, identity, space_key, genesis_feed), genesis_feed).unwrap());
        assert!(machine.process(&admit_feed(&keyring, identity, space_key, data_feed), genesis_feed).unwrap());

        assert_eq!(machine.feed(&genesis_feed).unwrap().parent, genesis_feed);
        assert_eq!(machine.feed(&data_feed).unwrap().parent, genesis_feed);
        assert_eq!(machine.feeds().len(), 2);

        let first = events.try_recv().unwrap();
        assert_eq!(
            first,
            SpaceEvent::FeedAdmitted { feed: genesis_feed, parent: genesis_feed, designation: FeedDesignation::Data }
        );
    }

    #[test]
    fn test_duplicate_feed_keeps_parent() {
        let keyring = Keyring::new();
        let identity = keyring.create_key().unwrap();
        let space_key = PublicKey::random();
        let feed = PublicKey::random();
        let mut machine = FeedStateMachine::new(space_key, EventBroadcaster::default());

        machine.process(&admit_feed(&keyring, identity, space_key, feed), feed).unwrap();
        assert!(machine.process(&admit_feed(&keyring, identity, space_key, feed), PublicKey::random()).unwrap());
        assert_eq!(machine.feed(&feed).unwrap().parent, feed);
    }

    #[test]
    fn test_wrong_space() {
        let keyring = Keyring::new();
        let identity = keyring.create_key().unwrap();
        let feed = PublicKey::random();
        let mut machine = FeedStateMachine::new(PublicKey::random(), EventBroadcaster::default());

        assert!(!machine.process(&admit_feed(&keyring, identity, PublicKey::random(), feed), feed).unwrap());
        assert!(machine.feed(&feed).is_none());
    }

    #[test]
    fn test_foreign_assertion() {
        let keyring = Keyring::new();
        let identity = keyring.create_key().unwrap();
        let mut machine = FeedStateMachine::new(PublicKey::random(), EventBroadcaster::default());
        let profile = CredentialBuilder::new(
            identity,
            identity,
            Assertion::MemberProfile(MemberProfile { profile: ProfileDocument::default() }),
        )
        .sign(&keyring)
        .unwrap();

        assert!(machine.process(&profile, PublicKey::random()).is_err());
    }
}
