//! Credential state machines for replicated p2p spaces
//!
//! A space is a set of append-only feeds carrying signed credentials. Every peer replays
//! those credentials through a [`core_state::SpaceStateMachine`] and arrives at the same
//! members, feeds and invitations.

pub mod config;
pub mod core_credentials;
pub mod core_keys;
pub mod core_state;
pub mod logging;
pub mod metrics;
pub mod test_utils;

pub use config::Config;
pub use core_credentials::{Credential, CredentialSigner};
pub use core_keys::{Keyring, PublicKey};
pub use core_state::{ProcessOptions, SpaceHandle, SpaceStateMachine};
pub use logging::{init_logging, LogLevel};

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_library_exports() {
        let _ = LogLevel::Info;
        let _ = Config::default();
        let _ = PublicKey::random();
    }
}
