//! Credential log files and state summaries

use anyhow::{Context, Result};
use halospace_core::config::Config;
use halospace_core::core_credentials::{Credential, FeedDesignation, SpaceRole};
use halospace_core::core_keys::PublicKey;
use halospace_core::core_state::{ProcessOptions, SpaceHandle, SpaceStateMachine};
use serde::{Deserialize, Serialize};
use std::path::Path;
use tracing::{info, warn};

/// One credential as read from a feed
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogEntry {
    pub credential: Credential,
    pub source_feed: PublicKey,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct SpaceSummary {
    pub space_key: PublicKey,
    pub applied: usize,
    pub rejected: usize,
    pub members: Vec<MemberSummary>,
    pub feeds: Vec<FeedSummary>,
    pub invitations: Vec<InvitationSummary>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct MemberSummary {
    pub key: PublicKey,
    pub role: Option<SpaceRole>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub display_name: Option<String>,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedSummary {
    pub key: PublicKey,
    pub parent: PublicKey,
    pub designation: FeedDesignation,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct InvitationSummary {
    pub credential_id: PublicKey,
    pub invitation_id: String,
    pub role: SpaceRole,
    pub multi_use: bool,
}

pub fn read_log(path: &Path) -> Result<Vec<LogEntry>> {
    let contents = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
    serde_json::from_str(&contents).with_context(|| format!("parsing {}", path.display()))
}

pub fn write_log(path: &Path, entries: &[LogEntry]) -> Result<()> {
    let contents = serde_json::to_string_pretty(entries)?;
    std::fs::write(path, contents).with_context(|| format!("writing {}", path.display()))
}

/// Apply `entries` in order. Rejected credentials are retried once after the first pass,
/// for logs that interleave feeds out of causal order.
pub async fn replay(space_key: PublicKey, entries: Vec<LogEntry>, config: &Config) -> Result<SpaceSummary> {
    let handle = SpaceHandle::new(SpaceStateMachine::from_config(space_key, &config.space));

    let mut deferred = Vec::new();
    for entry in entries {
        let options = ProcessOptions::from_feed(entry.source_feed);
        if !handle.process(entry.credential.clone(), options).await? {
            deferred.push(entry);
        }
    }

    let mut rejected = 0;
    for entry in deferred {
        if !handle.process(entry.credential, ProcessOptions::from_feed(entry.source_feed)).await? {
            rejected += 1;
        }
    }
    if rejected > 0 {
        warn!(rejected, "Some credentials were rejected");
    }

    let summary = handle.with_state(|state| summarize(state, rejected)).await;
    info!(space_key = %space_key.truncate(), applied = summary.applied, "Replay finished");
    Ok(summary)
}

fn summarize(state: &SpaceStateMachine, rejected: usize) -> SpaceSummary {
    let mut members: Vec<_> = state
        .members()
        .values()
        .map(|member| MemberSummary {
            key: member.key,
            role: state.get_role(&member.key),
            display_name: member.profile.as_ref().and_then(|profile| profile.display_name.clone()),
        })
        .collect();
    members.sort_by_key(|member| member.key);

    let mut feeds: Vec<_> = state
        .feeds()
        .values()
        .map(|feed| FeedSummary { key: feed.key, parent: feed.parent, designation: feed.assertion.designation })
        .collect();
    feeds.sort_by_key(|feed| feed.key);

    let mut invitations: Vec<_> = state
        .invitations()
        .iter()
        .map(|(id, invitation)| InvitationSummary {
            credential_id: *id,
            invitation_id: invitation.invitation_id.clone(),
            role: invitation.role,
            multi_use: invitation.multi_use,
        })
        .collect();
    invitations.sort_by_key(|invitation| invitation.credential_id);

    SpaceSummary {
        space_key: state.space_key(),
        applied: state.credentials().len(),
        rejected,
        members,
        feeds,
        invitations,
    }
}
