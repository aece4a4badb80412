use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{Action, AuthorityId, CanonicalWriter, Digest, PlayerId};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventSource {
    Local,
    Remote,
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    Proposed,
    Queued,
    Committed,
    Rejected,
    Orphan,
}

/// Durable, immutable record of one successfully evaluated command.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MoveEvent {
    pub event_id: Uuid,
    pub command_id: Uuid,
    pub command_fingerprint: Digest,
    pub expected_seq: u64,
    pub coordination_seq: u64,
    pub coordination_authority_id: AuthorityId,
    pub source: EventSource,
    pub player_id: PlayerId,
    pub payload: Action,
    pub state_fingerprint_before: Digest,
    pub state_fingerprint_after: Digest,
    pub status: EventStatus,
    /// `None` when the producer did not declare a hash (remote events only).
    #[serde(default)]
    pub chain_hash: Option<Digest>,
    pub prev_chain_hash: Digest,
    pub created_at: DateTime<Utc>,
}

/// The fields a chain hash commits to. Everything except the event's own hash.
#[derive(Clone, Copy, Debug)]
pub struct ChainLink<'a> {
    pub prev_chain_hash: &'a Digest,
    pub fingerprint_before: &'a Digest,
    pub fingerprint_after: &'a Digest,
    pub command_fingerprint: &'a Digest,
    pub coordination_seq: u64,
    pub expected_seq: u64,
    pub authority_id: &'a AuthorityId,
    pub player_id: PlayerId,
}

impl ChainLink<'_> {
    pub fn hash(&self) -> Digest {
        let mut w = CanonicalWriter::new();
        w.append_digest(self.prev_chain_hash)
            .append_digest(self.fingerprint_before)
            .append_digest(self.fingerprint_after)
            .append_digest(self.command_fingerprint)
            .append_u64(self.coordination_seq)
            .append_u64(self.expected_seq)
            .append_string(self.authority_id.as_str())
            .append_u8(self.player_id.code());
        w.sha256()
    }
}

impl MoveEvent {
    pub fn chain_link(&self) -> ChainLink<'_> {
        ChainLink {
            prev_chain_hash: &self.prev_chain_hash,
            fingerprint_before: &self.state_fingerprint_before,
            fingerprint_after: &self.state_fingerprint_after,
            command_fingerprint: &self.command_fingerprint,
            coordination_seq: self.coordination_seq,
            expected_seq: self.expected_seq,
            authority_id: &self.coordination_authority_id,
            player_id: self.player_id,
        }
    }

    /// Chain hash recomputed from this event's own content.
    pub fn computed_chain_hash(&self) -> Digest {
        self.chain_link().hash()
    }

    /// True when a declared chain hash exists and matches the content.
    pub fn chain_is_intact(&self) -> bool {
        self.chain_hash == Some(self.computed_chain_hash())
    }

    pub fn is_committed(&self) -> bool {
        self.status == EventStatus::Committed
    }

    /// Ordering used everywhere events are merged or replayed.
    pub fn ordering_key(&self) -> (u64, DateTime<Utc>) {
        (self.coordination_seq, self.created_at)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ForkReason {
    /// Same command id, different fingerprint.
    DuplicateCommandIdDiffFingerprint,
    /// Two events claim the same coordination position.
    CoordinationConflict,
}

impl ForkReason {
    pub fn as_str(self) -> &'static str {
        match self {
            ForkReason::DuplicateCommandIdDiffFingerprint => "duplicate_commandId_diffFingerprint",
            ForkReason::CoordinationConflict => "coordination_conflict",
        }
    }
}

/// Audit record for conflicting history.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct ForkEventRecord {
    pub coordination_seq: u64,
    pub local_event_id: Uuid,
    pub remote_event_id: Uuid,
    pub local_fingerprint: Digest,
    pub remote_fingerprint: Digest,
    pub reason: ForkReason,
    pub detected_at: DateTime<Utc>,
}
