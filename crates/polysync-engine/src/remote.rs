//! Merging events produced by another authority into the local log.

use chrono::{DateTime, Utc};
use polysync_core::{GameState, Phase};
use polysync_protocol::{
    ChainLink, EventSource, EventStatus, ForkEventRecord, ForkReason, MoveEvent, SeqRange,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::engine::GameEngine;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RemoteIngestResult {
    pub accepted_event_ids: Vec<Uuid>,
    pub committed_events: Vec<MoveEvent>,
    pub queued_ranges: Vec<SeqRange>,
    pub duplicate_command_ids: Vec<Uuid>,
    pub orphaned_event_ids: Vec<Uuid>,
    pub forked_events: Vec<ForkEventRecord>,
    pub final_state: GameState,
    pub phase: Phase,
}

enum Verdict {
    Duplicate,
    Fork(ForkEventRecord),
    Commit(Box<GameState>, MoveEvent),
    /// Chain mismatch; also degrades the engine.
    Tampered,
    Invalid(&'static str),
    Ahead,
}

impl GameEngine {
    /// Folds a batch of remote events into the log in `(coordination_seq, created_at)` order.
    ///
    /// Known commands and occupied positions are duplicates or forks; the next position is
    /// applied and chain-checked; anything further ahead opens a gap.
    pub fn apply_remote_events(
        &mut self,
        batch: &[MoveEvent],
        now: DateTime<Utc>,
    ) -> RemoteIngestResult {
        let mut ordered: Vec<&MoveEvent> = batch.iter().collect();
        ordered.sort_by_key(|e| e.ordering_key());

        let mut accepted_event_ids = Vec::new();
        let mut committed_events = Vec::new();
        let mut queued_ranges = Vec::new();
        let mut duplicate_command_ids = Vec::new();
        let mut orphaned_event_ids = Vec::new();
        let mut forked_events = Vec::new();

        for remote in ordered {
            match self.judge_remote(remote, now) {
                Verdict::Duplicate => {
                    debug!(command_id = %remote.command_id, "remote duplicate");
                    duplicate_command_ids.push(remote.command_id);
                }
                Verdict::Fork(record) => {
                    warn!(
                        coordination_seq = record.coordination_seq,
                        reason = record.reason.as_str(),
                        remote_event_id = %remote.event_id,
                        "fork detected"
                    );
                    self.record_orphan(remote);
                    orphaned_event_ids.push(remote.event_id);
                    self.forks.push(record.clone());
                    forked_events.push(record);
                }
                Verdict::Tampered => {
                    warn!(
                        event_id = %remote.event_id,
                        coordination_seq = remote.coordination_seq,
                        "remote chain hash mismatch"
                    );
                    self.record_orphan(remote);
                    orphaned_event_ids.push(remote.event_id);
                    self.state.begin_repair(now);
                }
                Verdict::Invalid(why) => {
                    warn!(event_id = %remote.event_id, why, "remote event invalid");
                    self.record_orphan(remote);
                    orphaned_event_ids.push(remote.event_id);
                }
                Verdict::Commit(next, event) => {
                    let was_repair = self.state.phase == Phase::Repair;
                    let event_id = event.event_id;
                    committed_events.push(event.clone());
                    self.commit(*next, event);
                    if was_repair && !self.state.phase.is_terminal() {
                        self.state.phase = Phase::Reconciling;
                    }
                    accepted_event_ids.push(event_id);
                }
                Verdict::Ahead => {
                    let range =
                        self.register_gap(self.state.coordination_seq + 1, remote.coordination_seq, now);
                    debug!(%range, "remote event ahead of local log");
                    queued_ranges.push(range);
                }
            }
        }

        if !self.state.event_gaps.is_empty() && !self.state.phase.is_terminal() {
            self.state.phase = Phase::Reconciling;
        }

        if !committed_events.is_empty() || !orphaned_event_ids.is_empty() {
            info!(
                committed = committed_events.len(),
                orphaned = orphaned_event_ids.len(),
                queued = queued_ranges.len(),
                phase = ?self.state.phase,
                "remote batch merged"
            );
        }

        RemoteIngestResult {
            accepted_event_ids,
            committed_events,
            queued_ranges,
            duplicate_command_ids,
            orphaned_event_ids,
            forked_events,
            final_state: self.state.clone(),
            phase: self.state.phase,
        }
    }

    fn judge_remote(&self, remote: &MoveEvent, now: DateTime<Utc>) -> Verdict {
        if let Some(local) = self.event_for_command(&remote.command_id) {
            if local.command_fingerprint == remote.command_fingerprint {
                return Verdict::Duplicate;
            }
            return Verdict::Fork(fork_record(
                local,
                remote,
                ForkReason::DuplicateCommandIdDiffFingerprint,
                now,
            ));
        }

        if let Some(local) = self.event_at_seq(remote.coordination_seq) {
            if local.command_fingerprint == remote.command_fingerprint {
                return Verdict::Duplicate;
            }
            return Verdict::Fork(fork_record(
                local,
                remote,
                ForkReason::CoordinationConflict,
                now,
            ));
        }

        let next_seq = self.state.coordination_seq + 1;
        if remote.coordination_seq > next_seq {
            return Verdict::Ahead;
        }
        if remote.coordination_seq < next_seq {
            // Behind the log but not held locally (folded into a snapshot); cannot be verified.
            return Verdict::Invalid("stale coordination seq");
        }

        if !self.state.is_participant(remote.player_id) {
            return Verdict::Invalid("unknown player");
        }
        if self.state.phase != Phase::Finished
            && self.state.active_player() != Some(remote.player_id)
        {
            return Verdict::Invalid("not the active player");
        }

        let mut scratch = self.state.clone();
        if scratch
            .apply_with(&self.catalog, &remote.payload, remote.player_id, self.pass_check())
            .is_some()
        {
            return Verdict::Invalid("rules rejected payload");
        }

        let prev_chain_hash = self.state.state_hash_chain.last_chain_hash;
        let expected = ChainLink {
            prev_chain_hash: &prev_chain_hash,
            fingerprint_before: &self.state.state_fingerprint,
            fingerprint_after: &scratch.state_fingerprint,
            command_fingerprint: &remote.command_fingerprint,
            coordination_seq: remote.coordination_seq,
            expected_seq: remote.expected_seq,
            authority_id: &remote.coordination_authority_id,
            player_id: remote.player_id,
        }
        .hash();

        if remote.chain_hash.is_some_and(|declared| declared != expected) {
            return Verdict::Tampered;
        }

        let mut event = remote.clone();
        event.source = EventSource::Remote;
        event.status = EventStatus::Committed;
        event.state_fingerprint_before = self.state.state_fingerprint;
        event.state_fingerprint_after = scratch.state_fingerprint;
        event.prev_chain_hash = prev_chain_hash;
        event.chain_hash = Some(expected);
        Verdict::Commit(Box::new(scratch), event)
    }
}

fn fork_record(
    local: &MoveEvent,
    remote: &MoveEvent,
    reason: ForkReason,
    now: DateTime<Utc>,
) -> ForkEventRecord {
    ForkEventRecord {
        coordination_seq: remote.coordination_seq,
        local_event_id: local.event_id,
        remote_event_id: remote.event_id,
        local_fingerprint: local.command_fingerprint,
        remote_fingerprint: remote.command_fingerprint,
        reason,
        detected_at: now,
    }
}
