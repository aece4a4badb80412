//! Rebuilding a game from a snapshot plus its committed event log.

use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use polysync_core::{GameState, PassCheck, Phase, PieceCatalog};
use polysync_protocol::{EventStatus, MoveEvent};
use tracing::{info, warn};
use uuid::Uuid;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RecoveryResult {
    pub restored_state: GameState,
    /// Events that failed sequencing, rules or hash verification, marked `Orphan`.
    pub orphaned_events: Vec<MoveEvent>,
    /// Events the snapshot already contained.
    pub skipped_event_ids: Vec<Uuid>,
    /// Events re-applied on top of the snapshot, in order.
    pub applied_events: Vec<MoveEvent>,
}

impl RecoveryResult {
    /// Events a recovered engine indexes: those the snapshot already covered, one per position,
    /// followed by the re-applied ones.
    pub fn indexed_events(&self, events: &[MoveEvent]) -> Vec<MoveEvent> {
        let mut covered: Vec<&MoveEvent> = events
            .iter()
            .filter(|e| self.skipped_event_ids.contains(&e.event_id))
            .collect();
        covered.sort_by_key(|e| e.ordering_key());

        let mut seen = BTreeSet::new();
        let mut indexed: Vec<MoveEvent> = covered
            .into_iter()
            .filter(|e| seen.insert(e.coordination_seq))
            .cloned()
            .collect();
        indexed.extend(self.applied_events.iter().cloned());
        indexed
    }
}

/// Re-applies committed events and verifies every fingerprint and chain hash on the way.
#[derive(Clone, Debug)]
pub struct EventReplayService {
    catalog: Arc<PieceCatalog>,
    local_authority: bool,
}

impl EventReplayService {
    pub fn new(catalog: Arc<PieceCatalog>, local_authority: bool) -> Self {
        Self {
            catalog,
            local_authority,
        }
    }

    pub fn replay(
        &self,
        events: &[MoveEvent],
        snapshot: GameState,
        now: DateTime<Utc>,
    ) -> RecoveryResult {
        let mut committed: Vec<&MoveEvent> = events.iter().filter(|e| e.is_committed()).collect();
        committed.sort_by_key(|e| e.ordering_key());

        let pass_check = if self.local_authority {
            PassCheck::Enforce
        } else {
            PassCheck::Skip
        };

        let base_seq = snapshot.coordination_seq;
        let mut restored = snapshot;
        let mut orphaned_events = Vec::new();
        let mut skipped_event_ids = Vec::new();
        let mut applied_events = Vec::new();

        for event in committed {
            if event.coordination_seq <= base_seq {
                skipped_event_ids.push(event.event_id);
                continue;
            }

            match self.reapply(&restored, event, pass_check) {
                Ok(next) => {
                    restored = next;
                    applied_events.push(event.clone());
                }
                Err(why) => {
                    warn!(
                        event_id = %event.event_id,
                        coordination_seq = event.coordination_seq,
                        why,
                        "replay orphaned event"
                    );
                    restored.begin_repair(now);
                    let mut orphan = event.clone();
                    orphan.status = EventStatus::Orphan;
                    orphaned_events.push(orphan);
                }
            }
        }

        restored.event_gaps.clear();
        if restored.phase != Phase::Finished {
            restored.phase = if restored.turn_order.len() < 2 {
                Phase::Waiting
            } else {
                Phase::Playing
            };
        }

        info!(
            game_id = %restored.game_id,
            coordination_seq = restored.coordination_seq,
            applied = applied_events.len(),
            orphaned = orphaned_events.len(),
            skipped = skipped_event_ids.len(),
            "replay complete"
        );

        RecoveryResult {
            restored_state: restored,
            orphaned_events,
            skipped_event_ids,
            applied_events,
        }
    }

    fn reapply(
        &self,
        current: &GameState,
        event: &MoveEvent,
        pass_check: PassCheck,
    ) -> Result<GameState, &'static str> {
        if event.coordination_seq != current.coordination_seq + 1 {
            return Err("coordination seq out of order");
        }
        if !current.is_participant(event.player_id) {
            return Err("unknown player");
        }

        let mut next = current.clone();
        if next
            .apply_with(&self.catalog, &event.payload, event.player_id, pass_check)
            .is_some()
        {
            return Err("payload rejected by rules");
        }

        if next.state_fingerprint != event.state_fingerprint_after {
            return Err("state fingerprint mismatch");
        }

        let mut link = event.chain_link();
        link.prev_chain_hash = &current.state_hash_chain.last_chain_hash;
        link.fingerprint_before = &current.state_fingerprint;
        let expected = link.hash();
        if event.chain_hash != Some(expected) {
            return Err("chain hash mismatch");
        }

        next.state_hash_chain.advance(expected);
        next.last_applied_event_id = Some(event.event_id);
        Ok(next)
    }
}
