//! Authoritative command pipeline for one game.
//!
//! A [`GameEngine`] owns the canonical [`GameState`], the committed event log and the indices the
//! pipeline needs (command id, coordination seq, per-player nonces). It is single-writer: callers
//! serialise access with their own lock or actor. Every validation step runs against the
//! committed state; a move is applied to a scratch clone and only swapped in once it passed.

use std::collections::HashMap;
use std::sync::Arc;

use chrono::{DateTime, Utc};
use polysync_core::{GameState, PassCheck, Phase, PieceCatalog, Placement};
use polysync_protocol::{
    AuthorityId, ChainLink, Coord, Digest, EventSource, EventStatus, ForkEventRecord, GameCommand,
    MoveEvent, PieceId, PlayerId, SeqRange, SubmitRejectReason, PIECE_SET_VERSION, RULES_VERSION,
    SCHEMA_VERSION,
};
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::rate_limit::RateLimiter;
use crate::replay::{EventReplayService, RecoveryResult};
use crate::signature::{PermissiveVerifier, SignatureVerifier};

/// Outcome of [`GameEngine::submit`]. Every variant carries the state after the call.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum GameSubmitStatus {
    Accepted {
        state: GameState,
        event_id: Uuid,
    },
    /// The command is ahead of (or behind) the local sequence; a gap was registered.
    Queued {
        state: GameState,
        range: SeqRange,
    },
    /// Already committed under the same command id and fingerprint.
    Duplicate {
        state: GameState,
        event_id: Uuid,
    },
    Rejected {
        state: GameState,
        reason: SubmitRejectReason,
        retryable: bool,
    },
    /// The engine is not the local authority and the sender is not the current one.
    AuthorityMismatch {
        state: GameState,
    },
}

impl GameSubmitStatus {
    pub fn state(&self) -> &GameState {
        match self {
            GameSubmitStatus::Accepted { state, .. }
            | GameSubmitStatus::Queued { state, .. }
            | GameSubmitStatus::Duplicate { state, .. }
            | GameSubmitStatus::Rejected { state, .. }
            | GameSubmitStatus::AuthorityMismatch { state } => state,
        }
    }

    pub fn is_accepted(&self) -> bool {
        matches!(self, GameSubmitStatus::Accepted { .. })
    }

    pub fn event_id(&self) -> Option<Uuid> {
        match self {
            GameSubmitStatus::Accepted { event_id, .. }
            | GameSubmitStatus::Duplicate { event_id, .. } => Some(*event_id),
            _ => None,
        }
    }

    pub fn reject_reason(&self) -> Option<SubmitRejectReason> {
        match self {
            GameSubmitStatus::Rejected { reason, .. } => Some(*reason),
            _ => None,
        }
    }

    pub fn label(&self) -> &'static str {
        match self {
            GameSubmitStatus::Accepted { .. } => "accepted",
            GameSubmitStatus::Queued { .. } => "queued",
            GameSubmitStatus::Duplicate { .. } => "duplicate",
            GameSubmitStatus::Rejected { .. } => "rejected",
            GameSubmitStatus::AuthorityMismatch { .. } => "authority_mismatch",
        }
    }
}

pub struct GameEngine {
    pub(crate) config: EngineConfig,
    pub(crate) catalog: Arc<PieceCatalog>,
    verifier: Box<dyn SignatureVerifier>,
    pub(crate) state: GameState,
    pub(crate) events: Vec<MoveEvent>,
    pub(crate) by_command: HashMap<Uuid, usize>,
    pub(crate) by_seq: HashMap<u64, usize>,
    /// Per player: nonce -> command id that used it.
    nonces: HashMap<PlayerId, HashMap<i64, Uuid>>,
    rate_limiter: RateLimiter,
    pub(crate) orphans: Vec<MoveEvent>,
    pub(crate) forks: Vec<ForkEventRecord>,
}

impl std::fmt::Debug for GameEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("GameEngine")
            .field("game_id", &self.state.game_id)
            .field("phase", &self.state.phase)
            .field("coordination_seq", &self.state.coordination_seq)
            .field("events", &self.events.len())
            .finish_non_exhaustive()
    }
}

impl GameEngine {
    pub fn new(
        state: GameState,
        catalog: Arc<PieceCatalog>,
        verifier: Box<dyn SignatureVerifier>,
        config: EngineConfig,
    ) -> Self {
        let rate_limiter = RateLimiter::per_second(config.max_submit_per_sec);
        Self {
            config,
            catalog,
            verifier,
            state,
            events: Vec::new(),
            by_command: HashMap::new(),
            by_seq: HashMap::new(),
            nonces: HashMap::new(),
            rate_limiter,
            orphans: Vec::new(),
            forks: Vec::new(),
        }
    }

    /// Single-device engine: permissive signatures, default config.
    pub fn local(state: GameState, catalog: Arc<PieceCatalog>) -> Self {
        Self::new(
            state,
            catalog,
            Box::new(PermissiveVerifier),
            EngineConfig::default(),
        )
    }

    /// Rebuilds an engine from a recovered state and the events it was built from.
    pub fn restore(
        state: GameState,
        events: Vec<MoveEvent>,
        catalog: Arc<PieceCatalog>,
        verifier: Box<dyn SignatureVerifier>,
        config: EngineConfig,
    ) -> Self {
        let mut engine = Self::new(state, catalog, verifier, config);
        engine.index_events(events);
        engine
    }

    fn index_events(&mut self, events: Vec<MoveEvent>) {
        self.events.clear();
        self.by_command.clear();
        self.by_seq.clear();
        for event in events {
            self.push_event(event);
        }
    }

    fn push_event(&mut self, event: MoveEvent) {
        let idx = self.events.len();
        self.by_command.insert(event.command_id, idx);
        self.by_seq.insert(event.coordination_seq, idx);
        self.events.push(event);
    }

    pub fn state(&self) -> &GameState {
        &self.state
    }

    pub fn phase(&self) -> Phase {
        self.state.phase
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn catalog(&self) -> &Arc<PieceCatalog> {
        &self.catalog
    }

    /// Committed events in coordination order.
    pub fn events(&self) -> &[MoveEvent] {
        &self.events
    }

    pub fn event_for_command(&self, command_id: &Uuid) -> Option<&MoveEvent> {
        self.by_command.get(command_id).map(|&idx| &self.events[idx])
    }

    pub fn event_at_seq(&self, coordination_seq: u64) -> Option<&MoveEvent> {
        self.by_seq
            .get(&coordination_seq)
            .map(|&idx| &self.events[idx])
    }

    pub fn orphans(&self) -> &[MoveEvent] {
        &self.orphans
    }

    pub fn forks(&self) -> &[ForkEventRecord] {
        &self.forks
    }

    pub fn has_any_legal_move(&self, player: PlayerId) -> bool {
        self.state.has_any_legal_move(&self.catalog, player)
    }

    pub fn can_place(
        &self,
        piece_id: &PieceId,
        variant_id: u16,
        origin: Coord,
        player: PlayerId,
    ) -> bool {
        self.state
            .can_place(&self.catalog, piece_id, variant_id, origin, player)
    }

    pub fn legal_placements(&self, player: PlayerId) -> Vec<Placement> {
        self.state.legal_placements(&self.catalog, player)
    }

    pub fn compute_state_fingerprint(&self) -> Digest {
        self.state.compute_state_fingerprint()
    }

    pub(crate) fn pass_check(&self) -> PassCheck {
        if self.config.local_authority {
            PassCheck::Enforce
        } else {
            PassCheck::Skip
        }
    }

    fn reject(&self, reason: SubmitRejectReason) -> GameSubmitStatus {
        GameSubmitStatus::Rejected {
            state: self.state.clone(),
            reason,
            retryable: reason.retryable(),
        }
    }

    /// Validates a command and commits it as one event.
    ///
    /// Checks run in a fixed order and the first failure wins: rate limit, game identity,
    /// versions, signature, authority, nonce, idempotency, sequencing, turn and membership,
    /// rules. Nothing but the rate-limit counter and repair bookkeeping changes unless the
    /// command is committed.
    pub fn submit(&mut self, command: &GameCommand, now: DateTime<Utc>) -> GameSubmitStatus {
        if self.state.phase == Phase::ReadOnly {
            warn!(command_id = %command.command_id, "submit rejected: engine is read-only");
            return self.reject(SubmitRejectReason::ReadOnly);
        }

        if !self.rate_limiter.check(&command.client_id, now) {
            warn!(client_id = %command.client_id, "submit rate limited");
            self.state.begin_repair(now);
            return self.reject(SubmitRejectReason::RateLimit);
        }

        if command.game_id != self.state.game_id {
            warn!(
                expected = %self.state.game_id,
                received = %command.game_id,
                "submit for another game"
            );
            return self.reject(SubmitRejectReason::SchemaMismatch);
        }

        if command.versions() != (SCHEMA_VERSION, RULES_VERSION, PIECE_SET_VERSION) {
            warn!(versions = ?command.versions(), "submit with incompatible versions");
            return self.reject(SubmitRejectReason::VersionMismatch);
        }

        if !self.verifier.verify(command) {
            warn!(command_id = %command.command_id, player = %command.player_id, "bad signature");
            self.state.begin_repair(now);
            return self.reject(SubmitRejectReason::InvalidSignature);
        }

        if !self.config.local_authority && command.client_id != self.state.authority.id {
            warn!(
                client_id = %command.client_id,
                authority = %self.state.authority.id,
                "submit from non-authority"
            );
            return GameSubmitStatus::AuthorityMismatch {
                state: self.state.clone(),
            };
        }

        let used_by = self
            .nonces
            .get(&command.player_id)
            .and_then(|used| used.get(&command.nonce));
        if used_by.is_some_and(|id| *id != command.command_id) {
            warn!(player = %command.player_id, nonce = command.nonce, "nonce replay");
            return self.reject(SubmitRejectReason::ReplayOrDuplicate);
        }

        let fingerprint = command.command_fingerprint();
        if let Some(existing) = self.event_for_command(&command.command_id) {
            if existing.command_fingerprint == fingerprint {
                debug!(command_id = %command.command_id, event_id = %existing.event_id, "duplicate submit");
                return GameSubmitStatus::Duplicate {
                    state: self.state.clone(),
                    event_id: existing.event_id,
                };
            }
            warn!(command_id = %command.command_id, "command id reused with different content");
            return self.reject(SubmitRejectReason::ReplayOrDuplicate);
        }

        if command.expected_seq != self.state.expected_seq {
            let range = SeqRange::new(self.state.expected_seq, command.expected_seq);
            self.register_gap(range.from, range.to, now);
            info!(%range, command_id = %command.command_id, "command out of sequence, queued");
            return GameSubmitStatus::Queued {
                state: self.state.clone(),
                range,
            };
        }

        match self.state.phase {
            Phase::Waiting | Phase::Finished => {
                return self.reject(SubmitRejectReason::InvalidTurn);
            }
            Phase::Playing | Phase::Repair | Phase::Reconciling => {
                if self.state.active_player() != Some(command.player_id) {
                    return self.reject(SubmitRejectReason::InvalidTurn);
                }
            }
            Phase::ReadOnly => {}
        }
        if !self.state.is_participant(command.player_id) {
            return self.reject(SubmitRejectReason::InvalidAuthority);
        }

        let mut scratch = self.state.clone();
        if let Some(reason) =
            scratch.apply_with(&self.catalog, &command.action, command.player_id, PassCheck::Enforce)
        {
            warn!(command_id = %command.command_id, %reason, "move rejected by rules");
            return self.reject(reason);
        }

        let event = self.build_event(command, fingerprint, &scratch, now);
        let event_id = event.event_id;
        self.commit(scratch, event);
        self.nonces
            .entry(command.player_id)
            .or_default()
            .insert(command.nonce, command.command_id);

        debug!(
            %event_id,
            coordination_seq = self.state.coordination_seq,
            player = %command.player_id,
            "command committed"
        );
        GameSubmitStatus::Accepted {
            state: self.state.clone(),
            event_id,
        }
    }

    fn build_event(
        &self,
        command: &GameCommand,
        fingerprint: Digest,
        after: &GameState,
        now: DateTime<Utc>,
    ) -> MoveEvent {
        let prev_chain_hash = self.state.state_hash_chain.last_chain_hash;
        let chain_hash = ChainLink {
            prev_chain_hash: &prev_chain_hash,
            fingerprint_before: &self.state.state_fingerprint,
            fingerprint_after: &after.state_fingerprint,
            command_fingerprint: &fingerprint,
            coordination_seq: after.coordination_seq,
            expected_seq: command.expected_seq,
            authority_id: &self.state.authority.id,
            player_id: command.player_id,
        }
        .hash();

        MoveEvent {
            event_id: Uuid::new_v4(),
            command_id: command.command_id,
            command_fingerprint: fingerprint,
            expected_seq: command.expected_seq,
            coordination_seq: after.coordination_seq,
            coordination_authority_id: self.state.authority.id.clone(),
            source: EventSource::Local,
            player_id: command.player_id,
            payload: command.action.clone(),
            state_fingerprint_before: self.state.state_fingerprint,
            state_fingerprint_after: after.state_fingerprint,
            status: EventStatus::Committed,
            chain_hash: Some(chain_hash),
            prev_chain_hash,
            created_at: now,
        }
    }

    /// Swaps in `next` and appends `event`. The event's chain hash becomes the new tail.
    pub(crate) fn commit(&mut self, mut next: GameState, event: MoveEvent) {
        if let Some(hash) = event.chain_hash {
            next.state_hash_chain.advance(hash);
        }
        next.last_applied_event_id = Some(event.event_id);
        next.reset_repair();
        next.event_gaps.clear();
        next.resume_play();
        self.state = next;
        self.push_event(event);
    }

    /// Installs a newer coordination authority. Stale or equal epochs are ignored.
    pub fn transfer_authority(
        &mut self,
        authority_id: AuthorityId,
        epoch: u64,
        now: DateTime<Utc>,
    ) -> bool {
        if epoch <= self.state.authority.epoch {
            warn!(
                current = self.state.authority.epoch,
                offered = epoch,
                "ignoring stale authority epoch"
            );
            return false;
        }
        info!(authority = %authority_id, epoch, "authority transferred");
        self.state.authority.id = authority_id;
        self.state.authority.epoch = epoch;
        self.state.authority.effective_at = now;
        true
    }

    /// Records that the current state was persisted as a snapshot.
    pub fn mark_snapshot(&mut self) {
        self.state.snapshot_seq = self.state.coordination_seq;
    }

    /// Rebuilds the engine from an externally supplied snapshot and event log. The only way
    /// out of `ReadOnly`.
    ///
    /// Events the snapshot covers stay indexed so redeliveries are duplicates. Nonces belong to
    /// the discarded history and are dropped.
    pub fn resync(
        &mut self,
        snapshot: GameState,
        events: &[MoveEvent],
        now: DateTime<Utc>,
    ) -> RecoveryResult {
        let service = EventReplayService::new(self.catalog.clone(), self.config.local_authority);
        let result = service.replay(events, snapshot, now);

        self.state = result.restored_state.clone();
        self.index_events(result.indexed_events(events));
        self.nonces.clear();
        self.orphans.extend(result.orphaned_events.iter().cloned());
        info!(
            coordination_seq = self.state.coordination_seq,
            orphaned = result.orphaned_events.len(),
            phase = ?self.state.phase,
            "engine resynchronised"
        );
        result
    }

    pub(crate) fn record_orphan(&mut self, event: &MoveEvent) {
        let mut orphan = event.clone();
        orphan.status = EventStatus::Orphan;
        self.orphans.push(orphan);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::signature::HmacVerifier;
    use chrono::Duration;
    use polysync_protocol::{Action, ClientId, GameId};

    fn t0() -> DateTime<Utc> {
        DateTime::from_timestamp(1_700_000_000, 0).unwrap()
    }

    fn engine_with(config: EngineConfig) -> GameEngine {
        let catalog = Arc::new(PieceCatalog::standard());
        let state = GameState::new(
            GameId::new("G"),
            [PlayerId::Blue, PlayerId::Yellow],
            ClientId::new("Blue"),
            &catalog,
        );
        GameEngine::new(state, catalog, Box::new(PermissiveVerifier), config)
    }

    fn engine() -> GameEngine {
        engine_with(EngineConfig::default())
    }

    fn cmd(player: PlayerId, seq: u64, action: Action, nonce: i64) -> GameCommand {
        GameCommand::new(
            GameId::new("G"),
            ClientId::new(player.as_str()),
            player,
            seq,
            action,
            t0(),
            nonce,
        )
    }

    fn blue_opening() -> GameCommand {
        cmd(PlayerId::Blue, 0, Action::place("mono-1", 0, Coord::new(0, 0)), 1)
    }

    #[test]
    fn accepted_move_extends_chain_from_genesis() {
        let mut engine = engine();
        let status = engine.submit(&blue_opening(), t0());
        assert!(status.is_accepted(), "{status:?}");

        let event = &engine.events()[0];
        assert_eq!(event.coordination_seq, 1);
        assert_eq!(event.prev_chain_hash, Digest::ZERO);
        assert!(event.chain_is_intact());
        assert_eq!(Some(event.event_id), status.event_id());
        assert_eq!(
            engine.state().state_hash_chain.last_chain_hash,
            event.chain_hash.unwrap()
        );
        assert_eq!(engine.state().last_applied_event_id, Some(event.event_id));
    }

    #[test]
    fn version_and_game_checks_come_before_signature() {
        let catalog = Arc::new(PieceCatalog::standard());
        let state = GameState::new(
            GameId::new("G"),
            [PlayerId::Blue, PlayerId::Yellow],
            ClientId::new("Blue"),
            &catalog,
        );
        let mut engine = GameEngine::new(
            state,
            catalog,
            Box::new(HmacVerifier::default()),
            EngineConfig::default(),
        );

        let mut other_game = blue_opening();
        other_game.game_id = GameId::new("other");
        assert_eq!(
            engine.submit(&other_game, t0()).reject_reason(),
            Some(SubmitRejectReason::SchemaMismatch)
        );

        let mut old_rules = blue_opening();
        old_rules.rules_version = 0;
        assert_eq!(
            engine.submit(&old_rules, t0()).reject_reason(),
            Some(SubmitRejectReason::VersionMismatch)
        );
        assert_eq!(engine.phase(), Phase::Playing);

        assert_eq!(
            engine.submit(&blue_opening(), t0()).reject_reason(),
            Some(SubmitRejectReason::InvalidSignature)
        );
        assert_eq!(engine.phase(), Phase::Repair);
        assert!(engine.events().is_empty());
    }

    #[test]
    fn rate_limit_is_retryable_and_degrades_phase() {
        let mut engine = engine_with(EngineConfig {
            max_submit_per_sec: 1,
            ..EngineConfig::default()
        });
        let mut late = blue_opening();
        late.game_id = GameId::new("elsewhere");
        engine.submit(&late, t0());

        let status = engine.submit(&blue_opening(), t0());
        match status {
            GameSubmitStatus::Rejected {
                reason, retryable, ..
            } => {
                assert_eq!(reason, SubmitRejectReason::RateLimit);
                assert!(retryable);
            }
            other => panic!("expected rate limit, got {other:?}"),
        }
        assert_eq!(engine.phase(), Phase::Repair);

        let later = engine.submit(&blue_opening(), t0() + Duration::seconds(1));
        assert!(later.is_accepted());
        assert_eq!(engine.phase(), Phase::Playing);
    }

    #[test]
    fn remote_authority_mode_checks_sender() {
        let mut engine = engine_with(EngineConfig::remote_authority());
        let mut from_device = blue_opening();
        from_device.client_id = ClientId::new("tablet");
        assert!(matches!(
            engine.submit(&from_device, t0()),
            GameSubmitStatus::AuthorityMismatch { .. }
        ));
        assert!(engine.submit(&blue_opening(), t0()).is_accepted());
    }

    #[test]
    fn nonce_reuse_by_a_new_command_is_rejected() {
        let mut engine = engine();
        engine.submit(&blue_opening(), t0());

        let reuse = cmd(PlayerId::Blue, 2, Action::place("domino-2", 0, Coord::new(1, 1)), 1);
        assert_eq!(
            engine.submit(&reuse, t0()).reject_reason(),
            Some(SubmitRejectReason::ReplayOrDuplicate)
        );
    }

    #[test]
    fn reused_command_id_with_new_content_is_rejected() {
        let mut engine = engine();
        let first = blue_opening();
        engine.submit(&first, t0());

        let mut tampered = first.clone();
        tampered.action = Action::place("domino-2", 0, Coord::new(0, 0));
        assert_eq!(
            engine.submit(&tampered, t0()).reject_reason(),
            Some(SubmitRejectReason::ReplayOrDuplicate)
        );
        assert_eq!(engine.state().coordination_seq, 1);
    }

    #[test]
    fn turn_check_precedes_rules() {
        let mut engine = engine();
        let yellow_first = cmd(PlayerId::Yellow, 0, Action::place("mono-1", 0, Coord::new(19, 19)), 1);
        assert_eq!(
            engine.submit(&yellow_first, t0()).reject_reason(),
            Some(SubmitRejectReason::InvalidTurn)
        );

        let red = cmd(PlayerId::Red, 0, Action::Pass, 1);
        assert_eq!(
            engine.submit(&red, t0()).reject_reason(),
            Some(SubmitRejectReason::InvalidTurn)
        );

        let early_pass = cmd(PlayerId::Blue, 0, Action::Pass, 2);
        assert_eq!(
            engine.submit(&early_pass, t0()).reject_reason(),
            Some(SubmitRejectReason::IllegalPass)
        );
        assert_eq!(engine.state().coordination_seq, 0);
    }

    #[test]
    fn rejected_rules_do_not_burn_the_nonce() {
        let mut engine = engine();
        let bad = cmd(PlayerId::Blue, 0, Action::place("mono-1", 0, Coord::new(4, 4)), 7);
        assert_eq!(
            engine.submit(&bad, t0()).reject_reason(),
            Some(SubmitRejectReason::InvalidPlacement)
        );
        let good = cmd(PlayerId::Blue, 0, Action::place("mono-1", 0, Coord::new(0, 0)), 7);
        assert!(engine.submit(&good, t0()).is_accepted());
    }

    #[test]
    fn read_only_rejects_everything() {
        let mut engine = engine();
        engine.state.begin_read_only(t0());
        let status = engine.submit(&blue_opening(), t0());
        assert_eq!(status.reject_reason(), Some(SubmitRejectReason::ReadOnly));
        assert!(!SubmitRejectReason::ReadOnly.retryable());
    }

    #[test]
    fn authority_transfer_requires_newer_epoch() {
        let mut engine = engine();
        assert!(!engine.transfer_authority(ClientId::new("Yellow"), 0, t0()));
        assert!(engine.transfer_authority(ClientId::new("Yellow"), 1, t0()));
        assert_eq!(engine.state().authority.id, ClientId::new("Yellow"));
        assert_eq!(engine.state().authority.effective_at, t0());
        assert!(!engine.transfer_authority(ClientId::new("Blue"), 1, t0()));
    }

    #[test]
    fn queries_delegate_to_state() {
        let engine = engine();
        assert!(engine.has_any_legal_move(PlayerId::Blue));
        assert!(engine.can_place(&PieceId::new("mono-1"), 0, Coord::new(0, 0), PlayerId::Blue));
        assert_eq!(engine.compute_state_fingerprint(), engine.state().state_fingerprint);
        assert!(!engine.legal_placements(PlayerId::Yellow).is_empty());
    }

    #[test]
    fn resync_keeps_snapshot_events_known() {
        let mut authority = engine();
        authority.submit(&blue_opening(), t0());
        let log = authority.events().to_vec();

        let mut replica = engine();
        replica.state.begin_read_only(t0());
        let recovery = replica.resync(authority.state().clone(), &log, t0());
        assert_eq!(recovery.skipped_event_ids, vec![log[0].event_id]);
        assert_eq!(replica.events().len(), 1);

        let again = replica.apply_remote_events(&log, t0());
        assert_eq!(again.duplicate_command_ids, vec![log[0].command_id]);
        assert!(again.orphaned_event_ids.is_empty());
    }

    #[test]
    fn resync_forgets_nonces_of_discarded_history() {
        let catalog = Arc::new(PieceCatalog::standard());
        let mut engine = engine();
        assert!(engine.submit(&blue_opening(), t0()).is_accepted());

        let genesis = GameState::new(
            GameId::new("G"),
            [PlayerId::Blue, PlayerId::Yellow],
            ClientId::new("Blue"),
            &catalog,
        );
        engine.resync(genesis, &[], t0());
        assert_eq!(engine.state().coordination_seq, 0);

        let retry = blue_opening();
        assert_eq!(retry.nonce, 1);
        let status = engine.submit(&retry, t0() + Duration::seconds(1));
        assert!(status.is_accepted(), "{status:?}");
    }
}
