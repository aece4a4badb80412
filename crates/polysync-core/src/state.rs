//! Canonical game state and rule enforcement.
//!
//! `GameState` is plain data: it is cloned for scratch application, serialized as a snapshot and
//! compared by fingerprint. The piece catalog is passed in by reference from whoever owns the
//! rules model, so the state never carries (or hides) a shared cache.

use std::collections::{BTreeMap, BTreeSet};

use chrono::{DateTime, Utc};
use polysync_protocol::{
    Action, AuthorityId, CanonicalWriter, Coord, Digest, EventGap, GameId, PieceId, PlayerId,
    SubmitRejectReason, SCHEMA_VERSION,
};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::board::{starting_corner, Board, BOARD_SIZE};
use crate::pieces::PieceCatalog;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Phase {
    /// Fewer than two players.
    Waiting,
    Playing,
    /// Degraded: a gap, bad signature or rate-limit breach is being worked off.
    Repair,
    /// Remote history is being merged and gaps remain open.
    Reconciling,
    /// Terminal until externally resynchronised.
    ReadOnly,
    Finished,
}

impl Phase {
    pub fn is_terminal(self) -> bool {
        matches!(self, Phase::ReadOnly | Phase::Finished)
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Authority {
    pub id: AuthorityId,
    pub epoch: u64,
    pub effective_at: DateTime<Utc>,
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct HashChain {
    pub prev_chain_hash: Digest,
    pub last_chain_hash: Digest,
}

impl HashChain {
    pub fn advance(&mut self, next: Digest) {
        self.prev_chain_hash = self.last_chain_hash;
        self.last_chain_hash = next;
    }
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepairContext {
    pub retry_count: u32,
    pub first_failure_at: Option<DateTime<Utc>>,
    pub last_failure_at: Option<DateTime<Utc>>,
    pub consecutive_failures: u32,
}

impl RepairContext {
    fn record_failure(&mut self, now: DateTime<Utc>) {
        self.consecutive_failures = self.consecutive_failures.saturating_add(1);
        self.first_failure_at.get_or_insert(now);
        self.last_failure_at = Some(now);
    }
}

/// Why a placement is illegal. Collapsed to `InvalidPlacement` at the pipeline boundary.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Error)]
pub enum PlacementError {
    #[error("player is not part of this game")]
    UnknownPlayer,
    #[error("unknown piece")]
    UnknownPiece,
    #[error("piece already placed")]
    PieceUnavailable,
    #[error("unknown variant")]
    UnknownVariant,
    #[error("piece leaves the board")]
    OutOfBounds,
    #[error("cell already occupied")]
    Occupied,
    #[error("piece shares an edge with the player's own piece")]
    EdgeContact,
    #[error("first piece must cover the player's starting corner")]
    MissingStartCorner,
    #[error("piece must touch the player's own piece at a corner")]
    NoCornerContact,
}

/// Whether `apply` checks that a pass is forced.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PassCheck {
    Enforce,
    Skip,
}

/// A legal move, as enumerated for trainers and UI highlights.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Placement {
    pub piece_id: PieceId,
    pub variant_id: u16,
    pub origin: Coord,
}

impl Placement {
    pub fn into_action(self) -> Action {
        Action::Place {
            piece_id: self.piece_id,
            variant_id: self.variant_id,
            origin: self.origin,
        }
    }
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct GameState {
    pub game_id: GameId,
    pub schema_version: u16,
    pub phase: Phase,
    pub authority: Authority,
    pub turn_order: Vec<PlayerId>,
    pub active_index: usize,
    pub board: Board,
    pub remaining_pieces: BTreeMap<PlayerId, BTreeSet<PieceId>>,
    pub consecutive_passes: u32,
    /// Next local command sequence number.
    pub expected_seq: u64,
    /// Position in the authoritative event log.
    pub coordination_seq: u64,
    pub state_fingerprint: Digest,
    pub snapshot_seq: u64,
    pub last_applied_event_id: Option<Uuid>,
    pub state_hash_chain: HashChain,
    pub repair_context: RepairContext,
    pub event_gaps: Vec<EventGap>,
}

impl GameState {
    pub fn new(
        game_id: GameId,
        players: impl IntoIterator<Item = PlayerId>,
        authority_id: AuthorityId,
        catalog: &PieceCatalog,
    ) -> Self {
        let mut turn_order: Vec<PlayerId> = Vec::new();
        for p in players {
            if !turn_order.contains(&p) {
                turn_order.push(p);
            }
        }

        let full_set: BTreeSet<PieceId> = catalog.ids().cloned().collect();
        let remaining_pieces = turn_order
            .iter()
            .map(|&p| (p, full_set.clone()))
            .collect();

        let phase = if turn_order.len() < 2 {
            Phase::Waiting
        } else {
            Phase::Playing
        };

        let mut state = Self {
            game_id,
            schema_version: SCHEMA_VERSION,
            phase,
            authority: Authority {
                id: authority_id,
                epoch: 0,
                effective_at: DateTime::<Utc>::UNIX_EPOCH,
            },
            turn_order,
            active_index: 0,
            board: Board::new(),
            remaining_pieces,
            consecutive_passes: 0,
            expected_seq: 0,
            coordination_seq: 0,
            state_fingerprint: Digest::ZERO,
            snapshot_seq: 0,
            last_applied_event_id: None,
            state_hash_chain: HashChain::default(),
            repair_context: RepairContext::default(),
            event_gaps: Vec::new(),
        };
        state.state_fingerprint = state.compute_state_fingerprint();
        state
    }

    pub fn active_player(&self) -> Option<PlayerId> {
        self.turn_order.get(self.active_index).copied()
    }

    pub fn is_participant(&self, player: PlayerId) -> bool {
        self.turn_order.contains(&player)
    }

    pub fn remaining(&self, player: PlayerId) -> Option<&BTreeSet<PieceId>> {
        self.remaining_pieces.get(&player)
    }

    /// Digest over the logical game content only. Bookkeeping (phase, gaps, chain, repair
    /// counters, authority) is excluded so independently built states compare equal.
    pub fn compute_state_fingerprint(&self) -> Digest {
        let mut w = CanonicalWriter::new();
        w.append_u32(self.turn_order.len() as u32);
        for p in &self.turn_order {
            w.append_u8(p.code());
        }
        w.append_u32(self.active_index as u32)
            .append_u32(self.consecutive_passes)
            .append_u64(self.expected_seq)
            .append_u64(self.coordination_seq)
            .append_data(&self.board.canonical_bytes());
        for p in &self.turn_order {
            let count = self.remaining_pieces.get(p).map_or(0, BTreeSet::len);
            w.append_u16(count as u16);
        }
        w.sha256()
    }

    /// Cells a placement would cover, or why it is illegal.
    pub fn check_placement(
        &self,
        catalog: &PieceCatalog,
        piece_id: &PieceId,
        variant_id: u16,
        origin: Coord,
        player: PlayerId,
    ) -> Result<Vec<Coord>, PlacementError> {
        let remaining = self
            .remaining_pieces
            .get(&player)
            .ok_or(PlacementError::UnknownPlayer)?;
        if !catalog.contains(piece_id) {
            return Err(PlacementError::UnknownPiece);
        }
        if !remaining.contains(piece_id) {
            return Err(PlacementError::PieceUnavailable);
        }
        let variant = catalog
            .variant(piece_id, variant_id)
            .ok_or(PlacementError::UnknownVariant)?;

        let cells: Vec<Coord> = variant
            .iter()
            .map(|c| origin.offset(c.x, c.y))
            .collect();
        self.check_cells(&cells, player)?;
        Ok(cells)
    }

    fn check_cells(&self, cells: &[Coord], player: PlayerId) -> Result<(), PlacementError> {
        for &c in cells {
            if !Board::in_bounds(c) {
                return Err(PlacementError::OutOfBounds);
            }
            if self.board.owner(c).is_some() {
                return Err(PlacementError::Occupied);
            }
            if self.board.touches_edge_of(c, player) {
                return Err(PlacementError::EdgeContact);
            }
        }

        if !self.board.has_any(player) {
            let corner = starting_corner(player);
            if !cells.contains(&corner) {
                return Err(PlacementError::MissingStartCorner);
            }
        } else if !cells
            .iter()
            .any(|&c| self.board.touches_corner_of(c, player))
        {
            return Err(PlacementError::NoCornerContact);
        }
        Ok(())
    }

    pub fn can_place(
        &self,
        catalog: &PieceCatalog,
        piece_id: &PieceId,
        variant_id: u16,
        origin: Coord,
        player: PlayerId,
    ) -> bool {
        self.check_placement(catalog, piece_id, variant_id, origin, player)
            .is_ok()
    }

    /// Exhaustive scan; stops at the first legal placement.
    pub fn has_any_legal_move(&self, catalog: &PieceCatalog, player: PlayerId) -> bool {
        self.scan_placements(catalog, player, |_| true)
    }

    pub fn legal_placements(&self, catalog: &PieceCatalog, player: PlayerId) -> Vec<Placement> {
        let mut out = Vec::new();
        self.scan_placements(catalog, player, |p| {
            out.push(p);
            false
        });
        out
    }

    /// Visits legal placements until `visit` returns true. Returns whether it did.
    fn scan_placements(
        &self,
        catalog: &PieceCatalog,
        player: PlayerId,
        mut visit: impl FnMut(Placement) -> bool,
    ) -> bool {
        let Some(remaining) = self.remaining_pieces.get(&player) else {
            return false;
        };
        for piece_id in remaining {
            let Some(variants) = catalog.variants(piece_id) else {
                continue;
            };
            for (variant_id, variant) in variants.iter().enumerate() {
                let width = variant.iter().map(|c| c.x).max().unwrap_or(0) + 1;
                let height = variant.iter().map(|c| c.y).max().unwrap_or(0) + 1;
                for y in 0..=(BOARD_SIZE - height) {
                    for x in 0..=(BOARD_SIZE - width) {
                        let origin = Coord::new(x, y);
                        let cells: Vec<Coord> =
                            variant.iter().map(|c| origin.offset(c.x, c.y)).collect();
                        if self.check_cells(&cells, player).is_err() {
                            continue;
                        }
                        let placement = Placement {
                            piece_id: piece_id.clone(),
                            variant_id: variant_id as u16,
                            origin,
                        };
                        if visit(placement) {
                            return true;
                        }
                    }
                }
            }
        }
        false
    }

    /// Applies an action for `player`, enforcing the pass rule.
    pub fn apply(
        &mut self,
        catalog: &PieceCatalog,
        action: &Action,
        player: PlayerId,
    ) -> Option<SubmitRejectReason> {
        self.apply_with(catalog, action, player, PassCheck::Enforce)
    }

    /// Applies an action. On rejection the state is left untouched.
    pub fn apply_with(
        &mut self,
        catalog: &PieceCatalog,
        action: &Action,
        player: PlayerId,
        pass_check: PassCheck,
    ) -> Option<SubmitRejectReason> {
        if !self.is_participant(player) {
            return Some(SubmitRejectReason::InvalidAuthority);
        }
        if self.phase == Phase::Finished {
            return Some(SubmitRejectReason::InvalidTurn);
        }

        match action {
            Action::Pass => {
                if pass_check == PassCheck::Enforce && self.has_any_legal_move(catalog, player) {
                    return Some(SubmitRejectReason::IllegalPass);
                }
                self.consecutive_passes = self.consecutive_passes.saturating_add(1);
            }
            Action::Place {
                piece_id,
                variant_id,
                origin,
            } => {
                let cells =
                    match self.check_placement(catalog, piece_id, *variant_id, *origin, player) {
                        Ok(cells) => cells,
                        Err(_) => return Some(SubmitRejectReason::InvalidPlacement),
                    };
                for c in cells {
                    self.board.set(c, player);
                }
                if let Some(set) = self.remaining_pieces.get_mut(&player) {
                    set.remove(piece_id);
                }
                self.consecutive_passes = 0;
            }
        }

        let players = self.turn_order.len();
        self.active_index = (self.active_index + 1) % players;
        if self.consecutive_passes as usize >= players {
            self.phase = Phase::Finished;
        }
        self.expected_seq += 1;
        self.coordination_seq += 1;
        self.state_fingerprint = self.compute_state_fingerprint();
        None
    }

    /// Enter (or stay in) `Repair`. Terminal phases are never downgraded.
    pub fn begin_repair(&mut self, now: DateTime<Utc>) {
        self.repair_context.record_failure(now);
        if !self.phase.is_terminal() {
            self.phase = Phase::Repair;
        }
    }

    /// Enter `ReadOnly` unless the game already finished.
    pub fn begin_read_only(&mut self, now: DateTime<Utc>) {
        self.repair_context.record_failure(now);
        if self.phase != Phase::Finished {
            self.phase = Phase::ReadOnly;
        }
    }

    pub fn reset_repair(&mut self) {
        self.repair_context = RepairContext::default();
    }

    /// Leaves a degraded phase once nothing is left to repair.
    pub fn resume_play(&mut self) {
        if matches!(self.phase, Phase::Repair | Phase::Reconciling) {
            self.phase = if self.turn_order.len() < 2 {
                Phase::Waiting
            } else {
                Phase::Playing
            };
        }
    }

    /// Squares a player still holds; lower is better.
    pub fn score(&self, catalog: &PieceCatalog, player: PlayerId) -> usize {
        self.remaining_pieces
            .get(&player)
            .map(|set| {
                set.iter()
                    .filter_map(|id| catalog.get(id))
                    .map(|def| def.size())
                    .sum()
            })
            .unwrap_or(0)
    }
}
