//! Headless random self-play through the full submit pipeline.
//!
//! Produces a complete, hash-chained event log; used for smoke tests, benchmarks and as input
//! for replay verification.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use polysync_core::{GameState, Phase, PieceCatalog};
use polysync_protocol::{Action, ClientId, GameCommand, GameId, MoveEvent, PlayerId};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::debug;
use uuid::Uuid;

use crate::config::EngineConfig;
use crate::engine::{GameEngine, GameSubmitStatus};
use crate::signature::PermissiveVerifier;

#[derive(Clone, Debug)]
pub struct SelfPlayConfig {
    pub game_id: GameId,
    pub players: Vec<PlayerId>,
    /// Random seed for determinism.
    pub seed: u64,
    /// Safety cap on submitted moves.
    pub max_moves: u32,
    pub started_at: DateTime<Utc>,
    /// Engine settings for the game. Self-play is its own authority, so `local_authority` is
    /// always on.
    pub engine: EngineConfig,
}

impl Default for SelfPlayConfig {
    fn default() -> Self {
        Self {
            game_id: GameId::new("selfplay"),
            players: PlayerId::ALL.to_vec(),
            seed: 42,
            max_moves: 400,
            started_at: DateTime::<Utc>::UNIX_EPOCH,
            engine: EngineConfig::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PlayerScore {
    pub player: PlayerId,
    /// Squares left unplaced; lower is better.
    pub remaining_squares: usize,
    pub pieces_left: usize,
}

#[derive(Clone, Debug)]
pub struct SelfPlayResult {
    pub genesis: GameState,
    pub final_state: GameState,
    pub events: Vec<MoveEvent>,
    pub placements: u32,
    pub passes: u32,
    pub scores: Vec<PlayerScore>,
}

impl SelfPlayResult {
    pub fn finished(&self) -> bool {
        self.final_state.phase == Phase::Finished
    }

    /// Players with the fewest remaining squares.
    pub fn winners(&self) -> Vec<PlayerId> {
        let best = self.scores.iter().map(|s| s.remaining_squares).min();
        self.scores
            .iter()
            .filter(|s| Some(s.remaining_squares) == best)
            .map(|s| s.player)
            .collect()
    }
}

#[derive(Debug, Error)]
pub enum SelfPlayError {
    #[error("move {seq} was not accepted: {status}")]
    NotAccepted { seq: u64, status: &'static str },
    #[error("need at least two players")]
    NotEnoughPlayers,
}

pub fn run_selfplay(
    config: &SelfPlayConfig,
    catalog: Arc<PieceCatalog>,
) -> Result<SelfPlayResult, SelfPlayError> {
    let genesis = GameState::new(
        config.game_id.clone(),
        config.players.iter().copied(),
        ClientId::new(config.players.first().map_or("local", |p| p.as_str())),
        &catalog,
    );
    if genesis.phase == Phase::Waiting {
        return Err(SelfPlayError::NotEnoughPlayers);
    }

    let mut engine = GameEngine::new(
        genesis.clone(),
        catalog.clone(),
        Box::new(PermissiveVerifier),
        EngineConfig {
            local_authority: true,
            ..config.engine.clone()
        },
    );
    let mut rng = StdRng::seed_from_u64(config.seed);
    let mut placements = 0;
    let mut passes = 0;

    for _ in 0..config.max_moves {
        if engine.phase() == Phase::Finished {
            break;
        }
        let Some(player) = engine.state().active_player() else {
            break;
        };

        let mut moves = engine.legal_placements(player);
        let action = if moves.is_empty() {
            passes += 1;
            Action::Pass
        } else {
            placements += 1;
            let pick = rng.gen_range(0..moves.len());
            moves.swap_remove(pick).into_action()
        };

        let seq = engine.state().expected_seq;
        let now = config.started_at + Duration::seconds(seq as i64);
        let mut command = GameCommand::new(
            config.game_id.clone(),
            ClientId::new(player.as_str()),
            player,
            seq,
            action,
            now,
            seq as i64,
        );
        // Seeded ids keep the whole chain reproducible.
        command.command_id = Uuid::from_u128(rng.gen());
        match engine.submit(&command, now) {
            GameSubmitStatus::Accepted { .. } => {
                debug!(seq, player = %player, "self-play move");
            }
            other => {
                return Err(SelfPlayError::NotAccepted {
                    seq,
                    status: other.label(),
                })
            }
        }
    }

    let final_state = engine.state().clone();
    let scores = final_state
        .turn_order
        .iter()
        .map(|&player| PlayerScore {
            player,
            remaining_squares: final_state.score(&catalog, player),
            pieces_left: final_state.remaining(player).map_or(0, |set| set.len()),
        })
        .collect();

    Ok(SelfPlayResult {
        genesis,
        final_state,
        events: engine.events().to_vec(),
        placements,
        passes,
        scores,
    })
}
