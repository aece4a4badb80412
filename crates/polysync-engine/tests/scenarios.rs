//! End-to-end scenarios across submit, gap repair, remote merge and replay.

use std::sync::Arc;

use chrono::{DateTime, Duration, Utc};
use polysync_core::{GameState, Phase, PieceCatalog};
use polysync_engine::{
    run_selfplay, EngineConfig, EventReplayService, GameEngine, GameSubmitStatus, HmacVerifier,
    MemoryStore, PermissiveVerifier, PersistentEngine, SelfPlayConfig,
};
use polysync_protocol::{
    wire, Action, ClientId, Coord, Digest, GameCommand, GameId, PlayerId, SeqRange,
    SubmitRejectReason,
};
use proptest::prelude::*;

fn t0() -> DateTime<Utc> {
    DateTime::from_timestamp(1_700_000_000, 0).unwrap()
}

fn genesis(catalog: &PieceCatalog) -> GameState {
    GameState::new(
        GameId::new("G"),
        [PlayerId::Blue, PlayerId::Yellow],
        ClientId::new("Blue"),
        catalog,
    )
}

fn new_game() -> GameEngine {
    let catalog = Arc::new(PieceCatalog::standard());
    GameEngine::local(genesis(&catalog), catalog)
}

fn command(player: PlayerId, seq: u64, action: Action, nonce: i64) -> GameCommand {
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
    command(
        PlayerId::Blue,
        0,
        Action::place("mono-1", 0, Coord::new(0, 0)),
        1,
    )
}

/// Blue opens in its corner; Yellow cannot open away from its own corner.
#[test]
fn opening_moves_follow_corner_rule() {
    let mut engine = new_game();

    let status = engine.submit(&blue_opening(), t0());
    let GameSubmitStatus::Accepted { state, .. } = status else {
        panic!("expected accepted, got {status:?}");
    };
    assert_eq!(state.board.owner(Coord::new(0, 0)), Some(PlayerId::Blue));
    assert_eq!(state.active_index, 1);

    let yellow = command(
        PlayerId::Yellow,
        1,
        Action::place("domino-2", 0, Coord::new(1, 0)),
        1,
    );
    let status = engine.submit(&yellow, t0());
    match status {
        GameSubmitStatus::Rejected {
            reason, retryable, ..
        } => {
            assert_eq!(reason, SubmitRejectReason::InvalidPlacement);
            assert!(!retryable);
        }
        other => panic!("expected rejection, got {other:?}"),
    }
    assert_eq!(engine.state().coordination_seq, 1);
}

/// Resubmitting the exact same command is answered with the original event.
#[test]
fn exact_resubmission_is_duplicate() {
    let mut engine = new_game();
    let cmd = blue_opening();
    let original = engine.submit(&cmd, t0()).event_id().unwrap();

    let status = engine.submit(&cmd, t0() + Duration::milliseconds(10));
    match status {
        GameSubmitStatus::Duplicate { event_id, state } => {
            assert_eq!(event_id, original);
            assert_eq!(state.coordination_seq, 1);
        }
        other => panic!("expected duplicate, got {other:?}"),
    }
    assert_eq!(engine.events().len(), 1);
}

/// A command far ahead of the local sequence is queued behind a gap.
#[test]
fn future_command_is_queued_behind_gap() {
    let mut engine = new_game();
    let ahead = command(PlayerId::Blue, 5, Action::Pass, 1);

    let status = engine.submit(&ahead, t0());
    let GameSubmitStatus::Queued { state, range } = status else {
        panic!("expected queued, got {status:?}");
    };
    assert_eq!(range, SeqRange::new(0, 5));
    assert_eq!(range.to_string(), "0...5");
    assert_eq!(state.event_gaps.len(), 1);
    assert_eq!(state.phase, Phase::Repair);
}

/// Unresolved gaps escalate to read-only and block every further submission.
#[test]
fn unresolved_gap_goes_read_only() {
    let mut engine = new_game();
    engine.submit(&command(PlayerId::Blue, 5, Action::Pass, 1), t0());

    let mut now = t0();
    for _ in 0..10 {
        now += Duration::seconds(4);
        engine.tick(now);
    }
    assert_eq!(engine.phase(), Phase::ReadOnly);

    let status = engine.submit(&blue_opening(), now);
    assert_eq!(status.reject_reason(), Some(SubmitRejectReason::ReadOnly));
}

/// The read-only state is left by resynchronising from a trusted log.
#[test]
fn resync_recovers_from_read_only() {
    let catalog = Arc::new(PieceCatalog::standard());
    let mut authority = GameEngine::local(genesis(&catalog), catalog.clone());
    authority.submit(&blue_opening(), t0());

    let mut replica = GameEngine::local(genesis(&catalog), catalog.clone());
    replica.register_gap(1, 3, t0());
    replica.tick(t0() + Duration::seconds(60));
    assert_eq!(replica.phase(), Phase::ReadOnly);

    let recovery = replica.resync(genesis(&catalog), authority.events(), t0());
    assert!(recovery.orphaned_events.is_empty());
    assert_eq!(replica.phase(), Phase::Playing);
    assert_eq!(replica.state().coordination_seq, 1);
    assert!(replica.open_gaps().is_empty());

    let yellow = command(
        PlayerId::Yellow,
        1,
        Action::place("mono-1", 0, Coord::new(19, 19)),
        1,
    );
    assert!(replica.submit(&yellow, t0() + Duration::seconds(61)).is_accepted());
}

/// Events edited after the fact never survive replay.
#[test]
fn tampered_log_is_detected_on_replay() {
    let catalog = Arc::new(PieceCatalog::standard());
    let mut engine = GameEngine::local(genesis(&catalog), catalog.clone());
    engine.submit(&blue_opening(), t0());

    let mut events = engine.events().to_vec();
    events[0].state_fingerprint_after = Digest::of(b"rewritten");

    let result =
        EventReplayService::new(catalog.clone(), true).replay(&events, genesis(&catalog), t0());
    assert_eq!(result.orphaned_events.len(), 1);
    assert_eq!(result.restored_state.coordination_seq, 0);
}

/// A networked replica only accepts signed commands and defers to the authority.
#[test]
fn networked_game_with_hmac_and_remote_merge() {
    let catalog = Arc::new(PieceCatalog::standard());
    let keys = HmacVerifier::default()
        .with_key(PlayerId::Blue, b"k-blue".to_vec())
        .with_key(PlayerId::Yellow, b"k-yellow".to_vec());

    let mut authority = GameEngine::new(
        genesis(&catalog),
        catalog.clone(),
        Box::new(keys.clone()),
        EngineConfig::default(),
    );
    let mut replica = GameEngine::new(
        genesis(&catalog),
        catalog.clone(),
        Box::new(keys.clone()),
        EngineConfig::remote_authority(),
    );

    let unsigned = blue_opening();
    assert_eq!(
        authority.submit(&unsigned, t0()).reject_reason(),
        Some(SubmitRejectReason::InvalidSignature)
    );

    let mut signed = blue_opening();
    signed.client_id = ClientId::new("Blue");
    assert!(keys.sign(&mut signed));
    assert!(authority.submit(&signed, t0()).is_accepted());

    // Ship the authority's log over the wire.
    let bytes = wire::serialize_events(authority.events()).unwrap();
    let shipped = wire::deserialize_events(&bytes).unwrap();
    let merged = replica.apply_remote_events(&shipped, t0());
    assert_eq!(merged.accepted_event_ids.len(), 1);
    assert_eq!(
        replica.state().state_fingerprint,
        authority.state().state_fingerprint
    );

    // The replica rejects direct submissions from anyone but the authority.
    let mut yellow = command(
        PlayerId::Yellow,
        1,
        Action::place("mono-1", 0, Coord::new(19, 19)),
        1,
    );
    keys.sign(&mut yellow);
    assert!(matches!(
        replica.submit(&yellow, t0()),
        GameSubmitStatus::AuthorityMismatch { .. }
    ));
}

/// The persistence wrapper survives a crash between snapshots.
#[test]
fn persistent_engine_reopens_after_crash() {
    let catalog = Arc::new(PieceCatalog::standard());
    let engine = GameEngine::local(genesis(&catalog), catalog.clone());
    let mut wrapper = PersistentEngine::create(engine, MemoryStore::new()).unwrap();
    wrapper.submit(&blue_opening(), t0()).unwrap();
    let fingerprint = wrapper.state().state_fingerprint;
    let (_, store) = wrapper.into_parts();

    let (reopened, recovery) = PersistentEngine::open(
        &GameId::new("G"),
        store,
        catalog,
        Box::new(PermissiveVerifier),
        EngineConfig::default(),
        t0(),
    )
    .unwrap()
    .unwrap();
    assert_eq!(recovery.applied_events.len(), 1);
    assert_eq!(reopened.state().state_fingerprint, fingerprint);
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    /// Submitting the same command any number of times commits it exactly once.
    #[test]
    fn repeated_submission_commits_once(repeats in 1usize..6) {
        let mut engine = new_game();
        let cmd = blue_opening();
        let first = engine.submit(&cmd, t0());
        prop_assert!(first.is_accepted());
        for i in 0..repeats {
            let status = engine.submit(&cmd, t0() + Duration::seconds(1 + i as i64));
            prop_assert_eq!(status.event_id(), first.event_id());
            prop_assert_eq!(status.label(), "duplicate");
        }
        prop_assert_eq!(engine.state().coordination_seq, 1);
    }

    /// Whatever the pass/place mix, every commit advances the seq by exactly one.
    #[test]
    fn coordination_seq_is_contiguous(seed in any::<u64>()) {
        let config = SelfPlayConfig {
            players: vec![PlayerId::Blue, PlayerId::Yellow, PlayerId::Red],
            seed,
            max_moves: 12,
            ..Default::default()
        };
        let result = run_selfplay(&config, Arc::new(PieceCatalog::standard())).unwrap();
        for (i, event) in result.events.iter().enumerate() {
            prop_assert_eq!(event.coordination_seq, i as u64 + 1);
            prop_assert!(event.chain_is_intact());
        }
        for pair in result.events.windows(2) {
            prop_assert_eq!(pair[1].prev_chain_hash, pair[0].chain_hash.unwrap());
        }
    }
}
