use polysync_core::{GameState, PieceCatalog, Phase};
use polysync_protocol::{Action, ClientId, GameId, PlayerId};
use proptest::prelude::*;

/// Plays `picks` against a fresh game, choosing among legal placements by index.
fn play(catalog: &PieceCatalog, picks: &[usize]) -> GameState {
    let mut state = GameState::new(
        GameId::new("prop"),
        [PlayerId::Blue, PlayerId::Yellow, PlayerId::Red],
        ClientId::new("Blue"),
        catalog,
    );
    for &pick in picks {
        if state.phase == Phase::Finished {
            break;
        }
        let Some(player) = state.active_player() else {
            break;
        };
        let moves = state.legal_placements(catalog, player);
        let action = if moves.is_empty() {
            Action::Pass
        } else {
            moves[pick % moves.len()].clone().into_action()
        };
        assert_eq!(state.apply(catalog, &action, player), None);
    }
    state
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(16))]

    #[test]
    fn same_moves_give_same_fingerprint(picks in prop::collection::vec(0usize..500, 0..6)) {
        let catalog = PieceCatalog::standard();
        let a = play(&catalog, &picks);
        let b = play(&catalog, &picks);
        prop_assert_eq!(a.state_fingerprint, b.state_fingerprint);
        prop_assert_eq!(a.state_fingerprint, a.compute_state_fingerprint());
        prop_assert_eq!(a.coordination_seq, picks.len() as u64);
    }

    #[test]
    fn snapshot_roundtrip_preserves_fingerprint(picks in prop::collection::vec(0usize..500, 0..4)) {
        let catalog = PieceCatalog::standard();
        let state = play(&catalog, &picks);
        let json = serde_json::to_string(&state).unwrap();
        let back: GameState = serde_json::from_str(&json).unwrap();
        prop_assert_eq!(back.compute_state_fingerprint(), state.state_fingerprint);
        prop_assert_eq!(back, state);
    }
}
