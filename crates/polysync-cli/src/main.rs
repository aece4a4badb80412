//! polysync CLI.
//!
//! - `polysync selfplay` - play a seeded random game and write its log to a store
//! - `polysync verify` - replay a stored log and check every fingerprint and chain hash
//! - `polysync status` - show the stored snapshot, open gaps and scores of a game

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use chrono::Utc;
use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{fmt, EnvFilter};

use polysync_core::{GameState, PieceCatalog};
use polysync_engine::{
    run_selfplay, EngineConfig, EventReplayService, FileStore, GameStore, PlayerScore,
    SelfPlayConfig,
};
use polysync_protocol::{wire, GameId, PlayerId};

#[derive(Parser)]
#[command(name = "polysync")]
#[command(about = "State-sync engine for polyomino placement games", version)]
struct Cli {
    /// Engine configuration (YAML)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Play a seeded random game through the submit pipeline
    Selfplay(SelfPlayArgs),

    /// Replay a stored event log and report orphaned events
    Verify {
        #[command(flatten)]
        game: GameArgs,

        /// Replay this MessagePack log instead of the stored one
        #[arg(long)]
        events: Option<PathBuf>,
    },

    /// Show a stored game
    Status {
        #[command(flatten)]
        game: GameArgs,

        /// Print the snapshot as JSON
        #[arg(long)]
        json: bool,
    },
}

#[derive(Args)]
struct GameArgs {
    /// Store root directory
    #[arg(long, default_value = ".polysync")]
    store: PathBuf,

    /// Game id
    #[arg(long, default_value = "selfplay")]
    game: String,
}

#[derive(Args)]
struct SelfPlayArgs {
    #[command(flatten)]
    game: GameArgs,

    #[arg(long, default_value_t = 42)]
    seed: u64,

    /// Seats in turn order
    #[arg(long, value_delimiter = ',', value_parser = parse_player, default_values_t = PlayerId::ALL)]
    players: Vec<PlayerId>,

    #[arg(long, default_value_t = 400)]
    max_moves: u32,

    /// Also write the log as MessagePack
    #[arg(long)]
    msgpack: Option<PathBuf>,
}

fn parse_player(s: &str) -> Result<PlayerId, String> {
    PlayerId::parse(s).ok_or_else(|| format!("unknown player '{s}' (Blue, Yellow, Red, Green)"))
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("info")
    };

    fmt().with_env_filter(filter).with_target(false).init();

    let config = EngineConfig::load_or_default(cli.config.as_deref())?;

    match cli.command {
        Commands::Selfplay(args) => selfplay(&config, args),
        Commands::Verify { game, events } => verify(&config, &game, events.as_deref()),
        Commands::Status { game, json } => status(&game, json),
    }
}

fn selfplay(engine: &EngineConfig, args: SelfPlayArgs) -> Result<()> {
    let game_id = GameId::new(args.game.game.as_str());
    let mut store = FileStore::new(&args.game.store);
    if store.events_path(&game_id).exists() {
        bail!(
            "game {game_id} already exists under {}",
            args.game.store.display()
        );
    }

    let config = SelfPlayConfig {
        game_id: game_id.clone(),
        players: args.players,
        seed: args.seed,
        max_moves: args.max_moves,
        engine: engine.clone(),
        ..SelfPlayConfig::default()
    };
    let result = run_selfplay(&config, Arc::new(PieceCatalog::standard()))?;
    tracing::info!(
        game_id = %game_id,
        seed = args.seed,
        events = result.events.len(),
        "Self-play finished"
    );

    // The genesis snapshot plus the full log lets `verify` replay from the start.
    store.upsert_snapshot(&result.genesis)?;
    for event in &result.events {
        store.append_event(&game_id, event)?;
    }

    if let Some(path) = &args.msgpack {
        let bytes = wire::serialize_events(&result.events)?;
        fs::write(path, bytes).with_context(|| format!("writing {}", path.display()))?;
    }

    println!("Game {game_id} (seed {})", args.seed);
    println!(
        "  {} placements, {} passes, finished: {}",
        result.placements,
        result.passes,
        result.finished()
    );
    println!("  fingerprint {}", result.final_state.state_fingerprint);
    print_scores(&result.scores);
    let winners: Vec<String> = result.winners().iter().map(|p| p.to_string()).collect();
    println!("  winners: {}", winners.join(", "));
    println!();
    println!("Log written to {}", store.events_path(&game_id).display());
    Ok(())
}

fn verify(config: &EngineConfig, args: &GameArgs, events_file: Option<&Path>) -> Result<()> {
    let game_id = GameId::new(args.game.as_str());
    let store = FileStore::new(&args.store);
    let snapshot = load_snapshot(&store, &game_id, &args.store)?;

    let events = match events_file {
        Some(path) => {
            let bytes = fs::read(path).with_context(|| format!("reading {}", path.display()))?;
            wire::deserialize_events(&bytes)
                .with_context(|| format!("decoding {}", path.display()))?
        }
        None => store.load_committed_events(&game_id)?,
    };

    let service =
        EventReplayService::new(Arc::new(PieceCatalog::standard()), config.local_authority);
    let recovery = service.replay(&events, snapshot, Utc::now());
    let restored = &recovery.restored_state;

    println!("Game {game_id}");
    println!("  applied:  {}", recovery.applied_events.len());
    println!("  skipped:  {}", recovery.skipped_event_ids.len());
    println!("  orphaned: {}", recovery.orphaned_events.len());
    println!("  coordination seq {}", restored.coordination_seq);
    println!("  fingerprint {}", restored.state_fingerprint);
    println!("  chain head  {}", restored.state_hash_chain.last_chain_hash);

    for orphan in &recovery.orphaned_events {
        println!(
            "  - seq {} {} ({})",
            orphan.coordination_seq, orphan.event_id, orphan.player_id
        );
    }
    if !recovery.orphaned_events.is_empty() {
        bail!(
            "{} events failed verification",
            recovery.orphaned_events.len()
        );
    }
    Ok(())
}

fn status(args: &GameArgs, json: bool) -> Result<()> {
    let game_id = GameId::new(args.game.as_str());
    let store = FileStore::new(&args.store);
    let snapshot = load_snapshot(&store, &game_id, &args.store)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&snapshot)?);
        return Ok(());
    }

    let events = store.load_committed_events(&game_id)?;
    let gaps = store.load_event_gaps(&game_id)?;
    let catalog = PieceCatalog::standard();

    println!("Game {game_id}");
    println!("{}", "=".repeat(5 + game_id.as_str().len()));
    println!();
    println!("Phase: {:?}", snapshot.phase);
    println!(
        "Authority: {} (epoch {})",
        snapshot.authority.id, snapshot.authority.epoch
    );
    match snapshot.active_player() {
        Some(player) => println!("To move: {player}"),
        None => println!("To move: -"),
    }
    println!(
        "Snapshot at seq {}, {} committed events stored",
        snapshot.coordination_seq,
        events.len()
    );
    if let Some(last) = events.last() {
        println!("Log head: seq {} ({})", last.coordination_seq, last.event_id);
    }
    println!();
    println!("Open gaps: {}", gaps.len());
    for gap in &gaps {
        println!(
            "  - {} retries {}/{}, next {}",
            gap.range(),
            gap.retry_count,
            gap.max_retries,
            gap.next_retry_at
        );
    }
    println!();
    print_scores(&scores(&snapshot, &catalog));
    Ok(())
}

fn load_snapshot(store: &FileStore, game_id: &GameId, root: &Path) -> Result<GameState> {
    store
        .load_snapshot(game_id)?
        .with_context(|| format!("no snapshot for game {game_id} under {}", root.display()))
}

fn scores(state: &GameState, catalog: &PieceCatalog) -> Vec<PlayerScore> {
    state
        .turn_order
        .iter()
        .map(|&player| PlayerScore {
            player,
            remaining_squares: state.score(catalog, player),
            pieces_left: state.remaining(player).map_or(0, |set| set.len()),
        })
        .collect()
}

fn print_scores(scores: &[PlayerScore]) {
    println!("Scores (remaining squares):");
    for score in scores {
        println!(
            "  {:<7} {:>3} squares, {:>2} pieces",
            score.player.to_string(),
            score.remaining_squares,
            score.pieces_left
        );
    }
}
