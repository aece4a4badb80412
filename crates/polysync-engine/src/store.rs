//! Durable storage for snapshots, committed events and open gaps.

use std::collections::{HashMap, HashSet};
use std::fs::{self, OpenOptions};
use std::io::{ErrorKind, Write};
use std::path::{Path, PathBuf};

use polysync_core::GameState;
use polysync_protocol::wire::{self, WireError};
use polysync_protocol::{EventGap, GameId, MoveEvent};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("io error at {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("corrupt record in {}: {source}", path.display())]
    Corrupt {
        path: PathBuf,
        #[source]
        source: WireError,
    },
    #[error("encode error: {0}")]
    Encode(#[from] WireError),
}

/// Persistence capability used by the recovery wrapper. The engine itself never calls it.
pub trait GameStore {
    fn load_snapshot(&self, game_id: &GameId) -> Result<Option<GameState>, StoreError>;

    /// Committed events ordered by coordination seq.
    fn load_committed_events(&self, game_id: &GameId) -> Result<Vec<MoveEvent>, StoreError>;

    fn upsert_snapshot(&mut self, state: &GameState) -> Result<(), StoreError>;

    /// Appending an event that is already stored is harmless; loads return it once.
    fn append_event(&mut self, game_id: &GameId, event: &MoveEvent) -> Result<(), StoreError>;

    fn upsert_event_gaps(&mut self, game_id: &GameId, gaps: &[EventGap])
        -> Result<(), StoreError>;
}

/// Committed events sorted by position, each event id once.
fn committed_in_order(mut events: Vec<MoveEvent>) -> Vec<MoveEvent> {
    let mut seen = HashSet::new();
    events.retain(|e| e.is_committed() && seen.insert(e.event_id));
    events.sort_by_key(MoveEvent::ordering_key);
    events
}

#[derive(Clone, Debug, Default)]
struct GameRecord {
    snapshot: Option<GameState>,
    events: Vec<MoveEvent>,
    gaps: Vec<EventGap>,
}

/// In-process store.
#[derive(Clone, Debug, Default)]
pub struct MemoryStore {
    games: HashMap<GameId, GameRecord>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn event_gaps(&self, game_id: &GameId) -> &[EventGap] {
        self.games
            .get(game_id)
            .map(|record| record.gaps.as_slice())
            .unwrap_or(&[])
    }

    pub fn event_count(&self, game_id: &GameId) -> usize {
        self.games.get(game_id).map_or(0, |record| record.events.len())
    }
}

impl GameStore for MemoryStore {
    fn load_snapshot(&self, game_id: &GameId) -> Result<Option<GameState>, StoreError> {
        Ok(self
            .games
            .get(game_id)
            .and_then(|record| record.snapshot.clone()))
    }

    fn load_committed_events(&self, game_id: &GameId) -> Result<Vec<MoveEvent>, StoreError> {
        let events = self
            .games
            .get(game_id)
            .map(|record| record.events.clone())
            .unwrap_or_default();
        Ok(committed_in_order(events))
    }

    fn upsert_snapshot(&mut self, state: &GameState) -> Result<(), StoreError> {
        self.games.entry(state.game_id.clone()).or_default().snapshot = Some(state.clone());
        Ok(())
    }

    fn append_event(&mut self, game_id: &GameId, event: &MoveEvent) -> Result<(), StoreError> {
        let record = self.games.entry(game_id.clone()).or_default();
        if !record.events.iter().any(|e| e.event_id == event.event_id) {
            record.events.push(event.clone());
        }
        Ok(())
    }

    fn upsert_event_gaps(
        &mut self,
        game_id: &GameId,
        gaps: &[EventGap],
    ) -> Result<(), StoreError> {
        self.games.entry(game_id.clone()).or_default().gaps = gaps.to_vec();
        Ok(())
    }
}

const SNAPSHOT_FILE: &str = "snapshot.json";
const EVENTS_FILE: &str = "events.jsonl";
const GAPS_FILE: &str = "gaps.json";

/// One directory per game under `root`: `snapshot.json`, an append-only `events.jsonl` and
/// `gaps.json`.
#[derive(Clone, Debug)]
pub struct FileStore {
    root: PathBuf,
}

impl FileStore {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Directory of one game. Characters outside `[A-Za-z0-9_-]` are replaced.
    pub fn game_dir(&self, game_id: &GameId) -> PathBuf {
        let name: String = game_id
            .as_str()
            .chars()
            .map(|c| {
                if c.is_ascii_alphanumeric() || c == '-' || c == '_' {
                    c
                } else {
                    '_'
                }
            })
            .collect();
        self.root.join(name)
    }

    pub fn events_path(&self, game_id: &GameId) -> PathBuf {
        self.game_dir(game_id).join(EVENTS_FILE)
    }

    fn ensure_dir(&self, game_id: &GameId) -> Result<PathBuf, StoreError> {
        let dir = self.game_dir(game_id);
        fs::create_dir_all(&dir).map_err(|source| StoreError::Io {
            path: dir.clone(),
            source,
        })?;
        Ok(dir)
    }

    /// Write-then-rename so readers never see a torn file.
    fn write_atomic(path: &Path, contents: &str) -> Result<(), StoreError> {
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, contents).map_err(|source| StoreError::Io {
            path: tmp.clone(),
            source,
        })?;
        fs::rename(&tmp, path).map_err(|source| StoreError::Io {
            path: path.to_path_buf(),
            source,
        })
    }

    fn read_optional(path: &Path) -> Result<Option<String>, StoreError> {
        match fs::read_to_string(path) {
            Ok(text) => Ok(Some(text)),
            Err(err) if err.kind() == ErrorKind::NotFound => Ok(None),
            Err(source) => Err(StoreError::Io {
                path: path.to_path_buf(),
                source,
            }),
        }
    }

    pub fn load_event_gaps(&self, game_id: &GameId) -> Result<Vec<EventGap>, StoreError> {
        let path = self.game_dir(game_id).join(GAPS_FILE);
        match Self::read_optional(&path)? {
            Some(text) => wire::deserialize_gaps_json(&text)
                .map_err(|source| StoreError::Corrupt { path, source }),
            None => Ok(Vec::new()),
        }
    }
}

impl GameStore for FileStore {
    fn load_snapshot(&self, game_id: &GameId) -> Result<Option<GameState>, StoreError> {
        let path = self.game_dir(game_id).join(SNAPSHOT_FILE);
        match Self::read_optional(&path)? {
            Some(text) => wire::from_json(&text)
                .map(Some)
                .map_err(|source| StoreError::Corrupt { path, source }),
            None => Ok(None),
        }
    }

    fn load_committed_events(&self, game_id: &GameId) -> Result<Vec<MoveEvent>, StoreError> {
        let path = self.events_path(game_id);
        let Some(text) = Self::read_optional(&path)? else {
            return Ok(Vec::new());
        };
        let events = wire::events_from_json_lines(&text)
            .map_err(|source| StoreError::Corrupt { path, source })?;
        Ok(committed_in_order(events))
    }

    fn upsert_snapshot(&mut self, state: &GameState) -> Result<(), StoreError> {
        let dir = self.ensure_dir(&state.game_id)?;
        let json = wire::to_json(state)?;
        Self::write_atomic(&dir.join(SNAPSHOT_FILE), &json)
    }

    fn append_event(&mut self, game_id: &GameId, event: &MoveEvent) -> Result<(), StoreError> {
        let dir = self.ensure_dir(game_id)?;
        let path = dir.join(EVENTS_FILE);
        let line = wire::event_to_json_line(event)?;
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&path)
            .map_err(|source| StoreError::Io {
                path: path.clone(),
                source,
            })?;
        writeln!(file, "{line}").map_err(|source| StoreError::Io { path, source })
    }

    fn upsert_event_gaps(
        &mut self,
        game_id: &GameId,
        gaps: &[EventGap],
    ) -> Result<(), StoreError> {
        let dir = self.ensure_dir(game_id)?;
        let json = wire::serialize_gaps_json(gaps)?;
        Self::write_atomic(&dir.join(GAPS_FILE), &json)
    }
}
