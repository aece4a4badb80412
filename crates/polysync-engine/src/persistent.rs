//! Engine wrapper that mirrors every change into a [`GameStore`].

use std::sync::Arc;

use chrono::{DateTime, Utc};
use polysync_core::{GameState, PieceCatalog};
use polysync_protocol::{EventGap, GameCommand, GameId, MoveEvent};
use tracing::{debug, info};

use crate::config::EngineConfig;
use crate::engine::{GameEngine, GameSubmitStatus};
use crate::gaps::GapTick;
use crate::remote::RemoteIngestResult;
use crate::replay::{EventReplayService, RecoveryResult};
use crate::signature::SignatureVerifier;
use crate::store::{GameStore, StoreError};

/// Owns an engine and its store. After each operation new events are appended, gap changes
/// written, and a snapshot taken every `snapshot_interval` committed events.
pub struct PersistentEngine<S: GameStore> {
    engine: GameEngine,
    store: S,
    persisted_events: usize,
    persisted_gaps: Vec<EventGap>,
    since_snapshot: u64,
}

impl<S: GameStore> PersistentEngine<S> {
    /// Starts a new game and writes its genesis snapshot.
    pub fn create(engine: GameEngine, mut store: S) -> Result<Self, StoreError> {
        store.upsert_snapshot(engine.state())?;
        for event in engine.events() {
            store.append_event(&engine.state().game_id, event)?;
        }
        Ok(Self {
            persisted_events: engine.events().len(),
            persisted_gaps: engine.state().event_gaps.clone(),
            since_snapshot: 0,
            engine,
            store,
        })
    }

    /// Recovers a game from the store. `None` when the store has no snapshot for it.
    pub fn open(
        game_id: &GameId,
        store: S,
        catalog: Arc<PieceCatalog>,
        verifier: Box<dyn SignatureVerifier>,
        config: EngineConfig,
        now: DateTime<Utc>,
    ) -> Result<Option<(Self, RecoveryResult)>, StoreError> {
        let Some(snapshot) = store.load_snapshot(game_id)? else {
            return Ok(None);
        };
        let events = store.load_committed_events(game_id)?;

        let service = EventReplayService::new(catalog.clone(), config.local_authority);
        let recovery = service.replay(&events, snapshot, now);
        info!(
            %game_id,
            coordination_seq = recovery.restored_state.coordination_seq,
            orphaned = recovery.orphaned_events.len(),
            "game recovered from store"
        );

        let indexed = recovery.indexed_events(&events);
        let persisted_events = indexed.len();

        let engine = GameEngine::restore(
            recovery.restored_state.clone(),
            indexed,
            catalog,
            verifier,
            config,
        );
        let wrapper = Self {
            persisted_events,
            persisted_gaps: engine.state().event_gaps.clone(),
            since_snapshot: 0,
            engine,
            store,
        };
        Ok(Some((wrapper, recovery)))
    }

    pub fn engine(&self) -> &GameEngine {
        &self.engine
    }

    pub fn state(&self) -> &GameState {
        self.engine.state()
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn into_parts(self) -> (GameEngine, S) {
        (self.engine, self.store)
    }

    pub fn submit(
        &mut self,
        command: &GameCommand,
        now: DateTime<Utc>,
    ) -> Result<GameSubmitStatus, StoreError> {
        let status = self.engine.submit(command, now);
        self.flush()?;
        Ok(status)
    }

    pub fn apply_remote_events(
        &mut self,
        batch: &[MoveEvent],
        now: DateTime<Utc>,
    ) -> Result<RemoteIngestResult, StoreError> {
        let result = self.engine.apply_remote_events(batch, now);
        self.flush()?;
        Ok(result)
    }

    pub fn tick(&mut self, now: DateTime<Utc>) -> Result<GapTick, StoreError> {
        let report = self.engine.tick(now);
        self.flush()?;
        Ok(report)
    }

    /// Resynchronises from an external snapshot and log, then persists the result as the new
    /// snapshot.
    pub fn resync(
        &mut self,
        snapshot: GameState,
        events: &[MoveEvent],
        now: DateTime<Utc>,
    ) -> Result<RecoveryResult, StoreError> {
        let recovery = self.engine.resync(snapshot, events, now);
        self.persisted_events = self.engine.events().len();
        self.persisted_gaps.clear();
        self.store
            .upsert_event_gaps(&self.engine.state().game_id, &self.persisted_gaps)?;
        self.snapshot()?;
        Ok(recovery)
    }

    /// Writes the current state as a snapshot regardless of the interval.
    pub fn snapshot(&mut self) -> Result<(), StoreError> {
        self.engine.mark_snapshot();
        self.store.upsert_snapshot(self.engine.state())?;
        self.since_snapshot = 0;
        debug!(
            snapshot_seq = self.engine.state().snapshot_seq,
            "snapshot written"
        );
        Ok(())
    }

    fn flush(&mut self) -> Result<(), StoreError> {
        let game_id = self.engine.state().game_id.clone();

        let fresh = &self.engine.events()[self.persisted_events..];
        for event in fresh {
            self.store.append_event(&game_id, event)?;
        }
        let appended = fresh.len();
        self.persisted_events += appended;
        self.since_snapshot += appended as u64;

        if self.engine.state().event_gaps != self.persisted_gaps {
            self.store
                .upsert_event_gaps(&game_id, &self.engine.state().event_gaps)?;
            self.persisted_gaps = self.engine.state().event_gaps.clone();
        }

        let interval = self.engine.config().snapshot_interval;
        if interval > 0 && self.since_snapshot >= interval {
            self.snapshot()?;
        }
        Ok(())
    }
}
