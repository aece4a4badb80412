//! Authoritative state-sync engine for polysync games: the submit pipeline, gap repair,
//! remote merge, replay, and persistence around them.

pub mod config;
mod engine;
mod gaps;
mod persistent;
mod rate_limit;
mod remote;
mod replay;
pub mod selfplay;
mod signature;
pub mod store;

pub use crate::config::{EngineConfig, GapConfig};
pub use crate::engine::{GameEngine, GameSubmitStatus};
pub use crate::gaps::GapTick;
pub use crate::persistent::PersistentEngine;
pub use crate::rate_limit::RateLimiter;
pub use crate::remote::RemoteIngestResult;
pub use crate::replay::{EventReplayService, RecoveryResult};
pub use crate::selfplay::{run_selfplay, PlayerScore, SelfPlayConfig, SelfPlayError, SelfPlayResult};
pub use crate::signature::{HmacVerifier, PermissiveVerifier, SignatureVerifier};
pub use crate::store::{FileStore, GameStore, MemoryStore, StoreError};
