//! Wire-level types of the polysync game log: commands, events, gaps and the canonical
//! encoding that every hash is built from.

pub mod canonical;
mod command;
mod event;
mod gap;
mod ids;
mod reject;
pub mod wire;

pub use canonical::{CanonicalWriter, Digest};
pub use command::{Action, GameCommand};
pub use event::{ChainLink, EventSource, EventStatus, ForkEventRecord, ForkReason, MoveEvent};
pub use gap::{EventGap, SeqRange};
pub use ids::{AuthorityId, ClientId, Coord, GameId, PieceId, PlayerId};
pub use reject::SubmitRejectReason;

/// Layout version of hash inputs and snapshots.
pub const SCHEMA_VERSION: u16 = 1;
/// Version of the placement rules.
pub const RULES_VERSION: u16 = 1;
/// Version of the standard 21-piece set.
pub const PIECE_SET_VERSION: u16 = 1;
