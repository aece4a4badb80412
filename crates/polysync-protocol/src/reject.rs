use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Why a command or event was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize, Error)]
#[serde(rename_all = "snake_case")]
pub enum SubmitRejectReason {
    #[error("invalid command signature")]
    InvalidSignature,
    #[error("replayed nonce or reused command id")]
    ReplayOrDuplicate,
    #[error("player is not a participant or not authorised")]
    InvalidAuthority,
    #[error("not this player's turn")]
    InvalidTurn,
    #[error("invalid placement")]
    InvalidPlacement,
    #[error("cannot pass while a legal move exists")]
    IllegalPass,
    #[error("submission rate limit exceeded")]
    RateLimit,
    #[error("command targets a different game")]
    SchemaMismatch,
    #[error("schema, rules or piece set version mismatch")]
    VersionMismatch,
    #[error("game is read-only until resynchronised")]
    ReadOnly,
}

impl SubmitRejectReason {
    /// Only rate limiting clears on its own; everything else is a caller or protocol bug.
    pub fn retryable(self) -> bool {
        matches!(self, SubmitRejectReason::RateLimit)
    }
}
