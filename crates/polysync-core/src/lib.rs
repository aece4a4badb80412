//! Deterministic rules model: board, piece catalog and the canonical `GameState`.

mod board;
mod pieces;
mod state;

pub use crate::board::{starting_corner, Board, BOARD_SIZE, CELL_COUNT};
pub use crate::pieces::{PieceCatalog, PieceDef, Variant};
pub use crate::state::{
    Authority, GameState, HashChain, PassCheck, Phase, PlacementError, Placement, RepairContext,
};
