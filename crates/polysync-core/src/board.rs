use polysync_protocol::{Coord, PlayerId};
use serde::{Deserialize, Serialize};

pub const BOARD_SIZE: i32 = 20;
pub const CELL_COUNT: usize = (BOARD_SIZE * BOARD_SIZE) as usize;

pub const EDGE_NEIGHBORS: [(i32, i32); 4] = [(1, 0), (-1, 0), (0, 1), (0, -1)];
pub const DIAGONAL_NEIGHBORS: [(i32, i32); 4] = [(1, 1), (1, -1), (-1, 1), (-1, -1)];

/// Fixed starting corner of each colour.
pub const fn starting_corner(player: PlayerId) -> Coord {
    match player {
        PlayerId::Blue => Coord::new(0, 0),
        PlayerId::Yellow => Coord::new(BOARD_SIZE - 1, BOARD_SIZE - 1),
        PlayerId::Red => Coord::new(BOARD_SIZE - 1, 0),
        PlayerId::Green => Coord::new(0, BOARD_SIZE - 1),
    }
}

/// Row-major grid of cell owners.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Board {
    cells: Vec<Option<PlayerId>>,
}

impl Default for Board {
    fn default() -> Self {
        Self::new()
    }
}

impl Board {
    pub fn new() -> Self {
        Self {
            cells: vec![None; CELL_COUNT],
        }
    }

    #[inline]
    pub fn in_bounds(c: Coord) -> bool {
        (0..BOARD_SIZE).contains(&c.x) && (0..BOARD_SIZE).contains(&c.y)
    }

    #[inline]
    pub fn index_of(c: Coord) -> Option<usize> {
        Self::in_bounds(c).then(|| (c.y * BOARD_SIZE + c.x) as usize)
    }

    pub fn coord_of(index: usize) -> Coord {
        let i = index as i32;
        Coord::new(i % BOARD_SIZE, i / BOARD_SIZE)
    }

    /// Owner of a cell; `None` for empty or out-of-bounds cells.
    pub fn owner(&self, c: Coord) -> Option<PlayerId> {
        Self::index_of(c).and_then(|idx| self.cells.get(idx).copied().flatten())
    }

    pub fn is_empty_at(&self, c: Coord) -> bool {
        Self::in_bounds(c) && self.owner(c).is_none()
    }

    pub(crate) fn set(&mut self, c: Coord, player: PlayerId) {
        if let Some(cell) = Self::index_of(c).and_then(|idx| self.cells.get_mut(idx)) {
            *cell = Some(player);
        }
    }

    pub fn cells(&self) -> &[Option<PlayerId>] {
        &self.cells
    }

    pub fn owned_by(&self, player: PlayerId) -> impl Iterator<Item = Coord> + '_ {
        self.cells
            .iter()
            .enumerate()
            .filter(move |(_, owner)| **owner == Some(player))
            .map(|(idx, _)| Self::coord_of(idx))
    }

    pub fn has_any(&self, player: PlayerId) -> bool {
        self.cells.iter().any(|owner| *owner == Some(player))
    }

    pub fn count(&self, player: PlayerId) -> usize {
        self.cells.iter().filter(|owner| **owner == Some(player)).count()
    }

    /// One byte per cell: 0 for empty, the player code otherwise.
    pub fn canonical_bytes(&self) -> Vec<u8> {
        self.cells
            .iter()
            .map(|owner| owner.map(PlayerId::code).unwrap_or(0))
            .collect()
    }

    pub(crate) fn touches_edge_of(&self, c: Coord, player: PlayerId) -> bool {
        EDGE_NEIGHBORS
            .iter()
            .any(|&(dx, dy)| self.owner(c.offset(dx, dy)) == Some(player))
    }

    pub(crate) fn touches_corner_of(&self, c: Coord, player: PlayerId) -> bool {
        DIAGONAL_NEIGHBORS
            .iter()
            .any(|&(dx, dy)| self.owner(c.offset(dx, dy)) == Some(player))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn index_and_coord_are_inverse() {
        for idx in [0, 19, 20, 399] {
            assert_eq!(Board::index_of(Board::coord_of(idx)), Some(idx));
        }
        assert_eq!(Board::index_of(Coord::new(20, 0)), None);
        assert_eq!(Board::index_of(Coord::new(0, -1)), None);
    }

    #[test]
    fn corners_are_on_the_board_and_distinct() {
        let corners: Vec<Coord> = PlayerId::ALL.iter().map(|p| starting_corner(*p)).collect();
        assert!(corners.iter().all(|c| Board::in_bounds(*c)));
        for (i, a) in corners.iter().enumerate() {
            for b in &corners[i + 1..] {
                assert_ne!(a, b);
            }
        }
    }

    #[test]
    fn neighbour_queries_ignore_off_board_cells() {
        let mut board = Board::new();
        board.set(Coord::new(1, 1), PlayerId::Blue);
        assert!(board.touches_edge_of(Coord::new(1, 0), PlayerId::Blue));
        assert!(board.touches_corner_of(Coord::new(0, 0), PlayerId::Blue));
        assert!(!board.touches_edge_of(Coord::new(0, 0), PlayerId::Blue));
        assert!(!board.touches_corner_of(Coord::new(0, 0), PlayerId::Yellow));
    }
}
