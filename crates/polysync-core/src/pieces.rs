//! Piece shapes and their precomputed orientations.
//!
//! A [`PieceCatalog`] is built once by whoever owns the rules model and shared by reference
//! (usually behind an `Arc`). Variants are generated eagerly at construction so lookups on the
//! hot path (`has_any_legal_move`, self-play move enumeration) never allocate.

use std::collections::HashMap;

use polysync_protocol::{Coord, PieceId};

/// One orientation of a piece: cells translated to a non-negative origin, sorted.
pub type Variant = Vec<Coord>;

#[derive(Clone, Debug)]
pub struct PieceDef {
    pub id: PieceId,
    /// Base shape as declared.
    pub cells: Vec<Coord>,
    /// Distinct orientations; index is the `variant_id` used in commands.
    pub variants: Vec<Variant>,
}

impl PieceDef {
    pub fn size(&self) -> usize {
        self.cells.len()
    }
}

/// Arena of piece definitions indexed by piece id.
#[derive(Clone, Debug, Default)]
pub struct PieceCatalog {
    pieces: Vec<PieceDef>,
    index: HashMap<PieceId, usize>,
}

const STANDARD_SHAPES: &[(&str, &[(i32, i32)])] = &[
    ("mono-1", &[(0, 0)]),
    ("domino-2", &[(0, 0), (1, 0)]),
    ("tromino-i3", &[(0, 0), (1, 0), (2, 0)]),
    ("tromino-l3", &[(0, 0), (0, 1), (1, 1)]),
    ("tetromino-i4", &[(0, 0), (1, 0), (2, 0), (3, 0)]),
    ("tetromino-l4", &[(0, 0), (0, 1), (0, 2), (1, 2)]),
    ("tetromino-o4", &[(0, 0), (1, 0), (0, 1), (1, 1)]),
    ("tetromino-s4", &[(1, 0), (2, 0), (0, 1), (1, 1)]),
    ("tetromino-t4", &[(0, 0), (1, 0), (2, 0), (1, 1)]),
    ("pentomino-f5", &[(1, 0), (2, 0), (0, 1), (1, 1), (1, 2)]),
    ("pentomino-i5", &[(0, 0), (1, 0), (2, 0), (3, 0), (4, 0)]),
    ("pentomino-l5", &[(0, 0), (0, 1), (0, 2), (0, 3), (1, 3)]),
    ("pentomino-n5", &[(1, 0), (1, 1), (1, 2), (0, 2), (0, 3)]),
    ("pentomino-p5", &[(0, 0), (1, 0), (0, 1), (1, 1), (0, 2)]),
    ("pentomino-t5", &[(0, 0), (1, 0), (2, 0), (1, 1), (1, 2)]),
    ("pentomino-u5", &[(0, 0), (2, 0), (0, 1), (1, 1), (2, 1)]),
    ("pentomino-v5", &[(0, 0), (0, 1), (0, 2), (1, 2), (2, 2)]),
    ("pentomino-w5", &[(0, 0), (0, 1), (1, 1), (1, 2), (2, 2)]),
    ("pentomino-x5", &[(1, 0), (0, 1), (1, 1), (2, 1), (1, 2)]),
    ("pentomino-y5", &[(1, 0), (0, 1), (1, 1), (1, 2), (1, 3)]),
    ("pentomino-z5", &[(0, 0), (1, 0), (1, 1), (1, 2), (2, 2)]),
];

impl PieceCatalog {
    /// The standard 21-piece set.
    pub fn standard() -> Self {
        Self::from_shapes(STANDARD_SHAPES.iter().map(|(id, cells)| {
            (
                PieceId::new(*id),
                cells.iter().map(|&(x, y)| Coord::new(x, y)).collect(),
            )
        }))
    }

    /// Builds a catalog from arbitrary shapes. Later duplicates of an id are ignored.
    pub fn from_shapes(shapes: impl IntoIterator<Item = (PieceId, Vec<Coord>)>) -> Self {
        let mut catalog = Self::default();
        for (id, cells) in shapes {
            if catalog.index.contains_key(&id) || cells.is_empty() {
                continue;
            }
            let variants = generate_variants(&cells);
            catalog.index.insert(id.clone(), catalog.pieces.len());
            catalog.pieces.push(PieceDef {
                id,
                cells,
                variants,
            });
        }
        catalog
    }

    pub fn get(&self, id: &PieceId) -> Option<&PieceDef> {
        self.index.get(id).map(|&idx| &self.pieces[idx])
    }

    pub fn variants(&self, id: &PieceId) -> Option<&[Variant]> {
        self.get(id).map(|def| def.variants.as_slice())
    }

    pub fn variant(&self, id: &PieceId, variant_id: u16) -> Option<&[Coord]> {
        self.get(id)?
            .variants
            .get(usize::from(variant_id))
            .map(Vec::as_slice)
    }

    pub fn contains(&self, id: &PieceId) -> bool {
        self.index.contains_key(id)
    }

    pub fn ids(&self) -> impl Iterator<Item = &PieceId> + '_ {
        self.pieces.iter().map(|def| &def.id)
    }

    pub fn pieces(&self) -> &[PieceDef] {
        &self.pieces
    }

    pub fn len(&self) -> usize {
        self.pieces.len()
    }

    pub fn is_empty(&self) -> bool {
        self.pieces.is_empty()
    }

    pub fn total_squares(&self) -> usize {
        self.pieces.iter().map(PieceDef::size).sum()
    }
}

fn canonicalize(cells: &[Coord]) -> Variant {
    let min_x = cells.iter().map(|c| c.x).min().unwrap_or(0);
    let min_y = cells.iter().map(|c| c.y).min().unwrap_or(0);
    let mut out: Variant = cells
        .iter()
        .map(|c| Coord::new(c.x - min_x, c.y - min_y))
        .collect();
    out.sort_unstable();
    out
}

/// 2 reflections x 4 quarter turns, canonicalized, first occurrence wins.
fn generate_variants(cells: &[Coord]) -> Vec<Variant> {
    let mut variants: Vec<Variant> = Vec::with_capacity(8);
    for reflect in [false, true] {
        let mut shape: Vec<Coord> = cells
            .iter()
            .map(|c| if reflect { Coord::new(-c.x, c.y) } else { *c })
            .collect();
        for _ in 0..4 {
            let variant = canonicalize(&shape);
            if !variants.contains(&variant) {
                variants.push(variant);
            }
            shape = shape.iter().map(|c| Coord::new(-c.y, c.x)).collect();
        }
    }
    variants
}
