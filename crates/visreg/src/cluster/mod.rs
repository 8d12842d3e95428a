//! Diff pixel clustering.
//!
//! Two mismatched pixels belong to the same cluster when a chain of
//! mismatched pixels connects them with every consecutive gap at most
//! `proximity` pixels in Chebyshev distance (`max(|dx|, |dy|)`).
//!
//! Pixels are bucketed into square cells of side `proximity + 1`. Any two
//! pixels in one cell are within `proximity` of each other, so cells are the
//! union-find nodes; only the eight neighbouring cells can hold a pixel in
//! reach. Cluster boxes that overlap each other are merged afterwards so the
//! returned boxes never share a pixel.

mod worker;

pub use worker::{ClusterFn, ClusterWorker};

use crate::engine::DiffPixel;
use crate::geometry::BoundingBox;
use std::collections::HashMap;

/// Default proximity in pixels
pub const DEFAULT_PROXIMITY: u32 = 5;

/// Group diff pixels into bounding boxes sorted by `(top, left)`
#[must_use]
pub fn cluster_pixels(pixels: &[DiffPixel], proximity: u32) -> Vec<BoundingBox> {
    if pixels.is_empty() {
        return Vec::new();
    }

    let grid = Grid::build(pixels, proximity);
    let mut sets = UnionFind::new(grid.cells.len());

    for (i, cell) in grid.cells.iter().enumerate() {
        let (cx, cy) = cell.key;
        let forward = [
            (cx.checked_add(1), cy.checked_sub(1)),
            (cx.checked_add(1), Some(cy)),
            (cx.checked_add(1), cy.checked_add(1)),
            (Some(cx), cy.checked_add(1)),
        ];
        for (nx, ny) in forward {
            let (Some(nx), Some(ny)) = (nx, ny) else {
                continue;
            };
            let Some(&j) = grid.index.get(&(nx, ny)) else {
                continue;
            };
            if sets.find(i) != sets.find(j) && cell.reaches(&grid.cells[j], proximity) {
                sets.union(i, j);
            }
        }
    }

    let mut by_root: HashMap<usize, BoundingBox> = HashMap::new();
    for (i, cell) in grid.cells.iter().enumerate() {
        by_root
            .entry(sets.find(i))
            .and_modify(|b| *b = b.union(&cell.bounds))
            .or_insert(cell.bounds);
    }

    let mut boxes = merge_overlapping(by_root.into_values().collect());
    boxes.sort_by_key(|b| (b.top, b.left, b.bottom, b.right));
    boxes
}

/// Chebyshev distance between two pixels
#[must_use]
pub const fn chebyshev(a: DiffPixel, b: DiffPixel) -> u32 {
    let dx = a.x.abs_diff(b.x);
    let dy = a.y.abs_diff(b.y);
    if dx > dy {
        dx
    } else {
        dy
    }
}

/// Merge boxes until no two share a pixel.
///
/// Each pass sweeps the boxes by `left`, keeping only boxes whose `right`
/// reaches the sweep position, and unions the ones that overlap. A merged box
/// can grow into a neighbour, so passes repeat until nothing changes.
fn merge_overlapping(mut boxes: Vec<BoundingBox>) -> Vec<BoundingBox> {
    loop {
        let count = boxes.len();
        boxes.sort_unstable_by_key(|b| (b.left, b.top));

        let mut sets = UnionFind::new(count);
        let mut active: Vec<usize> = Vec::new();
        for i in 0..count {
            let left = boxes[i].left;
            active.retain(|&a| boxes[a].right >= left);
            for &a in &active {
                if boxes[a].overlaps(&boxes[i]) {
                    sets.union(a, i);
                }
            }
            active.push(i);
        }

        let mut by_root: HashMap<usize, BoundingBox> = HashMap::new();
        for (i, b) in boxes.iter().enumerate() {
            by_root
                .entry(sets.find(i))
                .and_modify(|m| *m = m.union(b))
                .or_insert(*b);
        }
        if by_root.len() == count {
            return boxes;
        }
        boxes = by_root.into_values().collect();
    }
}

type CellKey = (u64, u64);

struct Cell {
    key: CellKey,
    pixels: Vec<DiffPixel>,
    bounds: BoundingBox,
}

impl Cell {
    /// Whether any pixel of `self` is within `proximity` of one in `other`
    fn reaches(&self, other: &Self, proximity: u32) -> bool {
        if box_gap(&self.bounds, &other.bounds) > proximity {
            return false;
        }
        self.pixels.iter().any(|&a| {
            other
                .pixels
                .iter()
                .any(|&b| chebyshev(a, b) <= proximity)
        })
    }
}

/// Chebyshev gap between two boxes, zero when they touch or overlap
fn box_gap(a: &BoundingBox, b: &BoundingBox) -> u32 {
    let gap = |lo_a: u32, hi_a: u32, lo_b: u32, hi_b: u32| {
        if hi_a < lo_b {
            lo_b - hi_a
        } else if hi_b < lo_a {
            lo_a - hi_b
        } else {
            0
        }
    };
    gap(a.left, a.right, b.left, b.right).max(gap(a.top, a.bottom, b.top, b.bottom))
}

struct Grid {
    cells: Vec<Cell>,
    index: HashMap<CellKey, usize>,
}

impl Grid {
    fn build(pixels: &[DiffPixel], proximity: u32) -> Self {
        let side = u64::from(proximity) + 1;
        let mut cells: Vec<Cell> = Vec::new();
        let mut index: HashMap<CellKey, usize> = HashMap::new();

        for &p in pixels {
            let key = (u64::from(p.x) / side, u64::from(p.y) / side);
            match index.get(&key) {
                Some(&i) => {
                    let cell = &mut cells[i];
                    cell.pixels.push(p);
                    cell.bounds.include(p.x, p.y);
                }
                None => {
                    index.insert(key, cells.len());
                    cells.push(Cell {
                        key,
                        pixels: vec![p],
                        bounds: BoundingBox::point(p.x, p.y),
                    });
                }
            }
        }
        Self { cells, index }
    }
}

/// Disjoint sets with path halving and union by size
struct UnionFind {
    parent: Vec<usize>,
    size: Vec<usize>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            size: vec![1; n],
        }
    }

    fn find(&mut self, mut i: usize) -> usize {
        while self.parent[i] != i {
            self.parent[i] = self.parent[self.parent[i]];
            i = self.parent[i];
        }
        i
    }

    fn union(&mut self, a: usize, b: usize) {
        let (mut ra, mut rb) = (self.find(a), self.find(b));
        if ra == rb {
            return;
        }
        if self.size[ra] < self.size[rb] {
            std::mem::swap(&mut ra, &mut rb);
        }
        self.parent[rb] = ra;
        self.size[ra] += self.size[rb];
    }
}
