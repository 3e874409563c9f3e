//! Grid model and the Manhattan distance transform (§4.1).
//!
//! Mirrors the teacher's `FabricGraph::from_file` in spirit (build an
//! immutable node/cost model once, up front) but the "nodes" here are plain
//! grid cells rather than lines parsed out of a `pips.txt`.

use std::collections::{HashSet, VecDeque};

use crate::error::{Result, RoutingError};
use crate::model::Cell;

/// Immutable grid: dimensions, the blocked-cell set (walls minus
/// perforations) and the tray-cell set. Boundary cells are NOT treated as
/// walls — the authoritative behaviour per spec.md's open questions.
#[derive(Debug, Clone)]
pub struct Grid {
    pub width: i32,
    pub height: i32,
    pub resolution: f64,
    blocked: HashSet<Cell>,
    trays: HashSet<Cell>,
}

impl Grid {
    pub fn new(
        width: i32,
        height: i32,
        resolution: f64,
        walls: &[Cell],
        perforations: &[Cell],
        trays: &[Cell],
    ) -> Result<Self> {
        if width <= 0 || height <= 0 {
            return Err(RoutingError::InvalidGrid {
                width: width as i64,
                height: height as i64,
            });
        }
        if !(resolution > 0.0) {
            return Err(RoutingError::InvalidResolution(resolution));
        }
        let perf: HashSet<Cell> = perforations.iter().copied().collect();
        // A cell is blocked iff it is a wall AND not a perforation:
        // perforations override walls.
        let blocked = walls
            .iter()
            .copied()
            .filter(|w| !perf.contains(w))
            .filter(|w| Self::in_bounds(width, height, *w))
            .collect();
        let trays = trays
            .iter()
            .copied()
            .filter(|t| Self::in_bounds(width, height, *t))
            .collect();
        Ok(Self {
            width,
            height,
            resolution,
            blocked,
            trays,
        })
    }

    fn in_bounds(width: i32, height: i32, cell: Cell) -> bool {
        cell.x >= 0 && cell.x < width && cell.y >= 0 && cell.y < height
    }

    pub fn contains(&self, cell: Cell) -> bool {
        Self::in_bounds(self.width, self.height, cell)
    }

    pub fn is_blocked(&self, cell: Cell) -> bool {
        self.blocked.contains(&cell)
    }

    pub fn is_passable(&self, cell: Cell) -> bool {
        self.contains(cell) && !self.is_blocked(cell)
    }

    pub fn is_tray(&self, cell: Cell) -> bool {
        self.trays.contains(&cell)
    }

    pub fn blocked_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.blocked.iter().copied()
    }

    pub fn tray_cells(&self) -> impl Iterator<Item = Cell> + '_ {
        self.trays.iter().copied()
    }

    /// 4-connected neighbours inside the grid, irrespective of passability —
    /// the distance transform walks the full grid, not just passable cells.
    fn neighbors(&self, cell: Cell) -> impl Iterator<Item = Cell> + '_ {
        [(1, 0), (-1, 0), (0, 1), (0, -1)].into_iter().filter_map(move |(dx, dy)| {
            let next = Cell::new(cell.x + dx, cell.y + dy);
            self.contains(next).then_some(next)
        })
    }

    /// Multi-source BFS Manhattan distance transform (§4.1). Seeds start at
    /// distance 0; every other cell gets the distance to the nearest seed,
    /// or `None` (+infinity) if the seed set is empty.
    pub fn distance_transform(&self, seeds: impl Iterator<Item = Cell>) -> DistanceMap {
        let mut dist = DistanceMap::new(self.width, self.height);
        let mut queue = VecDeque::new();
        for seed in seeds {
            if dist.set_if_unset(seed, 0) {
                queue.push_back(seed);
            }
        }
        while let Some(cell) = queue.pop_front() {
            let d = dist.get(cell).expect("cell just popped must have a distance");
            for next in self.neighbors(cell) {
                if dist.set_if_unset(next, d + 1) {
                    queue.push_back(next);
                }
            }
        }
        dist
    }

    pub fn distance_transform_walls(&self) -> DistanceMap {
        self.distance_transform(self.blocked_cells())
    }

    pub fn distance_transform_trays(&self) -> DistanceMap {
        self.distance_transform(self.tray_cells())
    }
}

/// Manhattan distance to the nearest seed cell, or `None` for +infinity.
#[derive(Debug, Clone)]
pub struct DistanceMap {
    width: i32,
    height: i32,
    dist: Vec<Option<u32>>,
}

impl DistanceMap {
    fn new(width: i32, height: i32) -> Self {
        Self {
            width,
            height,
            dist: vec![None; (width as usize) * (height as usize)],
        }
    }

    fn index(&self, cell: Cell) -> usize {
        cell.y as usize * self.width as usize + cell.x as usize
    }

    pub fn get(&self, cell: Cell) -> Option<u32> {
        if cell.x < 0 || cell.y < 0 || cell.x >= self.width || cell.y >= self.height {
            return None;
        }
        self.dist[self.index(cell)]
    }

    fn set_if_unset(&mut self, cell: Cell, value: u32) -> bool {
        let idx = self.index(cell);
        if self.dist[idx].is_none() {
            self.dist[idx] = Some(value);
            true
        } else {
            false
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn perforation_overrides_wall() {
        let grid = Grid::new(5, 5, 0.1, &[Cell::new(2, 2)], &[Cell::new(2, 2)], &[]).unwrap();
        assert!(!grid.is_blocked(Cell::new(2, 2)));
        assert!(grid.is_passable(Cell::new(2, 2)));
    }

    #[test]
    fn boundary_cells_are_not_implicitly_walls() {
        let grid = Grid::new(3, 3, 0.1, &[], &[], &[]).unwrap();
        assert!(grid.is_passable(Cell::new(0, 0)));
        assert!(grid.is_passable(Cell::new(2, 2)));
    }

    #[test]
    fn distance_transform_is_manhattan_bfs() {
        let grid = Grid::new(5, 1, 0.1, &[Cell::new(0, 0)], &[], &[]).unwrap();
        let dw = grid.distance_transform_walls();
        assert_eq!(dw.get(Cell::new(0, 0)), Some(0));
        assert_eq!(dw.get(Cell::new(3, 0)), Some(3));
    }

    #[test]
    fn empty_seed_set_is_infinite_everywhere() {
        let grid = Grid::new(3, 3, 0.1, &[], &[], &[]).unwrap();
        let dw = grid.distance_transform_walls();
        assert_eq!(dw.get(Cell::new(1, 1)), None);
    }

    #[test]
    fn rejects_non_positive_dimensions() {
        assert!(Grid::new(0, 5, 0.1, &[], &[], &[]).is_err());
    }
}
