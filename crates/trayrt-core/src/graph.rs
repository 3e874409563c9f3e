//! Weighted graph builder (§4.2): 4-neighbour adjacency over passable cells,
//! with edge weights derived from the wall/tray distance maps and a
//! `redCable` relaxation factor.

use std::collections::HashMap;

use serde::Serialize;

use crate::grid::{DistanceMap, Grid};
use crate::model::Cell;

#[derive(Debug, Clone, Copy)]
pub struct Edge {
    pub to: Cell,
    pub weight: f64,
}

/// Adjacency over passable cells, built once for a given `redCable`.
#[derive(Debug, Clone)]
pub struct WeightedGraph {
    red_cable: f64,
    adjacency: HashMap<Cell, Vec<Edge>>,
}

impl WeightedGraph {
    pub fn build(grid: &Grid, dist_wall: &DistanceMap, dist_tray: &DistanceMap, red_cable: f64) -> Self {
        let mut adjacency: HashMap<Cell, Vec<Edge>> = HashMap::new();
        for y in 0..grid.height {
            for x in 0..grid.width {
                let cell = Cell::new(x, y);
                if !grid.is_passable(cell) {
                    continue;
                }
                let mut edges = Vec::with_capacity(4);
                for (dx, dy) in [(1, 0), (-1, 0), (0, 1), (0, -1)] {
                    let next = Cell::new(x + dx, y + dy);
                    if grid.is_passable(next) {
                        let weight = edge_weight(dist_tray.get(next), dist_wall.get(next), red_cable);
                        edges.push(Edge { to: next, weight });
                    }
                }
                adjacency.insert(cell, edges);
            }
        }
        Self { red_cable, adjacency }
    }

    pub fn red_cable(&self) -> f64 {
        self.red_cable
    }

    pub fn neighbors(&self, cell: Cell) -> &[Edge] {
        self.adjacency.get(&cell).map(Vec::as_slice).unwrap_or(&[])
    }

    pub fn contains_node(&self, cell: Cell) -> bool {
        self.adjacency.contains_key(&cell)
    }

    /// Flattens the adjacency into a node/edge list for offline inspection
    /// (the `--dump-graph` CLI flag).
    pub fn to_export(&self) -> GraphExport {
        let mut nodes: Vec<Cell> = self.adjacency.keys().copied().collect();
        nodes.sort_unstable();
        let mut edges = Vec::new();
        for (&from, out_edges) in &self.adjacency {
            for edge in out_edges {
                edges.push(GraphEdgeExport { from, to: edge.to, weight: edge.weight });
            }
        }
        GraphExport { red_cable: self.red_cable, nodes, edges }
    }
}

#[derive(Debug, Serialize)]
pub struct GraphEdgeExport {
    pub from: Cell,
    pub to: Cell,
    pub weight: f64,
}

#[derive(Debug, Serialize)]
pub struct GraphExport {
    pub red_cable: f64,
    pub nodes: Vec<Cell>,
    pub edges: Vec<GraphEdgeExport>,
}

/// The edge-weight table from §4.2: the weight of *entering* cell `c`,
/// where `dt`/`dw` are `c`'s distance to the nearest tray/wall.
pub fn edge_weight(dt: Option<u32>, dw: Option<u32>, red_cable: f64) -> f64 {
    if dt == Some(0) && red_cable == 1.0 {
        return 0.0;
    }
    match dw {
        None => 10.0,
        Some(0) => 100.0,
        Some(1) => 3.5,
        Some(2) => 5.5 * red_cable,
        Some(3) => {
            let red_prime = if red_cable != 1.0 { red_cable / 2.0 } else { red_cable };
            7.0 * red_prime
        }
        Some(_) => 10.0 * red_cable,
    }
}

/// Cache of `WeightedGraph`s keyed by `redCable`, owned by the request
/// context — never a process-global, per the design notes.
#[derive(Debug, Default)]
pub struct GraphCache {
    graphs: HashMap<u64, WeightedGraph>,
}

impl GraphCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get_or_build(&mut self, grid: &Grid, dist_wall: &DistanceMap, dist_tray: &DistanceMap, red_cable: f64) -> &WeightedGraph {
        let key = red_cable.to_bits();
        self.graphs
            .entry(key)
            .or_insert_with(|| WeightedGraph::build(grid, dist_wall, dist_tray, red_cable))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tray_free_ride_only_at_full_strength() {
        assert_eq!(edge_weight(Some(0), Some(5), 1.0), 0.0);
        assert_ne!(edge_weight(Some(0), Some(5), 0.5), 0.0);
    }

    #[test]
    fn wall_distance_table_matches_spec() {
        assert_eq!(edge_weight(Some(3), None, 1.0), 10.0);
        assert_eq!(edge_weight(Some(3), Some(0), 1.0), 100.0);
        assert_eq!(edge_weight(Some(3), Some(1), 1.0), 3.5);
        assert_eq!(edge_weight(Some(3), Some(2), 0.5), 2.75);
        assert_eq!(edge_weight(Some(3), Some(4), 0.5), 5.0);
    }

    #[test]
    fn dw_three_halves_red_cable_unless_full_strength() {
        assert_eq!(edge_weight(Some(3), Some(3), 1.0), 7.0);
        assert_eq!(edge_weight(Some(3), Some(3), 0.5), 7.0 * 0.25);
    }
}
