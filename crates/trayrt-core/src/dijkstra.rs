//! Shortest-path engine (§4.3): single-target and multi-target Dijkstra with
//! a deterministic tie-break counter, grounded in the teacher's
//! `path_finding_algo::dijkstra_verbose` binary-heap shape.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use crate::graph::WeightedGraph;
use crate::model::Cell;

/// The cost-and-path result of a shortest-path query between two nodes.
#[derive(Debug, Clone)]
pub struct PairRoute {
    pub cost: f64,
    pub path: Vec<Cell>,
}

impl PairRoute {
    pub fn reversed(&self) -> PairRoute {
        let mut path = self.path.clone();
        path.reverse();
        PairRoute { cost: self.cost, path }
    }
}

#[derive(Clone)]
struct HeapEntry {
    cost: f64,
    // Monotonically increasing counter: guarantees a total, deterministic
    // order between entries of equal cost regardless of push order.
    seq: u64,
    node: Cell,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.cost.to_bits() == other.cost.to_bits() && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}
impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // Reversed for a min-heap; ties broken by the injected counter.
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

fn reconstruct(prev: &HashMap<Cell, Cell>, start: Cell, end: Cell) -> Vec<Cell> {
    let mut path = vec![end];
    let mut current = end;
    while current != start {
        current = prev[&current];
        path.push(current);
    }
    path.reverse();
    path
}

/// Single-source, single-target Dijkstra. Returns `None` if `target` is
/// unreachable from `source` (or either node is absent from the graph).
pub fn shortest_path(graph: &WeightedGraph, source: Cell, target: Cell) -> Option<PairRoute> {
    if source == target {
        return Some(PairRoute { cost: 0.0, path: vec![source] });
    }
    let mut dist: HashMap<Cell, f64> = HashMap::new();
    let mut prev: HashMap<Cell, Cell> = HashMap::new();
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    dist.insert(source, 0.0);
    heap.push(HeapEntry { cost: 0.0, seq, node: source });

    while let Some(HeapEntry { cost, node, .. }) = heap.pop() {
        if cost > *dist.get(&node).unwrap_or(&f64::INFINITY) {
            continue;
        }
        if node == target {
            return Some(PairRoute { cost, path: reconstruct(&prev, source, target) });
        }
        for edge in graph.neighbors(node) {
            let next_cost = cost + edge.weight;
            if next_cost < *dist.get(&edge.to).unwrap_or(&f64::INFINITY) {
                dist.insert(edge.to, next_cost);
                prev.insert(edge.to, node);
                seq += 1;
                heap.push(HeapEntry { cost: next_cost, seq, node: edge.to });
            }
        }
    }
    None
}

/// Single-source Dijkstra that terminates once every node in `targets` has
/// been popped (amortizing one sweep across many pair needs, as used by the
/// lazy-Prim MST builder).
pub fn shortest_paths_to(graph: &WeightedGraph, source: Cell, targets: &HashSet<Cell>) -> HashMap<Cell, PairRoute> {
    let mut results = HashMap::new();
    if targets.is_empty() {
        return results;
    }
    let mut remaining: HashSet<Cell> = targets.iter().copied().filter(|t| *t != source).collect();
    if targets.contains(&source) {
        results.insert(source, PairRoute { cost: 0.0, path: vec![source] });
    }

    let mut dist: HashMap<Cell, f64> = HashMap::new();
    let mut prev: HashMap<Cell, Cell> = HashMap::new();
    let mut heap = BinaryHeap::new();
    let mut seq = 0u64;

    dist.insert(source, 0.0);
    heap.push(HeapEntry { cost: 0.0, seq, node: source });

    while let Some(HeapEntry { cost, node, .. }) = heap.pop() {
        if remaining.is_empty() {
            break;
        }
        if cost > *dist.get(&node).unwrap_or(&f64::INFINITY) {
            continue;
        }
        if remaining.remove(&node) {
            results.insert(node, PairRoute { cost, path: reconstruct(&prev, source, node) });
        }
        for edge in graph.neighbors(node) {
            let next_cost = cost + edge.weight;
            if next_cost < *dist.get(&edge.to).unwrap_or(&f64::INFINITY) {
                dist.insert(edge.to, next_cost);
                prev.insert(edge.to, node);
                seq += 1;
                heap.push(HeapEntry { cost: next_cost, seq, node: edge.to });
            }
        }
    }
    results
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::grid::Grid;

    fn plain_graph(w: i32, h: i32) -> WeightedGraph {
        let grid = Grid::new(w, h, 0.1, &[], &[], &[]).unwrap();
        let dw = grid.distance_transform_walls();
        let dt = grid.distance_transform_trays();
        WeightedGraph::build(&grid, &dw, &dt, 1.0)
    }

    #[test]
    fn finds_straight_line_path() {
        let graph = plain_graph(5, 5);
        let route = shortest_path(&graph, Cell::new(0, 0), Cell::new(4, 0)).unwrap();
        assert_eq!(route.path.first().copied(), Some(Cell::new(0, 0)));
        assert_eq!(route.path.last().copied(), Some(Cell::new(4, 0)));
        assert_eq!(route.path.len(), 5);
    }

    #[test]
    fn unreachable_target_returns_none() {
        let graph = plain_graph(3, 3);
        assert!(shortest_path(&graph, Cell::new(0, 0), Cell::new(10, 10)).is_none());
    }

    #[test]
    fn multi_target_matches_single_target_costs() {
        let graph = plain_graph(6, 6);
        let targets: HashSet<Cell> = [Cell::new(5, 5), Cell::new(0, 5), Cell::new(5, 0)].into_iter().collect();
        let many = shortest_paths_to(&graph, Cell::new(0, 0), &targets);
        for target in targets {
            let one = shortest_path(&graph, Cell::new(0, 0), target).unwrap();
            assert_eq!(many[&target].cost, one.cost);
        }
    }
}
