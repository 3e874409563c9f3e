//! Steiner optimizer (§4.4): lazy-Prim MST construction followed by a
//! multi-pass local search that proposes 3- and 4-terminal full components
//! and adopts the single best-scoring one per pass.

use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap, HashSet};

use rayon::prelude::*;

use crate::dijkstra::{shortest_path, shortest_paths_to, PairRoute};
use crate::graph::WeightedGraph;
use crate::model::Cell;

/// Bidirectional cache of realised pair routes, owned by the request
/// context. `pair(u, v)` and `pair(v, u)` always mirror each other.
#[derive(Debug, Default)]
pub struct PairRouteCache {
    routes: HashMap<(Cell, Cell), PairRoute>,
}

impl PairRouteCache {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, a: Cell, b: Cell, route: PairRoute) {
        let reverse = route.reversed();
        self.routes.insert((a, b), route);
        self.routes.insert((b, a), reverse);
    }

    pub fn get_or_compute(&mut self, graph: &WeightedGraph, a: Cell, b: Cell) -> Option<PairRoute> {
        if let Some(route) = self.routes.get(&(a, b)) {
            return Some(route.clone());
        }
        let route = shortest_path(graph, a, b)?;
        self.insert(a, b, route.clone());
        Some(route)
    }

    /// Read-only lookup, for callers that already know the pair was warmed
    /// (e.g. parallel candidate scoring, which must not mutate the cache).
    pub fn get(&self, a: Cell, b: Cell) -> Option<&PairRoute> {
        self.routes.get(&(a, b))
    }
}

#[derive(Debug, Clone)]
pub struct MstEdge {
    pub u: Cell,
    pub v: Cell,
    pub route: PairRoute,
}

#[derive(Debug, Clone, Default)]
pub struct SteinerTree {
    pub edges: Vec<MstEdge>,
}

impl SteinerTree {
    /// Undirected adjacency over every cell visited by any edge's route —
    /// the basis for natural Steiner point detection in the section
    /// extractor.
    pub fn cell_adjacency(&self) -> HashMap<Cell, HashSet<Cell>> {
        let mut adjacency: HashMap<Cell, HashSet<Cell>> = HashMap::new();
        for edge in &self.edges {
            for pair in edge.route.path.windows(2) {
                let (a, b) = (pair[0], pair[1]);
                adjacency.entry(a).or_default().insert(b);
                adjacency.entry(b).or_default().insert(a);
            }
        }
        adjacency
    }

    /// Total weighted length, cell-level de-duplicated across edges that
    /// happen to share cells.
    pub fn total_length(&self, graph: &WeightedGraph) -> f64 {
        let paths: Vec<&[Cell]> = self.edges.iter().map(|e| e.route.path.as_slice()).collect();
        merged_weight(&paths, graph)
    }
}

#[derive(Clone)]
struct CandidateEdge {
    cost: f64,
    seq: u64,
    from: Cell,
    to: Cell,
}

impl PartialEq for CandidateEdge {
    fn eq(&self, other: &Self) -> bool {
        self.cost.to_bits() == other.cost.to_bits() && self.seq == other.seq
    }
}
impl Eq for CandidateEdge {}
impl Ord for CandidateEdge {
    fn cmp(&self, other: &Self) -> Ordering {
        other
            .cost
            .partial_cmp(&self.cost)
            .unwrap_or(Ordering::Equal)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}
impl PartialOrd for CandidateEdge {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

/// Lazy-Prim MST over `terminals` (§4.4.1). When the terminal set spans
/// several disconnected regions of the graph, a fresh component is started
/// from whatever remains once a component's heap drains — the result is a
/// spanning forest, one independent tree per reachable region, rather than
/// silently abandoning the unreachable terminals.
pub fn lazy_prim_mst(graph: &WeightedGraph, terminals: &[Cell], cache: &mut PairRouteCache) -> SteinerTree {
    let mut edges = Vec::new();
    if terminals.len() < 2 {
        return SteinerTree { edges };
    }
    let mut remaining: HashSet<Cell> = terminals.iter().copied().collect();

    while remaining.len() > 1 {
        let start = *remaining.iter().min().expect("remaining is non-empty");
        remaining.remove(&start);
        let mut in_tree: HashSet<Cell> = HashSet::from([start]);
        let mut heap = BinaryHeap::new();
        let mut seq = 0u64;

        push_candidate_edges(graph, cache, start, &remaining, &mut heap, &mut seq);

        while !remaining.is_empty() {
            let Some(CandidateEdge { from, to, .. }) = heap.pop() else {
                break; // heap exhausted before every terminal in this component was reached
            };
            if in_tree.contains(&to) {
                continue; // stale lazy entry, superseded by a cheaper one already adopted
            }
            let route = cache
                .get_or_compute(graph, from, to)
                .expect("candidate edge was pushed from a reachable Dijkstra sweep");
            in_tree.insert(to);
            remaining.remove(&to);
            edges.push(MstEdge { u: from, v: to, route });
            push_candidate_edges(graph, cache, to, &remaining, &mut heap, &mut seq);
        }
        if in_tree.len() == 1 {
            // the chosen start couldn't reach anything still remaining: it's
            // its own isolated component (no edges to emit for it)
            continue;
        }
    }
    SteinerTree { edges }
}

fn push_candidate_edges(
    graph: &WeightedGraph,
    cache: &mut PairRouteCache,
    from: Cell,
    remaining: &HashSet<Cell>,
    heap: &mut BinaryHeap<CandidateEdge>,
    seq: &mut u64,
) {
    for (to, route) in shortest_paths_to(graph, from, remaining) {
        let cost = route.cost;
        cache.insert(from, to, route);
        *seq += 1;
        heap.push(CandidateEdge { cost, seq: *seq, from, to });
    }
}

/// Sum of the weight of entering each distinct cell touched by any of
/// `paths`, counting cells shared across paths once (§4.4.3's cell-level
/// de-duplication).
fn merged_weight(paths: &[&[Cell]], graph: &WeightedGraph) -> f64 {
    let mut entering: HashMap<Cell, f64> = HashMap::new();
    for path in paths {
        for pair in path.windows(2) {
            let (from, to) = (pair[0], pair[1]);
            if let Some(edge) = graph.neighbors(from).iter().find(|e| e.to == to) {
                entering.insert(to, edge.weight);
            }
        }
    }
    entering.values().sum()
}

fn span_lower_bound(terminals: &[Cell]) -> f64 {
    let min_x = terminals.iter().map(|c| c.x).min().unwrap_or(0);
    let max_x = terminals.iter().map(|c| c.x).max().unwrap_or(0);
    let min_y = terminals.iter().map(|c| c.y).min().unwrap_or(0);
    let max_y = terminals.iter().map(|c| c.y).max().unwrap_or(0);
    ((max_x - min_x) + (max_y - min_y)) as f64
}

/// A candidate 3- or 4-terminal full component (§4.4.2).
#[derive(Debug, Clone)]
pub struct Candidate {
    pub terminals: Vec<Cell>,
    pub steiner_points: Vec<Cell>,
    pub connections: Vec<(Cell, Cell)>,
}

fn median3(a: i32, b: i32, c: i32) -> i32 {
    let mut v = [a, b, c];
    v.sort_unstable();
    v[1]
}

fn dominant_axis_is_x(a: Cell, b: Cell) -> bool {
    (a.x - b.x).abs() >= (a.y - b.y).abs()
}

fn three_terminal_candidate(t1: Cell, t2: Cell, t3: Cell) -> Candidate {
    let sp = Cell::new(median3(t1.x, t2.x, t3.x), median3(t1.y, t2.y, t3.y));
    Candidate {
        terminals: vec![t1, t2, t3],
        steiner_points: vec![sp],
        connections: vec![(sp, t1), (sp, t2), (sp, t3)],
    }
}

fn four_terminal_candidate(pair_a: (Cell, Cell), pair_b: (Cell, Cell)) -> Option<Candidate> {
    let (a, b) = pair_a;
    let (c, d) = pair_b;
    if dominant_axis_is_x(a, b) == dominant_axis_is_x(c, d) {
        return None; // the two pairs must run on orthogonal dominant axes
    }
    let sp1 = Cell::new(a.x, b.y);
    let sp2 = Cell::new(c.x, d.y);
    Some(Candidate {
        terminals: vec![a, b, c, d],
        steiner_points: vec![sp1, sp2],
        connections: vec![(a, sp1), (b, sp1), (c, sp2), (d, sp2), (sp1, sp2)],
    })
}

fn nearest_terminals(t1: Cell, group: &[Cell], graph: &WeightedGraph, cache: &mut PairRouteCache, n: usize) -> Vec<Cell> {
    let mut costs: Vec<(Cell, f64)> = group
        .iter()
        .copied()
        .filter(|t| *t != t1)
        .filter_map(|t| cache.get_or_compute(graph, t1, t).map(|r| (t, r.cost)))
        .collect();
    costs.sort_by(|a, b| a.1.partial_cmp(&b.1).unwrap_or(Ordering::Equal));
    costs.truncate(n);
    costs.into_iter().map(|(t, _)| t).collect()
}

const NEAREST_NEIGHBOURS: usize = 5;
const MAX_CANDIDATE_GROUPS: usize = 50;

/// Generates 3- and 4-terminal full-component candidates per network,
/// deduplicated by sorted terminal set and capped at 50 groups (§4.4.2).
pub fn generate_candidates(
    terminals_by_network: &HashMap<Option<String>, Vec<Cell>>,
    graph: &WeightedGraph,
    cache: &mut PairRouteCache,
) -> Vec<Candidate> {
    let mut seen: HashSet<Vec<Cell>> = HashSet::new();
    let mut candidates = Vec::new();

    for group in terminals_by_network.values() {
        if group.len() < 3 {
            continue;
        }
        for &t1 in group {
            let neighbours = nearest_terminals(t1, group, graph, cache, NEAREST_NEIGHBOURS);

            for &t2 in &neighbours {
                for &t3 in &neighbours {
                    if t2 == t3 {
                        continue;
                    }
                    if (t1.x - t2.x).abs() + (t2.y - t3.y).abs() < (t1.x - t3.x).abs() + (t2.y - t1.y).abs() {
                        let candidate = three_terminal_candidate(t1, t2, t3);
                        push_deduped(&mut seen, &mut candidates, candidate);
                    }
                }
            }

            for &t2 in &neighbours {
                for &t3 in &neighbours {
                    for &t4 in &neighbours {
                        if [t2, t3, t4].iter().collect::<HashSet<_>>().len() < 3 {
                            continue;
                        }
                        for (pair_a, pair_b) in [((t1, t2), (t3, t4)), ((t1, t3), (t2, t4))] {
                            if let Some(candidate) = four_terminal_candidate(pair_a, pair_b) {
                                push_deduped(&mut seen, &mut candidates, candidate);
                            }
                        }
                    }
                }
            }
        }
        if candidates.len() >= MAX_CANDIDATE_GROUPS {
            break;
        }
    }
    candidates.truncate(MAX_CANDIDATE_GROUPS);
    candidates
}

fn push_deduped(seen: &mut HashSet<Vec<Cell>>, candidates: &mut Vec<Candidate>, candidate: Candidate) {
    let mut key = candidate.terminals.clone();
    key.sort_unstable();
    if seen.insert(key) {
        candidates.push(candidate);
    }
}

/// Warms the cache with every pair route a candidate's connections need.
/// Must run serially (`PairRouteCache` is not `Sync`-safe to mutate), ahead
/// of the read-only, parallel scoring pass. Returns `false` if any
/// connection is unreachable, in which case the candidate cannot score.
fn warm_candidate_routes(candidate: &Candidate, graph: &WeightedGraph, cache: &mut PairRouteCache) -> bool {
    candidate.connections.iter().all(|&(a, b)| cache.get_or_compute(graph, a, b).is_some())
}

/// Scores a candidate against the current tree (§4.4.3): `gain = removed -
/// added`, both computed with cell-level de-duplication. Returns `None` if
/// the candidate is pruned by the span lower bound. Read-only over the
/// cache: every connection must already have been warmed by
/// [`warm_candidate_routes`], so this is safe to call from a parallel
/// iterator over independent candidates (§4.4.4's "read-only candidate
/// evaluation").
fn score_candidate(candidate: &Candidate, tree: &SteinerTree, graph: &WeightedGraph, cache: &PairRouteCache) -> Option<f64> {
    let members: HashSet<Cell> = candidate.terminals.iter().copied().collect();
    let removed_paths: Vec<&[Cell]> = tree
        .edges
        .iter()
        .filter(|e| members.contains(&e.u) && members.contains(&e.v))
        .map(|e| e.route.path.as_slice())
        .collect();
    let removed = merged_weight(&removed_paths, graph);

    if removed <= span_lower_bound(&candidate.terminals) {
        return None; // added cost can't realistically beat this; skip before paying for Dijkstra
    }

    let routes: Vec<&PairRoute> = candidate.connections.iter().map(|&(a, b)| cache.get(a, b)).collect::<Option<_>>()?;
    let added_paths: Vec<&[Cell]> = routes.iter().map(|r| r.path.as_slice()).collect();
    let added = merged_weight(&added_paths, graph);

    let gain = removed - added;
    if gain > 0.0 {
        Some(gain)
    } else {
        None
    }
}

#[derive(Debug, Clone, Default)]
pub struct OptimizationOutcome {
    pub tree: SteinerTree,
    pub steiner_points: Vec<Cell>,
    pub passes_used: usize,
    pub num_components_tried: usize,
    pub num_components_used: usize,
}

const MAX_PASSES: usize = 5;

/// The full §4.4.4 local search: up to `MAX_PASSES` outer passes, each
/// adopting the single best-scoring candidate, terminating early once a
/// pass adopts nothing.
pub fn optimize(
    graph: &WeightedGraph,
    terminals_by_network: &HashMap<Option<String>, Vec<Cell>>,
    all_terminals: &[Cell],
    cache: &mut PairRouteCache,
) -> OptimizationOutcome {
    let mut tree = lazy_prim_mst(graph, all_terminals, cache);
    let mut steiner_points: Vec<Cell> = Vec::new();
    let mut active_terminals: Vec<Cell> = all_terminals.to_vec();
    let mut networks: HashMap<Option<String>, Vec<Cell>> = terminals_by_network.clone();

    let mut num_tried = 0;
    let mut num_used = 0;
    let mut passes_used = 0;

    for pass in 1..=MAX_PASSES {
        passes_used = pass;
        let candidates = generate_candidates(&networks, graph, cache);
        num_tried += candidates.len();

        // Route-finding needs a mutable cache, so warm every candidate's
        // connections serially first; the actual gain arithmetic that
        // follows touches only `graph` and the now-stable cache, so it can
        // run over `rayon`'s thread pool.
        let warmed: Vec<Candidate> = candidates.into_iter().filter(|c| warm_candidate_routes(c, graph, cache)).collect();

        let cache_ref: &PairRouteCache = &*cache;
        let scored: Vec<(f64, Candidate)> = warmed
            .into_par_iter()
            .filter_map(|candidate| score_candidate(&candidate, &tree, graph, cache_ref).map(|gain| (gain, candidate)))
            .collect();

        let mut best: Option<(f64, Candidate)> = None;
        for (gain, candidate) in scored {
            let keep = match &best {
                Some((best_gain, _)) => gain > *best_gain,
                None => true,
            };
            if keep {
                best = Some((gain, candidate));
            }
        }

        let Some((_, candidate)) = best else {
            break; // zero adoptions this pass: converged
        };

        // §4.4.4 requires measuring the re-MST's actual length change, not
        // trusting the candidate's local gain estimate: forcing its Steiner
        // points to be mandatory terminals can still lengthen the rebuilt
        // tree. Simulate before committing and only adopt on a strict
        // decrease, preserving the initial_mst_length >= final_length law.
        let mut trial_terminals = active_terminals.clone();
        for sp in &candidate.steiner_points {
            if !trial_terminals.contains(sp) {
                trial_terminals.push(*sp);
            }
        }
        let trial_tree = lazy_prim_mst(graph, &trial_terminals, cache);
        let trial_length = trial_tree.total_length(graph);
        let current_length = tree.total_length(graph);
        if trial_length >= current_length {
            break; // the simulated re-MST didn't actually shrink; converged
        }

        for sp in &candidate.steiner_points {
            if !steiner_points.contains(sp) {
                steiner_points.push(*sp);
            }
            if !active_terminals.contains(sp) {
                active_terminals.push(*sp);
            }
            for group in networks.values_mut() {
                if candidate.terminals.iter().any(|t| group.contains(t)) && !group.contains(sp) {
                    group.push(*sp);
                }
            }
        }
        tree = trial_tree;
        num_used += 1;
    }

    OptimizationOutcome {
        tree,
        steiner_points,
        passes_used,
        num_components_tried: num_tried,
        num_components_used: num_used,
    }
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
    fn mst_connects_every_terminal() {
        let graph = plain_graph(12, 12);
        let terminals = vec![Cell::new(0, 0), Cell::new(11, 0), Cell::new(5, 11)];
        let mut cache = PairRouteCache::new();
        let tree = lazy_prim_mst(&graph, &terminals, &mut cache);
        assert_eq!(tree.edges.len(), terminals.len() - 1);
        let adjacency = tree.cell_adjacency();
        for terminal in &terminals {
            assert!(adjacency.contains_key(terminal), "terminal {terminal:?} missing from MST adjacency");
        }
    }

    #[test]
    fn three_terminal_star_uses_median_steiner_point() {
        let candidate = three_terminal_candidate(Cell::new(0, 0), Cell::new(10, 0), Cell::new(5, 10));
        assert_eq!(candidate.steiner_points[0], Cell::new(5, 0));
        assert_eq!(candidate.connections.len(), 3);
    }

    #[test]
    fn steiner_win_reduces_tree_length() {
        // Three machines forming a triangle; the Steiner star at (5, 0)
        // should strictly beat the raw pairwise MST.
        let graph = plain_graph(20, 20);
        let terminals = vec![Cell::new(0, 0), Cell::new(10, 0), Cell::new(5, 10)];
        let mut networks = HashMap::new();
        networks.insert(Some("power".to_string()), terminals.clone());
        let mut cache = PairRouteCache::new();

        let initial = lazy_prim_mst(&graph, &terminals, &mut cache).total_length(&graph);
        let outcome = optimize(&graph, &networks, &terminals, &mut cache);
        let optimized = outcome.tree.total_length(&graph);

        assert!(optimized <= initial);
    }

    #[test]
    fn four_terminal_candidate_rejects_parallel_axes() {
        let pair_a = (Cell::new(0, 0), Cell::new(10, 0));
        let pair_b = (Cell::new(0, 5), Cell::new(10, 5));
        assert!(four_terminal_candidate(pair_a, pair_b).is_none());
    }
}
