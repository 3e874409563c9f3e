//! Section extractor (§4.5): splits the final tree at natural Steiner
//! points (degree ≥ 3 in the cell adjacency) and groups cables that share a
//! sub-path into `Section`s.

use std::collections::{HashMap, HashSet, VecDeque};

use crate::model::{CableInput, Cell, Section};
use crate::steiner::SteinerTree;

/// A maximal sub-path of the tree between two natural Steiner points (or a
/// terminal and its nearest natural Steiner point).
#[derive(Debug, Clone)]
struct SubPath {
    cells: Vec<Cell>,
}

/// Nodes of adjacency degree ≥ 3: T-junctions the optimizer didn't
/// explicitly introduce but that the realised routes happen to share.
pub fn natural_steiner_points(adjacency: &HashMap<Cell, HashSet<Cell>>) -> Vec<Cell> {
    let mut points: Vec<Cell> = adjacency
        .iter()
        .filter(|(_, neighbours)| neighbours.len() >= 3)
        .map(|(cell, _)| *cell)
        .collect();
    points.sort_unstable();
    points
}

/// Splits every tree edge's realised path at interior natural Steiner
/// points, producing the sub-paths sections are built from.
fn split_into_subpaths(tree: &SteinerTree, natural_points: &HashSet<Cell>) -> Vec<SubPath> {
    let mut subpaths = Vec::new();
    for edge in &tree.edges {
        let path = &edge.route.path;
        if path.len() < 2 {
            continue;
        }
        let mut current = vec![path[0]];
        for &cell in &path[1..] {
            current.push(cell);
            let is_interior_split = natural_points.contains(&cell) && cell != *path.last().unwrap();
            if is_interior_split {
                subpaths.push(SubPath { cells: std::mem::replace(&mut current, vec![cell]) });
            }
        }
        if current.len() >= 2 {
            subpaths.push(SubPath { cells: current });
        }
    }
    subpaths
}

fn cable_route_via_adjacency(adjacency: &HashMap<Cell, HashSet<Cell>>, source: Cell, target: Cell) -> Option<Vec<Cell>> {
    if source == target {
        return Some(vec![source]);
    }
    let mut prev: HashMap<Cell, Cell> = HashMap::new();
    let mut visited: HashSet<Cell> = HashSet::from([source]);
    let mut queue = VecDeque::from([source]);
    while let Some(node) = queue.pop_front() {
        if node == target {
            let mut path = vec![target];
            let mut current = target;
            while current != source {
                current = prev[&current];
                path.push(current);
            }
            path.reverse();
            return Some(path);
        }
        let Some(neighbours) = adjacency.get(&node) else { continue };
        for &next in neighbours {
            if visited.insert(next) {
                prev.insert(next, node);
                queue.push_back(next);
            }
        }
    }
    None
}

pub struct CableEndpoints<'a> {
    pub identifier: &'a str,
    pub network: Option<&'a str>,
    pub source: Cell,
    pub target: Cell,
    pub detail: &'a CableInput,
}

/// Builds the final `Section` list, plus the end-to-end route of each cable
/// (§4.5). Cables with no path in the tree's adjacency (a disconnected
/// terminal) are omitted from both outputs.
///
/// A sub-path's member cables are grouped by network before a `Section` is
/// emitted: two cables from different networks that happen to share a
/// sub-path never collapse into one mislabeled section, matching the
/// original's per-network section pass over the shared tree.
pub fn extract_sections(tree: &SteinerTree, cables: &[CableEndpoints], stroke_width_cap: f64) -> (Vec<Section>, HashMap<String, Vec<Cell>>) {
    let adjacency = tree.cell_adjacency();
    let natural_points: HashSet<Cell> = natural_steiner_points(&adjacency).into_iter().collect();
    let subpaths = split_into_subpaths(tree, &natural_points);

    let mut routes: HashMap<String, Vec<Cell>> = HashMap::new();
    let mut route_cells: HashMap<String, HashSet<Cell>> = HashMap::new();
    for cable in cables {
        if let Some(route) = cable_route_via_adjacency(&adjacency, cable.source, cable.target) {
            route_cells.insert(cable.identifier.to_string(), route.iter().copied().collect());
            routes.insert(cable.identifier.to_string(), route);
        }
    }

    let mut sections = Vec::new();
    for subpath in &subpaths {
        let subpath_cells: HashSet<Cell> = subpath.cells.iter().copied().collect();
        let members: Vec<&CableEndpoints> = cables
            .iter()
            .filter(|c| {
                route_cells
                    .get(c.identifier)
                    .map(|cells| cells.intersection(&subpath_cells).count() >= 2)
                    .unwrap_or(false)
            })
            .collect();
        if members.is_empty() {
            continue;
        }

        let mut by_network: HashMap<Option<String>, Vec<&CableEndpoints>> = HashMap::new();
        for member in members {
            by_network.entry(member.network.map(|n| n.to_string())).or_default().push(member);
        }
        let mut network_keys: Vec<Option<String>> = by_network.keys().cloned().collect();
        network_keys.sort();

        for network in network_keys {
            let group = by_network.remove(&network).expect("key just read from this map");
            let cable_labels: Vec<String> = group.iter().map(|c| c.identifier.to_string()).collect();
            let details: HashMap<String, CableInput> = group.iter().map(|c| (c.identifier.to_string(), c.detail.clone())).collect();
            let stroke_width = 4.0 + (cable_labels.len() as f64 * 0.75).min(stroke_width_cap);
            sections.push(Section {
                points: subpath.cells.clone(),
                cables: cable_labels,
                network,
                details,
                stroke_width,
            });
        }
    }
    (sections, routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dijkstra::PairRoute;
    use crate::steiner::MstEdge;

    fn leaked_detail() -> &'static CableInput {
        Box::leak(Box::new(CableInput {
            cable_label: None,
            source: "a".into(),
            target: "b".into(),
            original_source: None,
            original_target: None,
            diameter: None,
            cable_function: None,
            network: None,
            cable_type: None,
            length: None,
        }))
    }

    fn straight_tree(from: Cell, to: Cell) -> SteinerTree {
        let mut cells = Vec::new();
        let (mut x, mut y) = (from.x, from.y);
        cells.push(Cell::new(x, y));
        while x != to.x {
            x += (to.x - x).signum();
            cells.push(Cell::new(x, y));
        }
        while y != to.y {
            y += (to.y - y).signum();
            cells.push(Cell::new(x, y));
        }
        SteinerTree {
            edges: vec![MstEdge {
                u: from,
                v: to,
                route: PairRoute { cost: (cells.len() - 1) as f64, path: cells },
            }],
        }
    }

    #[test]
    fn straight_corridor_yields_one_section_no_steiner_points() {
        let tree = straight_tree(Cell::new(0, 0), Cell::new(9, 0));
        let adjacency = tree.cell_adjacency();
        assert!(natural_steiner_points(&adjacency).is_empty());

        let cables = vec![CableEndpoints {
            identifier: "c1",
            network: Some("power"),
            source: Cell::new(0, 0),
            target: Cell::new(9, 0),
            detail: leaked_detail(),
        }];
        let (sections, routes) = extract_sections(&tree, &cables, 15.0);
        assert_eq!(sections.len(), 1);
        assert_eq!(sections[0].points.len(), 10);
        assert_eq!(routes["c1"].len(), 10);
        assert!(sections[0].details.contains_key("c1"));
    }

    #[test]
    fn different_networks_sharing_subpath_yield_separate_sections() {
        let tree = straight_tree(Cell::new(0, 0), Cell::new(9, 0));
        let cables = vec![
            CableEndpoints {
                identifier: "power-1",
                network: Some("power"),
                source: Cell::new(0, 0),
                target: Cell::new(9, 0),
                detail: leaked_detail(),
            },
            CableEndpoints {
                identifier: "data-1",
                network: Some("data"),
                source: Cell::new(0, 0),
                target: Cell::new(9, 0),
                detail: leaked_detail(),
            },
        ];
        let (sections, _) = extract_sections(&tree, &cables, 15.0);
        assert_eq!(sections.len(), 2);
        let networks: HashSet<Option<String>> = sections.iter().map(|s| s.network.clone()).collect();
        assert!(networks.contains(&Some("power".to_string())));
        assert!(networks.contains(&Some("data".to_string())));
        for section in &sections {
            assert_eq!(section.cables.len(), 1);
        }
    }

    #[test]
    fn stroke_width_caps_at_fifteen_over_base() {
        let tree = straight_tree(Cell::new(0, 0), Cell::new(3, 0));
        let cables: Vec<CableEndpoints> = (0..30)
            .map(|i| CableEndpoints {
                identifier: Box::leak(format!("c{i}").into_boxed_str()),
                network: Some("power"),
                source: Cell::new(0, 0),
                target: Cell::new(3, 0),
                detail: leaked_detail(),
            })
            .collect();
        let (sections, _) = extract_sections(&tree, &cables, 15.0);
        assert_eq!(sections[0].stroke_width, 19.0);
    }
}
