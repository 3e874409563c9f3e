//! Cable-tray routing engine: grid model, weighted graph, Dijkstra, the
//! Steiner local-search optimizer, section extraction and length-aware
//! reroute, wired together into a single [`route`] entry point.
#![forbid(unsafe_code)]

pub mod dijkstra;
pub mod error;
pub mod graph;
pub mod grid;
pub mod model;
pub mod reroute;
pub mod sections;
pub mod steiner;

#[cfg(test)]
mod testutil;

use std::collections::{BTreeSet, HashMap};

use error::Result;
use graph::GraphCache;
use grid::Grid;
use model::{CableInput, Cell, DebugInfo, GridConfig, HananGrid, RoutingResponse};
use sections::{extract_sections, natural_steiner_points, CableEndpoints};
use steiner::{lazy_prim_mst, optimize, PairRouteCache};

const FULL_STRENGTH_RED_CABLE: f64 = 1.0;
const SECTION_STROKE_CAP: f64 = 15.0;

struct ValidCable {
    identifier: String,
    network: Option<String>,
    source: Cell,
    target: Cell,
    declared_length: Option<f64>,
    input: CableInput,
}

fn resolve_terminal(config: &GridConfig, machine_id: &str) -> Option<Cell> {
    config.machines.get(machine_id).map(|m| m.cell())
}

/// Validates cables against the known machine set (§7 kind 1): a cable
/// referring to an unknown machine is dropped with a warning, never fatal.
fn resolve_cables(config: &GridConfig) -> Vec<ValidCable> {
    let function_to_network: HashMap<&str, &str> = config
        .networks
        .iter()
        .flat_map(|net| net.functions.iter().map(move |f| (f.as_str(), net.name.as_str())))
        .collect();

    config
        .cables
        .iter()
        .filter_map(|cable| {
            let source = resolve_terminal(config, &cable.source);
            let target = resolve_terminal(config, &cable.target);
            let (Some(source), Some(target)) = (source, target) else {
                log::warn!(
                    "cable {} references an unknown machine (source={}, target={}); dropping",
                    cable.identifier(),
                    cable.source,
                    cable.target
                );
                return None;
            };
            let network = cable
                .cable_function
                .as_deref()
                .and_then(|f| function_to_network.get(f))
                .map(|n| n.to_string())
                .or_else(|| cable.network.clone());
            Some(ValidCable {
                identifier: cable.identifier(),
                network,
                source,
                target,
                declared_length: cable.parsed_length(),
                input: cable.clone(),
            })
        })
        .collect()
}

fn terminals_by_network(cables: &[ValidCable]) -> HashMap<Option<String>, Vec<Cell>> {
    let mut grouped: HashMap<Option<String>, BTreeSet<Cell>> = HashMap::new();
    for cable in cables {
        let entry = grouped.entry(cable.network.clone()).or_default();
        entry.insert(cable.source);
        entry.insert(cable.target);
    }
    grouped.into_iter().map(|(k, v)| (k, v.into_iter().collect())).collect()
}

/// Runs the full five-stage pipeline (§2) over one request and produces its
/// response. The engine is a pure function of `config`; no state persists
/// between calls.
pub fn route(config: &GridConfig) -> Result<RoutingResponse> {
    let grid = Grid::new(
        config.width,
        config.height,
        config.grid_resolution,
        &config.walls,
        &config.perforations,
        &config.trays,
    )?;
    let dist_wall = grid.distance_transform_walls();
    let dist_tray = grid.distance_transform_trays();

    let valid_cables = resolve_cables(config);
    let by_network = terminals_by_network(&valid_cables);
    let all_terminals: Vec<Cell> = {
        let set: BTreeSet<Cell> = valid_cables.iter().flat_map(|c| [c.source, c.target]).collect();
        set.into_iter().collect()
    };

    let mut graph_cache = GraphCache::new();
    let mut pair_cache = PairRouteCache::new();

    if all_terminals.len() < 2 {
        log::debug!("fewer than two terminals; nothing to route");
        let hanan_grid = hanan_grid_of(&all_terminals);
        return Ok(RoutingResponse {
            hanan_grid,
            ..Default::default()
        });
    }

    let graph = graph_cache.get_or_build(&grid, &dist_wall, &dist_tray, FULL_STRENGTH_RED_CABLE);
    log::debug!(
        "built weighted graph: {} terminals across {} networks",
        all_terminals.len(),
        by_network.len()
    );

    let initial_length = lazy_prim_mst(graph, &all_terminals, &mut pair_cache).total_length(graph);
    let outcome = optimize(graph, &by_network, &all_terminals, &mut pair_cache);
    let final_length = outcome.tree.total_length(graph);
    log::info!(
        "optimizer converged after {} passes: {} -> {} ({} components adopted of {} tried)",
        outcome.passes_used,
        initial_length,
        final_length,
        outcome.num_components_used,
        outcome.num_components_tried
    );

    let adjacency = outcome.tree.cell_adjacency();
    let mut steiner_points: Vec<Cell> = outcome.steiner_points.clone();
    for natural in natural_steiner_points(&adjacency) {
        if !steiner_points.contains(&natural) {
            steiner_points.push(natural);
        }
    }
    steiner_points.sort_unstable();

    let identifiers: Vec<String> = valid_cables.iter().map(|c| c.identifier.clone()).collect();
    let networks: Vec<Option<String>> = valid_cables.iter().map(|c| c.network.clone()).collect();
    let cable_refs: Vec<CableEndpoints> = valid_cables
        .iter()
        .enumerate()
        .map(|(i, cable)| CableEndpoints {
            identifier: &identifiers[i],
            network: networks[i].as_deref(),
            source: cable.source,
            target: cable.target,
            detail: &cable.input,
        })
        .collect();
    let (mut sections, mut cable_routes) = extract_sections(&outcome.tree, &cable_refs, SECTION_STROKE_CAP);

    for cable in &valid_cables {
        if !cable_routes.contains_key(&cable.identifier) {
            log::warn!("cable {} has no route in the optimized tree; omitting", cable.identifier);
        }
    }

    let mut problematic_cables = Vec::new();
    for cable in &valid_cables {
        let Some(existing_route) = cable_routes.remove(&cable.identifier) else {
            continue;
        };
        let outcome = reroute::reroute_if_needed(
            &grid,
            &dist_wall,
            &dist_tray,
            &mut graph_cache,
            &cable.identifier,
            cable.source,
            cable.target,
            existing_route,
            cable.declared_length,
        );
        if let Some(problematic) = outcome.problematic {
            log::warn!(
                "cable {} exceeds its declared length by {:.3} ({:.1}%)",
                problematic.cable_label,
                problematic.excess_length,
                problematic.excess_percentage
            );
            problematic_cables.push(problematic);
        }
        cable_routes.insert(cable.identifier.clone(), outcome.route);
    }

    let hanan_terminals: Vec<Cell> = all_terminals.iter().chain(steiner_points.iter()).copied().collect();
    let hanan_grid = hanan_grid_of(&hanan_terminals);

    let num_sections = sections.len();
    let debug_info = DebugInfo {
        initial_mst_length: initial_length,
        final_length,
        improvement_percentage: if initial_length > 0.0 { 100.0 * (initial_length - final_length) / initial_length } else { 0.0 },
        num_steiner_points: steiner_points.len(),
        num_sections,
        num_components_tried: outcome.num_components_tried,
        num_components_used: outcome.num_components_used,
        passes_used: outcome.passes_used,
    };

    sections.sort_by(|a, b| a.points.first().cmp(&b.points.first()));

    Ok(RoutingResponse {
        sections,
        cable_routes,
        hanan_grid,
        steiner_points,
        debug_info,
        problematic_cables,
    })
}

fn hanan_grid_of(cells: &[Cell]) -> HananGrid {
    let x_coords: BTreeSet<i32> = cells.iter().map(|c| c.x).collect();
    let y_coords: BTreeSet<i32> = cells.iter().map(|c| c.y).collect();
    HananGrid {
        x_coords: x_coords.into_iter().collect(),
        y_coords: y_coords.into_iter().collect(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testutil::*;

    #[test]
    fn single_machine_no_cables_is_empty() {
        let config = single_machine_fixture();
        let response = route(&config).unwrap();
        assert!(response.sections.is_empty());
        assert!(response.cable_routes.is_empty());
        assert_eq!(response.hanan_grid.x_coords.len(), 1);
        assert_eq!(response.hanan_grid.y_coords.len(), 1);
    }

    #[test]
    fn straight_corridor_has_manhattan_length_route() {
        let config = straight_corridor_fixture();
        let response = route(&config).unwrap();
        assert_eq!(response.sections.len(), 1);
        assert!(response.steiner_points.is_empty());
        let route = &response.cable_routes["c1"];
        assert_eq!(route.len(), 19);
    }

    #[test]
    fn perforation_unlocks_path_through_wall_row() {
        let config = perforation_fixture();
        let response = route(&config).unwrap();
        let route = &response.cable_routes["c1"];
        assert!(route.contains(&Cell::new(2, 2)));
        assert_eq!(route.len(), 5);
    }

    #[test]
    fn disjoint_islands_do_not_crash() {
        let config = disjoint_islands_fixture();
        let response = route(&config).unwrap();
        assert_eq!(response.cable_routes.len(), 2);
        assert!(response.problematic_cables.is_empty());
    }

    #[test]
    fn missing_machine_reference_is_dropped_not_fatal() {
        let config = dangling_cable_fixture();
        let response = route(&config);
        assert!(response.is_ok());
        assert!(response.unwrap().cable_routes.is_empty());
    }

    #[test]
    fn every_route_avoids_blocked_cells() {
        let config = perforation_fixture();
        let grid = Grid::new(config.width, config.height, config.grid_resolution, &config.walls, &config.perforations, &config.trays).unwrap();
        let response = route(&config).unwrap();
        for route in response.cable_routes.values() {
            for cell in route {
                assert!(grid.is_passable(*cell));
            }
        }
    }
}
