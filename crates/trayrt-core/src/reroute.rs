//! Length-aware reroute (§4.6): for cables whose route exceeds a declared
//! physical length ceiling, retry with progressively relaxed `redCable`
//! values before giving up and reporting the cable as problematic.

use crate::dijkstra::shortest_path;
use crate::grid::{DistanceMap, Grid};
use crate::graph::GraphCache;
use crate::model::{Cell, ProblematicCable};

const RETRY_START: f64 = 0.55;
const RETRY_STEP: f64 = 0.1;
const MAX_RETRIES: usize = 5;

pub struct RerouteOutcome {
    pub route: Vec<Cell>,
    pub problematic: Option<ProblematicCable>,
}

/// Re-examines one cable's route against its declared length ceiling, if
/// any. `route` is the route already produced by the tree/section stage.
#[allow(clippy::too_many_arguments)]
pub fn reroute_if_needed(
    grid: &Grid,
    dist_wall: &DistanceMap,
    dist_tray: &DistanceMap,
    graph_cache: &mut GraphCache,
    cable_label: &str,
    source: Cell,
    target: Cell,
    route: Vec<Cell>,
    declared_length: Option<f64>,
) -> RerouteOutcome {
    let Some(declared_length) = declared_length else {
        return RerouteOutcome { route, problematic: None };
    };

    let route_length = route_length_metres(&route, grid.resolution);
    if route_length <= declared_length {
        return RerouteOutcome { route, problematic: None };
    }

    let mut red_cable = RETRY_START;
    for _ in 0..MAX_RETRIES {
        let graph = graph_cache.get_or_build(grid, dist_wall, dist_tray, red_cable);
        if let Some(candidate) = shortest_path(graph, source, target) {
            let candidate_length = route_length_metres(&candidate.path, grid.resolution);
            if candidate_length <= declared_length {
                return RerouteOutcome { route: candidate.path, problematic: None };
            }
        }
        red_cable -= RETRY_STEP;
    }

    let theoretical_min = source.manhattan(target) as f64 * grid.resolution;
    let excess_length = route_length - declared_length;
    let problematic = ProblematicCable {
        cable_label: cable_label.to_string(),
        specified_length: declared_length,
        route_length,
        theoretical_min_length: theoretical_min,
        excess_length,
        excess_percentage: if declared_length > 0.0 { 100.0 * excess_length / declared_length } else { 0.0 },
    };
    RerouteOutcome { route, problematic: Some(problematic) }
}

fn route_length_metres(route: &[Cell], resolution: f64) -> f64 {
    if route.is_empty() {
        0.0
    } else {
        (route.len() - 1) as f64 * resolution
    }
}
