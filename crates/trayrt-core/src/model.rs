//! Data model: the request/response wire types and the identifiers used
//! throughout the pipeline.
//!
//! `Cell` doubles as the wire-level `Point` — terminals, Steiner points and
//! grid coordinates are all just `(x, y)` pairs, so one type plays every
//! role the design notes call for ("represent as coords + optional tag").

use std::collections::HashMap;

use serde::{Deserialize, Serialize};

/// A unit cell of the grid, also used as the wire format for points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct Cell {
    pub x: i32,
    pub y: i32,
}

impl Cell {
    pub fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    pub fn manhattan(self, other: Cell) -> u32 {
        self.x.abs_diff(other.x) + self.y.abs_diff(other.y)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Machine {
    pub x: i32,
    pub y: i32,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default, rename = "mergedHistory")]
    pub merged_history: Option<HashMap<String, bool>>,
}

impl Machine {
    pub fn cell(&self) -> Cell {
        Cell::new(self.x, self.y)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CableInput {
    #[serde(default)]
    pub cable_label: Option<String>,
    pub source: String,
    pub target: String,
    #[serde(default)]
    pub original_source: Option<String>,
    #[serde(default)]
    pub original_target: Option<String>,
    #[serde(default)]
    pub diameter: Option<f64>,
    #[serde(default)]
    pub cable_function: Option<String>,
    #[serde(default)]
    pub network: Option<String>,
    #[serde(default)]
    pub cable_type: Option<String>,
    /// Declared physical length, e.g. `"12,5m"`. Empty string means "no ceiling".
    #[serde(default)]
    pub length: Option<String>,
}

impl CableInput {
    /// The key identifying this cable across maps: its label if present,
    /// otherwise a synthetic `source->target` identifier.
    pub fn identifier(&self) -> String {
        match &self.cable_label {
            Some(label) if !label.is_empty() => label.clone(),
            _ => format!("{}->{}", self.source, self.target),
        }
    }

    /// Parses `self.length` into metres. `None`/empty means no ceiling.
    pub fn parsed_length(&self) -> Option<f64> {
        self.length.as_deref().and_then(parse_length)
    }
}

/// Parses a declared length string such as `"12,5m"`, `"4.0"`, `""` into
/// metres. Empty (or whitespace-only) input means "no ceiling" and yields
/// `None`, per spec.md's open-question resolution to preserve that default.
pub fn parse_length(raw: &str) -> Option<f64> {
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return None;
    }
    let numeric = trimmed.trim_end_matches(['m', 'M']).trim().replace(',', ".");
    numeric.parse::<f64>().ok()
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct NetworkInput {
    pub name: String,
    #[serde(default)]
    pub functions: Vec<String>,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct GridConfig {
    pub width: i32,
    pub height: i32,
    #[serde(default = "default_resolution")]
    pub grid_resolution: f64,
    #[serde(default)]
    pub walls: Vec<Cell>,
    #[serde(default)]
    pub perforations: Vec<Cell>,
    #[serde(default)]
    pub trays: Vec<Cell>,
    #[serde(default)]
    pub machines: HashMap<String, Machine>,
    #[serde(default)]
    pub cables: Vec<CableInput>,
    #[serde(default)]
    pub networks: Vec<NetworkInput>,
}

fn default_resolution() -> f64 {
    0.1
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Section {
    pub points: Vec<Cell>,
    pub cables: Vec<String>,
    pub network: Option<String>,
    pub details: HashMap<String, CableInput>,
    pub stroke_width: f64,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ProblematicCable {
    pub cable_label: String,
    pub specified_length: f64,
    pub route_length: f64,
    pub theoretical_min_length: f64,
    pub excess_length: f64,
    pub excess_percentage: f64,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HananGrid {
    pub x_coords: Vec<i32>,
    pub y_coords: Vec<i32>,
}

/// Deliberately left as the literal, mixed-case field names from spec.md's
/// wire contract rather than normalized camelCase.
#[derive(Debug, Clone, Default, Serialize)]
pub struct DebugInfo {
    pub initial_mst_length: f64,
    pub final_length: f64,
    pub improvement_percentage: f64,
    pub num_steiner_points: usize,
    pub num_sections: usize,
    pub num_components_tried: usize,
    pub num_components_used: usize,
    pub passes_used: usize,
}

#[derive(Debug, Clone, Default, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutingResponse {
    pub sections: Vec<Section>,
    pub cable_routes: HashMap<String, Vec<Cell>>,
    pub hanan_grid: HananGrid,
    pub steiner_points: Vec<Cell>,
    pub debug_info: DebugInfo,
    pub problematic_cables: Vec<ProblematicCable>,
}

/// Request for the "update cable length" interface (§6); the engine itself
/// is stateless, so acting on this is just re-deriving a new declared
/// length for a cable before the caller resubmits a full `GridConfig`.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCableLengthRequest {
    #[serde(default)]
    pub cable_label: Option<String>,
    pub source: String,
    pub target: String,
    pub new_length: String,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateCableLengthResponse {
    pub success: bool,
    pub message: String,
    pub cable_identifier: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_comma_and_dot_lengths_with_suffix() {
        assert_eq!(parse_length("12,5m"), Some(12.5));
        assert_eq!(parse_length("4.0m"), Some(4.0));
        assert_eq!(parse_length("4"), Some(4.0));
        assert_eq!(parse_length(""), None);
        assert_eq!(parse_length("   "), None);
    }

    #[test]
    fn cable_identifier_falls_back_to_endpoints() {
        let cable = CableInput {
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
        };
        assert_eq!(cable.identifier(), "a->b");
    }
}
