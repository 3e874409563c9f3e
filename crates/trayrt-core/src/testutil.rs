//! Fixture builders for the boundary cases and end-to-end scenarios in
//! spec §8, used only by `#[cfg(test)]` modules across this crate.

use std::collections::HashMap;

use crate::model::{CableInput, Cell, GridConfig, Machine};

fn machine(x: i32, y: i32) -> Machine {
    Machine { x, y, description: None, merged_history: None }
}

fn cable(label: &str, source: &str, target: &str) -> CableInput {
    CableInput {
        cable_label: Some(label.to_string()),
        source: source.to_string(),
        target: target.to_string(),
        original_source: None,
        original_target: None,
        diameter: None,
        cable_function: None,
        network: None,
        cable_type: None,
        length: None,
    }
}

pub fn single_machine_fixture() -> GridConfig {
    let mut machines = HashMap::new();
    machines.insert("A".to_string(), machine(3, 3));
    GridConfig {
        width: 10,
        height: 10,
        grid_resolution: 0.1,
        machines,
        ..Default::default()
    }
}

pub fn straight_corridor_fixture() -> GridConfig {
    let mut machines = HashMap::new();
    machines.insert("A".to_string(), machine(0, 0));
    machines.insert("B".to_string(), machine(9, 9));
    GridConfig {
        width: 10,
        height: 10,
        grid_resolution: 0.1,
        machines,
        cables: vec![cable("c1", "A", "B")],
        ..Default::default()
    }
}

pub fn perforation_fixture() -> GridConfig {
    let mut machines = HashMap::new();
    machines.insert("A".to_string(), machine(2, 0));
    machines.insert("B".to_string(), machine(2, 4));
    let walls: Vec<Cell> = (0..5).map(|x| Cell::new(x, 2)).collect();
    GridConfig {
        width: 5,
        height: 5,
        grid_resolution: 1.0,
        walls,
        perforations: vec![Cell::new(2, 2)],
        machines,
        cables: vec![cable("c1", "A", "B")],
        ..Default::default()
    }
}

pub fn disjoint_islands_fixture() -> GridConfig {
    let mut machines = HashMap::new();
    machines.insert("A1".to_string(), machine(0, 0));
    machines.insert("A2".to_string(), machine(2, 0));
    machines.insert("B1".to_string(), machine(0, 9));
    machines.insert("B2".to_string(), machine(2, 9));
    let mut walls = Vec::new();
    for x in 0..10 {
        walls.push(Cell::new(x, 4));
    }
    GridConfig {
        width: 10,
        height: 10,
        grid_resolution: 1.0,
        walls,
        machines,
        cables: vec![cable("north", "A1", "A2"), cable("south", "B1", "B2")],
        ..Default::default()
    }
}

pub fn dangling_cable_fixture() -> GridConfig {
    let mut machines = HashMap::new();
    machines.insert("A".to_string(), machine(0, 0));
    GridConfig {
        width: 5,
        height: 5,
        grid_resolution: 1.0,
        machines,
        cables: vec![cable("c1", "A", "ghost")],
        ..Default::default()
    }
}
