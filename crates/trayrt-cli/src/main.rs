use std::fs;

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use trayrt_core::grid::Grid;
use trayrt_core::graph::WeightedGraph;
use trayrt_core::model::GridConfig;

#[derive(Parser, Debug)]
#[command(version, about = "Cable-tray routing engine CLI")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Routes a GridConfig JSON file and writes the resulting RoutingResponse.
    Route(RouteArgs),
}

#[derive(Parser, Debug)]
struct RouteArgs {
    /// Path to a GridConfig JSON file.
    #[arg(short, long)]
    config: String,
    /// Where to write the RoutingResponse JSON.
    #[arg(short, long)]
    output: String,
    /// Also dump the full-strength weighted graph as JSON, for offline inspection.
    #[arg(long)]
    dump_graph: Option<String>,
}

fn main() -> Result<()> {
    env_logger::init();
    let cli = Cli::parse();
    match cli.command {
        Commands::Route(args) => route(&args),
    }
}

fn route(args: &RouteArgs) -> Result<()> {
    let raw = fs::read_to_string(&args.config).with_context(|| format!("reading config file {}", args.config))?;
    let config: GridConfig = serde_json::from_str(&raw).with_context(|| format!("parsing config file {}", args.config))?;

    let response = trayrt_core::route(&config).context("routing engine failed")?;
    log::info!(
        "routed {} cable(s) into {} section(s), {} problematic",
        response.cable_routes.len(),
        response.sections.len(),
        response.problematic_cables.len()
    );

    let rendered = serde_json::to_string_pretty(&response).context("serializing routing response")?;
    fs::write(&args.output, rendered).with_context(|| format!("writing output file {}", args.output))?;
    println!("wrote routing response to {}", args.output);

    if let Some(dump_path) = &args.dump_graph {
        let grid = Grid::new(config.width, config.height, config.grid_resolution, &config.walls, &config.perforations, &config.trays)
            .context("rebuilding grid for --dump-graph")?;
        let dist_wall = grid.distance_transform_walls();
        let dist_tray = grid.distance_transform_trays();
        let graph = WeightedGraph::build(&grid, &dist_wall, &dist_tray, 1.0);
        let export = serde_json::to_string_pretty(&graph.to_export()).context("serializing graph dump")?;
        fs::write(dump_path, export).with_context(|| format!("writing graph dump {dump_path}"))?;
        println!("wrote graph dump to {dump_path}");
    }

    Ok(())
}
