//! Command line tool for building, inspecting and querying tiled navigation meshes

use anyhow::{bail, Context, Result};
use clap::{Args as ClapArgs, Parser, Subcommand};
use glam::Vec3;
use log::info;
use serde::Serialize;
use std::fs::File;
use std::io::Write;
use std::path::{Path, PathBuf};

use navtiles::{NavMesh, NavMeshQuery, PolyRef, QueryFilter, LINK_INTERNAL};

mod agents;
mod demo_tile;
mod scenario;
mod tile_files;

use agents::{run_agent, run_batch, AgentOutcome, MAX_POLYS};
use scenario::{AgentConfig, AgentMode, Scenario};

/// Builds, inspects and queries tiled navigation meshes described by JSON scenarios
#[derive(Parser, Debug)]
#[clap(author, version, about, long_about = None)]
struct Args {
    /// Raise log verbosity (-v for debug, -vv for trace)
    #[clap(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    #[clap(subcommand)]
    command: Commands,
}

/// Where the mesh of a query command comes from
#[derive(ClapArgs, Debug)]
struct MeshArgs {
    /// Scenario file (JSON)
    #[clap(long, value_parser)]
    scenario: PathBuf,

    /// Directory of tile files written by `build`; tiles are generated from
    /// the scenario when omitted
    #[clap(long, value_parser)]
    tiles: Option<PathBuf>,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Generate the tiles of a scenario and write them as Tile_<x>_<y>.bin files
    Build {
        /// Scenario file (JSON)
        #[clap(long, value_parser)]
        scenario: PathBuf,

        /// Output directory
        #[clap(long, value_parser)]
        out: PathBuf,
    },

    /// Print tile, polygon and link statistics
    Info {
        #[clap(flatten)]
        mesh: MeshArgs,
    },

    /// Find a path between two positions
    Path {
        #[clap(flatten)]
        mesh: MeshArgs,

        /// Start position (x,y,z)
        #[clap(long, value_parser = parse_vector, allow_hyphen_values = true)]
        start: Vec3,

        /// End position (x,y,z)
        #[clap(long, value_parser = parse_vector, allow_hyphen_values = true)]
        end: Vec3,

        /// Follow the corridor in small steps instead of straightening it
        #[clap(long)]
        smooth: bool,
    },

    /// Cast a ray along the mesh surface
    Raycast {
        #[clap(flatten)]
        mesh: MeshArgs,

        /// Start position (x,y,z)
        #[clap(long, value_parser = parse_vector, allow_hyphen_values = true)]
        start: Vec3,

        /// End position (x,y,z)
        #[clap(long, value_parser = parse_vector, allow_hyphen_values = true)]
        end: Vec3,
    },

    /// List the polygons reachable within a radius
    Around {
        #[clap(flatten)]
        mesh: MeshArgs,

        /// Center position (x,y,z)
        #[clap(long, value_parser = parse_vector, allow_hyphen_values = true)]
        start: Vec3,

        /// Search radius
        #[clap(long)]
        radius: f32,
    },

    /// Distance to the nearest wall
    Wall {
        #[clap(flatten)]
        mesh: MeshArgs,

        /// Center position (x,y,z)
        #[clap(long, value_parser = parse_vector, allow_hyphen_values = true)]
        start: Vec3,

        /// Maximum search radius
        #[clap(long, default_value = "100.0")]
        radius: f32,
    },

    /// Run every agent of the scenario and print the results as JSON
    Batch {
        #[clap(flatten)]
        mesh: MeshArgs,

        /// Number of worker threads
        #[clap(long, default_value = "4")]
        workers: usize,

        /// Output file, stdout when omitted
        #[clap(long, value_parser)]
        output: Option<PathBuf>,
    },
}

/// Parse a comma-separated vector
fn parse_vector(s: &str) -> Result<Vec3, String> {
    let parts: Vec<&str> = s.split(',').collect();

    if parts.len() != 3 {
        return Err(format!(
            "Vector must have 3 components, got {}",
            parts.len()
        ));
    }

    let x = parts[0].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let y = parts[1].trim().parse::<f32>().map_err(|e| e.to_string())?;
    let z = parts[2].trim().parse::<f32>().map_err(|e| e.to_string())?;

    Ok(Vec3::new(x, y, z))
}

fn main() -> Result<()> {
    let args = Args::parse();

    let level = match args.verbose {
        0 => "warn",
        1 => "debug",
        _ => "trace",
    };
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or(level)).init();

    match args.command {
        Commands::Build { scenario, out } => build(&scenario, &out),
        Commands::Info { mesh } => print_info(&mesh),
        Commands::Path {
            mesh,
            start,
            end,
            smooth,
        } => {
            let mode = if smooth {
                AgentMode::PathfindIter
            } else {
                AgentMode::PathfindStraight
            };
            run_single(&mesh, mode, start, end, 0.0)
        }
        Commands::Raycast { mesh, start, end } => run_single(&mesh, AgentMode::Raycast, start, end, 0.0),
        Commands::Around { mesh, start, radius } => find_around(&mesh, start, radius),
        Commands::Wall { mesh, start, radius } => {
            run_single(&mesh, AgentMode::DistanceToWall, start, start, radius)
        }
        Commands::Batch {
            mesh,
            workers,
            output,
        } => batch(&mesh, workers, output.as_deref()),
    }
}

fn load_mesh(args: &MeshArgs) -> Result<(Scenario, NavMesh)> {
    let scenario = Scenario::load(&args.scenario)?;
    let mesh = match &args.tiles {
        Some(dir) => {
            let tiles = tile_files::read_tiles(dir)?;
            if tiles.is_empty() {
                bail!("No tile files found in {}", dir.display());
            }
            demo_tile::add_tiles(&scenario, tiles)?
        }
        None => demo_tile::build_mesh(&scenario)?,
    };
    info!("Loaded navigation mesh with {} tiles", mesh.tiles().count());
    Ok((scenario, mesh))
}

/// Generate the tiles of a scenario and save them
fn build(scenario_path: &Path, out: &Path) -> Result<()> {
    let scenario = Scenario::load(scenario_path)?;
    let tiles = demo_tile::build_tiles(&scenario)?;
    let written = tile_files::write_tiles(out, &tiles)?;
    let bytes: usize = tiles.iter().map(|(_, _, blob)| blob.len()).sum();
    println!(
        "Wrote {} tiles ({} bytes) to {}",
        written.len(),
        bytes,
        out.display()
    );
    Ok(())
}

fn print_info(args: &MeshArgs) -> Result<()> {
    let (_, mesh) = load_mesh(args)?;

    let params = mesh.params();
    println!(
        "Tile size {}x{}, {} tile slots, {} polygons per tile, {} search nodes",
        params.tile_width, params.tile_height, mesh.max_tiles(), params.max_polys_per_tile, params.max_nodes
    );

    let (mut total_polys, mut total_links) = (0, 0);
    for tile in mesh.tiles() {
        let internal = tile.links.iter().filter(|l| l.side == LINK_INTERNAL).count();
        let portals = tile.links.len() - internal;
        let capacity = tile.header.as_ref().map_or(0, |h| h.max_link_count);
        println!(
            "Tile ({}, {}) ref {}: {} polygons, {} off-mesh connections, {} links ({} internal, {} portals, capacity {}), {} BV nodes, {} detail triangles",
            tile.x,
            tile.y,
            mesh.tile_ref(tile),
            tile.polys.len(),
            tile.off_mesh_cons.len(),
            tile.links.len(),
            internal,
            portals,
            capacity,
            tile.bv_tree.len(),
            tile.detail_tris.len()
        );
        total_polys += tile.polys.len();
        total_links += tile.links.len();
    }
    println!(
        "{} tiles, {} polygons, {} links",
        mesh.tiles().count(),
        total_polys,
        total_links
    );
    Ok(())
}

/// Run one query at the given positions and print its result
fn run_single(args: &MeshArgs, mode: AgentMode, start: Vec3, end: Vec3, radius: f32) -> Result<()> {
    let (scenario, mesh) = load_mesh(args)?;
    let agent = AgentConfig {
        mode,
        start: start.to_array(),
        end: end.to_array(),
        radius,
    };
    let outcome = query_once(&scenario, &mesh, &agent)?;
    print_outcome(&outcome);
    Ok(())
}

fn query_once(scenario: &Scenario, mesh: &NavMesh, agent: &AgentConfig) -> Result<AgentOutcome> {
    let filter = scenario.filter.to_query_filter();
    let mut query = NavMeshQuery::with_max_nodes(mesh, scenario.max_nodes);
    run_agent(&mut query, agent, &filter, &scenario.pick_extents)
        .with_context(|| format!("Failed to run {:?} query", agent.mode))
}

fn nearest_poly(query: &NavMeshQuery, pos: &[f32; 3], extents: &[f32; 3], filter: &QueryFilter) -> Result<PolyRef> {
    let found = query
        .find_nearest_poly(pos, extents, filter)
        .with_context(|| format!("Failed to search polygons near {:?}", pos))?;
    found
        .map(|(r, _)| r)
        .with_context(|| format!("No polygon near {:?}", pos))
}

fn find_around(args: &MeshArgs, center: Vec3, radius: f32) -> Result<()> {
    let (scenario, mesh) = load_mesh(args)?;
    let filter = scenario.filter.to_query_filter();
    let mut query = NavMeshQuery::with_max_nodes(&mesh, scenario.max_nodes);

    let pos = center.to_array();
    let center_ref = nearest_poly(&query, &pos, &scenario.pick_extents, &filter)?;
    let around = query
        .find_polys_around(center_ref, &pos, radius, &filter, MAX_POLYS)
        .context("Failed to search polygons around the center")?;

    println!("Found {} polygons within {}", around.refs.len(), radius);
    for ((r, parent), cost) in around.refs.iter().zip(&around.parents).zip(&around.costs) {
        println!("{} parent {} cost {:.3}", r, parent, cost);
    }
    Ok(())
}

fn print_outcome(outcome: &AgentOutcome) {
    match outcome {
        AgentOutcome::NotOnMesh => println!("Start or end position is not on the mesh"),
        AgentOutcome::PathfindIter { polys, smooth_path } => {
            println!("Path through {} polygons, {} smooth points", polys.len(), smooth_path.len());
            for (i, p) in smooth_path.iter().enumerate() {
                println!("{}: {},{},{}", i, p[0], p[1], p[2]);
            }
        }
        AgentOutcome::PathfindStraight {
            polys,
            partial,
            straight_path,
        } => {
            println!(
                "{} path through {} polygons, {} waypoints",
                if *partial { "Partial" } else { "Complete" },
                polys.len(),
                straight_path.len()
            );
            for (i, (p, flags)) in straight_path.waypoints.iter().zip(&straight_path.flags).enumerate() {
                println!("{}: {},{},{} {:?}", i, p[0], p[1], p[2], flags);
            }
        }
        AgentOutcome::Raycast {
            polys,
            hit,
            hit_pos,
            hit_normal,
        } => {
            if *hit {
                println!(
                    "Hit wall at {},{},{} normal {},{},{} after {} polygons",
                    hit_pos[0], hit_pos[1], hit_pos[2], hit_normal[0], hit_normal[1], hit_normal[2],
                    polys.len()
                );
            } else {
                println!("Reached the end through {} polygons", polys.len());
            }
        }
        AgentOutcome::DistanceToWall {
            distance,
            hit_pos,
            hit_normal,
        } => {
            println!(
                "Wall at distance {} ({},{},{}), normal {},{},{}",
                distance, hit_pos[0], hit_pos[1], hit_pos[2], hit_normal[0], hit_normal[1], hit_normal[2]
            );
        }
        AgentOutcome::FindPolysAround { polys, .. } => println!("Found {} polygons", polys.len()),
    }
}

#[derive(Serialize)]
struct BatchEntry<'a> {
    agent: &'a AgentConfig,
    #[serde(flatten)]
    outcome: &'a AgentOutcome,
}

fn batch(args: &MeshArgs, workers: usize, output: Option<&Path>) -> Result<()> {
    let (scenario, mesh) = load_mesh(args)?;
    let filter = scenario.filter.to_query_filter();
    let outcomes = run_batch(
        &mesh,
        &scenario.agents,
        &filter,
        &scenario.pick_extents,
        scenario.max_nodes,
        workers,
    )?;

    let entries: Vec<BatchEntry> = scenario
        .agents
        .iter()
        .zip(&outcomes)
        .map(|(agent, outcome)| BatchEntry { agent, outcome })
        .collect();
    let json = serde_json::to_string_pretty(&entries).context("Failed to serialize results")?;

    if let Some(output_path) = output {
        let mut file = File::create(output_path)
            .with_context(|| format!("Failed to create output file: {}", output_path.display()))?;
        writeln!(file, "{}", json)?;
        println!("Saved {} results to {}", entries.len(), output_path.display());
    } else {
        println!("{}", json);
    }
    Ok(())
}
