//! Runs scenario agents against a navigation mesh
//!
//! Each agent issues one kind of query. Path following agents walk their
//! corridor in small steps the way a character controller would, steering
//! towards the next straight path corner and hopping over off-mesh links.

use std::thread;

use anyhow::Result;
use glam::Vec3;
use log::{debug, info};
use navtiles::{NavMesh, NavMeshQuery, PolyRef, QueryFilter, StraightPath, StraightPathFlags};
use serde::Serialize;

use crate::scenario::{AgentConfig, AgentMode};

/// Corridor and result buffer size
pub const MAX_POLYS: usize = 256;

/// Maximum number of smooth path points
pub const MAX_SMOOTH: usize = 2048;

/// Distance moved per smooth path iteration
const STEP_SIZE: f32 = 0.5;

/// Distance at which a steer target counts as reached
const SLOP: f32 = 0.01;

/// Straight path corners considered when steering
const MAX_STEER_POINTS: usize = 3;

/// Result of one agent query
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "mode", rename_all = "snake_case")]
pub enum AgentOutcome {
    /// No polygon under the start or end position
    NotOnMesh,
    PathfindIter {
        polys: Vec<PolyRef>,
        smooth_path: Vec<[f32; 3]>,
    },
    PathfindStraight {
        polys: Vec<PolyRef>,
        /// The goal polygon was not reached
        partial: bool,
        straight_path: StraightPath,
    },
    Raycast {
        polys: Vec<PolyRef>,
        hit: bool,
        hit_pos: [f32; 3],
        hit_normal: [f32; 3],
    },
    DistanceToWall {
        distance: f32,
        hit_pos: [f32; 3],
        hit_normal: [f32; 3],
    },
    FindPolysAround {
        polys: Vec<PolyRef>,
        parents: Vec<PolyRef>,
        costs: Vec<f32>,
    },
}

struct SteerTarget {
    pos: [f32; 3],
    flags: StraightPathFlags,
    reference: PolyRef,
}

fn in_range(a: &[f32; 3], b: &[f32; 3], r: f32, h: f32) -> bool {
    let dx = b[0] - a[0];
    let dy = b[1] - a[1];
    let dz = b[2] - a[2];
    dx * dx + dz * dz < r * r && dy.abs() < h
}

/// First straight path corner further than `min_target_dist` from `start`,
/// or the first off-mesh connection corner
fn steer_target(
    query: &NavMeshQuery,
    start: &[f32; 3],
    end: &[f32; 3],
    min_target_dist: f32,
    path: &[PolyRef],
) -> navtiles::Result<Option<SteerTarget>> {
    let straight = query.find_straight_path(start, end, path, MAX_STEER_POINTS)?;
    let found = (0..straight.len()).find(|&i| {
        straight.flags[i].contains(StraightPathFlags::OFFMESH_CONNECTION)
            || !in_range(&straight.waypoints[i], start, min_target_dist, 1000.0)
    });
    Ok(found.map(|i| SteerTarget {
        pos: straight.waypoints[i],
        flags: straight.flags[i],
        reference: straight.poly_refs[i],
    }))
}

/// Follows a corridor in fixed steps, snapping each step onto the mesh
pub fn smooth_path(
    query: &NavMeshQuery,
    start_pos: &[f32; 3],
    end_pos: &[f32; 3],
    path: &[PolyRef],
) -> navtiles::Result<Vec<[f32; 3]>> {
    let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
        return Ok(Vec::new());
    };
    let mut iter_pos = query.closest_point_on_poly_boundary(first, start_pos)?;
    let target_pos = query.closest_point_on_poly_boundary(last, end_pos)?;

    let mut corridor = path.to_vec();
    let mut smooth = vec![iter_pos];

    while !corridor.is_empty() && smooth.len() < MAX_SMOOTH {
        let Some(steer) = steer_target(query, &iter_pos, &target_pos, SLOP, &corridor)? else {
            break;
        };
        let end_of_path = steer.flags.contains(StraightPathFlags::END);
        let off_mesh = steer.flags.contains(StraightPathFlags::OFFMESH_CONNECTION);

        // Do not step past the end or an off-mesh link
        let delta = Vec3::from_array(steer.pos) - Vec3::from_array(iter_pos);
        let len = delta.length();
        let scale = if (end_of_path || off_mesh) && len < STEP_SIZE {
            1.0
        } else {
            STEP_SIZE / len
        };
        let move_target = (Vec3::from_array(iter_pos) + delta * scale).to_array();

        let (n, mut result) = query.move_along_path_corridor(&iter_pos, &move_target, &corridor)?;
        if let Some(h) = query.get_poly_height(corridor[n], &result)? {
            result[1] = h;
        }
        corridor.drain(..n);
        iter_pos = result;

        if end_of_path && in_range(&iter_pos, &steer.pos, SLOP, 1.0) {
            smooth.push(target_pos);
            break;
        } else if off_mesh && in_range(&iter_pos, &steer.pos, SLOP, 1.0) {
            // Skip the corridor up to and over the connection
            if let Some(k) = corridor.iter().position(|&r| r == steer.reference) {
                let prev = if k > 0 { corridor[k - 1] } else { PolyRef::NULL };
                let con = corridor[k];
                corridor.drain(..=k);
                let (start, end) = query.get_off_mesh_connection_poly_end_points(prev, con)?;
                if smooth.len() < MAX_SMOOTH {
                    smooth.push(start);
                }
                iter_pos = end;
                if let Some(&next) = corridor.first() {
                    if let Some(h) = query.get_poly_height(next, &iter_pos)? {
                        iter_pos[1] = h;
                    }
                }
            }
        }

        if smooth.len() < MAX_SMOOTH {
            smooth.push(iter_pos);
        }
    }

    Ok(smooth)
}

/// Runs the query of one agent
pub fn run_agent(
    query: &mut NavMeshQuery,
    agent: &AgentConfig,
    filter: &QueryFilter,
    extents: &[f32; 3],
) -> navtiles::Result<AgentOutcome> {
    let (spos, epos) = (agent.start, agent.end);
    let start = query.find_nearest_poly(&spos, extents, filter)?.map(|(r, _)| r);
    let end = query.find_nearest_poly(&epos, extents, filter)?.map(|(r, _)| r);

    let needs_end = matches!(agent.mode, AgentMode::PathfindIter | AgentMode::PathfindStraight);
    let (Some(start_ref), Some(end_ref)) = (start, if needs_end { end } else { start }) else {
        return Ok(AgentOutcome::NotOnMesh);
    };

    let outcome = match agent.mode {
        AgentMode::PathfindIter => {
            let polys = query.find_path(start_ref, end_ref, &spos, &epos, filter, MAX_POLYS)?;
            let smooth_path = smooth_path(query, &spos, &epos, &polys)?;
            AgentOutcome::PathfindIter { polys, smooth_path }
        }
        AgentMode::PathfindStraight => {
            let polys = query.find_path(start_ref, end_ref, &spos, &epos, filter, MAX_POLYS)?;
            let last = polys.last().copied().unwrap_or(start_ref);
            let partial = last != end_ref;

            // Aim at the closest reachable point of a partial path
            let goal = if partial {
                query.closest_point_on_poly(last, &epos)?.0
            } else {
                epos
            };
            let straight_path = query.find_straight_path(&spos, &goal, &polys, MAX_POLYS)?;
            AgentOutcome::PathfindStraight {
                polys,
                partial,
                straight_path,
            }
        }
        AgentMode::Raycast => {
            let hit = query.raycast(start_ref, &spos, &epos, filter, MAX_POLYS)?;
            let mut hit_pos = hit.hit_position(&spos, &epos);
            if hit.hit_wall() {
                if let Some(&last) = hit.path.last() {
                    if let Some(h) = query.get_poly_height(last, &hit_pos)? {
                        hit_pos[1] = h;
                    }
                }
            }
            AgentOutcome::Raycast {
                hit: hit.hit_wall(),
                hit_pos,
                hit_normal: hit.hit_normal,
                polys: hit.path,
            }
        }
        AgentMode::DistanceToWall => {
            let wall = query.find_distance_to_wall(start_ref, &spos, agent.radius, filter)?;
            AgentOutcome::DistanceToWall {
                distance: wall.distance,
                hit_pos: wall.position,
                hit_normal: wall.normal,
            }
        }
        AgentMode::FindPolysAround => {
            let radius = Vec3::new(epos[0] - spos[0], 0.0, epos[2] - spos[2]).length();
            let around = query.find_polys_around(start_ref, &spos, radius, filter, MAX_POLYS)?;
            AgentOutcome::FindPolysAround {
                polys: around.refs,
                parents: around.parents,
                costs: around.costs,
            }
        }
    };
    Ok(outcome)
}

/// Runs every agent, spreading them over `workers` threads
///
/// Each worker owns its query state; results come back in agent order.
pub fn run_batch(
    mesh: &NavMesh,
    agents: &[AgentConfig],
    filter: &QueryFilter,
    extents: &[f32; 3],
    max_nodes: usize,
    workers: usize,
) -> Result<Vec<AgentOutcome>> {
    if agents.is_empty() {
        return Ok(Vec::new());
    }
    let workers = workers.clamp(1, agents.len());
    let chunk_size = agents.len().div_ceil(workers);
    info!("Running {} agents on {} workers", agents.len(), workers);

    let chunks: Vec<navtiles::Result<Vec<AgentOutcome>>> = thread::scope(|s| {
        let handles: Vec<_> = agents
            .chunks(chunk_size)
            .enumerate()
            .map(|(w, chunk)| {
                s.spawn(move || {
                    let mut query = NavMeshQuery::with_max_nodes(mesh, max_nodes);
                    debug!("Worker {} handles {} agents", w, chunk.len());
                    chunk
                        .iter()
                        .map(|agent| run_agent(&mut query, agent, filter, extents))
                        .collect()
                })
            })
            .collect();
        handles
            .into_iter()
            .map(|h| h.join().unwrap_or_else(|e| std::panic::resume_unwind(e)))
            .collect()
    });

    let mut outcomes = Vec::with_capacity(agents.len());
    for chunk in chunks {
        outcomes.extend(chunk?);
    }
    Ok(outcomes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo_tile::build_mesh;
    use crate::scenario::Scenario;

    fn agent(mode: AgentMode, start: [f32; 3], end: [f32; 3]) -> AgentConfig {
        AgentConfig {
            mode,
            start,
            end,
            radius: 100.0,
        }
    }

    fn approx3(a: &[f32; 3], b: &[f32; 3]) -> bool {
        a.iter().zip(b).all(|(x, y)| (x - y).abs() < 1e-3)
    }

    const WALL_WORLD: &str = r#"{
        "tile_cells": 3, "cell_size": 1.0,
        "holes": [[1, 0], [1, 1]]
    }"#;

    #[test]
    fn test_smooth_path_reaches_goal() -> Result<()> {
        let scenario = Scenario::from_json(WALL_WORLD)?;
        let mesh = build_mesh(&scenario)?;
        let filter = scenario.filter.to_query_filter();
        let mut query = NavMeshQuery::new(&mesh);

        let a = agent(AgentMode::PathfindIter, [0.5, 0.0, 0.5], [2.5, 0.0, 0.5]);
        let AgentOutcome::PathfindIter { polys, smooth_path } =
            run_agent(&mut query, &a, &filter, &scenario.pick_extents)?
        else {
            panic!("unexpected outcome");
        };
        assert_eq!(polys.len(), 7);
        assert!(approx3(&smooth_path[0], &a.start));
        assert!(approx3(smooth_path.last().unwrap(), &a.end));
        assert!(smooth_path.len() > 2);
        // The walk goes around the wall
        assert!(smooth_path.iter().any(|p| p[2] > 2.0 - 1e-3));
        Ok(())
    }

    #[test]
    fn test_smooth_path_jumps_off_mesh_link() -> Result<()> {
        let scenario = Scenario::from_json(
            r#"{
                "tile_cells": 3, "cell_size": 1.0,
                "holes": [[1, 0], [1, 1], [1, 2]],
                "off_mesh": [{ "start": [0.5, 0, 1.5], "end": [2.5, 0, 1.5], "radius": 0.4 }]
            }"#,
        )?;
        let mesh = build_mesh(&scenario)?;
        let filter = scenario.filter.to_query_filter();
        let mut query = NavMeshQuery::new(&mesh);

        let a = agent(AgentMode::PathfindIter, [0.5, 0.0, 0.5], [2.5, 0.0, 0.5]);
        let AgentOutcome::PathfindIter { smooth_path, .. } =
            run_agent(&mut query, &a, &filter, &scenario.pick_extents)?
        else {
            panic!("unexpected outcome");
        };
        assert!(smooth_path.iter().any(|p| approx3(p, &[0.5, 0.0, 1.5])));
        assert!(smooth_path.iter().any(|p| approx3(p, &[2.5, 0.0, 1.5])));
        assert!(approx3(smooth_path.last().unwrap(), &a.end));
        Ok(())
    }

    #[test]
    fn test_partial_straight_path_is_clamped() -> Result<()> {
        let scenario = Scenario::from_json(
            r#"{ "tile_cells": 3, "cell_size": 1.0, "holes": [[1, 0], [1, 1], [1, 2]] }"#,
        )?;
        let mesh = build_mesh(&scenario)?;
        let filter = scenario.filter.to_query_filter();
        let mut query = NavMeshQuery::new(&mesh);

        let a = agent(AgentMode::PathfindStraight, [0.5, 0.0, 0.5], [2.5, 0.0, 0.5]);
        let AgentOutcome::PathfindStraight {
            partial,
            straight_path,
            ..
        } = run_agent(&mut query, &a, &filter, &scenario.pick_extents)?
        else {
            panic!("unexpected outcome");
        };
        assert!(partial);
        // The goal is clamped onto the west half
        let last = straight_path.waypoints.last().unwrap();
        assert!(last[0] <= 1.0 + 1e-4);
        Ok(())
    }

    #[test]
    fn test_raycast_and_wall_agents() -> Result<()> {
        let scenario = Scenario::from_json(WALL_WORLD)?;
        let mesh = build_mesh(&scenario)?;
        let filter = scenario.filter.to_query_filter();
        let mut query = NavMeshQuery::new(&mesh);

        let ray = agent(AgentMode::Raycast, [0.5, 0.0, 0.5], [2.5, 0.0, 0.5]);
        let AgentOutcome::Raycast { hit, hit_pos, .. } =
            run_agent(&mut query, &ray, &filter, &scenario.pick_extents)?
        else {
            panic!("unexpected outcome");
        };
        assert!(hit);
        assert!(approx3(&hit_pos, &[1.0, 0.0, 0.5]));

        let wall = agent(AgentMode::DistanceToWall, [0.5, 0.0, 1.5], [0.0; 3]);
        let AgentOutcome::DistanceToWall { distance, .. } =
            run_agent(&mut query, &wall, &filter, &scenario.pick_extents)?
        else {
            panic!("unexpected outcome");
        };
        assert!((distance - 0.5).abs() < 1e-4);
        Ok(())
    }

    #[test]
    fn test_agent_off_mesh() -> Result<()> {
        let scenario = Scenario::from_json(WALL_WORLD)?;
        let mesh = build_mesh(&scenario)?;
        let mut query = NavMeshQuery::new(&mesh);
        let a = agent(AgentMode::PathfindStraight, [50.0, 0.0, 50.0], [0.5, 0.0, 0.5]);
        let outcome = run_agent(&mut query, &a, &scenario.filter.to_query_filter(), &[0.5; 3])?;
        assert_eq!(outcome, AgentOutcome::NotOnMesh);
        Ok(())
    }

    #[test]
    fn test_batch_matches_sequential() -> Result<()> {
        let scenario = Scenario::from_json(
            r#"{
                "tiles_x": 2, "tiles_y": 2, "tile_cells": 4, "cell_size": 1.0,
                "holes": [[3, 3], [4, 3], [4, 4]]
            }"#,
        )?;
        let mesh = build_mesh(&scenario)?;
        let filter = scenario.filter.to_query_filter();
        let modes = [
            AgentMode::PathfindIter,
            AgentMode::PathfindStraight,
            AgentMode::Raycast,
            AgentMode::DistanceToWall,
            AgentMode::FindPolysAround,
        ];
        let agents: Vec<AgentConfig> = (0..20)
            .map(|i| {
                let t = i as f32 * 0.35;
                agent(modes[i % modes.len()], [0.5 + t, 0.0, 0.5], [7.5, 0.0, 7.5 - t])
            })
            .collect();

        let mut query = NavMeshQuery::new(&mesh);
        let expected = agents
            .iter()
            .map(|a| run_agent(&mut query, a, &filter, &scenario.pick_extents))
            .collect::<navtiles::Result<Vec<_>>>()?;

        let actual = run_batch(&mesh, &agents, &filter, &scenario.pick_extents, 2048, 4)?;
        assert_eq!(actual, expected);
        Ok(())
    }
}
