//! Synthetic tile generator
//!
//! Produces builder input for one tile of a scenario grid: one quad polygon
//! per cell, walls towards holes, portal codes on tile borders and a flat
//! two-triangle detail mesh per quad.

use anyhow::{Context, Result};
use log::debug;
use navtiles::nav_mesh::OFFMESH_CON_BIDIR;
use navtiles::nav_mesh_builder::{MESH_PORTAL_FLAG, MESH_PORTAL_NONE};
use navtiles::{NavMesh, NavMeshBuilder, NavMeshCreateParams, TileFlags, MESH_NULL_IDX};

use crate::scenario::Scenario;

/// Vertical cell size of generated tiles
const CELL_HEIGHT: f32 = 0.2;

/// Vertices per generated polygon
const QUAD_VERTS: usize = 4;

/// Builder input for tile (tx, ty), `None` when every cell is a hole
pub fn tile_params(scenario: &Scenario, tx: usize, ty: usize) -> Option<NavMeshCreateParams> {
    let n = scenario.tile_cells;
    let cs = scenario.cell_size;
    let (gx0, gz0) = (tx * n, ty * n);
    let area = |cx: usize, cz: usize| scenario.area_at(gx0 + cx, gz0 + cz);

    let mut index = vec![None; n * n];
    let mut poly_count = 0usize;
    for cz in 0..n {
        for cx in 0..n {
            if area(cx, cz).is_some() {
                index[cz * n + cx] = Some(poly_count as u16);
                poly_count += 1;
            }
        }
    }
    if poly_count == 0 {
        return None;
    }

    let mut verts = Vec::with_capacity((n + 1) * (n + 1) * 3);
    for z in 0..=n {
        for x in 0..=n {
            verts.extend_from_slice(&[x as u16, 0, z as u16]);
        }
    }
    let vi = |x: usize, z: usize| (z * (n + 1) + x) as u16;

    // Border edges only become portals when a tile exists on the other side
    let has_tile = |dx: i64, dy: i64| {
        let (x, y) = (tx as i64 + dx, ty as i64 + dy);
        x >= 0 && y >= 0 && x < scenario.tiles_x as i64 && y < scenario.tiles_y as i64
    };
    let nei = |cx: i64, cz: i64, dir: u16| -> u16 {
        let n = n as i64;
        if cx < 0 || cz < 0 || cx >= n || cz >= n {
            let (dx, dy) = match dir {
                0 => (-1, 0),
                1 => (0, 1),
                2 => (1, 0),
                _ => (0, -1),
            };
            return if has_tile(dx, dy) {
                MESH_PORTAL_FLAG | dir
            } else {
                MESH_PORTAL_FLAG | MESH_PORTAL_NONE
            };
        }
        index[(cz * n + cx) as usize].unwrap_or(MESH_NULL_IDX)
    };

    let mut params = NavMeshCreateParams {
        verts,
        vert_count: (n + 1) * (n + 1),
        nvp: QUAD_VERTS,
        cs,
        ch: CELL_HEIGHT,
        tile_size: n,
        bmin: [gx0 as f32 * cs, scenario.height, gz0 as f32 * cs],
        bmax: [(gx0 + n) as f32 * cs, scenario.height + CELL_HEIGHT, (gz0 + n) as f32 * cs],
        ..NavMeshCreateParams::default()
    };

    for cz in 0..n {
        for cx in 0..n {
            let Some(cell_area) = area(cx, cz) else {
                continue;
            };
            let quad = [vi(cx, cz), vi(cx, cz + 1), vi(cx + 1, cz + 1), vi(cx + 1, cz)];
            params.polys.extend_from_slice(&quad);
            let (x, z) = (cx as i64, cz as i64);
            params
                .polys
                .extend_from_slice(&[nei(x - 1, z, 0), nei(x, z + 1, 1), nei(x + 1, z, 2), nei(x, z - 1, 3)]);
            params.poly_flags.push(cell_area.flags());
            params.poly_areas.push(cell_area.id());

            // Flat detail mesh: the quad corners and two triangles
            let vert_base = params.detail_vert_count as u32;
            let tri_base = params.detail_tri_count as u32;
            params.detail_meshes.extend_from_slice(&[vert_base, QUAD_VERTS as u32, tri_base, 2]);
            for &v in &quad {
                let v = v as usize * 3;
                let (x, z) = (params.verts[v], params.verts[v + 2]);
                params.detail_verts.extend_from_slice(&[
                    params.bmin[0] + x as f32 * cs,
                    scenario.height,
                    params.bmin[2] + z as f32 * cs,
                ]);
            }
            params.detail_vert_count += QUAD_VERTS;
            params.detail_tris.extend_from_slice(&[0, 1, 2, 0, 0, 2, 3, 0]);
            params.detail_tri_count += 2;
        }
    }
    params.poly_count = poly_count;

    // Each link is stored by the tile holding its start
    let (min_x, min_z) = (params.bmin[0], params.bmin[2]);
    let (max_x, max_z) = (params.bmax[0], params.bmax[2]);
    for link in &scenario.off_mesh {
        let s = link.start;
        if s[0] < min_x || s[0] >= max_x || s[2] < min_z || s[2] >= max_z {
            continue;
        }
        params.off_mesh_con_verts.extend_from_slice(&link.start);
        params.off_mesh_con_verts.extend_from_slice(&link.end);
        params.off_mesh_con_rad.push(link.radius);
        params.off_mesh_con_flags.push(link.area.flags());
        params.off_mesh_con_areas.push(link.area.id());
        params
            .off_mesh_con_dir
            .push(if link.bidirectional { OFFMESH_CON_BIDIR } else { 0 });
        params.off_mesh_con_count += 1;
    }

    Some(params)
}

/// Tile blobs of every non-empty tile, as (x, y, blob)
pub fn build_tiles(scenario: &Scenario) -> Result<Vec<(usize, usize, Vec<u8>)>> {
    let mut tiles = Vec::new();
    for ty in 0..scenario.tiles_y {
        for tx in 0..scenario.tiles_x {
            let Some(params) = tile_params(scenario, tx, ty) else {
                debug!("Tile ({}, {}) has no ground, skipped", tx, ty);
                continue;
            };
            let blob = NavMeshBuilder::create_nav_mesh_data(&params)
                .with_context(|| format!("Failed to build tile ({}, {})", tx, ty))?;
            tiles.push((tx, ty, blob));
        }
    }
    Ok(tiles)
}

/// Builds the scenario world as a navigation mesh
pub fn build_mesh(scenario: &Scenario) -> Result<NavMesh> {
    add_tiles(scenario, build_tiles(scenario)?)
}

/// Attaches tile blobs to a mesh configured for the scenario
pub fn add_tiles(scenario: &Scenario, tiles: Vec<(usize, usize, Vec<u8>)>) -> Result<NavMesh> {
    let mut mesh = NavMesh::init_tiled(scenario.mesh_params()).context("Failed to create navigation mesh")?;
    for (x, y, blob) in tiles {
        mesh.add_tile_at(x as i32, y as i32, blob, TileFlags::FREE_DATA)
            .with_context(|| format!("Failed to add tile ({}, {})", x, y))?;
    }
    Ok(mesh)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scenario(json: &str) -> Result<Scenario> {
        Scenario::from_json(json)
    }

    #[test]
    fn test_tile_params() -> Result<()> {
        let s = scenario(r#"{ "tiles_x": 2, "tile_cells": 3, "cell_size": 1.0, "holes": [[1, 1]] }"#)?;
        let params = tile_params(&s, 0, 0).context("tile has ground")?;

        assert_eq!(params.poly_count, 8);
        assert_eq!(params.vert_count, 16);
        assert_eq!(params.polys.len(), 8 * QUAD_VERTS * 2);
        assert_eq!(params.detail_meshes.len(), 8 * 4);
        assert_eq!(params.detail_tri_count, 16);
        assert_eq!(params.bmax, [3.0, CELL_HEIGHT, 3.0]);

        // Quad (2, 0): +x border faces tile (1, 0), -z border faces nothing
        let neis = &params.polys[2 * 8 + 4..2 * 8 + 8];
        assert_eq!(neis[2], MESH_PORTAL_FLAG | 2);
        assert_eq!(neis[3], MESH_PORTAL_FLAG | MESH_PORTAL_NONE);
        assert_eq!(neis[0], 1);

        // Quad (1, 0) has the hole above it
        let neis = &params.polys[8 + 4..8 + 8];
        assert_eq!(neis[1], MESH_NULL_IDX);
        Ok(())
    }

    #[test]
    fn test_empty_tile_is_skipped() -> Result<()> {
        let s = scenario(r#"{ "tiles_x": 2, "tile_cells": 1, "holes": [[1, 0]] }"#)?;
        assert!(tile_params(&s, 1, 0).is_none());
        let tiles = build_tiles(&s)?;
        assert_eq!(tiles.len(), 1);
        assert_eq!((tiles[0].0, tiles[0].1), (0, 0));
        Ok(())
    }

    #[test]
    fn test_off_mesh_links_go_to_start_tile() -> Result<()> {
        let s = scenario(
            r#"{
                "tiles_x": 2, "tile_cells": 2, "cell_size": 1.0,
                "off_mesh": [{ "start": [2.5, 0, 0.5], "end": [0.5, 0, 1.5] }]
            }"#,
        )?;
        assert_eq!(tile_params(&s, 0, 0).context("tile")?.off_mesh_con_count, 0);
        assert_eq!(tile_params(&s, 1, 0).context("tile")?.off_mesh_con_count, 1);
        Ok(())
    }

    #[test]
    fn test_build_mesh_links_tiles() -> Result<()> {
        let s = scenario(r#"{ "tiles_x": 2, "tiles_y": 2, "tile_cells": 2, "cell_size": 1.0 }"#)?;
        let mesh = build_mesh(&s)?;
        assert_eq!(mesh.tiles().count(), 4);
        for tile in mesh.tiles() {
            // Two border quads on each of the two inner sides
            assert_eq!(tile.links.iter().filter(|l| l.is_portal()).count(), 4);
            assert_eq!(tile.detail_tris.len(), 8);
        }
        Ok(())
    }
}
