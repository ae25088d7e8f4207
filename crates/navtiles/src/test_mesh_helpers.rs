//! Test meshes built from flat grids of unit quads
//!
//! A grid tile of size `n` covers `[tx * n, (tx + 1) * n]` on x and the same
//! range on z for `ty`. Quad (cx, cz) spans one world unit and, without holes,
//! is polygon `cz * n + cx` of its tile.

use crate::nav_mesh_builder::{NavMeshBuilder, NavMeshCreateParams, MESH_PORTAL_FLAG};
use crate::nav_mesh::OFFMESH_CON_BIDIR;
use crate::{NavMesh, NavMeshParams, PolyFlags, PolyRef, QueryFilter, Result, Status, TileFlags, MESH_NULL_IDX};

/// Builder input for an `n` x `n` grid tile at (tx, ty), skipping `holes`
pub fn grid_tile_params(tx: i32, ty: i32, n: usize, holes: &[(usize, usize)]) -> NavMeshCreateParams {
    let nvp = 4;
    let is_quad = |cx: usize, cz: usize| !holes.contains(&(cx, cz));

    let mut verts = Vec::with_capacity((n + 1) * (n + 1) * 3);
    for z in 0..=n {
        for x in 0..=n {
            verts.extend_from_slice(&[x as u16, 0, z as u16]);
        }
    }
    let vi = |x: usize, z: usize| (z * (n + 1) + x) as u16;

    // Polygon index of every quad
    let mut index = vec![None; n * n];
    let mut count = 0;
    for cz in 0..n {
        for cx in 0..n {
            if is_quad(cx, cz) {
                index[cz * n + cx] = Some(count as u16);
                count += 1;
            }
        }
    }
    let nei = |cx: i64, cz: i64, dir: u16| -> u16 {
        if cx < 0 || cz < 0 || cx >= n as i64 || cz >= n as i64 {
            return MESH_PORTAL_FLAG | dir;
        }
        index[cz as usize * n + cx as usize].unwrap_or(MESH_NULL_IDX)
    };

    let mut polys = Vec::with_capacity(count * nvp * 2);
    for cz in 0..n {
        for cx in 0..n {
            if !is_quad(cx, cz) {
                continue;
            }
            polys.extend_from_slice(&[vi(cx, cz), vi(cx, cz + 1), vi(cx + 1, cz + 1), vi(cx + 1, cz)]);
            let (x, z) = (cx as i64, cz as i64);
            polys.extend_from_slice(&[nei(x - 1, z, 0), nei(x, z + 1, 1), nei(x + 1, z, 2), nei(x, z - 1, 3)]);
        }
    }

    let size = n as f32;
    NavMeshCreateParams {
        verts,
        vert_count: (n + 1) * (n + 1),
        polys,
        poly_flags: vec![PolyFlags::WALK; count],
        poly_areas: vec![0; count],
        poly_count: count,
        nvp,
        bmin: [tx as f32 * size, 0.0, ty as f32 * size],
        bmax: [(tx + 1) as f32 * size, 1.0, (ty + 1) as f32 * size],
        cs: 1.0,
        ch: 1.0,
        tile_size: n,
        ..NavMeshCreateParams::default()
    }
}

/// Polygon index of quad (cx, cz) in a grid tile with holes
pub fn grid_poly_index(n: usize, holes: &[(usize, usize)], cx: usize, cz: usize) -> Option<usize> {
    if holes.contains(&(cx, cz)) {
        return None;
    }
    let before = (0..cz * n + cx)
        .filter(|&i| !holes.contains(&(i % n, i / n)))
        .count();
    Some(before)
}

/// Adds an off-mesh connection to builder input
pub fn add_off_mesh_connection(
    params: &mut NavMeshCreateParams,
    start: [f32; 3],
    end: [f32; 3],
    rad: f32,
    bidirectional: bool,
) {
    params.off_mesh_con_verts.extend_from_slice(&start);
    params.off_mesh_con_verts.extend_from_slice(&end);
    params.off_mesh_con_rad.push(rad);
    params.off_mesh_con_flags.push(PolyFlags::JUMP);
    params.off_mesh_con_areas.push(5);
    params
        .off_mesh_con_dir
        .push(if bidirectional { OFFMESH_CON_BIDIR } else { 0 });
    params.off_mesh_con_count += 1;
}

/// Mesh parameters matching grid tiles of size `n`
pub fn grid_mesh_params(max_tiles: usize, n: usize) -> NavMeshParams {
    NavMeshParams {
        origin: [0.0; 3],
        tile_width: n as f32,
        tile_height: n as f32,
        max_tiles,
        max_polys_per_tile: n * n + 8,
        max_nodes: 2048,
    }
}

pub fn grid_tile_blob(tx: i32, ty: i32, n: usize, holes: &[(usize, usize)]) -> Result<Vec<u8>> {
    NavMeshBuilder::create_nav_mesh_data(&grid_tile_params(tx, ty, n, holes))
}

/// A `tiles_x` x `tiles_y` mesh of hole-free grid tiles
pub fn create_grid_mesh(tiles_x: i32, tiles_y: i32, n: usize) -> Result<NavMesh> {
    let mut mesh = NavMesh::init_tiled(grid_mesh_params((tiles_x * tiles_y) as usize, n))?;
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            mesh.add_tile_at(tx, ty, grid_tile_blob(tx, ty, n, &[])?, TileFlags::FREE_DATA)?;
        }
    }
    Ok(mesh)
}

/// A single grid tile mesh
pub fn create_single_tile_mesh(n: usize, holes: &[(usize, usize)]) -> Result<NavMesh> {
    let mut mesh = NavMesh::init_tiled(grid_mesh_params(1, n))?;
    mesh.add_tile_at(0, 0, grid_tile_blob(0, 0, n, holes)?, TileFlags::FREE_DATA)?;
    Ok(mesh)
}

/// Polygon under a world position
pub fn poly_at(mesh: &NavMesh, pos: [f32; 3]) -> Result<PolyRef> {
    let found = mesh.find_nearest_poly(&pos, &[0.1, 1.0, 0.1], &QueryFilter::default())?;
    found.map(|(r, _)| r).ok_or(Status::NotFound)
}
