//! Link construction: internal links, tile portals and off-mesh connections

use crate::binary_format::write_tile_data;
use crate::nav_mesh_builder::{NavMeshBuilder, NavMeshCreateParams, MESH_PORTAL_FLAG};
use crate::test_mesh_helpers::*;
use crate::{NavMesh, PolyFlags, PolyRef, Result, Status, TileFlags, LINK_INTERNAL, MESH_NULL_IDX};

/// One quad covering a whole tile, every edge a portal
fn big_quad_params(tx: i32, ty: i32, n: usize) -> NavMeshCreateParams {
    let s = n as u16;
    let size = n as f32;
    NavMeshCreateParams {
        verts: vec![0, 0, 0, 0, 0, s, s, 0, s, s, 0, 0],
        vert_count: 4,
        polys: vec![
            0,
            1,
            2,
            3,
            MESH_PORTAL_FLAG,
            MESH_PORTAL_FLAG | 1,
            MESH_PORTAL_FLAG | 2,
            MESH_PORTAL_FLAG | 3,
        ],
        poly_flags: vec![PolyFlags::WALK],
        poly_areas: vec![0],
        poly_count: 1,
        nvp: 4,
        bmin: [tx as f32 * size, 0.0, ty as f32 * size],
        bmax: [(tx + 1) as f32 * size, 1.0, (ty + 1) as f32 * size],
        cs: 1.0,
        ch: 1.0,
        tile_size: n,
        ..NavMeshCreateParams::default()
    }
}

fn add_params(mesh: &mut NavMesh, x: i32, y: i32, params: &NavMeshCreateParams) -> Result<PolyRef> {
    let blob = NavMeshBuilder::create_nav_mesh_data(params)?;
    mesh.add_tile_at(x, y, blob, TileFlags::FREE_DATA)
}

#[test]
fn test_internal_links_are_symmetric() -> Result<()> {
    let mesh = create_single_tile_mesh(3, &[(1, 1)])?;
    let tile = mesh.tile_at(0, 0).ok_or(Status::NotFound)?;

    for (i, poly) in tile.polys.iter().enumerate() {
        let me = mesh.poly_ref(tile, i);
        for link in tile.poly_links(poly) {
            assert_eq!(link.side, LINK_INTERNAL);
            let back = mesh.poly_links_by_ref(link.reference)?;
            assert!(back.iter().any(|l| l.reference == me));
        }
    }

    // Quads next to the hole have a wall where the hole is
    let west = grid_poly_index(3, &[(1, 1)], 0, 1).ok_or(Status::NotFound)?;
    let west_poly = &tile.polys[west];
    assert_eq!(west_poly.neis[2], 0);
    assert!(tile.poly_links(west_poly).iter().all(|l| l.edge != 2));
    Ok(())
}

#[test]
fn test_partial_portals_between_mismatched_tiles() -> Result<()> {
    let mut mesh = NavMesh::init_tiled(grid_mesh_params(4, 2))?;
    add_params(&mut mesh, 0, 0, &grid_tile_params(0, 0, 2, &[]))?;
    let big = add_params(&mut mesh, 1, 0, &big_quad_params(1, 0, 2))?;

    // The big quad's -x edge runs from z=0 to z=2 and meets two small quads
    let mut ranges: Vec<(u8, u8)> = mesh
        .poly_links_by_ref(big)?
        .iter()
        .filter(|l| l.edge == 0)
        .map(|l| {
            assert_eq!(l.side, 2);
            assert!(l.is_portal());
            (l.bmin, l.bmax)
        })
        .collect();
    ranges.sort();
    assert_eq!(ranges, vec![(0, 128), (128, 255)]);

    // Seen from the small quads each portal covers their whole edge
    let tile = mesh.tile_at(0, 0).ok_or(Status::NotFound)?;
    for cz in 0..2 {
        let poly = &tile.polys[cz * 2 + 1];
        let links: Vec<_> = tile.poly_links(poly).iter().filter(|l| l.is_portal()).collect();
        assert_eq!(links.len(), 1);
        assert_eq!(links[0].reference, big);
        assert_eq!((links[0].bmin, links[0].bmax), (0, 255));
        assert!(!links[0].is_partial());
    }
    Ok(())
}

#[test]
fn test_no_portal_across_height_step() -> Result<()> {
    let mut mesh = NavMesh::init_tiled(grid_mesh_params(2, 2))?;
    add_params(&mut mesh, 0, 0, &grid_tile_params(0, 0, 2, &[]))?;
    let mut raised = grid_tile_params(1, 0, 2, &[]);
    raised.bmin[1] = 5.0;
    raised.bmax[1] = 6.0;
    add_params(&mut mesh, 1, 0, &raised)?;

    for tile in mesh.tiles() {
        assert!(tile.links.iter().all(|l| !l.is_portal()));
    }
    Ok(())
}

#[test]
fn test_removed_tile_is_not_referenced() -> Result<()> {
    let mut mesh = create_grid_mesh(2, 2, 2)?;
    let removed = mesh.tile_at(1, 1).ok_or(Status::NotFound)?.index();
    mesh.remove_tile_at(1, 1)?;

    for tile in mesh.tiles() {
        assert!(tile
            .links
            .iter()
            .all(|l| mesh.codec().decode_tile(l.reference) as usize != removed));
        assert!(tile.links.iter().all(|l| mesh.is_valid_poly_ref(l.reference)));
    }

    // Re-adding restores the portals on both sides
    mesh.add_tile_at(1, 1, grid_tile_blob(1, 1, 2, &[])?, TileFlags::FREE_DATA)?;
    let restored = mesh.tile_at(1, 1).ok_or(Status::NotFound)?;
    assert_eq!(restored.links.iter().filter(|l| l.is_portal()).count(), 4);
    Ok(())
}

#[test]
fn test_off_mesh_connection_links() -> Result<()> {
    let mut params = grid_tile_params(0, 0, 3, &[]);
    add_off_mesh_connection(&mut params, [0.5, 0.3, 0.5], [2.5, 0.2, 2.5], 0.4, false);
    let mut mesh = NavMesh::init_tiled(grid_mesh_params(1, 3))?;
    add_params(&mut mesh, 0, 0, &params)?;

    let tile = mesh.tile_at(0, 0).ok_or(Status::NotFound)?;
    let con_index = tile.polys.len() - 1;
    let con_ref = mesh.poly_ref(tile, con_index);
    let start_ref = mesh.poly_ref(tile, 0);
    let end_ref = mesh.poly_ref(tile, 8);

    let con_links = mesh.poly_links_by_ref(con_ref)?;
    assert_eq!(con_links.len(), 2);
    assert!(con_links.iter().any(|l| l.edge == 0 && l.reference == start_ref));
    assert!(con_links.iter().any(|l| l.edge == 1 && l.reference == end_ref));

    // Only the start polygon leads onto a one-way connection
    let start_links = mesh.poly_links_by_ref(start_ref)?;
    assert!(start_links.iter().any(|l| l.reference == con_ref && l.edge == 0xff));
    let end_links = mesh.poly_links_by_ref(end_ref)?;
    assert!(end_links.iter().all(|l| l.reference != con_ref));

    // Endpoints are snapped onto the ground
    let con_poly = &tile.polys[con_index];
    assert_eq!(tile.verts[con_poly.verts[0] as usize], [0.5, 0.0, 0.5]);
    assert_eq!(tile.verts[con_poly.verts[1] as usize], [2.5, 0.0, 2.5]);

    let con = mesh.off_mesh_connection_by_ref(con_ref)?;
    assert!(!con.is_bidirectional());
    assert_eq!(
        mesh.off_mesh_connection_by_ref(start_ref).err(),
        Some(Status::InvalidParam)
    );
    Ok(())
}

#[test]
fn test_bidirectional_connection_links_both_ends() -> Result<()> {
    let mut params = grid_tile_params(0, 0, 3, &[]);
    add_off_mesh_connection(&mut params, [0.5, 0.0, 0.5], [2.5, 0.0, 2.5], 0.4, true);
    let mut mesh = NavMesh::init_tiled(grid_mesh_params(1, 3))?;
    add_params(&mut mesh, 0, 0, &params)?;

    let tile = mesh.tile_at(0, 0).ok_or(Status::NotFound)?;
    let con_ref = mesh.poly_ref(tile, tile.polys.len() - 1);
    for index in [0, 8] {
        let links = mesh.poly_links_by_ref(mesh.poly_ref(tile, index))?;
        assert!(links.iter().any(|l| l.reference == con_ref));
    }
    Ok(())
}

#[test]
fn test_off_mesh_endpoint_without_ground() -> Result<()> {
    let holes = [(1, 1)];
    let mut params = grid_tile_params(0, 0, 3, &holes);
    add_off_mesh_connection(&mut params, [0.5, 0.0, 0.5], [1.5, 0.0, 1.5], 0.4, true);
    let mut mesh = NavMesh::init_tiled(grid_mesh_params(1, 3))?;
    add_params(&mut mesh, 0, 0, &params)?;

    let tile = mesh.tile_at(0, 0).ok_or(Status::NotFound)?;
    let con_ref = mesh.poly_ref(tile, tile.polys.len() - 1);
    let links = mesh.poly_links_by_ref(con_ref)?;
    assert_eq!(links.len(), 1);
    assert_eq!(links[0].edge, 0);
    Ok(())
}

#[test]
fn test_links_truncated_to_capacity() -> Result<()> {
    let mut data = NavMeshBuilder::build_tile_data(&grid_tile_params(0, 0, 3, &[]))?;
    data.header.max_link_count = 5;
    let blob = write_tile_data(&data)?;

    let mut mesh = NavMesh::init_tiled(grid_mesh_params(1, 3))?;
    mesh.add_tile_at(0, 0, blob, TileFlags::FREE_DATA)?;
    let tile = mesh.tile_at(0, 0).ok_or(Status::NotFound)?;
    assert_eq!(tile.links.len(), 5);
    let total: usize = tile.polys.iter().map(|p| p.link_count as usize).sum();
    assert_eq!(total, 5);
    Ok(())
}

#[test]
fn test_portal_to_nowhere_is_a_wall() -> Result<()> {
    let mut params = big_quad_params(0, 0, 2);
    params.polys[4] = MESH_PORTAL_FLAG | 0xf;
    params.polys[5] = MESH_NULL_IDX;
    let data = NavMeshBuilder::build_tile_data(&params)?;
    assert_eq!(data.polys[0].neis[..2], [0, 0]);
    Ok(())
}
