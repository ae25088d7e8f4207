//! Tile data builder
//!
//! Turns a polygon mesh in cell coordinates, with its detail mesh and
//! off-mesh connections, into a tile blob ready for [`NavMesh::add_tile_at`].
//!
//! [`NavMesh::add_tile_at`]: crate::NavMesh::add_tile_at

use log::debug;

use super::binary_format::{write_tile_data, TileData, TileHeader};
use super::nav_mesh::{BVNode, OffMeshConnection, Poly, PolyDetail, OFFMESH_CON_BIDIR};
use super::{PolyFlags, PolyType, Result, Status, EXT_LINK, MAX_VERTS_PER_POLY, MESH_NULL_IDX};

/// Builder portal marker on a polygon neighbor code
pub const MESH_PORTAL_FLAG: u16 = 0x8000;

/// Builder portal direction meaning "border edge without neighbor tile"
pub const MESH_PORTAL_NONE: u16 = 0xf;

/// Input of [`NavMeshBuilder::create_nav_mesh_data`]
///
/// Polygon vertices are stored in cell units relative to `bmin`: x and z in
/// multiples of `cs`, y in multiples of `ch`. Each polygon takes `nvp * 2`
/// entries of `polys`: its vertex indices padded with [`MESH_NULL_IDX`], then one
/// neighbor code per edge. A neighbor code is a polygon index, [`MESH_NULL_IDX`]
/// for a wall, or `MESH_PORTAL_FLAG | dir` for a tile border edge where `dir`
/// is 0 for the -x border, 1 for +z, 2 for +x and 3 for -z.
#[derive(Debug, Clone)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct NavMeshCreateParams {
    /// Vertex cell coordinates, (x, y, z) triples
    pub verts: Vec<u16>,
    pub vert_count: usize,
    /// Polygon vertex indices and neighbor codes
    pub polys: Vec<u16>,
    pub poly_flags: Vec<PolyFlags>,
    pub poly_areas: Vec<u8>,
    pub poly_count: usize,
    /// Maximum number of vertices per polygon
    pub nvp: usize,

    /// Detail sub-meshes, (vert_base, vert_count, tri_base, tri_count) per
    /// polygon. Vertex counts include the polygon vertices, which lead each
    /// sub-mesh. Leave empty to triangulate the polygons as fans.
    pub detail_meshes: Vec<u32>,
    /// Detail vertices in world units, (x, y, z) triples
    pub detail_verts: Vec<f32>,
    pub detail_vert_count: usize,
    /// Detail triangles, three vertex indices and a flags byte each
    pub detail_tris: Vec<u8>,
    pub detail_tri_count: usize,

    /// Connection endpoints in world units, (start, end) per connection
    pub off_mesh_con_verts: Vec<f32>,
    pub off_mesh_con_rad: Vec<f32>,
    pub off_mesh_con_flags: Vec<PolyFlags>,
    pub off_mesh_con_areas: Vec<u8>,
    /// Direction bits, [`OFFMESH_CON_BIDIR`] for two-way connections
    pub off_mesh_con_dir: Vec<u8>,
    pub off_mesh_con_count: usize,

    pub walkable_height: f32,
    pub walkable_radius: f32,
    pub walkable_climb: f32,
    /// Tile bounds in world units
    pub bmin: [f32; 3],
    pub bmax: [f32; 3],
    /// Cell size on the xz-plane
    pub cs: f32,
    /// Cell height
    pub ch: f32,
    /// Tile size in cells
    pub tile_size: usize,
    /// Build a bounding volume tree for spatial queries
    pub build_bv_tree: bool,
}

impl Default for NavMeshCreateParams {
    fn default() -> Self {
        Self {
            verts: Vec::new(),
            vert_count: 0,
            polys: Vec::new(),
            poly_flags: Vec::new(),
            poly_areas: Vec::new(),
            poly_count: 0,
            nvp: MAX_VERTS_PER_POLY,
            detail_meshes: Vec::new(),
            detail_verts: Vec::new(),
            detail_vert_count: 0,
            detail_tris: Vec::new(),
            detail_tri_count: 0,
            off_mesh_con_verts: Vec::new(),
            off_mesh_con_rad: Vec::new(),
            off_mesh_con_flags: Vec::new(),
            off_mesh_con_areas: Vec::new(),
            off_mesh_con_dir: Vec::new(),
            off_mesh_con_count: 0,
            walkable_height: 2.0,
            walkable_radius: 0.6,
            walkable_climb: 0.9,
            bmin: [0.0; 3],
            bmax: [0.0; 3],
            cs: 0.3,
            ch: 0.2,
            tile_size: 0,
            build_bv_tree: true,
        }
    }
}

impl NavMeshCreateParams {
    fn poly_slice(&self, i: usize) -> (&[u16], &[u16]) {
        let base = i * self.nvp * 2;
        let verts = &self.polys[base..base + self.nvp];
        let neis = &self.polys[base + self.nvp..base + self.nvp * 2];
        (verts, neis)
    }

    fn poly_vert_count(&self, i: usize) -> usize {
        let (verts, _) = self.poly_slice(i);
        verts.iter().take_while(|&&v| v != MESH_NULL_IDX).count()
    }

    fn off_mesh_start(&self, i: usize) -> [f32; 3] {
        let v = &self.off_mesh_con_verts[i * 6..i * 6 + 3];
        [v[0], v[1], v[2]]
    }

    fn off_mesh_end(&self, i: usize) -> [f32; 3] {
        let v = &self.off_mesh_con_verts[i * 6 + 3..i * 6 + 6];
        [v[0], v[1], v[2]]
    }

    /// True if a point lies inside the tile bounds on the xz-plane
    fn contains_xz(&self, p: &[f32; 3]) -> bool {
        p[0] >= self.bmin[0] && p[0] <= self.bmax[0] && p[2] >= self.bmin[2] && p[2] <= self.bmax[2]
    }
}

/// Builds tile blobs
pub struct NavMeshBuilder;

impl NavMeshBuilder {
    /// Builds and serializes a tile
    pub fn create_nav_mesh_data(params: &NavMeshCreateParams) -> Result<Vec<u8>> {
        let data = Self::build_tile_data(params)?;
        write_tile_data(&data)
    }

    /// Builds the decoded tile without serializing it
    pub fn build_tile_data(params: &NavMeshCreateParams) -> Result<TileData> {
        Self::validate_params(params)?;

        // Only connections starting inside this tile are stored here
        let stored_cons: Vec<usize> = (0..params.off_mesh_con_count)
            .filter(|&i| params.contains_xz(&params.off_mesh_start(i)))
            .collect();

        let mut verts = Self::build_vertices(params);
        let mut polys = Self::build_polygons(params)?;
        let (detail_meshes, detail_verts, detail_tris) = Self::build_detail(params);

        let off_mesh_base = params.poly_count;
        let mut off_mesh_cons = Vec::with_capacity(stored_cons.len());
        for (k, &i) in stored_cons.iter().enumerate() {
            let v0 = verts.len();
            verts.push(params.off_mesh_start(i));
            verts.push(params.off_mesh_end(i));

            let mut poly = Poly {
                vert_count: 2,
                flags: params.off_mesh_con_flags[i],
                area: params.off_mesh_con_areas[i],
                poly_type: PolyType::OffMeshConnection,
                ..Poly::default()
            };
            poly.verts[0] = v0 as u16;
            poly.verts[1] = (v0 + 1) as u16;
            polys.push(poly);

            let mut pos = [0.0; 6];
            pos.copy_from_slice(&params.off_mesh_con_verts[i * 6..i * 6 + 6]);
            off_mesh_cons.push(OffMeshConnection {
                pos,
                rad: params.off_mesh_con_rad[i],
                poly: (off_mesh_base + k) as u16,
                flags: params.off_mesh_con_dir[i] & OFFMESH_CON_BIDIR,
            });
        }

        let bv_tree = if params.build_bv_tree {
            Self::build_bv_tree(params)
        } else {
            Vec::new()
        };

        // Link capacity: one per edge, two per portal, four per connection
        let mut edge_count = 0;
        let mut portal_count = 0;
        for i in 0..params.poly_count {
            let nv = params.poly_vert_count(i);
            let (_, neis) = params.poly_slice(i);
            edge_count += nv;
            portal_count += neis[..nv]
                .iter()
                .filter(|&&n| n != MESH_NULL_IDX && n & MESH_PORTAL_FLAG != 0 && n & 0xf != MESH_PORTAL_NONE)
                .count();
        }
        let max_link_count = edge_count + portal_count * 2 + off_mesh_cons.len() * 4;

        debug!(
            "Built tile data: {} polygons, {} off-mesh connections, {} BV nodes, {} link slots",
            polys.len(),
            off_mesh_cons.len(),
            bv_tree.len(),
            max_link_count
        );

        let header = TileHeader {
            max_link_count: u32::try_from(max_link_count).map_err(|_| Status::InvalidParam)?,
            off_mesh_base: off_mesh_base as u32,
            walkable_height: params.walkable_height,
            walkable_radius: params.walkable_radius,
            walkable_climb: params.walkable_climb,
            bmin: params.bmin,
            bmax: params.bmax,
            bv_quant_factor: 1.0 / params.cs,
            ..TileHeader::default()
        };

        Ok(TileData {
            header,
            polys,
            verts,
            detail_meshes,
            detail_verts,
            detail_tris,
            bv_tree,
            off_mesh_cons,
        })
    }

    fn validate_params(params: &NavMeshCreateParams) -> Result<()> {
        let invalid = |cond: bool| if cond { Err(Status::InvalidParam) } else { Ok(()) };

        invalid(params.nvp < 3 || params.nvp > MAX_VERTS_PER_POLY)?;
        invalid(params.vert_count == 0 || params.vert_count >= MESH_NULL_IDX as usize)?;
        invalid(params.poly_count == 0)?;
        invalid(!(params.cs > 0.0) || !(params.ch > 0.0))?;
        invalid(params.verts.len() != params.vert_count * 3)?;
        invalid(params.polys.len() != params.poly_count * params.nvp * 2)?;
        invalid(params.poly_flags.len() != params.poly_count || params.poly_areas.len() != params.poly_count)?;
        invalid(params.poly_count + params.off_mesh_con_count > u16::MAX as usize)?;
        invalid(params.vert_count + params.off_mesh_con_count * 2 > u16::MAX as usize)?;
        invalid(params.bmin.iter().chain(&params.bmax).any(|v| !v.is_finite()))?;

        for i in 0..params.poly_count {
            let nv = params.poly_vert_count(i);
            invalid(nv < 3)?;
            let (verts, neis) = params.poly_slice(i);
            invalid(verts[..nv].iter().any(|&v| v as usize >= params.vert_count))?;
            for &nei in &neis[..nv] {
                if nei == MESH_NULL_IDX {
                    continue;
                }
                if nei & MESH_PORTAL_FLAG != 0 {
                    let dir = nei & 0xf;
                    invalid(dir > 3 && dir != MESH_PORTAL_NONE)?;
                } else {
                    invalid(nei as usize >= params.poly_count)?;
                }
            }
        }

        if !params.detail_meshes.is_empty() {
            invalid(params.detail_meshes.len() != params.poly_count * 4)?;
            invalid(params.detail_verts.len() != params.detail_vert_count * 3)?;
            invalid(params.detail_tris.len() != params.detail_tri_count * 4)?;
            for i in 0..params.poly_count {
                let d = &params.detail_meshes[i * 4..i * 4 + 4];
                let (vb, ndv, tb, ntris) = (d[0] as usize, d[1] as usize, d[2] as usize, d[3] as usize);
                let nv = params.poly_vert_count(i);
                invalid(ndv < nv || vb + ndv > params.detail_vert_count)?;
                invalid(ndv - nv > u8::MAX as usize || ntris > u8::MAX as usize)?;
                invalid(tb + ntris > params.detail_tri_count)?;
                let tris = &params.detail_tris[tb * 4..(tb + ntris) * 4];
                invalid(tris.chunks_exact(4).any(|t| t[..3].iter().any(|&v| v as usize >= ndv)))?;
            }
        }

        let n = params.off_mesh_con_count;
        invalid(params.off_mesh_con_verts.len() != n * 6)?;
        invalid(params.off_mesh_con_rad.len() != n)?;
        invalid(params.off_mesh_con_flags.len() != n)?;
        invalid(params.off_mesh_con_areas.len() != n)?;
        invalid(params.off_mesh_con_dir.len() != n)?;
        invalid(params.off_mesh_con_verts.iter().any(|v| !v.is_finite()))?;

        Ok(())
    }

    fn build_vertices(params: &NavMeshCreateParams) -> Vec<[f32; 3]> {
        params
            .verts
            .chunks_exact(3)
            .map(|v| {
                [
                    params.bmin[0] + v[0] as f32 * params.cs,
                    params.bmin[1] + v[1] as f32 * params.ch,
                    params.bmin[2] + v[2] as f32 * params.cs,
                ]
            })
            .collect()
    }

    fn build_polygons(params: &NavMeshCreateParams) -> Result<Vec<Poly>> {
        let mut polys = Vec::with_capacity(params.poly_count + params.off_mesh_con_count);
        for i in 0..params.poly_count {
            let nv = params.poly_vert_count(i);
            let (verts, neis) = params.poly_slice(i);
            let mut poly = Poly {
                vert_count: nv as u8,
                flags: params.poly_flags[i],
                area: params.poly_areas[i],
                poly_type: PolyType::Ground,
                ..Poly::default()
            };
            poly.verts[..nv].copy_from_slice(&verts[..nv]);
            for j in 0..nv {
                poly.neis[j] = map_neighbour(neis[j])?;
            }
            polys.push(poly);
        }
        Ok(polys)
    }

    /// Copies the detail meshes, dropping the leading polygon vertices of each
    /// sub-mesh, or triangulates every polygon as a fan when none are given
    fn build_detail(params: &NavMeshCreateParams) -> (Vec<PolyDetail>, Vec<[f32; 3]>, Vec<[u8; 4]>) {
        let mut meshes = Vec::with_capacity(params.poly_count);
        let mut verts = Vec::new();
        let mut tris = Vec::new();

        if params.detail_meshes.is_empty() {
            for i in 0..params.poly_count {
                let nv = params.poly_vert_count(i);
                let tri_base = tris.len() as u32;
                for j in 2..nv {
                    tris.push([0, (j - 1) as u8, j as u8, 0]);
                }
                meshes.push(PolyDetail {
                    vert_base: 0,
                    tri_base,
                    vert_count: 0,
                    tri_count: (nv - 2) as u8,
                });
            }
            return (meshes, verts, tris);
        }

        for i in 0..params.poly_count {
            let d = &params.detail_meshes[i * 4..i * 4 + 4];
            let (vb, ndv, tb, ntris) = (d[0] as usize, d[1] as usize, d[2] as usize, d[3] as usize);
            let nv = params.poly_vert_count(i);

            let vert_base = verts.len() as u32;
            for v in params.detail_verts[(vb + nv) * 3..(vb + ndv) * 3].chunks_exact(3) {
                verts.push([v[0], v[1], v[2]]);
            }
            let tri_base = tris.len() as u32;
            for t in params.detail_tris[tb * 4..(tb + ntris) * 4].chunks_exact(4) {
                tris.push([t[0], t[1], t[2], t[3]]);
            }
            meshes.push(PolyDetail {
                vert_base,
                tri_base,
                vert_count: (ndv - nv) as u8,
                tri_count: ntris as u8,
            });
        }
        (meshes, verts, tris)
    }

    /// Builds a bounding volume tree over the ground polygons
    ///
    /// Bounds are quantized in cell units; y is rescaled from `ch` to `cs`.
    fn build_bv_tree(params: &NavMeshCreateParams) -> Vec<BVNode> {
        let mut items: Vec<BVItem> = (0..params.poly_count)
            .map(|i| {
                let nv = params.poly_vert_count(i);
                let (verts, _) = params.poly_slice(i);
                let mut bmin = [u16::MAX; 3];
                let mut bmax = [0u16; 3];
                for &v in &verts[..nv] {
                    let p = &params.verts[v as usize * 3..v as usize * 3 + 3];
                    for axis in 0..3 {
                        bmin[axis] = bmin[axis].min(p[axis]);
                        bmax[axis] = bmax[axis].max(p[axis]);
                    }
                }
                let scale = params.ch / params.cs;
                bmin[1] = (bmin[1] as f32 * scale).floor() as u16;
                bmax[1] = (bmax[1] as f32 * scale).ceil() as u16;
                BVItem { bmin, bmax, index: i }
            })
            .collect();

        let mut nodes = Vec::with_capacity(items.len() * 2);
        subdivide(&mut items, &mut nodes);
        nodes
    }
}

#[derive(Debug, Clone, Copy)]
struct BVItem {
    bmin: [u16; 3],
    bmax: [u16; 3],
    index: usize,
}

fn longest_axis(x: u16, y: u16, z: u16) -> usize {
    let mut axis = 0;
    let mut max = x;
    if y > max {
        axis = 1;
        max = y;
    }
    if z > max {
        axis = 2;
    }
    axis
}

/// Median split along the longest axis; interior nodes store their negated
/// subtree size as escape index
fn subdivide(items: &mut [BVItem], nodes: &mut Vec<BVNode>) {
    let node_index = nodes.len();
    let mut node = BVNode {
        bmin: [u16::MAX; 3],
        bmax: [0; 3],
        i: 0,
    };
    for item in items.iter() {
        for axis in 0..3 {
            node.bmin[axis] = node.bmin[axis].min(item.bmin[axis]);
            node.bmax[axis] = node.bmax[axis].max(item.bmax[axis]);
        }
    }

    if let [item] = items {
        node.i = item.index as i32;
        nodes.push(node);
        return;
    }

    nodes.push(node);
    let axis = longest_axis(
        node.bmax[0] - node.bmin[0],
        node.bmax[1] - node.bmin[1],
        node.bmax[2] - node.bmin[2],
    );
    items.sort_by_key(|item| item.bmin[axis]);

    let split = items.len() / 2;
    let (left, right) = items.split_at_mut(split);
    subdivide(left, nodes);
    subdivide(right, nodes);

    let escape = (nodes.len() - node_index) as i32;
    nodes[node_index].i = -escape;
}

/// Maps a builder neighbor code to a tile neighbor code
fn map_neighbour(nei: u16) -> Result<u16> {
    if nei == MESH_NULL_IDX {
        return Ok(0);
    }
    if nei & MESH_PORTAL_FLAG != 0 {
        return match nei & 0xf {
            0 => Ok(EXT_LINK | 2),
            1 => Ok(EXT_LINK | 1),
            2 => Ok(EXT_LINK),
            3 => Ok(EXT_LINK | 3),
            MESH_PORTAL_NONE => Ok(0),
            _ => Err(Status::InvalidParam),
        };
    }
    Ok(nei + 1)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::binary_format::parse_tile;

    /// Two quads side by side, the right one with a portal on the +x border
    fn two_quads() -> NavMeshCreateParams {
        let n = MESH_NULL_IDX;
        NavMeshCreateParams {
            verts: vec![0, 0, 0, 0, 0, 4, 4, 0, 4, 4, 0, 0, 8, 0, 4, 8, 0, 0],
            vert_count: 6,
            polys: vec![
                0, 1, 2, 3, n, n, n, n, 1, n, n, n, //
                3, 2, 4, 5, n, n, 0, n, MESH_PORTAL_FLAG | 2, n, n, n,
            ],
            poly_flags: vec![PolyFlags::WALK; 2],
            poly_areas: vec![0, 2],
            poly_count: 2,
            bmin: [0.0; 3],
            bmax: [8.0, 1.0, 4.0],
            cs: 1.0,
            ch: 0.5,
            tile_size: 8,
            ..NavMeshCreateParams::default()
        }
    }

    #[test]
    fn test_build_two_quads() -> Result<()> {
        let data = NavMeshBuilder::build_tile_data(&two_quads())?;

        assert_eq!(data.polys.len(), 2);
        assert_eq!(data.verts[4], [8.0, 0.0, 4.0]);
        assert_eq!(data.polys[0].neis[..4], [0, 0, 2, 0]);
        assert_eq!(data.polys[1].neis[..4], [1, 0, EXT_LINK, 0]);
        assert_eq!(data.polys[1].area, 2);

        // Fan triangulation when no detail mesh is given
        assert_eq!(data.detail_meshes.len(), 2);
        assert_eq!(data.detail_meshes[1].tri_count, 2);
        assert_eq!(data.detail_tris.len(), 4);

        // 8 edges, 1 portal
        assert_eq!(data.header.max_link_count, 10);
        assert_eq!(data.header.bv_quant_factor, 1.0);
        Ok(())
    }

    #[test]
    fn test_bv_tree_layout() -> Result<()> {
        let data = NavMeshBuilder::build_tile_data(&two_quads())?;
        assert_eq!(data.bv_tree.len(), 3);
        assert_eq!(data.bv_tree[0].i, -3);
        assert_eq!(data.bv_tree[0].bmin, [0, 0, 0]);
        assert_eq!(data.bv_tree[0].bmax, [8, 0, 4]);
        let mut leaves: Vec<i32> = data.bv_tree[1..].iter().map(|n| n.i).collect();
        leaves.sort();
        assert_eq!(leaves, vec![0, 1]);
        Ok(())
    }

    #[test]
    fn test_blob_parses_back() -> Result<()> {
        let params = two_quads();
        let blob = NavMeshBuilder::create_nav_mesh_data(&params)?;
        let parsed = parse_tile(&blob)?;
        let mut built = NavMeshBuilder::build_tile_data(&params)?;
        built.header = parsed.header.clone();
        assert_eq!(parsed, built);
        Ok(())
    }

    #[test]
    fn test_off_mesh_connections_classified() -> Result<()> {
        let mut params = two_quads();
        params.off_mesh_con_verts = vec![
            1.0, 0.0, 1.0, 6.0, 0.0, 3.0, // starts inside
            20.0, 0.0, 1.0, 1.0, 0.0, 1.0, // starts outside
        ];
        params.off_mesh_con_rad = vec![0.5, 0.5];
        params.off_mesh_con_flags = vec![PolyFlags::JUMP; 2];
        params.off_mesh_con_areas = vec![5, 5];
        params.off_mesh_con_dir = vec![OFFMESH_CON_BIDIR, 0];
        params.off_mesh_con_count = 2;

        let data = NavMeshBuilder::build_tile_data(&params)?;
        assert_eq!(data.off_mesh_cons.len(), 1);
        assert_eq!(data.header.off_mesh_base, 2);
        assert_eq!(data.polys.len(), 3);

        let con_poly = &data.polys[2];
        assert_eq!(con_poly.poly_type, PolyType::OffMeshConnection);
        assert_eq!(con_poly.vert_count, 2);
        assert_eq!(data.verts[con_poly.verts[1] as usize], [6.0, 0.0, 3.0]);
        assert!(data.off_mesh_cons[0].is_bidirectional());
        assert_eq!(data.off_mesh_cons[0].poly, 2);
        assert_eq!(data.header.max_link_count, 14);
        Ok(())
    }

    #[test]
    fn test_detail_mesh_copied_without_poly_verts() -> Result<()> {
        let mut params = two_quads();
        // Sub-mesh 0: 4 polygon vertices plus one center vertex
        params.detail_verts = vec![
            0.0, 0.0, 0.0, 0.0, 0.0, 4.0, 4.0, 0.0, 4.0, 4.0, 0.0, 0.0, 2.0, 0.5, 2.0, //
            4.0, 0.0, 0.0, 4.0, 0.0, 4.0, 8.0, 0.0, 4.0, 8.0, 0.0, 0.0,
        ];
        params.detail_vert_count = 9;
        params.detail_tris = vec![
            0, 1, 4, 0, 1, 2, 4, 0, 2, 3, 4, 0, 3, 0, 4, 0, //
            0, 1, 2, 0, 0, 2, 3, 0,
        ];
        params.detail_tri_count = 6;
        params.detail_meshes = vec![0, 5, 0, 4, 5, 4, 4, 2];

        let data = NavMeshBuilder::build_tile_data(&params)?;
        assert_eq!(data.detail_verts, vec![[2.0, 0.5, 2.0]]);
        assert_eq!(data.detail_meshes[0].vert_count, 1);
        assert_eq!(data.detail_meshes[1].vert_count, 0);
        assert_eq!(data.detail_meshes[1].tri_base, 4);
        Ok(())
    }

    #[test]
    fn test_invalid_params() {
        let mut params = two_quads();
        params.nvp = 7;
        assert_eq!(
            NavMeshBuilder::create_nav_mesh_data(&params).err(),
            Some(Status::InvalidParam)
        );

        let mut params = two_quads();
        params.polys[1] = 9;
        assert_eq!(
            NavMeshBuilder::create_nav_mesh_data(&params).err(),
            Some(Status::InvalidParam)
        );

        let mut params = two_quads();
        params.poly_flags.pop();
        assert_eq!(
            NavMeshBuilder::create_nav_mesh_data(&params).err(),
            Some(Status::InvalidParam)
        );

        let mut params = two_quads();
        params.off_mesh_con_count = 1;
        assert_eq!(
            NavMeshBuilder::create_nav_mesh_data(&params).err(),
            Some(Status::InvalidParam)
        );

        let mut params = two_quads();
        params.detail_meshes = vec![0, 4, 0, 2, 0, 4, 0, 2];
        params.detail_verts = vec![0.0; 12];
        params.detail_vert_count = 4;
        params.detail_tris = vec![0, 1, 7, 0, 0, 2, 3, 0];
        params.detail_tri_count = 2;
        assert_eq!(
            NavMeshBuilder::create_nav_mesh_data(&params).err(),
            Some(Status::InvalidParam)
        );
    }
}
