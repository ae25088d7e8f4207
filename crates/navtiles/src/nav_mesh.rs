//! Navigation mesh tile store
//!
//! The mesh owns a fixed number of tile slots. Occupied slots are found by grid
//! location through a power-of-two hash with chaining, free slots are kept on a
//! free list, and every slot carries a salt that is bumped when its tile is
//! removed so that stale [`PolyRef`]s stop resolving.

use log::debug;

use super::binary_format::{parse_tile, read_header, TileData, TileHeader};
use super::nav_common::{next_pow2, opposite_side};
use super::nav_mesh_links::{
    append_links, build_int_links, build_off_mesh_links, connect_ext_links, unconnect_ext_links,
};
use super::poly_ref::RefCodec;
use super::{
    NavMeshParams, PolyFlags, PolyRef, PolyType, Result, Status, TileFlags, LINK_INTERNAL,
    MAX_VERTS_PER_POLY,
};

/// Off-mesh connection flag: traversable in both directions
pub const OFFMESH_CON_BIDIR: u8 = 0x01;

/// Directed connection from one polygon to another
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct Link {
    /// Polygon the link leads to
    pub reference: PolyRef,
    /// Index of the polygon owning the link
    pub poly: u16,
    /// Edge of the owning polygon, 0xff for off-mesh landing links
    pub edge: u8,
    /// Tile side of a portal, [`LINK_INTERNAL`] inside the tile
    pub side: u8,
    /// Start of the portal along the edge, 0..255
    pub bmin: u8,
    /// End of the portal along the edge, 0..255
    pub bmax: u8,
}

impl Link {
    /// Returns true if the link crosses a tile border
    pub fn is_portal(&self) -> bool {
        self.side != LINK_INTERNAL
    }

    /// Returns true if the portal only covers part of its edge
    pub fn is_partial(&self) -> bool {
        self.is_portal() && (self.bmin != 0 || self.bmax != 255)
    }
}

/// Polygon of a tile
#[derive(Debug, Clone, PartialEq)]
pub struct Poly {
    /// Vertex indices into the tile vertices
    pub verts: [u16; MAX_VERTS_PER_POLY],
    /// Per-edge neighbor: 0 wall, `idx + 1` internal, `EXT_LINK | side` portal
    pub neis: [u16; MAX_VERTS_PER_POLY],
    /// First link of the polygon in the tile link array
    pub link_base: u32,
    /// Number of links of the polygon
    pub link_count: u16,
    pub vert_count: u8,
    pub flags: PolyFlags,
    /// Area id, 0..63
    pub area: u8,
    pub poly_type: PolyType,
}

impl Default for Poly {
    fn default() -> Self {
        Self {
            verts: [0; MAX_VERTS_PER_POLY],
            neis: [0; MAX_VERTS_PER_POLY],
            link_base: 0,
            link_count: 0,
            vert_count: 0,
            flags: PolyFlags::empty(),
            area: 0,
            poly_type: PolyType::Ground,
        }
    }
}

impl Poly {
    /// The used part of the vertex index array
    pub fn vert_indices(&self) -> &[u16] {
        &self.verts[..(self.vert_count as usize).min(MAX_VERTS_PER_POLY)]
    }

    pub fn is_off_mesh_connection(&self) -> bool {
        self.poly_type == PolyType::OffMeshConnection
    }
}

/// Detail triangulation range of a polygon
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct PolyDetail {
    /// First detail vertex of the polygon
    pub vert_base: u32,
    /// First detail triangle of the polygon
    pub tri_base: u32,
    /// Detail vertices beyond the polygon vertices
    pub vert_count: u8,
    pub tri_count: u8,
}

/// Bounding volume tree node in quantized tile coordinates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct BVNode {
    pub bmin: [u16; 3],
    pub bmax: [u16; 3],
    /// Polygon index for leaves, negative escape offset for internal nodes
    pub i: i32,
}

impl BVNode {
    pub fn is_leaf(&self) -> bool {
        self.i >= 0
    }
}

/// Off-mesh connection record
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct OffMeshConnection {
    /// Start and end positions
    pub pos: [f32; 6],
    /// Endpoint snap radius
    pub rad: f32,
    /// Index of the polygon standing for the connection
    pub poly: u16,
    /// Connection flags ([`OFFMESH_CON_BIDIR`])
    pub flags: u8,
}

impl OffMeshConnection {
    pub fn start_pos(&self) -> [f32; 3] {
        [self.pos[0], self.pos[1], self.pos[2]]
    }

    pub fn end_pos(&self) -> [f32; 3] {
        [self.pos[3], self.pos[4], self.pos[5]]
    }

    pub fn is_bidirectional(&self) -> bool {
        self.flags & OFFMESH_CON_BIDIR != 0
    }
}

/// Tile slot of a [`NavMesh`]
#[derive(Debug, Clone, Default)]
pub struct MeshTile {
    /// Reuse counter of the slot
    pub salt: u32,
    /// Grid location
    pub x: i32,
    pub y: i32,
    /// `None` while the slot is free
    pub header: Option<TileHeader>,
    pub polys: Vec<Poly>,
    pub verts: Vec<[f32; 3]>,
    pub links: Vec<Link>,
    pub detail_meshes: Vec<PolyDetail>,
    pub detail_verts: Vec<[f32; 3]>,
    pub detail_tris: Vec<[u8; 4]>,
    pub bv_tree: Vec<BVNode>,
    pub off_mesh_cons: Vec<OffMeshConnection>,
    pub flags: TileFlags,
    index: usize,
    /// Original blob, kept when the caller gets it back on removal
    data: Option<Vec<u8>>,
    /// Next slot on the free list or in the hash chain
    next: Option<usize>,
}

impl MeshTile {
    /// Slot index of the tile inside its mesh
    pub fn index(&self) -> usize {
        self.index
    }

    pub fn is_occupied(&self) -> bool {
        self.header.is_some()
    }

    /// Climb height the tile was built with
    pub fn walkable_climb(&self) -> f32 {
        self.header.as_ref().map_or(0.0, |h| h.walkable_climb)
    }

    /// Links owned by a polygon of this tile
    pub fn poly_links(&self, poly: &Poly) -> &[Link] {
        let base = poly.link_base as usize;
        self.links
            .get(base..base + poly.link_count as usize)
            .unwrap_or(&[])
    }

    /// World positions of the polygon vertices
    pub fn poly_verts(&self, poly: &Poly) -> Vec<[f32; 3]> {
        poly.vert_indices()
            .iter()
            .map(|&v| self.verts[v as usize])
            .collect()
    }

    /// Position of a detail triangle vertex
    pub(crate) fn detail_vert(&self, poly: &Poly, detail: &PolyDetail, v: u8) -> [f32; 3] {
        if v < poly.vert_count {
            self.verts[poly.verts[v as usize] as usize]
        } else {
            self.detail_verts[detail.vert_base as usize + (v - poly.vert_count) as usize]
        }
    }

    /// Detail triangles of a ground polygon as world positions
    pub(crate) fn detail_triangles(&self, poly_index: usize) -> Vec<[[f32; 3]; 3]> {
        let (Some(poly), Some(detail)) = (
            self.polys.get(poly_index),
            self.detail_meshes.get(poly_index),
        ) else {
            return Vec::new();
        };
        let base = detail.tri_base as usize;
        self.detail_tris[base..base + detail.tri_count as usize]
            .iter()
            .map(|t| {
                [
                    self.detail_vert(poly, detail, t[0]),
                    self.detail_vert(poly, detail, t[1]),
                    self.detail_vert(poly, detail, t[2]),
                ]
            })
            .collect()
    }

    fn attach(&mut self, x: i32, y: i32, data: TileData, flags: TileFlags) {
        self.x = x;
        self.y = y;
        self.flags = flags;
        self.header = Some(data.header);
        self.polys = data.polys;
        self.verts = data.verts;
        self.links = Vec::new();
        self.detail_meshes = data.detail_meshes;
        self.detail_verts = data.detail_verts;
        self.detail_tris = data.detail_tris;
        self.bv_tree = data.bv_tree;
        self.off_mesh_cons = data.off_mesh_cons;
    }

    fn reset(&mut self) {
        let (salt, index, next) = (self.salt, self.index, self.next);
        *self = MeshTile {
            salt,
            index,
            next,
            ..MeshTile::default()
        };
    }
}

fn compute_tile_hash(x: i32, y: i32, mask: u32) -> usize {
    const H1: u32 = 0x8da6_b343;
    const H2: u32 = 0xd816_3841;
    let n = H1.wrapping_mul(x as u32).wrapping_add(H2.wrapping_mul(y as u32));
    (n & mask) as usize
}

/// Grid location of the neighbor on a tile side
pub(crate) fn neighbour_location(x: i32, y: i32, side: u8) -> Option<(i32, i32)> {
    match side {
        0 => Some((x.checked_add(1)?, y)),
        1 => Some((x, y.checked_add(1)?)),
        2 => Some((x.checked_sub(1)?, y)),
        3 => Some((x, y.checked_sub(1)?)),
        _ => None,
    }
}

/// Tiled navigation mesh
#[derive(Debug)]
pub struct NavMesh {
    params: NavMeshParams,
    codec: RefCodec,
    tiles: Vec<MeshTile>,
    pos_lookup: Vec<Option<usize>>,
    lut_mask: u32,
    next_free: Option<usize>,
}

impl NavMesh {
    /// Creates an empty tiled mesh
    pub fn init_tiled(params: NavMeshParams) -> Result<Self> {
        if params.origin.iter().any(|v| !v.is_finite())
            || !params.tile_width.is_finite()
            || !params.tile_height.is_finite()
            || params.tile_width <= 0.0
            || params.tile_height <= 0.0
        {
            return Err(Status::InvalidParam);
        }

        let codec = RefCodec::new(params.max_tiles, params.max_polys_per_tile)?;

        let lut_size = next_pow2((params.max_tiles / 4) as u32).max(1);
        let pos_lookup = vec![None; lut_size as usize];

        let mut tiles: Vec<MeshTile> = (0..params.max_tiles)
            .map(|index| MeshTile {
                salt: 1,
                index,
                ..MeshTile::default()
            })
            .collect();

        // Slot 0 is handed out first
        let mut next_free = None;
        for tile in tiles.iter_mut().rev() {
            tile.next = next_free;
            next_free = Some(tile.index);
        }

        Ok(Self {
            params,
            codec,
            tiles,
            pos_lookup,
            lut_mask: lut_size - 1,
            next_free,
        })
    }

    /// Creates a one-tile mesh sized after the tile blob
    pub fn init_single(data: Vec<u8>, flags: TileFlags, max_nodes: usize) -> Result<Self> {
        let header = read_header(&data)?;
        let params = NavMeshParams {
            origin: header.bmin,
            tile_width: header.bmax[0] - header.bmin[0],
            tile_height: header.bmax[2] - header.bmin[2],
            max_tiles: 1,
            max_polys_per_tile: (header.poly_count as usize).max(1),
            max_nodes,
        };
        let mut mesh = Self::init_tiled(params)?;
        mesh.add_tile_at(0, 0, data, flags)?;
        Ok(mesh)
    }

    pub fn params(&self) -> &NavMeshParams {
        &self.params
    }

    /// Reference layout of this mesh
    pub fn codec(&self) -> &RefCodec {
        &self.codec
    }

    pub fn max_tiles(&self) -> usize {
        self.tiles.len()
    }

    /// Attaches a tile blob at a grid location and links it to its neighbors
    ///
    /// The blob is fully validated before the mesh is touched; on failure the
    /// mesh is unchanged and the blob is dropped. Returns the reference of the
    /// first polygon of the tile.
    pub fn add_tile_at(&mut self, x: i32, y: i32, data: Vec<u8>, flags: TileFlags) -> Result<PolyRef> {
        let tile_data = parse_tile(&data)?;
        if tile_data.polys.len() > self.codec.max_polys() {
            return Err(Status::InvalidParam);
        }
        if self.tile_index_at(x, y).is_some() {
            return Err(Status::AlreadyOccupied);
        }
        let idx = self.next_free.ok_or(Status::OutOfTiles)?;

        self.next_free = self.tiles[idx].next;
        let h = compute_tile_hash(x, y, self.lut_mask);
        self.tiles[idx].next = self.pos_lookup[h];
        self.pos_lookup[h] = Some(idx);

        let tile = &mut self.tiles[idx];
        tile.attach(x, y, tile_data, flags);
        tile.data = if flags.contains(TileFlags::FREE_DATA) {
            None
        } else {
            Some(data)
        };

        let links = build_int_links(&self.tiles[idx], &self.codec);
        append_links(&mut self.tiles[idx], links);
        let links = build_off_mesh_links(&mut self.tiles[idx], &self.codec);
        append_links(&mut self.tiles[idx], links);

        for side in 0..4u8 {
            let Some(nei) = neighbour_location(x, y, side).and_then(|(nx, ny)| self.tile_index_at(nx, ny))
            else {
                continue;
            };
            let links = connect_ext_links(&self.tiles[idx], &self.tiles[nei], &self.codec, side);
            append_links(&mut self.tiles[idx], links);
            let links = connect_ext_links(
                &self.tiles[nei],
                &self.tiles[idx],
                &self.codec,
                opposite_side(side),
            );
            append_links(&mut self.tiles[nei], links);
        }

        let tile = &self.tiles[idx];
        debug!(
            "Added tile ({}, {}) in slot {}: {} polys, {} links",
            x,
            y,
            idx,
            tile.polys.len(),
            tile.links.len()
        );
        Ok(self.tile_ref(tile))
    }

    /// Detaches the tile at a grid location
    ///
    /// Returns the original blob when the tile was added without
    /// [`TileFlags::FREE_DATA`].
    pub fn remove_tile_at(&mut self, x: i32, y: i32) -> Result<Option<Vec<u8>>> {
        let idx = self.tile_index_at(x, y).ok_or(Status::NotFound)?;

        let h = compute_tile_hash(x, y, self.lut_mask);
        let mut prev: Option<usize> = None;
        let mut cur = self.pos_lookup[h];
        while let Some(i) = cur {
            let next = self.tiles[i].next;
            if i == idx {
                match prev {
                    Some(p) => self.tiles[p].next = next,
                    None => self.pos_lookup[h] = next,
                }
                break;
            }
            prev = Some(i);
            cur = next;
        }

        for side in 0..4u8 {
            if let Some(nei) =
                neighbour_location(x, y, side).and_then(|(nx, ny)| self.tile_index_at(nx, ny))
            {
                unconnect_ext_links(&mut self.tiles[nei], &self.codec, idx);
            }
        }

        let tile = &mut self.tiles[idx];
        let data = tile.data.take();
        tile.reset();
        tile.salt = self.codec.next_salt(tile.salt);
        tile.next = self.next_free;
        self.next_free = Some(idx);

        debug!("Removed tile ({}, {}) from slot {}", x, y, idx);
        Ok(data)
    }

    fn tile_index_at(&self, x: i32, y: i32) -> Option<usize> {
        let mut cur = self.pos_lookup[compute_tile_hash(x, y, self.lut_mask)];
        while let Some(i) = cur {
            let tile = &self.tiles[i];
            if tile.is_occupied() && tile.x == x && tile.y == y {
                return Some(i);
            }
            cur = tile.next;
        }
        None
    }

    /// Tile at a grid location
    pub fn tile_at(&self, x: i32, y: i32) -> Option<&MeshTile> {
        self.tile_index_at(x, y).map(|i| &self.tiles[i])
    }

    /// Occupied tile in a slot
    pub fn tile(&self, index: usize) -> Option<&MeshTile> {
        self.tiles.get(index).filter(|t| t.is_occupied())
    }

    /// Iterates over the occupied tiles
    pub fn tiles(&self) -> impl Iterator<Item = &MeshTile> {
        self.tiles.iter().filter(|t| t.is_occupied())
    }

    /// Grid location containing a world position
    pub fn calc_tile_loc(&self, pos: &[f32; 3]) -> (i32, i32) {
        let tx = ((pos[0] - self.params.origin[0]) / self.params.tile_width).floor() as i32;
        let ty = ((pos[2] - self.params.origin[2]) / self.params.tile_height).floor() as i32;
        (tx, ty)
    }

    /// Reference of the first polygon of a tile, null for a free slot
    pub fn tile_ref(&self, tile: &MeshTile) -> PolyRef {
        if !tile.is_occupied() {
            return PolyRef::NULL;
        }
        self.codec.encode(tile.salt, tile.index as u32, 0)
    }

    /// Reference of a polygon of a tile
    pub fn poly_ref(&self, tile: &MeshTile, poly_index: usize) -> PolyRef {
        self.codec.encode(tile.salt, tile.index as u32, poly_index as u32)
    }

    /// Tile owning a reference
    pub fn tile_by_ref(&self, reference: PolyRef) -> Result<&MeshTile> {
        if !reference.is_valid() {
            return Err(Status::NotFound);
        }
        let (salt, tile_index, _) = self.codec.decode(reference);
        match self.tiles.get(tile_index as usize) {
            Some(tile) if tile.salt == salt && tile.is_occupied() => Ok(tile),
            _ => Err(Status::NotFound),
        }
    }

    /// Tile and polygon of a reference
    pub fn tile_and_poly_by_ref(&self, reference: PolyRef) -> Result<(&MeshTile, &Poly)> {
        let tile = self.tile_by_ref(reference)?;
        let poly = tile
            .polys
            .get(self.codec.decode_poly(reference) as usize)
            .ok_or(Status::NotFound)?;
        Ok((tile, poly))
    }

    pub fn poly_by_ref(&self, reference: PolyRef) -> Result<&Poly> {
        self.tile_and_poly_by_ref(reference).map(|(_, poly)| poly)
    }

    pub fn poly_verts_by_ref(&self, reference: PolyRef) -> Result<Vec<[f32; 3]>> {
        let (tile, poly) = self.tile_and_poly_by_ref(reference)?;
        Ok(tile.poly_verts(poly))
    }

    pub fn poly_links_by_ref(&self, reference: PolyRef) -> Result<&[Link]> {
        let (tile, poly) = self.tile_and_poly_by_ref(reference)?;
        Ok(tile.poly_links(poly))
    }

    /// Connection record of an off-mesh connection polygon
    pub fn off_mesh_connection_by_ref(&self, reference: PolyRef) -> Result<&OffMeshConnection> {
        let (tile, poly) = self.tile_and_poly_by_ref(reference)?;
        if !poly.is_off_mesh_connection() {
            return Err(Status::InvalidParam);
        }
        let base = tile.header.as_ref().map_or(0, |h| h.off_mesh_base as usize);
        let index = (self.codec.decode_poly(reference) as usize).saturating_sub(base);
        tile.off_mesh_cons.get(index).ok_or(Status::NotFound)
    }

    /// Returns true if the reference resolves to a polygon of an attached tile
    pub fn is_valid_poly_ref(&self, reference: PolyRef) -> bool {
        self.tile_and_poly_by_ref(reference).is_ok()
    }
}
