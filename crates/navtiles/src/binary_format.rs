//! Tile binary format
//!
//! A tile blob is a little-endian header followed by its sections, each starting
//! on a 4-byte boundary. The header records the byte offset of every section so
//! readers never depend on in-memory addresses. Links are not persisted; the
//! header only carries the link capacity the tile was built for.

use byteorder::{LittleEndian, ReadBytesExt, WriteBytesExt};
use std::io::{Cursor, Read, Write};

use super::nav_common::align4;
use super::nav_mesh::{BVNode, OffMeshConnection, Poly, PolyDetail};
use super::{PolyFlags, PolyType, Result, Status, EXT_LINK, MAX_VERTS_PER_POLY};

/// Magic number of tile blobs ('DNAV')
pub const NAVMESH_MAGIC: u32 = 0x5641_4E44; // 'DNAV' in little-endian

/// Current tile format version
pub const NAVMESH_VERSION: u32 = 3;

/// Size of the serialized header
pub const HEADER_SIZE: usize = 112;

const POLY_SIZE: usize = 28;
const VERT_SIZE: usize = 12;
const DETAIL_MESH_SIZE: usize = 12;
const DETAIL_TRI_SIZE: usize = 4;
const BV_NODE_SIZE: usize = 16;
const OFF_MESH_CON_SIZE: usize = 32;

/// Byte offsets of the tile sections
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SectionOffsets {
    pub polys: u32,
    pub verts: u32,
    pub detail_meshes: u32,
    pub detail_verts: u32,
    pub detail_tris: u32,
    pub bv_tree: u32,
    pub off_mesh_cons: u32,
}

/// Header of a tile blob
#[derive(Debug, Clone, PartialEq)]
pub struct TileHeader {
    pub magic: u32,
    pub version: u32,
    pub poly_count: u32,
    pub vert_count: u32,
    /// Number of links the tile may hold once attached
    pub max_link_count: u32,
    pub detail_mesh_count: u32,
    pub detail_vert_count: u32,
    pub detail_tri_count: u32,
    pub bv_node_count: u32,
    pub off_mesh_con_count: u32,
    /// Index of the first off-mesh connection polygon
    pub off_mesh_base: u32,
    pub walkable_height: f32,
    pub walkable_radius: f32,
    pub walkable_climb: f32,
    pub bmin: [f32; 3],
    pub bmax: [f32; 3],
    /// Scale from world units to BV-tree quantized units
    pub bv_quant_factor: f32,
    pub offsets: SectionOffsets,
}

impl Default for TileHeader {
    fn default() -> Self {
        Self {
            magic: NAVMESH_MAGIC,
            version: NAVMESH_VERSION,
            poly_count: 0,
            vert_count: 0,
            max_link_count: 0,
            detail_mesh_count: 0,
            detail_vert_count: 0,
            detail_tri_count: 0,
            bv_node_count: 0,
            off_mesh_con_count: 0,
            off_mesh_base: 0,
            walkable_height: 0.0,
            walkable_radius: 0.0,
            walkable_climb: 0.0,
            bmin: [0.0; 3],
            bmax: [0.0; 3],
            bv_quant_factor: 1.0,
            offsets: SectionOffsets::default(),
        }
    }
}

impl TileHeader {
    fn read_from<R: Read>(reader: &mut R) -> Result<Self> {
        Ok(Self {
            magic: reader.read_u32::<LittleEndian>()?,
            version: reader.read_u32::<LittleEndian>()?,
            poly_count: reader.read_u32::<LittleEndian>()?,
            vert_count: reader.read_u32::<LittleEndian>()?,
            max_link_count: reader.read_u32::<LittleEndian>()?,
            detail_mesh_count: reader.read_u32::<LittleEndian>()?,
            detail_vert_count: reader.read_u32::<LittleEndian>()?,
            detail_tri_count: reader.read_u32::<LittleEndian>()?,
            bv_node_count: reader.read_u32::<LittleEndian>()?,
            off_mesh_con_count: reader.read_u32::<LittleEndian>()?,
            off_mesh_base: reader.read_u32::<LittleEndian>()?,
            walkable_height: reader.read_f32::<LittleEndian>()?,
            walkable_radius: reader.read_f32::<LittleEndian>()?,
            walkable_climb: reader.read_f32::<LittleEndian>()?,
            bmin: read_vec3(reader)?,
            bmax: read_vec3(reader)?,
            bv_quant_factor: reader.read_f32::<LittleEndian>()?,
            offsets: SectionOffsets {
                polys: reader.read_u32::<LittleEndian>()?,
                verts: reader.read_u32::<LittleEndian>()?,
                detail_meshes: reader.read_u32::<LittleEndian>()?,
                detail_verts: reader.read_u32::<LittleEndian>()?,
                detail_tris: reader.read_u32::<LittleEndian>()?,
                bv_tree: reader.read_u32::<LittleEndian>()?,
                off_mesh_cons: reader.read_u32::<LittleEndian>()?,
            },
        })
    }

    fn write_to<W: Write>(&self, writer: &mut W) -> Result<()> {
        writer.write_u32::<LittleEndian>(self.magic)?;
        writer.write_u32::<LittleEndian>(self.version)?;
        writer.write_u32::<LittleEndian>(self.poly_count)?;
        writer.write_u32::<LittleEndian>(self.vert_count)?;
        writer.write_u32::<LittleEndian>(self.max_link_count)?;
        writer.write_u32::<LittleEndian>(self.detail_mesh_count)?;
        writer.write_u32::<LittleEndian>(self.detail_vert_count)?;
        writer.write_u32::<LittleEndian>(self.detail_tri_count)?;
        writer.write_u32::<LittleEndian>(self.bv_node_count)?;
        writer.write_u32::<LittleEndian>(self.off_mesh_con_count)?;
        writer.write_u32::<LittleEndian>(self.off_mesh_base)?;
        writer.write_f32::<LittleEndian>(self.walkable_height)?;
        writer.write_f32::<LittleEndian>(self.walkable_radius)?;
        writer.write_f32::<LittleEndian>(self.walkable_climb)?;
        write_vec3(writer, &self.bmin)?;
        write_vec3(writer, &self.bmax)?;
        writer.write_f32::<LittleEndian>(self.bv_quant_factor)?;
        let o = &self.offsets;
        for offset in [
            o.polys,
            o.verts,
            o.detail_meshes,
            o.detail_verts,
            o.detail_tris,
            o.bv_tree,
            o.off_mesh_cons,
        ] {
            writer.write_u32::<LittleEndian>(offset)?;
        }
        Ok(())
    }
}

/// Decoded contents of a tile blob
#[derive(Debug, Clone, Default, PartialEq)]
pub struct TileData {
    pub header: TileHeader,
    pub polys: Vec<Poly>,
    pub verts: Vec<[f32; 3]>,
    pub detail_meshes: Vec<PolyDetail>,
    pub detail_verts: Vec<[f32; 3]>,
    pub detail_tris: Vec<[u8; 4]>,
    pub bv_tree: Vec<BVNode>,
    pub off_mesh_cons: Vec<OffMeshConnection>,
}

fn read_vec3<R: Read>(reader: &mut R) -> Result<[f32; 3]> {
    Ok([
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
        reader.read_f32::<LittleEndian>()?,
    ])
}

fn write_vec3<W: Write>(writer: &mut W, v: &[f32; 3]) -> Result<()> {
    writer.write_f32::<LittleEndian>(v[0])?;
    writer.write_f32::<LittleEndian>(v[1])?;
    writer.write_f32::<LittleEndian>(v[2])?;
    Ok(())
}

fn read_poly<R: Read>(reader: &mut R) -> Result<Poly> {
    let mut poly = Poly::default();
    for v in &mut poly.verts {
        *v = reader.read_u16::<LittleEndian>()?;
    }
    for n in &mut poly.neis {
        *n = reader.read_u16::<LittleEndian>()?;
    }
    poly.flags = PolyFlags::from_bits_retain(reader.read_u16::<LittleEndian>()?);
    poly.vert_count = reader.read_u8()?;
    let area_and_type = reader.read_u8()?;
    poly.area = area_and_type & 0x3f;
    poly.poly_type = PolyType::from_bits(area_and_type >> 6).ok_or(Status::DataCorrupted)?;
    Ok(poly)
}

fn write_poly<W: Write>(writer: &mut W, poly: &Poly) -> Result<()> {
    for &v in &poly.verts {
        writer.write_u16::<LittleEndian>(v)?;
    }
    for &n in &poly.neis {
        writer.write_u16::<LittleEndian>(n)?;
    }
    writer.write_u16::<LittleEndian>(poly.flags.bits())?;
    writer.write_u8(poly.vert_count)?;
    writer.write_u8((poly.area & 0x3f) | ((poly.poly_type as u8) << 6))?;
    Ok(())
}

fn read_detail<R: Read>(reader: &mut R) -> Result<PolyDetail> {
    let detail = PolyDetail {
        vert_base: reader.read_u32::<LittleEndian>()?,
        tri_base: reader.read_u32::<LittleEndian>()?,
        vert_count: reader.read_u8()?,
        tri_count: reader.read_u8()?,
    };
    // Padding
    reader.read_u16::<LittleEndian>()?;
    Ok(detail)
}

fn write_detail<W: Write>(writer: &mut W, detail: &PolyDetail) -> Result<()> {
    writer.write_u32::<LittleEndian>(detail.vert_base)?;
    writer.write_u32::<LittleEndian>(detail.tri_base)?;
    writer.write_u8(detail.vert_count)?;
    writer.write_u8(detail.tri_count)?;
    writer.write_u16::<LittleEndian>(0)?;
    Ok(())
}

fn read_bv_node<R: Read>(reader: &mut R) -> Result<BVNode> {
    let mut node = BVNode::default();
    for v in &mut node.bmin {
        *v = reader.read_u16::<LittleEndian>()?;
    }
    for v in &mut node.bmax {
        *v = reader.read_u16::<LittleEndian>()?;
    }
    node.i = reader.read_i32::<LittleEndian>()?;
    Ok(node)
}

fn write_bv_node<W: Write>(writer: &mut W, node: &BVNode) -> Result<()> {
    for &v in node.bmin.iter().chain(node.bmax.iter()) {
        writer.write_u16::<LittleEndian>(v)?;
    }
    writer.write_i32::<LittleEndian>(node.i)?;
    Ok(())
}

fn read_off_mesh_con<R: Read>(reader: &mut R) -> Result<OffMeshConnection> {
    let mut con = OffMeshConnection::default();
    for p in &mut con.pos {
        *p = reader.read_f32::<LittleEndian>()?;
    }
    con.rad = reader.read_f32::<LittleEndian>()?;
    con.poly = reader.read_u16::<LittleEndian>()?;
    con.flags = reader.read_u8()?;
    // Padding
    reader.read_u8()?;
    Ok(con)
}

fn write_off_mesh_con<W: Write>(writer: &mut W, con: &OffMeshConnection) -> Result<()> {
    for &p in &con.pos {
        writer.write_f32::<LittleEndian>(p)?;
    }
    writer.write_f32::<LittleEndian>(con.rad)?;
    writer.write_u16::<LittleEndian>(con.poly)?;
    writer.write_u8(con.flags)?;
    writer.write_u8(0)?;
    Ok(())
}

fn count_u32(len: usize) -> Result<u32> {
    u32::try_from(len).map_err(|_| Status::InvalidParam)
}

/// Pads the writer with zeroes up to `offset`
fn pad_to(cursor: &mut Cursor<Vec<u8>>, offset: usize) -> Result<()> {
    while (cursor.position() as usize) < offset {
        cursor.write_u8(0)?;
    }
    Ok(())
}

/// Serializes a tile
///
/// Counts and section offsets are derived from the section vectors; the other
/// header fields are written as given, with the current magic and version.
pub fn write_tile_data(data: &TileData) -> Result<Vec<u8>> {
    let mut header = data.header.clone();
    header.magic = NAVMESH_MAGIC;
    header.version = NAVMESH_VERSION;
    header.poly_count = count_u32(data.polys.len())?;
    header.vert_count = count_u32(data.verts.len())?;
    header.detail_mesh_count = count_u32(data.detail_meshes.len())?;
    header.detail_vert_count = count_u32(data.detail_verts.len())?;
    header.detail_tri_count = count_u32(data.detail_tris.len())?;
    header.bv_node_count = count_u32(data.bv_tree.len())?;
    header.off_mesh_con_count = count_u32(data.off_mesh_cons.len())?;

    let mut offset = align4(HEADER_SIZE);
    let mut section = |count: usize, size: usize| -> Result<u32> {
        let start = offset;
        offset = align4(offset + count * size);
        count_u32(start)
    };
    header.offsets = SectionOffsets {
        polys: section(data.polys.len(), POLY_SIZE)?,
        verts: section(data.verts.len(), VERT_SIZE)?,
        detail_meshes: section(data.detail_meshes.len(), DETAIL_MESH_SIZE)?,
        detail_verts: section(data.detail_verts.len(), VERT_SIZE)?,
        detail_tris: section(data.detail_tris.len(), DETAIL_TRI_SIZE)?,
        bv_tree: section(data.bv_tree.len(), BV_NODE_SIZE)?,
        off_mesh_cons: section(data.off_mesh_cons.len(), OFF_MESH_CON_SIZE)?,
    };
    let total = offset;

    let mut cursor = Cursor::new(Vec::with_capacity(total));
    header.write_to(&mut cursor)?;

    let o = header.offsets;
    pad_to(&mut cursor, o.polys as usize)?;
    for poly in &data.polys {
        write_poly(&mut cursor, poly)?;
    }
    pad_to(&mut cursor, o.verts as usize)?;
    for v in &data.verts {
        write_vec3(&mut cursor, v)?;
    }
    pad_to(&mut cursor, o.detail_meshes as usize)?;
    for detail in &data.detail_meshes {
        write_detail(&mut cursor, detail)?;
    }
    pad_to(&mut cursor, o.detail_verts as usize)?;
    for v in &data.detail_verts {
        write_vec3(&mut cursor, v)?;
    }
    pad_to(&mut cursor, o.detail_tris as usize)?;
    for tri in &data.detail_tris {
        cursor.write_all(tri)?;
    }
    pad_to(&mut cursor, o.bv_tree as usize)?;
    for node in &data.bv_tree {
        write_bv_node(&mut cursor, node)?;
    }
    pad_to(&mut cursor, o.off_mesh_cons as usize)?;
    for con in &data.off_mesh_cons {
        write_off_mesh_con(&mut cursor, con)?;
    }
    pad_to(&mut cursor, total)?;

    Ok(cursor.into_inner())
}

/// Reads and checks the header of a tile blob
pub fn read_header(data: &[u8]) -> Result<TileHeader> {
    if data.len() < 8 {
        return Err(Status::DataCorrupted);
    }
    let mut cursor = Cursor::new(data);
    let magic = cursor.read_u32::<LittleEndian>()?;
    if magic != NAVMESH_MAGIC {
        return Err(Status::WrongMagic);
    }
    let version = cursor.read_u32::<LittleEndian>()?;
    if version != NAVMESH_VERSION {
        return Err(Status::WrongVersion);
    }
    if data.len() < HEADER_SIZE {
        return Err(Status::DataCorrupted);
    }
    cursor.set_position(0);
    TileHeader::read_from(&mut cursor)
}

/// Positions a cursor on a section after checking that it fits in the blob
fn section_cursor<'a>(data: &'a [u8], offset: u32, count: u32, size: usize) -> Result<Cursor<&'a [u8]>> {
    let start = offset as usize;
    let end = (count as usize)
        .checked_mul(size)
        .and_then(|len| start.checked_add(len))
        .ok_or(Status::DataCorrupted)?;
    if count > 0 && (start < HEADER_SIZE || start % 4 != 0 || end > data.len()) {
        return Err(Status::DataCorrupted);
    }
    let mut cursor = Cursor::new(data);
    cursor.set_position(start as u64);
    Ok(cursor)
}

fn read_section<T>(
    data: &[u8],
    offset: u32,
    count: u32,
    size: usize,
    read: impl Fn(&mut Cursor<&[u8]>) -> Result<T>,
) -> Result<Vec<T>> {
    let mut cursor = section_cursor(data, offset, count, size)?;
    (0..count).map(|_| read(&mut cursor)).collect()
}

/// Decodes a tile blob and validates its internal references
///
/// Fails with [`Status::WrongMagic`] or [`Status::WrongVersion`] on a foreign
/// blob and with [`Status::DataCorrupted`] when a section is out of bounds or
/// an index points outside its target array.
pub fn parse_tile(data: &[u8]) -> Result<TileData> {
    let header = read_header(data)?;
    let o = header.offsets;

    let tile = TileData {
        polys: read_section(data, o.polys, header.poly_count, POLY_SIZE, |c| read_poly(c))?,
        verts: read_section(data, o.verts, header.vert_count, VERT_SIZE, |c| read_vec3(c))?,
        detail_meshes: read_section(
            data,
            o.detail_meshes,
            header.detail_mesh_count,
            DETAIL_MESH_SIZE,
            |c| read_detail(c),
        )?,
        detail_verts: read_section(data, o.detail_verts, header.detail_vert_count, VERT_SIZE, |c| {
            read_vec3(c)
        })?,
        detail_tris: read_section(data, o.detail_tris, header.detail_tri_count, DETAIL_TRI_SIZE, |c| {
            let mut tri = [0u8; 4];
            c.read_exact(&mut tri)?;
            Ok(tri)
        })?,
        bv_tree: read_section(data, o.bv_tree, header.bv_node_count, BV_NODE_SIZE, |c| {
            read_bv_node(c)
        })?,
        off_mesh_cons: read_section(
            data,
            o.off_mesh_cons,
            header.off_mesh_con_count,
            OFF_MESH_CON_SIZE,
            |c| read_off_mesh_con(c),
        )?,
        header,
    };

    validate(&tile)?;
    Ok(tile)
}

fn validate(tile: &TileData) -> Result<()> {
    let header = &tile.header;
    let poly_count = tile.polys.len();
    let off_mesh_base = header.off_mesh_base as usize;

    if off_mesh_base + tile.off_mesh_cons.len() != poly_count
        || tile.detail_meshes.len() != off_mesh_base
    {
        return Err(Status::DataCorrupted);
    }

    for (i, poly) in tile.polys.iter().enumerate() {
        let nv = poly.vert_count as usize;
        let expected_type = if i < off_mesh_base {
            PolyType::Ground
        } else {
            PolyType::OffMeshConnection
        };
        if poly.poly_type != expected_type || nv > MAX_VERTS_PER_POLY {
            return Err(Status::DataCorrupted);
        }
        match poly.poly_type {
            PolyType::Ground if nv < 3 => return Err(Status::DataCorrupted),
            PolyType::OffMeshConnection if nv != 2 => return Err(Status::DataCorrupted),
            _ => {}
        }
        if poly.verts[..nv].iter().any(|&v| v as usize >= tile.verts.len()) {
            return Err(Status::DataCorrupted);
        }
        // Off-mesh connections are only entered through their endpoint links
        for &nei in &poly.neis[..nv] {
            let bad = if expected_type == PolyType::OffMeshConnection {
                nei != 0
            } else if nei & EXT_LINK != 0 {
                nei & !EXT_LINK > 3
            } else {
                nei as usize > off_mesh_base
            };
            if bad {
                return Err(Status::DataCorrupted);
            }
        }
    }

    for (poly, detail) in tile.polys.iter().zip(&tile.detail_meshes) {
        let vert_end = detail.vert_base as usize + detail.vert_count as usize;
        let tri_end = detail.tri_base as usize + detail.tri_count as usize;
        if vert_end > tile.detail_verts.len() || tri_end > tile.detail_tris.len() {
            return Err(Status::DataCorrupted);
        }
        let nverts = poly.vert_count as usize + detail.vert_count as usize;
        let tris = &tile.detail_tris[detail.tri_base as usize..tri_end];
        if tris.iter().any(|t| t[..3].iter().any(|&v| v as usize >= nverts)) {
            return Err(Status::DataCorrupted);
        }
    }

    let node_count = tile.bv_tree.len();
    for (i, node) in tile.bv_tree.iter().enumerate() {
        let ok = if node.i >= 0 {
            (node.i as usize) < off_mesh_base
        } else {
            let escape = node.i.unsigned_abs() as usize;
            i + escape <= node_count
        };
        if !ok {
            return Err(Status::DataCorrupted);
        }
    }

    for (k, con) in tile.off_mesh_cons.iter().enumerate() {
        if con.poly as usize != off_mesh_base + k {
            return Err(Status::DataCorrupted);
        }
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_tile() -> TileData {
        let mut poly = Poly::default();
        poly.verts[..4].copy_from_slice(&[0, 1, 2, 3]);
        poly.neis[..4].copy_from_slice(&[EXT_LINK | 2, 0, EXT_LINK, 0]);
        poly.vert_count = 4;
        poly.flags = PolyFlags::WALK;
        poly.area = 5;

        let mut link_poly = Poly::default();
        link_poly.verts[..2].copy_from_slice(&[4, 5]);
        link_poly.vert_count = 2;
        link_poly.flags = PolyFlags::JUMP;
        link_poly.poly_type = PolyType::OffMeshConnection;

        TileData {
            header: TileHeader {
                max_link_count: 12,
                off_mesh_base: 1,
                walkable_height: 2.0,
                walkable_radius: 0.5,
                walkable_climb: 0.4,
                bmin: [0.0, 0.0, 0.0],
                bmax: [4.0, 1.0, 4.0],
                bv_quant_factor: 2.0,
                ..TileHeader::default()
            },
            polys: vec![poly, link_poly],
            verts: vec![
                [0.0, 0.0, 0.0],
                [0.0, 0.0, 4.0],
                [4.0, 0.0, 4.0],
                [4.0, 0.0, 0.0],
                [1.0, 0.0, 1.0],
                [3.0, 0.0, 3.0],
            ],
            detail_meshes: vec![PolyDetail {
                vert_base: 0,
                tri_base: 0,
                vert_count: 1,
                tri_count: 2,
            }],
            detail_verts: vec![[2.0, 0.5, 2.0]],
            detail_tris: vec![[0, 1, 4, 0], [1, 2, 3, 0]],
            bv_tree: vec![BVNode {
                bmin: [0, 0, 0],
                bmax: [8, 2, 8],
                i: 0,
            }],
            off_mesh_cons: vec![OffMeshConnection {
                pos: [1.0, 0.0, 1.0, 3.0, 0.0, 3.0],
                rad: 0.5,
                poly: 1,
                flags: 1,
            }],
        }
    }

    #[test]
    fn test_header_size() -> Result<()> {
        let mut buf = Vec::new();
        TileHeader::default().write_to(&mut buf)?;
        assert_eq!(buf.len(), HEADER_SIZE);
        Ok(())
    }

    #[test]
    fn test_sections_are_aligned_and_counted() -> Result<()> {
        let blob = write_tile_data(&sample_tile())?;
        let header = read_header(&blob)?;
        assert_eq!(header.poly_count, 2);
        assert_eq!(header.vert_count, 6);
        assert_eq!(header.detail_tri_count, 2);
        assert_eq!(header.off_mesh_con_count, 1);
        let o = header.offsets;
        for offset in [o.polys, o.verts, o.detail_meshes, o.detail_verts, o.detail_tris, o.bv_tree] {
            assert_eq!(offset % 4, 0);
        }
        assert_eq!(blob.len() % 4, 0);
        Ok(())
    }

    #[test]
    fn test_parse_restores_tile() -> Result<()> {
        let tile = sample_tile();
        let parsed = parse_tile(&write_tile_data(&tile)?)?;
        assert_eq!(parsed.polys, tile.polys);
        assert_eq!(parsed.off_mesh_cons, tile.off_mesh_cons);
        assert_eq!(parsed.bv_tree, tile.bv_tree);
        assert_eq!(parsed.header.walkable_climb, 0.4);
        Ok(())
    }

    #[test]
    fn test_rejects_foreign_blobs() -> Result<()> {
        let mut blob = write_tile_data(&sample_tile())?;
        blob[4] = blob[4].wrapping_add(1);
        assert_eq!(parse_tile(&blob).err(), Some(Status::WrongVersion));
        blob[0] = 0;
        assert_eq!(parse_tile(&blob).err(), Some(Status::WrongMagic));
        assert_eq!(read_header(&[1, 2, 3]).err(), Some(Status::DataCorrupted));
        Ok(())
    }

    #[test]
    fn test_rejects_truncated_blob() -> Result<()> {
        let blob = write_tile_data(&sample_tile())?;
        assert_eq!(parse_tile(&blob[..blob.len() - 8]).err(), Some(Status::DataCorrupted));
        assert_eq!(parse_tile(&blob[..HEADER_SIZE - 1]).err(), Some(Status::DataCorrupted));
        Ok(())
    }

    #[test]
    fn test_rejects_bad_indices() -> Result<()> {
        let mut tile = sample_tile();
        tile.detail_tris[0][2] = 9;
        assert_eq!(
            parse_tile(&write_tile_data(&tile)?).err(),
            Some(Status::DataCorrupted)
        );

        let mut tile = sample_tile();
        tile.polys[0].verts[1] = 40;
        assert_eq!(
            parse_tile(&write_tile_data(&tile)?).err(),
            Some(Status::DataCorrupted)
        );

        let mut tile = sample_tile();
        tile.bv_tree[0].i = -3;
        assert_eq!(
            parse_tile(&write_tile_data(&tile)?).err(),
            Some(Status::DataCorrupted)
        );
        Ok(())
    }
}
