//! Tiled navigation mesh and query engine
//!
//! A navigation mesh is split into fixed-size tiles that can be streamed in and
//! out at runtime. Polygons are addressed through [`PolyRef`] handles that stay
//! valid across tile churn until the owning tile is removed. Queries run through
//! a [`NavMeshQuery`], which owns its own search state so several of them can
//! share one mesh across threads.

pub mod binary_format;
pub mod nav_common;
pub mod nav_mesh;
pub mod nav_mesh_builder;
mod nav_mesh_links;
pub mod nav_mesh_query;
pub mod node_pool;
pub mod poly_query;
pub mod poly_ref;
pub mod raycast_hit;
mod status;
mod straight_path;

#[cfg(test)]
mod link_builder_tests;
#[cfg(test)]
mod test_mesh_helpers;

pub use binary_format::{NAVMESH_MAGIC, NAVMESH_VERSION, TileData, TileHeader};
pub use nav_mesh::{BVNode, Link, MeshTile, NavMesh, OffMeshConnection, Poly, PolyDetail};
pub use nav_mesh_builder::{NavMeshBuilder, NavMeshCreateParams};
pub use nav_mesh_query::{NavMeshQuery, PolysAround, WallHit};
pub use poly_query::{CollectPolysQuery, FindNearestPolyQuery, PolyQuery};
pub use poly_ref::RefCodec;
pub use raycast_hit::RaycastHit;
pub use status::{Result, Status};
pub use straight_path::StraightPath;

use bitflags::bitflags;

/// Maximum number of vertices per navigation polygon
pub const MAX_VERTS_PER_POLY: usize = 6;

/// Maximum number of area types a polygon can be tagged with
pub const MAX_AREAS: usize = 64;

/// Neighbor flag marking an edge that sits on a tile border
pub const EXT_LINK: u16 = 0x8000;

/// Link side value used for links that stay inside a tile
pub const LINK_INTERNAL: u8 = 0xff;

/// Builder neighbor value for an edge without neighbor
pub const MESH_NULL_IDX: u16 = 0xffff;

/// Handle to a polygon in a [`NavMesh`]
///
/// The value packs salt, tile index and polygon index. Zero is the null
/// reference.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct PolyRef(u32);

impl PolyRef {
    /// The null reference
    pub const NULL: PolyRef = PolyRef(0);

    /// Wraps a raw reference value
    pub const fn new(id: u32) -> Self {
        Self(id)
    }

    /// Returns the raw reference value
    pub const fn id(&self) -> u32 {
        self.0
    }

    /// Returns true unless this is the null reference
    pub const fn is_valid(&self) -> bool {
        self.0 != 0
    }
}

impl std::fmt::Display for PolyRef {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:#010x}", self.0)
    }
}

bitflags! {
    /// User flags attached to polygons, tested by [`QueryFilter`]
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(
        feature = "serialization",
        derive(serde::Serialize, serde::Deserialize)
    )]
    pub struct PolyFlags: u16 {
        /// Ground that can be walked on
        const WALK = 0x01;
        /// Water that can be swum through
        const SWIM = 0x02;
        /// Doors
        const DOOR = 0x04;
        /// Jumps and other off-mesh traversals
        const JUMP = 0x08;
        /// Disabled polygons
        const DISABLED = 0x10;
        /// All flags
        const ALL = 0xffff;
    }
}

bitflags! {
    /// Flags describing each vertex of a straight path
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    #[cfg_attr(
        feature = "serialization",
        derive(serde::Serialize, serde::Deserialize)
    )]
    pub struct StraightPathFlags: u8 {
        /// The vertex is the start position
        const START = 0x01;
        /// The vertex is the end position
        const END = 0x02;
        /// The vertex is the start of an off-mesh connection
        const OFFMESH_CONNECTION = 0x04;
    }
}

bitflags! {
    /// Flags passed when attaching tile data to a mesh
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TileFlags: u8 {
        /// The mesh owns the tile data and releases it when the tile is removed
        const FREE_DATA = 0x01;
    }
}

/// Polygon type
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub enum PolyType {
    /// Regular polygon on the walkable surface
    #[default]
    Ground = 0,
    /// Two-vertex polygon standing for an off-mesh connection
    OffMeshConnection = 1,
}

impl PolyType {
    pub(crate) fn from_bits(bits: u8) -> Option<Self> {
        match bits {
            0 => Some(PolyType::Ground),
            1 => Some(PolyType::OffMeshConnection),
            _ => None,
        }
    }
}

/// Configuration of a tiled navigation mesh
#[derive(Debug, Clone, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct NavMeshParams {
    /// World position of the corner of tile (0, 0)
    pub origin: [f32; 3],
    /// Tile extent along x
    pub tile_width: f32,
    /// Tile extent along z
    pub tile_height: f32,
    /// Maximum number of tiles, rounded up to a power of two for references
    pub max_tiles: usize,
    /// Maximum number of polygons per tile, rounded up to a power of two for references
    pub max_polys_per_tile: usize,
    /// Default search node capacity for queries created on this mesh
    pub max_nodes: usize,
}

impl Default for NavMeshParams {
    fn default() -> Self {
        Self {
            origin: [0.0; 3],
            tile_width: 32.0,
            tile_height: 32.0,
            max_tiles: 64,
            max_polys_per_tile: 1024,
            max_nodes: 2048,
        }
    }
}

/// Polygon filtering and traversal costs used by the queries
#[derive(Debug, Clone, PartialEq)]
pub struct QueryFilter {
    /// Cost multiplier for each area type
    pub area_cost: [f32; MAX_AREAS],
    /// Polygons must have at least one of these flags
    pub include_flags: PolyFlags,
    /// Polygons must have none of these flags
    pub exclude_flags: PolyFlags,
}

impl Default for QueryFilter {
    fn default() -> Self {
        Self {
            area_cost: [1.0; MAX_AREAS],
            include_flags: PolyFlags::ALL,
            exclude_flags: PolyFlags::empty(),
        }
    }
}

impl QueryFilter {
    /// Creates a filter that passes every polygon at unit cost
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns true if the polygon may be visited
    #[inline]
    pub fn pass_filter(&self, poly: &Poly) -> bool {
        poly.flags.intersects(self.include_flags) && !poly.flags.intersects(self.exclude_flags)
    }

    /// Cost multiplier of an area, 1.0 for unknown areas
    #[inline]
    pub fn area_cost(&self, area: u8) -> f32 {
        self.area_cost.get(area as usize).copied().unwrap_or(1.0)
    }

    /// Sets the cost multiplier of an area; out of range areas are ignored
    pub fn set_area_cost(&mut self, area: u8, cost: f32) {
        if let Some(slot) = self.area_cost.get_mut(area as usize) {
            *slot = cost;
        }
    }

    /// Cost of moving between two points across a polygon
    #[inline]
    pub fn cost(&self, pa: &[f32; 3], pb: &[f32; 3], poly: &Poly) -> f32 {
        nav_common::vdist(pa, pb) * self.area_cost(poly.area)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_poly_ref_null() {
        assert!(!PolyRef::NULL.is_valid());
        assert!(PolyRef::new(0x1234).is_valid());
        assert_eq!(format!("{}", PolyRef::new(0x1234)), "0x00001234");
    }

    #[test]
    fn test_query_filter_flags() {
        let mut poly = Poly::default();
        poly.flags = PolyFlags::WALK | PolyFlags::DOOR;

        let mut filter = QueryFilter::new();
        assert!(filter.pass_filter(&poly));

        filter.exclude_flags = PolyFlags::DOOR;
        assert!(!filter.pass_filter(&poly));

        filter.exclude_flags = PolyFlags::empty();
        filter.include_flags = PolyFlags::SWIM;
        assert!(!filter.pass_filter(&poly));
    }

    #[test]
    fn test_query_filter_area_cost() {
        let mut filter = QueryFilter::new();
        filter.set_area_cost(3, 10.0);
        filter.set_area_cost(200, 5.0);
        assert_eq!(filter.area_cost(3), 10.0);
        assert_eq!(filter.area_cost(0), 1.0);
        assert_eq!(filter.area_cost(200), 1.0);

        let mut poly = Poly::default();
        poly.area = 3;
        let cost = filter.cost(&[0.0, 0.0, 0.0], &[3.0, 0.0, 4.0], &poly);
        assert!((cost - 50.0).abs() < 1e-4);
    }
}
