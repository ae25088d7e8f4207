//! Spatial polygon queries
//!
//! Box queries walk the BV-tree of every tile overlapping the query box and hand
//! the matching polygons to a [`PolyQuery`] in batches. Closest-point and height
//! queries use the detail triangulation of a polygon.

use super::nav_common::{
    closest_height_point_triangle, closest_pt_point_triangle, dist_pt_seg_sqr_2d,
    distance_pt_poly_edges_sqr, overlap_bounds, overlap_quant_bounds, point_in_polygon, vadd,
    vdist_sqr, vlerp, vsub,
};
use super::nav_mesh::{MeshTile, NavMesh, Poly};
use super::poly_ref::RefCodec;
use super::{PolyRef, QueryFilter, Result, Status};

const BATCH_SIZE: usize = 32;

/// Receives the polygons touched by [`NavMesh::query_polygons_with`]
///
/// Called once per batch of polygons, possibly several times per tile.
pub trait PolyQuery {
    fn process(&mut self, tile: &MeshTile, polys: &[&Poly], refs: &[PolyRef]);
}

/// Collects polygon references up to a maximum count
pub struct CollectPolysQuery {
    polys: Vec<PolyRef>,
    max_polys: usize,
    overflow: bool,
}

impl CollectPolysQuery {
    pub fn new(max_polys: usize) -> Self {
        Self {
            polys: Vec::with_capacity(max_polys.min(1024)),
            max_polys,
            overflow: false,
        }
    }

    pub fn polys(&self) -> &[PolyRef] {
        &self.polys
    }

    pub fn into_polys(self) -> Vec<PolyRef> {
        self.polys
    }

    /// Returns true if more polygons matched than could be collected
    pub fn overflow(&self) -> bool {
        self.overflow
    }
}

impl PolyQuery for CollectPolysQuery {
    fn process(&mut self, _tile: &MeshTile, _polys: &[&Poly], refs: &[PolyRef]) {
        let remaining = self.max_polys.saturating_sub(self.polys.len());
        if remaining < refs.len() {
            self.overflow = true;
            self.polys.extend_from_slice(&refs[..remaining]);
        } else {
            self.polys.extend_from_slice(refs);
        }
    }
}

/// Finds the polygon closest to a point
///
/// A point above a polygon within the tile climb height counts as distance
/// zero, so the surface under the point wins over a closer wall top.
pub struct FindNearestPolyQuery<'a> {
    nav_mesh: &'a NavMesh,
    center: [f32; 3],
    nearest_distance_sqr: f32,
    nearest_ref: PolyRef,
    nearest_point: [f32; 3],
}

impl<'a> FindNearestPolyQuery<'a> {
    pub fn new(nav_mesh: &'a NavMesh, center: &[f32; 3]) -> Self {
        Self {
            nav_mesh,
            center: *center,
            nearest_distance_sqr: f32::MAX,
            nearest_ref: PolyRef::NULL,
            nearest_point: *center,
        }
    }

    pub fn nearest_ref(&self) -> PolyRef {
        self.nearest_ref
    }

    pub fn nearest_point(&self) -> &[f32; 3] {
        &self.nearest_point
    }
}

impl PolyQuery for FindNearestPolyQuery<'_> {
    fn process(&mut self, tile: &MeshTile, _polys: &[&Poly], refs: &[PolyRef]) {
        let codec = self.nav_mesh.codec();
        let climb = tile.walkable_climb();
        for &reference in refs {
            let poly_index = codec.decode_poly(reference) as usize;
            let (closest, over_poly) = closest_point_on_poly_in_tile(tile, poly_index, &self.center);
            let d = nearest_distance_sqr(&self.center, &closest, over_poly, climb);
            if d < self.nearest_distance_sqr {
                self.nearest_distance_sqr = d;
                self.nearest_ref = reference;
                self.nearest_point = closest;
            }
        }
    }
}

fn nearest_distance_sqr(center: &[f32; 3], closest: &[f32; 3], over_poly: bool, climb: f32) -> f32 {
    if over_poly {
        let dy = (center[1] - closest[1]).abs() - climb;
        if dy > 0.0 {
            dy * dy
        } else {
            0.0
        }
    } else {
        vdist_sqr(center, closest)
    }
}

/// Ground polygons of a tile overlapping a box, optionally filtered
pub(crate) fn query_polygons_in_tile(
    tile: &MeshTile,
    qmin: &[f32; 3],
    qmax: &[f32; 3],
    filter: Option<&QueryFilter>,
) -> Vec<usize> {
    let Some(header) = tile.header.as_ref() else {
        return Vec::new();
    };
    let passes = |poly: &Poly| filter.map_or(true, |f| f.pass_filter(poly));
    let mut result = Vec::new();

    if !tile.bv_tree.is_empty() {
        let tbmin = &header.bmin;
        let tbmax = &header.bmax;
        let qfac = header.bv_quant_factor;

        let mut bmin = [0u16; 3];
        let mut bmax = [0u16; 3];
        for axis in 0..3 {
            let lo = qmin[axis].clamp(tbmin[axis], tbmax[axis]) - tbmin[axis];
            let hi = qmax[axis].clamp(tbmin[axis], tbmax[axis]) - tbmin[axis];
            bmin[axis] = ((qfac * lo) as u16) & 0xfffe;
            bmax[axis] = ((qfac * hi + 1.0) as u16) | 1;
        }

        let mut node = 0;
        while let Some(n) = tile.bv_tree.get(node) {
            let overlap = overlap_quant_bounds(&bmin, &bmax, &n.bmin, &n.bmax);
            if n.is_leaf() && overlap {
                let index = n.i as usize;
                if tile.polys.get(index).is_some_and(|p| passes(p)) {
                    result.push(index);
                }
            }
            if overlap || n.is_leaf() {
                node += 1;
            } else {
                node += n.i.unsigned_abs() as usize;
            }
        }
        return result;
    }

    for (index, poly) in tile.polys.iter().enumerate() {
        if poly.is_off_mesh_connection() || !passes(poly) {
            continue;
        }
        let verts = tile.poly_verts(poly);
        let mut pmin = verts[0];
        let mut pmax = verts[0];
        for v in &verts[1..] {
            for axis in 0..3 {
                pmin[axis] = pmin[axis].min(v[axis]);
                pmax[axis] = pmax[axis].max(v[axis]);
            }
        }
        if overlap_bounds(qmin, qmax, &pmin, &pmax) {
            result.push(index);
        }
    }
    result
}

/// Height of the detail surface at `pos`, if `pos` lies on the polygon
pub(crate) fn poly_height_in_tile(tile: &MeshTile, poly_index: usize, pos: &[f32; 3]) -> Option<f32> {
    let poly = tile.polys.get(poly_index)?;
    let verts = tile.poly_verts(poly);

    if poly.is_off_mesh_connection() {
        let (_, t) = dist_pt_seg_sqr_2d(pos, &verts[0], &verts[1]);
        return Some(verts[0][1] + (verts[1][1] - verts[0][1]) * t);
    }

    if !point_in_polygon(pos, &verts) {
        return None;
    }

    let tris = tile.detail_triangles(poly_index);
    if let Some(h) = tris
        .iter()
        .find_map(|[a, b, c]| closest_height_point_triangle(pos, a, b, c))
    {
        return Some(h);
    }

    // On a detail edge the barycentric test can miss every triangle
    nearest_on_triangles(&tris, pos).map(|p| p[1])
}

fn nearest_on_triangles(tris: &[[[f32; 3]; 3]], pos: &[f32; 3]) -> Option<[f32; 3]> {
    tris.iter()
        .map(|[a, b, c]| closest_pt_point_triangle(pos, a, b, c))
        .min_by(|p, q| vdist_sqr(pos, p).total_cmp(&vdist_sqr(pos, q)))
}

/// Closest point on a polygon and whether `pos` lies above or below it
pub(crate) fn closest_point_on_poly_in_tile(tile: &MeshTile, poly_index: usize, pos: &[f32; 3]) -> ([f32; 3], bool) {
    let Some(poly) = tile.polys.get(poly_index) else {
        return (*pos, false);
    };
    let verts = tile.poly_verts(poly);

    if poly.is_off_mesh_connection() {
        let (_, t) = dist_pt_seg_sqr_2d(pos, &verts[0], &verts[1]);
        return (vlerp(&verts[0], &verts[1], t), false);
    }

    if let Some(h) = poly_height_in_tile(tile, poly_index, pos) {
        return ([pos[0], h, pos[2]], true);
    }

    let mut closest = closest_point_on_boundary(pos, &verts);
    let tris = tile.detail_triangles(poly_index);
    if let Some(h) = tris
        .iter()
        .find_map(|[a, b, c]| closest_height_point_triangle(&closest, a, b, c))
    {
        closest[1] = h;
    } else if let Some(p) = nearest_on_triangles(&tris, &closest) {
        closest[1] = p[1];
    }
    (closest, false)
}

/// `pos` if it lies inside the polygon on the xz-plane, else the nearest point
/// on its boundary
fn closest_point_on_boundary(pos: &[f32; 3], verts: &[[f32; 3]]) -> [f32; 3] {
    let (inside, edge_dist, edge_t) = distance_pt_poly_edges_sqr(pos, verts);
    if inside {
        return *pos;
    }
    let imin = edge_dist
        .iter()
        .enumerate()
        .min_by(|a, b| a.1.total_cmp(b.1))
        .map_or(0, |(i, _)| i);
    let va = &verts[imin];
    let vb = &verts[(imin + 1) % verts.len()];
    vlerp(va, vb, edge_t[imin])
}

/// Nearest ground polygon of one tile, ignoring filters
pub(crate) fn find_nearest_poly_in_tile(
    tile: &MeshTile,
    codec: &RefCodec,
    center: &[f32; 3],
    extents: &[f32; 3],
) -> Option<(PolyRef, [f32; 3])> {
    let qmin = vsub(center, extents);
    let qmax = vadd(center, extents);
    let climb = tile.walkable_climb();

    let mut nearest: Option<(PolyRef, [f32; 3])> = None;
    let mut nearest_d = f32::MAX;
    for index in query_polygons_in_tile(tile, &qmin, &qmax, None) {
        let (closest, over_poly) = closest_point_on_poly_in_tile(tile, index, center);
        let d = nearest_distance_sqr(center, &closest, over_poly, climb);
        if d < nearest_d {
            nearest_d = d;
            nearest = Some((codec.encode(tile.salt, tile.index() as u32, index as u32), closest));
        }
    }
    nearest
}

fn check_query_box(center: &[f32; 3], extents: &[f32; 3]) -> Result<()> {
    if center.iter().chain(extents.iter()).any(|v| !v.is_finite()) || extents.iter().any(|&e| e < 0.0) {
        return Err(Status::InvalidParam);
    }
    Ok(())
}

impl NavMesh {
    /// Runs a box query over every tile overlapping the box
    pub fn query_polygons_with<Q: PolyQuery>(
        &self,
        center: &[f32; 3],
        extents: &[f32; 3],
        filter: &QueryFilter,
        query: &mut Q,
    ) -> Result<()> {
        check_query_box(center, extents)?;
        let qmin = vsub(center, extents);
        let qmax = vadd(center, extents);

        for tile in self.tiles() {
            let Some(header) = tile.header.as_ref() else {
                continue;
            };
            if !overlap_bounds(&qmin, &qmax, &header.bmin, &header.bmax) {
                continue;
            }
            let found = query_polygons_in_tile(tile, &qmin, &qmax, Some(filter));
            for batch in found.chunks(BATCH_SIZE) {
                let polys: Vec<&Poly> = batch.iter().map(|&i| &tile.polys[i]).collect();
                let refs: Vec<PolyRef> = batch.iter().map(|&i| self.poly_ref(tile, i)).collect();
                query.process(tile, &polys, &refs);
            }
        }
        Ok(())
    }

    /// Polygons overlapping a box, at most `max_polys` of them
    pub fn query_polygons(
        &self,
        center: &[f32; 3],
        extents: &[f32; 3],
        filter: &QueryFilter,
        max_polys: usize,
    ) -> Result<Vec<PolyRef>> {
        let mut query = CollectPolysQuery::new(max_polys);
        self.query_polygons_with(center, extents, filter, &mut query)?;
        Ok(query.into_polys())
    }

    /// Polygon nearest to `center` within the search box, with the nearest point
    pub fn find_nearest_poly(
        &self,
        center: &[f32; 3],
        extents: &[f32; 3],
        filter: &QueryFilter,
    ) -> Result<Option<(PolyRef, [f32; 3])>> {
        let mut query = FindNearestPolyQuery::new(self, center);
        self.query_polygons_with(center, extents, filter, &mut query)?;
        if query.nearest_ref().is_valid() {
            Ok(Some((query.nearest_ref(), *query.nearest_point())))
        } else {
            Ok(None)
        }
    }

    /// Closest point on a polygon surface and whether `pos` is above or below it
    pub fn closest_point_on_poly(&self, reference: PolyRef, pos: &[f32; 3]) -> Result<([f32; 3], bool)> {
        let tile = self.tile_by_ref(reference)?;
        let poly_index = self.codec().decode_poly(reference) as usize;
        if poly_index >= tile.polys.len() {
            return Err(Status::NotFound);
        }
        Ok(closest_point_on_poly_in_tile(tile, poly_index, pos))
    }

    /// `pos` if it lies inside the polygon on the xz-plane, else the closest
    /// point on the polygon boundary
    pub fn closest_point_on_poly_boundary(&self, reference: PolyRef, pos: &[f32; 3]) -> Result<[f32; 3]> {
        let verts = self.poly_verts_by_ref(reference)?;
        Ok(closest_point_on_boundary(pos, &verts))
    }

    /// Height of a polygon at `pos`, `None` when `pos` is outside the polygon
    pub fn get_poly_height(&self, reference: PolyRef, pos: &[f32; 3]) -> Result<Option<f32>> {
        let tile = self.tile_by_ref(reference)?;
        let poly_index = self.codec().decode_poly(reference) as usize;
        if poly_index >= tile.polys.len() {
            return Err(Status::NotFound);
        }
        Ok(poly_height_in_tile(tile, poly_index, pos))
    }
}
