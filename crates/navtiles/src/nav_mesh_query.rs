//! Graph queries over a navigation mesh
//!
//! A [`NavMeshQuery`] borrows a [`NavMesh`] and owns the node pool and open
//! list used by its searches. Each thread running queries needs its own
//! `NavMeshQuery`; the mesh itself is shared read-only.

use log::{debug, warn};

use super::nav_common::{dist_pt_seg_sqr_2d, intersect_segment_poly_2d, vdist, vlerp, vnormalize, vsub};
use super::nav_mesh::{MeshTile, NavMesh, Poly};
use super::node_pool::{NodeFlags, NodeIndex, NodePool, NodeQueue, NULL_IDX};
use super::raycast_hit::RaycastHit;
use super::{PolyRef, PolyType, QueryFilter, Result, Status, LINK_INTERNAL};

/// Heuristic scale, keeps A* admissible at unit area cost
const H_SCALE: f32 = 0.999;

/// Result of [`NavMeshQuery::find_polys_around`]
#[derive(Debug, Clone, Default, PartialEq)]
pub struct PolysAround {
    /// Visited polygons in order of non-decreasing cost
    pub refs: Vec<PolyRef>,
    /// Polygon each result was reached from, null for the center
    pub parents: Vec<PolyRef>,
    /// Cost from the center to each result
    pub costs: Vec<f32>,
}

/// Result of [`NavMeshQuery::find_distance_to_wall`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct WallHit {
    /// Distance to the nearest wall, the search radius when none was found
    pub distance: f32,
    /// Nearest point on the wall
    pub position: [f32; 3],
    /// Direction from the wall towards the center, zero when no wall was found
    pub normal: [f32; 3],
}

fn check_pos(pos: &[f32; 3]) -> Result<()> {
    if pos.iter().all(|v| v.is_finite()) {
        Ok(())
    } else {
        Err(Status::InvalidParam)
    }
}

/// Portal between two polygons, with the polygon types on both sides
pub(crate) struct Portal {
    pub left: [f32; 3],
    pub right: [f32; 3],
    pub from_type: PolyType,
    pub to_type: PolyType,
}

/// Portal between two resolved polygons
pub(crate) fn portal_points(
    from_ref: PolyRef,
    from_tile: &MeshTile,
    from_poly: &Poly,
    to_ref: PolyRef,
    to_tile: &MeshTile,
    to_poly: &Poly,
) -> Result<Portal> {
    let link = from_tile
        .poly_links(from_poly)
        .iter()
        .find(|l| l.reference == to_ref)
        .ok_or(Status::PathInvalid)?;

    let mut portal = Portal {
        left: [0.0; 3],
        right: [0.0; 3],
        from_type: from_poly.poly_type,
        to_type: to_poly.poly_type,
    };

    // Off-mesh connections collapse the portal onto their endpoint
    if from_poly.is_off_mesh_connection() {
        let v = *from_poly
            .verts
            .get(link.edge as usize)
            .ok_or(Status::PathInvalid)?;
        portal.left = from_tile.verts[v as usize];
        portal.right = portal.left;
        return Ok(portal);
    }
    if to_poly.is_off_mesh_connection() {
        let back = to_tile
            .poly_links(to_poly)
            .iter()
            .find(|l| l.reference == from_ref)
            .ok_or(Status::PathInvalid)?;
        let v = *to_poly
            .verts
            .get(back.edge as usize)
            .ok_or(Status::PathInvalid)?;
        portal.left = to_tile.verts[v as usize];
        portal.right = portal.left;
        return Ok(portal);
    }

    let nv = from_poly.vert_count as usize;
    let edge = link.edge as usize;
    if edge >= nv {
        return Err(Status::PathInvalid);
    }
    let v0 = from_tile.verts[from_poly.verts[edge] as usize];
    let v1 = from_tile.verts[from_poly.verts[(edge + 1) % nv] as usize];
    portal.left = v0;
    portal.right = v1;

    // Tile border links may cover only part of the edge
    if link.is_partial() {
        let s = 1.0 / 255.0;
        portal.left = vlerp(&v0, &v1, link.bmin as f32 * s);
        portal.right = vlerp(&v0, &v1, link.bmax as f32 * s);
    }

    Ok(portal)
}

fn edge_mid_point(
    from_ref: PolyRef,
    from_tile: &MeshTile,
    from_poly: &Poly,
    to_ref: PolyRef,
    to_tile: &MeshTile,
    to_poly: &Poly,
) -> Result<[f32; 3]> {
    let portal = portal_points(from_ref, from_tile, from_poly, to_ref, to_tile, to_poly)?;
    Ok(vlerp(&portal.left, &portal.right, 0.5))
}

/// Query context over a navigation mesh
#[derive(Debug)]
pub struct NavMeshQuery<'a> {
    nav_mesh: &'a NavMesh,
    node_pool: NodePool,
    open_list: NodeQueue,
}

impl<'a> NavMeshQuery<'a> {
    /// Creates a query with the node capacity configured on the mesh
    pub fn new(nav_mesh: &'a NavMesh) -> Self {
        Self::with_max_nodes(nav_mesh, nav_mesh.params().max_nodes)
    }

    /// Creates a query with its own node capacity, clamped to `1..=65535`
    pub fn with_max_nodes(nav_mesh: &'a NavMesh, max_nodes: usize) -> Self {
        let node_pool = NodePool::new(max_nodes);
        let open_list = NodeQueue::new(node_pool.max_nodes());
        Self {
            nav_mesh,
            node_pool,
            open_list,
        }
    }

    pub fn nav_mesh(&self) -> &'a NavMesh {
        self.nav_mesh
    }

    pub fn max_nodes(&self) -> usize {
        self.node_pool.max_nodes()
    }

    /// Starts a search from `start_ref` at `start_pos`
    fn reset_search(&mut self, start_ref: PolyRef, start_pos: &[f32; 3], start_total: f32) -> NodeIndex {
        self.node_pool.clear();
        self.open_list.clear();
        // A cleared pool always has room for one node
        let start = self.node_pool.get_node(start_ref).unwrap_or(0);
        let node = self.node_pool.node_mut(start);
        node.pos = *start_pos;
        node.pidx = NULL_IDX;
        node.cost = 0.0;
        node.total = start_total;
        node.flags = NodeFlags::OPEN;
        self.open_list.push(start, start_total);
        start
    }

    fn close_next(&mut self) -> Option<NodeIndex> {
        let idx = self.open_list.pop()?;
        let node = self.node_pool.node_mut(idx);
        node.flags.remove(NodeFlags::OPEN);
        node.flags.insert(NodeFlags::CLOSED);
        Some(idx)
    }

    fn parent_ref(&self, idx: NodeIndex) -> PolyRef {
        match self.node_pool.node(idx).pidx {
            NULL_IDX => PolyRef::NULL,
            p => self.node_pool.node(p).id,
        }
    }

    /// Opens a node or lowers its total, keeping the open list in sync
    fn open_node(&mut self, idx: NodeIndex, parent: NodeIndex, cost: f32, total: f32) {
        let node = self.node_pool.node_mut(idx);
        let was_open = node.flags.contains(NodeFlags::OPEN);
        node.pidx = parent;
        node.cost = cost;
        node.total = total;
        node.flags.remove(NodeFlags::CLOSED);
        if was_open {
            self.open_list.modify(idx, total);
        } else {
            node.flags.insert(NodeFlags::OPEN);
            self.open_list.push(idx, total);
        }
    }

    /// Finds a polygon corridor from `start_ref` to `end_ref`
    ///
    /// When the end cannot be reached the corridor leads to the explored
    /// polygon closest to `end_pos`; callers detect this by comparing the last
    /// polygon with `end_ref`. The corridor is truncated to `max_path`.
    pub fn find_path(
        &mut self,
        start_ref: PolyRef,
        end_ref: PolyRef,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        filter: &QueryFilter,
        max_path: usize,
    ) -> Result<Vec<PolyRef>> {
        if !self.nav_mesh.is_valid_poly_ref(start_ref)
            || !self.nav_mesh.is_valid_poly_ref(end_ref)
            || max_path == 0
        {
            return Err(Status::InvalidParam);
        }
        check_pos(start_pos)?;
        check_pos(end_pos)?;

        if start_ref == end_ref {
            return Ok(vec![start_ref]);
        }

        let nav_mesh = self.nav_mesh;
        let start_h = vdist(start_pos, end_pos) * H_SCALE;
        let start = self.reset_search(start_ref, start_pos, start_h);

        let mut last_best = start;
        let mut last_best_cost = start_h;
        let mut out_of_nodes = false;

        while let Some(best_idx) = self.close_next() {
            let best = self.node_pool.node(best_idx);
            let (best_ref, best_pos, best_cost, best_total) = (best.id, best.pos, best.cost, best.total);

            if best_ref == end_ref {
                last_best = best_idx;
                break;
            }

            // Closed node nearest to the goal so far
            let h = best_total - best_cost;
            if h < last_best_cost {
                last_best_cost = h;
                last_best = best_idx;
            }

            let Ok((best_tile, best_poly)) = nav_mesh.tile_and_poly_by_ref(best_ref) else {
                continue;
            };
            let parent_ref = self.parent_ref(best_idx);

            for link in best_tile.poly_links(best_poly) {
                let nei_ref = link.reference;
                if !nei_ref.is_valid() || nei_ref == parent_ref {
                    continue;
                }
                let Ok((nei_tile, nei_poly)) = nav_mesh.tile_and_poly_by_ref(nei_ref) else {
                    continue;
                };
                if !filter.pass_filter(nei_poly) {
                    continue;
                }

                let Some(nei_idx) = self.node_pool.get_node(nei_ref) else {
                    out_of_nodes = true;
                    continue;
                };

                let nei = self.node_pool.node(nei_idx);
                let (nei_flags, nei_total) = (nei.flags, nei.total);
                let nei_pos = if nei_flags == NodeFlags::default() {
                    let Ok(mid) = edge_mid_point(best_ref, best_tile, best_poly, nei_ref, nei_tile, nei_poly)
                    else {
                        continue;
                    };
                    self.node_pool.node_mut(nei_idx).pos = mid;
                    mid
                } else {
                    nei.pos
                };

                let (cost, heuristic) = if nei_ref == end_ref {
                    let cur_cost = filter.cost(&best_pos, &nei_pos, best_poly);
                    let end_cost = filter.cost(&nei_pos, end_pos, nei_poly);
                    (best_cost + cur_cost + end_cost, 0.0)
                } else {
                    let cur_cost = filter.cost(&best_pos, &nei_pos, best_poly);
                    (best_cost + cur_cost, vdist(&nei_pos, end_pos) * H_SCALE)
                };
                let total = cost + heuristic;

                let seen = nei_flags.contains(NodeFlags::OPEN) || nei_flags.contains(NodeFlags::CLOSED);
                if seen && total >= nei_total {
                    continue;
                }
                self.open_node(nei_idx, best_idx, cost, total);
            }
        }

        if out_of_nodes {
            warn!(
                "find_path ran out of nodes ({} in pool)",
                self.node_pool.max_nodes()
            );
        }

        let mut path = self.node_pool.path_to(last_best);
        if path.last() != Some(&end_ref) {
            debug!("find_path returned a partial path of {} polygons", path.len());
        }
        path.truncate(max_path);
        Ok(path)
    }

    /// Casts a ray along the surface from `start_pos` towards `end_pos`
    ///
    /// The ray walks from polygon to polygon through portals. It stops at the
    /// first edge without a passable neighbor and records the visited polygons,
    /// at most `max_path` of them.
    pub fn raycast(
        &self,
        start_ref: PolyRef,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        filter: &QueryFilter,
        max_path: usize,
    ) -> Result<RaycastHit> {
        if !self.nav_mesh.is_valid_poly_ref(start_ref) {
            return Err(Status::InvalidParam);
        }
        check_pos(start_pos)?;
        check_pos(end_pos)?;

        let mut hit = RaycastHit {
            t: 0.0,
            hit_normal: [0.0; 3],
            hit_edge_index: None,
            path: Vec::new(),
        };

        let mut cur_ref = start_ref;
        while cur_ref.is_valid() {
            let (tile, poly) = self.nav_mesh.tile_and_poly_by_ref(cur_ref)?;
            let verts = tile.poly_verts(poly);

            // The ray does not touch the polygon: report a hit at the last t
            let Some(isect) = intersect_segment_poly_2d(start_pos, end_pos, &verts) else {
                return Ok(hit);
            };

            hit.hit_edge_index = isect.seg_max;
            if isect.tmax > hit.t {
                hit.t = isect.tmax;
            }
            if hit.path.len() < max_path {
                hit.path.push(cur_ref);
            }

            // The ray ends inside the polygon
            let Some(seg_max) = isect.seg_max else {
                return Ok(RaycastHit::no_hit(hit.path));
            };

            let mut next_ref = PolyRef::NULL;
            for link in tile.poly_links(poly) {
                if link.edge as usize != seg_max {
                    continue;
                }
                let Ok((_, next_poly)) = self.nav_mesh.tile_and_poly_by_ref(link.reference) else {
                    continue;
                };
                if next_poly.is_off_mesh_connection() || !filter.pass_filter(next_poly) {
                    continue;
                }

                if link.side == LINK_INTERNAL || !link.is_partial() {
                    next_ref = link.reference;
                    break;
                }

                // Partial portal: the crossing point must fall inside it
                let nv = verts.len();
                let v0 = &verts[link.edge as usize];
                let v1 = &verts[(link.edge as usize + 1) % nv];
                let axis = if link.side & 1 == 0 { 2 } else { 0 };
                let s = 1.0 / 255.0;
                let mut lmin = v0[axis] + (v1[axis] - v0[axis]) * (link.bmin as f32 * s);
                let mut lmax = v0[axis] + (v1[axis] - v0[axis]) * (link.bmax as f32 * s);
                if lmin > lmax {
                    std::mem::swap(&mut lmin, &mut lmax);
                }
                let x = start_pos[axis] + (end_pos[axis] - start_pos[axis]) * isect.tmax;
                if x >= lmin && x <= lmax {
                    next_ref = link.reference;
                    break;
                }
            }

            if !next_ref.is_valid() {
                // Wall hit
                let a = &verts[seg_max];
                let b = &verts[(seg_max + 1) % verts.len()];
                let dx = b[0] - a[0];
                let dz = b[2] - a[2];
                hit.hit_normal = vnormalize(&[dz, 0.0, -dx]);
                return Ok(hit);
            }

            cur_ref = next_ref;
        }

        Ok(hit)
    }

    /// Polygons reachable from `center_ref` through portals within `radius`
    /// of `center_pos`, in order of non-decreasing cost
    pub fn find_polys_around(
        &mut self,
        center_ref: PolyRef,
        center_pos: &[f32; 3],
        radius: f32,
        filter: &QueryFilter,
        max_result: usize,
    ) -> Result<PolysAround> {
        if !self.nav_mesh.is_valid_poly_ref(center_ref) || !radius.is_finite() || radius < 0.0 {
            return Err(Status::InvalidParam);
        }
        check_pos(center_pos)?;

        let nav_mesh = self.nav_mesh;
        self.reset_search(center_ref, center_pos, 0.0);
        let radius_sqr = radius * radius;

        let mut result = PolysAround::default();
        let mut out_of_nodes = false;

        while let Some(best_idx) = self.close_next() {
            if result.refs.len() >= max_result {
                break;
            }
            let best = self.node_pool.node(best_idx);
            let (best_ref, best_pos, best_total) = (best.id, best.pos, best.total);
            let parent_ref = self.parent_ref(best_idx);

            result.refs.push(best_ref);
            result.parents.push(parent_ref);
            result.costs.push(best_total);

            let Ok((best_tile, best_poly)) = nav_mesh.tile_and_poly_by_ref(best_ref) else {
                continue;
            };

            for link in best_tile.poly_links(best_poly) {
                let nei_ref = link.reference;
                if !nei_ref.is_valid() || nei_ref == parent_ref {
                    continue;
                }
                let Ok((nei_tile, nei_poly)) = nav_mesh.tile_and_poly_by_ref(nei_ref) else {
                    continue;
                };
                if !filter.pass_filter(nei_poly) {
                    continue;
                }

                let Ok(portal) = portal_points(best_ref, best_tile, best_poly, nei_ref, nei_tile, nei_poly)
                else {
                    continue;
                };
                let (dist_sqr, _) = dist_pt_seg_sqr_2d(center_pos, &portal.left, &portal.right);
                if dist_sqr > radius_sqr {
                    continue;
                }

                let Some(nei_idx) = self.node_pool.get_node(nei_ref) else {
                    out_of_nodes = true;
                    continue;
                };
                let nei = self.node_pool.node(nei_idx);
                if nei.flags.contains(NodeFlags::CLOSED) {
                    continue;
                }
                let nei_pos = if nei.flags == NodeFlags::default() {
                    let mid = vlerp(&portal.left, &portal.right, 0.5);
                    self.node_pool.node_mut(nei_idx).pos = mid;
                    mid
                } else {
                    nei.pos
                };

                let nei = self.node_pool.node(nei_idx);
                let total = best_total + filter.cost(&best_pos, &nei_pos, best_poly);
                if nei.flags.contains(NodeFlags::OPEN) && total >= nei.total {
                    continue;
                }
                self.open_node(nei_idx, best_idx, total, total);
            }
        }

        if out_of_nodes {
            warn!("find_polys_around ran out of nodes");
        }
        Ok(result)
    }

    /// Distance from `center_pos` to the nearest wall within `max_radius`
    ///
    /// A wall is an edge with no link to a polygon passing the filter.
    pub fn find_distance_to_wall(
        &mut self,
        center_ref: PolyRef,
        center_pos: &[f32; 3],
        max_radius: f32,
        filter: &QueryFilter,
    ) -> Result<WallHit> {
        if !self.nav_mesh.is_valid_poly_ref(center_ref) || !max_radius.is_finite() || max_radius < 0.0 {
            return Err(Status::InvalidParam);
        }
        check_pos(center_pos)?;

        let nav_mesh = self.nav_mesh;
        self.reset_search(center_ref, center_pos, 0.0);
        let mut radius_sqr = max_radius * max_radius;
        let mut hit_pos: Option<[f32; 3]> = None;

        while let Some(best_idx) = self.close_next() {
            let best = self.node_pool.node(best_idx);
            let (best_ref, best_pos, best_total) = (best.id, best.pos, best.total);
            let parent_ref = self.parent_ref(best_idx);

            let Ok((best_tile, best_poly)) = nav_mesh.tile_and_poly_by_ref(best_ref) else {
                continue;
            };
            let links = best_tile.poly_links(best_poly);

            // Solid edges
            let verts = best_tile.poly_verts(best_poly);
            let nv = verts.len();
            for j in 0..nv {
                let passable = links.iter().any(|l| {
                    l.edge as usize == j
                        && nav_mesh
                            .poly_by_ref(l.reference)
                            .is_ok_and(|p| !p.is_off_mesh_connection() && filter.pass_filter(p))
                });
                if passable {
                    continue;
                }
                let vj = &verts[j];
                let vi = &verts[(j + 1) % nv];
                let (dist_sqr, tseg) = dist_pt_seg_sqr_2d(center_pos, vj, vi);
                if dist_sqr > radius_sqr {
                    continue;
                }
                radius_sqr = dist_sqr;
                hit_pos = Some(vlerp(vj, vi, tseg));
            }

            for link in links {
                let nei_ref = link.reference;
                if !nei_ref.is_valid() || nei_ref == parent_ref {
                    continue;
                }
                let Ok((nei_tile, nei_poly)) = nav_mesh.tile_and_poly_by_ref(nei_ref) else {
                    continue;
                };
                if nei_poly.is_off_mesh_connection() || !filter.pass_filter(nei_poly) {
                    continue;
                }

                let Ok(portal) = portal_points(best_ref, best_tile, best_poly, nei_ref, nei_tile, nei_poly)
                else {
                    continue;
                };
                let (dist_sqr, _) = dist_pt_seg_sqr_2d(center_pos, &portal.left, &portal.right);
                if dist_sqr > radius_sqr {
                    continue;
                }

                let Some(nei_idx) = self.node_pool.get_node(nei_ref) else {
                    continue;
                };
                let nei = self.node_pool.node(nei_idx);
                if nei.flags.contains(NodeFlags::CLOSED) {
                    continue;
                }
                let nei_pos = if nei.flags == NodeFlags::default() {
                    let mid = vlerp(&portal.left, &portal.right, 0.5);
                    self.node_pool.node_mut(nei_idx).pos = mid;
                    mid
                } else {
                    nei.pos
                };

                let nei = self.node_pool.node(nei_idx);
                let total = best_total + vdist(&best_pos, &nei_pos);
                if nei.flags.contains(NodeFlags::OPEN) && total >= nei.total {
                    continue;
                }
                self.open_node(nei_idx, best_idx, total, total);
            }
        }

        Ok(match hit_pos {
            Some(position) => WallHit {
                distance: radius_sqr.sqrt(),
                position,
                normal: vnormalize(&vsub(center_pos, &position)),
            },
            None => WallHit {
                distance: max_radius,
                position: *center_pos,
                normal: [0.0; 3],
            },
        })
    }

    /// Returns true if the last search closed `reference`
    pub fn is_in_closed_list(&self, reference: PolyRef) -> bool {
        self.node_pool
            .find_node(reference)
            .is_some_and(|idx| self.node_pool.node(idx).flags.contains(NodeFlags::CLOSED))
    }

    /// Portal between two neighboring polygons as (left, right) points
    pub fn get_portal_points(&self, from: PolyRef, to: PolyRef) -> Result<([f32; 3], [f32; 3])> {
        let portal = self.portal(from, to)?;
        Ok((portal.left, portal.right))
    }

    pub(crate) fn portal(&self, from: PolyRef, to: PolyRef) -> Result<Portal> {
        let (from_tile, from_poly) = self.nav_mesh.tile_and_poly_by_ref(from)?;
        let (to_tile, to_poly) = self.nav_mesh.tile_and_poly_by_ref(to)?;
        portal_points(from, from_tile, from_poly, to, to_tile, to_poly)
    }

    /// Midpoint of the portal between two neighboring polygons
    pub fn get_edge_mid_point(&self, from: PolyRef, to: PolyRef) -> Result<[f32; 3]> {
        let (left, right) = self.get_portal_points(from, to)?;
        Ok(vlerp(&left, &right, 0.5))
    }

    /// See [`NavMesh::find_nearest_poly`]
    pub fn find_nearest_poly(
        &self,
        center: &[f32; 3],
        extents: &[f32; 3],
        filter: &QueryFilter,
    ) -> Result<Option<(PolyRef, [f32; 3])>> {
        self.nav_mesh.find_nearest_poly(center, extents, filter)
    }

    /// See [`NavMesh::query_polygons`]
    pub fn query_polygons(
        &self,
        center: &[f32; 3],
        extents: &[f32; 3],
        filter: &QueryFilter,
        max_polys: usize,
    ) -> Result<Vec<PolyRef>> {
        self.nav_mesh.query_polygons(center, extents, filter, max_polys)
    }

    pub fn closest_point_on_poly(&self, reference: PolyRef, pos: &[f32; 3]) -> Result<([f32; 3], bool)> {
        self.nav_mesh.closest_point_on_poly(reference, pos)
    }

    pub fn closest_point_on_poly_boundary(&self, reference: PolyRef, pos: &[f32; 3]) -> Result<[f32; 3]> {
        self.nav_mesh.closest_point_on_poly_boundary(reference, pos)
    }

    pub fn get_poly_height(&self, reference: PolyRef, pos: &[f32; 3]) -> Result<Option<f32>> {
        self.nav_mesh.get_poly_height(reference, pos)
    }
}
