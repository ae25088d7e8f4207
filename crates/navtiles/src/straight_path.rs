//! Path post-processing: funnel straightening and corridor movement

use super::nav_common::{dist_pt_seg_sqr_2d, distance_pt_poly_edges_sqr, tri_area_2d, vequal, vlerp};
use super::nav_mesh_query::NavMeshQuery;
use super::{PolyRef, PolyType, Result, Status, StraightPathFlags};

/// Distance below which the start is considered to be on the first portal
const PORTAL_SKIP_DIST: f32 = 0.001;

/// Distance from a portal at which corridor movement advances to the next polygon
const CORRIDOR_SLOP: f32 = 0.01;

/// Straightened path through a polygon corridor
#[derive(Debug, Clone, Default, PartialEq)]
#[cfg_attr(
    feature = "serialization",
    derive(serde::Serialize, serde::Deserialize)
)]
pub struct StraightPath {
    /// Path vertices
    pub waypoints: Vec<[f32; 3]>,
    /// Flags of each vertex
    pub flags: Vec<StraightPathFlags>,
    /// Polygon entered at each vertex, null for the end
    pub poly_refs: Vec<PolyRef>,
}

impl StraightPath {
    pub fn len(&self) -> usize {
        self.waypoints.len()
    }

    pub fn is_empty(&self) -> bool {
        self.waypoints.is_empty()
    }

    fn push(&mut self, pos: [f32; 3], flags: StraightPathFlags, reference: PolyRef) {
        self.waypoints.push(pos);
        self.flags.push(flags);
        self.poly_refs.push(reference);
    }

    /// Replaces flags and polygon of the last vertex
    fn update_last(&mut self, flags: StraightPathFlags, reference: PolyRef) {
        if let (Some(f), Some(r)) = (self.flags.last_mut(), self.poly_refs.last_mut()) {
            *f = flags;
            *r = reference;
        }
    }
}

fn corner_flags(reference: PolyRef, poly_type: PolyType) -> StraightPathFlags {
    if !reference.is_valid() {
        StraightPathFlags::END
    } else if poly_type == PolyType::OffMeshConnection {
        StraightPathFlags::OFFMESH_CONNECTION
    } else {
        StraightPathFlags::empty()
    }
}

/// One side of the funnel
#[derive(Clone, Copy)]
struct FunnelSide {
    pos: [f32; 3],
    index: usize,
    reference: PolyRef,
    poly_type: PolyType,
}

impl NavMeshQuery<'_> {
    /// Straightens a polygon corridor into a list of corner points
    ///
    /// The start and end are clamped onto the first and last polygon. When
    /// two corridor polygons turn out not to be connected, the path ends at
    /// the point of the last reachable polygon closest to `end_pos`.
    pub fn find_straight_path(
        &self,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        path: &[PolyRef],
        max_straight: usize,
    ) -> Result<StraightPath> {
        let (Some(&first), Some(&last)) = (path.first(), path.last()) else {
            return Err(Status::InvalidParam);
        };

        let mut result = StraightPath::default();
        if max_straight == 0 {
            return Ok(result);
        }

        let closest_start = self.closest_point_on_poly_boundary(first, start_pos)?;
        let mut closest_end = self.closest_point_on_poly_boundary(last, end_pos)?;

        result.push(closest_start, StraightPathFlags::START, first);
        if result.len() >= max_straight {
            return Ok(result);
        }

        if path.len() > 1 {
            let mut apex = closest_start;
            let mut left = FunnelSide {
                pos: apex,
                index: 0,
                reference: first,
                poly_type: PolyType::Ground,
            };
            let mut right = left;

            let mut i = 0;
            while i < path.len() {
                let (portal_left, portal_right, to_type) = if i + 1 < path.len() {
                    let portal = match self.portal(path[i], path[i + 1]) {
                        Ok(portal) => portal,
                        Err(_) => {
                            // Corridor broken: end at the last reachable polygon
                            closest_end = self.closest_point_on_poly_boundary(path[i], end_pos)?;
                            result.push(closest_end, StraightPathFlags::empty(), path[i]);
                            return Ok(result);
                        }
                    };

                    // Starting on the first portal
                    if i == 0 {
                        let (d, _) = dist_pt_seg_sqr_2d(&apex, &portal.left, &portal.right);
                        if d < PORTAL_SKIP_DIST * PORTAL_SKIP_DIST {
                            i += 1;
                            continue;
                        }
                    }
                    (portal.left, portal.right, portal.to_type)
                } else {
                    (closest_end, closest_end, PolyType::Ground)
                };
                let next_ref = path.get(i + 1).copied().unwrap_or(PolyRef::NULL);

                // Right side
                if tri_area_2d(&apex, &right.pos, &portal_right) <= 0.0 {
                    if vequal(&apex, &right.pos) || tri_area_2d(&apex, &left.pos, &portal_right) > 0.0 {
                        right = FunnelSide {
                            pos: portal_right,
                            index: i,
                            reference: next_ref,
                            poly_type: to_type,
                        };
                    } else {
                        // Left side becomes the new apex
                        apex = left.pos;
                        if !self.append_corner(&mut result, &left, max_straight) {
                            return Ok(result);
                        }
                        let restart = left.index;
                        left.pos = apex;
                        right = left;
                        i = restart + 1;
                        continue;
                    }
                }

                // Left side
                if tri_area_2d(&apex, &left.pos, &portal_left) >= 0.0 {
                    if vequal(&apex, &left.pos) || tri_area_2d(&apex, &right.pos, &portal_left) < 0.0 {
                        left = FunnelSide {
                            pos: portal_left,
                            index: i,
                            reference: next_ref,
                            poly_type: to_type,
                        };
                    } else {
                        // Right side becomes the new apex
                        apex = right.pos;
                        if !self.append_corner(&mut result, &right, max_straight) {
                            return Ok(result);
                        }
                        let restart = right.index;
                        right.pos = apex;
                        left = right;
                        i = restart + 1;
                        continue;
                    }
                }

                i += 1;
            }
        }

        let ends_at_goal = result
            .waypoints
            .last()
            .is_some_and(|p| result.len() > 1 && vequal(p, &closest_end));
        if ends_at_goal {
            result.update_last(StraightPathFlags::END, PolyRef::NULL);
        } else if result.len() < max_straight {
            result.push(closest_end, StraightPathFlags::END, PolyRef::NULL);
        }

        Ok(result)
    }

    /// Appends a funnel corner, merging it into the previous vertex when they
    /// coincide. Returns false once the output is full.
    fn append_corner(&self, result: &mut StraightPath, side: &FunnelSide, max_straight: usize) -> bool {
        let flags = corner_flags(side.reference, side.poly_type);
        let duplicate = result.waypoints.last().is_some_and(|p| vequal(p, &side.pos));
        if duplicate {
            result.update_last(flags, side.reference);
            return true;
        }
        result.push(side.pos, flags, side.reference);
        result.len() < max_straight
    }

    /// Moves from `start_pos` towards `end_pos` without leaving the corridor
    ///
    /// Returns the index of the corridor polygon the movement ended in and the
    /// resulting position. The position is clamped onto the boundary of that
    /// polygon when `end_pos` lies outside it.
    pub fn move_along_path_corridor(
        &self,
        start_pos: &[f32; 3],
        end_pos: &[f32; 3],
        path: &[PolyRef],
    ) -> Result<(usize, [f32; 3])> {
        if path.is_empty() {
            return Err(Status::InvalidParam);
        }

        let mut result_pos = *start_pos;
        let mut n = 0;
        while n < path.len() {
            let verts = self.nav_mesh().poly_verts_by_ref(path[n])?;
            let nv = verts.len();
            if nv == 0 {
                break;
            }

            let (inside, edge_dist, edge_t) = distance_pt_poly_edges_sqr(end_pos, &verts);
            if inside {
                result_pos = *end_pos;
                break;
            }

            // Clamp onto the nearest edge
            let mut imin = 0;
            for (i, d) in edge_dist.iter().enumerate() {
                if *d < edge_dist[imin] {
                    imin = i;
                }
            }
            result_pos = vlerp(&verts[imin], &verts[(imin + 1) % nv], edge_t[imin]);

            if n + 1 >= path.len() {
                break;
            }
            let Ok((left, right)) = self.get_portal_points(path[n], path[n + 1]) else {
                break;
            };

            // Advance only when the clamped point sits on the next portal
            let (d, _) = dist_pt_seg_sqr_2d(&result_pos, &left, &right);
            if d > CORRIDOR_SLOP * CORRIDOR_SLOP {
                break;
            }
            n += 1;
        }

        Ok((n, result_pos))
    }

    /// Endpoints of an off-mesh connection in travel direction
    ///
    /// Returns (start, end) where start is the endpoint linked to `prev`.
    pub fn get_off_mesh_connection_poly_end_points(
        &self,
        prev: PolyRef,
        poly: PolyRef,
    ) -> Result<([f32; 3], [f32; 3])> {
        let (tile, con_poly) = self.nav_mesh().tile_and_poly_by_ref(poly)?;
        if !con_poly.is_off_mesh_connection() {
            return Err(Status::InvalidParam);
        }

        let (mut idx0, mut idx1) = (0, 1);
        if let Some(link) = tile.poly_links(con_poly).iter().find(|l| l.edge == 0) {
            if link.reference != prev {
                std::mem::swap(&mut idx0, &mut idx1);
            }
        }

        let start = tile.verts[con_poly.verts[idx0] as usize];
        let end = tile.verts[con_poly.verts[idx1] as usize];
        Ok((start, end))
    }
}
