//! Vector and geometry helpers shared by the mesh and the queries
//!
//! Positions are `[f32; 3]` with y up. Most 2D helpers work on the xz-plane.

use glam::Vec3;

#[inline]
pub fn vadd(a: &[f32; 3], b: &[f32; 3]) -> [f32; 3] {
    [a[0] + b[0], a[1] + b[1], a[2] + b[2]]
}

#[inline]
pub fn vsub(a: &[f32; 3], b: &[f32; 3]) -> [f32; 3] {
    [a[0] - b[0], a[1] - b[1], a[2] - b[2]]
}

#[inline]
pub fn vlerp(a: &[f32; 3], b: &[f32; 3], t: f32) -> [f32; 3] {
    Vec3::from(*a).lerp(Vec3::from(*b), t).to_array()
}

#[inline]
pub fn vdist(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    Vec3::from(*a).distance(Vec3::from(*b))
}

#[inline]
pub fn vdist_sqr(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    Vec3::from(*a).distance_squared(Vec3::from(*b))
}

#[inline]
pub fn vdist_2d_sqr(a: &[f32; 3], b: &[f32; 3]) -> f32 {
    let dx = b[0] - a[0];
    let dz = b[2] - a[2];
    dx * dx + dz * dz
}

/// Normalizes a vector; zero vectors are returned unchanged
#[inline]
pub fn vnormalize(v: &[f32; 3]) -> [f32; 3] {
    Vec3::from(*v).normalize_or_zero().to_array()
}

#[inline]
pub fn vdot_2d(u: &[f32; 3], v: &[f32; 3]) -> f32 {
    u[0] * v[0] + u[2] * v[2]
}

/// xz-plane perp product (uz*vx - ux*vz)
#[inline]
pub fn vperp_2d(u: &[f32; 3], v: &[f32; 3]) -> f32 {
    u[2] * v[0] - u[0] * v[2]
}

/// Signed xz-plane area of the triangle ABC, times two
#[inline]
pub fn tri_area_2d(a: &[f32; 3], b: &[f32; 3], c: &[f32; 3]) -> f32 {
    let abx = b[0] - a[0];
    let abz = b[2] - a[2];
    let acx = c[0] - a[0];
    let acz = c[2] - a[2];
    acx * abz - abx * acz
}

/// Sloppy colocation check
#[inline]
pub fn vequal(a: &[f32; 3], b: &[f32; 3]) -> bool {
    const THR: f32 = 1.0 / 16384.0;
    vdist_sqr(a, b) < THR * THR
}

#[inline]
pub fn overlap_bounds(amin: &[f32; 3], amax: &[f32; 3], bmin: &[f32; 3], bmax: &[f32; 3]) -> bool {
    !(amin[0] > bmax[0]
        || amax[0] < bmin[0]
        || amin[1] > bmax[1]
        || amax[1] < bmin[1]
        || amin[2] > bmax[2]
        || amax[2] < bmin[2])
}

#[inline]
pub fn overlap_quant_bounds(amin: &[u16; 3], amax: &[u16; 3], bmin: &[u16; 3], bmax: &[u16; 3]) -> bool {
    !(amin[0] > bmax[0]
        || amax[0] < bmin[0]
        || amin[1] > bmax[1]
        || amax[1] < bmin[1]
        || amin[2] > bmax[2]
        || amax[2] < bmin[2])
}

/// Closest point on triangle ABC to P
pub fn closest_pt_point_triangle(p: &[f32; 3], a: &[f32; 3], b: &[f32; 3], c: &[f32; 3]) -> [f32; 3] {
    let (p, a, b, c) = (Vec3::from(*p), Vec3::from(*a), Vec3::from(*b), Vec3::from(*c));
    let ab = b - a;
    let ac = c - a;

    // Vertex region outside A
    let ap = p - a;
    let d1 = ab.dot(ap);
    let d2 = ac.dot(ap);
    if d1 <= 0.0 && d2 <= 0.0 {
        return a.to_array();
    }

    // Vertex region outside B
    let bp = p - b;
    let d3 = ab.dot(bp);
    let d4 = ac.dot(bp);
    if d3 >= 0.0 && d4 <= d3 {
        return b.to_array();
    }

    // Edge region AB
    let vc = d1 * d4 - d3 * d2;
    if vc <= 0.0 && d1 >= 0.0 && d3 <= 0.0 {
        let v = d1 / (d1 - d3);
        return (a + ab * v).to_array();
    }

    // Vertex region outside C
    let cp = p - c;
    let d5 = ab.dot(cp);
    let d6 = ac.dot(cp);
    if d6 >= 0.0 && d5 <= d6 {
        return c.to_array();
    }

    // Edge region AC
    let vb = d5 * d2 - d1 * d6;
    if vb <= 0.0 && d2 >= 0.0 && d6 <= 0.0 {
        let w = d2 / (d2 - d6);
        return (a + ac * w).to_array();
    }

    // Edge region BC
    let va = d3 * d6 - d5 * d4;
    if va <= 0.0 && (d4 - d3) >= 0.0 && (d5 - d6) >= 0.0 {
        let w = (d4 - d3) / ((d4 - d3) + (d5 - d6));
        return (b + (c - b) * w).to_array();
    }

    // Inside the face
    let denom = 1.0 / (va + vb + vc);
    let v = vb * denom;
    let w = vc * denom;
    (a + ab * v + ac * w).to_array()
}

/// Height of triangle ABC below or above P, if P is inside it on the xz-plane
pub fn closest_height_point_triangle(
    p: &[f32; 3],
    a: &[f32; 3],
    b: &[f32; 3],
    c: &[f32; 3],
) -> Option<f32> {
    const EPS: f32 = 1e-4;

    let v0 = vsub(c, a);
    let v1 = vsub(b, a);
    let v2 = vsub(p, a);

    let dot00 = vdot_2d(&v0, &v0);
    let dot01 = vdot_2d(&v0, &v1);
    let dot02 = vdot_2d(&v0, &v2);
    let dot11 = vdot_2d(&v1, &v1);
    let dot12 = vdot_2d(&v1, &v2);

    let denom = dot00 * dot11 - dot01 * dot01;
    if denom.abs() < f32::EPSILON {
        return None;
    }
    let inv_denom = 1.0 / denom;
    let u = (dot11 * dot02 - dot01 * dot12) * inv_denom;
    let v = (dot00 * dot12 - dot01 * dot02) * inv_denom;

    if u >= -EPS && v >= -EPS && (u + v) <= 1.0 + EPS {
        Some(a[1] + v0[1] * u + v1[1] * v)
    } else {
        None
    }
}

/// Result of clipping a segment against a convex polygon
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct SegmentPolyHit {
    /// Parameter where the segment enters the polygon
    pub tmin: f32,
    /// Parameter where the segment leaves the polygon
    pub tmax: f32,
    /// Edge crossed when entering, if the segment starts outside
    pub seg_min: Option<usize>,
    /// Edge crossed when leaving, if the segment ends outside
    pub seg_max: Option<usize>,
}

/// Clips segment P0-P1 against a convex polygon on the xz-plane
///
/// Edge `j` runs from `verts[j]` to `verts[j + 1]`. Returns `None` when the
/// segment misses the polygon.
pub fn intersect_segment_poly_2d(p0: &[f32; 3], p1: &[f32; 3], verts: &[[f32; 3]]) -> Option<SegmentPolyHit> {
    const EPS: f32 = 0.000_000_01;

    let mut hit = SegmentPolyHit {
        tmin: 0.0,
        tmax: 1.0,
        seg_min: None,
        seg_max: None,
    };

    let dir = vsub(p1, p0);
    let nverts = verts.len();
    let mut j = nverts.checked_sub(1)?;
    for i in 0..nverts {
        let edge = vsub(&verts[i], &verts[j]);
        let diff = vsub(p0, &verts[j]);
        let n = vperp_2d(&edge, &diff);
        let d = vperp_2d(&dir, &edge);
        if d.abs() < EPS {
            // Parallel to the edge
            if n < 0.0 {
                return None;
            }
            j = i;
            continue;
        }
        let t = n / d;
        if d < 0.0 {
            // Entering across this edge
            if t > hit.tmin {
                hit.tmin = t;
                hit.seg_min = Some(j);
                if hit.tmin > hit.tmax {
                    return None;
                }
            }
        } else if t < hit.tmax {
            // Leaving across this edge
            hit.tmax = t;
            hit.seg_max = Some(j);
            if hit.tmax < hit.tmin {
                return None;
            }
        }
        j = i;
    }

    Some(hit)
}

/// Squared xz distance from `pt` to segment P-Q and the segment parameter
pub fn dist_pt_seg_sqr_2d(pt: &[f32; 3], p: &[f32; 3], q: &[f32; 3]) -> (f32, f32) {
    let pqx = q[0] - p[0];
    let pqz = q[2] - p[2];
    let dx = pt[0] - p[0];
    let dz = pt[2] - p[2];
    let d = pqx * pqx + pqz * pqz;
    let mut t = pqx * dx + pqz * dz;
    if d > 0.0 {
        t /= d;
    }
    t = t.clamp(0.0, 1.0);
    let dx = p[0] + t * pqx - pt[0];
    let dz = p[2] + t * pqz - pt[2];
    (dx * dx + dz * dz, t)
}

/// Crossing test on the xz-plane
pub fn point_in_polygon(pt: &[f32; 3], verts: &[[f32; 3]]) -> bool {
    let nverts = verts.len();
    if nverts == 0 {
        return false;
    }
    let mut inside = false;
    let mut j = nverts - 1;
    for i in 0..nverts {
        let vi = &verts[i];
        let vj = &verts[j];
        if ((vi[2] > pt[2]) != (vj[2] > pt[2]))
            && (pt[0] < (vj[0] - vi[0]) * (pt[2] - vi[2]) / (vj[2] - vi[2]) + vi[0])
        {
            inside = !inside;
        }
        j = i;
    }
    inside
}

/// Point-in-polygon test that also reports the squared distance and segment
/// parameter for every edge `j` (from `verts[j]` to `verts[j + 1]`)
pub fn distance_pt_poly_edges_sqr(pt: &[f32; 3], verts: &[[f32; 3]]) -> (bool, Vec<f32>, Vec<f32>) {
    let nverts = verts.len();
    let mut edge_dist = vec![0.0; nverts];
    let mut edge_t = vec![0.0; nverts];
    for j in 0..nverts {
        let i = (j + 1) % nverts;
        let (d, t) = dist_pt_seg_sqr_2d(pt, &verts[j], &verts[i]);
        edge_dist[j] = d;
        edge_t[j] = t;
    }
    (point_in_polygon(pt, verts), edge_dist, edge_t)
}

/// Next power of two, 0 for 0
#[inline]
pub fn next_pow2(mut v: u32) -> u32 {
    if v == 0 {
        return 0;
    }
    v -= 1;
    v |= v >> 1;
    v |= v >> 2;
    v |= v >> 4;
    v |= v >> 8;
    v |= v >> 16;
    v.wrapping_add(1)
}

/// Integer log2, 0 for 0
#[inline]
pub fn ilog2(v: u32) -> u32 {
    if v == 0 {
        0
    } else {
        31 - v.leading_zeros()
    }
}

#[inline]
pub fn align4(x: usize) -> usize {
    (x + 3) & !3
}

/// Tile side facing `side` from the neighbor
#[inline]
pub fn opposite_side(side: u8) -> u8 {
    (side + 2) & 0x3
}

#[cfg(test)]
mod tests {
    use super::*;

    // Unit square wound the way the builder emits polygons.
    fn unit_square() -> Vec<[f32; 3]> {
        vec![
            [0.0, 0.0, 0.0],
            [0.0, 0.0, 1.0],
            [1.0, 0.0, 1.0],
            [1.0, 0.0, 0.0],
        ]
    }

    #[test]
    fn test_pow2_helpers() {
        assert_eq!(next_pow2(0), 0);
        assert_eq!(next_pow2(1), 1);
        assert_eq!(next_pow2(3), 4);
        assert_eq!(next_pow2(17), 32);
        assert_eq!(ilog2(1), 0);
        assert_eq!(ilog2(16), 4);
        assert_eq!(ilog2(17), 4);
        assert_eq!(align4(5), 8);
        assert_eq!(align4(8), 8);
    }

    #[test]
    fn test_opposite_side() {
        assert_eq!(opposite_side(0), 2);
        assert_eq!(opposite_side(1), 3);
        assert_eq!(opposite_side(2), 0);
        assert_eq!(opposite_side(3), 1);
    }

    #[test]
    fn test_point_in_polygon() {
        let square = unit_square();
        assert!(point_in_polygon(&[0.5, 3.0, 0.5], &square));
        assert!(!point_in_polygon(&[1.5, 0.0, 0.5], &square));
    }

    #[test]
    fn test_segment_leaves_through_plus_x_edge() {
        let square = unit_square();
        let hit = intersect_segment_poly_2d(&[0.5, 0.0, 0.5], &[2.0, 0.0, 0.5], &square)
            .expect("segment starts inside");
        assert_eq!(hit.seg_min, None);
        assert_eq!(hit.seg_max, Some(2));
        assert!((hit.tmax - 1.0 / 3.0).abs() < 1e-5);
    }

    #[test]
    fn test_segment_inside_has_no_exit() {
        let square = unit_square();
        let hit = intersect_segment_poly_2d(&[0.2, 0.0, 0.2], &[0.8, 0.0, 0.7], &square)
            .expect("segment inside");
        assert_eq!(hit.seg_max, None);
        assert_eq!(hit.tmax, 1.0);
    }

    #[test]
    fn test_segment_missing_polygon() {
        let square = unit_square();
        assert!(intersect_segment_poly_2d(&[2.0, 0.0, 2.0], &[3.0, 0.0, 2.0], &square).is_none());
    }

    #[test]
    fn test_dist_pt_seg() {
        let (d, t) = dist_pt_seg_sqr_2d(&[0.5, 5.0, 1.0], &[0.0, 0.0, 0.0], &[1.0, 0.0, 0.0]);
        assert!((d - 1.0).abs() < 1e-6);
        assert!((t - 0.5).abs() < 1e-6);
    }

    #[test]
    fn test_closest_height_on_slope() {
        let a = [0.0, 0.0, 0.0];
        let b = [0.0, 0.0, 2.0];
        let c = [2.0, 2.0, 0.0];
        let h = closest_height_point_triangle(&[1.0, 10.0, 0.5], &a, &b, &c).expect("inside");
        assert!((h - 1.0).abs() < 1e-4);
        assert!(closest_height_point_triangle(&[3.0, 0.0, 3.0], &a, &b, &c).is_none());
    }

    #[test]
    fn test_closest_point_triangle_face_and_vertex() {
        let a = [0.0, 0.0, 0.0];
        let b = [1.0, 0.0, 0.0];
        let c = [0.0, 0.0, 1.0];
        let inside = closest_pt_point_triangle(&[0.25, 1.0, 0.25], &a, &b, &c);
        assert!(vdist(&inside, &[0.25, 0.0, 0.25]) < 1e-5);
        let corner = closest_pt_point_triangle(&[-1.0, 0.0, -1.0], &a, &b, &c);
        assert_eq!(corner, a);
    }

    #[test]
    fn test_tri_area_sign_matches_winding() {
        // Apex looking along +x: the portal end with larger z is on the left.
        let apex = [0.0, 0.0, 0.0];
        let left = [1.0, 0.0, 1.0];
        let right = [1.0, 0.0, -1.0];
        assert!(tri_area_2d(&apex, &left, &right) > 0.0);
    }
}
