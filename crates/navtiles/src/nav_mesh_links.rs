//! Link building inside a tile and across tile borders
//!
//! Every function here computes new links into a scratch vector first and then
//! hands it to [`append_links`], which keeps the links of each polygon in one
//! contiguous range of the tile link array.

use std::collections::HashMap;

use log::{debug, warn};

use super::nav_common::{opposite_side, vdist_2d_sqr};
use super::nav_mesh::{Link, MeshTile};
use super::poly_query::find_nearest_poly_in_tile;
use super::poly_ref::RefCodec;
use super::{PolyRef, EXT_LINK, LINK_INTERNAL};

/// Adds links to a tile, dropping what does not fit its link capacity
pub(crate) fn append_links(tile: &mut MeshTile, new_links: Vec<Link>) {
    if new_links.is_empty() {
        return;
    }
    let capacity = tile.header.as_ref().map_or(0, |h| h.max_link_count as usize);
    let mut links = std::mem::take(&mut tile.links);
    let room = capacity.saturating_sub(links.len());
    if new_links.len() > room {
        warn!(
            "Tile ({}, {}) is out of links: capacity {}, dropping {}",
            tile.x,
            tile.y,
            capacity,
            new_links.len() - room
        );
    }
    links.extend(new_links.into_iter().take(room));
    store_links(tile, links);
}

/// Sorts links by owning polygon and rewrites the polygon link ranges
fn store_links(tile: &mut MeshTile, mut links: Vec<Link>) {
    links.sort_by_key(|l| l.poly);

    for poly in &mut tile.polys {
        poly.link_base = 0;
        poly.link_count = 0;
    }

    let mut i = 0;
    while i < links.len() {
        let owner = links[i].poly as usize;
        let start = i;
        while i < links.len() && links[i].poly as usize == owner {
            i += 1;
        }
        if let Some(poly) = tile.polys.get_mut(owner) {
            poly.link_base = start as u32;
            poly.link_count = (i - start) as u16;
        }
    }

    tile.links = links;
}

fn encode(tile: &MeshTile, codec: &RefCodec, poly: usize) -> PolyRef {
    codec.encode(tile.salt, tile.index() as u32, poly as u32)
}

/// Links between ground polygons of the same tile
///
/// Edges carrying an internal neighbor index link to it directly. Edges without
/// neighbor are matched against the other ground polygons through their shared
/// vertex pair.
pub(crate) fn build_int_links(tile: &MeshTile, codec: &RefCodec) -> Vec<Link> {
    let mut edges: HashMap<(u16, u16), Vec<usize>> = HashMap::new();
    for (i, poly) in tile.polys.iter().enumerate() {
        if poly.is_off_mesh_connection() {
            continue;
        }
        let nv = poly.vert_count as usize;
        for j in 0..nv {
            if poly.neis[j] & EXT_LINK != 0 {
                continue;
            }
            let (a, b) = (poly.verts[j], poly.verts[(j + 1) % nv]);
            edges.entry((a.min(b), a.max(b))).or_default().push(i);
        }
    }

    let mut links = Vec::new();
    for (i, poly) in tile.polys.iter().enumerate() {
        if poly.is_off_mesh_connection() {
            continue;
        }
        let nv = poly.vert_count as usize;
        for j in 0..nv {
            let nei = poly.neis[j];
            if nei & EXT_LINK != 0 {
                continue;
            }
            let target = if nei != 0 {
                Some(nei as usize - 1)
            } else {
                let (a, b) = (poly.verts[j], poly.verts[(j + 1) % nv]);
                edges
                    .get(&(a.min(b), a.max(b)))
                    .and_then(|owners| owners.iter().copied().find(|&p| p != i))
            };
            if let Some(target) = target {
                links.push(Link {
                    reference: encode(tile, codec, target),
                    poly: i as u16,
                    edge: j as u8,
                    side: LINK_INTERNAL,
                    bmin: 0,
                    bmax: 0,
                });
            }
        }
    }
    links
}

/// Links the off-mesh connections of a tile to the ground polygons below their
/// endpoints, snapping the connection vertices onto the mesh
pub(crate) fn build_off_mesh_links(tile: &mut MeshTile, codec: &RefCodec) -> Vec<Link> {
    let mut links = Vec::new();
    let climb = tile.walkable_climb();

    for k in 0..tile.off_mesh_cons.len() {
        let con = tile.off_mesh_cons[k];
        let con_ref = encode(tile, codec, con.poly as usize);
        let extents = [con.rad, climb, con.rad];

        for (end, pos) in [con.start_pos(), con.end_pos()].iter().enumerate() {
            let landing = find_nearest_poly_in_tile(tile, codec, pos, &extents)
                .filter(|(_, nearest)| vdist_2d_sqr(nearest, pos) <= con.rad * con.rad);
            let Some((land_ref, nearest)) = landing else {
                warn!(
                    "Off-mesh connection {} of tile ({}, {}) has no polygon under endpoint {}",
                    k, tile.x, tile.y, end
                );
                continue;
            };

            let vert = tile.polys[con.poly as usize].verts[end] as usize;
            tile.verts[vert] = nearest;

            links.push(Link {
                reference: land_ref,
                poly: con.poly,
                edge: end as u8,
                side: LINK_INTERNAL,
                bmin: 0,
                bmax: 0,
            });
            // The start is always reachable from the ground, the end only both ways
            if end == 0 || con.is_bidirectional() {
                links.push(Link {
                    reference: con_ref,
                    poly: codec.decode_poly(land_ref) as u16,
                    edge: 0xff,
                    side: LINK_INTERNAL,
                    bmin: 0,
                    bmax: 0,
                });
            }
        }
    }
    links
}

/// Axis across a tile side
#[inline]
fn slab_axis(side: u8) -> usize {
    if side & 1 == 0 {
        0
    } else {
        2
    }
}

/// Axis along a tile side
#[inline]
fn edge_axis(side: u8) -> usize {
    if side & 1 == 0 {
        2
    } else {
        0
    }
}

/// Edge endpoints as (along, height) pairs ordered along the side
fn calc_slab_end_points(va: &[f32; 3], vb: &[f32; 3], side: u8) -> ([f32; 2], [f32; 2]) {
    let u = edge_axis(side);
    let a = [va[u], va[1]];
    let b = [vb[u], vb[1]];
    if a[0] < b[0] {
        (a, b)
    } else {
        (b, a)
    }
}

/// Overlap test of two edges lying on the same tile side
///
/// `px` shrinks the intervals along the side, `py` is the height tolerance.
fn overlap_slabs(amin: &[f32; 2], amax: &[f32; 2], bmin: &[f32; 2], bmax: &[f32; 2], px: f32, py: f32) -> bool {
    let minx = (amin[0] + px).max(bmin[0] + px);
    let maxx = (amax[0] - px).min(bmax[0] - px);
    if minx > maxx {
        return false;
    }

    let ad = (amax[1] - amin[1]) / (amax[0] - amin[0]);
    let ak = amin[1] - ad * amin[0];
    let bd = (bmax[1] - bmin[1]) / (bmax[0] - bmin[0]);
    let bk = bmin[1] - bd * bmin[0];
    let aminy = ad * minx + ak;
    let amaxy = ad * maxx + ak;
    let bminy = bd * minx + bk;
    let bmaxy = bd * maxx + bk;
    let dmin = bminy - aminy;
    let dmax = bmaxy - amaxy;

    // Crossing segments always overlap
    if dmin * dmax < 0.0 {
        return true;
    }

    let thr = (py * 2.0) * (py * 2.0);
    dmin * dmin <= thr || dmax * dmax <= thr
}

/// Polygons of `target` with an edge on `side` touching the segment `va`-`vb`
///
/// Returns each polygon with the overlap interval along the side.
fn find_connecting_polys(
    va: &[f32; 3],
    vb: &[f32; 3],
    target: &MeshTile,
    codec: &RefCodec,
    side: u8,
) -> Vec<(PolyRef, f32, f32)> {
    let (amin, amax) = calc_slab_end_points(va, vb, side);
    let apos = va[slab_axis(side)];
    let marker = EXT_LINK | side as u16;
    let climb = target.walkable_climb();

    let mut found = Vec::new();
    for (i, poly) in target.polys.iter().enumerate() {
        let nv = poly.vert_count as usize;
        for j in 0..nv {
            if poly.neis[j] != marker {
                continue;
            }
            let vc = &target.verts[poly.verts[j] as usize];
            let vd = &target.verts[poly.verts[(j + 1) % nv] as usize];
            if (apos - vc[slab_axis(side)]).abs() > 0.01 {
                continue;
            }
            let (bmin, bmax) = calc_slab_end_points(vc, vd, side);
            if !overlap_slabs(&amin, &amax, &bmin, &bmax, 0.01, climb) {
                continue;
            }
            found.push((encode(target, codec, i), amin[0].max(bmin[0]), amax[0].min(bmax[0])));
            break;
        }
    }
    found
}

/// Quantized portal interval along the edge `va`-`vb`
fn portal_range(va: &[f32; 3], vb: &[f32; 3], umin: f32, umax: f32, side: u8) -> (u8, u8) {
    let u = edge_axis(side);
    let d = vb[u] - va[u];
    if d.abs() <= f32::EPSILON {
        return (0, 255);
    }
    let mut tmin = (umin - va[u]) / d;
    let mut tmax = (umax - va[u]) / d;
    if tmin > tmax {
        std::mem::swap(&mut tmin, &mut tmax);
    }
    let quantize = |t: f32| (t.clamp(0.0, 1.0) * 255.0).round() as u8;
    (quantize(tmin), quantize(tmax))
}

/// Portal links from the border edges of `tile` on `side` into `target`
pub(crate) fn connect_ext_links(tile: &MeshTile, target: &MeshTile, codec: &RefCodec, side: u8) -> Vec<Link> {
    let marker = EXT_LINK | side as u16;
    let target_side = opposite_side(side);

    let mut links = Vec::new();
    for (i, poly) in tile.polys.iter().enumerate() {
        let nv = poly.vert_count as usize;
        for j in 0..nv {
            if poly.neis[j] != marker {
                continue;
            }
            let va = &tile.verts[poly.verts[j] as usize];
            let vb = &tile.verts[poly.verts[(j + 1) % nv] as usize];
            for (reference, umin, umax) in find_connecting_polys(va, vb, target, codec, target_side) {
                let (bmin, bmax) = portal_range(va, vb, umin, umax, side);
                links.push(Link {
                    reference,
                    poly: i as u16,
                    edge: j as u8,
                    side,
                    bmin,
                    bmax,
                });
            }
        }
    }
    links
}

/// Drops every link of `tile` leading into the tile slot `removed`
pub(crate) fn unconnect_ext_links(tile: &mut MeshTile, codec: &RefCodec, removed: usize) {
    let before = tile.links.len();
    let links: Vec<Link> = tile
        .links
        .iter()
        .copied()
        .filter(|l| codec.decode_tile(l.reference) as usize != removed)
        .collect();
    if links.len() != before {
        debug!(
            "Tile ({}, {}) dropped {} links into slot {}",
            tile.x,
            tile.y,
            before - links.len(),
            removed
        );
        store_links(tile, links);
    }
}
