//! Primitive feature shells, generated ring by ring in chart space.
//!
//! Every builder grows a surface from a rim polygon that lies exactly on
//! the base surface (h = 0). The surface fill punches the same polygon as a
//! hole, so welding closes the mesh with no seams. Vertex order is
//! deterministic throughout; curved shapes use a fixed number of rings
//! derived from the segment count.
//!
//! Winding conventions (chart u right, v up, h toward the viewer):
//! - rim and ring polygons are CCW;
//! - walls are stitched from the ring nearer the surface toward the next
//!   ring along the feature's own direction (up for embossed shells, down
//!   for recess cavities), which makes their normals face away from the
//!   solid in both cases;
//! - flat caps fan CCW (they face +h whether they close an embossed top or
//!   a recess floor).

use nalgebra::Point3;

use crate::chart::SurfaceChart;
use crate::errors::CsgResult;
use crate::fill::{boundary_edges, circle_loop, fill_region};
use crate::mesh::MeshBuilder;

/// Rings with fewer than this radius collapse to an apex point
const APEX_RADIUS_MM: f64 = 1e-4;

/// Map a 2D ring to world points at a given height above the surface
pub fn world_ring(chart: &dyn SurfaceChart, ring: &[[f32; 2]], h: f64) -> Vec<Point3<f64>> {
    ring.iter().map(|&uv| chart.to_world(uv, h)).collect()
}

/// Stitch two equal-length rings with a quad strip.
/// `from` is the ring nearer the base surface.
pub fn stitch_rings(builder: &mut MeshBuilder, from: &[Point3<f64>], to: &[Point3<f64>]) {
    debug_assert_eq!(from.len(), to.len());
    let n = from.len();
    for i in 0..n {
        let j = (i + 1) % n;
        builder.triangle(from[i], from[j], to[j]);
        builder.triangle(from[i], to[j], to[i]);
    }
}

/// Close a ring onto an apex point (embossed tip or recess pole)
pub fn ring_to_apex(builder: &mut MeshBuilder, ring: &[Point3<f64>], apex: Point3<f64>) {
    let n = ring.len();
    for i in 0..n {
        let j = (i + 1) % n;
        builder.triangle(ring[i], ring[j], apex);
    }
}

/// Flat cap over a ring, fanned from its center, facing +h
pub fn cap_fan(builder: &mut MeshBuilder, center: Point3<f64>, ring: &[Point3<f64>]) {
    let n = ring.len();
    for i in 0..n {
        let j = (i + 1) % n;
        builder.triangle(center, ring[i], ring[j]);
    }
}

/// Flat cap facing −h; closes the base of a detached feature solid
pub fn cap_fan_down(builder: &mut MeshBuilder, center: Point3<f64>, ring: &[Point3<f64>]) {
    let n = ring.len();
    for i in 0..n {
        let j = (i + 1) % n;
        builder.triangle(center, ring[j], ring[i]);
    }
}

/// Embossed truncated cone. Returns the CCW rim polygon for hole punching.
pub fn emboss_frustum(
    builder: &mut MeshBuilder,
    chart: &dyn SurfaceChart,
    center: [f32; 2],
    base_radius: f64,
    top_radius: f64,
    height: f64,
    segments: u32,
) -> Vec<[f32; 2]> {
    let rim = circle_loop(center, base_radius as f32, segments, 0.0);
    let base = world_ring(chart, &rim, 0.0);

    if top_radius < APEX_RADIUS_MM {
        let apex = chart.to_world(center, height);
        ring_to_apex(builder, &base, apex);
    } else {
        let top2 = circle_loop(center, top_radius as f32, segments, 0.0);
        let top = world_ring(chart, &top2, height);
        stitch_rings(builder, &base, &top);
        cap_fan(builder, chart.to_world(center, height), &top);
    }
    rim
}

/// Radius of the sphere carrying a spherical cap of opening radius `a` and
/// height `h`: R = (a² + h²) / (2h)
pub fn cap_sphere_radius(opening_radius: f64, height: f64) -> f64 {
    (opening_radius * opening_radius + height * height) / (2.0 * height)
}

/// Embossed rounded dot: truncated cone base topped by a spherical cap.
/// Returns the CCW rim polygon.
#[allow(clippy::too_many_arguments)]
pub fn emboss_rounded_dot(
    builder: &mut MeshBuilder,
    chart: &dyn SurfaceChart,
    center: [f32; 2],
    base_radius: f64,
    base_height: f64,
    dome_radius: f64,
    dome_height: f64,
    segments: u32,
) -> Vec<[f32; 2]> {
    let rim = circle_loop(center, base_radius as f32, segments, 0.0);
    let base = world_ring(chart, &rim, 0.0);

    let dome_rim2 = circle_loop(center, dome_radius as f32, segments, 0.0);
    let dome_rim = world_ring(chart, &dome_rim2, base_height);
    stitch_rings(builder, &base, &dome_rim);

    // Spherical cap: center sits below the apex by the sphere radius
    let sphere_r = cap_sphere_radius(dome_radius, dome_height);
    let center_h = base_height + dome_height - sphere_r;
    let rim_alpha = ((sphere_r - dome_height) / sphere_r).acos();

    let rings = cap_ring_count(segments);
    let mut previous = dome_rim;
    for k in 1..rings {
        let alpha = rim_alpha * (1.0 - k as f64 / rings as f64);
        let r = sphere_r * alpha.sin();
        let h = center_h + sphere_r * alpha.cos();
        let ring2 = circle_loop(center, r as f32, segments, 0.0);
        let ring = world_ring(chart, &ring2, h);
        stitch_rings(builder, &previous, &ring);
        previous = ring;
    }
    let apex = chart.to_world(center, base_height + dome_height);
    ring_to_apex(builder, &previous, apex);
    rim
}

/// Recessed spherical cap (bowl). Depth ≤ 0 falls back to a hemisphere of
/// the opening radius. Returns the CCW rim polygon.
pub fn recess_sphere_cap(
    builder: &mut MeshBuilder,
    chart: &dyn SurfaceChart,
    center: [f32; 2],
    opening_radius: f64,
    depth: f64,
    segments: u32,
) -> Vec<[f32; 2]> {
    let depth = if depth > APEX_RADIUS_MM {
        depth
    } else {
        opening_radius
    };
    let sphere_r = cap_sphere_radius(opening_radius, depth);
    // Sphere center on the axis, above the pole by the sphere radius
    let center_h = sphere_r - depth;
    let rim_alpha = (-(center_h) / sphere_r).acos();

    let rim = circle_loop(center, opening_radius as f32, segments, 0.0);
    let rings = cap_ring_count(segments);
    let mut previous = world_ring(chart, &rim, 0.0);
    for k in 1..rings {
        let alpha = rim_alpha + (std::f64::consts::PI - rim_alpha) * k as f64 / rings as f64;
        let r = sphere_r * alpha.sin();
        let h = center_h + sphere_r * alpha.cos();
        let ring2 = circle_loop(center, r as f32, segments, 0.0);
        let ring = world_ring(chart, &ring2, h);
        stitch_rings(builder, &previous, &ring);
        previous = ring;
    }
    let pole = chart.to_world(center, -depth);
    ring_to_apex(builder, &previous, pole);
    rim
}

/// Recessed truncated cone. Returns the CCW rim polygon.
pub fn recess_frustum(
    builder: &mut MeshBuilder,
    chart: &dyn SurfaceChart,
    center: [f32; 2],
    opening_radius: f64,
    bottom_radius: f64,
    depth: f64,
    segments: u32,
) -> Vec<[f32; 2]> {
    let rim = circle_loop(center, opening_radius as f32, segments, 0.0);
    let top = world_ring(chart, &rim, 0.0);

    if bottom_radius < APEX_RADIUS_MM {
        let pole = chart.to_world(center, -depth);
        ring_to_apex(builder, &top, pole);
    } else {
        let bottom2 = circle_loop(center, bottom_radius as f32, segments, 0.0);
        let bottom = world_ring(chart, &bottom2, -depth);
        stitch_rings(builder, &top, &bottom);
        cap_fan(builder, chart.to_world(center, -depth), &bottom);
    }
    rim
}

/// Recessed prism: flat floor at −depth under the footprint, vertical walls
/// along every footprint boundary loop. Handles footprints with interior
/// islands (glyph counters). Returns nothing extra: the caller already owns
/// the footprint loops it will punch.
pub fn recess_prism(
    builder: &mut MeshBuilder,
    chart: &dyn SurfaceChart,
    loops: &[Vec<[f32; 2]>],
    depth: f64,
) -> CsgResult<()> {
    let floor = fill_region(loops)?;

    // Floor facing up into the cavity
    let world: Vec<Point3<f64>> = floor
        .verts
        .iter()
        .map(|&uv| chart.to_world(uv, -depth))
        .collect();
    for tri in &floor.tris {
        builder.triangle(
            world[tri[0] as usize],
            world[tri[1] as usize],
            world[tri[2] as usize],
        );
    }

    // Walls from the surface rim down to the floor rim
    for (a, b) in boundary_edges(&floor.tris) {
        let ua = floor.verts[a as usize];
        let ub = floor.verts[b as usize];
        let a0 = chart.to_world(ua, 0.0);
        let b0 = chart.to_world(ub, 0.0);
        let ad = chart.to_world(ua, -depth);
        let bd = chart.to_world(ub, -depth);
        builder.triangle(a0, b0, bd);
        builder.triangle(a0, bd, ad);
    }
    Ok(())
}

fn cap_ring_count(segments: u32) -> usize {
    (segments as usize / 4).max(3)
}

/// Right-pointing isosceles triangle footprint (CCW), used by the row-end
/// marker. `size` is both the width and the height of the triangle.
pub fn triangle_loop(center: [f32; 2], size: f32) -> Vec<[f32; 2]> {
    let half = size / 2.0;
    vec![
        [center[0] + half, center[1]],
        [center[0] - half, center[1] + half],
        [center[0] - half, center[1] - half],
    ]
}

/// Axis-aligned rectangle footprint (CCW)
pub fn rect_loop(center: [f32; 2], width: f32, depth: f32) -> Vec<[f32; 2]> {
    let hw = width / 2.0;
    let hd = depth / 2.0;
    vec![
        [center[0] - hw, center[1] - hd],
        [center[0] + hw, center[1] - hd],
        [center[0] + hw, center[1] + hd],
        [center[0] - hw, center[1] + hd],
    ]
}

/// Triangulate the ring between two CCW loops on the same plane, merging
/// by angle around `center`. `flip` reverses the facing (+h ↔ −h).
pub fn zip_annulus(
    builder: &mut MeshBuilder,
    outer: &[Point3<f64>],
    inner: &[Point3<f64>],
    center: [f64; 2],
    flip: bool,
) {
    let angle_of = |p: &Point3<f64>| (p.y - center[1]).atan2(p.x - center[0]);

    // Unwrapped ascending angle sequences starting from each ring's first
    // vertex; the merge walks both a full revolution.
    let unwrap = |ring: &[Point3<f64>]| -> Vec<f64> {
        let mut angles = Vec::with_capacity(ring.len() + 1);
        let first = angle_of(&ring[0]);
        let mut prev = first;
        angles.push(first);
        for p in &ring[1..] {
            let mut a = angle_of(p);
            while a < prev {
                a += std::f64::consts::TAU;
            }
            angles.push(a);
            prev = a;
        }
        angles.push(first + std::f64::consts::TAU);
        angles
    };

    let oa = unwrap(outer);
    let ia = unwrap(inner);
    // Align the inner start to the outer start's revolution
    let shift = {
        let mut s = ia[0];
        while s < oa[0] {
            s += std::f64::consts::TAU;
        }
        while s >= oa[0] + std::f64::consts::TAU {
            s -= std::f64::consts::TAU;
        }
        s - ia[0]
    };

    let n = outer.len();
    let m = inner.len();
    let mut i = 0usize;
    let mut j = 0usize;

    let mut emit = |a: Point3<f64>, b: Point3<f64>, c: Point3<f64>| {
        if flip {
            builder.triangle(a, c, b);
        } else {
            builder.triangle(a, b, c);
        }
    };

    while i < n || j < m {
        let advance_outer = if i >= n {
            false
        } else if j >= m {
            true
        } else {
            oa[i + 1] <= ia[j + 1] + shift
        };
        if advance_outer {
            emit(outer[i % n], outer[(i + 1) % n], inner[j % m]);
            i += 1;
        } else {
            emit(outer[i % n], inner[(j + 1) % m], inner[j % m]);
            j += 1;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::PlateChart;
    use crate::healing::verify_mesh;

    fn chart() -> PlateChart {
        PlateChart { thickness: 2.0 }
    }

    /// Closing the rim with a downward cap must make each shell watertight.
    fn assert_closed_with_base(build: impl FnOnce(&mut MeshBuilder, &PlateChart) -> Vec<[f32; 2]>) {
        let chart = chart();
        let mut builder = MeshBuilder::new();
        let rim = build(&mut builder, &chart);
        let base = world_ring(&chart, &rim, 0.0);
        let center = rim_center(&rim);
        cap_fan_down(&mut builder, chart.to_world(center, 0.0), &base);
        let mesh = builder.build();
        let report = verify_mesh(&mesh);
        assert_eq!(report.boundary_edges, 0, "boundary edges in shell");
        assert!(report.consistent_winding, "winding flipped in shell");
        assert!(mesh.signed_volume().abs() > 0.0);
    }

    fn rim_center(rim: &[[f32; 2]]) -> [f32; 2] {
        let mut c = [0.0f32, 0.0];
        for p in rim {
            c[0] += p[0];
            c[1] += p[1];
        }
        [c[0] / rim.len() as f32, c[1] / rim.len() as f32]
    }

    #[test]
    fn frustum_shell_closes() {
        assert_closed_with_base(|b, chart| {
            emboss_frustum(b, chart, [10.0, 10.0], 0.8, 0.2, 0.9, 24)
        });
    }

    #[test]
    fn pointed_cone_shell_closes() {
        assert_closed_with_base(|b, chart| {
            emboss_frustum(b, chart, [10.0, 10.0], 0.8, 0.0, 0.9, 24)
        });
    }

    #[test]
    fn rounded_dot_shell_closes() {
        assert_closed_with_base(|b, chart| {
            emboss_rounded_dot(b, chart, [5.0, 5.0], 0.75, 0.5, 0.5, 0.5, 24)
        });
    }

    #[test]
    fn rounded_dot_volume_is_positive_and_bounded() {
        let chart = chart();
        let mut builder = MeshBuilder::new();
        let rim = emboss_rounded_dot(&mut builder, &chart, [5.0, 5.0], 0.75, 0.5, 0.5, 0.5, 24);
        let base = world_ring(&chart, &rim, 0.0);
        cap_fan_down(&mut builder, chart.to_world([5.0, 5.0], 0.0), &base);
        let mesh = builder.build();
        let volume = mesh.signed_volume();
        // Coarse sanity: between the dome cylinder and the base cylinder
        assert!(volume > 0.0);
        assert!(volume < std::f64::consts::PI * 0.75 * 0.75 * 1.0);
    }

    #[test]
    fn bowl_cap_sphere_radius_matches_formula() {
        // Opening radius 0.9, depth 0.8 ⇒ R = (0.9² + 0.8²) / (2·0.8)
        assert!((cap_sphere_radius(0.9, 0.8) - 0.90625).abs() < 1e-9);
        // A hemisphere is the cap whose depth equals its opening radius
        assert!((cap_sphere_radius(1.0, 1.0) - 1.0).abs() < 1e-12);
    }

    #[test]
    fn bowl_shell_closes_and_reaches_depth() {
        let chart = chart();
        let mut builder = MeshBuilder::new();
        let rim = recess_sphere_cap(&mut builder, &chart, [8.0, 8.0], 0.9, 0.8, 24);
        let base = world_ring(&chart, &rim, 0.0);
        cap_fan_down(&mut builder, chart.to_world([8.0, 8.0], 0.0), &base);
        let mesh = builder.build();
        let report = verify_mesh(&mesh);
        assert_eq!(report.boundary_edges, 0);
        let min_z = mesh
            .positions
            .iter()
            .map(|p| p.z)
            .fold(f64::INFINITY, f64::min);
        assert!((min_z - (2.0 - 0.8)).abs() < 1e-9);
    }

    #[test]
    fn zero_depth_bowl_falls_back_to_hemisphere() {
        let chart = chart();
        let mut builder = MeshBuilder::new();
        recess_sphere_cap(&mut builder, &chart, [8.0, 8.0], 0.9, 0.0, 24);
        let mesh = builder.build();
        let min_z = mesh
            .positions
            .iter()
            .map(|p| p.z)
            .fold(f64::INFINITY, f64::min);
        // Hemisphere of radius 0.9 under a 2 mm surface
        assert!((min_z - (2.0 - 0.9)).abs() < 1e-9);
    }

    #[test]
    fn recess_prism_with_island_closes() {
        let chart = chart();
        let mut builder = MeshBuilder::new();
        // Square footprint with a square island: like a glyph counter
        let outer = rect_loop([10.0, 10.0], 4.0, 4.0);
        let island = crate::fill::reversed(rect_loop([10.0, 10.0], 1.0, 1.0));
        recess_prism(&mut builder, &chart, &[outer.clone(), island.clone()], 0.6).unwrap();

        // Close the top by filling the footprint region itself
        let top = fill_region(&[outer, island]).unwrap();
        for tri in &top.tris {
            let p: Vec<_> = tri
                .iter()
                .map(|&i| chart.to_world(top.verts[i as usize], 0.0))
                .collect();
            // Facing −h to close the cavity from above for the test
            builder.triangle(p[0], p[2], p[1]);
        }
        let mesh = builder.build();
        let report = verify_mesh(&mesh);
        assert_eq!(report.boundary_edges, 0);
        assert!(report.consistent_winding);
    }

    #[test]
    fn zip_annulus_closes_between_rings() {
        let chart = chart();
        let mut builder = MeshBuilder::new();
        let outer2 = circle_loop([0.0, 0.0], 10.0, 60, 0.0);
        let inner2 = circle_loop([0.0, 0.0], 5.0, 12, 0.0);
        let outer = world_ring(&chart, &outer2, 0.0);
        let inner = world_ring(&chart, &inner2, 0.0);
        zip_annulus(&mut builder, &outer, &inner, [0.0, 0.0], false);
        let mesh = builder.build();
        // Boundary must be exactly the two rings
        let report = verify_mesh(&mesh);
        assert_eq!(report.boundary_edges, 60 + 12);
        assert!(report.consistent_winding);
        // All normals face +z
        for i in 0..mesh.triangle_count() {
            assert!(mesh.triangle_normal_raw(i).z > 0.0);
        }
    }
}
