//! Cylinder backend.
//!
//! The shell is a polygonal tube: the outer wall is the unrolled chart
//! rectangle fill-tessellated around feature footprints, refined so no edge
//! spans more than one wall facet, then mapped onto the cylinder; the inner
//! wall is the regular N-gon cutout, and annular rings close both ends into
//! a genus-1 solid. Features are generated in cylinder-local chart space
//! and batch-composed in one pass over the feature list.

use braille_plate_core::{Base, GeometrySpec};
use nalgebra::Point3;

use crate::chart::SurfaceChart;
use crate::errors::{CsgError, EngineResult};
use crate::fill::{boundary_edges, fill_region, refine_max_edge_u, Mesh2};
use crate::mesh::{MeshBuilder, TriMesh};
use crate::primitives::{stitch_rings, zip_annulus};

use super::features::build_features;
use super::flat::resolve_overlaps;
use super::plan::{chart_for, PlannedShape};
use super::{JobContext, OUTER_WALL_FACETS};

const DETACH_EMBED_MM: f64 = 0.2;
const SEAM_SNAP_MM: f32 = 1e-3;

/// Compose the full cylinder mesh. Returns (mesh, warnings, degraded).
pub fn compose_cylinder(
    spec: &GeometrySpec,
    planned: &[PlannedShape],
    segments: u32,
    ctx: &mut JobContext,
) -> EngineResult<(TriMesh, Vec<String>, bool)> {
    let Base::Cylinder {
        diameter,
        height,
        wall_thickness,
        polygon_sides,
        seam_offset_deg,
    } = spec.base
    else {
        return Err(CsgError::bad_spec("cylinder backend invoked for a non-cylinder base").into());
    };
    let chart = chart_for(spec);
    let radius = diameter / 2.0;
    let cutout_radius = radius - wall_thickness;
    let circumference = std::f64::consts::TAU * radius;
    let facets = OUTER_WALL_FACETS as usize;

    let (detached, warnings) = resolve_overlaps(planned)?;
    let degraded = !detached.is_empty();

    let mut builder = MeshBuilder::new();
    builder.set_flip(chart.flips_orientation());
    let embed = DETACH_EMBED_MM.min(wall_thickness / 2.0);
    let punch_loops = build_features(
        &mut builder,
        &chart,
        planned,
        &detached,
        segments,
        embed,
        ctx,
    )?;

    // Outer wall: the unrolled rectangle minus footprints. Top and bottom
    // edges are seeded with one point per facet so the mapped wall keeps
    // the regular outer polygon.
    ctx.checkpoint("surface", 0.7)?;
    let height_f = height as f32;
    let us: Vec<f32> = (0..=facets)
        .map(|k| (circumference * k as f64 / facets as f64) as f32)
        .collect();
    let mut outer_loop: Vec<[f32; 2]> = Vec::with_capacity(2 * facets + 2);
    for &u in &us {
        outer_loop.push([u, 0.0]);
    }
    for &u in us.iter().rev() {
        outer_loop.push([u, height_f]);
    }

    let mut loops = vec![outer_loop];
    loops.extend(punch_loops);
    let mut wall = fill_region(&loops)?;
    let max_du = (circumference / facets as f64) as f32 * 1.01;
    refine_max_edge_u(&mut wall, max_du);
    close_seam(&mut wall, circumference as f32);

    for tri in &wall.tris {
        builder.triangle(
            chart.to_world(wall.verts[tri[0] as usize], 0.0),
            chart.to_world(wall.verts[tri[1] as usize], 0.0),
            chart.to_world(wall.verts[tri[2] as usize], 0.0),
        );
    }

    // End rings and the inner wall are built in world space with explicit
    // windings; the chart's orientation flip no longer applies.
    builder.set_flip(false);
    ctx.checkpoint("base", 0.8)?;

    let mut outer_bottom = boundary_ring(&chart, &wall, 0.0);
    let mut outer_top = boundary_ring(&chart, &wall, height_f);
    if outer_bottom.len() < 3 || outer_top.len() < 3 {
        return Err(CsgError::failed("cylinder wall lost its end rings").into());
    }
    if chart.flips_orientation() {
        outer_bottom.reverse();
        outer_top.reverse();
    }

    let seam_rad = seam_offset_deg.to_radians();
    let inner_ring = |z: f64| -> Vec<Point3<f64>> {
        (0..polygon_sides)
            .map(|j| {
                let theta = seam_rad + std::f64::consts::TAU * j as f64 / polygon_sides as f64;
                Point3::new(
                    cutout_radius * theta.cos(),
                    cutout_radius * theta.sin(),
                    z,
                )
            })
            .collect()
    };
    let inner_bottom = inner_ring(0.0);
    let inner_top = inner_ring(height);

    // Inner wall faces the cutout (toward the axis)
    stitch_rings(&mut builder, &inner_top, &inner_bottom);

    // Annular end rings close the tube into a genus-1 solid
    zip_annulus(&mut builder, &outer_top, &inner_top, [0.0, 0.0], false);
    zip_annulus(&mut builder, &outer_bottom, &inner_bottom, [0.0, 0.0], true);

    Ok((builder.build(), warnings, degraded))
}

/// Merge the chart seam: vertices on the u = circumference edge are
/// remapped onto their u = 0 counterparts, so the wall closes without
/// relying on proximity welding across the float gap.
fn close_seam(wall: &mut Mesh2, circumference: f32) {
    let mut remap: Vec<(u32, u32)> = Vec::new();
    for (i, vert) in wall.verts.iter().enumerate() {
        if (vert[0] - circumference).abs() < SEAM_SNAP_MM {
            for (j, other) in wall.verts.iter().enumerate() {
                if other[0].abs() < SEAM_SNAP_MM && (other[1] - vert[1]).abs() < SEAM_SNAP_MM {
                    remap.push((i as u32, j as u32));
                    break;
                }
            }
        }
    }
    for tri in &mut wall.tris {
        for index in tri.iter_mut() {
            if let Some(&(_, to)) = remap.iter().find(|(from, _)| from == index) {
                *index = to;
            }
        }
    }
}

/// The wall's boundary ring at a given v, as world points ordered by
/// ascending u. Exactly the vertices the wall mesh itself uses, so the end
/// rings weld onto the wall with no seams.
fn boundary_ring(
    chart: &crate::chart::AnyChart,
    wall: &Mesh2,
    v_target: f32,
) -> Vec<Point3<f64>> {
    let mut indices: Vec<u32> = Vec::new();
    for (a, b) in boundary_edges(&wall.tris) {
        for index in [a, b] {
            let v = wall.verts[index as usize][1];
            if (v - v_target).abs() < SEAM_SNAP_MM && !indices.contains(&index) {
                indices.push(index);
            }
        }
    }
    indices.sort_by(|&a, &b| {
        wall.verts[a as usize][0]
            .partial_cmp(&wall.verts[b as usize][0])
            .unwrap_or(std::cmp::Ordering::Equal)
    });
    indices
        .into_iter()
        .map(|i| chart.to_world(wall.verts[i as usize], 0.0))
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::csg::test_support::{run, spec_from};
    use serde_json::json;

    fn cylinder_spec(plate: &str) -> GeometrySpec {
        spec_from(json!({
            "shapeType": "cylinder",
            "plateType": plate,
            "lines": ["⠁⠃⠉"],
            "settings": {
                "cylinderDiameter": 30.8,
                "cylinderHeight": 52.0,
                "cylinderPolygonalCutoutSides": 12,
                "cylinderPolygonalCutoutRadius": 13.0,
                "seamOffsetDeg": 0.0
            }
        }))
    }

    #[test]
    fn tube_volume_matches_polygonal_shell() {
        let spec = spec_from(json!({
            "shapeType": "cylinder",
            "plateType": "positive",
            "lines": ["⠀⠁"],
            "settings": {
                "cylinderDiameter": 30.8,
                "cylinderHeight": 52.0,
                "cylinderPolygonalCutoutSides": 12,
                "cylinderPolygonalCutoutRadius": 13.0
            }
        }));
        let outcome = run(&spec);
        let volume = outcome.mesh.signed_volume();

        // Outer wall is at least a 60-gon; inner cutout a 12-gon
        let poly_area = |r: f64, n: f64| 0.5 * n * r * r * (std::f64::consts::TAU / n).sin();
        let outer = poly_area(15.4, 60.0) * 52.0;
        let inner = poly_area(13.0, 12.0) * 52.0;
        assert!(volume > (outer - inner) * 0.98);
        assert!(volume < (std::f64::consts::PI * 15.4 * 15.4 - inner * 0.99) * 52.0);
    }

    #[test]
    fn mirrored_counter_cylinder_is_watertight() {
        let spec = cylinder_spec("negative");
        let outcome = run(&spec);
        assert!(outcome.report.is_watertight(), "{:?}", outcome.report);
        assert_eq!(outcome.report.euler_characteristic, 0);
        assert!(outcome.mesh.signed_volume() > 0.0);
    }

    #[test]
    fn triangle_cutout_composes() {
        // polygonSides = 3: the cutout is a triangle
        let spec = spec_from(json!({
            "shapeType": "cylinder",
            "plateType": "positive",
            "lines": ["⠁"],
            "settings": {
                "cylinderPolygonalCutoutSides": 3,
                "cylinderPolygonalCutoutRadius": 10.0
            }
        }));
        let outcome = run(&spec);
        assert!(outcome.report.is_watertight(), "{:?}", outcome.report);
    }

    #[test]
    fn near_circular_cutout_composes() {
        // polygonSides = 128: visually circular
        let spec = spec_from(json!({
            "shapeType": "cylinder",
            "plateType": "positive",
            "lines": ["⠁"],
            "settings": {
                "cylinderPolygonalCutoutSides": 128,
                "cylinderPolygonalCutoutRadius": 13.0
            }
        }));
        let outcome = run(&spec);
        assert!(outcome.report.is_watertight(), "{:?}", outcome.report);
    }

    #[test]
    fn seam_offset_rotates_content_not_topology() {
        let base = run(&cylinder_spec("positive"));
        let rotated = run(&spec_from(json!({
            "shapeType": "cylinder",
            "plateType": "positive",
            "lines": ["⠁⠃⠉"],
            "settings": {
                "cylinderDiameter": 30.8,
                "cylinderHeight": 52.0,
                "cylinderPolygonalCutoutSides": 12,
                "cylinderPolygonalCutoutRadius": 13.0,
                "seamOffsetDeg": 90.0
            }
        })));
        assert!(rotated.report.is_watertight());
        assert_eq!(
            base.mesh.triangle_count(),
            rotated.mesh.triangle_count()
        );
        assert!((base.mesh.signed_volume() - rotated.mesh.signed_volume()).abs() < 1.0);
    }
}
