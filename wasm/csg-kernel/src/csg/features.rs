//! Executes planned feature shapes into a mesh builder.
//!
//! Shared by both backends: each shape contributes its shell triangles and
//! (unless detached) the punch loop the surface fill will cut out. Detached
//! embossed shapes are closed into free-standing solids embedded slightly
//! into the base so the degraded fallback still prints as one body.

use std::collections::BTreeSet;

use crate::chart::SurfaceChart;
use crate::errors::EngineResult;
use crate::fill::reversed;
use crate::mesh::MeshBuilder;
use crate::primitives::{
    cap_fan_down, emboss_frustum, emboss_rounded_dot, recess_frustum, recess_prism,
    recess_sphere_cap, stitch_rings, world_ring,
};

use super::plan::PlannedShape;
use super::JobContext;

/// Build every planned shape; returns the punch loops for the surface fill.
pub fn build_features(
    builder: &mut MeshBuilder,
    chart: &dyn SurfaceChart,
    planned: &[PlannedShape],
    detached: &BTreeSet<usize>,
    segments: u32,
    embed_depth: f64,
    ctx: &mut JobContext,
) -> EngineResult<Vec<Vec<[f32; 2]>>> {
    let mut punch_loops = Vec::new();
    let total = planned.len().max(1) as f64;

    for (index, shape) in planned.iter().enumerate() {
        ctx.checkpoint("features", index as f64 / total)?;

        match shape {
            PlannedShape::EmbossFrustum {
                center,
                base_radius,
                top_radius,
                height,
            } => {
                let rim = emboss_frustum(
                    builder,
                    chart,
                    *center,
                    *base_radius,
                    *top_radius,
                    *height,
                    segments,
                );
                finish_emboss(
                    builder,
                    chart,
                    rim,
                    *center,
                    detached.contains(&index),
                    embed_depth,
                    &mut punch_loops,
                );
            }
            PlannedShape::EmbossRounded {
                center,
                base_radius,
                base_height,
                dome_radius,
                dome_height,
            } => {
                let rim = emboss_rounded_dot(
                    builder,
                    chart,
                    *center,
                    *base_radius,
                    *base_height,
                    *dome_radius,
                    *dome_height,
                    segments,
                );
                finish_emboss(
                    builder,
                    chart,
                    rim,
                    *center,
                    detached.contains(&index),
                    embed_depth,
                    &mut punch_loops,
                );
            }
            PlannedShape::RecessCap {
                center,
                opening_radius,
                depth,
            } => {
                let rim =
                    recess_sphere_cap(builder, chart, *center, *opening_radius, *depth, segments);
                punch_loops.push(reversed(rim));
            }
            PlannedShape::RecessFrustum {
                center,
                opening_radius,
                bottom_radius,
                depth,
            } => {
                let rim = recess_frustum(
                    builder,
                    chart,
                    *center,
                    *opening_radius,
                    *bottom_radius,
                    *depth,
                    segments,
                );
                punch_loops.push(reversed(rim));
            }
            PlannedShape::RecessPrism { loops, depth } => {
                recess_prism(builder, chart, loops, *depth)?;
                punch_loops.extend(loops.iter().cloned());
            }
        }
    }
    Ok(punch_loops)
}

/// Either register the rim as a surface hole, or close the shape into a
/// detached solid sunk `embed_depth` into the base.
fn finish_emboss(
    builder: &mut MeshBuilder,
    chart: &dyn SurfaceChart,
    rim: Vec<[f32; 2]>,
    center: [f32; 2],
    detached: bool,
    embed_depth: f64,
    punch_loops: &mut Vec<Vec<[f32; 2]>>,
) {
    if !detached {
        punch_loops.push(reversed(rim));
        return;
    }
    let surface_ring = world_ring(chart, &rim, 0.0);
    let embedded_ring = world_ring(chart, &rim, -embed_depth);
    // Skirt runs from the embedded ring up to the surface rim
    stitch_rings(builder, &embedded_ring, &surface_ring);
    cap_fan_down(builder, chart.to_world(center, -embed_depth), &embedded_ring);
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::chart::PlateChart;
    use crate::csg::{JobContext, NullProgress};
    use crate::healing::verify_mesh;

    #[test]
    fn detached_emboss_forms_closed_solid() {
        let chart = PlateChart { thickness: 2.0 };
        let mut builder = MeshBuilder::new();
        let planned = vec![PlannedShape::EmbossFrustum {
            center: [10.0, 10.0],
            base_radius: 0.8,
            top_radius: 0.2,
            height: 0.9,
        }];
        let detached: BTreeSet<usize> = [0].into_iter().collect();
        let mut sink = NullProgress;
        let mut ctx = JobContext::unbounded(&mut sink);
        let punch =
            build_features(&mut builder, &chart, &planned, &detached, 24, 0.2, &mut ctx).unwrap();
        assert!(punch.is_empty(), "detached shapes punch no holes");
        let mesh = builder.build();
        let report = verify_mesh(&mesh);
        assert_eq!(report.boundary_edges, 0);
        assert!(report.consistent_winding);
        assert!(mesh.signed_volume() > 0.0);
    }

    #[test]
    fn attached_emboss_returns_punch_loop() {
        let chart = PlateChart { thickness: 2.0 };
        let mut builder = MeshBuilder::new();
        let planned = vec![PlannedShape::EmbossFrustum {
            center: [10.0, 10.0],
            base_radius: 0.8,
            top_radius: 0.2,
            height: 0.9,
        }];
        let mut sink = NullProgress;
        let mut ctx = JobContext::unbounded(&mut sink);
        let punch = build_features(
            &mut builder,
            &chart,
            &planned,
            &BTreeSet::new(),
            24,
            0.2,
            &mut ctx,
        )
        .unwrap();
        assert_eq!(punch.len(), 1);
        assert_eq!(punch[0].len(), 24);
    }
}
