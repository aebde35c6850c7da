//! Flat-plate backend.
//!
//! The card is a box whose top face is fill-tessellated around every
//! feature footprint; feature shells reuse the rim vertices, so the welded
//! result is a single closed solid. An AABB tree over the footprints is the
//! broad phase: embossed shapes whose footprints collide fall back to
//! detached closed shells (degraded, warned), colliding recesses cannot be
//! composed and fail the run.

use std::collections::BTreeSet;

use braille_plate_core::{Base, GeometrySpec};
use nalgebra::Point3;

use crate::bvh::Bvh;
use crate::chart::{AnyChart, SurfaceChart};
use crate::console;
use crate::errors::{CsgError, EngineResult};
use crate::fill::fill_region;
use crate::mesh::{Aabb, MeshBuilder, TriMesh};
use crate::primitives::stitch_rings;

use super::features::build_features;
use super::plan::{chart_for, PlannedShape};
use super::JobContext;

/// How deep detached fallback shells sink into the base
const DETACH_EMBED_MM: f64 = 0.2;

/// Broad-phase collision between footprints. Returns the detached set and
/// warnings, or an error when recesses collide.
pub(super) fn resolve_overlaps(
    planned: &[PlannedShape],
) -> Result<(BTreeSet<usize>, Vec<String>), CsgError> {
    let boxes: Vec<Aabb> = planned
        .iter()
        .map(|shape| {
            let (min, max) = shape.bounds();
            Aabb::around([
                Point3::new(min[0] as f64, min[1] as f64, 0.0),
                Point3::new(max[0] as f64, max[1] as f64, 0.0),
            ])
        })
        .collect();
    let bvh = Bvh::build(boxes);

    let mut detached = BTreeSet::new();
    let mut warnings = Vec::new();
    for (a, b) in bvh.overlapping_pairs() {
        let (a, b) = (a as usize, b as usize);
        if planned[a].is_emboss() && planned[b].is_emboss() {
            detached.insert(a);
            detached.insert(b);
            let warning = format!(
                "footprints of features {} and {} overlap; emitting them as detached shells",
                a, b
            );
            console::warn(&warning);
            warnings.push(warning);
        } else {
            return Err(CsgError::failed(format!(
                "recess footprints of features {} and {} overlap and cannot be composed",
                a, b
            )));
        }
    }
    Ok((detached, warnings))
}

/// Compose the full card mesh. Returns (mesh, warnings, degraded).
pub fn compose_card(
    spec: &GeometrySpec,
    planned: &[PlannedShape],
    segments: u32,
    ctx: &mut JobContext,
) -> EngineResult<(TriMesh, Vec<String>, bool)> {
    let Base::Card {
        width,
        height,
        thickness,
    } = spec.base
    else {
        return Err(CsgError::bad_spec("flat backend invoked for a non-card base").into());
    };
    let chart = chart_for(spec);

    let (detached, warnings) = resolve_overlaps(planned)?;
    let degraded = !detached.is_empty();

    let mut builder = MeshBuilder::new();
    let embed = DETACH_EMBED_MM.min(thickness / 2.0);
    let punch_loops = build_features(
        &mut builder,
        &chart,
        planned,
        &detached,
        segments,
        embed,
        ctx,
    )?;

    // Top face: the card rectangle minus every footprint
    ctx.checkpoint("surface", 0.75)?;
    let w = width as f32;
    let h = height as f32;
    let corners = [[0.0_f32, 0.0], [w, 0.0], [w, h], [0.0, h]];
    let mut loops = vec![corners.to_vec()];
    loops.extend(punch_loops);
    let top = fill_region(&loops)?;
    for tri in &top.tris {
        builder.triangle(
            chart_point(&chart, &top.verts, tri[0]),
            chart_point(&chart, &top.verts, tri[1]),
            chart_point(&chart, &top.verts, tri[2]),
        );
    }

    // Bottom face and side walls
    ctx.checkpoint("base", 0.85)?;
    let bottom: Vec<Point3<f64>> = corners
        .iter()
        .map(|c| Point3::new(c[0] as f64, c[1] as f64, 0.0))
        .collect();
    builder.triangle(bottom[0], bottom[3], bottom[2]);
    builder.triangle(bottom[0], bottom[2], bottom[1]);

    let top_ring: Vec<Point3<f64>> = corners.iter().map(|&c| chart.to_world(c, 0.0)).collect();
    stitch_rings(&mut builder, &bottom, &top_ring);

    Ok((builder.build(), warnings, degraded))
}

fn chart_point(chart: &AnyChart, verts: &[[f32; 2]], index: u32) -> Point3<f64> {
    chart.to_world(verts[index as usize], 0.0)
}
