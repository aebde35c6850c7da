//! 2D surface fill for chart-space composition.
//!
//! The base's outward surface is tessellated as a 2D region: one outer
//! boundary loop plus one hole loop per feature footprint. Feature shells
//! later reuse the exact hole vertices, so the welded 3D mesh closes by
//! construction. Triangles are normalized to CCW so the mapped surface
//! always faces outward.

use lyon_path::math::Point;
use lyon_path::Path;
use lyon_tessellation::geometry_builder::VertexBuffers;
use lyon_tessellation::{BuffersBuilder, FillOptions, FillRule, FillTessellator, FillVertex};
use std::collections::HashMap;

use crate::errors::{CsgError, CsgResult};

/// Indexed 2D triangulation in chart coordinates
#[derive(Debug, Clone, Default)]
pub struct Mesh2 {
    pub verts: Vec<[f32; 2]>,
    pub tris: Vec<[u32; 3]>,
}

impl Mesh2 {
    pub fn signed_area(&self, tri: &[u32; 3]) -> f32 {
        let a = self.verts[tri[0] as usize];
        let b = self.verts[tri[1] as usize];
        let c = self.verts[tri[2] as usize];
        (b[0] - a[0]) * (c[1] - a[1]) - (c[0] - a[0]) * (b[1] - a[1])
    }

    /// Flip triangles with negative area so the whole mesh winds CCW
    pub fn normalize_ccw(&mut self) {
        let mut flips = Vec::new();
        for (i, tri) in self.tris.iter().enumerate() {
            if self.signed_area(tri) < 0.0 {
                flips.push(i);
            }
        }
        for i in flips {
            self.tris[i].swap(1, 2);
        }
    }
}

/// Tessellate a region described by polygon loops (NonZero fill rule).
///
/// Loop winding matters: a CCW outer loop minus CW holes yields the outer
/// region with openings; a lone CW loop (e.g. a glyph contour) fills its
/// interior.
pub fn fill_region(loops: &[Vec<[f32; 2]>]) -> CsgResult<Mesh2> {
    let mut builder = Path::builder();
    for polygon in loops {
        if polygon.len() < 3 {
            return Err(CsgError::failed("fill region loop has fewer than 3 points"));
        }
        builder.begin(Point::new(polygon[0][0], polygon[0][1]));
        for p in &polygon[1..] {
            builder.line_to(Point::new(p[0], p[1]));
        }
        builder.close();
    }
    let path = builder.build();

    let mut buffers: VertexBuffers<Point, u32> = VertexBuffers::new();
    let mut tessellator = FillTessellator::new();
    tessellator
        .tessellate_path(
            &path,
            &FillOptions::default()
                .with_fill_rule(FillRule::NonZero)
                .with_tolerance(0.01),
            &mut BuffersBuilder::new(&mut buffers, |v: FillVertex| v.position()),
        )
        .map_err(|e| CsgError::failed(format!("surface fill failed: {:?}", e)))?;

    let mut mesh = Mesh2 {
        verts: buffers.vertices.iter().map(|p| [p.x, p.y]).collect(),
        tris: buffers
            .indices
            .chunks_exact(3)
            .map(|c| [c[0], c[1], c[2]])
            .collect(),
    };
    mesh.normalize_ccw();
    Ok(mesh)
}

/// Boundary edges of a triangulation, oriented as wound by their triangle,
/// sorted for deterministic downstream stitching.
pub fn boundary_edges(tris: &[[u32; 3]]) -> Vec<(u32, u32)> {
    let mut counts: HashMap<(u32, u32), u32> = HashMap::new();
    let mut oriented: HashMap<(u32, u32), (u32, u32)> = HashMap::new();

    for tri in tris {
        let edges = [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])];
        for &(a, b) in &edges {
            let key = if a < b { (a, b) } else { (b, a) };
            *counts.entry(key).or_insert(0) += 1;
            oriented.entry(key).or_insert((a, b));
        }
    }

    let mut result: Vec<(u32, u32)> = counts
        .into_iter()
        .filter(|(_, count)| *count == 1)
        .map(|(key, _)| oriented[&key])
        .collect();
    result.sort_unstable();
    result
}

const MAX_REFINE_PASSES: usize = 32;

/// Split interior triangle edges whose u-extent exceeds `max_du` at their
/// midpoint until none remain. Both triangles sharing an edge split
/// together, so the triangulation stays conforming. Boundary edges (the
/// region outline and the feature rims) are never split: rims must stay
/// vertex-identical with the feature shells welded onto them, and the
/// outline is seeded at the target resolution by the caller. Used by the
/// cylinder backend to keep mapped interior edges within one wall facet.
pub fn refine_max_edge_u(mesh: &mut Mesh2, max_du: f32) {
    for _ in 0..MAX_REFINE_PASSES {
        // Undirected edges with incidence counts, in deterministic order
        let mut counts: HashMap<(u32, u32), u32> = HashMap::new();
        for tri in &mesh.tris {
            let edges = [(tri[0], tri[1]), (tri[1], tri[2]), (tri[2], tri[0])];
            for &(a, b) in &edges {
                let key = if a < b { (a, b) } else { (b, a) };
                *counts.entry(key).or_insert(0) += 1;
            }
        }

        let mut long_edges: Vec<(u32, u32)> = counts
            .into_iter()
            .filter(|&((a, b), count)| {
                count == 2 && {
                    let du = (mesh.verts[a as usize][0] - mesh.verts[b as usize][0]).abs();
                    du > max_du
                }
            })
            .map(|(key, _)| key)
            .collect();
        if long_edges.is_empty() {
            return;
        }
        long_edges.sort_unstable();

        for (a, b) in long_edges {
            split_edge(mesh, a, b);
        }
    }
}

fn split_edge(mesh: &mut Mesh2, a: u32, b: u32) {
    let pa = mesh.verts[a as usize];
    let pb = mesh.verts[b as usize];
    let mid = [(pa[0] + pb[0]) * 0.5, (pa[1] + pb[1]) * 0.5];
    let m = mesh.verts.len() as u32;
    mesh.verts.push(mid);

    let mut new_tris = Vec::with_capacity(mesh.tris.len() + 2);
    for tri in &mesh.tris {
        let mut replaced = false;
        for i in 0..3 {
            let (x, y) = (tri[i], tri[(i + 1) % 3]);
            if (x == a && y == b) || (x == b && y == a) {
                let z = tri[(i + 2) % 3];
                new_tris.push([x, m, z]);
                new_tris.push([m, y, z]);
                replaced = true;
                break;
            }
        }
        if !replaced {
            new_tris.push(*tri);
        }
    }
    mesh.tris = new_tris;
}

/// Closed polygon approximating a circle: `segments` vertices, CCW,
/// starting at `phase` radians.
pub fn circle_loop(center: [f32; 2], radius: f32, segments: u32, phase: f32) -> Vec<[f32; 2]> {
    let mut points = Vec::with_capacity(segments as usize);
    for i in 0..segments {
        let angle = phase + 2.0 * std::f32::consts::PI * i as f32 / segments as f32;
        points.push([
            center[0] + radius * angle.cos(),
            center[1] + radius * angle.sin(),
        ]);
    }
    points
}

/// Reverse a loop's winding (CCW ↔ CW)
pub fn reversed(mut polygon: Vec<[f32; 2]>) -> Vec<[f32; 2]> {
    polygon.reverse();
    polygon
}
