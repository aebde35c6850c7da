//! Indexed triangle mesh with welded vertices.
//!
//! All meshes in the engine go through [`MeshBuilder`], which merges
//! vertices within 1e-6 mm by coordinate quantization. Vertex and triangle
//! order follow insertion order, so identical build sequences produce
//! identical meshes.

use nalgebra::{Point3, Vector3};
use std::collections::HashMap;

/// Weld resolution: vertices within this distance collapse to one
pub const WELD_TOLERANCE_MM: f64 = 1e-6;
const QUANT_SCALE: f64 = 1.0 / WELD_TOLERANCE_MM;

/// Axis-aligned bounding box
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Aabb {
    pub min: Point3<f64>,
    pub max: Point3<f64>,
}

impl Aabb {
    pub fn empty() -> Self {
        Aabb {
            min: Point3::new(f64::MAX, f64::MAX, f64::MAX),
            max: Point3::new(f64::MIN, f64::MIN, f64::MIN),
        }
    }

    pub fn around(points: impl IntoIterator<Item = Point3<f64>>) -> Self {
        let mut aabb = Aabb::empty();
        for p in points {
            aabb.expand(&p);
        }
        aabb
    }

    pub fn expand(&mut self, p: &Point3<f64>) {
        self.min.x = self.min.x.min(p.x);
        self.min.y = self.min.y.min(p.y);
        self.min.z = self.min.z.min(p.z);
        self.max.x = self.max.x.max(p.x);
        self.max.y = self.max.y.max(p.y);
        self.max.z = self.max.z.max(p.z);
    }

    pub fn merge(&self, other: &Aabb) -> Aabb {
        Aabb {
            min: Point3::new(
                self.min.x.min(other.min.x),
                self.min.y.min(other.min.y),
                self.min.z.min(other.min.z),
            ),
            max: Point3::new(
                self.max.x.max(other.max.x),
                self.max.y.max(other.max.y),
                self.max.z.max(other.max.z),
            ),
        }
    }

    pub fn intersects(&self, other: &Aabb) -> bool {
        self.min.x <= other.max.x
            && self.max.x >= other.min.x
            && self.min.y <= other.max.y
            && self.max.y >= other.min.y
            && self.min.z <= other.max.z
            && self.max.z >= other.min.z
    }

    pub fn contains_point(&self, p: &Point3<f64>) -> bool {
        p.x >= self.min.x
            && p.x <= self.max.x
            && p.y >= self.min.y
            && p.y <= self.max.y
            && p.z >= self.min.z
            && p.z <= self.max.z
    }

    pub fn center(&self) -> Point3<f64> {
        nalgebra::center(&self.min, &self.max)
    }
}

/// Final triangle mesh
#[derive(Debug, Clone, Default)]
pub struct TriMesh {
    pub positions: Vec<Point3<f64>>,
    pub triangles: Vec<[u32; 3]>,
}

impl TriMesh {
    pub fn vertex_count(&self) -> usize {
        self.positions.len()
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn is_empty(&self) -> bool {
        self.triangles.is_empty()
    }

    pub fn triangle_points(&self, index: usize) -> [Point3<f64>; 3] {
        let [a, b, c] = self.triangles[index];
        [
            self.positions[a as usize],
            self.positions[b as usize],
            self.positions[c as usize],
        ]
    }

    /// Unnormalized triangle normal (right-hand rule over CCW winding)
    pub fn triangle_normal_raw(&self, index: usize) -> Vector3<f64> {
        let [p0, p1, p2] = self.triangle_points(index);
        (p1 - p0).cross(&(p2 - p0))
    }

    pub fn aabb(&self) -> Aabb {
        Aabb::around(self.positions.iter().copied())
    }

    /// Signed volume by the divergence theorem. Positive for closed meshes
    /// with outward-facing CCW triangles.
    pub fn signed_volume(&self) -> f64 {
        let mut volume = 0.0;
        for tri in &self.triangles {
            let p0 = self.positions[tri[0] as usize].coords;
            let p1 = self.positions[tri[1] as usize].coords;
            let p2 = self.positions[tri[2] as usize].coords;
            volume += p0.dot(&p1.cross(&p2));
        }
        volume / 6.0
    }
}

fn quantize(value: f64) -> i64 {
    (value * QUANT_SCALE).round() as i64
}

/// Builds a welded [`TriMesh`] incrementally
#[derive(Debug, Default)]
pub struct MeshBuilder {
    positions: Vec<Point3<f64>>,
    triangles: Vec<[u32; 3]>,
    index_of: HashMap<(i64, i64, i64), u32>,
    /// Swap winding of every added triangle. Set while emitting through a
    /// mirrored chart, whose mapping reverses orientation.
    flip: bool,
}

impl MeshBuilder {
    pub fn new() -> Self {
        MeshBuilder::default()
    }

    pub fn set_flip(&mut self, flip: bool) {
        self.flip = flip;
    }

    pub fn vertex(&mut self, p: Point3<f64>) -> u32 {
        let key = (quantize(p.x), quantize(p.y), quantize(p.z));
        if let Some(&index) = self.index_of.get(&key) {
            return index;
        }
        let index = self.positions.len() as u32;
        self.positions.push(p);
        self.index_of.insert(key, index);
        index
    }

    /// Add one triangle; collapsed triangles (two welded corners) are
    /// dropped here rather than surviving into the healing pass.
    pub fn triangle(&mut self, p0: Point3<f64>, p1: Point3<f64>, p2: Point3<f64>) {
        let a = self.vertex(p0);
        let b = self.vertex(p1);
        let c = self.vertex(p2);
        if a == b || b == c || a == c {
            return;
        }
        if self.flip {
            self.triangles.push([a, c, b]);
        } else {
            self.triangles.push([a, b, c]);
        }
    }

    pub fn triangle_count(&self) -> usize {
        self.triangles.len()
    }

    pub fn build(self) -> TriMesh {
        TriMesh {
            positions: self.positions,
            triangles: self.triangles,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    #[test]
    fn builder_welds_vertices_within_tolerance() {
        let mut builder = MeshBuilder::new();
        let a = builder.vertex(p(1.0, 2.0, 3.0));
        let b = builder.vertex(p(1.0 + 1e-8, 2.0, 3.0 - 1e-8));
        assert_eq!(a, b);
        let c = builder.vertex(p(1.0 + 1e-3, 2.0, 3.0));
        assert_ne!(a, c);
    }

    #[test]
    fn builder_drops_collapsed_triangles() {
        let mut builder = MeshBuilder::new();
        builder.triangle(p(0.0, 0.0, 0.0), p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0));
        assert_eq!(builder.triangle_count(), 0);
        builder.triangle(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0));
        assert_eq!(builder.triangle_count(), 1);
    }

    #[test]
    fn unit_tetrahedron_volume() {
        // Outward-wound tetrahedron with vertices at the origin and units
        let mut builder = MeshBuilder::new();
        let o = p(0.0, 0.0, 0.0);
        let x = p(1.0, 0.0, 0.0);
        let y = p(0.0, 1.0, 0.0);
        let z = p(0.0, 0.0, 1.0);
        builder.triangle(o, y, x); // bottom (−z)
        builder.triangle(o, x, z); // front (−y)
        builder.triangle(o, z, y); // left (−x)
        builder.triangle(x, y, z); // slanted
        let mesh = builder.build();
        assert_eq!(mesh.triangle_count(), 4);
        assert!((mesh.signed_volume() - 1.0 / 6.0).abs() < 1e-12);
    }

    #[test]
    fn aabb_intersection() {
        let a = Aabb::around([p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)]);
        let b = Aabb::around([p(0.5, 0.5, 0.5), p(2.0, 2.0, 2.0)]);
        let c = Aabb::around([p(3.0, 3.0, 3.0), p(4.0, 4.0, 4.0)]);
        assert!(a.intersects(&b));
        assert!(!a.intersects(&c));
    }
}
