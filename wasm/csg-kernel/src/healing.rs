//! Mesh verification and the light healing pass.
//!
//! Composition is watertight by construction; this module proves it after
//! the fact. Verification counts boundary and non-manifold edges, checks
//! orientability (every interior edge traversed once in each direction),
//! coordinate finiteness, and the Euler characteristic per connected
//! component. Healing removes degenerate triangles; vertex welding already
//! happened in the builder.

use std::collections::HashMap;

use crate::mesh::TriMesh;

/// Triangles with less area than this are degenerate
pub const DEGENERATE_AREA_MM2: f64 = 1e-12;

#[derive(Debug, Clone, PartialEq)]
pub struct MeshReport {
    pub boundary_edges: usize,
    pub non_manifold_edges: usize,
    pub consistent_winding: bool,
    pub all_finite: bool,
    pub degenerate_triangles: usize,
    pub components: usize,
    /// Sum of V − E + F over connected components (2 per closed genus-0
    /// shell, 0 for the genus-1 tube)
    pub euler_characteristic: i64,
}

impl MeshReport {
    pub fn is_watertight(&self) -> bool {
        self.boundary_edges == 0
            && self.non_manifold_edges == 0
            && self.consistent_winding
            && self.all_finite
            && self.degenerate_triangles == 0
    }
}

struct UnionFind {
    parent: Vec<u32>,
}

impl UnionFind {
    fn new(n: usize) -> Self {
        UnionFind {
            parent: (0..n as u32).collect(),
        }
    }

    fn find(&mut self, x: u32) -> u32 {
        let mut root = x;
        while self.parent[root as usize] != root {
            root = self.parent[root as usize];
        }
        let mut current = x;
        while self.parent[current as usize] != root {
            let next = self.parent[current as usize];
            self.parent[current as usize] = root;
            current = next;
        }
        root
    }

    fn union(&mut self, a: u32, b: u32) {
        let ra = self.find(a);
        let rb = self.find(b);
        if ra != rb {
            self.parent[rb as usize] = ra;
        }
    }
}

/// Full structural verification of a mesh
pub fn verify_mesh(mesh: &TriMesh) -> MeshReport {
    let mut all_finite = true;
    for p in &mesh.positions {
        if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
            all_finite = false;
            break;
        }
    }

    let mut degenerate_triangles = 0usize;
    for i in 0..mesh.triangle_count() {
        if mesh.triangle_normal_raw(i).norm() / 2.0 <= DEGENERATE_AREA_MM2 {
            degenerate_triangles += 1;
        }
    }

    // Directed edge counts per undirected key
    let mut edges: HashMap<(u32, u32), (u32, u32)> = HashMap::new();
    for tri in &mesh.triangles {
        for k in 0..3 {
            let a = tri[k];
            let b = tri[(k + 1) % 3];
            let entry = edges.entry((a.min(b), a.max(b))).or_insert((0, 0));
            if a < b {
                entry.0 += 1;
            } else {
                entry.1 += 1;
            }
        }
    }

    let mut boundary_edges = 0usize;
    let mut non_manifold_edges = 0usize;
    let mut consistent_winding = true;
    for (forward, backward) in edges.values() {
        let total = forward + backward;
        match total {
            1 => boundary_edges += 1,
            2 => {
                // Orientable interior edge: traversed once each way
                if *forward != 1 {
                    consistent_winding = false;
                }
            }
            _ => non_manifold_edges += 1,
        }
    }

    // Connected components over vertices used by triangles
    let mut uf = UnionFind::new(mesh.vertex_count());
    let mut used = vec![false; mesh.vertex_count()];
    for tri in &mesh.triangles {
        used[tri[0] as usize] = true;
        used[tri[1] as usize] = true;
        used[tri[2] as usize] = true;
        uf.union(tri[0], tri[1]);
        uf.union(tri[1], tri[2]);
    }

    let mut component_of: HashMap<u32, usize> = HashMap::new();
    let mut vertex_counts: Vec<i64> = Vec::new();
    for v in 0..mesh.vertex_count() as u32 {
        if !used[v as usize] {
            continue;
        }
        let root = uf.find(v);
        let next = vertex_counts.len();
        let id = *component_of.entry(root).or_insert(next);
        if id == vertex_counts.len() {
            vertex_counts.push(0);
        }
        vertex_counts[id] += 1;
    }

    let mut edge_counts = vec![0i64; vertex_counts.len()];
    for (a, b) in edges.keys() {
        let root = uf.find(*a);
        let _ = b;
        let id = component_of[&root];
        edge_counts[id] += 1;
    }
    let mut face_counts = vec![0i64; vertex_counts.len()];
    for tri in &mesh.triangles {
        let root = uf.find(tri[0]);
        let id = component_of[&root];
        face_counts[id] += 1;
    }

    let euler_characteristic = (0..vertex_counts.len())
        .map(|i| vertex_counts[i] - edge_counts[i] + face_counts[i])
        .sum();

    MeshReport {
        boundary_edges,
        non_manifold_edges,
        consistent_winding,
        all_finite,
        degenerate_triangles,
        components: vertex_counts.len(),
        euler_characteristic,
    }
}

/// Remove degenerate triangles. Vertices are left in place; the STL
/// serializer only walks triangles.
pub fn heal(mesh: TriMesh) -> TriMesh {
    let mut healed = TriMesh {
        positions: mesh.positions.clone(),
        triangles: Vec::with_capacity(mesh.triangle_count()),
    };
    for (i, tri) in mesh.triangles.iter().enumerate() {
        if mesh.triangle_normal_raw(i).norm() / 2.0 > DEGENERATE_AREA_MM2 {
            healed.triangles.push(*tri);
        }
    }
    healed
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshBuilder;
    use nalgebra::Point3;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    fn tetrahedron() -> TriMesh {
        let mut b = MeshBuilder::new();
        let o = p(0.0, 0.0, 0.0);
        let x = p(1.0, 0.0, 0.0);
        let y = p(0.0, 1.0, 0.0);
        let z = p(0.0, 0.0, 1.0);
        b.triangle(o, y, x);
        b.triangle(o, x, z);
        b.triangle(o, z, y);
        b.triangle(x, y, z);
        b.build()
    }

    #[test]
    fn closed_tetrahedron_is_watertight() {
        let report = verify_mesh(&tetrahedron());
        assert!(report.is_watertight());
        assert_eq!(report.boundary_edges, 0);
        assert_eq!(report.components, 1);
        assert_eq!(report.euler_characteristic, 2);
    }

    #[test]
    fn open_triangle_has_boundary() {
        let mut b = MeshBuilder::new();
        b.triangle(p(0.0, 0.0, 0.0), p(1.0, 0.0, 0.0), p(0.0, 1.0, 0.0));
        let report = verify_mesh(&b.build());
        assert_eq!(report.boundary_edges, 3);
        assert!(!report.is_watertight());
    }

    #[test]
    fn flipped_face_breaks_winding() {
        let mut mesh = tetrahedron();
        mesh.triangles[3].swap(1, 2);
        let report = verify_mesh(&mesh);
        assert!(!report.consistent_winding);
    }

    #[test]
    fn two_shells_double_the_euler_characteristic() {
        let a = tetrahedron();
        let mut b = MeshBuilder::new();
        for i in 0..a.triangle_count() {
            let [p0, p1, p2] = a.triangle_points(i);
            let shift = nalgebra::Vector3::new(10.0, 0.0, 0.0);
            b.triangle(p0 + shift, p1 + shift, p2 + shift);
            b.triangle(p0, p1, p2);
        }
        let report = verify_mesh(&b.build());
        assert_eq!(report.components, 2);
        assert_eq!(report.euler_characteristic, 4);
        assert!(report.is_watertight());
    }

    #[test]
    fn heal_drops_degenerate_triangles() {
        let mut mesh = tetrahedron();
        // A sliver with two distinct but colinear-by-area vertices
        let n = mesh.positions.len() as u32;
        mesh.positions.push(p(5.0, 5.0, 5.0));
        mesh.positions.push(p(6.0, 6.0, 6.0));
        mesh.positions.push(p(7.0, 7.0, 7.0));
        mesh.triangles.push([n, n + 1, n + 2]);
        assert_eq!(verify_mesh(&mesh).degenerate_triangles, 1);
        let healed = heal(mesh);
        assert_eq!(verify_mesh(&healed).degenerate_triangles, 0);
        assert_eq!(healed.triangle_count(), 4);
    }

    #[test]
    fn non_manifold_edge_detected() {
        let mut b = MeshBuilder::new();
        let a0 = p(0.0, 0.0, 0.0);
        let a1 = p(1.0, 0.0, 0.0);
        b.triangle(a0, a1, p(0.0, 1.0, 0.0));
        b.triangle(a0, a1, p(0.0, -1.0, 0.0));
        b.triangle(a0, a1, p(0.0, 0.0, 1.0));
        let report = verify_mesh(&b.build());
        assert_eq!(report.non_manifold_edges, 1);
        assert!(!report.is_watertight());
    }
}
