//! Bounding-volume hierarchy for broad-phase queries and ray casts.
//!
//! The tree is built by deterministic median split on the longest axis, so
//! identical inputs give identical trees. It backs two things: footprint
//! overlap detection before surface composition, and the point-in-mesh ray
//! test used by the degraded-path checks.

use nalgebra::{Point3, Vector3};

use crate::mesh::{Aabb, TriMesh};

const RAY_EPSILON: f64 = 1e-10;

#[derive(Debug, Clone)]
enum BvhNode {
    Leaf {
        aabb: Aabb,
        start: usize,
        count: usize,
    },
    Internal {
        aabb: Aabb,
        left: usize,
        right: usize,
    },
}

#[derive(Debug, Clone)]
pub struct Bvh {
    nodes: Vec<BvhNode>,
    /// Item indices, permuted so leaves reference contiguous runs
    items: Vec<u32>,
    boxes: Vec<Aabb>,
}

const LEAF_SIZE: usize = 4;

impl Bvh {
    pub fn build(boxes: Vec<Aabb>) -> Self {
        let mut items: Vec<u32> = (0..boxes.len() as u32).collect();
        let mut bvh = Bvh {
            nodes: Vec::new(),
            items: Vec::new(),
            boxes,
        };
        if !items.is_empty() {
            let n = items.len();
            bvh.split(&mut items, 0, n);
        }
        bvh.items = items;
        bvh
    }

    fn range_aabb(&self, items: &[u32], start: usize, count: usize) -> Aabb {
        let mut aabb = Aabb::empty();
        for &item in &items[start..start + count] {
            aabb = aabb.merge(&self.boxes[item as usize]);
        }
        aabb
    }

    fn split(&mut self, items: &mut [u32], start: usize, count: usize) -> usize {
        let aabb = self.range_aabb(items, start, count);
        if count <= LEAF_SIZE {
            self.nodes.push(BvhNode::Leaf { aabb, start, count });
            return self.nodes.len() - 1;
        }

        // Longest axis of the range's box; ties resolve x, y, z
        let size = aabb.max - aabb.min;
        let axis = if size.x >= size.y && size.x >= size.z {
            0
        } else if size.y >= size.z {
            1
        } else {
            2
        };

        let slice = &mut items[start..start + count];
        slice.sort_by(|&a, &b| {
            let ca = self.boxes[a as usize].center()[axis];
            let cb = self.boxes[b as usize].center()[axis];
            ca.partial_cmp(&cb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let half = count / 2;
        let node_index = self.nodes.len();
        self.nodes.push(BvhNode::Leaf {
            aabb,
            start: 0,
            count: 0,
        }); // placeholder
        let left = self.split(items, start, half);
        let right = self.split(items, start + half, count - half);
        self.nodes[node_index] = BvhNode::Internal { aabb, left, right };
        node_index
    }

    /// Collect indices of items whose box intersects `query`
    pub fn query(&self, query: &Aabb, out: &mut Vec<u32>) {
        if self.nodes.is_empty() {
            return;
        }
        let mut stack = vec![0usize];
        while let Some(node) = stack.pop() {
            match &self.nodes[node] {
                BvhNode::Leaf { aabb, start, count } => {
                    if aabb.intersects(query) {
                        for &item in &self.items[*start..*start + *count] {
                            if self.boxes[item as usize].intersects(query) {
                                out.push(item);
                            }
                        }
                    }
                }
                BvhNode::Internal { aabb, left, right } => {
                    if aabb.intersects(query) {
                        stack.push(*right);
                        stack.push(*left);
                    }
                }
            }
        }
    }

    /// All intersecting pairs (i < j), sorted
    pub fn overlapping_pairs(&self) -> Vec<(u32, u32)> {
        let mut pairs = Vec::new();
        let mut hits = Vec::new();
        for i in 0..self.boxes.len() as u32 {
            hits.clear();
            self.query(&self.boxes[i as usize], &mut hits);
            for &j in &hits {
                if j > i {
                    pairs.push((i, j));
                }
            }
        }
        pairs.sort_unstable();
        pairs
    }
}

/// Möller–Trumbore ray/triangle intersection, front and back faces alike
pub fn ray_intersects_triangle(
    origin: &Point3<f64>,
    direction: &Vector3<f64>,
    p0: &Point3<f64>,
    p1: &Point3<f64>,
    p2: &Point3<f64>,
) -> bool {
    let edge1 = p1 - p0;
    let edge2 = p2 - p0;

    let h = direction.cross(&edge2);
    let a = edge1.dot(&h);
    if a.abs() < RAY_EPSILON {
        return false;
    }

    let f = 1.0 / a;
    let s = origin - p0;
    let u = f * s.dot(&h);
    if !(0.0..=1.0).contains(&u) {
        return false;
    }

    let q = s.cross(&edge1);
    let v = f * direction.dot(&q);
    if v < 0.0 || u + v > 1.0 {
        return false;
    }

    let t = f * edge2.dot(&q);
    t > RAY_EPSILON
}

fn ray_hits_aabb(origin: &Point3<f64>, inv_dir: &Vector3<f64>, aabb: &Aabb) -> bool {
    let mut t_min = 0.0_f64;
    let mut t_max = f64::INFINITY;
    for axis in 0..3 {
        let t1 = (aabb.min[axis] - origin[axis]) * inv_dir[axis];
        let t2 = (aabb.max[axis] - origin[axis]) * inv_dir[axis];
        let (lo, hi) = if t1 <= t2 { (t1, t2) } else { (t2, t1) };
        t_min = t_min.max(lo);
        t_max = t_max.min(hi);
        if t_min > t_max {
            return false;
        }
    }
    true
}

/// A mesh paired with a BVH over its triangles, for inside/outside tests
pub struct MeshIndex<'a> {
    mesh: &'a TriMesh,
    bvh: Bvh,
}

impl<'a> MeshIndex<'a> {
    pub fn build(mesh: &'a TriMesh) -> Self {
        let boxes = (0..mesh.triangle_count())
            .map(|i| Aabb::around(mesh.triangle_points(i)))
            .collect();
        MeshIndex {
            mesh,
            bvh: Bvh::build(boxes),
        }
    }

    /// Parity ray cast in +X. Points on the surface count as inside.
    pub fn contains(&self, point: &Point3<f64>) -> bool {
        let direction = Vector3::new(1.0, 0.0, 0.0);
        // Nudge the ray off axis-aligned geometry to dodge edge-grazing
        let direction = Vector3::new(direction.x, 1e-4, 2e-4).normalize();
        let inv_dir = Vector3::new(1.0 / direction.x, 1.0 / direction.y, 1.0 / direction.z);

        let mut crossings = 0usize;
        let mut stack = vec![0usize];
        if self.bvh.nodes.is_empty() {
            return false;
        }
        while let Some(node) = stack.pop() {
            match &self.bvh.nodes[node] {
                BvhNode::Leaf { aabb, start, count } => {
                    if ray_hits_aabb(point, &inv_dir, aabb) {
                        for &item in &self.bvh.items[*start..*start + *count] {
                            let [p0, p1, p2] = self.mesh.triangle_points(item as usize);
                            if ray_intersects_triangle(point, &direction, &p0, &p1, &p2) {
                                crossings += 1;
                            }
                        }
                    }
                }
                BvhNode::Internal { aabb, left, right } => {
                    if ray_hits_aabb(point, &inv_dir, aabb) {
                        stack.push(*right);
                        stack.push(*left);
                    }
                }
            }
        }
        crossings % 2 == 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshBuilder;

    fn p(x: f64, y: f64, z: f64) -> Point3<f64> {
        Point3::new(x, y, z)
    }

    fn unit_cube() -> TriMesh {
        let mut b = MeshBuilder::new();
        let v = [
            p(0.0, 0.0, 0.0),
            p(1.0, 0.0, 0.0),
            p(1.0, 1.0, 0.0),
            p(0.0, 1.0, 0.0),
            p(0.0, 0.0, 1.0),
            p(1.0, 0.0, 1.0),
            p(1.0, 1.0, 1.0),
            p(0.0, 1.0, 1.0),
        ];
        // Quads wound outward
        let quads = [
            [0, 3, 2, 1], // bottom
            [4, 5, 6, 7], // top
            [0, 1, 5, 4], // front
            [2, 3, 7, 6], // back
            [0, 4, 7, 3], // left
            [1, 2, 6, 5], // right
        ];
        for q in quads {
            b.triangle(v[q[0]], v[q[1]], v[q[2]]);
            b.triangle(v[q[0]], v[q[2]], v[q[3]]);
        }
        b.build()
    }

    #[test]
    fn overlapping_pairs_finds_touching_boxes() {
        let boxes = vec![
            Aabb::around([p(0.0, 0.0, 0.0), p(1.0, 1.0, 1.0)]),
            Aabb::around([p(0.5, 0.5, 0.5), p(1.5, 1.5, 1.5)]),
            Aabb::around([p(5.0, 5.0, 5.0), p(6.0, 6.0, 6.0)]),
        ];
        let bvh = Bvh::build(boxes);
        assert_eq!(bvh.overlapping_pairs(), vec![(0, 1)]);
    }

    #[test]
    fn query_on_empty_tree_is_empty() {
        let bvh = Bvh::build(Vec::new());
        let mut out = Vec::new();
        bvh.query(&Aabb::around([p(0.0, 0.0, 0.0)]), &mut out);
        assert!(out.is_empty());
    }

    #[test]
    fn ray_hits_facing_triangle() {
        let origin = p(0.0, 0.25, 0.25);
        let dir = Vector3::new(1.0, 0.0, 0.0);
        assert!(ray_intersects_triangle(
            &origin,
            &dir,
            &p(1.0, 0.0, 0.0),
            &p(1.0, 1.0, 0.0),
            &p(1.0, 0.0, 1.0),
        ));
        assert!(!ray_intersects_triangle(
            &origin,
            &dir,
            &p(-1.0, 0.0, 0.0),
            &p(-1.0, 1.0, 0.0),
            &p(-1.0, 0.0, 1.0),
        ));
    }

    #[test]
    fn cube_contains_center_not_outside() {
        let cube = unit_cube();
        let index = MeshIndex::build(&cube);
        assert!(index.contains(&p(0.5, 0.5, 0.5)));
        assert!(!index.contains(&p(1.5, 0.5, 0.5)));
        assert!(!index.contains(&p(-0.5, 0.3, 0.4)));
    }
}
