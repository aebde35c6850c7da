//! Binary STL serialization.
//!
//! Layout: an 80-byte zero-padded header that must not begin with the
//! ASCII bytes `solid` (many parsers would mis-detect ASCII STL), a u32
//! little-endian triangle count, then 50 bytes per triangle: unit normal
//! (recomputed from the vertices, right-hand rule), three vertices, and a
//! zero attribute word. All f32 little-endian, coordinates in millimeters.

use crate::errors::{CsgError, CsgResult};
use crate::mesh::TriMesh;

const HEADER_BYTES: usize = 80;
const HEADER_TEXT: &[u8] = b"Braille plate binary STL";
const TRIANGLE_RECORD_BYTES: usize = 50;

/// Serialize a mesh to binary STL bytes
pub fn write_binary_stl(mesh: &TriMesh) -> CsgResult<Vec<u8>> {
    if mesh.is_empty() {
        return Err(CsgError::serializer("refusing to serialize an empty mesh"));
    }
    let triangle_count = mesh.triangle_count();
    if triangle_count > u32::MAX as usize {
        return Err(CsgError::serializer("triangle count exceeds the STL limit"));
    }

    let mut bytes = Vec::with_capacity(HEADER_BYTES + 4 + TRIANGLE_RECORD_BYTES * triangle_count);
    bytes.extend_from_slice(HEADER_TEXT);
    bytes.resize(HEADER_BYTES, 0);
    bytes.extend_from_slice(&(triangle_count as u32).to_le_bytes());

    for index in 0..triangle_count {
        let points = mesh.triangle_points(index);
        for p in &points {
            if !(p.x.is_finite() && p.y.is_finite() && p.z.is_finite()) {
                return Err(CsgError::serializer(format!(
                    "triangle {} has a non-finite vertex",
                    index
                )));
            }
        }

        let raw = mesh.triangle_normal_raw(index);
        let length = raw.norm();
        let normal = if length > 0.0 { raw / length } else { raw };
        for value in [normal.x, normal.y, normal.z] {
            bytes.extend_from_slice(&(value as f32).to_le_bytes());
        }
        for p in &points {
            for value in [p.x, p.y, p.z] {
                bytes.extend_from_slice(&(value as f32).to_le_bytes());
            }
        }
        bytes.extend_from_slice(&0u16.to_le_bytes());
    }
    Ok(bytes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mesh::MeshBuilder;
    use nalgebra::Point3;
    use std::io::Cursor;

    fn tetrahedron() -> TriMesh {
        let mut b = MeshBuilder::new();
        let o = Point3::new(0.0, 0.0, 0.0);
        let x = Point3::new(10.0, 0.0, 0.0);
        let y = Point3::new(0.0, 10.0, 0.0);
        let z = Point3::new(0.0, 0.0, 10.0);
        b.triangle(o, y, x);
        b.triangle(o, x, z);
        b.triangle(o, z, y);
        b.triangle(x, y, z);
        b.build()
    }

    #[test]
    fn header_does_not_start_with_solid() {
        let bytes = write_binary_stl(&tetrahedron()).unwrap();
        assert_ne!(&bytes[0..5], b"solid");
        assert_eq!(bytes.len(), 80 + 4 + 50 * 4);
    }

    #[test]
    fn triangle_count_is_little_endian_at_offset_80() {
        let bytes = write_binary_stl(&tetrahedron()).unwrap();
        let count = u32::from_le_bytes(bytes[80..84].try_into().unwrap());
        assert_eq!(count, 4);
    }

    #[test]
    fn attribute_words_are_zero() {
        let bytes = write_binary_stl(&tetrahedron()).unwrap();
        for i in 0..4 {
            let offset = 84 + i * 50 + 48;
            assert_eq!(&bytes[offset..offset + 2], &[0, 0]);
        }
    }

    #[test]
    fn round_trips_through_stl_io() {
        // Parsing recovers the triangle count and vertex data
        let mesh = tetrahedron();
        let bytes = write_binary_stl(&mesh).unwrap();
        let parsed = stl_io::read_stl(&mut Cursor::new(&bytes)).unwrap();
        assert_eq!(parsed.faces.len(), mesh.triangle_count());

        for (index, face) in parsed.faces.iter().enumerate() {
            let expected = mesh.triangle_points(index);
            for (corner, &vertex_index) in face.vertices.iter().enumerate() {
                let parsed_vertex = parsed.vertices[vertex_index];
                for axis in 0..3 {
                    let expected_value = expected[corner][axis] as f32;
                    assert_eq!(parsed_vertex[axis], expected_value);
                }
            }
        }
    }

    #[test]
    fn parsed_normals_match_right_hand_rule() {
        let mesh = tetrahedron();
        let bytes = write_binary_stl(&mesh).unwrap();
        let parsed = stl_io::read_stl(&mut Cursor::new(&bytes)).unwrap();
        for (index, face) in parsed.faces.iter().enumerate() {
            let expected = mesh.triangle_normal_raw(index).normalize();
            for axis in 0..3 {
                assert!((face.normal[axis] - expected[axis] as f32).abs() < 1e-6);
            }
        }
    }

    #[test]
    fn serialization_is_deterministic() {
        let mesh = tetrahedron();
        assert_eq!(
            write_binary_stl(&mesh).unwrap(),
            write_binary_stl(&mesh).unwrap()
        );
    }

    #[test]
    fn empty_mesh_is_a_serializer_error() {
        let err = write_binary_stl(&TriMesh::default()).unwrap_err();
        assert_eq!(err.code, crate::errors::CsgErrorCode::SerializerError);
    }

    #[test]
    fn non_finite_vertex_is_a_serializer_error() {
        let mut mesh = tetrahedron();
        mesh.positions[0].x = f64::NAN;
        let err = write_binary_stl(&mesh).unwrap_err();
        assert_eq!(err.code, crate::errors::CsgErrorCode::SerializerError);
    }
}
