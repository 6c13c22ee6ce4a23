//! CPU-side mesh data and simple loaders
//!
//! A [`MeshData`] is the flat vertex and index list handed to the GPU upload
//! path. It can come from one of the built-in primitives or from a Wavefront
//! OBJ file.

use crate::foundation::aabb::Aabb;
use crate::foundation::math::{Vec2, Vec3};
use std::io::BufRead;
use std::path::Path;
use thiserror::Error;

/// Errors raised while building mesh data
#[derive(Error, Debug)]
pub enum MeshDataError {
    /// IO error
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
    /// Malformed line in an OBJ file
    #[error("Parse error on line {line}: {reason}")]
    Parse {
        /// 1-based line number
        line: usize,
        /// What went wrong
        reason: String,
    },
    /// Structurally invalid mesh
    #[error("Invalid mesh: {0}")]
    Invalid(String),
}

/// Vertex layout shared with the PBR shaders
#[repr(C)]
#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct Vertex {
    /// Object space position
    pub position: [f32; 3],
    /// Texture coordinates
    pub uv: [f32; 2],
    /// Object space normal
    pub normal: [f32; 3],
    /// Tangent with handedness in `w`
    pub tangent: [f32; 4],
}

// SAFETY: Vertex is repr(C), Copy, and consists only of f32 arrays with no padding.
unsafe impl bytemuck::Pod for Vertex {}
// SAFETY: all-zero bit pattern is a valid Vertex.
unsafe impl bytemuck::Zeroable for Vertex {}

impl Vertex {
    /// Vertex with a default tangent along +X
    pub const fn new(position: [f32; 3], uv: [f32; 2], normal: [f32; 3]) -> Self {
        Self {
            position,
            uv,
            normal,
            tangent: [1.0, 0.0, 0.0, 1.0],
        }
    }
}

/// Triangle list with 32-bit indices
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MeshData {
    /// Vertices
    pub vertices: Vec<Vertex>,
    /// Three indices per triangle
    pub indices: Vec<u32>,
}

impl MeshData {
    /// Create from raw lists
    pub fn new(vertices: Vec<Vertex>, indices: Vec<u32>) -> Self {
        Self { vertices, indices }
    }

    /// Bounds of all vertex positions
    pub fn bounds(&self) -> Aabb {
        let mut aabb = Aabb::INVALID;
        for vertex in &self.vertices {
            aabb.grow_point(&Vec3::from(vertex.position));
        }
        aabb
    }

    /// Check index count and range
    pub fn validate(&self) -> Result<(), MeshDataError> {
        if self.vertices.is_empty() {
            return Err(MeshDataError::Invalid("no vertices".to_string()));
        }
        if self.indices.len() % 3 != 0 {
            return Err(MeshDataError::Invalid(format!(
                "{} indices is not a triangle list",
                self.indices.len()
            )));
        }
        let count = self.vertices.len() as u32;
        if let Some(bad) = self.indices.iter().find(|&&i| i >= count) {
            return Err(MeshDataError::Invalid(format!(
                "index {bad} out of range for {count} vertices"
            )));
        }
        Ok(())
    }

    /// Recompute per-vertex tangents from positions and UVs
    pub fn compute_tangents(&mut self) {
        let mut tangents = vec![Vec3::zeros(); self.vertices.len()];
        let mut bitangents = vec![Vec3::zeros(); self.vertices.len()];

        for tri in self.indices.chunks_exact(3) {
            let [a, b, c] = [tri[0] as usize, tri[1] as usize, tri[2] as usize];
            let (va, vb, vc) = (self.vertices[a], self.vertices[b], self.vertices[c]);

            let e1 = Vec3::from(vb.position) - Vec3::from(va.position);
            let e2 = Vec3::from(vc.position) - Vec3::from(va.position);
            let d1 = Vec2::from(vb.uv) - Vec2::from(va.uv);
            let d2 = Vec2::from(vc.uv) - Vec2::from(va.uv);

            let det = d1.x * d2.y - d2.x * d1.y;
            if det.abs() < f32::EPSILON {
                continue;
            }
            let r = 1.0 / det;
            let t = (e1 * d2.y - e2 * d1.y) * r;
            let bt = (e2 * d1.x - e1 * d2.x) * r;
            for &i in &[a, b, c] {
                tangents[i] += t;
                bitangents[i] += bt;
            }
        }

        for (i, vertex) in self.vertices.iter_mut().enumerate() {
            let n = Vec3::from(vertex.normal);
            // Gram-Schmidt against the normal
            let t = tangents[i] - n * n.dot(&tangents[i]);
            let Some(t) = t.try_normalize(f32::EPSILON) else {
                continue;
            };
            let w = if n.cross(&t).dot(&bitangents[i]) < 0.0 { -1.0 } else { 1.0 };
            vertex.tangent = [t.x, t.y, t.z, w];
        }
    }

    /// Unit cube centered on the origin, 24 vertices with per-face normals
    pub fn cube() -> Self {
        const FACES: [([f32; 3], [f32; 3], [f32; 3]); 6] = [
            // normal, u axis, v axis
            ([1.0, 0.0, 0.0], [0.0, 0.0, -1.0], [0.0, 1.0, 0.0]),
            ([-1.0, 0.0, 0.0], [0.0, 0.0, 1.0], [0.0, 1.0, 0.0]),
            ([0.0, 1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, -1.0]),
            ([0.0, -1.0, 0.0], [1.0, 0.0, 0.0], [0.0, 0.0, 1.0]),
            ([0.0, 0.0, 1.0], [1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
            ([0.0, 0.0, -1.0], [-1.0, 0.0, 0.0], [0.0, 1.0, 0.0]),
        ];

        let mut mesh = Self::default();
        for (normal, u, v) in FACES {
            let (n, u, v) = (Vec3::from(normal), Vec3::from(u), Vec3::from(v));
            let base = mesh.vertices.len() as u32;
            for (su, sv) in [(-1.0, -1.0), (1.0, -1.0), (1.0, 1.0), (-1.0, 1.0)] {
                let p = (n + u * su + v * sv) * 0.5;
                mesh.vertices.push(Vertex {
                    position: p.into(),
                    uv: [(su + 1.0) * 0.5, (1.0 - sv) * 0.5],
                    normal,
                    tangent: [u.x, u.y, u.z, 1.0],
                });
            }
            mesh.indices
                .extend_from_slice(&[base, base + 1, base + 2, base, base + 2, base + 3]);
        }
        mesh
    }

    /// Unit quad in the XY plane facing +Z
    pub fn quad() -> Self {
        Self::new(
            vec![
                Vertex::new([-0.5, -0.5, 0.0], [0.0, 1.0], [0.0, 0.0, 1.0]),
                Vertex::new([0.5, -0.5, 0.0], [1.0, 1.0], [0.0, 0.0, 1.0]),
                Vertex::new([0.5, 0.5, 0.0], [1.0, 0.0], [0.0, 0.0, 1.0]),
                Vertex::new([-0.5, 0.5, 0.0], [0.0, 0.0], [0.0, 0.0, 1.0]),
            ],
            vec![0, 1, 2, 0, 2, 3],
        )
    }

    /// Square ground plane in XZ facing +Y, split into `divisions`² cells
    pub fn plane(size: f32, divisions: u32) -> Self {
        let divisions = divisions.max(1);
        let step = size / divisions as f32;
        let half = size * 0.5;
        let row = divisions + 1;

        let mut mesh = Self::default();
        for z in 0..=divisions {
            for x in 0..=divisions {
                let u = x as f32 / divisions as f32;
                let v = z as f32 / divisions as f32;
                mesh.vertices.push(Vertex::new(
                    [x as f32 * step - half, 0.0, z as f32 * step - half],
                    [u, v],
                    [0.0, 1.0, 0.0],
                ));
            }
        }
        for z in 0..divisions {
            for x in 0..divisions {
                let i = z * row + x;
                mesh.indices
                    .extend_from_slice(&[i, i + row, i + 1, i + 1, i + row, i + row + 1]);
            }
        }
        mesh
    }

    /// Built-in primitive by name: `cube`, `quad` or `plane`
    pub fn primitive(name: &str) -> Option<Self> {
        match name {
            "cube" => Some(Self::cube()),
            "quad" => Some(Self::quad()),
            "plane" => Some(Self::plane(10.0, 10)),
            _ => None,
        }
    }

    /// Load a Wavefront OBJ file
    pub fn load_obj(path: impl AsRef<Path>) -> Result<Self, MeshDataError> {
        let path = path.as_ref();
        let file = std::fs::File::open(path)?;
        let mesh = Self::parse_obj(std::io::BufReader::new(file))?;
        log::debug!(
            "Loaded OBJ {}: {} vertices, {} triangles",
            path.display(),
            mesh.vertices.len(),
            mesh.indices.len() / 3
        );
        Ok(mesh)
    }

    /// Parse OBJ text; polygons are fan-triangulated
    pub fn parse_obj(reader: impl BufRead) -> Result<Self, MeshDataError> {
        let mut positions: Vec<[f32; 3]> = Vec::new();
        let mut normals: Vec<[f32; 3]> = Vec::new();
        let mut uvs: Vec<[f32; 2]> = Vec::new();
        let mut mesh = Self::default();
        let mut has_normals = true;

        for (line_no, line) in reader.lines().enumerate() {
            let line = line?;
            let line_no = line_no + 1;
            let mut parts = line.split_whitespace();
            let Some(tag) = parts.next() else {
                continue;
            };
            let parse_err = |reason: &str| MeshDataError::Parse {
                line: line_no,
                reason: reason.to_string(),
            };

            match tag {
                "v" => positions.push(parse_floats::<3>(parts).ok_or_else(|| parse_err("bad vertex"))?),
                "vn" => normals.push(parse_floats::<3>(parts).ok_or_else(|| parse_err("bad normal"))?),
                "vt" => {
                    let [u, v] = parse_floats::<2>(parts).ok_or_else(|| parse_err("bad uv"))?;
                    // OBJ v runs bottom to top
                    uvs.push([u, 1.0 - v]);
                }
                "f" => {
                    let mut corners = Vec::with_capacity(4);
                    for corner in parts {
                        let mut refs = corner.split('/');
                        let position = resolve_index(refs.next(), positions.len())
                            .ok_or_else(|| parse_err("bad position index"))?;
                        let uv = resolve_index(refs.next(), uvs.len());
                        let normal = resolve_index(refs.next(), normals.len());
                        has_normals &= normal.is_some();

                        mesh.vertices.push(Vertex::new(
                            positions[position],
                            uv.map_or([0.0, 0.0], |i| uvs[i]),
                            normal.map_or([0.0, 1.0, 0.0], |i| normals[i]),
                        ));
                        corners.push(mesh.vertices.len() as u32 - 1);
                    }
                    if corners.len() < 3 {
                        return Err(parse_err("face with fewer than 3 corners"));
                    }
                    for i in 1..corners.len() - 1 {
                        mesh.indices
                            .extend_from_slice(&[corners[0], corners[i], corners[i + 1]]);
                    }
                }
                _ => {}
            }
        }

        mesh.validate()?;
        if !has_normals {
            mesh.compute_flat_normals();
        }
        mesh.compute_tangents();
        Ok(mesh)
    }

    fn compute_flat_normals(&mut self) {
        for tri in self.indices.chunks_exact(3) {
            let p: Vec<Vec3> = tri
                .iter()
                .map(|&i| Vec3::from(self.vertices[i as usize].position))
                .collect();
            let n = (p[1] - p[0])
                .cross(&(p[2] - p[0]))
                .try_normalize(f32::EPSILON)
                .unwrap_or_else(Vec3::y);
            for &i in tri {
                self.vertices[i as usize].normal = n.into();
            }
        }
    }
}

fn parse_floats<'a, const N: usize>(mut parts: impl Iterator<Item = &'a str>) -> Option<[f32; N]> {
    let mut out = [0.0; N];
    for slot in &mut out {
        *slot = parts.next()?.parse().ok()?;
    }
    Some(out)
}

/// OBJ indices are 1-based; negative values count back from the end
fn resolve_index(text: Option<&str>, len: usize) -> Option<usize> {
    let value: i64 = text.filter(|t| !t.is_empty())?.parse().ok()?;
    let index = if value < 0 {
        len as i64 + value
    } else {
        value - 1
    };
    usize::try_from(index).ok().filter(|&i| i < len)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_cube_is_valid_and_centered() {
        let cube = MeshData::cube();
        assert_eq!(cube.vertices.len(), 24);
        assert_eq!(cube.indices.len(), 36);
        cube.validate().unwrap();

        let bounds = cube.bounds();
        assert_relative_eq!(bounds.position, Vec3::zeros());
        assert_relative_eq!(bounds.extent, Vec3::new(0.5, 0.5, 0.5));
    }

    #[test]
    fn test_cube_winding_matches_normals() {
        let cube = MeshData::cube();
        for tri in cube.indices.chunks_exact(3) {
            let p: Vec<Vec3> = tri
                .iter()
                .map(|&i| Vec3::from(cube.vertices[i as usize].position))
                .collect();
            let face = (p[1] - p[0]).cross(&(p[2] - p[0]));
            let normal = Vec3::from(cube.vertices[tri[0] as usize].normal);
            assert!(face.dot(&normal) > 0.0);
        }
    }

    #[test]
    fn test_plane_counts() {
        let plane = MeshData::plane(2.0, 4);
        assert_eq!(plane.vertices.len(), 25);
        assert_eq!(plane.indices.len(), 4 * 4 * 6);
        plane.validate().unwrap();
    }

    #[test]
    fn test_parse_obj_quad_is_triangulated() {
        let text = "\
# a quad
v 0 0 0
v 1 0 0
v 1 1 0
v 0 1 0
vt 0 0
vt 1 0
vt 1 1
vt 0 1
f 1/1 2/2 3/3 4/4
";
        let mesh = MeshData::parse_obj(text.as_bytes()).unwrap();
        assert_eq!(mesh.vertices.len(), 4);
        assert_eq!(mesh.indices, vec![0, 1, 2, 0, 2, 3]);
        // no normals given: flat normal from winding
        assert_relative_eq!(Vec3::from(mesh.vertices[0].normal), Vec3::z());
        let [tx, ty, tz, _] = mesh.vertices[0].tangent;
        assert_relative_eq!(Vec3::new(tx, ty, tz), Vec3::x(), epsilon = 1e-5);
    }

    #[test]
    fn test_parse_obj_rejects_bad_index() {
        let text = "v 0 0 0\nv 1 0 0\nf 1 2 3\n";
        assert!(matches!(
            MeshData::parse_obj(text.as_bytes()),
            Err(MeshDataError::Parse { line: 3, .. })
        ));
    }

    #[test]
    fn test_negative_indices() {
        let text = "v 0 0 0\nv 1 0 0\nv 0 1 0\nf -3 -2 -1\n";
        let mesh = MeshData::parse_obj(text.as_bytes()).unwrap();
        assert_eq!(mesh.indices, vec![0, 1, 2]);
    }
}
